//! Built-in structural components: [`suspense`] boundaries, the
//! [`keep_alive`] cache and [`teleport`].
//!
//! The renderer only knows them through their shape flags; each drives
//! reconciliation of its own subtree through the renderer's internals.

pub mod keep_alive;
pub mod suspense;
pub mod teleport;

pub use keep_alive::keep_alive;
pub use suspense::SuspenseBoundary;
