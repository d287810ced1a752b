//! Trellis Core
//!
//! This crate provides the core runtime for the Trellis UI framework.
//! It implements:
//!
//! - Reactive primitives (reactive objects, refs, computeds, effects)
//! - A job scheduler batching updates into one flush per tick
//! - Virtual nodes and a host-agnostic reconciler
//! - Components with props, slots, lifecycle hooks and async setup
//! - Built-in suspense, keep-alive and teleport
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: dependency tracking, proxies, refs and computeds
//! - `scheduler`: pre/main/post job queues and the flush loop
//! - `watch`: watchers built on effects and the scheduler
//! - `vnode`: the virtual node model and its constructors
//! - `component`: definitions, instances, props, slots and hooks
//! - `renderer`: the reconciler, generic over a [`HostOps`] host
//! - `builtins`: suspense, keep-alive and teleport
//!
//! Everything runs on one thread. Each thread owns its own reactive graph,
//! scheduler queues and configuration.
//!
//! # Example
//!
//! ```rust,ignore
//! use trellis_core::prelude::*;
//!
//! let counter = ComponentDef::new()
//!     .name("Counter")
//!     .setup(|_, _| {
//!         let count = Ref::new(Value::from(0));
//!         let clicks = count.clone();
//!         SetupResult::render(move |_| {
//!             let clicks = clicks.clone();
//!             element(
//!                 "button",
//!                 Some(Props::new().on("onClick", move |_| {
//!                     let next = clicks.get().as_f64().unwrap_or(0.0) + 1.0;
//!                     clicks.set(next.into());
//!                 })),
//!                 count.get().to_display_string(),
//!             )
//!         })
//!     })
//!     .build();
//!
//! let renderer = Renderer::new(TestHost::new());
//! let root = renderer.host().create_root();
//! renderer.render(Some(component(&counter, None, ())), root)?;
//! assert_eq!(renderer.host().serialize_inner(root), "<button>0</button>");
//! ```

pub mod builtins;
pub mod component;
pub mod config;
pub mod error;
pub mod reactive;
pub mod renderer;
pub mod scheduler;
pub mod vnode;
pub mod watch;

pub use error::{BoxError, CallResult, Error, ErrorKind};
pub use renderer::{HostOps, NodeHandle, Renderer};

/// The commonly used items in one import.
pub mod prelude {
    pub use crate::builtins::{keep_alive, SuspenseBoundary};
    pub use crate::component::{
        get_current_instance, inject, inject_or, on_activated, on_before_mount, on_before_unmount,
        on_before_update, on_deactivated, on_error_captured, on_mounted, on_unmounted, on_updated, pending,
        provide, Component, ComponentDef, ComponentInstance, Pending, PropOptions, SetupContext, SetupResult,
        Settle, Slots,
    };
    pub use crate::error::{Error, ErrorKind};
    pub use crate::reactive::{
        computed, effect, effect_scope, reactive, readonly, shallow_reactive, shallow_ref, to_raw, Computed,
        Reactive, RawObject, Ref, Value,
    };
    pub use crate::renderer::test_host::TestHost;
    pub use crate::renderer::{HostOps, NodeHandle, Renderer};
    pub use crate::scheduler::{flush, next_tick};
    pub use crate::vnode::{
        comment, component, element, fragment, keyed_fragment, static_content, suspense, teleport, text, PropValue,
        Props, VNode,
    };
    pub use crate::watch::{watch, watch_effect, WatchOptions, WatchSource};
}
