//! Property-based tests for the keyed diff.

use proptest::prelude::*;

use trellis_core::prelude::*;
use trellis_core::renderer::longest_increasing_subsequence;
use trellis_core::renderer::test_host::NodeOp;

/// Length of a longest strictly increasing subsequence, quadratic reference.
fn lis_len(seq: &[usize]) -> usize {
    let values: Vec<usize> = seq.iter().copied().filter(|v| *v != 0).collect();
    let mut best = vec![1; values.len()];
    for i in 0..values.len() {
        for j in 0..i {
            if values[j] < values[i] {
                best[i] = best[i].max(best[j] + 1);
            }
        }
    }
    best.into_iter().max().unwrap_or(0)
}

fn keyed_list(keys: &[u32]) -> VNode {
    let items = keys
        .iter()
        .map(|k| element("li", Some(Props::new().with("key", *k)), k.to_string()))
        .collect::<Vec<_>>();
    element("ul", None, items)
}

fn markup(keys: &[u32]) -> String {
    let items: String = keys.iter().map(|k| format!("<li>{k}</li>")).collect();
    format!("<ul>{items}</ul>")
}

fn key_order() -> impl Strategy<Value = Vec<u32>> {
    prop::sample::subsequence((1..=24).collect::<Vec<u32>>(), 0..=24).prop_shuffle()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: the result is an optimal strictly increasing run of
    /// non-zero entries.
    #[test]
    fn lis_is_increasing_and_optimal(seq in prop::collection::vec(0usize..16, 0..32)) {
        let indices = longest_increasing_subsequence(&seq);

        prop_assert!(indices.windows(2).all(|w| w[0] < w[1]));
        prop_assert!(indices.windows(2).all(|w| seq[w[0]] < seq[w[1]]));
        prop_assert!(indices.iter().all(|&i| seq[i] != 0));
        prop_assert_eq!(indices.len(), lis_len(&seq));
    }

    /// Property: patching any keyed list into any other reuses every shared
    /// key and moves only the nodes outside a longest stable run.
    #[test]
    fn keyed_patch_is_minimal(old in key_order(), new in key_order()) {
        let renderer = Renderer::new(TestHost::new());
        let root = renderer.host().create_root();
        renderer.render(Some(keyed_list(&old)), root).unwrap();
        renderer.host().reset_ops();

        renderer.render(Some(keyed_list(&new)), root).unwrap();
        prop_assert_eq!(renderer.host().serialize_inner(root), markup(&new));

        // Old positions (1-based) of the kept keys, in their new order.
        let kept: Vec<usize> = new
            .iter()
            .filter_map(|k| old.iter().position(|o| o == k).map(|p| p + 1))
            .collect();
        let ops = renderer.host().ops();
        let creates = ops.iter().filter(|op| matches!(op, NodeOp::Create { .. })).count();
        let removes = ops.iter().filter(|op| op.is_remove()).count();
        let moves = ops.iter().filter(|op| op.is_move()).count();

        prop_assert_eq!(creates, new.len() - kept.len());
        prop_assert_eq!(removes, old.len() - kept.len());
        prop_assert_eq!(moves, kept.len() - lis_len(&kept));
    }
}
