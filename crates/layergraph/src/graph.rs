//! Topological enumeration of the layers feeding one or more sinks.

use std::collections::HashSet;

use crate::backend::SymbolicBackend;
use crate::layer::{LayerId, Node};

/// Every layer reachable upstream from `sinks`, each once, dependencies first.
///
/// Sinks are processed left to right and each one's inputs are visited depth-first in slot
/// order before the sink itself is emitted. A layer already emitted for an earlier sink is
/// neither revisited nor moved, so earlier sinks' ancestors come first.
pub fn get_all_layers<B: SymbolicBackend>(sinks: impl AsRef<[Node<B>]>) -> Vec<Node<B>> {
    get_all_layers_until(sinks, &[])
}

/// Like [`get_all_layers`], but layers in `treat_as_input` are emitted without expanding their
/// inputs.
pub fn get_all_layers_until<B: SymbolicBackend>(
    sinks: impl AsRef<[Node<B>]>,
    treat_as_input: &[Node<B>],
) -> Vec<Node<B>> {
    let boundary: HashSet<LayerId> = treat_as_input.iter().map(Node::id).collect();
    let mut emitted: HashSet<LayerId> = HashSet::new();
    let mut order: Vec<Node<B>> = Vec::new();

    // (node, inputs_done): a node is pushed once to expand its inputs and once more to be
    // emitted after them.
    let mut stack: Vec<(Node<B>, bool)> = Vec::new();
    for sink in sinks.as_ref() {
        stack.push((sink.clone(), false));
        while let Some((node, inputs_done)) = stack.pop() {
            if emitted.contains(&node.id()) {
                continue;
            }
            if inputs_done || boundary.contains(&node.id()) {
                emitted.insert(node.id());
                order.push(node);
                continue;
            }
            let upstream = node.upstream();
            stack.push((node, true));
            stack.extend(upstream.into_iter().rev().map(|input| (input, false)));
        }
    }

    log::debug!(
        "collected {} layers from {} sinks",
        order.len(),
        sinks.as_ref().len()
    );
    order
}
