//! Layer protocol: graph nodes, shape inference, and expression propagation.
//!
//! A [`Layer`] has exactly one input slot and owns a [`ParamStore`](crate::params::ParamStore);
//! a [`MultipleInputsLayer`] aggregates several input slots and owns no parameters unless the
//! implementation provides them. Both are wrapped into a [`Node`] to take part in a graph.
//!
//! Implementations usually override only `shape_for`/`expr_for`; `output_shape` and `output`
//! take care of walking upstream.

mod base;
mod merge;
mod node;
mod options;
mod overrides;

pub use base::{Layer, LayerBase};
pub use merge::{MergeBase, MultipleInputsLayer};
pub use node::{Incoming, LayerId, Node};
pub use options::{OptionValue, OutputOptions};
pub use overrides::{InputValue, Overrides};
