//! Layer-composition graphs over a symbolic tensor backend.
//!
//! Every [`Layer`] wraps a transformation from an input shape/expression to an output
//! shape/expression and keeps a reference to the node(s) feeding into it, so a network's
//! output [`Node`] doubles as a handle to the whole network. The [`graph`] and [`helper`]
//! modules walk those handles to enumerate layers and aggregate their parameters.

pub mod backend;
mod env;
pub mod error;
pub mod graph;
pub mod helper;
pub mod init;
pub mod layer;
pub mod layers;
pub mod params;
pub mod shape;
pub mod tensor;

pub use backend::{BackendError, BackendResult, SymbolicBackend};
pub use env::float_x;
pub use error::{LayerError, LayerResult};
pub use graph::get_all_layers;
pub use helper::{count_params, get_all_param_values, get_all_params, set_all_param_values};
pub use layer::{
    Incoming, InputValue, Layer, LayerBase, LayerId, MergeBase, MultipleInputsLayer, Node,
    OptionValue, OutputOptions, Overrides,
};
pub use params::{Param, ParamSpec, ParamStore, ParamTags, TagFilter, REGULARIZABLE, TRAINABLE};
pub use shape::{Dim, Shape};
pub use tensor::{DType, HostTensor};
