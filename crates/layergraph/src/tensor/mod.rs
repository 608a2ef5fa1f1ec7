//! Host-side numeric arrays exchanged with symbolic backends.
//!
//! Parameter literals, initializer outputs, constant overrides and parameter snapshots all
//! travel as [`HostTensor`] values; backends own the symbolic side.

pub mod dtype;
mod host_tensor;
mod norms;

pub use dtype::DType;
pub use host_tensor::{HostTensor, TensorData};
pub use norms::compute_norms;
