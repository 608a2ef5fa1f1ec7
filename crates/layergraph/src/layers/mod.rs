//! Concrete layers needed to assemble feed-forward networks.

pub mod dense;
pub mod elemwise;
pub mod input;

pub use dense::DenseLayer;
pub use elemwise::ElemwiseSumLayer;
pub use input::InputLayer;
