//! Reference in-memory backend for `layergraph`.
//!
//! Expressions are immutable trees evaluated on the host in `f64`; shared slots are
//! reference-counted cells. Intended for tests and small experiments, not for speed.

pub mod backend;
mod kernels;

pub use backend::{Bindings, RefBackend, RefExpr, RefSlot, VarId};
