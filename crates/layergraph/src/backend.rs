//! Interface to the symbolic tensor engine the layers build expressions with.
//!
//! The layer core never computes anything numerically. It asks the backend to wrap host
//! arrays as constants, to allocate named mutable slots for parameters, and (for the bundled
//! layers) to combine expressions. Everything else about the engine stays behind this trait.

use std::fmt;

use crate::tensor::{DType, HostTensor};

pub type BackendResult<T> = Result<T, BackendError>;

/// Backend error surfaced to the layer core.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    Unimplemented { op: &'static str, reason: String },
    InvalidValue { message: String },
    Execution { message: String },
}

impl BackendError {
    pub fn unimplemented(op: &'static str, reason: impl Into<String>) -> Self {
        BackendError::Unimplemented {
            op,
            reason: reason.into(),
        }
    }

    pub fn invalid_value(message: impl Into<String>) -> Self {
        BackendError::InvalidValue {
            message: message.into(),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        BackendError::Execution {
            message: message.into(),
        }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Unimplemented { op, reason } => {
                write!(f, "{op} is not implemented: {reason}")
            }
            BackendError::InvalidValue { message } => write!(f, "invalid value: {message}"),
            BackendError::Execution { message } => {
                write!(f, "backend execution failure: {message}")
            }
        }
    }
}

impl std::error::Error for BackendError {}

/// Symbolic expression engine consumed by layers.
///
/// `Slot` is a mutable, shape-typed storage cell with an optional name; cloning a slot must
/// yield another handle to the same storage.
pub trait SymbolicBackend: Send + Sync + 'static {
    type Expr: Clone + fmt::Debug + Send + Sync + 'static;
    type Slot: Clone + fmt::Debug + Send + Sync + 'static;

    /// Returns a human-readable backend identifier.
    fn backend_name(&self) -> &str;

    /// Float dtype arrays are normalized to before they become parameters.
    fn float_dtype(&self) -> DType {
        crate::env::float_x()
    }

    /// Wraps a host array (or rank-0 scalar) as a constant expression.
    fn constant(&self, value: &HostTensor) -> BackendResult<Self::Expr>;

    /// Creates a free symbolic input of the given rank.
    fn variable(&self, name: Option<&str>, ndim: usize) -> BackendResult<Self::Expr>;

    /// Allocates a named mutable slot initialized with `value`.
    fn shared(&self, value: HostTensor, name: Option<&str>) -> BackendResult<Self::Slot>;

    fn slot_ndim(&self, slot: &Self::Slot) -> usize;

    /// Concrete shape of the slot's current contents.
    fn slot_shape(&self, slot: &Self::Slot) -> Vec<usize>;

    fn slot_name(&self, slot: &Self::Slot) -> Option<String>;

    /// Reads back the slot's current contents.
    fn get_value(&self, slot: &Self::Slot) -> BackendResult<HostTensor>;

    /// Replaces the slot's contents.
    fn set_value(&self, slot: &Self::Slot, value: HostTensor) -> BackendResult<()>;

    /// Returns an expression that reads the slot.
    fn slot_expr(&self, slot: &Self::Slot) -> Self::Expr;

    /// Matrix product of two expressions.
    fn dot(&self, lhs: &Self::Expr, rhs: &Self::Expr) -> BackendResult<Self::Expr> {
        let _ = (lhs, rhs);
        Err(BackendError::unimplemented(
            "dot",
            format!("backend '{}' has no matrix product", self.backend_name()),
        ))
    }

    /// Broadcasting element-wise sum of two expressions.
    fn add(&self, lhs: &Self::Expr, rhs: &Self::Expr) -> BackendResult<Self::Expr> {
        let _ = (lhs, rhs);
        Err(BackendError::unimplemented(
            "add",
            format!("backend '{}' has no element-wise sum", self.backend_name()),
        ))
    }

    /// Flattens every axis from `outdim - 1` onward into one.
    fn flatten(&self, expr: &Self::Expr, outdim: usize) -> BackendResult<Self::Expr> {
        let _ = (expr, outdim);
        Err(BackendError::unimplemented(
            "flatten",
            format!("backend '{}' cannot reshape expressions", self.backend_name()),
        ))
    }
}
