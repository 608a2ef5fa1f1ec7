//! Errors raised while building, propagating through, or aggregating over layer graphs.

use thiserror::Error;

use crate::backend::BackendError;

pub type LayerResult<T> = Result<T, LayerError>;

/// Failures of the layer core. None are retried internally; callers decide how to recover.
#[derive(Debug, Error)]
pub enum LayerError {
    #[error(
        "output() called on free-floating layer {layer}; there is nothing to get its input from \
         (map the layer in the overrides or call expr_for directly)"
    )]
    UnconnectedNode { layer: String },

    #[error("parameter array has shape {found:?}, should be {expected:?}")]
    ShapeMismatch { expected: Vec<usize>, found: Vec<usize> },

    #[error("shared variable has {found} dimensions, should be {expected}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("cannot initialize parameters: {0}")]
    InvalidInitializer(#[source] anyhow::Error),

    #[error("cannot initialize parameters: {0}")]
    UnsupportedSpec(String),

    #[error("mismatch: got {found} values to set {expected} parameters")]
    ValueCountMismatch { expected: usize, found: usize },

    #[error("{layer} does not implement {method}")]
    NotImplemented { layer: String, method: &'static str },

    #[error("incompatible input shapes for {layer}: {reason}")]
    IncompatibleShape { layer: String, reason: String },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl LayerError {
    pub fn not_implemented(layer: impl Into<String>, method: &'static str) -> Self {
        LayerError::NotImplemented {
            layer: layer.into(),
            method,
        }
    }

    pub fn incompatible_shape(layer: impl Into<String>, reason: impl Into<String>) -> Self {
        LayerError::IncompatibleShape {
            layer: layer.into(),
            reason: reason.into(),
        }
    }
}
