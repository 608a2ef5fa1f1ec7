use std::collections::HashMap;
use std::fmt;

use crate::backend::SymbolicBackend;
use crate::error::LayerResult;
use crate::tensor::HostTensor;

use super::node::{LayerId, Node};

/// A value substituted for a layer's output.
pub enum InputValue<B: SymbolicBackend> {
    Expr(B::Expr),
    /// Wrapped as a backend constant when used.
    Array(HostTensor),
    /// Wrapped as a rank-0 backend constant when used.
    Scalar(f64),
}

impl<B: SymbolicBackend> InputValue<B> {
    /// Coerces the value into a backend expression.
    pub fn to_expr(&self, backend: &B) -> LayerResult<B::Expr> {
        match self {
            InputValue::Expr(expr) => Ok(expr.clone()),
            InputValue::Array(array) => Ok(backend.constant(array)?),
            InputValue::Scalar(value) => Ok(backend.constant(&HostTensor::scalar(*value))?),
        }
    }
}

impl<B: SymbolicBackend> Clone for InputValue<B> {
    fn clone(&self) -> Self {
        match self {
            InputValue::Expr(expr) => InputValue::Expr(expr.clone()),
            InputValue::Array(array) => InputValue::Array(array.clone()),
            InputValue::Scalar(value) => InputValue::Scalar(*value),
        }
    }
}

impl<B: SymbolicBackend> fmt::Debug for InputValue<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputValue::Expr(expr) => f.debug_tuple("Expr").field(expr).finish(),
            InputValue::Array(array) => f.debug_tuple("Array").field(array).finish(),
            InputValue::Scalar(value) => f.debug_tuple("Scalar").field(value).finish(),
        }
    }
}

impl<B: SymbolicBackend> From<HostTensor> for InputValue<B> {
    fn from(array: HostTensor) -> Self {
        InputValue::Array(array)
    }
}

impl<B: SymbolicBackend> From<f64> for InputValue<B> {
    fn from(value: f64) -> Self {
        InputValue::Scalar(value)
    }
}

/// Inputs fed to [`Node::output`]: per-layer substitutions keyed by layer identity, plus an
/// optional value standing in for every input layer of the network.
pub struct Overrides<B: SymbolicBackend> {
    layers: HashMap<LayerId, InputValue<B>>,
    all_inputs: Option<InputValue<B>>,
}

impl<B: SymbolicBackend> Overrides<B> {
    /// No substitutions: input layers use their own symbolic variables.
    pub fn new() -> Self {
        Self {
            layers: HashMap::new(),
            all_inputs: None,
        }
    }

    /// Feeds `value` to every input layer that is not mapped explicitly.
    pub fn for_inputs(value: impl Into<InputValue<B>>) -> Self {
        Self {
            layers: HashMap::new(),
            all_inputs: Some(value.into()),
        }
    }

    pub fn with(mut self, node: &Node<B>, value: impl Into<InputValue<B>>) -> Self {
        self.insert(node.id(), value);
        self
    }

    pub fn insert(&mut self, id: LayerId, value: impl Into<InputValue<B>>) {
        self.layers.insert(id, value.into());
    }

    pub fn get(&self, id: LayerId) -> Option<&InputValue<B>> {
        self.layers.get(&id)
    }

    pub fn all_inputs(&self) -> Option<&InputValue<B>> {
        self.all_inputs.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty() && self.all_inputs.is_none()
    }
}

impl<B: SymbolicBackend> Default for Overrides<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: SymbolicBackend> Clone for Overrides<B> {
    fn clone(&self) -> Self {
        Self {
            layers: self.layers.clone(),
            all_inputs: self.all_inputs.clone(),
        }
    }
}

impl<B: SymbolicBackend> fmt::Debug for Overrides<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Overrides")
            .field("layers", &self.layers)
            .field("all_inputs", &self.all_inputs)
            .finish()
    }
}
