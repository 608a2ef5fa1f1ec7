//! Network entry point holding a symbolic input variable.

use std::sync::Arc;

use crate::backend::SymbolicBackend;
use crate::error::LayerResult;
use crate::layer::{Layer, LayerBase, OutputOptions, Overrides};
use crate::shape::Shape;

/// Source layer whose output is a free symbolic variable of the declared shape's rank.
pub struct InputLayer<B: SymbolicBackend> {
    base: LayerBase<B>,
    input_var: B::Expr,
}

impl<B: SymbolicBackend> InputLayer<B> {
    /// Declares an input of `shape`; a variable is created unless `input_var` is supplied.
    pub fn new(
        backend: Arc<B>,
        shape: impl Into<Shape>,
        input_var: Option<B::Expr>,
        name: Option<&str>,
    ) -> LayerResult<Self> {
        let shape = shape.into();
        let input_var = match input_var {
            Some(var) => var,
            None => backend.variable(name, shape.rank())?,
        };
        let base = LayerBase::new(backend, shape, name)?;
        Ok(Self { base, input_var })
    }

    pub fn input_var(&self) -> &B::Expr {
        &self.input_var
    }

    pub fn shape(&self) -> &Shape {
        self.base.input_shape()
    }
}

impl<B: SymbolicBackend> Layer<B> for InputLayer<B> {
    fn base(&self) -> &LayerBase<B> {
        &self.base
    }

    fn expr_for(&self, input: B::Expr, _options: &OutputOptions) -> LayerResult<B::Expr> {
        Ok(input)
    }

    /// Mapped value if this layer is mapped, else the network-wide input if one was given,
    /// else the layer's own variable.
    fn output(&self, inputs: &Overrides<B>, _options: &OutputOptions) -> LayerResult<B::Expr> {
        let backend = self.base.backend();
        if let Some(value) = inputs.get(self.base.id()) {
            return value.to_expr(backend);
        }
        match inputs.all_inputs() {
            Some(value) => value.to_expr(backend),
            None => Ok(self.input_var.clone()),
        }
    }
}
