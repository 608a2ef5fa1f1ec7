//! Fully connected layer `y = flatten(x) W + b`.

use std::sync::Arc;

use crate::backend::SymbolicBackend;
use crate::error::{LayerError, LayerResult};
use crate::init::{Constant, GlorotUniform};
use crate::layer::{Incoming, Layer, LayerBase, OutputOptions};
use crate::params::{Param, ParamSpec, ParamTags};
use crate::shape::{Dim, Shape};

/// Fully connected layer. Trailing input axes are flattened into the feature axis.
pub struct DenseLayer<B: SymbolicBackend> {
    base: LayerBase<B>,
    num_units: usize,
    weight: Param<B>,
    bias: Option<Param<B>>,
}

impl<B: SymbolicBackend> DenseLayer<B> {
    /// Glorot-uniform weights and a zero bias.
    pub fn new(
        backend: Arc<B>,
        incoming: impl Into<Incoming<B>>,
        num_units: usize,
        name: Option<&str>,
    ) -> LayerResult<Self> {
        Self::with_params(
            backend,
            incoming,
            num_units,
            ParamSpec::<B>::initializer(GlorotUniform::default()),
            Some(ParamSpec::<B>::initializer(Constant::new(0.0))),
            name,
        )
    }

    /// Explicit weight spec and optional bias spec; `None` drops the bias.
    ///
    /// The weight is trainable and regularizable; the bias is only trainable.
    pub fn with_params(
        backend: Arc<B>,
        incoming: impl Into<Incoming<B>>,
        num_units: usize,
        weight: impl Into<ParamSpec<B>>,
        bias: Option<ParamSpec<B>>,
        name: Option<&str>,
    ) -> LayerResult<Self> {
        let mut base = LayerBase::new(backend, incoming, name)?;
        let num_inputs = Shape::new(base.input_shape().dims().iter().skip(1).copied())
            .num_elements()
            .ok_or_else(|| {
                LayerError::incompatible_shape(
                    base.label(),
                    format!(
                        "feature axes of input shape {} must be known",
                        base.input_shape()
                    ),
                )
            })?;

        let weight = base.add_param(
            weight,
            &[num_inputs, num_units],
            Some("W"),
            ParamTags::new(),
        )?;
        let bias = match bias {
            Some(spec) => Some(base.add_param(
                spec,
                &[num_units],
                Some("b"),
                ParamTags::new().regularizable(false),
            )?),
            None => None,
        };
        Ok(Self {
            base,
            num_units,
            weight,
            bias,
        })
    }

    pub fn num_units(&self) -> usize {
        self.num_units
    }

    pub fn weight(&self) -> &Param<B> {
        &self.weight
    }

    pub fn bias(&self) -> Option<&Param<B>> {
        self.bias.as_ref()
    }
}

impl<B: SymbolicBackend> Layer<B> for DenseLayer<B> {
    fn base(&self) -> &LayerBase<B> {
        &self.base
    }

    fn shape_for(&self, input_shape: &Shape) -> LayerResult<Shape> {
        let batch = input_shape.dim(0).unwrap_or(Dim::Unknown);
        Ok(Shape::new([batch, Dim::Known(self.num_units)]))
    }

    fn expr_for(&self, input: B::Expr, _options: &OutputOptions) -> LayerResult<B::Expr> {
        let backend = self.base.backend();
        let input = if self.base.input_shape().rank() > 2 {
            backend.flatten(&input, 2)?
        } else {
            input
        };
        let activation = backend.dot(&input, &self.weight.expr())?;
        match &self.bias {
            Some(bias) => Ok(backend.add(&activation, &bias.expr())?),
            None => Ok(activation),
        }
    }
}
