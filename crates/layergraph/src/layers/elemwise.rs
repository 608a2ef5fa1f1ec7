//! Element-wise merge of several equally shaped inputs.

use std::sync::Arc;

use crate::backend::SymbolicBackend;
use crate::error::{LayerError, LayerResult};
use crate::layer::{Incoming, MergeBase, MultipleInputsLayer, OutputOptions};
use crate::shape::{Dim, Shape};

/// Sums its inputs element-wise.
pub struct ElemwiseSumLayer<B: SymbolicBackend> {
    base: MergeBase<B>,
}

impl<B: SymbolicBackend> ElemwiseSumLayer<B> {
    pub fn new<I, T>(backend: Arc<B>, incomings: I, name: Option<&str>) -> LayerResult<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<Incoming<B>>,
    {
        let base = MergeBase::new(backend, incomings, name)?;
        if base.input_layers().is_empty() {
            return Err(LayerError::incompatible_shape(
                base.label(),
                "at least one input is required",
            ));
        }
        Ok(Self { base })
    }
}

impl<B: SymbolicBackend> MultipleInputsLayer<B> for ElemwiseSumLayer<B> {
    fn base(&self) -> &MergeBase<B> {
        &self.base
    }

    /// Inputs must agree in rank and on every axis known in more than one input; the result
    /// keeps whichever extent is known.
    fn shape_for(&self, input_shapes: &[Shape]) -> LayerResult<Shape> {
        let Some((first, rest)) = input_shapes.split_first() else {
            return Err(LayerError::incompatible_shape(
                self.base.label(),
                "no input shapes",
            ));
        };
        let mut dims: Vec<Dim> = first.dims().to_vec();
        for shape in rest {
            if shape.rank() != dims.len() {
                return Err(LayerError::incompatible_shape(
                    self.base.label(),
                    format!("input shapes {first} and {shape} differ in rank"),
                ));
            }
            for (merged, &dim) in dims.iter_mut().zip(shape.dims()) {
                match (*merged, dim) {
                    (Dim::Known(a), Dim::Known(b)) if a != b => {
                        return Err(LayerError::incompatible_shape(
                            self.base.label(),
                            format!("input shapes {first} and {shape} differ"),
                        ));
                    }
                    (Dim::Unknown, known) => *merged = known,
                    _ => {}
                }
            }
        }
        Ok(Shape::from(dims))
    }

    fn expr_for(&self, inputs: Vec<B::Expr>, _options: &OutputOptions) -> LayerResult<B::Expr> {
        let backend = self.base.backend();
        let mut inputs = inputs.into_iter();
        let Some(first) = inputs.next() else {
            return Err(LayerError::incompatible_shape(
                self.base.label(),
                "no input expressions",
            ));
        };
        inputs.try_fold(first, |acc, expr| {
            backend.add(&acc, &expr).map_err(LayerError::from)
        })
    }
}
