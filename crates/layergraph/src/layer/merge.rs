use std::fmt;
use std::sync::Arc;

use crate::backend::SymbolicBackend;
use crate::error::{LayerError, LayerResult};
use crate::params::{Param, ParamStore, TagFilter};
use crate::shape::Shape;

use super::node::{layer_label, Incoming, LayerId, Node};
use super::options::OutputOptions;
use super::overrides::Overrides;

/// State shared by layers that aggregate several inputs.
///
/// `input_shapes` and `input_layers` are parallel; slots declared by shape have no layer.
pub struct MergeBase<B: SymbolicBackend> {
    id: LayerId,
    name: Option<String>,
    backend: Arc<B>,
    input_shapes: Vec<Shape>,
    input_layers: Vec<Option<Node<B>>>,
}

impl<B: SymbolicBackend> MergeBase<B> {
    pub fn new<I, T>(backend: Arc<B>, incomings: I, name: Option<&str>) -> LayerResult<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<Incoming<B>>,
    {
        let mut input_shapes = Vec::new();
        let mut input_layers = Vec::new();
        for incoming in incomings {
            match incoming.into() {
                Incoming::Layer(node) => {
                    input_shapes.push(node.output_shape()?);
                    input_layers.push(Some(node));
                }
                Incoming::Shape(shape) => {
                    input_shapes.push(shape);
                    input_layers.push(None);
                }
            }
        }
        Ok(Self {
            id: LayerId::next(),
            name: name.map(str::to_string),
            backend,
            input_shapes,
            input_layers,
        })
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn label(&self) -> String {
        layer_label(self.name(), self.id)
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Input shapes recorded at construction.
    pub fn input_shapes(&self) -> &[Shape] {
        &self.input_shapes
    }

    pub fn input_layers(&self) -> &[Option<Node<B>>] {
        &self.input_layers
    }

    /// Current input shapes: connected slots are re-queried, declared slots are returned as-is.
    pub fn current_input_shapes(&self) -> LayerResult<Vec<Shape>> {
        self.input_shapes
            .iter()
            .zip(&self.input_layers)
            .map(|(shape, layer)| match layer {
                Some(node) => node.output_shape(),
                None => Ok(shape.clone()),
            })
            .collect()
    }
}

impl<B: SymbolicBackend> fmt::Debug for MergeBase<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergeBase")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("input_shapes", &self.input_shapes)
            .field("input_layers", &self.input_layers)
            .finish()
    }
}

/// A layer that aggregates the outputs of several input slots.
pub trait MultipleInputsLayer<B: SymbolicBackend>: Send + Sync + 'static {
    fn base(&self) -> &MergeBase<B>;

    /// Output shape for the given input shapes, in slot order.
    fn shape_for(&self, input_shapes: &[Shape]) -> LayerResult<Shape> {
        let _ = input_shapes;
        Err(LayerError::not_implemented(self.base().label(), "shape_for"))
    }

    /// Output expression of this layer alone, given its input expressions in slot order.
    fn expr_for(&self, inputs: Vec<B::Expr>, options: &OutputOptions) -> LayerResult<B::Expr> {
        let _ = (inputs, options);
        Err(LayerError::not_implemented(self.base().label(), "expr_for"))
    }

    fn output_shape(&self) -> LayerResult<Shape> {
        let shapes = self.base().current_input_shapes()?;
        self.shape_for(&shapes)
    }

    /// Output expression of the network at this layer.
    ///
    /// Fails with [`LayerError::UnconnectedNode`] when this layer is not mapped in `inputs` and
    /// any slot was declared by shape.
    fn output(&self, inputs: &Overrides<B>, options: &OutputOptions) -> LayerResult<B::Expr> {
        let base = self.base();
        if let Some(value) = inputs.get(base.id()) {
            return value.to_expr(base.backend());
        }
        let upstream: Vec<&Node<B>> = base.input_layers().iter().flatten().collect();
        if upstream.len() != base.input_layers().len() {
            return Err(LayerError::UnconnectedNode {
                layer: base.label(),
            });
        }
        log::trace!("{}: resolving {} inputs", base.label(), upstream.len());
        let resolved = upstream
            .into_iter()
            .map(|node| node.output(inputs, options))
            .collect::<LayerResult<Vec<_>>>()?;
        self.expr_for(resolved, options)
    }

    /// Parameter store, for implementations that own parameters.
    fn params(&self) -> Option<&ParamStore<B>> {
        None
    }

    fn get_params(&self, filter: &TagFilter) -> Vec<Param<B>> {
        self.params()
            .map(|store| store.params(filter))
            .unwrap_or_default()
    }

    fn into_node(self) -> Node<B>
    where
        Self: Sized,
    {
        Node::Multiple(Arc::new(self))
    }
}
