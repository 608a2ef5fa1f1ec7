use std::fmt;
use std::sync::Arc;

use crate::backend::SymbolicBackend;
use crate::error::{LayerError, LayerResult};
use crate::params::{Param, ParamSpec, ParamStore, ParamTags, TagFilter};
use crate::shape::Shape;

use super::node::{layer_label, Incoming, LayerId, Node};
use super::options::OutputOptions;
use super::overrides::Overrides;

/// State shared by every single-input layer: identity, input slot, and parameters.
pub struct LayerBase<B: SymbolicBackend> {
    id: LayerId,
    name: Option<String>,
    backend: Arc<B>,
    input_shape: Shape,
    input_layer: Option<Node<B>>,
    params: ParamStore<B>,
}

impl<B: SymbolicBackend> LayerBase<B> {
    /// Connects to `incoming`, or declares a source layer when given a shape.
    ///
    /// The input shape of a connected layer is queried from the upstream node once, here.
    pub fn new(
        backend: Arc<B>,
        incoming: impl Into<Incoming<B>>,
        name: Option<&str>,
    ) -> LayerResult<Self> {
        let (input_shape, input_layer) = match incoming.into() {
            Incoming::Layer(node) => (node.output_shape()?, Some(node)),
            Incoming::Shape(shape) => (shape, None),
        };
        Ok(Self {
            id: LayerId::next(),
            name: name.map(str::to_string),
            backend,
            input_shape,
            input_layer,
            params: ParamStore::new(),
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

    pub fn input_shape(&self) -> &Shape {
        &self.input_shape
    }

    /// Upstream node, or `None` for a layer declared from a shape.
    pub fn input_layer(&self) -> Option<&Node<B>> {
        self.input_layer.as_ref()
    }

    pub fn params(&self) -> &ParamStore<B> {
        &self.params
    }

    /// Creates a parameter from `spec` and registers it with its tags.
    ///
    /// `name` is prefixed with `"<layer name>."` when this layer is named.
    pub fn add_param(
        &mut self,
        spec: impl Into<ParamSpec<B>>,
        shape: &[usize],
        name: Option<&str>,
        tags: ParamTags,
    ) -> LayerResult<Param<B>> {
        let full_name = match (name, self.name.as_deref()) {
            (Some(param), Some(layer)) => Some(format!("{layer}.{param}")),
            (Some(param), None) => Some(param.to_string()),
            (None, _) => None,
        };
        let param = spec
            .into()
            .create(&self.backend, shape, full_name.as_deref())?;
        let tags = tags.resolve();
        log::debug!(
            "{}: registered parameter {:?} {:?} tags={:?}",
            self.label(),
            full_name,
            shape,
            tags
        );
        self.params.insert(param.clone(), tags);
        Ok(param)
    }
}

impl<B: SymbolicBackend> fmt::Debug for LayerBase<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayerBase")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("input_shape", &self.input_shape)
            .field("input_layer", &self.input_layer)
            .field("params", &self.params)
            .finish()
    }
}

/// A layer with a single input slot.
pub trait Layer<B: SymbolicBackend>: Send + Sync + 'static {
    fn base(&self) -> &LayerBase<B>;

    /// Output shape for a given input shape. Defaults to the identity.
    fn shape_for(&self, input_shape: &Shape) -> LayerResult<Shape> {
        Ok(input_shape.clone())
    }

    /// Output expression of this layer alone, given its input expression.
    fn expr_for(&self, input: B::Expr, options: &OutputOptions) -> LayerResult<B::Expr> {
        let _ = (input, options);
        Err(LayerError::not_implemented(self.base().label(), "expr_for"))
    }

    fn output_shape(&self) -> LayerResult<Shape> {
        self.shape_for(self.base().input_shape())
    }

    /// Output expression of the network at this layer.
    ///
    /// A layer mapped in `inputs` yields the mapped value without looking upstream. Otherwise
    /// the upstream output is resolved with the same `inputs` and `options` and passed through
    /// [`Layer::expr_for`].
    fn output(&self, inputs: &Overrides<B>, options: &OutputOptions) -> LayerResult<B::Expr> {
        let base = self.base();
        if let Some(value) = inputs.get(base.id()) {
            return value.to_expr(base.backend());
        }
        let Some(upstream) = base.input_layer() else {
            return Err(LayerError::UnconnectedNode {
                layer: base.label(),
            });
        };
        log::trace!("{}: resolving input from {}", base.label(), upstream.label());
        let input = upstream.output(inputs, options)?;
        self.expr_for(input, options)
    }

    /// Parameters matching `filter`, in registration order.
    fn get_params(&self, filter: &TagFilter) -> Vec<Param<B>> {
        self.base().params().params(filter)
    }

    fn into_node(self) -> Node<B>
    where
        Self: Sized,
    {
        Node::Single(Arc::new(self))
    }
}
