use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::backend::SymbolicBackend;
use crate::error::LayerResult;
use crate::params::{Param, ParamStore, TagFilter};
use crate::shape::Shape;

use super::base::Layer;
use super::merge::MultipleInputsLayer;
use super::options::OutputOptions;
use super::overrides::Overrides;

static LAYER_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Process-unique identity of a layer; the key of [`Overrides`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(u64);

impl LayerId {
    pub(crate) fn next() -> Self {
        LayerId(LAYER_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer#{}", self.0)
    }
}

pub(crate) fn layer_label(name: Option<&str>, id: LayerId) -> String {
    match name {
        Some(name) => format!("'{name}' ({id})"),
        None => id.to_string(),
    }
}

/// A layer taking part in a graph.
///
/// Cloning a node clones the handle, not the layer; equality and hashing follow [`LayerId`].
pub enum Node<B: SymbolicBackend> {
    Single(Arc<dyn Layer<B>>),
    Multiple(Arc<dyn MultipleInputsLayer<B>>),
}

impl<B: SymbolicBackend> Node<B> {
    pub fn single<L: Layer<B>>(layer: Arc<L>) -> Self {
        Node::Single(layer)
    }

    pub fn multiple<L: MultipleInputsLayer<B>>(layer: Arc<L>) -> Self {
        Node::Multiple(layer)
    }

    pub fn id(&self) -> LayerId {
        match self {
            Node::Single(layer) => layer.base().id(),
            Node::Multiple(layer) => layer.base().id(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Node::Single(layer) => layer.base().name(),
            Node::Multiple(layer) => layer.base().name(),
        }
    }

    /// Name (if any) and identity, for diagnostics.
    pub fn label(&self) -> String {
        layer_label(self.name(), self.id())
    }

    /// Upstream nodes in slot order; slots declared by shape are skipped.
    pub fn upstream(&self) -> Vec<Node<B>> {
        match self {
            Node::Single(layer) => layer.base().input_layer().cloned().into_iter().collect(),
            Node::Multiple(layer) => layer.base().input_layers().iter().flatten().cloned().collect(),
        }
    }

    pub fn output_shape(&self) -> LayerResult<Shape> {
        match self {
            Node::Single(layer) => layer.output_shape(),
            Node::Multiple(layer) => layer.output_shape(),
        }
    }

    pub fn output(&self, inputs: &Overrides<B>, options: &OutputOptions) -> LayerResult<B::Expr> {
        match self {
            Node::Single(layer) => layer.output(inputs, options),
            Node::Multiple(layer) => layer.output(inputs, options),
        }
    }

    pub fn params(&self) -> Option<&ParamStore<B>> {
        match self {
            Node::Single(layer) => Some(layer.base().params()),
            Node::Multiple(layer) => layer.params(),
        }
    }

    pub fn get_params(&self, filter: &TagFilter) -> Vec<Param<B>> {
        match self {
            Node::Single(layer) => layer.get_params(filter),
            Node::Multiple(layer) => layer.get_params(filter),
        }
    }

    pub fn as_single(&self) -> Option<&Arc<dyn Layer<B>>> {
        match self {
            Node::Single(layer) => Some(layer),
            Node::Multiple(_) => None,
        }
    }

    pub fn as_multiple(&self) -> Option<&Arc<dyn MultipleInputsLayer<B>>> {
        match self {
            Node::Single(_) => None,
            Node::Multiple(layer) => Some(layer),
        }
    }
}

impl<B: SymbolicBackend> Clone for Node<B> {
    fn clone(&self) -> Self {
        match self {
            Node::Single(layer) => Node::Single(Arc::clone(layer)),
            Node::Multiple(layer) => Node::Multiple(Arc::clone(layer)),
        }
    }
}

impl<B: SymbolicBackend> PartialEq for Node<B> {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl<B: SymbolicBackend> Eq for Node<B> {}

impl<B: SymbolicBackend> Hash for Node<B> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl<B: SymbolicBackend> fmt::Debug for Node<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Node::Single(_) => "Single",
            Node::Multiple(_) => "Multiple",
        };
        f.debug_struct("Node")
            .field("kind", &kind)
            .field("id", &self.id())
            .field("name", &self.name())
            .finish()
    }
}

/// A lone node is a one-element sink list.
impl<B: SymbolicBackend> AsRef<[Node<B>]> for Node<B> {
    fn as_ref(&self) -> &[Node<B>] {
        std::slice::from_ref(self)
    }
}

/// What feeds one input slot: another node, or the declared shape of an external input.
pub enum Incoming<B: SymbolicBackend> {
    Layer(Node<B>),
    Shape(Shape),
}

impl<B: SymbolicBackend> Incoming<B> {
    /// Shape this slot currently delivers.
    pub fn shape(&self) -> LayerResult<Shape> {
        match self {
            Incoming::Layer(node) => node.output_shape(),
            Incoming::Shape(shape) => Ok(shape.clone()),
        }
    }

    pub fn layer(&self) -> Option<&Node<B>> {
        match self {
            Incoming::Layer(node) => Some(node),
            Incoming::Shape(_) => None,
        }
    }
}

impl<B: SymbolicBackend> Clone for Incoming<B> {
    fn clone(&self) -> Self {
        match self {
            Incoming::Layer(node) => Incoming::Layer(node.clone()),
            Incoming::Shape(shape) => Incoming::Shape(shape.clone()),
        }
    }
}

impl<B: SymbolicBackend> fmt::Debug for Incoming<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Incoming::Layer(node) => f.debug_tuple("Layer").field(node).finish(),
            Incoming::Shape(shape) => f.debug_tuple("Shape").field(shape).finish(),
        }
    }
}

impl<B: SymbolicBackend> From<Node<B>> for Incoming<B> {
    fn from(node: Node<B>) -> Self {
        Incoming::Layer(node)
    }
}

impl<B: SymbolicBackend> From<&Node<B>> for Incoming<B> {
    fn from(node: &Node<B>) -> Self {
        Incoming::Layer(node.clone())
    }
}

impl<B: SymbolicBackend> From<Shape> for Incoming<B> {
    fn from(shape: Shape) -> Self {
        Incoming::Shape(shape)
    }
}
