//! Parameter handles, their tag sets, and per-layer parameter stores.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::backend::SymbolicBackend;
use crate::error::{LayerError, LayerResult};
use crate::init::Initializer;
use crate::layer::InputValue;
use crate::tensor::HostTensor;

/// Tag carried by parameters an optimizer should update.
pub const TRAINABLE: &str = "trainable";
/// Tag carried by parameters weight penalties should apply to.
pub const REGULARIZABLE: &str = "regularizable";

static PARAM_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Process-unique identity of a parameter handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamId(u64);

struct ParamInner<B: SymbolicBackend> {
    id: ParamId,
    backend: Arc<B>,
    slot: B::Slot,
}

/// Shared handle to a backend slot holding one parameter tensor.
///
/// Handles compare by identity: two handles are equal only when they refer to the same
/// allocation, regardless of contents.
pub struct Param<B: SymbolicBackend> {
    inner: Arc<ParamInner<B>>,
}

impl<B: SymbolicBackend> Param<B> {
    /// Allocates a fresh slot holding `value` as-is.
    pub fn shared(backend: &Arc<B>, value: HostTensor, name: Option<&str>) -> LayerResult<Self> {
        let slot = backend.shared(value, name)?;
        Ok(Self {
            inner: Arc::new(ParamInner {
                id: ParamId(PARAM_ID_COUNTER.fetch_add(1, Ordering::Relaxed)),
                backend: Arc::clone(backend),
                slot,
            }),
        })
    }

    /// Allocates a placeholder slot of rank `ndim` (all extents 1) in the backend float dtype.
    pub fn empty(backend: &Arc<B>, ndim: usize) -> LayerResult<Self> {
        let value = HostTensor::zeros(vec![1; ndim], backend.float_dtype());
        Self::shared(backend, value, None)
    }

    pub fn id(&self) -> ParamId {
        self.inner.id
    }

    pub fn name(&self) -> Option<String> {
        self.inner.backend.slot_name(&self.inner.slot)
    }

    pub fn ndim(&self) -> usize {
        self.inner.backend.slot_ndim(&self.inner.slot)
    }

    /// Shape of the current contents.
    pub fn shape(&self) -> Vec<usize> {
        self.inner.backend.slot_shape(&self.inner.slot)
    }

    /// Number of scalar elements in the current contents.
    pub fn num_elements(&self) -> usize {
        self.shape().iter().product()
    }

    pub fn get_value(&self) -> LayerResult<HostTensor> {
        Ok(self.inner.backend.get_value(&self.inner.slot)?)
    }

    pub fn set_value(&self, value: HostTensor) -> LayerResult<()> {
        Ok(self.inner.backend.set_value(&self.inner.slot, value)?)
    }

    /// Expression reading this parameter, for use inside `expr_for`.
    pub fn expr(&self) -> B::Expr {
        self.inner.backend.slot_expr(&self.inner.slot)
    }

    pub fn slot(&self) -> &B::Slot {
        &self.inner.slot
    }
}

impl<B: SymbolicBackend> Clone for Param<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: SymbolicBackend> PartialEq for Param<B> {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl<B: SymbolicBackend> Eq for Param<B> {}

impl<B: SymbolicBackend> Hash for Param<B> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl<B: SymbolicBackend> fmt::Debug for Param<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Param")
            .field("id", &self.inner.id.0)
            .field("name", &self.name())
            .field("slot", &self.inner.slot)
            .finish()
    }
}

/// Where a new parameter's storage comes from.
pub enum ParamSpec<B: SymbolicBackend> {
    /// Initial values; the array must match the requested shape exactly.
    Literal(HostTensor),
    /// An existing handle, reused as-is; only its rank is checked.
    Shared(Param<B>),
    /// Called with the requested shape to produce initial values.
    Initializer(Box<dyn Initializer>),
}

impl<B: SymbolicBackend> ParamSpec<B> {
    pub fn initializer(init: impl Initializer + 'static) -> Self {
        ParamSpec::Initializer(Box::new(init))
    }

    /// Materializes the spec into a handle of the requested shape.
    ///
    /// `name` is ignored for [`ParamSpec::Shared`], whose handle keeps whatever name it has.
    pub fn create(self, backend: &Arc<B>, shape: &[usize], name: Option<&str>) -> LayerResult<Param<B>> {
        match self {
            ParamSpec::Shared(param) => {
                let ndim = param.ndim();
                if ndim != shape.len() {
                    return Err(LayerError::DimensionMismatch {
                        expected: shape.len(),
                        found: ndim,
                    });
                }
                Ok(param)
            }
            ParamSpec::Literal(array) => {
                if array.shape() != shape {
                    return Err(LayerError::ShapeMismatch {
                        expected: shape.to_vec(),
                        found: array.shape().to_vec(),
                    });
                }
                Param::shared(backend, array.float_x(backend.float_dtype()), name)
            }
            ParamSpec::Initializer(init) => {
                let array = init.sample(shape).map_err(LayerError::InvalidInitializer)?;
                Param::shared(backend, array.float_x(backend.float_dtype()), name)
            }
        }
    }
}

impl<B: SymbolicBackend> From<HostTensor> for ParamSpec<B> {
    fn from(array: HostTensor) -> Self {
        ParamSpec::Literal(array)
    }
}

impl<B: SymbolicBackend> From<Param<B>> for ParamSpec<B> {
    fn from(param: Param<B>) -> Self {
        ParamSpec::Shared(param)
    }
}

impl<B: SymbolicBackend> From<&Param<B>> for ParamSpec<B> {
    fn from(param: &Param<B>) -> Self {
        ParamSpec::Shared(param.clone())
    }
}

impl<B: SymbolicBackend> TryFrom<InputValue<B>> for ParamSpec<B> {
    type Error = LayerError;

    fn try_from(value: InputValue<B>) -> Result<Self, Self::Error> {
        match value {
            InputValue::Array(array) => Ok(ParamSpec::Literal(array)),
            InputValue::Scalar(_) => Err(LayerError::UnsupportedSpec(
                "a raw scalar is not an array, a shared variable, or an initializer".to_string(),
            )),
            InputValue::Expr(_) => Err(LayerError::UnsupportedSpec(
                "a symbolic expression is not an array, a shared variable, or an initializer"
                    .to_string(),
            )),
        }
    }
}

impl<B: SymbolicBackend> fmt::Debug for ParamSpec<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamSpec::Literal(array) => f.debug_tuple("Literal").field(&array.shape()).finish(),
            ParamSpec::Shared(param) => f.debug_tuple("Shared").field(param).finish(),
            ParamSpec::Initializer(_) => f.write_str("Initializer"),
        }
    }
}

/// Tag overrides passed to [`LayerBase::add_param`](crate::layer::LayerBase::add_param).
///
/// `trainable` and `regularizable` default to `true`; the resulting tag set holds every tag
/// whose value is `true`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamTags {
    values: BTreeMap<String, bool>,
}

impl ParamTags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, tag: impl Into<String>, value: bool) -> Self {
        self.values.insert(tag.into(), value);
        self
    }

    pub fn trainable(self, value: bool) -> Self {
        self.with(TRAINABLE, value)
    }

    pub fn regularizable(self, value: bool) -> Self {
        self.with(REGULARIZABLE, value)
    }

    /// Resolves the overrides into the final tag set.
    pub fn resolve(&self) -> BTreeSet<String> {
        let mut values = self.values.clone();
        values.entry(TRAINABLE.to_string()).or_insert(true);
        values.entry(REGULARIZABLE.to_string()).or_insert(true);
        values
            .into_iter()
            .filter_map(|(tag, value)| value.then_some(tag))
            .collect()
    }
}

impl<S: Into<String>, const N: usize> From<[(S, bool); N]> for ParamTags {
    fn from(tags: [(S, bool); N]) -> Self {
        tags.into_iter()
            .fold(ParamTags::new(), |acc, (tag, value)| acc.with(tag, value))
    }
}

/// Tag-based parameter selection.
///
/// Tags mapped to `true` must all be present; tags mapped to `false` must all be absent.
/// The empty filter selects everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilter {
    values: BTreeMap<String, bool>,
}

impl TagFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, tag: impl Into<String>, value: bool) -> Self {
        self.values.insert(tag.into(), value);
        self
    }

    /// Selects parameters carrying `tag`.
    pub fn only(tag: impl Into<String>) -> Self {
        Self::new().with(tag, true)
    }

    /// Selects parameters not carrying `tag`.
    pub fn exclude(tag: impl Into<String>) -> Self {
        Self::new().with(tag, false)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn matches(&self, tags: &BTreeSet<String>) -> bool {
        self.values
            .iter()
            .all(|(tag, &wanted)| tags.contains(tag) == wanted)
    }
}

impl<S: Into<String>, const N: usize> From<[(S, bool); N]> for TagFilter {
    fn from(tags: [(S, bool); N]) -> Self {
        tags.into_iter()
            .fold(TagFilter::new(), |acc, (tag, value)| acc.with(tag, value))
    }
}

/// Insertion-ordered mapping from parameter handle to its tag set.
pub struct ParamStore<B: SymbolicBackend> {
    entries: Vec<(Param<B>, BTreeSet<String>)>,
}

impl<B: SymbolicBackend> ParamStore<B> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Registers `param`; re-registering an existing handle replaces its tags in place.
    pub fn insert(&mut self, param: Param<B>, tags: BTreeSet<String>) {
        match self.entries.iter_mut().find(|(existing, _)| *existing == param) {
            Some((_, existing_tags)) => *existing_tags = tags,
            None => self.entries.push((param, tags)),
        }
    }

    pub fn tags(&self, param: &Param<B>) -> Option<&BTreeSet<String>> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == param)
            .map(|(_, tags)| tags)
    }

    pub fn contains(&self, param: &Param<B>) -> bool {
        self.tags(param).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Param<B>, &BTreeSet<String>)> {
        self.entries.iter().map(|(param, tags)| (param, tags))
    }

    /// Handles matching `filter`, in insertion order.
    pub fn params(&self, filter: &TagFilter) -> Vec<Param<B>> {
        self.entries
            .iter()
            .filter(|(_, tags)| filter.matches(tags))
            .map(|(param, _)| param.clone())
            .collect()
    }
}

impl<B: SymbolicBackend> Default for ParamStore<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: SymbolicBackend> fmt::Debug for ParamStore<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(param, tags)| (param.id().0, tags)))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::backend::BackendResult;
    use crate::tensor::DType;

    #[derive(Debug, Clone)]
    struct CellSlot(Arc<Mutex<(Option<String>, HostTensor)>>);

    impl CellSlot {
        fn value(&self) -> HostTensor {
            self.0.lock().unwrap().1.clone()
        }
    }

    /// Host-only backend whose expressions are the values themselves.
    struct CellBackend {
        float_dtype: DType,
    }

    impl SymbolicBackend for CellBackend {
        type Expr = HostTensor;
        type Slot = CellSlot;

        fn backend_name(&self) -> &str {
            "cell"
        }

        fn float_dtype(&self) -> DType {
            self.float_dtype
        }

        fn constant(&self, value: &HostTensor) -> BackendResult<HostTensor> {
            Ok(value.clone())
        }

        fn variable(&self, _name: Option<&str>, ndim: usize) -> BackendResult<HostTensor> {
            Ok(HostTensor::zeros(vec![1; ndim], self.float_dtype))
        }

        fn shared(&self, value: HostTensor, name: Option<&str>) -> BackendResult<CellSlot> {
            Ok(CellSlot(Arc::new(Mutex::new((name.map(str::to_string), value)))))
        }

        fn slot_ndim(&self, slot: &CellSlot) -> usize {
            slot.value().ndim()
        }

        fn slot_shape(&self, slot: &CellSlot) -> Vec<usize> {
            slot.value().shape().to_vec()
        }

        fn slot_name(&self, slot: &CellSlot) -> Option<String> {
            slot.0.lock().unwrap().0.clone()
        }

        fn get_value(&self, slot: &CellSlot) -> BackendResult<HostTensor> {
            Ok(slot.value())
        }

        fn set_value(&self, slot: &CellSlot, value: HostTensor) -> BackendResult<()> {
            slot.0.lock().unwrap().1 = value;
            Ok(())
        }

        fn slot_expr(&self, slot: &CellSlot) -> HostTensor {
            slot.value()
        }
    }

    fn cell_backend(float_dtype: DType) -> Arc<CellBackend> {
        Arc::new(CellBackend { float_dtype })
    }

    fn tags(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn default_tags_are_trainable_and_regularizable() {
        assert_eq!(ParamTags::new().resolve(), tags(&[TRAINABLE, REGULARIZABLE]));
        assert_eq!(
            ParamTags::new().trainable(false).resolve(),
            tags(&[REGULARIZABLE])
        );
        assert_eq!(
            ParamTags::from([("tag1", true), ("tag2", false)]).resolve(),
            tags(&["tag1", TRAINABLE, REGULARIZABLE])
        );
    }

    #[test]
    fn filters_compose_inclusion_and_exclusion() {
        let a = tags(&["tag1"]);
        let b = tags(&["tag1", "tag2"]);
        let c = tags(&["tag2"]);

        let only_tag1 = TagFilter::only("tag1");
        assert!(only_tag1.matches(&a) && only_tag1.matches(&b) && !only_tag1.matches(&c));

        let not_tag2 = TagFilter::exclude("tag2");
        assert!(not_tag2.matches(&a) && !not_tag2.matches(&b) && !not_tag2.matches(&c));

        let both = TagFilter::from([("tag1", true), ("tag2", true)]);
        assert!(!both.matches(&a) && both.matches(&b) && !both.matches(&c));

        let mixed = TagFilter::from([("tag1", true), ("tag2", false)]);
        assert!(mixed.matches(&a) && !mixed.matches(&b) && !mixed.matches(&c));

        assert!(TagFilter::new().matches(&BTreeSet::new()));
    }

    #[test]
    fn empty_params_are_unit_extent_placeholders() {
        for float_dtype in [DType::F32, DType::F64] {
            let backend = cell_backend(float_dtype);
            let param = Param::empty(&backend, 3).unwrap();
            assert_eq!(param.ndim(), 3);
            assert_eq!(param.shape(), vec![1, 1, 1]);
            assert_eq!(param.num_elements(), 1);
            assert_eq!(param.name(), None);

            let value = param.get_value().unwrap();
            assert_eq!(value.dtype(), backend.float_dtype());
            assert_eq!(value.to_f64_vec(), vec![0.0]);
        }

        let scalar = Param::empty(&cell_backend(DType::F32), 0).unwrap();
        assert_eq!(scalar.ndim(), 0);
        assert!(scalar.shape().is_empty());
    }

    #[test]
    fn slot_is_shared_by_clones() {
        let backend = cell_backend(DType::F32);
        let param = Param::shared(&backend, HostTensor::zeros([2usize], DType::F32), Some("w"))
            .unwrap();
        let alias = param.clone();
        let updated = HostTensor::full([2usize], 4.0, DType::F32);
        alias.set_value(updated.clone()).unwrap();

        assert_eq!(param, alias);
        assert_eq!(param.slot().value(), updated);
        assert_eq!(alias.slot().value(), updated);
        assert_eq!(param.expr(), updated);
        assert_eq!(param.name().as_deref(), Some("w"));
    }
}
