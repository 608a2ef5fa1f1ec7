use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use layergraph::backend::{BackendError, BackendResult, SymbolicBackend};
use layergraph::tensor::{DType, HostTensor};

use crate::kernels;

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Identity of a free variable created by [`RefBackend::variable`](SymbolicBackend::variable).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VarId(u64);

/// Values bound to free variables during evaluation.
pub type Bindings = HashMap<VarId, HostTensor>;

struct SlotInner {
    id: u64,
    name: Option<String>,
    value: RwLock<HostTensor>,
}

/// Mutable storage cell; clones share the same storage.
#[derive(Clone)]
pub struct RefSlot {
    inner: Arc<SlotInner>,
}

impl RefSlot {
    fn new(value: HostTensor, name: Option<&str>) -> Self {
        Self {
            inner: Arc::new(SlotInner {
                id: next_id(),
                name: name.map(str::to_string),
                value: RwLock::new(value),
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HostTensor> {
        self.inner
            .value
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HostTensor> {
        self.inner
            .value
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    pub fn value(&self) -> HostTensor {
        self.read().clone()
    }
}

impl PartialEq for RefSlot {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl fmt::Debug for RefSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.read();
        f.debug_struct("RefSlot")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("shape", &value.shape())
            .field("dtype", &value.dtype())
            .finish()
    }
}

/// Symbolic expression tree.
#[derive(Clone, Debug, PartialEq)]
pub enum RefExpr {
    Constant(Arc<HostTensor>),
    Variable {
        id: VarId,
        name: Option<String>,
        ndim: usize,
    },
    Slot(RefSlot),
    Dot(Arc<RefExpr>, Arc<RefExpr>),
    Add(Arc<RefExpr>, Arc<RefExpr>),
    Flatten(Arc<RefExpr>, usize),
}

impl RefExpr {
    /// Identity of the expression when it is a free variable.
    pub fn var_id(&self) -> Option<VarId> {
        match self {
            RefExpr::Variable { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// Evaluates the tree on the host, reading slots at their current values.
    pub fn eval(&self, bindings: &Bindings) -> BackendResult<HostTensor> {
        match self {
            RefExpr::Constant(value) => Ok(value.as_ref().clone()),
            RefExpr::Variable { id, name, ndim } => {
                let value = bindings.get(id).ok_or_else(|| {
                    BackendError::execution(format!(
                        "no value bound to variable {}",
                        name.as_deref().unwrap_or("<unnamed>")
                    ))
                })?;
                if value.ndim() != *ndim {
                    return Err(BackendError::invalid_value(format!(
                        "variable expects {ndim} dimensions, got shape {:?}",
                        value.shape()
                    )));
                }
                Ok(value.clone())
            }
            RefExpr::Slot(slot) => Ok(slot.value()),
            RefExpr::Dot(lhs, rhs) => kernels::matmul(&lhs.eval(bindings)?, &rhs.eval(bindings)?),
            RefExpr::Add(lhs, rhs) => kernels::add(&lhs.eval(bindings)?, &rhs.eval(bindings)?),
            RefExpr::Flatten(expr, outdim) => kernels::flatten(&expr.eval(bindings)?, *outdim),
        }
    }
}

/// Backend building [`RefExpr`] trees.
#[derive(Debug, Default)]
pub struct RefBackend {
    float_dtype: Option<DType>,
}

impl RefBackend {
    /// Uses the process-wide float dtype from `LAYERGRAPH_FLOATX`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins the float dtype regardless of the environment.
    pub fn with_float_dtype(dtype: DType) -> Self {
        Self {
            float_dtype: Some(dtype),
        }
    }
}

impl SymbolicBackend for RefBackend {
    type Expr = RefExpr;
    type Slot = RefSlot;

    fn backend_name(&self) -> &str {
        "ref"
    }

    fn float_dtype(&self) -> DType {
        self.float_dtype.unwrap_or_else(layergraph::float_x)
    }

    fn constant(&self, value: &HostTensor) -> BackendResult<RefExpr> {
        Ok(RefExpr::Constant(Arc::new(value.clone())))
    }

    fn variable(&self, name: Option<&str>, ndim: usize) -> BackendResult<RefExpr> {
        Ok(RefExpr::Variable {
            id: VarId(next_id()),
            name: name.map(str::to_string),
            ndim,
        })
    }

    fn shared(&self, value: HostTensor, name: Option<&str>) -> BackendResult<RefSlot> {
        log::trace!("allocating slot {:?} {:?}", name, value.shape());
        Ok(RefSlot::new(value, name))
    }

    fn slot_ndim(&self, slot: &RefSlot) -> usize {
        slot.read().ndim()
    }

    fn slot_shape(&self, slot: &RefSlot) -> Vec<usize> {
        slot.read().shape().to_vec()
    }

    fn slot_name(&self, slot: &RefSlot) -> Option<String> {
        slot.name().map(str::to_string)
    }

    fn get_value(&self, slot: &RefSlot) -> BackendResult<HostTensor> {
        Ok(slot.value())
    }

    fn set_value(&self, slot: &RefSlot, value: HostTensor) -> BackendResult<()> {
        *slot.write() = value;
        Ok(())
    }

    fn slot_expr(&self, slot: &RefSlot) -> RefExpr {
        RefExpr::Slot(slot.clone())
    }

    fn dot(&self, lhs: &RefExpr, rhs: &RefExpr) -> BackendResult<RefExpr> {
        Ok(RefExpr::Dot(Arc::new(lhs.clone()), Arc::new(rhs.clone())))
    }

    fn add(&self, lhs: &RefExpr, rhs: &RefExpr) -> BackendResult<RefExpr> {
        Ok(RefExpr::Add(Arc::new(lhs.clone()), Arc::new(rhs.clone())))
    }

    fn flatten(&self, expr: &RefExpr, outdim: usize) -> BackendResult<RefExpr> {
        if outdim == 0 {
            return Err(BackendError::invalid_value("flatten needs outdim >= 1"));
        }
        Ok(RefExpr::Flatten(Arc::new(expr.clone()), outdim))
    }
}
