//! Dense host tensor used for literals, snapshots, and tests.

use anyhow::{bail, Result};

use super::dtype::DType;

/// Typed element storage of a [`HostTensor`].
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    F32(Vec<f32>),
    F64(Vec<f64>),
    I32(Vec<i32>),
}

impl TensorData {
    fn len(&self) -> usize {
        match self {
            TensorData::F32(values) => values.len(),
            TensorData::F64(values) => values.len(),
            TensorData::I32(values) => values.len(),
        }
    }

    fn dtype(&self) -> DType {
        match self {
            TensorData::F32(_) => DType::F32,
            TensorData::F64(_) => DType::F64,
            TensorData::I32(_) => DType::I32,
        }
    }
}

/// Row-major host array with a concrete shape.
///
/// A rank-0 tensor (empty shape) holds exactly one element and represents a raw scalar.
#[derive(Debug, Clone, PartialEq)]
pub struct HostTensor {
    shape: Vec<usize>,
    data: TensorData,
}

impl HostTensor {
    /// Wraps typed storage, validating the element count against the shape.
    pub fn new(shape: impl Into<Vec<usize>>, data: TensorData) -> Result<Self> {
        let shape = shape.into();
        let expected = element_count(&shape);
        if data.len() != expected {
            bail!(
                "tensor data length ({}) does not match shape {:?}",
                data.len(),
                shape
            );
        }
        Ok(Self { shape, data })
    }

    /// Constructs an `F32` tensor from raw values.
    pub fn from_f32(shape: impl Into<Vec<usize>>, data: Vec<f32>) -> Result<Self> {
        Self::new(shape, TensorData::F32(data))
    }

    /// Constructs an `F64` tensor from raw values.
    pub fn from_f64(shape: impl Into<Vec<usize>>, data: Vec<f64>) -> Result<Self> {
        Self::new(shape, TensorData::F64(data))
    }

    /// Constructs an `I32` tensor from raw values.
    pub fn from_i32(shape: impl Into<Vec<usize>>, data: Vec<i32>) -> Result<Self> {
        Self::new(shape, TensorData::I32(data))
    }

    /// Builds a tensor of `dtype` by evaluating `f` at every flat index.
    pub fn from_fn<F>(shape: impl Into<Vec<usize>>, dtype: DType, mut f: F) -> Self
    where
        F: FnMut(usize) -> f64,
    {
        let shape = shape.into();
        let len = element_count(&shape);
        let data = match dtype {
            DType::F32 => TensorData::F32((0..len).map(|i| f(i) as f32).collect()),
            DType::F64 => TensorData::F64((0..len).map(&mut f).collect()),
            DType::I32 => TensorData::I32((0..len).map(|i| f(i) as i32).collect()),
        };
        Self { shape, data }
    }

    /// Returns a tensor of `dtype` filled with `value`.
    pub fn full(shape: impl Into<Vec<usize>>, value: f64, dtype: DType) -> Self {
        Self::from_fn(shape, dtype, |_| value)
    }

    /// Returns a zero-initialized tensor of `dtype`.
    pub fn zeros(shape: impl Into<Vec<usize>>, dtype: DType) -> Self {
        Self::full(shape, 0.0, dtype)
    }

    /// Wraps a raw scalar as a rank-0 `F64` tensor.
    pub fn scalar(value: f64) -> Self {
        Self {
            shape: Vec::new(),
            data: TensorData::F64(vec![value]),
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of axes.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Total number of scalar elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    pub fn data(&self) -> &TensorData {
        &self.data
    }

    /// Borrows the elements as `f32` when stored as `F32`.
    pub fn as_f32(&self) -> Option<&[f32]> {
        match &self.data {
            TensorData::F32(values) => Some(values),
            _ => None,
        }
    }

    /// Borrows the elements as `f64` when stored as `F64`.
    pub fn as_f64(&self) -> Option<&[f64]> {
        match &self.data {
            TensorData::F64(values) => Some(values),
            _ => None,
        }
    }

    /// Copies every element out as `f64`, whatever the storage dtype.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match &self.data {
            TensorData::F32(values) => values.iter().map(|&v| f64::from(v)).collect(),
            TensorData::F64(values) => values.clone(),
            TensorData::I32(values) => values.iter().map(|&v| f64::from(v)).collect(),
        }
    }

    /// Converts the tensor contents into another dtype.
    ///
    /// Conversions to `I32` truncate toward zero.
    pub fn astype(&self, dtype: DType) -> Self {
        if self.dtype() == dtype {
            return self.clone();
        }
        let values = self.to_f64_vec();
        let data = match dtype {
            DType::F32 => TensorData::F32(values.iter().map(|&v| v as f32).collect()),
            DType::F64 => TensorData::F64(values),
            DType::I32 => TensorData::I32(values.iter().map(|&v| v as i32).collect()),
        };
        Self {
            shape: self.shape.clone(),
            data,
        }
    }

    /// Normalizes the tensor to the backend's default float dtype.
    pub fn float_x(&self, float_dtype: DType) -> Self {
        self.astype(float_dtype)
    }

    /// Returns a copy with a new shape holding the same number of elements.
    pub fn reshape(&self, shape: impl Into<Vec<usize>>) -> Result<Self> {
        let shape = shape.into();
        if element_count(&shape) != self.len() {
            bail!(
                "cannot reshape tensor of shape {:?} into {:?}",
                self.shape,
                shape
            );
        }
        Ok(Self {
            shape,
            data: self.data.clone(),
        })
    }

    /// Element-wise comparison within an absolute tolerance; shapes must match exactly.
    pub fn allclose(&self, other: &HostTensor, atol: f64) -> bool {
        self.shape == other.shape
            && self
                .to_f64_vec()
                .iter()
                .zip(other.to_f64_vec())
                .all(|(a, b)| (a - b).abs() <= atol)
    }
}

pub(crate) fn element_count(shape: &[usize]) -> usize {
    shape.iter().product()
}
