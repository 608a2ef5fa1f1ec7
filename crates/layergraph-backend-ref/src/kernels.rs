//! Host kernels behind [`RefExpr::eval`](crate::RefExpr::eval).

use layergraph::backend::{BackendError, BackendResult};
use layergraph::tensor::{DType, HostTensor};

/// `F32` when both operands are `F32`, `F64` otherwise.
fn result_dtype(lhs: &HostTensor, rhs: &HostTensor) -> DType {
    match (lhs.dtype(), rhs.dtype()) {
        (DType::F32, DType::F32) => DType::F32,
        _ => DType::F64,
    }
}

pub(crate) fn matmul(lhs: &HostTensor, rhs: &HostTensor) -> BackendResult<HostTensor> {
    let (&[m, k], &[k2, n]) = (lhs.shape(), rhs.shape()) else {
        return Err(BackendError::invalid_value(format!(
            "dot expects two matrices, got shapes {:?} and {:?}",
            lhs.shape(),
            rhs.shape()
        )));
    };
    if k != k2 {
        return Err(BackendError::invalid_value(format!(
            "dot inner dimensions differ: {:?} vs {:?}",
            lhs.shape(),
            rhs.shape()
        )));
    }
    let a = lhs.to_f64_vec();
    let b = rhs.to_f64_vec();
    let mut out = vec![0.0f64; m * n];
    for i in 0..m {
        for p in 0..k {
            let a_ip = a[i * k + p];
            for j in 0..n {
                out[i * n + j] += a_ip * b[p * n + j];
            }
        }
    }
    Ok(HostTensor::from_fn([m, n], result_dtype(lhs, rhs), |i| out[i]))
}

fn broadcast_shape(lhs: &[usize], rhs: &[usize]) -> BackendResult<Vec<usize>> {
    let rank = lhs.len().max(rhs.len());
    let mut out = vec![0; rank];
    for axis in 0..rank {
        let l = axis_extent(lhs, rank, axis);
        let r = axis_extent(rhs, rank, axis);
        out[axis] = match (l, r) {
            (l, r) if l == r => l,
            (1, r) => r,
            (l, 1) => l,
            _ => {
                return Err(BackendError::invalid_value(format!(
                    "shapes {lhs:?} and {rhs:?} cannot be broadcast together"
                )))
            }
        };
    }
    Ok(out)
}

/// Extent of `shape` at `axis` once right-aligned to `rank` axes.
fn axis_extent(shape: &[usize], rank: usize, axis: usize) -> usize {
    let offset = rank - shape.len();
    if axis < offset {
        1
    } else {
        shape[axis - offset]
    }
}

/// Flat source index of the element at `flat` in an array of `out_shape`.
fn broadcast_index(flat: usize, out_shape: &[usize], src_shape: &[usize]) -> usize {
    let rank = out_shape.len();
    let mut remaining = flat;
    let mut index = 0;
    let mut stride = 1;
    for axis in (0..rank).rev() {
        let coord = remaining % out_shape[axis];
        remaining /= out_shape[axis];
        let extent = axis_extent(src_shape, rank, axis);
        if axis >= rank - src_shape.len() {
            if extent != 1 {
                index += coord * stride;
            }
            stride *= extent;
        }
    }
    index
}

/// Element-wise sum with NumPy-style broadcasting.
pub(crate) fn add(lhs: &HostTensor, rhs: &HostTensor) -> BackendResult<HostTensor> {
    let out_shape = broadcast_shape(lhs.shape(), rhs.shape())?;
    let a = lhs.to_f64_vec();
    let b = rhs.to_f64_vec();
    let dtype = result_dtype(lhs, rhs);
    Ok(HostTensor::from_fn(out_shape.clone(), dtype, |i| {
        a[broadcast_index(i, &out_shape, lhs.shape())] + b[broadcast_index(i, &out_shape, rhs.shape())]
    }))
}

/// Keeps the first `outdim - 1` axes and collapses the rest into one.
pub(crate) fn flatten(value: &HostTensor, outdim: usize) -> BackendResult<HostTensor> {
    let shape = value.shape();
    if outdim == 0 || outdim > shape.len().max(1) {
        return Err(BackendError::invalid_value(format!(
            "cannot flatten shape {shape:?} to {outdim} dimensions"
        )));
    }
    let mut out_shape: Vec<usize> = shape[..outdim - 1].to_vec();
    out_shape.push(shape[outdim - 1..].iter().product());
    value
        .reshape(out_shape)
        .map_err(|err| BackendError::execution(err.to_string()))
}
