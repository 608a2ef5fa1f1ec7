use anyhow::{bail, Result};

use super::{DType, HostTensor};

/// Computes incoming weight vector norms.
///
/// Without `norm_axes`, a 2-D array (dense weights) is reduced over axis 0 and 3-D to 5-D
/// arrays (convolution filters) are reduced over every axis but the first. Other ranks require
/// explicit axes.
pub fn compute_norms(array: &HostTensor, norm_axes: Option<&[usize]>) -> Result<HostTensor> {
    let ndim = array.ndim();
    let sum_over: Vec<usize> = match norm_axes {
        Some(axes) => axes.to_vec(),
        None if ndim == 2 => vec![0],
        None if (3..=5).contains(&ndim) => (1..ndim).collect(),
        None => bail!("unsupported tensor dimensionality {ndim}; must specify norm axes"),
    };
    if let Some(axis) = sum_over.iter().find(|&&axis| axis >= ndim) {
        bail!("norm axis {axis} is out of range for a {ndim}-d array");
    }
    if let Some((i, axis)) = sum_over
        .iter()
        .enumerate()
        .find(|&(i, axis)| sum_over[..i].contains(axis))
    {
        bail!("norm axis {axis} is repeated at position {i}");
    }

    let dims = array.shape();
    let kept: Vec<usize> = (0..ndim).filter(|axis| !sum_over.contains(axis)).collect();
    let out_shape: Vec<usize> = kept.iter().map(|&axis| dims[axis]).collect();
    let out_len: usize = out_shape.iter().product();

    let mut strides = vec![1usize; ndim];
    for axis in (0..ndim.saturating_sub(1)).rev() {
        strides[axis] = strides[axis + 1] * dims[axis + 1];
    }
    let mut out_strides = vec![1usize; kept.len()];
    for i in (0..kept.len().saturating_sub(1)).rev() {
        out_strides[i] = out_strides[i + 1] * out_shape[i + 1];
    }

    let mut sums = vec![0.0f64; out_len];
    for (flat, value) in array.to_f64_vec().into_iter().enumerate() {
        let mut out_index = 0;
        for (i, &axis) in kept.iter().enumerate() {
            let coord = (flat / strides[axis]) % dims[axis];
            out_index += coord * out_strides[i];
        }
        sums[out_index] += value * value;
    }

    let dtype = if array.dtype().is_float() {
        array.dtype()
    } else {
        DType::F64
    };
    Ok(HostTensor::from_fn(out_shape, dtype, |i| sums[i].sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_weights_reduce_over_first_axis() {
        let array = HostTensor::from_f64([2, 3], vec![3.0, 0.0, 1.0, 4.0, 2.0, 1.0]).unwrap();
        let norms = compute_norms(&array, None).unwrap();
        assert_eq!(norms.shape(), &[3]);
        assert!(norms.allclose(
            &HostTensor::from_f64([3], vec![5.0, 2.0, 2f64.sqrt()]).unwrap(),
            1e-12
        ));
    }

    #[test]
    fn explicit_axes_override_default() {
        let array = HostTensor::from_f64([2, 2], vec![3.0, 4.0, 0.0, 1.0]).unwrap();
        let norms = compute_norms(&array, Some(&[1])).unwrap();
        assert!(norms.allclose(&HostTensor::from_f64([2], vec![5.0, 1.0]).unwrap(), 1e-12));
    }

    #[test]
    fn conv_filters_keep_leading_axis() {
        let array = HostTensor::full([4, 2, 3, 3], 1.0, DType::F32);
        let norms = compute_norms(&array, None).unwrap();
        assert_eq!(norms.shape(), &[4]);
        assert_eq!(norms.dtype(), DType::F32);
        assert!(norms.allclose(&HostTensor::full([4], 18f64.sqrt(), DType::F32), 1e-6));
    }

    #[test]
    fn vectors_need_explicit_axes() {
        let array = HostTensor::zeros([5], DType::F32);
        assert!(compute_norms(&array, None).is_err());
        assert!(compute_norms(&array, Some(&[1])).is_err());
    }

    #[test]
    fn repeated_axes_are_rejected() {
        let array = HostTensor::zeros([2, 3, 4], DType::F32);
        let err = compute_norms(&array, Some(&[1, 2, 1])).unwrap_err();
        assert!(err.to_string().contains("repeated"));
        assert!(compute_norms(&array, Some(&[1, 2])).is_ok());
    }
}
