//! Parameter initializers usable as [`ParamSpec::Initializer`](crate::params::ParamSpec).
//!
//! An initializer receives the requested parameter shape and returns a host array; the array
//! is normalized to the backend float dtype before a slot is allocated for it.

use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::tensor::{DType, HostTensor};

/// Produces initial parameter values for a requested shape.
pub trait Initializer: Send + Sync {
    fn sample(&self, shape: &[usize]) -> Result<HostTensor>;
}

impl<F> Initializer for F
where
    F: Fn(&[usize]) -> Result<HostTensor> + Send + Sync,
{
    fn sample(&self, shape: &[usize]) -> Result<HostTensor> {
        self(shape)
    }
}

/// Fills every element with the same value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constant {
    pub val: f64,
}

impl Constant {
    pub fn new(val: f64) -> Self {
        Self { val }
    }
}

impl Default for Constant {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl Initializer for Constant {
    fn sample(&self, shape: &[usize]) -> Result<HostTensor> {
        Ok(HostTensor::full(shape, self.val, DType::F64))
    }
}

fn seeded(seed: Option<u64>) -> Mutex<StdRng> {
    Mutex::new(match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    })
}

fn with_rng<T>(rng: &Mutex<StdRng>, f: impl FnOnce(&mut StdRng) -> T) -> Result<T> {
    let mut guard = rng
        .lock()
        .map_err(|_| anyhow!("initializer random state is poisoned"))?;
    Ok(f(&mut guard))
}

/// Samples from `N(mean, std^2)` using the Box-Muller transform.
#[derive(Debug)]
pub struct Normal {
    pub std: f64,
    pub mean: f64,
    rng: Mutex<StdRng>,
}

impl Normal {
    pub fn new(std: f64, mean: f64) -> Self {
        Self {
            std,
            mean,
            rng: seeded(None),
        }
    }

    /// Same distribution with a reproducible random stream.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = seeded(Some(seed));
        self
    }
}

impl Default for Normal {
    fn default() -> Self {
        Self::new(0.01, 0.0)
    }
}

impl Initializer for Normal {
    fn sample(&self, shape: &[usize]) -> Result<HostTensor> {
        let len: usize = shape.iter().product();
        let values = with_rng(&self.rng, |rng| {
            let mut values = Vec::with_capacity(len);
            while values.len() < len {
                let u1: f64 = rng.gen::<f64>().max(f64::MIN_POSITIVE);
                let u2: f64 = rng.gen::<f64>();
                let r = (-2.0 * u1.ln()).sqrt();
                let theta = 2.0 * std::f64::consts::PI * u2;
                values.push(self.mean + r * theta.cos() * self.std);
                if values.len() < len {
                    values.push(self.mean + r * theta.sin() * self.std);
                }
            }
            values
        })?;
        HostTensor::from_f64(shape, values)
    }
}

/// Samples uniformly from `[low, high)`.
#[derive(Debug)]
pub struct Uniform {
    pub low: f64,
    pub high: f64,
    rng: Mutex<StdRng>,
}

impl Uniform {
    pub fn new(low: f64, high: f64) -> Self {
        Self {
            low,
            high,
            rng: seeded(None),
        }
    }

    /// Symmetric range `[-range, range)`.
    pub fn symmetric(range: f64) -> Self {
        Self::new(-range, range)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = seeded(Some(seed));
        self
    }
}

impl Default for Uniform {
    fn default() -> Self {
        Self::symmetric(0.01)
    }
}

fn uniform_tensor(rng: &Mutex<StdRng>, shape: &[usize], low: f64, high: f64) -> Result<HostTensor> {
    if !(low < high) {
        bail!("uniform range [{low}, {high}) is empty");
    }
    let len: usize = shape.iter().product();
    let values = with_rng(rng, |rng| {
        (0..len).map(|_| rng.gen_range(low..high)).collect::<Vec<f64>>()
    })?;
    HostTensor::from_f64(shape, values)
}

impl Initializer for Uniform {
    fn sample(&self, shape: &[usize]) -> Result<HostTensor> {
        uniform_tensor(&self.rng, shape, self.low, self.high)
    }
}

/// Glorot/Xavier uniform initialization.
///
/// Fan-in and fan-out are the first two axes scaled by the receptive field size (the product
/// of the remaining axes), so the same initializer covers dense and convolution weights.
#[derive(Debug)]
pub struct GlorotUniform {
    pub gain: f64,
    rng: Mutex<StdRng>,
}

impl GlorotUniform {
    pub fn new(gain: f64) -> Self {
        Self {
            gain,
            rng: seeded(None),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = seeded(Some(seed));
        self
    }
}

impl Default for GlorotUniform {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Initializer for GlorotUniform {
    fn sample(&self, shape: &[usize]) -> Result<HostTensor> {
        if shape.len() < 2 {
            bail!("glorot initialization only works with shapes of length >= 2, got {shape:?}");
        }
        let receptive_field: usize = shape[2..].iter().product();
        let fan_in = (shape[0] * receptive_field) as f64;
        let fan_out = (shape[1] * receptive_field) as f64;
        if fan_in + fan_out == 0.0 {
            bail!("glorot initialization needs a non-empty shape, got {shape:?}");
        }
        let std = self.gain * (2.0 / (fan_in + fan_out)).sqrt();
        let bound = 3f64.sqrt() * std;
        uniform_tensor(&self.rng, shape, -bound, bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_initializers_are_reproducible() {
        let a = GlorotUniform::default().with_seed(7).sample(&[4, 3]).unwrap();
        let b = GlorotUniform::default().with_seed(7).sample(&[4, 3]).unwrap();
        assert_eq!(a, b);

        let a = Normal::default().with_seed(3).sample(&[5]).unwrap();
        let b = Normal::default().with_seed(3).sample(&[5]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.shape(), &[5]);
    }

    #[test]
    fn glorot_respects_its_bound() {
        let shape = [20usize, 30];
        let bound = 3f64.sqrt() * (2.0f64 / 50.0).sqrt();
        let values = GlorotUniform::default()
            .with_seed(11)
            .sample(&shape)
            .unwrap();
        assert_eq!(values.dtype(), DType::F64);
        assert!(values.to_f64_vec().iter().all(|v| v.abs() <= bound));
    }

    #[test]
    fn glorot_needs_two_axes() {
        assert!(GlorotUniform::default().sample(&[10]).is_err());
        assert!(GlorotUniform::default().sample(&[0, 0]).is_err());
    }

    #[test]
    fn uniform_rejects_empty_ranges() {
        assert!(Uniform::new(1.0, 1.0).sample(&[2]).is_err());
        let values = Uniform::new(-0.5, 0.5).with_seed(1).sample(&[100]).unwrap();
        assert!(values.to_f64_vec().iter().all(|v| (-0.5..0.5).contains(v)));
    }

    #[test]
    fn constant_fills_the_shape() {
        let values = Constant::new(2.0).sample(&[2, 2]).unwrap();
        assert_eq!(values.to_f64_vec(), vec![2.0; 4]);
    }

    #[test]
    fn normal_matches_its_moments() {
        let values = Normal::new(2.0, 0.5)
            .with_seed(42)
            .sample(&[200, 100])
            .unwrap()
            .to_f64_vec();
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        assert!((mean - 0.5).abs() < 0.05, "mean {mean}");
        assert!((var.sqrt() - 2.0).abs() < 0.05, "std {}", var.sqrt());
    }
}
