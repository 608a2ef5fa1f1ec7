//! Layer shapes: fixed-arity tuples whose entries may be unknown.

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// One axis extent of a layer shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dim {
    /// Statically known extent.
    Known(usize),
    /// Extent not known until the network is fed (typically the batch axis).
    Unknown,
}

impl Dim {
    /// Returns the extent when known.
    pub fn known(self) -> Option<usize> {
        match self {
            Dim::Known(size) => Some(size),
            Dim::Unknown => None,
        }
    }

    pub fn is_unknown(self) -> bool {
        matches!(self, Dim::Unknown)
    }
}

impl From<usize> for Dim {
    fn from(size: usize) -> Self {
        Dim::Known(size)
    }
}

impl From<Option<usize>> for Dim {
    fn from(size: Option<usize>) -> Self {
        size.map_or(Dim::Unknown, Dim::Known)
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dim::Known(size) => write!(f, "{size}"),
            Dim::Unknown => f.write_str("?"),
        }
    }
}

/// Ordered tuple of axis extents describing a layer's input or output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    dims: SmallVec<[Dim; 4]>,
}

impl Shape {
    pub fn new<I, D>(dims: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<Dim>,
    {
        Self {
            dims: dims.into_iter().map(Into::into).collect(),
        }
    }

    pub fn dims(&self) -> &[Dim] {
        &self.dims
    }

    /// Returns the rank (number of axes) of the shape.
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn dim(&self, axis: usize) -> Option<Dim> {
        self.dims.get(axis).copied()
    }

    /// Returns the concrete extents when every axis is known.
    pub fn known_dims(&self) -> Option<Vec<usize>> {
        self.dims.iter().map(|dim| dim.known()).collect()
    }

    /// Total element count when every axis is known.
    pub fn num_elements(&self) -> Option<usize> {
        self.known_dims().map(|dims| dims.iter().product())
    }

    /// Exact match against a concrete array shape; unknown axes never match.
    pub fn matches(&self, dims: &[usize]) -> bool {
        self.rank() == dims.len()
            && self
                .dims
                .iter()
                .zip(dims)
                .all(|(dim, &size)| dim.known() == Some(size))
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(dims: [usize; N]) -> Self {
        Shape::new(dims)
    }
}

impl<const N: usize> From<[Option<usize>; N]> for Shape {
    fn from(dims: [Option<usize>; N]) -> Self {
        Shape::new(dims)
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Shape::new(dims.iter().copied())
    }
}

impl From<Vec<Dim>> for Shape {
    fn from(dims: Vec<Dim>) -> Self {
        Shape::new(dims)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, dim) in self.dims.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{dim}")?;
        }
        if self.dims.len() == 1 {
            f.write_str(",")?;
        }
        f.write_str(")")
    }
}
