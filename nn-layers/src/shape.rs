use std::fmt::{Debug, Display, Formatter};
use std::ops::{Index, IndexMut};

use itertools::Itertools;

/// A fully known tensor shape.
#[derive(Clone, Eq, PartialEq, Hash, Default)]
pub struct Shape {
    pub dims: Vec<usize>,
}

impl Shape {
    pub const SCALAR: Shape = Shape { dims: Vec::new() };

    pub fn new(dims: Vec<usize>) -> Self {
        Shape { dims }
    }

    pub fn fixed(dims: &[usize]) -> Self {
        Shape { dims: dims.to_vec() }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// The total number of elements, the product of all dims.
    pub fn size(&self) -> usize {
        self.dims.iter().product()
    }

    /// The size of the leading axis, `None` for scalars.
    pub fn leading(&self) -> Option<usize> {
        self.dims.first().copied()
    }
}

impl Index<usize> for Shape {
    type Output = usize;

    fn index(&self, axis: usize) -> &Self::Output {
        &self.dims[axis]
    }
}

impl IndexMut<usize> for Shape {
    fn index_mut(&mut self, axis: usize) -> &mut Self::Output {
        &mut self.dims[axis]
    }
}

impl Debug for Shape {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Shape{}", self)
    }
}

impl Display for Shape {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({})", self.dims.iter().join(", "))
    }
}
