use itertools::Itertools;
use ndarray::{ArrayBase, ArrayD, ArrayViewD, ArrayViewMutD, Data, Dimension, IxDyn};

use crate::error::LayerError;
use crate::shape::Shape;

pub type TensorF = ArrayD<f32>;

/// Borrowed read-only tensor, used for bottoms and top diffs.
pub type ViewF<'a> = ArrayViewD<'a, f32>;
/// Borrowed writable tensor, used for tops and bottom diffs.
/// The storage always belongs to the caller, layers only write through the view.
pub type ViewMutF<'a> = ArrayViewMutD<'a, f32>;

pub fn shape_of<S: Data<Elem=f32>, D: Dimension>(tensor: &ArrayBase<S, D>) -> Shape {
    Shape::fixed(tensor.shape())
}

/// Host-side storage for a single value: the data and the gradient with respect to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    pub data: TensorF,
    pub diff: TensorF,
}

impl Blob {
    pub fn zeros(shape: &Shape) -> Self {
        Blob {
            data: TensorF::zeros(IxDyn(&shape.dims)),
            diff: TensorF::zeros(IxDyn(&shape.dims)),
        }
    }

    pub fn from_data(data: TensorF) -> Self {
        let diff = TensorF::zeros(data.raw_dim());
        Blob { data, diff }
    }

    pub fn from_shape_vec(shape: &Shape, data: Vec<f32>) -> Result<Self, LayerError> {
        let data = TensorF::from_shape_vec(IxDyn(&shape.dims), data)?;
        Ok(Blob::from_data(data))
    }

    pub fn filled(shape: &Shape, value: f32) -> Self {
        Blob::from_data(TensorF::from_elem(IxDyn(&shape.dims), value))
    }

    pub fn shape(&self) -> Shape {
        shape_of(&self.data)
    }

    pub fn fill_diff(&mut self, value: f32) {
        self.diff.fill(value);
    }
}

pub fn shapes(blobs: &[Blob]) -> Vec<Shape> {
    blobs.iter().map(Blob::shape).collect_vec()
}

pub fn data_views(blobs: &[Blob]) -> Vec<ViewF<'_>> {
    blobs.iter().map(|b| b.data.view()).collect_vec()
}

pub fn data_views_mut(blobs: &mut [Blob]) -> Vec<ViewMutF<'_>> {
    blobs.iter_mut().map(|b| b.data.view_mut()).collect_vec()
}

pub fn diff_views(blobs: &[Blob]) -> Vec<ViewF<'_>> {
    blobs.iter().map(|b| b.diff.view()).collect_vec()
}

/// Borrow the data of each blob immutably and the diff mutably at the same time.
pub fn split_views_mut(blobs: &mut [Blob]) -> (Vec<ViewF<'_>>, Vec<ViewMutF<'_>>) {
    blobs.iter_mut()
        .map(|b| {
            let Blob { data, diff } = b;
            (data.view(), diff.view_mut())
        })
        .unzip()
}
