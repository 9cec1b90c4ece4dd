use std::fmt::Debug;

use itertools::Itertools;

use crate::error::{check_shape, LayerError, Slot};
use crate::shape::Shape;
use crate::tensor::{Blob, data_views, data_views_mut, diff_views, shape_of, split_views_mut, ViewF, ViewMutF};

/// A computational layer as seen by the host engine.
///
/// The engine calls `setup` once when the graph is built, `reshape` whenever the bottom shapes change,
/// and then `forward` and `backward` any number of times in any order.
/// Only `setup` mutates the layer, so a set-up layer can be shared between threads.
///
/// All tensor storage is owned by the caller: layers read from the borrowed bottom views
/// and write their results into the borrowed top (or bottom diff) views.
pub trait Layer: Debug + Send + Sync {
    /// The identifier this layer type is registered under.
    fn type_name(&self) -> &'static str;

    /// Validate the bottom shapes and the number of tops and record whatever the layer needs.
    fn setup(&mut self, bottom: &[Shape], top_count: usize) -> Result<(), LayerError>;

    /// Compute the top shapes for the given bottom shapes.
    fn reshape(&self, bottom: &[Shape]) -> Result<Vec<Shape>, LayerError>;

    fn forward(&self, bottom: &[ViewF], top: &mut [ViewMutF]) -> Result<(), LayerError>;

    /// Write the gradient of each bottom `i` with `propagate_down[i]` set into `bottom_diff[i]`.
    /// Slots with the flag unset must not be touched.
    fn backward(
        &self,
        top_diff: &[ViewF],
        propagate_down: &[bool],
        bottom: &[ViewF],
        bottom_diff: &mut [ViewMutF],
    ) -> Result<(), LayerError>;
}

/// Check that every bottom has the same shape and return that shape.
pub fn common_shape(layer: &'static str, bottom: &[Shape]) -> Result<Shape, LayerError> {
    let first = bottom.first()
        .ok_or_else(|| LayerError::config(layer, "expected at least one bottom"))?;

    for (i, shape) in bottom.iter().enumerate() {
        check_shape(layer, Slot::Bottom(i), first, shape)?;
    }

    Ok(first.clone())
}

/// Check that each tensor in `views` has shape `expected`.
pub fn check_view_shapes(
    layer: &'static str,
    expected: &Shape,
    views: impl IntoIterator<Item=(Slot, Shape)>,
) -> Result<(), LayerError> {
    for (slot, actual) in views {
        check_shape(layer, slot, expected, &actual)?;
    }
    Ok(())
}

/// Allocate tops for `layer` and run it forward on `bottom`, playing the part of the host engine.
pub fn forward_blobs(layer: &dyn Layer, bottom: &[Blob]) -> Result<Vec<Blob>, LayerError> {
    let bottom_shapes = bottom.iter().map(Blob::shape).collect_vec();
    let top_shapes = layer.reshape(&bottom_shapes)?;

    let mut top = top_shapes.iter().map(Blob::zeros).collect_vec();
    layer.forward(&data_views(bottom), &mut data_views_mut(&mut top))?;

    Ok(top)
}

/// Run `layer` backward, using the diffs of `top` and writing into the diffs of `bottom`.
pub fn backward_blobs(layer: &dyn Layer, top: &[Blob], propagate_down: &[bool], bottom: &mut [Blob]) -> Result<(), LayerError> {
    let (bottom_data, mut bottom_diff) = split_views_mut(bottom);
    layer.backward(&diff_views(top), propagate_down, &bottom_data, &mut bottom_diff)
}

pub(crate) fn view_slots(views: &[ViewF], slot: fn(usize) -> Slot) -> Vec<(Slot, Shape)> {
    views.iter().enumerate().map(|(i, v)| (slot(i), shape_of(v))).collect_vec()
}

pub(crate) fn view_mut_slots(views: &[ViewMutF], slot: fn(usize) -> Slot) -> Vec<(Slot, Shape)> {
    views.iter().enumerate().map(|(i, v)| (slot(i), shape_of(v))).collect_vec()
}
