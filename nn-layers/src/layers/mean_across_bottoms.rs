use ndarray::{Axis, stack};
use tracing::{debug, instrument};

use crate::error::{check_count, LayerError, Slot};
use crate::layer::{check_view_shapes, common_shape, Layer, view_mut_slots, view_slots};
use crate::params::{MeanAcrossBottomsParams, parse_params};
use crate::shape::Shape;
use crate::tensor::{shape_of, ViewF, ViewMutF};

pub const TYPE_NAME: &str = "MeanAcrossBottoms";

/// The number of bottoms forward actually averages, setup accepts any count of at least two.
pub const FORWARD_BOTTOM_COUNT: usize = 5;

/// Elementwise mean across a set of equally shaped bottoms.
///
/// Despite the name nothing is reduced within a single tensor, the top has the same shape as each bottom.
/// This layer is not differentiable, `backward` always fails.
#[derive(Debug, Clone, Default)]
pub struct MeanAverageReducer {
    params: MeanAcrossBottomsParams,
    shape: Option<Shape>,
}

impl MeanAverageReducer {
    pub fn new(params: MeanAcrossBottomsParams) -> Self {
        MeanAverageReducer { params, shape: None }
    }

    pub fn from_param_str(param_str: &str) -> Result<Box<dyn Layer>, LayerError> {
        let params = parse_params(TYPE_NAME, param_str)?;
        Ok(Box::new(MeanAverageReducer::new(params)))
    }

    pub fn params(&self) -> &MeanAcrossBottomsParams {
        &self.params
    }

    /// The common bottom shape recorded during setup.
    pub fn shape(&self) -> Option<&Shape> {
        self.shape.as_ref()
    }
}

impl Layer for MeanAverageReducer {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn setup(&mut self, bottom: &[Shape], top_count: usize) -> Result<(), LayerError> {
        if bottom.len() < 2 {
            return Err(LayerError::config(TYPE_NAME, format!("expected at least two bottoms, got {}", bottom.len())));
        }
        check_count(TYPE_NAME, "tops", 1, top_count)?;

        let shape = common_shape(TYPE_NAME, bottom)?;
        debug!("{} setup with {} bottoms of shape {}", TYPE_NAME, bottom.len(), shape);

        self.shape = Some(shape);
        Ok(())
    }

    fn reshape(&self, bottom: &[Shape]) -> Result<Vec<Shape>, LayerError> {
        if self.shape.is_none() {
            return Err(LayerError::NotSetUp { layer: TYPE_NAME });
        }

        let shape = common_shape(TYPE_NAME, bottom)?;
        Ok(vec![shape])
    }

    #[instrument(skip_all, name = "MeanAcrossBottoms::forward")]
    fn forward(&self, bottom: &[ViewF], top: &mut [ViewMutF]) -> Result<(), LayerError> {
        if self.shape.is_none() {
            return Err(LayerError::NotSetUp { layer: TYPE_NAME });
        }

        check_count(TYPE_NAME, "bottoms at forward time", FORWARD_BOTTOM_COUNT, bottom.len())?;
        check_count(TYPE_NAME, "tops", 1, top.len())?;

        let shape = shape_of(&bottom[0]);
        check_view_shapes(TYPE_NAME, &shape, view_slots(bottom, Slot::Bottom))?;
        check_view_shapes(TYPE_NAME, &shape, view_mut_slots(top, Slot::Top))?;

        // stack along a new leading axis and average over it
        let stacked = stack(Axis(0), bottom)?;
        let mean = stacked.mean_axis(Axis(0))
            .ok_or_else(|| LayerError::config(TYPE_NAME, "cannot average zero bottoms"))?;

        top[0].assign(&mean);
        Ok(())
    }

    fn backward(
        &self,
        _top_diff: &[ViewF],
        _propagate_down: &[bool],
        _bottom: &[ViewF],
        _bottom_diff: &mut [ViewMutF],
    ) -> Result<(), LayerError> {
        Err(LayerError::UnsupportedOperation { layer: TYPE_NAME, operation: "backward" })
    }
}
