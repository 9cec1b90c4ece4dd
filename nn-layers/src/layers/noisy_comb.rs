use ndarray::Zip;
use tracing::{debug, instrument, trace};

use crate::error::{check_count, check_shape, LayerError, Slot};
use crate::layer::{check_view_shapes, common_shape, Layer, view_mut_slots, view_slots};
use crate::params::{NoisyCombImageParams, parse_params};
use crate::shape::Shape;
use crate::tensor::{shape_of, ViewF, ViewMutF};

pub const TYPE_NAME: &str = "NoisyCombImage";

pub const BOTTOM_COUNT: usize = 5;

// bottom positions
pub const P: usize = 0;
pub const Q00: usize = 1;
pub const Q01: usize = 2;
pub const Q10: usize = 3;
pub const Q11: usize = 4;

/// Combines a probability mask `p` with the conditional maps of a noise model:
/// `top = q10 * (1 - p) + q11 * p`.
///
/// The bottoms are, in order, `p, q00, q01, q10, q11`, all with the same shape and a leading axis of size 1.
/// `q00` and `q01` don't influence the output and always receive a zero gradient.
#[derive(Debug, Clone, Default)]
pub struct NoisyCombiner {
    params: NoisyCombImageParams,
    shape: Option<Shape>,
}

impl NoisyCombiner {
    pub fn new(params: NoisyCombImageParams) -> Self {
        NoisyCombiner { params, shape: None }
    }

    pub fn from_param_str(param_str: &str) -> Result<Box<dyn Layer>, LayerError> {
        let params = parse_params(TYPE_NAME, param_str)?;
        Ok(Box::new(NoisyCombiner::new(params)))
    }

    pub fn params(&self) -> &NoisyCombImageParams {
        &self.params
    }

    pub fn shape(&self) -> Option<&Shape> {
        self.shape.as_ref()
    }

    fn check_set_up(&self) -> Result<(), LayerError> {
        match self.shape {
            Some(_) => Ok(()),
            None => Err(LayerError::NotSetUp { layer: TYPE_NAME }),
        }
    }
}

impl Layer for NoisyCombiner {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn setup(&mut self, bottom: &[Shape], top_count: usize) -> Result<(), LayerError> {
        check_count(TYPE_NAME, "bottoms", BOTTOM_COUNT, bottom.len())?;
        check_count(TYPE_NAME, "tops", 1, top_count)?;

        let shape = common_shape(TYPE_NAME, bottom)?;

        // the mask is shared across the batch-like leading axis
        match shape.leading() {
            None => return Err(LayerError::config(TYPE_NAME, "bottoms must have at least one axis")),
            Some(1) => {}
            Some(_) => {
                let mut expected = shape.clone();
                expected[0] = 1;
                check_shape(TYPE_NAME, Slot::Bottom(P), &expected, &shape)?;
            }
        }

        debug!("{} setup with bottom shape {}", TYPE_NAME, shape);
        self.shape = Some(shape);
        Ok(())
    }

    fn reshape(&self, bottom: &[Shape]) -> Result<Vec<Shape>, LayerError> {
        self.check_set_up()?;
        check_count(TYPE_NAME, "bottoms", BOTTOM_COUNT, bottom.len())?;

        let shape = common_shape(TYPE_NAME, bottom)?;
        Ok(vec![shape])
    }

    #[instrument(skip_all, name = "NoisyCombImage::forward")]
    fn forward(&self, bottom: &[ViewF], top: &mut [ViewMutF]) -> Result<(), LayerError> {
        self.check_set_up()?;
        check_count(TYPE_NAME, "bottoms", BOTTOM_COUNT, bottom.len())?;
        check_count(TYPE_NAME, "tops", 1, top.len())?;

        let shape = shape_of(&bottom[P]);
        check_view_shapes(TYPE_NAME, &shape, view_slots(bottom, Slot::Bottom))?;
        check_view_shapes(TYPE_NAME, &shape, view_mut_slots(top, Slot::Top))?;

        Zip::from(&mut top[0])
            .and(&bottom[P])
            .and(&bottom[Q10])
            .and(&bottom[Q11])
            .for_each(|t, &p, &q10, &q11| *t = q10 * (1.0 - p) + q11 * p);

        Ok(())
    }

    #[instrument(skip_all, name = "NoisyCombImage::backward")]
    fn backward(
        &self,
        top_diff: &[ViewF],
        propagate_down: &[bool],
        bottom: &[ViewF],
        bottom_diff: &mut [ViewMutF],
    ) -> Result<(), LayerError> {
        self.check_set_up()?;
        check_count(TYPE_NAME, "top diffs", 1, top_diff.len())?;
        check_count(TYPE_NAME, "propagate down flags", BOTTOM_COUNT, propagate_down.len())?;
        check_count(TYPE_NAME, "bottoms", BOTTOM_COUNT, bottom.len())?;
        check_count(TYPE_NAME, "bottom diffs", BOTTOM_COUNT, bottom_diff.len())?;

        let grad = &top_diff[0];
        let shape = shape_of(grad);
        check_view_shapes(TYPE_NAME, &shape, view_slots(bottom, Slot::Bottom))?;

        // only the requested slots have to be valid, the others are never touched
        let requested = view_mut_slots(bottom_diff, Slot::BottomDiff).into_iter()
            .filter(|&(slot, _)| matches!(slot, Slot::BottomDiff(i) if propagate_down[i]));
        check_view_shapes(TYPE_NAME, &shape, requested)?;

        let p = &bottom[P];
        let q10 = &bottom[Q10];
        let q11 = &bottom[Q11];

        for (i, diff) in bottom_diff.iter_mut().enumerate() {
            if !propagate_down[i] {
                trace!("{}: skipping gradient for bottom {}", TYPE_NAME, i);
                continue;
            }

            match i {
                P => Zip::from(diff).and(grad).and(q11).and(q10)
                    .for_each(|d, &g, &q11, &q10| *d = g * (q11 - q10)),
                Q00 | Q01 => diff.fill(0.0),
                Q10 => Zip::from(diff).and(grad).and(p)
                    .for_each(|d, &g, &p| *d = g * (1.0 - p)),
                Q11 => Zip::from(diff).and(grad).and(p)
                    .for_each(|d, &g, &p| *d = g * p),
                _ => unreachable!("bottom count was checked"),
            }
        }

        Ok(())
    }
}
