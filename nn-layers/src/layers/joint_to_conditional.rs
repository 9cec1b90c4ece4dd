use tracing::{debug, instrument, trace};

use crate::error::{check_count, LayerError, Slot};
use crate::layer::{check_view_shapes, Layer, view_mut_slots, view_slots};
use crate::params::{JointToConditionalParams, parse_params};
use crate::shape::Shape;
use crate::tensor::{shape_of, ViewF, ViewMutF};

pub const TYPE_NAME: &str = "JointToConditional";

pub const TOP_COUNT: usize = 4;

/// For each top `p_ab`, the joint entry in the numerator and the other entry in the denominator.
/// Per class the bottom holds `[q00, q01, q10, q11]`.
const PAIRS: [(usize, usize); TOP_COUNT] = [
    // p00 = q00 / (q00 + q10)
    (0, 2),
    // p01 = q01 / (q01 + q11)
    (1, 3),
    // p10 = q10 / (q00 + q10)
    (2, 0),
    // p11 = q11 / (q01 + q11)
    (3, 1),
];

/// Turns a per-class joint noise distribution into the four conditional maps `p00, p01, p10, p11`.
///
/// The single bottom has shape `(n, classes, ...)` and holds exactly four values per class,
/// each top has shape `(n, classes, 1, 1)`.
#[derive(Debug, Clone, Default)]
pub struct JointToConditional {
    params: JointToConditionalParams,
    classes: Option<usize>,
}

impl JointToConditional {
    pub fn new(params: JointToConditionalParams) -> Self {
        JointToConditional { params, classes: None }
    }

    pub fn from_param_str(param_str: &str) -> Result<Box<dyn Layer>, LayerError> {
        let params = parse_params(TYPE_NAME, param_str)?;
        Ok(Box::new(JointToConditional::new(params)))
    }

    pub fn params(&self) -> &JointToConditionalParams {
        &self.params
    }

    /// The number of classes recorded during setup.
    pub fn classes(&self) -> Option<usize> {
        self.classes
    }

    fn check_set_up(&self) -> Result<(), LayerError> {
        match self.classes {
            Some(_) => Ok(()),
            None => Err(LayerError::NotSetUp { layer: TYPE_NAME }),
        }
    }
}

fn classes_of(bottom: &Shape) -> Result<usize, LayerError> {
    if bottom.rank() < 2 {
        return Err(LayerError::config(TYPE_NAME, format!("bottom {} must have rank at least 2", bottom)));
    }

    // exactly 4 values per class, laid out as (1, classes, 4, 1)
    let classes = bottom[1];
    if bottom.size() != 4 * classes {
        return Err(LayerError::ShapeMismatch {
            layer: TYPE_NAME,
            index: Slot::Bottom(0),
            expected: Shape::fixed(&[1, classes, 4, 1]),
            actual: bottom.clone(),
        });
    }

    Ok(classes)
}

fn top_shape(bottom: &Shape, classes: usize) -> Shape {
    Shape::new(vec![bottom[0], classes, 1, 1])
}

impl Layer for JointToConditional {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn setup(&mut self, bottom: &[Shape], top_count: usize) -> Result<(), LayerError> {
        check_count(TYPE_NAME, "bottoms", 1, bottom.len())?;
        check_count(TYPE_NAME, "tops", TOP_COUNT, top_count)?;

        let classes = classes_of(&bottom[0])?;
        debug!("{} setup with bottom shape {} and {} classes", TYPE_NAME, bottom[0], classes);

        self.classes = Some(classes);
        Ok(())
    }

    fn reshape(&self, bottom: &[Shape]) -> Result<Vec<Shape>, LayerError> {
        self.check_set_up()?;
        check_count(TYPE_NAME, "bottoms", 1, bottom.len())?;

        let classes = classes_of(&bottom[0])?;
        Ok(vec![top_shape(&bottom[0], classes); TOP_COUNT])
    }

    #[instrument(skip_all, name = "JointToConditional::forward")]
    fn forward(&self, bottom: &[ViewF], top: &mut [ViewMutF]) -> Result<(), LayerError> {
        self.check_set_up()?;
        check_count(TYPE_NAME, "bottoms", 1, bottom.len())?;
        check_count(TYPE_NAME, "tops", TOP_COUNT, top.len())?;

        let bottom_shape = shape_of(&bottom[0]);
        let classes = classes_of(&bottom_shape)?;
        check_view_shapes(TYPE_NAME, &top_shape(&bottom_shape, classes), view_mut_slots(top, Slot::Top))?;

        let eps = self.params.eps;
        let q = bottom[0].to_shape((classes, 4))?;

        for (&(num, other), top) in PAIRS.iter().zip(top.iter_mut()) {
            for (p, row) in top.iter_mut().zip(q.rows()) {
                *p = row[num] / (eps + row[num] + row[other]);
            }
        }

        Ok(())
    }

    #[instrument(skip_all, name = "JointToConditional::backward")]
    fn backward(
        &self,
        top_diff: &[ViewF],
        propagate_down: &[bool],
        bottom: &[ViewF],
        bottom_diff: &mut [ViewMutF],
    ) -> Result<(), LayerError> {
        self.check_set_up()?;
        check_count(TYPE_NAME, "top diffs", TOP_COUNT, top_diff.len())?;
        check_count(TYPE_NAME, "propagate down flags", 1, propagate_down.len())?;
        check_count(TYPE_NAME, "bottoms", 1, bottom.len())?;
        check_count(TYPE_NAME, "bottom diffs", 1, bottom_diff.len())?;

        if !propagate_down[0] {
            trace!("{}: skipping gradient for bottom 0", TYPE_NAME);
            return Ok(());
        }

        let bottom_shape = shape_of(&bottom[0]);
        let classes = classes_of(&bottom_shape)?;
        check_view_shapes(TYPE_NAME, &top_shape(&bottom_shape, classes), view_slots(top_diff, Slot::TopDiff))?;
        check_view_shapes(TYPE_NAME, &bottom_shape, view_mut_slots(bottom_diff, Slot::BottomDiff))?;

        let eps = self.params.eps;
        let q = bottom[0].to_shape((classes, 4))?;
        let mut diff = bottom_diff[0].view_mut().into_shape((classes, 4))?;
        diff.fill(0.0);

        for (&(num, other), top_diff) in PAIRS.iter().zip(top_diff) {
            for (c, (&g, row)) in top_diff.iter().zip(q.rows()).enumerate() {
                let sum = row[num] + row[other];
                let denom_sq = eps + sum * sum;

                diff[[c, num]] += g * row[other] / denom_sq;
                diff[[c, other]] -= g * row[num] / denom_sq;
            }
        }

        Ok(())
    }
}
