use itertools::Itertools;
use ndarray::{Dimension, IxDyn};
use rand::Rng;
use tracing::debug;

use crate::error::LayerError;
use crate::layer::{backward_blobs, forward_blobs, Layer};
use crate::shape::Shape;
use crate::tensor::{Blob, TensorF};

/// Compares the gradients computed by `Layer::backward` against central finite differences
/// of the objective `L = 1/2 * sum(top^2)`, summed over all tops.
#[derive(Debug, Copy, Clone)]
pub struct GradientChecker {
    pub step: f32,
    pub threshold: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GradientMismatch {
    pub bottom: usize,
    pub index: Vec<usize>,
    pub analytic: f32,
    pub numeric: f32,
}

#[derive(Debug, Clone, Default)]
pub struct GradientReport {
    pub checked: usize,
    pub max_error: f32,
    pub failures: Vec<GradientMismatch>,
}

impl Default for GradientChecker {
    fn default() -> Self {
        GradientChecker { step: 1e-3, threshold: 1e-2 }
    }
}

impl GradientReport {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

impl GradientChecker {
    pub fn new(step: f32, threshold: f32) -> Self {
        assert!(step > 0.0, "Step must be positive, got {}", step);
        GradientChecker { step, threshold }
    }

    /// Check the gradient of every element of the bottoms with indices in `check`.
    /// The layer must already be set up for the shapes of `bottom`.
    pub fn check(&self, layer: &dyn Layer, bottom: &[Blob], check: &[usize]) -> Result<GradientReport, LayerError> {
        let mut bottom = bottom.to_vec();

        // analytic gradients, with dL/dtop = top
        let mut top = forward_blobs(layer, &bottom)?;
        for t in &mut top {
            t.diff.assign(&t.data);
        }
        for b in &mut bottom {
            b.fill_diff(0.0);
        }
        let propagate_down = (0..bottom.len()).map(|i| check.contains(&i)).collect_vec();
        backward_blobs(layer, &top, &propagate_down, &mut bottom)?;
        let analytic_diff: Vec<TensorF> = bottom.iter().map(|b| b.diff.clone()).collect_vec();

        // numeric gradients
        let mut report = GradientReport::default();
        let step = self.step;

        for &i in check {
            let indices = bottom[i].data.indexed_iter().map(|(index, _)| index).collect_vec();

            for index in indices {
                let x = bottom[i].data[&index];

                bottom[i].data[&index] = x + step;
                let plus = objective(layer, &bottom)?;
                bottom[i].data[&index] = x - step;
                let minus = objective(layer, &bottom)?;
                bottom[i].data[&index] = x;

                let numeric = ((plus - minus) / (2.0 * step as f64)) as f32;
                let analytic = analytic_diff[i][&index];

                let error = (analytic - numeric).abs();
                let scale = f32::max(1.0, f32::max(analytic.abs(), numeric.abs()));

                report.checked += 1;
                report.max_error = f32::max(report.max_error, error);

                if !(error <= self.threshold * scale) {
                    report.failures.push(GradientMismatch {
                        bottom: i,
                        index: index.slice().to_vec(),
                        analytic,
                        numeric,
                    });
                }
            }
        }

        debug!(
            "{}: checked {} gradient elements, max error {}, {} failures",
            layer.type_name(), report.checked, report.max_error, report.failures.len(),
        );

        Ok(report)
    }
}

fn objective(layer: &dyn Layer, bottom: &[Blob]) -> Result<f64, LayerError> {
    let top = forward_blobs(layer, bottom)?;
    let loss = top.iter()
        .flat_map(|t| t.data.iter())
        .map(|&x| 0.5 * (x as f64) * (x as f64))
        .sum();
    Ok(loss)
}

/// A blob with data sampled uniformly from `low..high` and a zero diff.
pub fn uniform_blob(shape: &Shape, low: f32, high: f32, rng: &mut impl Rng) -> Blob {
    let data = TensorF::from_shape_fn(IxDyn(&shape.dims), |_| rng.gen_range(low..high));
    Blob::from_data(data)
}
