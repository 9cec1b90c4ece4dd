use itertools::Itertools;
use rand::rngs::StdRng;
use rand::SeedableRng;

use nn_layers::error::{LayerError, Slot};
use nn_layers::gradient_check::uniform_blob;
use nn_layers::layer::{backward_blobs, forward_blobs, Layer};
use nn_layers::layers::JointToConditional;
use nn_layers::ndarray::IxDyn;
use nn_layers::params::JointToConditionalParams;
use nn_layers::shape::Shape;
use nn_layers::tensor::{Blob, data_views, shapes, split_views_mut};

use crate::root::tensor_utils::{constant_blob, manual_blob, set_up};

const CLASSES: usize = 50;

/// Every class has all its mass on the diagonal.
fn diagonal_bottom() -> Blob {
    let data = (0..CLASSES).flat_map(|_| [0.5, 0.0, 0.0, 0.5]).collect_vec();
    manual_blob(&[1, CLASSES, 4, 1], data)
}

fn set_up_layer(bottom: &Blob) -> JointToConditional {
    let mut layer = JointToConditional::default();
    set_up(&mut layer, std::slice::from_ref(bottom), 4);
    layer
}

#[test]
fn setup_and_reshape() {
    let bottom = diagonal_bottom();
    let layer = set_up_layer(&bottom);
    assert_eq!(layer.classes(), Some(CLASSES));

    let tops = layer.reshape(&[bottom.shape()]).unwrap();
    assert_eq!(tops, vec![Shape::fixed(&[1, CLASSES, 1, 1]); 4]);
}

#[test]
fn setup_errors() {
    let shape = Shape::fixed(&[1, CLASSES, 4, 1]);
    let mut layer = JointToConditional::default();

    let result = layer.setup(&[shape.clone(), shape.clone()], 4);
    assert!(matches!(result, Err(LayerError::Configuration { .. })), "{:?}", result);

    let result = layer.setup(&[shape.clone()], 1);
    assert!(matches!(result, Err(LayerError::Configuration { .. })), "{:?}", result);

    // 3 values per class instead of 4
    match layer.setup(&[Shape::fixed(&[1, CLASSES, 3, 1])], 4) {
        Err(LayerError::ShapeMismatch { index, expected, actual, .. }) => {
            assert_eq!(index, Slot::Bottom(0));
            assert_eq!(expected, Shape::fixed(&[1, CLASSES, 4, 1]));
            assert_eq!(actual, Shape::fixed(&[1, CLASSES, 3, 1]));
        }
        other => panic!("Expected shape mismatch, got {:?}", other),
    }

    let result = layer.setup(&[Shape::fixed(&[200])], 4);
    assert!(matches!(result, Err(LayerError::Configuration { .. })), "{:?}", result);

    assert_eq!(layer.classes(), None);
}

#[test]
fn reshape_and_forward_check_values_per_class() {
    let bottom = diagonal_bottom();
    let layer = set_up_layer(&bottom);

    let result = layer.reshape(&[Shape::fixed(&[1, CLASSES, 5, 1])]);
    assert!(matches!(result, Err(LayerError::ShapeMismatch { index: Slot::Bottom(0), .. })), "{:?}", result);

    let wrong = [constant_blob(&[1, 3, 2], 0.5)];
    let mut top = vec![constant_blob(&[1, 3, 1, 1], 0.0); 4];
    let (_, mut top_views) = split_views_mut(&mut top);
    let result = layer.forward(&data_views(&wrong), &mut top_views);
    assert!(matches!(result, Err(LayerError::ShapeMismatch { index: Slot::Bottom(0), .. })), "{:?}", result);
}

#[test]
fn default_params() {
    let layer = JointToConditional::default();
    assert_eq!(layer.params(), &JointToConditionalParams::default());
    assert_eq!(layer.params().eps, 1e-12);

    let layer = JointToConditional::new(JointToConditionalParams { eps: 0.25 });
    assert_eq!(layer.params().eps, 0.25);
}

#[test]
fn forward_diagonal() {
    let bottom = [diagonal_bottom()];
    let layer = set_up_layer(&bottom[0]);

    let top = forward_blobs(&layer, &bottom).unwrap();
    assert_eq!(top.len(), 4);

    let expected = [1.0, 0.0, 0.0, 1.0];
    for (top, expected) in top.iter().zip(expected) {
        assert_eq!(top.shape(), Shape::fixed(&[1, CLASSES, 1, 1]));
        for &p in top.data.iter() {
            assert!((p - expected).abs() < 1e-6, "expected {}, got {}", expected, p);
        }
    }
}

#[test]
fn forward_random() {
    let mut rng = StdRng::seed_from_u64(1701);
    let bottom = [uniform_blob(&Shape::fixed(&[1, 6, 4, 1]), 0.1, 1.0, &mut rng)];
    let layer = set_up_layer(&bottom[0]);

    let top = forward_blobs(&layer, &bottom).unwrap();
    let q = bottom[0].data.iter().copied().collect_vec();

    for c in 0..6 {
        let [q00, q01, q10, q11] = [q[4 * c], q[4 * c + 1], q[4 * c + 2], q[4 * c + 3]];
        let expected = [
            q00 / (q00 + q10),
            q01 / (q01 + q11),
            q10 / (q00 + q10),
            q11 / (q01 + q11),
        ];

        for (t, expected) in expected.into_iter().enumerate() {
            let actual = top[t].data[IxDyn(&[0, c, 0, 0])];
            assert!((actual - expected).abs() < 1e-6, "top {} class {}: expected {}, got {}", t, c, expected, actual);
        }
    }
}

#[test]
fn forward_eps() {
    let params = JointToConditionalParams { eps: 1.0 };
    let mut layer = JointToConditional::new(params);

    let bottom = [manual_blob(&[1, 2, 4], vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0])];
    set_up(&mut layer, &bottom, 4);

    let top = forward_blobs(&layer, &bottom).unwrap();
    assert_eq!(top[0].data.iter().copied().collect_vec(), vec![0.5, 0.0]);
    assert_eq!(top[2].data.iter().copied().collect_vec(), vec![0.0, 0.0]);
}

#[test]
fn backward_literal() {
    // single class with q = [q00, q01, q10, q11]
    let mut bottom = [manual_blob(&[1, 1, 4, 1], vec![1.0, 2.0, 3.0, 4.0])];
    let layer = set_up_layer(&bottom[0]);

    let mut top = layer.reshape(&shapes(&bottom)).unwrap().iter().map(Blob::zeros).collect_vec();
    // only p00 has a gradient
    top[0].fill_diff(1.0);

    backward_blobs(&layer, &top, &[true], &mut bottom).unwrap();

    // d/dq00 q00/(q00+q10) = q10/(q00+q10)^2, d/dq10 = -q00/(q00+q10)^2
    let expected = [3.0 / 16.0, 0.0, -1.0 / 16.0, 0.0];
    for (&actual, expected) in bottom[0].diff.iter().zip(expected) {
        assert!((actual - expected).abs() < 1e-6, "expected {}, got {}", expected, actual);
    }
}

#[test]
fn backward_zeroes_stale_diff() {
    let mut bottom = [diagonal_bottom()];
    bottom[0].fill_diff(100.0);
    let layer = set_up_layer(&bottom[0]);

    let top = vec![constant_blob(&[1, CLASSES, 1, 1], 0.0); 4];
    backward_blobs(&layer, &top, &[true], &mut bottom).unwrap();

    assert!(bottom[0].diff.iter().all(|&x| x == 0.0));
}

#[test]
fn backward_skips_unflagged() {
    let mut bottom = [diagonal_bottom()];
    bottom[0].fill_diff(-123.0);
    let layer = set_up_layer(&bottom[0]);

    let mut top = vec![constant_blob(&[1, CLASSES, 1, 1], 0.0); 4];
    for t in &mut top {
        t.fill_diff(1.0);
    }
    backward_blobs(&layer, &top, &[false], &mut bottom).unwrap();

    assert!(bottom[0].diff.iter().all(|&x| x == -123.0));
}

#[test]
fn backward_wrong_top_diff_shape() {
    let mut bottom = [diagonal_bottom()];
    let layer = set_up_layer(&bottom[0]);

    let mut top = vec![constant_blob(&[1, CLASSES, 1, 1], 0.0); 4];
    top[1] = constant_blob(&[1, CLASSES], 0.0);

    let result = backward_blobs(&layer, &top, &[true], &mut bottom);
    assert!(matches!(result, Err(LayerError::ShapeMismatch { index: Slot::TopDiff(1), .. })), "{:?}", result);
}
