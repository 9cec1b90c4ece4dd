use crate::shape::Shape;

#[derive(Debug, thiserror::Error)]
pub enum LayerError {
    #[error("{layer}: {message}")]
    Configuration { layer: &'static str, message: String },

    #[error("{layer}: shape mismatch for {index}, expected {expected} got {actual}")]
    ShapeMismatch {
        layer: &'static str,
        index: Slot,
        expected: Shape,
        actual: Shape,
    },

    #[error("{layer} does not support {operation}")]
    UnsupportedOperation { layer: &'static str, operation: &'static str },

    #[error("{layer} used before a successful setup")]
    NotSetUp { layer: &'static str },

    #[error("unknown layer type {0:?}")]
    UnknownLayerType(String),

    #[error("{layer}: invalid parameter string: {source}")]
    InvalidParams {
        layer: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("buffer layout not supported: {0}")]
    Layout(#[from] ndarray::ShapeError),
}

/// Identifies which buffer a shape error refers to.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Slot {
    Bottom(usize),
    Top(usize),
    BottomDiff(usize),
    TopDiff(usize),
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Slot::Bottom(i) => write!(f, "bottom {}", i),
            Slot::Top(i) => write!(f, "top {}", i),
            Slot::BottomDiff(i) => write!(f, "bottom diff {}", i),
            Slot::TopDiff(i) => write!(f, "top diff {}", i),
        }
    }
}

impl LayerError {
    pub fn config(layer: &'static str, message: impl Into<String>) -> Self {
        LayerError::Configuration { layer, message: message.into() }
    }
}

/// Check that exactly `expected` items of kind `what` were provided.
pub fn check_count(layer: &'static str, what: &str, expected: usize, actual: usize) -> Result<(), LayerError> {
    if expected == actual {
        Ok(())
    } else {
        Err(LayerError::config(layer, format!("expected {} {}, got {}", expected, what, actual)))
    }
}

/// Check that `actual` matches `expected`, reporting `index` on failure.
pub fn check_shape(layer: &'static str, index: Slot, expected: &Shape, actual: &Shape) -> Result<(), LayerError> {
    if expected == actual {
        Ok(())
    } else {
        Err(LayerError::ShapeMismatch {
            layer,
            index,
            expected: expected.clone(),
            actual: actual.clone(),
        })
    }
}
