#![warn(missing_debug_implementations)]

pub use ndarray;

pub mod error;
pub mod gradient_check;
pub mod layer;
pub mod layers;
pub mod params;
pub mod registry;
pub mod shape;
pub mod tensor;
