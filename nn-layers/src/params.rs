use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::LayerError;

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MeanAcrossBottomsParams {}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NoisyCombImageParams {}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JointToConditionalParams {
    /// Added to every denominator to keep empty classes finite.
    pub eps: f32,
}

impl Default for JointToConditionalParams {
    fn default() -> Self {
        JointToConditionalParams { eps: 1e-12 }
    }
}

/// Parse the parameter string of `layer`.
/// An empty string means all defaults, anything else must be a JSON object.
pub fn parse_params<P: DeserializeOwned + Default>(layer: &'static str, param_str: &str) -> Result<P, LayerError> {
    if param_str.trim().is_empty() {
        return Ok(P::default());
    }

    serde_json::from_str(param_str)
        .map_err(|source| LayerError::InvalidParams { layer, source })
}
