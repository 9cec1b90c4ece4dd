use std::fmt::{Debug, Formatter};

use indexmap::IndexMap;
use itertools::Itertools;

use crate::error::LayerError;
use crate::layer::Layer;
use crate::layers::{joint_to_conditional, JointToConditional, mean_across_bottoms, MeanAverageReducer, noisy_comb, NoisyCombiner};

/// Build a new, not yet set up layer from its parameter string.
pub type LayerConstructor = fn(&str) -> Result<Box<dyn Layer>, LayerError>;

/// Maps layer type identifiers to their constructors, in registration order.
#[derive(Clone, Default)]
pub struct LayerRegistry {
    constructors: IndexMap<&'static str, LayerConstructor>,
}

impl LayerRegistry {
    pub fn new() -> Self {
        LayerRegistry { constructors: IndexMap::new() }
    }

    /// A registry containing every layer type in this crate.
    pub fn with_builtin() -> Self {
        let mut registry = LayerRegistry::new();
        registry.register(mean_across_bottoms::TYPE_NAME, MeanAverageReducer::from_param_str);
        registry.register(noisy_comb::TYPE_NAME, NoisyCombiner::from_param_str);
        registry.register(joint_to_conditional::TYPE_NAME, JointToConditional::from_param_str);
        registry
    }

    pub fn register(&mut self, type_name: &'static str, constructor: LayerConstructor) {
        let prev = self.constructors.insert(type_name, constructor);
        assert!(prev.is_none(), "Layer type {:?} registered twice", type_name);
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.constructors.contains_key(type_name)
    }

    pub fn type_names(&self) -> Vec<&'static str> {
        self.constructors.keys().copied().collect_vec()
    }

    /// Construct a layer of type `type_name`, parsing `param_str` into its typed parameters.
    pub fn create(&self, type_name: &str, param_str: &str) -> Result<Box<dyn Layer>, LayerError> {
        let constructor = self.constructors.get(type_name)
            .ok_or_else(|| LayerError::UnknownLayerType(type_name.to_owned()))?;
        constructor(param_str)
    }
}

impl Debug for LayerRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerRegistry")
            .field("types", &self.type_names())
            .finish()
    }
}
