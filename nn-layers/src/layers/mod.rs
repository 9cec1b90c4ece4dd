pub use joint_to_conditional::JointToConditional;
pub use mean_across_bottoms::MeanAverageReducer;
pub use noisy_comb::NoisyCombiner;

pub mod joint_to_conditional;
pub mod mean_across_bottoms;
pub mod noisy_comb;
