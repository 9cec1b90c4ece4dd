
mod joint_to_conditional;
