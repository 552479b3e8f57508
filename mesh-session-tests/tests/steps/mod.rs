mod liveness_steps;
mod membership_steps;
mod sync_steps;
