use serde::{Deserialize, Serialize};

/// Runtime parameters derived from the run configuration and the environment table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimParams {
    // Time (hours)
    pub step_hours: f64,
    pub substep_hours: f64,
    pub substeps_per_step: u32,
    pub steps_per_day: u64,
    pub total_steps: u64,

    // Geometry
    pub three_d: f64, // 1.0 for 3D runs, 0.0 for planar runs

    // Initial conditions
    pub seed: u64,
    pub tumor_rings: u32,

    // Fidelity
    pub refresh_neighbors_each_substep: bool,
}

impl SimParams {
    /// Simulated day reached after `steps` outer steps.
    pub fn day_at(&self, steps: u64) -> f64 {
        steps as f64 * self.step_hours / crate::config::HOURS_PER_DAY
    }
}
