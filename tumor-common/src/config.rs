use serde::{Deserialize, Serialize};
use anyhow::Result;
use crate::params::EnvironmentParams;
use crate::sim_params::SimParams;
use std::path::{Path, PathBuf};

/// Hours in one simulated day; parameters are calibrated per hour.
pub const HOURS_PER_DAY: f64 = 24.0;

// Configuration for timing
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TimingConfig {
    /// Length of one outer timestep (hours).
    #[serde(default = "default_step_hours")]
    pub step_hours: f64,
    /// Length of one force-integration sub-step (hours).
    #[serde(default = "default_substep_hours")]
    pub substep_hours: f64,
    /// Rebuild neighbor lists on every sub-step instead of once per outer step.
    #[serde(default)]
    pub refresh_neighbors_each_substep: bool,
}

// Initial conditions for the simulation, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct InitialConditions {
    /// Number of concentric rings in the initial tumor disk (the center cell counts as ring 0).
    #[serde(default = "default_tumor_rings")]
    pub tumor_rings: u32,
    pub seed: u64,
}

// Location of the three parameter tables
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ParametersConfig {
    pub directory: PathBuf,
}

// Configuration for output settings, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    pub directory: PathBuf,
    #[serde(default = "default_save_history")]
    pub save_history: bool,
    pub format: Option<String>, // History format: "json", "bincode", "messagepack"
}

// Main run configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RunConfig {
    #[serde(default)]
    pub timing: TimingConfig,
    pub initial_conditions: InitialConditions,
    pub parameters: ParametersConfig,
    pub output: OutputConfig,
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            step_hours: default_step_hours(),
            substep_hours: default_substep_hours(),
            refresh_neighbors_each_substep: false,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            timing: TimingConfig::default(),
            initial_conditions: InitialConditions {
                tumor_rings: default_tumor_rings(),
                seed: 0,
            },
            parameters: ParametersConfig { directory: PathBuf::from("params") },
            output: OutputConfig {
                directory: PathBuf::from("output"),
                save_history: default_save_history(),
                format: None,
            },
        }
    }
}

impl RunConfig {
    /// Loads the run configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        let config: RunConfig = toml::from_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML from '{}': {}", path_ref.display(), e))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let timing = &self.timing;
        if !(timing.step_hours > 0.0) || !timing.step_hours.is_finite() {
            anyhow::bail!("step_hours must be positive.");
        }
        if !(timing.substep_hours > 0.0) || !timing.substep_hours.is_finite() {
            anyhow::bail!("substep_hours must be positive.");
        }
        if timing.substep_hours > timing.step_hours {
            anyhow::bail!(
                "substep_hours ({}) must not exceed step_hours ({}).",
                timing.substep_hours,
                timing.step_hours
            );
        }
        if self.initial_conditions.tumor_rings == 0 {
            anyhow::bail!("tumor_rings must be greater than 0.");
        }
        Ok(())
    }

    /// Converts the configuration and environment table into runtime parameters.
    pub fn get_sim_params(&self, environment: &EnvironmentParams) -> SimParams {
        let step_hours = self.timing.step_hours;
        let substep_hours = self.timing.substep_hours;

        // Rounded rather than truncated: 0.25 / 0.005 is not exactly 50 in binary.
        let substeps_per_step = ((step_hours / substep_hours).round() as u32).max(1);
        let steps_per_day = ((HOURS_PER_DAY / step_hours).round() as u64).max(1);
        let total_hours = environment.duration_days * HOURS_PER_DAY;
        let total_steps = ((total_hours / step_hours) - 1e-9).ceil().max(0.0) as u64;

        SimParams {
            step_hours,
            substep_hours,
            substeps_per_step,
            steps_per_day,
            total_steps,
            three_d: if environment.three_dimensional { 1.0 } else { 0.0 },
            seed: self.initial_conditions.seed,
            tumor_rings: self.initial_conditions.tumor_rings,
            refresh_neighbors_each_substep: self.timing.refresh_neighbors_each_substep,
        }
    }
}

fn default_step_hours() -> f64 {
    0.25
}

fn default_substep_hours() -> f64 {
    0.005
}

fn default_tumor_rings() -> u32 {
    5
}

fn default_save_history() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_toml_with_defaults() {
        let text = r#"
            [initial_conditions]
            seed = 7

            [parameters]
            directory = "params"

            [output]
            directory = "out"
        "#;
        let config: RunConfig = toml::from_str(text).unwrap();
        config.validate().unwrap();
        assert_eq!(config.timing.step_hours, 0.25);
        assert_eq!(config.timing.substep_hours, 0.005);
        assert_eq!(config.initial_conditions.tumor_rings, 5);
        assert!(config.output.save_history);
    }

    #[test]
    fn derived_step_counts() {
        let config = RunConfig::default();
        let env = EnvironmentParams { duration_days: 2.0, three_dimensional: false };
        let params = config.get_sim_params(&env);
        assert_eq!(params.substeps_per_step, 50);
        assert_eq!(params.steps_per_day, 96);
        assert_eq!(params.total_steps, 192);
        assert_eq!(params.three_d, 0.0);
    }

    #[test]
    fn rejects_substep_longer_than_step() {
        let mut config = RunConfig::default();
        config.timing.substep_hours = 1.0;
        assert!(config.validate().is_err());
    }
}
