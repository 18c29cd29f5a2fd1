pub mod config;
pub mod params;
pub mod sim_params;
pub mod snapshot;
pub mod vecmath;

// Re-export key types for easier use by dependent crates
pub use config::{RunConfig, TimingConfig, InitialConditions, ParametersConfig, OutputConfig};
pub use params::{CellTypeParams, EnvironmentParams, ModelParams, NamedValues, ParamTable, RecruitmentParams};
pub use sim_params::SimParams;
pub use snapshot::{CancerRecord, DailySummary, EdgeRecord, ImmuneRecord};
pub use vecmath::Vec3;
