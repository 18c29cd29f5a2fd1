use serde::{Deserialize, Serialize};

/// Population summary written once per simulated day (`outputs.csv`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    /// Simulated time in days.
    pub day: f64,
    /// Cancer cells that are not dead.
    pub cancer_count: u32,
    /// All cytotoxic immune cells, active or suppressed.
    pub immune_count: u32,
    pub center_x: f64,
    pub center_y: f64,
    pub center_z: f64,
    /// Largest distance of a cancer cell from the tumor center.
    pub tumor_radius: f64,
}

/// One row of `cancerCells.csv`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancerRecord {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub radius: f64,
    pub marker_level: f64,
    pub time_born: f64,
}

/// One row of `cd8Cells.csv`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImmuneRecord {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub radius: f64,
    pub suppressed: u8, // 0 = active, 1 = suppressed
    pub infiltration_depth: f64,
    pub time_born: f64,
}

/// One row of `edgeCells.csv`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}
