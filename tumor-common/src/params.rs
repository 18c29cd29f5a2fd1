//! Parameter tables consumed at startup.
//!
//! Three CSV files live in the parameter directory:
//! - `cellParams.csv`: header `parameter,cancer,cd8`, one row per named parameter.
//! - `recParams.csv`: `name,value` rows for immune recruitment.
//! - `envParams.csv`: `name,value` rows for the run environment.
//!
//! Any missing file, missing required row or malformed number is a fatal startup error.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

pub const CELL_PARAMS_FILE: &str = "cellParams.csv";
pub const RECRUITMENT_PARAMS_FILE: &str = "recParams.csv";
pub const ENVIRONMENT_PARAMS_FILE: &str = "envParams.csv";

pub const CANCER_COLUMN: &str = "cancer";
pub const CD8_COLUMN: &str = "cd8";

const CANCER_REQUIRED: &[&str] = &[
    "mu", "kc", "damping", "max_overlap", "division_prob", "death_prob", "diameter",
];

const CD8_REQUIRED: &[&str] = &[
    "mu", "kc", "damping", "max_overlap", "death_prob", "migration_speed", "kill_prob",
    "influence_radius", "infiltration_depth", "migration_bias", "diameter",
];

/// Named rows by named columns. Empty cells are stored as `None`.
#[derive(Debug, Clone, Default)]
pub struct ParamTable {
    columns: Vec<String>,
    rows: BTreeMap<String, Vec<Option<f64>>>,
}

impl ParamTable {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let file = std::fs::File::open(path_ref)
            .with_context(|| format!("Failed to open parameter table '{}'", path_ref.display()))?;
        Self::from_reader(file)
            .with_context(|| format!("Failed to parse parameter table '{}'", path_ref.display()))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        if headers.len() < 2 {
            anyhow::bail!("expected a parameter-name column followed by at least one cell-type column");
        }
        let columns: Vec<String> = headers.iter().skip(1).map(str::to_owned).collect();

        let mut rows = BTreeMap::new();
        for (line, record) in rdr.records().enumerate() {
            let record = record?;
            let name = record.get(0).unwrap_or_default().to_owned();
            if name.is_empty() {
                continue;
            }
            let mut values = Vec::with_capacity(columns.len());
            for (col, column) in columns.iter().enumerate() {
                let raw = record.get(col + 1).unwrap_or_default();
                let value = if raw.is_empty() {
                    None
                } else {
                    Some(raw.parse::<f64>().with_context(|| {
                        format!("row {} ('{}'), column '{}': '{}' is not a number", line + 2, name, column, raw)
                    })?)
                };
                values.push(value);
            }
            if rows.insert(name.clone(), values).is_some() {
                anyhow::bail!("parameter '{}' is listed more than once", name);
            }
        }

        Ok(Self { columns, rows })
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn get(&self, name: &str, column: &str) -> Option<f64> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.rows.get(name).and_then(|values| values.get(col).copied().flatten())
    }

    pub fn require(&self, name: &str, column: &str) -> Result<f64> {
        self.get(name, column)
            .ok_or_else(|| anyhow::anyhow!("missing parameter '{}' for column '{}'", name, column))
    }
}

/// `name,value` list used by the recruitment and environment files.
#[derive(Debug, Clone, Default)]
pub struct NamedValues(BTreeMap<String, f64>);

#[derive(Debug, Deserialize)]
struct NamedValue {
    name: String,
    value: f64,
}

impl NamedValues {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let file = std::fs::File::open(path_ref)
            .with_context(|| format!("Failed to open parameter list '{}'", path_ref.display()))?;
        Self::from_reader(file)
            .with_context(|| format!("Failed to parse parameter list '{}'", path_ref.display()))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut values = BTreeMap::new();
        for record in rdr.deserialize::<NamedValue>() {
            let NamedValue { name, value } = record?;
            values.insert(name, value);
        }
        Ok(Self(values))
    }

    pub fn require(&self, name: &str) -> Result<f64> {
        self.0
            .get(name)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("missing parameter '{}'", name))
    }
}

/// Mechanical and biological parameters of one cell type (one table column).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellTypeParams {
    // Mechanics
    pub mu: f64,
    pub kc: f64,
    pub damping: f64,
    pub max_overlap: f64, // Multiple of the diameter
    pub diameter: f64,

    // Lifecycle (per reference hour)
    pub division_prob: f64,
    pub death_prob: f64,

    // Inhibitory marker (cancer)
    pub marker_cap: f64,
    pub marker_shift: f64,

    // Migration and killing (cd8)
    pub migration_speed: f64,
    pub migration_bias: f64,
    pub infiltration_depth: f64,
    pub kill_prob: f64,
    pub influence_radius: f64,
    pub suppressed_influence_factor: f64,

    // Hypoxic core (cancer)
    pub hypoxic_radius: f64,
    pub hypoxic_death_prob: f64,
}

impl Default for CellTypeParams {
    fn default() -> Self {
        CellTypeParams {
            mu: 0.0,
            kc: 0.0,
            damping: 1.0,
            max_overlap: 0.0,
            diameter: 1.0,
            division_prob: 0.0,
            death_prob: 0.0,
            marker_cap: 0.0,
            marker_shift: 0.0,
            migration_speed: 0.0,
            migration_bias: 0.0,
            infiltration_depth: 0.0,
            kill_prob: 0.0,
            influence_radius: 0.0,
            suppressed_influence_factor: 1.0,
            hypoxic_radius: 0.0,
            hypoxic_death_prob: 0.0,
        }
    }
}

impl CellTypeParams {
    /// Reads one column of the table; rows not in `required` fall back to their defaults.
    pub fn from_table(table: &ParamTable, column: &str, required: &[&str]) -> Result<Self> {
        if !table.has_column(column) {
            anyhow::bail!("cell parameter table has no '{}' column", column);
        }
        let defaults = CellTypeParams::default();
        let value = |name: &str, default: f64| -> Result<f64> {
            if required.contains(&name) {
                table.require(name, column)
            } else {
                Ok(table.get(name, column).unwrap_or(default))
            }
        };

        Ok(CellTypeParams {
            mu: value("mu", defaults.mu)?,
            kc: value("kc", defaults.kc)?,
            damping: value("damping", defaults.damping)?,
            max_overlap: value("max_overlap", defaults.max_overlap)?,
            diameter: value("diameter", defaults.diameter)?,
            division_prob: value("division_prob", defaults.division_prob)?,
            death_prob: value("death_prob", defaults.death_prob)?,
            marker_cap: value("marker_cap", defaults.marker_cap)?,
            marker_shift: value("marker_shift", defaults.marker_shift)?,
            migration_speed: value("migration_speed", defaults.migration_speed)?,
            migration_bias: value("migration_bias", defaults.migration_bias)?,
            infiltration_depth: value("infiltration_depth", defaults.infiltration_depth)?,
            kill_prob: value("kill_prob", defaults.kill_prob)?,
            influence_radius: value("influence_radius", defaults.influence_radius)?,
            suppressed_influence_factor: value(
                "suppressed_influence_factor",
                defaults.suppressed_influence_factor,
            )?,
            hypoxic_radius: value("hypoxic_radius", defaults.hypoxic_radius)?,
            hypoxic_death_prob: value("hypoxic_death_prob", defaults.hypoxic_death_prob)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecruitmentParams {
    /// Recruits per cancer cell per hour while below the target ratio.
    pub recruitment_rate: f64,
    /// Immune-to-cancer ratio at which recruitment pauses.
    pub target_ratio: f64,
    /// Reference entry distance beyond the tumor edge (um).
    pub entry_distance: f64,
}

impl RecruitmentParams {
    pub fn from_values(values: &NamedValues) -> Result<Self> {
        Ok(RecruitmentParams {
            recruitment_rate: values.require("recruitment_rate")?,
            target_ratio: values.require("target_ratio")?,
            entry_distance: values.require("entry_distance")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentParams {
    pub duration_days: f64,
    pub three_dimensional: bool,
}

impl EnvironmentParams {
    pub fn from_values(values: &NamedValues) -> Result<Self> {
        let flag = values.require("three_dimensional")?;
        let three_dimensional = if flag == 1.0 {
            true
        } else if flag == 0.0 {
            false
        } else {
            anyhow::bail!("three_dimensional must be 0 or 1, got {}", flag);
        };
        Ok(EnvironmentParams {
            duration_days: values.require("duration_days")?,
            three_dimensional,
        })
    }
}

/// All parameter tables of one run. Immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelParams {
    pub cancer: CellTypeParams,
    pub cd8: CellTypeParams,
    pub recruitment: RecruitmentParams,
    pub environment: EnvironmentParams,
}

impl ModelParams {
    /// Loads the three parameter files from `dir`.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let table = ParamTable::load(dir.join(CELL_PARAMS_FILE))?;
        let recruitment = NamedValues::load(dir.join(RECRUITMENT_PARAMS_FILE))?;
        let environment = NamedValues::load(dir.join(ENVIRONMENT_PARAMS_FILE))?;
        Self::from_parts(&table, &recruitment, &environment)
    }

    pub fn from_parts(table: &ParamTable, recruitment: &NamedValues, environment: &NamedValues) -> Result<Self> {
        Ok(ModelParams {
            cancer: CellTypeParams::from_table(table, CANCER_COLUMN, CANCER_REQUIRED)
                .context("invalid cancer parameters")?,
            cd8: CellTypeParams::from_table(table, CD8_COLUMN, CD8_REQUIRED)
                .context("invalid cd8 parameters")?,
            recruitment: RecruitmentParams::from_values(recruitment)
                .context("invalid recruitment parameters")?,
            environment: EnvironmentParams::from_values(environment)
                .context("invalid environment parameters")?,
        })
    }
}
