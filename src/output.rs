//! Daily CSV snapshots and the end-of-run history file.

use crate::cell::{Cell, CellKind, CellState};
use crate::simulation::Environment;
use anyhow::{Context, Result};
use log::{error, info};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tumor_common::{CancerRecord, DailySummary, EdgeRecord, ImmuneRecord};

pub const SUMMARY_FILE: &str = "outputs.csv";
pub const CANCER_FILE: &str = "cancerCells.csv";
pub const IMMUNE_FILE: &str = "cd8Cells.csv";
pub const EDGE_FILE: &str = "edgeCells.csv";

fn write_records<T, I>(path: &Path, records: I) -> Result<()>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create output file '{}'", path.display()))?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn cancer_records(cells: &[Cell]) -> impl Iterator<Item = CancerRecord> + '_ {
    cells
        .iter()
        .filter(|c| c.kind == CellKind::Cancer && !c.is_dead())
        .map(|c| CancerRecord {
            x: c.position.x,
            y: c.position.y,
            z: c.position.z,
            radius: c.radius,
            marker_level: c.marker_level,
            time_born: c.time_born,
        })
}

pub fn immune_records(cells: &[Cell]) -> impl Iterator<Item = ImmuneRecord> + '_ {
    cells
        .iter()
        .filter(|c| c.kind == CellKind::CytotoxicImmune && !c.is_dead())
        .map(|c| ImmuneRecord {
            x: c.position.x,
            y: c.position.y,
            z: c.position.z,
            radius: c.radius,
            suppressed: u8::from(c.state == CellState::Suppressed),
            infiltration_depth: c.infiltration_depth,
            time_born: c.time_born,
        })
}

/// Overwrites the four per-day files in `dir` with the current state.
pub fn write_day_outputs(env: &Environment, dir: &Path) -> Result<()> {
    write_records(&dir.join(SUMMARY_FILE), [env.summary()])?;
    write_records(&dir.join(CANCER_FILE), cancer_records(env.cells()))?;
    write_records(&dir.join(IMMUNE_FILE), immune_records(env.cells()))?;
    write_records(
        &dir.join(EDGE_FILE),
        env.geometry().edge_cells.iter().map(|p| EdgeRecord { x: p.x, y: p.y, z: p.z }),
    )?;
    Ok(())
}

/// Writes every recorded daily summary in the requested format
/// (`json`, `bincode` or `messagepack`; unknown formats fall back to JSON).
pub fn save_history(history: &[DailySummary], dir: &Path, format: &str) -> Result<()> {
    match format {
        "bincode" => {
            // Binary format (compact)
            let path = dir.join("history.bin");
            let file = File::create(&path)
                .with_context(|| format!("Failed to create history file '{}'", path.display()))?;
            bincode::serialize_into(BufWriter::new(file), history)
                .context("Failed to serialize history to bincode")?;
            info!("History saved to {} (binary format)", path.display());
        }
        "messagepack" => {
            // MessagePack format (compact and cross-platform)
            let path = dir.join("history.msgpack");
            let mut file = BufWriter::new(
                File::create(&path)
                    .with_context(|| format!("Failed to create history file '{}'", path.display()))?,
            );
            rmp_serde::encode::write(&mut file, history)
                .context("Failed to serialize history to MessagePack")?;
            file.flush()?;
            info!("History saved to {} (MessagePack format)", path.display());
        }
        other => {
            if other != "json" {
                error!("Unknown output format: {}. Using JSON instead.", other);
            }
            let path = dir.join("history.json");
            let json = serde_json::to_string(history).context("Failed to serialize history to JSON")?;
            let mut file = File::create(&path)
                .with_context(|| format!("Failed to create history file '{}'", path.display()))?;
            file.write_all(json.as_bytes())?;
            info!("History saved to {} ({} entries)", path.display(), history.len());
        }
    }
    Ok(())
}
