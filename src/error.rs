use crate::cell::CellKind;
use tumor_common::Vec3;

/// Fatal conditions raised by the engine. A run that hits one of these must stop.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// A cell was requested with a type tag the model does not know.
    #[error("unknown cell type '{name}'")]
    UnknownCellType { name: String },

    /// A parameter value the engine cannot run with.
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// A cell left the numerically sane region, usually a force blow-up.
    #[error(
        "cell {id} ({kind:?}) diverged during {stage}: position {position:?}, \
         created at {origin:?}, migration speed {migration_speed}"
    )]
    PositionDiverged {
        id: usize,
        kind: CellKind,
        position: Vec3,
        origin: Vec3,
        migration_speed: f64,
        stage: &'static str,
    },

    /// A recruited cell would enter outside the numerically sane region.
    #[error(
        "recruitment diverged: edge cell {edge:?}, direction {direction:?}, \
         distance {distance}, entry {position:?}"
    )]
    RecruitmentDiverged {
        edge: Vec3,
        direction: Vec3,
        distance: f64,
        position: Vec3,
    },
}
