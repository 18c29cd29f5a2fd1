//! Off-lattice agent-based model of a growing tumor under cytotoxic immune attack.

pub mod cell;
pub mod error;
pub mod geometry;
pub mod neighbors;
pub mod output;
pub mod simulation;
pub mod stochastic;

pub use cell::{Cell, CellKind, CellState, CellView};
pub use error::SimulationError;
pub use geometry::TumorGeometry;
pub use simulation::{Environment, StepReport};
pub use stochastic::prob_time;
