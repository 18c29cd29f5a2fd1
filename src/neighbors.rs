//! Per-step neighbor discovery.
//!
//! A plain distance test against every other cell. By default lists are rebuilt once
//! per outer step and reused by every force sub-step.

use crate::cell::CellView;
use tumor_common::Vec3;

/// Neighbor range as a multiple of a cell's interaction cutoff.
pub const NEIGHBOR_RANGE_FACTOR: f64 = 10.0;

/// Ids of all other cells within `max_dist` (inclusive) of `pos`, in population order.
#[inline]
pub fn neighbor_list(
    cell_id: usize,     // Id of the cell we're finding neighbors for
    pos: Vec3,          // Position of the cell
    max_dist: f64,      // Inclusive search distance
    views: &[CellView], // Start-of-phase snapshot of the population
) -> Vec<usize> {
    let max_dist_sq = max_dist * max_dist;
    views
        .iter()
        // Don't compare a cell to itself
        .filter(|view| view.id != cell_id)
        .filter(|view| pos.distance_squared(view.position) <= max_dist_sq)
        .map(|view| view.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{CellKind, CellState};

    fn view(id: usize, x: f64) -> CellView {
        CellView {
            id,
            kind: CellKind::Cancer,
            state: CellState::Alive,
            position: Vec3::new(x, 0.0, 0.0),
            radius: 10.0,
            marker_level: 0.0,
            kill_prob: 0.0,
            influence_radius: 0.0,
        }
    }

    #[test]
    fn excludes_self_and_far_cells() {
        let views = vec![view(0, 0.0), view(1, 100.0), view(2, 300.0), view(3, 301.0)];
        assert_eq!(neighbor_list(0, Vec3::zero(), 300.0, &views), vec![1, 2]);
    }

    #[test]
    fn boundary_distance_is_included() {
        let views = vec![view(0, 0.0), view(1, 150.0)];
        assert_eq!(neighbor_list(0, Vec3::zero(), 150.0, &views), vec![1]);
        assert!(neighbor_list(0, Vec3::zero(), 149.9, &views).is_empty());
    }
}
