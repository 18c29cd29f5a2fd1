//! Tumor center, extent and boundary cells.
//!
//! Measured from living cancer cells at initialization and at each day
//! boundary. Immune migration and recruitment read the most recent measurement.

use crate::cell::{CellKind, CellView};
use rayon::prelude::*;
use tumor_common::Vec3;

/// Only cells at least this fraction of the tumor radius from the center can be edge cells.
pub const EDGE_SHELL_FRACTION: f64 = 0.75;
/// Outward probe distance, in cell radii.
const PROBE_RADII: f64 = 4.0;
/// A probe closer than this many radii to another cancer cell is considered covered.
const COVER_RADII: f64 = 2.0;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TumorGeometry {
    pub center: Vec3,
    pub radius: f64,
    pub edge_cells: Vec<Vec3>,
}

impl TumorGeometry {
    /// Measures the tumor from a population snapshot.
    ///
    /// With no living cancer cells the previous center and radius are kept and
    /// the edge set is emptied.
    pub fn measure(views: &[CellView], previous: &TumorGeometry) -> TumorGeometry {
        let cancer: Vec<&CellView> = views
            .iter()
            .filter(|v| v.kind == CellKind::Cancer && !v.state.is_dead())
            .collect();

        if cancer.is_empty() {
            return TumorGeometry {
                center: previous.center,
                radius: previous.radius,
                edge_cells: Vec::new(),
            };
        }

        let sum = cancer.iter().fold(Vec3::zero(), |acc, v| acc + v.position);
        let center = sum / cancer.len() as f64;
        let radius = cancer
            .iter()
            .map(|v| v.position.distance(center))
            .fold(0.0, f64::max);

        let shell = EDGE_SHELL_FRACTION * radius;
        let edge_cells: Vec<Vec3> = cancer
            .par_iter()
            .filter(|v| v.position.distance(center) >= shell)
            .filter(|v| {
                let outward = (v.position - center).normalize();
                let probe = v.position + outward * (PROBE_RADII * v.radius);
                !cancer
                    .iter()
                    .any(|o| o.id != v.id && probe.distance(o.position) < COVER_RADII * o.radius)
            })
            .map(|v| v.position)
            .collect();

        TumorGeometry { center, radius, edge_cells }
    }

    /// Edge cell closest to `point`.
    pub fn nearest_edge(&self, point: Vec3) -> Option<Vec3> {
        self.edge_cells
            .iter()
            .copied()
            .min_by(|a, b| a.distance_squared(point).total_cmp(&b.distance_squared(point)))
    }

    /// Distance from the center to the edge cell nearest `point`, or the
    /// tumor radius when no edge cells are known.
    pub fn edge_distance_from_center(&self, point: Vec3) -> f64 {
        match self.nearest_edge(point) {
            Some(edge) => edge.distance(self.center),
            None => self.radius,
        }
    }

    /// Unit vector from the center through `point` (+x when they coincide).
    pub fn outward_direction(&self, point: Vec3) -> Vec3 {
        (point - self.center).normalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellState;

    fn cancer(id: usize, x: f64, y: f64) -> CellView {
        CellView {
            id,
            kind: CellKind::Cancer,
            state: CellState::Alive,
            position: Vec3::new(x, y, 0.0),
            radius: 10.0,
            marker_level: 0.0,
            kill_prob: 0.0,
            influence_radius: 0.0,
        }
    }

    fn line(n: usize) -> Vec<CellView> {
        (0..n).map(|i| cancer(i, i as f64 * 20.0, 0.0)).collect()
    }

    #[test]
    fn center_and_radius_of_a_line() {
        let g = TumorGeometry::measure(&line(5), &TumorGeometry::default());
        assert!((g.center.x - 40.0).abs() < 1e-12);
        assert!((g.radius - 40.0).abs() < 1e-12);
    }

    #[test]
    fn only_the_ends_of_a_line_are_edges() {
        let g = TumorGeometry::measure(&line(5), &TumorGeometry::default());
        assert_eq!(g.edge_cells.len(), 2);
        assert!(g.edge_cells.contains(&Vec3::new(0.0, 0.0, 0.0)));
        assert!(g.edge_cells.contains(&Vec3::new(80.0, 0.0, 0.0)));
    }

    #[test]
    fn dead_and_immune_cells_are_ignored() {
        let mut views = line(3);
        views[2].state = CellState::Dead;
        let mut t = cancer(3, 500.0, 0.0);
        t.kind = CellKind::CytotoxicImmune;
        views.push(t);
        let g = TumorGeometry::measure(&views, &TumorGeometry::default());
        assert!((g.center.x - 10.0).abs() < 1e-12);
        assert!((g.radius - 10.0).abs() < 1e-12);
    }

    #[test]
    fn empty_tumor_keeps_previous_measurement() {
        let previous = TumorGeometry {
            center: Vec3::new(1.0, 2.0, 0.0),
            radius: 7.0,
            edge_cells: vec![Vec3::zero()],
        };
        let g = TumorGeometry::measure(&[], &previous);
        assert_eq!(g.center, previous.center);
        assert_eq!(g.radius, 7.0);
        assert!(g.edge_cells.is_empty());
    }

    #[test]
    fn single_cell_is_its_own_edge() {
        let g = TumorGeometry::measure(&[cancer(0, 5.0, 5.0)], &TumorGeometry::default());
        assert_eq!(g.radius, 0.0);
        assert_eq!(g.edge_cells, vec![Vec3::new(5.0, 5.0, 0.0)]);
        assert_eq!(g.outward_direction(g.center), Vec3::unit_x());
    }

    #[test]
    fn edge_distance_falls_back_to_radius() {
        let g = TumorGeometry { center: Vec3::zero(), radius: 42.0, edge_cells: Vec::new() };
        assert_eq!(g.edge_distance_from_center(Vec3::new(100.0, 0.0, 0.0)), 42.0);
        assert!(g.nearest_edge(Vec3::zero()).is_none());
    }
}
