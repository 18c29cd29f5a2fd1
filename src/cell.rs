//! A single simulated cell.
//!
//! Cells own their physical and biological state plus a private random stream.
//! Every method transforms one cell given neighbor data supplied by the caller
//! as `CellView` snapshots, so the engine can run a phase over all cells in
//! parallel without any cell observing another cell's in-flight writes.

use crate::error::SimulationError;
use crate::geometry::TumorGeometry;
use crate::neighbors::{neighbor_list, NEIGHBOR_RANGE_FACTOR};
use crate::stochastic::{compose_influence, influence_decay, occurs};
use rand::prelude::*;
use rand_distr::StandardNormal;
use std::str::FromStr;
use tumor_common::{CellTypeParams, ModelParams, Vec3};

/// Pairwise forces act within this multiple of the cell diameter.
pub const INTERACTION_CUTOFF_FACTOR: f64 = 1.5;
/// Any coordinate beyond this magnitude means the integration has blown up.
pub const POSITION_SANITY_BOUND: f64 = 1e10;
/// Half-width of the uniform force perturbation applied after every resolve.
const FORCE_JITTER: f64 = 1.0;
/// Separation fed to the repulsion logarithm never drops below this share of the summed radii.
const MIN_SEPARATION_FRACTION: f64 = 0.01;
const SERIAL_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellKind {
    Cancer,
    CytotoxicImmune,
}

impl CellKind {
    /// The parameter column for this kind.
    pub fn params(self, params: &ModelParams) -> &CellTypeParams {
        match self {
            CellKind::Cancer => &params.cancer,
            CellKind::CytotoxicImmune => &params.cd8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CellKind::Cancer => "cancer",
            CellKind::CytotoxicImmune => "cd8",
        }
    }
}

impl FromStr for CellKind {
    type Err = SimulationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cancer" => Ok(CellKind::Cancer),
            "cd8" | "CD8" => Ok(CellKind::CytotoxicImmune),
            other => Err(SimulationError::UnknownCellType { name: other.to_owned() }),
        }
    }
}

/// Life-cycle state. Cancer cells use `Alive`, immune cells `Active`/`Suppressed`.
/// Transitions only move toward `Dead`, which is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellState {
    Alive,
    Active,
    Suppressed,
    Dead,
}

impl CellState {
    /// Number of influence buckets (one per non-dead state).
    pub const BUCKETS: usize = 3;

    pub fn bucket(self) -> Option<usize> {
        match self {
            CellState::Alive => Some(0),
            CellState::Active => Some(1),
            CellState::Suppressed => Some(2),
            CellState::Dead => None,
        }
    }

    #[inline(always)]
    pub fn is_dead(self) -> bool {
        self == CellState::Dead
    }
}

/// Read-only copy of the cell attributes neighbors are allowed to see.
#[derive(Debug, Clone, Copy)]
pub struct CellView {
    pub id: usize,
    pub kind: CellKind,
    pub state: CellState,
    pub position: Vec3,
    pub radius: f64,
    pub marker_level: f64,
    pub kill_prob: f64,
    pub influence_radius: f64,
}

/// Independent stream for the cell created `serial`-th in a run.
pub fn cell_rng(run_seed: u64, serial: u64) -> StdRng {
    StdRng::seed_from_u64(run_seed.wrapping_add(serial.wrapping_add(1).wrapping_mul(SERIAL_MIX)))
}

#[derive(Debug, Clone)]
pub struct Cell {
    // Identification
    pub id: usize, // Dense index into the population, reassigned after every maintenance pass
    pub kind: CellKind,
    pub state: CellState,
    pub time_born: f64, // Day

    // Location
    pub position: Vec3,
    pub origin: Vec3,
    pub three_d: f64,

    // Mechanics
    pub radius: f64,
    pub mu: f64,
    pub kc: f64,
    pub damping: f64,
    pub max_overlap: f64, // Absolute, already scaled by the diameter
    pub interaction_cutoff: f64,
    pub force: Vec3,
    pub overlap: f64,
    pub compressed: bool,

    // Lifecycle
    pub can_proliferate: bool,
    pub division_prob: f64,
    pub death_prob: f64,
    pub hypoxic_radius: f64,
    pub hypoxic_death_prob: f64,

    // Migration
    pub target: Vec3,
    pub migration_speed: f64,
    pub migration_bias: f64,
    pub infiltration_depth: f64,

    // Marker, killing and influence
    pub marker_level: f64,
    pub marker_shift: f64,
    pub marker_cap: f64,
    pub kill_prob: f64,
    pub influence_radius: f64,
    pub suppressed_influence_factor: f64,
    pub influences: [f64; CellState::BUCKETS],

    // Valid for the current step only
    pub neighbors: Vec<usize>,

    rng: StdRng,
}

impl Cell {
    /// Creates a cell of `kind`, reading its column of the parameter tables.
    pub fn new(
        position: Vec3,
        id: usize,
        params: &ModelParams,
        kind: CellKind,
        three_d: f64,
        time_born: f64,
        rng: StdRng,
    ) -> Self {
        let mut cell = Self::blank(position, id, kind, three_d, time_born, rng);
        let column = kind.params(params);
        match kind {
            CellKind::Cancer => cell.init_cancer(column),
            CellKind::CytotoxicImmune => cell.init_immune(column),
        }
        cell
    }

    /// Same as `new`, with the kind given by its parameter-column name.
    ///
    /// Cells created by the engine carry a typed `CellKind` and never reach the
    /// `UnknownCellType` check; it applies to kinds named in external input.
    pub fn from_type_name(
        type_name: &str,
        position: Vec3,
        id: usize,
        params: &ModelParams,
        three_d: f64,
        time_born: f64,
        rng: StdRng,
    ) -> Result<Self, SimulationError> {
        let kind = type_name.parse::<CellKind>()?;
        Ok(Self::new(position, id, params, kind, three_d, time_born, rng))
    }

    fn blank(position: Vec3, id: usize, kind: CellKind, three_d: f64, time_born: f64, rng: StdRng) -> Self {
        Cell {
            id,
            kind,
            state: CellState::Alive,
            time_born,
            position,
            origin: position,
            three_d,
            radius: 0.0,
            mu: 0.0,
            kc: 0.0,
            damping: 0.0,
            max_overlap: 0.0,
            interaction_cutoff: 0.0,
            force: Vec3::zero(),
            overlap: 0.0,
            compressed: false,
            can_proliferate: false,
            division_prob: 0.0,
            death_prob: 0.0,
            hypoxic_radius: 0.0,
            hypoxic_death_prob: 0.0,
            target: position,
            migration_speed: 0.0,
            migration_bias: 0.0,
            infiltration_depth: 0.0,
            marker_level: 0.0,
            marker_shift: 0.0,
            marker_cap: 0.0,
            kill_prob: 0.0,
            influence_radius: 0.0,
            suppressed_influence_factor: 1.0,
            influences: [0.0; CellState::BUCKETS],
            neighbors: Vec::new(),
            rng,
        }
    }

    fn init_mechanics(&mut self, p: &CellTypeParams) {
        self.mu = p.mu;
        self.kc = p.kc;
        self.damping = p.damping;
        self.max_overlap = p.max_overlap * p.diameter;
        self.radius = p.diameter / 2.0;
        self.interaction_cutoff = INTERACTION_CUTOFF_FACTOR * p.diameter;
        self.division_prob = p.division_prob;
        self.death_prob = p.death_prob;
        self.influence_radius = p.influence_radius;
    }

    fn init_cancer(&mut self, p: &CellTypeParams) {
        self.init_mechanics(p);
        self.state = CellState::Alive;
        self.can_proliferate = true;
        self.marker_cap = p.marker_cap;
        self.marker_shift = p.marker_shift;
        self.hypoxic_radius = p.hypoxic_radius;
        self.hypoxic_death_prob = p.hypoxic_death_prob;
    }

    fn init_immune(&mut self, p: &CellTypeParams) {
        self.init_mechanics(p);
        self.state = CellState::Active;
        self.migration_speed = p.migration_speed;
        self.migration_bias = p.migration_bias;
        self.kill_prob = p.kill_prob;
        self.suppressed_influence_factor = p.suppressed_influence_factor;
        // Half-normal draw; the configured depth sits at three standard deviations.
        let z: f64 = self.rng.sample(StandardNormal);
        self.infiltration_depth = (z * p.infiltration_depth / 3.0).abs();
    }

    pub fn view(&self) -> CellView {
        CellView {
            id: self.id,
            kind: self.kind,
            state: self.state,
            position: self.position,
            radius: self.radius,
            marker_level: self.marker_level,
            kill_prob: self.kill_prob,
            influence_radius: self.influence_radius,
        }
    }

    #[inline(always)]
    pub fn is_dead(&self) -> bool {
        self.state.is_dead()
    }

    #[inline(always)]
    pub fn distance_to(&self, point: Vec3) -> f64 {
        self.position.distance(point)
    }

    #[inline(always)]
    fn in_contact(&self, other: &CellView) -> bool {
        self.distance_to(other.position) <= self.radius + other.radius
    }

    fn random_unit_vector(&mut self) -> Vec3 {
        Vec3::new(
            self.rng.random_range(-1.0..1.0),
            self.rng.random_range(-1.0..1.0),
            self.rng.random_range(-1.0..1.0),
        )
        .with_z_scaled(self.three_d)
        .normalize()
    }

    fn check_position(&self, stage: &'static str) -> Result<(), SimulationError> {
        if self.position.exceeds(POSITION_SANITY_BOUND) {
            return Err(SimulationError::PositionDiverged {
                id: self.id,
                kind: self.kind,
                position: self.position,
                origin: self.origin,
                migration_speed: self.migration_speed,
                stage,
            });
        }
        Ok(())
    }

    // --- Neighbors and influence ---

    /// Rebuilds the neighbor list from a start-of-step snapshot.
    pub fn collect_neighbors(&mut self, views: &[CellView]) {
        let range = NEIGHBOR_RANGE_FACTOR * self.interaction_cutoff;
        self.neighbors = neighbor_list(self.id, self.position, range, views);
    }

    pub fn clear_influences(&mut self) {
        self.influences = [0.0; CellState::BUCKETS];
    }

    /// Folds one neighbor into the bucket of its state. Dead cells exert no influence.
    pub fn add_influence(&mut self, other: &CellView) {
        let Some(bucket) = other.state.bucket() else {
            return;
        };
        let contribution = influence_decay(self.distance_to(other.position), other.influence_radius);
        self.influences[bucket] = compose_influence(self.influences[bucket], contribution);
    }

    /// Recomputes every bucket from all other cells in the snapshot.
    pub fn accumulate_influences(&mut self, views: &[CellView]) {
        self.clear_influences();
        for view in views {
            // A cell does not influence itself
            if view.id != self.id {
                self.add_influence(view);
            }
        }
    }

    // --- Contact interactions ---

    /// An active immune cell touching a cancer cell may be suppressed by its marker.
    pub fn inhibit_on_contact(&mut self, other: &CellView, dt: f64) {
        if self.kind != CellKind::CytotoxicImmune || self.state != CellState::Active {
            return;
        }
        if other.kind != CellKind::Cancer || other.state.is_dead() {
            return;
        }
        if self.in_contact(other) && occurs(&mut self.rng, other.marker_level, dt) {
            self.suppress();
        }
    }

    fn suppress(&mut self) {
        self.state = CellState::Suppressed;
        self.kill_prob = 0.0;
        self.influence_radius *= self.suppressed_influence_factor;
        self.migration_speed = 0.0;
    }

    /// A cancer cell touching an active immune cell may be killed by it.
    pub fn die_from_contact(&mut self, other: &CellView, dt: f64) {
        if self.kind != CellKind::Cancer || self.is_dead() {
            return;
        }
        if other.kind != CellKind::CytotoxicImmune || other.state != CellState::Active {
            return;
        }
        if self.in_contact(other) && occurs(&mut self.rng, other.kill_prob, dt) {
            self.state = CellState::Dead;
        }
    }

    /// Marker expression induced by nearby active immune cells.
    pub fn gain_marker(&mut self, dt: f64) {
        if self.kind != CellKind::Cancer || self.is_dead() {
            return;
        }
        let active_influence = self.influences[1];
        if occurs(&mut self.rng, active_influence, dt) {
            self.marker_level += self.marker_shift;
        }
        self.marker_level = self.marker_level.min(self.marker_cap).max(0.0);
    }

    /// Daughters start with the mother's marker level.
    pub fn inherit_marker(&mut self, level: f64) {
        if self.kind == CellKind::Cancer {
            self.marker_level = level.min(self.marker_cap).max(0.0);
        }
    }

    // --- Mechanics ---

    fn attractive_force(&self, direction: Vec3, distance: f64, other_radius: f64) -> Vec3 {
        let sij = self.radius + other_radius;
        let gap = distance - sij;
        direction * (self.mu * gap * (-self.kc * gap / sij).exp())
    }

    fn repulsive_force(&self, direction: Vec3, distance: f64, other_radius: f64) -> Vec3 {
        let sij = self.radius + other_radius;
        let distance = distance.max(MIN_SEPARATION_FRACTION * sij);
        direction * (self.mu * sij * (1.0 + (distance - sij) / sij).log10())
    }

    /// Adds the pairwise force exerted by one neighbor.
    pub fn accumulate_force(&mut self, other: &CellView) {
        if other.state.is_dead() {
            return;
        }
        let dx = other.position - self.position;
        let distance = dx.length();
        if distance >= self.interaction_cutoff {
            return;
        }
        let sij = self.radius + other.radius;
        if distance < sij {
            let direction = if distance > 1e-12 { dx / distance } else { self.random_unit_vector() };
            self.force += self.repulsive_force(direction, distance, other.radius);
        } else if self.kind == CellKind::Cancer && other.kind == CellKind::Cancer {
            // Adhesion only between cancer cells
            self.force += self.attractive_force(dx / distance, distance, other.radius);
        }
    }

    /// Over-damped Euler step, then reset the accumulator to a small perturbation.
    pub fn resolve_forces(&mut self, dt: f64) -> Result<(), SimulationError> {
        self.position += self.force * (dt / self.damping);
        self.reset_forces();
        self.check_position("force resolution")
    }

    pub fn reset_forces(&mut self) {
        self.force = Vec3::new(
            self.rng.random_range(-FORCE_JITTER..FORCE_JITTER),
            self.rng.random_range(-FORCE_JITTER..FORCE_JITTER),
            self.rng.random_range(-FORCE_JITTER..FORCE_JITTER),
        )
        .with_z_scaled(self.three_d);
    }

    // --- Overlap ---

    pub fn add_overlap(&mut self, other: &CellView) {
        if other.state.is_dead() {
            return;
        }
        let sij = self.radius + other.radius;
        let distance = self.distance_to(other.position);
        if distance < sij {
            self.overlap += sij - distance;
        }
    }

    /// Derives `compressed` from the accumulated overlap and clears the accumulator.
    pub fn update_compression(&mut self) {
        self.compressed = self.overlap > self.max_overlap;
        self.overlap = 0.0;
    }

    pub fn update_proliferation_eligibility(&mut self) {
        self.can_proliferate = !self.is_dead() && !self.compressed;
    }

    // --- Lifecycle ---

    /// Returns the daughter position when the cell divides this step.
    /// The caller creates the daughter.
    pub fn proliferate(&mut self, dt: f64) -> Option<Vec3> {
        if !self.can_proliferate || self.is_dead() {
            return None;
        }
        if !occurs(&mut self.rng, self.division_prob, dt) {
            return None;
        }
        let offset = self.random_unit_vector() * self.radius;
        Some(self.position + offset)
    }

    pub fn age(&mut self, dt: f64) {
        if !self.is_dead() && occurs(&mut self.rng, self.death_prob, dt) {
            self.state = CellState::Dead;
        }
    }

    /// Cancer cells inside the hypoxic core may die.
    pub fn hypoxic_death(&mut self, center: Vec3, dt: f64) {
        if self.kind != CellKind::Cancer || self.state != CellState::Alive {
            return;
        }
        if self.distance_to(center) < self.hypoxic_radius
            && occurs(&mut self.rng, self.hypoxic_death_prob, dt)
        {
            self.state = CellState::Dead;
        }
    }

    // --- Migration ---

    /// Immune cells head for the tumor center; other kinds keep their target.
    pub fn set_migration_target(&mut self, tumor_center: Vec3) {
        if self.kind == CellKind::CytotoxicImmune {
            self.target = tumor_center;
        }
    }

    /// Biased random walk toward the target, halted once the cell has
    /// penetrated its infiltration depth past the nearest edge.
    pub fn migrate(&mut self, dt: f64, geometry: &TumorGeometry) -> Result<(), SimulationError> {
        if self.migration_speed <= 0.0 || self.is_dead() {
            return Ok(());
        }

        let toward = (self.target - self.position).normalize_or_zero();
        let random = Vec3::new(
            self.rng.random_range(-1.0..1.0),
            self.rng.random_range(-1.0..1.0),
            self.rng.random_range(-1.0..1.0),
        )
        .normalize();
        let direction = (toward * self.migration_bias + random * (1.0 - self.migration_bias))
            .with_z_scaled(self.three_d)
            .normalize_or_zero();

        let edge_from_center = geometry.edge_distance_from_center(self.position);
        let penetration = edge_from_center - self.distance_to(geometry.center);
        if penetration < self.infiltration_depth * edge_from_center {
            self.position += direction * (dt * self.migration_speed);
        }
        self.check_position("migration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tumor_common::{CellTypeParams, EnvironmentParams, RecruitmentParams};

    fn model() -> ModelParams {
        ModelParams {
            cancer: CellTypeParams {
                mu: 50.0,
                kc: 12.0,
                damping: 10.0,
                max_overlap: 0.2,
                diameter: 20.0,
                division_prob: 1.0,
                marker_cap: 0.5,
                marker_shift: 0.2,
                ..CellTypeParams::default()
            },
            cd8: CellTypeParams {
                mu: 50.0,
                kc: 12.0,
                damping: 10.0,
                max_overlap: 0.2,
                diameter: 10.0,
                migration_speed: 240.0,
                migration_bias: 1.0,
                kill_prob: 1.0,
                influence_radius: 20.0,
                infiltration_depth: 0.0,
                suppressed_influence_factor: 0.1,
                ..CellTypeParams::default()
            },
            recruitment: RecruitmentParams { recruitment_rate: 0.0, target_ratio: 0.3, entry_distance: 200.0 },
            environment: EnvironmentParams { duration_days: 1.0, three_dimensional: false },
        }
    }

    fn cell(kind: CellKind, id: usize, position: Vec3) -> Cell {
        Cell::new(position, id, &model(), kind, 0.0, 0.0, cell_rng(11, id as u64))
    }

    #[test]
    fn construction_applies_type_specific_parameters() {
        let cancer = cell(CellKind::Cancer, 0, Vec3::zero());
        assert_eq!(cancer.state, CellState::Alive);
        assert_eq!(cancer.radius, 10.0);
        assert_eq!(cancer.interaction_cutoff, 30.0);
        assert!((cancer.max_overlap - 4.0).abs() < 1e-12);
        assert!(cancer.can_proliferate);

        let immune = cell(CellKind::CytotoxicImmune, 1, Vec3::zero());
        assert_eq!(immune.state, CellState::Active);
        assert_eq!(immune.radius, 5.0);
        assert_eq!(immune.kill_prob, 1.0);
        assert!(!immune.can_proliferate);
    }

    #[test]
    fn unknown_type_name_fails() {
        let err = Cell::from_type_name("macrophage", Vec3::zero(), 0, &model(), 0.0, 0.0, cell_rng(0, 0));
        assert!(matches!(err, Err(SimulationError::UnknownCellType { .. })));
        assert!(Cell::from_type_name("CD8", Vec3::zero(), 0, &model(), 0.0, 0.0, cell_rng(0, 0)).is_ok());
    }

    #[test]
    fn overlapping_cells_repel() {
        let mut a = cell(CellKind::Cancer, 0, Vec3::zero());
        let b = cell(CellKind::Cancer, 1, Vec3::new(15.0, 0.0, 0.0));
        a.accumulate_force(&b.view());
        assert!(a.force.x < 0.0, "expected push away from b, got {:?}", a.force);
    }

    #[test]
    fn coincident_cells_get_a_bounded_force() {
        let mut a = cell(CellKind::Cancer, 0, Vec3::zero());
        let b = cell(CellKind::Cancer, 1, Vec3::zero());
        a.accumulate_force(&b.view());
        assert!(a.force.length().is_finite());
        assert!(a.force.length() <= 50.0 * 20.0 * 2.0 + 1e-9);
    }

    #[test]
    fn only_cancer_pairs_attract() {
        let mut a = cell(CellKind::Cancer, 0, Vec3::zero());
        let b = cell(CellKind::Cancer, 1, Vec3::new(25.0, 0.0, 0.0));
        a.accumulate_force(&b.view());
        assert!(a.force.x > 0.0);

        let mut t = cell(CellKind::CytotoxicImmune, 2, Vec3::zero());
        let c = cell(CellKind::Cancer, 3, Vec3::new(20.0, 0.0, 0.0));
        t.accumulate_force(&c.view());
        assert_eq!(t.force, Vec3::zero());
    }

    #[test]
    fn dead_neighbors_contribute_nothing() {
        let mut a = cell(CellKind::Cancer, 0, Vec3::zero());
        let mut b = cell(CellKind::CytotoxicImmune, 1, Vec3::new(5.0, 0.0, 0.0));
        b.state = CellState::Dead;
        let view = b.view();
        a.accumulate_force(&view);
        a.add_overlap(&view);
        a.add_influence(&view);
        assert_eq!(a.force, Vec3::zero());
        assert_eq!(a.overlap, 0.0);
        assert_eq!(a.influences, [0.0; CellState::BUCKETS]);
    }

    #[test]
    fn influence_lands_in_neighbor_state_bucket() {
        let mut a = cell(CellKind::Cancer, 0, Vec3::zero());
        let t = cell(CellKind::CytotoxicImmune, 1, Vec3::new(20.0, 0.0, 0.0));
        a.accumulate_influences(&[a.view(), t.view()]);
        assert!((a.influences[1] - crate::stochastic::INFLUENCE_THRESHOLD).abs() < 1e-12);
        assert_eq!(a.influences[0], 0.0);
    }

    #[test]
    fn planar_reset_leaves_z_untouched() {
        let mut a = cell(CellKind::Cancer, 0, Vec3::zero());
        for _ in 0..20 {
            a.resolve_forces(0.005).unwrap();
            assert_eq!(a.force.z, 0.0);
            assert_eq!(a.position.z, 0.0);
        }
    }

    #[test]
    fn contact_with_full_marker_suppresses_immune_cell() {
        let mut t = cell(CellKind::CytotoxicImmune, 0, Vec3::zero());
        let mut c = cell(CellKind::Cancer, 1, Vec3::new(14.0, 0.0, 0.0));
        c.marker_level = 1.0;
        t.inhibit_on_contact(&c.view(), 0.25);
        assert_eq!(t.state, CellState::Suppressed);
        assert_eq!(t.kill_prob, 0.0);
        assert_eq!(t.migration_speed, 0.0);
        assert!((t.influence_radius - 2.0).abs() < 1e-12);
    }

    #[test]
    fn no_suppression_without_contact() {
        let mut t = cell(CellKind::CytotoxicImmune, 0, Vec3::zero());
        let mut c = cell(CellKind::Cancer, 1, Vec3::new(16.0, 0.0, 0.0));
        c.marker_level = 1.0;
        t.inhibit_on_contact(&c.view(), 0.25);
        assert_eq!(t.state, CellState::Active);
    }

    #[test]
    fn active_immune_contact_kills_cancer() {
        let mut c = cell(CellKind::Cancer, 0, Vec3::zero());
        let mut t = cell(CellKind::CytotoxicImmune, 1, Vec3::new(15.0, 0.0, 0.0));
        c.die_from_contact(&t.view(), 0.25);
        assert_eq!(c.state, CellState::Dead);

        let mut c = cell(CellKind::Cancer, 2, Vec3::zero());
        t.state = CellState::Suppressed;
        c.die_from_contact(&t.view(), 0.25);
        assert_eq!(c.state, CellState::Alive);
    }

    #[test]
    fn marker_gain_is_capped() {
        let mut c = cell(CellKind::Cancer, 0, Vec3::zero());
        c.influences[1] = 1.0;
        for _ in 0..10 {
            c.gain_marker(0.25);
        }
        assert_eq!(c.marker_level, 0.5);

        let mut d = cell(CellKind::Cancer, 1, Vec3::zero());
        d.inherit_marker(c.marker_level);
        assert_eq!(d.marker_level, 0.5);
    }

    #[test]
    fn daughter_sits_one_radius_away_in_plane() {
        let mut c = cell(CellKind::Cancer, 0, Vec3::new(3.0, 4.0, 0.0));
        let daughter = c.proliferate(0.25).expect("division probability is 1");
        assert!((daughter.distance(c.position) - c.radius).abs() < 1e-9);
        assert_eq!(daughter.z, 0.0);

        c.compressed = true;
        c.update_proliferation_eligibility();
        assert!(c.proliferate(0.25).is_none());
    }

    #[test]
    fn migration_stops_at_infiltration_depth() {
        let geometry = TumorGeometry {
            center: Vec3::zero(),
            radius: 100.0,
            edge_cells: vec![Vec3::new(100.0, 0.0, 0.0)],
        };
        let mut t = cell(CellKind::CytotoxicImmune, 0, Vec3::new(300.0, 0.0, 0.0));
        t.set_migration_target(geometry.center);
        for _ in 0..1000 {
            t.migrate(0.005, &geometry).unwrap();
        }
        let d = t.distance_to(geometry.center);
        assert!(d <= 100.0 && d > 98.0, "stopped at {d}");
    }

    #[test]
    fn diverged_position_is_fatal() {
        let geometry = TumorGeometry { center: Vec3::zero(), radius: 0.0, edge_cells: Vec::new() };
        let mut t = cell(CellKind::CytotoxicImmune, 0, Vec3::new(2e10, 0.0, 0.0));
        let err = t.migrate(0.005, &geometry).unwrap_err();
        assert!(matches!(err, SimulationError::PositionDiverged { stage: "migration", .. }));

        let mut c = cell(CellKind::Cancer, 1, Vec3::zero());
        c.force = Vec3::new(1e15, 0.0, 0.0);
        assert!(c.resolve_forces(1.0).is_err());
    }

    #[test]
    fn hypoxic_core_kills_only_living_cancer_cells() {
        let mut p = model();
        p.cancer.hypoxic_radius = 30.0;
        p.cancer.hypoxic_death_prob = 1.0;
        let center = Vec3::zero();
        let spawn = |kind: CellKind, id: usize, x: f64| Cell::new(Vec3::new(x, 0.0, 0.0), id, &p, kind, 0.0, 0.0, cell_rng(11, id as u64));

        let mut inside = spawn(CellKind::Cancer, 0, 10.0);
        inside.hypoxic_death(center, 0.25);
        assert_eq!(inside.state, CellState::Dead);

        let mut outside = spawn(CellKind::Cancer, 1, 50.0);
        outside.hypoxic_death(center, 0.25);
        assert_eq!(outside.state, CellState::Alive);

        let mut immune = spawn(CellKind::CytotoxicImmune, 2, 0.0);
        immune.hypoxic_radius = 30.0;
        immune.hypoxic_death_prob = 1.0;
        immune.hypoxic_death(center, 0.25);
        assert_eq!(immune.state, CellState::Active);

        let mut suppressed = spawn(CellKind::CytotoxicImmune, 3, 0.0);
        suppressed.state = CellState::Suppressed;
        suppressed.hypoxic_radius = 30.0;
        suppressed.hypoxic_death_prob = 1.0;
        suppressed.hypoxic_death(center, 0.25);
        assert_eq!(suppressed.state, CellState::Suppressed);
    }

    #[test]
    fn hypoxic_death_is_inert_with_zero_radius() {
        let mut c = cell(CellKind::Cancer, 0, Vec3::zero());
        c.hypoxic_death_prob = 1.0;
        c.hypoxic_death(Vec3::zero(), 0.25);
        assert_eq!(c.state, CellState::Alive);
    }

    #[test]
    fn immune_cells_ignore_inherited_marker() {
        let mut t = cell(CellKind::CytotoxicImmune, 0, Vec3::zero());
        t.inherit_marker(0.5);
        assert_eq!(t.marker_level, 0.0);
    }

    #[test]
    fn compressed_immune_cell_does_not_divide() {
        let mut p = model();
        p.cd8.division_prob = 1.0;
        let mut t = Cell::new(Vec3::zero(), 0, &p, CellKind::CytotoxicImmune, 0.0, 0.0, cell_rng(11, 0));
        let crowd = Cell::new(Vec3::new(3.0, 0.0, 0.0), 1, &p, CellKind::CytotoxicImmune, 0.0, 0.0, cell_rng(11, 1));

        // Overlap 7 exceeds the 2.0 threshold (0.2 of a 10 diameter).
        t.add_overlap(&crowd.view());
        t.update_compression();
        t.update_proliferation_eligibility();
        assert!(t.compressed);
        assert!(t.proliferate(0.25).is_none());

        t.update_compression();
        t.update_proliferation_eligibility();
        assert!(t.proliferate(0.25).is_some());
    }

    proptest! {
        #[test]
        fn deeper_overlap_never_uncompresses(shallow in 0.0f64..20.0, extra in 0.0f64..20.0) {
            let deep = (shallow + extra).min(20.0);
            let compressed_at = |overlap: f64| {
                let mut a = cell(CellKind::Cancer, 0, Vec3::zero());
                let b = cell(CellKind::Cancer, 1, Vec3::new(20.0 - overlap, 0.0, 0.0));
                a.add_overlap(&b.view());
                a.update_compression();
                a.compressed
            };
            prop_assert!(!compressed_at(shallow) || compressed_at(deep));
        }
    }
}
