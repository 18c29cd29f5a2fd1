use crate::cell::{cell_rng, Cell, CellKind, CellState, CellView, POSITION_SANITY_BOUND};
use crate::error::SimulationError;
use crate::geometry::TumorGeometry;
use log::{debug, info, trace, warn};
use rand::prelude::*;
use rand_distr::Exp;
use rayon::prelude::*;
use std::time::Instant;
use tumor_common::{DailySummary, ModelParams, SimParams, Vec3};

/// π as used by the ring layout of the initial tumor.
const RING_PI: f64 = 3.1415;
/// Tail probability of the entry-distance distribution at the reference entry distance.
const ENTRY_TAIL_PROBABILITY: f64 = 0.01;

/// What happened during one outer step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepReport {
    /// True when the step closed a simulated day (geometry refreshed, summary recorded).
    pub day_completed: bool,
    pub births: usize,
    pub deaths: usize,
    pub recruited: usize,
}

/// Owns the population and drives the per-step pipeline.
pub struct Environment {
    params: ModelParams,
    sim: SimParams,
    cells: Vec<Cell>,
    geometry: TumorGeometry,
    /// Engine-level RNG for shuffling, recruitment anchors and entry distances.
    rng: StdRng,
    steps: u64,
    recruit_accumulator: f64,
    /// Creation counter feeding per-cell RNG seeds. Never reused.
    next_serial: u64,
    entry_distribution: Exp<f64>,
    history: Vec<DailySummary>,
}

impl Environment {
    /// Creates an environment seeded with the initial disk of cancer cells.
    pub fn new(params: ModelParams, sim: SimParams) -> Result<Self, SimulationError> {
        let positions = initial_disk(params.cancer.diameter, sim.tumor_rings);
        let layout: Vec<(CellKind, Vec3)> = positions.into_iter().map(|p| (CellKind::Cancer, p)).collect();
        Self::with_cells(params, sim, &layout)
    }

    /// Creates an environment with an explicit starting population.
    pub fn with_cells(
        params: ModelParams,
        sim: SimParams,
        layout: &[(CellKind, Vec3)],
    ) -> Result<Self, SimulationError> {
        validate(&params, &sim)?;

        let lambda = -ENTRY_TAIL_PROBABILITY.ln() / params.recruitment.entry_distance;
        let entry_distribution = Exp::new(lambda).map_err(|e| SimulationError::InvalidParameter {
            name: "entry_distance",
            reason: e.to_string(),
        })?;

        let mut env = Environment {
            rng: StdRng::seed_from_u64(sim.seed),
            params,
            sim,
            cells: Vec::with_capacity(layout.len()),
            geometry: TumorGeometry::default(),
            steps: 0,
            recruit_accumulator: 0.0,
            next_serial: 0,
            entry_distribution,
            history: Vec::new(),
        };
        for &(kind, position) in layout {
            env.spawn(kind, position);
        }
        env.refresh_geometry();
        env.history.push(env.summary());

        info!(
            "Environment initialized with {} cancer and {} immune cells (tumor radius {:.2}).",
            env.cancer_count(),
            env.immune_count(),
            env.geometry.radius
        );
        Ok(env)
    }

    /// Appends a new cell and returns its id.
    pub fn spawn(&mut self, kind: CellKind, position: Vec3) -> usize {
        let id = self.cells.len();
        let serial = self.next_serial;
        self.next_serial += 1;
        let time_born = self.sim.day_at(self.steps);
        let rng = cell_rng(self.sim.seed, serial);
        self.cells
            .push(Cell::new(position, id, &self.params, kind, self.sim.three_d, time_born, rng));
        id
    }

    /// Advances the simulation by one outer step.
    pub fn step(&mut self) -> Result<StepReport, SimulationError> {
        let step_start = Instant::now();
        let dt = self.sim.step_hours;

        // --- 1. Neighbors and influence (start-of-step snapshot) ---
        self.refresh_neighbors(true);

        // --- 2. Contact interactions and marker gain ---
        self.contact_pass(dt);

        // --- 3. Sub-stepped migration and force integration ---
        self.integrate_forces()?;

        // --- 4. Overlap and compression ---
        self.compression_pass();

        // --- 5. Aging, death and proliferation (parallel marking, serial addition) ---
        let births = self.lifecycle_pass(dt);

        // --- 6. Population maintenance ---
        let deaths = self.maintain_population();

        // --- 7. Recruitment ---
        let recruited = self.recruit(dt)?;

        self.steps += 1;

        // --- 8. Daily geometry refresh and summary ---
        let day_completed = self.steps % self.sim.steps_per_day == 0;
        if day_completed {
            self.refresh_geometry();
            let summary = self.summary();
            info!(
                "Day {:.0}: {} cancer, {} active immune, {} suppressed immune, tumor radius {:.2}",
                summary.day,
                summary.cancer_count,
                self.count_in_state(CellKind::CytotoxicImmune, CellState::Active),
                self.count_in_state(CellKind::CytotoxicImmune, CellState::Suppressed),
                summary.tumor_radius
            );
            self.history.push(summary);
        }

        if births > 0 || deaths > 0 || recruited > 0 {
            debug!(
                "Step {}: {} births, {} deaths, {} recruited, population {}",
                self.steps,
                births,
                deaths,
                recruited,
                self.cells.len()
            );
        }
        trace!("Step {} completed in {:.2} ms", self.steps, step_start.elapsed().as_secs_f64() * 1000.0);

        Ok(StepReport { day_completed, births, deaths, recruited })
    }

    fn views(&self) -> Vec<CellView> {
        self.cells.par_iter().map(Cell::view).collect()
    }

    fn refresh_neighbors(&mut self, with_influence: bool) {
        let views = self.views();
        self.cells.par_iter_mut().for_each(|cell| {
            cell.collect_neighbors(&views);
            if with_influence {
                cell.accumulate_influences(&views);
            }
        });
    }

    fn contact_pass(&mut self, dt: f64) {
        // Immune suppression first, against the start-of-step snapshot.
        let views = self.views();
        self.cells
            .par_iter_mut()
            .filter(|cell| cell.kind == CellKind::CytotoxicImmune)
            .for_each(|cell| {
                let neighbors = std::mem::take(&mut cell.neighbors);
                for &j in &neighbors {
                    cell.inhibit_on_contact(&views[j], dt);
                }
                cell.neighbors = neighbors;
            });

        // Cancer cells only see immune cells that are still active.
        let views = self.views();
        self.cells
            .par_iter_mut()
            .filter(|cell| cell.kind == CellKind::Cancer)
            .for_each(|cell| {
                cell.gain_marker(dt);
                let neighbors = std::mem::take(&mut cell.neighbors);
                for &j in &neighbors {
                    cell.die_from_contact(&views[j], dt);
                }
                cell.neighbors = neighbors;
            });
    }

    fn integrate_forces(&mut self) -> Result<(), SimulationError> {
        let substep = self.sim.substep_hours;
        let center = self.geometry.center;
        self.cells.par_iter_mut().for_each(|cell| cell.set_migration_target(center));

        for sub in 0..self.sim.substeps_per_step {
            if self.sim.refresh_neighbors_each_substep && sub > 0 {
                self.refresh_neighbors(false);
            }

            let geometry = &self.geometry;
            self.cells
                .par_iter_mut()
                .try_for_each(|cell| cell.migrate(substep, geometry))?;

            let views = self.views();
            self.cells.par_iter_mut().try_for_each(|cell| {
                if cell.is_dead() {
                    return Ok(());
                }
                let neighbors = std::mem::take(&mut cell.neighbors);
                for &j in &neighbors {
                    cell.accumulate_force(&views[j]);
                }
                cell.neighbors = neighbors;
                cell.resolve_forces(substep)
            })?;
        }
        Ok(())
    }

    fn compression_pass(&mut self) {
        let views = self.views();
        self.cells.par_iter_mut().for_each(|cell| {
            // Cancer cells are compressed by cancer neighbors, immune cells by immune neighbors.
            let neighbors = std::mem::take(&mut cell.neighbors);
            for &j in &neighbors {
                if views[j].kind == cell.kind {
                    cell.add_overlap(&views[j]);
                }
            }
            cell.neighbors = neighbors;
            cell.update_compression();
            cell.update_proliferation_eligibility();
        });
    }

    /// Returns the number of daughters appended.
    fn lifecycle_pass(&mut self, dt: f64) -> usize {
        let center = self.geometry.center;
        let daughters: Vec<(CellKind, Vec3, f64)> = self
            .cells
            .par_iter_mut()
            .filter_map(|cell| {
                cell.age(dt);
                cell.hypoxic_death(center, dt);
                cell.proliferate(dt).map(|position| (cell.kind, position, cell.marker_level))
            })
            .collect();

        for &(kind, position, marker_level) in &daughters {
            let id = self.spawn(kind, position);
            self.cells[id].inherit_marker(marker_level);
        }
        daughters.len()
    }

    /// Drops dead cells, shuffles the survivors and reassigns dense ids.
    /// Returns the number of cells removed.
    pub(crate) fn maintain_population(&mut self) -> usize {
        let before = self.cells.len();
        self.cells.retain(|cell| !cell.is_dead());
        self.cells.shuffle(&mut self.rng);
        for (id, cell) in self.cells.iter_mut().enumerate() {
            cell.id = id;
        }
        before - self.cells.len()
    }

    /// Returns the number of immune cells recruited.
    fn recruit(&mut self, dt: f64) -> Result<usize, SimulationError> {
        let recruitment = &self.params.recruitment;
        if self.immune_ratio() < recruitment.target_ratio {
            let increment = dt * recruitment.recruitment_rate * self.cancer_count() as f64;
            self.recruit_accumulator += increment;
        }

        let mut recruited = 0;
        while self.recruit_accumulator >= 1.0 {
            let Some(edge) = self.geometry.edge_cells.choose(&mut self.rng).copied() else {
                warn!(
                    "No edge cells available; deferring recruitment (accumulator {:.3}).",
                    self.recruit_accumulator
                );
                break;
            };
            let direction = self.geometry.outward_direction(edge);
            let distance = self
                .entry_distribution
                .sample(&mut self.rng)
                .max(self.params.recruitment.entry_distance);
            let position = edge + direction * distance;
            if position.exceeds(POSITION_SANITY_BOUND) {
                return Err(SimulationError::RecruitmentDiverged { edge, direction, distance, position });
            }

            let id = self.spawn(CellKind::CytotoxicImmune, position);
            trace!("Recruited immune cell {} at {:?}", id, position);
            self.recruit_accumulator -= 1.0;
            recruited += 1;
        }
        Ok(recruited)
    }

    fn refresh_geometry(&mut self) {
        let views = self.views();
        self.geometry = TumorGeometry::measure(&views, &self.geometry);
        debug!(
            "Geometry refreshed: center {:?}, radius {:.2}, {} edge cells",
            self.geometry.center,
            self.geometry.radius,
            self.geometry.edge_cells.len()
        );
    }

    /// True once the configured duration has elapsed or no cancer cell is left.
    pub fn is_finished(&self) -> bool {
        self.steps >= self.sim.total_steps || self.cancer_count() == 0
    }

    /// Refreshes the geometry for the final state and records a closing summary
    /// unless the last step already recorded one.
    pub fn finish(&mut self) -> DailySummary {
        let summary = if self.history.last().map(|s| s.day) == Some(self.sim.day_at(self.steps)) {
            self.summary()
        } else {
            self.refresh_geometry();
            let summary = self.summary();
            self.history.push(summary.clone());
            summary
        };
        info!(
            "Run finished after {} steps (day {:.2}): {} cancer, {} immune.",
            self.steps, summary.day, summary.cancer_count, summary.immune_count
        );
        summary
    }

    pub fn summary(&self) -> DailySummary {
        let center = self.geometry.center;
        DailySummary {
            day: self.sim.day_at(self.steps),
            cancer_count: self.cancer_count() as u32,
            immune_count: self.immune_count() as u32,
            center_x: center.x,
            center_y: center.y,
            center_z: center.z,
            tumor_radius: self.geometry.radius,
        }
    }

    fn count_living(&self, kind: CellKind) -> usize {
        self.cells.iter().filter(|c| c.kind == kind && !c.is_dead()).count()
    }

    fn count_in_state(&self, kind: CellKind, state: CellState) -> usize {
        self.cells.iter().filter(|c| c.kind == kind && c.state == state).count()
    }

    pub fn cancer_count(&self) -> usize {
        self.count_living(CellKind::Cancer)
    }

    pub fn immune_count(&self) -> usize {
        self.count_living(CellKind::CytotoxicImmune)
    }

    /// Immune-to-cancer ratio; unbounded when no cancer cell is alive.
    pub fn immune_ratio(&self) -> f64 {
        let cancer = self.cancer_count();
        if cancer == 0 {
            return f64::INFINITY;
        }
        self.immune_count() as f64 / cancer as f64
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cells_mut(&mut self) -> &mut [Cell] {
        &mut self.cells
    }

    pub fn geometry(&self) -> &TumorGeometry {
        &self.geometry
    }

    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    pub fn sim_params(&self) -> &SimParams {
        &self.sim
    }

    pub fn history(&self) -> &[DailySummary] {
        &self.history
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn recruit_accumulator(&self) -> f64 {
        self.recruit_accumulator
    }
}

/// Concentric rings of cells in the z = 0 plane around a cell at the origin.
pub fn initial_disk(diameter: f64, rings: u32) -> Vec<Vec3> {
    let mut positions = vec![Vec3::zero()];
    for ring in 1..rings {
        let radius = ring as f64 * diameter;
        let count = 2.0 * radius * RING_PI / diameter;
        let mut j = 0.0;
        while j < count {
            let angle = 2.0 * RING_PI * j / count;
            positions.push(Vec3::new(radius * angle.cos(), radius * angle.sin(), 0.0));
            j += 1.0;
        }
    }
    positions
}

fn validate(params: &ModelParams, sim: &SimParams) -> Result<(), SimulationError> {
    let invalid = |name: &'static str, reason: String| Err(SimulationError::InvalidParameter { name, reason });

    for (kind, p) in [(CellKind::Cancer, &params.cancer), (CellKind::CytotoxicImmune, &params.cd8)] {
        if !(p.diameter > 0.0) {
            return invalid("diameter", format!("{} diameter must be positive, got {}", kind.name(), p.diameter));
        }
        if !(p.damping > 0.0) {
            return invalid("damping", format!("{} damping must be positive, got {}", kind.name(), p.damping));
        }
        if !(0.0..=1.0).contains(&p.migration_bias) {
            return invalid(
                "migration_bias",
                format!("{} migration bias must lie in [0, 1], got {}", kind.name(), p.migration_bias),
            );
        }
    }
    if !(params.recruitment.entry_distance > 0.0) {
        return invalid(
            "entry_distance",
            format!("must be positive, got {}", params.recruitment.entry_distance),
        );
    }
    if !(sim.substep_hours > 0.0) || sim.substep_hours > sim.step_hours {
        return invalid(
            "substep_hours",
            format!("must lie in (0, {}], got {}", sim.step_hours, sim.substep_hours),
        );
    }
    if sim.steps_per_day == 0 {
        return invalid("steps_per_day", "must be at least 1".to_owned());
    }
    Ok(())
}
