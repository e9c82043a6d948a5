// src/model.rs
//
// Simulation types as strategy values plugged into the shared driver.
//
// Each model declares which fields it reads from files, writes to
// snapshots, and exchanges with a coupling peer, plus the three step-level
// capabilities the driver orchestrates: initialise, solve the diffusing
// fields, advance auxiliary per-point state.

use log::debug;

use crate::diffusion::{solve_steady_state, DiffusionProblem};
use crate::error::SimResult;
use crate::fields::{FieldId, FieldSet};
use crate::grid::Grid3;
use crate::ode;
use crate::params::{CellParams, VesselParams};
use crate::solver::SolverConfig;

/// Occupancy sum below which a point counts as healthy tissue and its
/// concentrations are pinned to the ambient values.
pub const NON_TISSUE_THRESHOLD: f64 = 1.0e-3;

/// Whether a coupled model receives on the very first step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceivePolicy {
    EveryStep,
    SkipFirstStep,
}

/// Capabilities a simulation type plugs into the driver.
pub trait SimulationModel {
    /// Short name used in snapshot file names.
    fn tag(&self) -> &'static str;

    /// Fields expected from the input dataset (absent arrays zero-fill).
    fn file_input_fields(&self) -> &'static [FieldId];

    /// Fields written to every snapshot.
    fn file_output_fields(&self) -> &'static [FieldId];

    /// Fields received from the coupling peer each step.
    fn coupling_input_fields(&self) -> &'static [FieldId];

    /// Fields sent to the coupling peer each step.
    fn coupling_output_fields(&self) -> &'static [FieldId];

    fn receive_policy(&self) -> ReceivePolicy;

    /// One-time setup after the field store exists.
    fn initialize(&mut self, grid: &Grid3, fields: &mut FieldSet) -> SimResult<()>;

    /// Recompute the diffusing species for this step.
    fn solve_fields(&mut self, grid: &Grid3, fields: &mut FieldSet) -> SimResult<()>;

    /// Advance per-point auxiliary state over one time increment.
    fn update_auxiliary_state(
        &mut self,
        grid: &Grid3,
        fields: &mut FieldSet,
        time_increment: f64,
    ) -> SimResult<()>;
}

const CELL_STATE_FIELDS: [FieldId; 6] = [
    FieldId::Proliferating,
    FieldId::Quiescent,
    FieldId::Apoptotic,
    FieldId::Necrotic,
    FieldId::Differentiated,
    FieldId::Tumour,
];

// ---------------------------------------------------------------------------
// Vessel model
// ---------------------------------------------------------------------------

const VESSEL_FILE_OUTPUTS: [FieldId; 9] = [
    FieldId::Proliferating,
    FieldId::Quiescent,
    FieldId::Differentiated,
    FieldId::Apoptotic,
    FieldId::Necrotic,
    FieldId::Tumour,
    FieldId::Vessel,
    FieldId::Stimulus,
    FieldId::Nutrient,
];

const VESSEL_COUPLING_OUTPUTS: [FieldId; 1] = [FieldId::Nutrient];

/// The vascular component: two diffusing species driven by the cell-state
/// occupancies, and a per-point vessel fraction ODE forced by both.
pub struct VesselModel {
    pub params: VesselParams,
    pub solver: SolverConfig,
}

impl VesselModel {
    pub fn new(params: VesselParams) -> Self {
        Self {
            params,
            solver: SolverConfig::default(),
        }
    }
}

impl SimulationModel for VesselModel {
    fn tag(&self) -> &'static str {
        "vessel"
    }

    fn file_input_fields(&self) -> &'static [FieldId] {
        &CELL_STATE_FIELDS
    }

    fn file_output_fields(&self) -> &'static [FieldId] {
        &VESSEL_FILE_OUTPUTS
    }

    fn coupling_input_fields(&self) -> &'static [FieldId] {
        &CELL_STATE_FIELDS
    }

    fn coupling_output_fields(&self) -> &'static [FieldId] {
        &VESSEL_COUPLING_OUTPUTS
    }

    fn receive_policy(&self) -> ReceivePolicy {
        ReceivePolicy::EveryStep
    }

    fn initialize(&mut self, _grid: &Grid3, fields: &mut FieldSet) -> SimResult<()> {
        fields.fill(FieldId::Vessel, self.params.initial_volume_fraction);
        Ok(())
    }

    fn solve_fields(&mut self, grid: &Grid3, fields: &mut FieldSet) -> SimResult<()> {
        let n = fields.n_points();
        fields.validate()?;

        // Non-tissue classification is shared by both species. Necrotic
        // material does not count as live tissue.
        let pinned: Vec<bool> = (0..n)
            .map(|p| {
                fields.proliferating[p]
                    + fields.quiescent[p]
                    + fields.apoptotic[p]
                    + fields.differentiated[p]
                    < NON_TISSUE_THRESHOLD
            })
            .collect();

        // Stimulus: released by stressed (quiescent + apoptotic) cells,
        // first-order decay everywhere.
        let reaction = vec![self.params.stimulus_decay_rate; n];
        let source: Vec<f64> = (0..n)
            .map(|p| self.params.stimulus_release_rate * (fields.quiescent[p] + fields.apoptotic[p]))
            .collect();
        let stats = solve_steady_state(
            grid,
            &DiffusionProblem {
                diffusivity: self.params.stimulus_diffusivity,
                reaction: &reaction,
                source: &source,
                pinned: &pinned,
                pinned_value: self.params.stimulus_concentration_healthy,
            },
            &mut fields.stimulus,
            &self.solver,
        )?;
        debug!(
            "stimulus solve: {} iterations, residual {:.3e}",
            stats.iterations, stats.residual
        );

        // Nutrient: consumed by live cells and taken up by vessels,
        // delivered in proportion to the local vessel fraction.
        let reaction: Vec<f64> = (0..n)
            .map(|p| {
                let live_cells =
                    fields.proliferating[p] + fields.quiescent[p] + fields.differentiated[p];
                fields.vessel[p] + self.params.nutrient_consumption_rate * live_cells
            })
            .collect();
        let source: Vec<f64> = (0..n)
            .map(|p| self.params.vessel_nutrient_concentration * fields.vessel[p])
            .collect();
        let stats = solve_steady_state(
            grid,
            &DiffusionProblem {
                diffusivity: self.params.nutrient_diffusivity,
                reaction: &reaction,
                source: &source,
                pinned: &pinned,
                pinned_value: self.params.nutrient_concentration_healthy,
            },
            &mut fields.nutrient,
            &self.solver,
        )?;
        debug!(
            "nutrient solve: {} iterations, residual {:.3e}",
            stats.iterations, stats.residual
        );

        Ok(())
    }

    fn update_auxiliary_state(
        &mut self,
        _grid: &Grid3,
        fields: &mut FieldSet,
        time_increment: f64,
    ) -> SimResult<()> {
        let FieldSet {
            vessel,
            stimulus,
            nutrient,
            ..
        } = fields;
        ode::advance_vessel_field(vessel, stimulus, nutrient, &self.params, time_increment);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Cell model
// ---------------------------------------------------------------------------

const CELL_FILE_INPUTS: [FieldId; 1] = [FieldId::ProliferationRateFactor];

const CELL_FILE_OUTPUTS: [FieldId; 8] = [
    FieldId::Proliferating,
    FieldId::Quiescent,
    FieldId::Differentiated,
    FieldId::Apoptotic,
    FieldId::Necrotic,
    FieldId::Tumour,
    FieldId::Nutrient,
    FieldId::ProliferationRateFactor,
];

const CELL_COUPLING_INPUTS: [FieldId; 1] = [FieldId::Nutrient];

/// Non-mechanical avascular spheroid growth: the tumour is a sphere whose
/// radius grows at a nutrient-limited surface rate, painted onto the grid
/// as proliferating/tumour occupancy.
pub struct CellModel {
    pub params: CellParams,
    current_volume: f64,
}

impl CellModel {
    pub fn new(params: CellParams) -> Self {
        let current_volume = params.initial_volume;
        Self {
            params,
            current_volume,
        }
    }

    pub fn current_volume(&self) -> f64 {
        self.current_volume
    }

    fn radius(&self) -> f64 {
        (3.0 * self.current_volume / (4.0 * std::f64::consts::PI)).cbrt()
    }

    /// Mark every grid point inside the current spheroid as proliferating
    /// tumour. Points the sphere has already covered stay covered.
    fn paint_spheroid(&self, grid: &Grid3, fields: &mut FieldSet) {
        let radius = self.radius();
        let centre = self.params.centre;
        for iz in 0..grid.nz {
            for iy in 0..grid.ny {
                for ix in 0..grid.nx {
                    let p = grid.index(ix, iy, iz);
                    let pos = grid.position(ix, iy, iz);
                    let dx = pos[0] - centre[0];
                    let dy = pos[1] - centre[1];
                    let dz = pos[2] - centre[2];
                    if (dx * dx + dy * dy + dz * dz).sqrt() < radius {
                        fields.proliferating[p] = 1.0;
                        fields.tumour[p] = 1.0;
                    }
                }
            }
        }
    }
}

impl SimulationModel for CellModel {
    fn tag(&self) -> &'static str {
        "cell"
    }

    fn file_input_fields(&self) -> &'static [FieldId] {
        &CELL_FILE_INPUTS
    }

    fn file_output_fields(&self) -> &'static [FieldId] {
        &CELL_FILE_OUTPUTS
    }

    fn coupling_input_fields(&self) -> &'static [FieldId] {
        &CELL_COUPLING_INPUTS
    }

    fn coupling_output_fields(&self) -> &'static [FieldId] {
        &CELL_STATE_FIELDS
    }

    fn receive_policy(&self) -> ReceivePolicy {
        // Nothing useful has been produced by the peer before step 0.
        ReceivePolicy::SkipFirstStep
    }

    fn initialize(&mut self, grid: &Grid3, fields: &mut FieldSet) -> SimResult<()> {
        self.current_volume = self.params.initial_volume;
        self.paint_spheroid(grid, fields);

        // When a spatial proliferation-rate factor was supplied, scale the
        // base rate by its average over the initial tumour.
        let mut factor_sum = 0.0;
        let mut n_tumour = 0usize;
        for p in 0..fields.n_points() {
            if fields.tumour[p] == 1.0 {
                factor_sum += fields.proliferation_rate_factor[p];
                n_tumour += 1;
            }
        }
        if n_tumour > 0 && factor_sum > 0.0 {
            let average = factor_sum / n_tumour as f64;
            debug!(
                "scaling proliferation rate by average factor {:.4} over {} tumour points",
                average, n_tumour
            );
            self.params.proliferation_rate *= average;
        }
        Ok(())
    }

    fn solve_fields(&mut self, _grid: &Grid3, _fields: &mut FieldSet) -> SimResult<()> {
        // The cell component has no diffusing species of its own; its
        // nutrient field arrives from the vessel peer or the input dataset.
        Ok(())
    }

    fn update_auxiliary_state(
        &mut self,
        grid: &Grid3,
        fields: &mut FieldSet,
        time_increment: f64,
    ) -> SimResult<()> {
        // Surface-limited growth: dr/dt = proliferation_rate / r^2.
        let mut radius = self.radius();
        radius += self.params.proliferation_rate / (radius * radius) * time_increment;
        self.current_volume = (4.0 / 3.0) * std::f64::consts::PI * radius.powi(3);

        self.paint_spheroid(grid, fields);
        Ok(())
    }
}
