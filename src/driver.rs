// src/driver.rs
//
// The per-step control loop shared by every simulation type:
// receive, solve, update, snapshot, send, advance, terminate.
//
// One driver instance owns the grid and the field store for its whole
// lifetime; models borrow the field store mutably for the duration of a
// single step call. Any error aborts the run at the step where it occurs;
// there is no retry or partial-failure handling.

use std::path::PathBuf;

use log::{debug, info};

use crate::coupling::{input_port, output_port, CouplingChannel};
use crate::error::{SimError, SimResult};
use crate::fields::FieldSet;
use crate::grid::Grid3;
use crate::model::{ReceivePolicy, SimulationModel};
use crate::vti::{self, ImageDataset};

/// Standalone runs read their inputs from a dataset; coupled runs take
/// geometry from the configuration and field data from the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Standalone,
    Coupled,
}

/// Lifecycle of one simulation instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Uninitialized,
    Initialized,
    Stepping,
    Finished,
}

/// Why the step loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The configured number of increments was exhausted.
    StepBudget,
    /// Elapsed simulated time reached the end time.
    EndTime,
}

/// Time-stepping controls.
#[derive(Debug, Clone, Copy)]
pub struct StepSettings {
    pub time_increment: f64,
    pub max_steps: usize,
    pub end_time: f64,
    /// Write a snapshot every this many steps.
    pub output_frequency: usize,
    /// Simulated time at the start of the run.
    pub start_time: f64,
}

impl Default for StepSettings {
    fn default() -> Self {
        Self {
            time_increment: 1.0,
            max_steps: 100,
            end_time: 100.0,
            output_frequency: 1,
            start_time: 0.0,
        }
    }
}

/// Everything the driver needs besides the model itself.
#[derive(Debug, Clone, Default)]
pub struct SimulationSettings {
    pub stepping: StepSettings,
    pub input_path: Option<PathBuf>,
    /// Snapshot path stem; files are written as `<stem>_<tag>_t_<time>.vti`.
    pub output_path: Option<PathBuf>,
    /// Explicit geometry, required in coupled mode.
    pub geometry: Option<Grid3>,
}

/// Summary of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub steps_completed: usize,
    pub final_time: f64,
    pub snapshots_written: usize,
    pub stop_reason: StopReason,
}

/// Driver state machine for one simulation instance.
pub struct Simulation<M: SimulationModel> {
    model: M,
    mode: RunMode,
    settings: SimulationSettings,
    state: RunState,
    current_time: f64,
    grid: Option<Grid3>,
    fields: Option<FieldSet>,
}

impl<M: SimulationModel> Simulation<M> {
    pub fn new(model: M, mode: RunMode, settings: SimulationSettings) -> Self {
        let current_time = settings.stepping.start_time;
        Self {
            model,
            mode,
            settings,
            state: RunState::Uninitialized,
            current_time,
            grid: None,
            fields: None,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn grid(&self) -> Option<&Grid3> {
        self.grid.as_ref()
    }

    pub fn fields(&self) -> Option<&FieldSet> {
        self.fields.as_ref()
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Build the grid and field store and run the model's one-time setup.
    ///
    /// Standalone: geometry and declared input arrays come from the input
    /// dataset (a missing input path is fatal; a missing declared array is
    /// not and zero-fills). Coupled: geometry comes from the settings.
    pub fn initialize(&mut self) -> SimResult<()> {
        if self.state != RunState::Uninitialized {
            return Err(SimError::config("simulation is already initialized"));
        }

        let (grid, dataset) = match self.mode {
            RunMode::Standalone => {
                let path = self.settings.input_path.as_ref().ok_or_else(|| {
                    SimError::config("standalone mode requires an input dataset path")
                })?;
                let dataset = vti::read_vti(path)?;
                (dataset.grid()?, Some(dataset))
            }
            RunMode::Coupled => {
                let grid = self.settings.geometry.ok_or_else(|| {
                    SimError::config("coupled mode requires explicit grid geometry")
                })?;
                (grid, None)
            }
        };

        let mut fields = FieldSet::new(&grid);

        if let Some(dataset) = dataset {
            for &id in self.model.file_input_fields() {
                match dataset.array(id.name()) {
                    Some(values) => fields.set(id, values.to_vec())?,
                    None => {
                        // Absent optional input: keep zeros.
                        debug!("input dataset has no '{}' array, using zeros", id.name());
                    }
                }
            }
        }

        self.model.initialize(&grid, &mut fields)?;

        self.grid = Some(grid);
        self.fields = Some(fields);
        self.state = RunState::Initialized;
        info!(
            "{} simulation initialized: {}x{}x{} points, spacing {}",
            self.model.tag(),
            grid.nx,
            grid.ny,
            grid.nz,
            grid.spacing
        );
        Ok(())
    }

    /// Run the step loop to completion.
    ///
    /// In coupled mode a channel is mandatory; it must already be open and
    /// stays open for the whole loop. The loop is bounded by the step
    /// budget, and additionally stops once elapsed time reaches the end
    /// time (checked after advancing the clock).
    pub fn run(&mut self, mut channel: Option<&mut dyn CouplingChannel>) -> SimResult<RunReport> {
        if self.state == RunState::Uninitialized {
            self.initialize()?;
        }
        if self.mode == RunMode::Coupled && channel.is_none() {
            return Err(SimError::config("coupled mode requires a coupling channel"));
        }

        let stepping = self.settings.stepping;
        let mut snapshots_written = 0usize;
        let mut steps_completed = 0usize;
        let mut stop_reason = StopReason::StepBudget;

        self.state = RunState::Stepping;

        for step in 0..stepping.max_steps {
            // 1. Pull updated peer fields.
            if let Some(channel) = channel.as_deref_mut() {
                let receive_now = match self.model.receive_policy() {
                    ReceivePolicy::EveryStep => true,
                    ReceivePolicy::SkipFirstStep => step > 0,
                };
                if receive_now {
                    self.receive_inputs(channel)?;
                }
            }

            // 2./3. Solve the diffusing species, then advance auxiliary
            // state from the freshly solved fields.
            {
                let grid = self.grid.as_ref().expect("initialized");
                let fields = self.fields.as_mut().expect("initialized");
                self.model.solve_fields(grid, fields)?;
                self.model
                    .update_auxiliary_state(grid, fields, stepping.time_increment)?;
            }

            // 4. Snapshot on cadence.
            if step % stepping.output_frequency.max(1) == 0 {
                self.write_snapshot()?;
                snapshots_written += 1;
            }

            // 5. Push this step's outputs to the peer.
            if let Some(channel) = channel.as_deref_mut() {
                self.send_outputs(channel)?;
            }

            // 6. Advance the clock.
            self.current_time += stepping.time_increment;
            steps_completed = step + 1;

            if self.current_time >= stepping.end_time {
                stop_reason = StopReason::EndTime;
                break;
            }
        }

        self.state = RunState::Finished;
        let report = RunReport {
            steps_completed,
            final_time: self.current_time,
            snapshots_written,
            stop_reason,
        };
        info!(
            "{} simulation finished: {} steps, t = {}, {} snapshots ({:?})",
            self.model.tag(),
            report.steps_completed,
            report.final_time,
            report.snapshots_written,
            report.stop_reason
        );
        Ok(report)
    }

    fn receive_inputs(&mut self, channel: &mut dyn CouplingChannel) -> SimResult<()> {
        let fields = self.fields.as_mut().expect("initialized");
        let n = fields.n_points();
        for &id in self.model.coupling_input_fields() {
            let values = channel.receive(&input_port(id.name()))?;
            SimError::check_len(id.name(), n, values.len())?;
            fields.set(id, values)?;
        }
        Ok(())
    }

    fn send_outputs(&mut self, channel: &mut dyn CouplingChannel) -> SimResult<()> {
        let fields = self.fields.as_ref().expect("initialized");
        for &id in self.model.coupling_output_fields() {
            channel.send(&output_port(id.name()), fields.get(id))?;
        }
        Ok(())
    }

    fn write_snapshot(&mut self) -> SimResult<()> {
        let stem = self.settings.output_path.as_ref().ok_or_else(|| {
            SimError::config("a snapshot is due but no output path is configured")
        })?;
        let grid = self.grid.as_ref().expect("initialized");
        let fields = self.fields.as_ref().expect("initialized");
        fields.validate()?;

        let mut dataset = ImageDataset::for_grid(grid);
        for &id in self.model.file_output_fields() {
            dataset
                .arrays
                .push((id.name().to_string(), fields.get(id).to_vec()));
        }

        let path = PathBuf::from(format!(
            "{}_{}_t_{}.vti",
            stem.display(),
            self.model.tag(),
            self.current_time
        ));
        vti::write_vti(&path, &dataset)?;
        debug!("wrote snapshot {}", path.display());
        Ok(())
    }
}
