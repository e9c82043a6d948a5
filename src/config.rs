// src/config.rs

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

use crate::driver::{SimulationSettings, StepSettings};
use crate::error::{SimError, SimResult};
use crate::grid::Grid3;
use crate::params::{CellParams, VesselParams};

/// Complete run configuration, loadable from JSON and written back next to
/// the outputs for provenance. Every section has usable defaults so a
/// partial file is enough.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RunConfig {
    pub geometry: Option<GeometryConfig>,
    pub time: TimeConfig,
    pub io: IoConfig,
    pub coupled: bool,
    pub vessel: VesselParams,
    pub cell: CellParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    pub spacing: f64,
    pub origin: [f64; 3],
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            nx: 10,
            ny: 10,
            nz: 10,
            spacing: 1.0,
            origin: [0.0; 3],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    pub increment: f64,
    pub max_steps: usize,
    pub end_time: f64,
    pub output_frequency: usize,
    pub start_time: f64,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            increment: 1.0,
            max_steps: 100,
            end_time: 100.0,
            output_frequency: 1,
            start_time: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct IoConfig {
    pub input: Option<String>,
    pub output: Option<String>,
}

impl RunConfig {
    /// Load a configuration from a JSON file.
    pub fn load(path: &Path) -> SimResult<Self> {
        let file = File::open(path)
            .map_err(|e| SimError::config(format!("cannot open config {}: {}", path.display(), e)))?;
        serde_json::from_reader(file)
            .map_err(|e| SimError::config(format!("cannot parse config {}: {}", path.display(), e)))
    }

    /// Write the effective configuration next to the outputs.
    pub fn write(&self, path: &Path) -> SimResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)
            .map_err(|e| SimError::config(format!("cannot serialize config: {}", e)))
    }

    /// Explicit grid geometry, when configured.
    pub fn grid(&self) -> SimResult<Option<Grid3>> {
        match &self.geometry {
            Some(g) => Ok(Some(Grid3::new(g.nx, g.ny, g.nz, g.spacing, g.origin)?)),
            None => Ok(None),
        }
    }

    /// Driver settings derived from this configuration.
    pub fn simulation_settings(&self) -> SimResult<SimulationSettings> {
        Ok(SimulationSettings {
            stepping: StepSettings {
                time_increment: self.time.increment,
                max_steps: self.time.max_steps,
                end_time: self.time.end_time,
                output_frequency: self.time.output_frequency,
                start_time: self.time.start_time,
            },
            input_path: self.io.input.as_ref().map(Into::into),
            output_path: self.io.output.as_ref().map(Into::into),
            geometry: self.grid()?,
        })
    }
}
