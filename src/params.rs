// src/params.rs

use serde::{Deserialize, Serialize};

/// Parameters of the vascular component.
///
/// Defaults are the baseline clinical-image scenario; times in hours,
/// lengths in mm, concentrations in nominal units.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VesselParams {
    pub initial_volume_fraction: f64, // starting vessel volume fraction, uniform
    pub nutrient_diffusivity: f64,    // mm^2/hr
    pub stimulus_diffusivity: f64,    // mm^2/hr
    pub stimulus_decay_rate: f64,     // 1/hr
    pub stimulus_release_rate: f64,   // stimulus per occupancy per hr
    pub nutrient_consumption_rate: f64, // nutrient per occupancy per hr
    pub vessel_nutrient_concentration: f64, // nutrient level inside vessels
    pub stimulus_concentration_healthy: f64, // ambient stimulus outside the lesion
    pub nutrient_concentration_healthy: f64, // ambient nutrient outside the lesion
    pub max_vessel_fraction: f64,     // Vmax
    pub equilibrium_vessel_fraction: f64, // Veq
    pub vessel_growth_rate: f64,      // 1/hr, scales with local nutrient
    pub vessel_regression_rate: f64,  // 1/hr
    pub vessel_growth_substep: f64,   // hr, ODE sub-step within one increment
}

impl Default for VesselParams {
    fn default() -> Self {
        Self {
            initial_volume_fraction: 0.25,
            nutrient_diffusivity: 7.2,
            stimulus_diffusivity: 0.36,
            stimulus_decay_rate: 0.36,
            stimulus_release_rate: 1.48,
            nutrient_consumption_rate: 0.001,
            vessel_nutrient_concentration: 40.0,
            stimulus_concentration_healthy: 0.0,
            nutrient_concentration_healthy: 40.0,
            max_vessel_fraction: 0.5,
            equilibrium_vessel_fraction: 0.25,
            vessel_growth_rate: 0.1,
            vessel_regression_rate: 0.01,
            vessel_growth_substep: 1.0,
        }
    }
}

/// Parameters of the avascular spheroid cell component.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CellParams {
    pub proliferation_rate: f64, // mm^3/hr with plentiful nutrients
    pub initial_volume: f64,     // mm^3
    pub centre: [f64; 3],        // tumour centre, mm
}

impl Default for CellParams {
    fn default() -> Self {
        Self {
            proliferation_rate: 0.04,
            initial_volume: 1.0e5,
            centre: [0.0; 3],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vessel_defaults_are_self_consistent() {
        let p = VesselParams::default();
        assert!(p.equilibrium_vessel_fraction <= p.max_vessel_fraction);
        assert!(p.initial_volume_fraction <= p.max_vessel_fraction);
        assert!(p.vessel_growth_substep > 0.0);
    }
}
