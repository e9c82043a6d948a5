// src/ode.rs
//
// Vascular growth kinetics: one scalar ODE integrated independently at
// every grid point, forced by the freshly solved stimulus and nutrient
// fields. There is no coupling between points, so the sweep parallelises
// freely.

use rayon::prelude::*;

use crate::params::VesselParams;

/// Stimulus level above which the growth term switches on.
pub const STIMULUS_THRESHOLD: f64 = 0.5;

/// Vascular adaptation law
///
///   dV/dt = r0 (Vmax - V) - r1 (V - Veq)
///
/// with a growth term pulling toward the maximum fraction and a regression
/// term pulling back to the equilibrium fraction.
#[derive(Debug, Clone, Copy)]
pub struct VesselGrowthOde {
    pub v_max: f64,
    pub v_eq: f64,
    pub r0: f64,
    pub r1: f64,
}

impl VesselGrowthOde {
    #[inline]
    pub fn derivative(&self, v: f64) -> f64 {
        self.r0 * (self.v_max - v) - self.r1 * (v - self.v_eq)
    }

    /// Stationary value the solution relaxes toward (r0 + r1 > 0).
    pub fn fixed_point(&self) -> f64 {
        (self.r0 * self.v_max + self.r1 * self.v_eq) / (self.r0 + self.r1)
    }

    /// Integrate from `v0` over `t_span` with forward Euler sub-steps of
    /// size `dt`; the final sub-step is clipped to land exactly on the
    /// span. Returns the value at the end of the span.
    pub fn integrate(&self, v0: f64, t_span: f64, dt: f64) -> f64 {
        debug_assert!(dt > 0.0);
        let mut v = v0;
        let mut t = 0.0;
        while t_span - t > 1e-12 {
            let h = dt.min(t_span - t);
            v += h * self.derivative(v);
            t += h;
        }
        v
    }
}

/// Advance the vessel fraction at every point over one macro increment.
///
/// The growth rate r0 is gated point-wise on the stimulus field: above the
/// threshold it scales with the local nutrient level, otherwise only the
/// regression term acts. The stimulus and nutrient fields are frozen for
/// the duration of the sweep.
pub fn advance_vessel_field(
    vessel: &mut [f64],
    stimulus: &[f64],
    nutrient: &[f64],
    params: &VesselParams,
    time_increment: f64,
) {
    debug_assert_eq!(vessel.len(), stimulus.len());
    debug_assert_eq!(vessel.len(), nutrient.len());

    vessel
        .par_iter_mut()
        .enumerate()
        .for_each(|(p, v)| {
            let r0 = if stimulus[p] > STIMULUS_THRESHOLD {
                params.vessel_growth_rate * nutrient[p]
            } else {
                0.0
            };
            let ode = VesselGrowthOde {
                v_max: params.max_vessel_fraction,
                v_eq: params.equilibrium_vessel_fraction,
                r0,
                r1: params.vessel_regression_rate,
            };
            *v = ode.integrate(*v, time_increment, params.vessel_growth_substep);
        });
}
