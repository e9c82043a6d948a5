// src/fields.rs
//
// Dense per-point scalar fields on one grid.
//
// Field identity is a closed enumeration rather than a string-keyed map,
// so a typo in a field name cannot surface as a runtime lookup failure.
// The string vocabulary is kept only at the I/O boundary (datasets and
// coupling ports), where external collaborators address fields by name.

use crate::error::{SimError, SimResult};
use crate::grid::Grid3;

/// Identifier for every scalar field the simulations know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldId {
    /// Proliferating tumour cell occupancy fraction.
    Proliferating,
    /// Quiescent tumour cell occupancy fraction.
    Quiescent,
    /// Apoptotic tumour cell occupancy fraction.
    Apoptotic,
    /// Necrotic tumour cell occupancy fraction.
    Necrotic,
    /// Differentiated tumour cell occupancy fraction.
    Differentiated,
    /// Tumour presence flag (1 inside the lesion, 0 outside).
    Tumour,
    /// Diffusible growth stimulus released by stressed cells.
    Stimulus,
    /// Diffusible nutrient concentration.
    Nutrient,
    /// Vessel volume fraction.
    Vessel,
    /// Spatial modifier for the cell proliferation rate.
    ProliferationRateFactor,
}

impl FieldId {
    pub const ALL: [FieldId; 10] = [
        FieldId::Proliferating,
        FieldId::Quiescent,
        FieldId::Apoptotic,
        FieldId::Necrotic,
        FieldId::Differentiated,
        FieldId::Tumour,
        FieldId::Stimulus,
        FieldId::Nutrient,
        FieldId::Vessel,
        FieldId::ProliferationRateFactor,
    ];

    /// External name used in datasets and coupling ports.
    pub fn name(self) -> &'static str {
        match self {
            FieldId::Proliferating => "proliferating",
            FieldId::Quiescent => "quiescent",
            FieldId::Apoptotic => "apoptotic",
            FieldId::Necrotic => "necrotic",
            FieldId::Differentiated => "differentiated",
            FieldId::Tumour => "tumour",
            FieldId::Stimulus => "stimulus",
            FieldId::Nutrient => "nutrient",
            FieldId::Vessel => "vessel",
            FieldId::ProliferationRateFactor => "proliferation_rate_factor",
        }
    }

    /// Inverse of [`FieldId::name`].
    pub fn from_name(name: &str) -> Option<FieldId> {
        Self::ALL.iter().copied().find(|id| id.name() == name)
    }
}

/// One dense array per field, all of length `grid.n_points()`.
///
/// Created once at initialisation and owned by the driver for the lifetime
/// of the run; solver and updater code receives it mutably for the duration
/// of one step and must leave every array at the invariant length.
pub struct FieldSet {
    n_points: usize,
    pub proliferating: Vec<f64>,
    pub quiescent: Vec<f64>,
    pub apoptotic: Vec<f64>,
    pub necrotic: Vec<f64>,
    pub differentiated: Vec<f64>,
    pub tumour: Vec<f64>,
    pub stimulus: Vec<f64>,
    pub nutrient: Vec<f64>,
    pub vessel: Vec<f64>,
    pub proliferation_rate_factor: Vec<f64>,
}

impl FieldSet {
    /// Allocate all fields zero-filled on the given grid.
    pub fn new(grid: &Grid3) -> Self {
        let n = grid.n_points();
        Self {
            n_points: n,
            proliferating: vec![0.0; n],
            quiescent: vec![0.0; n],
            apoptotic: vec![0.0; n],
            necrotic: vec![0.0; n],
            differentiated: vec![0.0; n],
            tumour: vec![0.0; n],
            stimulus: vec![0.0; n],
            nutrient: vec![0.0; n],
            vessel: vec![0.0; n],
            proliferation_rate_factor: vec![0.0; n],
        }
    }

    /// Number of points every array must have.
    #[inline]
    pub fn n_points(&self) -> usize {
        self.n_points
    }

    pub fn get(&self, id: FieldId) -> &[f64] {
        match id {
            FieldId::Proliferating => &self.proliferating,
            FieldId::Quiescent => &self.quiescent,
            FieldId::Apoptotic => &self.apoptotic,
            FieldId::Necrotic => &self.necrotic,
            FieldId::Differentiated => &self.differentiated,
            FieldId::Tumour => &self.tumour,
            FieldId::Stimulus => &self.stimulus,
            FieldId::Nutrient => &self.nutrient,
            FieldId::Vessel => &self.vessel,
            FieldId::ProliferationRateFactor => &self.proliferation_rate_factor,
        }
    }

    pub fn get_mut(&mut self, id: FieldId) -> &mut Vec<f64> {
        match id {
            FieldId::Proliferating => &mut self.proliferating,
            FieldId::Quiescent => &mut self.quiescent,
            FieldId::Apoptotic => &mut self.apoptotic,
            FieldId::Necrotic => &mut self.necrotic,
            FieldId::Differentiated => &mut self.differentiated,
            FieldId::Tumour => &mut self.tumour,
            FieldId::Stimulus => &mut self.stimulus,
            FieldId::Nutrient => &mut self.nutrient,
            FieldId::Vessel => &mut self.vessel,
            FieldId::ProliferationRateFactor => &mut self.proliferation_rate_factor,
        }
    }

    /// Replace a field's values, rejecting a wrong-length vector.
    pub fn set(&mut self, id: FieldId, values: Vec<f64>) -> SimResult<()> {
        SimError::check_len(id.name(), self.n_points, values.len())?;
        *self.get_mut(id) = values;
        Ok(())
    }

    /// Set every point of a field to the same value.
    pub fn fill(&mut self, id: FieldId, value: f64) {
        self.get_mut(id).fill(value);
    }

    /// Check the length invariant on every array.
    pub fn validate(&self) -> SimResult<()> {
        for id in FieldId::ALL {
            SimError::check_len(id.name(), self.n_points, self.get(id).len())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Grid3 {
        Grid3::new(3, 2, 2, 1.0, [0.0; 3]).unwrap()
    }

    #[test]
    fn all_fields_sized_to_grid() {
        let fields = FieldSet::new(&grid());
        assert_eq!(fields.n_points(), 12);
        for id in FieldId::ALL {
            assert_eq!(fields.get(id).len(), 12);
        }
        fields.validate().unwrap();
    }

    #[test]
    fn set_rejects_wrong_length() {
        let mut fields = FieldSet::new(&grid());
        assert!(fields.set(FieldId::Nutrient, vec![1.0; 12]).is_ok());
        assert!(fields.set(FieldId::Nutrient, vec![1.0; 11]).is_err());
        assert_eq!(fields.nutrient[0], 1.0);
    }

    #[test]
    fn names_round_trip() {
        for id in FieldId::ALL {
            assert_eq!(FieldId::from_name(id.name()), Some(id));
        }
        assert_eq!(FieldId::from_name("no_such_field"), None);
    }

    #[test]
    fn validate_catches_corrupted_length() {
        let mut fields = FieldSet::new(&grid());
        fields.vessel.truncate(5);
        assert!(fields.validate().is_err());
    }
}
