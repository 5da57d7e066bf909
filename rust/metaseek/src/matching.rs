//! Adduct-aware precursor mass matching.

use crate::adducts::AdductDefinition;
use crate::models::{
    Candidate,
    Feature,
    MetaboliteRecord,
};

pub const DEFAULT_TOLERANCE_PPM: f64 = 5.0;

/// m/z of `mass` ionized as `adduct`.
///
/// ```
/// use metaseek::adducts::AdductTable;
/// use metaseek::matching::theoretical_mz;
///
/// let table = AdductTable::default();
/// let dimer = table.get("[2M+H]+").unwrap();
/// let mz = theoretical_mz(180.0634, dimer);
/// assert!((mz - 361.134076).abs() < 1e-9);
/// ```
#[inline]
pub fn theoretical_mz(mass: f64, adduct: &AdductDefinition) -> f64 {
    (mass * adduct.multiplicity as f64 + adduct.mass_delta) / adduct.charge as f64
}

/// Signed relative error in parts per million, positive when the observation
/// is heavier than the expectation.
#[inline]
pub fn mass_error_ppm(observed_mz: f64, theoretical_mz: f64) -> f64 {
    (observed_mz - theoretical_mz) / theoretical_mz * 1e6
}

/// Returns a candidate when `adduct` applied to `metabolite` explains
/// `feature` within `tolerance_ppm`.
///
/// Polarity mismatches and metabolites without a usable mass yield `None`;
/// they are not errors. Adduct charges are guaranteed positive by the
/// [`crate::adducts::AdductTable`] validation.
pub fn match_candidate<'a>(
    feature: &'a Feature,
    metabolite: &'a MetaboliteRecord,
    adduct: &'a AdductDefinition,
    tolerance_ppm: f64,
) -> Option<Candidate<'a>> {
    if adduct.polarity != feature.mode {
        return None;
    }
    if !metabolite.has_valid_mass() {
        return None;
    }

    let theo = theoretical_mz(metabolite.monoisotopic_mass, adduct);
    if theo <= 0.0 {
        // Negative deltas on very light masses.
        return None;
    }
    let err = mass_error_ppm(feature.mz, theo);
    if err.abs() > tolerance_ppm {
        return None;
    }

    Some(Candidate {
        feature,
        metabolite,
        adduct,
        theoretical_mz: theo,
        mass_error_ppm: err,
    })
}
