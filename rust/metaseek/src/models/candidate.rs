use super::{
    Feature,
    MetaboliteRecord,
};
use crate::adducts::AdductDefinition;
use crate::matching::{
    mass_error_ppm,
    theoretical_mz,
};

/// A putative annotation of a feature: one metabolite ionized as one adduct.
///
/// Candidates only exist within tolerance; see [`crate::matching::match_candidate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate<'a> {
    pub feature: &'a Feature,
    pub metabolite: &'a MetaboliteRecord,
    pub adduct: &'a AdductDefinition,
    pub theoretical_mz: f64,
    pub mass_error_ppm: f64,
}

impl<'a> Candidate<'a> {
    /// Builds a candidate without checking the tolerance window.
    ///
    /// Meant for candidate lists computed elsewhere (e.g. a previous run) that
    /// are handed straight to the scorer. The derived values are recomputed
    /// from the triple so they stay consistent with the matcher.
    pub fn from_parts(
        feature: &'a Feature,
        metabolite: &'a MetaboliteRecord,
        adduct: &'a AdductDefinition,
    ) -> Self {
        let theoretical_mz = theoretical_mz(metabolite.monoisotopic_mass, adduct);
        Self {
            feature,
            metabolite,
            adduct,
            theoretical_mz,
            mass_error_ppm: mass_error_ppm(feature.mz, theoretical_mz),
        }
    }

    pub fn abs_mass_error_ppm(&self) -> f64 {
        self.mass_error_ppm.abs()
    }
}
