//! Combines sub-scores and orders the candidates of each feature.

use super::scorer::ScoredCandidate;
use crate::errors::ScoringError;
use serde::{
    Deserialize,
    Serialize,
};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Linear weights of the ensemble score. They do not need to sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnsembleWeights {
    #[serde(default = "default_weight")]
    pub w_mass: f64,
    #[serde(default = "default_weight")]
    pub w_adduct: f64,
    #[serde(default = "default_weight")]
    pub w_rt: f64,
}

fn default_weight() -> f64 {
    1.0
}

impl Default for EnsembleWeights {
    fn default() -> Self {
        Self {
            w_mass: 1.0,
            w_adduct: 1.0,
            w_rt: 1.0,
        }
    }
}

impl EnsembleWeights {
    pub fn new(w_mass: f64, w_adduct: f64, w_rt: f64) -> Result<Self, ScoringError> {
        let out = Self {
            w_mass,
            w_adduct,
            w_rt,
        };
        out.validate()?;
        Ok(out)
    }

    pub fn validate(&self) -> Result<(), ScoringError> {
        for (name, value) in [
            ("w_mass", self.w_mass),
            ("w_adduct", self.w_adduct),
            ("w_rt", self.w_rt),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ScoringError::InvalidWeight { name, value });
            }
        }
        Ok(())
    }

    pub fn combine(&self, mass_score: f64, adduct_score: f64, rt_score: f64) -> f64 {
        self.w_mass * mass_score + self.w_adduct * adduct_score + self.w_rt * rt_score
    }
}

/// Ordering of candidates within a feature: higher ensemble score first,
/// then smaller absolute mass error, then earlier adduct in the table,
/// then metabolite id.
///
/// Two candidates of one feature only compare equal when they share the
/// adduct and the metabolite id, so the order never depends on the input
/// order.
pub fn candidate_order(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.ensemble_score
        .total_cmp(&a.ensemble_score)
        .then_with(|| {
            a.candidate
                .abs_mass_error_ppm()
                .total_cmp(&b.candidate.abs_mass_error_ppm())
        })
        .then_with(|| a.candidate.adduct.order.cmp(&b.candidate.adduct.order))
        .then_with(|| a.candidate.metabolite.id.cmp(&b.candidate.metabolite.id))
        .then_with(|| {
            a.candidate
                .metabolite
                .monoisotopic_mass
                .total_cmp(&b.candidate.metabolite.monoisotopic_mass)
        })
}

/// Recomputes the ensemble score with `weights` and ranks candidates per
/// feature id.
///
/// Every candidate is kept. Isomers matched through the same adduct are
/// ordered by metabolite id; see [`candidate_order`].
#[cfg_attr(
    feature = "instrumentation",
    tracing::instrument(skip_all, level = "trace")
)]
pub fn rank<'a>(
    scored: Vec<ScoredCandidate<'a>>,
    weights: &EnsembleWeights,
) -> BTreeMap<usize, Vec<ScoredCandidate<'a>>> {
    let mut groups: BTreeMap<usize, Vec<ScoredCandidate<'a>>> = BTreeMap::new();
    for mut s in scored.into_iter() {
        s.ensemble_score = weights.combine(s.mass_score, s.adduct_score, s.rt_score);
        groups.entry(s.candidate.feature.id).or_default().push(s);
    }

    for group in groups.values_mut() {
        group.sort_by(candidate_order);
        for (i, s) in group.iter_mut().enumerate() {
            s.rank = i + 1;
        }
    }
    groups
}
