//! Candidate generation: features x metabolites x adducts.
//!
//! Output order is always: features in input order, then metabolites in
//! input order, then adducts in table order. The indexed path re-sorts its
//! hits so both paths emit identical sequences.

use crate::adducts::{
    AdductDefinition,
    AdductTable,
};
use crate::errors::ScoringError;
use crate::matching::{
    match_candidate,
    theoretical_mz,
};
use crate::models::{
    Candidate,
    Feature,
    MetaboliteRecord,
    Polarity,
};
use rayon::prelude::*;
use tracing::debug;

/// Slack applied to the index window so float rounding at the boundary never
/// hides a hit; every hit is re-checked by the matcher anyway.
const INDEX_WINDOW_SLACK: f64 = 1e-9;

/// Lazily yields every in-tolerance candidate.
pub fn generate<'a>(
    features: &'a [Feature],
    metabolites: &'a [MetaboliteRecord],
    adducts: &'a AdductTable,
    tolerance_ppm: f64,
) -> impl Iterator<Item = Candidate<'a>> + 'a {
    features
        .iter()
        .flat_map(move |feature| exhaustive_for_feature(feature, metabolites, adducts, tolerance_ppm))
}

fn exhaustive_for_feature<'a>(
    feature: &'a Feature,
    metabolites: &'a [MetaboliteRecord],
    adducts: &'a AdductTable,
    tolerance_ppm: f64,
) -> impl Iterator<Item = Candidate<'a>> + 'a {
    metabolites.iter().flat_map(move |metabolite| {
        adducts
            .for_polarity(feature.mode)
            .filter_map(move |adduct| match_candidate(feature, metabolite, adduct, tolerance_ppm))
    })
}

#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    mz: f64,
    metabolite_idx: u32,
    adduct_idx: u32,
}

/// Theoretical m/z of every (metabolite, adduct) pair, sorted per polarity.
#[derive(Debug)]
pub struct MzIndex<'a> {
    metabolites: &'a [MetaboliteRecord],
    adducts: &'a [AdductDefinition],
    positive: Vec<IndexEntry>,
    negative: Vec<IndexEntry>,
}

impl<'a> MzIndex<'a> {
    pub fn build(metabolites: &'a [MetaboliteRecord], adducts: &'a AdductTable) -> Self {
        let adducts = adducts.as_slice();
        let mut positive = Vec::new();
        let mut negative = Vec::new();

        for (metabolite_idx, metabolite) in metabolites.iter().enumerate() {
            if !metabolite.has_valid_mass() {
                continue;
            }
            for (adduct_idx, adduct) in adducts.iter().enumerate() {
                let entry = IndexEntry {
                    mz: theoretical_mz(metabolite.monoisotopic_mass, adduct),
                    metabolite_idx: metabolite_idx as u32,
                    adduct_idx: adduct_idx as u32,
                };
                match adduct.polarity {
                    Polarity::Positive => positive.push(entry),
                    Polarity::Negative => negative.push(entry),
                }
            }
        }

        positive.par_sort_unstable_by(|a, b| a.mz.total_cmp(&b.mz));
        negative.par_sort_unstable_by(|a, b| a.mz.total_cmp(&b.mz));
        debug!(
            "Built m/z index with {} positive and {} negative entries",
            positive.len(),
            negative.len()
        );

        Self {
            metabolites,
            adducts,
            positive,
            negative,
        }
    }

    pub fn len(&self) -> usize {
        self.positive.len() + self.negative.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All candidates for `feature`, in canonical order.
    pub fn query(&self, feature: &'a Feature, tolerance_ppm: f64) -> Vec<Candidate<'a>> {
        let entries = match feature.mode {
            Polarity::Positive => &self.positive,
            Polarity::Negative => &self.negative,
        };

        // |obs - t| / t <= tol  <=>  obs / (1 + tol) <= t <= obs / (1 - tol)
        let rel = tolerance_ppm * 1e-6;
        let lo = feature.mz / (1.0 + rel) * (1.0 - INDEX_WINDOW_SLACK);
        let hi = if rel < 1.0 {
            feature.mz / (1.0 - rel) * (1.0 + INDEX_WINDOW_SLACK)
        } else {
            f64::INFINITY
        };

        let start = entries.partition_point(|e| e.mz < lo);
        let mut hits: Vec<(u32, u32, Candidate<'a>)> = entries[start..]
            .iter()
            .take_while(|e| e.mz <= hi)
            .filter_map(|e| {
                let metabolite = &self.metabolites[e.metabolite_idx as usize];
                let adduct = &self.adducts[e.adduct_idx as usize];
                match_candidate(feature, metabolite, adduct, tolerance_ppm)
                    .map(|c| (e.metabolite_idx, e.adduct_idx, c))
            })
            .collect();

        hits.sort_unstable_by_key(|(m, a, _)| (*m, *a));
        hits.into_iter().map(|(_, _, c)| c).collect()
    }
}

/// Candidate generation over an immutable reference set.
///
/// The metabolite set is passed in explicitly so the generator can be
/// exercised with small synthetic tables.
pub struct CandidateGenerator<'a> {
    metabolites: &'a [MetaboliteRecord],
    adducts: &'a AdductTable,
    tolerance_ppm: f64,
    index: Option<MzIndex<'a>>,
}

impl<'a> CandidateGenerator<'a> {
    pub fn new(
        metabolites: &'a [MetaboliteRecord],
        adducts: &'a AdductTable,
        tolerance_ppm: f64,
    ) -> Result<Self, ScoringError> {
        if !tolerance_ppm.is_finite() || tolerance_ppm <= 0.0 {
            return Err(ScoringError::InvalidTolerance {
                value: tolerance_ppm,
            });
        }
        Ok(Self {
            metabolites,
            adducts,
            tolerance_ppm,
            index: None,
        })
    }

    /// Pre-sorts theoretical m/z values so each feature is a binary search
    /// instead of a full scan.
    pub fn with_index(mut self) -> Self {
        self.index = Some(MzIndex::build(self.metabolites, self.adducts));
        self
    }

    pub fn tolerance_ppm(&self) -> f64 {
        self.tolerance_ppm
    }

    pub fn for_feature(&self, feature: &'a Feature) -> Vec<Candidate<'a>> {
        match &self.index {
            Some(index) => index.query(feature, self.tolerance_ppm),
            None => {
                exhaustive_for_feature(feature, self.metabolites, self.adducts, self.tolerance_ppm)
                    .collect()
            }
        }
    }

    /// Streams candidates feature by feature.
    pub fn iter<'g>(
        &'g self,
        features: &'a [Feature],
    ) -> impl Iterator<Item = Candidate<'a>> + 'g
    where
        'a: 'g,
    {
        features.iter().flat_map(move |f| self.for_feature(f))
    }

    /// Generates the candidates of every feature in parallel.
    ///
    /// The outer vector is aligned with `features`.
    pub fn par_generate(&self, features: &'a [Feature]) -> Vec<Vec<Candidate<'a>>> {
        features.par_iter().map(|f| self.for_feature(f)).collect()
    }
}
