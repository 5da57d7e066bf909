use super::ranker::EnsembleWeights;
use crate::adducts::AdductPriors;
use crate::errors::ScoringError;
use crate::models::{
    Candidate,
    MetaboliteRecord,
};
use crate::properties::{
    DescriptorVector,
    PropertyJoiner,
};
use crate::rt_prediction::{
    RtPrediction,
    RtPredictor,
};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::time::{
    Duration,
    Instant,
};
use tracing::{
    debug,
    warn,
};

/// Retention time score used when no prediction is available.
pub const NEUTRAL_RT_SCORE: f64 = 0.5;

/// Gaussian falloff of the mass error.
///
/// 1.0 at zero error and `exp(-1)` at the tolerance boundary.
///
/// ```
/// use metaseek::scoring::mass_score;
/// assert_eq!(mass_score(0.0, 5.0), 1.0);
/// assert!((mass_score(-5.0, 5.0) - (-1.0f64).exp()).abs() < 1e-12);
/// ```
pub fn mass_score(mass_error_ppm: f64, tolerance_ppm: f64) -> f64 {
    let x = mass_error_ppm / tolerance_ppm;
    (-(x * x)).exp()
}

/// A candidate with all of its sub-scores attached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredCandidate<'a> {
    pub candidate: Candidate<'a>,
    pub mass_score: f64,
    pub adduct_score: f64,
    pub rt_prediction: Option<RtPrediction>,
    pub rt_score: f64,
    pub ensemble_score: f64,
    /// 1-based position within the feature, 0 until ranked.
    pub rank: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScoringMetrics {
    pub num_scored: usize,
    pub num_unknown_adduct: usize,
    pub num_invalid_mass: usize,
    pub num_neutral_rt: usize,
    pub num_predicted_metabolites: usize,
    pub elapsed: Duration,
}

impl Serialize for ScoringMetrics {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("ScoringMetrics", 6)?;
        state.serialize_field("num_scored", &self.num_scored)?;
        state.serialize_field("num_unknown_adduct", &self.num_unknown_adduct)?;
        state.serialize_field("num_invalid_mass", &self.num_invalid_mass)?;
        state.serialize_field("num_neutral_rt", &self.num_neutral_rt)?;
        state.serialize_field("num_predicted_metabolites", &self.num_predicted_metabolites)?;
        state.serialize_field("elapsed_ms", &self.elapsed.as_millis())?;
        state.end()
    }
}

impl std::ops::AddAssign for ScoringMetrics {
    fn add_assign(&mut self, rhs: Self) {
        self.num_scored += rhs.num_scored;
        self.num_unknown_adduct += rhs.num_unknown_adduct;
        self.num_invalid_mass += rhs.num_invalid_mass;
        self.num_neutral_rt += rhs.num_neutral_rt;
        self.num_predicted_metabolites += rhs.num_predicted_metabolites;
        self.elapsed += rhs.elapsed;
    }
}

/// Computes the mass, adduct and retention time sub-scores of candidates.
///
/// The scorer holds no mutable state; the same instance is shared across
/// threads. The retention time model is passed per call so the scorer does
/// not care how many models sit behind it.
#[derive(Debug, Clone)]
pub struct Scorer {
    tolerance_ppm: f64,
    priors: AdductPriors,
    joiner: PropertyJoiner,
    neutral_rt_score: f64,
}

impl Scorer {
    pub fn new(
        tolerance_ppm: f64,
        priors: AdductPriors,
        joiner: PropertyJoiner,
    ) -> Result<Self, ScoringError> {
        if !tolerance_ppm.is_finite() || tolerance_ppm <= 0.0 {
            return Err(ScoringError::InvalidTolerance {
                value: tolerance_ppm,
            });
        }
        Ok(Self {
            tolerance_ppm,
            priors,
            joiner,
            neutral_rt_score: NEUTRAL_RT_SCORE,
        })
    }

    pub fn with_neutral_rt_score(mut self, value: f64) -> Result<Self, ScoringError> {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(ScoringError::InvalidWeight {
                name: "neutral_rt_score",
                value,
            });
        }
        self.neutral_rt_score = value;
        Ok(self)
    }

    pub fn tolerance_ppm(&self) -> f64 {
        self.tolerance_ppm
    }

    pub fn descriptors(&self, candidate: &Candidate) -> DescriptorVector {
        self.joiner.descriptors(candidate.metabolite)
    }

    /// Scores a single candidate, asking `rt_model` for its prediction.
    pub fn score<'a>(
        &self,
        candidate: Candidate<'a>,
        rt_model: &dyn RtPredictor,
    ) -> Result<ScoredCandidate<'a>, ScoringError> {
        // The prior is checked first so a dropped candidate never costs a prediction.
        self.priors.prior(&candidate.adduct.name)?;
        let prediction = rt_model.predict(&self.descriptors(&candidate));
        self.score_with_prediction(candidate, prediction)
    }

    pub fn score_with_prediction<'a>(
        &self,
        candidate: Candidate<'a>,
        prediction: Option<RtPrediction>,
    ) -> Result<ScoredCandidate<'a>, ScoringError> {
        let adduct_score = self.priors.prior(&candidate.adduct.name)?;
        // Candidates built with `Candidate::from_parts` skip the matcher checks.
        if !candidate.mass_error_ppm.is_finite() || candidate.theoretical_mz <= 0.0 {
            return Err(ScoringError::InvalidMassError {
                metabolite: candidate.metabolite.id.clone(),
                adduct: candidate.adduct.name.clone(),
                value: candidate.mass_error_ppm,
            });
        }
        let mass_score = mass_score(candidate.mass_error_ppm, self.tolerance_ppm);
        let prediction = prediction.filter(|p| p.is_usable());
        let rt_score = match prediction {
            Some(p) => p.likelihood(candidate.feature.rt),
            None => self.neutral_rt_score,
        };

        Ok(ScoredCandidate {
            candidate,
            mass_score,
            adduct_score,
            rt_prediction: prediction,
            rt_score,
            ensemble_score: EnsembleWeights::default().combine(mass_score, adduct_score, rt_score),
            rank: 0,
        })
    }

    /// Scores a batch of candidates in parallel.
    ///
    /// The retention time model is called once for every distinct metabolite
    /// in the batch. Candidates whose adduct has no prior or whose mass error
    /// is not finite are logged and dropped; the rest keep their input order.
    #[cfg_attr(
        feature = "instrumentation",
        tracing::instrument(skip_all, level = "trace")
    )]
    pub fn score_batch<'a>(
        &self,
        candidates: &[Candidate<'a>],
        rt_model: &dyn RtPredictor,
    ) -> (Vec<ScoredCandidate<'a>>, ScoringMetrics) {
        let start = Instant::now();
        let mut metrics = ScoringMetrics::default();

        let mut slot_of: HashMap<*const MetaboliteRecord, usize> = HashMap::new();
        let mut batch = Vec::new();
        let slots: Vec<usize> = candidates
            .iter()
            .map(|c| {
                *slot_of.entry(c.metabolite as *const _).or_insert_with(|| {
                    batch.push(self.joiner.descriptors(c.metabolite));
                    batch.len() - 1
                })
            })
            .collect();
        metrics.num_predicted_metabolites = batch.len();
        let predictions = rt_model.predict_batch(&batch);

        let outcomes: Vec<Result<ScoredCandidate<'a>, ScoringError>> = candidates
            .par_iter()
            .zip(slots.par_iter())
            .map(|(c, slot)| self.score_with_prediction(*c, predictions[*slot]))
            .collect();

        let mut out = Vec::with_capacity(outcomes.len());
        for (candidate, outcome) in candidates.iter().zip(outcomes) {
            match outcome {
                Ok(scored) => {
                    if scored.rt_prediction.is_none() {
                        metrics.num_neutral_rt += 1;
                    }
                    out.push(scored);
                }
                Err(e) => {
                    warn!(
                        "Dropping candidate {} as {} for feature {}: {}",
                        candidate.metabolite.id, candidate.adduct.name, candidate.feature.id, e
                    );
                    match e {
                        ScoringError::InvalidMassError { .. } => metrics.num_invalid_mass += 1,
                        _ => metrics.num_unknown_adduct += 1,
                    }
                }
            }
        }

        metrics.num_scored = out.len();
        metrics.elapsed = start.elapsed();
        debug!(
            "Scored {} candidates ({} without prior, {} invalid mass, {} neutral rt) in {:?}",
            metrics.num_scored,
            metrics.num_unknown_adduct,
            metrics.num_invalid_mass,
            metrics.num_neutral_rt,
            metrics.elapsed
        );
        (out, metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adducts::AdductTable;
    use crate::matching::theoretical_mz;
    use crate::models::{
        Feature,
        Polarity,
    };
    use crate::rt_prediction::NullRtModel;

    struct ConstantRt(f64, f64);

    impl RtPredictor for ConstantRt {
        fn predict(&self, _descriptors: &DescriptorVector) -> Option<RtPrediction> {
            Some(RtPrediction {
                mean_rt: self.0,
                stddev: self.1,
            })
        }
    }

    fn scorer() -> Scorer {
        Scorer::new(5.0, AdductPriors::default(), PropertyJoiner::default()).unwrap()
    }

    #[test]
    fn test_mass_score_is_monotonic() {
        let mut last = f64::INFINITY;
        for i in 0..=50 {
            let ppm = i as f64 * 0.1;
            let s = mass_score(ppm, 5.0);
            assert!(s <= last);
            assert_eq!(s, mass_score(-ppm, 5.0));
            last = s;
        }
    }

    #[test]
    fn test_score_with_and_without_rt() {
        let table = AdductTable::default();
        let h = table.get("[M+H]+").unwrap();
        let metabolite = MetaboliteRecord::new("HMDB0000122", 180.0634);
        let feature = Feature::new(0, Polarity::Positive, "glucose", theoretical_mz(180.0634, h), 5.2);
        let candidate = Candidate::from_parts(&feature, &metabolite, h);

        let neutral = scorer().score(candidate, &NullRtModel).unwrap();
        assert!((neutral.mass_score - 1.0).abs() < 1e-12);
        assert_eq!(neutral.adduct_score, 1.0);
        assert_eq!(neutral.rt_score, NEUTRAL_RT_SCORE);
        assert!(neutral.rt_prediction.is_none());

        let exact = scorer().score(candidate, &ConstantRt(5.2, 0.5)).unwrap();
        assert_eq!(exact.rt_score, 1.0);
        let off = scorer().score(candidate, &ConstantRt(6.2, 0.5)).unwrap();
        assert!((off.rt_score - (-2.0f64).exp()).abs() < 1e-12);

        // A degenerate spread is treated as no prediction.
        let degenerate = scorer().score(candidate, &ConstantRt(5.2, 0.0)).unwrap();
        assert_eq!(degenerate.rt_score, NEUTRAL_RT_SCORE);
        assert!(degenerate.rt_prediction.is_none());
    }

    #[test]
    fn test_batch_drops_unknown_adduct() {
        let mut specs = crate::adducts::default_adduct_specs();
        specs.push(crate::adducts::AdductSpec {
            name: "[M+Xe]+".into(),
            polarity: Polarity::Positive,
            mass_delta: Some(131.904),
            multiplicity: 1,
            charge: 1,
        });
        let table = AdductTable::from_specs(&specs).unwrap();
        let metabolite = MetaboliteRecord::new("m1", 180.0634);
        let feature = Feature::new(3, Polarity::Positive, "", 181.0707, 1.0);
        let candidates = vec![
            Candidate::from_parts(&feature, &metabolite, table.get("[M+H]+").unwrap()),
            Candidate::from_parts(&feature, &metabolite, table.get("[M+Xe]+").unwrap()),
            Candidate::from_parts(&feature, &metabolite, table.get("[M+Na]+").unwrap()),
        ];

        let (scored, metrics) = scorer().score_batch(&candidates, &ConstantRt(1.0, 1.0));
        assert_eq!(scored.len(), 2);
        assert_eq!(scored[0].candidate.adduct.name, "[M+H]+");
        assert_eq!(scored[1].candidate.adduct.name, "[M+Na]+");
        assert_eq!(metrics.num_scored, 2);
        assert_eq!(metrics.num_unknown_adduct, 1);
        assert_eq!(metrics.num_neutral_rt, 0);
        assert_eq!(metrics.num_predicted_metabolites, 1);

        assert!(matches!(
            scorer().score(candidates[1], &NullRtModel),
            Err(ScoringError::UnknownAdduct { .. })
        ));
    }

    #[test]
    fn test_non_finite_mass_is_rejected() {
        let table = AdductTable::default();
        let h = table.get("[M+H]+").unwrap();
        let good = MetaboliteRecord::new("good", 180.0634);
        let nan_mass = MetaboliteRecord::new("nan_mass", f64::NAN);
        let negative = MetaboliteRecord::new("negative", -50.0);
        let feature = Feature::new(0, Polarity::Positive, "", 181.0707, 1.0);
        let candidates = vec![
            Candidate::from_parts(&feature, &nan_mass, h),
            Candidate::from_parts(&feature, &good, h),
            Candidate::from_parts(&feature, &negative, h),
        ];

        assert!(matches!(
            scorer().score(candidates[0], &NullRtModel),
            Err(ScoringError::InvalidMassError { ref metabolite, .. }) if metabolite == "nan_mass"
        ));
        assert!(scorer().score(candidates[2], &NullRtModel).is_err());

        let (scored, metrics) = scorer().score_batch(&candidates, &NullRtModel);
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].candidate.metabolite.id, "good");
        assert!(scored[0].ensemble_score.is_finite());
        assert_eq!(metrics.num_invalid_mass, 2);
        assert_eq!(metrics.num_unknown_adduct, 0);
    }

    #[test]
    fn test_invalid_settings() {
        assert!(Scorer::new(0.0, AdductPriors::default(), PropertyJoiner::default()).is_err());
        assert!(scorer().with_neutral_rt_score(1.5).is_err());
        assert_eq!(scorer().with_neutral_rt_score(0.0).unwrap().neutral_rt_score, 0.0);
    }
}
