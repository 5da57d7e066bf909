use super::{
    RtPrediction,
    RtPredictor,
};
use crate::errors::RtModelError;
use crate::properties::DescriptorVector;

/// Weighted combination of several predictors.
///
/// Members that cannot predict for a descriptor vector are left out and the
/// remaining weights are renormalized. The combined spread is the weighted
/// mean member variance plus the variance between member means.
pub struct EnsembleRtModel {
    members: Vec<(Box<dyn RtPredictor>, f64)>,
}

impl std::fmt::Debug for EnsembleRtModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnsembleRtModel")
            .field("num_members", &self.members.len())
            .finish()
    }
}

impl EnsembleRtModel {
    pub fn empty() -> Self {
        Self {
            members: Vec::new(),
        }
    }

    pub fn with_member(
        mut self,
        model: Box<dyn RtPredictor>,
        weight: f64,
    ) -> Result<Self, RtModelError> {
        if !weight.is_finite() || weight <= 0.0 {
            return Err(RtModelError::InvalidMemberWeight { value: weight });
        }
        self.members.push((model, weight));
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl RtPredictor for EnsembleRtModel {
    fn predict(&self, descriptors: &DescriptorVector) -> Option<RtPrediction> {
        let preds: Vec<(RtPrediction, f64)> = self
            .members
            .iter()
            .filter_map(|(m, w)| m.predict(descriptors).map(|p| (p, *w)))
            .filter(|(p, _)| p.is_usable())
            .collect();

        let total_weight: f64 = preds.iter().map(|(_, w)| w).sum();
        if preds.is_empty() || total_weight <= 0.0 {
            return None;
        }

        let mean_rt = preds.iter().map(|(p, w)| p.mean_rt * w).sum::<f64>() / total_weight;
        let variance = preds
            .iter()
            .map(|(p, w)| {
                let spread = p.mean_rt - mean_rt;
                w * (p.stddev * p.stddev + spread * spread)
            })
            .sum::<f64>()
            / total_weight;

        Some(RtPrediction {
            mean_rt,
            stddev: variance.sqrt(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Option<RtPrediction>);

    impl RtPredictor for Fixed {
        fn predict(&self, _descriptors: &DescriptorVector) -> Option<RtPrediction> {
            self.0
        }
    }

    fn fixed(mean_rt: f64, stddev: f64) -> Box<dyn RtPredictor> {
        Box::new(Fixed(Some(RtPrediction { mean_rt, stddev })))
    }

    #[test]
    fn test_equal_weights_match_simple_average() {
        let model = EnsembleRtModel::empty()
            .with_member(fixed(4.0, 1.0), 1.0)
            .unwrap()
            .with_member(fixed(6.0, 1.0), 1.0)
            .unwrap();
        let pred = model.predict(&DescriptorVector::missing()).unwrap();
        assert_eq!(pred.mean_rt, 5.0);
        // 1.0 member variance plus 1.0 between-member variance
        assert!((pred.stddev - 2.0f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_members_without_prediction_are_skipped() {
        let model = EnsembleRtModel::empty()
            .with_member(Box::new(Fixed(None)), 3.0)
            .unwrap()
            .with_member(fixed(6.0, 0.5), 1.0)
            .unwrap();
        let pred = model.predict(&DescriptorVector::missing()).unwrap();
        assert_eq!(pred.mean_rt, 6.0);
        assert_eq!(pred.stddev, 0.5);

        let none = EnsembleRtModel::empty()
            .with_member(Box::new(Fixed(None)), 1.0)
            .unwrap();
        assert!(none.predict(&DescriptorVector::missing()).is_none());
        assert!(EnsembleRtModel::empty()
            .predict(&DescriptorVector::missing())
            .is_none());
    }

    #[test]
    fn test_weight_validation() {
        for w in [0.0, -1.0, f64::NAN] {
            assert!(matches!(
                EnsembleRtModel::empty().with_member(fixed(1.0, 1.0), w),
                Err(RtModelError::InvalidMemberWeight { .. })
            ));
        }
    }
}
