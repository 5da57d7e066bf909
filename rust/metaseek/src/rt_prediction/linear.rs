use super::{
    read_model_json,
    RtPrediction,
    RtPredictor,
};
use crate::errors::RtModelError;
use crate::properties::{
    descriptor_index,
    DescriptorVector,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
struct SerLinearModel {
    intercept: f64,
    coefficients: BTreeMap<String, f64>,
    residual_stddev: f64,
}

/// Linear regression on the descriptor vector.
///
/// ```json
/// {"intercept": 4.1, "coefficients": {"logp": 0.8, "polar_surface_area": -0.01}, "residual_stddev": 0.6}
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct LinearRtModel {
    intercept: f64,
    /// (descriptor index, coefficient), only non-zero terms.
    terms: Vec<(usize, f64)>,
    residual_stddev: f64,
}

impl LinearRtModel {
    pub fn new(
        intercept: f64,
        coefficients: &[(&str, f64)],
        residual_stddev: f64,
    ) -> Result<Self, RtModelError> {
        if !residual_stddev.is_finite() || residual_stddev <= 0.0 {
            return Err(RtModelError::InvalidStddev {
                value: residual_stddev,
            });
        }
        let mut terms = Vec::with_capacity(coefficients.len());
        for (name, coef) in coefficients.iter() {
            let idx = descriptor_index(name).ok_or_else(|| RtModelError::UnknownDescriptor {
                name: name.to_string(),
            })?;
            if *coef != 0.0 {
                terms.push((idx, *coef));
            }
        }
        Ok(Self {
            intercept,
            terms,
            residual_stddev,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, RtModelError> {
        let ser: SerLinearModel = serde_json::from_str(json)
            .map_err(|e| RtModelError::ModelParsingError { source: e, path: None })?;
        Self::from_ser(ser)
    }

    pub fn from_file(path: &Path) -> Result<Self, RtModelError> {
        Self::from_ser(read_model_json(path)?)
    }

    fn from_ser(ser: SerLinearModel) -> Result<Self, RtModelError> {
        let coefficients: Vec<(&str, f64)> = ser
            .coefficients
            .iter()
            .map(|(k, v)| (k.as_str(), *v))
            .collect();
        Self::new(ser.intercept, &coefficients, ser.residual_stddev)
    }
}

impl RtPredictor for LinearRtModel {
    fn predict(&self, descriptors: &DescriptorVector) -> Option<RtPrediction> {
        let mut mean_rt = self.intercept;
        for (idx, coef) in self.terms.iter() {
            let value = descriptors.0[*idx];
            if value.is_nan() {
                return None;
            }
            mean_rt += coef * value;
        }
        Some(RtPrediction {
            mean_rt,
            stddev: self.residual_stddev,
        })
    }
}
