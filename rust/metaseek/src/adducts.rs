//! Adduct definitions and their empirical priors.
//!
//! The adduct table is loaded (or built from the defaults) once per run and
//! validated before any matching happens. Every definition gets its position
//! in the table as `order`, which is what downstream tie-breaking uses.

use crate::errors::{
    AdductTableError,
    ScoringError,
};
use crate::models::Polarity;
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::HashMap;

/// Proton mass minus electron, as used for [M+H]+ style adducts.
pub const PROTON_DELTA: f64 = 1.007276;
pub const SODIUM_DELTA: f64 = 22.989218;

/// Adduct definition as written in a configuration file.
///
/// All fields are optional here so that validation can report what is
/// missing instead of failing in the deserializer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdductSpec {
    pub name: String,
    pub polarity: Polarity,
    #[serde(default)]
    pub mass_delta: Option<f64>,
    #[serde(default = "default_multiplicity")]
    pub multiplicity: u8,
    #[serde(default = "default_charge")]
    pub charge: i32,
}

fn default_multiplicity() -> u8 {
    1
}

fn default_charge() -> i32 {
    1
}

/// A validated adduct.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdductDefinition {
    pub name: String,
    pub polarity: Polarity,
    pub mass_delta: f64,
    pub multiplicity: u8,
    pub charge: u32,
    /// Position in the table this definition was loaded from.
    pub order: usize,
}

impl AdductDefinition {
    fn try_from_spec(spec: &AdductSpec, order: usize) -> Result<Self, AdductTableError> {
        let invalid = |reason: &'static str| AdductTableError::InvalidAdduct {
            name: spec.name.clone(),
            reason,
        };

        if spec.name.trim().is_empty() {
            return Err(invalid("name must not be empty"));
        }
        let mass_delta = spec.mass_delta.ok_or_else(|| invalid("missing mass_delta"))?;
        if !mass_delta.is_finite() {
            return Err(invalid("mass_delta must be finite"));
        }
        if spec.charge <= 0 {
            return Err(invalid("charge must be > 0"));
        }
        if spec.multiplicity == 0 {
            return Err(invalid("multiplicity must be >= 1"));
        }

        Ok(Self {
            name: spec.name.clone(),
            polarity: spec.polarity,
            mass_delta,
            multiplicity: spec.multiplicity,
            charge: spec.charge as u32,
            order,
        })
    }
}

/// The validated set of adducts considered for matching, in definition order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdductTable {
    adducts: Vec<AdductDefinition>,
}

impl AdductTable {
    pub fn from_specs(specs: &[AdductSpec]) -> Result<Self, AdductTableError> {
        if specs.is_empty() {
            return Err(AdductTableError::EmptyTable);
        }

        let mut adducts: Vec<AdductDefinition> = Vec::with_capacity(specs.len());
        for (order, spec) in specs.iter().enumerate() {
            let adduct = AdductDefinition::try_from_spec(spec, order)?;
            if adducts.iter().any(|x| x.name == adduct.name) {
                return Err(AdductTableError::DuplicateAdduct { name: adduct.name });
            }
            adducts.push(adduct);
        }

        Ok(Self { adducts })
    }

    pub fn as_slice(&self) -> &[AdductDefinition] {
        &self.adducts
    }

    pub fn len(&self) -> usize {
        self.adducts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adducts.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&AdductDefinition> {
        self.adducts.iter().find(|x| x.name == name)
    }

    /// Adducts valid for the given polarity, in table order.
    pub fn for_polarity(&self, polarity: Polarity) -> impl Iterator<Item = &AdductDefinition> + '_ {
        self.adducts.iter().filter(move |x| x.polarity == polarity)
    }
}

impl Default for AdductTable {
    fn default() -> Self {
        // The built-in specs are known to be valid.
        Self::from_specs(&default_adduct_specs()).unwrap_or_else(|e| {
            unreachable!("Built-in adduct table failed validation: {}", e)
        })
    }
}

/// Common ESI adducts, positive first.
pub fn default_adduct_specs() -> Vec<AdductSpec> {
    let spec = |name: &str, polarity, delta: f64, multiplicity| AdductSpec {
        name: name.to_string(),
        polarity,
        mass_delta: Some(delta),
        multiplicity,
        charge: 1,
    };

    use Polarity::{
        Negative,
        Positive,
    };
    vec![
        spec("[M+H]+", Positive, PROTON_DELTA, 1),
        spec("[M+Na]+", Positive, SODIUM_DELTA, 1),
        spec("[M+K]+", Positive, 38.963158, 1),
        spec("[M+NH4]+", Positive, 18.033823, 1),
        spec("[M+Li]+", Positive, 7.015455, 1),
        spec("[M+Cs]+", Positive, 132.905452, 1),
        spec("[M-H]-", Negative, -PROTON_DELTA, 1),
        spec("[M+HCOO]-", Negative, 44.998201, 1),
        spec("[M+Cl]-", Negative, 34.969402, 1),
        spec("[2M+H]+", Positive, PROTON_DELTA, 2),
        spec("[2M+Na]+", Positive, SODIUM_DELTA, 2),
        spec("[2M-H]-", Negative, -PROTON_DELTA, 2),
    ]
}

/// Empirical prior plausibility of each adduct, keyed by adduct name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdductPriors {
    priors: HashMap<String, f64>,
}

impl AdductPriors {
    pub fn new(priors: HashMap<String, f64>) -> Result<Self, ScoringError> {
        for (name, value) in priors.iter() {
            if !value.is_finite() || *value < 0.0 {
                return Err(ScoringError::InvalidPrior {
                    name: name.clone(),
                    value: *value,
                });
            }
        }
        Ok(Self { priors })
    }

    pub fn prior(&self, adduct_name: &str) -> Result<f64, ScoringError> {
        self.priors
            .get(adduct_name)
            .copied()
            .ok_or_else(|| ScoringError::UnknownAdduct {
                name: adduct_name.to_string(),
            })
    }

    /// Names of adducts in `table` that have no prior.
    pub fn missing_for<'t>(&self, table: &'t AdductTable) -> Vec<&'t str> {
        table
            .as_slice()
            .iter()
            .filter(|x| !self.priors.contains_key(&x.name))
            .map(|x| x.name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.priors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.priors.is_empty()
    }
}

impl Default for AdductPriors {
    fn default() -> Self {
        let priors = [
            ("[M+H]+", 1.0),
            ("[M-H]-", 1.0),
            ("[M+Na]+", 0.7),
            ("[M+NH4]+", 0.6),
            ("[M+K]+", 0.5),
            ("[M+Cl]-", 0.5),
            ("[M+HCOO]-", 0.5),
            ("[M+Li]+", 0.2),
            ("[M+Cs]+", 0.1),
            ("[2M+H]+", 0.3),
            ("[2M+Na]+", 0.2),
            ("[2M-H]-", 0.3),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        Self { priors }
    }
}
