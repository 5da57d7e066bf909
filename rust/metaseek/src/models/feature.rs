use serde::{
    Deserialize,
    Serialize,
};

/// Electrospray ionization polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Polarity {
    #[serde(rename = "positive")]
    Positive,
    #[serde(rename = "negative")]
    Negative,
}

impl Polarity {
    /// Parses the acquisition mode label of a feature table row.
    ///
    /// Only the prefix before the first `_` is considered, so labels such as
    /// `pos_HILIC` or `NEG_c18` resolve to their polarity.
    ///
    /// ```
    /// use metaseek::models::Polarity;
    /// assert_eq!(Polarity::from_mode_label("pos_HILIC"), Some(Polarity::Positive));
    /// assert_eq!(Polarity::from_mode_label("Negative"), Some(Polarity::Negative));
    /// assert_eq!(Polarity::from_mode_label("both"), None);
    /// ```
    pub fn from_mode_label(label: &str) -> Option<Self> {
        let prefix = label.trim().split('_').next().unwrap_or("");
        match prefix.to_ascii_lowercase().as_str() {
            "pos" | "positive" | "+" => Some(Polarity::Positive),
            "neg" | "negative" | "-" => Some(Polarity::Negative),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Polarity::Positive => "positive",
            Polarity::Negative => "negative",
        }
    }
}

/// An observed LC-MS peak.
///
/// `id` is the 0-based data row the feature was read from and is what
/// candidates are grouped by downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: usize,
    pub mode: Polarity,
    pub metabolite_hint: String,
    pub mz: f64,
    pub rt: f64,
    pub mw: Option<f64>,
}

impl Feature {
    pub fn new(id: usize, mode: Polarity, metabolite_hint: impl Into<String>, mz: f64, rt: f64) -> Self {
        Self {
            id,
            mode,
            metabolite_hint: metabolite_hint.into(),
            mz,
            rt,
            mw: None,
        }
    }
}
