//! Descriptor vectors used by the retention time models.
//!
//! Values that cannot be derived are stored as NaN, the same convention the
//! gradient boosting libraries use for missing features.

use crate::data_sources::PropertyTable;
use crate::models::{
    ChemicalProperties,
    MetaboliteRecord,
    ShapeDescriptors,
};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

pub const NUM_DESCRIPTORS: usize = 17;

/// Names of the descriptor vector entries, in order.
pub const DESCRIPTOR_NAMES: [&str; NUM_DESCRIPTORS] = [
    "logp",
    "logs",
    "polar_surface_area",
    "donor_count",
    "acceptor_count",
    "rotatable_bond_count",
    "C",
    "H",
    "N",
    "O",
    "P",
    "S",
    "H_C_ratio",
    "heteroatom_count",
    "PMI1",
    "PMI2",
    "asphericity",
];

pub fn descriptor_index(name: &str) -> Option<usize> {
    DESCRIPTOR_NAMES.iter().position(|x| *x == name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ElementCounts {
    pub c: u32,
    pub h: u32,
    pub n: u32,
    pub o: u32,
    pub p: u32,
    pub s: u32,
}

impl ElementCounts {
    pub fn heteroatoms(&self) -> u32 {
        self.n
            .saturating_add(self.o)
            .saturating_add(self.p)
            .saturating_add(self.s)
    }

    /// `None` when there is no carbon.
    pub fn h_c_ratio(&self) -> Option<f64> {
        if self.c == 0 {
            None
        } else {
            Some(self.h as f64 / self.c as f64)
        }
    }
}

fn formula_regex() -> &'static Regex {
    static FORMULA_RE: OnceLock<Regex> = OnceLock::new();
    FORMULA_RE.get_or_init(|| {
        Regex::new(r"([A-Z][a-z]?)(\d*)").unwrap_or_else(|e| unreachable!("Bad formula regex: {}", e))
    })
}

/// Counts the CHNOPS atoms of a molecular formula.
///
/// Other elements are ignored. Repeated symbols are summed. Returns `None`
/// when a count does not fit in a `u32`, so the element descriptors of a
/// malformed formula are treated as missing.
///
/// ```
/// use metaseek::properties::parse_formula;
/// let counts = parse_formula("C6H12O6").unwrap();
/// assert_eq!((counts.c, counts.h, counts.o, counts.n), (6, 12, 6, 0));
/// assert_eq!(parse_formula("C2H5Cl").map(|c| c.h), Some(5));
/// assert_eq!(parse_formula("C4294967295C1"), None);
/// ```
pub fn parse_formula(formula: &str) -> Option<ElementCounts> {
    let mut counts = ElementCounts::default();
    for cap in formula_regex().captures_iter(formula) {
        let n: u32 = match &cap[2] {
            "" => 1,
            digits => digits.parse().ok()?,
        };
        let slot = match &cap[1] {
            "C" => &mut counts.c,
            "H" => &mut counts.h,
            "N" => &mut counts.n,
            "O" => &mut counts.o,
            "P" => &mut counts.p,
            "S" => &mut counts.s,
            _ => continue,
        };
        *slot = slot.checked_add(n)?;
    }
    Some(counts)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DescriptorVector(pub [f64; NUM_DESCRIPTORS]);

impl DescriptorVector {
    pub fn missing() -> Self {
        Self([f64::NAN; NUM_DESCRIPTORS])
    }

    pub fn from_parts(
        properties: &ChemicalProperties,
        formula: Option<&str>,
        shape: &ShapeDescriptors,
    ) -> Self {
        let opt = |x: Option<f64>| x.unwrap_or(f64::NAN);
        let count = |x: Option<u32>| x.map_or(f64::NAN, |v| v as f64);
        let elements = formula.and_then(parse_formula);
        let element = |f: fn(&ElementCounts) -> u32| elements.as_ref().map_or(f64::NAN, |e| f(e) as f64);

        Self([
            opt(properties.logp),
            opt(properties.logs),
            opt(properties.polar_surface_area),
            count(properties.donor_count),
            count(properties.acceptor_count),
            count(properties.rotatable_bond_count),
            element(|e| e.c),
            element(|e| e.h),
            element(|e| e.n),
            element(|e| e.o),
            element(|e| e.p),
            element(|e| e.s),
            elements.as_ref().and_then(|e| e.h_c_ratio()).unwrap_or(f64::NAN),
            element(|e| e.heteroatoms()),
            opt(shape.pmi1),
            opt(shape.pmi2),
            opt(shape.asphericity),
        ])
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        descriptor_index(name).map(|i| self.0[i])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn num_missing(&self) -> usize {
        self.0.iter().filter(|x| x.is_nan()).count()
    }
}

/// Attaches chemical descriptors to metabolites.
///
/// Values present on the library record win; the optional overlay table only
/// fills what the record lacks.
#[derive(Debug, Clone, Default)]
pub struct PropertyJoiner {
    overlay: Option<PropertyTable>,
}

impl PropertyJoiner {
    pub fn new(overlay: Option<PropertyTable>) -> Self {
        Self { overlay }
    }

    pub fn descriptors(&self, metabolite: &MetaboliteRecord) -> DescriptorVector {
        let overlay = self.overlay.as_ref().and_then(|t| t.get(&metabolite.id));
        match overlay {
            None => DescriptorVector::from_parts(
                &metabolite.properties,
                metabolite.formula.as_deref(),
                &metabolite.shape,
            ),
            Some(entry) => {
                let mut properties = metabolite.properties.clone();
                properties.fill_missing_from(&entry.properties);
                let mut shape = metabolite.shape.clone();
                shape.fill_missing_from(&entry.shape);
                DescriptorVector::from_parts(&properties, metabolite.formula.as_deref(), &shape)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn glucose() -> MetaboliteRecord {
        let mut m = MetaboliteRecord::new("HMDB0000122", 180.063388116);
        m.formula = Some("C6H12O6".into());
        m.properties.logp = Some(-2.9);
        m.properties.donor_count = Some(5);
        m.shape.pmi1 = Some(100.0);
        m
    }

    #[test]
    fn test_formula_features() {
        let counts = parse_formula("C10H16N5O13P3").unwrap();
        assert_eq!(counts.heteroatoms(), 5 + 13 + 3);
        assert_eq!(counts.h_c_ratio(), Some(1.6));
        assert_eq!(parse_formula("H2O").unwrap().h_c_ratio(), None);
    }

    #[test]
    fn test_formula_overflow_is_missing() {
        assert_eq!(parse_formula("C4294967295C1"), None);
        assert_eq!(parse_formula("C99999999999H2"), None);
        assert_eq!(parse_formula("C4294967295").map(|c| c.c), Some(u32::MAX));

        let mut m = glucose();
        m.formula = Some("C4294967295C1".into());
        let v = PropertyJoiner::default().descriptors(&m);
        for name in ["C", "H", "N", "O", "P", "S", "H_C_ratio", "heteroatom_count"] {
            assert!(v.get(name).unwrap().is_nan(), "{} should be missing", name);
        }
        assert_eq!(v.get("logp"), Some(-2.9));
    }

    #[test]
    fn test_descriptor_vector_layout() {
        let v = PropertyJoiner::default().descriptors(&glucose());
        assert_eq!(v.get("logp"), Some(-2.9));
        assert_eq!(v.get("donor_count"), Some(5.0));
        assert_eq!(v.get("C"), Some(6.0));
        assert_eq!(v.get("H_C_ratio"), Some(2.0));
        assert_eq!(v.get("heteroatom_count"), Some(6.0));
        assert_eq!(v.get("PMI1"), Some(100.0));
        assert!(v.get("logs").unwrap().is_nan());
        assert!(v.get("asphericity").unwrap().is_nan());
        assert_eq!(v.get("nope"), None);
    }

    #[test]
    fn test_missing_formula_is_nan() {
        let mut m = glucose();
        m.formula = None;
        let v = PropertyJoiner::default().descriptors(&m);
        for name in ["C", "H", "N", "O", "P", "S", "H_C_ratio", "heteroatom_count"] {
            assert!(v.get(name).unwrap().is_nan(), "{} should be missing", name);
        }
    }

    #[test]
    fn test_overlay_fills_only_missing() {
        let csv = "accession,logp,asphericity,PMI1\nHMDB0000122,1.0,0.3,5.0\n";
        let table = PropertyTable::from_reader(Cursor::new(csv)).unwrap();
        let joiner = PropertyJoiner::new(Some(table));
        let v = joiner.descriptors(&glucose());
        assert_eq!(v.get("logp"), Some(-2.9));
        assert_eq!(v.get("PMI1"), Some(100.0));
        assert_eq!(v.get("asphericity"), Some(0.3));
    }
}
