use serde::{
    Deserialize,
    Serialize,
};

/// Predicted physicochemical properties as exported from HMDB.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChemicalProperties {
    #[serde(default)]
    pub logp: Option<f64>,
    #[serde(default)]
    pub logs: Option<f64>,
    #[serde(default)]
    pub polar_surface_area: Option<f64>,
    #[serde(default)]
    pub donor_count: Option<u32>,
    #[serde(default)]
    pub acceptor_count: Option<u32>,
    #[serde(default)]
    pub rotatable_bond_count: Option<u32>,
}

impl ChemicalProperties {
    /// Fills every missing field from `other`, keeping the values already set.
    pub fn fill_missing_from(&mut self, other: &ChemicalProperties) {
        self.logp = self.logp.or(other.logp);
        self.logs = self.logs.or(other.logs);
        self.polar_surface_area = self.polar_surface_area.or(other.polar_surface_area);
        self.donor_count = self.donor_count.or(other.donor_count);
        self.acceptor_count = self.acceptor_count.or(other.acceptor_count);
        self.rotatable_bond_count = self.rotatable_bond_count.or(other.rotatable_bond_count);
    }
}

/// 3D shape descriptors from a single embedded conformer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShapeDescriptors {
    #[serde(default)]
    pub pmi1: Option<f64>,
    #[serde(default)]
    pub pmi2: Option<f64>,
    #[serde(default)]
    pub asphericity: Option<f64>,
}

impl ShapeDescriptors {
    pub fn fill_missing_from(&mut self, other: &ShapeDescriptors) {
        self.pmi1 = self.pmi1.or(other.pmi1);
        self.pmi2 = self.pmi2.or(other.pmi2);
        self.asphericity = self.asphericity.or(other.asphericity);
    }
}

/// A metabolite entry of the reference database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaboliteRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub monoisotopic_mass: f64,
    #[serde(default)]
    pub formula: Option<String>,
    #[serde(default)]
    pub smiles: Option<String>,
    #[serde(default)]
    pub chem_class: Option<String>,
    #[serde(default)]
    pub chem_sub_class: Option<String>,
    #[serde(default)]
    pub properties: ChemicalProperties,
    #[serde(default)]
    pub shape: ShapeDescriptors,
}

impl MetaboliteRecord {
    pub fn new(id: impl Into<String>, monoisotopic_mass: f64) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            monoisotopic_mass,
            formula: None,
            smiles: None,
            chem_class: None,
            chem_sub_class: None,
            properties: ChemicalProperties::default(),
            shape: ShapeDescriptors::default(),
        }
    }

    pub fn has_valid_mass(&self) -> bool {
        self.monoisotopic_mass.is_finite() && self.monoisotopic_mass > 0.0
    }
}
