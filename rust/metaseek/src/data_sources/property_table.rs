use crate::errors::LibraryReadingError;
use crate::models::{
    ChemicalProperties,
    ShapeDescriptors,
};
use std::collections::HashMap;
use std::io::Read;
use std::path::{
    Path,
    PathBuf,
};
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyEntry {
    pub properties: ChemicalProperties,
    pub shape: ShapeDescriptors,
}

/// Descriptor values computed outside of the metabolite library, keyed by
/// accession (e.g. 3D shape descriptors from a conformer embedding step).
#[derive(Debug, Clone, Default)]
pub struct PropertyTable {
    entries: HashMap<String, PropertyEntry>,
}

#[derive(Debug, Clone, Copy)]
enum PropertyColumn {
    Logp,
    Logs,
    PolarSurfaceArea,
    DonorCount,
    AcceptorCount,
    RotatableBondCount,
    Pmi1,
    Pmi2,
    Asphericity,
}

impl PropertyColumn {
    fn from_header(header: &str) -> Option<Self> {
        match header.trim().to_ascii_lowercase().as_str() {
            "logp" => Some(Self::Logp),
            "logs" => Some(Self::Logs),
            "polar_surface_area" | "psa" => Some(Self::PolarSurfaceArea),
            "donor_count" => Some(Self::DonorCount),
            "acceptor_count" => Some(Self::AcceptorCount),
            "rotatable_bond_count" => Some(Self::RotatableBondCount),
            "pmi1" => Some(Self::Pmi1),
            "pmi2" => Some(Self::Pmi2),
            "asphericity" => Some(Self::Asphericity),
            _ => None,
        }
    }

    /// Returns `None` when the value does not fit the column.
    fn assign(&self, entry: &mut PropertyEntry, value: f64) -> Option<()> {
        let as_count = |v: f64| -> Option<u32> {
            if v >= 0.0 && v.fract() == 0.0 && v <= u32::MAX as f64 {
                Some(v as u32)
            } else {
                None
            }
        };
        match self {
            Self::Logp => entry.properties.logp = Some(value),
            Self::Logs => entry.properties.logs = Some(value),
            Self::PolarSurfaceArea => entry.properties.polar_surface_area = Some(value),
            Self::DonorCount => entry.properties.donor_count = Some(as_count(value)?),
            Self::AcceptorCount => entry.properties.acceptor_count = Some(as_count(value)?),
            Self::RotatableBondCount => {
                entry.properties.rotatable_bond_count = Some(as_count(value)?)
            }
            Self::Pmi1 => entry.shape.pmi1 = Some(value),
            Self::Pmi2 => entry.shape.pmi2 = Some(value),
            Self::Asphericity => entry.shape.asphericity = Some(value),
        }
        Some(())
    }
}

impl PropertyTable {
    pub fn from_file(path: &Path) -> Result<Self, LibraryReadingError> {
        let file =
            std::fs::File::open(path).map_err(|e| LibraryReadingError::FileReadingError {
                source: e,
                context: "Error opening property table",
                path: PathBuf::from(path),
            })?;
        let out = Self::from_reader(file)?;
        info!("Read properties for {} metabolites from {}", out.len(), path.display());
        Ok(out)
    }

    /// Reads a comma separated table with an `accession` column and any subset
    /// of the known descriptor columns. Unknown columns are ignored and empty
    /// cells are treated as missing.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, LibraryReadingError> {
        let csv_err = |context: &'static str| {
            move |e: csv::Error| LibraryReadingError::PropertyTableError { source: e, context }
        };
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = rdr.headers().map_err(csv_err("Error reading header"))?.clone();

        let accession_idx = headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case("accession"))
            .ok_or_else(|| LibraryReadingError::MalformedProperty {
                row: 0,
                column: "accession".into(),
                value: "<missing column>".into(),
            })?;
        let columns: Vec<(usize, PropertyColumn)> = headers
            .iter()
            .enumerate()
            .filter_map(|(i, h)| PropertyColumn::from_header(h).map(|c| (i, c)))
            .collect();

        let mut entries = HashMap::new();
        for (row, record) in rdr.records().enumerate() {
            let record = record.map_err(csv_err("Error reading row"))?;
            let accession = record.get(accession_idx).unwrap_or("");
            if accession.is_empty() {
                continue;
            }

            let mut entry = PropertyEntry::default();
            for (idx, column) in columns.iter() {
                let raw = record.get(*idx).unwrap_or("");
                if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
                    continue;
                }
                let malformed = || LibraryReadingError::MalformedProperty {
                    row,
                    column: headers.get(*idx).unwrap_or("").to_string(),
                    value: raw.to_string(),
                };
                let value: f64 = raw.parse().map_err(|_| malformed())?;
                column.assign(&mut entry, value).ok_or_else(malformed)?;
            }
            entries.insert(accession.to_string(), entry);
        }

        Ok(Self { entries })
    }

    pub fn get(&self, accession: &str) -> Option<&PropertyEntry> {
        self.entries.get(accession)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
