use crate::errors::FeatureReadingError;
use crate::models::{
    Feature,
    Polarity,
};
use std::io::Read;
use std::path::{
    Path,
    PathBuf,
};
use tracing::{
    info,
    warn,
};

const MODE_COLUMN: &str = "mode";
const HINT_COLUMN: &str = "metabolite";
const MW_COLUMN: &str = "MW";
const MZ_COLUMN: &str = "m/z";
const RT_COLUMN: &str = "RT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureTableFormat {
    Tsv,
    Csv,
}

impl FeatureTableFormat {
    pub fn detect_from_path(path: &Path) -> Self {
        let path_str = path.to_string_lossy().to_lowercase();
        if path_str.ends_with(".csv") {
            FeatureTableFormat::Csv
        } else {
            FeatureTableFormat::Tsv
        }
    }

    fn delimiter(&self) -> u8 {
        match self {
            FeatureTableFormat::Tsv => b'\t',
            FeatureTableFormat::Csv => b',',
        }
    }
}

struct ColumnIndices {
    mode: usize,
    hint: Option<usize>,
    mw: Option<usize>,
    mz: usize,
    rt: usize,
}

impl ColumnIndices {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, FeatureReadingError> {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);
        let require = |name: &'static str| {
            find(name).ok_or(FeatureReadingError::MissingColumn { column: name })
        };

        Ok(Self {
            mode: require(MODE_COLUMN)?,
            hint: find(HINT_COLUMN),
            mw: find(MW_COLUMN),
            mz: require(MZ_COLUMN)?,
            rt: require(RT_COLUMN)?,
        })
    }
}

/// Observed features, in file order.
#[derive(Debug, Clone, Default)]
pub struct FeatureTable {
    features: Vec<Feature>,
}

impl FeatureTable {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    pub fn from_file(path: &Path) -> Result<Self, FeatureReadingError> {
        let format = FeatureTableFormat::detect_from_path(path);
        let file = std::fs::File::open(path).map_err(|e| FeatureReadingError::FileReadingError {
            source: e,
            path: PathBuf::from(path),
        })?;
        let out = Self::from_reader(file, format)?;
        info!("Read {} features from {}", out.len(), path.display());
        Ok(out)
    }

    /// Reads a feature table.
    ///
    /// Any row with a non-numeric, non-finite or out-of-range `m/z` or `RT`
    /// aborts the read. Rows whose mode is not a recognizable polarity are
    /// skipped. Feature ids are the 0-based data row numbers, so skipped rows
    /// leave gaps.
    pub fn from_reader<R: Read>(
        reader: R,
        format: FeatureTableFormat,
    ) -> Result<Self, FeatureReadingError> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(format.delimiter())
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let columns = ColumnIndices::from_headers(rdr.headers()?)?;
        let mut features = Vec::new();
        let mut num_skipped = 0;

        for (row, record) in rdr.records().enumerate() {
            let record = record?;
            let field = |idx: usize| record.get(idx).unwrap_or("");

            let mode_label = field(columns.mode);
            let mode = match Polarity::from_mode_label(mode_label) {
                Some(x) => x,
                None => {
                    warn!("Skipping feature row {} with unrecognized mode {:?}", row, mode_label);
                    num_skipped += 1;
                    continue;
                }
            };

            let mz = parse_field(field(columns.mz), row, MZ_COLUMN)?;
            if mz <= 0.0 {
                return Err(malformed(row, MZ_COLUMN, field(columns.mz)));
            }
            let rt = parse_field(field(columns.rt), row, RT_COLUMN)?;
            if rt < 0.0 {
                return Err(malformed(row, RT_COLUMN, field(columns.rt)));
            }
            let mw = match columns.mw.map(field) {
                Some(x) if !x.is_empty() => Some(parse_field(x, row, MW_COLUMN)?),
                _ => None,
            };

            features.push(Feature {
                id: row,
                mode,
                metabolite_hint: columns.hint.map(field).unwrap_or("").to_string(),
                mz,
                rt,
                mw,
            });
        }

        if num_skipped > 0 {
            warn!("Skipped {} feature rows without a usable polarity", num_skipped);
        }

        Ok(Self { features })
    }

    pub fn as_slice(&self) -> &[Feature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

fn malformed(row: usize, column: &'static str, value: &str) -> FeatureReadingError {
    FeatureReadingError::MalformedFeature {
        row,
        column,
        value: value.to_string(),
    }
}

fn parse_field(value: &str, row: usize, column: &'static str) -> Result<f64, FeatureReadingError> {
    match value.parse::<f64>() {
        Ok(x) if x.is_finite() => Ok(x),
        _ => Err(malformed(row, column, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_tsv() {
        let tsv = "mode \tmetabolite\tMW\tm/z\tRT\n\
                   pos_HILIC\tglucose\t180.0634\t181.0707\t5.2\n\
                   neg_C18\tcitrate\t\t191.0197\t3.1\n";
        let table = FeatureTable::from_reader(Cursor::new(tsv), FeatureTableFormat::Tsv).unwrap();
        assert_eq!(table.len(), 2);
        let first = &table.as_slice()[0];
        assert_eq!(first.id, 0);
        assert_eq!(first.mode, Polarity::Positive);
        assert_eq!(first.metabolite_hint, "glucose");
        assert_eq!(first.mw, Some(180.0634));
        assert_eq!(first.mz, 181.0707);
        let second = &table.as_slice()[1];
        assert_eq!(second.mode, Polarity::Negative);
        assert_eq!(second.mw, None);
        assert_eq!(second.rt, 3.1);
    }

    #[test]
    fn test_unknown_mode_is_skipped() {
        let csv = "mode,metabolite,m/z,RT\n\
                   mixed,a,100.0,1.0\n\
                   pos,b,200.0,2.0\n";
        let table = FeatureTable::from_reader(Cursor::new(csv), FeatureTableFormat::Csv).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.as_slice()[0].id, 1);
    }

    #[test]
    fn test_malformed_mz_fails_with_row() {
        let csv = "mode,metabolite,m/z,RT\n\
                   pos,a,100.0,1.0\n\
                   pos,b,abc,2.0\n";
        let err = FeatureTable::from_reader(Cursor::new(csv), FeatureTableFormat::Csv).unwrap_err();
        match err {
            FeatureReadingError::MalformedFeature { row, column, value } => {
                assert_eq!(row, 1);
                assert_eq!(column, "m/z");
                assert_eq!(value, "abc");
            }
            other => panic!("Unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_nan_and_negative_rt_fail() {
        let nan = "mode,m/z,RT\npos,NaN,1.0\n";
        assert!(matches!(
            FeatureTable::from_reader(Cursor::new(nan), FeatureTableFormat::Csv),
            Err(FeatureReadingError::MalformedFeature { column: "m/z", .. })
        ));
        let neg_rt = "mode,m/z,RT\npos,100.0,-1.0\n";
        assert!(matches!(
            FeatureTable::from_reader(Cursor::new(neg_rt), FeatureTableFormat::Csv),
            Err(FeatureReadingError::MalformedFeature { column: "RT", .. })
        ));
    }

    #[test]
    fn test_missing_column() {
        let csv = "mode,metabolite,RT\npos,a,1.0\n";
        assert!(matches!(
            FeatureTable::from_reader(Cursor::new(csv), FeatureTableFormat::Csv),
            Err(FeatureReadingError::MissingColumn { column: "m/z" })
        ));
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(
            FeatureTableFormat::detect_from_path(Path::new("sig_met_list.txt")),
            FeatureTableFormat::Tsv
        );
        assert_eq!(
            FeatureTableFormat::detect_from_path(Path::new("features.CSV")),
            FeatureTableFormat::Csv
        );
    }
}
