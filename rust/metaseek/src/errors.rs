use std::path::PathBuf;

/// Problems found while loading or validating the adduct table.
///
/// These are fatal: the adduct table is checked once before any matching
/// happens, so a bad definition aborts the run instead of surfacing per
/// candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum AdductTableError {
    InvalidAdduct {
        name: String,
        reason: &'static str,
    },
    DuplicateAdduct {
        name: String,
    },
    EmptyTable,
}

/// Errors raised while scoring a single candidate.
///
/// A scoring error only drops the candidate it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoringError {
    UnknownAdduct { name: String },
    InvalidPrior { name: String, value: f64 },
    InvalidWeight { name: &'static str, value: f64 },
    InvalidTolerance { value: f64 },
    InvalidMassError { metabolite: String, adduct: String, value: f64 },
}

#[derive(Debug)]
pub enum FeatureReadingError {
    MalformedFeature {
        row: usize,
        column: &'static str,
        value: String,
    },
    MissingColumn {
        column: &'static str,
    },
    Csv(csv::Error),
    FileReadingError {
        source: std::io::Error,
        path: PathBuf,
    },
}

#[derive(Debug)]
pub enum LibraryReadingError {
    LibraryParsingError {
        source: serde_json::Error,
        context: &'static str,
    },
    FileReadingError {
        source: std::io::Error,
        context: &'static str,
        path: PathBuf,
    },
    PropertyTableError {
        source: csv::Error,
        context: &'static str,
    },
    MalformedProperty {
        row: usize,
        column: String,
        value: String,
    },
}

#[derive(Debug)]
pub enum RtModelError {
    ModelParsingError {
        source: serde_json::Error,
        path: Option<PathBuf>,
    },
    FileReadingError {
        source: std::io::Error,
        path: PathBuf,
    },
    UnknownDescriptor {
        name: String,
    },
    InvalidTree {
        tree: usize,
        reason: String,
    },
    InvalidStddev {
        value: f64,
    },
    InvalidMemberWeight {
        value: f64,
    },
}

#[derive(Debug)]
pub enum OutputWritingError {
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
    Csv(csv::Error),
    Parquet(parquet::errors::ParquetError),
}

#[derive(Debug)]
pub enum MetaSeekError {
    AdductTable(AdductTableError),
    Scoring(ScoringError),
    FeatureReading(FeatureReadingError),
    LibraryReading(LibraryReadingError),
    RtModel(RtModelError),
    OutputWriting(OutputWritingError),
}

macro_rules! display_as_debug {
    ($($t:ty),* $(,)?) => {
        $(
            impl std::fmt::Display for $t {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(f, "{:?}", self)
                }
            }
        )*
    };
}

display_as_debug!(
    FeatureReadingError,
    LibraryReadingError,
    RtModelError,
    OutputWritingError,
    MetaSeekError,
);

impl std::fmt::Display for AdductTableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdductTableError::InvalidAdduct { name, reason } => {
                write!(f, "Invalid adduct definition {:?}: {}", name, reason)
            }
            AdductTableError::DuplicateAdduct { name } => {
                write!(f, "Adduct {:?} is defined more than once", name)
            }
            AdductTableError::EmptyTable => write!(f, "Adduct table has no definitions"),
        }
    }
}

impl std::fmt::Display for ScoringError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoringError::UnknownAdduct { name } => {
                write!(f, "Adduct {:?} has no entry in the prior table", name)
            }
            ScoringError::InvalidPrior { name, value } => {
                write!(f, "Prior for adduct {:?} must be finite and >= 0, got {}", name, value)
            }
            ScoringError::InvalidWeight { name, value } => {
                write!(f, "Weight {} must be finite and >= 0, got {}", name, value)
            }
            ScoringError::InvalidTolerance { value } => {
                write!(f, "Tolerance must be finite and > 0 ppm, got {}", value)
            }
            ScoringError::InvalidMassError {
                metabolite,
                adduct,
                value,
            } => {
                write!(
                    f,
                    "Mass error of {} as {} is not a finite ppm value ({})",
                    metabolite, adduct, value
                )
            }
        }
    }
}

impl std::error::Error for AdductTableError {}
impl std::error::Error for ScoringError {}
impl std::error::Error for FeatureReadingError {}
impl std::error::Error for LibraryReadingError {}
impl std::error::Error for RtModelError {}
impl std::error::Error for OutputWritingError {}
impl std::error::Error for MetaSeekError {}

pub type Result<T> = std::result::Result<T, MetaSeekError>;

impl From<csv::Error> for FeatureReadingError {
    fn from(x: csv::Error) -> Self {
        Self::Csv(x)
    }
}

impl From<csv::Error> for OutputWritingError {
    fn from(x: csv::Error) -> Self {
        Self::Csv(x)
    }
}

impl From<parquet::errors::ParquetError> for OutputWritingError {
    fn from(x: parquet::errors::ParquetError) -> Self {
        Self::Parquet(x)
    }
}

impl From<AdductTableError> for MetaSeekError {
    fn from(x: AdductTableError) -> Self {
        Self::AdductTable(x)
    }
}

impl From<ScoringError> for MetaSeekError {
    fn from(x: ScoringError) -> Self {
        Self::Scoring(x)
    }
}

impl From<FeatureReadingError> for MetaSeekError {
    fn from(x: FeatureReadingError) -> Self {
        Self::FeatureReading(x)
    }
}

impl From<LibraryReadingError> for MetaSeekError {
    fn from(x: LibraryReadingError) -> Self {
        Self::LibraryReading(x)
    }
}

impl From<RtModelError> for MetaSeekError {
    fn from(x: RtModelError) -> Self {
        Self::RtModel(x)
    }
}

impl From<OutputWritingError> for MetaSeekError {
    fn from(x: OutputWritingError) -> Self {
        Self::OutputWriting(x)
    }
}
