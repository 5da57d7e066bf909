use metaseek::errors::{
    AdductTableError,
    FeatureReadingError,
    LibraryReadingError,
    MetaSeekError,
    OutputWritingError,
    RtModelError,
    ScoringError,
};

#[derive(Debug)]
pub enum CliError {
    Config {
        source: String,
    },
    ParseError {
        msg: String,
    },
    Io {
        source: String,
        path: Option<String>,
    },
    DataReading {
        source: String,
    },
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Config { source } => write!(f, "Error interpreting the config: {}", source),
            CliError::ParseError { msg } => write!(f, "Error parsing config: {}", msg),
            CliError::Io { source, path } => {
                if let Some(path) = path {
                    write!(f, "Error reading file {}: {}", path, source)
                } else {
                    write!(f, "Error reading file: {}", source)
                }
            }
            CliError::DataReading { source } => write!(f, "Error reading data: {}", source),
        }
    }
}

impl std::error::Error for CliError {}

impl From<AdductTableError> for CliError {
    fn from(e: AdductTableError) -> Self {
        CliError::Config {
            source: e.to_string(),
        }
    }
}

impl From<ScoringError> for CliError {
    fn from(e: ScoringError) -> Self {
        CliError::Config {
            source: e.to_string(),
        }
    }
}

impl From<RtModelError> for CliError {
    fn from(e: RtModelError) -> Self {
        CliError::DataReading {
            source: format!("{:?}", e),
        }
    }
}

impl From<FeatureReadingError> for CliError {
    fn from(e: FeatureReadingError) -> Self {
        CliError::DataReading {
            source: format!("{:?}", e),
        }
    }
}

impl From<LibraryReadingError> for CliError {
    fn from(e: LibraryReadingError) -> Self {
        CliError::DataReading {
            source: format!("{:?}", e),
        }
    }
}

impl From<OutputWritingError> for CliError {
    fn from(e: OutputWritingError) -> Self {
        match e {
            OutputWritingError::Io { source, path } => CliError::Io {
                source: source.to_string(),
                path: Some(path.to_string_lossy().to_string()),
            },
            other => CliError::Io {
                source: format!("{:?}", other),
                path: None,
            },
        }
    }
}

impl From<MetaSeekError> for CliError {
    fn from(e: MetaSeekError) -> Self {
        match e {
            MetaSeekError::AdductTable(x) => x.into(),
            MetaSeekError::Scoring(x) => x.into(),
            MetaSeekError::FeatureReading(x) => x.into(),
            MetaSeekError::LibraryReading(x) => x.into(),
            MetaSeekError::RtModel(x) => x.into(),
            MetaSeekError::OutputWriting(x) => x.into(),
        }
    }
}
