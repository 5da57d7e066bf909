use super::scorer::ScoredCandidate;
use crate::errors::OutputWritingError;
use parquet::file::writer::SerializedFileWriter;
use parquet::record::RecordWriter;
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{
    Path,
    PathBuf,
};
use tracing::{
    debug,
    info,
};

/// One output row: a ranked candidate annotation of a feature.
#[derive(Debug, Clone, PartialEq, Serialize, ParquetRecordWriter)]
pub struct AnnotationRow {
    pub feature_id: u64,
    pub feature_label: String,
    pub mode: String,
    pub observed_mz: f64,
    pub observed_rt: f64,
    pub metabolite_id: String,
    pub metabolite_name: String,
    pub adduct: String,
    pub theoretical_mz: f64,
    pub mass_error_ppm: f64,
    pub mass_score: f64,
    pub adduct_score: f64,
    pub predicted_rt: Option<f64>,
    pub predicted_rt_stddev: Option<f64>,
    pub rt_score: f64,
    pub ensemble_score: f64,
    pub rank: u32,
}

impl From<&ScoredCandidate<'_>> for AnnotationRow {
    fn from(x: &ScoredCandidate<'_>) -> Self {
        let c = &x.candidate;
        Self {
            feature_id: c.feature.id as u64,
            feature_label: c.feature.metabolite_hint.clone(),
            mode: c.feature.mode.as_str().to_string(),
            observed_mz: c.feature.mz,
            observed_rt: c.feature.rt,
            metabolite_id: c.metabolite.id.clone(),
            metabolite_name: c.metabolite.name.clone(),
            adduct: c.adduct.name.clone(),
            theoretical_mz: c.theoretical_mz,
            mass_error_ppm: c.mass_error_ppm,
            mass_score: x.mass_score,
            adduct_score: x.adduct_score,
            predicted_rt: x.rt_prediction.map(|p| p.mean_rt),
            predicted_rt_stddev: x.rt_prediction.map(|p| p.stddev),
            rt_score: x.rt_score,
            ensemble_score: x.ensemble_score,
            rank: x.rank as u32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Csv,
    Parquet,
    Both,
}

impl OutputFormat {
    fn wants_csv(&self) -> bool {
        matches!(self, OutputFormat::Csv | OutputFormat::Both)
    }

    fn wants_parquet(&self) -> bool {
        matches!(self, OutputFormat::Parquet | OutputFormat::Both)
    }
}

fn create_new_file(path: &Path) -> Result<File, OutputWritingError> {
    File::create_new(path).map_err(|err| {
        tracing::error!("Failed to open file {:?} with error: {}", path, err);
        OutputWritingError::Io {
            source: err,
            path: path.to_path_buf(),
        }
    })
}

pub struct ResultCsvWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl ResultCsvWriter<File> {
    pub fn new(out_path: impl AsRef<Path>) -> Result<Self, OutputWritingError> {
        Ok(Self::from_writer(create_new_file(out_path.as_ref())?))
    }
}

impl<W: Write> ResultCsvWriter<W> {
    pub fn from_writer(writer: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(writer),
        }
    }

    pub fn add(&mut self, row: &AnnotationRow) -> Result<(), OutputWritingError> {
        self.writer.serialize(row)?;
        Ok(())
    }

    pub fn close(mut self) -> Result<W, OutputWritingError> {
        self.writer.flush().map_err(csv::Error::from)?;
        self.writer
            .into_inner()
            .map_err(|e| OutputWritingError::Csv(csv::Error::from(e.into_error())))
    }
}

pub struct ResultParquetWriter {
    row_group_size: usize,
    writer: SerializedFileWriter<File>,
    buffer: Vec<AnnotationRow>,
}

impl ResultParquetWriter {
    pub fn new(out_path: impl AsRef<Path>, row_group_size: usize) -> Result<Self, OutputWritingError> {
        let file = create_new_file(out_path.as_ref())?;
        let rows: &[AnnotationRow] = &[];
        let schema = rows.schema()?;
        let writer = SerializedFileWriter::new(file, schema, Default::default())?;
        Ok(Self {
            buffer: Vec::with_capacity(row_group_size),
            writer,
            row_group_size: row_group_size.max(1),
        })
    }

    fn flush_to_file(&mut self) -> Result<(), OutputWritingError> {
        debug!("Flushing {} rows to file", self.buffer.len());
        let mut row_group = self.writer.next_row_group()?;
        self.buffer.as_slice().write_to_row_group(&mut row_group)?;
        row_group.close()?;
        self.buffer.clear();
        Ok(())
    }

    pub fn add(&mut self, row: AnnotationRow) -> Result<(), OutputWritingError> {
        self.buffer.push(row);
        if self.buffer.len() >= self.row_group_size {
            self.flush_to_file()?;
        }
        Ok(())
    }

    pub fn close(mut self) -> Result<(), OutputWritingError> {
        if !self.buffer.is_empty() {
            self.flush_to_file()?;
        }
        self.writer.close()?;
        Ok(())
    }
}

/// Writes ranked annotations in the configured formats.
///
/// Keeps at most `top_k` candidates per feature when set; the ranked groups
/// themselves are never truncated.
pub struct AnnotationWriter {
    csv: Option<(ResultCsvWriter<File>, PathBuf)>,
    parquet: Option<(ResultParquetWriter, PathBuf)>,
    top_k: Option<usize>,
    num_rows: usize,
}

impl AnnotationWriter {
    pub const ROW_GROUP_SIZE: usize = 20_000;

    /// Creates `<directory>/<stem>.csv` and/or `<directory>/<stem>.parquet`.
    /// Existing files are never overwritten.
    pub fn new(
        directory: &Path,
        stem: &str,
        format: OutputFormat,
        top_k: Option<usize>,
    ) -> Result<Self, OutputWritingError> {
        let csv_path = format
            .wants_csv()
            .then(|| directory.join(format!("{}.csv", stem)));
        let parquet_path = format
            .wants_parquet()
            .then(|| directory.join(format!("{}.parquet", stem)));
        // Nothing is created unless every requested path is free.
        for path in csv_path.iter().chain(parquet_path.iter()) {
            if path.exists() {
                return Err(OutputWritingError::Io {
                    source: std::io::Error::new(
                        std::io::ErrorKind::AlreadyExists,
                        "output file already exists",
                    ),
                    path: path.clone(),
                });
            }
        }

        let csv = match csv_path {
            Some(path) => Some((ResultCsvWriter::new(&path)?, path)),
            None => None,
        };
        let parquet = match parquet_path {
            Some(path) => match ResultParquetWriter::new(&path, Self::ROW_GROUP_SIZE) {
                Ok(writer) => Some((writer, path)),
                Err(e) => {
                    if let Some((writer, csv_path)) = csv {
                        drop(writer);
                        if let Err(rm) = std::fs::remove_file(&csv_path) {
                            debug!("Could not remove {}: {}", csv_path.display(), rm);
                        }
                    }
                    return Err(e);
                }
            },
            None => None,
        };
        Ok(Self {
            csv,
            parquet,
            top_k,
            num_rows: 0,
        })
    }

    /// Returns the number of rows written for this feature.
    pub fn write_feature(&mut self, ranked: &[ScoredCandidate]) -> Result<usize, OutputWritingError> {
        let keep = self.top_k.map_or(ranked.len(), |k| k.min(ranked.len()));
        for scored in ranked[..keep].iter() {
            let row = AnnotationRow::from(scored);
            if let Some((writer, _)) = self.csv.as_mut() {
                writer.add(&row)?;
            }
            if let Some((writer, _)) = self.parquet.as_mut() {
                writer.add(row)?;
            }
        }
        self.num_rows += keep;
        Ok(keep)
    }

    pub fn write_ranked(
        &mut self,
        ranked: &BTreeMap<usize, Vec<ScoredCandidate>>,
    ) -> Result<usize, OutputWritingError> {
        let mut total = 0;
        for group in ranked.values() {
            total += self.write_feature(group)?;
        }
        Ok(total)
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Returns the paths that were written.
    pub fn close(self) -> Result<Vec<PathBuf>, OutputWritingError> {
        let mut paths = Vec::new();
        if let Some((writer, path)) = self.csv {
            writer.close()?;
            paths.push(path);
        }
        if let Some((writer, path)) = self.parquet {
            writer.close()?;
            paths.push(path);
        }
        for path in paths.iter() {
            info!("Wrote {} rows to {}", self.num_rows, path.display());
        }
        Ok(paths)
    }
}
