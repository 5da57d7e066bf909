use crate::errors::LibraryReadingError;
use crate::models::{
    ChemicalProperties,
    MetaboliteRecord,
    ShapeDescriptors,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::io::{
    BufRead,
    BufReader,
    Read,
};
use std::path::{
    Path,
    PathBuf,
};
use tracing::{
    info,
    warn,
};

/// One metabolite as written by the database extraction step.
///
/// The mass is kept optional so that entries without a usable mass can be
/// counted and skipped instead of failing the whole library.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerMetaboliteElement {
    #[serde(alias = "id")]
    accession: String,
    #[serde(default)]
    name: String,
    #[serde(default, alias = "monisotopic_molecular_weight")]
    monoisotopic_mass: Option<f64>,
    #[serde(default)]
    formula: Option<String>,
    #[serde(default)]
    smiles: Option<String>,
    #[serde(default)]
    chem_class: Option<String>,
    #[serde(default)]
    chem_sub_class: Option<String>,
    #[serde(default)]
    properties: ChemicalProperties,
    #[serde(default)]
    shape: ShapeDescriptors,
}

impl SerMetaboliteElement {
    fn into_record(self) -> Option<MetaboliteRecord> {
        let mass = self.monoisotopic_mass?;
        let record = MetaboliteRecord {
            id: self.accession,
            name: self.name,
            monoisotopic_mass: mass,
            formula: self.formula,
            smiles: self.smiles,
            chem_class: self.chem_class,
            chem_sub_class: self.chem_sub_class,
            properties: self.properties,
            shape: self.shape,
        };
        if record.has_valid_mass() {
            Some(record)
        } else {
            None
        }
    }
}

impl From<&MetaboliteRecord> for SerMetaboliteElement {
    fn from(x: &MetaboliteRecord) -> Self {
        SerMetaboliteElement {
            accession: x.id.clone(),
            name: x.name.clone(),
            monoisotopic_mass: Some(x.monoisotopic_mass),
            formula: x.formula.clone(),
            smiles: x.smiles.clone(),
            chem_class: x.chem_class.clone(),
            chem_sub_class: x.chem_sub_class.clone(),
            properties: x.properties.clone(),
            shape: x.shape.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryFormat {
    NdJson,
    NdJsonZstd,
    MessagePack,
    MessagePackZstd,
}

impl LibraryFormat {
    pub fn detect_from_path(path: &Path) -> Result<Self, LibraryReadingError> {
        let path_str = path.to_string_lossy().to_lowercase();

        if path_str.ends_with(".msgpack.zst") {
            Ok(LibraryFormat::MessagePackZstd)
        } else if path_str.ends_with(".msgpack") {
            Ok(LibraryFormat::MessagePack)
        } else if path_str.ends_with(".ndjson.zst") {
            Ok(LibraryFormat::NdJsonZstd)
        } else if path_str.ends_with(".ndjson") || path_str.ends_with(".jsonl") {
            Ok(LibraryFormat::NdJson)
        } else {
            Self::detect_from_content(path)
        }
    }

    fn detect_from_content(path: &Path) -> Result<Self, LibraryReadingError> {
        let file =
            std::fs::File::open(path).map_err(|e| LibraryReadingError::FileReadingError {
                source: e,
                context: "Error opening file for format detection",
                path: PathBuf::from(path),
            })?;

        let mut reader = BufReader::new(file);
        let mut buffer = [0u8; 8];

        match reader.read(&mut buffer) {
            Ok(bytes_read) if bytes_read >= 4 => {
                if buffer[0..4] == [0x28, 0xB5, 0x2F, 0xFD] {
                    Ok(LibraryFormat::MessagePackZstd)
                } else if buffer[0] == b'{' {
                    Ok(LibraryFormat::NdJson)
                } else {
                    Ok(LibraryFormat::MessagePack)
                }
            }
            _ => Ok(LibraryFormat::NdJson),
        }
    }
}

type ElementResult = Result<SerMetaboliteElement, LibraryReadingError>;

pub struct LibraryReader<'a> {
    inner: Box<dyn Iterator<Item = ElementResult> + Send + 'a>,
}

impl<'a> LibraryReader<'a> {
    pub fn new<R: Read + Send + 'a>(
        reader: R,
        format: LibraryFormat,
    ) -> Result<Self, LibraryReadingError> {
        let inner: Box<dyn Iterator<Item = ElementResult> + Send + 'a> = match format {
            LibraryFormat::NdJson => Box::new(NdJsonReader::new(BufReader::new(reader))),
            LibraryFormat::NdJsonZstd => {
                let decoder = zstd_decoder(reader)?;
                Box::new(NdJsonReader::new(BufReader::new(decoder)))
            }
            LibraryFormat::MessagePack => Box::new(MessagePackReader::new(reader)),
            LibraryFormat::MessagePackZstd => {
                let decoder = zstd_decoder(reader)?;
                Box::new(MessagePackReader::new(decoder))
            }
        };

        Ok(LibraryReader { inner })
    }
}

fn zstd_decoder<R: Read>(
    reader: R,
) -> Result<zstd::Decoder<'static, BufReader<R>>, LibraryReadingError> {
    zstd::Decoder::new(reader).map_err(|e| LibraryReadingError::LibraryParsingError {
        source: serde_json::Error::io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        context: "Error creating ZSTD decoder",
    })
}

impl Iterator for LibraryReader<'_> {
    type Item = ElementResult;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

struct NdJsonReader<R: BufRead> {
    reader: R,
    line: String,
}

impl<R: BufRead> NdJsonReader<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
        }
    }
}

impl<R: BufRead> Iterator for NdJsonReader<R> {
    type Item = ElementResult;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.line.clear();
            match self.reader.read_line(&mut self.line) {
                Ok(0) => return None,
                Ok(_) => {
                    if self.line.trim().is_empty() {
                        continue;
                    }
                    return Some(serde_json::from_str(&self.line).map_err(|e| {
                        LibraryReadingError::LibraryParsingError {
                            source: e,
                            context: "Error parsing NDJSON line",
                        }
                    }));
                }
                Err(e) => {
                    return Some(Err(LibraryReadingError::FileReadingError {
                        source: e,
                        context: "Error reading line",
                        path: PathBuf::new(),
                    }));
                }
            }
        }
    }
}

struct MessagePackReader<R: Read> {
    deserializer: rmp_serde::Deserializer<rmp_serde::decode::ReadReader<R>>,
}

impl<R: Read> MessagePackReader<R> {
    fn new(reader: R) -> Self {
        Self {
            deserializer: rmp_serde::Deserializer::new(reader),
        }
    }
}

impl<R: Read> Iterator for MessagePackReader<R> {
    type Item = ElementResult;

    fn next(&mut self) -> Option<Self::Item> {
        match SerMetaboliteElement::deserialize(&mut self.deserializer) {
            Ok(elem) => Some(Ok(elem)),
            Err(rmp_serde::decode::Error::InvalidMarkerRead(ref io_err))
                if io_err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                None
            } // EOF
            Err(rmp_serde::decode::Error::InvalidDataRead(ref io_err))
                if io_err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                None
            } // EOF
            Err(e) => Some(Err(LibraryReadingError::LibraryParsingError {
                source: serde_json::Error::io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    e,
                )),
                context: "Error reading MessagePack",
            })),
        }
    }
}

/// The reference metabolite set, immutable once loaded.
#[derive(Debug, Clone, Default)]
pub struct MetaboliteLibrary {
    elems: Vec<MetaboliteRecord>,
}

impl MetaboliteLibrary {
    pub fn new(elems: Vec<MetaboliteRecord>) -> Self {
        Self { elems }
    }

    pub fn from_file(path: &Path) -> Result<Self, LibraryReadingError> {
        let format = LibraryFormat::detect_from_path(path)?;
        Self::from_file_with_format(path, format)
    }

    pub fn from_file_with_format(
        path: &Path,
        format: LibraryFormat,
    ) -> Result<Self, LibraryReadingError> {
        let file =
            std::fs::File::open(path).map_err(|e| LibraryReadingError::FileReadingError {
                source: e,
                context: "Error opening metabolite library file",
                path: PathBuf::from(path),
            })?;

        let out = Self::from_reader(file, format)?;
        info!("Loaded {} metabolites from {}", out.len(), path.display());
        Ok(out)
    }

    pub fn from_reader<R: Read + Send>(
        reader: R,
        format: LibraryFormat,
    ) -> Result<Self, LibraryReadingError> {
        let reader = LibraryReader::new(reader, format)?;
        let mut elems = Vec::new();
        let mut num_skipped = 0;
        for elem in reader {
            match elem?.into_record() {
                Some(record) => elems.push(record),
                None => num_skipped += 1,
            }
        }

        if num_skipped > 0 {
            warn!(
                "Skipped {} metabolites without a finite positive monoisotopic mass",
                num_skipped
            );
        }
        Ok(Self { elems })
    }

    pub fn as_slice(&self) -> &[MetaboliteRecord] {
        &self.elems
    }

    pub fn len(&self) -> usize {
        self.elems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }
}

impl Serialize for MetaboliteLibrary {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let ser: Vec<SerMetaboliteElement> = self.elems.iter().map(|x| x.into()).collect();
        ser.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const NDJSON: &str = r#"{"accession": "HMDB0000122", "name": "D-Glucose", "monoisotopic_mass": 180.063388116, "formula": "C6H12O6", "properties": {"logp": -2.9, "donor_count": 5}}

{"accession": "HMDB0000094", "name": "Citric acid", "monoisotopic_mass": 192.027002596, "shape": {"pmi1": 120.5}}
{"accession": "HMDB9999999", "name": "No mass"}
{"accession": "HMDB9999998", "name": "Zero mass", "monoisotopic_mass": 0.0}
"#;

    #[test]
    fn test_ndjson_library() {
        let lib = MetaboliteLibrary::from_reader(Cursor::new(NDJSON), LibraryFormat::NdJson).unwrap();
        assert_eq!(lib.len(), 2);
        let glucose = &lib.as_slice()[0];
        assert_eq!(glucose.id, "HMDB0000122");
        assert_eq!(glucose.formula.as_deref(), Some("C6H12O6"));
        assert_eq!(glucose.properties.logp, Some(-2.9));
        assert_eq!(glucose.properties.donor_count, Some(5));
        assert_eq!(glucose.properties.logs, None);
        assert_eq!(lib.as_slice()[1].shape.pmi1, Some(120.5));
    }

    #[test]
    fn test_bad_line_is_an_error() {
        let bad = "{\"accession\": \"x\", \"monoisotopic_mass\": \"heavy\"}\n";
        let res = MetaboliteLibrary::from_reader(Cursor::new(bad), LibraryFormat::NdJson);
        assert!(matches!(
            res,
            Err(LibraryReadingError::LibraryParsingError { .. })
        ));
    }

    #[test]
    fn test_messagepack_library() {
        let lib = MetaboliteLibrary::from_reader(Cursor::new(NDJSON), LibraryFormat::NdJson).unwrap();
        let mut buf = Vec::new();
        for record in lib.as_slice() {
            let elem: SerMetaboliteElement = record.into();
            rmp_serde::encode::write_named(&mut buf, &elem).unwrap();
        }
        let back =
            MetaboliteLibrary::from_reader(Cursor::new(buf), LibraryFormat::MessagePack).unwrap();
        assert_eq!(back.as_slice(), lib.as_slice());
    }
}
