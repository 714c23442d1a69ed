//! Table reader/writer collaborators.
//!
//! Turns CSV/TSV bytes into the plain `Vec<Vec<String>>` a [`crate::Reader`]
//! consumes, and rendered rows back into bytes. The engine itself never
//! calls this module.

use std::path::Path;

use crate::error::{TableError, TableResult};

/// Delimiters tried by auto-detection, in order of preference on ties.
const DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Supported table formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Tsv,
}

impl TableFormat {
    pub fn delimiter(self) -> u8 {
        match self {
            Self::Csv => b',',
            Self::Tsv => b'\t',
        }
    }

    /// Format for a file extension (`csv`, `tsv`, `txt`).
    pub fn from_extension(ext: &str) -> TableResult<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "tsv" | "tab" | "txt" => Ok(Self::Tsv),
            other => Err(TableError::UnsupportedFormat(other.to_string())),
        }
    }

    pub fn from_path(path: &Path) -> TableResult<Self> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        Self::from_extension(ext)
    }
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let (charset, _confidence, _language) = chardet::detect(bytes);

    match charset.to_lowercase().as_str() {
        "" | "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes with `encoding`; unknown labels fall back to lossy UTF-8.
pub fn decode_content(bytes: &[u8], encoding: &str) -> TableResult<String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => String::from_utf8(bytes.to_vec())
            .or_else(|_| Ok(String::from_utf8_lossy(bytes).into_owned())),
        label => match encoding_rs::Encoding::for_label(label.as_bytes()) {
            Some(enc) => {
                let (decoded, _, had_errors) = enc.decode(bytes);
                if had_errors {
                    return Err(TableError::Encoding(format!("malformed {} input", enc.name())));
                }
                Ok(decoded.into_owned())
            }
            None => Ok(String::from_utf8_lossy(bytes).into_owned()),
        },
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> u8 {
    let first_line = content.lines().next().unwrap_or("");

    let mut best = DELIMITERS[0];
    let mut best_count = 0;
    for &sep in &DELIMITERS {
        let count = first_line.bytes().filter(|b| *b == sep).count();
        if count > best_count {
            best_count = count;
            best = sep;
        }
    }
    best
}

// =============================================================================
// Reader
// =============================================================================

/// Parsed table with the settings used to read it.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTable {
    pub rows: Vec<Vec<String>>,
    pub encoding: String,
    pub delimiter: u8,
}

/// Reads CSV/TSV bytes into rows of strings.
#[derive(Debug, Clone, Default)]
pub struct TableReader {
    delimiter: Option<u8>,
    encoding: Option<String>,
    skip_rows: usize,
}

impl TableReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn format(mut self, format: TableFormat) -> Self {
        self.delimiter = Some(format.delimiter());
        self
    }

    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    pub fn encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    /// Drop leading rows, typically the header.
    pub fn skip_rows(mut self, count: usize) -> Self {
        self.skip_rows = count;
        self
    }

    pub fn read_bytes(&self, bytes: &[u8]) -> TableResult<ParsedTable> {
        let encoding = self.encoding.clone().unwrap_or_else(|| detect_encoding(bytes));
        let content = decode_content(bytes, &encoding)?;
        let delimiter = self.delimiter.unwrap_or_else(|| detect_delimiter(&content));

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .from_reader(content.as_bytes());

        let mut rows = Vec::new();
        for record in reader.records().skip(self.skip_rows) {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(ParsedTable {
            rows,
            encoding,
            delimiter,
        })
    }

    /// Read a file; the delimiter follows the extension unless set.
    pub fn read_path(&self, path: impl AsRef<Path>) -> TableResult<ParsedTable> {
        let path = path.as_ref();
        let reader = match (self.delimiter, TableFormat::from_path(path)) {
            (None, Ok(format)) => self.clone().format(format),
            _ => self.clone(),
        };
        let bytes = std::fs::read(path)?;
        reader.read_bytes(&bytes)
    }
}

// =============================================================================
// Writer
// =============================================================================

/// Serializes rows of strings as CSV/TSV.
#[derive(Debug, Clone, Copy)]
pub struct TableWriter {
    delimiter: u8,
}

impl Default for TableWriter {
    fn default() -> Self {
        Self::new(TableFormat::Csv)
    }
}

impl TableWriter {
    pub fn new(format: TableFormat) -> Self {
        Self {
            delimiter: format.delimiter(),
        }
    }

    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn write(&self, rows: &[Vec<String>]) -> TableResult<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .delimiter(self.delimiter)
            .from_writer(Vec::new());
        for row in rows {
            writer.write_record(row)?;
        }
        writer
            .into_inner()
            .map_err(|e| TableError::Io(std::io::Error::new(e.error().kind(), e.error().to_string())))
    }

    pub fn write_path(&self, path: impl AsRef<Path>, rows: &[Vec<String>]) -> TableResult<()> {
        let bytes = self.write(rows)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}
