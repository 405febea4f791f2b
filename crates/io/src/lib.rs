// Result-set loading and finding export

pub mod csv;
pub mod error;
pub mod export;
pub mod json;

use std::path::Path;
use std::str::FromStr;

use qcdiff_validate::coerce::format_number;
use qcdiff_validate::{Record, ResultSet, Value};

pub use error::{ExportError, LoadError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Csv,
    Tsv,
    Json,
}

impl Format {
    /// Infer from the file extension. `.txt` is read as delimited text.
    pub fn from_path(path: &Path) -> Option<Format> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" | "txt" => Some(Format::Csv),
            "tsv" | "tab" => Some(Format::Tsv),
            "json" => Some(Format::Json),
            _ => None,
        }
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Format::Csv),
            "tsv" => Ok(Format::Tsv),
            "json" => Ok(Format::Json),
            other => Err(format!("unknown format '{other}' (expected csv, tsv or json)")),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Overrides extension-based detection.
    pub format: Option<Format>,
    /// Delimiter for CSV input; sniffed when unset.
    pub delimiter: Option<u8>,
}

pub fn load_records(path: &Path, options: &LoadOptions) -> Result<Vec<Record>, LoadError> {
    let format = options
        .format
        .or_else(|| Format::from_path(path))
        .ok_or_else(|| LoadError::UnknownFormat {
            path: path.display().to_string(),
        })?;

    let records = match format {
        Format::Csv => crate::csv::load_records(path, options.delimiter)?,
        Format::Tsv => crate::csv::load_records(path, Some(options.delimiter.unwrap_or(b'\t')))?,
        Format::Json => crate::json::load_records(path)?,
    };
    log::debug!("{}: {} records ({:?})", path.display(), records.len(), format);
    Ok(records)
}

/// Load a file into a validated [`ResultSet`].
pub fn load(
    path: &Path,
    name: &str,
    key_fields: &[String],
    options: &LoadOptions,
) -> Result<ResultSet, LoadError> {
    let mut records = load_records(path, options)?;
    text_keys(&mut records, key_fields);
    Ok(ResultSet::new(name, key_fields.iter().cloned(), records)?)
}

/// CSV key cells are text; render numeric key cells (JSON ids) the way a
/// CSV cell spells them so both loaders produce the same key tuples.
fn text_keys(records: &mut [Record], key_fields: &[String]) {
    for record in records.iter_mut() {
        for field in key_fields {
            if let Some(&Value::Number(n)) = record.get(field) {
                record.insert(field.clone(), Value::Text(format_number(n)));
            }
        }
    }
}

/// Default result-set name: the file stem.
pub fn default_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
