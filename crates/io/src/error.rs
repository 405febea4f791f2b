use qcdiff_validate::ConfigurationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Malformed CSV or JSON content.
    #[error("{path}: {message}")]
    Parse { path: String, message: String },

    #[error("{path}: cannot tell the file format from its extension (expected .csv, .tsv, .txt or .json)")]
    UnknownFormat { path: String },

    /// The data loaded but does not form a valid result set
    /// (missing key column, duplicate keys).
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl LoadError {
    pub(crate) fn parse(path: &str, message: impl Into<String>) -> Self {
        LoadError::Parse {
            path: path.to_string(),
            message: message.into(),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, LoadError::Configuration(_))
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("json export failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("export failed: {0}")]
    Io(#[from] std::io::Error),
}
