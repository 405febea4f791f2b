use thiserror::Error;

/// A key tuple that occurs more than once within one result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateKey {
    pub key: String,
    pub count: usize,
}

/// Schema-level problems. These are the only errors the engine raises:
/// everything found while comparing records becomes a finding instead.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// The two sides do not declare the same set of key fields.
    #[error(
        "key fields differ between '{base}' and '{compare}': only in base [{}], only in compare [{}]",
        only_in_base.join(", "),
        only_in_compare.join(", ")
    )]
    KeyFieldMismatch {
        base: String,
        compare: String,
        only_in_base: Vec<String>,
        only_in_compare: Vec<String>,
    },

    /// A result set was declared without key fields.
    #[error("result set '{set}': at least one key field is required")]
    EmptyKeyFields { set: String },

    /// The same key field is listed twice.
    #[error("result set '{set}': key field '{field}' is listed more than once")]
    DuplicateKeyField { set: String, field: String },

    /// A record does not carry one of the declared key fields.
    #[error("result set '{set}': record {index} has no value for key field '{field}'")]
    MissingKeyField {
        set: String,
        field: String,
        index: usize,
    },

    /// Key tuples are not unique within a result set.
    #[error(
        "result set '{set}': duplicate keys: {}",
        keys.iter().map(|d| format!("{} ({} times)", d.key, d.count)).collect::<Vec<_>>().join(", ")
    )]
    DuplicateKeys { set: String, keys: Vec<DuplicateKey> },

    /// A field specification is inconsistent with its kind or with the key.
    #[error("field '{field}': {reason}")]
    InvalidFieldSpec { field: String, reason: String },

    /// The function-level default tolerance is unusable.
    #[error("default tolerance: {0}")]
    InvalidTolerance(String),

    /// TOML parse / deserialization error in a spec file.
    #[error("spec parse error: {0}")]
    SpecParse(String),
}
