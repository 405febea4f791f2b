use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::NaiveDate;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, DuplicateKey};
use crate::evidence::{compute_summary, derive_status};

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// One cell. `Missing` is a present-but-null value; an absent field is
/// simply not in the record's map.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Missing,
    Number(f64),
    Text(String),
    Date(NaiveDate),
}

impl Value {
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Missing => write!(f, "missing"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Missing)
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A row: field name -> value. Iteration order is by field name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// One component of a key tuple. Keys are identifiers: equality is exact
/// and the ordering is total so findings sort the same way everywhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum KeyPart {
    Missing,
    Number(OrderedFloat<f64>),
    Text(String),
    Date(NaiveDate),
}

impl From<&Value> for KeyPart {
    fn from(v: &Value) -> Self {
        match v {
            Value::Missing => KeyPart::Missing,
            Value::Number(n) => KeyPart::Number(OrderedFloat(*n)),
            Value::Text(s) => KeyPart::Text(s.clone()),
            Value::Date(d) => KeyPart::Date(*d),
        }
    }
}

impl From<f64> for KeyPart {
    fn from(n: f64) -> Self {
        KeyPart::Number(OrderedFloat(n))
    }
}

impl From<&str> for KeyPart {
    fn from(s: &str) -> Self {
        KeyPart::Text(s.to_string())
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Missing => Ok(()),
            KeyPart::Number(n) => write!(f, "{}", n.0),
            KeyPart::Text(s) => write!(f, "{s}"),
            KeyPart::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

/// Key tuple, ordered like the base side's key fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Key(Vec<KeyPart>);

impl Key {
    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }
}

impl From<Vec<KeyPart>> for Key {
    fn from(parts: Vec<KeyPart>) -> Self {
        Key(parts)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "|")?;
            }
            write!(f, "{part}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Result sets
// ---------------------------------------------------------------------------

/// One side of a comparison. Immutable once built; construction enforces
/// that every record carries every key field and that key tuples are unique.
#[derive(Debug, Clone)]
pub struct ResultSet {
    name: String,
    key_fields: Vec<String>,
    records: Vec<Record>,
}

impl ResultSet {
    pub fn new<I, S>(
        name: impl Into<String>,
        key_fields: I,
        records: Vec<Record>,
    ) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        let key_fields: Vec<String> = key_fields.into_iter().map(Into::into).collect();

        if key_fields.is_empty() {
            return Err(ConfigurationError::EmptyKeyFields { set: name });
        }

        let mut seen = BTreeSet::new();
        for field in &key_fields {
            if !seen.insert(field.as_str()) {
                return Err(ConfigurationError::DuplicateKeyField {
                    set: name,
                    field: field.clone(),
                });
            }
        }

        for (index, record) in records.iter().enumerate() {
            if let Some(field) = key_fields.iter().find(|f| !record.contains(f)) {
                return Err(ConfigurationError::MissingKeyField {
                    set: name,
                    field: field.clone(),
                    index,
                });
            }
        }

        let mut counts: BTreeMap<Key, usize> = BTreeMap::new();
        for record in &records {
            *counts.entry(key_of(record, &key_fields)).or_insert(0) += 1;
        }
        let duplicates: Vec<DuplicateKey> = counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(key, count)| DuplicateKey {
                key: key.to_string(),
                count,
            })
            .collect();
        if !duplicates.is_empty() {
            return Err(ConfigurationError::DuplicateKeys {
                set: name,
                keys: duplicates,
            });
        }

        Ok(Self {
            name,
            key_fields,
            records,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_fields(&self) -> &[String] {
        &self.key_fields
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_key_field(&self, name: &str) -> bool {
        self.key_fields.iter().any(|k| k == name)
    }
}

/// Build a record's key tuple in the given field order.
pub(crate) fn key_of(record: &Record, order: &[String]) -> Key {
    Key(order
        .iter()
        .map(|f| record.get(f).map(KeyPart::from).unwrap_or(KeyPart::Missing))
        .collect())
}

// ---------------------------------------------------------------------------
// Findings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    MissingRecord,
    ExtraRecord,
    MissingField,
    ExtraField,
    ValueMismatch,
    ValueMatch,
}

impl FindingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingRecord => "missing_record",
            Self::ExtraRecord => "extra_record",
            Self::MissingField => "missing_field",
            Self::ExtraField => "extra_field",
            Self::ValueMismatch => "value_mismatch",
            Self::ValueMatch => "value_match",
        }
    }
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Critical > Major > Minor > Info.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Minor,
    Major,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Minor => "minor",
            Self::Major => "major",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One discrepancy or confirmation. Owned by its [`ComparisonRun`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub kind: FindingKind,
    pub key: Key,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compare: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difference: Option<f64>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub coercion_failure: bool,
    pub detail: String,
}

impl Finding {
    pub(crate) fn record(kind: FindingKind, key: Key, severity: Severity, detail: &str) -> Self {
        Self {
            kind,
            key,
            field: None,
            severity,
            base: None,
            compare: None,
            difference: None,
            coercion_failure: false,
            detail: detail.to_string(),
        }
    }

    /// Anything other than a confirmed match.
    pub fn is_discrepancy(&self) -> bool {
        self.kind != FindingKind::ValueMatch
    }

    /// Report order: key tuple, then field name (record-level first).
    pub fn report_order(a: &Finding, b: &Finding) -> Ordering {
        a.key.cmp(&b.key).then_with(|| a.field.cmp(&b.field))
    }
}

// ---------------------------------------------------------------------------
// Runs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Pass,
    Warning,
    Fail,
}

impl OverallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Warning => "warning",
            Self::Fail => "fail",
        }
    }
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub major: usize,
    pub minor: usize,
    pub info: usize,
}

impl SeverityCounts {
    pub fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::Major => self.major += 1,
            Severity::Minor => self.minor += 1,
            Severity::Info => self.info += 1,
        }
    }

    pub fn merge(&mut self, other: &SeverityCounts) {
        self.critical += other.critical;
        self.major += other.major;
        self.minor += other.minor;
        self.info += other.info;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub records_in_both: usize,
    pub findings: usize,
    pub value_matches: usize,
    pub value_mismatches: usize,
    pub coercion_failures: usize,
    pub missing_records: usize,
    pub extra_records: usize,
    pub missing_fields: usize,
    pub extra_fields: usize,
    pub severity: SeverityCounts,
}

/// The complete output of one `compare()` call. Fields are private: the
/// status and summary are derived from the findings at construction.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonRun {
    base_name: String,
    compare_name: String,
    key_fields: Vec<String>,
    overall_status: OverallStatus,
    warnings_only: bool,
    total_records_base: usize,
    total_records_compare: usize,
    summary: RunSummary,
    findings: Vec<Finding>,
}

impl ComparisonRun {
    pub(crate) fn assemble(
        base: &ResultSet,
        compare: &ResultSet,
        warnings_only: bool,
        mut findings: Vec<Finding>,
    ) -> Self {
        findings.sort_by(Finding::report_order);
        let overall_status = derive_status(&findings, warnings_only);
        let summary = compute_summary(&findings, base.len());
        Self {
            base_name: base.name().to_string(),
            compare_name: compare.name().to_string(),
            key_fields: base.key_fields().to_vec(),
            overall_status,
            warnings_only,
            total_records_base: base.len(),
            total_records_compare: compare.len(),
            summary,
            findings,
        }
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    pub fn compare_name(&self) -> &str {
        &self.compare_name
    }

    pub fn key_fields(&self) -> &[String] {
        &self.key_fields
    }

    pub fn overall_status(&self) -> OverallStatus {
        self.overall_status
    }

    pub fn warnings_only(&self) -> bool {
        self.warnings_only
    }

    pub fn total_records_base(&self) -> usize {
        self.total_records_base
    }

    pub fn total_records_compare(&self) -> usize {
        self.total_records_compare
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn discrepancies(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.is_discrepancy())
    }
}
