use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::model::Severity;

/// Default absolute tolerance when neither the field nor the caller sets one.
pub const DEFAULT_ABS_TOLERANCE: f64 = 1e-8;

// ---------------------------------------------------------------------------
// Field kinds + criticality
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Numeric,
    Text,
    Date,
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Numeric => write!(f, "numeric"),
            Self::Text => write!(f, "text"),
            Self::Date => write!(f, "date"),
        }
    }
}

/// How a value mismatch on a field is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Criticality {
    Critical,
    #[default]
    Major,
    Minor,
}

impl From<Criticality> for Severity {
    fn from(c: Criticality) -> Self {
        match c {
            Criticality::Critical => Severity::Critical,
            Criticality::Major => Severity::Major,
            Criticality::Minor => Severity::Minor,
        }
    }
}

// ---------------------------------------------------------------------------
// Tolerance
// ---------------------------------------------------------------------------

/// Numeric tolerance. `rel` is optional; when set, a pair also matches if
/// the difference is within `rel` of the larger magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Tolerance {
    #[serde(default)]
    pub abs: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel: Option<f64>,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            abs: DEFAULT_ABS_TOLERANCE,
            rel: None,
        }
    }
}

impl Tolerance {
    pub fn absolute(abs: f64) -> Self {
        Self { abs, rel: None }
    }

    pub fn with_rel(mut self, rel: f64) -> Self {
        self.rel = Some(rel);
        self
    }

    fn check(&self) -> Result<(), String> {
        if !self.abs.is_finite() || self.abs < 0.0 {
            return Err(format!("absolute tolerance must be a finite number >= 0, got {}", self.abs));
        }
        if let Some(rel) = self.rel {
            if !rel.is_finite() || rel < 0.0 {
                return Err(format!("relative tolerance must be a finite number >= 0, got {rel}"));
            }
        }
        Ok(())
    }
}

/// Per-field tolerance as written in a spec file: `abs`/`rel` for numeric
/// fields, `days` for date fields.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FieldTolerance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<u32>,
}

impl FieldTolerance {
    fn is_numeric(&self) -> bool {
        self.abs.is_some() || self.rel.is_some()
    }

    /// A declared numeric tolerance replaces the default as a whole.
    pub fn numeric(&self) -> Option<Tolerance> {
        self.is_numeric().then(|| Tolerance {
            abs: self.abs.unwrap_or(0.0),
            rel: self.rel,
        })
    }
}

// ---------------------------------------------------------------------------
// Field spec
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<FieldTolerance>,
    #[serde(default)]
    pub criticality: Criticality,
    #[serde(default)]
    pub case_insensitive: bool,
}

impl FieldSpec {
    fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            tolerance: None,
            criticality: Criticality::Major,
            case_insensitive: false,
        }
    }

    pub fn numeric(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Numeric)
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text)
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Date)
    }

    pub fn abs(mut self, abs: f64) -> Self {
        self.tolerance.get_or_insert_with(FieldTolerance::default).abs = Some(abs);
        self
    }

    pub fn rel(mut self, rel: f64) -> Self {
        self.tolerance.get_or_insert_with(FieldTolerance::default).rel = Some(rel);
        self
    }

    pub fn days(mut self, days: u32) -> Self {
        self.tolerance.get_or_insert_with(FieldTolerance::default).days = Some(days);
        self
    }

    pub fn criticality(mut self, criticality: Criticality) -> Self {
        self.criticality = criticality;
        self
    }

    pub fn case_insensitive(mut self) -> Self {
        self.case_insensitive = true;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let invalid = |reason: String| ConfigurationError::InvalidFieldSpec {
            field: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("field name must not be empty".into()));
        }
        if self.case_insensitive && self.kind != FieldKind::Text {
            return Err(invalid(format!(
                "case_insensitive applies to text fields only, field is {}",
                self.kind
            )));
        }
        if let Some(tol) = &self.tolerance {
            match self.kind {
                FieldKind::Numeric => {
                    if tol.days.is_some() {
                        return Err(invalid("a day tolerance applies to date fields only".into()));
                    }
                    if let Some(numeric) = tol.numeric() {
                        numeric.check().map_err(invalid)?;
                    }
                }
                FieldKind::Date => {
                    if tol.is_numeric() {
                        return Err(invalid(
                            "abs/rel tolerances apply to numeric fields only; use days".into(),
                        ));
                    }
                }
                FieldKind::Text => {
                    return Err(invalid("text fields do not take a tolerance".into()));
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Severity policy
// ---------------------------------------------------------------------------

/// Severity assigned to structural findings. Value mismatches use the
/// field's criticality instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SeverityPolicy {
    /// Key present in compare only.
    pub missing_record: Severity,
    /// Key present in base only.
    pub extra_record: Severity,
    /// Field present in the compare record only.
    pub missing_field: Severity,
    /// Field present in the base record only.
    pub extra_field: Severity,
}

impl Default for SeverityPolicy {
    fn default() -> Self {
        Self {
            missing_record: Severity::Critical,
            extra_record: Severity::Major,
            missing_field: Severity::Minor,
            extra_field: Severity::Minor,
        }
    }
}

impl SeverityPolicy {
    /// Same severity for both directions, for callers that treat the two
    /// sides as peers.
    pub fn symmetric(record: Severity, field: Severity) -> Self {
        Self {
            missing_record: record,
            extra_record: record,
            missing_field: field,
            extra_field: field,
        }
    }
}

// ---------------------------------------------------------------------------
// Compare options
// ---------------------------------------------------------------------------

/// Everything `compare()` needs beyond the two result sets.
#[derive(Debug, Clone, PartialEq)]
pub struct CompareOptions {
    pub fields: Vec<FieldSpec>,
    pub tolerance_default: Tolerance,
    pub warnings_only: bool,
    pub policy: SeverityPolicy,
    /// Origin for integer day counts supplied to date fields.
    pub day_count_epoch: NaiveDate,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            fields: Vec::new(),
            tolerance_default: Tolerance::default(),
            warnings_only: false,
            policy: SeverityPolicy::default(),
            day_count_epoch: default_epoch(),
        }
    }
}

impl CompareOptions {
    pub fn with_fields(mut self, fields: Vec<FieldSpec>) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance_default = tolerance;
        self
    }

    pub fn warnings_only(mut self, warnings_only: bool) -> Self {
        self.warnings_only = warnings_only;
        self
    }

    pub fn with_policy(mut self, policy: SeverityPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Validate field specs and the default tolerance against the key.
    pub fn validate(&self, key_fields: &[String]) -> Result<(), ConfigurationError> {
        self.tolerance_default
            .check()
            .map_err(ConfigurationError::InvalidTolerance)?;

        let mut seen = BTreeSet::new();
        for spec in &self.fields {
            spec.validate()?;
            if !seen.insert(spec.name.as_str()) {
                return Err(ConfigurationError::InvalidFieldSpec {
                    field: spec.name.clone(),
                    reason: "declared more than once".into(),
                });
            }
            if key_fields.iter().any(|k| k == &spec.name) {
                return Err(ConfigurationError::InvalidFieldSpec {
                    field: spec.name.clone(),
                    reason: "is a key field; key fields are matched exactly, not compared".into(),
                });
            }
        }
        Ok(())
    }
}

/// Origin for integer day-count inputs unless a spec sets `[date] epoch`.
pub const DEFAULT_EPOCH: NaiveDate = match NaiveDate::from_ymd_opt(1970, 1, 1) {
    Some(date) => date,
    None => panic!("1970-01-01 is a valid date"),
};

fn default_epoch() -> NaiveDate {
    DEFAULT_EPOCH
}

// ---------------------------------------------------------------------------
// Spec file
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DateConfig {
    #[serde(default = "default_epoch")]
    pub epoch: NaiveDate,
}

impl Default for DateConfig {
    fn default() -> Self {
        Self {
            epoch: default_epoch(),
        }
    }
}

/// A field specification file (`*.toml`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidationSpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub key_fields: Vec<String>,
    #[serde(default)]
    pub warnings_only: Option<bool>,
    #[serde(default)]
    pub tolerance: Option<Tolerance>,
    #[serde(default)]
    pub policy: SeverityPolicy,
    #[serde(default)]
    pub date: DateConfig,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

impl ValidationSpec {
    pub fn from_toml(input: &str) -> Result<Self, ConfigurationError> {
        let spec: ValidationSpec =
            toml::from_str(input).map_err(|e| ConfigurationError::SpecParse(e.to_string()))?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let mut seen = BTreeSet::new();
        for key in &self.key_fields {
            if !seen.insert(key.as_str()) {
                return Err(ConfigurationError::DuplicateKeyField {
                    set: self.name.clone().unwrap_or_else(|| "spec".into()),
                    field: key.clone(),
                });
            }
        }
        self.to_options(Tolerance::default(), false).validate(&self.key_fields)
    }

    /// Resolve into compare options. Values the spec leaves unset fall back
    /// to the caller's defaults (settings file or built-ins).
    pub fn to_options(&self, fallback_tolerance: Tolerance, fallback_warnings_only: bool) -> CompareOptions {
        CompareOptions {
            fields: self.fields.clone(),
            tolerance_default: self.tolerance.unwrap_or(fallback_tolerance),
            warnings_only: self.warnings_only.unwrap_or(fallback_warnings_only),
            policy: self.policy,
            day_count_epoch: self.date.epoch,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const ADSL_SPEC: &str = r#"
name = "ADSL independent QC"
key_fields = ["usubjid"]

[tolerance]
abs = 1e-6

[policy]
missing_record = "major"

[date]
epoch = "1960-01-01"

[[fields]]
name = "aval"
kind = "numeric"
criticality = "critical"
tolerance = { abs = 0.01, rel = 0.001 }

[[fields]]
name = "trtp"
kind = "text"
case_insensitive = true

[[fields]]
name = "adt"
kind = "date"
tolerance = { days = 1 }
"#;

    #[test]
    fn parse_full_spec() {
        let spec = ValidationSpec::from_toml(ADSL_SPEC).unwrap();
        assert_eq!(spec.name.as_deref(), Some("ADSL independent QC"));
        assert_eq!(spec.key_fields, vec!["usubjid"]);
        assert_eq!(spec.tolerance.unwrap().abs, 1e-6);
        assert_eq!(spec.fields.len(), 3);

        let aval = &spec.fields[0];
        assert_eq!(aval.kind, FieldKind::Numeric);
        assert_eq!(aval.criticality, Criticality::Critical);
        let tol = aval.tolerance.unwrap().numeric().unwrap();
        assert_eq!(tol.abs, 0.01);
        assert_eq!(tol.rel, Some(0.001));

        assert!(spec.fields[1].case_insensitive);
        assert_eq!(spec.fields[2].tolerance.unwrap().days, Some(1));
        assert_eq!(spec.date.epoch, NaiveDate::from_ymd_opt(1960, 1, 1).unwrap());
    }

    #[test]
    fn partial_policy_keeps_other_defaults() {
        let spec = ValidationSpec::from_toml(ADSL_SPEC).unwrap();
        assert_eq!(spec.policy.missing_record, Severity::Major);
        assert_eq!(spec.policy.extra_record, Severity::Major);
        assert_eq!(spec.policy.missing_field, Severity::Minor);
    }

    #[test]
    fn minimal_spec_uses_defaults() {
        let spec = ValidationSpec::from_toml("").unwrap();
        assert!(spec.key_fields.is_empty());
        let options = spec.to_options(Tolerance::absolute(0.5), true);
        assert_eq!(options.tolerance_default.abs, 0.5);
        assert!(options.warnings_only);
        assert_eq!(options.policy, SeverityPolicy::default());
        assert_eq!(options.day_count_epoch, NaiveDate::from_ymd_opt(1970, 1, 1).unwrap());
        assert_eq!(DateConfig::default().epoch, DEFAULT_EPOCH);
    }

    #[test]
    fn spec_values_beat_fallbacks() {
        let spec = ValidationSpec::from_toml("warnings_only = false\n[tolerance]\nabs = 0.1\n").unwrap();
        let options = spec.to_options(Tolerance::absolute(0.5), true);
        assert_eq!(options.tolerance_default.abs, 0.1);
        assert!(!options.warnings_only);
    }

    #[test]
    fn field_tolerance_replaces_default_as_a_whole() {
        let tol = FieldTolerance {
            abs: None,
            rel: Some(0.05),
            days: None,
        };
        let numeric = tol.numeric().unwrap();
        assert_eq!(numeric.abs, 0.0);
        assert_eq!(numeric.rel, Some(0.05));
        assert!(FieldTolerance::default().numeric().is_none());
    }

    #[test]
    fn reject_unknown_kind() {
        let err = ValidationSpec::from_toml("[[fields]]\nname = \"x\"\nkind = \"float\"\n").unwrap_err();
        assert!(matches!(err, ConfigurationError::SpecParse(_)));
    }

    #[test]
    fn reject_unknown_key() {
        let err = ValidationSpec::from_toml("tolerence = 1\n").unwrap_err();
        assert!(matches!(err, ConfigurationError::SpecParse(_)));
    }

    #[test]
    fn reject_negative_tolerance() {
        let input = "[[fields]]\nname = \"aval\"\nkind = \"numeric\"\ntolerance = { abs = -0.1 }\n";
        let err = ValidationSpec::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("aval"), "{err}");
        assert!(err.to_string().contains(">= 0"), "{err}");
    }

    #[test]
    fn reject_case_insensitive_numeric() {
        let err = FieldSpec::numeric("aval").case_insensitive().validate().unwrap_err();
        assert!(err.to_string().contains("case_insensitive"));
    }

    #[test]
    fn reject_days_on_numeric_and_abs_on_date() {
        assert!(FieldSpec::numeric("aval").days(1).validate().is_err());
        assert!(FieldSpec::date("adt").abs(1.0).validate().is_err());
        assert!(FieldSpec::date("adt").days(2).validate().is_ok());
    }

    #[test]
    fn reject_text_tolerance() {
        assert!(FieldSpec::text("trt").abs(0.1).validate().is_err());
    }

    #[test]
    fn reject_duplicate_field() {
        let options = CompareOptions::default()
            .with_fields(vec![FieldSpec::numeric("aval"), FieldSpec::text("aval")]);
        let err = options.validate(&["usubjid".into()]).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn reject_spec_on_key_field() {
        let options = CompareOptions::default().with_fields(vec![FieldSpec::text("usubjid")]);
        let err = options.validate(&["usubjid".into()]).unwrap_err();
        assert!(err.to_string().contains("key field"));
    }

    #[test]
    fn reject_bad_default_tolerance() {
        let options = CompareOptions::default().with_tolerance(Tolerance::absolute(f64::NAN));
        assert!(matches!(
            options.validate(&["id".into()]),
            Err(ConfigurationError::InvalidTolerance(_))
        ));
    }

    #[test]
    fn reject_duplicate_key_fields_in_spec() {
        let err = ValidationSpec::from_toml("key_fields = [\"id\", \"id\"]\n").unwrap_err();
        assert!(matches!(err, ConfigurationError::DuplicateKeyField { .. }));
    }
}
