use std::collections::BTreeSet;

use crate::classify::classify_field;
use crate::config::CompareOptions;
use crate::error::ConfigurationError;
use crate::matcher::match_exact_key;
use crate::model::{ComparisonRun, Finding, FindingKind, Record, ResultSet};

/// Compare two result sets.
///
/// Fails only on schema-level problems (key fields that differ between the
/// sides, invalid field specs). Everything found in the data itself,
/// including cells that cannot be read as their declared kind, is reported
/// as a finding on the returned run.
pub fn compare(
    base: &ResultSet,
    compare: &ResultSet,
    options: &CompareOptions,
) -> Result<ComparisonRun, ConfigurationError> {
    check_key_fields(base, compare)?;
    options.validate(base.key_fields())?;

    let pairs = match_exact_key(base, compare);
    log::debug!(
        "compare '{}' vs '{}': {} matched, {} base only, {} compare only",
        base.name(),
        compare.name(),
        pairs.matched.len(),
        pairs.base_only.len(),
        pairs.compare_only.len()
    );

    let policy = &options.policy;
    let mut findings = Vec::new();

    for key in pairs.base_only {
        findings.push(Finding::record(
            FindingKind::ExtraRecord,
            key,
            policy.extra_record,
            "present in base, absent in compare",
        ));
    }
    for key in pairs.compare_only {
        findings.push(Finding::record(
            FindingKind::MissingRecord,
            key,
            policy.missing_record,
            "present in compare, absent in base",
        ));
    }

    for pair in &pairs.matched {
        for field in field_union(base, pair.base, pair.compare) {
            let finding = match (pair.base.get(field), pair.compare.get(field)) {
                (Some(b), Some(c)) => {
                    classify_field(&pair.key, field, b, c, options.field(field), options)
                }
                (Some(b), None) => {
                    let mut f = Finding::record(
                        FindingKind::ExtraField,
                        pair.key.clone(),
                        policy.extra_field,
                        "present in base record, absent in compare record",
                    );
                    f.field = Some(field.to_string());
                    f.base = Some(b.to_string());
                    f
                }
                (None, Some(c)) => {
                    let mut f = Finding::record(
                        FindingKind::MissingField,
                        pair.key.clone(),
                        policy.missing_field,
                        "present in compare record, absent in base record",
                    );
                    f.field = Some(field.to_string());
                    f.compare = Some(c.to_string());
                    f
                }
                (None, None) => continue,
            };
            if finding.coercion_failure {
                log::trace!("{} {}: {}", pair.key, field, finding.detail);
            }
            findings.push(finding);
        }
    }

    let run = ComparisonRun::assemble(base, compare, options.warnings_only, findings);
    log::debug!(
        "compare '{}' vs '{}': {} findings, status {}",
        run.base_name(),
        run.compare_name(),
        run.summary().findings,
        run.overall_status()
    );
    Ok(run)
}

/// Key-field sets must agree; order may differ.
fn check_key_fields(base: &ResultSet, compare: &ResultSet) -> Result<(), ConfigurationError> {
    let b: BTreeSet<&str> = base.key_fields().iter().map(String::as_str).collect();
    let c: BTreeSet<&str> = compare.key_fields().iter().map(String::as_str).collect();
    if b == c {
        return Ok(());
    }
    Err(ConfigurationError::KeyFieldMismatch {
        base: base.name().to_string(),
        compare: compare.name().to_string(),
        only_in_base: b.difference(&c).map(|s| s.to_string()).collect(),
        only_in_compare: c.difference(&b).map(|s| s.to_string()).collect(),
    })
}

/// Non-key field names present in either record, ascending.
fn field_union<'a>(set: &ResultSet, base: &'a Record, compare: &'a Record) -> BTreeSet<&'a str> {
    base.field_names()
        .chain(compare.field_names())
        .filter(|f| !set.is_key_field(f))
        .collect()
}
