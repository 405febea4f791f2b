use crate::model::{Finding, FindingKind, OverallStatus, RunSummary, Severity};

/// Three-tier rollup. Critical always fails; Major fails unless the caller
/// asked for warnings-only, in which case it warns like Minor.
pub fn derive_status(findings: &[Finding], warnings_only: bool) -> OverallStatus {
    let worst = findings.iter().map(|f| f.severity).max().unwrap_or(Severity::Info);
    match worst {
        Severity::Critical => OverallStatus::Fail,
        Severity::Major if !warnings_only => OverallStatus::Fail,
        Severity::Major | Severity::Minor => OverallStatus::Warning,
        Severity::Info => OverallStatus::Pass,
    }
}

/// Compute summary statistics from a run's findings.
pub fn compute_summary(findings: &[Finding], records_base: usize) -> RunSummary {
    let mut summary = RunSummary {
        findings: findings.len(),
        ..RunSummary::default()
    };

    for f in findings {
        summary.severity.add(f.severity);
        if f.coercion_failure {
            summary.coercion_failures += 1;
        }
        match f.kind {
            FindingKind::ValueMatch => summary.value_matches += 1,
            FindingKind::ValueMismatch => summary.value_mismatches += 1,
            FindingKind::MissingRecord => summary.missing_records += 1,
            FindingKind::ExtraRecord => summary.extra_records += 1,
            FindingKind::MissingField => summary.missing_fields += 1,
            FindingKind::ExtraField => summary.extra_fields += 1,
        }
    }

    // Every base key is either matched or reported as an extra record.
    summary.records_in_both = records_base.saturating_sub(summary.extra_records);
    summary
}
