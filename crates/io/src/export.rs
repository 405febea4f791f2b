// Finding exporters: CSV rows and a versioned JSON envelope.

use qcdiff_validate::coerce::format_number;
use qcdiff_validate::{ComparisonRun, Finding, PortfolioSummary};
use serde::Serialize;

use crate::error::ExportError;

/// Bumped when the JSON shape changes incompatibly.
pub const CONTRACT_VERSION: u32 = 1;

pub const FINDINGS_CSV_HEADER: [&str; 9] = [
    "run", "kind", "severity", "key", "field", "base", "compare", "difference", "detail",
];

/// `{"contract_version", "command", "result"}`, pretty-printed with a
/// trailing newline.
pub fn envelope<T: Serialize>(command: &str, result: &T) -> Result<Vec<u8>, ExportError> {
    let top = serde_json::json!({
        "contract_version": CONTRACT_VERSION,
        "command": command,
        "result": result,
    });
    let mut bytes = serde_json::to_vec_pretty(&top)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// A run as JSON, optionally dropping the confirmed matches.
pub fn run_json(run: &ComparisonRun, only_discrepancies: bool) -> Result<Vec<u8>, ExportError> {
    let mut value = serde_json::to_value(run)?;
    if only_discrepancies {
        if let Some(findings) = value.get_mut("findings").and_then(|f| f.as_array_mut()) {
            findings.retain(|f| f["kind"] != "value_match");
        }
    }
    envelope("compare", &value)
}

/// One CSV row per finding of a single run.
pub fn run_csv(run: &ComparisonRun, only_discrepancies: bool) -> Result<Vec<u8>, ExportError> {
    let rows = run
        .findings()
        .iter()
        .filter(|f| !only_discrepancies || f.is_discrepancy())
        .map(|f| (run.base_name(), f));
    findings_csv(rows)
}

/// The portfolio's non-Info findings, tagged with their run.
pub fn portfolio_csv(summary: &PortfolioSummary) -> Result<Vec<u8>, ExportError> {
    findings_csv(summary.findings.iter().map(|pf| (pf.run.as_str(), &pf.finding)))
}

pub fn findings_csv<'a>(
    rows: impl IntoIterator<Item = (&'a str, &'a Finding)>,
) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(FINDINGS_CSV_HEADER)?;

    for (run, f) in rows {
        let key = f.key.to_string();
        let difference = f.difference.map(format_number).unwrap_or_default();
        writer.write_record([
            run,
            f.kind.as_str(),
            f.severity.as_str(),
            &key,
            f.field.as_deref().unwrap_or(""),
            f.base.as_deref().unwrap_or(""),
            f.compare.as_deref().unwrap_or(""),
            &difference,
            &f.detail,
        ])?;
    }

    writer.into_inner().map_err(|e| ExportError::Io(e.into_error()))
}
