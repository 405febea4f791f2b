use crate::coerce::{self, as_day_count, as_number, as_text, format_number, Coerced};
use crate::config::{CompareOptions, FieldKind, FieldSpec, Tolerance};
use crate::model::{Finding, FindingKind, Key, Severity, Value};

/// Epsilon-inclusive tolerance check: a difference that equals the
/// tolerance in decimal must not fail because of binary representation.
/// The slack scales with the operands only, so `abs = 0` stays exact for
/// small magnitudes. A difference that overflows never matches.
pub fn within_tolerance(x: f64, y: f64, tol: &Tolerance) -> bool {
    let delta = (x - y).abs();
    if !delta.is_finite() {
        return false;
    }
    let scale = x.abs().max(y.abs()).max(tol.abs);
    let eps = f64::EPSILON * 16.0 * scale;
    if delta <= tol.abs + eps {
        return true;
    }
    match tol.rel {
        Some(rel) => delta <= rel * x.abs().max(y.abs()).max(1e-12) + eps,
        None => false,
    }
}

/// Compare one field present on both sides of a matched key. Always yields
/// exactly one finding: a match, a mismatch, or a coercion failure.
pub(crate) fn classify_field(
    key: &Key,
    field: &str,
    base: &Value,
    compare: &Value,
    spec: Option<&FieldSpec>,
    options: &CompareOptions,
) -> Finding {
    let kind = spec.map(|s| s.kind).unwrap_or_else(|| infer_kind(base, compare));
    let criticality: Severity = spec.map(|s| s.criticality.into()).unwrap_or(Severity::Major);

    let mut finding = Finding {
        kind: FindingKind::ValueMatch,
        key: key.clone(),
        field: Some(field.to_string()),
        severity: Severity::Info,
        base: Some(render(base)),
        compare: Some(render(compare)),
        difference: None,
        coercion_failure: false,
        detail: String::new(),
    };

    let outcome = match kind {
        FieldKind::Numeric => {
            let tol = spec
                .and_then(|s| s.tolerance)
                .and_then(|t| t.numeric())
                .unwrap_or(options.tolerance_default);
            numeric(as_number(base), as_number(compare), &tol)
        }
        FieldKind::Text => {
            let fold = spec.is_some_and(|s| s.case_insensitive);
            text(as_text(base, fold), as_text(compare, fold))
        }
        FieldKind::Date => {
            let days = spec
                .and_then(|s| s.tolerance)
                .and_then(|t| t.days)
                .unwrap_or(0);
            date(
                as_day_count(base, options.day_count_epoch),
                as_day_count(compare, options.day_count_epoch),
                days,
            )
        }
    };

    match outcome {
        Outcome::Match { difference } => {
            finding.difference = difference;
            if let Some(d) = difference.filter(|d| *d > 0.0) {
                finding.detail = format!("within tolerance, diff={}", format_number(d));
            }
        }
        Outcome::Mismatch { difference, diff } => {
            finding.kind = FindingKind::ValueMismatch;
            finding.severity = criticality;
            finding.difference = difference;
            finding.detail = format!(
                "base={}, compare={}, diff={diff}",
                render(base),
                render(compare)
            );
        }
        Outcome::CoercionFailure { side } => {
            let raw = if side == "base" { base } else { compare };
            finding.kind = FindingKind::ValueMismatch;
            finding.severity = Severity::Major;
            finding.coercion_failure = true;
            finding.detail = format!("type coercion failure: {side} value '{raw}' is not {kind}");
        }
    }
    finding
}

enum Outcome {
    Match { difference: Option<f64> },
    Mismatch { difference: Option<f64>, diff: String },
    CoercionFailure { side: &'static str },
}

const ONE_SIDED: &str = "missing on one side";

fn numeric(base: Coerced<f64>, compare: Coerced<f64>, tol: &Tolerance) -> Outcome {
    match (base, compare) {
        (Coerced::Failed, _) => Outcome::CoercionFailure { side: "base" },
        (_, Coerced::Failed) => Outcome::CoercionFailure { side: "compare" },
        (Coerced::Missing, Coerced::Missing) => Outcome::Match { difference: None },
        (Coerced::Missing, _) | (_, Coerced::Missing) => Outcome::Mismatch {
            difference: None,
            diff: ONE_SIDED.into(),
        },
        (Coerced::Value(x), Coerced::Value(y)) => {
            let delta = (x - y).abs();
            if within_tolerance(x, y, tol) {
                Outcome::Match {
                    difference: Some(delta),
                }
            } else {
                Outcome::Mismatch {
                    difference: Some(delta),
                    diff: format_number(delta),
                }
            }
        }
    }
}

fn text(base: Coerced<String>, compare: Coerced<String>) -> Outcome {
    match (base, compare) {
        (Coerced::Failed, _) => Outcome::CoercionFailure { side: "base" },
        (_, Coerced::Failed) => Outcome::CoercionFailure { side: "compare" },
        (Coerced::Missing, Coerced::Missing) => Outcome::Match { difference: None },
        (Coerced::Missing, _) | (_, Coerced::Missing) => Outcome::Mismatch {
            difference: None,
            diff: ONE_SIDED.into(),
        },
        (Coerced::Value(a), Coerced::Value(b)) if a == b => Outcome::Match { difference: None },
        (Coerced::Value(a), Coerced::Value(b)) => Outcome::Mismatch {
            difference: None,
            diff: format!("first difference at char {}", coerce::first_difference(&a, &b)),
        },
    }
}

fn date(base: Coerced<i64>, compare: Coerced<i64>, days: u32) -> Outcome {
    match (base, compare) {
        (Coerced::Failed, _) => Outcome::CoercionFailure { side: "base" },
        (_, Coerced::Failed) => Outcome::CoercionFailure { side: "compare" },
        (Coerced::Missing, Coerced::Missing) => Outcome::Match { difference: None },
        (Coerced::Missing, _) | (_, Coerced::Missing) => Outcome::Mismatch {
            difference: None,
            diff: ONE_SIDED.into(),
        },
        (Coerced::Value(a), Coerced::Value(b)) => {
            let delta = a.abs_diff(b);
            if delta <= u64::from(days) {
                Outcome::Match {
                    difference: Some(delta as f64),
                }
            } else {
                Outcome::Mismatch {
                    difference: Some(delta as f64),
                    diff: format!("{delta} days"),
                }
            }
        }
    }
}

/// Kind for a field with no declaration: dates if either side carries a
/// date, numeric if both sides read as numbers, text otherwise.
fn infer_kind(base: &Value, compare: &Value) -> FieldKind {
    let is_date = |v: &Value| matches!(v, Value::Date(_));
    let numeric_ok = |v: &Value| !matches!(as_number(v), Coerced::Failed);
    if is_date(base) || is_date(compare) {
        FieldKind::Date
    } else if numeric_ok(base) && numeric_ok(compare) {
        FieldKind::Numeric
    } else {
        FieldKind::Text
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::Number(n) => format_number(*n),
        other => other.to_string(),
    }
}
