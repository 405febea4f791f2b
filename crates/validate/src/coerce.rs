//! Cell coercion: interpret a [`Value`] as the kind a field is compared as.
//!
//! Coercion never fails hard. A cell that cannot be read as its kind comes
//! back as [`Coerced::Failed`] and the caller turns it into a finding.

use chrono::{NaiveDate, NaiveDateTime};

use crate::model::Value;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Coerced<T> {
    Missing,
    Value(T),
    Failed,
}

/// Parse a plain decimal or scientific-notation number. Surrounding
/// whitespace is ignored; anything else non-numeric (including `inf` and
/// `nan`) is rejected.
pub fn parse_number(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut digits = 0;
    for c in trimmed.chars() {
        match c {
            '0'..='9' => digits += 1,
            '.' | '-' | '+' | 'e' | 'E' => {}
            _ => return None,
        }
    }
    if digits == 0 {
        return None;
    }

    let value: f64 = trimmed.parse().ok()?;
    value.is_finite().then_some(value)
}

pub(crate) fn as_number(value: &Value) -> Coerced<f64> {
    match value {
        Value::Missing => Coerced::Missing,
        Value::Number(n) if n.is_finite() => Coerced::Value(*n),
        Value::Number(_) => Coerced::Failed,
        Value::Text(s) if s.trim().is_empty() => Coerced::Missing,
        Value::Text(s) => match parse_number(s) {
            Some(n) => Coerced::Value(n),
            None => Coerced::Failed,
        },
        Value::Date(_) => Coerced::Failed,
    }
}

/// Text normalization: trim, optionally fold case. Numbers and dates are
/// rendered the way they display so a text field never fails to coerce.
pub(crate) fn as_text(value: &Value, case_insensitive: bool) -> Coerced<String> {
    let raw = match value {
        Value::Missing => return Coerced::Missing,
        Value::Number(n) => format_number(*n),
        Value::Text(s) => s.trim().to_string(),
        Value::Date(d) => d.format("%Y-%m-%d").to_string(),
    };
    if case_insensitive {
        Coerced::Value(raw.to_lowercase())
    } else {
        Coerced::Value(raw)
    }
}

/// Days since `epoch`. Accepts dates, integral day counts, ISO dates,
/// `01JAN2020`-style dates and integer strings.
pub(crate) fn as_day_count(value: &Value, epoch: NaiveDate) -> Coerced<i64> {
    match value {
        Value::Missing => Coerced::Missing,
        Value::Date(d) => Coerced::Value((*d - epoch).num_days()),
        Value::Number(n) if n.is_finite() && n.fract() == 0.0 => Coerced::Value(*n as i64),
        Value::Number(_) => Coerced::Failed,
        Value::Text(s) if s.trim().is_empty() => Coerced::Missing,
        Value::Text(s) => match parse_date(s.trim()) {
            Some(d) => Coerced::Value((d - epoch).num_days()),
            None => match s.trim().parse::<i64>() {
                Ok(days) => Coerced::Value(days),
                Err(_) => Coerced::Failed,
            },
        },
    }
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    const FORMATS: [&str; 3] = ["%Y-%m-%d", "%d%b%Y", "%Y/%m/%d"];
    for fmt in FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|dt| dt.date())
}

/// Render a number for a finding: integers without a fraction, everything
/// else to 12 decimals with trailing zeros dropped, scientific notation when
/// that would print as zero.
pub fn format_number(n: f64) -> String {
    if !n.is_finite() {
        return n.to_string();
    }
    if n.fract() == 0.0 && n.abs() < 1e15 {
        return format!("{}", n as i64);
    }
    let fixed = format!("{n:.12}");
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "0" || trimmed == "-0" {
        format!("{n:e}")
    } else {
        trimmed.to_string()
    }
}

/// 1-based position of the first differing character.
pub(crate) fn first_difference(a: &str, b: &str) -> usize {
    let mut ai = a.chars();
    let mut bi = b.chars();
    let mut pos = 1;
    loop {
        match (ai.next(), bi.next()) {
            (Some(x), Some(y)) if x == y => pos += 1,
            _ => return pos,
        }
    }
}
