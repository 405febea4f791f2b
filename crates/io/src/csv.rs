// CSV/TSV loading

use std::io::Read;
use std::path::Path;

use qcdiff_validate::{Record, Value};

use crate::error::LoadError;

/// Load a delimited file into records. The first row is the header.
/// `delimiter` of `None` sniffs it from the content.
pub fn load_records(path: &Path, delimiter: Option<u8>) -> Result<Vec<Record>, LoadError> {
    let content = read_file_as_utf8(path)?;
    let delimiter = delimiter.unwrap_or_else(|| sniff_delimiter(&content));
    log::debug!("{}: delimiter {:?}", path.display(), delimiter as char);
    parse_records(&content, delimiter).map_err(|message| LoadError::parse(&path.display().to_string(), message))
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// For each candidate (tab, semicolon, comma, pipe), count fields per line. The delimiter
/// that produces the most consistent field count (>1 field) wins.
pub fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).take(10).collect();

    if sample_lines.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        // Header must split into more than one column
        if counts.first().copied().unwrap_or(0) <= 1 {
            continue;
        }

        // Lines agreeing with the header count, weighted by column count
        let target = counts[0];
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Read file and convert to UTF-8 if needed (handles Windows-1252, Latin-1, etc.)
pub fn read_file_as_utf8(path: &Path) -> Result<String, LoadError> {
    let io_err = |source| LoadError::Io {
        path: path.display().to_string(),
        source,
    };
    let mut file = std::fs::File::open(path).map_err(io_err)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(io_err)?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            log::warn!("{}: not valid UTF-8, decoding as Windows-1252", path.display());
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

/// Parse delimited text with a header row. Empty cells become
/// [`Value::Missing`]; everything else is kept as text and coerced when
/// compared. Rows shorter than the header leave the trailing fields absent.
pub fn parse_records(content: &str, delimiter: u8) -> Result<Vec<Record>, String> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| e.to_string())?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err("no header row".to_string());
    }
    for (i, h) in headers.iter().enumerate() {
        if h.is_empty() {
            return Err(format!("header column {} is empty", i + 1));
        }
        if headers[..i].contains(h) {
            return Err(format!("duplicate header column '{h}'"));
        }
    }

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for result in reader.records() {
        let row = result.map_err(|e| e.to_string())?;
        let line = row.position().map(|p| p.line()).unwrap_or(0);
        if row.iter().all(|cell| cell.trim().is_empty()) {
            skipped += 1;
            continue;
        }
        if row.len() > headers.len() {
            return Err(format!(
                "line {line}: {} fields, header has {}",
                row.len(),
                headers.len()
            ));
        }
        let record: Record = headers
            .iter()
            .zip(row.iter())
            .map(|(name, cell)| {
                let value = if cell.trim().is_empty() {
                    Value::Missing
                } else {
                    Value::Text(cell.to_string())
                };
                (name.clone(), value)
            })
            .collect();
        records.push(record);
    }

    if skipped > 0 {
        log::warn!("skipped {skipped} blank row(s)");
    }
    Ok(records)
}
