//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! # Exit Codes
//!
//! | Code | Meaning                                                        |
//! |------|----------------------------------------------------------------|
//! | 0    | Pass: only confirmed matches                                   |
//! | 1    | Warning: minor findings (or major under `--warnings-only`)     |
//! | 2    | Fail: critical findings, or major findings                     |
//! | 3    | Configuration error: key schema, field spec, duplicate keys    |
//! | 4    | Input error: unreadable or malformed input, unwritable output  |
//! | 5    | Usage error: bad arguments                                     |
//!
//! Codes 0-2 are verdicts, not errors: a run that completes always exits
//! with its verdict.

use qcdiff_io::LoadError;
use qcdiff_validate::OverallStatus;

// =============================================================================
// Verdicts (0-2)
// =============================================================================

/// Every examined value agrees.
pub const EXIT_PASS: u8 = 0;

/// Only minor discrepancies.
pub const EXIT_WARNING: u8 = 1;

/// At least one critical (or, unless warnings-only, major) discrepancy.
pub const EXIT_FAIL: u8 = 2;

// =============================================================================
// Errors (3-5)
// =============================================================================

/// Spec file invalid, key fields differ between sides, duplicate keys,
/// missing key column. Also: a portfolio with an entry that could not run.
pub const EXIT_CONFIG: u8 = 3;

/// Input file missing, unreadable or malformed; output not writable.
pub const EXIT_INPUT: u8 = 4;

/// Bad command-line arguments.
pub const EXIT_USAGE: u8 = 5;

/// Map a run verdict to its exit code.
pub fn status_exit_code(status: OverallStatus) -> u8 {
    match status {
        OverallStatus::Pass => EXIT_PASS,
        OverallStatus::Warning => EXIT_WARNING,
        OverallStatus::Fail => EXIT_FAIL,
    }
}

/// Map a load failure to its exit code.
pub fn load_exit_code(err: &LoadError) -> u8 {
    if err.is_configuration() {
        EXIT_CONFIG
    } else {
        EXIT_INPUT
    }
}
