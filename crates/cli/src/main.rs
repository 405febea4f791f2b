// qcdiff CLI - independent-programming validation from the command line

mod compare;
mod exit_codes;
mod portfolio;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use qcdiff_config::{OutputFormat, Settings};
use qcdiff_validate::ConfigurationError;

use exit_codes::{EXIT_CONFIG, EXIT_INPUT, EXIT_PASS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "qcdiff")]
#[command(about = "Compare independently produced analysis results and report discrepancies by severity")]
#[command(version)]
struct Cli {
    /// Log debug output to stderr (RUST_LOG takes precedence)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare two result sets
    #[command(after_help = "\
Examples:
  qcdiff compare prod/adsl.csv qc/adsl.csv --key usubjid
  qcdiff compare prod/adsl.csv qc/adsl.json --spec adsl.toml --out csv
  qcdiff compare t_14_1.csv t_14_1_qc.csv --key param,avisit --abs 0.001 --only-discrepancies

Exit codes: 0 pass, 1 warning, 2 fail, 3 configuration error, 4 input error, 5 usage error")]
    Compare(compare::CompareArgs),

    /// Run every comparison listed in a portfolio file and summarize
    #[command(after_help = "\
Examples:
  qcdiff portfolio csr-tables.toml
  qcdiff portfolio csr-tables.toml --jobs 4 --output summary.json
  qcdiff portfolio csr-tables.toml --fail-fast")]
    Portfolio(portfolio::PortfolioArgs),

    /// Check a field specification file without running a comparison
    #[command(after_help = "\
Examples:
  qcdiff validate-spec adsl.toml")]
    ValidateSpec {
        /// Path to the spec .toml file
        spec: PathBuf,
    },
}

/// Output format for findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutFormat {
    Json,
    Csv,
}

impl OutFormat {
    /// Command line first, then the settings file.
    pub fn resolve(flag: Option<OutFormat>, settings: &Settings) -> OutFormat {
        flag.unwrap_or(match settings.output.format {
            OutputFormat::Json => OutFormat::Json,
            OutputFormat::Csv => OutFormat::Csv,
        })
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { EXIT_USAGE } else { EXIT_PASS };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    init_logging(cli.verbose);
    let settings = Settings::load();

    let result = match cli.command {
        Commands::Compare(args) => compare::cmd_compare(args, &settings),
        Commands::Portfolio(args) => portfolio::cmd_portfolio(args, &settings),
        Commands::ValidateSpec { spec } => cmd_validate_spec(&spec),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_PASS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .try_init();
}

fn cmd_validate_spec(path: &Path) -> Result<(), CliError> {
    let spec = compare::load_spec(path)?;
    let keys = if spec.key_fields.is_empty() {
        "none (pass --key)".to_string()
    } else {
        spec.key_fields.join(", ")
    };
    eprintln!(
        "valid: spec '{}' with {} field(s), key fields: {}",
        spec.name.as_deref().unwrap_or("unnamed"),
        spec.fields.len(),
        keys,
    );
    Ok(())
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self { code: EXIT_CONFIG, message: msg.into(), hint: None }
    }

    pub fn input(msg: impl Into<String>) -> Self {
        Self { code: EXIT_INPUT, message: msg.into(), hint: None }
    }

    /// Verdict exit with nothing further to print.
    pub fn verdict(code: u8) -> Self {
        Self { code, message: String::new(), hint: None }
    }

    /// Configuration error with a hint for the common cases.
    pub fn configuration(err: &ConfigurationError) -> Self {
        let hint = match err {
            ConfigurationError::KeyFieldMismatch { .. } => Some(
                "both sides must declare the same key fields; use --base-key/--compare-key if the files differ",
            ),
            ConfigurationError::DuplicateKeys { .. } => {
                Some("each key must be unique within its file; add key fields with --key a,b")
            }
            ConfigurationError::MissingKeyField { .. } => Some("check the --key column names against the file header"),
            _ => None,
        };
        Self {
            code: EXIT_CONFIG,
            message: err.to_string(),
            hint: hint.map(String::from),
        }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Write output bytes to a file, or stdout when no path is given.
pub fn write_output(output: Option<&Path>, bytes: &[u8], quiet: bool) -> Result<(), CliError> {
    match output {
        Some(path) => {
            std::fs::write(path, bytes)
                .map_err(|e| CliError::input(format!("cannot write {}: {}", path.display(), e)))?;
            if !quiet {
                eprintln!("wrote {}", path.display());
            }
        }
        None => {
            std::io::stdout()
                .write_all(bytes)
                .map_err(|e| CliError::input(e.to_string()))?;
        }
    }
    Ok(())
}
