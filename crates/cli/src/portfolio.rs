//! `qcdiff portfolio` - run a list of comparisons and roll them up.
//!
//! The portfolio file is TOML:
//!
//! ```toml
//! name = "CSR tables"
//!
//! [[comparisons]]
//! name = "adsl"
//! base = "prod/adsl.csv"
//! compare = "qc/adsl.csv"
//! spec = "specs/adsl.toml"
//!
//! [[comparisons]]
//! name = "t_14_1_1"
//! base = "prod/t_14_1_1.csv"
//! compare = "qc/t_14_1_1.csv"
//! key = ["param", "trt"]
//! ```
//!
//! Relative paths resolve against the portfolio file's directory.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use clap::Args;
use qcdiff_config::Settings;
use qcdiff_io::{export, LoadOptions};
use qcdiff_validate::{compare, summarize_labeled, ComparisonRun, OverallStatus, PortfolioSummary};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::compare::{load_side, load_spec, resolve_options, Overrides};
use crate::exit_codes::{status_exit_code, EXIT_CONFIG, EXIT_PASS};
use crate::{write_output, CliError, OutFormat};

#[derive(Args)]
pub struct PortfolioArgs {
    /// Portfolio file (.toml)
    pub file: PathBuf,

    /// Worker threads (default from settings, else one per CPU)
    #[arg(long, short = 'j', value_parser = clap::value_parser!(u64).range(1..))]
    pub jobs: Option<u64>,

    /// Output format (default from settings, else json)
    #[arg(long, alias = "format")]
    pub out: Option<OutFormat>,

    /// Output file (default: stdout)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Run in declared order and stop at the first failing or broken comparison
    #[arg(long)]
    pub fail_fast: bool,

    /// Quiet mode - suppress the stderr summary
    #[arg(long, short = 'q')]
    pub quiet: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortfolioConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub comparisons: Vec<PortfolioEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortfolioEntry {
    pub name: String,
    pub base: PathBuf,
    pub compare: PathBuf,
    #[serde(default)]
    pub spec: Option<PathBuf>,
    /// Overrides the spec's key fields.
    #[serde(default)]
    pub key: Vec<String>,
    #[serde(default)]
    pub warnings_only: bool,
}

impl PortfolioConfig {
    pub fn from_toml(input: &str) -> Result<Self, String> {
        let config: PortfolioConfig = toml::from_str(input).map_err(|e| e.to_string())?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if self.comparisons.is_empty() {
            return Err("no [[comparisons]] entries".to_string());
        }
        let mut seen = BTreeSet::new();
        for entry in &self.comparisons {
            if entry.name.trim().is_empty() {
                return Err("comparison name must not be empty".to_string());
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(format!("duplicate comparison name '{}'", entry.name));
            }
        }
        Ok(())
    }
}

/// What happened to one portfolio entry.
enum Outcome {
    Completed(ComparisonRun),
    Errored(EntryError),
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntryError {
    pub name: String,
    pub exit_code: u8,
    pub message: String,
}

#[derive(Serialize)]
struct PortfolioReport<'a> {
    name: Option<&'a str>,
    summary: &'a PortfolioSummary,
    errors: &'a [EntryError],
    skipped: &'a [String],
}

pub fn cmd_portfolio(args: PortfolioArgs, settings: &Settings) -> Result<(), CliError> {
    let text = std::fs::read_to_string(&args.file)
        .map_err(|e| CliError::input(format!("cannot read portfolio {}: {e}", args.file.display())))?;
    let config = PortfolioConfig::from_toml(&text)
        .map_err(|e| CliError::config(format!("{}: {e}", args.file.display())))?;
    let root = args
        .file
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let outcomes = if args.fail_fast {
        run_sequential(&config.comparisons, &root, settings)
    } else {
        let jobs = args
            .jobs
            .map(|j| j as usize)
            .or(settings.portfolio.jobs)
            .unwrap_or(0);
        run_parallel(&config.comparisons, &root, settings, jobs)?
    };

    let mut completed = Vec::new();
    let mut errors = Vec::new();
    let mut skipped = Vec::new();
    for (entry, outcome) in config.comparisons.iter().zip(outcomes) {
        match outcome {
            Outcome::Completed(run) => completed.push((entry.name.as_str(), run)),
            Outcome::Errored(err) => {
                log::warn!("{}: {}", err.name, err.message);
                errors.push(err);
            }
            Outcome::Skipped => skipped.push(entry.name.clone()),
        }
    }

    let labeled: Vec<(&str, &ComparisonRun)> = completed.iter().map(|(name, run)| (*name, run)).collect();
    let summary = summarize_labeled(&labeled);

    let bytes = match OutFormat::resolve(args.out, settings) {
        OutFormat::Json => export::envelope(
            "portfolio",
            &PortfolioReport {
                name: config.name.as_deref(),
                summary: &summary,
                errors: &errors,
                skipped: &skipped,
            },
        ),
        OutFormat::Csv => export::portfolio_csv(&summary),
    }
    .map_err(|e| CliError::input(e.to_string()))?;
    write_output(args.output.as_deref(), &bytes, args.quiet)?;

    if !args.quiet {
        print_summary(&summary, &errors, &skipped);
    }

    if !errors.is_empty() {
        return Err(CliError::verdict(EXIT_CONFIG));
    }
    match status_exit_code(summary.verdict) {
        EXIT_PASS => Ok(()),
        code => Err(CliError::verdict(code)),
    }
}

fn run_parallel(
    entries: &[PortfolioEntry],
    root: &Path,
    settings: &Settings,
    jobs: usize,
) -> Result<Vec<Outcome>, CliError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .map_err(|e| CliError::usage(format!("cannot start {jobs} worker threads: {e}")))?;
    log::debug!("portfolio: {} comparisons on {} threads", entries.len(), pool.current_num_threads());

    let mut indexed: Vec<(usize, Outcome)> = pool.install(|| {
        entries
            .par_iter()
            .enumerate()
            .map(|(i, entry)| (i, run_entry(entry, root, settings)))
            .collect()
    });
    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, outcome)| outcome).collect())
}

fn run_sequential(entries: &[PortfolioEntry], root: &Path, settings: &Settings) -> Vec<Outcome> {
    let mut outcomes = Vec::with_capacity(entries.len());
    let mut stopped = false;
    for entry in entries {
        if stopped {
            outcomes.push(Outcome::Skipped);
            continue;
        }
        let outcome = run_entry(entry, root, settings);
        stopped = match &outcome {
            Outcome::Completed(run) => run.overall_status() == OverallStatus::Fail,
            Outcome::Errored(_) => true,
            Outcome::Skipped => false,
        };
        if stopped {
            log::info!("fail-fast: stopping after '{}'", entry.name);
        }
        outcomes.push(outcome);
    }
    outcomes
}

fn run_entry(entry: &PortfolioEntry, root: &Path, settings: &Settings) -> Outcome {
    match try_run_entry(entry, root, settings) {
        Ok(run) => Outcome::Completed(run),
        Err(e) => Outcome::Errored(EntryError {
            name: entry.name.clone(),
            exit_code: e.code,
            message: e.message,
        }),
    }
}

fn try_run_entry(entry: &PortfolioEntry, root: &Path, settings: &Settings) -> Result<ComparisonRun, CliError> {
    let spec = entry
        .spec
        .as_ref()
        .map(|p| load_spec(&root.join(p)))
        .transpose()?;

    let keys = if entry.key.is_empty() {
        spec.as_ref().map(|s| s.key_fields.clone()).unwrap_or_default()
    } else {
        entry.key.clone()
    };
    if keys.is_empty() {
        return Err(CliError::config("no key fields (set `key` or use a spec with key_fields)"));
    }

    let overrides = Overrides {
        warnings_only: entry.warnings_only,
        ..Overrides::default()
    };
    let options = resolve_options(spec.as_ref(), settings, &overrides)?;
    let load_options = LoadOptions::default();

    let base_path = root.join(&entry.base);
    let compare_path = root.join(&entry.compare);
    let base = load_side(&base_path, &qcdiff_io::default_name(&base_path), &keys, &load_options)?;
    let qc = load_side(&compare_path, &qcdiff_io::default_name(&compare_path), &keys, &load_options)?;

    let run = compare(&base, &qc, &options).map_err(|e| CliError::configuration(&e))?;
    log::debug!("{}: {}", entry.name, run.overall_status().as_str());
    Ok(run)
}

fn print_summary(summary: &PortfolioSummary, errors: &[EntryError], skipped: &[String]) {
    for run in &summary.overview {
        eprintln!(
            "{:<8} {} ({} discrepancies)",
            run.status.as_str().to_uppercase(),
            run.name,
            run.discrepancies
        );
    }
    for err in errors {
        eprintln!("{:<8} {}: {}", "ERROR", err.name, err.message);
    }
    for name in skipped {
        eprintln!("{:<8} {}", "SKIPPED", name);
    }
    eprintln!(
        "runs: {} ({} passed, {} warnings, {} failed), errors: {}, skipped: {}",
        summary.runs,
        summary.passed,
        summary.warnings,
        summary.failed,
        errors.len(),
        skipped.len()
    );
    eprintln!("verdict: {}", summary.verdict.as_str().to_uppercase());
}
