//! `qcdiff compare` - one base/compare pair.

use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};
use qcdiff_config::Settings;
use qcdiff_io::export;
use qcdiff_io::{Format, LoadOptions};
use qcdiff_validate::{compare, CompareOptions, ComparisonRun, ResultSet, Tolerance, ValidationSpec};

use crate::exit_codes::{load_exit_code, status_exit_code, EXIT_PASS};
use crate::{write_output, CliError, OutFormat};

#[derive(Args)]
pub struct CompareArgs {
    /// Base (production) result set: .csv, .tsv, .txt or .json
    pub base: PathBuf,

    /// Compare (independent QC) result set
    pub compare: PathBuf,

    /// Field specification file (.toml)
    #[arg(long)]
    pub spec: Option<PathBuf>,

    /// Key fields for both sides (comma-separated); overrides the spec
    #[arg(long, value_delimiter = ',')]
    pub key: Vec<String>,

    /// Key fields for the base side only
    #[arg(long, value_delimiter = ',')]
    pub base_key: Vec<String>,

    /// Key fields for the compare side only
    #[arg(long, value_delimiter = ',')]
    pub compare_key: Vec<String>,

    /// Default absolute tolerance for numeric fields
    #[arg(long)]
    pub abs: Option<f64>,

    /// Default relative tolerance for numeric fields
    #[arg(long)]
    pub rel: Option<f64>,

    /// Report major findings as warnings (critical still fails)
    #[arg(long)]
    pub warnings_only: bool,

    /// Output format (default from settings, else json)
    #[arg(long, alias = "format")]
    pub out: Option<OutFormat>,

    /// Output file (default: stdout)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Leave confirmed matches out of the output
    #[arg(long)]
    pub only_discrepancies: bool,

    /// Name for the base result set (default: file stem)
    #[arg(long)]
    pub base_name: Option<String>,

    /// Name for the compare result set (default: file stem)
    #[arg(long)]
    pub compare_name: Option<String>,

    /// Input format, when the extension does not tell
    #[arg(long, value_name = "FORMAT")]
    pub input_format: Option<InputFormat>,

    /// CSV delimiter (default: sniffed)
    #[arg(long)]
    pub delimiter: Option<char>,

    /// Quiet mode - suppress the stderr summary
    #[arg(long, short = 'q')]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InputFormat {
    Csv,
    Tsv,
    Json,
}

impl From<InputFormat> for Format {
    fn from(f: InputFormat) -> Self {
        match f {
            InputFormat::Csv => Format::Csv,
            InputFormat::Tsv => Format::Tsv,
            InputFormat::Json => Format::Json,
        }
    }
}

/// Tolerance and verdict overrides given on the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub abs: Option<f64>,
    pub rel: Option<f64>,
    pub warnings_only: bool,
}

pub fn cmd_compare(args: CompareArgs, settings: &Settings) -> Result<(), CliError> {
    let spec = args.spec.as_deref().map(load_spec).transpose()?;

    let spec_keys = spec.as_ref().map(|s| s.key_fields.clone()).unwrap_or_default();
    let base_keys = pick_keys(&args.base_key, &args.key, &spec_keys);
    let compare_keys = pick_keys(&args.compare_key, &args.key, &spec_keys);
    if base_keys.is_empty() || compare_keys.is_empty() {
        return Err(CliError::usage("no key fields given")
            .with_hint("pass --key a,b or set key_fields in the --spec file"));
    }

    let overrides = Overrides {
        abs: args.abs,
        rel: args.rel,
        warnings_only: args.warnings_only,
    };
    let options = resolve_options(spec.as_ref(), settings, &overrides)?;

    let load_options = LoadOptions {
        format: args.input_format.map(Format::from),
        delimiter: args.delimiter.map(delimiter_byte).transpose()?,
    };
    let base_name = args.base_name.clone().unwrap_or_else(|| qcdiff_io::default_name(&args.base));
    let compare_name = args
        .compare_name
        .clone()
        .unwrap_or_else(|| qcdiff_io::default_name(&args.compare));

    let base = load_side(&args.base, &base_name, &base_keys, &load_options)?;
    let qc = load_side(&args.compare, &compare_name, &compare_keys, &load_options)?;
    log::info!("comparing {} ({} records) with {} ({} records)", base_name, base.len(), compare_name, qc.len());

    let run = compare(&base, &qc, &options).map_err(|e| CliError::configuration(&e))?;

    let bytes = match OutFormat::resolve(args.out, settings) {
        OutFormat::Json => export::run_json(&run, args.only_discrepancies),
        OutFormat::Csv => export::run_csv(&run, args.only_discrepancies),
    }
    .map_err(|e| CliError::input(e.to_string()))?;
    write_output(args.output.as_deref(), &bytes, args.quiet)?;

    if !args.quiet {
        print_summary(&run);
    }

    match status_exit_code(run.overall_status()) {
        EXIT_PASS => Ok(()),
        code => Err(CliError::verdict(code)),
    }
}

/// Read and validate a spec file. Unreadable → input error; invalid → configuration error.
pub fn load_spec(path: &Path) -> Result<ValidationSpec, CliError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| CliError::input(format!("cannot read spec {}: {e}", path.display())))?;
    ValidationSpec::from_toml(&text)
        .map_err(|e| CliError::config(format!("{}: {e}", path.display())))
}

/// Precedence: command line, then spec file, then settings file, then built-in default.
pub fn resolve_options(
    spec: Option<&ValidationSpec>,
    settings: &Settings,
    overrides: &Overrides,
) -> Result<CompareOptions, CliError> {
    let builtin = Tolerance::default();
    let from_settings = Tolerance {
        abs: settings.tolerance.abs.unwrap_or(builtin.abs),
        rel: settings.tolerance.rel.or(builtin.rel),
    };
    let settings_warnings_only = settings.warnings_only.unwrap_or(false);

    let mut options = match spec {
        Some(spec) => spec.to_options(from_settings, settings_warnings_only),
        None => CompareOptions::default()
            .with_tolerance(from_settings)
            .warnings_only(settings_warnings_only),
    };

    if let Some(abs) = overrides.abs {
        options.tolerance_default.abs = abs;
    }
    if let Some(rel) = overrides.rel {
        options.tolerance_default.rel = Some(rel);
    }
    if overrides.warnings_only {
        options.warnings_only = true;
    }

    for (flag, value) in [("--abs", overrides.abs), ("--rel", overrides.rel)] {
        if let Some(v) = value {
            if !v.is_finite() || v < 0.0 {
                return Err(CliError::usage(format!("{flag} must be a finite number >= 0, got {v}")));
            }
        }
    }
    Ok(options)
}

pub fn load_side(
    path: &Path,
    name: &str,
    keys: &[String],
    options: &LoadOptions,
) -> Result<ResultSet, CliError> {
    qcdiff_io::load(path, name, keys, options).map_err(|e| {
        let err = CliError { code: load_exit_code(&e), message: e.to_string(), hint: None };
        match e {
            qcdiff_io::LoadError::UnknownFormat { .. } => err.with_hint("pass --input-format csv|tsv|json"),
            qcdiff_io::LoadError::Configuration(ref c) => CliError::configuration(c),
            _ => err,
        }
    })
}

fn pick_keys(side: &[String], shared: &[String], spec: &[String]) -> Vec<String> {
    let chosen = if !side.is_empty() {
        side
    } else if !shared.is_empty() {
        shared
    } else {
        spec
    };
    chosen
        .iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect()
}

fn delimiter_byte(c: char) -> Result<u8, CliError> {
    if c.is_ascii() {
        Ok(c as u8)
    } else {
        Err(CliError::usage(format!("delimiter must be a single ASCII character, got {c:?}")))
    }
}

fn print_summary(run: &ComparisonRun) {
    let s = run.summary();
    eprintln!("base:    {} records ({})", run.total_records_base(), run.base_name());
    eprintln!("compare: {} records ({})", run.total_records_compare(), run.compare_name());
    eprintln!("matched records: {}", s.records_in_both);
    eprintln!("missing_records: {}", s.missing_records);
    eprintln!("extra_records: {}", s.extra_records);
    eprintln!("missing_fields: {}", s.missing_fields);
    eprintln!("extra_fields: {}", s.extra_fields);
    eprintln!("value_mismatches: {}", s.value_mismatches);
    if s.coercion_failures > 0 {
        eprintln!("coercion_failures: {}", s.coercion_failures);
    }
    eprintln!(
        "severity: {} critical, {} major, {} minor",
        s.severity.critical, s.severity.major, s.severity.minor
    );
    eprintln!("status: {}", run.overall_status().as_str().to_uppercase());
}
