mod config;
mod influx;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use esr31_core::{
    AcquisitionReport, AcquisitionResult, CaptureSource, FieldMap, LineSource, SerialLineSource,
    StopCondition, deliver, make_report, records_from,
};
use glob::glob;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::influx::InfluxHttpSink;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (commit ",
    env!("ESR31_BUILD_COMMIT"),
    ", ",
    env!("ESR31_BUILD_DATE"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "esr31")]
#[command(version, long_version = LONG_VERSION)]
#[command(
    about = "Reads ESR31 solar-thermal controller frames and forwards them to InfluxDB.",
    long_about = None,
    after_help = "Examples:\n  esr31 acquire --device /dev/ttyUSB0\n  esr31 acquire --config esr31.toml --dry-run --stdout\n  esr31 replay capture.txt --stdout --pretty"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one acquisition on the serial line and write the readings to InfluxDB.
    Acquire {
        #[command(flatten)]
        serial: SerialArgs,

        #[command(flatten)]
        run: RunArgs,

        #[command(flatten)]
        output: OutputArgs,

        /// Decode only, do not write to InfluxDB
        #[arg(long)]
        dry_run: bool,
    },
    /// Replay a recorded capture (one line per read, blank line = no data).
    #[command(
        after_help = "Examples:\n  esr31 replay capture.txt --stdout\n  esr31 replay 'captures/*.txt' -o report.json\n  esr31 replay capture.txt --write --host 127.0.0.1"
    )]
    Replay {
        /// Path to a capture file (a glob must match exactly one file)
        input: PathBuf,

        #[command(flatten)]
        run: RunArgs,

        #[command(flatten)]
        output: OutputArgs,

        /// Write the decoded readings to InfluxDB
        #[arg(long)]
        write: bool,
    },
}

#[derive(Args, Debug)]
struct SerialArgs {
    /// Serial device path
    #[arg(long)]
    device: Option<String>,

    /// Baud rate
    #[arg(long)]
    baud: Option<u32>,

    /// Per-read timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Read attempts per run (0 = unbounded)
    #[arg(long)]
    max_attempts: Option<u64>,

    /// When to stop before the attempt budget is used up
    #[arg(long, value_enum)]
    until: Option<Until>,

    /// InfluxDB host
    #[arg(long)]
    host: Option<String>,

    /// InfluxDB port
    #[arg(long)]
    port: Option<u16>,

    /// InfluxDB database
    #[arg(long)]
    database: Option<String>,
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Output report path (JSON)
    #[arg(short = 'o', long)]
    report: Option<PathBuf>,

    /// Write JSON report to stdout
    #[arg(long, conflicts_with = "report")]
    stdout: bool,

    /// Pretty-print JSON output
    #[arg(long, conflicts_with = "compact")]
    pretty: bool,

    /// Compact JSON output (default)
    #[arg(long)]
    compact: bool,

    /// Suppress non-error output
    #[arg(long)]
    quiet: bool,

    /// Exit with a non-zero code if no frame was accepted
    #[arg(long)]
    strict: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Until {
    Budget,
    FirstFrame,
    AllFields,
}

impl From<Until> for StopCondition {
    fn from(until: Until) -> Self {
        match until {
            Until::Budget => StopCondition::Budget,
            Until::FirstFrame => StopCondition::FirstFrame,
            Until::AllFields => StopCondition::AllFields,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Acquire {
            serial,
            run,
            output,
            dry_run,
        } => {
            init_logging(output.quiet);
            cmd_acquire(serial, run, output, dry_run)
        }
        Commands::Replay {
            input,
            run,
            output,
            write,
        } => {
            init_logging(output.quiet);
            cmd_replay(input, run, output, write)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err.message);
            if let Some(hint) = err.hint {
                eprintln!("hint: {}", hint);
            }
            ExitCode::from(2)
        }
    }
}

fn init_logging(quiet: bool) {
    let default = if quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .init();
}

#[derive(Debug)]
struct CliError {
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn new(message: impl Into<String>, hint: Option<String>) -> Self {
        Self {
            message: message.into(),
            hint,
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::new(format!("{:#}", err), None)
    }
}

fn cmd_acquire(
    serial: SerialArgs,
    run: RunArgs,
    output: OutputArgs,
    dry_run: bool,
) -> Result<(), CliError> {
    let mut config = load_config(&run)?;
    if let Some(device) = serial.device {
        config.serial.device = device;
    }
    if let Some(baud) = serial.baud {
        config.serial.baud_rate = baud;
    }
    if let Some(timeout_ms) = serial.timeout_ms {
        config.serial.timeout_ms = timeout_ms;
    }
    check_config(&config)?;

    let settings = config.serial_settings();
    let source = SerialLineSource::open(&settings).map_err(|err| {
        CliError::new(
            err.to_string(),
            Some("check --device and that the port is not held by another process".to_string()),
        )
    })?;
    run_pipeline(source, &config, &output, !dry_run)
}

fn cmd_replay(
    input: PathBuf,
    run: RunArgs,
    output: OutputArgs,
    write: bool,
) -> Result<(), CliError> {
    let config = load_config(&run)?;
    check_config(&config)?;

    let resolved_input = resolve_input_path(&input)?;
    validate_input_file(&resolved_input)?;
    if let Some(report_path) = output.report.as_ref() {
        ensure_distinct_paths(&resolved_input, report_path)?;
    }

    let source = CaptureSource::open(&resolved_input)
        .with_context(|| format!("Failed to open capture: {}", resolved_input.display()))?;
    run_pipeline(source, &config, &output, write)
}

fn load_config(run: &RunArgs) -> Result<AppConfig, CliError> {
    let mut config = AppConfig::load(run.config.as_deref()).map_err(|err| {
        CliError::new(
            format!("{:#}", err),
            Some("pass a readable TOML file to --config".to_string()),
        )
    })?;
    if let Some(max_attempts) = run.max_attempts {
        config.acquisition.max_attempts = max_attempts;
    }
    if let Some(until) = run.until {
        config.acquisition.stop = until.into();
    }
    if let Some(host) = run.host.clone() {
        config.influx.host = host;
    }
    if let Some(port) = run.port {
        config.influx.port = port;
    }
    if let Some(database) = run.database.clone() {
        config.influx.database = database;
    }
    Ok(config)
}

fn check_config(config: &AppConfig) -> Result<(), CliError> {
    let problems = config.validate();
    if problems.is_empty() {
        return Ok(());
    }
    Err(CliError::new(
        format!("invalid configuration: {}", problems.join("; ")),
        Some("fix the config file or override the value on the command line".to_string()),
    ))
}

fn run_pipeline<S: LineSource>(
    source: S,
    config: &AppConfig,
    output: &OutputArgs,
    write: bool,
) -> Result<(), CliError> {
    let map = FieldMap::esr31();
    let description = source.describe();
    let result = esr31_core::run(source, &map, config.acquisition_options())
        .with_context(|| format!("Acquisition failed on {}", description))?;

    let mut rep = make_report(&description, &result);
    rep.generated_at = now_rfc3339()?;
    emit_report(&rep, output)?;

    if write {
        write_measurements(&result, &map, config)?;
    } else {
        info!("sink disabled, nothing written");
    }

    if output.strict && result.accepted() == 0 {
        return Err(CliError::new(
            format!("no frame accepted after {} attempts", result.attempts()),
            Some("check the cable and baud rate, or raise --max-attempts".to_string()),
        ));
    }
    if !output.quiet {
        eprintln!(
            "OK: {}/{} frames accepted from {}",
            result.accepted(),
            result.attempts(),
            description
        );
    }
    Ok(())
}

fn write_measurements(
    result: &AcquisitionResult,
    map: &FieldMap,
    config: &AppConfig,
) -> Result<(), CliError> {
    let records = records_from(result, map, &config.influx.measurement_prefix);
    let mut sink = InfluxHttpSink::new(&config.influx)
        .map_err(|err| CliError::new(err.to_string(), None))?;
    let written = deliver(&mut sink, &records).map_err(|err| {
        CliError::new(
            format!("failed to write measurements: {}", err),
            Some("check --host/--port/--database, or run with --dry-run".to_string()),
        )
    })?;
    info!(
        records = written,
        host = %config.influx.host,
        database = %config.influx.database,
        "measurements written"
    );
    Ok(())
}

fn now_rfc3339() -> Result<String, CliError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("Failed to format timestamp")
        .map_err(Into::into)
}

fn emit_report(rep: &AcquisitionReport, output: &OutputArgs) -> Result<(), CliError> {
    if !output.stdout && output.report.is_none() {
        return Ok(());
    }
    let json = serialize_report(rep, output.pretty, output.compact)?;

    if output.stdout {
        print!("{}", json);
        return Ok(());
    }

    let Some(report) = output.report.as_ref() else {
        return Ok(());
    };
    if let Some(parent) = report.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create output directory: {}", parent.display())
            })?;
        }
    }
    fs::write(report, json)
        .with_context(|| format!("Failed to write report: {}", report.display()))?;
    if !output.quiet {
        eprintln!("OK: report written -> {}", report.display());
    }
    Ok(())
}

fn serialize_report(
    rep: &AcquisitionReport,
    pretty: bool,
    compact: bool,
) -> Result<String, CliError> {
    if pretty && compact {
        return Err(CliError::new(
            "cannot use --pretty and --compact together",
            Some("choose one output format".to_string()),
        ));
    }
    if pretty {
        serde_json::to_string_pretty(rep)
            .context("JSON serialization failed")
            .map_err(Into::into)
    } else {
        serde_json::to_string(rep)
            .context("JSON serialization failed")
            .map_err(Into::into)
    }
}

fn ensure_distinct_paths(input: &Path, report_path: &Path) -> Result<(), CliError> {
    let input_abs = fs::canonicalize(input)
        .with_context(|| format!("Failed to resolve input path: {}", input.display()))?;
    let report_dir = match report_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::canonicalize(parent),
        _ => fs::canonicalize("."),
    };
    // A missing output directory is created later and cannot alias the input.
    let Ok(report_dir) = report_dir else {
        return Ok(());
    };
    let file_name = report_path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("Invalid report path"))?;
    if report_dir.join(file_name) == input_abs {
        return Err(CliError::new(
            format!(
                "report path must differ from input: {}",
                report_path.display()
            ),
            Some("choose a different output path".to_string()),
        ));
    }
    Ok(())
}

fn validate_input_file(input: &Path) -> Result<(), CliError> {
    if !input.exists() {
        return Err(CliError::new(
            format!("input file not found: {}", input.display()),
            Some("pass a capture recorded from the controller's serial line".to_string()),
        ));
    }
    let meta = fs::metadata(input)
        .with_context(|| format!("Failed to read input file: {}", input.display()))?;
    if !meta.is_file() {
        return Err(CliError::new(
            format!("input is not a file: {}", input.display()),
            Some("pass a single capture file".to_string()),
        ));
    }
    Ok(())
}

fn resolve_input_path(input: &Path) -> Result<PathBuf, CliError> {
    let pattern = input.to_string_lossy();
    if !is_glob_pattern(&pattern) {
        return Ok(input.to_path_buf());
    }

    let mut matches = Vec::new();
    let paths = glob(&pattern).map_err(|err| {
        CliError::new(
            format!("invalid input pattern '{}'", pattern),
            Some(format!("pattern error: {}", err.msg)),
        )
    })?;
    for entry in paths {
        let path = entry.map_err(|err| {
            CliError::new(
                format!("invalid input pattern '{}'", pattern),
                Some(format!("pattern error: {}", err)),
            )
        })?;
        if path.is_file() {
            matches.push(path);
        }
    }

    if matches.is_empty() {
        return Err(CliError::new(
            format!("no files match pattern '{}'", pattern),
            Some("check the path or quote the pattern".to_string()),
        ));
    }
    if matches.len() > 1 {
        let listed = matches
            .iter()
            .take(3)
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let more = if matches.len() > 3 { ", ..." } else { "" };
        return Err(CliError::new(
            format!(
                "multiple files match pattern '{}' ({} matches); matches: {}{}",
                pattern,
                matches.len(),
                listed,
                more
            ),
            Some("pass a single capture file, or run once per file".to_string()),
        ));
    }

    Ok(matches.remove(0))
}

fn is_glob_pattern(input: &str) -> bool {
    input.contains('*') || input.contains('?') || input.contains('[')
}
