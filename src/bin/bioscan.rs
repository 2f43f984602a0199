//! BioScan CLI - Command-line interface for BioScan Vitals
//!
//! Commands:
//! - scan: Estimate vitals from recorded frame readings (NDJSON)
//! - rank: Rank a wellness index against a history file
//! - doctor: Diagnose configuration and history health

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use bioscan_vitals::encoder::ReportEncoder;
use bioscan_vitals::history::{HistoryStore, DEFAULT_HISTORY_CAPACITY};
use bioscan_vitals::{
    age_bucket_from_estimate, BioScanProcessor, FrameReading, HistoryLedger, ScanConfig,
    ScanError, ScanProfile, WellnessIndex, BIOSCAN_VERSION, PRODUCER_NAME,
};

/// BioScan - camera-based vital sign estimation
#[derive(Parser)]
#[command(name = "bioscan")]
#[command(version = BIOSCAN_VERSION)]
#[command(about = "Estimate vitals from facial landmark time series", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate vitals from recorded frame readings (NDJSON)
    Scan {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Scan profile
        #[arg(long, default_value = "standard")]
        profile: ProfileArg,

        /// Load scan configuration from a JSON file (overrides --profile)
        #[arg(long)]
        config: Option<PathBuf>,

        /// History file used for ranking
        #[arg(long)]
        history: Option<PathBuf>,

        /// Wellness index (1-100) to rank and record
        #[arg(long)]
        wellness_index: Option<i64>,

        /// Age bucket label (e.g. "30-39")
        #[arg(long)]
        age_bucket: Option<String>,

        /// Estimated age or age range (e.g. "25-30"), mapped to a bucket
        #[arg(long, conflicts_with = "age_bucket")]
        age_estimate: Option<String>,

        /// Print plain biometrics instead of the full report
        #[arg(long)]
        biometrics: bool,
    },

    /// Rank a wellness index against a history file
    Rank {
        /// History file path
        #[arg(long)]
        history: PathBuf,

        /// Wellness index (1-100)
        #[arg(long)]
        wellness_index: i64,

        /// Age bucket label (e.g. "30-39")
        #[arg(long)]
        age_bucket: Option<String>,

        /// Estimated age or age range, mapped to a bucket
        #[arg(long, conflicts_with = "age_bucket")]
        age_estimate: Option<String>,

        /// Append the outcome to the history after ranking
        #[arg(long)]
        record: bool,
    },

    /// Diagnose configuration and history health
    Doctor {
        /// Check a history file
        #[arg(long)]
        history: Option<PathBuf>,

        /// Check a scan configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ProfileArg {
    /// 15 s window, heart rate clamped to [50, 110]
    Standard,
    /// 6 s window, heart rate clamped to [55, 100]
    HeartRateOnly,
}

impl From<ProfileArg> for ScanProfile {
    fn from(arg: ProfileArg) -> Self {
        match arg {
            ProfileArg::Standard => ScanProfile::Standard,
            ProfileArg::HeartRateOnly => ScanProfile::HeartRateOnly,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<(), BioScanCliError> {
    match command {
        Commands::Scan {
            input,
            output,
            profile,
            config,
            history,
            wellness_index,
            age_bucket,
            age_estimate,
            biometrics,
        } => {
            let outcome = resolve_outcome(wellness_index, age_bucket, age_estimate)?;
            cmd_scan(
                &input,
                &output,
                profile.into(),
                config.as_deref(),
                history.as_deref(),
                outcome,
                biometrics,
            )
        }
        Commands::Rank {
            history,
            wellness_index,
            age_bucket,
            age_estimate,
            record,
        } => {
            let outcome = resolve_outcome(Some(wellness_index), age_bucket, age_estimate)?
                .ok_or(BioScanCliError::MissingAgeBucket)?;
            cmd_rank(&history, outcome, record)
        }
        Commands::Doctor {
            history,
            config,
            json,
        } => cmd_doctor(history.as_deref(), config.as_deref(), json),
    }
}

/// Resolve the optional (age bucket, wellness index) outcome from CLI flags
fn resolve_outcome(
    wellness_index: Option<i64>,
    age_bucket: Option<String>,
    age_estimate: Option<String>,
) -> Result<Option<(String, WellnessIndex)>, BioScanCliError> {
    let Some(value) = wellness_index else {
        return Ok(None);
    };
    let index = WellnessIndex::new(value)?;

    let bucket = match (age_bucket, age_estimate) {
        (Some(bucket), _) => bucket,
        (None, Some(estimate)) => {
            age_bucket_from_estimate(&estimate).ok_or(BioScanCliError::UnreadableAge(estimate))?
        }
        (None, None) => return Err(BioScanCliError::MissingAgeBucket),
    };
    Ok(Some((bucket, index)))
}

fn load_config(profile: ScanProfile, config: Option<&Path>) -> Result<ScanConfig, BioScanCliError> {
    match config {
        Some(path) => Ok(ScanConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(profile.config()),
    }
}

/// Parse newline-delimited frame readings, skipping blank lines
fn parse_readings(input: &str) -> Result<Vec<FrameReading>, BioScanCliError> {
    let mut readings = Vec::new();
    for (line_no, line) in input.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let reading: FrameReading = serde_json::from_str(trimmed).map_err(|e| {
            BioScanCliError::ParseError(format!("Failed to parse reading on line {}: {}", line_no + 1, e))
        })?;
        readings.push(reading);
    }
    Ok(readings)
}

fn cmd_scan(
    input: &Path,
    output: &Path,
    profile: ScanProfile,
    config: Option<&Path>,
    history: Option<&Path>,
    outcome: Option<(String, WellnessIndex)>,
    biometrics: bool,
) -> Result<(), BioScanCliError> {
    let config = load_config(profile, config)?;

    // Read input
    let input_data = if input.to_string_lossy() == "-" {
        if atty::is(atty::Stream::Stdin) {
            log::warn!("reading frame readings from a terminal; end input with Ctrl-D");
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let readings = parse_readings(&input_data)?;
    if readings.is_empty() {
        return Err(BioScanCliError::NoReadings);
    }
    log::debug!("read {} frame readings", readings.len());

    let ledger = match history {
        Some(path) => HistoryLedger::open(path),
        None => HistoryLedger::in_memory(DEFAULT_HISTORY_CAPACITY),
    };
    let processor = BioScanProcessor::new(config, Arc::new(ledger))?;

    let outcome_ref = outcome.as_ref().map(|(bucket, index)| (bucket.as_str(), *index));
    let report = processor
        .run(&readings, outcome_ref)?
        .ok_or(BioScanCliError::IncompleteScan)?;

    let output_data = if biometrics {
        serde_json::to_string_pretty(&ReportEncoder::biometrics(&report.vitals))?
    } else {
        processor.encode_report(&report)?
    };

    if output.to_string_lossy() == "-" {
        println!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }
    Ok(())
}

fn cmd_rank(
    history: &Path,
    outcome: (String, WellnessIndex),
    record: bool,
) -> Result<(), BioScanCliError> {
    let (age_bucket, wellness_index) = outcome;
    let ledger = HistoryLedger::open(history);

    let result = if record {
        ledger.rank_and_record(&age_bucket, wellness_index)?
    } else {
        ledger.percentile(&age_bucket, wellness_index)?
    };

    let report = RankReport {
        age_bucket,
        wellness_index: wellness_index.value(),
        percentile: result.percentile,
        sample_size: result.sample_size,
        recorded: record,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn stdin_check(stdin_is_tty: bool) -> DoctorCheck {
    if stdin_is_tty {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Warning,
            message: "stdin is a TTY; `scan --input -` will wait for typed readings".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (ready for `scan --input -`)".to_string(),
        }
    }
}

fn cmd_doctor(history: Option<&Path>, config: Option<&Path>, json: bool) -> Result<(), BioScanCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "bioscan_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("BioScan version {}", BIOSCAN_VERSION),
    });

    for profile in [ScanProfile::Standard, ScanProfile::HeartRateOnly] {
        let profile_config = profile.config();
        checks.push(DoctorCheck {
            name: format!("profile_{}", profile.as_str()),
            status: CheckStatus::Ok,
            message: format!(
                "{} ms window, heart rate clamped to [{}, {}] bpm",
                profile_config.window_ms,
                profile_config.heart_rate_clamp.min_bpm,
                profile_config.heart_rate_clamp.max_bpm
            ),
        });
    }

    if let Some(config_path) = config {
        let check = match fs::read_to_string(config_path) {
            Ok(content) => match ScanConfig::from_json(&content) {
                Ok(loaded) => DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Ok,
                    message: format!("Config valid ({} ms window)", loaded.window_ms),
                },
                Err(e) => DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Invalid config: {}", e),
                },
            },
            Err(e) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: format!("Cannot read config file: {}", e),
            },
        };
        checks.push(check);
    }

    // A broken history file is not fatal to scanning (it loads as empty),
    // so problems here are warnings
    if let Some(history_path) = history {
        let check = if !history_path.exists() {
            DoctorCheck {
                name: "history".to_string(),
                status: CheckStatus::Warning,
                message: "History file does not exist (will be created on first record)".to_string(),
            }
        } else {
            match fs::read_to_string(history_path) {
                Ok(content) => match HistoryStore::from_json(&content, DEFAULT_HISTORY_CAPACITY) {
                    Ok(store) => DoctorCheck {
                        name: "history".to_string(),
                        status: CheckStatus::Ok,
                        message: format!(
                            "History file valid ({} of {} records)",
                            store.len(),
                            store.capacity()
                        ),
                    },
                    Err(e) => DoctorCheck {
                        name: "history".to_string(),
                        status: CheckStatus::Warning,
                        message: format!("Corrupt history, will be treated as empty: {}", e),
                    },
                },
                Err(e) => DoctorCheck {
                    name: "history".to_string(),
                    status: CheckStatus::Warning,
                    message: format!("Cannot read history file, will be treated as empty: {}", e),
                },
            }
        };
        checks.push(check);
    }

    // `scan --input -` needs readings piped in
    checks.push(stdin_check(atty::is(atty::Stream::Stdin)));

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: BIOSCAN_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("BioScan Doctor Report");
        println!("=====================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");
        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(BioScanCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Error types

enum BioScanCliError {
    Io(io::Error),
    Scan(ScanError),
    Json(serde_json::Error),
    NoReadings,
    IncompleteScan,
    MissingAgeBucket,
    UnreadableAge(String),
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for BioScanCliError {
    fn from(e: io::Error) -> Self {
        BioScanCliError::Io(e)
    }
}

impl From<ScanError> for BioScanCliError {
    fn from(e: ScanError) -> Self {
        BioScanCliError::Scan(e)
    }
}

impl From<serde_json::Error> for BioScanCliError {
    fn from(e: serde_json::Error) -> Self {
        BioScanCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<BioScanCliError> for CliError {
    fn from(e: BioScanCliError) -> Self {
        match e {
            BioScanCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            BioScanCliError::Scan(e) => CliError {
                code: "SCAN_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'bioscan doctor --config <file>' to check the configuration".to_string()),
            },
            BioScanCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            BioScanCliError::NoReadings => CliError {
                code: "NO_READINGS".to_string(),
                message: "No frame readings found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            BioScanCliError::IncompleteScan => CliError {
                code: "INCOMPLETE_SCAN".to_string(),
                message: "Readings ended before a full sampling window".to_string(),
                hint: Some(
                    "Record longer, keep the face in frame, or use --profile heart-rate-only"
                        .to_string(),
                ),
            },
            BioScanCliError::MissingAgeBucket => CliError {
                code: "MISSING_AGE_BUCKET".to_string(),
                message: "A wellness index needs an age bucket".to_string(),
                hint: Some("Pass --age-bucket or --age-estimate".to_string()),
            },
            BioScanCliError::UnreadableAge(estimate) => CliError {
                code: "UNREADABLE_AGE".to_string(),
                message: format!("No age found in estimate {:?}", estimate),
                hint: Some("Use a number or a range such as \"25-30\"".to_string()),
            },
            BioScanCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            BioScanCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some(
                    "Each line must be {\"timestamp_ms\": .., \"face\": {..} or null}".to_string(),
                ),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct RankReport {
    age_bucket: String,
    wellness_index: u8,
    percentile: u8,
    sample_size: usize,
    recorded: bool,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(Debug, PartialEq, serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
