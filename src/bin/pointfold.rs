//! Pointfold CLI - Command-line interface for the reconciliation engine
//!
//! Commands:
//! - reconcile: Fold a batch of tracked events into weekly aggregates (batch mode)
//! - run: Process streaming input from stdin (streaming mode)
//! - validate: Validate raw event schema
//! - doctor: Diagnose configuration and state files
//! - schema: Print schema information

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use pointfold::schema::{RawEvent, RawEventAdapter, SCHEMA_VERSION};
use pointfold::store::MemoryStore;
use pointfold::types::WeeklyAggregate;
use pointfold::window::WindowPolicy;
use pointfold::{
    NullNotifier, ReconcileError, Reconciler, StaticDirectory, POINTFOLD_VERSION, PRODUCER_NAME,
};

/// Pointfold - Event reconciliation engine for weekly behavior and service reports
#[derive(Parser)]
#[command(name = "pointfold")]
#[command(author = "Pointfold Maintainers")]
#[command(version = POINTFOLD_VERSION)]
#[command(about = "Reconcile tracked events into weekly report aggregates", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fold a batch of tracked events into weekly aggregates (batch mode)
    Reconcile {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        events: PathBuf,

        /// Target catalog file: {student_id: [{id, kind, is_duration}, ...]}
        #[arg(short, long)]
        catalog: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Load aggregate state from file
        #[arg(long)]
        load_state: Option<PathBuf>,

        /// Save aggregate state to file after processing
        #[arg(long)]
        save_state: Option<PathBuf>,

        /// Weekday the reporting week opens on
        #[arg(long, default_value = "mon")]
        week_start: String,

        /// Fixed UTC offset for local-day math, in minutes
        #[arg(long, default_value = "0")]
        utc_offset_minutes: i32,

        /// Disable the weekend-boundary window shift
        #[arg(long)]
        no_weekend_shift: bool,

        /// Restrict interval closing to the same local day
        #[arg(long)]
        no_cross_day_close: bool,

        /// Print the batch summary to stderr as JSON
        #[arg(long)]
        summary: bool,
    },

    /// Process streaming input from stdin (streaming mode)
    Run {
        /// Target catalog file: {student_id: [{id, kind, is_duration}, ...]}
        #[arg(short, long)]
        catalog: PathBuf,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Load aggregate state from file
        #[arg(long)]
        load_state: Option<PathBuf>,

        /// Save aggregate state to file on exit
        #[arg(long)]
        save_state: Option<PathBuf>,

        /// Weekday the reporting week opens on
        #[arg(long, default_value = "mon")]
        week_start: String,

        /// Fixed UTC offset for local-day math, in minutes
        #[arg(long, default_value = "0")]
        utc_offset_minutes: i32,

        /// Disable the weekend-boundary window shift
        #[arg(long)]
        no_weekend_shift: bool,

        /// Restrict interval closing to the same local day
        #[arg(long)]
        no_cross_day_close: bool,
    },

    /// Validate raw event schema
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and state files
    Doctor {
        /// Check an aggregate state file
        #[arg(long)]
        state: Option<PathBuf>,

        /// Check a target catalog file
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema information
    Schema {
        /// Schema to print (input or output)
        #[arg(value_enum)]
        schema_type: SchemaType,

        /// Output as JSON schema
        #[arg(long)]
        json_schema: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one event per line)
    Ndjson,
    /// JSON array of events
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one aggregate per line)
    Ndjson,
    /// JSON array of aggregates
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Input schema (track.raw_event.v1)
    Input,
    /// Output schema (weekly aggregate)
    Output,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), PointfoldCliError> {
    match cli.command {
        Commands::Reconcile {
            events,
            catalog,
            output,
            input_format,
            output_format,
            load_state,
            save_state,
            week_start,
            utc_offset_minutes,
            no_weekend_shift,
            no_cross_day_close,
            summary,
        } => {
            let policy = build_policy(
                &week_start,
                utc_offset_minutes,
                no_weekend_shift,
                no_cross_day_close,
            )?;
            cmd_reconcile(
                &events,
                &catalog,
                &output,
                input_format,
                output_format,
                load_state.as_deref(),
                save_state.as_deref(),
                policy,
                summary,
            )
        }

        Commands::Run {
            catalog,
            output_format,
            load_state,
            save_state,
            week_start,
            utc_offset_minutes,
            no_weekend_shift,
            no_cross_day_close,
        } => {
            let policy = build_policy(
                &week_start,
                utc_offset_minutes,
                no_weekend_shift,
                no_cross_day_close,
            )?;
            cmd_run(
                &catalog,
                output_format,
                load_state.as_deref(),
                save_state.as_deref(),
                policy,
            )
        }

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Doctor {
            state,
            catalog,
            json,
        } => cmd_doctor(state.as_deref(), catalog.as_deref(), json),

        Commands::Schema {
            schema_type,
            json_schema,
        } => cmd_schema(schema_type, json_schema),
    }
}

fn cmd_reconcile(
    events_path: &PathBuf,
    catalog_path: &std::path::Path,
    output: &PathBuf,
    input_format: InputFormat,
    output_format: OutputFormat,
    load_state: Option<&std::path::Path>,
    save_state: Option<&std::path::Path>,
    policy: WindowPolicy,
    summary: bool,
) -> Result<(), PointfoldCliError> {
    // Read input
    let input_data = read_input(events_path)?;

    // Parse events
    let events = match input_format {
        InputFormat::Ndjson => RawEventAdapter::parse_ndjson(&input_data)?,
        InputFormat::Json => RawEventAdapter::parse_array(&input_data)?,
    };

    if events.is_empty() {
        return Err(PointfoldCliError::NoEvents);
    }

    // Schema problems fail the batch before any state is touched
    let issues = RawEventAdapter::validate_events(&events);
    if !issues.is_empty() {
        return Err(PointfoldCliError::ValidationFailed(issues.len()));
    }

    // Wire up the engine
    let directory = StaticDirectory::from_json(&fs::read_to_string(catalog_path)?)?;
    let store = match load_state {
        Some(path) => MemoryStore::from_json(&fs::read_to_string(path)?)?,
        None => MemoryStore::new(),
    };
    let mut engine = Reconciler::new(store, directory, NullNotifier).with_policy(policy);

    let batch_summary = engine.reconcile(&events)?;
    let store = engine.into_store();

    // Save state if requested
    if let Some(path) = save_state {
        fs::write(path, store.to_json()?)?;
    }

    // Write output
    let aggregates: Vec<WeeklyAggregate> = store.aggregates().cloned().collect();
    let output_data = format_output(&aggregates, &output_format)?;

    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    if summary {
        eprintln!("{}", serde_json::to_string_pretty(&batch_summary)?);
    }

    Ok(())
}

fn cmd_run(
    catalog_path: &std::path::Path,
    output_format: OutputFormat,
    load_state: Option<&std::path::Path>,
    save_state: Option<&std::path::Path>,
    policy: WindowPolicy,
) -> Result<(), PointfoldCliError> {
    let directory = StaticDirectory::from_json(&fs::read_to_string(catalog_path)?)?;
    let store = match load_state {
        Some(path) => MemoryStore::from_json(&fs::read_to_string(path)?)?,
        None => MemoryStore::new(),
    };
    let mut engine = Reconciler::new(store, directory, NullNotifier).with_policy(policy);

    let stdin = io::stdin();
    let mut event_buffer: Vec<RawEvent> = Vec::new();
    let mut current_student: Option<String> = None;

    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        // Parse the event
        let event: RawEvent = serde_json::from_str(trimmed)
            .map_err(|e| PointfoldCliError::ParseError(format!("Failed to parse event: {}", e)))?;

        // Validate the event
        event.validate()?;

        // Hand a buffer to the engine whenever the student changes, so the
        // coalescer keeps reusing one aggregate per burst
        if let Some(ref student) = current_student {
            if student != &event.student_id && !event_buffer.is_empty() {
                engine.reconcile(&event_buffer)?;
                event_buffer.clear();
            }
        }

        current_student = Some(event.student_id.clone());
        event_buffer.push(event);
    }

    // Process remaining events
    if !event_buffer.is_empty() {
        engine.reconcile(&event_buffer)?;
    }

    let store = engine.into_store();

    // Save state if requested
    if let Some(path) = save_state {
        fs::write(path, store.to_json()?)?;
    }

    let aggregates: Vec<WeeklyAggregate> = store.aggregates().cloned().collect();
    print!("{}", format_output(&aggregates, &output_format)?);

    Ok(())
}

fn cmd_validate(
    input: &PathBuf,
    input_format: InputFormat,
    json: bool,
) -> Result<(), PointfoldCliError> {
    // Read input
    let input_data = read_input(input)?;

    // Parse events
    let events = match input_format {
        InputFormat::Ndjson => RawEventAdapter::parse_ndjson(&input_data)?,
        InputFormat::Json => RawEventAdapter::parse_array(&input_data)?,
    };

    // Validate each event
    let issues = RawEventAdapter::validate_events(&events);

    let report = ValidationReport {
        total_events: events.len(),
        valid_events: events.len() - issues.len(),
        invalid_events: issues.len(),
        errors: issues
            .iter()
            .map(|issue| ValidationErrorDetail {
                index: issue.index,
                event_id: issue.event_id.map(|id| id.to_string()),
                error: issue.error.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total events:   {}", report.total_events);
        println!("Valid events:   {}", report.valid_events);
        println!("Invalid events: {}", report.invalid_events);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!(
                    "  - Event {} (index {}): {}",
                    err.event_id.as_deref().unwrap_or("unknown"),
                    err.index,
                    err.error
                );
            }
        }
    }

    if report.invalid_events > 0 {
        Err(PointfoldCliError::ValidationFailed(report.invalid_events))
    } else {
        Ok(())
    }
}

fn cmd_doctor(
    state: Option<&std::path::Path>,
    catalog: Option<&std::path::Path>,
    json: bool,
) -> Result<(), PointfoldCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    // Check Pointfold version
    checks.push(DoctorCheck {
        name: "pointfold_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Pointfold version {}", POINTFOLD_VERSION),
    });

    // Check schema version
    checks.push(DoctorCheck {
        name: "schema_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Input schema: {}", SCHEMA_VERSION),
    });

    // Check state file if provided
    if let Some(state_path) = state {
        if state_path.exists() {
            match fs::read_to_string(state_path) {
                Ok(content) => match MemoryStore::from_json(&content) {
                    Ok(store) => {
                        checks.push(DoctorCheck {
                            name: "state".to_string(),
                            status: CheckStatus::Ok,
                            message: format!("State file valid ({} aggregates)", store.len()),
                        });
                    }
                    Err(e) => {
                        checks.push(DoctorCheck {
                            name: "state".to_string(),
                            status: CheckStatus::Error,
                            message: format!("Invalid state JSON: {}", e),
                        });
                    }
                },
                Err(e) => {
                    checks.push(DoctorCheck {
                        name: "state".to_string(),
                        status: CheckStatus::Error,
                        message: format!("Cannot read state file: {}", e),
                    });
                }
            }
        } else {
            checks.push(DoctorCheck {
                name: "state".to_string(),
                status: CheckStatus::Warning,
                message: "State file does not exist".to_string(),
            });
        }
    }

    // Check catalog file if provided
    if let Some(catalog_path) = catalog {
        if catalog_path.exists() {
            match fs::read_to_string(catalog_path) {
                Ok(content) => match StaticDirectory::from_json(&content) {
                    Ok(directory) => {
                        checks.push(DoctorCheck {
                            name: "catalog".to_string(),
                            status: CheckStatus::Ok,
                            message: format!(
                                "Catalog valid ({} students)",
                                directory.student_count()
                            ),
                        });
                    }
                    Err(e) => {
                        checks.push(DoctorCheck {
                            name: "catalog".to_string(),
                            status: CheckStatus::Error,
                            message: format!("Invalid catalog JSON: {}", e),
                        });
                    }
                },
                Err(e) => {
                    checks.push(DoctorCheck {
                        name: "catalog".to_string(),
                        status: CheckStatus::Error,
                        message: format!("Cannot read catalog file: {}", e),
                    });
                }
            }
        } else {
            checks.push(DoctorCheck {
                name: "catalog".to_string(),
                status: CheckStatus::Warning,
                message: "Catalog file does not exist".to_string(),
            });
        }
    }

    // Check stdin is available (for streaming mode)
    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (streaming mode ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: POINTFOLD_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Pointfold Doctor Report");
        println!("=======================");
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

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(PointfoldCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_schema(schema_type: SchemaType, json_schema: bool) -> Result<(), PointfoldCliError> {
    match schema_type {
        SchemaType::Input => {
            if json_schema {
                println!("{}", get_input_json_schema());
            } else {
                println!("Input Schema: {}", SCHEMA_VERSION);
                println!();
                println!("One tracked event per record. Timestamps are epoch milliseconds.");
                println!();
                println!("Required fields:");
                println!("  - student_id: student the event belongs to");
                println!("  - target_id: behavior or service being tracked");
                println!("  - timestamp: when the action happened");
                println!("  - source: {{ device, rater }}");
                println!();
                println!("Event kinds by optional fields:");
                println!("  - press: no extra fields; opens/closes intervals or adds a count");
                println!("  - manual entry: is_manual, usually with duration_ms");
                println!("  - detail update: abc {{ antecedent, consequence }}, intensity (1-5)");
                println!("  - service log: modifications, progress");
                println!("  - removal: remove=true; tombstones the matching point");
                println!("  - rebuild request: redo_durations=true; re-pairs the target's intervals");
            }
        }
        SchemaType::Output => {
            if json_schema {
                println!("{}", get_output_json_schema());
            } else {
                println!("Output Schema: weekly aggregate");
                println!();
                println!("One record per student per reporting week:");
                println!();
                println!("- student_id, week_start (local date key)");
                println!("- start, end: inclusive window bounds, epoch milliseconds");
                println!("- behavior_points: array of points containing:");
                println!("  - behavior_id, timestamp, state (count | open | closed + duration_ms)");
                println!("  - source {{ device, rater }}, abc, intensity, is_manual");
                println!("  - status: deleted tombstone {{ by, at }} when soft-deleted");
                println!("- service_points: same shape with service_id, modifications, progress");
            }
        }
    }

    Ok(())
}

// Helper functions

fn read_input(path: &PathBuf) -> Result<String, PointfoldCliError> {
    if path.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn build_policy(
    week_start: &str,
    utc_offset_minutes: i32,
    no_weekend_shift: bool,
    no_cross_day_close: bool,
) -> Result<WindowPolicy, PointfoldCliError> {
    let week_start = week_start
        .parse()
        .map_err(|_| PointfoldCliError::Policy(format!("unrecognized weekday: {week_start}")))?;
    let policy = WindowPolicy {
        week_start,
        utc_offset_minutes,
        weekend_shift: !no_weekend_shift,
        cross_day_close: !no_cross_day_close,
    };
    policy.validate()?;
    Ok(policy)
}

fn format_output(
    aggregates: &[WeeklyAggregate],
    format: &OutputFormat,
) -> Result<String, PointfoldCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for aggregate in aggregates {
                lines.push(serde_json::to_string(aggregate)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(aggregates)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(aggregates)?),
    }
}

fn get_input_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "https://pointfold.dev/schemas/track.raw_event.v1.json",
        "title": "track.raw_event.v1",
        "description": "Pointfold tracked event schema",
        "type": "object",
        "required": ["student_id", "target_id", "source"],
        "properties": {
            "schema_version": {
                "type": "string",
                "const": "track.raw_event.v1"
            },
            "event_id": { "type": "string", "format": "uuid" },
            "student_id": { "type": "string" },
            "target_id": { "type": "string" },
            "timestamp": { "type": "integer", "description": "epoch milliseconds" },
            "duration_ms": { "type": "integer", "minimum": 0 },
            "source": {
                "type": "object",
                "required": ["device", "rater"],
                "properties": {
                    "device": { "type": "string" },
                    "rater": { "type": "string" }
                }
            },
            "is_manual": { "type": "boolean" },
            "abc": {
                "type": "object",
                "properties": {
                    "antecedent": { "type": "string" },
                    "consequence": { "type": "string" }
                }
            },
            "intensity": { "type": "integer", "minimum": 1, "maximum": 5 },
            "remove": { "type": "boolean" },
            "redo_durations": { "type": "boolean" },
            "modifications": { "type": "array", "items": { "type": "string" } },
            "progress": { "type": "string" }
        }
    })
    .to_string()
}

fn get_output_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "https://pointfold.dev/schemas/weekly_aggregate.v1.json",
        "title": "weekly_aggregate.v1",
        "description": "Pointfold weekly aggregate schema",
        "type": "object",
        "required": ["student_id", "week_start", "start", "end"],
        "properties": {
            "student_id": { "type": "string" },
            "week_start": { "type": "string", "format": "date" },
            "start": { "type": "integer", "description": "epoch milliseconds, inclusive" },
            "end": { "type": "integer", "description": "epoch milliseconds, inclusive" },
            "behavior_points": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["behavior_id", "timestamp", "state", "source"],
                    "properties": {
                        "behavior_id": { "type": "string" },
                        "timestamp": { "type": "integer" },
                        "state": { "type": "string", "enum": ["count", "open", "closed"] },
                        "duration_ms": { "type": "integer" },
                        "source": { "type": "object" },
                        "abc": { "type": "object" },
                        "intensity": { "type": "integer" },
                        "is_manual": { "type": "boolean" },
                        "status": { "type": "object" }
                    }
                }
            },
            "service_points": {
                "type": "array",
                "items": { "type": "object" }
            }
        }
    })
    .to_string()
}

// Error types

#[derive(Debug)]
enum PointfoldCliError {
    Io(io::Error),
    Engine(ReconcileError),
    Json(serde_json::Error),
    Validation(pointfold::schema::ValidationError),
    Policy(String),
    NoEvents,
    ValidationFailed(usize),
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for PointfoldCliError {
    fn from(e: io::Error) -> Self {
        PointfoldCliError::Io(e)
    }
}

impl From<ReconcileError> for PointfoldCliError {
    fn from(e: ReconcileError) -> Self {
        PointfoldCliError::Engine(e)
    }
}

impl From<serde_json::Error> for PointfoldCliError {
    fn from(e: serde_json::Error) -> Self {
        PointfoldCliError::Json(e)
    }
}

impl From<pointfold::schema::ValidationError> for PointfoldCliError {
    fn from(e: pointfold::schema::ValidationError) -> Self {
        PointfoldCliError::Validation(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<PointfoldCliError> for CliError {
    fn from(e: PointfoldCliError) -> Self {
        match e {
            PointfoldCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            PointfoldCliError::Engine(e) => CliError {
                code: "ENGINE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check catalog and state inputs against the events".to_string()),
            },
            PointfoldCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            PointfoldCliError::Validation(e) => CliError {
                code: "VALIDATION_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'pointfold validate' for details".to_string()),
            },
            PointfoldCliError::Policy(msg) => CliError {
                code: "POLICY_ERROR".to_string(),
                message: msg,
                hint: Some("Use a weekday name like 'mon' and an offset within +/-840".to_string()),
            },
            PointfoldCliError::NoEvents => CliError {
                code: "NO_EVENTS".to_string(),
                message: "No events found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            PointfoldCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} events failed validation", count),
                hint: Some("Run 'pointfold validate' on the input for details".to_string()),
            },
            PointfoldCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            PointfoldCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check input format".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_events: usize,
    valid_events: usize,
    invalid_events: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    event_id: Option<String>,
    error: String,
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

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
