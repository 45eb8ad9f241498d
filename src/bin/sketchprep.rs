//! sketchprep - Command-line interface for Sketch Prep
//!
//! Commands:
//! - encode: Strokes JSON into a sequence-mode request
//! - rasterize: Strokes JSON into a raster-mode request
//! - replay: Recorded pointer events into a request for either mode
//! - validate: Validate pointer event schema
//! - schema: Print input/output schema information
//! - doctor: Diagnose configuration and environment

use clap::{Parser, Subcommand, ValueEnum};
use image::imageops::{self, FilterType};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

use sketch_prep::config::PipelineConfig;
use sketch_prep::logging::init_logging;
use sketch_prep::pipeline::{build_request, parse_strokes, SketchProcessor};
use sketch_prep::schema::{PointerEvent, PointerEventAdapter, SCHEMA_VERSION};
use sketch_prep::{
    DrawingSurface, PredictionMode, PredictionRequest, SketchError, PREP_VERSION, PRODUCER_NAME,
};

/// Side of the upscaled tensor preview image
const PREVIEW_SIDE: u32 = 280;

/// sketchprep - Turn freehand drawings into sketch classifier input
#[derive(Parser)]
#[command(name = "sketchprep")]
#[command(version = PREP_VERSION)]
#[command(about = "Turn freehand drawings into sketch classifier input", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level filter (overrides the config; RUST_LOG overrides both)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit structured JSON logs on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode strokes JSON into a sequence-mode request
    Encode {
        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Model identifier (defaults to the config, then model2)
        #[arg(long)]
        model: Option<String>,
    },

    /// Rasterize strokes JSON into a raster-mode request
    Rasterize {
        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Surface width the strokes were drawn on
        #[arg(long)]
        width: Option<u32>,

        /// Surface height the strokes were drawn on
        #[arg(long)]
        height: Option<u32>,

        /// Model identifier (defaults to the config, then model1)
        #[arg(long)]
        model: Option<String>,

        /// Write an upscaled PNG of the 28x28 tensor
        #[arg(long)]
        preview: Option<PathBuf>,
    },

    /// Replay recorded pointer events into a request
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Request mode (defaults to the config)
        #[arg(long)]
        mode: Option<ModeArg>,
    },

    /// Validate pointer event schema
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema information
    Schema {
        /// Schema to print
        #[arg(value_enum)]
        schema_type: SchemaType,

        /// Output as JSON schema
        #[arg(long)]
        json_schema: bool,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one event per line)
    Ndjson,
    /// JSON array of events
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    /// 28x28 pixel tensor
    Raster,
    /// Delta/pen stroke sequence
    Sequence,
}

impl From<ModeArg> for PredictionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Raster => PredictionMode::Raster,
            ModeArg::Sequence => PredictionMode::Sequence,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Recorded pointer events (sketch.pointer_event.v1)
    Input,
    /// Columnar strokes JSON
    Strokes,
    /// Prediction request bodies
    Output,
}

fn main() -> ExitCode {
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

fn run(cli: Cli) -> Result<(), SketchCliError> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.logging.json |= cli.log_json;
    init_logging(&config.logging);

    match cli.command {
        Commands::Encode {
            input,
            output,
            model,
        } => cmd_encode(config, &input, &output, model),

        Commands::Rasterize {
            input,
            output,
            width,
            height,
            model,
            preview,
        } => cmd_rasterize(config, &input, &output, width, height, model, preview.as_deref()),

        Commands::Replay {
            input,
            output,
            input_format,
            mode,
        } => cmd_replay(config, &input, &output, input_format, mode),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Schema {
            schema_type,
            json_schema,
        } => cmd_schema(schema_type, json_schema),

        Commands::Doctor { json } => cmd_doctor(&config, cli.config.as_deref(), json),
    }
}

fn cmd_encode(
    mut config: PipelineConfig,
    input: &Path,
    output: &Path,
    model: Option<String>,
) -> Result<(), SketchCliError> {
    let strokes = parse_strokes(&read_input(input)?)?;
    if model.is_some() {
        config.dispatch.model = model;
    }

    let request = SketchProcessor::new(config).request(PredictionMode::Sequence, &strokes)?;
    info!(strokes = strokes.len(), "encoded sequence request");
    write_output(output, &request.to_json()?)
}

#[allow(clippy::too_many_arguments)]
fn cmd_rasterize(
    mut config: PipelineConfig,
    input: &Path,
    output: &Path,
    width: Option<u32>,
    height: Option<u32>,
    model: Option<String>,
    preview: Option<&Path>,
) -> Result<(), SketchCliError> {
    let strokes = parse_strokes(&read_input(input)?)?;
    if let Some(width) = width {
        config.surface.width = width;
    }
    if let Some(height) = height {
        config.surface.height = height;
    }
    if model.is_some() {
        config.dispatch.model = model;
    }
    config.validate()?;

    let request = SketchProcessor::new(config).request(PredictionMode::Raster, &strokes)?;
    if let (Some(path), PredictionRequest::Raster { pixels, .. }) = (preview, &request) {
        let preview_image =
            imageops::resize(&pixels.to_image(), PREVIEW_SIDE, PREVIEW_SIDE, FilterType::Nearest);
        preview_image.save(path).map_err(SketchError::from)?;
        info!(path = %path.display(), "wrote tensor preview");
    }
    write_output(output, &request.to_json()?)
}

fn cmd_replay(
    config: PipelineConfig,
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    mode: Option<ModeArg>,
) -> Result<(), SketchCliError> {
    let events = parse_events(&read_input(input)?, &input_format)?;
    if events.is_empty() {
        return Err(SketchCliError::NoEvents);
    }

    let mode = mode.map(PredictionMode::from).unwrap_or(config.dispatch.mode);
    let model = config
        .dispatch
        .model
        .clone()
        .unwrap_or_else(|| mode.default_model().to_string());

    let mut surface = DrawingSurface::new(config.surface.size(), config.surface.brush_width);
    let stats = PointerEventAdapter::replay(&events, &mut surface)?;
    info!(
        accepted = stats.accepted,
        ignored = stats.ignored,
        strokes = stats.strokes,
        "replayed pointer events"
    );

    let request = build_request(mode, &model, &surface, &config)?.ok_or(SketchError::EmptyDrawing)?;
    write_output(output, &request.to_json()?)
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), SketchCliError> {
    let events = parse_events(&read_input(input)?, &input_format)?;
    let results = PointerEventAdapter::validate_events(&events);

    let report = ValidationReport {
        total_events: events.len(),
        valid_events: events.len() - results.len(),
        invalid_events: results.len(),
        errors: results
            .iter()
            .map(|r| ValidationErrorDetail {
                index: r.index,
                event_id: r.event_id.clone(),
                error: r.result.as_ref().map(|e| e.to_string()).unwrap_or_default(),
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
        Err(SketchCliError::ValidationFailed(report.invalid_events))
    } else {
        Ok(())
    }
}

fn cmd_doctor(
    config: &PipelineConfig,
    config_path: Option<&Path>,
    json: bool,
) -> Result<(), SketchCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("{} version {}", PRODUCER_NAME, PREP_VERSION),
    });

    checks.push(DoctorCheck {
        name: "schema_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Input schema: {}", SCHEMA_VERSION),
    });

    // run() already refused an unreadable config file
    checks.push(match (config_path, config.validate()) {
        (_, Err(e)) => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Error,
            message: e.to_string(),
        },
        (Some(path), Ok(())) => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: format!("Loaded {}", path.display()),
        },
        (None, Ok(())) => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: "Using built-in defaults".to_string(),
        },
    });

    let model = config.dispatch.model_id().to_string();
    checks.push(DoctorCheck {
        name: "dispatch".to_string(),
        status: if model == config.dispatch.mode.default_model() {
            CheckStatus::Ok
        } else {
            // Custom model ids are allowed but not checked against the server
            CheckStatus::Warning
        },
        message: format!(
            "{} mode using model {} ({} labels, win at {:.2})",
            config.dispatch.mode.as_str(),
            model,
            config.round.labels.len(),
            config.round.win_threshold
        ),
    });

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
            message: "stdin is piped (ready for input)".to_string(),
        }
    };
    checks.push(stdin_check);

    let has_errors = checks.iter().any(|c| matches!(c.status, CheckStatus::Error));

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: PREP_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("sketchprep Doctor Report");
        println!("========================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");
        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERROR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    if has_errors {
        Err(SketchCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_schema(schema_type: SchemaType, json_schema: bool) -> Result<(), SketchCliError> {
    match schema_type {
        SchemaType::Input => {
            if json_schema {
                println!("{}", input_json_schema());
            } else {
                println!("Input Schema: {}", SCHEMA_VERSION);
                println!();
                println!("One record per pointer event, in the order they happened:");
                println!();
                println!("- schema_version: \"{}\"", SCHEMA_VERSION);
                println!("- event_id: optional identifier, echoed in validation reports");
                println!("- phase: down | move | up");
                println!("- x, y: surface coordinates (required for down and move)");
                println!("- t_ms: milliseconds since the round started, never decreasing");
                println!();
                println!("Points outside the surface and moves without a pressed pointer");
                println!("are ignored during replay.");
            }
        }
        SchemaType::Strokes => {
            if json_schema {
                println!("{}", strokes_json_schema());
            } else {
                println!("Strokes JSON");
                println!();
                println!("An array of strokes, each a pair of equal-length coordinate columns:");
                println!();
                println!("  [{{\"x\": [10, 20, 30], \"y\": [5, 5, 8]}}, ...]");
                println!();
                println!("Every stroke needs at least one point; coordinates must be finite.");
            }
        }
        SchemaType::Output => {
            if json_schema {
                println!("{}", output_json_schema());
            } else {
                println!("Output: prediction request bodies");
                println!();
                println!("Raster mode:");
                println!("- pixels: 784 values in [0, 1], row-major 28x28, ink = 1");
                println!("- model: identifier (model1 by default)");
                println!();
                println!("Sequence mode:");
                println!("- sequence: [[dx, dy, pen], ...], dx/dy in [-255, 255]");
                println!("  pen = 1 marks the end of each stroke");
                println!("- model: identifier (model2 by default)");
            }
        }
    }
    Ok(())
}

fn parse_events(data: &str, format: &InputFormat) -> Result<Vec<PointerEvent>, SketchCliError> {
    let events = match format {
        InputFormat::Ndjson => PointerEventAdapter::parse_ndjson(data)?,
        InputFormat::Json => PointerEventAdapter::parse_array(data)?,
    };
    Ok(events)
}

fn read_input(input: &Path) -> Result<String, SketchCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn write_output(output: &Path, content: &str) -> Result<(), SketchCliError> {
    if output.to_string_lossy() == "-" {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", content)?;
        stdout.flush()?;
    } else {
        fs::write(output, format!("{}\n", content))?;
    }
    Ok(())
}

fn input_json_schema() -> String {
    serde_json::json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "title": SCHEMA_VERSION,
        "type": "object",
        "required": ["schema_version", "phase", "t_ms"],
        "properties": {
            "schema_version": { "const": SCHEMA_VERSION },
            "event_id": { "type": "string" },
            "phase": { "enum": ["down", "move", "up"] },
            "x": { "type": "number" },
            "y": { "type": "number" },
            "t_ms": { "type": "integer", "minimum": 0 }
        }
    })
    .to_string()
}

fn strokes_json_schema() -> String {
    serde_json::json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "title": "strokes",
        "type": "array",
        "items": {
            "type": "object",
            "required": ["x", "y"],
            "properties": {
                "x": { "type": "array", "items": { "type": "number" }, "minItems": 1 },
                "y": { "type": "array", "items": { "type": "number" }, "minItems": 1 }
            }
        }
    })
    .to_string()
}

fn output_json_schema() -> String {
    serde_json::json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "title": "prediction_request",
        "oneOf": [
            {
                "type": "object",
                "required": ["pixels", "model"],
                "properties": {
                    "pixels": {
                        "type": "array",
                        "items": { "type": "number", "minimum": 0, "maximum": 1 },
                        "minItems": 784,
                        "maxItems": 784
                    },
                    "model": { "type": "string" }
                }
            },
            {
                "type": "object",
                "required": ["sequence", "model"],
                "properties": {
                    "sequence": {
                        "type": "array",
                        "items": {
                            "type": "array",
                            "prefixItems": [
                                { "type": "integer", "minimum": -255, "maximum": 255 },
                                { "type": "integer", "minimum": -255, "maximum": 255 },
                                { "enum": [0, 1] }
                            ]
                        }
                    },
                    "model": { "type": "string" }
                }
            }
        ]
    })
    .to_string()
}

#[derive(Debug)]
enum SketchCliError {
    Io(io::Error),
    Sketch(SketchError),
    Json(serde_json::Error),
    NoEvents,
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for SketchCliError {
    fn from(e: io::Error) -> Self {
        SketchCliError::Io(e)
    }
}

impl From<SketchError> for SketchCliError {
    fn from(e: SketchError) -> Self {
        SketchCliError::Sketch(e)
    }
}

impl From<serde_json::Error> for SketchCliError {
    fn from(e: serde_json::Error) -> Self {
        SketchCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn new(code: &str, message: String, hint: &str) -> Self {
        CliError {
            code: code.to_string(),
            message,
            hint: Some(hint.to_string()),
        }
    }
}

impl From<SketchCliError> for CliError {
    fn from(e: SketchCliError) -> Self {
        match e {
            SketchCliError::Io(e) => {
                CliError::new("IO_ERROR", e.to_string(), "Check file paths and permissions")
            }
            SketchCliError::Json(e) => CliError::new("JSON_ERROR", e.to_string(), "Check JSON syntax"),
            SketchCliError::NoEvents => CliError::new(
                "NO_EVENTS",
                "No events found in input".to_string(),
                "Ensure input file is not empty",
            ),
            SketchCliError::ValidationFailed(count) => CliError::new(
                "VALIDATION_FAILED",
                format!("{} events failed validation", count),
                "Fix validation errors and retry",
            ),
            SketchCliError::DoctorFailed => CliError::new(
                "DOCTOR_FAILED",
                "One or more health checks failed".to_string(),
                "Review the doctor report for details",
            ),
            SketchCliError::Sketch(e) => {
                let message = e.to_string();
                match e {
                    SketchError::EmptyDrawing => CliError::new(
                        "EMPTY_DRAWING",
                        message,
                        "Sequence requests need at least one stroke",
                    ),
                    SketchError::InvalidStroke(_) => CliError::new(
                        "INVALID_STROKE",
                        message,
                        "Run 'sketchprep schema strokes' for the expected format",
                    ),
                    SketchError::ParseError(_) => CliError::new(
                        "PARSE_ERROR",
                        message,
                        "Run 'sketchprep validate' for details",
                    ),
                    SketchError::Config(_) => CliError::new(
                        "CONFIG_ERROR",
                        message,
                        "Check the configuration file and flags",
                    ),
                    SketchError::ImageError(_) => CliError::new(
                        "IMAGE_ERROR",
                        message,
                        "Check the preview path and extension",
                    ),
                    SketchError::JsonError(_) => {
                        CliError::new("JSON_ERROR", message, "Check JSON syntax")
                    }
                    SketchError::IoError(_) => {
                        CliError::new("IO_ERROR", message, "Check file paths and permissions")
                    }
                    _ => CliError::new("PIPELINE_ERROR", message, "Check input format"),
                }
            }
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
