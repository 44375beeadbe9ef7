//! ojo - live object detection with localized labels
//!
//! Reads frames from a camera (or a synthetic `stub://` source), detects
//! objects, draws boxes with labels in the configured language, prints the
//! accepted detections and shows the annotated frames. Press the stop key
//! (default `q`) or Ctrl-C to quit.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ojo::config::parse_stop_key;
use ojo::{
    open_display, open_source, Annotator, BackendRegistry, Collaborators, ConnectivityProbe,
    InitError, Localizer, NoPrerequisite, OjoConfig, Pipeline, Prerequisite, RunSummary,
    StubLoader,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON configuration file.
    #[arg(long, env = "OJO_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,
    /// Frame source: /dev/videoN, cam:N or stub://<name>.
    #[arg(long)]
    source: Option<String>,
    /// Detection backend (see --list-backends).
    #[arg(long)]
    backend: Option<String>,
    /// Local model file; downloaded from --model-url when missing.
    #[arg(long, value_name = "PATH")]
    model: Option<PathBuf>,
    #[arg(long, value_name = "URL")]
    model_url: Option<String>,
    /// Minimum confidence; detections must score strictly above it.
    #[arg(long)]
    confidence: Option<f32>,
    /// Label language (es|en).
    #[arg(long)]
    language: Option<String>,
    /// TrueType font for the labels drawn on the frame (default: bundled DejaVu Sans Mono).
    #[arg(long, value_name = "PATH")]
    font: Option<PathBuf>,
    /// Display mode (window|headless).
    #[arg(long)]
    display: Option<String>,
    /// Write every annotated frame as a JPEG into this directory (headless display).
    #[arg(long, value_name = "DIR")]
    save_dir: Option<PathBuf>,
    #[arg(long)]
    stop_key: Option<String>,
    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<u64>,
    /// Skip the connectivity check.
    #[arg(long)]
    offline: bool,
    /// Print the detection backends compiled into this binary and exit.
    #[arg(long)]
    list_backends: bool,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    match run(args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("❌ Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<ExitCode> {
    let mut cfg = OjoConfig::load_from(args.config.as_deref())?;
    apply_args(&mut cfg, &args)?;
    cfg.validate()?;

    let mut registry = build_registry(&cfg);
    if args.list_backends {
        for name in registry.list() {
            println!("{}", name);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let loader = match registry.take(&cfg.model.backend) {
        Ok(loader) => loader,
        Err(err) => {
            return Ok(report_init_failure(&InitError::ModelLoad {
                backend: cfg.model.backend.clone(),
                reason: format!("{:#}", err),
            }))
        }
    };
    let prerequisite: Box<dyn Prerequisite> = if cfg.connectivity.required {
        Box::new(ConnectivityProbe::new(
            cfg.connectivity.probe_url.clone(),
            cfg.connectivity.timeout,
        ))
    } else {
        Box::new(NoPrerequisite)
    };
    let source = match open_source(&cfg.source) {
        Ok(source) => source,
        Err(err) => {
            return Ok(report_init_failure(&InitError::SourceOpen {
                uri: cfg.source.uri.clone(),
                reason: format!("{:#}", err),
            }))
        }
    };
    let sink = match open_display(&cfg.display) {
        Ok(sink) => sink,
        Err(err) => {
            return Ok(report_init_failure(&InitError::SinkOpen {
                sink: format!("{:?}", cfg.display.mode).to_lowercase(),
                reason: format!("{:#}", err),
            }))
        }
    };

    let annotator = match &cfg.annotate.font_path {
        Some(path) => Annotator::from_font_file(path)?,
        None => Annotator::new()?,
    }
    .with_font_scale(cfg.annotate.font_scale);
    let localizer = Localizer::new(cfg.label_map()?);

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })
    .context("error setting Ctrl-C handler")?;

    let ui = ui::Ui::new(ui::UiMode::parse(&args.ui), std::io::stderr().is_terminal());

    print_banner(&cfg);
    let pipeline = Pipeline::new(
        cfg.pipeline_settings()?,
        localizer,
        annotator,
        Collaborators {
            prerequisite,
            loader,
            source,
            sink,
        },
    )
    .with_interrupt(interrupted)
    .on_transition(ui.pipeline_observer());

    match pipeline.run() {
        Ok(summary) => {
            log_summary(&summary);
            println!("\n👋 Programa terminado correctamente");
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => Ok(report_init_failure(&err)),
    }
}

fn apply_args(cfg: &mut OjoConfig, args: &Args) -> Result<()> {
    if let Some(source) = &args.source {
        cfg.source.uri = source.clone();
    }
    if let Some(backend) = &args.backend {
        cfg.model.backend = backend.clone();
    }
    if let Some(model) = &args.model {
        cfg.model.path = model.clone();
    }
    if let Some(url) = &args.model_url {
        cfg.model.url = Some(url.clone());
    }
    if let Some(confidence) = args.confidence {
        cfg.confidence_threshold = confidence;
    }
    if let Some(language) = &args.language {
        cfg.labels.language = language.clone();
    }
    if let Some(font) = &args.font {
        cfg.annotate.font_path = Some(font.clone());
    }
    if let Some(display) = &args.display {
        cfg.display.mode = display.parse()?;
    }
    if let Some(dir) = &args.save_dir {
        cfg.display.save_dir = Some(dir.clone());
    }
    if let Some(key) = &args.stop_key {
        cfg.display.stop_key = parse_stop_key(key)?;
    }
    if let Some(max_frames) = args.max_frames {
        cfg.source.max_frames = Some(max_frames);
    }
    if args.offline {
        cfg.connectivity.required = false;
    }
    Ok(())
}

fn build_registry(cfg: &OjoConfig) -> BackendRegistry {
    let mut registry = BackendRegistry::new();
    #[cfg(feature = "backend-tract")]
    {
        registry.register(ojo::TractLoader::new(
            cfg.model_store(),
            cfg.model.input_size,
            cfg.model.iou_threshold,
        ));
    }
    #[cfg(not(feature = "backend-tract"))]
    {
        log::debug!(
            "tract backend not compiled in; model file {} unused",
            cfg.model.path.display()
        );
    }
    registry.register(StubLoader::new());
    registry
}

fn print_banner(cfg: &OjoConfig) {
    let rule = "=".repeat(50);
    println!("\n{}", rule);
    println!("🚀 DETECTOR DE OBJETOS ({})", cfg.labels.language.to_uppercase());
    println!("{}\n", rule);
    println!(
        "🎥 Fuente: {} - Presiona '{}' para salir\n",
        cfg.source.uri,
        cfg.display.stop_key.to_ascii_uppercase()
    );
}

fn log_summary(summary: &RunSummary) {
    log::info!(
        "run finished ({}): {} frames, {} detections, {} inference failures, {} malformed records",
        summary.stop_reason,
        summary.frames,
        summary.detections,
        summary.inference_failures,
        summary.rejected_records
    );
}

/// Print the failure with numbered remediation steps. Exit code 1.
fn report_init_failure(err: &InitError) -> ExitCode {
    eprintln!("❌ Error: {}", err);
    eprintln!("💡 Soluciones posibles:");
    for (index, step) in err.remediation().iter().enumerate() {
        eprintln!("{}. {}", index + 1, step);
    }
    ExitCode::from(1)
}
