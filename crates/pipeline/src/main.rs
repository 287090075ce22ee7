//! Foggy Vehicle Detection - Main Entry Point

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use adas::{Annotator, VehicleDetector};
use alerting::{AlertSink, BeepSink};
use anyhow::Context;
use camera_capture::SourceInput;
use clap::{CommandFactory, Parser};
use dehaze::ClaheDehazer;
use pipeline::{init_logging, Settings, StreamRunner};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Vehicle detection with distance estimation and collision warning in foggy conditions"
)]
struct Args {
    /// Image file or directory of images
    #[arg(short, long)]
    input: Option<String>,

    /// Use the local camera (index 0)
    #[arg(short, long)]
    webcam: bool,

    /// Network camera stream URL (e.g. an IP Webcam app)
    #[arg(short, long)]
    android_url: Option<String>,

    /// Directory for annotated output, created if missing
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Display annotated frames
    #[arg(long)]
    show: bool,

    /// Suppress the audible collision alert
    #[arg(long)]
    no_beep: bool,

    /// Settings file (TOML); defaults to ./fog-detect.toml when present
    #[arg(long, env = "FOG_CONFIG")]
    config: Option<PathBuf>,

    /// Detection model, overriding the configured path
    #[arg(long)]
    model: Option<String>,

    /// Per-frame debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// `--webcam` wins over `--android-url`, which wins over `--input`
    fn source_input(&self) -> Option<SourceInput> {
        if self.webcam {
            Some(SourceInput::Camera(0))
        } else if let Some(url) = &self.android_url {
            Some(SourceInput::Location(url.clone()))
        } else {
            self.input.clone().map(SourceInput::Location)
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let Some(input) = args.source_input() else {
        Args::command().print_help()?;
        println!();
        return Ok(());
    };

    info!("=== Foggy Vehicle Detection v{} ===", env!("CARGO_PKG_VERSION"));

    let mut settings = Settings::load(args.config.as_deref()).context("loading settings")?;
    if let Some(model) = &args.model {
        settings.model_path = model.clone();
    }

    let adas_config = settings.adas_config();
    let detector = VehicleDetector::load(&adas_config)
        .with_context(|| format!("loading detection model {}", adas_config.model_path))?;
    let alerts: Arc<dyn AlertSink> = Arc::new(BeepSink::new(settings.alert_config()));
    let annotator = Annotator::new(&adas_config, alerts);
    let dehazer = ClaheDehazer::new(&settings.dehaze_config());

    let mut runner = StreamRunner::new(
        settings.runner_config(!args.no_beep),
        Box::new(dehazer),
        detector,
        annotator,
    );

    let stop = runner.stop_handle();
    ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))
        .context("installing Ctrl-C handler")?;

    let summary = runner.run_input(&input, args.output.as_deref(), args.show)?;
    if let Some(dir) = &args.output {
        info!("Wrote {} output(s) to {}", summary.outputs_written, dir.display());
    }

    Ok(())
}
