use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::Parser;

use drowsiness_core::annotation::infrastructure::overlay_annotator::OverlayAnnotator;
use drowsiness_core::detection::domain::landmark_detector::LandmarkDetector;
use drowsiness_core::detection::infrastructure::onnx_blazeface_detector::OnnxBlazefaceDetector;
use drowsiness_core::detection::infrastructure::onnx_face_mesh_detector::OnnxFaceMeshDetector;
use drowsiness_core::monitoring::domain::alarm_notifier::AlarmNotifier;
use drowsiness_core::monitoring::domain::drowsiness_tracker::TrackerConfig;
use drowsiness_core::monitoring::domain::frame_clock::TimeStep;
use drowsiness_core::monitoring::infrastructure::log_alarm_notifier::{
    LogAlarmNotifier, TerminalBellNotifier,
};
use drowsiness_core::pipeline::monitor_session_use_case::{
    MonitorSessionUseCase, SessionConfig, SessionEnd,
};
use drowsiness_core::pipeline::session_logger::LogSessionLogger;
use drowsiness_core::pipeline::stop_signal::{AnyStop, FrameLimit, StopSignal};
use drowsiness_core::shared::constants::{FACE_DETECTION_MODEL_NAME, FACE_MESH_MODEL_NAME};
use drowsiness_core::shared::model_resolver::{self, ModelSource};
use drowsiness_core::shared::settings::MonitorSettings;
use drowsiness_core::video::domain::frame_source::FrameSource;
use drowsiness_core::video::domain::render_sink::RenderSink;
use drowsiness_core::video::infrastructure::ffmpeg_frame_source::FfmpegFrameSource;
use drowsiness_core::video::infrastructure::ffmpeg_render_sink::FfmpegRenderSink;
use drowsiness_core::video::infrastructure::image_preview_sink::ImagePreviewSink;
use drowsiness_core::video::infrastructure::window_render_sink::WindowRenderSink;

const WINDOW_TITLE: &str = "Video Feed";

/// Eye-closure drowsiness monitoring for a camera or a video file.
///
/// With --window, press `q` or Esc in the window to stop. Without it, type
/// `q` then Enter on the terminal.
#[derive(Parser)]
#[command(name = "drowsiness-monitor")]
struct Cli {
    /// Video file, or capture device when --input-format is given
    /// (e.g. /dev/video0 with v4l2, "0" with avfoundation).
    input: PathBuf,

    /// Capture device input format: v4l2, avfoundation, dshow.
    #[arg(long)]
    input_format: Option<String>,

    /// Show the annotated stream in a window.
    #[arg(long)]
    window: bool,

    /// Write the annotated stream to this video file.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Periodically overwrite this PNG with the latest annotated frame.
    #[arg(long)]
    preview: Option<PathBuf>,

    /// Write the preview every Nth frame.
    #[arg(long)]
    preview_every: Option<usize>,

    /// Load settings from this file instead of the user config directory.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Persist the effective settings to the user config directory.
    #[arg(long)]
    save_settings: bool,

    /// Average EAR below which the eyes count as closed.
    #[arg(long)]
    ear_threshold: Option<f64>,

    /// Seconds of continuous closure before the alarm is raised.
    #[arg(long)]
    alarm_seconds: Option<f64>,

    /// Time credited per frame: seconds (e.g. 0.1), "wall" or "source".
    #[arg(long, value_parser = parse_time_step)]
    time_step: Option<TimeStep>,

    /// Do not mirror the annotated frame.
    #[arg(long)]
    no_mirror: bool,

    /// Face box confidence threshold (0.0-1.0).
    #[arg(long)]
    confidence: Option<f64>,

    /// Face presence threshold for the mesh model (0.0-1.0).
    #[arg(long)]
    presence_threshold: Option<f64>,

    /// BlazeFace short-range ONNX model.
    #[arg(long)]
    face_model: Option<PathBuf>,

    /// Download location for the BlazeFace model if it is not cached.
    #[arg(long)]
    face_model_url: Option<String>,

    /// Face-mesh landmark ONNX model.
    #[arg(long)]
    mesh_model: Option<PathBuf>,

    /// Download location for the face-mesh model if it is not cached.
    #[arg(long)]
    mesh_model_url: Option<String>,

    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<usize>,

    /// Ring the terminal bell when the alarm is raised.
    #[arg(long)]
    bell: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let settings = effective_settings(&cli)?;
    settings.validate()?;
    if cli.save_settings {
        let path = settings.save()?;
        log::info!("Settings saved to {}", path.display());
    }

    let detector = build_detector(&settings)?;
    let source = build_source(&cli);
    let (sinks, window_stop) = build_sinks(&cli, &settings);

    let mut notifiers: Vec<Box<dyn AlarmNotifier>> = vec![Box::new(LogAlarmNotifier)];
    if cli.bell {
        notifiers.push(Box::new(TerminalBellNotifier::stderr()));
    }

    let mut stops: Vec<Box<dyn StopSignal>> = match window_stop {
        Some(flag) => vec![Box::new(flag)],
        None => vec![Box::new(spawn_quit_listener())],
    };
    if let Some(limit) = cli.max_frames {
        stops.push(Box::new(FrameLimit(limit)));
    }

    let config = SessionConfig {
        tracker: TrackerConfig::new(settings.ear_threshold, settings.alarm_threshold_seconds),
        left_eye: settings.left_eye,
        right_eye: settings.right_eye,
        time_step: settings.time_step,
    };

    let mut use_case = MonitorSessionUseCase::new(
        source,
        detector,
        Box::new(OverlayAnnotator::new(settings.mirror)),
        sinks,
        Box::new(AnyStop(stops)),
        config,
    )
    .with_notifier(Box::new(notifiers))
    .with_logger(Box::new(LogSessionLogger::default()));

    let summary = use_case.execute()?;
    let reason = match summary.end {
        SessionEnd::Stopped => "stopped",
        SessionEnd::EndOfStream => "end of stream",
    };
    log::info!(
        "Session {reason}: {} frames, face in {}, {} alarm(s), longest closure {:.1}s",
        summary.frames_processed,
        summary.face_frames,
        summary.alarms_raised,
        summary.longest_closed.as_secs_f64()
    );
    if let Some(output) = &cli.output {
        log::info!("Output written to {}", output.display());
    }
    Ok(())
}

fn effective_settings(cli: &Cli) -> Result<MonitorSettings, Box<dyn std::error::Error>> {
    let mut settings = match &cli.settings {
        Some(path) => MonitorSettings::load_from(path)?,
        None => MonitorSettings::load(),
    };

    if let Some(v) = cli.ear_threshold {
        settings.ear_threshold = v;
    }
    if let Some(v) = cli.alarm_seconds {
        settings.alarm_threshold_seconds = v;
    }
    if let Some(v) = cli.time_step {
        settings.time_step = v;
    }
    if cli.no_mirror {
        settings.mirror = false;
    }
    if let Some(v) = cli.confidence {
        settings.face_confidence = v;
    }
    if let Some(v) = cli.presence_threshold {
        settings.presence_threshold = v;
    }
    if let Some(v) = cli.preview_every {
        settings.preview_every_n_frames = v;
    }
    override_model(
        &mut settings.face_detection_model,
        &cli.face_model,
        &cli.face_model_url,
    );
    override_model(
        &mut settings.face_mesh_model,
        &cli.mesh_model,
        &cli.mesh_model_url,
    );
    Ok(settings)
}

fn override_model(source: &mut ModelSource, path: &Option<PathBuf>, url: &Option<String>) {
    if let Some(path) = path {
        source.path = Some(path.clone());
    }
    if let Some(url) = url {
        source.url = Some(url.clone());
    }
}

fn build_detector(
    settings: &MonitorSettings,
) -> Result<Box<dyn LandmarkDetector>, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {FACE_DETECTION_MODEL_NAME}");
    let face_path = model_resolver::resolve(
        FACE_DETECTION_MODEL_NAME,
        &settings.face_detection_model,
        Some(Box::new(download_progress)),
    )?;
    log::info!("Resolving model: {FACE_MESH_MODEL_NAME}");
    let mesh_path = model_resolver::resolve(
        FACE_MESH_MODEL_NAME,
        &settings.face_mesh_model,
        Some(Box::new(download_progress)),
    )?;

    let face_detector = OnnxBlazefaceDetector::new(&face_path, settings.face_confidence)?;
    Ok(Box::new(OnnxFaceMeshDetector::new(
        &mesh_path,
        Box::new(face_detector),
        settings.presence_threshold,
    )?))
}

fn build_source(cli: &Cli) -> Box<dyn FrameSource> {
    match &cli.input_format {
        Some(format) => Box::new(FfmpegFrameSource::device(&cli.input, format)),
        None => Box::new(FfmpegFrameSource::file(&cli.input)),
    }
}

/// Returns the sinks and, with --window, the window's quit flag.
fn build_sinks(
    cli: &Cli,
    settings: &MonitorSettings,
) -> (Vec<Box<dyn RenderSink>>, Option<Arc<AtomicBool>>) {
    let mut sinks: Vec<Box<dyn RenderSink>> = Vec::new();
    let mut window_stop = None;
    if cli.window {
        let window = WindowRenderSink::new(WINDOW_TITLE);
        window_stop = Some(window.stop_flag());
        sinks.push(Box::new(window));
    }
    if let Some(output) = &cli.output {
        sinks.push(Box::new(FfmpegRenderSink::new(output)));
    }
    if let Some(preview) = &cli.preview {
        sinks.push(Box::new(ImagePreviewSink::new(
            preview,
            settings.preview_every_n_frames,
        )));
    }
    if sinks.is_empty() {
        log::warn!("No --window, --output or --preview given; annotated frames are discarded");
    }
    (sinks, window_stop)
}

/// Headless stop: reads stdin on a helper thread and sends a stop request
/// on a `q` line.
fn spawn_quit_listener() -> crossbeam_channel::Receiver<()> {
    let (tx, rx) = crossbeam_channel::bounded(1);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().eq_ignore_ascii_case("q") {
                let _ = tx.send(());
                break;
            }
        }
    });
    rx
}

fn parse_time_step(value: &str) -> Result<TimeStep, String> {
    match value {
        "wall" => Ok(TimeStep::WallClock),
        "source" => Ok(TimeStep::SourceRate),
        _ => value
            .parse::<f64>()
            .map(|seconds| TimeStep::Fixed { seconds })
            .map_err(|_| format!("expected seconds, 'wall' or 'source', got '{value}'")),
    }
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if cli.input_format.is_none() && !cli.input.exists() {
        return Err(format!("Input file not found: {}", cli.input.display()).into());
    }
    if cli.preview_every == Some(0) {
        return Err("Preview interval must be at least 1 frame".into());
    }
    if cli.max_frames == Some(0) {
        return Err("--max-frames must be at least 1".into());
    }
    for path in [&cli.output, &cli.preview].into_iter().flatten() {
        if same_file(path, &cli.input) {
            return Err(format!("Refusing to overwrite the input {}", path.display()).into());
        }
    }
    if cli.face_model_url.is_some() && cli.face_model.is_some() {
        log::warn!("--face-model given; --face-model-url is ignored");
    }
    if cli.mesh_model_url.is_some() && cli.mesh_model.is_some() {
        log::warn!("--mesh-model given; --mesh-model-url is ignored");
    }
    Ok(())
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading model... {pct}%");
    } else {
        eprint!("\rDownloading model... {downloaded} bytes");
    }
}
