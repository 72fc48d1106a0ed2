use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use clipsieve_core::audio::infrastructure::ffmpeg_cli_splicer::FfmpegCliSplicer;
use clipsieve_core::pipeline::extract_fragments_use_case::ExtractFragmentsUseCase;
use clipsieve_core::pipeline::extraction_config::ExtractionConfig;
use clipsieve_core::pipeline::process_batch_use_case::{ProcessBatchUseCase, VideoJob};
use clipsieve_core::pipeline::progress_reporter::{LogProgressReporter, ProgressReporter};
use clipsieve_core::shared::constants::{
    DEFAULT_CHANGE_SCENE_THRESHOLD, DEFAULT_FACE_DETECT_THRESHOLD, DEFAULT_OUTPUT_DIR,
    DEFAULT_RELEASE_TIMEOUT_SECS, YOLO_MODEL_NAME, YOLO_MODEL_URL,
};
use clipsieve_core::validity::domain::frame_check::FrameCheck;
use clipsieve_core::validity::domain::validity_oracle::ValidityOracle;
use clipsieve_core::validity::infrastructure::model_resolver;
use clipsieve_core::validity::infrastructure::onnx_face_detector::OnnxFaceDetector;
use clipsieve_core::validity::infrastructure::scene_change_check::SceneChangeCheck;
use clipsieve_core::validity::infrastructure::single_face_check::SingleFaceCheck;
use clipsieve_core::video::domain::video_reader::VideoReader;
use clipsieve_core::video::domain::video_writer::VideoWriter;
use clipsieve_core::video::infrastructure::ffmpeg_reader::FfmpegReader;
use clipsieve_core::video::infrastructure::ffmpeg_writer::FfmpegWriter;

/// Cut fragments showing exactly one face out of videos.
#[derive(Parser, Debug)]
#[command(name = "clipsieve")]
struct Cli {
    /// Input video files.
    inputs: Vec<PathBuf>,

    /// File listing one `video[,audio]` job per line.
    #[arg(long, conflicts_with = "inputs")]
    list: Option<PathBuf>,

    /// Separate audio track to splice onto every fragment (single input only).
    #[arg(long)]
    audio: Option<PathBuf>,

    /// Fixed fragment duration in seconds. Without it fragments run until
    /// the first invalid frame.
    #[arg(long)]
    duration: Option<u32>,

    /// Check every Nth frame (1 = every frame).
    #[arg(long, default_value_t = 1)]
    check_each_frame: usize,

    /// Directory receiving finished fragments.
    #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Directory for in-progress fragments (default: system temp dir).
    #[arg(long)]
    temp_dir: Option<PathBuf>,

    /// Skip frames before this index.
    #[arg(long, default_value_t = 0)]
    start_frame: usize,

    /// Directory searched for the face model before downloading it.
    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long, default_value_t = DEFAULT_FACE_DETECT_THRESHOLD)]
    face_detect_threshold: f64,

    /// Largest dissimilarity (1 - SSIM) to the previous frame before it
    /// counts as a scene change (0.0-1.0).
    #[arg(long, default_value_t = DEFAULT_CHANGE_SCENE_THRESHOLD)]
    change_scene_threshold: f64,

    /// Do not reject frames on scene changes.
    #[arg(long)]
    no_scene_check: bool,

    /// ffmpeg binary used to splice audio.
    #[arg(long, default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    /// Seconds to wait for an encoder or decoder to close.
    #[arg(long, default_value_t = DEFAULT_RELEASE_TIMEOUT_SECS)]
    release_timeout: u64,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;
    let jobs = collect_jobs(&cli)?;

    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = cancelled.clone();
    ctrlc::set_handler(move || {
        if flag.swap(true, Ordering::SeqCst) {
            process::exit(130);
        }
        eprintln!("\nCancelling after the current frame, press Ctrl-C again to abort");
    })?;

    let config = build_config(&cli);
    fs::create_dir_all(&config.temp_dir)?;

    let oracle = build_oracle(&cli)?;
    let extractor = ExtractFragmentsUseCase::new(
        oracle,
        Box::new(|| -> Box<dyn VideoWriter> { Box::new(FfmpegWriter::new()) }),
        Box::new(FfmpegCliSplicer::new(&cli.ffmpeg)),
        config,
        Some(cancelled.clone()),
    );
    let mut use_case = ProcessBatchUseCase::new(
        extractor,
        Box::new(|| -> Box<dyn VideoReader> { Box::new(FfmpegReader::new()) }),
    );

    let mut reporter = LogProgressReporter::new();
    let summary = use_case.execute(&jobs, &mut reporter);
    reporter.summary();

    if cancelled.load(Ordering::SeqCst) {
        return Err("cancelled".into());
    }
    if summary.failed > 0 {
        return Err(format!("{} of {} videos failed", summary.failed, summary.videos).into());
    }
    Ok(())
}

fn build_config(cli: &Cli) -> ExtractionConfig {
    let defaults = ExtractionConfig::default();
    ExtractionConfig {
        stride: cli.check_each_frame,
        duration: cli.duration,
        output_dir: cli.output_dir.clone(),
        temp_dir: cli.temp_dir.clone().unwrap_or(defaults.temp_dir),
        start_frame: cli.start_frame,
        release_timeout: Duration::from_secs(cli.release_timeout),
    }
}

fn build_oracle(cli: &Cli) -> Result<ValidityOracle, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {YOLO_MODEL_NAME}");
    let model_path = model_resolver::resolve(
        YOLO_MODEL_NAME,
        YOLO_MODEL_URL,
        cli.models_dir.as_deref(),
        Some(Box::new(download_progress)),
    )?;

    let mut checks: Vec<Box<dyn FrameCheck>> = Vec::new();
    if !cli.no_scene_check {
        checks.push(Box::new(SceneChangeCheck::new(cli.change_scene_threshold)));
    }
    let detector = OnnxFaceDetector::new(&model_path, cli.face_detect_threshold)?;
    checks.push(Box::new(SingleFaceCheck::new(Box::new(detector))));

    let mut oracle = ValidityOracle::new();
    oracle.initialize(checks)?;
    Ok(oracle)
}

fn collect_jobs(cli: &Cli) -> Result<Vec<VideoJob>, Box<dyn std::error::Error>> {
    let jobs = match &cli.list {
        Some(list) => {
            let text = fs::read_to_string(list)
                .map_err(|e| format!("Cannot read job list {}: {e}", list.display()))?;
            text.lines().filter_map(VideoJob::parse_line).collect()
        }
        None => cli
            .inputs
            .iter()
            .map(|video| VideoJob::new(video, cli.audio.clone()))
            .collect::<Vec<_>>(),
    };
    if jobs.is_empty() {
        return Err("No input videos".into());
    }
    for job in &jobs {
        require_file(&job.video, "Input file")?;
        if let Some(audio) = &job.audio {
            require_file(audio, "Audio file")?;
        }
    }
    Ok(jobs)
}

fn require_file(path: &Path, what: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !path.is_file() {
        return Err(format!("{what} not found: {}", path.display()).into());
    }
    Ok(())
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if cli.inputs.is_empty() && cli.list.is_none() {
        return Err("Give input videos or --list".into());
    }
    if cli.audio.is_some() && (cli.inputs.len() != 1 || cli.list.is_some()) {
        return Err("--audio needs exactly one input video".into());
    }
    if cli.check_each_frame == 0 {
        return Err("--check-each-frame must be at least 1".into());
    }
    if cli.duration == Some(0) {
        return Err("--duration must be at least 1 second".into());
    }
    if !(0.0..=1.0).contains(&cli.face_detect_threshold) {
        return Err(format!(
            "Face detect threshold must be between 0.0 and 1.0, got {}",
            cli.face_detect_threshold
        )
        .into());
    }
    if !(0.0..=1.0).contains(&cli.change_scene_threshold) {
        return Err(format!(
            "Change scene threshold must be between 0.0 and 1.0, got {}",
            cli.change_scene_threshold
        )
        .into());
    }
    if cli.release_timeout == 0 {
        return Err("--release-timeout must be at least 1 second".into());
    }
    Ok(())
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face detection model... {pct}%");
        if downloaded >= total {
            eprintln!();
        }
    } else {
        eprint!("\rDownloading face detection model... {downloaded} bytes");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("clipsieve").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["talk.mp4"]);
        assert!(validate(&cli).is_ok());

        let config = build_config(&cli);
        assert_eq!(config.stride, 1);
        assert_eq!(config.duration, None);
        assert_eq!(config.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
        assert_eq!(config.temp_dir, std::env::temp_dir());
        assert_eq!(config.release_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_options_flow_into_config() {
        let cli = parse(&[
            "talk.mp4",
            "--duration",
            "4",
            "--check-each-frame",
            "5",
            "--start-frame",
            "12",
            "--temp-dir",
            "/scratch",
            "--output-dir",
            "clips",
        ]);
        let config = build_config(&cli);
        assert_eq!(config.duration, Some(4));
        assert_eq!(config.stride, 5);
        assert_eq!(config.start_frame, 12);
        assert_eq!(config.temp_dir, PathBuf::from("/scratch"));
        assert_eq!(config.output_dir, PathBuf::from("clips"));
    }

    #[test]
    fn test_scene_threshold_help_describes_dissimilarity() {
        use clap::CommandFactory;

        let cmd = Cli::command();
        let help = cmd
            .get_arguments()
            .find(|arg| arg.get_id() == "change_scene_threshold")
            .and_then(|arg| arg.get_help())
            .unwrap()
            .to_string();
        assert!(help.contains("dissimilarity"), "{help}");
        assert!(!help.contains("Minimum similarity"), "{help}");
    }

    #[test]
    fn test_rejects_zero_stride() {
        assert!(validate(&parse(&["talk.mp4", "--check-each-frame", "0"])).is_err());
    }

    #[test]
    fn test_rejects_zero_duration() {
        assert!(validate(&parse(&["talk.mp4", "--duration", "0"])).is_err());
    }

    #[test]
    fn test_rejects_threshold_out_of_range() {
        assert!(validate(&parse(&["talk.mp4", "--face-detect-threshold", "1.5"])).is_err());
        assert!(validate(&parse(&["talk.mp4", "--change-scene-threshold", "-0.1"])).is_err());
    }

    #[test]
    fn test_audio_needs_single_input() {
        assert!(validate(&parse(&["a.mp4", "--audio", "voice.aac"])).is_ok());
        assert!(validate(&parse(&["a.mp4", "b.mp4", "--audio", "voice.aac"])).is_err());
    }

    #[test]
    fn test_requires_some_input() {
        assert!(validate(&parse(&[])).is_err());
    }

    #[test]
    fn test_list_conflicts_with_inputs() {
        let result = Cli::try_parse_from(["clipsieve", "a.mp4", "--list", "jobs.txt"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_jobs_from_list_file() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("talk.mp4");
        let audio = dir.path().join("voice.aac");
        fs::write(&video, b"").unwrap();
        fs::write(&audio, b"").unwrap();
        let list = dir.path().join("jobs.txt");
        fs::write(
            &list,
            format!("{}\n\n{},{}\n", video.display(), video.display(), audio.display()),
        )
        .unwrap();

        let cli = parse(&["--list", list.to_str().unwrap()]);
        let jobs = collect_jobs(&cli).unwrap();
        assert_eq!(
            jobs,
            vec![
                VideoJob::new(&video, None),
                VideoJob::new(&video, Some(audio)),
            ]
        );
    }

    #[test]
    fn test_missing_input_is_error() {
        let cli = parse(&["/definitely/not/here.mp4"]);
        let err = collect_jobs(&cli).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
