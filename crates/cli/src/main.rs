use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use facetrack_core::detection::infrastructure::onnx_person_detector::OnnxPersonDetector;
use facetrack_core::detection::infrastructure::tracked_frame_stream::TrackedFrameStream;
use facetrack_core::identity::domain::person_registry::PersonRegistry;
use facetrack_core::pipeline::identify_people_use_case::IdentifyPeopleUseCase;
use facetrack_core::pipeline::pipeline_context::PipelineContext;
use facetrack_core::pipeline::stats_collector::RecognitionReport;
use facetrack_core::recognition::domain::embedding_extractor::EmbeddingExtractor;
use facetrack_core::recognition::domain::embedding_store::{EmbeddingStore, EnrollmentSource};
use facetrack_core::recognition::domain::matcher::Matcher;
use facetrack_core::recognition::infrastructure::json_embedding_cache::JsonEmbeddingCache;
use facetrack_core::recognition::infrastructure::onnx_embedding_extractor::OnnxEmbeddingExtractor;
use facetrack_core::recognition::infrastructure::onnx_face_locator::{self, OnnxFaceLocator};
use facetrack_core::shared::config::RecognitionConfig;
use facetrack_core::shared::constants::{
    EMBEDDING_MODEL_NAME, EMBEDDING_MODEL_URL, FACE_MODEL_NAME, FACE_MODEL_URL,
    TEMP_CROP_FILENAME,
};
use facetrack_core::shared::model_resolver::{default_model_dir, ModelResolver};
use facetrack_core::video::domain::video_reader::VideoReader;
use facetrack_core::video::infrastructure::ffmpeg_reader::FfmpegReader;
use facetrack_core::video::infrastructure::image_file_writer::ImageFileWriter;

/// Identify known people across the tracked frames of a video.
#[derive(Parser)]
#[command(name = "facetrack")]
struct Cli {
    /// Folder of reference face images; each file stem is a person's name.
    #[arg(long)]
    faces: PathBuf,

    /// Video to analyse.
    #[arg(long)]
    video: PathBuf,

    /// YOLO person detector (ONNX, COCO classes).
    #[arg(long)]
    detector_model: PathBuf,

    /// Embedding model (ONNX) tried before the default ArcFace model.
    #[arg(long)]
    embedding_model: Option<PathBuf>,

    /// Minimum cosine similarity for a match (-1.0 to 1.0).
    #[arg(long)]
    threshold: Option<f64>,

    /// Identify on every Nth frame.
    #[arg(long)]
    frame_stride: Option<usize>,

    /// Pixels added around each person box before cropping.
    #[arg(long)]
    margin: Option<u32>,

    /// Crops with a shorter side below this many pixels are skipped.
    #[arg(long)]
    min_crop: Option<u32>,

    /// Directory for the embedding cache.
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Delete the embedding cache of the active model before enrolling.
    #[arg(long)]
    reset_cache: bool,

    /// Enroll an extra face, e.g. --add carol=/photos/carol.jpg (repeatable).
    #[arg(long = "add", value_parser = parse_addition)]
    additions: Vec<(String, PathBuf)>,

    /// Write the JSON report here instead of stdout.
    #[arg(long)]
    report: Option<PathBuf>,

    /// JSON config file (default: platform config dir).
    #[arg(long)]
    config: Option<PathBuf>,
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
    let config = load_config(&cli)?;

    let resolver = ModelResolver::new(default_model_dir()?, config.bundled_models_dir.clone());
    let extractor = build_extractor(&cli, &resolver)?;
    let cache_dir = config
        .resolved_cache_dir()
        .ok_or("Could not determine the embedding cache directory")?;
    let cache = JsonEmbeddingCache::for_model(&cache_dir, extractor.model_id());
    log::info!("Embedding cache: {}", cache.path().display());

    let mut store = EmbeddingStore::new(Box::new(extractor), Box::new(cache));
    if cli.reset_cache {
        store.reset_cache()?;
    }
    let source = store.enroll_from_folder(&cli.faces)?;
    if source == EnrollmentSource::Cache {
        log::info!("Reference faces restored from cache");
    }

    let mut registry = PersonRegistry::from_folder(&cli.faces)?;
    for (name, path) in &cli.additions {
        if store.enroll_if_absent(name, path) {
            registry.register(name, path);
        }
    }
    let info = store.model_info();
    log::info!("Model {} with {} known faces", info.model_id, info.enrolled_faces);
    if store.is_empty() {
        log::warn!("No known faces enrolled; every detection will be reported as unknown");
    }

    let mut ctx = PipelineContext::new(
        store,
        Matcher::new(config.identification.match_threshold),
        registry,
    );

    let scratch = tempfile::tempdir()?;
    let mut use_case = IdentifyPeopleUseCase::new(
        config.identification.clone(),
        scratch.path().join(TEMP_CROP_FILENAME),
        Box::new(ImageFileWriter::new()),
    );

    let mut detector = OnnxPersonDetector::new(&cli.detector_model, &config.detector)?;
    let mut reader = FfmpegReader::new();
    let metadata = reader.open(&cli.video)?;
    log::info!(
        "Processing {} ({}x{}, {:.1} fps, ~{} sampled frames)",
        cli.video.display(),
        metadata.width,
        metadata.height,
        metadata.fps,
        metadata.sampled_frames(config.identification.frame_stride)
    );

    let stream = TrackedFrameStream::new(reader.frames(), &mut detector);
    use_case.execute(&mut ctx, stream);
    reader.close();

    let report = ctx.finish();
    log::info!("\n\n{}", report.summary_string());
    write_report(&report, cli.report.as_deref())
}

/// Config file, then command-line overrides, then validation.
fn load_config(cli: &Cli) -> Result<RecognitionConfig, Box<dyn std::error::Error>> {
    let mut config = match cli.config.clone().or_else(RecognitionConfig::default_path) {
        Some(path) => RecognitionConfig::load(&path)?,
        None => RecognitionConfig::default(),
    };
    apply_overrides(cli, &mut config);
    config.validate()?;
    Ok(config)
}

fn apply_overrides(cli: &Cli, config: &mut RecognitionConfig) {
    let id = &mut config.identification;
    if let Some(t) = cli.threshold {
        id.match_threshold = t;
    }
    if let Some(s) = cli.frame_stride {
        id.frame_stride = s;
    }
    if let Some(m) = cli.margin {
        id.crop_margin = m;
    }
    if let Some(m) = cli.min_crop {
        id.min_crop_side = m;
    }
    if let Some(dir) = &cli.cache_dir {
        config.cache_dir = Some(dir.clone());
    }
}

/// The explicit model is tried first; the default model is only downloaded
/// when no explicit model was given.
fn build_extractor(
    cli: &Cli,
    resolver: &ModelResolver,
) -> Result<OnnxEmbeddingExtractor, Box<dyn std::error::Error>> {
    let face_model = resolver.resolve(
        FACE_MODEL_NAME,
        FACE_MODEL_URL,
        Some(Box::new(download_progress)),
    )?;
    let locator = OnnxFaceLocator::new(&face_model, onnx_face_locator::DEFAULT_CONFIDENCE)?;

    let mut candidates = Vec::new();
    match &cli.embedding_model {
        Some(path) => {
            candidates.push(path.clone());
            candidates.extend(resolver.find_local(EMBEDDING_MODEL_NAME));
        }
        None => match resolver.resolve(
            EMBEDDING_MODEL_NAME,
            EMBEDDING_MODEL_URL,
            Some(Box::new(download_progress)),
        ) {
            Ok(path) => candidates.push(path),
            Err(e) => log::warn!("Default embedding model unavailable: {e}"),
        },
    }

    Ok(OnnxEmbeddingExtractor::load_first_available(
        &candidates,
        locator,
    )?)
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.faces.is_dir() {
        return Err(format!("Faces folder not found: {}", cli.faces.display()).into());
    }
    if !cli.video.exists() {
        return Err(format!("Video not found: {}", cli.video.display()).into());
    }
    if !cli.detector_model.exists() {
        return Err(format!(
            "Detector model not found: {}",
            cli.detector_model.display()
        )
        .into());
    }
    for (name, path) in &cli.additions {
        if !path.exists() {
            return Err(format!("Image for {name} not found: {}", path.display()).into());
        }
    }
    Ok(())
}

fn write_report(
    report: &RecognitionReport,
    path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string_pretty(report)?;
    match path {
        Some(path) => {
            fs::write(path, json)?;
            log::info!("Report written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn parse_addition(value: &str) -> Result<(String, PathBuf), String> {
    let (name, path) = value
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=PATH, got '{value}'"))?;
    let name = name.trim();
    if name.is_empty() || path.is_empty() {
        return Err(format!("expected NAME=PATH, got '{value}'"));
    }
    Ok((name.to_string(), PathBuf::from(path)))
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading model... {pct}%");
        if downloaded >= total {
            eprintln!();
        }
    } else {
        eprint!("\rDownloading model... {downloaded} bytes");
    }
}
