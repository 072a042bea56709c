pub const FACE_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const FACE_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

pub const EMBEDDING_MODEL_NAME: &str = "w600k_r50.onnx";
pub const EMBEDDING_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/w600k_r50.onnx";

/// Minimum cosine similarity for a probe to count as a known identity.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.55;

/// Only every Nth frame of the tracked stream is identified.
pub const DEFAULT_FRAME_STRIDE: usize = 3;

/// Pixels added around each person box before cropping.
pub const DEFAULT_CROP_MARGIN: u32 = 20;

/// Crops whose shorter side is below this are dropped.
pub const DEFAULT_MIN_CROP_SIDE: u32 = 40;

/// COCO class id of "person".
pub const PERSON_CLASS_ID: u32 = 0;

pub const DEFAULT_DETECTOR_CONFIDENCE: f64 = 0.3;
pub const DEFAULT_DETECTOR_IOU: f64 = 0.5;

/// Max frames a track can be lost before removal (~1 second at 30 fps).
pub const TRACKER_MAX_LOST: usize = 30;

pub const REFERENCE_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

pub const CACHE_FILE_PREFIX: &str = "cache_embeddings_";

pub const TEMP_CROP_FILENAME: &str = "crop.jpg";

/// Platform data directory name used for models, caches and config.
pub const APP_DIR_NAME: &str = "facetrack";
