pub const YOLO_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const YOLO_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

pub const DEFAULT_FACE_DETECT_THRESHOLD: f64 = 0.5;
pub const DEFAULT_CHANGE_SCENE_THRESHOLD: f64 = 0.5;

/// Side length both frames are downscaled to before scene comparison.
pub const SCENE_COMPARE_SIZE: usize = 100;

pub const DEFAULT_OUTPUT_DIR: &str = "./output";

/// Seconds to wait for an encoder/decoder handle to close.
pub const DEFAULT_RELEASE_TIMEOUT_SECS: u64 = 30;

/// Frames between "processed N frames" log lines and counter updates.
pub const PROGRESS_INTERVAL_FRAMES: usize = 100;

pub const KEY_PROCESS_FRAME: &str = "#process.frame";
pub const KEY_PROCESS_TOTAL_FRAMES: &str = "#process.total_frames";
pub const KEY_PROCESS_FRAGMENTS: &str = "#process.fragments";

pub const KEY_TOTAL_COUNT: &str = "total.count";
pub const KEY_TOTAL_PROCESSED: &str = "total.processed";
pub const KEY_TOTAL_FRAGMENTS_DONE: &str = "total.fragments_done";
