//! Runtime configuration of the capture cycle and the model.
//!
use std::{fmt, time::Duration};

/// Which kind of model runs on the captured frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Variant {
    /// Image classification, rendered as a text summary.
    Classify,
    /// Single person pose estimation, rendered as keypoint markers.
    Pose,
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Classify => write!(f, "classify"),
            Variant::Pose => write!(f, "pose"),
        }
    }
}

/// Where to find the model files.
///
/// Locations are either local paths or `http(s)://` URLs.
#[derive(Clone, Debug)]
pub struct ModelConfig {
    pub variant: Variant,
    pub model: String,
    /// Class labels and input size of a classifier.
    pub metadata: Option<String>,
    /// Input edge length of the pose model.
    pub pose_input_size: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            variant: Variant::Classify,
            model: "./model.onnx".into(),
            metadata: Some("./metadata.json".into()),
            pose_input_size: 192,
        }
    }
}

/// Timing of the capture cycle and drawing parameters.
#[derive(Clone, Debug)]
pub struct Config {
    pub model: ModelConfig,
    /// Delay between the capture click and the snapshot.
    pub countdown: Duration,
    /// Interval at which the progress indicator advances.
    pub tick: Duration,
    /// Upper bound of the progress indicator.
    pub progress_max: u8,
    /// Upper bound for a single inference call.
    pub infer_timeout: Duration,
    /// Keypoints at or below this score are not drawn.
    pub score_threshold: f32,
    pub marker_radius: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            countdown: Duration::from_millis(3000),
            tick: Duration::from_millis(30),
            progress_max: 100,
            infer_timeout: Duration::from_secs(10),
            score_threshold: 0.5,
            marker_radius: 5,
        }
    }
}
