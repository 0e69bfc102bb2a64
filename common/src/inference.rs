//! Results produced by running a model on a captured frame.
//!
use serde::Serialize;

/// Probability of a single class.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub class_name: String,
    pub probability: f32,
}

impl Prediction {
    pub fn new(class_name: impl Into<String>, probability: f32) -> Self {
        Self {
            class_name: class_name.into(),
            probability,
        }
    }
}

/// Pixel position in the coordinate frame of the captured image.
///
/// The origin is the top left corner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

/// Scored body keypoint.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Keypoint {
    pub part: String,
    pub position: Position,
    pub score: f32,
}

impl Keypoint {
    pub fn new(part: impl Into<String>, x: f32, y: f32, score: f32) -> Self {
        Self {
            part: part.into(),
            position: Position { x, y },
            score,
        }
    }
}

/// Output of one inference run.
///
/// Classes are in model output order, which carries no ranking.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum InferOutput {
    Classes(Vec<Prediction>),
    Pose(Vec<Keypoint>),
}
