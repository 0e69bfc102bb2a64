//! Turn inference results into something to look at.
//!
use common::inference::{Keypoint, Prediction};
use image::{Rgb, RgbImage};

use crate::canvas::Canvas;

const MARKER_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Entry with the highest probability.
///
/// Scans the whole sequence; on ties the earliest entry is kept.
pub fn top_prediction(predictions: &[Prediction]) -> Option<&Prediction> {
    let mut iter = predictions.iter();
    let first = iter.next()?;
    Some(iter.fold(first, |best, candidate| {
        if candidate.probability > best.probability {
            candidate
        } else {
            best
        }
    }))
}

/// Result line with the confidence rounded half up to two decimals.
pub fn prediction_text(prediction: &Prediction) -> String {
    // `{:.2}` alone rounds exact halves to even, 0.625 would show as 0.62.
    let confidence = (prediction.probability as f64 * 100.0).round() / 100.0;
    format!(
        "Prediction: {}, Confidence: {:.2}",
        prediction.class_name, confidence
    )
}

/// Draw `frame` as background and mark every keypoint scoring above `threshold`.
///
/// Returns the number of markers drawn.
pub fn draw_keypoints(
    canvas: &mut Canvas,
    frame: &RgbImage,
    keypoints: &[Keypoint],
    threshold: f32,
    radius: i32,
) -> usize {
    canvas.draw_image(frame);

    let mut drawn = 0;
    for keypoint in keypoints.iter().filter(|kp| kp.score > threshold) {
        canvas.fill_circle(
            keypoint.position.x,
            keypoint.position.y,
            radius,
            MARKER_COLOR,
        );
        drawn += 1;
    }

    drawn
}
