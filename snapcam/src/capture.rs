//! Frame capturer.
//!
use std::sync::Arc;

use image::RgbImage;

use crate::{canvas::Canvas, source::CameraSource};

/// Copy the camera's current frame into the canvas.
///
/// The canvas takes the frame's size. Without a frame, both the returned image
/// and the canvas are zero-sized.
pub fn capture_frame(camera: &dyn CameraSource, canvas: &mut Canvas) -> Arc<RgbImage> {
    let frame = camera
        .current_frame()
        .unwrap_or_else(|| RgbImage::new(0, 0));

    canvas.resize(frame.width(), frame.height());
    canvas.draw_image(&frame);
    log::debug!("Captured {}x{} frame", frame.width(), frame.height());

    Arc::new(frame)
}
