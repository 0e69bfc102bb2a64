//! Camera seen from the application.
//!
use image::RgbImage;
use webcam::LiveFeed;

/// Source of the current video frame.
pub trait CameraSource: Send + Sync {
    /// Current frame of the live stream, `None` if there is none.
    fn current_frame(&self) -> Option<RgbImage>;
}

impl CameraSource for LiveFeed {
    fn current_frame(&self) -> Option<RgbImage> {
        let jpeg = self.latest()?;
        match turbojpeg::decompress_image(&jpeg) {
            Ok(image) => Some(image),
            Err(err) => {
                log::warn!("Failed to decode camera frame: {err}");
                None
            }
        }
    }
}
