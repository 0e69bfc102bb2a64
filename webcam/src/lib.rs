//! Camera access for the capture demo.
//!
//! `sensors` talks to the V4L2 device, `feed` runs it on a dedicated thread and
//! publishes the latest MJPEG frame.
pub mod feed;
pub mod sensors;

pub use feed::{spawn_feed, LiveFeed};
pub use sensors::CameraSettings;
