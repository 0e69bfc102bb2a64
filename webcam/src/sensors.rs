//! Sensors module.
//!
use anyhow::{anyhow, Context, Result};
use rscam::{Camera, Config, Frame};

pub type CaptureFn = Box<dyn Fn() -> Option<Frame> + Send>;

/// Which device to open and how to configure it.
///
/// Resolution and frame rate are negotiated with the device when left empty.
#[derive(Clone, Debug)]
pub struct CameraSettings {
    pub device: String,
    pub format: String,
    pub resolution: Option<(u32, u32)>,
    pub frame_rate: Option<(u32, u32)>,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            device: "/dev/video0".into(),
            format: "MJPG".into(),
            resolution: None,
            frame_rate: None,
        }
    }
}

/// Open and start the camera, returning a function capturing one frame per call.
pub fn open_capture_fn(settings: &CameraSettings) -> Result<CaptureFn> {
    let mut cam = Camera::new(&settings.device)
        .with_context(|| format!("failed to open camera {}", settings.device))?;
    log_supported_formats(&cam, &settings.format);
    let format = settings.format.as_bytes();

    let resolution = settings
        .resolution
        .map(Ok)
        .unwrap_or_else(|| get_max_resolution(&cam, format))?;

    let frame_rate = settings
        .frame_rate
        .map(Ok)
        .unwrap_or_else(|| get_max_frame_rate(&cam, format, resolution))?;

    log::info!(
        "Using camera {} at {}x{}, interval {}/{}",
        &settings.device,
        resolution.0,
        resolution.1,
        frame_rate.0,
        frame_rate.1
    );

    cam.start(&Config {
        interval: frame_rate,
        resolution,
        format,
        ..Default::default()
    })
    .map_err(|err| anyhow!("failed to start camera {}: {err}", settings.device))?;

    let callback = move || match cam.capture() {
        Ok(frame) => Some(frame),
        Err(err) => {
            log::warn!("Frame capture failed: {err}");
            None
        }
    };
    Ok(Box::new(callback))
}

/// Get the maximum supported resolution for the given format.
fn get_max_resolution(cam: &Camera, format: &[u8]) -> Result<(u32, u32)> {
    let resolution_info = cam.resolutions(format)?;
    log::debug!("Found resolutions: {:?}", &resolution_info);
    match resolution_info {
        rscam::ResolutionInfo::Discretes(resolutions) => resolutions
            .iter()
            .max_by_key(|res| res.0 * res.1)
            .copied(),
        rscam::ResolutionInfo::Stepwise { max, .. } => Some(max),
    }
    .ok_or_else(|| anyhow!("no resolution found"))
}

/// Get the maximum supported frame rate for the given format and resolution.
///
/// Intervals are `(numerator, denominator)` in seconds, so the highest rate has
/// the smallest interval.
fn get_max_frame_rate(cam: &Camera, format: &[u8], resolution: (u32, u32)) -> Result<(u32, u32)> {
    let interval_info = cam.intervals(format, resolution)?;
    log::debug!("Found frame rates: {:?}", &interval_info);
    match interval_info {
        rscam::IntervalInfo::Discretes(intervals) => intervals
            .iter()
            .filter(|(num, _)| *num > 0)
            .max_by(|a, b| {
                let rate_a = a.1 as f32 / a.0 as f32;
                let rate_b = b.1 as f32 / b.0 as f32;
                rate_a.total_cmp(&rate_b)
            })
            .copied(),
        rscam::IntervalInfo::Stepwise { min, .. } => Some(min),
    }
    .ok_or_else(|| anyhow!("no frame rate found"))
}

fn log_supported_formats(cam: &Camera, format: &str) {
    let formats: Vec<_> = cam.formats().filter_map(|fmt| fmt.ok()).collect();
    log::debug!(
        "Supported formats: {:?}, using format {:?}",
        formats,
        format
    );
}
