//! Capture demo binary.
//!
use std::{net::SocketAddr, time::Duration};

use anyhow::{bail, Result};
use clap::Parser;
use env_logger::TimestampPrecision;
use snapcam::{
    config::{Config, ModelConfig, Variant},
    server::serve,
};
use webcam::CameraSettings;

#[derive(Parser, Debug)]
#[clap(author, version)]
struct Args {
    /// Address to serve the page on
    #[clap(long, default_value = "127.0.0.1:3000")]
    server_address: String,

    /// Video device to capture from
    #[clap(long, default_value = "/dev/video0")]
    device: String,

    /// Pixel format requested from the camera
    #[clap(long, default_value = "MJPG")]
    format: String,

    /// Camera resolution as WIDTHxHEIGHT, largest supported if not set
    #[clap(long, value_parser = parse_pair::<'x'>)]
    resolution: Option<(u32, u32)>,

    /// Frame interval as NUM/DEN seconds, fastest supported if not set
    #[clap(long, value_parser = parse_pair::<'/'>)]
    frame_interval: Option<(u32, u32)>,

    /// Kind of model to run on the capture
    #[clap(long, value_enum, default_value_t = Variant::Classify)]
    variant: Variant,

    /// ONNX model, local path or http(s) URL
    #[clap(long, default_value = "./model.onnx")]
    model: String,

    /// Classifier metadata with the labels, local path or http(s) URL
    #[clap(long, default_value = "./metadata.json")]
    metadata: String,

    /// Input edge length of the pose model
    #[clap(long, default_value_t = 192)]
    pose_input_size: u32,

    /// Countdown before the capture in milliseconds
    #[clap(long, default_value_t = 3000)]
    countdown_ms: u64,

    /// Progress indicator interval in milliseconds
    #[clap(long, default_value_t = 30)]
    tick_ms: u64,

    /// Give up on a single inference after this many milliseconds
    #[clap(long, default_value_t = 10_000)]
    infer_timeout_ms: u64,

    /// Minimum score for a keypoint to be drawn (exclusive)
    #[clap(long, default_value_t = 0.5)]
    score_threshold: f32,

    /// Radius of keypoint markers in pixels
    #[clap(long, default_value_t = 5)]
    marker_radius: i32,
}

impl Args {
    fn config(&self) -> Result<Config> {
        if self.tick_ms == 0 {
            bail!("tick interval must be positive");
        }

        let metadata = match self.variant {
            Variant::Classify => Some(self.metadata.clone()),
            Variant::Pose => None,
        };

        Ok(Config {
            model: ModelConfig {
                variant: self.variant,
                model: self.model.clone(),
                metadata,
                pose_input_size: self.pose_input_size,
            },
            countdown: Duration::from_millis(self.countdown_ms),
            tick: Duration::from_millis(self.tick_ms),
            infer_timeout: Duration::from_millis(self.infer_timeout_ms),
            score_threshold: self.score_threshold,
            marker_radius: self.marker_radius,
            ..Default::default()
        })
    }

    fn camera(&self) -> CameraSettings {
        CameraSettings {
            device: self.device.clone(),
            format: self.format.clone(),
            resolution: self.resolution,
            frame_rate: self.frame_interval,
        }
    }
}

/// Parse two numbers separated by `SEP`, e.g. `1280x720`.
fn parse_pair<const SEP: char>(value: &str) -> Result<(u32, u32), String> {
    let (a, b) = value
        .split_once(SEP)
        .ok_or_else(|| format!("expected two numbers separated by '{}'", SEP))?;
    let a = a.trim().parse().map_err(|err| format!("{a}: {err}"))?;
    let b = b.trim().parse().map_err(|err| format!("{b}: {err}"))?;
    Ok((a, b))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logger
    env_logger::builder()
        .format_timestamp(Some(TimestampPrecision::Millis))
        .init();

    let config = args.config()?;
    log::info!(
        "Starting {} demo with model {}",
        config.model.variant,
        &config.model.model
    );

    let addr: SocketAddr = args.server_address.parse()?;
    serve(config, args.camera(), addr).await
}
