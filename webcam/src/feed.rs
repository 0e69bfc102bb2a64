//! Live camera feed.
//!
//! The device is opened and read on its own thread since `rscam` blocks on every
//! capture. Only the most recent frame is kept; slow readers skip frames.
use std::{thread, time::Duration};

use anyhow::{Context, Result};
use bytes::Bytes;
use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;

use crate::sensors::{open_capture_fn, CameraSettings};

/// Pause before trying again after a failed capture.
const RETRY_DELAY: Duration = Duration::from_millis(100);

pub type FrameReceiver = watch::Receiver<Option<Bytes>>;

/// Read handle on the latest MJPEG frame of the camera.
///
/// Holds `None` until the first frame arrives, and forever if the camera could
/// not be opened.
#[derive(Clone)]
pub struct LiveFeed {
    rx: FrameReceiver,
}

impl LiveFeed {
    /// Feed that never produces a frame.
    pub fn empty() -> Self {
        let (_tx, rx) = watch::channel(None);
        Self { rx }
    }

    /// Wrap an existing receiver, e.g. one fed from recorded frames.
    pub fn from_receiver(rx: FrameReceiver) -> Self {
        Self { rx }
    }

    /// Latest JPEG encoded frame.
    pub fn latest(&self) -> Option<Bytes> {
        self.rx.borrow().clone()
    }

    /// Receiver notified on every new frame.
    pub fn subscribe(&self) -> FrameReceiver {
        self.rx.clone()
    }
}

/// Start the camera on a dedicated thread.
///
/// Returns the feed right away together with a receiver resolving once the
/// device is either streaming or has failed to open. The thread ends when
/// `cancel` fires or every feed handle is dropped.
pub fn spawn_feed(
    settings: CameraSettings,
    cancel: CancellationToken,
) -> Result<(LiveFeed, oneshot::Receiver<Result<()>>)> {
    let (frame_tx, frame_rx) = watch::channel(None);
    let (ready_tx, ready_rx) = oneshot::channel();

    thread::Builder::new()
        .name("webcam".into())
        .spawn(move || {
            let capture_fn = match open_capture_fn(&settings) {
                Ok(capture_fn) => {
                    ready_tx.send(Ok(())).ok();
                    capture_fn
                }
                Err(err) => {
                    ready_tx.send(Err(err)).ok();
                    return;
                }
            };

            while !cancel.is_cancelled() && !frame_tx.is_closed() {
                match capture_fn() {
                    Some(frame) => {
                        frame_tx.send_replace(Some(Bytes::copy_from_slice(&frame[..])));
                    }
                    None => {
                        log::error!("Unable to capture frame, trying again...");
                        thread::sleep(RETRY_DELAY);
                    }
                }
            }

            log::info!("Camera {} stopped", &settings.device);
        })
        .context("failed to spawn camera thread")?;

    Ok((LiveFeed { rx: frame_rx }, ready_rx))
}
