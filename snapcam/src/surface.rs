//! Display side of the application.
//!
//! The application only talks to a `RenderSurface`. `WebSurface` publishes
//! every change as a snapshot the HTTP endpoints read from.
use std::sync::Arc;

use common::inference::InferOutput;
use image::RgbImage;
use serde::Serialize;
use tokio::sync::watch;

use crate::canvas::Canvas;

/// Drawing and text capabilities handed to the application.
pub trait RenderSurface: Send {
    /// Overwrite the status text.
    fn set_status(&mut self, text: &str);

    /// Move the progress indicator.
    fn set_progress(&mut self, value: u8);

    /// Raise a blocking notice for the user.
    fn alert(&mut self, message: &str);

    /// Keep the raw output of the last inference, `None` to forget it.
    fn set_result(&mut self, result: Option<InferOutput>);

    fn canvas_mut(&mut self) -> &mut Canvas;

    /// Publish the canvas after drawing.
    fn present(&mut self);
}

/// Alert raised on the page, numbered so every alert is shown exactly once.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Alert {
    pub seq: u64,
    pub message: String,
}

/// Everything the page shows.
#[derive(Clone, Debug, Default)]
pub struct UiSnapshot {
    pub status: String,
    pub progress: u8,
    pub alert: Option<Alert>,
    pub result: Option<InferOutput>,
    pub canvas_version: u64,
    /// `None` while the canvas is blank.
    pub canvas: Option<Arc<RgbImage>>,
}

/// Serializable part of the snapshot.
#[derive(Debug, Serialize)]
pub struct UiState {
    pub status: String,
    pub progress: u8,
    pub canvas_version: u64,
    pub alert: Option<Alert>,
    pub result: Option<InferOutput>,
}

impl From<&UiSnapshot> for UiState {
    fn from(snapshot: &UiSnapshot) -> Self {
        Self {
            status: snapshot.status.clone(),
            progress: snapshot.progress,
            canvas_version: snapshot.canvas_version,
            alert: snapshot.alert.clone(),
            result: snapshot.result.clone(),
        }
    }
}

pub type SnapshotReceiver = watch::Receiver<UiSnapshot>;

pub struct WebSurface {
    canvas: Canvas,
    tx: watch::Sender<UiSnapshot>,
}

impl WebSurface {
    pub fn new() -> (Self, SnapshotReceiver) {
        let (tx, rx) = watch::channel(UiSnapshot::default());
        let surface = Self {
            canvas: Canvas::new(),
            tx,
        };
        (surface, rx)
    }
}

impl RenderSurface for WebSurface {
    fn set_status(&mut self, text: &str) {
        self.tx.send_modify(|snapshot| {
            snapshot.status.clear();
            snapshot.status.push_str(text);
        });
    }

    fn set_progress(&mut self, value: u8) {
        self.tx.send_if_modified(|snapshot| {
            let changed = snapshot.progress != value;
            snapshot.progress = value;
            changed
        });
    }

    fn alert(&mut self, message: &str) {
        self.tx.send_modify(|snapshot| {
            let seq = snapshot.alert.as_ref().map_or(1, |alert| alert.seq + 1);
            snapshot.alert = Some(Alert {
                seq,
                message: message.to_owned(),
            });
        });
    }

    fn set_result(&mut self, result: Option<InferOutput>) {
        self.tx.send_modify(|snapshot| snapshot.result = result);
    }

    fn canvas_mut(&mut self) -> &mut Canvas {
        &mut self.canvas
    }

    fn present(&mut self) {
        let image = match self.canvas.is_blank() {
            true => None,
            false => Some(Arc::new(self.canvas.image().clone())),
        };
        self.tx.send_modify(|snapshot| {
            snapshot.canvas = image;
            snapshot.canvas_version += 1;
        });
    }
}

#[cfg(test)]
mod test {

    use common::inference::{Keypoint, Prediction};
    use image::Rgb;

    use super::*;

    #[test]
    fn status_is_overwritten() {
        let (mut surface, rx) = WebSurface::new();
        surface.set_status("first");
        surface.set_status("second");

        assert_eq!(rx.borrow().status, "second");
    }

    #[test]
    fn alerts_are_numbered() {
        let (mut surface, rx) = WebSurface::new();
        surface.alert("one");
        assert_eq!(rx.borrow().alert.as_ref().map(|a| a.seq), Some(1));

        surface.alert("two");
        let alert = rx.borrow().alert.clone();
        assert_eq!(
            alert,
            Some(Alert {
                seq: 2,
                message: "two".into()
            })
        );
    }

    #[test]
    fn present_publishes_canvas_until_cleared() {
        let (mut surface, rx) = WebSurface::new();
        surface.canvas_mut().resize(2, 2);
        surface
            .canvas_mut()
            .draw_image(&RgbImage::from_pixel(2, 2, Rgb([1, 2, 3])));
        surface.present();

        {
            let snapshot = rx.borrow();
            assert_eq!(snapshot.canvas_version, 1);
            let image = snapshot.canvas.as_ref().expect("canvas published");
            assert_eq!(image.get_pixel(0, 0), &Rgb([1, 2, 3]));
        }

        surface.canvas_mut().clear();
        surface.present();

        let snapshot = rx.borrow();
        assert_eq!(snapshot.canvas_version, 2);
        assert!(snapshot.canvas.is_none());
    }

    #[test]
    fn state_view_skips_pixels() -> Result<(), serde_json::Error> {
        let (mut surface, rx) = WebSurface::new();
        surface.set_status("listo");
        surface.set_progress(42);

        let state = UiState::from(&*rx.borrow());
        let json = serde_json::to_value(&state)?;

        assert_eq!(json["status"], "listo");
        assert_eq!(json["progress"], 42);
        assert!(json["alert"].is_null());
        assert!(json["result"].is_null());
        assert!(json.get("canvas").is_none());

        Ok(())
    }

    #[test]
    fn state_view_carries_last_result() -> Result<(), serde_json::Error> {
        let (mut surface, rx) = WebSurface::new();
        surface.set_result(Some(InferOutput::Classes(vec![Prediction::new(
            "Gato", 0.75,
        )])));

        let json = serde_json::to_value(UiState::from(&*rx.borrow()))?;
        assert_eq!(json["result"]["Classes"][0]["className"], "Gato");

        surface.set_result(Some(InferOutput::Pose(vec![Keypoint::new(
            "nose", 3.0, 4.0, 0.9,
        )])));
        let json = serde_json::to_value(UiState::from(&*rx.borrow()))?;
        assert_eq!(json["result"]["Pose"][0]["part"], "nose");
        assert_eq!(json["result"]["Pose"][0]["position"]["y"], 4.0);

        surface.set_result(None);
        assert!(rx.borrow().result.is_none());

        Ok(())
    }
}
