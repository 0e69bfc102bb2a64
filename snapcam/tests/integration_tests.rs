use std::{sync::Arc, time::Duration};

use anyhow::Result;
use common::inference::{InferOutput, Keypoint, Prediction};
use image::{Rgb, RgbImage};
use tokio::task::JoinHandle;
use snapcam::{
    app::App,
    config::{Config, ModelConfig, Variant},
    events::{event_channel, Event, InputSource},
    loader::spawn_model_loader,
    nn::InferModel,
    source::CameraSource,
    status,
    surface::{SnapshotReceiver, UiSnapshot, WebSurface},
};

struct StillCamera;

impl CameraSource for StillCamera {
    fn current_frame(&self) -> Option<RgbImage> {
        Some(RgbImage::from_pixel(32, 24, Rgb([0, 128, 0])))
    }
}

struct FixedModel {
    output: InferOutput,
    delay: Duration,
}

impl InferModel for FixedModel {
    fn run(&self, _frame: &RgbImage) -> Result<InferOutput> {
        std::thread::sleep(self.delay);
        Ok(self.output.clone())
    }
}

fn fast_config() -> Config {
    Config {
        countdown: Duration::from_millis(90),
        tick: Duration::from_millis(30),
        infer_timeout: Duration::from_secs(2),
        ..Default::default()
    }
}

/// Wait until the published snapshot satisfies `done`.
async fn wait_for(
    rx: &mut SnapshotReceiver,
    done: impl Fn(&UiSnapshot) -> bool,
) -> Result<UiSnapshot> {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            {
                let snapshot = rx.borrow_and_update();
                if done(&snapshot) {
                    return Ok::<_, anyhow::Error>(snapshot.clone());
                }
            }
            rx.changed().await?;
        }
    })
    .await?
}

/// Wait for the application task to end once every sender is dropped.
async fn join(handle: JoinHandle<()>) -> Result<()> {
    tokio::time::timeout(Duration::from_secs(5), handle).await??;
    Ok(())
}

#[tokio::test]
async fn classification_cycle_end_to_end() -> Result<()> {
    let (tx, rx) = event_channel();
    let (surface, mut snapshot) = WebSurface::new();
    let app = App::new(fast_config(), Arc::new(StillCamera), surface, tx.clone());
    let handle = tokio::spawn(app.run(rx));

    let model = FixedModel {
        output: InferOutput::Classes(vec![
            Prediction::new("cat", 0.12),
            Prediction::new("dog", 0.88),
        ]),
        delay: Duration::ZERO,
    };
    tx.send(Event::ModelLoaded(Ok(Arc::new(model)))).await?;
    wait_for(&mut snapshot, |s| s.status == status::MODEL_READY).await?;

    let input = InputSource::new(tx);
    input.capture().await?;
    wait_for(&mut snapshot, |s| s.status.starts_with("Capturando")).await?;

    let done = wait_for(&mut snapshot, |s| s.status.starts_with("Prediction")).await?;
    assert_eq!(done.status, "Prediction: dog, Confidence: 0.88");
    // 90 ms at 30 ms per tick never gets near the cap.
    assert!((1..=3).contains(&done.progress));

    let canvas = done.canvas.expect("captured frame on canvas");
    assert_eq!(canvas.dimensions(), (32, 24));
    assert_eq!(canvas.get_pixel(5, 5), &Rgb([0, 128, 0]));

    assert!(matches!(done.result, Some(InferOutput::Classes(p)) if p.len() == 2));

    drop(input);
    join(handle).await
}

#[tokio::test]
async fn pose_cycle_end_to_end() -> Result<()> {
    let (tx, rx) = event_channel();
    let (surface, mut snapshot) = WebSurface::new();
    let app = App::new(fast_config(), Arc::new(StillCamera), surface, tx.clone());
    let handle = tokio::spawn(app.run(rx));

    let model = FixedModel {
        output: InferOutput::Pose(vec![
            Keypoint::new("nose", 16.0, 12.0, 0.9),
            Keypoint::new("leftEar", 2.0, 2.0, 0.1),
        ]),
        delay: Duration::ZERO,
    };
    tx.send(Event::ModelLoaded(Ok(Arc::new(model)))).await?;
    InputSource::new(tx).capture().await?;

    let done = wait_for(&mut snapshot, |s| s.status.starts_with("Pose")).await?;
    assert_eq!(done.status, status::pose_summary(1));

    let canvas = done.canvas.expect("rendered canvas");
    assert_eq!(canvas.get_pixel(16, 12), &Rgb([255, 0, 0]));
    assert_eq!(canvas.get_pixel(2, 2), &Rgb([0, 128, 0]));

    join(handle).await
}

#[tokio::test]
async fn slow_model_times_out() -> Result<()> {
    let (tx, rx) = event_channel();
    let (surface, mut snapshot) = WebSurface::new();
    let config = Config {
        infer_timeout: Duration::from_millis(50),
        ..fast_config()
    };
    let app = App::new(config, Arc::new(StillCamera), surface, tx.clone());
    let handle = tokio::spawn(app.run(rx));

    let model = FixedModel {
        output: InferOutput::Classes(vec![Prediction::new("late", 1.0)]),
        delay: Duration::from_millis(500),
    };
    tx.send(Event::ModelLoaded(Ok(Arc::new(model)))).await?;
    InputSource::new(tx.clone()).capture().await?;

    let done = wait_for(&mut snapshot, |s| s.status == status::INFER_TIMEOUT).await?;
    // The frame stays visible after the failure.
    assert!(done.canvas.is_some());

    // A new cycle can start right away, but the abandoned run still holds the model.
    let input = InputSource::new(tx);
    input.capture().await?;
    wait_for(&mut snapshot, |s| s.status.starts_with("Capturando")).await?;
    wait_for(&mut snapshot, |s| s.status == status::INFER_BUSY).await?;

    // Once it returns the model runs again, and times out again.
    tokio::time::sleep(Duration::from_millis(500)).await;
    input.capture().await?;
    wait_for(&mut snapshot, |s| s.status.starts_with("Capturando")).await?;
    wait_for(&mut snapshot, |s| s.status == status::INFER_TIMEOUT).await?;

    drop(input);

    join(handle).await
}

#[tokio::test]
async fn missing_model_file_blocks_inference() -> Result<()> {
    let (tx, rx) = event_channel();
    let (surface, mut snapshot) = WebSurface::new();
    let mut app = App::new(fast_config(), Arc::new(StillCamera), surface, tx.clone());
    app.model_loading();
    assert_eq!(snapshot.borrow().status, status::MODEL_LOADING);

    let model = ModelConfig {
        variant: Variant::Pose,
        model: "./does-not-exist.onnx".into(),
        metadata: None,
        pose_input_size: 192,
    };
    spawn_model_loader(model, tx.clone());
    let handle = tokio::spawn(app.run(rx));

    wait_for(&mut snapshot, |s| s.status == status::MODEL_FAILED).await?;

    InputSource::new(tx).capture().await?;
    let done = wait_for(&mut snapshot, |s| s.status == status::MODEL_NOT_READY).await?;
    assert_eq!(done.status, "El modelo de IA no está cargado.");
    assert!(done.canvas.is_some());

    join(handle).await
}
