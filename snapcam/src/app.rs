//! Application state and the capture cycle.
//!
//! `App` owns the model handle, the camera, the captured frame, the countdown
//! and the render surface. It runs as a single task: events and countdown steps
//! are handled one at a time, to completion, so a cycle always goes
//! countdown → capture → inference → render.
use std::{fmt, sync::Arc};

use common::inference::InferOutput;
use image::RgbImage;
use tokio::sync::mpsc::WeakSender;

use crate::{
    capture::capture_frame,
    config::Config,
    countdown::{next_step, Countdown, CountdownStep},
    events::{Event, EventReceiver, EventSender, UiEvent},
    inferer::{run_inference, InferError, RunTracker},
    nn::InferModel,
    render::{draw_keypoints, prediction_text, top_prediction},
    source::CameraSource,
    status,
    surface::RenderSurface,
};

/// Lifecycle of the model handle.
pub enum ModelState {
    Unloaded,
    Loading,
    Ready(Arc<dyn InferModel>),
    Failed,
}

impl fmt::Debug for ModelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelState::Unloaded => write!(f, "Unloaded"),
            ModelState::Loading => write!(f, "Loading"),
            ModelState::Ready(_) => write!(f, "Ready"),
            ModelState::Failed => write!(f, "Failed"),
        }
    }
}

/// Phase of the capture cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    CountingDown,
    Capturing,
    Inferring,
    Rendering,
    Error,
}

impl Phase {
    /// A cycle is in flight; new captures are ignored.
    pub fn is_busy(self) -> bool {
        !matches!(self, Phase::Idle | Phase::Error)
    }

    pub fn can_transition_to(self, next: Phase) -> bool {
        use Phase::*;

        matches!(
            (self, next),
            (Idle | Error, CountingDown)
                | (CountingDown, Capturing)
                | (Capturing, Inferring)
                | (Capturing, Error)
                | (Inferring, Rendering)
                | (Inferring, Error)
                | (Rendering, Idle)
                | (Rendering, Error)
        )
    }
}

pub struct App<S> {
    config: Config,
    camera: Arc<dyn CameraSource>,
    surface: S,
    model: ModelState,
    phase: Phase,
    countdown: Option<Countdown>,
    frame: Arc<RgbImage>,
    cycle: u64,
    runs: RunTracker,
    /// Weak so the loop in `run` ends once every outside sender is gone.
    events_tx: WeakSender<Event>,
}

impl<S: RenderSurface> App<S> {
    /// `events_tx` must feed the receiver later passed to `run`. The application
    /// keeps only a weak handle on it.
    pub fn new(
        config: Config,
        camera: Arc<dyn CameraSource>,
        surface: S,
        events_tx: EventSender,
    ) -> Self {
        Self {
            config,
            camera,
            surface,
            model: ModelState::Unloaded,
            phase: Phase::Idle,
            countdown: None,
            frame: Arc::new(RgbImage::new(0, 0)),
            cycle: 0,
            runs: RunTracker::default(),
            events_tx: events_tx.downgrade(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn model_state(&self) -> &ModelState {
        &self.model
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Mark the model as being loaded; the outcome arrives as `Event::ModelLoaded`.
    pub fn model_loading(&mut self) {
        self.model = ModelState::Loading;
        self.surface.set_status(status::MODEL_LOADING);
    }

    /// Handle events and countdown steps until every event sender is gone.
    ///
    /// Inference tasks in flight hold a sender, so their result is still
    /// delivered before the loop ends.
    pub async fn run(mut self, mut events_rx: EventReceiver) {
        loop {
            tokio::select! {
                event = events_rx.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
                step = next_step(&mut self.countdown) => self.handle_step(step),
            }
        }

        log::info!("Event channel closed, application stopped");
    }

    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Ui(UiEvent::Capture) => self.on_capture(),
            Event::Ui(UiEvent::Slider(value)) => log::info!("Slider value: {value}"),
            Event::ModelLoaded(result) => self.on_model_loaded(result),
            Event::CameraStarted => log::info!("Camera streaming"),
            Event::CameraFailed(err) => {
                log::error!("Failed to access the camera: {err:#}");
                self.surface.alert(status::CAMERA_FAILED);
            }
            Event::InferenceDone { cycle, outcome } => self.on_inference_done(cycle, outcome),
        }
    }

    pub fn handle_step(&mut self, step: CountdownStep) {
        match step {
            CountdownStep::Tick(value) => self.surface.set_progress(value),
            CountdownStep::Expired => self.on_expired(),
        }
    }

    fn transition(&mut self, next: Phase) {
        if !self.phase.can_transition_to(next) {
            log::warn!("Unexpected transition {:?} -> {:?}", self.phase, next);
        }
        log::debug!("Phase {:?} -> {:?}", self.phase, next);
        self.phase = next;
    }

    fn on_model_loaded(&mut self, result: anyhow::Result<Arc<dyn InferModel>>) {
        let text = match result {
            Ok(model) => {
                self.model = ModelState::Ready(model);
                status::MODEL_READY
            }
            Err(_) => {
                self.model = ModelState::Failed;
                status::MODEL_FAILED
            }
        };

        // A running cycle owns the status line.
        if !self.phase.is_busy() {
            self.surface.set_status(text);
        }
    }

    fn on_capture(&mut self) {
        if self.phase.is_busy() {
            log::info!("Capture ignored, cycle in {:?}", self.phase);
            return;
        }

        self.reset();

        self.cycle += 1;
        self.transition(Phase::CountingDown);
        self.surface.set_status(&status::countdown(self.config.countdown));
        self.countdown = Some(Countdown::start(
            self.config.countdown,
            self.config.tick,
            self.config.progress_max,
        ));
    }

    /// Clear what the previous cycle displayed.
    fn reset(&mut self) {
        self.surface.set_status("");
        self.surface.set_progress(0);
        self.surface.set_result(None);
        self.surface.canvas_mut().clear();
        self.surface.present();
    }

    fn on_expired(&mut self) {
        self.countdown = None;

        self.transition(Phase::Capturing);
        self.frame = capture_frame(self.camera.as_ref(), self.surface.canvas_mut());
        self.surface.present();

        let model = match &self.model {
            ModelState::Ready(model) => Arc::clone(model),
            state => {
                log::warn!("Capture {} without a model ({:?})", self.cycle, state);
                self.surface.set_status(status::MODEL_NOT_READY);
                self.transition(Phase::Error);
                return;
            }
        };

        let Some(events_tx) = self.events_tx.upgrade() else {
            log::info!("Application stopping, capture {} not processed", self.cycle);
            self.transition(Phase::Error);
            return;
        };

        self.transition(Phase::Inferring);
        self.surface.set_status(status::INFERRING);

        let cycle = self.cycle;
        let frame = Arc::clone(&self.frame);
        let limit = self.config.infer_timeout;
        let runs = self.runs.clone();
        tokio::spawn(async move {
            let outcome = run_inference(model, frame, limit, runs).await;
            events_tx
                .send(Event::InferenceDone { cycle, outcome })
                .await
                .ok();
        });
    }

    fn on_inference_done(&mut self, cycle: u64, outcome: Result<InferOutput, InferError>) {
        if cycle != self.cycle || self.phase != Phase::Inferring {
            log::warn!("Dropping stale result of capture {cycle}");
            return;
        }

        match outcome {
            Ok(output) => {
                self.transition(Phase::Rendering);
                self.render(output);
            }
            Err(err) => {
                log::error!("Error processing capture {cycle}: {err}");
                let text = match err {
                    InferError::Timeout(_) => status::INFER_TIMEOUT,
                    InferError::Failed(_) => status::INFER_FAILED,
                    InferError::Busy => status::INFER_BUSY,
                };
                self.surface.set_status(text);
                self.transition(Phase::Error);
            }
        }
    }

    fn render(&mut self, output: InferOutput) {
        self.surface.set_result(Some(output.clone()));

        match output {
            InferOutput::Classes(predictions) => match top_prediction(&predictions) {
                Some(top) => {
                    log::info!(
                        "Capture {}: {} ({:.4})",
                        self.cycle,
                        top.class_name,
                        top.probability
                    );
                    self.surface.set_status(&prediction_text(top));
                    self.transition(Phase::Idle);
                }
                None => {
                    log::error!("Capture {}: model returned no classes", self.cycle);
                    self.surface.set_status(status::INFER_FAILED);
                    self.transition(Phase::Error);
                }
            },
            InferOutput::Pose(keypoints) => {
                let drawn = draw_keypoints(
                    self.surface.canvas_mut(),
                    &self.frame,
                    &keypoints,
                    self.config.score_threshold,
                    self.config.marker_radius,
                );
                self.surface.present();
                log::info!(
                    "Capture {}: {drawn} of {} keypoints drawn",
                    self.cycle,
                    keypoints.len()
                );
                self.surface.set_status(&status::pose_summary(drawn));
                self.transition(Phase::Idle);
            }
        }
    }
}
