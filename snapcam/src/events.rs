//! Events driving the application.
//!
//! Everything that happens outside the application task (user input, model
//! loading, camera start, finished inference) reaches it as an `Event` over a
//! single channel, so its state is only ever touched from that task.
use std::sync::Arc;

use anyhow::Result;
use common::inference::InferOutput;
use tokio::sync::mpsc;

use crate::{inferer::InferError, nn::InferModel};

/// Capacity of the event channel.
pub const EVENT_CHANNEL_SIZE: usize = 20;

/// Input from the page controls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiEvent {
    Capture,
    Slider(u8),
}

pub enum Event {
    Ui(UiEvent),
    ModelLoaded(Result<Arc<dyn InferModel>>),
    CameraStarted,
    CameraFailed(anyhow::Error),
    InferenceDone {
        cycle: u64,
        outcome: Result<InferOutput, InferError>,
    },
}

pub type EventSender = mpsc::Sender<Event>;
pub type EventReceiver = mpsc::Receiver<Event>;

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::channel(EVENT_CHANNEL_SIZE)
}

/// Handle on the page controls given to the HTTP endpoints.
#[derive(Clone)]
pub struct InputSource {
    tx: EventSender,
}

impl InputSource {
    pub fn new(tx: EventSender) -> Self {
        Self { tx }
    }

    /// Capture button pressed.
    pub async fn capture(&self) -> Result<()> {
        self.send(UiEvent::Capture).await
    }

    /// Slider moved to `value`.
    pub async fn slider(&self, value: u8) -> Result<()> {
        self.send(UiEvent::Slider(value)).await
    }

    async fn send(&self, event: UiEvent) -> Result<()> {
        self.tx
            .send(Event::Ui(event))
            .await
            .map_err(|_| anyhow::anyhow!("application stopped"))
    }
}
