//! Inference pipeline.
//!
//! Runs the model on the blocking pool under a timeout. The input tensor lives
//! entirely inside the model call and is dropped there whether the run succeeds
//! or fails. A run abandoned by the timeout cannot be stopped; it keeps the
//! model marked as running until it returns, and no new run starts meanwhile.
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use common::inference::InferOutput;
use image::RgbImage;
use thiserror::Error;

use crate::nn::InferModel;

#[derive(Debug, Error)]
pub enum InferError {
    #[error("inference failed: {0}")]
    Failed(String),
    #[error("inference timed out after {0:?}")]
    Timeout(Duration),
    #[error("previous inference is still running")]
    Busy,
}

/// Whether a model run is executing on the blocking pool.
#[derive(Clone, Debug, Default)]
pub struct RunTracker(Arc<AtomicBool>);

impl RunTracker {
    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn try_start(&self) -> Option<RunGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard(Arc::clone(&self.0)))
    }
}

/// Clears the running flag when the model call returns or unwinds.
struct RunGuard(Arc<AtomicBool>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Run `model` on `frame`, giving up after `limit`.
pub async fn run_inference(
    model: Arc<dyn InferModel>,
    frame: Arc<RgbImage>,
    limit: Duration,
    runs: RunTracker,
) -> Result<InferOutput, InferError> {
    let guard = runs.try_start().ok_or(InferError::Busy)?;
    let task = tokio::task::spawn_blocking(move || {
        let _guard = guard;
        model.run(&frame)
    });

    match tokio::time::timeout(limit, task).await {
        Err(_) => {
            log::warn!("Abandoning model run after {limit:?}, it keeps running until it returns");
            Err(InferError::Timeout(limit))
        }
        Ok(Err(join_err)) => Err(InferError::Failed(join_err.to_string())),
        Ok(Ok(result)) => result.map_err(|err| InferError::Failed(format!("{err:#}"))),
    }
}
