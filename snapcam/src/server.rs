//! Wiring of camera, model loader, application task and HTTP server.
//!
use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use tokio::{sync::oneshot, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use webcam::{spawn_feed, CameraSettings};

use crate::{
    app::App,
    config::Config,
    endpoints,
    events::{event_channel, Event, EventSender, InputSource},
    loader::spawn_model_loader,
    surface::WebSurface,
};

/// Time the application gets to finish a running inference after shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Start everything and serve the page on `addr` until Ctrl-C.
pub async fn serve(config: Config, camera: CameraSettings, addr: SocketAddr) -> Result<()> {
    let cancel = CancellationToken::new();
    let (events_tx, events_rx) = event_channel();
    let (surface, snapshot) = WebSurface::new();

    // Camera and model start independently of each other
    let (feed, camera_ready) = spawn_feed(camera, cancel.clone())?;
    spawn_camera_watch(camera_ready, events_tx.clone());

    let mut app = App::new(
        config.clone(),
        Arc::new(feed.clone()),
        surface,
        events_tx.clone(),
    );
    app.model_loading();
    spawn_model_loader(config.model, events_tx.clone());
    let mut app_handle = tokio::spawn(app.run(events_rx));

    let router = endpoints::router(InputSource::new(events_tx), snapshot, feed);

    log::info!("Serving on http://{addr}");
    let served = axum::Server::bind(&addr)
        .serve(router.into_make_service())
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await;
    cancel.cancel();

    // The router is gone now; the loop ends once loader and camera watch are done.
    if tokio::time::timeout(SHUTDOWN_GRACE, &mut app_handle)
        .await
        .is_err()
    {
        log::warn!("Application did not stop within {SHUTDOWN_GRACE:?}, aborting");
        app_handle.abort();
    }

    Ok(served?)
}

/// Forward the outcome of the camera start to the application.
fn spawn_camera_watch(
    ready: oneshot::Receiver<Result<()>>,
    events: EventSender,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let event = match ready.await {
            Ok(Ok(())) => Event::CameraStarted,
            Ok(Err(err)) => Event::CameraFailed(err),
            Err(_) => Event::CameraFailed(anyhow!("camera thread ended before starting")),
        };
        events.send(event).await.ok();
    })
}

async fn shutdown_signal(cancel: CancellationToken) {
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            if let Err(err) = res {
                log::error!("Failed to listen for Ctrl-C: {err}");
            }
            log::info!("Shutting down");
            // Stops the camera thread, which ends open MJPEG streams.
            cancel.cancel();
        }
        _ = cancel.cancelled() => {}
    }
}
