//! Model loader.
//!
//! Loads the configured model once, in the background, and reports the outcome
//! as an event. There is no retry; a failed load stays failed until restart.
use std::{
    fs::File,
    io::Cursor,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{anyhow, bail, Context, Result};
use reqwest::{Client, Url};
use tokio::task::JoinHandle;

use crate::{
    config::{ModelConfig, Variant},
    events::{Event, EventSender},
    nn::{ClassifierModel, InferModel, ModelMetadata, PoseModel},
};

/// Spawn the single load attempt for `config`.
pub fn spawn_model_loader(config: ModelConfig, events: EventSender) -> JoinHandle<()> {
    tokio::spawn(async move {
        let result = load_model(&config).await;
        if let Err(err) = &result {
            log::error!("Failed to load {} model: {err:#}", config.variant);
        }
        events.send(Event::ModelLoaded(result)).await.ok();
    })
}

/// Fetch the model files if needed and build the model.
pub async fn load_model(config: &ModelConfig) -> Result<Arc<dyn InferModel>> {
    let client = Client::new();
    let model_path = resolve_location(&client, &config.model).await?;

    let model: Arc<dyn InferModel> = match config.variant {
        Variant::Classify => {
            let location = config
                .metadata
                .as_deref()
                .ok_or_else(|| anyhow!("classifier needs a metadata file"))?;
            let metadata_path = resolve_location(&client, location).await?;
            let metadata = ModelMetadata::from_path(metadata_path)?;
            let model = tokio::task::spawn_blocking(move || {
                ClassifierModel::new(model_path, metadata)
            })
            .await??;
            Arc::new(model)
        }
        Variant::Pose => {
            let size = config.pose_input_size;
            let model =
                tokio::task::spawn_blocking(move || PoseModel::new(model_path, size)).await??;
            Arc::new(model)
        }
    };

    Ok(model)
}

fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Cache path a remote file is stored under.
fn cache_path(url: &str) -> Result<PathBuf> {
    let cache_dir = dirs::cache_dir()
        .ok_or_else(|| anyhow!("no cache directory available"))?
        .join("snapcam");

    Ok(cache_dir.join(cache_key(url)?))
}

/// Relative path `host[_port]/segments.../file` identifying `url` in the cache.
///
/// The query string is not part of the key.
fn cache_key(url: &str) -> Result<PathBuf> {
    let parsed = Url::parse(url).with_context(|| format!("invalid URL {url}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("no host in {url}"))?;

    let mut key = match parsed.port() {
        Some(port) => PathBuf::from(format!("{host}_{port}")),
        None => PathBuf::from(host),
    };

    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|segments| segments.collect())
        .unwrap_or_default();
    match segments.split_last() {
        Some((file, parents)) if !file.is_empty() => {
            for dir in parents.iter().filter(|dir| !dir.is_empty()) {
                key.push(dir);
            }
            key.push(file);
        }
        _ => bail!("no file name in {url}"),
    }

    Ok(key)
}

/// Map a model location to a local file, downloading remote ones once.
async fn resolve_location(client: &Client, location: &str) -> Result<PathBuf> {
    if !is_remote(location) {
        return Ok(PathBuf::from(location));
    }

    let path = cache_path(location)?;
    if path.exists() {
        log::info!("Using cached {}", path.display());
        return Ok(path);
    }

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    log::info!("Downloading {} to {}", location, path.display());
    download_file(client, location, &path).await?;

    Ok(path)
}

/// Download a file from a URL to a given filepath.
async fn download_file(client: &Client, url: &str, filepath: &Path) -> Result<()> {
    let resp = client.get(url).send().await?.error_for_status()?;
    let mut content = Cursor::new(resp.bytes().await?);

    let mut file = File::create(filepath)
        .with_context(|| format!("failed to create {}", filepath.display()))?;
    std::io::copy(&mut content, &mut file)?;

    Ok(())
}
