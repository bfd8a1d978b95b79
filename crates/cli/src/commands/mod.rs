//! Subcommands
//!
//! Every face command opens the face from the state directory, runs, saves
//! when it changed something and always cleans up.

pub mod config;
pub mod post;
pub mod reset;
pub mod schema;
pub mod score;
pub mod scrap;
pub mod set_strategy;
pub mod strategies;

use anyhow::{Context, Result};
use reddit_face_adapters::builtin_registry;
use reddit_face_adapters::reddit_api::{RedditConnector, StubConnector};
use reddit_face_domain::persistence;
use reddit_face_domain::{Connector, Face};
use std::path::Path;
use std::sync::Arc;

use crate::config::{AppConfig, Backend};

fn build_connector(config: &AppConfig) -> Arc<dyn Connector> {
    match config.reddit.backend {
        Backend::Api => Arc::new(RedditConnector::with_base_urls(
            config.reddit.api_base_url.clone(),
            config.reddit.auth_base_url.clone(),
        )),
        Backend::Stub => Arc::new(StubConnector::sample(&config.reddit.subreddit)),
    }
}

/// Build the face, from saved state when the state directory has a manifest
pub async fn open_face(config: &AppConfig) -> Result<Face> {
    let face = Face::new(
        config.face_config()?,
        Arc::new(builtin_registry()),
        build_connector(config),
    );

    let state_dir = &config.general.state_dir;
    if persistence::manifest_path(state_dir).exists() {
        face.load_saved(state_dir)
            .await
            .with_context(|| format!("Failed to load state from {}", state_dir.display()))?;
    } else {
        face.init()
            .await
            .context("Failed to build state from configuration")?;
    }

    Ok(face)
}

/// Save state to `save_to` if the command succeeded, then release the face.
///
/// The command's own error wins over save or cleanup errors.
pub async fn close_face<T>(face: &Face, save_to: Option<&Path>, result: Result<T>) -> Result<T> {
    let saved = match (&result, save_to) {
        (Ok(_), Some(directory)) => face
            .save(directory)
            .await
            .with_context(|| format!("Failed to save state to {}", directory.display())),
        _ => Ok(()),
    };

    let cleaned = face.cleanup().await.context("Failed to clean up");

    let value = result?;
    saved?;
    cleaned?;
    Ok(value)
}
