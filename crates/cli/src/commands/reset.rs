//! Reset command - rebuild state from configuration

use anyhow::{Context, Result};

use crate::commands::{close_face, open_face};
use crate::config::AppConfig;

pub async fn execute(config: &AppConfig) -> Result<()> {
    let face = open_face(config).await?;
    let result = face.reset().await.context("Failed to reset state");
    close_face(&face, Some(config.general.state_dir.as_path()), result).await?;

    println!("State reset to configuration");
    Ok(())
}
