//! Schema command - print the accepted content schema

use anyhow::{Context, Result};

use crate::commands::{close_face, open_face};
use crate::config::AppConfig;

pub async fn execute(config: &AppConfig) -> Result<()> {
    let face = open_face(config).await?;
    let result = face.post_schema().await.context("Failed to read post schema");
    let schema = close_face(&face, None, result).await?;

    let json = serde_json::to_string_pretty(&schema).context("Failed to serialize schema")?;
    println!("{}", json);
    Ok(())
}
