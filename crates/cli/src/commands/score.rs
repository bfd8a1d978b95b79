//! Score command - score one post

use anyhow::{Context, Result};

use crate::args::ScoreArgs;
use crate::commands::{close_face, open_face};
use crate::config::AppConfig;

pub async fn execute(args: ScoreArgs, config: &AppConfig) -> Result<()> {
    let face = open_face(config).await?;

    let result = face
        .score(args.id)
        .await
        .with_context(|| format!("Failed to score post {}", args.id));
    let score = close_face(&face, None, result).await?;

    println!("{}", score);
    Ok(())
}
