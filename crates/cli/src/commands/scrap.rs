//! Scrap command - stream past posts with their scores

use anyhow::{Context, Result};
use futures::StreamExt;
use reddit_face_domain::Face;

use crate::args::ScrapArgs;
use crate::commands::{close_face, open_face};
use crate::config::AppConfig;

pub async fn execute(args: ScrapArgs, config: &AppConfig) -> Result<()> {
    let face = open_face(config).await?;
    let result = scrap(&face, &args).await;
    let count = close_face(&face, None, result).await?;

    tracing::info!(count, "Scrap complete");
    Ok(())
}

/// Print posts as they arrive; returns how many were printed
async fn scrap(face: &Face, args: &ScrapArgs) -> Result<usize> {
    let mut stream = face.scrap(args.limit, args.before, args.after);
    let mut count = 0;

    while let Some(item) = stream.next().await {
        let post = item.context("Scraping failed")?;

        if args.json {
            let json = serde_json::to_string(&post).context("Failed to serialize output")?;
            println!("{}", json);
        } else {
            println!("{}\t{:.3}\t{}", post.id, post.score, post.content);
        }
        count += 1;
    }

    Ok(count)
}
