//! Post command - submit content

use anyhow::{Context, Result};
use reddit_face_domain::{Face, PostedItem};
use serde_json::{Map, Value};

use crate::args::PostArgs;
use crate::commands::{close_face, open_face};
use crate::config::AppConfig;

pub async fn execute(args: PostArgs, config: &AppConfig) -> Result<()> {
    let content = content_from_args(&args)?;

    let face = open_face(config).await?;
    let result = post(&face, &content).await;
    // Restrictions may have recorded the post, so keep their state
    let posted = close_face(&face, Some(config.general.state_dir.as_path()), result).await?;

    if args.json {
        let json = serde_json::to_string_pretty(&posted).context("Failed to serialize output")?;
        println!("{}", json);
    } else {
        println!("Posted {}", posted.id);
        if let Some(url) = &posted.url {
            println!("{}", url);
        }
    }

    Ok(())
}

async fn post(face: &Face, content: &Value) -> Result<PostedItem> {
    face.post(content).await.context("Failed to post")
}

fn content_from_args(args: &PostArgs) -> Result<Value> {
    if let Some(raw) = &args.content {
        return serde_json::from_str(raw).context("Content is not valid JSON");
    }

    let mut content = Map::new();
    if let Some(text) = &args.text {
        content.insert("text".to_string(), Value::String(text.clone()));
    }
    if let Some(image) = &args.image {
        content.insert("image".to_string(), Value::String(image.clone()));
    }

    if content.is_empty() {
        anyhow::bail!("Nothing to post: use --text, --image or --content");
    }

    Ok(Value::Object(content))
}
