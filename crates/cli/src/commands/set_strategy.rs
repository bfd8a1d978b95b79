//! Set-strategy command - reconfigure one slot

use anyhow::{Context, Result};
use reddit_face_domain::Params;
use serde_json::Value;

use crate::args::SetStrategyArgs;
use crate::commands::{close_face, open_face};
use crate::config::AppConfig;

pub async fn execute(args: SetStrategyArgs, config: &AppConfig) -> Result<()> {
    let params = args.params.as_deref().map(parse_params).transpose()?;

    let face = open_face(config).await?;
    let result = face
        .set_strategy(args.slot, args.category.clone(), params)
        .await
        .with_context(|| format!("Failed to set {} strategy", args.slot));
    close_face(&face, Some(config.general.state_dir.as_path()), result).await?;

    match &args.category {
        Some(category) => println!("{} strategy set to {}", args.slot, category),
        None => println!("{} strategy disabled", args.slot),
    }
    Ok(())
}

fn parse_params(raw: &str) -> Result<Params> {
    match serde_json::from_str(raw).context("Parameters are not valid JSON")? {
        Value::Object(params) => Ok(params),
        _ => anyhow::bail!("Parameters must be a JSON object"),
    }
}
