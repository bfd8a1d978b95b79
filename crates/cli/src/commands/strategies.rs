//! Strategies command - show active strategies

use anyhow::{Context, Result};
use reddit_face_domain::Slot;

use crate::args::StrategiesArgs;
use crate::commands::{close_face, open_face};
use crate::config::AppConfig;

pub async fn execute(args: StrategiesArgs, config: &AppConfig) -> Result<()> {
    let face = open_face(config).await?;
    let result = face
        .strategies()
        .await
        .context("Failed to read strategies");
    let strategies = close_face(&face, None, result).await?;

    if args.json {
        let json =
            serde_json::to_string_pretty(&strategies).context("Failed to serialize output")?;
        println!("{}", json);
        return Ok(());
    }

    for slot in Slot::ALL {
        let Some(selection) = strategies.get(&slot) else {
            continue;
        };

        let category = selection.category.as_deref().unwrap_or("(none)");
        let params = selection.selected_params();
        if params.is_empty() {
            println!("{:<16}{}", slot, category);
        } else {
            println!(
                "{:<16}{} {}",
                slot,
                category,
                serde_json::Value::Object(params)
            );
        }
    }

    Ok(())
}
