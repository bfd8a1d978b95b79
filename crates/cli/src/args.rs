//! CLI argument definitions

use clap::{Args, Parser, Subcommand};
use reddit_face_domain::{PostId, Slot};
use std::path::PathBuf;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// reddit-face: post to, score and scrape a subreddit through pluggable strategies
#[derive(Parser, Debug)]
#[command(name = "reddit-face")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Configuration management
    Config(ConfigArgs),

    #[command(flatten)]
    Face(FaceCommands),
}

/// Commands that operate on the face
#[derive(Subcommand, Debug)]
pub enum FaceCommands {
    /// Submit content to the subreddit
    Post(PostArgs),

    /// Score a post by its identifier
    Score(ScoreArgs),

    /// Scrape past posts with their scores
    Scrap(ScrapArgs),

    /// Show the active strategy of every slot
    Strategies(StrategiesArgs),

    /// Replace the strategy of a slot
    SetStrategy(SetStrategyArgs),

    /// Discard saved strategy state and rebuild from configuration
    Reset,

    /// Print the JSON schema of accepted post content
    Schema,
}

#[derive(Args, Debug)]
pub struct PostArgs {
    /// Post text
    #[arg(long, conflicts_with = "content")]
    pub text: Option<String>,

    /// Image URL
    #[arg(long, conflicts_with = "content")]
    pub image: Option<String>,

    /// Raw JSON content, as described by `schema`
    #[arg(long)]
    pub content: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ScoreArgs {
    /// Post identifier (UUID)
    pub id: PostId,
}

#[derive(Args, Debug)]
pub struct ScrapArgs {
    /// Maximum number of posts to emit
    #[arg(long)]
    pub limit: Option<usize>,

    /// Only posts created before this RFC 3339 timestamp
    #[arg(long, value_parser = parse_timestamp)]
    pub before: Option<OffsetDateTime>,

    /// Only posts created after this RFC 3339 timestamp
    #[arg(long, value_parser = parse_timestamp)]
    pub after: Option<OffsetDateTime>,

    /// Output one JSON object per line
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct StrategiesArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct SetStrategyArgs {
    /// Slot to reconfigure (poster, scorer, score_modifier, scraper, restriction)
    pub slot: Slot,

    /// Category to activate; omit to disable an optional slot
    pub category: Option<String>,

    /// Parameters for the category as a JSON object
    #[arg(long, requires = "category")]
    pub params: Option<String>,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Init {
        /// Path to write config file
        #[arg(long, default_value = "./config.toml")]
        path: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

fn parse_timestamp(value: &str) -> Result<OffsetDateTime, String> {
    OffsetDateTime::parse(value, &Rfc3339).map_err(|e| format!("invalid timestamp: {}", e))
}
