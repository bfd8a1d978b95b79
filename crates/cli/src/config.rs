//! Configuration loading and management

use anyhow::{Context, Result};
use reddit_face_adapters::reddit_api::{DEFAULT_API_BASE_URL, DEFAULT_AUTH_BASE_URL};
use reddit_face_domain::{Credentials, FaceConfig, SlotSelection};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub reddit: RedditConfig,

    #[serde(default)]
    pub face: FaceSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Which Reddit the face talks to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    #[default]
    Api,
    /// In-memory subreddit seeded with sample posts
    Stub,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditConfig {
    #[serde(default)]
    pub backend: Backend,

    #[serde(default)]
    pub client_id: String,

    #[serde(default = "default_client_secret_env")]
    pub client_secret_env: String,

    #[serde(default = "default_refresh_token_env")]
    pub refresh_token_env: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default)]
    pub subreddit: String,

    #[serde(default = "default_ratelimit_seconds")]
    pub ratelimit_seconds: u64,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_auth_base_url")]
    pub auth_base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceSection {
    #[serde(default = "default_post_type")]
    pub post_type: String,

    #[serde(default)]
    pub poster: SlotSelection,

    #[serde(default)]
    pub scorer: SlotSelection,

    #[serde(default)]
    pub score_modifier: SlotSelection,

    #[serde(default)]
    pub scraper: SlotSelection,

    #[serde(default)]
    pub restriction: SlotSelection,
}

// Default value functions
fn default_state_dir() -> PathBuf {
    PathBuf::from("./state")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_client_secret_env() -> String {
    "REDDIT_CLIENT_SECRET".to_string()
}

fn default_refresh_token_env() -> String {
    "REDDIT_REFRESH_TOKEN".to_string()
}

fn default_user_agent() -> String {
    format!("reddit-face/{}", env!("CARGO_PKG_VERSION"))
}

fn default_ratelimit_seconds() -> u64 {
    3600
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_auth_base_url() -> String {
    DEFAULT_AUTH_BASE_URL.to_string()
}

fn default_post_type() -> String {
    "text_or_image".to_string()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            log_level: default_log_level(),
        }
    }
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            client_id: String::new(),
            client_secret_env: default_client_secret_env(),
            refresh_token_env: default_refresh_token_env(),
            user_agent: default_user_agent(),
            subreddit: String::new(),
            ratelimit_seconds: default_ratelimit_seconds(),
            api_base_url: default_api_base_url(),
            auth_base_url: default_auth_base_url(),
        }
    }
}

impl Default for FaceSection {
    fn default() -> Self {
        Self {
            post_type: default_post_type(),
            poster: SlotSelection::default(),
            scorer: SlotSelection::default(),
            score_modifier: SlotSelection::default(),
            scraper: SlotSelection::default(),
            restriction: SlotSelection::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Try default config path if none specified
        let default_path = PathBuf::from("./config.toml");
        let path = config_path.unwrap_or(&default_path);

        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        } else if config_path.is_some() {
            // User specified a path that doesn't exist
            anyhow::bail!("Config file not found: {}", path.display());
        }

        // Add environment variable overrides
        builder = builder.add_source(
            config::Environment::with_prefix("REDDIT_FACE")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Build the face configuration, reading secrets from the environment.
    ///
    /// The stub backend needs no credentials.
    pub fn face_config(&self) -> Result<FaceConfig> {
        let reddit = &self.reddit;

        if reddit.subreddit.trim().is_empty() {
            anyhow::bail!("reddit.subreddit is not configured");
        }

        let (client_secret, refresh_token) = match reddit.backend {
            Backend::Stub => (SecretString::new("".into()), SecretString::new("".into())),
            Backend::Api => {
                if reddit.client_id.is_empty() {
                    anyhow::bail!("reddit.client_id is not configured");
                }
                (
                    secret_from_env(&reddit.client_secret_env)?,
                    secret_from_env(&reddit.refresh_token_env)?,
                )
            }
        };

        Ok(FaceConfig {
            credentials: Credentials {
                client_id: reddit.client_id.clone(),
                client_secret,
                refresh_token,
                user_agent: reddit.user_agent.clone(),
                ratelimit_seconds: reddit.ratelimit_seconds,
            },
            subreddit: reddit.subreddit.clone(),
            post_type: self.face.post_type.clone(),
            poster: self.face.poster.clone(),
            scorer: self.face.scorer.clone(),
            score_modifier: self.face.score_modifier.clone(),
            scraper: self.face.scraper.clone(),
            restriction: self.face.restriction.clone(),
        })
    }

    /// Generate example configuration as TOML string
    pub fn example_toml() -> String {
        r#"# reddit-face configuration

[general]
state_dir = "./state"
log_level = "info"

[reddit]
backend = "api"  # api, stub
client_id = "your-client-id"
# Names of environment variables holding the secrets
client_secret_env = "REDDIT_CLIENT_SECRET"
refresh_token_env = "REDDIT_REFRESH_TOKEN"
user_agent = "reddit-face/0.1 (by /u/your-username)"
subreddit = "test"
# Longest rate-limit wait sat out before a request fails
ratelimit_seconds = 3600
# api_base_url = "https://oauth.reddit.com"
# auth_base_url = "https://www.reddit.com"

[face]
# text_only, image_only, text_and_image, text_or_image,
# text_with_optional_image, image_with_optional_text
post_type = "text_or_image"

[face.poster]
category = "basic"
# params.basic = { title = "Posted by reddit-face" }

[face.scorer]
category = "relative_score"  # score, relative_score, upvote_ratio

[face.score_modifier]
# category = "age_decay"  # scale, clamp, age_decay
params.age_decay = { half_life_hours = 24.0 }

[face.scraper]
category = "new"  # new, hot
params.new = { page_size = 100 }

[face.restriction]
# category = "unique"  # max_length, forbidden_patterns, unique
params.max_length = { max_chars = 10000 }
params.forbidden_patterns = { patterns = ["\\bspam\\b"], case_insensitive = true }
"#
        .to_string()
    }
}

fn secret_from_env(name: &str) -> Result<SecretString> {
    let value = std::env::var(name)
        .with_context(|| format!("Environment variable {} is not set", name))?;
    Ok(SecretString::new(value.into()))
}
