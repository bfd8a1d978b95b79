//! Port definitions (traits) for external dependencies
//!
//! These traits define the boundaries between the domain and external systems:
//! the Reddit client and the six strategy slots. Adapters implement them.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;

use crate::model::{
    Credentials, ListingPage, ListingSort, PostData, SubmitRequest, Submission, Subreddit,
};

/// Error type for Reddit client operations
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("API error: {0}")]
    Api(String),
    #[error("Rate limited, retry after: {0:?}")]
    RateLimited(Option<std::time::Duration>),
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Client connection is closed")]
    Closed,
}

/// Port for the Reddit API
#[async_trait]
pub trait RedditClient: Send + Sync {
    /// Resolve a subreddit by name
    async fn subreddit(&self, name: &str) -> Result<Subreddit, RemoteError>;

    /// Fetch a submission by its native base-36 id
    async fn submission(&self, native_id: &str) -> Result<Submission, RemoteError>;

    /// Create a submission and return it
    async fn submit(&self, request: &SubmitRequest) -> Result<Submission, RemoteError>;

    /// Fetch one page of a subreddit listing
    async fn listing(
        &self,
        subreddit: &Subreddit,
        sort: ListingSort,
        after: Option<&str>,
        limit: u32,
    ) -> Result<ListingPage, RemoteError>;

    /// Close the connection; later calls fail with [`RemoteError::Closed`]
    async fn close(&self) -> Result<(), RemoteError>;
}

/// Port for opening Reddit client connections
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        credentials: &Credentials,
    ) -> Result<Arc<dyn RedditClient>, RemoteError>;
}

/// Error type for strategy operations
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("Unsupported content: {0}")]
    UnsupportedContent(String),
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Capabilities shared by every strategy, whatever its slot
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Category name the strategy was registered under
    fn category(&self) -> &str;

    /// Strategies with internal state that survives restarts return themselves
    fn persistable(&self) -> Option<&dyn Persistable> {
        None
    }

    fn persistable_mut(&mut self) -> Option<&mut dyn Persistable> {
        None
    }

    /// Release resources held by the strategy
    async fn cleanup(&self) -> Result<(), StrategyError> {
        Ok(())
    }
}

/// Strategy state that can be saved to and restored from a directory
#[async_trait]
pub trait Persistable: Send + Sync {
    async fn save(&self, directory: &Path) -> Result<(), StrategyError>;

    async fn load(&mut self, directory: &Path) -> Result<(), StrategyError>;
}

/// Translates between external content and [`PostData`]
#[async_trait]
pub trait Processor: Strategy {
    /// JSON schema of the external content this processor accepts
    fn post_schema(&self) -> Value;

    async fn to_internal(&self, content: &Value) -> Result<PostData, StrategyError>;

    async fn to_external(&self, post: &PostData) -> Result<Value, StrategyError>;
}

/// Submits posts to a subreddit
#[async_trait]
pub trait Poster: Strategy {
    async fn post(
        &self,
        client: &dyn RedditClient,
        subreddit: &Subreddit,
        post: &PostData,
    ) -> Result<Submission, StrategyError>;
}

/// Computes the raw score of a submission
#[async_trait]
pub trait Scorer: Strategy {
    async fn score(&self, submission: &Submission) -> Result<f64, StrategyError>;
}

/// Adjusts a raw score
#[async_trait]
pub trait ScoreModifier: Strategy {
    async fn modify(&self, submission: &Submission, score: f64) -> Result<f64, StrategyError>;
}

/// Enumerates historical submissions.
///
/// The returned stream owns everything it needs so it can outlive any lock
/// held while it was created.
pub trait Scraper: Strategy {
    fn scrap(
        &self,
        client: Arc<dyn RedditClient>,
        subreddit: Subreddit,
        before: Option<OffsetDateTime>,
        after: Option<OffsetDateTime>,
    ) -> BoxStream<'static, Result<Submission, StrategyError>>;
}

/// Decides whether a post may be submitted
#[async_trait]
pub trait Restriction: Strategy {
    async fn check(&self, post: &PostData) -> Result<bool, StrategyError>;

    /// Called once for every post that passed `check`, after the submit
    /// attempt; `submitted` is false when the submit failed
    async fn settle(&self, _post: &PostData, _submitted: bool) -> Result<(), StrategyError> {
        Ok(())
    }
}
