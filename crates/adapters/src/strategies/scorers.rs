//! Scorers

use async_trait::async_trait;
use reddit_face_domain::{Params, Scorer, Strategy, StrategyError, Submission};

use super::no_params;

/// Net votes
pub struct ScoreScorer;

impl ScoreScorer {
    pub const CATEGORY: &'static str = "score";

    pub fn from_params(params: &Params) -> Result<Self, StrategyError> {
        no_params(params)?;
        Ok(Self)
    }
}

#[async_trait]
impl Strategy for ScoreScorer {
    fn category(&self) -> &str {
        Self::CATEGORY
    }
}

#[async_trait]
impl Scorer for ScoreScorer {
    async fn score(&self, submission: &Submission) -> Result<f64, StrategyError> {
        Ok(submission.score as f64)
    }
}

/// Net votes per thousand subscribers, comparable across subreddits
pub struct RelativeScoreScorer;

impl RelativeScoreScorer {
    pub const CATEGORY: &'static str = "relative_score";

    pub fn from_params(params: &Params) -> Result<Self, StrategyError> {
        no_params(params)?;
        Ok(Self)
    }
}

#[async_trait]
impl Strategy for RelativeScoreScorer {
    fn category(&self) -> &str {
        Self::CATEGORY
    }
}

#[async_trait]
impl Scorer for RelativeScoreScorer {
    async fn score(&self, submission: &Submission) -> Result<f64, StrategyError> {
        // Reddit omits the count for some listings; treat as a single subscriber
        let subscribers = submission.subreddit_subscribers.unwrap_or(1).max(1);
        Ok(submission.score as f64 * 1000.0 / subscribers as f64)
    }
}

/// Share of upvotes among all votes
pub struct UpvoteRatioScorer;

impl UpvoteRatioScorer {
    pub const CATEGORY: &'static str = "upvote_ratio";

    pub fn from_params(params: &Params) -> Result<Self, StrategyError> {
        no_params(params)?;
        Ok(Self)
    }
}

#[async_trait]
impl Strategy for UpvoteRatioScorer {
    fn category(&self) -> &str {
        Self::CATEGORY
    }
}

#[async_trait]
impl Scorer for UpvoteRatioScorer {
    async fn score(&self, submission: &Submission) -> Result<f64, StrategyError> {
        Ok(submission.upvote_ratio)
    }
}
