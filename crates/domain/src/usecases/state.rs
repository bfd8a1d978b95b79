//! Live face state and the lock that guards it

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::FaceError;
use crate::model::{CategoryParams, Slot, SlotSelection, Submission, Subreddit};
use crate::ports::{
    Poster, Processor, RedditClient, Restriction, ScoreModifier, Scorer, Scraper, Strategy,
};

/// The live bundle: client, subreddit and one strategy per slot
pub(crate) struct State {
    pub(crate) client: Arc<dyn RedditClient>,
    pub(crate) subreddit: Subreddit,
    pub(crate) processor: Box<dyn Processor>,
    pub(crate) poster: Box<dyn Poster>,
    pub(crate) scorer: Box<dyn Scorer>,
    pub(crate) score_modifier: Option<Box<dyn ScoreModifier>>,
    pub(crate) scraper: Box<dyn Scraper>,
    pub(crate) restriction: Option<Box<dyn Restriction>>,
    /// Parameter mappings in effect per slot, for every category
    pub(crate) params: BTreeMap<Slot, CategoryParams>,
}

impl State {
    /// Active strategy of each slot, `None` for an empty optional slot
    pub(crate) fn strategies(&self) -> [(Slot, Option<&dyn Strategy>); 6] {
        [
            (Slot::Processor, Some(self.processor.as_ref() as &dyn Strategy)),
            (Slot::Poster, Some(self.poster.as_ref() as &dyn Strategy)),
            (Slot::Scorer, Some(self.scorer.as_ref() as &dyn Strategy)),
            (
                Slot::ScoreModifier,
                self.score_modifier
                    .as_deref()
                    .map(|strategy| strategy as &dyn Strategy),
            ),
            (Slot::Scraper, Some(self.scraper.as_ref() as &dyn Strategy)),
            (
                Slot::Restriction,
                self.restriction
                    .as_deref()
                    .map(|strategy| strategy as &dyn Strategy),
            ),
        ]
    }

    /// Active category and parameter mappings of a slot
    pub(crate) fn selection(&self, slot: Slot) -> SlotSelection {
        let category = self
            .strategies()
            .into_iter()
            .find(|(s, _)| *s == slot)
            .and_then(|(_, strategy)| strategy.map(|s| s.category().to_string()));

        SlotSelection {
            category,
            params: self.params.get(&slot).cloned().unwrap_or_default(),
        }
    }

    pub(crate) fn snapshot(&self) -> BTreeMap<Slot, SlotSelection> {
        Slot::ALL
            .into_iter()
            .map(|slot| (slot, self.selection(slot)))
            .collect()
    }

    /// Score a submission with the scorer, then the modifier if one is active
    pub(crate) async fn score(&self, submission: &Submission) -> Result<f64, FaceError> {
        let mut score = self.scorer.score(submission).await?;
        if let Some(modifier) = &self.score_modifier {
            score = modifier.modify(submission, score).await?;
        }
        Ok(score)
    }

    /// Release every strategy, then close the client.
    ///
    /// Every step runs even if an earlier one failed; the first error is
    /// returned.
    pub(crate) async fn release(self) -> Result<(), FaceError> {
        let mut first_error: Option<FaceError> = None;

        for (slot, strategy) in self.strategies() {
            let Some(strategy) = strategy else { continue };
            if let Err(error) = strategy.cleanup().await {
                tracing::warn!(slot = %slot, error = %error, "Strategy cleanup failed");
                first_error.get_or_insert(error.into());
            }
        }

        if let Err(error) = self.client.close().await {
            tracing::warn!(error = %error, "Failed to close client");
            first_error.get_or_insert(error.into());
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Lifecycle phase of a face
pub(crate) enum Phase {
    Unbuilt,
    Active(State),
    CleanedUp,
}

impl Phase {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Phase::Unbuilt => "not built",
            Phase::Active(_) => "active",
            Phase::CleanedUp => "cleaned up",
        }
    }

    fn active(&self) -> Option<&State> {
        match self {
            Phase::Active(state) => Some(state),
            _ => None,
        }
    }

    pub(crate) fn active_mut(&mut self) -> Result<&mut State, FaceError> {
        match self {
            Phase::Active(state) => Ok(state),
            other => Err(FaceError::NotReady(other.name())),
        }
    }
}

/// Owns the face state; every access goes through a lock guard.
///
/// Readers share the lock, writers (lifecycle operations) exclude everyone.
pub(crate) struct StateContainer {
    inner: RwLock<Phase>,
}

impl StateContainer {
    pub(crate) fn new() -> Self {
        Self {
            inner: RwLock::new(Phase::Unbuilt),
        }
    }

    /// Shared access to the active state
    pub(crate) async fn read(&self) -> Result<RwLockReadGuard<'_, State>, FaceError> {
        let guard = self.inner.read().await;
        RwLockReadGuard::try_map(guard, Phase::active)
            .map_err(|guard| FaceError::NotReady(guard.name()))
    }

    /// Exclusive access to the phase
    pub(crate) async fn write(&self) -> RwLockWriteGuard<'_, Phase> {
        self.inner.write().await
    }
}
