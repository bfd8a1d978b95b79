//! The face: submit, score and reconfigure over a locked state

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::FaceError;
use crate::model::{FaceConfig, Params, PostId, PostedItem, Slot, SlotSelection};
use crate::ports::{Connector, Strategy};
use crate::registry::StrategyRegistry;
use crate::usecases::state::StateContainer;

/// An adapter exposing a subreddit through pluggable strategies
pub struct Face {
    pub(super) config: FaceConfig,
    pub(super) registry: Arc<StrategyRegistry>,
    pub(super) connector: Arc<dyn Connector>,
    pub(super) state: StateContainer,
}

impl Face {
    /// Create an unbuilt face; call [`Face::init`] or [`Face::load_saved`] next
    pub fn new(
        config: FaceConfig,
        registry: Arc<StrategyRegistry>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            config,
            registry,
            connector,
            state: StateContainer::new(),
        }
    }

    pub fn config(&self) -> &FaceConfig {
        &self.config
    }

    /// Submit content to the subreddit.
    ///
    /// The content is translated and checked against the restriction before
    /// anything is sent to Reddit. The restriction learns the outcome of the
    /// submit afterwards.
    pub async fn post(&self, content: &Value) -> Result<PostedItem, FaceError> {
        tracing::info!("Creating new post");

        let state = self.state.read().await?;

        let data = state.processor.to_internal(content).await?;

        if let Some(restriction) = &state.restriction {
            if !restriction.check(&data).await? {
                tracing::warn!(
                    restriction = restriction.category(),
                    "Post rejected by restriction"
                );
                return Err(FaceError::Rejected);
            }
        }

        let submitted = state
            .poster
            .post(state.client.as_ref(), &state.subreddit, &data)
            .await;

        if let Some(restriction) = &state.restriction {
            if let Err(error) = restriction.settle(&data, submitted.is_ok()).await {
                tracing::warn!(
                    restriction = restriction.category(),
                    error = %error,
                    "Failed to settle restriction"
                );
            }
        }

        let submission = submitted?;
        drop(state);

        let id = PostId::from_native_id(&submission.id)?;
        let url = submission.public_url();

        tracing::info!(post_id = %id, native_id = %submission.id, url = ?url, "Created post");
        Ok(PostedItem { id, url })
    }

    /// Score an existing post
    pub async fn score(&self, id: PostId) -> Result<f64, FaceError> {
        tracing::info!(post_id = %id, "Scoring post");

        let state = self.state.read().await?;
        let submission = state.client.submission(&id.native_id()).await?;
        let score = state.score(&submission).await?;
        drop(state);

        tracing::info!(post_id = %id, score, "Scored post");
        Ok(score)
    }

    /// Active category and parameter mappings per slot
    pub async fn strategies(&self) -> Result<BTreeMap<Slot, SlotSelection>, FaceError> {
        let state = self.state.read().await?;
        Ok(state.snapshot())
    }

    /// JSON schema of the content accepted by [`Face::post`]
    pub async fn post_schema(&self) -> Result<Value, FaceError> {
        let state = self.state.read().await?;
        Ok(state.processor.post_schema())
    }

    /// Swap the strategy of a slot.
    ///
    /// `params`, when given, replace the stored parameters of `category`;
    /// otherwise the stored ones are used. `None` as category empties an
    /// optional slot. The old strategy is released only after the new one
    /// was built.
    pub async fn set_strategy(
        &self,
        slot: Slot,
        category: Option<String>,
        params: Option<Params>,
    ) -> Result<(), FaceError> {
        tracing::info!(slot = %slot, category = ?category, "Setting strategy");

        let mut phase = self.state.write().await;
        let state = phase.active_mut()?;

        let mut slot_params = state.params.get(&slot).cloned().unwrap_or_default();
        if let (Some(category), Some(params)) = (&category, params) {
            slot_params.insert(category.clone(), params);
        }
        let selected = category
            .as_ref()
            .and_then(|category| slot_params.get(category))
            .cloned()
            .unwrap_or_default();

        let required = || category.clone().ok_or(FaceError::MissingCategory(slot));
        let registry = &self.registry;

        match slot {
            Slot::Processor => return Err(FaceError::NotConfigurable(slot)),
            Slot::Poster => {
                let new = registry.posters.build(&required()?, &selected)?;
                retire(slot, std::mem::replace(&mut state.poster, new)).await;
            }
            Slot::Scorer => {
                let new = registry.scorers.build(&required()?, &selected)?;
                retire(slot, std::mem::replace(&mut state.scorer, new)).await;
            }
            Slot::Scraper => {
                let new = registry.scrapers.build(&required()?, &selected)?;
                retire(slot, std::mem::replace(&mut state.scraper, new)).await;
            }
            Slot::ScoreModifier => {
                let new = match &category {
                    Some(category) => Some(registry.score_modifiers.build(category, &selected)?),
                    None => None,
                };
                if let Some(old) = std::mem::replace(&mut state.score_modifier, new) {
                    retire(slot, old).await;
                }
            }
            Slot::Restriction => {
                let new = match &category {
                    Some(category) => Some(registry.restrictions.build(category, &selected)?),
                    None => None,
                };
                if let Some(old) = std::mem::replace(&mut state.restriction, new) {
                    retire(slot, old).await;
                }
            }
        }

        state.params.insert(slot, slot_params);
        tracing::info!(slot = %slot, category = ?category, "Strategy set");
        Ok(())
    }
}

/// Release a strategy that is no longer active
async fn retire<T: Strategy + ?Sized>(slot: Slot, old: Box<T>) {
    if let Err(error) = old.cleanup().await {
        tracing::warn!(
            slot = %slot,
            category = old.category(),
            error = %error,
            "Cleanup of replaced strategy failed"
        );
    }
}
