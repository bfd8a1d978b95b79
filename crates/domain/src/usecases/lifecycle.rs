//! Building, loading, saving, resetting and cleaning up face state
//!
//! Every operation here holds the write lock for its whole duration.

use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;

use crate::error::FaceError;
use crate::model::{CategoryParams, FaceConfig, Slot};
use crate::persistence::{self, Manifest, SlotRecord};
use crate::ports::{Connector, Strategy};
use crate::registry::{Registry, StrategyRegistry};
use crate::usecases::face::Face;
use crate::usecases::state::{Phase, State};

impl Face {
    /// Build state from configuration (first run)
    pub async fn init(&self) -> Result<(), FaceError> {
        tracing::info!(subreddit = %self.config.subreddit, "Building state from configuration");

        let mut phase = self.state.write().await;
        ensure_usable(&phase)?;

        let state = assemble(&self.config, &self.registry, self.connector.as_ref(), None).await?;
        install(&mut phase, state).await;

        tracing::info!("State built");
        Ok(())
    }

    /// Build state from a saved state root, falling back to configuration
    /// for anything the manifest does not record
    pub async fn load_saved(&self, directory: &Path) -> Result<(), FaceError> {
        tracing::info!(directory = %directory.display(), "Loading saved state");

        let mut phase = self.state.write().await;
        ensure_usable(&phase)?;

        let manifest = match Manifest::read(directory).await {
            Ok(Some(manifest)) => manifest,
            Ok(None) => {
                tracing::info!("No manifest found, using configuration");
                Manifest::default()
            }
            Err(error @ FaceError::CorruptManifest { .. }) => {
                tracing::warn!(error = %error, "Ignoring corrupt manifest, using configuration");
                Manifest::default()
            }
            Err(error) => return Err(error),
        };

        let state = assemble(
            &self.config,
            &self.registry,
            self.connector.as_ref(),
            Some((directory, &manifest)),
        )
        .await?;
        install(&mut phase, state).await;

        tracing::info!("State loaded");
        Ok(())
    }

    /// Save strategy state and the manifest under `directory`
    pub async fn save(&self, directory: &Path) -> Result<(), FaceError> {
        tracing::info!(directory = %directory.display(), "Saving state");

        let mut phase = self.state.write().await;
        let state = phase.active_mut()?;

        fs::create_dir_all(directory)
            .await
            .map_err(|e| FaceError::persistence(directory, e))?;

        for (slot, strategy) in state.strategies() {
            match strategy {
                Some(strategy) => persistence::save_slot(directory, slot, strategy).await?,
                None => persistence::clear_slot(directory, slot).await?,
            }
        }

        let mut manifest = Manifest::default();
        for slot in Slot::ALL {
            manifest.insert(slot, SlotRecord::from(state.selection(slot)));
        }
        manifest.write(directory).await?;

        tracing::info!("State saved");
        Ok(())
    }

    /// Discard the current state and rebuild it from configuration.
    ///
    /// The new state is built before the old one is released, so a failed
    /// reset leaves the current state in place.
    pub async fn reset(&self) -> Result<(), FaceError> {
        tracing::info!("Resetting state");

        let mut phase = self.state.write().await;
        ensure_usable(&phase)?;

        let state = assemble(&self.config, &self.registry, self.connector.as_ref(), None).await?;
        install(&mut phase, state).await;

        tracing::info!("State reset");
        Ok(())
    }

    /// Release every strategy and close the client. Calling it again is a no-op.
    pub async fn cleanup(&self) -> Result<(), FaceError> {
        let mut phase = self.state.write().await;

        match std::mem::replace(&mut *phase, Phase::CleanedUp) {
            Phase::Active(state) => {
                tracing::info!("Cleaning up state");
                state.release().await
            }
            _ => Ok(()),
        }
    }
}

fn ensure_usable(phase: &Phase) -> Result<(), FaceError> {
    match phase {
        Phase::CleanedUp => Err(FaceError::NotReady(phase.name())),
        _ => Ok(()),
    }
}

/// Make `state` the active state, releasing the previous one
async fn install(phase: &mut Phase, state: State) {
    if let Phase::Active(previous) = std::mem::replace(phase, Phase::Active(state)) {
        if let Err(error) = previous.release().await {
            tracing::warn!(error = %error, "Failed to release previous state");
        }
    }
}

/// Category and parameter mappings in effect for one slot
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Resolved {
    pub(crate) slot: Slot,
    pub(crate) category: Option<String>,
    pub(crate) params: CategoryParams,
}

impl Resolved {
    fn required(&self) -> Result<&str, FaceError> {
        self.category
            .as_deref()
            .ok_or(FaceError::MissingCategory(self.slot))
    }

    fn selected_params(&self, category: &str) -> crate::model::Params {
        self.params.get(category).cloned().unwrap_or_default()
    }
}

/// Resolve a slot: manifest first, then configuration, then the registry
/// default for required slots
pub(crate) fn resolve(
    slot: Slot,
    config: &FaceConfig,
    registry: &StrategyRegistry,
    manifest: &Manifest,
) -> Result<Resolved, FaceError> {
    let record = manifest.get(slot);
    let configured = config.selection(slot);

    // An empty category in the manifest only means something for optional slots
    let from_manifest = record
        .and_then(|record| record.category.clone())
        .filter(|category| category.is_some() || slot.is_optional());

    let category = match from_manifest {
        Some(category) => category,
        None if slot == Slot::Processor => Some(config.post_type.clone()),
        None => configured
            .and_then(|selection| selection.category.clone())
            .or_else(|| {
                if slot.is_optional() {
                    None
                } else {
                    registry.default_category(slot).map(String::from)
                }
            }),
    };

    if category.is_none() && !slot.is_optional() {
        return Err(FaceError::MissingCategory(slot));
    }

    let params = record
        .and_then(|record| record.params.clone())
        .or_else(|| configured.map(|selection| selection.params.clone()))
        .unwrap_or_default();

    Ok(Resolved {
        slot,
        category,
        params,
    })
}

/// Connect and build every slot. `saved` supplies the manifest and the
/// state root to restore strategy state from.
///
/// Unknown categories are rejected before connecting. On a later failure
/// the strategies built so far are cleaned up, the client is closed and
/// nothing is installed.
async fn assemble(
    config: &FaceConfig,
    registry: &StrategyRegistry,
    connector: &dyn Connector,
    saved: Option<(&Path, &Manifest)>,
) -> Result<State, FaceError> {
    let empty = Manifest::default();
    let (directory, manifest) = match saved {
        Some((directory, manifest)) => (Some(directory), manifest),
        None => (None, &empty),
    };

    // Resolve and validate everything before touching the network
    let mut resolved = BTreeMap::new();
    for slot in Slot::ALL {
        let selected = resolve(slot, config, registry, manifest)?;
        if let Some(category) = &selected.category {
            if !registry.contains(slot, category) {
                return Err(FaceError::UnknownCategory {
                    slot,
                    category: category.clone(),
                });
            }
        }
        resolved.insert(slot, selected);
    }

    let client = connector.connect(&config.credentials).await?;

    let built = async {
        let subreddit = client.subreddit(&config.subreddit).await?;

        let slot = |slot: Slot| &resolved[&slot];

        let processor =
            build_required(&registry.processors, slot(Slot::Processor), directory).await?;
        let poster = discard_on_error(
            build_required(&registry.posters, slot(Slot::Poster), directory).await,
            [Some(processor.as_ref() as &dyn Strategy)],
        )
        .await?;
        let scorer = discard_on_error(
            build_required(&registry.scorers, slot(Slot::Scorer), directory).await,
            [
                Some(processor.as_ref() as &dyn Strategy),
                Some(poster.as_ref() as &dyn Strategy),
            ],
        )
        .await?;
        let score_modifier = discard_on_error(
            build_optional(
                &registry.score_modifiers,
                slot(Slot::ScoreModifier),
                directory,
            )
            .await,
            [
                Some(processor.as_ref() as &dyn Strategy),
                Some(poster.as_ref() as &dyn Strategy),
                Some(scorer.as_ref() as &dyn Strategy),
            ],
        )
        .await?;
        let scraper = discard_on_error(
            build_required(&registry.scrapers, slot(Slot::Scraper), directory).await,
            [
                Some(processor.as_ref() as &dyn Strategy),
                Some(poster.as_ref() as &dyn Strategy),
                Some(scorer.as_ref() as &dyn Strategy),
                score_modifier.as_deref().map(|s| s as &dyn Strategy),
            ],
        )
        .await?;
        let restriction = discard_on_error(
            build_optional(&registry.restrictions, slot(Slot::Restriction), directory).await,
            [
                Some(processor.as_ref() as &dyn Strategy),
                Some(poster.as_ref() as &dyn Strategy),
                Some(scorer.as_ref() as &dyn Strategy),
                score_modifier.as_deref().map(|s| s as &dyn Strategy),
                Some(scraper.as_ref() as &dyn Strategy),
            ],
        )
        .await?;

        Ok::<_, FaceError>((
            subreddit,
            processor,
            poster,
            scorer,
            score_modifier,
            scraper,
            restriction,
        ))
    }
    .await;

    match built {
        Ok((subreddit, processor, poster, scorer, score_modifier, scraper, restriction)) => {
            for resolved in resolved.values() {
                tracing::debug!(
                    slot = %resolved.slot,
                    category = ?resolved.category,
                    "Strategy active"
                );
            }

            Ok(State {
                client,
                subreddit,
                processor,
                poster,
                scorer,
                score_modifier,
                scraper,
                restriction,
                params: resolved
                    .into_iter()
                    .map(|(slot, resolved)| (slot, resolved.params))
                    .collect(),
            })
        }
        Err(error) => {
            if let Err(close_error) = client.close().await {
                tracing::warn!(error = %close_error, "Failed to close client after build failure");
            }
            Err(error)
        }
    }
}

/// Pass `result` through; on error first clean up the strategies `built`
/// so far, which never make it into a state
async fn discard_on_error<T, const N: usize>(
    result: Result<T, FaceError>,
    built: [Option<&dyn Strategy>; N],
) -> Result<T, FaceError> {
    if result.is_err() {
        for strategy in built.into_iter().flatten() {
            if let Err(error) = strategy.cleanup().await {
                tracing::warn!(
                    category = strategy.category(),
                    error = %error,
                    "Strategy cleanup failed after build failure"
                );
            }
        }
    }
    result
}

async fn build_required<T: Strategy + ?Sized>(
    registry: &Registry<T>,
    resolved: &Resolved,
    directory: Option<&Path>,
) -> Result<Box<T>, FaceError> {
    let category = resolved.required()?;
    persistence::load_slot(registry, category, &resolved.selected_params(category), directory)
        .await
}

async fn build_optional<T: Strategy + ?Sized>(
    registry: &Registry<T>,
    resolved: &Resolved,
    directory: Option<&Path>,
) -> Result<Option<Box<T>>, FaceError> {
    match resolved.category.as_deref() {
        Some(category) => persistence::load_slot(
            registry,
            category,
            &resolved.selected_params(category),
            directory,
        )
        .await
        .map(Some),
        None => Ok(None),
    }
}
