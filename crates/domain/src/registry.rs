//! Strategy registry
//!
//! Maps a category name to a factory for each slot. Lookup and construction
//! only; the registry holds no live strategies.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::FaceError;
use crate::model::{Params, Slot};
use crate::ports::{Poster, Processor, Restriction, ScoreModifier, Scorer, Scraper, StrategyError};

/// Builds a strategy from its parameters
pub type Factory<T> = Box<dyn Fn(&Params) -> Result<Box<T>, StrategyError> + Send + Sync>;

/// Factories for one slot, keyed by category
pub struct Registry<T: ?Sized> {
    slot: Slot,
    factories: BTreeMap<String, Factory<T>>,
    default_category: Option<String>,
}

impl<T: ?Sized> Registry<T> {
    pub fn new(slot: Slot) -> Self {
        Self {
            slot,
            factories: BTreeMap::new(),
            default_category: None,
        }
    }

    pub fn slot(&self) -> Slot {
        self.slot
    }

    /// Register a factory, replacing any previous one for the category
    pub fn register<F>(&mut self, category: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&Params) -> Result<Box<T>, StrategyError> + Send + Sync + 'static,
    {
        self.factories.insert(category.into(), Box::new(factory));
        self
    }

    /// Category used when configuration names none
    pub fn set_default(&mut self, category: impl Into<String>) -> &mut Self {
        self.default_category = Some(category.into());
        self
    }

    pub fn default_category(&self) -> Option<&str> {
        self.default_category.as_deref()
    }

    pub fn contains(&self, category: &str) -> bool {
        self.factories.contains_key(category)
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Build a strategy of the given category
    pub fn build(&self, category: &str, params: &Params) -> Result<Box<T>, FaceError> {
        let factory = self
            .factories
            .get(category)
            .ok_or_else(|| FaceError::UnknownCategory {
                slot: self.slot,
                category: category.to_string(),
            })?;

        factory(params).map_err(|error| match error {
            StrategyError::InvalidParameters(message) => FaceError::InvalidParameters {
                slot: self.slot,
                category: category.to_string(),
                message,
            },
            other => other.into(),
        })
    }
}

/// One registry per slot
pub struct StrategyRegistry {
    pub processors: Registry<dyn Processor>,
    pub posters: Registry<dyn Poster>,
    pub scorers: Registry<dyn Scorer>,
    pub score_modifiers: Registry<dyn ScoreModifier>,
    pub scrapers: Registry<dyn Scraper>,
    pub restrictions: Registry<dyn Restriction>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self {
            processors: Registry::new(Slot::Processor),
            posters: Registry::new(Slot::Poster),
            scorers: Registry::new(Slot::Scorer),
            score_modifiers: Registry::new(Slot::ScoreModifier),
            scrapers: Registry::new(Slot::Scraper),
            restrictions: Registry::new(Slot::Restriction),
        }
    }

    /// Registered categories of a slot, sorted
    pub fn categories(&self, slot: Slot) -> Vec<String> {
        let categories: Vec<&str> = match slot {
            Slot::Processor => self.processors.categories().collect(),
            Slot::Poster => self.posters.categories().collect(),
            Slot::Scorer => self.scorers.categories().collect(),
            Slot::ScoreModifier => self.score_modifiers.categories().collect(),
            Slot::Scraper => self.scrapers.categories().collect(),
            Slot::Restriction => self.restrictions.categories().collect(),
        };
        categories.into_iter().map(String::from).collect()
    }

    /// Whether `category` is registered for `slot`
    pub fn contains(&self, slot: Slot, category: &str) -> bool {
        match slot {
            Slot::Processor => self.processors.contains(category),
            Slot::Poster => self.posters.contains(category),
            Slot::Scorer => self.scorers.contains(category),
            Slot::ScoreModifier => self.score_modifiers.contains(category),
            Slot::Scraper => self.scrapers.contains(category),
            Slot::Restriction => self.restrictions.contains(category),
        }
    }

    /// Default category of a slot.
    ///
    /// The processor has none: it is keyed to the face's post type.
    pub fn default_category(&self, slot: Slot) -> Option<&str> {
        match slot {
            Slot::Processor => None,
            Slot::Poster => self.posters.default_category(),
            Slot::Scorer => self.scorers.default_category(),
            Slot::ScoreModifier => self.score_modifiers.default_category(),
            Slot::Scraper => self.scrapers.default_category(),
            Slot::Restriction => self.restrictions.default_category(),
        }
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Deserialize strategy parameters into a typed struct
pub fn parse_params<P: DeserializeOwned>(params: &Params) -> Result<P, StrategyError> {
    serde_json::from_value(Value::Object(params.clone()))
        .map_err(|e| StrategyError::InvalidParameters(e.to_string()))
}
