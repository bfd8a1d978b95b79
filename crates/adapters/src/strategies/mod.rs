//! Built-in strategies and their registry

mod modifiers;
mod posters;
mod processors;
mod restrictions;
mod scorers;
mod scrapers;

pub use modifiers::{AgeDecayModifier, ClampModifier, ScaleModifier};
pub use posters::{BasicPoster, MAX_TITLE_CHARS};
pub use processors::{PostType, PostTypeProcessor};
pub use restrictions::{ForbiddenPatternsRestriction, MaxLengthRestriction, UniqueRestriction};
pub use scorers::{RelativeScoreScorer, ScoreScorer, UpvoteRatioScorer};
pub use scrapers::ListingScraper;

use reddit_face_domain::{
    ListingSort, Params, Poster, Processor, Restriction, ScoreModifier, Scorer, Scraper,
    StrategyError, StrategyRegistry, parse_params,
};
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct NoParams {}

/// Reject any parameters for strategies that take none
pub(crate) fn no_params(params: &Params) -> Result<(), StrategyError> {
    let NoParams {} = parse_params(params)?;
    Ok(())
}

/// Registry with every built-in strategy.
///
/// Defaults: `basic` poster, `relative_score` scorer, `new` scraper. The
/// optional slots have no default.
pub fn builtin_registry() -> StrategyRegistry {
    let mut registry = StrategyRegistry::new();

    for post_type in PostType::ALL {
        registry
            .processors
            .register(post_type.as_str(), move |params| {
                let processor: Box<dyn Processor> =
                    Box::new(PostTypeProcessor::from_params(post_type, params)?);
                Ok(processor)
            });
    }

    registry
        .posters
        .register(BasicPoster::CATEGORY, |params| {
            let poster: Box<dyn Poster> = Box::new(BasicPoster::from_params(params)?);
            Ok(poster)
        })
        .set_default(BasicPoster::CATEGORY);

    registry
        .scorers
        .register(ScoreScorer::CATEGORY, |params| {
            let scorer: Box<dyn Scorer> = Box::new(ScoreScorer::from_params(params)?);
            Ok(scorer)
        })
        .register(RelativeScoreScorer::CATEGORY, |params| {
            let scorer: Box<dyn Scorer> = Box::new(RelativeScoreScorer::from_params(params)?);
            Ok(scorer)
        })
        .register(UpvoteRatioScorer::CATEGORY, |params| {
            let scorer: Box<dyn Scorer> = Box::new(UpvoteRatioScorer::from_params(params)?);
            Ok(scorer)
        })
        .set_default(RelativeScoreScorer::CATEGORY);

    registry
        .score_modifiers
        .register(ScaleModifier::CATEGORY, |params| {
            let modifier: Box<dyn ScoreModifier> = Box::new(ScaleModifier::from_params(params)?);
            Ok(modifier)
        })
        .register(ClampModifier::CATEGORY, |params| {
            let modifier: Box<dyn ScoreModifier> = Box::new(ClampModifier::from_params(params)?);
            Ok(modifier)
        })
        .register(AgeDecayModifier::CATEGORY, |params| {
            let modifier: Box<dyn ScoreModifier> =
                Box::new(AgeDecayModifier::from_params(params)?);
            Ok(modifier)
        });

    registry
        .scrapers
        .register(ListingScraper::NEW, |params| {
            let scraper: Box<dyn Scraper> =
                Box::new(ListingScraper::from_params(ListingSort::New, params)?);
            Ok(scraper)
        })
        .register(ListingScraper::HOT, |params| {
            let scraper: Box<dyn Scraper> =
                Box::new(ListingScraper::from_params(ListingSort::Hot, params)?);
            Ok(scraper)
        })
        .set_default(ListingScraper::NEW);

    registry
        .restrictions
        .register(MaxLengthRestriction::CATEGORY, |params| {
            let restriction: Box<dyn Restriction> =
                Box::new(MaxLengthRestriction::from_params(params)?);
            Ok(restriction)
        })
        .register(ForbiddenPatternsRestriction::CATEGORY, |params| {
            let restriction: Box<dyn Restriction> =
                Box::new(ForbiddenPatternsRestriction::from_params(params)?);
            Ok(restriction)
        })
        .register(UniqueRestriction::CATEGORY, |params| {
            let restriction: Box<dyn Restriction> =
                Box::new(UniqueRestriction::from_params(params)?);
            Ok(restriction)
        });

    registry
}
