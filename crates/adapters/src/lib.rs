//! reddit-face adapters crate
//!
//! This crate contains infrastructure adapters implementing the domain ports:
//! - `reddit_api`: Reddit OAuth API client and an in-memory stub
//! - `strategies`: built-in processors, posters, scorers, score modifiers,
//!   scrapers and restrictions, plus the registry that holds them

pub mod reddit_api;
pub mod strategies;

pub use reddit_api::{RedditApiClient, RedditConnector, StubConnector, StubRedditClient};
pub use strategies::builtin_registry;
