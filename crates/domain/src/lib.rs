//! reddit-face domain crate
//!
//! This crate contains the core domain logic following hexagonal architecture:
//! - `model`: Domain entities and value objects
//! - `ports`: Trait definitions for the Reddit client and the strategy slots
//! - `registry`: Category to factory lookup per slot
//! - `persistence`: The manifest and per-slot state directories
//! - `usecases`: The face, its lifecycle and the scrap pipeline

pub mod error;
pub mod model;
pub mod persistence;
pub mod ports;
pub mod registry;
pub mod usecases;

pub use error::FaceError;
pub use model::*;
pub use ports::*;
pub use registry::{Factory, Registry, StrategyRegistry, parse_params};
pub use usecases::Face;
