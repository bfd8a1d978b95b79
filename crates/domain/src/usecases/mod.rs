//! Application use cases: the face and its lifecycle

mod face;
mod lifecycle;
mod scrap;
pub(crate) mod state;


pub use face::Face;
