//! Library objects: blueprints, books, deconstruction and upgrade planners.

mod decoder;
mod types;

pub use decoder::{LibraryDecoder, DEFAULT_MAX_DEPTH};
pub use types::*;
