//! Query splitting and evaluation.

pub mod flags;
pub mod query;
pub mod strategy;

pub use flags::{SearchField, SearchFlags};
pub use query::{SearchPiece, split_query};
pub use strategy::SearchStrategy;
