//! Shared Schemas for the News Aggregator
//!
//! Storage rows (articles and the reference entities they point at) and the
//! provider-agnostic intermediate article record every connector produces.

pub mod common;
pub mod entity;
pub mod article;

pub use common::*;
pub use entity::*;
pub use article::*;

/// Categories seeded into an empty store; they drive category-scoped
/// provider queries.
pub const DEFAULT_CATEGORIES: &[&str] = &[
    "Technology",
    "Business",
    "Sports",
    "Health",
    "Science",
    "Politics",
    "Entertainment",
    "General",
];
