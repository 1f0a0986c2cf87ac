//! Local SQLite mirror of the destination table.
//!
//! This module is split into two submodules:
//! - `model`: rows read back from the mirror.
//! - `repo`: SQL-only functions for the mirror table.
//!
//! The repository API is re-exported at `article_sync::db::*`.

pub mod model;
pub mod repo;

pub use repo::*;

pub use model::StoredArticle;
