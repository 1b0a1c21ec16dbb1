//! Sendpace Storage - Database layer
//!
//! This crate provides the PostgreSQL pool, the persisted models, and the
//! repositories the scheduling engine and queue processor operate on.

pub mod db;
pub mod models;
pub mod repository;

pub use db::{Database, DatabasePool};
pub use models::*;
pub use repository::*;
