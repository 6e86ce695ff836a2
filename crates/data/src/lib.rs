//! `PostgreSQL` storage for the investment engine.
//!
//! This crate provides:
//! - Database client with embedded migrations
//! - Row types mapping tables to domain models
//! - [`PgStore`], the storage-trait implementation the engine runs on

pub mod database;
pub mod rows;
pub mod store;

pub use database::DatabaseClient;
pub use store::PgStore;
