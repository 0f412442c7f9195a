//! # dgenerate-store
//!
//! Relational storage for the guessing game, backed by SQLite.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides typed helpers for challenges, users
//! and the append-only guess ledger. Player statistics are aggregated from
//! the guess table on read rather than kept as separate counters.

pub mod challenges;
pub mod database;
pub mod guesses;
pub mod migrations;
pub mod models;
pub mod users;

mod error;
mod row;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
