//! A minimal wiki: named pages, each with an append-only revision history,
//! stored in SQLite.
//!
//! Front ends go through [`service::Wiki`]; `store` holds the SQL and
//! `title` the normalization rules both of them share.

pub mod db;
pub mod logger;
pub mod models;
pub mod output;
pub mod service;
pub mod store;
pub mod title;

pub use db::WikiError;
pub use service::Wiki;
