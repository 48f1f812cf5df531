#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

//! # Context Storage
//!
//! libSQL-backed implementations of the storage-agnostic traits defined in
//! `context-core`: [`tier2::LibsqlTier2Store`] (durable per-project store),
//! [`tier3::LibsqlTier3Store`] (durable global semantic store), and
//! [`code_index::LibsqlCodeIndexStore`] (per-project source index), wired
//! together by [`factory::LibsqlStorageFactory`].
//!
//! ## Module organization
//!
//! - [`schema`]: row-table DDL for the durable tiers and the code index
//! - [`fts5_schema`]: FTS5 virtual tables, sync triggers, and BM25 normalization
//! - [`db`]: opens a libsql database file and applies its schema
//! - [`rows`]: `Memory`/`CodeChunk`/`CodeSymbol` <-> SQL row conversion
//! - [`error`]: wraps libsql errors as `context_core::Error::StoreUnavailable`
//! - [`tier2`]: the durable per-project store
//! - [`tier3`]: the durable global semantic store
//! - [`code_index`]: the per-project source-code index store
//! - [`factory`]: the `StorageFactory` that opens all of the above

mod code_index;
mod db;
mod error;
mod factory;
mod fts5_schema;
mod rows;
mod schema;
mod tier2;
mod tier3;

pub use code_index::LibsqlCodeIndexStore;
pub use factory::LibsqlStorageFactory;
pub use tier2::LibsqlTier2Store;
pub use tier3::LibsqlTier3Store;
