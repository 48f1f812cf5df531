#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_docs_in_private_items)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::unused_self)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::assigning_clones)]
#![allow(clippy::borrowed_box)]
#![allow(clippy::float_cmp)]
#![allow(clippy::ref_option)]

//! # Context Core
//!
//! The three-tier persistent memory engine behind Context Fabric: an
//! in-process working cache (tier 1), a durable per-project store with
//! BM25 keyword search (tier 2), and a durable global store with
//! embeddings, cosine recall, and time-decay (tier 3), unified behind a
//! hybrid recall pipeline and a smart router.
//!
//! This crate is storage-agnostic: [`traits::Tier2Store`],
//! [`traits::Tier3Store`], and [`traits::CodeIndexStore`] are the seams a
//! concrete backend (a libsql-backed one, for instance) implements and
//! registers via [`traits::StorageFactory`]. [`engine::EngineRegistry`] is
//! the entry point that ties a factory, a configuration, and the shared
//! embedding service together into one or more [`engine::ContextEngine`]s.
//!
//! ## Module organization
//!
//! - [`model`]: the `Memory` entity and its supporting value types
//! - [`api`]: request/response types for every `ContextEngine` operation
//! - [`config`]: typed YAML configuration with environment overrides
//! - [`error`]: the engine-wide error enum
//! - [`router`]: stateless new-memory tier classification
//! - [`tier1`]: the in-process working cache
//! - [`traits`]: storage-backend seams implemented outside this crate
//! - [`embedding`]: text-to-vector conversion, cached and single-flight
//! - [`hybrid`]: the RRF-fused multi-tier recall pipeline
//! - [`decay`]: the tier-3 relevance decay formula and its scheduler
//! - [`code_index`]: per-project source-tree indexing and search
//! - [`engine`]: the `ContextEngine`/`EngineRegistry` facade

pub mod api;
pub mod code_index;
pub mod config;
pub mod decay;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod hybrid;
pub mod model;
pub mod router;
pub mod tier1;
pub mod traits;

pub use config::FabricConfig;
pub use engine::{ContextEngine, EngineRegistry};
pub use error::{Error, Result};
pub use model::{Memory, MemoryType, Tier};
