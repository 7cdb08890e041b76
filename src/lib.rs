//! Offline natural-language search over a personal knowledge base.
//!
//! The knowledge base is a directory of markdown files, one per topic. Every
//! `# heading` starts a record: the heading is the question, the text up to
//! the next heading is the answer. lia answers a free-form question with the
//! record whose heading is semantically closest, and turns the same files
//! into spaced-repetition flashcards.
//!
//! # Architecture
//!
//! - **Embeddings**: local ONNX Runtime with all-MiniLM-L6-v2 (384 dimensions)
//! - **Matching**: a resident service keeps the model and the per-record
//!   embedding cache warm; short-lived CLI invocations talk to it over a Unix
//!   socket and start it on demand
//! - **Ranking**: topic keyword pre-filter, cosine similarity, top 3 with a
//!   deterministic tie-break
//! - **Review**: groups of 7 records scheduled at 1, 2, 7 and 20 day intervals,
//!   persisted in SQLite
//!
//! # Modules
//!
//! - [`config`]: configuration from TOML files and environment variables
//! - [`db`]: SQLite initialization, schema and migrations
//! - [`embedding`]: embedding provider and per-record cache
//! - [`error`]: domain error taxonomy
//! - [`history`]: query history file
//! - [`knowledge`]: topic files parsed into records
//! - [`review`]: review groups, schedule and sessions
//! - [`search`]: the query pipeline
//! - [`service`]: resident matching service and its client

pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod history;
pub mod knowledge;
pub mod review;
pub mod search;
pub mod service;
