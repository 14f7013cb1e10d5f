//! Mood-aware media recommendations over a shared multilingual embedding space.
//!
//! mediarec embeds a free-text query (a mood plus a phrase) with a sentence
//! embedding model and returns the five nearest titles from a mixed catalog of
//! board games, books and movies. It also ships a TF-IDF mood classifier and a
//! scraper that rebuilds the book catalog from a public listing page.
//!
//! # Architecture
//!
//! - **Embeddings**: local ONNX Runtime with a multilingual sentence model
//! - **Search**: brute-force kNN in an in-memory
//!   [sqlite-vec](https://github.com/asg017/sqlite-vec) `vec0` table
//! - **Transport**: CLI, or MCP over stdio / Streamable HTTP
//!
//! # Modules
//!
//! - [`catalog`]: media types and per-type title lists
//! - [`index`]: reference table, kNN index and index build
//! - [`recommend`]: query composition and the recommender
//! - [`mood`]: mood classifier training and inference
//! - [`scrape`]: book dataset scraper

pub mod catalog;
pub mod cli;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod index;
pub mod mood;
pub mod recommend;
pub mod scrape;
pub mod server;
pub mod tools;
