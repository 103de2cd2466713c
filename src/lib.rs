//! # Headline Harvester
//!
//! Collects economic news metadata from Google News and publisher RSS feeds,
//! narrows it down with an LLM relevance classifier, and pulls full article
//! text through a pooled headless browser.
//!
//! ## Architecture
//!
//! A run is a pipeline ([`pipeline::AcquisitionPipeline`]):
//! 1. **Collecting**: query every feed source sequentially ([`collector`])
//! 2. **Deduplicating**: drop repeated URLs, then near-identical titles ([`dedup`])
//! 3. **Title filtering**: keep the most relevant headlines ([`filter`])
//! 4. **Extracting**: render each page and find the article body ([`extractor`]),
//!    never holding more pages than the pool allows ([`pool`], [`browser`])
//! 5. **Content filtering**: keep the best few articles by body ([`filter`])
//!
//! The result is a [`models::CollectionResult`] written as JSON ([`outputs`]),
//! optionally followed by a drafted script ([`script`]).

pub mod api;
pub mod browser;
pub mod classifier;
pub mod cli;
pub mod collector;
pub mod config;
pub mod dedup;
pub mod error;
pub mod extractor;
pub mod filter;
pub mod models;
pub mod outputs;
pub mod pipeline;
pub mod pool;
pub mod retry;
pub mod script;
pub mod utils;
