//! Translation resolution engine.
//!
//! A request goes through a two-level cache, then a chunker for long input,
//! then a priority-ordered chain of providers ending in a phrase dictionary.
//! Resolution never fails: when every provider fails the original text is
//! returned with `service = "none"`, confidence 0 and an error message.

pub mod audit;
pub mod batch;
pub mod cache;
pub mod chain;
pub mod chunker;
pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod normalize;
pub mod providers;
pub mod redis_cache;
pub mod resolution;
pub mod retry;
pub mod script;
pub mod server;

pub use engine::Translator;
pub use resolution::{ResolutionResult, Resolve};
