//! Module Sentinel core: file discovery, static per-language dispatch,
//! cross-language detection wiring, symbol resolution, and the incremental
//! orchestrator that drives one indexing pass end to end. `main.rs` is a
//! thin CLI shell over this library.

pub mod adapters;
pub mod config;
pub mod discovery;
pub mod error;
pub mod orchestrator;
pub mod resolver;

pub use config::Config;
pub use error::IndexError;
pub use orchestrator::{run, IndexErrorEntry, IndexResult};
