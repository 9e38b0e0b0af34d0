//! State module for tracking the engine lifecycle
//!
//! # Components
//!
//! - `EngineStatus`: the `FREE -> ACTIVE -> CLOSING -> FREE` state machine
//! - `Lifecycle`: publishes the status, tags each crawl run with a generation,
//!   and counts in-flight work so a stop request can wait for it to drain
//! - `ActivityProbe`: the "is this run still active" check every crawl
//!   operation performs at its checkpoints

mod engine_status;
mod lifecycle;

// Re-export main types
pub use engine_status::EngineStatus;
pub use lifecycle::{ActivityProbe, InFlightGuard, Lifecycle, Phase};
