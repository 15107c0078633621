//! Broadcast pipeline.
//!
//! - `filter`: split collected listings into new and already-sent, pick personal matches
//! - `broadcast`: run one single-flight collect → filter → deliver cycle
//! - `schedule`: trigger cycles on a fixed interval

pub mod broadcast;
pub mod filter;
pub mod schedule;

pub use broadcast::{Broadcaster, CycleOutcome, CycleReport, CycleState};
pub use schedule::run_scheduled;
