//! Run replay engine
//!
//! Turns a completed agent run into a step-by-step replay:
//! - `timeline` merges the run's memory, compliance, x402 and tool call
//!   records into one deterministic ordered step list
//! - `machine` is the replay state machine (navigation, play/pause, speed)
//! - `actors::player` owns one run view, drives autoplay ticks and publishes
//!   snapshots
//! - `flow` projects the agent-centric view of the timeline

pub mod actors;
pub mod autoplay;
pub mod config;
pub mod deep_link;
pub mod flow;
pub mod machine;
pub mod source;
pub mod timeline;

pub use actors::{ReplayPlayer, ReplayPlayerArguments};
pub use config::ReplayConfig;
pub use machine::{ReplayAction, ReplayError, ReplayMachine};
pub use timeline::{build_timeline, Timeline};
