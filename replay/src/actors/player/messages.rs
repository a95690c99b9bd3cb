//! ReplayPlayerActor message types.

use ractor::RpcReplyPort;
use shared_types::{ReplaySnapshot, ReplayStep};
use tokio::sync::watch;

use crate::machine::{ReplayAction, ReplayError};

#[derive(Debug)]
pub enum ReplayPlayerMsg {
    /// Replace the timeline (run identity change). Resets position and
    /// playback, then seeks to `start_step` if given.
    Load {
        run_id: String,
        steps: Vec<ReplayStep>,
        start_step: Option<i64>,
    },
    /// Fire-and-forget navigation intent from the presentation layer.
    Apply(ReplayAction),
    /// Navigation intent that replies with the resulting snapshot.
    Dispatch {
        action: ReplayAction,
        reply: RpcReplyPort<ReplaySnapshot>,
    },
    /// Raw speed multiplier; values outside the supported set are rejected.
    SetSpeedMultiplier {
        multiplier: f64,
        reply: RpcReplyPort<Result<ReplaySnapshot, ReplayError>>,
    },
    /// Internal autoplay tick armed for a play session.
    Tick { session: u64 },
    GetSnapshot {
        reply: RpcReplyPort<ReplaySnapshot>,
    },
    /// Receiver that observes every published snapshot.
    Subscribe {
        reply: RpcReplyPort<watch::Receiver<ReplaySnapshot>>,
    },
    /// Health/debug: play session of the armed tick, if any.
    GetArmedSession { reply: RpcReplyPort<Option<u64>> },
}

#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error("Failed to spawn replay player: {0}")]
    Spawn(String),

    #[error("Replay player RPC error: {0}")]
    Rpc(String),

    #[error(transparent)]
    Replay(#[from] ReplayError),
}
