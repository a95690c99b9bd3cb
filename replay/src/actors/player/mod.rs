//! ReplayPlayerActor - single owner of one run view's replay state.
//!
//! Serializes every navigation intent and autoplay tick for one run view,
//! keeps at most one autoplay tick armed, and publishes a snapshot to
//! subscribers after each transition. Stopping the actor cancels the armed
//! tick before the state is dropped.

mod messages;
mod state;

use std::time::Duration;

use async_trait::async_trait;
use ractor::{Actor, ActorProcessingErr, ActorRef};
use shared_types::{PlaybackSpeed, ReplaySnapshot, ReplayStep};
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub use messages::{PlayerError, ReplayPlayerMsg};
pub use state::ReplayPlayerState;

use crate::autoplay::tick_interval;
use crate::machine::{ReplayAction, ReplayMachine, TickOutcome};

#[derive(Debug, Default)]
pub struct ReplayPlayerActor;

#[derive(Debug, Clone)]
pub struct ReplayPlayerArguments {
    /// Tick interval at 1x speed.
    pub base_interval: Duration,
    pub initial_speed: PlaybackSpeed,
    /// Run to load on start; `None` starts `Idle`.
    pub run_id: Option<String>,
    pub steps: Vec<ReplayStep>,
    /// Deep-link seed, clamped into range.
    pub start_step: Option<i64>,
}

impl Default for ReplayPlayerArguments {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_millis(shared_types::DEFAULT_BASE_INTERVAL_MS),
            initial_speed: PlaybackSpeed::Normal,
            run_id: None,
            steps: Vec::new(),
            start_step: None,
        }
    }
}

#[async_trait]
impl Actor for ReplayPlayerActor {
    type Msg = ReplayPlayerMsg;
    type State = ReplayPlayerState;
    type Arguments = ReplayPlayerArguments;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let mut machine = ReplayMachine::new();
        machine.set_speed(args.initial_speed);
        if let Some(run_id) = args.run_id {
            machine.load(run_id, args.steps);
            if let Some(start_step) = args.start_step {
                machine.jump_to(start_step);
            }
        }

        tracing::info!(
            actor_id = %myself.get_id(),
            run_id = machine.run_id().unwrap_or_default(),
            total_steps = machine.total_steps(),
            current_step_index = machine.current_step_index(),
            speed = %machine.playback_speed(),
            "ReplayPlayerActor starting"
        );

        Ok(ReplayPlayerState::new(machine, args.base_interval))
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            ReplayPlayerMsg::Load {
                run_id,
                steps,
                start_step,
            } => {
                tracing::info!(
                    run_id = %run_id,
                    total_steps = steps.len(),
                    start_step = ?start_step,
                    "Loading run into replay player"
                );
                state.machine.load(run_id, steps);
                if let Some(start_step) = start_step {
                    state.machine.jump_to(start_step);
                }
            }
            ReplayPlayerMsg::Apply(action) => {
                Self::apply_action(state, action);
            }
            ReplayPlayerMsg::Dispatch { action, reply } => {
                Self::apply_action(state, action);
                Self::reconcile_autoplay(&myself, state);
                state.publish();
                let _ = reply.send(state.machine.snapshot());
                return Ok(());
            }
            ReplayPlayerMsg::SetSpeedMultiplier { multiplier, reply } => {
                let result = state
                    .machine
                    .set_speed_multiplier(multiplier)
                    .map(|_| state.machine.snapshot());
                if let Err(err) = &result {
                    tracing::warn!(error = %err, "Rejected playback speed");
                }
                state.publish();
                let _ = reply.send(result);
                return Ok(());
            }
            ReplayPlayerMsg::Tick { session } => {
                state.timer.fired(session);
                match state.machine.tick(session) {
                    TickOutcome::Stale => {
                        tracing::debug!(
                            session,
                            current_session = state.machine.session(),
                            "Ignoring stale autoplay tick"
                        );
                    }
                    TickOutcome::Advanced { index, finished } => {
                        tracing::debug!(session, index, finished, "Autoplay advanced");
                        if finished {
                            tracing::info!(
                                run_id = state.machine.run_id().unwrap_or_default(),
                                index,
                                "Autoplay reached the last step"
                            );
                        }
                    }
                }
            }
            ReplayPlayerMsg::GetSnapshot { reply } => {
                let _ = reply.send(state.machine.snapshot());
                return Ok(());
            }
            ReplayPlayerMsg::Subscribe { reply } => {
                let _ = reply.send(state.snapshots.subscribe());
                return Ok(());
            }
            ReplayPlayerMsg::GetArmedSession { reply } => {
                let _ = reply.send(state.timer.armed_session());
                return Ok(());
            }
        }

        Self::reconcile_autoplay(&myself, state);
        state.publish();
        Ok(())
    }

    async fn post_stop(
        &self,
        myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        let cancelled = state.timer.cancel();
        tracing::info!(
            actor_id = %myself.get_id(),
            run_id = state.machine.run_id().unwrap_or_default(),
            cancelled_tick = cancelled,
            "ReplayPlayerActor stopped"
        );
        Ok(())
    }
}

impl ReplayPlayerActor {
    fn apply_action(state: &mut ReplayPlayerState, action: ReplayAction) {
        tracing::debug!(action = ?action, "Applying replay action");
        let index = state.machine.apply(action);
        tracing::trace!(index, playing = state.machine.is_playing(), "Replay action applied");
    }

    /// Keep exactly one tick armed for the current play session while
    /// playing, and none otherwise.
    fn reconcile_autoplay(myself: &ActorRef<ReplayPlayerMsg>, state: &mut ReplayPlayerState) {
        if !state.machine.is_playing() {
            state.timer.cancel();
            return;
        }

        let session = state.machine.session();
        if state.timer.armed_session() == Some(session) {
            // Speed changes apply from the next armed tick.
            return;
        }

        let delay = tick_interval(state.base_interval, state.machine.playback_speed());
        let actor = myself.clone();
        state.timer.arm(session, delay, move || {
            if actor.cast(ReplayPlayerMsg::Tick { session }).is_err() {
                tracing::debug!(session, "Autoplay tick fired after player stopped");
            }
        });
    }
}

// ── Handle ───────────────────────────────────────────────────────────────────

/// Thin async wrapper around the player's `ActorRef`.
#[derive(Debug, Clone)]
pub struct ReplayPlayer {
    actor: ActorRef<ReplayPlayerMsg>,
}

impl ReplayPlayer {
    pub async fn spawn(
        args: ReplayPlayerArguments,
    ) -> Result<(Self, JoinHandle<()>), PlayerError> {
        let (actor, handle) = Actor::spawn(None, ReplayPlayerActor, args)
            .await
            .map_err(|e| PlayerError::Spawn(e.to_string()))?;
        Ok((Self { actor }, handle))
    }

    pub fn actor(&self) -> &ActorRef<ReplayPlayerMsg> {
        &self.actor
    }

    pub fn load(
        &self,
        run_id: impl Into<String>,
        steps: Vec<ReplayStep>,
        start_step: Option<i64>,
    ) -> Result<(), PlayerError> {
        self.actor
            .cast(ReplayPlayerMsg::Load {
                run_id: run_id.into(),
                steps,
                start_step,
            })
            .map_err(|e| PlayerError::Rpc(ractor::RactorErr::from(e).to_string()))
    }

    /// Fire-and-forget navigation intent; ordered with every other message.
    pub fn apply(&self, action: ReplayAction) -> Result<(), PlayerError> {
        self.actor
            .cast(ReplayPlayerMsg::Apply(action))
            .map_err(|e| PlayerError::Rpc(ractor::RactorErr::from(e).to_string()))
    }

    pub async fn dispatch(&self, action: ReplayAction) -> Result<ReplaySnapshot, PlayerError> {
        ractor::call!(self.actor, |reply| ReplayPlayerMsg::Dispatch { action, reply })
            .map_err(|e| PlayerError::Rpc(e.to_string()))
    }

    pub async fn set_speed_multiplier(&self, multiplier: f64) -> Result<ReplaySnapshot, PlayerError> {
        let result = ractor::call!(self.actor, |reply| ReplayPlayerMsg::SetSpeedMultiplier {
            multiplier,
            reply
        })
        .map_err(|e| PlayerError::Rpc(e.to_string()))?;
        Ok(result?)
    }

    pub async fn snapshot(&self) -> Result<ReplaySnapshot, PlayerError> {
        ractor::call!(self.actor, |reply| ReplayPlayerMsg::GetSnapshot { reply })
            .map_err(|e| PlayerError::Rpc(e.to_string()))
    }

    pub async fn subscribe(&self) -> Result<watch::Receiver<ReplaySnapshot>, PlayerError> {
        ractor::call!(self.actor, |reply| ReplayPlayerMsg::Subscribe { reply })
            .map_err(|e| PlayerError::Rpc(e.to_string()))
    }

    pub async fn armed_session(&self) -> Result<Option<u64>, PlayerError> {
        ractor::call!(self.actor, |reply| ReplayPlayerMsg::GetArmedSession { reply })
            .map_err(|e| PlayerError::Rpc(e.to_string()))
    }

    /// Tear down the run view's player; the armed tick is cancelled in `post_stop`.
    pub fn stop(&self) {
        self.actor.stop(None);
    }
}
