//! Replay state machine.
//!
//! `Idle` (no steps) → `Paused` on load → `Playing` via `play()`, back to
//! `Paused` via `pause()`, `reset()`, manual navigation, or autoplay reaching
//! the last step. The current index is clamped on every mutation, so it is
//! never observable outside `[0, total_steps - 1]` (0 when empty).
//!
//! Autoplay is driven from outside through [`ReplayMachine::tick`]. Every
//! transition that ends or restarts playback bumps the play session, which is
//! how a tick armed for an earlier session is recognized as stale.

use std::sync::Arc;

use shared_types::{PlaybackSpeed, ReplayPhase, ReplaySnapshot, ReplayStep};

use crate::flow;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReplayError {
    #[error("unsupported playback speed {0}; expected 0.25, 0.5, 1, 2 or 4")]
    UnsupportedSpeed(f64),
}

/// Navigation intents dispatched by the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplayAction {
    Next,
    Previous,
    JumpTo(i64),
    Reset,
    JumpToAgent(String),
    JumpToNextError,
    SetSpeed(PlaybackSpeed),
    Play,
    Pause,
}

/// Result of an autoplay tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The tick belongs to a play session that has since ended.
    Stale,
    /// Advanced one step; `finished` when the last step was reached and
    /// playback paused itself.
    Advanced { index: usize, finished: bool },
}

#[derive(Debug, Clone, Default)]
pub struct ReplayMachine {
    run_id: Option<String>,
    steps: Arc<Vec<ReplayStep>>,
    current_step_index: usize,
    is_playing: bool,
    playback_speed: PlaybackSpeed,
    session: u64,
}

impl ReplayMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_steps(run_id: impl Into<String>, steps: Vec<ReplayStep>) -> Self {
        let mut machine = Self::new();
        machine.load(run_id, steps);
        machine
    }

    /// Replace the timeline. Always lands in `Paused` at step 0 (or `Idle`),
    /// keeping the chosen speed.
    pub fn load(&mut self, run_id: impl Into<String>, steps: Vec<ReplayStep>) {
        self.run_id = Some(run_id.into());
        self.steps = Arc::new(steps);
        self.current_step_index = 0;
        self.stop_session();
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    pub fn steps(&self) -> &[ReplayStep] {
        &self.steps
    }

    pub fn current_step_index(&self) -> usize {
        self.current_step_index
    }

    pub fn current_step(&self) -> Option<&ReplayStep> {
        self.steps.get(self.current_step_index)
    }

    pub fn total_steps(&self) -> usize {
        self.steps.len()
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn playback_speed(&self) -> PlaybackSpeed {
        self.playback_speed
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn is_first_step(&self) -> bool {
        self.current_step_index == 0
    }

    pub fn is_last_step(&self) -> bool {
        self.current_step_index + 1 >= self.total_steps()
    }

    pub fn progress_ratio(&self) -> f64 {
        let total = self.total_steps();
        if total <= 1 {
            return 0.0;
        }
        self.current_step_index as f64 / (total - 1) as f64
    }

    pub fn phase(&self) -> ReplayPhase {
        if self.steps.is_empty() {
            ReplayPhase::Idle
        } else if self.is_playing {
            ReplayPhase::Playing
        } else {
            ReplayPhase::Paused
        }
    }

    pub fn agent_nodes(&self) -> Vec<shared_types::AgentNode> {
        flow::project_agent_nodes(&self.steps, self.current_step_index)
    }

    /// Indices of failing steps, for timeline markers.
    pub fn error_indices(&self) -> Vec<usize> {
        self.steps
            .iter()
            .filter(|step| step.is_failure())
            .map(|step| step.index)
            .collect()
    }

    pub fn snapshot(&self) -> ReplaySnapshot {
        let agent_nodes = self.agent_nodes();
        let flow_edges = flow::flow_edges(&agent_nodes);
        ReplaySnapshot {
            run_id: self.run_id.clone(),
            phase: self.phase(),
            current_step_index: self.current_step_index,
            total_steps: self.total_steps(),
            is_playing: self.is_playing,
            playback_speed: self.playback_speed,
            is_first_step: self.is_first_step(),
            is_last_step: self.is_last_step(),
            progress_ratio: self.progress_ratio(),
            current_step: self.current_step().cloned(),
            agent_nodes,
            flow_edges,
        }
    }

    // ── Transitions ──────────────────────────────────────────────────────────

    /// Apply one action and return the resulting step index.
    pub fn apply(&mut self, action: ReplayAction) -> usize {
        match action {
            ReplayAction::Next => self.next(),
            ReplayAction::Previous => self.previous(),
            ReplayAction::JumpTo(index) => self.jump_to(index),
            ReplayAction::Reset => self.reset(),
            ReplayAction::JumpToAgent(role) => self.jump_to_agent(&role),
            ReplayAction::JumpToNextError => self.jump_to_next_error(),
            ReplayAction::SetSpeed(speed) => {
                self.set_speed(speed);
                self.current_step_index
            }
            ReplayAction::Play => {
                self.play();
                self.current_step_index
            }
            ReplayAction::Pause => {
                self.pause();
                self.current_step_index
            }
        }
    }

    pub fn next(&mut self) -> usize {
        if self.steps.is_empty() {
            return 0;
        }
        let target = (self.current_step_index + 1).min(self.last_index());
        self.seek(target)
    }

    pub fn previous(&mut self) -> usize {
        if self.steps.is_empty() {
            return 0;
        }
        let target = self.current_step_index.saturating_sub(1);
        self.seek(target)
    }

    /// Out-of-range input is clamped, never rejected.
    pub fn jump_to(&mut self, index: i64) -> usize {
        if self.steps.is_empty() {
            return 0;
        }
        let target = self.clamp_index(index);
        self.seek(target)
    }

    pub fn reset(&mut self) -> usize {
        self.current_step_index = 0;
        self.stop_session();
        0
    }

    /// Case-insensitive; an unknown role leaves the state untouched.
    pub fn jump_to_agent(&mut self, role: &str) -> usize {
        match flow::find_agent_first_step(&self.steps, role) {
            Some(target) => self.seek(target),
            None => self.current_step_index,
        }
    }

    /// Forward-only search from the step after the current one; no wrap.
    pub fn jump_to_next_error(&mut self) -> usize {
        let found = self
            .steps
            .iter()
            .skip(self.current_step_index + 1)
            .find(|step| step.is_failure())
            .map(|step| step.index);
        match found {
            Some(target) => self.seek(target),
            None => self.current_step_index,
        }
    }

    /// Takes effect on the next armed tick; never restarts the session.
    pub fn set_speed(&mut self, speed: PlaybackSpeed) {
        self.playback_speed = speed;
    }

    /// Raw multipliers outside the supported set are rejected, state unchanged.
    pub fn set_speed_multiplier(&mut self, multiplier: f64) -> Result<PlaybackSpeed, ReplayError> {
        let speed = PlaybackSpeed::from_multiplier(multiplier)
            .ok_or(ReplayError::UnsupportedSpeed(multiplier))?;
        self.set_speed(speed);
        Ok(speed)
    }

    /// No-op when empty, already playing, or parked on the last step.
    pub fn play(&mut self) -> bool {
        if self.steps.is_empty() || self.is_playing || self.is_last_step() {
            return false;
        }
        self.is_playing = true;
        self.session = self.session.wrapping_add(1);
        true
    }

    pub fn pause(&mut self) {
        if self.is_playing {
            self.stop_session();
        }
    }

    /// Autoplay advance for the given play session.
    pub fn tick(&mut self, session: u64) -> TickOutcome {
        if !self.is_playing || session != self.session {
            return TickOutcome::Stale;
        }
        self.current_step_index = (self.current_step_index + 1).min(self.last_index());
        let finished = self.is_last_step();
        if finished {
            self.stop_session();
        }
        TickOutcome::Advanced {
            index: self.current_step_index,
            finished,
        }
    }

    // ── Internals ────────────────────────────────────────────────────────────

    fn last_index(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }

    fn clamp_index(&self, index: i64) -> usize {
        if index <= 0 {
            return 0;
        }
        usize::try_from(index)
            .unwrap_or(usize::MAX)
            .min(self.last_index())
    }

    /// Manual navigation: move and end any play session.
    fn seek(&mut self, target: usize) -> usize {
        self.current_step_index = target.min(self.last_index());
        if self.is_playing {
            self.stop_session();
        }
        self.current_step_index
    }

    fn stop_session(&mut self) {
        self.is_playing = false;
        self.session = self.session.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shared_types::StepPayload;

    fn steps(count: usize) -> Vec<ReplayStep> {
        (0..count)
            .map(|index| ReplayStep {
                index,
                agent_role: "Agent".to_string(),
                agent_key: "agent".to_string(),
                timestamp: Utc::now(),
                data: StepPayload::Memory {
                    record: serde_json::Value::Null,
                },
            })
            .collect()
    }

    #[test]
    fn test_idle_machine_ignores_navigation() {
        let mut machine = ReplayMachine::new();
        assert_eq!(machine.phase(), ReplayPhase::Idle);
        assert_eq!(machine.next(), 0);
        assert_eq!(machine.previous(), 0);
        assert_eq!(machine.jump_to(12), 0);
        assert!(!machine.play());
        assert_eq!(machine.progress_ratio(), 0.0);
        assert!(machine.current_step().is_none());
    }

    #[test]
    fn test_tick_rejects_stale_session() {
        let mut machine = ReplayMachine::with_steps("run", steps(5));
        assert!(machine.play());
        let session = machine.session();

        machine.pause();
        assert_eq!(machine.tick(session), TickOutcome::Stale);
        assert_eq!(machine.current_step_index(), 0);

        assert!(machine.play());
        assert_eq!(machine.tick(session), TickOutcome::Stale);
        assert_eq!(
            machine.tick(machine.session()),
            TickOutcome::Advanced {
                index: 1,
                finished: false
            }
        );
    }

    #[test]
    fn test_tick_pauses_on_last_step() {
        let mut machine = ReplayMachine::with_steps("run", steps(2));
        machine.play();
        let outcome = machine.tick(machine.session());
        assert_eq!(
            outcome,
            TickOutcome::Advanced {
                index: 1,
                finished: true
            }
        );
        assert!(!machine.is_playing());
        assert_eq!(machine.phase(), ReplayPhase::Paused);
    }

    #[test]
    fn test_set_speed_keeps_session() {
        let mut machine = ReplayMachine::with_steps("run", steps(3));
        machine.play();
        let session = machine.session();
        machine.set_speed(PlaybackSpeed::Quadruple);
        assert_eq!(machine.session(), session);
        assert!(machine.is_playing());
    }

    #[test]
    fn test_manual_navigation_stops_playback() {
        let mut machine = ReplayMachine::with_steps("run", steps(4));
        machine.play();
        let session = machine.session();
        assert_eq!(machine.next(), 1);
        assert!(!machine.is_playing());
        assert_ne!(machine.session(), session);
    }

    #[test]
    fn test_load_resets_position_and_keeps_speed() {
        let mut machine = ReplayMachine::with_steps("run-a", steps(6));
        machine.set_speed(PlaybackSpeed::Half);
        machine.jump_to(4);
        machine.play();

        machine.load("run-b", steps(3));
        assert_eq!(machine.run_id(), Some("run-b"));
        assert_eq!(machine.current_step_index(), 0);
        assert!(!machine.is_playing());
        assert_eq!(machine.playback_speed(), PlaybackSpeed::Half);
    }
}
