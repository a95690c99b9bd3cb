//! ReplayPlayerActor state.

use std::time::Duration;

use shared_types::ReplaySnapshot;
use tokio::sync::watch;

use crate::autoplay::AutoplayTimer;
use crate::machine::ReplayMachine;

#[derive(Debug)]
pub struct ReplayPlayerState {
    pub machine: ReplayMachine,
    pub timer: AutoplayTimer,
    pub base_interval: Duration,
    pub snapshots: watch::Sender<ReplaySnapshot>,
}

impl ReplayPlayerState {
    pub fn new(machine: ReplayMachine, base_interval: Duration) -> Self {
        let (snapshots, _) = watch::channel(machine.snapshot());
        Self {
            machine,
            timer: AutoplayTimer::new(),
            base_interval,
            snapshots,
        }
    }

    /// Notify subscribers only when something observable changed.
    pub fn publish(&self) {
        let next = self.machine.snapshot();
        self.snapshots.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
