//! Single-slot autoplay timer.
//!
//! At most one tick is armed at a time; arming replaces (and aborts) the
//! previous one. The timer is a spawned tokio task holding a `JoinHandle`,
//! cancelled explicitly on every transition and again on drop.

use std::time::Duration;

use shared_types::PlaybackSpeed;
use tokio::task::JoinHandle;

/// Delay between autoplay ticks at the given speed.
pub fn tick_interval(base_interval: Duration, speed: PlaybackSpeed) -> Duration {
    base_interval.div_f64(speed.multiplier())
}

struct ArmedTick {
    session: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
pub struct AutoplayTimer {
    armed: Option<ArmedTick>,
}

impl std::fmt::Debug for AutoplayTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoplayTimer")
            .field("armed_session", &self.armed_session())
            .finish()
    }
}

impl AutoplayTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a tick for `session` that runs `fire` after `delay`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm<F>(&mut self, session: u64, delay: Duration, fire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();
        tracing::trace!(session, delay_ms = delay.as_millis() as u64, "Arming autoplay tick");
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            fire();
        });
        self.armed = Some(ArmedTick { session, handle });
    }

    /// Abort the armed tick, if any. Returns whether one was armed.
    pub fn cancel(&mut self) -> bool {
        match self.armed.take() {
            Some(armed) => {
                armed.handle.abort();
                tracing::trace!(session = armed.session, "Cancelled autoplay tick");
                true
            }
            None => false,
        }
    }

    /// Clear the slot once the tick for `session` has been delivered.
    pub fn fired(&mut self, session: u64) {
        if self.armed_session() == Some(session) {
            self.armed = None;
        }
    }

    pub fn armed_session(&self) -> Option<u64> {
        self.armed.as_ref().map(|armed| armed.session)
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }
}

impl Drop for AutoplayTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_tick_interval_scales_with_speed() {
        let base = Duration::from_millis(1_000);
        assert_eq!(tick_interval(base, PlaybackSpeed::Quarter), Duration::from_millis(4_000));
        assert_eq!(tick_interval(base, PlaybackSpeed::Half), Duration::from_millis(2_000));
        assert_eq!(tick_interval(base, PlaybackSpeed::Normal), Duration::from_millis(1_000));
        assert_eq!(tick_interval(base, PlaybackSpeed::Double), Duration::from_millis(500));
        assert_eq!(tick_interval(base, PlaybackSpeed::Quadruple), Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_tick_never_fires() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut timer = AutoplayTimer::new();

        let counter = fired.clone();
        timer.arm(1, Duration::from_millis(100), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(timer.is_armed());
        assert!(timer.cancel());
        assert!(!timer.is_armed());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_previous_tick() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut timer = AutoplayTimer::new();

        for session in 1..=3 {
            let counter = fired.clone();
            timer.arm(session, Duration::from_millis(100), move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(timer.armed_session(), Some(3));

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1, "only the last armed tick fires");
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_armed_tick() {
        let fired = Arc::new(AtomicUsize::new(0));
        {
            let mut timer = AutoplayTimer::new();
            let counter = fired.clone();
            timer.arm(7, Duration::from_millis(100), move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fired_only_clears_matching_session() {
        let mut timer = AutoplayTimer::new();
        timer.arm(2, Duration::from_secs(60), || {});
        timer.fired(1);
        assert_eq!(timer.armed_session(), Some(2));
        timer.fired(2);
        assert!(!timer.is_armed());
    }
}
