//! Launch-time tracing
//!
//! Records how long each startup phase takes. Disabled timers only keep the
//! start instant and never emit.

use super::{Logger, LOG_TARGET};
use std::cell::Cell;
use std::time::{Duration, Instant};
use tracing::debug;

/// Startup phase timer
#[derive(Debug)]
pub struct LaunchTimer {
    logger: Logger,
    enabled: bool,
    start: Instant,
    last: Cell<Instant>,
}

impl LaunchTimer {
    /// Start timing; checkpoints are emitted only when `enabled`
    pub fn start(logger: Logger, enabled: bool) -> Self {
        let now = Instant::now();
        Self {
            logger,
            enabled,
            start: now,
            last: Cell::new(now),
        }
    }

    /// Timer that never emits
    pub fn disabled() -> Self {
        Self::start(Logger::disabled(), false)
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Time since [`start`](Self::start)
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Record the end of a startup phase
    pub fn checkpoint(&self, phase: &str) {
        if !self.enabled {
            return;
        }

        let now = Instant::now();
        let total = now.duration_since(self.start);
        let delta = now.duration_since(self.last.replace(now));

        debug!(
            target: LOG_TARGET,
            event = "launch_checkpoint",
            phase,
            total_us = total.as_micros() as u64,
            delta_us = delta.as_micros() as u64,
        );
        crate::bridge_log!(
            self.logger,
            "{}: {} us since launch ({} us since previous checkpoint)",
            phase,
            total.as_micros(),
            delta.as_micros()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_timer_keeps_time() {
        let timer = LaunchTimer::disabled();
        assert!(!timer.is_enabled());
        timer.checkpoint("ignored");
        assert!(timer.elapsed() >= Duration::ZERO);
    }

    #[test]
    fn test_checkpoint_advances() {
        let timer = LaunchTimer::start(Logger::new(1), true);
        let before = timer.last.get();
        std::thread::sleep(Duration::from_millis(1));
        timer.checkpoint("phase one");
        assert!(timer.last.get() > before);
    }
}
