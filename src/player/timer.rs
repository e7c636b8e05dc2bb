//! Single armed timer per session
//!
//! A session never has more than one pending deadline. Arming always
//! cancels the previous timer, so a stale duration timer cannot fire against
//! a clip that already advanced through another path.

use crate::player::LoadId;
use log::debug;
use std::time::Duration;

/// What happens when the timer fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// The visible clip's play duration elapsed
    ClipDuration { load: LoadId },

    /// Gave up waiting for the incoming slot to become ready
    PreloadTimeout,

    /// The crossfade window closed
    FadeComplete,
}

/// A pending deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmedTimer {
    pub kind: TimerKind,
    pub deadline: Duration,
}

/// Holder for the session's only timer
#[derive(Debug, Default)]
pub struct TimerSlot {
    armed: Option<ArmedTimer>,
}

impl TimerSlot {
    pub fn new() -> Self {
        Self { armed: None }
    }

    /// Arm a timer, cancelling any pending one
    pub fn arm(&mut self, kind: TimerKind, deadline: Duration) {
        if let Some(previous) = self.armed.take() {
            debug!("Cancelled {:?} timer due at {:?}", previous.kind, previous.deadline);
        }
        debug!("Armed {:?} timer for {:?}", kind, deadline);
        self.armed = Some(ArmedTimer { kind, deadline });
    }

    pub fn cancel(&mut self) {
        if let Some(previous) = self.armed.take() {
            debug!("Cancelled {:?} timer due at {:?}", previous.kind, previous.deadline);
        }
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.armed.map(|t| t.deadline)
    }

    pub fn armed(&self) -> Option<ArmedTimer> {
        self.armed
    }

    /// Disarm and return the timer if its deadline has passed
    pub fn take_due(&mut self, now: Duration) -> Option<ArmedTimer> {
        match self.armed {
            Some(timer) if timer.deadline <= now => self.armed.take(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arm_replaces_previous() {
        let mut timer = TimerSlot::new();
        timer.arm(TimerKind::ClipDuration { load: LoadId(1) }, Duration::from_secs(5));
        timer.arm(TimerKind::FadeComplete, Duration::from_secs(2));

        assert_eq!(timer.deadline(), Some(Duration::from_secs(2)));
        assert_eq!(timer.take_due(Duration::from_secs(6)).map(|t| t.kind), Some(TimerKind::FadeComplete));
        assert!(timer.take_due(Duration::from_secs(6)).is_none());
    }

    #[test]
    fn test_not_due_yet() {
        let mut timer = TimerSlot::new();
        timer.arm(TimerKind::PreloadTimeout, Duration::from_millis(1500));
        assert!(timer.take_due(Duration::from_millis(1499)).is_none());
        assert!(timer.armed().is_some());
        assert!(timer.take_due(Duration::from_millis(1500)).is_some());
    }

    #[test]
    fn test_cancel() {
        let mut timer = TimerSlot::new();
        timer.arm(TimerKind::FadeComplete, Duration::from_secs(1));
        timer.cancel();
        assert_eq!(timer.deadline(), None);
        assert!(timer.take_due(Duration::from_secs(10)).is_none());
    }
}
