// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Periodic scrub requests for an external memory scrubber.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScrubEvent {
    Requested,
    /// The interval elapsed again before the last request was acknowledged.
    Overrun,
}

/// Raises a scrub request every `interval` ticks. An interval of zero
/// disables requests.
#[derive(Clone, Debug, Default)]
pub struct ScrubTimer {
    interval: u64,
    next_due: u64,
    pending: bool,
}

impl ScrubTimer {
    #[must_use]
    pub fn new(interval: u64) -> Self {
        Self {
            interval,
            next_due: interval,
            pending: false,
        }
    }

    #[must_use]
    pub fn interval(&self) -> u64 {
        self.interval
    }

    /// Restart the timer from `now`.
    pub fn set_interval(&mut self, now: u64, interval: u64) {
        self.interval = interval;
        self.next_due = now + interval;
    }

    pub fn tick(&mut self, now: u64) -> Option<ScrubEvent> {
        if self.interval == 0 || now < self.next_due {
            return None;
        }
        self.next_due = now + self.interval;
        if self.pending {
            Some(ScrubEvent::Overrun)
        } else {
            self.pending = true;
            Some(ScrubEvent::Requested)
        }
    }

    #[must_use]
    pub fn pending(&self) -> bool {
        self.pending
    }

    pub fn acknowledge(&mut self) {
        self.pending = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn periodic_requests() {
        let mut timer = ScrubTimer::new(10);
        let events: Vec<_> = (0..25).filter_map(|t| timer.tick(t).map(|e| (t, e))).collect();
        assert_eq!(
            events,
            vec![(10, ScrubEvent::Requested), (20, ScrubEvent::Overrun)]
        );
        assert!(timer.pending());
        timer.acknowledge();
        assert_eq!(timer.tick(30), Some(ScrubEvent::Requested));
    }

    #[test]
    fn disabled() {
        let mut timer = ScrubTimer::new(0);
        assert!((0..100).all(|t| timer.tick(t).is_none()));
        timer.set_interval(100, 5);
        assert_eq!(timer.tick(104), None);
        assert_eq!(timer.tick(105), Some(ScrubEvent::Requested));
    }
}
