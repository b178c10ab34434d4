use geo_core::time::{DurationMs, TimeMs};

/// Leading-edge throttle.
///
/// The first call fires immediately; calls within `limit` of the last fire
/// are dropped. The first call after the window fires again and restarts the
/// window. There is no trailing-call guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throttle {
    limit: DurationMs,
    last_fired: Option<TimeMs>,
}

impl Throttle {
    pub fn new(limit: DurationMs) -> Self {
        Self {
            limit,
            last_fired: None,
        }
    }

    /// Returns true iff this call is allowed to execute.
    pub fn try_fire(&mut self, now: TimeMs) -> bool {
        let allowed = match self.last_fired {
            None => true,
            Some(last) => now.elapsed_since(last) >= self.limit,
        };
        if allowed {
            self.last_fired = Some(now);
        }
        allowed
    }

    pub fn reset(&mut self) {
        self.last_fired = None;
    }
}

#[cfg(test)]
mod tests {
    use super::Throttle;
    use geo_core::time::{DurationMs, TimeMs};

    #[test]
    fn first_call_fires_immediately() {
        let mut t = Throttle::new(DurationMs(500));
        assert!(t.try_fire(TimeMs(0)));
    }

    #[test]
    fn calls_inside_the_window_are_dropped() {
        let mut t = Throttle::new(DurationMs(500));
        assert!(t.try_fire(TimeMs(0)));
        assert!(!t.try_fire(TimeMs(100)));
        assert!(!t.try_fire(TimeMs(499)));
    }

    #[test]
    fn next_call_after_the_window_restarts_it() {
        let mut t = Throttle::new(DurationMs(500));
        assert!(t.try_fire(TimeMs(0)));
        assert!(t.try_fire(TimeMs(500)));
        // The window restarted at t=500, so t=900 is still inside it.
        assert!(!t.try_fire(TimeMs(900)));
        assert!(t.try_fire(TimeMs(1000)));
    }

    #[test]
    fn reset_allows_an_immediate_fire() {
        let mut t = Throttle::new(DurationMs(500));
        assert!(t.try_fire(TimeMs(0)));
        t.reset();
        assert!(t.try_fire(TimeMs(1)));
    }
}
