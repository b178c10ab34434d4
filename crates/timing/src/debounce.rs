use geo_core::time::{DurationMs, TimeMs};

/// Trailing-edge debounce, expressed as a pure state machine.
///
/// There are no timer threads here: the host calls `trigger` on each burst
/// event and `poll` from its event loop with an explicit `now`. `poll`
/// returns true exactly once per quiet period, `delay` after the last
/// trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Debouncer {
    delay: DurationMs,
    deadline: Option<TimeMs>,
}

impl Debouncer {
    pub fn new(delay: DurationMs) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// Arms (or re-arms) the trailing deadline at `now + delay`.
    ///
    /// Each call resets the pending deadline, collapsing a burst into a
    /// single trailing fire.
    pub fn trigger(&mut self, now: TimeMs) {
        self.deadline = Some(now.add(self.delay));
    }

    /// Returns true when the armed deadline has passed, then disarms.
    pub fn poll(&mut self, now: TimeMs) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Disarms without firing. Safe to call on all exit paths.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<TimeMs> {
        self.deadline
    }
}

/// Debounce with an optional leading edge.
///
/// With `immediate` set, the first trigger of a quiet period fires right away
/// (the return value of `trigger`) and further triggers are suppressed until
/// `delay` elapses without one; there is no trailing fire in that mode.
/// Without `immediate`, this behaves exactly like [`Debouncer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvancedDebouncer {
    delay: DurationMs,
    immediate: bool,
    deadline: Option<TimeMs>,
}

impl AdvancedDebouncer {
    pub fn new(delay: DurationMs, immediate: bool) -> Self {
        Self {
            delay,
            immediate,
            deadline: None,
        }
    }

    /// Registers an invocation. Returns true iff this call should execute
    /// immediately (leading edge of a quiet period in `immediate` mode).
    pub fn trigger(&mut self, now: TimeMs) -> bool {
        let leading_fire = self.immediate && self.deadline.is_none();
        self.deadline = Some(now.add(self.delay));
        leading_fire
    }

    /// Returns true iff a trailing fire is due (never in `immediate` mode).
    pub fn poll(&mut self, now: TimeMs) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                !self.immediate
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }
}
