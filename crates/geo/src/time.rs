use serde::{Deserialize, Serialize};

/// Milliseconds since an arbitrary epoch.
///
/// This is the primary timebase for the caching and viewport layers. Library
/// code never reads the wall clock; callers pass an explicit `now` into every
/// time-sensitive operation so behavior can be recorded and replayed.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct TimeMs(pub u64);

/// A span of milliseconds.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct DurationMs(pub u64);

impl TimeMs {
    /// Saturating age computation; a timestamp from the "future" reads as 0.
    pub fn elapsed_since(self, earlier: TimeMs) -> DurationMs {
        DurationMs(self.0.saturating_sub(earlier.0))
    }

    pub fn add(self, d: DurationMs) -> TimeMs {
        TimeMs(self.0.saturating_add(d.0))
    }
}

impl DurationMs {
    pub fn from_secs(secs: u64) -> Self {
        DurationMs(secs * 1000)
    }
}

/// Wall-clock source for the application boundary.
///
/// Only the outermost layer (CLI, UI glue) should hold one of these; library
/// code takes explicit `TimeMs` parameters instead.
pub trait Clock {
    fn now(&self) -> TimeMs;
}

/// Milliseconds since the UNIX epoch.
#[derive(Debug, Default, Copy, Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> TimeMs {
        let elapsed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        TimeMs(elapsed.as_millis() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::{DurationMs, TimeMs};

    #[test]
    fn elapsed_is_saturating() {
        let earlier = TimeMs(1000);
        let later = TimeMs(1500);
        assert_eq!(later.elapsed_since(earlier), DurationMs(500));
        assert_eq!(earlier.elapsed_since(later), DurationMs(0));
    }

    #[test]
    fn add_advances_time() {
        assert_eq!(TimeMs(100).add(DurationMs(250)), TimeMs(350));
    }

    #[test]
    fn from_secs_converts() {
        assert_eq!(DurationMs::from_secs(3), DurationMs(3000));
    }
}
