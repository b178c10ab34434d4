use std::collections::VecDeque;

use geo_core::time::{DurationMs, TimeMs};

/// Identifies a submitted call in submission order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CallId(pub u64);

type Call<T, E> = Box<dyn FnOnce() -> Result<T, E>>;

/// Serializes calls to a rate-sensitive collaborator with exponential
/// backoff on failure.
///
/// Calls are queued by `submit` and drained strictly in submission order by
/// `poll`, which dispatches at most one call per invocation and only once
/// `min_interval * backoff_multiplier` has elapsed since the last dispatch.
/// A failure doubles the multiplier (capped so spacing never exceeds
/// `max_backoff`) and is returned to the submitter of that call only; queued
/// calls behind it are unaffected and are not retried automatically.
///
/// Draining is single-positioned by construction: `poll` takes `&mut self`,
/// so two drain passes can never interleave.
pub struct RateLimiter<T, E> {
    min_interval: DurationMs,
    max_backoff: DurationMs,
    backoff_multiplier: u64,
    last_dispatch: Option<TimeMs>,
    next_id: u64,
    queue: VecDeque<(CallId, Call<T, E>)>,
}

impl<T, E> std::fmt::Debug for RateLimiter<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("min_interval", &self.min_interval)
            .field("max_backoff", &self.max_backoff)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .field("queued", &self.queue.len())
            .finish()
    }
}

impl<T, E> RateLimiter<T, E> {
    pub fn new(min_interval: DurationMs, max_backoff: DurationMs) -> Self {
        Self {
            min_interval,
            max_backoff,
            backoff_multiplier: 1,
            last_dispatch: None,
            next_id: 0,
            queue: VecDeque::new(),
        }
    }

    /// Enqueues a call. The returned id pairs the eventual `poll` outcome
    /// with its submitter.
    pub fn submit(&mut self, call: impl FnOnce() -> Result<T, E> + 'static) -> CallId {
        let id = CallId(self.next_id);
        self.next_id += 1;
        self.queue.push_back((id, Box::new(call)));
        id
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn backoff_multiplier(&self) -> u64 {
        self.backoff_multiplier
    }

    /// Current required spacing between dispatches.
    pub fn current_spacing(&self) -> DurationMs {
        DurationMs(self.min_interval.0.saturating_mul(self.backoff_multiplier))
    }

    /// Earliest time the head call may dispatch, or None when idle.
    ///
    /// Hosts can use this to schedule their next `poll` wake-up.
    pub fn next_dispatch_at(&self) -> Option<TimeMs> {
        if self.queue.is_empty() {
            return None;
        }
        Some(match self.last_dispatch {
            None => TimeMs(0),
            Some(last) => last.add(self.current_spacing()),
        })
    }

    /// Dispatches the head call if its spacing has elapsed.
    ///
    /// Returns the call's id and outcome; the outcome is owed to the
    /// submitter of exactly that call. Backoff only affects the spacing of
    /// subsequent dispatches, never the delivered result.
    pub fn poll(&mut self, now: TimeMs) -> Option<(CallId, Result<T, E>)> {
        if self.queue.is_empty() {
            return None;
        }
        if let Some(last) = self.last_dispatch {
            if now.elapsed_since(last) < self.current_spacing() {
                return None;
            }
        }

        let (id, call) = self.queue.pop_front()?;
        self.last_dispatch = Some(now);
        let result = call();
        match &result {
            Ok(_) => self.backoff_multiplier = 1,
            Err(_) => {
                let cap = self.max_multiplier();
                self.backoff_multiplier = (self.backoff_multiplier.saturating_mul(2)).min(cap);
                tracing::debug!(
                    multiplier = self.backoff_multiplier,
                    "call failed, backing off"
                );
            }
        }
        Some((id, result))
    }

    fn max_multiplier(&self) -> u64 {
        if self.min_interval.0 == 0 {
            1
        } else {
            (self.max_backoff.0 / self.min_interval.0).max(1)
        }
    }
}
