/// Deterministic cache counters.
///
/// These never depend on wall-clock time, so a replayed session produces the
/// same snapshot. `partial_hits` is only advanced by the spatial cache.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub partial_hits: u64,
    pub misses: u64,
    pub expirations: u64,
    pub evictions: u64,
}

impl CacheStats {
    pub fn lookups(&self) -> u64 {
        self.hits + self.partial_hits + self.misses
    }
}
