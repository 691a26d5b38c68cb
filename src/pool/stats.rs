//! Pool statistics for monitoring and debugging
//!
//! Snapshots are taken class by class without a global lock, so under
//! concurrent traffic the per-class numbers need not add up to any single
//! instant.

/// Per-class snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassStats {
    /// Position in ascending size order
    pub index: usize,
    pub buffer_size: usize,
    pub capacity: usize,
    pub idle: usize,
    pub live_bytes: i64,
    /// Gets served from an idle buffer
    pub hits: u64,
    /// Gets that had to allocate
    pub misses: u64,
}

impl ClassStats {
    /// Fraction of gets served by reuse (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub classes: Vec<ClassStats>,
    /// Bytes held by fallback allocations not yet returned
    pub fallback_bytes: i64,
    /// Fallback allocations not yet returned
    pub fallback_outstanding: usize,
}

impl PoolStats {
    pub fn total_live_bytes(&self) -> i64 {
        self.classes.iter().map(|c| c.live_bytes).sum::<i64>() + self.fallback_bytes
    }

    pub fn total_idle(&self) -> usize {
        self.classes.iter().map(|c| c.idle).sum()
    }
}
