//! Boundary handles - opaque tokens standing in for pool references
//!
//! Code on the far side of the C boundary cannot hold an `Arc`, so it is given
//! a 64-bit token instead. The table maps tokens to weak pool references:
//! - `issue` mints a fresh token (never 0, never reused)
//! - `resolve` turns a token back into the pool
//! - `retire` forgets the token without closing the pool
//!
//! Presenting a retired or unknown token is a usage error and panics.


use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::error::{PoolError, Result};
use crate::logging::{debug, error};
use crate::pool::BufferPool;

/// Process-wide table used by the C trampolines
static GLOBAL: Lazy<HandleTable> = Lazy::new(HandleTable::new);

/// Opaque token for a registered pool
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolHandle(u64);

impl PoolHandle {
    /// Bit pattern to hand across the boundary
    #[inline]
    pub const fn into_raw(self) -> u64 {
        self.0
    }

    /// Rebuild a handle from a bit pattern received across the boundary
    ///
    /// Any value is accepted here; validity is checked on resolve.
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for PoolHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PoolHandle({:#x})", self.0)
    }
}

pub struct HandleTable {
    entries: DashMap<u64, Weak<BufferPool>>,
    next: AtomicU64,
}

impl HandleTable {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            next: AtomicU64::new(1),
        }
    }

    /// Register `pool` under a fresh token
    ///
    /// The table keeps only a weak reference; dropping the last `Arc` makes
    /// the token unresolvable.
    pub fn issue(&self, pool: &Arc<BufferPool>) -> PoolHandle {
        let raw = self.next.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(raw, Arc::downgrade(pool));
        debug!(handle = raw, "pool handle issued");
        PoolHandle(raw)
    }

    pub fn try_resolve(&self, handle: PoolHandle) -> Result<Arc<BufferPool>> {
        let weak = self
            .entries
            .get(&handle.0)
            .map(|entry| entry.value().clone())
            .ok_or(PoolError::UnknownHandle { handle: handle.0 })?;
        weak.upgrade()
            .ok_or(PoolError::PoolDropped { handle: handle.0 })
    }

    /// # Panics
    /// If the handle was never issued, has been retired, or its pool is gone.
    pub fn resolve(&self, handle: PoolHandle) -> Arc<BufferPool> {
        match self.try_resolve(handle) {
            Ok(pool) => pool,
            Err(e) => usage_error("resolve", &e),
        }
    }

    pub fn try_retire(&self, handle: PoolHandle) -> Result<()> {
        match self.entries.remove(&handle.0) {
            Some(_) => {
                debug!(handle = handle.0, "pool handle retired");
                Ok(())
            }
            None => Err(PoolError::UnknownHandle { handle: handle.0 }),
        }
    }

    /// Forget `handle`; the pool itself is left open
    ///
    /// # Panics
    /// If the handle was never issued or was already retired.
    pub fn retire(&self, handle: PoolHandle) {
        if let Err(e) = self.try_retire(handle) {
            usage_error("retire", &e);
        }
    }

    pub fn contains(&self, handle: PoolHandle) -> bool {
        self.entries.contains_key(&handle.0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cold]
#[inline(never)]
fn usage_error(op: &str, e: &PoolError) -> ! {
    error!(op, error = %e, "handle usage error");
    panic!("{}: {}", op, e);
}

/// The process-wide table
pub fn global() -> &'static HandleTable {
    &GLOBAL
}

/// Issue a handle in the process-wide table
pub fn issue(pool: &Arc<BufferPool>) -> PoolHandle {
    GLOBAL.issue(pool)
}

/// Resolve a handle in the process-wide table
pub fn resolve(handle: PoolHandle) -> Arc<BufferPool> {
    GLOBAL.resolve(handle)
}

/// Retire a handle in the process-wide table
pub fn retire(handle: PoolHandle) {
    GLOBAL.retire(handle)
}
