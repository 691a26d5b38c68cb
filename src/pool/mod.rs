//! Buffer pool - size classes plus a fallback path
//!
//! Design: Two-layer lookup:
//! 1. Size classes (fast path, ascending, smallest fit wins)
//! 2. Fallback (direct `malloc` for sizes above every class, tracked by address)
//!
//! Requested sizes go through the alignment policy before both lookup and
//! allocation, and class sizes are aligned the same way at construction, so a
//! buffer fetched and returned with the same size always lands in the same
//! class.

mod class;
mod raw;
mod stats;

#[cfg(test)]
mod tests;

pub use class::SizeClass;
pub use stats::{ClassStats, PoolStats};

use core::ptr::NonNull;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use crate::align::{Alignment, DefaultAlignment};
use crate::config::{validate_classes, ClassSpec, PoolConfig};
use crate::error::Result;
use crate::logging::{debug, error, info, trace, warn};

pub struct BufferPool {
    /// Sorted ascending by buffer size, fixed after construction
    classes: Vec<SizeClass>,
    alignment: Box<dyn Alignment>,
    /// Fallback address -> allocated size
    fallback: DashMap<usize, usize>,
    fallback_bytes: AtomicI64,
    closed: AtomicBool,
}

impl BufferPool {
    /// Build a pool with the default alignment policy
    pub fn new(classes: &[ClassSpec]) -> Result<Self> {
        Self::with_alignment(classes, DefaultAlignment::default())
    }

    /// Build a pool with a caller-supplied alignment policy
    ///
    /// Declared sizes are aligned with `alignment` before sorting, so a class
    /// declared as 4096 serves `alignment.align(4096)` bytes.
    pub fn with_alignment(classes: &[ClassSpec], alignment: impl Alignment + 'static) -> Result<Self> {
        validate_classes(classes)?;
        let pool = Self::build(classes, Box::new(alignment));

        info!(
            classes = pool.classes.len(),
            smallest = pool.classes.first().map(SizeClass::buffer_size),
            largest = pool.classes.last().map(SizeClass::buffer_size),
            "buffer pool created"
        );

        Ok(pool)
    }

    fn build(classes: &[ClassSpec], alignment: Box<dyn Alignment>) -> Self {
        let mut classes: Vec<SizeClass> = classes
            .iter()
            .map(|spec| SizeClass::new(spec.capacity, alignment.align(spec.size)))
            .collect();
        // Stable, so equal aligned sizes keep declaration order
        classes.sort_by_key(SizeClass::buffer_size);

        Self {
            classes,
            alignment,
            fallback: DashMap::new(),
            fallback_bytes: AtomicI64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &PoolConfig) -> Result<Self> {
        config.validate()?;
        Self::with_alignment(&config.classes, DefaultAlignment::new(config.alignment.slack))
    }

    /// Aligned size for a request, as used for lookup and fallback allocation
    #[inline]
    pub fn align(&self, size: usize) -> usize {
        self.alignment.align(size)
    }

    /// Smallest class that can hold an aligned size
    #[inline]
    fn find(&self, aligned: usize) -> Option<&SizeClass> {
        let index = self.classes.partition_point(|c| c.buffer_size() < aligned);
        self.classes.get(index)
    }

    /// Physical capacity of the buffer `get(size)` hands out
    pub fn allocated_size(&self, size: usize) -> usize {
        let n = self.align(size);
        self.find(n).map_or(n, SizeClass::buffer_size)
    }

    /// Fetch a buffer of at least `size` bytes
    ///
    /// Contents are not cleared on reuse.
    ///
    /// # Panics
    /// After [`close`](Self::close), or when the alignment policy maps `size`
    /// to a buffer smaller than `size`.
    pub fn get(&self, size: usize) -> NonNull<u8> {
        self.assert_open("get");

        let n = self.align(size);
        if let Some(class) = self.find(n) {
            self.assert_covers(size, class.buffer_size());
            return class.get();
        }
        self.assert_covers(size, n);

        let ptr = raw::allocate(n);
        self.fallback.insert(ptr.as_ptr() as usize, n);
        self.fallback_bytes.fetch_add(n as i64, Ordering::Relaxed);
        trace!(size, aligned = n, address = ?ptr, "fallback allocate");
        ptr
    }

    /// Return a buffer obtained from [`get`](Self::get) with the same `size`
    ///
    /// # Safety
    /// - `ptr` must be a live `malloc` block owned by the caller, normally one
    ///   returned by `get` on this pool
    /// - the caller must not use `ptr` afterwards
    ///
    /// # Panics
    /// When the size maps to the fallback path but `ptr` is not an outstanding
    /// fallback allocation of this pool (double free or foreign pointer).
    pub unsafe fn put(&self, ptr: NonNull<u8>, size: usize) {
        self.assert_open("put");

        let n = self.align(size);
        if let Some(class) = self.find(n) {
            class.put(ptr, n);
            return;
        }

        let address = ptr.as_ptr() as usize;
        match self.fallback.remove(&address) {
            Some((_, allocated)) => {
                if allocated != n {
                    warn!(
                        address = ?ptr,
                        allocated,
                        returned = n,
                        "fallback buffer returned with a different size"
                    );
                }
                raw::release(ptr);
                self.fallback_bytes
                    .fetch_sub(allocated as i64, Ordering::Relaxed);
                trace!(size, aligned = n, address = ?ptr, "fallback release");
            }
            None => {
                error!(
                    address = ?ptr,
                    size,
                    aligned = n,
                    "put of untracked fallback buffer"
                );
                panic!(
                    "buffer {:p} ({} bytes) is not an outstanding fallback allocation of this pool",
                    ptr, n
                );
            }
        }
    }

    pub fn classes(&self) -> &[SizeClass] {
        &self.classes
    }

    pub fn fallback_bytes(&self) -> i64 {
        self.fallback_bytes.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> PoolStats {
        let classes = self
            .classes
            .iter()
            .enumerate()
            .map(|(index, class)| ClassStats {
                index,
                buffer_size: class.buffer_size(),
                capacity: class.capacity(),
                idle: class.idle(),
                live_bytes: class.live_bytes(),
                hits: class.hits(),
                misses: class.misses(),
            })
            .collect();

        PoolStats {
            classes,
            fallback_bytes: self.fallback_bytes(),
            fallback_outstanding: self.fallback.len(),
        }
    }

    /// Class live bytes plus fallback bytes
    pub fn total_live_bytes(&self) -> i64 {
        self.classes.iter().map(SizeClass::live_bytes).sum::<i64>() + self.fallback_bytes()
    }

    /// Release every idle buffer. Only the first call has any effect.
    ///
    /// Buffers still checked out stay with their owners and must not be
    /// returned afterwards.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        for class in &self.classes {
            class.close();
        }

        info!(
            live_bytes = self.total_live_bytes(),
            fallback_outstanding = self.fallback.len(),
            "buffer pool closed"
        );
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    #[inline]
    fn assert_covers(&self, size: usize, capacity: usize) {
        if capacity < size {
            error!(size, capacity, "alignment policy shrank a request");
            panic!(
                "alignment policy maps {} bytes to a {} byte buffer",
                size, capacity
            );
        }
    }

    #[inline]
    fn assert_open(&self, op: &str) {
        if self.is_closed() {
            error!(op, "buffer pool used after close");
            panic!("buffer pool used after close ({})", op);
        }
    }
}

impl Default for BufferPool {
    /// Seven classes of 4 KiB steps up to 28 KiB, 1000 buffers each
    fn default() -> Self {
        let config = PoolConfig::default();
        Self::build(
            &config.classes,
            Box::new(DefaultAlignment::new(config.alignment.slack)),
        )
    }
}

impl Drop for BufferPool {
    fn drop(&mut self) {
        if !self.is_closed() {
            debug!("buffer pool dropped without close, closing now");
            self.close();
        }
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("classes", &self.classes)
            .field("fallback_bytes", &self.fallback_bytes())
            .field("closed", &self.is_closed())
            .finish()
    }
}
