//! Size class - bounded free list of equally sized buffers
//!
//! Design: A lock-free ring (`ArrayQueue`) of idle buffers.
//! - `get` pops, or allocates fresh when the ring is empty
//! - `put` pushes, or frees when the ring is full
//!
//! Neither side ever waits, and resident memory per class is capped at
//! `capacity * buffer_size`.

use core::ptr::NonNull;
use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

use super::raw::{self, RawBuffer};
use crate::logging::{debug, trace};

pub struct SizeClass {
    buffer_size: usize,
    idle: ArrayQueue<RawBuffer>,
    /// Bytes allocated on behalf of this class and not yet freed
    live_bytes: AtomicI64,
    hits: AtomicU64,
    misses: AtomicU64,
    closed: AtomicBool,
}

impl SizeClass {
    /// `capacity` must be non-zero (checked by pool construction)
    pub(crate) fn new(capacity: usize, buffer_size: usize) -> Self {
        Self {
            buffer_size,
            idle: ArrayQueue::new(capacity),
            live_bytes: AtomicI64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.idle.capacity()
    }

    /// Idle buffers currently retained
    #[inline]
    pub fn idle(&self) -> usize {
        self.idle.len()
    }

    /// Outstanding bytes: checked out plus idle
    #[inline]
    pub fn live_bytes(&self) -> i64 {
        self.live_bytes.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Reuse an idle buffer or allocate a fresh one of `buffer_size` bytes
    pub fn get(&self) -> NonNull<u8> {
        self.assert_open("get");

        if let Some(buf) = self.idle.pop() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            let ptr = buf.into_raw();
            trace!(buffer_size = self.buffer_size, address = ?ptr, "class reuse");
            return ptr;
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        self.live_bytes
            .fetch_add(self.buffer_size as i64, Ordering::Relaxed);
        let ptr = raw::allocate(self.buffer_size);
        trace!(buffer_size = self.buffer_size, address = ?ptr, "class allocate");
        ptr
    }

    /// Return a buffer; `size` is the caller's aligned size
    ///
    /// Undersized buffers are freed instead of retained, as are buffers that
    /// arrive while the ring is full.
    ///
    /// # Safety
    /// - `ptr` must be a live `malloc` block owned by the caller
    pub unsafe fn put(&self, ptr: NonNull<u8>, size: usize) {
        self.assert_open("put");

        if size < self.buffer_size {
            trace!(
                buffer_size = self.buffer_size,
                size,
                address = ?ptr,
                "class discard undersized"
            );
            self.release(ptr);
            return;
        }

        self.retain(RawBuffer::from_raw(ptr));
    }

    /// Park a buffer in the ring, freeing it when the ring is full
    ///
    /// A `put` that passed its open check can still land here after `close`
    /// drained the ring, so the ring is drained again in that case.
    fn retain(&self, buf: RawBuffer) {
        match self.idle.push(buf) {
            Ok(()) => {
                if self.closed.load(Ordering::SeqCst) {
                    let drained = self.drain();
                    debug!(buffer_size = self.buffer_size, drained, "late return after close");
                }
            }
            Err(buf) => {
                let ptr = buf.into_raw();
                trace!(buffer_size = self.buffer_size, address = ?ptr, "class full, releasing");
                unsafe { self.release(ptr) };
            }
        }
    }

    /// Free every idle buffer; further `get`/`put` calls panic
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let drained = self.drain();

        debug!(
            buffer_size = self.buffer_size,
            drained,
            live_bytes = self.live_bytes(),
            "size class closed"
        );
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn drain(&self) -> usize {
        let mut drained = 0usize;
        while let Some(buf) = self.idle.pop() {
            unsafe { self.release(buf.into_raw()) };
            drained += 1;
        }
        drained
    }

    #[inline]
    unsafe fn release(&self, ptr: NonNull<u8>) {
        raw::release(ptr);
        self.live_bytes
            .fetch_sub(self.buffer_size as i64, Ordering::Relaxed);
    }

    #[inline]
    fn assert_open(&self, op: &str) {
        assert!(
            !self.is_closed(),
            "size class {} used after close ({})",
            self.buffer_size,
            op
        );
    }
}

impl std::fmt::Debug for SizeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SizeClass")
            .field("buffer_size", &self.buffer_size)
            .field("capacity", &self.capacity())
            .field("idle", &self.idle())
            .field("live_bytes", &self.live_bytes())
            .finish()
    }
}
