//! Copy helpers - moving managed bytes in and out of pool buffers
//!
//! A pool buffer has two lengths: the size the caller asked for and the
//! (aligned, class-sized) capacity it physically has. Every view here takes
//! an [`Extent`] so the two are never mixed up silently.

use core::ptr::NonNull;
use core::slice;

use crate::logging::warn;
use crate::pool::BufferPool;

/// Which length of a pool buffer a view covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extent {
    /// The size passed to `get`
    Requested,
    /// The full physical capacity of the buffer
    Allocated,
}

/// Pool buffer that returns itself to the pool on drop
///
/// The bytes past the requested length are zeroed when the buffer is handed
/// out, so both extents are always initialized.
pub struct PooledBuf<'a> {
    pool: &'a BufferPool,
    ptr: NonNull<u8>,
    len: usize,
    capacity: usize,
}

// Safety: the buffer is exclusively owned and the pool is Sync
unsafe impl Send for PooledBuf<'_> {}
unsafe impl Sync for PooledBuf<'_> {}

impl<'a> PooledBuf<'a> {
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    #[inline]
    fn extent_len(&self, extent: Extent) -> usize {
        match extent {
            Extent::Requested => self.len,
            Extent::Allocated => self.capacity,
        }
    }

    pub fn as_slice(&self, extent: Extent) -> &[u8] {
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.extent_len(extent)) }
    }

    pub fn as_mut_slice(&mut self, extent: Extent) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.extent_len(extent)) }
    }

    /// Give up ownership, typically to pass the buffer to C
    ///
    /// Returns the address and the requested length; the buffer must later be
    /// returned with `put(ptr, len)` on the same pool.
    pub fn into_raw(self) -> (NonNull<u8>, usize) {
        let parts = (self.ptr, self.len);
        core::mem::forget(self);
        parts
    }
}

impl Drop for PooledBuf<'_> {
    fn drop(&mut self) {
        if self.pool.is_closed() {
            warn!(address = ?self.ptr, len = self.len, "pool closed, leaking buffer");
            return;
        }
        unsafe { self.pool.put(self.ptr, self.len) }
    }
}

impl std::fmt::Debug for PooledBuf<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledBuf")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl BufferPool {
    /// Zero-filled buffer of `size` bytes that returns itself on drop
    pub fn acquire(&self, size: usize) -> PooledBuf<'_> {
        let ptr = self.get(size);
        let capacity = self.allocated_size(size);
        unsafe { core::ptr::write_bytes(ptr.as_ptr(), 0, capacity) };
        PooledBuf {
            pool: self,
            ptr,
            len: size,
            capacity,
        }
    }

    /// Copy `data` into a fresh pool buffer
    pub fn copy_in(&self, data: &[u8]) -> PooledBuf<'_> {
        let len = data.len();
        let ptr = self.get(len);
        let capacity = self.allocated_size(len);
        unsafe {
            core::ptr::copy_nonoverlapping(data.as_ptr(), ptr.as_ptr(), len);
            core::ptr::write_bytes(ptr.as_ptr().add(len), 0, capacity.saturating_sub(len));
        }
        PooledBuf {
            pool: self,
            ptr,
            len,
            capacity,
        }
    }
}

/// Borrow `len` bytes at `ptr` without copying
///
/// # Safety
/// - `ptr` must be valid for reads of `len` initialized bytes for `'a`
/// - nothing may write through another alias while the slice lives
#[inline]
pub unsafe fn view<'a>(ptr: *const u8, len: usize) -> &'a [u8] {
    slice::from_raw_parts(ptr, len)
}

/// # Safety
/// Same as [`view`], plus exclusive access for `'a`
#[inline]
pub unsafe fn view_mut<'a>(ptr: *mut u8, len: usize) -> &'a mut [u8] {
    slice::from_raw_parts_mut(ptr, len)
}

/// View a buffer obtained from `pool.get(requested)` with an explicit extent
///
/// # Safety
/// - `ptr` must be a live buffer from `pool.get(requested)`
/// - the chosen extent must be initialized
pub unsafe fn view_extent<'a>(
    pool: &BufferPool,
    ptr: *const u8,
    requested: usize,
    extent: Extent,
) -> &'a [u8] {
    view(ptr, extent_len(pool, requested, extent))
}

/// # Safety
/// Same as [`view_extent`], plus exclusive access for `'a`
pub unsafe fn view_extent_mut<'a>(
    pool: &BufferPool,
    ptr: *mut u8,
    requested: usize,
    extent: Extent,
) -> &'a mut [u8] {
    view_mut(ptr, extent_len(pool, requested, extent))
}

#[inline]
fn extent_len(pool: &BufferPool, requested: usize, extent: Extent) -> usize {
    match extent {
        Extent::Requested => requested,
        Extent::Allocated => pool.allocated_size(requested),
    }
}
