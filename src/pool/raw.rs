//! Raw C heap blocks
//!
//! Every buffer handed out is a plain `malloc` block, so a buffer can be
//! released without knowing which class (if any) it came from. Allocation
//! failure is fatal, like the global allocator.

use core::ptr::NonNull;
use std::alloc::{handle_alloc_error, Layout};

/// Alignment `malloc` guarantees on every supported target
const MALLOC_ALIGN: usize = 8;

/// Allocate `size` bytes from the C heap, aborting on failure
#[inline]
pub(crate) fn allocate(size: usize) -> NonNull<u8> {
    // malloc(0) may legally return null
    let request = size.max(1);
    let ptr = unsafe { libc::malloc(request) } as *mut u8;
    match NonNull::new(ptr) {
        Some(ptr) => ptr,
        None => handle_alloc_error(
            Layout::from_size_align(request, MALLOC_ALIGN).unwrap_or(Layout::new::<u8>()),
        ),
    }
}

/// Release a block obtained from [`allocate`] (or any `malloc`)
///
/// # Safety
/// - `ptr` must come from `malloc` and must not be released twice
#[inline]
pub(crate) unsafe fn release(ptr: NonNull<u8>) {
    libc::free(ptr.as_ptr().cast());
}

/// Owned idle buffer sitting in a class queue
///
/// Frees itself on drop, so a queue dropped with buffers still inside never
/// leaks them.
pub(crate) struct RawBuffer {
    ptr: NonNull<u8>,
}

// Safety: the block is exclusively owned while it sits in a queue
unsafe impl Send for RawBuffer {}

impl RawBuffer {
    /// Take ownership of a caller-returned block
    ///
    /// # Safety
    /// - `ptr` must be a live `malloc` block not owned by anyone else
    #[inline]
    pub(crate) unsafe fn from_raw(ptr: NonNull<u8>) -> Self {
        Self { ptr }
    }

    /// Hand ownership back to the caller
    #[inline]
    pub(crate) fn into_raw(self) -> NonNull<u8> {
        let ptr = self.ptr;
        core::mem::forget(self);
        ptr
    }
}

impl Drop for RawBuffer {
    fn drop(&mut self) {
        unsafe { release(self.ptr) }
    }
}
