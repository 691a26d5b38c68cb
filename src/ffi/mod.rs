//! C FFI - trampolines for code on the far side of the boundary
//!
//! Design: The C side only ever holds a `uint64_t` handle and raw buffer
//! addresses (see `csrc/bytepool.h`). Every call resolves the handle through
//! the process-wide table and delegates to the pool:
//! 1. `bytepool_get` / `bytepool_put` (buffer traffic)
//! 2. `bytepool_free` (retire the handle; the pool stays open)
//! 3. `bytepool_live_bytes` (diagnostics)
//!
//! Unwinding across `extern "C"` is not allowed, so usage errors here are
//! logged and then abort the process.

mod bytes;


pub use bytes::{view, view_extent, view_extent_mut, view_mut, Extent, PooledBuf};

use core::ffi::c_void;
use core::ptr::NonNull;
use std::sync::Arc;

use crate::handle::{self, PoolHandle};
use crate::logging::{error, trace};
use crate::pool::BufferPool;

/// Fetch a buffer of at least `size` bytes; never returns null
#[no_mangle]
pub extern "C" fn bytepool_get(handle: u64, size: usize) -> *mut c_void {
    let pool = resolve_open("bytepool_get", handle);
    if pool.allocated_size(size) < size {
        fatal("bytepool_get", "alignment policy shrinks the request");
    }
    let ptr = pool.get(size);
    trace!(handle, size, address = ?ptr, "ffi get");
    ptr.as_ptr().cast()
}

/// Return a buffer with the size it was requested with; null is a no-op
///
/// # Safety
/// - `data` must come from `bytepool_get` on the same handle's pool with the
///   same `size`, and must not be used afterwards
#[no_mangle]
pub unsafe extern "C" fn bytepool_put(handle: u64, data: *mut c_void, size: usize) {
    let pool = resolve_open("bytepool_put", handle);
    let Some(ptr) = NonNull::new(data.cast::<u8>()) else {
        trace!(handle, "ffi put of null ignored");
        return;
    };
    trace!(handle, size, address = ?ptr, "ffi put");
    pool.put(ptr, size);
}

/// Retire the handle; the pool is left open for its Rust owner to close
#[no_mangle]
pub extern "C" fn bytepool_free(handle: u64) {
    if let Err(e) = handle::global().try_retire(PoolHandle::from_raw(handle)) {
        fatal("bytepool_free", &e.to_string());
    }
}

/// Outstanding bytes of the pool behind `handle`
#[no_mangle]
pub extern "C" fn bytepool_live_bytes(handle: u64) -> i64 {
    match handle::global().try_resolve(PoolHandle::from_raw(handle)) {
        Ok(pool) => pool.total_live_bytes(),
        Err(e) => fatal("bytepool_live_bytes", &e.to_string()),
    }
}

fn resolve_open(function: &str, handle: u64) -> Arc<BufferPool> {
    let pool = match handle::global().try_resolve(PoolHandle::from_raw(handle)) {
        Ok(pool) => pool,
        Err(e) => fatal(function, &e.to_string()),
    };
    if pool.is_closed() {
        fatal(function, "pool is closed");
    }
    pool
}

#[cold]
#[inline(never)]
fn fatal(function: &str, reason: &str) -> ! {
    error!(function, reason, "fatal usage error at C boundary");
    std::process::abort()
}
