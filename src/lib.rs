//! bytepool - size-classed raw buffer pool for C interop
//!
//! Buffers are plain `malloc` blocks grouped into size classes, so C code can
//! borrow and return them cheaply. C code never sees the pool itself, only an
//! opaque 64-bit handle resolved on every call.
//!
//! ```
//! use std::sync::Arc;
//! use bytepool::{BufferPool, ClassSpec, Extent};
//!
//! let pool = Arc::new(BufferPool::new(&[ClassSpec::new(16, 1024)]).unwrap());
//!
//! // Rust side
//! let buf = pool.copy_in(b"payload");
//! assert_eq!(buf.as_slice(Extent::Requested), b"payload");
//! drop(buf);
//!
//! // Hand a handle to C; it calls bytepool_get/bytepool_put/bytepool_free
//! let handle = bytepool::handle::issue(&pool);
//! let raw: u64 = handle.into_raw();
//! # bytepool::ffi::bytepool_free(raw);
//! pool.close();
//! ```

pub mod align;
pub mod config;
pub mod error;
pub mod ffi;
pub mod handle;
pub mod logging;
pub mod pool;

pub use align::{Alignment, DefaultAlignment};
pub use config::{ClassSpec, PoolConfig};
pub use error::{PoolError, Result};
pub use ffi::{Extent, PooledBuf};
pub use handle::{HandleTable, PoolHandle};
pub use pool::{BufferPool, ClassStats, PoolStats, SizeClass};
