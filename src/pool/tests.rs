//! Buffer pool tests - class selection, accounting and lifecycle
//!
//! Test suite organized by component:
//! - Construction: validation, alignment and ordering of classes
//! - Selection: smallest-fit lookup and stable class matching
//! - Accounting: live bytes for classes and the fallback path
//! - Lifecycle: close, drop and use after close
//! - Concurrency: capacity bound under parallel get/put

use super::*;
use crate::config::ClassSpec;
use std::sync::{Arc, Barrier};
use std::thread;

fn pool(classes: &[ClassSpec]) -> BufferPool {
    BufferPool::new(classes).expect("valid classes")
}

#[cfg(test)]
mod construction_tests {
    use super::*;
    use crate::error::PoolError;

    #[test]
    fn classes_are_aligned_and_sorted() {
        let pool = pool(&[
            ClassSpec::new(1, 300),
            ClassSpec::new(1, 100),
            ClassSpec::new(1, 200),
        ]);
        let sizes: Vec<usize> = pool.classes().iter().map(SizeClass::buffer_size).collect();
        assert_eq!(sizes, vec![352, 456, 552]);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = BufferPool::new(&[ClassSpec::new(1, 100), ClassSpec::new(0, 200)]).unwrap_err();
        assert!(matches!(err, PoolError::InvalidClass { index: 1, capacity: 0, .. }));
    }

    #[test]
    fn zero_size_is_rejected() {
        let err = BufferPool::new(&[ClassSpec::new(4, 0)]).unwrap_err();
        assert!(matches!(err, PoolError::InvalidClass { index: 0, size: 0, .. }));
    }

    #[test]
    fn empty_class_list_is_all_fallback() {
        let pool = pool(&[]);
        let ptr = pool.get(10);
        assert_eq!(pool.fallback_bytes(), 264);
        unsafe { pool.put(ptr, 10) };
        assert_eq!(pool.fallback_bytes(), 0);
    }

    #[test]
    fn default_pool_layout() {
        let pool = BufferPool::default();
        let sizes: Vec<usize> = pool.classes().iter().map(SizeClass::buffer_size).collect();
        let expected: Vec<usize> = (1..=7).map(|i| 4096 * i + 256).collect();
        assert_eq!(sizes, expected);
        assert!(pool.classes().iter().all(|c| c.capacity() == 1000));
    }

    #[test]
    fn from_config_uses_slack() {
        let config = PoolConfig::new(vec![ClassSpec::new(2, 100)]).with_slack(8);
        let pool = BufferPool::from_config(&config).expect("valid config");
        assert_eq!(pool.classes()[0].buffer_size(), 104);
        assert_eq!(pool.align(100), 104);
    }

    #[test]
    fn from_config_rejects_shrinking_slack() {
        let config = PoolConfig::new(vec![ClassSpec::new(1, 100)]).with_slack(0);
        let err = BufferPool::from_config(&config).unwrap_err();
        assert!(matches!(err, PoolError::Config { .. }));
    }

    #[test]
    fn custom_alignment_policy() {
        let pool = BufferPool::with_alignment(
            &[ClassSpec::new(1, 100), ClassSpec::new(1, 1000)],
            |n: usize| n.next_power_of_two(),
        )
        .expect("valid classes");

        let sizes: Vec<usize> = pool.classes().iter().map(SizeClass::buffer_size).collect();
        assert_eq!(sizes, vec![128, 1024]);
        assert_eq!(pool.allocated_size(129), 1024);
    }
}

#[cfg(test)]
mod selection_tests {
    use super::*;

    #[test]
    fn smallest_fitting_class_wins() {
        let pool = pool(&[
            ClassSpec::new(1, 100),
            ClassSpec::new(1, 200),
            ClassSpec::new(1, 300),
        ]);

        // 150 aligns to 400: too big for 352, fits 456 and 552
        let ptr = pool.get(150);
        let live: Vec<i64> = pool.classes().iter().map(SizeClass::live_bytes).collect();
        assert_eq!(live, vec![0, 456, 0]);
        unsafe { pool.put(ptr, 150) };
    }

    #[test]
    fn same_size_maps_to_same_class() {
        let pool = pool(&[ClassSpec::new(1, 100), ClassSpec::new(1, 200)]);
        for size in [0, 1, 50, 96, 100, 101, 150, 200] {
            assert_eq!(pool.allocated_size(size), pool.allocated_size(size));
            let aligned = pool.align(size);
            assert!(aligned >= size);
            assert!(pool.allocated_size(size) >= aligned);
        }
    }

    #[test]
    fn reuse_after_put() {
        let pool = pool(&[ClassSpec::new(1, 100)]);
        let first = pool.get(100);
        unsafe { pool.put(first, 100) };
        let second = pool.get(100);
        assert_eq!(first, second);
        assert_eq!(pool.classes()[0].live_bytes(), 352);
        unsafe { pool.put(second, 100) };
    }

    #[test]
    fn shrinking_policy_fails_before_allocating() {
        let pool = BufferPool::with_alignment(&[ClassSpec::new(1, 100)], |n: usize| n / 2)
            .expect("valid classes");
        assert_eq!(pool.classes()[0].buffer_size(), 50);

        // Class path: 100 bytes would land in the 50 byte class
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| pool.get(100)));
        assert!(result.is_err());

        // Fallback path: 1000 bytes would get a 500 byte block
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| pool.get(1000)));
        assert!(result.is_err());

        assert_eq!(pool.total_live_bytes(), 0);
        assert_eq!(pool.stats().fallback_outstanding, 0);

        // Requests the policy still covers are served
        let ptr = pool.get(40);
        assert_eq!(pool.allocated_size(40), 50);
        unsafe { pool.put(ptr, 40) };
    }

    #[test]
    #[should_panic(expected = "maps 100 bytes to a 96 byte buffer")]
    fn zero_slack_policy_panics_on_get() {
        let pool = BufferPool::with_alignment(&[ClassSpec::new(1, 100)], DefaultAlignment::new(0))
            .expect("valid classes");
        let _ = pool.get(100);
    }

    #[test]
    fn oversize_goes_to_fallback() {
        let pool = pool(&[ClassSpec::new(2, 100)]);
        assert_eq!(pool.align(500), 752);
        assert_eq!(pool.allocated_size(500), 752);

        let ptr = pool.get(500);
        assert_eq!(pool.classes()[0].live_bytes(), 0);
        assert_eq!(pool.fallback_bytes(), 752);
        unsafe { pool.put(ptr, 500) };
    }
}

#[cfg(test)]
mod accounting_tests {
    use super::*;

    #[test]
    fn fallback_bytes_return_to_zero() {
        let pool = pool(&[ClassSpec::new(2, 100)]);

        let ptr = pool.get(500);
        assert_eq!(pool.total_live_bytes(), 752);
        assert_eq!(pool.stats().fallback_outstanding, 1);

        unsafe { pool.put(ptr, 500) };
        assert_eq!(pool.fallback_bytes(), 0);
        assert_eq!(pool.total_live_bytes(), 0);
        assert_eq!(pool.stats().fallback_outstanding, 0);
    }

    #[test]
    fn undersized_put_decrements_by_class_size() {
        let pool = pool(&[ClassSpec::new(4, 300)]);

        // 552-byte class; a 100-byte request aligns to 352
        let ptr = pool.get(100);
        assert_eq!(pool.classes()[0].live_bytes(), 552);

        unsafe { pool.put(ptr, 100) };
        assert_eq!(pool.classes()[0].idle(), 0);
        assert_eq!(pool.classes()[0].live_bytes(), 0);
    }

    #[test]
    fn idle_buffers_still_count_as_live() {
        let pool = pool(&[ClassSpec::new(2, 100)]);
        let a = pool.get(100);
        let b = pool.get(100);
        unsafe {
            pool.put(a, 100);
            pool.put(b, 100);
        }
        assert_eq!(pool.classes()[0].idle(), 2);
        assert_eq!(pool.total_live_bytes(), 704);
    }

    #[test]
    fn stats_snapshot() {
        let pool = pool(&[ClassSpec::new(2, 100), ClassSpec::new(3, 200)]);
        let a = pool.get(100);
        unsafe { pool.put(a, 100) };
        let a = pool.get(100);
        let big = pool.get(1000);

        let stats = pool.stats();
        assert_eq!(stats.classes.len(), 2);
        assert_eq!(stats.classes[0].index, 0);
        assert_eq!(stats.classes[0].buffer_size, 352);
        assert_eq!(stats.classes[0].capacity, 2);
        assert_eq!(stats.classes[0].hits, 1);
        assert_eq!(stats.classes[0].misses, 1);
        assert_eq!(stats.classes[1].capacity, 3);
        assert_eq!(stats.fallback_bytes, 1256);
        assert_eq!(stats.total_live_bytes(), pool.total_live_bytes());

        unsafe {
            pool.put(a, 100);
            pool.put(big, 1000);
        }
    }

    #[test]
    #[should_panic(expected = "not an outstanding fallback allocation")]
    fn double_fallback_put_panics() {
        let pool = pool(&[ClassSpec::new(1, 100)]);
        let ptr = pool.get(500);
        unsafe {
            pool.put(ptr, 500);
            pool.put(ptr, 500);
        }
    }

    #[test]
    #[should_panic(expected = "not an outstanding fallback allocation")]
    fn foreign_fallback_put_panics() {
        let pool = pool(&[ClassSpec::new(1, 100)]);
        let mut local = [0u8; 8];
        let ptr = NonNull::new(local.as_mut_ptr()).expect("stack pointer");
        unsafe { pool.put(ptr, 500) };
    }
}

#[cfg(test)]
mod lifecycle_tests {
    use super::*;

    #[test]
    fn close_releases_idle_buffers() {
        let pool = pool(&[ClassSpec::new(4, 100)]);
        let ptrs: Vec<_> = (0..3).map(|_| pool.get(100)).collect();
        for ptr in ptrs {
            unsafe { pool.put(ptr, 100) };
        }
        assert_eq!(pool.total_live_bytes(), 3 * 352);

        pool.close();
        assert!(pool.is_closed());
        assert_eq!(pool.total_live_bytes(), 0);
        assert_eq!(pool.stats().total_idle(), 0);
    }

    #[test]
    fn close_is_idempotent() {
        let pool = pool(&[ClassSpec::new(1, 100)]);
        pool.close();
        pool.close();
        assert!(pool.is_closed());
    }

    #[test]
    fn checked_out_buffers_survive_close() {
        let pool = pool(&[ClassSpec::new(1, 100)]);
        let ptr = pool.get(100);
        pool.close();

        // Still owned by us, still counted
        assert_eq!(pool.total_live_bytes(), 352);
        unsafe {
            core::ptr::write_bytes(ptr.as_ptr(), 1, 352);
            raw::release(ptr);
        }
    }

    #[test]
    fn drop_closes_pool() {
        let pool = Arc::new(pool(&[ClassSpec::new(1, 100)]));
        let ptr = pool.get(100);
        unsafe { pool.put(ptr, 100) };
        drop(pool);
    }

    #[test]
    #[should_panic(expected = "used after close")]
    fn get_after_close_panics() {
        let pool = pool(&[ClassSpec::new(1, 100)]);
        pool.close();
        let _ = pool.get(100);
    }

    #[test]
    #[should_panic(expected = "used after close")]
    fn put_after_close_panics() {
        let pool = pool(&[ClassSpec::new(1, 100)]);
        let ptr = pool.get(100);
        pool.close();
        unsafe { pool.put(ptr, 100) };
    }
}

#[cfg(test)]
mod concurrency_tests {
    use super::*;

    #[test]
    fn capacity_bound_holds_under_parallel_returns() {
        const CAPACITY: usize = 4;
        const THREADS: usize = CAPACITY + 1;

        let pool = Arc::new(pool(&[ClassSpec::new(CAPACITY, 100)]));
        let barrier = Arc::new(Barrier::new(THREADS));

        // Every thread checks out a buffer before any thread returns one
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let pool = Arc::clone(&pool);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let ptr = pool.get(100);
                    barrier.wait();
                    unsafe { pool.put(ptr, 100) };
                    assert!(pool.classes()[0].idle() <= CAPACITY);
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("worker thread");
        }

        let class = &pool.classes()[0];
        assert_eq!(class.idle(), CAPACITY);
        assert_eq!(class.misses(), THREADS as u64);
        // The extra buffer was freed, not retained
        assert_eq!(class.live_bytes(), (CAPACITY * 352) as i64);
    }

    #[test]
    fn parallel_mixed_traffic_balances() {
        let pool = Arc::new(pool(&[ClassSpec::new(8, 100), ClassSpec::new(8, 1000)]));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    for i in 0..500 {
                        let size = [100, 1000, 5000][(t + i) % 3];
                        let ptr = pool.get(size);
                        unsafe {
                            core::ptr::write_bytes(ptr.as_ptr(), t as u8, size);
                            pool.put(ptr, size);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("worker thread");
        }

        let stats = pool.stats();
        assert_eq!(stats.fallback_bytes, 0);
        assert_eq!(stats.fallback_outstanding, 0);
        for class in &stats.classes {
            assert!(class.idle <= class.capacity);
            assert_eq!(class.live_bytes, (class.idle * class.buffer_size) as i64);
        }

        pool.close();
        assert_eq!(pool.total_live_bytes(), 0);
    }
}
