//! Alignment policy - maps a requested size to a class-comparable size
//!
//! Design: The aligned size is used both to pick a size class and as the
//! physical size of fallback allocations, so a policy must be pure and
//! deterministic. Callers may plug in their own policy; the only obligation
//! is `align(n) >= n`. The pool checks it before handing out a buffer.

/// Slack added before rounding in the default policy
pub const DEFAULT_SLACK: usize = 256;

/// Granularity of the default policy
const GRANULE_SHIFT: u32 = 3;

/// Smallest slack for which the default policy never shrinks a request
pub const MIN_SLACK: usize = (1 << GRANULE_SHIFT) - 1;

/// Size normalization used for bucket lookup and allocation size
///
/// Implementations must satisfy `align(n) >= n` for every `n`. A pool whose
/// policy shrinks a request panics in `get` rather than hand out a buffer
/// smaller than asked for.
pub trait Alignment: Send + Sync {
    fn align(&self, size: usize) -> usize;
}

/// Default policy: `((n + slack) / 8) * 8`
///
/// Integer floor division, so the result is a multiple of 8 that is at least
/// `n + slack - 7`. With a slack of at least [`MIN_SLACK`] this is always
/// `>= n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultAlignment {
    slack: usize,
}

impl DefaultAlignment {
    #[inline]
    pub const fn new(slack: usize) -> Self {
        Self { slack }
    }

    #[inline]
    pub const fn slack(&self) -> usize {
        self.slack
    }
}

impl Default for DefaultAlignment {
    fn default() -> Self {
        Self::new(DEFAULT_SLACK)
    }
}

impl Alignment for DefaultAlignment {
    #[inline]
    fn align(&self, size: usize) -> usize {
        default_align(size, self.slack)
    }
}

impl<F> Alignment for F
where
    F: Fn(usize) -> usize + Send + Sync,
{
    #[inline]
    fn align(&self, size: usize) -> usize {
        self(size)
    }
}

/// Default alignment arithmetic, saturating instead of wrapping near `usize::MAX`
#[inline(always)]
pub const fn default_align(size: usize, slack: usize) -> usize {
    (size.saturating_add(slack) >> GRANULE_SHIFT) << GRANULE_SHIFT
}
