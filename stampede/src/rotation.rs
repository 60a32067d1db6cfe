//! Shared round-robin cursor over a fixed target list.
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A monotonically increasing counter reduced modulo the list length.
///
/// With a single worker the visit order is exactly the list repeated. With
/// many workers the read-and-increment races, so the request-to-page
/// assignment is non-deterministic, but the long-run distribution stays
/// uniform across the set (counts never diverge by more than one full lap).
/// This is a deliberate alternative to uniform random sampling.
#[derive(Debug)]
pub struct PageRotation {
    cursor: AtomicUsize,
    len: NonZeroUsize,
}

impl PageRotation {
    pub fn new(len: NonZeroUsize) -> Self {
        Self {
            cursor: AtomicUsize::new(0),
            len,
        }
    }

    /// The next index in rotation. Wrapping of the underlying counter is
    /// harmless unless the list length divides `usize::MAX + 1` unevenly
    /// after ~10^19 iterations, which no run gets close to.
    pub fn next(&self) -> usize {
        self.cursor.fetch_add(1, Ordering::Relaxed) % self.len
    }
}
