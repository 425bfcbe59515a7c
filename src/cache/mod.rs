//! Fixed-capacity recency cache with caller-supplied release.

use crate::types::ReleaseError;

/// Releases the resources behind an entry leaving the cache
///
/// Called exactly once per evicted entry, while the entry is still resident.
/// On error the entry stays in the cache and the eviction stops there.
pub trait Release<V> {
    fn release(&mut self, key: u64, value: &V) -> Result<(), ReleaseError>;
}

impl<V, F> Release<V> for F
where
    F: FnMut(u64, &V) -> Result<(), ReleaseError>,
{
    fn release(&mut self, key: u64, value: &V) -> Result<(), ReleaseError> {
        self(key, value)
    }
}

/// Release that only drops the value
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRelease;

impl<V> Release<V> for NoRelease {
    fn release(&mut self, _key: u64, _value: &V) -> Result<(), ReleaseError> {
        Ok(())
    }
}

pub mod lru;

pub use lru::{Iter, LruCache};
