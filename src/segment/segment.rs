use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

const WORD_BITS: u32 = u64::BITS;

/// Outcome of trying to claim one page slot in a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// The slot at this offset was free and now belongs to the caller
    Claimed(u32),

    /// The free counter reads zero
    Full,

    /// The free counter is non-zero but every bit is set
    Desync { free_pages: u64 },
}

/// State guarded by the segment lock
struct SegmentInner {
    /// One bit per page slot, set = claimed
    use_bits: Box<[u64]>,

    /// Logical page numbers whose data was placed in this segment
    lpns: Vec<u64>,
}

/// One erase unit of the device
///
/// `free_pages` and `valid_pages` are atomics so they can be read without the
/// lock, but they are only written while holding it, together with the bitmap.
pub struct Segment {
    pages: u32,
    free_pages: AtomicU64,
    valid_pages: AtomicU64,
    inner: Mutex<SegmentInner>,
}

/// Point-in-time view of a segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentStats {
    pub free_pages: u64,
    pub valid_pages: u64,
    pub used_bits: u64,
}

impl Segment {
    /// Create a fully free segment with `pages` slots
    pub fn new(pages: u32) -> Self {
        let words = (pages as usize).div_ceil(WORD_BITS as usize);
        Self {
            pages,
            free_pages: AtomicU64::new(pages as u64),
            valid_pages: AtomicU64::new(0),
            inner: Mutex::new(SegmentInner {
                use_bits: vec![0u64; words].into_boxed_slice(),
                lpns: Vec::new(),
            }),
        }
    }

    pub fn pages(&self) -> u32 {
        self.pages
    }

    pub fn free_pages(&self) -> u64 {
        self.free_pages.load(Ordering::Acquire)
    }

    /// Number of claims ever made on this segment. Nothing here decrements it.
    pub fn valid_pages(&self) -> u64 {
        self.valid_pages.load(Ordering::Acquire)
    }

    /// Claim the lowest free slot.
    ///
    /// Bit set, free decrement and valid increment happen under one lock so
    /// concurrent claims on the same segment never lose an update.
    pub fn try_claim(&self) -> Claim {
        let mut inner = self.inner.lock();

        let free_pages = self.free_pages.load(Ordering::Acquire);
        if free_pages == 0 {
            return Claim::Full;
        }

        let Some(offset) = find_first_zero(&inner.use_bits, self.pages) else {
            return Claim::Desync { free_pages };
        };

        set_bit(&mut inner.use_bits, offset);
        self.free_pages.fetch_sub(1, Ordering::AcqRel);
        self.valid_pages.fetch_add(1, Ordering::AcqRel);

        Claim::Claimed(offset)
    }

    /// Check whether the slot at `offset` is claimed
    pub fn is_used(&self, offset: u32) -> bool {
        if offset >= self.pages {
            return false;
        }
        let inner = self.inner.lock();
        test_bit(&inner.use_bits, offset)
    }

    /// Append a logical page number whose data now lives here
    pub fn record_lpn(&self, lpn: u64) {
        self.inner.lock().lpns.push(lpn);
    }

    /// Snapshot of the recorded logical page numbers
    pub fn lpns(&self) -> Vec<u64> {
        self.inner.lock().lpns.clone()
    }

    pub fn stats(&self) -> SegmentStats {
        let inner = self.inner.lock();
        SegmentStats {
            free_pages: self.free_pages.load(Ordering::Acquire),
            valid_pages: self.valid_pages.load(Ordering::Acquire),
            used_bits: count_set(&inner.use_bits, self.pages),
        }
    }

    /// Overwrite the free counter without touching the bitmap
    #[cfg(test)]
    pub(crate) fn force_free_pages(&self, free_pages: u64) {
        let _inner = self.inner.lock();
        self.free_pages.store(free_pages, Ordering::Release);
    }
}

fn find_first_zero(bits: &[u64], limit: u32) -> Option<u32> {
    for (idx, word) in bits.iter().enumerate() {
        if *word == u64::MAX {
            continue;
        }
        let bit = idx as u32 * WORD_BITS + word.trailing_ones();
        return (bit < limit).then_some(bit);
    }
    None
}

fn set_bit(bits: &mut [u64], bit: u32) {
    bits[(bit / WORD_BITS) as usize] |= 1 << (bit % WORD_BITS);
}

fn test_bit(bits: &[u64], bit: u32) -> bool {
    (bits[(bit / WORD_BITS) as usize] >> (bit % WORD_BITS)) & 1 == 1
}

fn count_set(bits: &[u64], limit: u32) -> u64 {
    (0..limit).filter(|&bit| test_bit(bits, bit)).count() as u64
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment")
            .field("pages", &self.pages)
            .field("free_pages", &self.free_pages.load(Ordering::Acquire))
            .field("valid_pages", &self.valid_pages.load(Ordering::Acquire))
            .field("lpn_count", &self.inner.lock().lpns.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_claims_lowest_offset_first() {
        let segment = Segment::new(4);
        assert_eq!(segment.try_claim(), Claim::Claimed(0));
        assert_eq!(segment.try_claim(), Claim::Claimed(1));
        assert!(segment.is_used(0));
        assert!(!segment.is_used(2));
        assert_eq!(segment.free_pages(), 2);
        assert_eq!(segment.valid_pages(), 2);
    }

    #[test]
    fn test_full_segment() {
        let segment = Segment::new(2);
        segment.try_claim();
        segment.try_claim();
        assert_eq!(segment.try_claim(), Claim::Full);
        assert_eq!(segment.valid_pages(), 2);
    }

    #[test]
    fn test_desync_reported_without_mutation() {
        let segment = Segment::new(2);
        segment.try_claim();
        segment.try_claim();
        segment.force_free_pages(1);

        assert_eq!(segment.try_claim(), Claim::Desync { free_pages: 1 });
        assert_eq!(segment.free_pages(), 1);
        assert_eq!(segment.valid_pages(), 2);
    }

    #[test]
    fn test_partial_trailing_word() {
        // 70 slots spans two words, the second only partially valid
        let segment = Segment::new(70);
        for expected in 0..70 {
            assert_eq!(segment.try_claim(), Claim::Claimed(expected));
        }
        assert_eq!(segment.try_claim(), Claim::Full);
        assert_eq!(segment.stats().used_bits, 70);
    }

    #[test]
    fn test_bitmap_matches_counter() {
        let segment = Segment::new(10);
        for _ in 0..7 {
            segment.try_claim();
        }
        let stats = segment.stats();
        assert_eq!(stats.used_bits, 10 - stats.free_pages);
    }

    #[test]
    fn test_concurrent_claims_are_distinct() {
        let segment = Arc::new(Segment::new(256));
        let mut workers = Vec::new();

        for _ in 0..8 {
            let segment = Arc::clone(&segment);
            workers.push(thread::spawn(move || {
                let mut claimed = Vec::new();
                for _ in 0..32 {
                    if let Claim::Claimed(offset) = segment.try_claim() {
                        claimed.push(offset);
                    }
                }
                claimed
            }));
        }

        let mut all: Vec<u32> = workers
            .into_iter()
            .flat_map(|w| w.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();

        assert_eq!(all.len(), 256);
        assert_eq!(segment.free_pages(), 0);
        assert_eq!(segment.valid_pages(), 256);
    }

    #[test]
    fn test_lpn_list_appends() {
        let segment = Segment::new(4);
        segment.record_lpn(10);
        segment.record_lpn(3);
        assert_eq!(segment.lpns(), vec![10, 3]);
    }
}
