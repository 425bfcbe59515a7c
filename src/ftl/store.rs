use log::{debug, error, warn};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::address::{AddressCodec, DeviceAddress};
use crate::device::{DeviceGeometry, Geometry};
use crate::map::TranslationTable;
use crate::profiling::Profiler;
use crate::segment::{Claim, Segment, SegmentStats};
use crate::types::{FtlError, Result};

/// Page-mapped flash translation layer
///
/// Owns the translation table and the per-segment allocation state. Safe to
/// share across worker threads: allocation is serialized per segment and map
/// writers are serialized by the table lock.
pub struct PageFtl {
    /// Device geometry (never mutated here)
    dev: Arc<dyn DeviceGeometry>,

    /// Address layout derived from `dev`
    codec: AddressCodec,

    /// Logical -> physical table (the lock is the coordination lock for map writers)
    map: RwLock<TranslationTable>,

    /// One entry per erase unit
    segments: Box<[Segment]>,

    /// Last segment a page was allocated from
    alloc_segnum: AtomicUsize,

    profiler: Profiler,
}

impl PageFtl {
    /// Size all structures from the device geometry
    pub fn open(dev: Arc<dyn DeviceGeometry>) -> Result<Self> {
        if dev.page_size() == 0 {
            return Err(FtlError::InvalidGeometry("page size is zero"));
        }
        let codec = AddressCodec::new(dev.as_ref())?;

        // Geometry providers may not guard their own products
        dev.pages_per_segment()
            .checked_mul(dev.nr_segments())
            .and_then(|pages| pages.checked_mul(dev.page_size()))
            .ok_or(FtlError::InvalidGeometry("device size overflows"))?;

        let map_entries = (dev.total_size() / dev.page_size())
            .checked_add(1)
            .and_then(|entries| usize::try_from(entries).ok())
            .ok_or(FtlError::InvalidGeometry("translation table too large"))?;

        // The codec already bounds pages per segment to the offset width
        let pages_per_segment = dev.pages_per_segment() as u32;
        let segments: Box<[Segment]> = (0..dev.nr_segments())
            .map(|_| Segment::new(pages_per_segment))
            .collect();

        debug!(
            "page ftl opened (segments: {}, pages per segment: {}, map entries: {})",
            segments.len(),
            pages_per_segment,
            map_entries
        );

        Ok(Self {
            dev,
            codec,
            map: RwLock::new(TranslationTable::new(map_entries)),
            segments,
            alloc_segnum: AtomicUsize::new(0),
            profiler: Profiler::new(),
        })
    }

    /// Open over a plain [`Geometry`]
    pub fn with_geometry(geometry: Geometry) -> Result<Self> {
        geometry.validate()?;
        Self::open(Arc::new(geometry))
    }

    /// Logical page number holding `sector`
    pub fn lpn(&self, sector: u64) -> u64 {
        sector / self.dev.page_size()
    }

    /// Byte offset of `sector` inside its page
    pub fn page_offset(&self, sector: u64) -> u64 {
        sector % self.dev.page_size()
    }

    pub fn codec(&self) -> &AddressCodec {
        &self.codec
    }

    pub fn geometry(&self) -> &dyn DeviceGeometry {
        self.dev.as_ref()
    }

    /// Claim a free page, or [`FtlError::OutOfSpace`] after one full pass.
    ///
    /// Probing starts at the last segment allocated from and visits at most
    /// `nr_segments` segments. A segment whose counter and bitmap disagree is
    /// logged and skipped.
    pub fn alloc_page(&self) -> Result<DeviceAddress> {
        let nr_segments = self.segments.len();
        // A stale start point only changes where probing begins
        let start = self.alloc_segnum.load(Ordering::Relaxed);

        for idx in 0..nr_segments {
            let segnum = (start + idx) % nr_segments;
            let segment = &self.segments[segnum];

            if segment.free_pages() == 0 {
                continue;
            }

            match segment.try_claim() {
                Claim::Claimed(offset) => {
                    self.alloc_segnum.store(segnum, Ordering::Relaxed);
                    self.profiler.record_allocation(idx as u64 + 1);
                    return Ok(self.codec.pack(segnum, offset));
                }
                Claim::Full => continue,
                Claim::Desync { free_pages } => {
                    warn!(
                        "free page counter and use bitmap are not synchronized (segment: {}, free_pages: {})",
                        segnum, free_pages
                    );
                    self.profiler.record_consistency_warning();
                }
            }
        }

        error!("cannot find a free page in the device");
        self.profiler.record_allocation_failure(nr_segments as u64);
        Err(FtlError::OutOfSpace)
    }

    /// Claim a free page, returning [`DeviceAddress::EMPTY`] when none is left
    pub fn get_free_page(&self) -> DeviceAddress {
        self.alloc_page().unwrap_or(DeviceAddress::EMPTY)
    }

    /// Point the entry for `sector` at `ppn`, unconditionally
    pub fn update_map(&self, sector: u64, ppn: u32) -> Result<()> {
        let lpn = self.lpn(sector);
        let result = self.map.write().update(lpn, ppn);

        match &result {
            Ok(()) => self.profiler.record_map_update(),
            Err(FtlError::OutOfRange { capacity, .. }) => {
                error!(
                    "lpn value overflow detected (max: {}, cur: {})",
                    capacity, lpn
                );
                self.profiler.record_out_of_range();
            }
            Err(_) => {}
        }
        result
    }

    /// Look up `sector`; unmapped or out-of-range sectors read as
    /// [`DeviceAddress::EMPTY`]
    pub fn get_map(&self, sector: u64) -> DeviceAddress {
        let lpn = self.lpn(sector);
        self.profiler.record_map_lookup();

        match self.map.read().get(lpn) {
            Some(addr) => addr,
            None => {
                error!(
                    "lpn value overflow detected (max: {}, cur: {})",
                    self.map_capacity(),
                    lpn
                );
                self.profiler.record_out_of_range();
                DeviceAddress::EMPTY
            }
        }
    }

    /// Allocate a page for `sector`, remember the logical page in the owning
    /// segment and map it, all under the map lock.
    ///
    /// An out-of-range sector fails before any page is claimed.
    pub fn assign(&self, sector: u64) -> Result<DeviceAddress> {
        let lpn = self.lpn(sector);
        let mut map = self.map.write();

        let capacity = map.capacity();
        if lpn >= capacity {
            error!(
                "lpn value overflow detected (max: {}, cur: {})",
                capacity, lpn
            );
            self.profiler.record_out_of_range();
            return Err(FtlError::OutOfRange { lpn, capacity });
        }

        let addr = self.alloc_page()?;
        // lpn was bounds-checked above under the same write guard
        map.set(lpn, addr.raw());
        if let Some((segnum, _)) = self.codec.unpack(addr) {
            self.segments[segnum].record_lpn(lpn);
        }
        self.profiler.record_map_update();

        Ok(addr)
    }

    pub fn map_capacity(&self) -> u64 {
        self.map.read().capacity()
    }

    pub fn nr_segments(&self) -> usize {
        self.segments.len()
    }

    /// Segment at `segnum`, if it exists
    pub fn segment(&self, segnum: usize) -> Option<&Segment> {
        self.segments.get(segnum)
    }

    pub fn segment_stats(&self, segnum: usize) -> Option<SegmentStats> {
        self.segments.get(segnum).map(Segment::stats)
    }

    /// Free pages summed over all segments
    pub fn free_pages(&self) -> u64 {
        self.segments.iter().map(Segment::free_pages).sum()
    }

    /// Segment the next allocation starts probing from
    pub fn alloc_segnum(&self) -> usize {
        self.alloc_segnum.load(Ordering::Relaxed)
    }

    /// Move the round-robin cursor
    #[cfg(test)]
    pub(crate) fn set_alloc_segnum(&self, segnum: usize) {
        self.alloc_segnum.store(segnum, Ordering::Relaxed);
    }

    /// Get access to the profiler for metrics
    pub fn profiler(&self) -> &Profiler {
        &self.profiler
    }
}

impl Drop for PageFtl {
    fn drop(&mut self) {
        debug!("page ftl closed ({} segments)", self.segments.len());
    }
}

impl std::fmt::Debug for PageFtl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageFtl")
            .field("codec", &self.codec)
            .field("map", &*self.map.read())
            .field("nr_segments", &self.segments.len())
            .field("alloc_segnum", &self.alloc_segnum.load(Ordering::Relaxed))
            .field("free_pages", &self.free_pages())
            .finish()
    }
}
