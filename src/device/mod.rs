/// Read-only geometry of the underlying flash device
///
/// The translation layer never mutates the device; it only sizes its
/// structures and computes page numbers from these queries.
pub trait DeviceGeometry: Send + Sync {
    /// Total addressable size in bytes
    fn total_size(&self) -> u64;

    /// Size of one flash page in bytes
    fn page_size(&self) -> u64;

    /// Number of page slots in one segment (erase unit)
    fn pages_per_segment(&self) -> u64;

    /// Number of segments on the device
    fn nr_segments(&self) -> u64;

    /// Total number of physical pages
    fn total_pages(&self) -> u64 {
        self.pages_per_segment().saturating_mul(self.nr_segments())
    }
}

pub mod geometry;

pub use geometry::Geometry;
