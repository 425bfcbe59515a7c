use crate::device::DeviceGeometry;
use crate::types::{FtlError, Result};

/// Fixed geometry of an in-memory or externally described device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Size of each page in bytes (default: 4KB)
    pub page_size: u64,

    /// Page slots per segment (default: 64)
    pub pages_per_segment: u64,

    /// Number of segments (default: 1024)
    pub nr_segments: u64,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            page_size: 4096,
            pages_per_segment: 64,
            nr_segments: 1024,
        }
    }
}

impl Geometry {
    pub fn new(page_size: u64, pages_per_segment: u64, nr_segments: u64) -> Self {
        Self {
            page_size,
            pages_per_segment,
            nr_segments,
        }
    }

    /// A handful of tiny segments, handy for exhausting the device in tests
    pub fn small() -> Self {
        Self {
            page_size: 4096,
            pages_per_segment: 8,
            nr_segments: 4,
        }
    }

    /// Large-block NAND layout
    pub fn large() -> Self {
        Self {
            page_size: 16 * 1024,
            pages_per_segment: 256,
            nr_segments: 8192,
        }
    }

    /// Reject geometries no structure can be sized from
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(FtlError::InvalidGeometry("page size is zero"));
        }
        if self.pages_per_segment == 0 {
            return Err(FtlError::InvalidGeometry("pages per segment is zero"));
        }
        if self.nr_segments == 0 {
            return Err(FtlError::InvalidGeometry("segment count is zero"));
        }
        if self.checked_total_size().is_none() {
            return Err(FtlError::InvalidGeometry("device size overflows"));
        }
        Ok(())
    }

    /// Device size in bytes, or `None` if it does not fit in a `u64`
    pub fn checked_total_size(&self) -> Option<u64> {
        self.page_size
            .checked_mul(self.pages_per_segment)?
            .checked_mul(self.nr_segments)
    }
}

impl DeviceGeometry for Geometry {
    fn total_size(&self) -> u64 {
        self.checked_total_size().unwrap_or(u64::MAX)
    }

    fn page_size(&self) -> u64 {
        self.page_size
    }

    fn pages_per_segment(&self) -> u64 {
        self.pages_per_segment
    }

    fn nr_segments(&self) -> u64 {
        self.nr_segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_size_is_derived() {
        let geo = Geometry::small();
        assert_eq!(geo.total_size(), 4096 * 8 * 4);
        assert_eq!(geo.total_pages(), 32);
    }

    #[test]
    fn test_validate_rejects_zero_fields() {
        assert!(Geometry::default().validate().is_ok());
        assert!(Geometry::new(0, 8, 4).validate().is_err());
        assert!(Geometry::new(4096, 0, 4).validate().is_err());
        assert!(Geometry::new(4096, 8, 0).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_size_overflow() {
        // Address fields need only 31 bits, but the byte size is 2^71
        let geo = Geometry::new(1 << 40, 1 << 20, 1 << 11);
        assert_eq!(geo.checked_total_size(), None);
        assert!(matches!(
            geo.validate(),
            Err(FtlError::InvalidGeometry("device size overflows"))
        ));
        assert_eq!(geo.total_size(), u64::MAX);
    }
}
