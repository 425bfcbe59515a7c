use crate::device::DeviceGeometry;
use crate::types::{FtlError, Result};

/// Packed physical page address: segment index in the high bits, in-segment
/// offset in the low bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceAddress(u32);

impl DeviceAddress {
    /// Reserved "no address" value (unmapped entry, allocation failure)
    pub const EMPTY: DeviceAddress = DeviceAddress(u32::MAX);

    /// Wrap a raw scalar, e.g. one read back from the translation table
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw scalar value
    pub const fn raw(self) -> u32 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self == Self::EMPTY
    }
}

impl From<DeviceAddress> for u32 {
    fn from(addr: DeviceAddress) -> Self {
        addr.0
    }
}

/// Bit bookkeeping for [`DeviceAddress`], derived once from device geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressCodec {
    offset_bits: u32,
    segment_bits: u32,
    pages_per_segment: u64,
    nr_segments: u64,
}

/// Number of bits needed to hold every value in `0..count`
fn bits_for(count: u64) -> u32 {
    if count <= 1 {
        0
    } else {
        u64::BITS - (count - 1).leading_zeros()
    }
}

impl AddressCodec {
    /// Width of the raw address scalar
    pub const ADDRESS_BITS: u32 = u32::BITS;

    /// Build a codec for the given geometry.
    ///
    /// Fails when the two fields do not fit in the scalar, or when the highest
    /// legal address would collide with [`DeviceAddress::EMPTY`].
    pub fn new(geometry: &dyn DeviceGeometry) -> Result<Self> {
        let pages_per_segment = geometry.pages_per_segment();
        let nr_segments = geometry.nr_segments();
        if pages_per_segment == 0 || nr_segments == 0 {
            return Err(FtlError::InvalidGeometry("empty segment layout"));
        }

        let offset_bits = bits_for(pages_per_segment);
        let segment_bits = bits_for(nr_segments);
        if offset_bits + segment_bits > Self::ADDRESS_BITS {
            return Err(FtlError::InvalidGeometry(
                "segment and offset fields exceed the address width",
            ));
        }

        let codec = Self {
            offset_bits,
            segment_bits,
            pages_per_segment,
            nr_segments,
        };
        let highest = codec.pack((nr_segments - 1) as usize, (pages_per_segment - 1) as u32);
        if highest.is_empty() {
            return Err(FtlError::InvalidGeometry(
                "highest address collides with the empty sentinel",
            ));
        }

        Ok(codec)
    }

    pub fn offset_bits(&self) -> u32 {
        self.offset_bits
    }

    pub fn segment_bits(&self) -> u32 {
        self.segment_bits
    }

    fn offset_mask(&self) -> u64 {
        (1u64 << self.offset_bits) - 1
    }

    /// Combine a segment index and in-segment offset into one address
    pub fn pack(&self, segment: usize, offset: u32) -> DeviceAddress {
        debug_assert!((segment as u64) < self.nr_segments);
        debug_assert!((offset as u64) < self.pages_per_segment);

        let raw = ((segment as u64) << self.offset_bits) | (offset as u64 & self.offset_mask());
        DeviceAddress(raw as u32)
    }

    /// Split an address back into (segment index, offset).
    ///
    /// Returns `None` for the empty sentinel.
    pub fn unpack(&self, addr: DeviceAddress) -> Option<(usize, u32)> {
        if addr.is_empty() {
            return None;
        }
        let raw = addr.0 as u64;
        let segment = (raw >> self.offset_bits) as usize;
        let offset = (raw & self.offset_mask()) as u32;
        Some((segment, offset))
    }
}
