//! # Page FTL
//!
//! Page-level address translation and free-space allocation for a flash
//! translation layer.
//!
//! ## Features
//!
//! - **Packed Addresses**: `{segment, offset}` in one scalar, widths from geometry
//! - **Round-Robin Allocation**: bounded probing with per-segment atomic claims
//! - **Translation Table**: fixed-size logical -> physical page map
//! - **LRU Cache**: arena-backed recency cache with typed release callbacks
//!
//! ## Example
//!
//! ```rust
//! use page_ftl::{Geometry, PageFtl};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let ftl = PageFtl::with_geometry(Geometry::small())?;
//!
//! // Claim a physical page and map sector 8192 onto it
//! let addr = ftl.get_free_page();
//! assert!(!addr.is_empty());
//! ftl.update_map(8192, addr.raw())?;
//!
//! assert_eq!(ftl.get_map(8192), addr);
//! # Ok(())
//! # }
//! ```

pub mod address;
pub mod cache;
pub mod device;
pub mod ftl;
pub mod map;
pub mod profiling;
pub mod segment;
pub mod types;

pub use address::{AddressCodec, DeviceAddress};
pub use cache::{LruCache, NoRelease, Release};
pub use device::{DeviceGeometry, Geometry};
pub use ftl::PageFtl;
pub use types::{CacheConfig, FtlError, ReleaseError, Result};
