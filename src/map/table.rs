use crate::address::DeviceAddress;
use crate::types::{FtlError, Result};

/// Flat logical page number -> physical page number table
///
/// Fixed size; entries start unmapped. Not synchronized: callers that share it
/// between threads wrap it in a lock.
pub struct TranslationTable {
    entries: Box<[u32]>,
}

impl TranslationTable {
    /// Create a table with `capacity` unmapped entries
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: vec![DeviceAddress::EMPTY.raw(); capacity].into_boxed_slice(),
        }
    }

    pub fn capacity(&self) -> u64 {
        self.entries.len() as u64
    }

    /// Overwrite the entry for `lpn`. Last writer wins.
    pub fn update(&mut self, lpn: u64, ppn: u32) -> Result<()> {
        let capacity = self.capacity();
        if lpn >= capacity {
            return Err(FtlError::OutOfRange { lpn, capacity });
        }
        self.entries[lpn as usize] = ppn;
        Ok(())
    }

    /// Overwrite an entry the caller has already bounds-checked
    pub(crate) fn set(&mut self, lpn: u64, ppn: u32) {
        self.entries[lpn as usize] = ppn;
    }

    /// Read the entry for `lpn`, or `None` past the end of the table
    pub fn get(&self, lpn: u64) -> Option<DeviceAddress> {
        self.entries
            .get(usize::try_from(lpn).ok()?)
            .map(|raw| DeviceAddress::from_raw(*raw))
    }

    /// Number of entries currently holding an address
    pub fn mapped_count(&self) -> usize {
        let empty = DeviceAddress::EMPTY.raw();
        self.entries.iter().filter(|raw| **raw != empty).count()
    }
}

impl std::fmt::Debug for TranslationTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationTable")
            .field("capacity", &self.entries.len())
            .field("mapped", &self.mapped_count())
            .finish()
    }
}
