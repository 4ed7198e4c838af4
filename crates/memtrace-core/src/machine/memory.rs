//! Sparse mapped address space backing the reference engine.

use std::ops::BitOr;

use crate::MemoryError;

/// Access permissions of a mapped region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Permissions(u8);

impl Permissions {
    /// No access.
    pub const NONE: Self = Self(0);
    /// Guest loads allowed.
    pub const READ: Self = Self(1 << 0);
    /// Guest stores allowed.
    pub const WRITE: Self = Self(1 << 1);
    /// Instruction fetch allowed.
    pub const EXEC: Self = Self(1 << 2);
    /// Read, write and execute.
    pub const ALL: Self = Self(0b111);

    /// Returns `true` when every bit of `other` is present.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Raw permission bits.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for Permissions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone)]
struct Region {
    base: u64,
    perms: Permissions,
    bytes: Box<[u8]>,
}

impl Region {
    fn end(&self) -> u64 {
        self.base + self.bytes.len() as u64
    }
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    region: usize,
    offset: usize,
    len: usize,
}

/// Ordered set of non-overlapping mapped regions.
#[derive(Debug, Clone, Default)]
pub struct MemoryMap {
    regions: Vec<Region>,
}

impl MemoryMap {
    /// Creates an empty address space.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            regions: Vec::new(),
        }
    }

    /// Maps `size` zeroed bytes at `base`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidRange`] for empty or wrapping spans and
    /// [`MemoryError::Overlap`] when the span intersects an existing region.
    pub fn map(&mut self, base: u64, size: u64, perms: Permissions) -> Result<(), MemoryError> {
        let invalid = MemoryError::InvalidRange { base, size };
        if size == 0 {
            return Err(invalid);
        }
        let end = base.checked_add(size).ok_or(invalid)?;
        let len = usize::try_from(size).map_err(|_| invalid)?;

        if self
            .regions
            .iter()
            .any(|region| base < region.end() && region.base < end)
        {
            return Err(MemoryError::Overlap { base, size });
        }

        let index = self.regions.partition_point(|region| region.base < base);
        self.regions.insert(
            index,
            Region {
                base,
                perms,
                bytes: vec![0; len].into_boxed_slice(),
            },
        );
        Ok(())
    }

    /// Number of mapped regions.
    #[must_use]
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Reads mapped bytes without consulting permissions.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Unmapped`] when any byte of the span is unmapped.
    pub fn read(&self, address: u64, size: u64) -> Result<Vec<u8>, MemoryError> {
        let segments = self.segments(address, size)?;
        let mut out = Vec::with_capacity(segments.iter().map(|s| s.len).sum());
        for segment in segments {
            let bytes = &self.regions[segment.region].bytes;
            out.extend_from_slice(&bytes[segment.offset..segment.offset + segment.len]);
        }
        Ok(out)
    }

    /// Writes mapped bytes without consulting permissions.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Unmapped`] when any byte of the span is unmapped.
    pub fn write(&mut self, address: u64, data: &[u8]) -> Result<(), MemoryError> {
        let segments = self.segments(address, data.len() as u64)?;
        let mut consumed = 0;
        for segment in segments {
            let bytes = &mut self.regions[segment.region].bytes;
            bytes[segment.offset..segment.offset + segment.len]
                .copy_from_slice(&data[consumed..consumed + segment.len]);
            consumed += segment.len;
        }
        Ok(())
    }

    /// Checks that the whole span is mapped with `required` permissions.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Unmapped`] for holes in the span and
    /// [`MemoryError::ProtectionViolation`] for regions lacking `required`.
    pub fn check_access(
        &self,
        address: u64,
        size: u64,
        required: Permissions,
    ) -> Result<(), MemoryError> {
        let segments = self.segments(address, size)?;
        if segments
            .iter()
            .all(|segment| self.regions[segment.region].perms.contains(required))
        {
            Ok(())
        } else {
            Err(MemoryError::ProtectionViolation { address, size })
        }
    }

    fn segments(&self, address: u64, size: u64) -> Result<Vec<Segment>, MemoryError> {
        let unmapped = MemoryError::Unmapped { address, size };
        address.checked_add(size).ok_or(unmapped)?;

        let mut segments = Vec::new();
        let mut cursor = address;
        let mut remaining = size;
        while remaining > 0 {
            let index = self
                .regions
                .partition_point(|region| region.base <= cursor)
                .checked_sub(1)
                .ok_or(unmapped)?;
            let region = &self.regions[index];
            if cursor >= region.end() {
                return Err(unmapped);
            }
            let take = remaining.min(region.end() - cursor);
            segments.push(Segment {
                region: index,
                offset: usize::try_from(cursor - region.base).map_err(|_| unmapped)?,
                len: usize::try_from(take).map_err(|_| unmapped)?,
            });
            cursor += take;
            remaining -= take;
        }
        Ok(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryMap, Permissions};
    use crate::MemoryError;

    const RW: Permissions = Permissions(0b011);

    #[test]
    fn permission_sets_compose() {
        assert_eq!(Permissions::READ | Permissions::WRITE, RW);
        assert!(Permissions::ALL.contains(Permissions::EXEC));
        assert!(!Permissions::READ.contains(Permissions::WRITE));
        assert!(Permissions::READ.contains(Permissions::NONE));
        assert_eq!(Permissions::ALL.bits(), 0b111);
    }

    #[test]
    fn mapped_memory_starts_zeroed_and_round_trips() {
        let mut memory = MemoryMap::new();
        memory.map(0x1000, 0x100, RW).expect("map");

        assert_eq!(memory.read(0x1000, 4), Ok(vec![0; 4]));
        memory.write(0x10FE, &[0xAA, 0xBB]).expect("write tail");
        assert_eq!(memory.read(0x10FE, 2), Ok(vec![0xAA, 0xBB]));
    }

    #[test]
    fn spans_may_cross_adjacent_regions() {
        let mut memory = MemoryMap::new();
        memory.map(0x2000, 0x10, RW).expect("map high");
        memory.map(0x1FF0, 0x10, Permissions::READ).expect("map low");
        assert_eq!(memory.region_count(), 2);

        memory.write(0x1FFE, &[1, 2, 3, 4]).expect("cross-region write");
        assert_eq!(memory.read(0x1FFE, 4), Ok(vec![1, 2, 3, 4]));
        assert_eq!(
            memory.check_access(0x1FFE, 4, Permissions::WRITE),
            Err(MemoryError::ProtectionViolation {
                address: 0x1FFE,
                size: 4
            })
        );
        assert_eq!(memory.check_access(0x2000, 4, Permissions::WRITE), Ok(()));
    }

    #[test]
    fn holes_are_reported_as_unmapped() {
        let mut memory = MemoryMap::new();
        memory.map(0x1000, 0x10, RW).expect("map");

        assert_eq!(
            memory.read(0x100C, 8),
            Err(MemoryError::Unmapped {
                address: 0x100C,
                size: 8
            })
        );
        assert_eq!(
            memory.read(0x0FFF, 1),
            Err(MemoryError::Unmapped {
                address: 0x0FFF,
                size: 1
            })
        );
        assert!(memory.read(u64::MAX, 2).is_err());
    }

    #[test]
    fn invalid_and_overlapping_mappings_are_rejected() {
        let mut memory = MemoryMap::new();
        assert_eq!(
            memory.map(0x1000, 0, RW),
            Err(MemoryError::InvalidRange {
                base: 0x1000,
                size: 0
            })
        );
        assert_eq!(
            memory.map(u64::MAX, 2, RW),
            Err(MemoryError::InvalidRange {
                base: u64::MAX,
                size: 2
            })
        );

        memory.map(0x1000, 0x100, RW).expect("map");
        assert_eq!(
            memory.map(0x10F0, 0x20, RW),
            Err(MemoryError::Overlap {
                base: 0x10F0,
                size: 0x20
            })
        );
        assert_eq!(memory.map(0x1100, 0x20, RW), Ok(()));
    }
}
