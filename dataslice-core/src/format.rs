//! Binary header format for native dataset files
//!
//! A `.dslc` file is a fixed-size header followed by the array data in
//! row-major order, little-endian. The header is byte-exact and parsed
//! field by field with validation; no unsafe pointer casting.

use crate::dtype::DataType;
use crate::error::{CoreError, Result};

/// Header flags for dataset properties
pub mod flags {
    /// Signed stored values are presented as the unsigned type of the
    /// same width when read
    pub const EXTEND_UNSIGNED: u8 = 1 << 0;
}

/// Fixed-size header for `.dslc` files (112 bytes, 8-byte aligned data)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DslcHeader {
    /// Magic bytes: "DSLC"
    pub magic: [u8; 4],
    /// Format version (1)
    pub version: u8,
    /// Element data type tag
    pub data_type: u8,
    /// Number of axes (at most [`DslcHeader::MAX_RANK`])
    pub rank: u8,
    /// Property flags (see [`flags`])
    pub flags: u8,
    /// Values per element, for compound/complex elements (at least 1)
    pub item_multiplicity: u32,
    /// Axis extents; entries past `rank` are zero
    pub dims: [u64; DslcHeader::MAX_RANK],
    /// Offset of the data section from the start of the file
    pub data_offset: u64,
    /// Size of the data section in bytes
    pub data_size: u64,
    /// Reserved bytes for future use
    pub reserved: [u8; 16],
}

impl DslcHeader {
    /// Magic bytes for `.dslc` files
    pub const MAGIC: [u8; 4] = *b"DSLC";

    /// Current format version
    pub const VERSION: u8 = 1;

    /// Maximum supported rank
    pub const MAX_RANK: usize = 8;

    /// Size of the header in bytes
    pub const SIZE: usize = 112;

    /// Build a header for an array of the given type and extents.
    ///
    /// The data section is laid out immediately after the header; its
    /// size is derived from the extents with overflow protection.
    pub fn with_shape(data_type: DataType, dims: &[u64], item_multiplicity: u32) -> Result<Self> {
        if dims.len() > Self::MAX_RANK {
            return Err(CoreError::InvalidHeader);
        }
        if item_multiplicity == 0 {
            return Err(CoreError::InvalidHeader);
        }
        let mut stored = [0u64; Self::MAX_RANK];
        stored[..dims.len()].copy_from_slice(dims);

        let mut header = DslcHeader {
            magic: Self::MAGIC,
            version: Self::VERSION,
            data_type: data_type.tag(),
            rank: dims.len() as u8,
            flags: 0,
            item_multiplicity,
            dims: stored,
            data_offset: Self::SIZE as u64,
            data_size: 0,
            reserved: [0; 16],
        };
        header.data_size = header.expected_data_size()?;
        Ok(header)
    }

    /// Validate the header magic and version
    pub fn is_valid(&self) -> bool {
        self.magic == Self::MAGIC
            && self.version <= Self::VERSION
            && (self.rank as usize) <= Self::MAX_RANK
            && self.item_multiplicity >= 1
    }

    /// The element data type recorded in the header
    pub fn element_type(&self) -> Result<DataType> {
        DataType::from_tag(self.data_type)
    }

    /// Whether the extend-as-unsigned flag is set
    pub fn extend_unsigned(&self) -> bool {
        self.flags & flags::EXTEND_UNSIGNED != 0
    }

    /// Number of elements described by the recorded extents
    pub fn element_count(&self) -> Result<u64> {
        let mut count: u64 = 1;
        for &dim in &self.dims[..self.rank as usize] {
            count = count.checked_mul(dim).ok_or(CoreError::SizeOverflow)?;
        }
        Ok(count)
    }

    /// The data-section size implied by type, extents and multiplicity
    pub fn expected_data_size(&self) -> Result<u64> {
        let elem_size = self.element_type()?.size_bytes() as u64;
        self.element_count()?
            .checked_mul(self.item_multiplicity as u64)
            .and_then(|n| n.checked_mul(elem_size))
            .ok_or(CoreError::SizeOverflow)
    }

    /// The recorded extents as a shape
    #[cfg(feature = "alloc")]
    pub fn shape(&self) -> alloc::vec::Vec<usize> {
        self.dims[..self.rank as usize]
            .iter()
            .map(|&d| d as usize)
            .collect()
    }

    /// Safely read a header from bytes with validation
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(CoreError::InvalidHeader);
        }
        if bytes[0..4] != Self::MAGIC {
            return Err(CoreError::InvalidHeader);
        }

        let version = bytes[4];
        if version > Self::VERSION {
            return Err(CoreError::InvalidHeader);
        }

        let data_type = bytes[5];
        DataType::from_tag(data_type)?;

        let rank = bytes[6];
        if rank as usize > Self::MAX_RANK {
            return Err(CoreError::InvalidHeader);
        }

        let header_flags = bytes[7];
        let item_multiplicity =
            u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        if item_multiplicity == 0 {
            return Err(CoreError::InvalidHeader);
        }

        let mut dims = [0u64; Self::MAX_RANK];
        for (axis, dim) in dims.iter_mut().enumerate() {
            let at = 16 + axis * 8;
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&bytes[at..at + 8]);
            *dim = u64::from_le_bytes(raw);
        }
        // Extents past the recorded rank must be zero.
        if dims[rank as usize..].iter().any(|&d| d != 0) {
            return Err(CoreError::InvalidHeader);
        }

        let mut raw = [0u8; 8];
        raw.copy_from_slice(&bytes[80..88]);
        let data_offset = u64::from_le_bytes(raw);
        raw.copy_from_slice(&bytes[88..96]);
        let data_size = u64::from_le_bytes(raw);

        let mut reserved = [0u8; 16];
        reserved.copy_from_slice(&bytes[96..112]);

        let header = DslcHeader {
            magic: Self::MAGIC,
            version,
            data_type,
            rank,
            flags: header_flags,
            item_multiplicity,
            dims,
            data_offset,
            data_size,
            reserved,
        };

        if data_offset < Self::SIZE as u64 {
            return Err(CoreError::InvalidHeader);
        }
        if header.data_size != header.expected_data_size()? {
            return Err(CoreError::InvalidHeader);
        }

        Ok(header)
    }

    /// Convert to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes[5] = self.data_type;
        bytes[6] = self.rank;
        bytes[7] = self.flags;
        bytes[8..12].copy_from_slice(&self.item_multiplicity.to_le_bytes());
        // bytes 12..16 stay zero, padding to the 8-byte dims boundary
        for (axis, dim) in self.dims.iter().enumerate() {
            let at = 16 + axis * 8;
            bytes[at..at + 8].copy_from_slice(&dim.to_le_bytes());
        }
        bytes[80..88].copy_from_slice(&self.data_offset.to_le_bytes());
        bytes[88..96].copy_from_slice(&self.data_size.to_le_bytes());
        bytes[96..112].copy_from_slice(&self.reserved);
        bytes
    }
}
