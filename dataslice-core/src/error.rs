//! Error types for core dataset operations

/// Errors raised by shape, slice and header validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreError {
    /// Logical and physical shapes disagree on their non-unit axes
    ShapeMismatch,
    /// Slice does not fit the shape it was constructed against
    InvalidSlice,
    /// Positional access outside the valid range
    IndexOutOfRange,
    /// Invalid dataset header
    InvalidHeader,
    /// Unknown data-type tag
    UnknownDataType,
    /// Size calculation would overflow
    SizeOverflow,
}

impl core::fmt::Display for CoreError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            CoreError::ShapeMismatch => "logical and physical shapes do not match",
            CoreError::InvalidSlice => "slice does not fit its source shape",
            CoreError::IndexOutOfRange => "index out of range",
            CoreError::InvalidHeader => "invalid dataset header",
            CoreError::UnknownDataType => "unknown data-type tag",
            CoreError::SizeOverflow => "size calculation overflow",
        };
        write!(f, "{msg}")
    }
}

impl core::error::Error for CoreError {}

/// Result type for core operations
pub type Result<T> = core::result::Result<T, CoreError>;
