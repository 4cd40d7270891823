//! Object metadata
//!

/// A container for the address of a sub object
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ObjectId {
    /// Object index
    pub index: u16,
    /// Sub index
    pub sub: u8,
}

impl ObjectId {
    /// Create a new ObjectId
    pub const fn new(index: u16, sub: u8) -> Self {
        Self { index, sub }
    }
}

/// Access type enum
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AccessType {
    /// Read-only
    #[default]
    Ro,
    /// Write-only
    Wo,
    /// Read-write
    Rw,
}

impl AccessType {
    /// Returns true if an object with this access type can be read
    pub fn is_readable(&self) -> bool {
        matches!(self, AccessType::Ro | AccessType::Rw)
    }

    /// Returns true if an object with this access type can be written
    pub fn is_writable(&self) -> bool {
        matches!(self, AccessType::Rw | AccessType::Wo)
    }
}

/// Indicate the type of data stored in an object
///
/// Only types that fit in a single expedited SDO transfer are supported.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
#[allow(missing_docs)]
pub enum DataType {
    Boolean = 1,
    #[default]
    Int8 = 2,
    Int16 = 3,
    Int32 = 4,
    UInt8 = 5,
    UInt16 = 6,
    UInt32 = 7,
    Real32 = 8,
}

impl DataType {
    /// The encoded size of the type in bytes
    pub const fn size(&self) -> usize {
        match self {
            DataType::Boolean | DataType::Int8 | DataType::UInt8 => 1,
            DataType::Int16 | DataType::UInt16 => 2,
            DataType::Int32 | DataType::UInt32 | DataType::Real32 => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_rights() {
        assert!(AccessType::Ro.is_readable());
        assert!(!AccessType::Ro.is_writable());
        assert!(!AccessType::Wo.is_readable());
        assert!(AccessType::Wo.is_writable());
        assert!(AccessType::Rw.is_readable() && AccessType::Rw.is_writable());
    }

    #[test]
    fn test_sizes_fit_expedited_transfer() {
        for dt in [
            DataType::Boolean,
            DataType::Int8,
            DataType::Int16,
            DataType::Int32,
            DataType::UInt8,
            DataType::UInt16,
            DataType::UInt32,
            DataType::Real32,
        ] {
            assert!(dt.size() <= 4);
        }
        assert_eq!(2, DataType::UInt16.size());
    }
}
