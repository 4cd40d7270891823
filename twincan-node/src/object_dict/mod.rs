//! Object Dictionary
//!
//! The object dictionary is the table of variables a remote client can address by SDO. Each
//! [`ODEntry`] is identified by a 16-bit index and an 8-bit sub index, has a [`DataType`] of at
//! most 4 bytes, an [`AccessType`], and is backed either by a [`FieldAccess`] implementation such
//! as [`ScalarField`] or by application accessor callbacks.
//!
//! The application declares the entries as a mutable slice, usually in a static.
//! [`ObjectDict::new`] sorts the slice by address and checks it once. After that the dictionary is
//! read-only; values change only through their storage.
//!
//! ```
//! use twincan_node::object_dict::{EntryName, ODEntry, ObjectDict, ScalarField};
//! use twincan_node::common::objects::{AccessType, DataType};
//!
//! let device_type = ScalarField::<u32>::new(42);
//! let setpoint = ScalarField::<i16>::new(0);
//! let mut entries = [
//!     ODEntry::direct(
//!         0x2000, 1,
//!         EntryName::new("Application", "Control", "Setpoint"),
//!         DataType::Int16, AccessType::Rw, &setpoint,
//!     ),
//!     ODEntry::direct(
//!         0x1000, 0,
//!         EntryName::new("Communication", "Identity", "Device Type"),
//!         DataType::UInt32, AccessType::Ro, &device_type,
//!     ),
//! ];
//! let od = ObjectDict::new(&mut entries).unwrap();
//! assert_eq!(Ok(42u32.to_le_bytes()), od.find(0x1000, 0).unwrap().read());
//! ```
//!
//! [`DataType`]: crate::common::objects::DataType
//! [`AccessType`]: crate::common::objects::AccessType
use snafu::Snafu;
use twincan_common::objects::ObjectId;

mod entry;
mod field;

pub use entry::{EntryName, ODEntry, ReadAccessor, Storage, WriteAccessor};
pub use field::{FieldAccess, ScalarField};

/// Error returned when a dictionary fails validation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Snafu)]
pub enum OdError {
    /// Two entries share an address
    #[snafu(display("Multiple definitions of object 0x{index:x} sub {sub}"))]
    DuplicateKey {
        /// Object index
        index: u16,
        /// Sub index
        sub: u8,
    },
    /// Two entries share a category, subcategory and name
    #[snafu(display("Object 0x{index:x} sub {sub} reuses the name of another object"))]
    DuplicateName {
        /// Object index of the later entry
        index: u16,
        /// Sub index of the later entry
        sub: u8,
    },
    /// An access right is granted without a matching accessor
    #[snafu(display("Object 0x{index:x} sub {sub} has no accessor for its access type"))]
    MissingAccessor {
        /// Object index
        index: u16,
        /// Sub index
        sub: u8,
    },
    /// Direct storage size differs from the data type size
    #[snafu(display("Object 0x{index:x} sub {sub} storage size does not match its data type"))]
    SizeMismatch {
        /// Object index
        index: u16,
        /// Sub index
        sub: u8,
    },
}

/// A sorted, validated table of [`ODEntry`]
#[derive(Clone, Copy, Debug)]
pub struct ObjectDict<'a> {
    entries: &'a [ODEntry<'a>],
}

impl<'a> ObjectDict<'a> {
    /// Sort `entries` by address and validate them
    pub fn new(entries: &'a mut [ODEntry<'a>]) -> Result<Self, OdError> {
        entries.sort_unstable_by_key(|e| e.id());
        Self::validate(entries)?;
        Ok(Self { entries })
    }

    fn validate(entries: &[ODEntry<'a>]) -> Result<(), OdError> {
        for pair in entries.windows(2) {
            if pair[0].id() == pair[1].id() {
                return DuplicateKeySnafu {
                    index: pair[1].index,
                    sub: pair[1].sub,
                }
                .fail();
            }
        }

        for (i, entry) in entries.iter().enumerate() {
            let (index, sub) = (entry.index, entry.sub);
            if entries[..i].iter().any(|other| other.name == entry.name) {
                return DuplicateNameSnafu { index, sub }.fail();
            }
            match entry.storage {
                Storage::Direct(field) => {
                    if field.size() != entry.data_type.size() {
                        return SizeMismatchSnafu { index, sub }.fail();
                    }
                }
                Storage::Accessor { read, write } => {
                    if (entry.access.is_readable() && read.is_none())
                        || (entry.access.is_writable() && write.is_none())
                    {
                        return MissingAccessorSnafu { index, sub }.fail();
                    }
                }
            }
        }
        Ok(())
    }

    /// Lookup an entry by address
    pub fn find(&self, index: u16, sub: u8) -> Option<&'a ODEntry<'a>> {
        self.entries
            .binary_search_by_key(&ObjectId::new(index, sub), |e| e.id())
            .ok()
            .map(|i| &self.entries[i])
    }

    /// All entries, in address order
    pub fn entries(&self) -> &'a [ODEntry<'a>] {
        self.entries
    }

    /// The number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the dictionary has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;

    use super::*;
    use twincan_common::objects::{AccessType, DataType};
    use twincan_common::sdo::AbortCode;

    fn name(n: &'static str) -> EntryName<'static> {
        EntryName::new("Test", "Sub", n)
    }

    #[test]
    fn test_entries_are_sorted_and_found() {
        let a = ScalarField::<u8>::new(1);
        let b = ScalarField::<u8>::new(2);
        let c = ScalarField::<u8>::new(3);
        let mut entries = [
            ODEntry::direct(0x2001, 0, name("c"), DataType::UInt8, AccessType::Ro, &c),
            ODEntry::direct(0x2000, 2, name("b"), DataType::UInt8, AccessType::Ro, &b),
            ODEntry::direct(0x2000, 1, name("a"), DataType::UInt8, AccessType::Ro, &a),
        ];
        let od = ObjectDict::new(&mut entries).unwrap();
        let keys: Vec<ObjectId> = od.entries().iter().map(|e| e.id()).collect();
        assert_eq!(
            vec![
                ObjectId::new(0x2000, 1),
                ObjectId::new(0x2000, 2),
                ObjectId::new(0x2001, 0)
            ],
            keys
        );
        assert_eq!(Ok([2, 0, 0, 0]), od.find(0x2000, 2).unwrap().read());
        assert!(od.find(0x2000, 3).is_none());
        assert!(od.find(0x1000, 0).is_none());
    }

    #[test]
    fn test_duplicate_key() {
        let a = ScalarField::<u8>::new(1);
        let mut entries = [
            ODEntry::direct(0x2000, 1, name("a"), DataType::UInt8, AccessType::Ro, &a),
            ODEntry::direct(0x2000, 1, name("b"), DataType::UInt8, AccessType::Ro, &a),
        ];
        assert_eq!(
            Err(OdError::DuplicateKey {
                index: 0x2000,
                sub: 1
            }),
            ObjectDict::new(&mut entries).map(|_| ())
        );
    }

    #[test]
    fn test_duplicate_name() {
        let a = ScalarField::<u8>::new(1);
        let mut entries = [
            ODEntry::direct(0x2000, 1, name("a"), DataType::UInt8, AccessType::Ro, &a),
            ODEntry::direct(0x2000, 2, name("a"), DataType::UInt8, AccessType::Ro, &a),
        ];
        assert_eq!(
            Err(OdError::DuplicateName {
                index: 0x2000,
                sub: 2
            }),
            ObjectDict::new(&mut entries).map(|_| ())
        );
    }

    #[test]
    fn test_missing_accessor() {
        let read = |buf: &mut [u8]| -> Result<(), AbortCode> {
            buf.fill(0);
            Ok(())
        };
        let mut entries = [ODEntry::accessor(
            0x3000,
            0,
            name("x"),
            DataType::UInt16,
            AccessType::Rw,
            Some(&read),
            None,
        )];
        assert_eq!(
            Err(OdError::MissingAccessor {
                index: 0x3000,
                sub: 0
            }),
            ObjectDict::new(&mut entries).map(|_| ())
        );
    }

    #[test]
    fn test_size_mismatch() {
        let field = ScalarField::<u32>::new(0);
        let mut entries = [ODEntry::direct(
            0x2000,
            0,
            name("x"),
            DataType::UInt16,
            AccessType::Rw,
            &field,
        )];
        assert_eq!(
            Err(OdError::SizeMismatch {
                index: 0x2000,
                sub: 0
            }),
            ObjectDict::new(&mut entries).map(|_| ())
        );
    }

    #[test]
    fn test_access_rights_and_accessors() {
        let stored = Cell::new(0u16);
        let read = |buf: &mut [u8]| -> Result<(), AbortCode> {
            buf.copy_from_slice(&stored.get().to_le_bytes());
            Ok(())
        };
        let write = |data: &[u8]| -> Result<(), AbortCode> {
            let value = u16::from_le_bytes([data[0], data[1]]);
            if value > 1000 {
                return Err(AbortCode::ValueTooHigh);
            }
            stored.set(value);
            Ok(())
        };
        let wo = ScalarField::<u8>::new(5);
        let mut entries = [
            ODEntry::accessor(
                0x3000,
                0,
                name("limit"),
                DataType::UInt16,
                AccessType::Rw,
                Some(&read),
                Some(&write),
            ),
            ODEntry::direct(0x3001, 0, name("wo"), DataType::UInt8, AccessType::Wo, &wo),
        ];
        let od = ObjectDict::new(&mut entries).unwrap();
        let limit = od.find(0x3000, 0).unwrap();
        assert_eq!(Ok(()), limit.write(&[0xe8, 0x03, 0xff, 0xff]));
        assert_eq!(1000, stored.get());
        assert_eq!(Ok([0xe8, 0x03, 0, 0]), limit.read());
        assert_eq!(Err(AbortCode::ValueTooHigh), limit.write(&[0xe9, 0x03, 0, 0]));
        assert_eq!(1000, stored.get());

        let wo_entry = od.find(0x3001, 0).unwrap();
        assert_eq!(Err(AbortCode::WriteOnly), wo_entry.read());
        assert_eq!(Ok(()), wo_entry.write(&[9, 0, 0, 0]));
        assert_eq!(9, wo.load());
    }
}
