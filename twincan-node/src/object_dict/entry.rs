use twincan_common::{
    objects::{AccessType, DataType, ObjectId},
    sdo::AbortCode,
};

use super::FieldAccess;

/// Reads an object value into a buffer sized by its data type
pub type ReadAccessor<'a> = &'a dyn Fn(&mut [u8]) -> Result<(), AbortCode>;
/// Stores an object value from a buffer sized by its data type
pub type WriteAccessor<'a> = &'a dyn Fn(&[u8]) -> Result<(), AbortCode>;

/// Where the value of an entry lives
#[derive(Clone, Copy)]
pub enum Storage<'a> {
    /// A typed field read and written directly
    Direct(&'a dyn FieldAccess),
    /// Application callbacks. A callback must be present for each access right granted.
    Accessor {
        /// Called for reads
        read: Option<ReadAccessor<'a>>,
        /// Called for writes
        write: Option<WriteAccessor<'a>>,
    },
}

impl core::fmt::Debug for Storage<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Storage::Direct(field) => f.debug_tuple("Direct").field(&field.size()).finish(),
            Storage::Accessor { read, write } => f
                .debug_struct("Accessor")
                .field("read", &read.is_some())
                .field("write", &write.is_some())
                .finish(),
        }
    }
}

/// Human readable naming of an entry
///
/// The triple must be unique within a dictionary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntryName<'a> {
    /// Top level grouping, e.g. "Communication"
    pub category: &'a str,
    /// Second level grouping
    pub subcategory: &'a str,
    /// The variable name
    pub name: &'a str,
}

impl<'a> EntryName<'a> {
    /// Create a new name
    pub const fn new(category: &'a str, subcategory: &'a str, name: &'a str) -> Self {
        Self {
            category,
            subcategory,
            name,
        }
    }
}

/// A single addressable variable in the object dictionary
#[derive(Clone, Copy, Debug)]
pub struct ODEntry<'a> {
    /// The object index
    pub index: u16,
    /// The sub index
    pub sub: u8,
    /// Naming metadata
    pub name: EntryName<'a>,
    /// The type of the value, which also fixes its encoded size
    pub data_type: DataType,
    /// Access rights granted to SDO clients
    pub access: AccessType,
    /// Backing storage
    pub storage: Storage<'a>,
}

impl<'a> ODEntry<'a> {
    /// Create an entry backed by a field
    pub const fn direct(
        index: u16,
        sub: u8,
        name: EntryName<'a>,
        data_type: DataType,
        access: AccessType,
        field: &'a dyn FieldAccess,
    ) -> Self {
        Self {
            index,
            sub,
            name,
            data_type,
            access,
            storage: Storage::Direct(field),
        }
    }

    /// Create an entry backed by application callbacks
    pub const fn accessor(
        index: u16,
        sub: u8,
        name: EntryName<'a>,
        data_type: DataType,
        access: AccessType,
        read: Option<ReadAccessor<'a>>,
        write: Option<WriteAccessor<'a>>,
    ) -> Self {
        Self {
            index,
            sub,
            name,
            data_type,
            access,
            storage: Storage::Accessor { read, write },
        }
    }

    /// The address of the entry
    pub fn id(&self) -> ObjectId {
        ObjectId::new(self.index, self.sub)
    }

    /// Read the value
    ///
    /// The value is encoded little endian in the first `data_type.size()` bytes; the rest is zero.
    pub fn read(&self) -> Result<[u8; 4], AbortCode> {
        if !self.access.is_readable() {
            return Err(AbortCode::WriteOnly);
        }
        let mut buf = [0; 4];
        let value = &mut buf[..self.data_type.size()];
        match self.storage {
            Storage::Direct(field) => field.read(value)?,
            Storage::Accessor {
                read: Some(read), ..
            } => read(value)?,
            Storage::Accessor { read: None, .. } => return Err(AbortCode::UnsupportedAccess),
        }
        Ok(buf)
    }

    /// Write the value from the first `data_type.size()` bytes of `data`
    pub fn write(&self, data: &[u8; 4]) -> Result<(), AbortCode> {
        if !self.access.is_writable() {
            return Err(AbortCode::ReadOnly);
        }
        let value = &data[..self.data_type.size()];
        match self.storage {
            Storage::Direct(field) => field.write(value),
            Storage::Accessor {
                write: Some(write), ..
            } => write(value),
            Storage::Accessor { write: None, .. } => Err(AbortCode::UnsupportedAccess),
        }
    }
}
