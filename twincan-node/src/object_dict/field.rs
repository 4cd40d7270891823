//! Direct storage for object dictionary entries
use twincan_common::{sdo::AbortCode, AtomicCell};

/// A typed value which an [`ODEntry`](super::ODEntry) can read and write directly
///
/// Values are encoded little endian. Implementations must be safe to access from the node's
/// processing context while the application reads and writes them from elsewhere.
pub trait FieldAccess: Sync {
    /// The encoded size in bytes
    fn size(&self) -> usize;

    /// Encode the value into `buf`, which is exactly [`size`](Self::size) bytes long
    fn read(&self, buf: &mut [u8]) -> Result<(), AbortCode>;

    /// Decode and store a new value from `data`, which is exactly [`size`](Self::size) bytes long
    fn write(&self, data: &[u8]) -> Result<(), AbortCode>;
}

/// A scalar value of type T, stored in an [`AtomicCell`]
#[allow(missing_debug_implementations)]
pub struct ScalarField<T: Copy> {
    value: AtomicCell<T>,
}

impl<T: Send + Copy> ScalarField<T> {
    /// Atomically read the value of the field
    pub fn load(&self) -> T {
        self.value.load()
    }

    /// Atomically store a new value into the field
    pub fn store(&self, value: T) {
        self.value.store(value);
    }
}

impl<T: Copy + Default + Send> Default for ScalarField<T> {
    fn default() -> Self {
        Self {
            value: AtomicCell::default(),
        }
    }
}

fn length_error(actual: usize, expected: usize) -> AbortCode {
    if actual < expected {
        AbortCode::DataTypeMismatchLengthLow
    } else {
        AbortCode::DataTypeMismatchLengthHigh
    }
}

macro_rules! impl_scalar_field {
    ($rust_type: ty) => {
        impl ScalarField<$rust_type> {
            /// Create a new ScalarField with the given value
            pub const fn new(value: $rust_type) -> Self {
                Self {
                    value: AtomicCell::new(value),
                }
            }
        }

        impl FieldAccess for ScalarField<$rust_type> {
            fn size(&self) -> usize {
                core::mem::size_of::<$rust_type>()
            }

            fn read(&self, buf: &mut [u8]) -> Result<(), AbortCode> {
                let bytes = self.value.load().to_le_bytes();
                if buf.len() != bytes.len() {
                    return Err(length_error(buf.len(), bytes.len()));
                }
                buf.copy_from_slice(&bytes);
                Ok(())
            }

            fn write(&self, data: &[u8]) -> Result<(), AbortCode> {
                let value = <$rust_type>::from_le_bytes(
                    data.try_into()
                        .map_err(|_| length_error(data.len(), self.size()))?,
                );
                self.value.store(value);
                Ok(())
            }
        }
    };
}

impl_scalar_field!(u8);
impl_scalar_field!(u16);
impl_scalar_field!(u32);
impl_scalar_field!(i8);
impl_scalar_field!(i16);
impl_scalar_field!(i32);
impl_scalar_field!(f32);

impl ScalarField<bool> {
    /// Create a new ScalarField with the given value
    pub const fn new(value: bool) -> Self {
        Self {
            value: AtomicCell::new(value),
        }
    }
}

// bool doesn't support from_le_bytes so it needs a special implementation
impl FieldAccess for ScalarField<bool> {
    fn size(&self) -> usize {
        1
    }

    fn read(&self, buf: &mut [u8]) -> Result<(), AbortCode> {
        if buf.len() != 1 {
            return Err(length_error(buf.len(), 1));
        }
        buf[0] = self.value.load() as u8;
        Ok(())
    }

    fn write(&self, data: &[u8]) -> Result<(), AbortCode> {
        if data.len() != 1 {
            return Err(length_error(data.len(), 1));
        }
        self.value.store(data[0] != 0);
        Ok(())
    }
}
