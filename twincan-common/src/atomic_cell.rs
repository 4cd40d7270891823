//! Implements an AtomicCell type which uses critical_section Mutex to enforce atomic store/load
//!
//! Cortex-M0 class cores lack CAS instructions, so every cell shared with an interrupt or with the
//! other core goes through a critical section instead.

use core::cell::Cell;
use critical_section::Mutex;

/// A `Copy` value guarded by a critical section
#[derive(Debug)]
pub struct AtomicCell<T: Copy> {
    inner: Mutex<Cell<T>>,
}

impl<T: Send + Copy> AtomicCell<T> {
    /// Create a new cell holding `value`
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(Cell::new(value)),
        }
    }

    /// Read the current value
    pub fn load(&self) -> T {
        critical_section::with(|cs| self.inner.borrow(cs).get())
    }

    /// Overwrite the current value
    pub fn store(&self, value: T) {
        critical_section::with(|cs| self.inner.borrow(cs).set(value));
    }

    /// Store `value` and return the previous value
    pub fn swap(&self, value: T) -> T {
        critical_section::with(|cs| self.inner.borrow(cs).replace(value))
    }

    /// Conditionally update the value
    ///
    /// `f` is called with the current value inside the critical section. If it returns `Some`, the
    /// new value is stored and the old one returned as `Ok`; otherwise the value is untouched and
    /// returned as `Err`.
    pub fn fetch_update(&self, mut f: impl FnMut(T) -> Option<T>) -> Result<T, T> {
        critical_section::with(|cs| {
            let old_value = self.inner.borrow(cs).get();
            if let Some(new_value) = f(old_value) {
                self.inner.borrow(cs).set(new_value);
                Ok(old_value)
            } else {
                Err(old_value)
            }
        })
    }
}

impl<T: Send + Copy + Default> AtomicCell<T> {
    /// Read the value and leave `T::default()` in its place
    pub fn take(&self) -> T {
        critical_section::with(|cs| self.inner.borrow(cs).take())
    }
}

impl<T: Default + Copy + Send> Default for AtomicCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_update_only_stores_on_some() {
        let cell = AtomicCell::new(false);
        assert_eq!(Ok(false), cell.fetch_update(|v| (!v).then_some(true)));
        assert_eq!(Err(true), cell.fetch_update(|v| (!v).then_some(true)));
        assert!(cell.load());
    }

    #[test]
    fn test_take_and_swap() {
        let cell: AtomicCell<Option<u8>> = AtomicCell::new(Some(3));
        assert_eq!(Some(3), cell.take());
        assert_eq!(None, cell.swap(Some(7)));
        assert_eq!(Some(7), cell.load());
    }
}
