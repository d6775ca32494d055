//! Critical-section protected storage.
//!
//! Every structure touched from both interrupt and task context lives in a
//! [`CsCell`]. Access is always scoped: the closure runs with interrupts
//! masked and must not call back into the same cell.

use core::cell::{RefCell, RefMut};

use critical_section::{CriticalSection, Mutex};

/// Interior-mutable cell whose contents are only reachable inside a
/// critical section.
pub struct CsCell<T> {
    inner: Mutex<RefCell<T>>,
}

impl<T> CsCell<T> {
    /// Wraps `value`.
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(value)),
        }
    }

    /// Enters a critical section and runs `f` on the contents.
    pub fn lock<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        critical_section::with(|cs| f(&mut self.inner.borrow_ref_mut(cs)))
    }

    /// Borrows the contents inside a critical section the caller already holds.
    pub fn borrow_mut<'cs>(&'cs self, cs: CriticalSection<'cs>) -> RefMut<'cs, T> {
        self.inner.borrow_ref_mut(cs)
    }

    /// Consumes the cell.
    pub fn into_inner(self) -> T {
        self.inner.into_inner().into_inner()
    }
}

impl<T: Default> Default for CsCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
