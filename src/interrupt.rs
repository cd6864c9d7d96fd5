//! Interrupt-safe critical sections and a mutex built on them.
//!
//! Both the VSYNC/EOF interrupt handlers and the drawing task touch the same
//! panel state, so every shared field sits behind a [`Mutex`] whose lock
//! masks interrupts for as long as its guard is alive. Critical sections are
//! taken through the [`critical_section`] crate, which the target (or the
//! host, in tests) provides an implementation for.

use core::cell::{RefCell, RefMut};
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};

/// A critical section allows the user to disable interrupts
pub struct CriticalSection(PhantomData<*const ()>);

impl CriticalSection {
    /// Constructs a new `CriticalSection` instance
    #[inline(always)]
    pub const fn new() -> Self {
        Self(PhantomData)
    }

    /// Disables interrupts for the lifetime of the returned guard instance.
    /// This method supports nesting in that is safe to be called multiple times.
    /// This method is also safe to call from ISR routines.
    #[inline(always)]
    #[cfg_attr(target_os = "espidf", link_section = ".iram1.interrupt_cs_enter")]
    pub fn enter(&self) -> CriticalSectionGuard<'_> {
        let state = unsafe { critical_section::acquire() };

        CriticalSectionGuard {
            _cs: PhantomData,
            state,
        }
    }
}

impl Default for CriticalSection {
    #[inline(always)]
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl Send for CriticalSection {}
unsafe impl Sync for CriticalSection {}

pub struct CriticalSectionGuard<'a> {
    _cs: PhantomData<&'a CriticalSection>,
    state: critical_section::RestoreState,
}

impl<'a> Drop for CriticalSectionGuard<'a> {
    /// Drops the critical section guard thus potentially re-enabling
    /// interrupts for the currently active core.
    ///
    /// Interrupts are re-enabled only when the outermost guard is dropped.
    #[inline(always)]
    #[cfg_attr(target_os = "espidf", link_section = ".iram1.interrupt_csg_drop")]
    fn drop(&mut self) {
        unsafe { critical_section::release(self.state) };
    }
}

/// Executes closure f in an interrupt-free context
#[inline(always)]
pub fn free<R>(f: impl FnOnce() -> R) -> R {
    let cs = CriticalSection::new();
    let _guard = cs.enter();

    f()
}

/// A mutex based on critical sections
///
/// The lock is not reentrant: locking the same mutex twice from one context
/// panics on the inner `RefCell`.
pub struct Mutex<T> {
    cs: CriticalSection,
    data: RefCell<T>,
}

impl<T> Mutex<T> {
    #[inline(always)]
    pub const fn new(data: T) -> Self {
        Self {
            cs: CriticalSection::new(),
            data: RefCell::new(data),
        }
    }

    #[inline(always)]
    #[cfg_attr(target_os = "espidf", link_section = ".iram1.interrupt_mutex_lock")]
    pub fn lock(&self) -> MutexGuard<'_, T> {
        MutexGuard::new(self)
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

unsafe impl<T> Sync for Mutex<T> where T: Send {}
unsafe impl<T> Send for Mutex<T> where T: Send {}

pub struct MutexGuard<'a, T: 'a>(RefMut<'a, T>, CriticalSectionGuard<'a>);

impl<'a, T> MutexGuard<'a, T> {
    #[inline(always)]
    fn new(mutex: &'a Mutex<T>) -> Self {
        let guard = mutex.cs.enter();

        Self(mutex.data.borrow_mut(), guard)
    }
}

unsafe impl<T> Sync for MutexGuard<'_, T> where T: Sync {}

impl<'a, T> Deref for MutexGuard<'a, T> {
    type Target = T;

    #[inline(always)]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'a, T> DerefMut for MutexGuard<'a, T> {
    #[inline(always)]
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}
