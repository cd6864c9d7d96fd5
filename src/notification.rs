//! Binary, latest-only notification between an interrupt handler and a task.
//!
//! The interrupt side calls [`Notification::notify`]; the task side clears the
//! flag, kicks off whatever should eventually cause the notification, and then
//! waits. Repeated notifications before a wait collapse into one.

use core::future::Future;
use core::sync::atomic::{AtomicBool, Ordering};
use core::task::{Context, Poll};

use atomic_waker::AtomicWaker;

use crate::hal::Platform;

/// Poll interval of [`Notification::wait_blocking`]
const POLL_INTERVAL_US: u32 = 100;

pub struct Notification {
    waker: AtomicWaker,
    notified: AtomicBool,
}

impl Notification {
    pub const fn new() -> Self {
        Self {
            waker: AtomicWaker::new(),
            notified: AtomicBool::new(false),
        }
    }

    /// Raises the notification. Returns `true` if a waiting task was woken.
    #[cfg_attr(target_os = "espidf", link_section = ".iram1.notification_notify")]
    pub fn notify(&self) -> bool {
        self.notified.store(true, Ordering::SeqCst);

        if let Some(waker) = self.waker.take() {
            waker.wake();

            true
        } else {
            false
        }
    }

    pub fn clear(&self) {
        self.notified.store(false, Ordering::SeqCst);
    }

    /// Consumes a pending notification, if any.
    pub fn take(&self) -> bool {
        self.notified.swap(false, Ordering::SeqCst)
    }

    /// Waits for the notification for at most `timeout_us` microseconds,
    /// sleeping between polls so other tasks keep running.
    ///
    /// Returns `false` on timeout.
    pub fn wait_blocking<P>(&self, platform: &P, timeout_us: u64) -> bool
    where
        P: Platform + ?Sized,
    {
        let start = platform.now_us();

        loop {
            if self.take() {
                return true;
            }

            if platform.now_us().wrapping_sub(start) >= timeout_us {
                return false;
            }

            platform.sleep_us(POLL_INTERVAL_US);
        }
    }

    pub fn wait(&self) -> impl Future<Output = ()> + '_ {
        core::future::poll_fn(move |cx| self.poll_wait(cx))
    }

    pub fn poll_wait(&self, cx: &Context<'_>) -> Poll<()> {
        self.waker.register(cx.waker());

        if self.take() {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}

impl Default for Notification {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use core::sync::atomic::AtomicU64;
    use core::task::Waker;

    use std::sync::Arc;
    use std::task::Wake;

    use super::*;

    /// Time only moves while someone sleeps or spins on it
    #[derive(Default)]
    struct FakeClock {
        now: AtomicU64,
        spun: AtomicU64,
    }

    impl Platform for FakeClock {
        fn now_us(&self) -> u64 {
            self.now.load(Ordering::SeqCst)
        }

        fn delay_us(&self, us: u32) {
            self.spun.fetch_add(us as u64, Ordering::SeqCst);
            self.now.fetch_add(us as u64, Ordering::SeqCst);
        }

        fn sleep_us(&self, us: u32) {
            self.now.fetch_add(us as u64, Ordering::SeqCst);
        }
    }

    struct Flag(AtomicBool);

    impl Wake for Flag {
        fn wake(self: Arc<Self>) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn notifications_collapse() {
        let n = Notification::new();

        n.notify();
        n.notify();

        assert!(n.take());
        assert!(!n.take());
    }

    #[test]
    fn clear_drops_a_stale_notification() {
        let n = Notification::new();
        let clock = FakeClock::default();

        n.notify();
        n.clear();

        assert!(!n.wait_blocking(&clock, 1_000));
        assert!(clock.now_us() >= 1_000);
    }

    #[test]
    fn blocking_wait_sleeps_instead_of_spinning() {
        let n = Notification::new();
        let clock = FakeClock::default();

        assert!(!n.wait_blocking(&clock, 5_000));
        assert!(clock.now_us() >= 5_000);
        assert_eq!(clock.spun.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn blocking_wait_sees_pending_notification() {
        let n = Notification::new();
        let clock = FakeClock::default();

        n.notify();

        assert!(n.wait_blocking(&clock, 1_000));
        assert_eq!(clock.now_us(), 0);
    }

    #[test]
    fn poll_wait_registers_waker() {
        let n = Notification::new();
        let flag = Arc::new(Flag(AtomicBool::new(false)));
        let waker = Waker::from(flag.clone());
        let cx = Context::from_waker(&waker);

        assert!(n.poll_wait(&cx).is_pending());
        assert!(n.notify());
        assert!(flag.0.load(Ordering::SeqCst));
        assert!(n.poll_wait(&cx).is_ready());
    }
}
