//! Hardware seams of the panel driver.
//!
//! The driver never touches registers itself. Everything it needs from the
//! LCD_CAM peripheral, the GDMA TX channel and the surrounding platform is
//! reached through the three traits below, selected once when the panel is
//! created. A chip revision with a different register layout only needs a
//! different [`LcdLowLevel`] implementation.

use core::alloc::Layout;

use enumset::{EnumSet, EnumSetType};

use crate::clock::{ClockDivider, ClockSource, TimingRegisters};
use crate::dma::DmaDescriptor;
use crate::errors::Result;
use crate::memory::MemCaps;
use crate::units::Hertz;

/// LCD_CAM interrupt events
#[derive(Debug, EnumSetType)]
#[enumset(repr = "u32")]
pub enum LcdEvent {
    /// End of the vertical sync period, raised once per frame
    Vsync = 0,
}

pub type LcdEvents = EnumSet<LcdEvent>;

/// Control signals of an RGB interface, routed through the GPIO matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    Pclk,
    Hsync,
    Vsync,
    De,
    /// Plain GPIO output used to switch the display on and off
    Disp,
}

/// Register-level access to one LCD_CAM RGB panel instance.
pub trait LcdLowLevel: Send {
    /// Gates the peripheral clock.
    fn enable_clock(&mut self, enable: bool);

    /// Selects the group clock source.
    fn set_clock_source(&mut self, source: ClockSource);

    /// Programs the fractional group divider and the pixel clock prescaler.
    fn set_clock_divider(&mut self, divider: &ClockDivider);

    fn set_clock_polarity(&mut self, idle_high: bool, active_neg_edge: bool);

    /// Switches the peripheral into RGB mode and programs data width, idle
    /// levels and the horizontal/vertical timing generator.
    fn set_timing(&mut self, timing: &TimingRegisters);

    /// Makes the timing generator start the next frame without software help.
    fn enable_auto_next_frame(&mut self, enable: bool);

    fn set_interrupt_mask(&mut self, events: LcdEvents);

    fn get_status(&self) -> LcdEvents;

    fn clear_status(&mut self, events: LcdEvents);

    /// Starts the timing generator.
    fn start(&mut self);

    fn stop(&mut self);

    fn reset_fifo(&mut self);

    fn reset(&mut self);

    /// Routes data line `line` to `gpio`, optionally inverting the signal.
    fn connect_data_line(&mut self, line: usize, gpio: u8, invert: bool);

    fn connect_control_signal(&mut self, signal: ControlSignal, gpio: u8);

    fn set_gpio_level(&mut self, gpio: u8, high: bool);
}

/// The GDMA TX channel connected to the LCD peripheral.
pub trait GdmaTxChannel: Send {
    /// Resets the channel, dropping whatever is left in its FIFO.
    fn reset(&mut self);

    /// Starts fetching descriptors from `head`.
    ///
    /// The pointer stays valid for as long as the panel that issued it.
    fn start(&mut self, head: *const DmaDescriptor);

    /// Enables or disables the end-of-frame interrupt of the channel.
    fn enable_eof_interrupt(&mut self, enable: bool);
}

/// Platform services used by the driver.
///
/// Only timekeeping is mandatory. The defaults describe a target without data
/// cache, without power management, with a single heap and with a 40 MHz
/// crystal.
pub trait Platform: Send + Sync {
    /// Monotonic time in microseconds.
    fn now_us(&self) -> u64;

    /// Busy-waits for `us` microseconds, like `Ets::delay_us`.
    fn delay_us(&self, us: u32);

    /// Blocks the calling task for at least `us` microseconds, letting other
    /// tasks run, like `FreeRtos::delay_us`.
    ///
    /// Targets without a scheduler fall back to busy-waiting.
    fn sleep_us(&self, us: u32) {
        self.delay_us(us);
    }

    /// Allocates zeroed memory for `layout` from a heap providing `caps`,
    /// the way `heap_caps_calloc` does. Returns null when no such memory is
    /// left.
    ///
    /// # Safety
    ///
    /// `layout` must have a non-zero size.
    unsafe fn alloc_zeroed(layout: Layout, caps: MemCaps) -> *mut u8
    where
        Self: Sized,
    {
        let _ = caps;

        #[cfg(feature = "alloc")]
        let ptr = alloc::alloc::alloc_zeroed(layout);

        #[cfg(not(feature = "alloc"))]
        let ptr = {
            let _ = layout;
            core::ptr::null_mut()
        };

        ptr
    }

    /// Returns memory obtained from [`Self::alloc_zeroed`].
    ///
    /// # Safety
    ///
    /// `ptr` must come from `alloc_zeroed` called with the same `layout` and
    /// `caps`, and must not be used afterwards.
    unsafe fn free(ptr: *mut u8, layout: Layout, caps: MemCaps)
    where
        Self: Sized,
    {
        let _ = caps;

        #[cfg(feature = "alloc")]
        alloc::alloc::dealloc(ptr, layout);

        #[cfg(not(feature = "alloc"))]
        let _ = (ptr, layout);
    }

    fn xtal_frequency(&self) -> Hertz {
        Hertz(40_000_000)
    }

    /// Writes dirty data cache lines covering the range back to memory.
    fn cache_writeback(&self, _addr: *const u8, _len: usize) {}

    /// Drops cached lines covering the range.
    fn cache_invalidate(&self, _addr: *const u8, _len: usize) {}

    /// Starts prefetching the range into the data cache.
    fn cache_preload(&self, _addr: *const u8, _len: usize) {}

    /// Pins the APB clock at its maximum frequency.
    fn acquire_pm_lock(&self) -> Result<()> {
        Ok(())
    }

    fn release_pm_lock(&self) {}

    /// Requests a context switch when the current interrupt returns.
    fn yield_from_isr(&self) {}
}

#[cfg(feature = "std")]
pub use self::std_platform::StdPlatform;

#[cfg(feature = "std")]
mod std_platform {
    use std::time::{Duration, Instant};

    use super::Platform;

    /// A [`Platform`] backed by the standard library clock.
    pub struct StdPlatform {
        epoch: Instant,
    }

    impl StdPlatform {
        pub fn new() -> Self {
            Self {
                epoch: Instant::now(),
            }
        }
    }

    impl Default for StdPlatform {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Platform for StdPlatform {
        fn now_us(&self) -> u64 {
            self.epoch.elapsed().as_micros() as u64
        }

        fn delay_us(&self, us: u32) {
            let until = Instant::now() + Duration::from_micros(us as u64);

            while Instant::now() < until {
                core::hint::spin_loop();
            }
        }

        fn sleep_us(&self, us: u32) {
            std::thread::sleep(Duration::from_micros(us as u64));
        }
    }
}
