//! Interrupt-context half of the panel driver.
//!
//! Nothing in here blocks, allocates or logs.

use core::ptr;
use core::sync::atomic::Ordering;

use crate::clock::ClockDivider;
use crate::dma::DmaDescriptor;
use crate::hal::{GdmaTxChannel, LcdEvent, LcdLowLevel, Platform};

use super::RgbPanel;

impl<L, D, P> RgbPanel<L, D, P>
where
    L: LcdLowLevel,
    D: GdmaTxChannel,
    P: Platform,
{
    /// Services the LCD interrupt.
    ///
    /// Must be called from the LCD_CAM interrupt handler. Returns `true` when
    /// a higher-priority task was woken, after asking the platform to yield.
    #[cfg_attr(target_os = "espidf", link_section = ".iram1.rgb_panel_lcd_isr")]
    pub fn handle_lcd_interrupt(&self) -> bool {
        let status = {
            let mut hw = self.hw.lock();

            let status = hw.lcd.get_status();
            hw.lcd.clear_status(status);

            status
        };

        let mut need_yield = false;

        if status.contains(LcdEvent::Vsync) {
            if let Some(handler) = self.handler.lock().as_mut() {
                need_yield |= handler.on_vsync();
            }

            if self.mode.avoid_te {
                need_yield |= self.flush_ready.notify();
            }

            self.try_update_pclk();

            let requested = self.restart_requested.swap(false, Ordering::SeqCst);

            if self.mode.stream && (self.mode.restart_in_vsync || requested) {
                self.restart_in_isr();
            }
        }

        if need_yield {
            self.platform.yield_from_isr();
        }

        need_yield
    }

    /// Services the GDMA TX EOF interrupt, `desc` being the descriptor the
    /// channel reported. Refills the bounce buffer that was just drained.
    ///
    /// Does nothing without bounce buffers.
    #[cfg_attr(target_os = "espidf", link_section = ".iram1.rgb_panel_dma_isr")]
    pub fn handle_dma_eof(&self, desc: *const DmaDescriptor) -> bool {
        if self.bounce.is_none() {
            return false;
        }

        let need_yield = self.fill_bounce_buffer(self.rings.ring_of_eof(desc));

        if need_yield {
            self.platform.yield_from_isr();
        }

        need_yield
    }

    fn try_update_pclk(&self) {
        let mut clock = self.clock.lock();

        if !clock.pending {
            return;
        }

        clock.pending = false;

        if let Ok((divider, pclk)) = ClockDivider::calculate(clock.source_hz, clock.target) {
            self.hw.lock().lcd.set_clock_divider(&divider);
            clock.actual = pclk;
        }
    }

    #[cfg_attr(target_os = "espidf", link_section = ".iram1.rgb_panel_fill_bounce")]
    pub(super) fn fill_bounce_buffer(&self, index: usize) -> bool {
        let Some(bounce) = &self.bounce else {
            return false;
        };

        let buffer = &bounce.buffers[index];
        let bb_size = self.layout.bb_size;

        let mut need_yield = false;
        let mut pos = bounce.pos_px.lock();

        match self.frame_buffer_ptr(self.current_frame_buffer_index(), *pos) {
            Some(from) => {
                unsafe { ptr::copy_nonoverlapping(from.as_ptr(), buffer.as_mut_ptr(), bb_size) };

                if self.mode.bb_invalidate_cache {
                    // drop the lines so the next frame's reads see fresh PSRAM data
                    self.platform.cache_writeback(from.as_ptr(), bb_size);
                    self.platform.cache_invalidate(from.as_ptr(), bb_size);
                }
            }
            None => {
                if let Some(handler) = self.handler.lock().as_mut() {
                    let to = unsafe { core::slice::from_raw_parts_mut(buffer.as_mut_ptr(), bb_size) };

                    need_yield |= handler.on_bounce_empty(to, *pos, bb_size);
                }
            }
        }

        *pos += self.layout.bounce_pixels();

        if *pos >= self.layout.frame_pixels() {
            *pos = 0;

            self.cur_fb
                .store(self.hoped_fb.load(Ordering::SeqCst), Ordering::SeqCst);

            need_yield |= self.swap_ready.notify();
        }

        if let Some(next) = self.frame_buffer_ptr(self.current_frame_buffer_index(), *pos) {
            self.platform.cache_preload(next.as_ptr(), bb_size);
        }

        need_yield
    }

    fn restart_in_isr(&self) {
        let bounce_px = self.layout.bounce_pixels();
        let bounce_pos = || self.bounce.as_ref().map(|b| *b.pos_px.lock());

        if let Some(bounce) = &self.bounce {
            let mut pos = bounce.pos_px.lock();

            if *pos > 2 * bounce_px {
                *pos = 0;
            }
        }

        if matches!(bounce_pos(), Some(pos) if pos < bounce_px) {
            self.fill_bounce_buffer(0);
        }

        let ring = if self.bounce.is_some() {
            0
        } else {
            self.current_frame_buffer_index()
        };

        {
            let mut hw = self.hw.lock();

            let start = self
                .rings
                .prepare_restart(ring)
                .unwrap_or_else(|| self.rings.head(ring).cast_const());

            hw.dma.reset();
            hw.dma.start(start);
        }

        if matches!(bounce_pos(), Some(pos) if pos < 2 * bounce_px) {
            self.fill_bounce_buffer(1);
        }
    }
}
