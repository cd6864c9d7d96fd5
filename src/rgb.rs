//! RGB parallel LCD panel driver.
//!
//! Streams one or two frame buffers to a parallel RGB panel through the
//! LCD_CAM peripheral and a GDMA channel. Frame buffers may live in PSRAM, in
//! which case a pair of small internal bounce buffers can be refilled by the
//! CPU from the DMA EOF interrupt so the DMA never reads PSRAM directly.
//!
//! With `avoid_te` enabled, [`RgbPanel::draw_bitmap`] returns only once the
//! drawn buffer is safe to reuse: at the next VSYNC in frame buffer mode, or
//! when the bounce cursor wraps to the next frame in bounce buffer mode.
//!
//! The driver does not install interrupt handlers itself. The application
//! routes the LCD interrupt to [`RgbPanel::handle_lcd_interrupt`] and, in bounce
//! buffer mode, the GDMA TX EOF interrupt to [`RgbPanel::handle_dma_eof`].
//!
//! # Example
//!
//! ```no_run
//! use esp_rgb_lcd::errors::Result;
//! use esp_rgb_lcd::hal::{GdmaTxChannel, LcdLowLevel, StdPlatform};
//! use esp_rgb_lcd::prelude::*;
//!
//! fn show<L: LcdLowLevel, D: GdmaTxChannel>(lcd: L, dma: D) -> Result<()> {
//!     let timings = RgbTimings::new(16.MHz(), 480, 480)
//!         .hsync(10, 40, 20)
//!         .vsync(10, 10, 10);
//!
//!     let pins = RgbPins::new()
//!         .pclk(21)
//!         .hsync(39)
//!         .vsync(48)
//!         .de(18)
//!         .data(&[4, 5, 6, 7, 15, 8, 20, 3, 46, 9, 10, 11, 12, 13, 14, 0]);
//!
//!     let config = RgbPanelConfig::new(timings)
//!         .pins(pins)
//!         .double_fb(true)
//!         .fb_in_psram(true)
//!         .avoid_te(true);
//!
//!     let panel = RgbPanel::new(&config, lcd, dma, StdPlatform::new())?;
//!     panel.init()?;
//!
//!     if let Some(mut fb) = panel.idle_frame_buffer() {
//!         unsafe { fb.as_mut_slice() }.fill(0xff);
//!         panel.draw_bitmap(0, 0, 480, 480, unsafe { fb.as_slice() })?;
//!     }
//!
//!     Ok(())
//! }
//! ```

use core::ptr::{self, NonNull};
use core::sync::atomic::{AtomicBool, AtomicI32, AtomicU8, Ordering};

use alloc::boxed::Box;

use enumset::EnumSet;
use log::{debug, trace, warn};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::clock::{ClockDivider, ClockSource, SyncTiming, TimingRegisters};
use crate::dma::{DescriptorRings, Topology};
use crate::errors::{Error, Result};
use crate::hal::{ControlSignal, GdmaTxChannel, LcdEvent, LcdLowLevel, Platform};
use crate::interrupt::Mutex;
use crate::memory::{DmaBuffer, Placement};
use crate::notification::Notification;
use crate::units::Hertz;

pub use self::config::*;

pub mod config;
mod isr;

/// How long a draw waits for a handshake before logging and waiting again
const HANDSHAKE_TIMEOUT_US: u64 = 100_000;

/// A flush handshake that arrives sooner than this after the descriptors
/// were relinked may belong to the frame that was already in flight
const FLUSH_GRACE_US: u64 = 1_000;

/// Transmission state of a panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum TransmissionState {
    /// DMA and timing generator stopped
    Idle = 0,
    /// Bounce buffers being pre-filled
    Priming = 1,
    Running = 2,
    /// The panel is being torn down
    Stopped = 3,
}

/// Event handlers of a panel, called from interrupt context.
///
/// Both methods must not block. The return value tells whether a
/// higher-priority task was woken and a context switch should be requested
/// when the interrupt returns.
pub trait RgbPanelEventHandler {
    /// Called at the end of every frame.
    fn on_vsync(&mut self) -> bool {
        false
    }

    /// Called in bounce buffer mode without frame buffer, to produce the `len`
    /// bytes of pixel data starting at pixel `pos_px` of the frame.
    fn on_bounce_empty(&mut self, _buffer: &mut [u8], _pos_px: usize, _len: usize) -> bool {
        false
    }
}

/// A frame buffer owned by a panel
pub struct FrameBuffer<'a> {
    buffer: &'a DmaBuffer,
    index: usize,
}

impl<'a> FrameBuffer<'a> {
    /// Position of this buffer in [`RgbPanel::frame_buffers`]
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.buffer.as_ptr()
    }

    pub fn as_mut_ptr(&self) -> *mut u8 {
        self.buffer.as_mut_ptr()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// # Safety
    ///
    /// The DMA, the bounce refill interrupt and `draw_bitmap` copies may touch
    /// the buffer concurrently. The caller must make sure none of them writes
    /// to it while the slice is alive.
    pub unsafe fn as_slice(&self) -> &[u8] {
        core::slice::from_raw_parts(self.buffer.as_ptr(), self.buffer.len())
    }

    /// # Safety
    ///
    /// The buffer must not be the one being transmitted, and no other slice
    /// of it may be alive.
    pub unsafe fn as_mut_slice(&mut self) -> &mut [u8] {
        core::slice::from_raw_parts_mut(self.buffer.as_mut_ptr(), self.buffer.len())
    }
}

struct BounceBuffers {
    buffers: [DmaBuffer; 2],
    /// Pixel of the frame the next refill starts at
    pos_px: Mutex<usize>,
}

struct ClockState {
    source_hz: Hertz,
    /// Requested pixel clock
    target: Hertz,
    /// Pixel clock the divider actually produces
    actual: Hertz,
    pending: bool,
}

struct Hardware<L, D> {
    lcd: L,
    dma: D,
}

/// Behavioral flags resolved at creation
#[derive(Debug, Clone, Copy)]
struct Mode {
    stream: bool,
    fb_in_psram: bool,
    bb_invalidate_cache: bool,
    avoid_te: bool,
    restart_in_vsync: bool,
    disp_active_low: bool,
}

/// What a draw has to wait for before returning
enum Handshake {
    None,
    Swap,
    Flush { since_us: u64 },
}

/// RGB panel driver
///
/// Resources are released in field order after [`Drop`] has stopped the
/// hardware: buffers and descriptors first, then the LCD and DMA handles.
pub struct RgbPanel<L, D, P>
where
    L: LcdLowLevel,
    D: GdmaTxChannel,
    P: Platform,
{
    fbs: heapless::Vec<DmaBuffer, 2>,
    bounce: Option<BounceBuffers>,
    rings: DescriptorRings,
    layout: PanelLayout,
    timings: RgbTimings,
    data_width: u32,
    pins: RgbPins,
    mode: Mode,
    clock_source: ClockSource,
    cur_fb: AtomicU8,
    hoped_fb: AtomicU8,
    x_gap: AtomicI32,
    y_gap: AtomicI32,
    clock: Mutex<ClockState>,
    handler: Mutex<Option<Box<dyn RgbPanelEventHandler + Send>>>,
    flush_ready: Notification,
    swap_ready: Notification,
    state: AtomicU8,
    restart_requested: AtomicBool,
    pm_locked: bool,
    platform: P,
    hw: Mutex<Hardware<L, D>>,
}

impl<L, D, P> RgbPanel<L, D, P>
where
    L: LcdLowLevel,
    D: GdmaTxChannel,
    P: Platform,
{
    /// Creates a panel: validates the configuration, allocates the frame,
    /// bounce and descriptor buffers, selects the clock source and routes the
    /// signals. Nothing is transmitted until [`Self::init`].
    ///
    /// On error, everything acquired so far is released again.
    pub fn new(config: &RgbPanelConfig, lcd: L, dma: D, platform: P) -> Result<Self> {
        let layout = config.layout()?;
        let flags = &config.flags;

        let fb_placement = if flags.fb_in_psram {
            Placement::Psram
        } else {
            Placement::Internal
        };
        let fb_align = match fb_placement {
            Placement::Psram => layout.psram_align,
            Placement::Internal => layout.sram_align,
        };

        let mut fbs = heapless::Vec::new();
        for _ in 0..layout.num_fbs {
            let fb = DmaBuffer::new::<P>(layout.fb_size, fb_align, fb_placement)?;
            fbs.push(fb).map_err(|_| Error::InvalidState)?;
        }

        let bounce = if layout.bb_size != 0 {
            Some(BounceBuffers {
                buffers: [
                    DmaBuffer::new::<P>(layout.bb_size, layout.sram_align, Placement::Internal)?,
                    DmaBuffer::new::<P>(layout.bb_size, layout.sram_align, Placement::Internal)?,
                ],
                pos_px: Mutex::new(0),
            })
        } else {
            None
        };

        let rings = DescriptorRings::new::<P>(layout.nodes_per_ring)?;
        let stream = !flags.refresh_on_demand;

        if let Some(bounce) = &bounce {
            rings.link(Topology::Bounce);

            for (ring, buffer) in bounce.buffers.iter().enumerate() {
                unsafe { rings.mount(ring, buffer.as_mut_ptr(), buffer.len())? };
            }
        } else {
            rings.link(if stream {
                Topology::Circular
            } else {
                Topology::OneShot
            });

            for (ring, fb) in fbs.iter().enumerate() {
                unsafe { rings.mount(ring, fb.as_mut_ptr(), fb.len())? };
            }
        }

        let mut panel = Self {
            fbs,
            bounce,
            rings,
            layout,
            timings: config.timings,
            data_width: config.data_width,
            pins: config.pins.clone(),
            mode: Mode {
                stream,
                fb_in_psram: flags.fb_in_psram && !flags.no_fb,
                bb_invalidate_cache: flags.bb_invalidate_cache,
                avoid_te: flags.avoid_te,
                restart_in_vsync: flags.restart_in_vsync,
                disp_active_low: flags.disp_active_low,
            },
            clock_source: config.clock_source,
            cur_fb: AtomicU8::new(0),
            hoped_fb: AtomicU8::new(0),
            x_gap: AtomicI32::new(0),
            y_gap: AtomicI32::new(0),
            clock: Mutex::new(ClockState {
                source_hz: config.clock_source.frequency(platform.xtal_frequency()),
                target: config.timings.pclk,
                actual: config.timings.pclk,
                pending: false,
            }),
            handler: Mutex::new(None),
            flush_ready: Notification::new(),
            swap_ready: Notification::new(),
            state: AtomicU8::new(TransmissionState::Idle.into()),
            restart_requested: AtomicBool::new(false),
            pm_locked: false,
            platform,
            hw: Mutex::new(Hardware { lcd, dma }),
        };

        panel.setup()?;

        debug!(
            "new rgb panel, fb0 @{:?}, fb1 @{:?}, fb_size={}, bb0 @{:?}, bb1 @{:?}, bb_size={}",
            panel.fbs.first().map(DmaBuffer::as_ptr),
            panel.fbs.get(1).map(DmaBuffer::as_ptr),
            panel.layout.fb_size,
            panel.bounce.as_ref().map(|b| b.buffers[0].as_ptr()),
            panel.bounce.as_ref().map(|b| b.buffers[1].as_ptr()),
            panel.layout.bb_size,
        );

        Ok(panel)
    }

    fn setup(&mut self) -> Result<()> {
        {
            let mut hw = self.hw.lock();

            hw.lcd.enable_clock(true);
            hw.lcd.set_clock_source(self.clock_source);
        }

        if self.clock_source.needs_pm_lock() {
            self.platform.acquire_pm_lock()?;
            self.pm_locked = true;

            debug!("holding the APB frequency lock for the panel lifetime");
        }

        let mut hw = self.hw.lock();

        hw.lcd.set_interrupt_mask(EnumSet::empty());
        hw.lcd.clear_status(EnumSet::all());

        hw.dma.enable_eof_interrupt(self.bounce.is_some());

        for (line, gpio) in self.pins.data.iter().enumerate() {
            hw.lcd.connect_data_line(line, *gpio, false);
        }

        let signals = [
            (ControlSignal::Hsync, self.pins.hsync),
            (ControlSignal::Vsync, self.pins.vsync),
            (ControlSignal::Pclk, self.pins.pclk),
            (ControlSignal::De, self.pins.de),
            (ControlSignal::Disp, self.pins.disp),
        ];

        for (signal, gpio) in signals {
            if let Some(gpio) = gpio {
                hw.lcd.connect_control_signal(signal, gpio);
            }
        }

        Ok(())
    }

    /// Resets the LCD peripheral and its FIFO.
    pub fn reset(&self) -> Result<()> {
        let mut hw = self.hw.lock();

        hw.lcd.reset_fifo();
        hw.lcd.reset();

        Ok(())
    }

    /// Programs the pixel clock and the timing generator, unmasks the VSYNC
    /// interrupt and, in stream mode, starts transmitting.
    pub fn init(&self) -> Result<()> {
        let (divider, pclk) = {
            let mut clock = self.clock.lock();

            let (divider, pclk) = ClockDivider::calculate(clock.source_hz, clock.target)?;
            clock.actual = pclk;
            clock.pending = false;

            (divider, pclk)
        };

        let timings = &self.timings;
        let flags = &timings.flags;

        let horizontal = SyncTiming {
            pulse_width: timings.hsync_pulse_width,
            back_porch: timings.hsync_back_porch,
            active: self.layout.h_active_cycles,
            front_porch: timings.hsync_front_porch,
        };
        let vertical = SyncTiming {
            pulse_width: timings.vsync_pulse_width,
            back_porch: timings.vsync_back_porch,
            active: timings.v_res,
            front_porch: timings.vsync_front_porch,
        };
        let registers = TimingRegisters::new(self.data_width, horizontal, vertical).idle_levels(
            !flags.hsync_idle_low,
            !flags.vsync_idle_low,
            flags.de_idle_high,
        );

        {
            let mut hw = self.hw.lock();

            hw.lcd.set_clock_divider(&divider);
            hw.lcd.set_clock_polarity(flags.pclk_idle_high, flags.pclk_active_neg);
            hw.lcd.set_timing(&registers);
            hw.lcd.enable_auto_next_frame(self.mode.stream);
            hw.lcd.set_interrupt_mask(LcdEvent::Vsync.into());
        }

        if self.mode.stream {
            self.start_transmission();
        }

        debug!("rgb panel start, pclk={}", pclk);

        Ok(())
    }

    /// Transmits one frame. Only valid with `refresh_on_demand`.
    pub fn refresh(&self) -> Result<()> {
        if self.mode.stream {
            return Err(Error::InvalidState);
        }

        self.start_transmission();

        Ok(())
    }

    /// Requests a DMA restart at the next VSYNC. Only valid in stream mode.
    pub fn restart(&self) -> Result<()> {
        if !self.mode.stream {
            return Err(Error::InvalidState);
        }

        self.restart_requested.store(true, Ordering::SeqCst);

        Ok(())
    }

    fn start_transmission(&self) {
        self.set_state(TransmissionState::Priming);

        let mut hw = self.hw.lock();

        hw.dma.reset();
        hw.lcd.stop();
        hw.lcd.reset_fifo();

        let ring = match &self.bounce {
            Some(bounce) => {
                *bounce.pos_px.lock() = 0;

                self.fill_bounce_buffer(0);
                self.fill_bounce_buffer(1);

                0
            }
            None => self.current_frame_buffer_index(),
        };

        // the DMA has to be running before the LCD asks for pixels
        hw.dma.start(self.rings.head(ring));
        self.platform.delay_us(1);
        hw.lcd.start();

        self.set_state(TransmissionState::Running);
    }

    /// Draws `data` into the window `[x_start, x_end) × [y_start, y_end)`.
    ///
    /// When `data` is one of the panel's own frame buffers nothing is copied:
    /// the buffer becomes the one transmitted, at the next frame boundary in
    /// bounce buffer mode. Otherwise the window, shifted by the gap and
    /// clipped to the panel, is copied row by row into the current frame
    /// buffer, `data` holding the clipped rows back to back.
    ///
    /// With `avoid_te`, returns only after the next VSYNC (frame buffer mode)
    /// or the next frame wrap (bounce buffer mode).
    pub fn draw_bitmap(
        &self,
        x_start: i32,
        y_start: i32,
        x_end: i32,
        y_end: i32,
        data: &[u8],
    ) -> Result<()> {
        match self.draw(x_start, y_start, x_end, y_end, data)? {
            Handshake::None => (),
            Handshake::Swap => self.wait_blocking(&self.swap_ready, "swap"),
            Handshake::Flush { since_us } => {
                self.wait_blocking(&self.flush_ready, "flush");

                if self.platform.now_us().wrapping_sub(since_us) < FLUSH_GRACE_US {
                    self.wait_blocking(&self.flush_ready, "flush");
                }
            }
        }

        Ok(())
    }

    /// Same as [`Self::draw_bitmap`], awaiting the handshake instead of
    /// polling for it.
    pub async fn draw_bitmap_async(
        &self,
        x_start: i32,
        y_start: i32,
        x_end: i32,
        y_end: i32,
        data: &[u8],
    ) -> Result<()> {
        match self.draw(x_start, y_start, x_end, y_end, data)? {
            Handshake::None => (),
            Handshake::Swap => self.swap_ready.wait().await,
            Handshake::Flush { since_us } => {
                self.flush_ready.wait().await;

                if self.platform.now_us().wrapping_sub(since_us) < FLUSH_GRACE_US {
                    self.flush_ready.wait().await;
                }
            }
        }

        Ok(())
    }

    fn draw(
        &self,
        x_start: i32,
        y_start: i32,
        x_end: i32,
        y_end: i32,
        data: &[u8],
    ) -> Result<Handshake> {
        if self.fbs.is_empty() {
            return Err(Error::NotSupported);
        }

        if x_start >= x_end || y_start >= y_end {
            return Err(Error::InvalidArg);
        }

        let own = self.fbs.iter().position(|fb| fb.contains(data.as_ptr()));

        if self.bounce.is_some() {
            if let Some(index) = own {
                self.hoped_fb.store(index as u8, Ordering::SeqCst);

                if self.mode.avoid_te {
                    self.swap_ready.clear();
                    return Ok(Handshake::Swap);
                }

                return Ok(Handshake::None);
            }

            // A foreign buffer in bounce mode is copied into the frame buffer
            // the bounce refill is reading from.
        }

        let x_gap = self.x_gap.load(Ordering::Relaxed);
        let y_gap = self.y_gap.load(Ordering::Relaxed);

        let h_res = self.timings.h_res as i64;
        let v_res = self.timings.v_res as i64;

        let clip = |v: i32, gap: i32, res: i64| (v as i64 + gap as i64).clamp(0, res) as usize;

        let x0 = clip(x_start, x_gap, h_res);
        let x1 = clip(x_end, x_gap, h_res);
        let y0 = clip(y_start, y_gap, v_res);
        let y1 = clip(y_end, y_gap, v_res);

        let bytes_per_pixel = self.layout.bytes_per_pixel;
        let bytes_per_line = self.timings.h_res as usize * bytes_per_pixel;

        let cur = match own {
            Some(index) => {
                self.cur_fb.store(index as u8, Ordering::SeqCst);
                index
            }
            None => {
                let cur = self.cur_fb.load(Ordering::SeqCst) as usize;
                let fb = &self.fbs[cur];

                let copy_bytes_per_line = (x1 - x0) * bytes_per_pixel;
                let rows = y1 - y0;

                // rows are copied in place, so the source must not alias the target
                if data.len() < copy_bytes_per_line * rows
                    || fb.overlaps(data.as_ptr(), data.len())
                {
                    return Err(Error::InvalidArg);
                }

                if copy_bytes_per_line != 0 {
                    for (row, from) in data.chunks_exact(copy_bytes_per_line).take(rows).enumerate()
                    {
                        let offset = ((y0 + row) * self.timings.h_res as usize + x0) * bytes_per_pixel;

                        unsafe {
                            ptr::copy_nonoverlapping(
                                from.as_ptr(),
                                fb.as_mut_ptr().add(offset),
                                copy_bytes_per_line,
                            );
                        }
                    }
                }

                cur
            }
        };

        if self.mode.fb_in_psram && self.bounce.is_none() && y1 > y0 {
            let fb = &self.fbs[cur];

            self.platform.cache_writeback(
                unsafe { fb.as_ptr().add(y0 * bytes_per_line) },
                (y1 - y0) * bytes_per_line,
            );
        }

        if self.bounce.is_none() && self.mode.stream {
            let since_us = self.platform.now_us();

            self.rings.relink_tails(cur);

            if self.mode.avoid_te {
                self.flush_ready.clear();
                return Ok(Handshake::Flush { since_us });
            }
        }

        Ok(Handshake::None)
    }

    fn wait_blocking(&self, notification: &Notification, what: &str) {
        while !notification.wait_blocking(&self.platform, HANDSHAKE_TIMEOUT_US) {
            warn!(
                "no {} handshake within {}ms, waiting again",
                what,
                HANDSHAKE_TIMEOUT_US / 1000
            );
        }
    }

    /// Handles to the frame buffers, one or two of them.
    pub fn frame_buffers(&self) -> heapless::Vec<FrameBuffer<'_>, 2> {
        self.fbs
            .iter()
            .enumerate()
            .map(|(index, buffer)| FrameBuffer { buffer, index })
            .collect()
    }

    /// The frame buffer not being transmitted, the one safe to draw into.
    pub fn idle_frame_buffer(&self) -> Option<FrameBuffer<'_>> {
        let index = 1 - self.current_frame_buffer_index();

        self.frame_buffer(index)
    }

    /// The frame buffer being transmitted.
    pub fn running_frame_buffer(&self) -> Option<FrameBuffer<'_>> {
        self.frame_buffer(self.current_frame_buffer_index())
    }

    fn frame_buffer(&self, index: usize) -> Option<FrameBuffer<'_>> {
        self.fbs
            .get(index)
            .map(|buffer| FrameBuffer { buffer, index })
    }

    pub fn current_frame_buffer_index(&self) -> usize {
        self.cur_fb.load(Ordering::SeqCst) as usize
    }

    /// Pixel the next bounce buffer refill starts at, zero without bounce buffers.
    pub fn bounce_position_px(&self) -> usize {
        self.bounce.as_ref().map_or(0, |b| *b.pos_px.lock())
    }

    pub fn state(&self) -> TransmissionState {
        TransmissionState::try_from(self.state.load(Ordering::SeqCst))
            .unwrap_or(TransmissionState::Idle)
    }

    fn set_state(&self, state: TransmissionState) {
        self.state.store(state.into(), Ordering::SeqCst);
    }

    pub fn layout(&self) -> &PanelLayout {
        &self.layout
    }

    /// Requests a new pixel clock. It is applied at the next VSYNC.
    pub fn set_pixel_clock(&self, pclk: impl Into<Hertz>) -> Result<()> {
        let pclk = pclk.into();
        if pclk.0 == 0 {
            return Err(Error::InvalidArg);
        }

        {
            let mut clock = self.clock.lock();
            clock.target = pclk;
            clock.pending = true;
        }

        trace!("pclk change to {} requested", pclk);

        Ok(())
    }

    /// The pixel clock currently produced by the divider.
    pub fn pixel_clock(&self) -> Hertz {
        self.clock.lock().actual
    }

    /// Offsets applied to the window of the next draws.
    pub fn set_gap(&self, x_gap: i32, y_gap: i32) -> Result<()> {
        self.x_gap.store(x_gap, Ordering::Relaxed);
        self.y_gap.store(y_gap, Ordering::Relaxed);

        Ok(())
    }

    /// Inverts the data lines in the GPIO matrix.
    pub fn invert_color(&self, invert: bool) -> Result<()> {
        let mut hw = self.hw.lock();

        for (line, gpio) in self.pins.data.iter().enumerate() {
            hw.lcd.connect_data_line(line, *gpio, invert);
        }

        Ok(())
    }

    pub fn mirror(&self, _mirror_x: bool, _mirror_y: bool) -> Result<()> {
        Err(Error::NotSupported)
    }

    pub fn swap_xy(&self, _swap: bool) -> Result<()> {
        Err(Error::NotSupported)
    }

    /// Drives the DISP GPIO, if one is configured.
    pub fn set_display_on(&self, on: bool) -> Result<()> {
        let gpio = self.pins.disp.ok_or(Error::NotSupported)?;

        let level = on != self.mode.disp_active_low;
        self.hw.lock().lcd.set_gpio_level(gpio, level);

        Ok(())
    }

    /// Installs the interrupt-context event handler, replacing any previous one.
    pub fn register_event_handler<H>(&self, handler: H)
    where
        H: RgbPanelEventHandler + Send + 'static,
    {
        *self.handler.lock() = Some(Box::new(handler));
    }

    pub fn unregister_event_handler(&self) {
        *self.handler.lock() = None;
    }

    fn frame_buffer_ptr(&self, index: usize, offset_px: usize) -> Option<NonNull<u8>> {
        self.fbs.get(index).and_then(|fb| {
            NonNull::new(unsafe { fb.as_mut_ptr().add(offset_px * self.layout.bytes_per_pixel) })
        })
    }
}

impl<L, D, P> Drop for RgbPanel<L, D, P>
where
    L: LcdLowLevel,
    D: GdmaTxChannel,
    P: Platform,
{
    fn drop(&mut self) {
        self.set_state(TransmissionState::Stopped);

        {
            let mut hw = self.hw.lock();

            hw.lcd.stop();
            hw.dma.reset();
            hw.dma.enable_eof_interrupt(false);
            hw.lcd.set_interrupt_mask(EnumSet::empty());
            hw.lcd.clear_status(EnumSet::all());
            hw.lcd.enable_clock(false);
        }

        if self.pm_locked {
            self.platform.release_pm_lock();
        }

        debug!("del rgb panel");
    }
}

unsafe impl<L, D, P> Send for RgbPanel<L, D, P>
where
    L: LcdLowLevel,
    D: GdmaTxChannel,
    P: Platform,
{
}

unsafe impl<L, D, P> Sync for RgbPanel<L, D, P>
where
    L: LcdLowLevel,
    D: GdmaTxChannel,
    P: Platform,
{
}
