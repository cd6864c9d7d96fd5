//! RGB panel configuration.

use crate::clock::ClockSource;
use crate::dma::{DescriptorRings, DMA_DESCRIPTOR_BUFFER_MAX_SIZE, RESTART_SKIP_BYTES};
use crate::errors::{Error, Result};
use crate::memory::{PSRAM_TRANS_ALIGN, SRAM_TRANS_ALIGN};
use crate::units::Hertz;

/// Maximum number of data lines of the RGB interface
pub const RGB_DATA_WIDTH_MAX: usize = 16;

/// Polarity and phase of the sync and clock signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RgbTimingFlags {
    pub hsync_idle_low: bool,
    pub vsync_idle_low: bool,
    pub de_idle_high: bool,
    /// Data is clocked out on the falling edge of PCLK
    pub pclk_active_neg: bool,
    pub pclk_idle_high: bool,
}

/// Resolution, pixel clock and sync timing of the panel
///
/// Porch and pulse widths are in pixel clock cycles, respectively lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RgbTimings {
    pub pclk: Hertz,
    pub h_res: u32,
    pub v_res: u32,
    pub hsync_pulse_width: u32,
    pub hsync_back_porch: u32,
    pub hsync_front_porch: u32,
    pub vsync_pulse_width: u32,
    pub vsync_back_porch: u32,
    pub vsync_front_porch: u32,
    pub flags: RgbTimingFlags,
}

impl RgbTimings {
    pub fn new(pclk: impl Into<Hertz>, h_res: u32, v_res: u32) -> Self {
        Self {
            pclk: pclk.into(),
            h_res,
            v_res,
            hsync_pulse_width: 1,
            hsync_back_porch: 0,
            hsync_front_porch: 0,
            vsync_pulse_width: 1,
            vsync_back_porch: 0,
            vsync_front_porch: 0,
            flags: RgbTimingFlags::default(),
        }
    }

    #[must_use]
    pub fn hsync(mut self, pulse_width: u32, back_porch: u32, front_porch: u32) -> Self {
        self.hsync_pulse_width = pulse_width;
        self.hsync_back_porch = back_porch;
        self.hsync_front_porch = front_porch;
        self
    }

    #[must_use]
    pub fn vsync(mut self, pulse_width: u32, back_porch: u32, front_porch: u32) -> Self {
        self.vsync_pulse_width = pulse_width;
        self.vsync_back_porch = back_porch;
        self.vsync_front_porch = front_porch;
        self
    }

    #[must_use]
    pub fn flags(mut self, flags: RgbTimingFlags) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn pclk_active_neg(mut self, active_neg: bool) -> Self {
        self.flags.pclk_active_neg = active_neg;
        self
    }
}

/// GPIOs the panel signals are routed to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RgbPins {
    pub pclk: Option<u8>,
    pub hsync: Option<u8>,
    pub vsync: Option<u8>,
    /// Data enable. Without it the panel runs in HV mode and needs both sync lines.
    pub de: Option<u8>,
    /// Display on/off control, driven as a plain output
    pub disp: Option<u8>,
    pub data: heapless::Vec<u8, RGB_DATA_WIDTH_MAX>,
}

impl RgbPins {
    pub fn new() -> Self {
        Default::default()
    }

    #[must_use]
    pub fn pclk(mut self, gpio: u8) -> Self {
        self.pclk = Some(gpio);
        self
    }

    #[must_use]
    pub fn hsync(mut self, gpio: u8) -> Self {
        self.hsync = Some(gpio);
        self
    }

    #[must_use]
    pub fn vsync(mut self, gpio: u8) -> Self {
        self.vsync = Some(gpio);
        self
    }

    #[must_use]
    pub fn de(mut self, gpio: u8) -> Self {
        self.de = Some(gpio);
        self
    }

    #[must_use]
    pub fn disp(mut self, gpio: u8) -> Self {
        self.disp = Some(gpio);
        self
    }

    /// Data lines, D0 first. More than 16 lines leave the list empty, which
    /// the panel then rejects.
    #[must_use]
    pub fn data(mut self, gpios: &[u8]) -> Self {
        self.data = heapless::Vec::from_slice(gpios).unwrap_or_default();
        self
    }

    fn validate(&self, data_width: usize) -> Result<()> {
        let sync_ok = self.de.is_some() || (self.hsync.is_some() && self.vsync.is_some());

        if self.pclk.is_none() || !sync_ok || self.data.len() != data_width {
            return Err(Error::InvalidArg);
        }

        Ok(())
    }
}

/// Mode flags of the panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RgbPanelFlags {
    /// Two frame buffers, drawn into alternately
    pub double_fb: bool,
    /// No frame buffer at all, pixels come from the bounce-empty handler
    pub no_fb: bool,
    pub fb_in_psram: bool,
    /// Transmit only on [`refresh`](super::RgbPanel::refresh) instead of streaming
    pub refresh_on_demand: bool,
    /// Write back and invalidate the frame buffer cache after each bounce copy
    pub bb_invalidate_cache: bool,
    /// Make draws wait for the frame boundary
    pub avoid_te: bool,
    /// Reset and restart the DMA at every VSYNC
    pub restart_in_vsync: bool,
    pub disp_active_low: bool,
}

/// Complete RGB panel configuration
#[derive(Debug, Clone)]
pub struct RgbPanelConfig {
    pub timings: RgbTimings,
    /// Number of data lines, 8 or 16
    pub data_width: u32,
    /// Color depth. Zero means the same as `data_width`.
    pub bits_per_pixel: u32,
    /// Size of each bounce buffer in pixels. Zero disables bounce buffers.
    pub bounce_buffer_size_px: usize,
    pub clock_source: ClockSource,
    /// Alignment of internal buffers. Zero means the default of 4 bytes.
    pub sram_trans_align: usize,
    /// Alignment of PSRAM buffers. Zero means the default of 64 bytes.
    pub psram_trans_align: usize,
    pub pins: RgbPins,
    pub flags: RgbPanelFlags,
}

impl RgbPanelConfig {
    pub fn new(timings: RgbTimings) -> Self {
        Self {
            timings,
            data_width: 16,
            bits_per_pixel: 0,
            bounce_buffer_size_px: 0,
            clock_source: ClockSource::default(),
            sram_trans_align: 0,
            psram_trans_align: 0,
            pins: RgbPins::default(),
            flags: RgbPanelFlags::default(),
        }
    }

    #[must_use]
    pub fn data_width(mut self, data_width: u32) -> Self {
        self.data_width = data_width;
        self
    }

    #[must_use]
    pub fn bits_per_pixel(mut self, bits_per_pixel: u32) -> Self {
        self.bits_per_pixel = bits_per_pixel;
        self
    }

    #[must_use]
    pub fn bounce_buffer_size_px(mut self, size_px: usize) -> Self {
        self.bounce_buffer_size_px = size_px;
        self
    }

    #[must_use]
    pub fn clock_source(mut self, clock_source: ClockSource) -> Self {
        self.clock_source = clock_source;
        self
    }

    #[must_use]
    pub fn sram_trans_align(mut self, align: usize) -> Self {
        self.sram_trans_align = align;
        self
    }

    #[must_use]
    pub fn psram_trans_align(mut self, align: usize) -> Self {
        self.psram_trans_align = align;
        self
    }

    #[must_use]
    pub fn pins(mut self, pins: RgbPins) -> Self {
        self.pins = pins;
        self
    }

    #[must_use]
    pub fn flags(mut self, flags: RgbPanelFlags) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn double_fb(mut self, enable: bool) -> Self {
        self.flags.double_fb = enable;
        self
    }

    #[must_use]
    pub fn no_fb(mut self, enable: bool) -> Self {
        self.flags.no_fb = enable;
        self
    }

    #[must_use]
    pub fn fb_in_psram(mut self, enable: bool) -> Self {
        self.flags.fb_in_psram = enable;
        self
    }

    #[must_use]
    pub fn refresh_on_demand(mut self, enable: bool) -> Self {
        self.flags.refresh_on_demand = enable;
        self
    }

    #[must_use]
    pub fn bb_invalidate_cache(mut self, enable: bool) -> Self {
        self.flags.bb_invalidate_cache = enable;
        self
    }

    #[must_use]
    pub fn avoid_te(mut self, enable: bool) -> Self {
        self.flags.avoid_te = enable;
        self
    }

    #[must_use]
    pub fn restart_in_vsync(mut self, enable: bool) -> Self {
        self.flags.restart_in_vsync = enable;
        self
    }

    #[must_use]
    pub fn disp_active_low(mut self, enable: bool) -> Self {
        self.flags.disp_active_low = enable;
        self
    }

    /// Checks the configuration and derives the buffer layout from it.
    pub fn layout(&self) -> Result<PanelLayout> {
        let flags = &self.flags;

        if self.data_width != 8 && self.data_width != 16 {
            return Err(Error::NotSupported);
        }

        if flags.double_fb && flags.no_fb {
            return Err(Error::InvalidArg);
        }

        if flags.no_fb && self.bounce_buffer_size_px == 0 {
            return Err(Error::InvalidArg);
        }

        if flags.refresh_on_demand && self.bounce_buffer_size_px != 0 {
            return Err(Error::InvalidArg);
        }

        let bits_per_pixel = match self.bits_per_pixel {
            0 => self.data_width,
            bpp => bpp,
        } as usize;

        if bits_per_pixel % 8 != 0 {
            return Err(Error::InvalidArg);
        }

        let timings = &self.timings;
        if timings.h_res == 0 || timings.v_res == 0 || timings.pclk.0 == 0 {
            return Err(Error::InvalidArg);
        }

        let bytes_per_pixel = bits_per_pixel / 8;

        let fb_size = (timings.h_res as usize)
            .checked_mul(timings.v_res as usize)
            .and_then(|px| px.checked_mul(bytes_per_pixel))
            .ok_or(Error::InvalidArg)?;

        let bb_size = self
            .bounce_buffer_size_px
            .checked_mul(bytes_per_pixel)
            .filter(|size| size.checked_mul(2).is_some())
            .ok_or(Error::InvalidArg)?;

        let h_active_cycles = timings
            .h_res
            .checked_mul(bits_per_pixel as u32)
            .ok_or(Error::InvalidArg)?
            / self.data_width;

        if bb_size != 0 && fb_size % (2 * bb_size) != 0 {
            return Err(Error::InvalidArg);
        }

        let ring_len = if bb_size != 0 { bb_size } else { fb_size };

        let stream_mode = !flags.refresh_on_demand;
        if stream_mode
            && flags.restart_in_vsync
            && ring_len.min(DMA_DESCRIPTOR_BUFFER_MAX_SIZE) <= RESTART_SKIP_BYTES
        {
            return Err(Error::InvalidArg);
        }

        self.pins.validate(self.data_width as usize)?;

        let num_fbs = match (flags.no_fb, flags.double_fb) {
            (true, _) => 0,
            (false, false) => 1,
            (false, true) => 2,
        };

        Ok(PanelLayout {
            bits_per_pixel,
            bytes_per_pixel,
            fb_size,
            bb_size,
            h_active_cycles,
            num_fbs,
            nodes_per_ring: DescriptorRings::nodes_needed(ring_len),
            sram_align: match self.sram_trans_align {
                0 => SRAM_TRANS_ALIGN,
                align => align,
            },
            psram_align: match self.psram_trans_align {
                0 => PSRAM_TRANS_ALIGN,
                align => align,
            },
        })
    }
}

/// Buffer sizes derived from a valid [`RgbPanelConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelLayout {
    pub bits_per_pixel: usize,
    pub bytes_per_pixel: usize,
    /// Size of one frame buffer, in bytes
    pub fb_size: usize,
    /// Size of one bounce buffer in bytes, zero without bounce buffers
    pub bb_size: usize,
    /// Width of the active area of a line, in pixel clock cycles
    pub h_active_cycles: u32,
    pub num_fbs: usize,
    pub nodes_per_ring: usize,
    pub sram_align: usize,
    pub psram_align: usize,
}

impl PanelLayout {
    pub fn frame_pixels(&self) -> usize {
        self.fb_size / self.bytes_per_pixel
    }

    pub fn bounce_pixels(&self) -> usize {
        self.bb_size / self.bytes_per_pixel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::FromValueType;

    fn pins16() -> RgbPins {
        RgbPins::new()
            .pclk(7)
            .hsync(46)
            .vsync(3)
            .de(5)
            .data(&[14, 38, 18, 17, 10, 39, 0, 45, 48, 47, 21, 1, 2, 42, 41, 40])
    }

    fn config(h_res: u32, v_res: u32) -> RgbPanelConfig {
        RgbPanelConfig::new(RgbTimings::new(16.MHz(), h_res, v_res)).pins(pins16())
    }

    #[test]
    fn frame_buffer_layout() {
        let layout = config(480, 480).double_fb(true).layout().unwrap();

        assert_eq!(layout.bits_per_pixel, 16);
        assert_eq!(layout.fb_size, 480 * 480 * 2);
        assert_eq!(layout.bb_size, 0);
        assert_eq!(layout.h_active_cycles, 480);
        assert_eq!(layout.num_fbs, 2);
        assert_eq!(layout.nodes_per_ring, 113);
        assert_eq!(layout.sram_align, 4);
        assert_eq!(layout.psram_align, 64);
    }

    #[test]
    fn bounce_layout() {
        let layout = config(240, 160)
            .bounce_buffer_size_px(1920)
            .layout()
            .unwrap();

        assert_eq!(layout.fb_size, 76800);
        assert_eq!(layout.bb_size, 3840);
        assert_eq!(layout.nodes_per_ring, 1);
        assert_eq!(layout.frame_pixels() / layout.bounce_pixels(), 20);
    }

    #[test]
    fn unsupported_data_width() {
        assert_eq!(
            config(480, 480).data_width(12).layout(),
            Err(Error::NotSupported)
        );
    }

    #[test]
    fn conflicting_buffer_modes() {
        assert_eq!(
            config(480, 480).double_fb(true).no_fb(true).layout(),
            Err(Error::InvalidArg)
        );
        assert_eq!(config(480, 480).no_fb(true).layout(), Err(Error::InvalidArg));
        assert_eq!(
            config(480, 480)
                .refresh_on_demand(true)
                .bounce_buffer_size_px(4800)
                .layout(),
            Err(Error::InvalidArg)
        );
    }

    #[test]
    fn bounce_size_must_divide_the_frame_evenly() {
        assert_eq!(
            config(480, 480).bounce_buffer_size_px(7000).layout(),
            Err(Error::InvalidArg)
        );
        assert!(config(480, 480).bounce_buffer_size_px(4800).layout().is_ok());
    }

    #[test]
    fn bits_per_pixel_must_be_whole_bytes() {
        assert_eq!(
            config(480, 480).bits_per_pixel(18).layout(),
            Err(Error::InvalidArg)
        );

        let layout = config(480, 480)
            .data_width(8)
            .bits_per_pixel(24)
            .pins(pins16().data(&[1, 2, 3, 4, 5, 6, 7, 8]))
            .layout()
            .unwrap();
        assert_eq!(layout.fb_size, 480 * 480 * 3);
    }

    #[test]
    fn empty_panel_is_rejected() {
        assert_eq!(config(0, 480).layout(), Err(Error::InvalidArg));

        let mut cfg = config(480, 480);
        cfg.timings.pclk = Hertz(0);
        assert_eq!(cfg.layout(), Err(Error::InvalidArg));
    }

    #[test]
    fn oversized_panels_are_rejected() {
        assert_eq!(config(u32::MAX, u32::MAX).layout(), Err(Error::InvalidArg));
        assert_eq!(config(u32::MAX, 1).layout(), Err(Error::InvalidArg));
        assert_eq!(
            config(480, 480).bounce_buffer_size_px(usize::MAX).layout(),
            Err(Error::InvalidArg)
        );
    }

    #[test]
    fn restart_needs_room_to_skip_the_fifo() {
        assert_eq!(
            config(16, 1).restart_in_vsync(true).layout(),
            Err(Error::InvalidArg)
        );
        assert!(config(18, 1).restart_in_vsync(true).layout().is_ok());
    }

    #[test]
    fn pin_requirements() {
        let hv = RgbPins::new()
            .pclk(7)
            .hsync(46)
            .vsync(3)
            .data(&[0; 16]);
        assert!(config(480, 480).pins(hv).layout().is_ok());

        let no_vsync = RgbPins::new().pclk(7).hsync(46).data(&[0; 16]);
        assert_eq!(
            config(480, 480).pins(no_vsync).layout(),
            Err(Error::InvalidArg)
        );

        let no_pclk = RgbPins::new().de(5).data(&[0; 16]);
        assert_eq!(
            config(480, 480).pins(no_pclk).layout(),
            Err(Error::InvalidArg)
        );

        assert_eq!(
            config(480, 480).pins(pins16().data(&[0; 8])).layout(),
            Err(Error::InvalidArg)
        );
        assert!(pins16().data(&[0; 17]).data.is_empty());
    }
}
