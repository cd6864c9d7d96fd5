//! Pixel clock and timing generator configuration.
//!
//! The LCD group clock is derived from the selected source through a
//! fractional divider, `lcd_clk = src / (n + b / a)`, and the pixel clock
//! through an integer prescaler, `pclk = lcd_clk / mo`.

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::errors::{Error, Result};
use crate::units::Hertz;

/// Upper bound (exclusive) of the integer part of the group divider
const CLK_FRAC_DIV_N_MAX: u32 = 256;

/// Upper bound (exclusive) of the fractional divider's denominator
const CLK_FRAC_DIV_AB_MAX: u32 = 64;

/// Group clock sources, encoded as the `lcd_clk_sel` register value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ClockSource {
    /// The crystal oscillator
    Xtal = 1,
    /// PLL, 240 MHz
    Pll240M = 2,
    /// PLL, 160 MHz
    Pll160M = 3,
}

impl ClockSource {
    /// Frequency of the source, `xtal` being the crystal frequency of the board.
    pub fn frequency(&self, xtal: Hertz) -> Hertz {
        match self {
            Self::Xtal => xtal,
            Self::Pll240M => Hertz(240_000_000),
            Self::Pll160M => Hertz(160_000_000),
        }
    }

    /// PLL sources need the APB frequency pinned while the panel runs.
    pub fn needs_pm_lock(&self) -> bool {
        matches!(self, Self::Pll240M | Self::Pll160M)
    }
}

impl Default for ClockSource {
    fn default() -> Self {
        Self::Pll160M
    }
}

/// Settings of the group divider and pixel clock prescaler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClockDivider {
    /// `n`, in `[2, 255]`
    pub integer: u32,
    /// `b`
    pub numerator: u32,
    /// `a`, below 64. Zero when there is no fractional part.
    pub denominator: u32,
    /// `mo`, never below 2
    pub prescale: u32,
}

impl ClockDivider {
    /// Finds the divider closest to `pclk` and returns it with the pixel
    /// clock it actually produces.
    pub fn calculate(source: Hertz, pclk: Hertz) -> Result<(Self, Hertz)> {
        let src = source.0 as u64;
        let expect = pclk.0 as u64;

        if src == 0 || expect == 0 {
            return Err(Error::InvalidArg);
        }

        let mut prescale = src / expect / CLK_FRAC_DIV_N_MAX as u64 + 1;
        if prescale == 1 {
            prescale = 2;
        }

        let raw_n = src / expect / prescale;
        let integer = raw_n.clamp(2, CLK_FRAC_DIV_N_MAX as u64 - 1);

        let mut numerator = 0;
        let mut denominator = 0;

        if integer == raw_n {
            let delta = src / prescale - expect * integer;

            if delta != 0 {
                let gcd = gcd(expect, delta);
                let mut a = expect / gcd;
                let mut b = delta / gcd;

                let d = a / CLK_FRAC_DIV_AB_MAX as u64 + 1;
                a /= d;
                b /= d;

                numerator = b;
                denominator = a;
            }
        }

        let real = if denominator != 0 {
            src * denominator / (denominator * integer + numerator) / prescale
        } else {
            src / integer / prescale
        };

        let divider = Self {
            integer: integer as u32,
            numerator: numerator as u32,
            denominator: denominator as u32,
            prescale: prescale as u32,
        };

        Ok((divider, Hertz(real as u32)))
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }

    a
}

/// Register values of the timing generator, in pixel clock cycles
/// (minus one where the hardware counts from zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimingRegisters {
    pub data_width: u32,

    pub hsync_width: u32,
    pub hb_front: u32,
    pub ha_width: u32,
    pub ht_width: u32,

    pub vsync_width: u32,
    pub vb_front: u32,
    pub va_height: u32,
    pub vt_height: u32,

    pub hsync_idle_high: bool,
    pub vsync_idle_high: bool,
    pub de_idle_high: bool,
}

/// Horizontal or vertical sync parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncTiming {
    pub pulse_width: u32,
    pub back_porch: u32,
    pub active: u32,
    pub front_porch: u32,
}

impl SyncTiming {
    fn registers(&self) -> (u32, u32, u32, u32) {
        let pw = self.pulse_width;

        (
            pw.saturating_sub(1),
            (self.back_porch + pw).saturating_sub(1),
            self.active.saturating_sub(1),
            (pw + self.back_porch + self.active + self.front_porch).saturating_sub(1),
        )
    }
}

impl TimingRegisters {
    /// `horizontal.active` is the line width in pixel clock cycles, that is
    /// `h_res * bits_per_pixel / data_width`.
    pub fn new(data_width: u32, horizontal: SyncTiming, vertical: SyncTiming) -> Self {
        let (hsync_width, hb_front, ha_width, ht_width) = horizontal.registers();
        let (vsync_width, vb_front, va_height, vt_height) = vertical.registers();

        Self {
            data_width,
            hsync_width,
            hb_front,
            ha_width,
            ht_width,
            vsync_width,
            vb_front,
            va_height,
            vt_height,
            hsync_idle_high: true,
            vsync_idle_high: true,
            de_idle_high: false,
        }
    }

    #[must_use]
    pub fn idle_levels(mut self, hsync_high: bool, vsync_high: bool, de_high: bool) -> Self {
        self.hsync_idle_high = hsync_high;
        self.vsync_idle_high = vsync_high;
        self.de_idle_high = de_high;
        self
    }
}
