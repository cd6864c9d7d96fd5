//! ESP32-S3 register backend: the LCD_CAM peripheral in RGB mode, its GPIO
//! matrix routing and a GDMA OUT channel attached to it.
//!
//! Register offsets and fields follow the ESP32-S3 technical reference
//! manual. Both types assume exclusive ownership of what they program; the
//! GDMA channel number is chosen by the application.
//!
//! The backend does not install interrupt handlers. A typical LCD_CAM
//! handler calls [`RgbPanel::handle_lcd_interrupt`](crate::rgb::RgbPanel::handle_lcd_interrupt),
//! and the GDMA one forwards [`GdmaEof::take`] to
//! [`RgbPanel::handle_dma_eof`](crate::rgb::RgbPanel::handle_dma_eof).

use core::ptr;

use crate::clock::{ClockDivider, ClockSource, TimingRegisters};
use crate::dma::DmaDescriptor;
use crate::hal::{ControlSignal, GdmaTxChannel, LcdEvent, LcdEvents, LcdLowLevel};

const DR_REG_LCD_CAM_BASE: usize = 0x6004_1000;
const DR_REG_GPIO_BASE: usize = 0x6000_4000;
const DR_REG_IO_MUX_BASE: usize = 0x6000_9000;
const DR_REG_SYSTEM_BASE: usize = 0x600c_0000;
const DR_REG_GDMA_BASE: usize = 0x6003_f000;

const SYSTEM_PERIP_CLK_EN1_REG: usize = 0x001c;
const SYSTEM_PERIP_RST_EN1_REG: usize = 0x0024;
const SYSTEM_DMA_CLK_EN: u32 = 1 << 6;
const SYSTEM_LCD_CAM_CLK_EN: u32 = 1 << 8;

const LCD_CLOCK_REG: usize = 0x0000;
const LCD_USER_REG: usize = 0x0014;
const LCD_MISC_REG: usize = 0x0018;
const LCD_CTRL_REG: usize = 0x001c;
const LCD_CTRL1_REG: usize = 0x0020;
const LCD_CTRL2_REG: usize = 0x0024;
const LC_DMA_INT_ENA_REG: usize = 0x0064;
const LC_DMA_INT_ST_REG: usize = 0x006c;
const LC_DMA_INT_CLR_REG: usize = 0x0070;

const LCD_CLK_EN: u32 = 1 << 31;
const LCD_CK_IDLE_EDGE: u32 = 1 << 7;
const LCD_CK_OUT_EDGE: u32 = 1 << 8;

const LCD_ALWAYS_OUT_EN: u32 = 1 << 13;
const LCD_UPDATE: u32 = 1 << 20;
const LCD_2BYTE_EN: u32 = 1 << 23;
const LCD_DOUT: u32 = 1 << 24;
const LCD_START: u32 = 1 << 27;
const LCD_RESET: u32 = 1 << 28;

const LCD_NEXT_FRAME_EN: u32 = 1 << 25;
const LCD_BK_EN: u32 = 1 << 26;
const LCD_AFIFO_RESET: u32 = 1 << 27;

const LCD_RGB_MODE_EN: u32 = 1 << 31;
const LCD_VSYNC_IDLE_POL: u32 = 1 << 7;
const LCD_DE_IDLE_POL: u32 = 1 << 8;
const LCD_HSYNC_IDLE_POL: u32 = 1 << 23;

const GPIO_OUT_W1TS_REG: usize = 0x0008;
const GPIO_OUT_W1TC_REG: usize = 0x000c;
const GPIO_OUT1_W1TS_REG: usize = 0x0014;
const GPIO_OUT1_W1TC_REG: usize = 0x0018;
const GPIO_ENABLE_W1TS_REG: usize = 0x0024;
const GPIO_ENABLE1_W1TS_REG: usize = 0x0030;
const GPIO_FUNC0_OUT_SEL_CFG_REG: usize = 0x0554;
const GPIO_FUNC_OUT_INV_SEL: u32 = 1 << 9;
const GPIO_FUNC_OEN_SEL: u32 = 1 << 10;

const IO_MUX_GPIO0_REG: usize = 0x0004;
const IO_MUX_MCU_SEL_SHIFT: u32 = 12;
const IO_MUX_FUN_DRV_SHIFT: u32 = 10;
const PIN_FUNC_GPIO: u32 = 1;

const SIG_GPIO_OUT_IDX: u32 = 256;
const LCD_DATA_OUT0_IDX: u32 = 133;
const LCD_H_ENABLE_IDX: u32 = 150;
const LCD_H_SYNC_IDX: u32 = 151;
const LCD_V_SYNC_IDX: u32 = 152;
const LCD_PCLK_IDX: u32 = 154;

const GDMA_CH_STRIDE: usize = 0xc0;
const GDMA_OUT_CONF0_REG: usize = 0x0060;
const GDMA_OUT_INT_ST_REG: usize = 0x006c;
const GDMA_OUT_INT_ENA_REG: usize = 0x0070;
const GDMA_OUT_INT_CLR_REG: usize = 0x0074;
const GDMA_OUT_LINK_REG: usize = 0x0080;
const GDMA_OUT_EOF_DES_ADDR_REG: usize = 0x0088;
const GDMA_OUT_PERI_SEL_REG: usize = 0x00a8;

const GDMA_OUT_RST: u32 = 1 << 0;
const GDMA_OUTDSCR_BURST_EN: u32 = 1 << 4;
const GDMA_OUT_DATA_BURST_EN: u32 = 1 << 5;
const GDMA_OUT_EOF_INT: u32 = 1 << 1;
const GDMA_OUTLINK_ADDR_MASK: u32 = 0xf_ffff;
const GDMA_OUTLINK_START: u32 = 1 << 21;
const GDMA_PERI_SEL_LCD_CAM: u32 = 5;

/// Number of GDMA channel pairs
pub const GDMA_CHANNELS: u8 = 5;

/// A 32-bit memory-mapped register
#[derive(Debug, Clone, Copy)]
struct Reg(usize);

impl Reg {
    fn read(self) -> u32 {
        unsafe { ptr::read_volatile(self.0 as *const u32) }
    }

    fn write(self, value: u32) {
        unsafe { ptr::write_volatile(self.0 as *mut u32, value) }
    }

    fn modify(self, f: impl FnOnce(u32) -> u32) {
        self.write(f(self.read()));
    }

    fn set(self, bits: u32, on: bool) {
        self.modify(|v| if on { v | bits } else { v & !bits });
    }
}

/// `value` truncated to `width` bits and moved to `shift`
const fn field(value: u32, shift: u32, width: u32) -> u32 {
    (value & ((1 << width) - 1)) << shift
}

/// Base addresses of the register blocks the backend touches
#[derive(Debug, Clone, Copy)]
struct Blocks {
    lcd_cam: usize,
    gpio: usize,
    io_mux: usize,
    system: usize,
    gdma: usize,
}

impl Blocks {
    const CHIP: Self = Self {
        lcd_cam: DR_REG_LCD_CAM_BASE,
        gpio: DR_REG_GPIO_BASE,
        io_mux: DR_REG_IO_MUX_BASE,
        system: DR_REG_SYSTEM_BASE,
        gdma: DR_REG_GDMA_BASE,
    };

    fn lcd(&self, offset: usize) -> Reg {
        Reg(self.lcd_cam + offset)
    }

    fn gpio(&self, offset: usize) -> Reg {
        Reg(self.gpio + offset)
    }

    fn system(&self, offset: usize) -> Reg {
        Reg(self.system + offset)
    }

    fn gdma_out(&self, channel: u8, offset: usize) -> Reg {
        Reg(self.gdma + channel as usize * GDMA_CH_STRIDE + offset)
    }

    /// Routes `signal` to `gpio` through the GPIO matrix and enables the pad
    /// as an output.
    fn route_output(&self, gpio: u8, signal: u32, invert: bool) {
        let n = gpio as usize;

        Reg(self.io_mux + IO_MUX_GPIO0_REG + n * 4).modify(|v| {
            (v & !(field(0x7, IO_MUX_MCU_SEL_SHIFT, 3) | field(0x3, IO_MUX_FUN_DRV_SHIFT, 2)))
                | field(PIN_FUNC_GPIO, IO_MUX_MCU_SEL_SHIFT, 3)
                | field(2, IO_MUX_FUN_DRV_SHIFT, 2)
        });

        let mut cfg = field(signal, 0, 9) | GPIO_FUNC_OEN_SEL;
        if invert {
            cfg |= GPIO_FUNC_OUT_INV_SEL;
        }
        self.gpio(GPIO_FUNC0_OUT_SEL_CFG_REG + n * 4).write(cfg);

        if gpio < 32 {
            self.gpio(GPIO_ENABLE_W1TS_REG).write(1 << gpio);
        } else {
            self.gpio(GPIO_ENABLE1_W1TS_REG).write(1 << (gpio - 32));
        }
    }
}

/// The LCD_CAM peripheral of the ESP32-S3, driven in RGB mode
pub struct Esp32s3Lcd {
    blocks: Blocks,
}

impl Esp32s3Lcd {
    /// # Safety
    ///
    /// The caller must own the LCD_CAM peripheral and the pads it routes to
    /// it, and must not create a second instance.
    pub unsafe fn new() -> Self {
        Self {
            blocks: Blocks::CHIP,
        }
    }

    fn reg(&self, offset: usize) -> Reg {
        self.blocks.lcd(offset)
    }
}

impl LcdLowLevel for Esp32s3Lcd {
    fn enable_clock(&mut self, enable: bool) {
        self.blocks
            .system(SYSTEM_PERIP_CLK_EN1_REG)
            .set(SYSTEM_LCD_CAM_CLK_EN, enable);

        if enable {
            self.blocks
                .system(SYSTEM_PERIP_RST_EN1_REG)
                .set(SYSTEM_LCD_CAM_CLK_EN, false);
        }

        self.reg(LCD_CLOCK_REG).set(LCD_CLK_EN, enable);
    }

    fn set_clock_source(&mut self, source: ClockSource) {
        let sel: u8 = source.into();

        self.reg(LCD_CLOCK_REG)
            .modify(|v| (v & !field(0x3, 29, 2)) | field(sel as u32, 29, 2));
    }

    fn set_clock_divider(&mut self, divider: &ClockDivider) {
        let mask = field(0x3f, 0, 6)
            | field(0xff, 9, 8)
            | field(0x3f, 17, 6)
            | field(0x3f, 23, 6)
            | (1 << 6);

        let value = field(divider.prescale.saturating_sub(1), 0, 6)
            | field(divider.integer, 9, 8)
            | field(divider.numerator, 17, 6)
            | field(divider.denominator, 23, 6);

        self.reg(LCD_CLOCK_REG).modify(|v| (v & !mask) | value);
    }

    fn set_clock_polarity(&mut self, idle_high: bool, active_neg_edge: bool) {
        let clock = self.reg(LCD_CLOCK_REG);

        clock.set(LCD_CK_IDLE_EDGE, idle_high);
        clock.set(LCD_CK_OUT_EDGE, active_neg_edge);
    }

    fn set_timing(&mut self, timing: &TimingRegisters) {
        self.reg(LCD_USER_REG).modify(|v| {
            let v = v | LCD_DOUT | LCD_ALWAYS_OUT_EN;

            if timing.data_width == 16 {
                v | LCD_2BYTE_EN
            } else {
                v & !LCD_2BYTE_EN
            }
        });

        self.reg(LCD_CTRL_REG).write(
            LCD_RGB_MODE_EN
                | field(timing.hb_front, 0, 11)
                | field(timing.va_height, 11, 10)
                | field(timing.vt_height, 21, 10),
        );

        self.reg(LCD_CTRL1_REG).write(
            field(timing.vb_front, 0, 8)
                | field(timing.ha_width, 8, 12)
                | field(timing.ht_width, 20, 12),
        );

        let mut ctrl2 = field(timing.vsync_width, 0, 7) | field(timing.hsync_width, 16, 7);
        if timing.vsync_idle_high {
            ctrl2 |= LCD_VSYNC_IDLE_POL;
        }
        if timing.de_idle_high {
            ctrl2 |= LCD_DE_IDLE_POL;
        }
        if timing.hsync_idle_high {
            ctrl2 |= LCD_HSYNC_IDLE_POL;
        }
        self.reg(LCD_CTRL2_REG).write(ctrl2);

        // porches output the blank level
        self.reg(LCD_MISC_REG).set(LCD_BK_EN, true);
        self.reg(LCD_USER_REG).set(LCD_UPDATE, true);
    }

    fn enable_auto_next_frame(&mut self, enable: bool) {
        self.reg(LCD_MISC_REG).set(LCD_NEXT_FRAME_EN, enable);
    }

    fn set_interrupt_mask(&mut self, events: LcdEvents) {
        self.reg(LC_DMA_INT_ENA_REG).write(events.as_repr());
    }

    fn get_status(&self) -> LcdEvents {
        LcdEvents::from_repr_truncated(self.reg(LC_DMA_INT_ST_REG).read())
    }

    fn clear_status(&mut self, events: LcdEvents) {
        self.reg(LC_DMA_INT_CLR_REG).write(events.as_repr());
    }

    fn start(&mut self) {
        self.reg(LCD_USER_REG).set(LCD_UPDATE | LCD_START, true);
    }

    fn stop(&mut self) {
        self.reg(LCD_USER_REG).set(LCD_START, false);
        self.reg(LCD_USER_REG).set(LCD_UPDATE, true);
    }

    fn reset_fifo(&mut self) {
        let misc = self.reg(LCD_MISC_REG);

        misc.set(LCD_AFIFO_RESET, true);
        misc.set(LCD_AFIFO_RESET, false);
    }

    fn reset(&mut self) {
        let user = self.reg(LCD_USER_REG);

        user.set(LCD_RESET, true);
        user.set(LCD_RESET, false);
    }

    fn connect_data_line(&mut self, line: usize, gpio: u8, invert: bool) {
        self.blocks
            .route_output(gpio, LCD_DATA_OUT0_IDX + line as u32, invert);
    }

    fn connect_control_signal(&mut self, signal: ControlSignal, gpio: u8) {
        let index = match signal {
            ControlSignal::Pclk => LCD_PCLK_IDX,
            ControlSignal::Hsync => LCD_H_SYNC_IDX,
            ControlSignal::Vsync => LCD_V_SYNC_IDX,
            ControlSignal::De => LCD_H_ENABLE_IDX,
            ControlSignal::Disp => SIG_GPIO_OUT_IDX,
        };

        self.blocks.route_output(gpio, index, false);
    }

    fn set_gpio_level(&mut self, gpio: u8, high: bool) {
        let (reg, bit) = match (gpio < 32, high) {
            (true, true) => (GPIO_OUT_W1TS_REG, gpio),
            (true, false) => (GPIO_OUT_W1TC_REG, gpio),
            (false, true) => (GPIO_OUT1_W1TS_REG, gpio - 32),
            (false, false) => (GPIO_OUT1_W1TC_REG, gpio - 32),
        };

        self.blocks.gpio(reg).write(1 << bit);
    }
}

/// A GDMA OUT channel feeding the LCD_CAM peripheral
pub struct Esp32s3Gdma {
    blocks: Blocks,
    channel: u8,
}

impl Esp32s3Gdma {
    /// Enables the GDMA clock and attaches OUT channel `channel` to LCD_CAM.
    ///
    /// # Safety
    ///
    /// The caller must own GDMA OUT channel `channel` and must not create a
    /// second instance for it.
    pub unsafe fn new(channel: u8) -> Option<Self> {
        Self::with_blocks(Blocks::CHIP, channel)
    }

    fn with_blocks(blocks: Blocks, channel: u8) -> Option<Self> {
        if channel >= GDMA_CHANNELS {
            return None;
        }

        blocks
            .system(SYSTEM_PERIP_CLK_EN1_REG)
            .set(SYSTEM_DMA_CLK_EN, true);
        blocks
            .system(SYSTEM_PERIP_RST_EN1_REG)
            .set(SYSTEM_DMA_CLK_EN, false);

        let dma = Self { blocks, channel };

        dma.reg(GDMA_OUT_PERI_SEL_REG)
            .write(GDMA_PERI_SEL_LCD_CAM);
        dma.reg(GDMA_OUT_CONF0_REG)
            .set(GDMA_OUTDSCR_BURST_EN | GDMA_OUT_DATA_BURST_EN, true);

        Some(dma)
    }

    fn reg(&self, offset: usize) -> Reg {
        self.blocks.gdma_out(self.channel, offset)
    }

    /// A handle for the GDMA interrupt handler.
    pub fn eof(&self) -> GdmaEof {
        GdmaEof {
            blocks: self.blocks,
            channel: self.channel,
        }
    }
}

impl GdmaTxChannel for Esp32s3Gdma {
    fn reset(&mut self) {
        let conf0 = self.reg(GDMA_OUT_CONF0_REG);

        conf0.set(GDMA_OUT_RST, true);
        conf0.set(GDMA_OUT_RST, false);
    }

    fn start(&mut self, head: *const DmaDescriptor) {
        let link = self.reg(GDMA_OUT_LINK_REG);

        link.modify(|v| {
            (v & !GDMA_OUTLINK_ADDR_MASK) | (head as usize as u32 & GDMA_OUTLINK_ADDR_MASK)
        });
        link.set(GDMA_OUTLINK_START, true);
    }

    fn enable_eof_interrupt(&mut self, enable: bool) {
        self.reg(GDMA_OUT_INT_CLR_REG).write(GDMA_OUT_EOF_INT);
        self.reg(GDMA_OUT_INT_ENA_REG).set(GDMA_OUT_EOF_INT, enable);
    }
}

/// EOF status of a GDMA OUT channel, readable from its interrupt handler
/// while the channel itself is owned by a panel.
#[derive(Debug, Clone, Copy)]
pub struct GdmaEof {
    blocks: Blocks,
    channel: u8,
}

impl GdmaEof {
    /// Clears a pending EOF interrupt and returns the descriptor that raised
    /// it, or `None` when no EOF is pending.
    #[cfg_attr(target_os = "espidf", link_section = ".iram1.gdma_eof_take")]
    pub fn take(&self) -> Option<*const DmaDescriptor> {
        let status = self.blocks.gdma_out(self.channel, GDMA_OUT_INT_ST_REG).read();
        if status & GDMA_OUT_EOF_INT == 0 {
            return None;
        }

        self.blocks
            .gdma_out(self.channel, GDMA_OUT_INT_CLR_REG)
            .write(GDMA_OUT_EOF_INT);

        let desc = self
            .blocks
            .gdma_out(self.channel, GDMA_OUT_EOF_DES_ADDR_REG)
            .read();

        Some(desc as usize as *const DmaDescriptor)
    }
}
