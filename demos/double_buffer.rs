//! Double-buffered drawing with tear avoidance, on a simulated panel.
//!
//! A thread stands in for the LCD_CAM peripheral: it raises VSYNC at 60 Hz
//! and calls the panel's interrupt handler. The main thread renders into the
//! idle frame buffer and hands it over with `draw_bitmap`, which returns once
//! the panel has moved on to it.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use esp_rgb_lcd::clock::{ClockDivider, ClockSource, TimingRegisters};
use esp_rgb_lcd::dma::DmaDescriptor;
use esp_rgb_lcd::errors::Result;
use esp_rgb_lcd::hal::{ControlSignal, GdmaTxChannel, LcdEvent, LcdEvents, LcdLowLevel, StdPlatform};
use esp_rgb_lcd::prelude::*;

const H_RES: u32 = 320;
const V_RES: u32 = 240;

/// LCD peripheral that only tracks its interrupt status
#[derive(Clone, Default)]
struct SimLcd {
    vsync: Arc<AtomicBool>,
}

impl LcdLowLevel for SimLcd {
    fn enable_clock(&mut self, enable: bool) {
        println!("lcd clock {}", if enable { "on" } else { "off" });
    }

    fn set_clock_source(&mut self, _source: ClockSource) {}

    fn set_clock_divider(&mut self, divider: &ClockDivider) {
        println!(
            "lcd divider n={} b/a={}/{} mo={}",
            divider.integer, divider.numerator, divider.denominator, divider.prescale
        );
    }

    fn set_clock_polarity(&mut self, _idle_high: bool, _active_neg_edge: bool) {}

    fn set_timing(&mut self, timing: &TimingRegisters) {
        println!(
            "lcd timing {}x{} cycles per frame",
            timing.ht_width + 1,
            timing.vt_height + 1
        );
    }

    fn enable_auto_next_frame(&mut self, _enable: bool) {}

    fn set_interrupt_mask(&mut self, _events: LcdEvents) {}

    fn get_status(&self) -> LcdEvents {
        if self.vsync.load(Ordering::SeqCst) {
            LcdEvent::Vsync.into()
        } else {
            LcdEvents::empty()
        }
    }

    fn clear_status(&mut self, events: LcdEvents) {
        if events.contains(LcdEvent::Vsync) {
            self.vsync.store(false, Ordering::SeqCst);
        }
    }

    fn start(&mut self) {
        println!("lcd start");
    }

    fn stop(&mut self) {}

    fn reset_fifo(&mut self) {}

    fn reset(&mut self) {}

    fn connect_data_line(&mut self, _line: usize, _gpio: u8, _invert: bool) {}

    fn connect_control_signal(&mut self, _signal: ControlSignal, _gpio: u8) {}

    fn set_gpio_level(&mut self, _gpio: u8, _high: bool) {}
}

struct SimDma;

impl GdmaTxChannel for SimDma {
    fn reset(&mut self) {}

    fn start(&mut self, head: *const DmaDescriptor) {
        println!("dma start @{:?}", head);
    }

    fn enable_eof_interrupt(&mut self, _enable: bool) {}
}

struct CountFrames(Arc<AtomicU32>);

impl RgbPanelEventHandler for CountFrames {
    fn on_vsync(&mut self) -> bool {
        self.0.fetch_add(1, Ordering::SeqCst);

        false
    }
}

fn main() -> Result<()> {
    let timings = RgbTimings::new(6.MHz(), H_RES, V_RES)
        .hsync(4, 43, 8)
        .vsync(4, 12, 8);

    let pins = RgbPins::new()
        .pclk(21)
        .hsync(39)
        .vsync(48)
        .de(18)
        .data(&[4, 5, 6, 7, 15, 8, 20, 3, 46, 9, 10, 11, 12, 13, 14, 0]);

    let config = RgbPanelConfig::new(timings)
        .pins(pins)
        .double_fb(true)
        .avoid_te(true);

    let lcd = SimLcd::default();
    let vsync = lcd.vsync.clone();

    let panel = RgbPanel::new(&config, lcd, SimDma, StdPlatform::new())?;

    let frames = Arc::new(AtomicU32::new(0));
    panel.register_event_handler(CountFrames(frames.clone()));

    panel.init()?;

    let running = AtomicBool::new(true);
    let started = Instant::now();

    std::thread::scope(|s| -> Result<()> {
        s.spawn(|| {
            while running.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_micros(16_667));

                vsync.store(true, Ordering::SeqCst);
                panel.handle_lcd_interrupt();
            }
        });

        let drawn = (0..30u32).try_for_each(|frame| {
            let Some(mut fb) = panel.idle_frame_buffer() else {
                return Ok(());
            };

            let pixels = unsafe { fb.as_mut_slice() };

            // a vertical bar sweeping across the screen
            let bar = (frame * 8) % H_RES;
            for (i, px) in pixels.chunks_exact_mut(2).enumerate() {
                let x = i as u32 % H_RES;
                let color: u16 = if x.abs_diff(bar) < 8 { 0xf800 } else { 0x001f };

                px.copy_from_slice(&color.to_le_bytes());
            }

            panel.draw_bitmap(0, 0, H_RES as i32, V_RES as i32, unsafe { fb.as_slice() })
        });

        running.store(false, Ordering::SeqCst);

        drawn
    })?;

    let elapsed = started.elapsed();
    println!(
        "30 frames drawn in {:?}, {} vsyncs, now showing buffer {}",
        elapsed,
        frames.load(Ordering::SeqCst),
        panel.current_frame_buffer_index(),
    );

    Ok(())
}
