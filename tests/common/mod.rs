#![allow(dead_code)]

use std::alloc::Layout;
use std::cell::RefCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use esp_rgb_lcd::clock::{ClockDivider, ClockSource, TimingRegisters};
use esp_rgb_lcd::dma::DmaDescriptor;
use esp_rgb_lcd::errors::{Error, Result};
use esp_rgb_lcd::hal::{ControlSignal, GdmaTxChannel, LcdEvents, LcdLowLevel, Platform};
use esp_rgb_lcd::memory::MemCaps;
use esp_rgb_lcd::rgb::{RgbPanel, RgbPanelConfig, RgbPins, RgbTimings};
use esp_rgb_lcd::units::FromValueType;

/// Everything the driver asked the LCD and DMA to do, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    EnableClock(bool),
    ClockSource(ClockSource),
    ClockDivider(ClockDivider),
    ClockPolarity { idle_high: bool, active_neg: bool },
    Timing(TimingRegisters),
    AutoNextFrame(bool),
    InterruptMask(LcdEvents),
    ClearStatus(LcdEvents),
    LcdStart,
    LcdStop,
    LcdResetFifo,
    LcdReset,
    DataLine { line: usize, gpio: u8, invert: bool },
    Signal(ControlSignal, u8),
    GpioLevel(u8, bool),
    DmaReset,
    DmaStart(usize),
    DmaEofInterrupt(bool),
}

#[derive(Default)]
struct Bus {
    calls: Vec<Call>,
    status: LcdEvents,
    /// Next descriptor the simulated DMA fetches
    cursor: usize,
}

/// Shared between the mock LCD and DMA, so call order across both is kept.
#[derive(Clone, Default)]
pub struct Recorder(Arc<Mutex<Bus>>);

impl Recorder {
    fn record(&self, call: Call) {
        self.0.lock().unwrap().calls.push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().calls.clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().calls.clear();
    }

    pub fn position(&self, call: &Call) -> Option<usize> {
        self.calls().iter().position(|c| c == call)
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    pub fn dma_starts(&self) -> Vec<usize> {
        self.calls()
            .iter()
            .filter_map(|c| match c {
                Call::DmaStart(addr) => Some(*addr),
                _ => None,
            })
            .collect()
    }

    pub fn dividers(&self) -> Vec<ClockDivider> {
        self.calls()
            .iter()
            .filter_map(|c| match c {
                Call::ClockDivider(div) => Some(*div),
                _ => None,
            })
            .collect()
    }

    /// Sets pending LCD interrupt status bits.
    pub fn raise(&self, events: impl Into<LcdEvents>) {
        let mut bus = self.0.lock().unwrap();
        bus.status = bus.status | events.into();
    }

    /// Walks the descriptor chain like the GDMA does, from the current
    /// position up to and including the next `suc_eof` descriptor.
    ///
    /// Returns the EOF descriptor and the bytes sent, or `None` when the
    /// chain ended in a null link or the channel was never started.
    pub fn run_dma_until_eof(&self) -> Option<(*const DmaDescriptor, Vec<u8>)> {
        let mut bus = self.0.lock().unwrap();
        let mut desc = bus.cursor as *const DmaDescriptor;
        let mut data = Vec::new();

        while !desc.is_null() {
            let d = unsafe { *desc };

            data.extend_from_slice(unsafe { std::slice::from_raw_parts(d.buffer(), d.length()) });

            if d.suc_eof() {
                bus.cursor = d.next() as usize;
                return Some((desc, data));
            }

            desc = d.next();
        }

        bus.cursor = 0;
        None
    }
}

pub struct MockLcd(pub Recorder);

impl LcdLowLevel for MockLcd {
    fn enable_clock(&mut self, enable: bool) {
        self.0.record(Call::EnableClock(enable));
    }

    fn set_clock_source(&mut self, source: ClockSource) {
        self.0.record(Call::ClockSource(source));
    }

    fn set_clock_divider(&mut self, divider: &ClockDivider) {
        self.0.record(Call::ClockDivider(*divider));
    }

    fn set_clock_polarity(&mut self, idle_high: bool, active_neg_edge: bool) {
        self.0.record(Call::ClockPolarity {
            idle_high,
            active_neg: active_neg_edge,
        });
    }

    fn set_timing(&mut self, timing: &TimingRegisters) {
        self.0.record(Call::Timing(*timing));
    }

    fn enable_auto_next_frame(&mut self, enable: bool) {
        self.0.record(Call::AutoNextFrame(enable));
    }

    fn set_interrupt_mask(&mut self, events: LcdEvents) {
        self.0.record(Call::InterruptMask(events));
    }

    fn get_status(&self) -> LcdEvents {
        self.0 .0.lock().unwrap().status
    }

    fn clear_status(&mut self, events: LcdEvents) {
        let mut bus = self.0 .0.lock().unwrap();

        bus.status = bus.status - events;
        bus.calls.push(Call::ClearStatus(events));
    }

    fn start(&mut self) {
        self.0.record(Call::LcdStart);
    }

    fn stop(&mut self) {
        self.0.record(Call::LcdStop);
    }

    fn reset_fifo(&mut self) {
        self.0.record(Call::LcdResetFifo);
    }

    fn reset(&mut self) {
        self.0.record(Call::LcdReset);
    }

    fn connect_data_line(&mut self, line: usize, gpio: u8, invert: bool) {
        self.0.record(Call::DataLine { line, gpio, invert });
    }

    fn connect_control_signal(&mut self, signal: ControlSignal, gpio: u8) {
        self.0.record(Call::Signal(signal, gpio));
    }

    fn set_gpio_level(&mut self, gpio: u8, high: bool) {
        self.0.record(Call::GpioLevel(gpio, high));
    }
}

pub struct MockDma(pub Recorder);

impl GdmaTxChannel for MockDma {
    fn reset(&mut self) {
        self.0.record(Call::DmaReset);
    }

    fn start(&mut self, head: *const DmaDescriptor) {
        let mut bus = self.0 .0.lock().unwrap();

        bus.cursor = head as usize;
        bus.calls.push(Call::DmaStart(head as usize));
    }

    fn enable_eof_interrupt(&mut self, enable: bool) {
        self.0.record(Call::DmaEofInterrupt(enable));
    }
}

/// One allocation or free made through [`MockPlatform`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeapEvent {
    pub len: usize,
    pub caps: MemCaps,
    pub alloc: bool,
}

thread_local! {
    static HEAP: RefCell<Vec<HeapEvent>> = RefCell::new(Vec::new());
}

/// Heap traffic of the current thread, oldest first.
pub fn heap_log() -> Vec<HeapEvent> {
    HEAP.with(|heap| heap.borrow().clone())
}

pub fn clear_heap_log() {
    HEAP.with(|heap| heap.borrow_mut().clear());
}

#[derive(Default)]
pub struct PlatformStats {
    pub writebacks: Mutex<Vec<(usize, usize)>>,
    pub invalidates: AtomicUsize,
    pub preloads: AtomicUsize,
    pub pm_acquired: AtomicUsize,
    pub pm_released: AtomicUsize,
    pub yields: AtomicUsize,
    /// Busy-waits, as opposed to sleeps
    pub delays: AtomicUsize,
}

impl PlatformStats {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

pub struct MockPlatform {
    epoch: Instant,
    pub stats: Arc<PlatformStats>,
    pub fail_pm_lock: bool,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            stats: Default::default(),
            fail_pm_lock: false,
        }
    }
}

impl Platform for MockPlatform {
    fn now_us(&self) -> u64 {
        self.epoch.elapsed().as_micros() as u64
    }

    fn delay_us(&self, us: u32) {
        self.stats.delays.fetch_add(1, Ordering::SeqCst);

        std::thread::sleep(Duration::from_micros(us as u64));
    }

    fn sleep_us(&self, us: u32) {
        std::thread::sleep(Duration::from_micros(us as u64));
    }

    unsafe fn alloc_zeroed(layout: Layout, caps: MemCaps) -> *mut u8 {
        HEAP.with(|heap| {
            heap.borrow_mut().push(HeapEvent {
                len: layout.size(),
                caps,
                alloc: true,
            })
        });

        std::alloc::alloc_zeroed(layout)
    }

    unsafe fn free(ptr: *mut u8, layout: Layout, caps: MemCaps) {
        HEAP.with(|heap| {
            heap.borrow_mut().push(HeapEvent {
                len: layout.size(),
                caps,
                alloc: false,
            })
        });

        std::alloc::dealloc(ptr, layout)
    }

    fn cache_writeback(&self, addr: *const u8, len: usize) {
        self.stats
            .writebacks
            .lock()
            .unwrap()
            .push((addr as usize, len));
    }

    fn cache_invalidate(&self, _addr: *const u8, _len: usize) {
        self.stats.invalidates.fetch_add(1, Ordering::SeqCst);
    }

    fn cache_preload(&self, _addr: *const u8, _len: usize) {
        self.stats.preloads.fetch_add(1, Ordering::SeqCst);
    }

    fn acquire_pm_lock(&self) -> Result<()> {
        if self.fail_pm_lock {
            return Err(Error::NotFound);
        }

        self.stats.pm_acquired.fetch_add(1, Ordering::SeqCst);

        Ok(())
    }

    fn release_pm_lock(&self) {
        self.stats.pm_released.fetch_add(1, Ordering::SeqCst);
    }

    fn yield_from_isr(&self) {
        self.stats.yields.fetch_add(1, Ordering::SeqCst);
    }
}

pub type TestPanel = RgbPanel<MockLcd, MockDma, MockPlatform>;

pub const DATA_PINS: [u8; 16] = [14, 38, 18, 17, 10, 39, 0, 45, 48, 47, 21, 1, 2, 42, 41, 40];

pub fn pins() -> RgbPins {
    RgbPins::new()
        .pclk(7)
        .hsync(46)
        .vsync(3)
        .de(5)
        .data(&DATA_PINS)
}

pub fn config(h_res: u32, v_res: u32) -> RgbPanelConfig {
    let timings = RgbTimings::new(16.MHz(), h_res, v_res)
        .hsync(10, 40, 20)
        .vsync(10, 10, 10);

    RgbPanelConfig::new(timings).pins(pins())
}

pub fn create_with(
    config: &RgbPanelConfig,
    platform: MockPlatform,
) -> Result<(TestPanel, Recorder, Arc<PlatformStats>)> {
    let recorder = Recorder::default();
    let stats = platform.stats.clone();

    let panel = RgbPanel::new(
        config,
        MockLcd(recorder.clone()),
        MockDma(recorder.clone()),
        platform,
    )?;

    Ok((panel, recorder, stats))
}

pub fn create(config: &RgbPanelConfig) -> (TestPanel, Recorder, Arc<PlatformStats>) {
    create_with(config, MockPlatform::new()).unwrap()
}

/// Copies of the frame buffers, for comparing against what the DMA sent.
pub fn snapshot(panel: &TestPanel, index: usize) -> Vec<u8> {
    let fbs = panel.frame_buffers();

    unsafe { fbs[index].as_slice() }.to_vec()
}

pub fn fill(panel: &TestPanel, index: usize, f: impl Fn(usize) -> u8) {
    let mut fbs = panel.frame_buffers();

    for (i, b) in unsafe { fbs[index].as_mut_slice() }.iter_mut().enumerate() {
        *b = f(i);
    }
}
