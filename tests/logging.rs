mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Mutex};
use std::time::Duration;

use log::{Level, LevelFilter, Log, Metadata, Record};

use esp_rgb_lcd::units::FromValueType;

use common::*;

/// Checks, for every record, whether another thread can still enter a
/// critical section while the record is being logged
struct MaskCheckingLogger {
    records: Mutex<Vec<(Level, String)>>,
    logged_masked: AtomicUsize,
}

impl Log for MaskCheckingLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || {
            critical_section::with(|_| ());
            let _ = tx.send(());
        });

        if rx.recv_timeout(Duration::from_millis(100)).is_err() {
            self.logged_masked.fetch_add(1, Ordering::SeqCst);
        }

        self.records
            .lock()
            .unwrap()
            .push((record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}

static LOGGER: MaskCheckingLogger = MaskCheckingLogger {
    records: Mutex::new(Vec::new()),
    logged_masked: AtomicUsize::new(0),
};

#[test]
fn driver_never_logs_with_interrupts_masked() {
    log::set_logger(&LOGGER).unwrap();
    log::set_max_level(LevelFilter::Trace);

    let (panel, _, _) = create(&config(64, 32).double_fb(true));
    panel.init().unwrap();
    panel.set_pixel_clock(8.MHz()).unwrap();
    drop(panel);

    let records = LOGGER.records.lock().unwrap().clone();

    assert!(records
        .iter()
        .any(|(level, msg)| *level == Level::Trace && msg.contains("pclk change")));
    assert!(records.iter().any(|(_, msg)| msg.contains("del rgb panel")));
    assert_eq!(LOGGER.logged_masked.load(Ordering::SeqCst), 0);
}
