//! Driver for parallel RGB LCD panels attached to the LCD_CAM peripheral.
//!
//! The driver owns the frame buffers, the GDMA descriptor rings feeding the
//! peripheral and, optionally, a pair of internal bounce buffers refilled
//! from PSRAM frame buffers. Register access and platform services are
//! reached through the traits in [`hal`], so the crate builds and is tested
//! on the host as well. The `esp32s3` feature adds the register-level
//! implementation of those traits for the ESP32-S3.
//!
//! See [`rgb::RgbPanel`] for the entry point.

#![cfg_attr(not(feature = "std"), no_std)]
#![allow(clippy::new_without_default)]

#[cfg(feature = "alloc")]
extern crate alloc;

pub mod clock;
pub mod dma;
pub mod errors;
#[cfg(feature = "esp32s3")]
pub mod esp32s3;
pub mod hal;
pub mod interrupt;
pub mod memory;
pub mod notification;
pub mod prelude;
#[cfg(feature = "alloc")]
pub mod rgb;
pub mod units;
