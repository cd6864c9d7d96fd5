//! The prelude.
//!
//! The types and extension traits needed to configure and drive a panel.
//! Import them with `use esp_rgb_lcd::prelude::*`.

pub use crate::units::*;

#[cfg(feature = "alloc")]
pub use crate::rgb::{
    RgbPanel, RgbPanelConfig, RgbPanelEventHandler, RgbPanelFlags, RgbPins, RgbTimingFlags,
    RgbTimings,
};

pub use crate::hal::{GdmaTxChannel, LcdLowLevel, Platform};
