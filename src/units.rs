//! Frequency units.
//!
//! Type-safe wrappers for the clock rates the panel driver deals with, with
//! conversion between them and limited arithmetic support.
//!
//! # Usage
//!
//! ```
//! use esp_rgb_lcd::units::*;
//!
//! let pclk: Hertz = 16.MHz().into();
//! let source = Hertz(240_000_000);
//! assert_eq!(source / pclk, 15);
//! ```

use core::fmt;

pub type ValueType = u32;

pub trait Quantity: Sized {}
pub trait Frequency: Quantity + Into<Hertz> {}

/// defines and implements extension traits for quantities with units
macro_rules! define {
    ($( ($quantity: ident, $unit: ident, $print_unit: literal), )+) => {
        $(
            #[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Hash, Default)]
            pub struct $quantity(pub ValueType);

            impl Quantity for $quantity {}
            impl Frequency for $quantity {}
        )*

        pub trait FromValueType {
            $(
                #[allow(non_snake_case)]
                fn $unit(self) -> $quantity;
            )*
        }

        impl FromValueType for ValueType {
            $(
                fn $unit(self) -> $quantity {
                    $quantity(self)
                }
            )*
        }

        $(
            impl From<$quantity> for ValueType {
                fn from(x: $quantity) -> Self {
                    x.0
                }
            }

            impl From<ValueType> for $quantity {
                fn from(x: ValueType) -> $quantity {
                    $quantity(x)
                }
            }

            impl fmt::Debug for $quantity {
                fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                    write!(f, "{}{}", self.0, $print_unit)
                }
            }

            impl fmt::Display for $quantity {
                fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                    write!(f, "{}{}", self.0, $print_unit)
                }
            }

            impl core::ops::Div<ValueType> for $quantity {
                type Output = Self;
                fn div(self, rhs: ValueType) -> Self::Output {
                    $quantity(self.0 / rhs)
                }
            }

            impl core::ops::Mul<ValueType> for $quantity {
                type Output = Self;
                fn mul(self, rhs: ValueType) -> Self::Output {
                    $quantity(self.0 * rhs)
                }
            }

            impl core::ops::Div<$quantity> for $quantity {
                type Output = ValueType;
                fn div(self, rhs: Self) -> Self::Output {
                    self.0 / rhs.0
                }
            }
        )*
    };
}

/// defines From trait for pair of quantities with scaling
macro_rules! convert {
    ($( ($from: ty, $into: ty, $factor: expr) ),+) => {
        $(
        impl From<$from> for $into {
            fn from(x: $from) -> Self {
                Self(x.0 * $factor)
            }
        }
        )*
    };
}

#[rustfmt::skip::macros(define)]
define!(
    (Hertz,     Hz,  "Hz" ),
    (KiloHertz, kHz, "kHz"),
    (MegaHertz, MHz, "MHz"),
);

#[rustfmt::skip::macros(convert)]
convert!(
    (KiloHertz, Hertz,     1_000    ),
    (MegaHertz, Hertz,     1_000_000),
    (MegaHertz, KiloHertz, 1_000    )
);
