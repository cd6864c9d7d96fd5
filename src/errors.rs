use core::fmt;

/// Errors returned by the panel driver.
///
/// The variants follow the `ESP_ERR_*` codes the ESP-IDF LCD drivers report, so a
/// caller that already maps `esp_err_t` values can map these one-to-one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// Out of memory
    NoMem,
    /// Invalid argument
    InvalidArg,
    /// Invalid state
    InvalidState,
    /// Invalid size
    InvalidSize,
    /// Requested resource not found
    NotFound,
    /// Operation or feature not supported
    NotSupported,
}

pub type Result<T, E = Error> = core::result::Result<T, E>;

impl Error {
    /// The `esp_err_t` value ESP-IDF uses for the same condition.
    pub const fn code(&self) -> i32 {
        match self {
            Error::NoMem => 0x101,
            Error::InvalidArg => 0x102,
            Error::InvalidState => 0x103,
            Error::InvalidSize => 0x104,
            Error::NotFound => 0x105,
            Error::NotSupported => 0x106,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::NoMem => "out of memory",
            Error::InvalidArg => "invalid argument",
            Error::InvalidState => "invalid state",
            Error::InvalidSize => "invalid size",
            Error::NotFound => "resource not found",
            Error::NotSupported => "operation not supported",
        };

        write!(f, "{} (0x{:x})", msg, self.code())
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
