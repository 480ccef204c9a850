// Copyright (c) 2017-2024 Rene van der Meer
//
// Permission is hereby granted, free of charge, to any person obtaining a
// copy of this software and associated documentation files (the "Software"),
// to deal in the Software without restriction, including without limitation
// the rights to use, copy, modify, merge, publish, distribute, sublicense,
// and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL
// THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
// FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
// DEALINGS IN THE SOFTWARE.

use std::error;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::result;

use crate::module::ModuleKind;
use crate::pin::{Mode, Pin};

/// Errors that can occur while accessing a board's pins and buses.
#[derive(Debug)]
pub enum Error {
    /// I/O error.
    ///
    /// Failed ioctl calls end up here as well, with the OS error code
    /// available through [`io::Error::raw_os_error`].
    Io(io::Error),
    /// No board driver was selected.
    ///
    /// Either the host couldn't be identified, or every matching board
    /// failed to initialize.
    NoDriver,
    /// The active driver doesn't provide the requested module.
    ModuleNotAvailable(ModuleKind),
    /// No pin with this name exists on the board.
    PinNotFound(String),
    /// The pin index is outside of the board's pin table.
    UnknownPin(Pin),
    /// The pin isn't handled by the named module.
    PinNotInModule { pin: Pin, module: String },
    /// The pin doesn't support the requested mode.
    ModeNotSupported { pin: Pin, mode: Mode },
    /// The pin is used before its mode was set.
    PinNotConfigured(Pin),
    /// The pin is written while set to one of the input modes.
    NotAnOutput(Pin),
    /// The pin is already owned by another module.
    AlreadyAssigned { pin: Pin, owner: String },
    /// The named module was enabled before it was configured.
    NotConfigured(String),
    /// The named module is used while disabled.
    NotEnabled(String),
    /// A configuration value was rejected.
    InvalidConfiguration(String),
    /// No file matched the glob pattern.
    NoMatchingPath(String),
    /// A sysfs file contained something other than the expected number.
    Parse { path: PathBuf, content: String },
    /// A register offset lies outside of the mapped memory window.
    RegisterOutOfRange(usize),
    /// Invalid or reserved I2C slave address.
    InvalidSlaveAddress(u16),
    /// An SMBus block transfer exceeded the 32 byte limit.
    BlockTooLarge(usize),
    /// The kernel transferred fewer bytes than requested.
    ShortTransfer { expected: usize, actual: usize },
    /// More pins or bits than a `u32` value can provide.
    TooManyPins(usize),
    /// No LED with this name exists on the board.
    UnknownLed(String),
    /// The LED trigger must be set to `none` before it can be switched.
    TriggerNotNone(String),
    /// The SPI module has no device for this slave select line.
    UnknownSlaveSelect(u8),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::Io(ref err) => write!(f, "I/O error: {}", err),
            Error::NoDriver => write!(f, "No board driver selected"),
            Error::ModuleNotAvailable(kind) => write!(f, "Driver has no {} module", kind),
            Error::PinNotFound(ref name) => write!(f, "Unknown pin name: {}", name),
            Error::UnknownPin(pin) => write!(f, "Unknown pin: {}", pin),
            Error::PinNotInModule { pin, ref module } => {
                write!(f, "Pin {} isn't handled by module {}", pin, module)
            }
            Error::ModeNotSupported { pin, mode } => {
                write!(f, "Pin {} doesn't support mode {}", pin, mode)
            }
            Error::PinNotConfigured(pin) => write!(f, "Pin {} is used before its mode was set", pin),
            Error::NotAnOutput(pin) => write!(f, "Pin {} isn't set to output", pin),
            Error::AlreadyAssigned { pin, ref owner } => {
                write!(f, "Pin {} is already assigned to module {}", pin, owner)
            }
            Error::NotConfigured(ref module) => write!(f, "Module {} isn't configured", module),
            Error::NotEnabled(ref module) => write!(f, "Module {} isn't enabled", module),
            Error::InvalidConfiguration(ref msg) => write!(f, "Invalid configuration: {}", msg),
            Error::NoMatchingPath(ref pattern) => write!(f, "No path matches {}", pattern),
            Error::Parse {
                ref path,
                ref content,
            } => write!(f, "Unexpected content in {}: {:?}", path.display(), content),
            Error::RegisterOutOfRange(offset) => {
                write!(f, "Register offset out of range: {:#x}", offset)
            }
            Error::InvalidSlaveAddress(address) => write!(f, "Invalid slave address: {}", address),
            Error::BlockTooLarge(len) => write!(f, "Block of {} bytes exceeds 32 bytes", len),
            Error::ShortTransfer { expected, actual } => write!(
                f,
                "Short transfer: expected {} bytes, got {}",
                expected, actual
            ),
            Error::TooManyPins(count) => write!(f, "Too many pins or bits: {}", count),
            Error::UnknownLed(ref name) => write!(f, "Unknown LED: {}", name),
            Error::TriggerNotNone(ref name) => {
                write!(f, "LED {} trigger must be set to none first", name)
            }
            Error::UnknownSlaveSelect(ss) => write!(f, "Unknown slave select: {}", ss),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::Io(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

/// Result type returned from methods that can have `boardio::Error`s.
pub type Result<T> = result::Result<T, Error>;
