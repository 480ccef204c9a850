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

//! boardio provides uniform access to the GPIO pins, analog inputs, PWM
//! outputs, I2C and SPI buses, and LEDs of Linux single-board computers.
//!
//! Each supported board is described by a pin registry and a set of
//! modules. Pins are addressed by a board-independent index or by any of
//! their names, and every pin is owned by at most one module at a time.
//! Modules are served by one of several backends: memory-mapped GPIO
//! registers, the kernel's sysfs interfaces, or the I2C and SPI character
//! devices.
//!
//! Supported boards are the BeagleBone Black, the Raspberry Pi and the
//! Odroid C1 running a device tree kernel, as well as the original
//! BeagleBone through direct register access. A [`MockBoard`] without any
//! hardware is available for testing.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use boardio::{Hardware, Level, Mode};
//!
//! # fn main() -> boardio::Result<()> {
//! let mut hardware = Hardware::new();
//!
//! let led = hardware.pin_with_mode("P8.10", Mode::Output)?;
//! hardware.pulse(led, Level::High, Duration::from_millis(250))?;
//!
//! hardware.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! [`MockBoard`]: board::MockBoard

#[macro_use]
mod macros;

pub mod arbiter;
pub mod board;
pub mod capability;
pub mod cpuinfo;
pub mod driver;
mod error;
#[cfg(feature = "hal")]
pub mod hal;
pub mod hardware;
pub mod i2c;
pub mod module;
pub mod pin;
pub mod preassigned;
pub mod regmap;
pub mod spi;
pub mod sysfs;

pub use crate::arbiter::Arbiter;
pub use crate::capability::{Capabilities, Capability};
pub use crate::error::{Error, Result};
pub use crate::hardware::{map_range, u16_from_bytes, Hardware};
pub use crate::module::ModuleKind;
pub use crate::pin::{BitOrder, Level, Mode, Pin};
