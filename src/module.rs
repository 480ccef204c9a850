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

//! Capability-specific module contracts.
//!
//! Every module is a service that claims pins through the driver's
//! [`Arbiter`] and is enabled and disabled independently. The backends
//! ([`regmap`], [`sysfs`], [`i2c`], [`spi`]) provide concrete types
//! implementing these traits.
//!
//! [`Arbiter`]: crate::arbiter::Arbiter
//! [`regmap`]: crate::regmap
//! [`sysfs`]: crate::sysfs
//! [`i2c`]: crate::i2c
//! [`spi`]: crate::spi

use std::fmt;

use crate::error::Result;
use crate::i2c::I2cDevice;
use crate::pin::{Level, Mode, Pin};

/// Module kinds a driver can provide.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum ModuleKind {
    Gpio,
    Analog,
    Pwm,
    I2c,
    Spi,
    Led,
    Preassigned,
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ModuleKind::Gpio => write!(f, "GPIO"),
            ModuleKind::Analog => write!(f, "analog"),
            ModuleKind::Pwm => write!(f, "PWM"),
            ModuleKind::I2c => write!(f, "I2C"),
            ModuleKind::Spi => write!(f, "SPI"),
            ModuleKind::Led => write!(f, "LED"),
            ModuleKind::Preassigned => write!(f, "preassigned"),
        }
    }
}

/// Behavior shared by all modules.
pub trait Module: fmt::Debug + Send {
    /// Returns the module's name, which is also its owner id for pin claims.
    fn name(&self) -> &str;

    fn kind(&self) -> ModuleKind;

    /// Performs one-time setup and claims the module's fixed pins.
    ///
    /// Fails with `NotConfigured` if no configuration was set.
    fn enable(&mut self) -> Result<()>;

    /// Releases every claimed pin and closes open resources.
    ///
    /// Safe to call more than once, and after a partially failed `enable`.
    fn disable(&mut self) -> Result<()>;

    fn is_enabled(&self) -> bool;
}

/// Stores backend parameters for a module.
///
/// `set_configuration` must be called before [`Module::enable`].
pub trait Configure {
    type Config;

    fn set_configuration(&mut self, config: Self::Config) -> Result<()>;
}

/// Digital input and output.
pub trait GpioModule: Module {
    /// Claims `pin` for this module and sets its direction.
    fn set_mode(&mut self, pin: Pin, mode: Mode) -> Result<()>;

    /// Fails with `PinNotConfigured` unless `set_mode` completed for `pin`.
    fn write(&mut self, pin: Pin, level: Level) -> Result<()>;

    /// Fails with `PinNotConfigured` unless `set_mode` completed for `pin`.
    fn read(&self, pin: Pin) -> Result<Level>;

    /// Releases a single pin and closes its handle.
    fn close_pin(&mut self, pin: Pin) -> Result<()>;
}

/// Analog sampling.
pub trait AnalogModule: Module {
    /// Returns the raw sample. Any scaling to a voltage is board specific
    /// and left to the caller.
    fn read(&mut self, pin: Pin) -> Result<u32>;
}

/// Pulse-width modulation. Times are in nanoseconds.
pub trait PwmModule: Module {
    fn enable_pin(&mut self, pin: Pin, enabled: bool) -> Result<()>;

    fn set_period(&mut self, pin: Pin, ns: u64) -> Result<()>;

    /// Sets the active-high time within one period. A duty longer than the
    /// period is passed to the hardware unchanged.
    fn set_duty(&mut self, pin: Pin, ns: u64) -> Result<()>;
}

/// An I2C bus.
pub trait I2cModule: Module {
    /// Returns a handle to the slave device at `address`.
    fn device(&self, address: u16) -> Result<I2cDevice>;
}

/// An SPI bus with one or more slave select lines.
pub trait SpiModule: Module {
    fn write(&mut self, slave_select: u8, data: &[u8]) -> Result<()>;

    /// Reads into `buffer`, returning the number of bytes read.
    fn read(&mut self, slave_select: u8, buffer: &mut [u8]) -> Result<usize>;
}

/// On-board LEDs controlled by a kernel driver.
pub trait LedModule: Module {
    fn led(&mut self, name: &str) -> Result<&mut dyn Led>;
}

/// A single on-board LED.
pub trait Led: fmt::Debug + Send {
    /// Sets the kernel trigger that drives the LED, for instance
    /// `heartbeat`, `mmc0` or `none`.
    fn set_trigger(&mut self, trigger: &str) -> Result<()>;

    /// Returns the trigger last set through this handle.
    fn trigger(&self) -> &str;

    /// Switches the LED on or off. Requires the trigger to be `none`.
    fn set_on(&mut self, on: bool) -> Result<()>;
}
