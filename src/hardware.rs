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

//! Top-level access to the selected board.
//!
//! [`Hardware`] owns the pin [`Arbiter`] and the [`Driver`] of the board
//! it was created for, and routes every call to the module responsible
//! for the pin or bus. Nothing is global: independent `Hardware`
//! instances, each with their own driver, can coexist.
//!
//! ## Driver selection
//!
//! [`Hardware::new`] reads `/proc/cpuinfo` and selects the first
//! supported board that matches. If none matches, or the selected board
//! fails to initialize, `Hardware` is still returned, but every pin or
//! bus operation fails with [`Error::NoDriver`]. A board can also be
//! selected explicitly with [`Hardware::with_board`], which is the only
//! way to use the register-mapped [`BeagleBone`] driver or the
//! [`MockBoard`].
//!
//! [`BeagleBone`]: crate::board::BeagleBone
//! [`MockBoard`]: crate::board::MockBoard

use std::time::Duration;

use log::{info, warn};

use crate::arbiter::Arbiter;
use crate::board::{self, Board};
use crate::cpuinfo::CpuInfo;
use crate::driver::Driver;
use crate::error::{Error, Result};
use crate::module::{
    AnalogModule, GpioModule, I2cModule, Led, LedModule, Module, ModuleKind, PwmModule, SpiModule,
};
use crate::pin::{BitOrder, Level, Mode, Pin, PinRegistry};

/// Name that selects the driver's first I2C bus in [`Hardware::i2c`].
pub const DEFAULT_I2C: &str = "i2c";

/// Provides access to the pins and buses of the selected board.
#[derive(Debug)]
pub struct Hardware {
    arbiter: Arbiter,
    driver: Option<Driver>,
}

impl Hardware {
    /// Constructs a new `Hardware`, probing the host through `/proc/cpuinfo`.
    pub fn new() -> Hardware {
        let boards = board::candidates();
        let boards: Vec<&dyn Board> = boards.iter().map(|board| board.as_ref()).collect();

        match CpuInfo::new() {
            Ok(cpuinfo) => Hardware::detect(&cpuinfo, &boards),
            Err(e) => {
                warn!("Unable to read /proc/cpuinfo: {}", e);
                Hardware::without_driver()
            }
        }
    }

    /// Constructs a new `Hardware` for the first board in `boards` that
    /// matches `cpuinfo`.
    ///
    /// Only the first matching board is initialized. If its
    /// initialization fails, no driver is selected.
    pub fn detect(cpuinfo: &CpuInfo, boards: &[&dyn Board]) -> Hardware {
        let mut hardware = Hardware::without_driver();

        if let Some(board) = board::detect(cpuinfo, boards) {
            match board.init(&hardware.arbiter) {
                Ok(driver) => hardware.driver = Some(driver),
                Err(e) => warn!("Could not initialize {}: {}", board.name(), e),
            }
        }

        hardware
    }

    /// Constructs a new `Hardware` for `board`, skipping detection.
    pub fn with_board(board: &dyn Board) -> Result<Hardware> {
        let mut hardware = Hardware::without_driver();

        hardware.driver = Some(board.init(&hardware.arbiter)?);
        info!("Selected {}", board.name());

        Ok(hardware)
    }

    fn without_driver() -> Hardware {
        Hardware {
            arbiter: Arbiter::new(),
            driver: None,
        }
    }

    /// Returns the selected driver, if any.
    pub fn driver(&self) -> Option<&Driver> {
        self.driver.as_ref()
    }

    /// Returns the arbiter tracking pin ownership for this board.
    pub fn arbiter(&self) -> &Arbiter {
        &self.arbiter
    }

    fn driver_ref(&self) -> Result<&Driver> {
        self.driver.as_ref().ok_or(Error::NoDriver)
    }

    fn driver_mut(&mut self) -> Result<&mut Driver> {
        self.driver.as_mut().ok_or(Error::NoDriver)
    }

    fn gpio(&mut self) -> Result<&mut dyn GpioModule> {
        match self.driver_mut()?.modules_mut().gpio {
            Some(ref mut gpio) => Ok(gpio.as_mut()),
            None => Err(Error::ModuleNotAvailable(ModuleKind::Gpio)),
        }
    }

    fn gpio_ref(&self) -> Result<&dyn GpioModule> {
        match self.driver_ref()?.modules().gpio {
            Some(ref gpio) => Ok(gpio.as_ref()),
            None => Err(Error::ModuleNotAvailable(ModuleKind::Gpio)),
        }
    }

    fn analog(&mut self) -> Result<&mut dyn AnalogModule> {
        match self.driver_mut()?.modules_mut().analog {
            Some(ref mut analog) => Ok(analog.as_mut()),
            None => Err(Error::ModuleNotAvailable(ModuleKind::Analog)),
        }
    }

    fn pwm(&mut self) -> Result<&mut dyn PwmModule> {
        match self.driver_mut()?.modules_mut().pwm {
            Some(ref mut pwm) => Ok(pwm.as_mut()),
            None => Err(Error::ModuleNotAvailable(ModuleKind::Pwm)),
        }
    }

    fn leds(&mut self) -> Result<&mut dyn LedModule> {
        match self.driver_mut()?.modules_mut().leds {
            Some(ref mut leds) => Ok(leds.as_mut()),
            None => Err(Error::ModuleNotAvailable(ModuleKind::Led)),
        }
    }

    /// Returns the pin registry of the selected board.
    pub fn pins(&self) -> Result<&PinRegistry> {
        Ok(self.driver_ref()?.registry())
    }

    /// Returns the pin with a name matching `name`, ignoring case.
    pub fn pin(&self, name: &str) -> Result<Pin> {
        self.pins()?.lookup(name)
    }

    /// Returns the canonical name of `pin`.
    pub fn pin_name(&self, pin: Pin) -> Result<&str> {
        self.pins()?.name(pin)
    }

    /// Sets the mode of a GPIO pin, claiming it for the GPIO module.
    ///
    /// Returns `ModeNotSupported` if the pin's declared capabilities don't
    /// include `mode`.
    pub fn pin_mode(&mut self, pin: Pin, mode: Mode) -> Result<()> {
        let capabilities = self.pins()?.get(pin)?.capabilities();
        if !capabilities.supports(mode) {
            return Err(Error::ModeNotSupported { pin, mode });
        }

        self.gpio()?.set_mode(pin, mode)
    }

    /// Looks up `name` and sets the pin's mode.
    pub fn pin_with_mode(&mut self, name: &str, mode: Mode) -> Result<Pin> {
        let pin = self.pin(name)?;
        self.pin_mode(pin, mode)?;

        Ok(pin)
    }

    /// Releases a GPIO pin so other modules can claim it.
    pub fn close_pin(&mut self, pin: Pin) -> Result<()> {
        self.gpio()?.close_pin(pin)
    }

    pub fn digital_write(&mut self, pin: Pin, level: Level) -> Result<()> {
        self.gpio()?.write(pin, level)
    }

    pub fn digital_read(&self, pin: Pin) -> Result<Level> {
        self.gpio_ref()?.read(pin)
    }

    /// Drives `pin` to `active` for `duration`, starting and ending at the
    /// inactive level.
    ///
    /// The delay busy-waits near its end, so short pulses are reasonably
    /// accurate, but there are no real-time guarantees.
    pub fn pulse(&mut self, pin: Pin, active: Level, duration: Duration) -> Result<()> {
        let gpio = self.gpio()?;

        gpio.write(pin, !active)?;
        gpio.write(pin, active)?;
        spin_sleep::sleep(duration);
        gpio.write(pin, !active)
    }

    /// Returns the raw sample of an analog input pin.
    ///
    /// No scaling is applied. Resolution and reference voltage depend on
    /// the board.
    pub fn analog_read(&mut self, pin: Pin) -> Result<u32> {
        self.analog()?.read(pin)
    }

    pub fn pwm_enable(&mut self, pin: Pin, enabled: bool) -> Result<()> {
        self.pwm()?.enable_pin(pin, enabled)
    }

    /// Sets the PWM period in nanoseconds.
    pub fn pwm_set_period(&mut self, pin: Pin, ns: u64) -> Result<()> {
        self.pwm()?.set_period(pin, ns)
    }

    /// Sets the PWM duty cycle as the active time in nanoseconds.
    pub fn pwm_set_duty(&mut self, pin: Pin, ns: u64) -> Result<()> {
        self.pwm()?.set_duty(pin, ns)
    }

    /// Returns the I2C bus called `name`.
    ///
    /// [`DEFAULT_I2C`] selects the first bus of the driver.
    pub fn i2c(&self, name: &str) -> Result<&dyn I2cModule> {
        let buses = &self.driver_ref()?.modules().i2c;

        let bus = if name == DEFAULT_I2C {
            buses.first()
        } else {
            buses.iter().find(|bus| bus.name() == name)
        };

        match bus {
            Some(bus) => Ok(bus.as_ref()),
            None => Err(Error::ModuleNotAvailable(ModuleKind::I2c)),
        }
    }

    /// Returns the SPI bus called `name`.
    pub fn spi(&mut self, name: &str) -> Result<&mut dyn SpiModule> {
        let buses = &mut self.driver_mut()?.modules_mut().spi;

        match buses.iter_mut().find(|bus| bus.name() == name) {
            Some(bus) => Ok(bus.as_mut()),
            None => Err(Error::ModuleNotAvailable(ModuleKind::Spi)),
        }
    }

    /// Switches an LED on or off.
    ///
    /// The LED's trigger is set to `none` first, so the kernel stops
    /// driving it.
    pub fn led(&mut self, name: &str, on: bool) -> Result<()> {
        let led = self.leds()?.led(name)?;

        if led.trigger() != "none" {
            led.set_trigger("none")?;
        }

        led.set_on(on)
    }

    /// Shifts out the lowest 8 bits of `value`.
    pub fn shift_out(
        &mut self,
        data_pin: Pin,
        clock_pin: Pin,
        value: u32,
        order: BitOrder,
    ) -> Result<()> {
        self.shift_out_size(data_pin, clock_pin, value, order, 8)
    }

    /// Shifts out the lowest `bits` bits of `value` over a data and clock
    /// pin pair.
    ///
    /// Each bit is written to `data_pin`, followed by a high then low
    /// level on `clock_pin`. Both pins need to be configured as outputs.
    pub fn shift_out_size(
        &mut self,
        data_pin: Pin,
        clock_pin: Pin,
        value: u32,
        order: BitOrder,
        bits: u32,
    ) -> Result<()> {
        if bits > u32::BITS {
            return Err(Error::TooManyPins(bits as usize));
        }

        let gpio = self.gpio()?;
        let mut value = value;
        let mask = match bits {
            0 => 0,
            _ => 1 << (bits - 1),
        };

        for _ in 0..bits {
            let bit = match order {
                BitOrder::LsbFirst => {
                    let bit = value & 1;
                    value >>= 1;
                    bit
                }
                BitOrder::MsbFirst => {
                    let bit = value & mask;
                    value <<= 1;
                    bit
                }
            };

            gpio.write(data_pin, Level::from(bit))?;
            gpio.write(clock_pin, Level::High)?;
            gpio.write(clock_pin, Level::Low)?;
        }

        Ok(())
    }

    /// Writes `value` across `pins`, most significant bit first.
    ///
    /// The lowest `pins.len()` bits are used, so the last pin receives
    /// bit 0. At most 31 pins are supported.
    pub fn write_uint_to_pins(&mut self, value: u32, pins: &[Pin]) -> Result<()> {
        if pins.len() > 31 {
            return Err(Error::TooManyPins(pins.len()));
        }

        let gpio = self.gpio()?;
        let count = pins.len();
        for (index, &pin) in pins.iter().enumerate() {
            let bit = (value >> (count - 1 - index)) & 1;
            gpio.write(pin, Level::from(bit))?;
        }

        Ok(())
    }

    /// Disables every module of the driver, releasing all pins, open files
    /// and mappings.
    ///
    /// Calling `close` more than once is harmless. `close` is also called
    /// when `Hardware` goes out of scope.
    pub fn close(&mut self) -> Result<()> {
        match self.driver {
            Some(ref mut driver) => driver.close(),
            None => Ok(()),
        }
    }
}

impl Default for Hardware {
    fn default() -> Hardware {
        Hardware::new()
    }
}

impl Drop for Hardware {
    fn drop(&mut self) {
        // Failures were already logged by the driver
        let _ = self.close();
    }
}

/// Re-maps `value` from one range to another, as integer arithmetic.
///
/// Values outside of the source range aren't clamped. Returns `None` if
/// the source range is empty or an intermediate result overflows.
pub fn map_range(
    value: i64,
    from_low: i64,
    from_high: i64,
    to_low: i64,
    to_high: i64,
) -> Option<i64> {
    value
        .checked_sub(from_low)?
        .checked_mul(to_high.checked_sub(to_low)?)?
        .checked_div(from_high.checked_sub(from_low)?)?
        .checked_add(to_low)
}

/// Combines a high and a low byte into a 16-bit value.
pub fn u16_from_bytes(high: u8, low: u8) -> u16 {
    (u16::from(high) << 8) | u16::from(low)
}
