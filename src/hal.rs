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

//! `embedded-hal` trait implementations.
//!
//! A [`DigitalPin`] borrows [`Hardware`] for one GPIO pin, so
//! platform-agnostic drivers can use it as an input or output pin. The
//! pin's mode has to be set through [`Hardware::pin_mode`] first.
//!
//! This module is only included when the `hal` feature flag is enabled.

use embedded_hal::digital::{self, ErrorType, InputPin, OutputPin, StatefulOutputPin};

use crate::error::Error;
use crate::hardware::Hardware;
use crate::pin::{Level, Pin};

impl digital::Error for Error {
    fn kind(&self) -> digital::ErrorKind {
        digital::ErrorKind::Other
    }
}

/// A GPIO pin of a [`Hardware`] instance.
#[derive(Debug)]
pub struct DigitalPin<'a> {
    hardware: &'a mut Hardware,
    pin: Pin,
}

impl<'a> DigitalPin<'a> {
    /// Constructs a new `DigitalPin`.
    pub fn new(hardware: &'a mut Hardware, pin: Pin) -> DigitalPin<'a> {
        DigitalPin { hardware, pin }
    }

    /// Returns the pin index.
    pub fn pin(&self) -> Pin {
        self.pin
    }

    fn read(&self) -> Result<Level, Error> {
        self.hardware.digital_read(self.pin)
    }

    fn write(&mut self, level: Level) -> Result<(), Error> {
        self.hardware.digital_write(self.pin, level)
    }
}

impl ErrorType for DigitalPin<'_> {
    type Error = Error;
}

/// `InputPin` trait implementation for `embedded-hal` v1.0.0.
impl InputPin for DigitalPin<'_> {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.read()? == Level::High)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.read()? == Level::Low)
    }
}

/// `OutputPin` trait implementation for `embedded-hal` v1.0.0.
impl OutputPin for DigitalPin<'_> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write(Level::Low)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write(Level::High)
    }
}

/// `StatefulOutputPin` trait implementation for `embedded-hal` v1.0.0.
impl StatefulOutputPin for DigitalPin<'_> {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.read()? == Level::High)
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.read()? == Level::Low)
    }
}

/// `InputPin` trait implementation for `embedded-hal` v0.2.7.
impl embedded_hal_0::digital::v2::InputPin for DigitalPin<'_> {
    type Error = Error;

    fn is_high(&self) -> Result<bool, Self::Error> {
        Ok(self.read()? == Level::High)
    }

    fn is_low(&self) -> Result<bool, Self::Error> {
        Ok(self.read()? == Level::Low)
    }
}

/// `OutputPin` trait implementation for `embedded-hal` v0.2.7.
impl embedded_hal_0::digital::v2::OutputPin for DigitalPin<'_> {
    type Error = Error;

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write(Level::Low)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write(Level::High)
    }
}
