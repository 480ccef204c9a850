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

//! Logical pins and the per-board pin table.

use std::fmt;
use std::ops::Not;

use crate::capability::Capabilities;
use crate::error::{Error, Result};

/// Board-independent index of one externally exposed I/O line.
pub type Pin = u16;

/// Pin modes.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Mode {
    Input,
    Output,
    InputPullUp,
    InputPullDown,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Mode::Input => write!(f, "In"),
            Mode::Output => write!(f, "Out"),
            Mode::InputPullUp => write!(f, "InPullUp"),
            Mode::InputPullDown => write!(f, "InPullDown"),
        }
    }
}

/// Pin logic levels.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[repr(u8)]
pub enum Level {
    Low = 0,
    High = 1,
}

impl From<bool> for Level {
    fn from(e: bool) -> Level {
        if e {
            Level::High
        } else {
            Level::Low
        }
    }
}

impl From<u32> for Level {
    fn from(value: u32) -> Level {
        if value == 0 {
            Level::Low
        } else {
            Level::High
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Level::Low => write!(f, "Low"),
            Level::High => write!(f, "High"),
        }
    }
}

impl Not for Level {
    type Output = Level;

    fn not(self) -> Level {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }
}

/// Bit order used when shifting a value out over a data pin.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum BitOrder {
    MsbFirst,
    LsbFirst,
}

/// Modules that may claim a pin.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Hash)]
pub enum ModuleTag {
    Gpio,
    Analog,
    Pwm,
    /// I2C bus, by index into the driver's bus list.
    I2c(u8),
    /// SPI bus, by index into the driver's bus list.
    Spi(u8),
    Serial,
    Led,
    /// Power, ground and other pins no module may claim.
    Unassignable,
}

impl fmt::Display for ModuleTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ModuleTag::Gpio => write!(f, "gpio"),
            ModuleTag::Analog => write!(f, "analog"),
            ModuleTag::Pwm => write!(f, "pwm"),
            ModuleTag::I2c(bus) => write!(f, "i2c{}", bus),
            ModuleTag::Spi(bus) => write!(f, "spi{}", bus),
            ModuleTag::Serial => write!(f, "serial"),
            ModuleTag::Led => write!(f, "led"),
            ModuleTag::Unassignable => write!(f, "unassignable"),
        }
    }
}

/// Backend-specific addressing data for a pin.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Addressing {
    None,
    /// Memory-mapped GPIO bank.
    ///
    /// `port` is the 32-bit word offset of the bank within the mapping,
    /// `bit` the line within the bank, and `mux` the name of the pin
    /// multiplexer node for this pad.
    Register {
        port: usize,
        bit: u8,
        mux: &'static str,
    },
    /// Kernel logical numbers, as used by the sysfs interfaces.
    Kernel {
        gpio: Option<u32>,
        analog: Option<u32>,
    },
}

impl Addressing {
    pub fn gpio(number: u32) -> Addressing {
        Addressing::Kernel {
            gpio: Some(number),
            analog: None,
        }
    }

    pub fn analog(channel: u32) -> Addressing {
        Addressing::Kernel {
            gpio: None,
            analog: Some(channel),
        }
    }

    /// Returns the kernel GPIO number, if any.
    pub fn kernel_gpio(&self) -> Option<u32> {
        match *self {
            Addressing::Kernel { gpio, .. } => gpio,
            _ => None,
        }
    }

    /// Returns the kernel analog channel, if any.
    pub fn kernel_analog(&self) -> Option<u32> {
        match *self {
            Addressing::Kernel { analog, .. } => analog,
            _ => None,
        }
    }
}

/// One logical pin.
#[derive(Debug, Clone)]
pub struct PinDefinition {
    names: Vec<String>,
    modules: Vec<ModuleTag>,
    capabilities: Capabilities,
    addressing: Addressing,
}

impl PinDefinition {
    /// Constructs a new `PinDefinition`.
    ///
    /// The first entry of `names` is the canonical name.
    pub fn new(
        names: &[&str],
        modules: &[ModuleTag],
        capabilities: Capabilities,
        addressing: Addressing,
    ) -> PinDefinition {
        PinDefinition {
            names: names.iter().map(|name| String::from(*name)).collect(),
            modules: modules.to_vec(),
            capabilities,
            addressing,
        }
    }

    /// Constructs a pin that can't be claimed by any module.
    pub fn unassignable(name: &str) -> PinDefinition {
        PinDefinition::new(
            &[name],
            &[ModuleTag::Unassignable],
            Capabilities::NONE,
            Addressing::None,
        )
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn name(&self) -> &str {
        self.names.first().map(String::as_str).unwrap_or("")
    }

    pub fn modules(&self) -> &[ModuleTag] {
        &self.modules
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn addressing(&self) -> &Addressing {
        &self.addressing
    }

    pub fn used_by(&self, tag: ModuleTag) -> bool {
        self.modules.contains(&tag)
    }

    fn has_name(&self, name: &str) -> bool {
        self.names.iter().any(|n| n.eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for PinDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.names.join(", "), self.capabilities)
    }
}

/// Every pin of one board, indexed from 0.
///
/// A `PinRegistry` is built once during driver assembly and isn't modified
/// afterwards.
#[derive(Debug, Clone, Default)]
pub struct PinRegistry {
    pins: Vec<PinDefinition>,
}

impl PinRegistry {
    pub fn new(pins: Vec<PinDefinition>) -> PinRegistry {
        PinRegistry { pins }
    }

    /// Returns the pin with a name matching `name`, ignoring case.
    ///
    /// When more than one pin carries the name, the lowest index wins.
    pub fn lookup(&self, name: &str) -> Result<Pin> {
        self.pins
            .iter()
            .position(|def| def.has_name(name))
            .map(|index| index as Pin)
            .ok_or_else(|| Error::PinNotFound(String::from(name)))
    }

    pub fn get(&self, pin: Pin) -> Result<&PinDefinition> {
        self.pins.get(pin as usize).ok_or(Error::UnknownPin(pin))
    }

    /// Returns the canonical name of `pin`.
    pub fn name(&self, pin: Pin) -> Result<&str> {
        Ok(self.get(pin)?.name())
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Pin, &PinDefinition)> {
        self.pins
            .iter()
            .enumerate()
            .map(|(index, def)| (index as Pin, def))
    }

    /// Returns every pin that declares `tag`, in index order.
    pub fn pins_with(&self, tag: ModuleTag) -> Vec<Pin> {
        self.iter()
            .filter(|(_, def)| def.used_by(tag))
            .map(|(pin, _)| pin)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> PinRegistry {
        PinRegistry::new(vec![
            PinDefinition::unassignable("null"),
            PinDefinition::new(
                &["P8.3", "gpmc_ad6", "gpio1_6"],
                &[ModuleTag::Gpio],
                Capabilities::GPIO,
                Addressing::gpio(38),
            ),
            PinDefinition::new(
                &["P9.39", "AIN0"],
                &[ModuleTag::Analog],
                Capabilities::ANALOG_IN,
                Addressing::analog(0),
            ),
            PinDefinition::new(
                &["dup", "P8.3"],
                &[ModuleTag::Gpio],
                Capabilities::GPIO,
                Addressing::gpio(40),
            ),
        ])
    }

    #[test]
    fn every_alias_in_any_case_resolves_to_the_same_pin() {
        let registry = registry();

        for (pin, def) in registry.iter() {
            if pin == 3 {
                continue;
            }
            for name in def.names() {
                assert_eq!(registry.lookup(name).unwrap(), pin);
                assert_eq!(registry.lookup(&name.to_uppercase()).unwrap(), pin);
                assert_eq!(registry.lookup(&name.to_lowercase()).unwrap(), pin);
            }
        }
    }

    #[test]
    fn first_match_wins() {
        assert_eq!(registry().lookup("p8.3").unwrap(), 1);
        assert_eq!(registry().lookup("DUP").unwrap(), 3);
    }

    #[test]
    fn unknown_names_and_indices_fail() {
        let registry = registry();

        assert!(matches!(
            registry.lookup("P10.1"),
            Err(Error::PinNotFound(ref name)) if name == "P10.1"
        ));
        assert!(matches!(registry.get(4), Err(Error::UnknownPin(4))));
    }

    #[test]
    fn pins_with_filters_by_module() {
        let registry = registry();

        assert_eq!(registry.pins_with(ModuleTag::Gpio), vec![1, 3]);
        assert_eq!(registry.pins_with(ModuleTag::Analog), vec![2]);
        assert_eq!(registry.name(2).unwrap(), "P9.39");
        assert_eq!(registry.get(2).unwrap().addressing().kernel_analog(), Some(0));
    }

    #[test]
    fn level_negation() {
        assert_eq!(!Level::Low, Level::High);
        assert_eq!(!Level::High, Level::Low);
        assert_eq!(Level::from(0u32), Level::Low);
        assert_eq!(Level::from(0x40u32), Level::High);
    }
}
