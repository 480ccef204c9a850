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

use std::collections::HashMap;
use std::path::PathBuf;

use super::Board;
use crate::arbiter::Arbiter;
use crate::capability::Capabilities;
use crate::cpuinfo::CpuInfo;
use crate::driver::{enable_optional, Driver, ModuleSet};
use crate::error::Result;
use crate::i2c::{I2cBus, I2cConfig};
use crate::module::{Configure, Module};
use crate::pin::{Addressing, ModuleTag, PinDefinition, PinRegistry};
use crate::preassigned::PreassignedPins;
use crate::sysfs::{ChannelDirectory, SysfsAnalog, SysfsAnalogConfig, SysfsGpio, SysfsGpioConfig};

const PATH_SARADC: &str = "/sys/class/saradc";

/// Odroid C1 with a 40-pin, mostly Raspberry Pi compatible header.
///
/// Two 10-bit ADC channels (1.8V max) are read through the SAR ADC driver,
/// and both I2C buses are exposed. SPI pins are reserved but there's no SPI
/// module.
#[derive(Debug, Default, Copy, Clone)]
pub struct OdroidC1;

fn gpio(number: u32) -> PinDefinition {
    let name = format!("gpio{}", number);
    PinDefinition::new(
        &[name.as_str()],
        &[ModuleTag::Gpio],
        Capabilities::GPIO,
        Addressing::gpio(number),
    )
}

fn bus(name: &str, tag: ModuleTag) -> PinDefinition {
    PinDefinition::new(&[name], &[tag], Capabilities::NONE, Addressing::None)
}

fn ain(name: &str, channel: u32) -> PinDefinition {
    PinDefinition::new(
        &[name],
        &[ModuleTag::Analog],
        Capabilities::ANALOG_IN,
        Addressing::analog(channel),
    )
}

impl OdroidC1 {
    fn registry() -> PinRegistry {
        PinRegistry::new(vec![
            PinDefinition::unassignable("dummy"),
            PinDefinition::unassignable("3.3v-1"),
            PinDefinition::unassignable("5v-1"),
            bus("sda1", ModuleTag::I2c(0)),
            PinDefinition::unassignable("5v-2"),
            bus("scl1", ModuleTag::I2c(0)),
            PinDefinition::unassignable("ground-1"),
            gpio(83),
            bus("txd", ModuleTag::Serial),
            PinDefinition::unassignable("ground-2"),
            bus("rxd", ModuleTag::Serial),
            gpio(88),
            gpio(87),
            gpio(116),
            PinDefinition::unassignable("ground-3"),
            gpio(115),
            gpio(104),
            PinDefinition::unassignable("3.3v-2"),
            gpio(102),
            bus("mosi", ModuleTag::Spi(0)),
            PinDefinition::unassignable("ground-4"),
            bus("miso", ModuleTag::Spi(0)),
            gpio(103),
            bus("sclk", ModuleTag::Spi(0)),
            bus("ce0", ModuleTag::Spi(0)),
            PinDefinition::unassignable("ground-5"),
            gpio(118),
            bus("sda2", ModuleTag::I2c(1)),
            bus("scl2", ModuleTag::I2c(1)),
            gpio(101),
            PinDefinition::unassignable("ground-6"),
            gpio(100),
            gpio(99),
            gpio(108),
            PinDefinition::unassignable("ground-7"),
            gpio(97),
            gpio(98),
            ain("ain1", 1),
            PinDefinition::unassignable("1.8v"),
            PinDefinition::unassignable("ground-8"),
            ain("ain0", 0),
        ])
    }

    fn i2c_bus(name: &str, device: &str, pins: Vec<u16>, arbiter: &Arbiter) -> Result<I2cBus> {
        let mut i2c = I2cBus::new(name, arbiter.clone());
        i2c.set_configuration(I2cConfig {
            device: PathBuf::from(device),
            pins,
        })?;
        enable_optional(&mut i2c);

        Ok(i2c)
    }
}

impl Board for OdroidC1 {
    fn name(&self) -> &str {
        "Odroid C1"
    }

    // Board-wide keys follow the per-CPU blocks, so they end up with the
    // last CPU
    fn matches(&self, cpuinfo: &CpuInfo) -> bool {
        cpuinfo.hardware() == Some("ODROIDC")
    }

    fn init(&self, arbiter: &Arbiter) -> Result<Driver> {
        let registry = OdroidC1::registry();

        let mut gpio_pins = HashMap::new();
        let mut analog_pins = HashMap::new();
        for (pin, def) in registry.iter() {
            if let Some(number) = def.addressing().kernel_gpio() {
                gpio_pins.insert(pin, number);
            }
            if let Some(channel) = def.addressing().kernel_analog() {
                analog_pins.insert(pin, channel);
            }
        }

        let mut gpio = SysfsGpio::new("gpio", arbiter.clone());
        gpio.set_configuration(SysfsGpioConfig {
            pins: gpio_pins,
            ..Default::default()
        })?;
        gpio.enable()?;

        let mut analog = SysfsAnalog::new("analog", arbiter.clone());
        analog.set_configuration(SysfsAnalogConfig {
            overlay: None,
            channels: ChannelDirectory::Fixed(PathBuf::from(PATH_SARADC)),
            file_prefix: String::from("saradc_ch"),
            pins: analog_pins,
        })?;
        enable_optional(&mut analog);

        let i2ca = OdroidC1::i2c_bus(
            "i2ca",
            "/dev/i2c-1",
            registry.pins_with(ModuleTag::I2c(0)),
            arbiter,
        )?;
        let i2cb = OdroidC1::i2c_bus(
            "i2cb",
            "/dev/i2c-2",
            registry.pins_with(ModuleTag::I2c(1)),
            arbiter,
        )?;

        let mut serial = PreassignedPins::new(
            "serial",
            registry.pins_with(ModuleTag::Serial),
            arbiter.clone(),
        );
        serial.enable()?;

        let modules = ModuleSet {
            gpio: Some(Box::new(gpio)),
            analog: Some(Box::new(analog)),
            i2c: vec![Box::new(i2ca), Box::new(i2cb)],
            preassigned: vec![serial],
            ..Default::default()
        };

        Ok(Driver::new(self.name(), registry, modules))
    }
}
