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
use crate::spi::{SpiBus, SpiConfig};
use crate::sysfs::{SysfsGpio, SysfsGpioConfig, SysfsLedConfig, SysfsLeds};

// Values of the Hardware line in /proc/cpuinfo
const SOCS: [&str; 9] = [
    "BCM2708",
    "BCM2835",
    "BCM2709",
    "BCM2836",
    "BCM2710",
    "BCM2837",
    "BCM2837A1",
    "BCM2837B0",
    "BCM2711",
];

/// Raspberry Pi with a device tree kernel, using the original 26-pin
/// header layout. Pin numbers are physical header positions.
#[derive(Debug, Default, Copy, Clone)]
pub struct RaspberryPi;

fn gpio(name: &str, number: u32) -> PinDefinition {
    PinDefinition::new(
        &[name],
        &[ModuleTag::Gpio],
        Capabilities::GPIO,
        Addressing::gpio(number),
    )
}

fn bus(name: &str, tag: ModuleTag) -> PinDefinition {
    PinDefinition::new(&[name], &[tag], Capabilities::NONE, Addressing::None)
}

impl RaspberryPi {
    fn registry() -> PinRegistry {
        PinRegistry::new(vec![
            PinDefinition::unassignable("null"),
            PinDefinition::unassignable("3.3v"),
            PinDefinition::unassignable("5v"),
            bus("sda", ModuleTag::I2c(0)),
            PinDefinition::unassignable("do-not-connect-1"),
            bus("scl", ModuleTag::I2c(0)),
            PinDefinition::unassignable("ground"),
            gpio("gpio4", 4),
            bus("txd", ModuleTag::Serial),
            PinDefinition::unassignable("do-not-connect-2"),
            bus("rxd", ModuleTag::Serial),
            gpio("gpio17", 17),
            gpio("gpio18", 18),
            gpio("gpio21", 21),
            PinDefinition::unassignable("do-not-connect-3"),
            gpio("gpio22", 22),
            gpio("gpio23", 23),
            PinDefinition::unassignable("do-not-connect-4"),
            gpio("gpio24", 24),
            bus("mosi", ModuleTag::Spi(0)),
            PinDefinition::unassignable("do-not-connect-5"),
            bus("miso", ModuleTag::Spi(0)),
            gpio("gpio25", 25),
            bus("sclk", ModuleTag::Spi(0)),
            bus("ce0n", ModuleTag::Spi(0)),
            PinDefinition::unassignable("do-not-connect-6"),
            bus("ce1n", ModuleTag::Spi(0)),
        ])
    }
}

impl Board for RaspberryPi {
    fn name(&self) -> &str {
        "Raspberry Pi"
    }

    fn matches(&self, cpuinfo: &CpuInfo) -> bool {
        cpuinfo
            .hardware()
            .map_or(false, |hardware| SOCS.iter().any(|soc| *soc == hardware))
    }

    fn init(&self, arbiter: &Arbiter) -> Result<Driver> {
        let registry = RaspberryPi::registry();

        let gpio_pins: HashMap<_, _> = registry
            .iter()
            .filter_map(|(pin, def)| def.addressing().kernel_gpio().map(|number| (pin, number)))
            .collect();

        let mut gpio = SysfsGpio::new("gpio", arbiter.clone());
        gpio.set_configuration(SysfsGpioConfig {
            pins: gpio_pins,
            ..Default::default()
        })?;
        gpio.enable()?;

        let mut led_config = SysfsLedConfig::default();
        led_config
            .leds
            .insert(String::from("led0"), String::from("led0"));
        let mut leds = SysfsLeds::new("leds");
        leds.set_configuration(led_config)?;
        leds.enable()?;

        let mut i2c = I2cBus::new("i2c1", arbiter.clone());
        i2c.set_configuration(I2cConfig {
            pins: registry.pins_with(ModuleTag::I2c(0)),
            ..Default::default()
        })?;
        enable_optional(&mut i2c);

        let mut spi = SpiBus::new("spi0", arbiter.clone());
        spi.set_configuration(SpiConfig {
            slave_selects: vec![0, 1],
            pins: registry.pins_with(ModuleTag::Spi(0)),
            ..Default::default()
        })?;
        enable_optional(&mut spi);

        let mut serial = PreassignedPins::new(
            "serial",
            registry.pins_with(ModuleTag::Serial),
            arbiter.clone(),
        );
        serial.enable()?;

        let modules = ModuleSet {
            gpio: Some(Box::new(gpio)),
            i2c: vec![Box::new(i2c)],
            spi: vec![Box::new(spi)],
            leds: Some(Box::new(leds)),
            preassigned: vec![serial],
            ..Default::default()
        };

        Ok(Driver::new(self.name(), registry, modules))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_registry() {
        let registry = RaspberryPi::registry();
        assert_eq!(registry.len(), 27);
        assert_eq!(registry.lookup("gpio17").unwrap(), 11);
        assert_eq!(registry.lookup("GPIO25").unwrap(), 22);
        assert_eq!(registry.pins_with(ModuleTag::I2c(0)), vec![3, 5]);
        assert_eq!(registry.pins_with(ModuleTag::Spi(0)), vec![19, 21, 23, 24, 26]);
        assert_eq!(registry.pins_with(ModuleTag::Serial), vec![8, 10]);
        assert_eq!(registry.get(12).unwrap().addressing().kernel_gpio(), Some(18));
    }

    #[test]
    fn init_claims_serial_pins() {
        let arbiter = Arbiter::new();
        let mut driver = RaspberryPi.init(&arbiter).unwrap();

        assert_eq!(driver.modules().i2c.len(), 1);
        assert_eq!(driver.modules().spi.len(), 1);
        assert_eq!(arbiter.owner(8).as_deref(), Some("serial"));
        assert_eq!(arbiter.owner(10).as_deref(), Some("serial"));

        driver.close().unwrap();
        assert!(!arbiter.is_assigned(8));
    }

    #[test]
    fn matches_broadcom_socs() {
        let pi = RaspberryPi;
        for soc in SOCS.iter() {
            let cpuinfo = CpuInfo::parse(&format!("processor\t: 0\nHardware\t: {}\n", soc));
            assert!(pi.matches(&cpuinfo));
        }
        assert!(!pi.matches(&CpuInfo::parse("processor\t: 0\nHardware\t: BCM2712\n")));
    }
}
