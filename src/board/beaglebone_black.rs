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

use super::beaglebone::{Signal, HEADER};
use super::Board;
use crate::arbiter::Arbiter;
use crate::capability::Capabilities;
use crate::cpuinfo::CpuInfo;
use crate::driver::{enable_optional, Driver, ModuleSet};
use crate::error::Result;
use crate::module::{Configure, Module};
use crate::pin::{Addressing, ModuleTag, PinDefinition, PinRegistry};
use crate::sysfs::{
    ChannelDirectory, Overlay, PwmChannel, SysfsAnalog, SysfsAnalogConfig, SysfsGpio,
    SysfsGpioConfig, SysfsLedConfig, SysfsLeds, SysfsPwm, SysfsPwmConfig, PATH_CAPEMGR_SLOTS,
};

// Header pins wired to an eHRPWM or eCAP output
const PWM_PINS: [&str; 7] = ["P8.13", "P8.19", "P9.14", "P9.16", "P9.21", "P9.22", "P9.42"];

const ANALOG_OVERLAY: &str = "cape-bone-iio";
const ANALOG_CHANNELS: &str = "/sys/devices/ocp.*/helper.*/AIN0";

/// BeagleBone Black (or White) with a device tree kernel and the cape
/// manager.
///
/// GPIO and the user LEDs use sysfs. Analog inputs and PWM outputs need
/// their overlays, which are loaded on demand.
#[derive(Debug, Default, Copy, Clone)]
pub struct BeagleBoneBlack;

impl BeagleBoneBlack {
    fn registry() -> PinRegistry {
        let pins = HEADER
            .iter()
            .map(|header_pin| match header_pin.signal {
                Signal::Gpio { .. } => {
                    let gpio_name = header_pin.gpio_name().unwrap_or_default();
                    let number = header_pin.kernel_gpio().unwrap_or_default();

                    if PWM_PINS.contains(&header_pin.name) {
                        PinDefinition::new(
                            &[header_pin.name, header_pin.mux, gpio_name.as_str()],
                            &[ModuleTag::Gpio, ModuleTag::Pwm],
                            Capabilities::GPIO_PWM,
                            Addressing::gpio(number),
                        )
                    } else {
                        PinDefinition::new(
                            &[header_pin.name, header_pin.mux, gpio_name.as_str()],
                            &[ModuleTag::Gpio],
                            Capabilities::GPIO,
                            Addressing::gpio(number),
                        )
                    }
                }
                Signal::Analog(channel) => PinDefinition::new(
                    &[header_pin.name, header_pin.mux],
                    &[ModuleTag::Analog],
                    Capabilities::ANALOG_IN,
                    Addressing::analog(channel),
                ),
            })
            .collect();

        PinRegistry::new(pins)
    }
}

impl Board for BeagleBoneBlack {
    fn name(&self) -> &str {
        "BeagleBone Black"
    }

    fn matches(&self, cpuinfo: &CpuInfo) -> bool {
        cpuinfo
            .hardware()
            .map_or(false, |hardware| hardware.contains("AM33XX"))
    }

    fn init(&self, arbiter: &Arbiter) -> Result<Driver> {
        let registry = BeagleBoneBlack::registry();

        let mut gpio_pins = HashMap::new();
        let mut analog_pins = HashMap::new();
        let mut pwm_pins = HashMap::new();
        for (pin, def) in registry.iter() {
            if let Some(number) = def.addressing().kernel_gpio() {
                gpio_pins.insert(pin, number);
            }
            if let Some(channel) = def.addressing().kernel_analog() {
                analog_pins.insert(pin, channel);
            }
            if def.used_by(ModuleTag::Pwm) {
                pwm_pins.insert(pin, PwmChannel::beaglebone(&def.name().replace('.', "_")));
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
            overlay: Some(Overlay {
                slots: String::from(PATH_CAPEMGR_SLOTS),
                name: String::from(ANALOG_OVERLAY),
            }),
            channels: ChannelDirectory::Discover(String::from(ANALOG_CHANNELS)),
            file_prefix: String::from("AIN"),
            pins: analog_pins,
        })?;
        enable_optional(&mut analog);

        let mut pwm = SysfsPwm::new("pwm", arbiter.clone());
        pwm.set_configuration(SysfsPwmConfig {
            pins: pwm_pins,
            ..Default::default()
        })?;
        enable_optional(&mut pwm);

        let mut led_config = SysfsLedConfig::default();
        for n in 0..4 {
            led_config
                .leds
                .insert(format!("usr{}", n), format!("beaglebone:green:usr{}", n));
        }
        let mut leds = SysfsLeds::new("leds");
        leds.set_configuration(led_config)?;
        leds.enable()?;

        let modules = ModuleSet {
            gpio: Some(Box::new(gpio)),
            analog: Some(Box::new(analog)),
            pwm: Some(Box::new(pwm)),
            leds: Some(Box::new(leds)),
            ..Default::default()
        };

        Ok(Driver::new(self.name(), registry, modules))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Capability;

    #[test]
    fn header_registry() {
        let registry = BeagleBoneBlack::registry();
        assert_eq!(registry.len(), 72);

        assert_eq!(registry.lookup("P8.3").unwrap(), 0);
        assert_eq!(registry.lookup("gpmc_ad6").unwrap(), 0);
        assert_eq!(registry.get(0).unwrap().addressing().kernel_gpio(), Some(38));

        let p9_14 = registry.get(registry.lookup("P9.14").unwrap()).unwrap();
        assert!(p9_14.capabilities().contains(Capability::PwmOut));
        assert_eq!(p9_14.addressing().kernel_gpio(), Some(50));

        let ain4 = registry.get(registry.lookup("P9.33").unwrap()).unwrap();
        assert_eq!(ain4.addressing().kernel_analog(), Some(4));
        assert!(!ain4.capabilities().contains(Capability::Output));

        assert_eq!(registry.pins_with(ModuleTag::Pwm).len(), PWM_PINS.len());
        assert_eq!(registry.pins_with(ModuleTag::Analog).len(), 7);
    }

    #[test]
    fn matches_am33xx_only() {
        let black = BeagleBoneBlack;
        assert!(black.matches(&CpuInfo::parse(
            "processor\t: 0\nHardware\t: Generic AM33XX (Flattened Device Tree)\n"
        )));
        assert!(!black.matches(&CpuInfo::parse("processor\t: 0\nHardware\t: BCM2835\n")));
    }
}
