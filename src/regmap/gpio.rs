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
use std::sync::Arc;

use log::debug;

use super::{PinMux, RegisterBlock};
use crate::arbiter::Arbiter;
use crate::error::{Error, Result};
use crate::module::{Configure, GpioModule, Module, ModuleKind};
use crate::pin::{Level, Mode, Pin};

// GPIO bank registers, as word offsets from the bank base (AM335x TRM @ 25.4)
const GPIO_OE: usize = 0x134 >> 2;
const GPIO_DATAIN: usize = 0x138 >> 2;
const GPIO_CLEARDATAOUT: usize = 0x190 >> 2;
const GPIO_SETDATAOUT: usize = 0x194 >> 2;

// Pad configuration values written to the mux nodes
const CONF_GPIO_MODE: u32 = 0x07;
const CONF_RX_ACTIVE: u32 = 1 << 5;
const CONF_PULLUP: u32 = 1 << 4;
const CONF_PULLDOWN: u32 = 0x00;
const CONF_PULL_DISABLE: u32 = 1 << 3;

/// Location of one pin within a memory-mapped GPIO bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterPin {
    /// Word offset of the bank within the register window.
    pub port: usize,
    /// Line within the bank, 0-31.
    pub bit: u8,
    /// Name of the pad's mux node.
    pub mux: String,
}

impl RegisterPin {
    fn mask(&self) -> u32 {
        1 << (self.bit % 32)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegisterGpioConfig {
    pub pins: HashMap<Pin, RegisterPin>,
}

/// GPIO module driving the bank registers directly.
#[derive(Debug)]
pub struct RegisterGpio {
    name: String,
    arbiter: Arbiter,
    registers: Arc<dyn RegisterBlock>,
    mux: PinMux,
    config: Option<RegisterGpioConfig>,
    enabled: bool,
    modes: HashMap<Pin, Mode>,
}

impl RegisterGpio {
    pub fn new(
        name: &str,
        arbiter: Arbiter,
        registers: Arc<dyn RegisterBlock>,
        mux: PinMux,
    ) -> RegisterGpio {
        RegisterGpio {
            name: String::from(name),
            arbiter,
            registers,
            mux,
            config: None,
            enabled: false,
            modes: HashMap::new(),
        }
    }

    fn pin(&self, pin: Pin) -> Result<&RegisterPin> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| Error::NotConfigured(self.name.clone()))?;

        config.pins.get(&pin).ok_or_else(|| Error::PinNotInModule {
            pin,
            module: self.name.clone(),
        })
    }

    fn configured(&self, pin: Pin) -> Result<&RegisterPin> {
        if !self.modes.contains_key(&pin) {
            return Err(Error::PinNotConfigured(pin));
        }

        self.pin(pin)
    }
}

impl Configure for RegisterGpio {
    type Config = RegisterGpioConfig;

    fn set_configuration(&mut self, config: RegisterGpioConfig) -> Result<()> {
        for (pin, reg) in &config.pins {
            if reg.bit > 31 {
                return Err(Error::InvalidConfiguration(format!(
                    "pin {} uses bit {} of a 32-bit bank",
                    pin, reg.bit
                )));
            }
        }

        self.config = Some(config);

        Ok(())
    }
}

impl Module for RegisterGpio {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::Gpio
    }

    fn enable(&mut self) -> Result<()> {
        if self.config.is_none() {
            return Err(Error::NotConfigured(self.name.clone()));
        }

        self.enabled = true;

        Ok(())
    }

    fn disable(&mut self) -> Result<()> {
        for (pin, _) in self.modes.drain() {
            self.arbiter.release(pin);
        }
        self.enabled = false;

        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl GpioModule for RegisterGpio {
    fn set_mode(&mut self, pin: Pin, mode: Mode) -> Result<()> {
        if !self.enabled {
            return Err(Error::NotEnabled(self.name.clone()));
        }

        let reg = self.pin(pin)?.clone();

        if reg.port + GPIO_SETDATAOUT >= self.registers.len() {
            return Err(Error::RegisterOutOfRange(reg.port + GPIO_SETDATAOUT));
        }

        self.arbiter.assign(pin, &self.name)?;

        let result = match mode {
            Mode::Output => self.mux.set(&reg.mux, CONF_GPIO_MODE).map(|_| {
                self.registers.clear_bits(reg.port + GPIO_OE, reg.mask());
            }),
            _ => {
                let pull = match mode {
                    Mode::InputPullUp => CONF_PULLUP,
                    Mode::InputPullDown => CONF_PULLDOWN,
                    _ => CONF_PULL_DISABLE,
                };

                self.mux
                    .set(&reg.mux, CONF_GPIO_MODE | CONF_RX_ACTIVE | pull)
                    .map(|_| {
                        self.registers.set_bits(reg.port + GPIO_OE, reg.mask());
                    })
            }
        };

        if let Err(e) = result {
            if !self.modes.contains_key(&pin) {
                self.arbiter.release(pin);
            }

            return Err(e);
        }

        debug!("Pin {} ({}) set to {}", pin, reg.mux, mode);
        self.modes.insert(pin, mode);

        Ok(())
    }

    fn write(&mut self, pin: Pin, level: Level) -> Result<()> {
        let reg = self.configured(pin)?;
        if self.modes.get(&pin) != Some(&Mode::Output) {
            return Err(Error::NotAnOutput(pin));
        }

        let offset = match level {
            Level::Low => GPIO_CLEARDATAOUT,
            Level::High => GPIO_SETDATAOUT,
        };
        self.registers.write(reg.port + offset, reg.mask());

        Ok(())
    }

    fn read(&self, pin: Pin) -> Result<Level> {
        let reg = self.configured(pin)?;

        Ok(Level::from(
            self.registers.read(reg.port + GPIO_DATAIN) & reg.mask(),
        ))
    }

    fn close_pin(&mut self, pin: Pin) -> Result<()> {
        if self.modes.remove(&pin).is_some() {
            self.arbiter.release(pin);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regmap::RegisterArray;
    use std::fs;
    use std::path::Path;

    const BANK: usize = 0x100;

    fn setup(mux_dir: &Path) -> (RegisterGpio, Arc<RegisterArray>, Arbiter) {
        fs::write(mux_dir.join("gpmc_ad6"), "").unwrap();
        fs::write(mux_dir.join("gpmc_ad7"), "").unwrap();

        let regs = Arc::new(RegisterArray::new(BANK + 0x200));
        let arbiter = Arbiter::new();
        let mut gpio = RegisterGpio::new("gpio", arbiter.clone(), regs.clone(), PinMux::new(mux_dir));

        let mut pins = HashMap::new();
        pins.insert(
            0,
            RegisterPin {
                port: BANK,
                bit: 6,
                mux: String::from("gpmc_ad6"),
            },
        );
        pins.insert(
            1,
            RegisterPin {
                port: BANK,
                bit: 7,
                mux: String::from("gpmc_ad7"),
            },
        );
        pins.insert(
            2,
            RegisterPin {
                port: 0x10_0000,
                bit: 0,
                mux: String::from("gpmc_ad7"),
            },
        );
        gpio.set_configuration(RegisterGpioConfig { pins }).unwrap();
        gpio.enable().unwrap();

        (gpio, regs, arbiter)
    }

    #[test]
    fn output_mode_muxes_and_clears_output_enable() {
        let dir = tempfile::tempdir().unwrap();
        let (mut gpio, regs, arbiter) = setup(dir.path());
        regs.write(BANK + GPIO_OE, 0xffff_ffff);

        gpio.set_mode(0, Mode::Output).unwrap();

        assert_eq!(fs::read_to_string(dir.path().join("gpmc_ad6")).unwrap(), "7");
        assert_eq!(regs.read(BANK + GPIO_OE), !(1 << 6));
        assert_eq!(arbiter.owner(0).as_deref(), Some("gpio"));
    }

    #[test]
    fn input_modes_encode_pull_configuration() {
        let dir = tempfile::tempdir().unwrap();
        let (mut gpio, regs, _) = setup(dir.path());

        gpio.set_mode(1, Mode::InputPullUp).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("gpmc_ad7")).unwrap(), "37");
        assert_eq!(regs.read(BANK + GPIO_OE), 1 << 7);

        gpio.set_mode(1, Mode::InputPullDown).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("gpmc_ad7")).unwrap(), "27");

        gpio.set_mode(1, Mode::Input).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("gpmc_ad7")).unwrap(), "2f");
    }

    #[test]
    fn write_targets_set_and_clear_registers() {
        let dir = tempfile::tempdir().unwrap();
        let (mut gpio, regs, _) = setup(dir.path());
        gpio.set_mode(0, Mode::Output).unwrap();

        gpio.write(0, Level::High).unwrap();
        assert_eq!(regs.read(BANK + GPIO_SETDATAOUT), 1 << 6);

        gpio.write(0, Level::Low).unwrap();
        assert_eq!(regs.read(BANK + GPIO_CLEARDATAOUT), 1 << 6);
    }

    #[test]
    fn read_masks_data_in() {
        let dir = tempfile::tempdir().unwrap();
        let (mut gpio, regs, _) = setup(dir.path());
        gpio.set_mode(1, Mode::Input).unwrap();

        regs.write(BANK + GPIO_DATAIN, 1 << 6);
        assert_eq!(gpio.read(1).unwrap(), Level::Low);

        regs.write(BANK + GPIO_DATAIN, 1 << 7);
        assert_eq!(gpio.read(1).unwrap(), Level::High);

        assert!(matches!(gpio.write(1, Level::High), Err(Error::NotAnOutput(1))));
        assert_eq!(regs.read(BANK + GPIO_SETDATAOUT), 0);
    }

    #[test]
    fn unconfigured_and_out_of_range_pins_fail() {
        let dir = tempfile::tempdir().unwrap();
        let (mut gpio, _, arbiter) = setup(dir.path());

        assert!(matches!(gpio.read(0), Err(Error::PinNotConfigured(0))));
        assert!(matches!(
            gpio.write(1, Level::High),
            Err(Error::PinNotConfigured(1))
        ));
        assert!(matches!(
            gpio.set_mode(2, Mode::Output),
            Err(Error::RegisterOutOfRange(_))
        ));
        assert!(matches!(
            gpio.set_mode(9, Mode::Output),
            Err(Error::PinNotInModule { pin: 9, .. })
        ));
        assert!(!arbiter.is_assigned(2));
    }

    #[test]
    fn disable_releases_claimed_pins() {
        let dir = tempfile::tempdir().unwrap();
        let (mut gpio, _, arbiter) = setup(dir.path());
        gpio.set_mode(0, Mode::Output).unwrap();
        gpio.set_mode(1, Mode::Input).unwrap();

        gpio.close_pin(0).unwrap();
        assert!(!arbiter.is_assigned(0));

        gpio.disable().unwrap();
        gpio.disable().unwrap();
        assert!(!arbiter.is_assigned(1));
        assert!(matches!(gpio.read(1), Err(Error::PinNotConfigured(1))));
    }
}
