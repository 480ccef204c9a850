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

//! A board's pin registry and the modules serving it.

use log::{debug, warn};

use crate::error::Result;
use crate::module::{AnalogModule, GpioModule, I2cModule, LedModule, Module, PwmModule, SpiModule};
use crate::pin::PinRegistry;
use crate::preassigned::PreassignedPins;

/// Modules provided by a driver. Kinds the board doesn't support are left
/// empty.
#[derive(Debug, Default)]
pub struct ModuleSet {
    pub gpio: Option<Box<dyn GpioModule>>,
    pub analog: Option<Box<dyn AnalogModule>>,
    pub pwm: Option<Box<dyn PwmModule>>,
    /// I2C buses, indexed by the bus number in [`ModuleTag::I2c`].
    ///
    /// [`ModuleTag::I2c`]: crate::pin::ModuleTag::I2c
    pub i2c: Vec<Box<dyn I2cModule>>,
    /// SPI buses, indexed by the bus number in [`ModuleTag::Spi`].
    ///
    /// [`ModuleTag::Spi`]: crate::pin::ModuleTag::Spi
    pub spi: Vec<Box<dyn SpiModule>>,
    pub leds: Option<Box<dyn LedModule>>,
    pub preassigned: Vec<PreassignedPins>,
}

/// Enables `module`, logging instead of failing if it can't be enabled.
///
/// A module left disabled reports `NotEnabled` when used.
pub fn enable_optional<M: Module>(module: &mut M) {
    match module.enable() {
        Ok(()) => debug!("Enabled {} module {}", module.kind(), module.name()),
        Err(e) => warn!(
            "{} module {} unavailable: {}",
            module.kind(),
            module.name(),
            e
        ),
    }
}

/// Selected board support: the pin registry and its modules.
#[derive(Debug)]
pub struct Driver {
    name: String,
    registry: PinRegistry,
    modules: ModuleSet,
}

impl Driver {
    pub fn new(name: &str, registry: PinRegistry, modules: ModuleSet) -> Driver {
        Driver {
            name: String::from(name),
            registry,
            modules,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &PinRegistry {
        &self.registry
    }

    pub fn modules(&self) -> &ModuleSet {
        &self.modules
    }

    pub fn modules_mut(&mut self) -> &mut ModuleSet {
        &mut self.modules
    }

    /// Disables every module, releasing all pins and handles.
    ///
    /// Every module is disabled even if some fail. The first error is
    /// returned.
    pub fn close(&mut self) -> Result<()> {
        let modules = &mut self.modules;
        let mut results: Vec<(String, Result<()>)> = Vec::new();

        if let Some(ref mut gpio) = modules.gpio {
            results.push((gpio.name().to_owned(), gpio.disable()));
        }
        if let Some(ref mut analog) = modules.analog {
            results.push((analog.name().to_owned(), analog.disable()));
        }
        if let Some(ref mut pwm) = modules.pwm {
            results.push((pwm.name().to_owned(), pwm.disable()));
        }
        for i2c in modules.i2c.iter_mut() {
            results.push((i2c.name().to_owned(), i2c.disable()));
        }
        for spi in modules.spi.iter_mut() {
            results.push((spi.name().to_owned(), spi.disable()));
        }
        if let Some(ref mut leds) = modules.leds {
            results.push((leds.name().to_owned(), leds.disable()));
        }
        for preassigned in modules.preassigned.iter_mut() {
            results.push((preassigned.name().to_owned(), preassigned.disable()));
        }

        let mut first = Ok(());
        for (name, result) in results {
            if let Err(e) = result {
                warn!("Failed to disable {}: {}", name, e);
                if first.is_ok() {
                    first = Err(e);
                }
            }
        }

        debug!("Closed driver {}", self.name);

        first
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbiter::Arbiter;
    use crate::error::Error;
    use crate::module::{Configure, ModuleKind};
    use crate::pin::PinDefinition;
    use crate::sysfs::{SysfsGpio, SysfsGpioConfig};

    #[test]
    fn optional_enable_leaves_module_disabled() {
        let mut gpio = SysfsGpio::new("gpio", Arbiter::new());
        enable_optional(&mut gpio);
        assert!(!gpio.is_enabled());

        gpio.set_configuration(SysfsGpioConfig::default()).unwrap();
        enable_optional(&mut gpio);
        assert!(gpio.is_enabled());
        assert_eq!(gpio.kind(), ModuleKind::Gpio);
    }

    #[test]
    fn close_releases_everything() {
        let arbiter = Arbiter::new();
        let mut serial = PreassignedPins::new("serial", vec![1, 2], arbiter.clone());
        serial.enable().unwrap();

        let mut gpio = SysfsGpio::new("gpio", arbiter.clone());
        gpio.set_configuration(SysfsGpioConfig::default()).unwrap();
        gpio.enable().unwrap();

        let modules = ModuleSet {
            gpio: Some(Box::new(gpio)),
            preassigned: vec![serial],
            ..Default::default()
        };
        let registry = PinRegistry::new(vec![
            PinDefinition::unassignable("null"),
            PinDefinition::unassignable("txd"),
            PinDefinition::unassignable("rxd"),
        ]);
        let mut driver = Driver::new("test", registry, modules);

        assert!(arbiter.is_assigned(1));
        driver.close().unwrap();
        assert!(!arbiter.is_assigned(1));
        assert!(!arbiter.is_assigned(2));

        // Closing twice is harmless
        driver.close().unwrap();
        assert!(matches!(
            driver.modules_mut().gpio.as_mut().map(|gpio| gpio.read(0)),
            Some(Err(Error::PinNotConfigured(0)))
        ));
    }
}
