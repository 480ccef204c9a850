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
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::os::unix::fs::FileExt;
use std::path::PathBuf;

use log::{debug, warn};

use super::write_to_file;
use crate::arbiter::Arbiter;
use crate::error::{Error, Result};
use crate::module::{Configure, GpioModule, Module, ModuleKind};
use crate::pin::{Level, Mode, Pin};

pub const PATH_SYS_CLASS_GPIO: &str = "/sys/class/gpio";

#[derive(Debug, Clone)]
pub struct SysfsGpioConfig {
    /// Directory holding the `export` and `unexport` control files.
    pub root: PathBuf,
    /// Kernel GPIO number for each pin the module handles.
    pub pins: HashMap<Pin, u32>,
}

impl Default for SysfsGpioConfig {
    fn default() -> SysfsGpioConfig {
        SysfsGpioConfig {
            root: PathBuf::from(PATH_SYS_CLASS_GPIO),
            pins: HashMap::new(),
        }
    }
}

#[derive(Debug)]
struct OpenPin {
    gpio: u32,
    output: bool,
    value: File,
}

/// GPIO module using the sysfs export interface.
///
/// Each pin's `value` file is opened when its mode is set and kept open
/// until the pin is closed, so reads and writes only cost a seek and a
/// single byte transfer.
#[derive(Debug)]
pub struct SysfsGpio {
    name: String,
    arbiter: Arbiter,
    config: Option<SysfsGpioConfig>,
    enabled: bool,
    open_pins: HashMap<Pin, OpenPin>,
}

impl SysfsGpio {
    pub fn new(name: &str, arbiter: Arbiter) -> SysfsGpio {
        SysfsGpio {
            name: String::from(name),
            arbiter,
            config: None,
            enabled: false,
            open_pins: HashMap::new(),
        }
    }

    fn root(&self) -> Result<&PathBuf> {
        self.config
            .as_ref()
            .map(|config| &config.root)
            .ok_or_else(|| Error::NotConfigured(self.name.clone()))
    }

    fn open(&self, gpio: u32, mode: Mode) -> Result<File> {
        let root = self.root()?;
        let pin_dir = root.join(format!("gpio{}", gpio));

        // Only export if the pin isn't already exported
        if !pin_dir.exists() {
            write_to_file(root.join("export"), &gpio.to_string())?;
            debug!("Exported GPIO {}", gpio);
        }

        let direction = if mode == Mode::Output { "out" } else { "in" };
        write_to_file(pin_dir.join("direction"), direction)?;

        if mode == Mode::InputPullUp || mode == Mode::InputPullDown {
            debug!("GPIO {} pull resistor isn't configurable through sysfs", gpio);
        }

        let value = OpenOptions::new()
            .read(true)
            .write(mode == Mode::Output)
            .open(pin_dir.join("value"))?;

        Ok(value)
    }

    fn unexport(&self, gpio: u32) -> Result<()> {
        write_to_file(self.root()?.join("unexport"), &gpio.to_string())?;
        debug!("Unexported GPIO {}", gpio);

        Ok(())
    }
}

impl Configure for SysfsGpio {
    type Config = SysfsGpioConfig;

    fn set_configuration(&mut self, config: SysfsGpioConfig) -> Result<()> {
        if !self.open_pins.is_empty() {
            return Err(Error::InvalidConfiguration(format!(
                "module {} has open pins",
                self.name
            )));
        }

        self.config = Some(config);

        Ok(())
    }
}

impl Module for SysfsGpio {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::Gpio
    }

    // Pins are claimed on demand in set_mode
    fn enable(&mut self) -> Result<()> {
        if self.config.is_none() {
            return Err(Error::NotConfigured(self.name.clone()));
        }

        self.enabled = true;

        Ok(())
    }

    fn disable(&mut self) -> Result<()> {
        let mut result = Ok(());

        let pins: Vec<Pin> = self.open_pins.keys().copied().collect();
        for pin in pins {
            if let Err(e) = self.close_pin(pin) {
                warn!("Failed to close pin {}: {}", pin, e);
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }

        self.enabled = false;

        result
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl GpioModule for SysfsGpio {
    fn set_mode(&mut self, pin: Pin, mode: Mode) -> Result<()> {
        if !self.enabled {
            return Err(Error::NotEnabled(self.name.clone()));
        }

        let gpio = match self.config.as_ref().and_then(|c| c.pins.get(&pin)) {
            Some(gpio) => *gpio,
            None => {
                return Err(Error::PinNotInModule {
                    pin,
                    module: self.name.clone(),
                })
            }
        };

        self.arbiter.assign(pin, &self.name)?;

        match self.open(gpio, mode) {
            Ok(value) => {
                self.open_pins.insert(
                    pin,
                    OpenPin {
                        gpio,
                        output: mode == Mode::Output,
                        value,
                    },
                );
                Ok(())
            }
            Err(e) => {
                // Keep the claim only if an earlier set_mode still holds it
                if !self.open_pins.contains_key(&pin) {
                    self.arbiter.release(pin);
                }

                Err(e)
            }
        }
    }

    fn write(&mut self, pin: Pin, level: Level) -> Result<()> {
        let open_pin = self
            .open_pins
            .get_mut(&pin)
            .ok_or(Error::PinNotConfigured(pin))?;
        if !open_pin.output {
            return Err(Error::NotAnOutput(pin));
        }

        open_pin.value.seek(SeekFrom::Start(0))?;
        open_pin.value.write_all(match level {
            Level::Low => b"0",
            Level::High => b"1",
        })?;

        Ok(())
    }

    fn read(&self, pin: Pin) -> Result<Level> {
        let open_pin = self
            .open_pins
            .get(&pin)
            .ok_or(Error::PinNotConfigured(pin))?;

        let mut buffer = [0u8; 1];
        if open_pin.value.read_at(&mut buffer, 0)? == 0 {
            return Err(Error::Parse {
                path: self.root()?.join(format!("gpio{}/value", open_pin.gpio)),
                content: String::new(),
            });
        }

        Ok(Level::from(buffer[0] == b'1'))
    }

    fn close_pin(&mut self, pin: Pin) -> Result<()> {
        let open_pin = match self.open_pins.remove(&pin) {
            Some(open_pin) => open_pin,
            None => return Ok(()),
        };

        drop(open_pin.value);
        self.arbiter.release(pin);

        self.unexport(open_pin.gpio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn fake_sysfs(root: &Path, exported: &[u32]) {
        fs::write(root.join("export"), "").unwrap();
        fs::write(root.join("unexport"), "").unwrap();
        for gpio in exported {
            let dir = root.join(format!("gpio{}", gpio));
            fs::create_dir(&dir).unwrap();
            fs::write(dir.join("direction"), "in").unwrap();
            fs::write(dir.join("value"), "0\n").unwrap();
        }
    }

    fn gpio(root: &Path, arbiter: &Arbiter) -> SysfsGpio {
        let mut pins = HashMap::new();
        pins.insert(1, 38);
        pins.insert(2, 39);
        pins.insert(3, 66);

        let mut gpio = SysfsGpio::new("gpio", arbiter.clone());
        gpio.set_configuration(SysfsGpioConfig {
            root: root.to_path_buf(),
            pins,
        })
        .unwrap();
        gpio.enable().unwrap();

        gpio
    }

    #[test]
    fn enable_requires_configuration() {
        let mut gpio = SysfsGpio::new("gpio", Arbiter::new());

        assert!(matches!(gpio.enable(), Err(Error::NotConfigured(_))));
        assert!(matches!(
            gpio.set_mode(1, Mode::Output),
            Err(Error::NotEnabled(_))
        ));
    }

    #[test]
    fn output_writes_single_digit() {
        let dir = tempfile::tempdir().unwrap();
        fake_sysfs(dir.path(), &[38]);
        let arbiter = Arbiter::new();
        let mut gpio = gpio(dir.path(), &arbiter);

        gpio.set_mode(1, Mode::Output).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("gpio38/direction")).unwrap(), "out");
        assert_eq!(arbiter.owner(1).as_deref(), Some("gpio"));

        gpio.write(1, Level::High).unwrap();
        assert_eq!(&fs::read(dir.path().join("gpio38/value")).unwrap()[..1], b"1");
        assert_eq!(gpio.read(1).unwrap(), Level::High);

        gpio.write(1, Level::Low).unwrap();
        assert_eq!(&fs::read(dir.path().join("gpio38/value")).unwrap()[..1], b"0");
        assert_eq!(gpio.read(1).unwrap(), Level::Low);
    }

    #[test]
    fn input_reads_from_offset_zero() {
        let dir = tempfile::tempdir().unwrap();
        fake_sysfs(dir.path(), &[39]);
        let arbiter = Arbiter::new();
        let mut gpio = gpio(dir.path(), &arbiter);

        gpio.set_mode(2, Mode::InputPullUp).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("gpio39/direction")).unwrap(), "in");
        assert_eq!(gpio.read(2).unwrap(), Level::Low);

        fs::write(dir.path().join("gpio39/value"), "1\n").unwrap();
        assert_eq!(gpio.read(2).unwrap(), Level::High);
        assert!(matches!(gpio.write(2, Level::High), Err(Error::NotAnOutput(2))));
    }

    #[test]
    fn failed_export_releases_claim() {
        let dir = tempfile::tempdir().unwrap();
        fake_sysfs(dir.path(), &[]);
        let arbiter = Arbiter::new();
        let mut gpio = gpio(dir.path(), &arbiter);

        // The kernel would create gpio66/ here
        assert!(gpio.set_mode(3, Mode::Output).is_err());
        assert_eq!(fs::read_to_string(dir.path().join("export")).unwrap(), "66");
        assert!(!arbiter.is_assigned(3));
        assert!(matches!(gpio.read(3), Err(Error::PinNotConfigured(3))));
    }

    #[test]
    fn pin_owned_elsewhere_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        fake_sysfs(dir.path(), &[38]);
        let arbiter = Arbiter::new();
        arbiter.assign(1, "pwm").unwrap();
        let mut gpio = gpio(dir.path(), &arbiter);

        assert!(matches!(
            gpio.set_mode(1, Mode::Output),
            Err(Error::AlreadyAssigned { pin: 1, .. })
        ));
        assert!(matches!(
            gpio.set_mode(7, Mode::Output),
            Err(Error::PinNotInModule { pin: 7, .. })
        ));
    }

    #[test]
    fn disable_unexports_open_pins() {
        let dir = tempfile::tempdir().unwrap();
        fake_sysfs(dir.path(), &[38, 39]);
        let arbiter = Arbiter::new();
        let mut gpio = gpio(dir.path(), &arbiter);
        gpio.set_mode(1, Mode::Output).unwrap();

        gpio.disable().unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("unexport")).unwrap(), "38");
        assert!(!arbiter.is_assigned(1));
        assert!(!gpio.is_enabled());

        gpio.disable().unwrap();
    }
}
