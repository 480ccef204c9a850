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

//! SPI buses through the `spidev` character devices.
//!
//! An [`SpiBus`] opens `/dev/spidevB.S` for each configured slave select
//! when it's enabled, and applies the configured mode, bit order, clock
//! speed and word size to every one of them. Transfers are plain
//! half-duplex reads and writes on the selected device.

use std::collections::HashMap;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;

use log::debug;

use crate::arbiter::Arbiter;
use crate::error::{Error, Result};
use crate::module::{Configure, Module, ModuleKind, SpiModule};
use crate::pin::{BitOrder, Pin};

mod ioctl;

pub const PATH_DEV: &str = "/dev";

/// SPI modes indicating the clock polarity and phase.
///
/// Select the appropriate SPI mode for your device. Each mode configures the
/// clock polarity (CPOL) and clock phase (CPHA) as shown below:
///
/// * Mode0: CPOL 0, CPHA 0
/// * Mode1: CPOL 0, CPHA 1
/// * Mode2: CPOL 1, CPHA 0
/// * Mode3: CPOL 1, CPHA 1
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum SpiMode {
    Mode0 = 0,
    Mode1 = ioctl::MODE_CPHA as isize,
    Mode2 = ioctl::MODE_CPOL as isize,
    Mode3 = (ioctl::MODE_CPOL | ioctl::MODE_CPHA) as isize,
}

impl fmt::Display for SpiMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mode{}", *self as u8)
    }
}

#[derive(Debug, Clone)]
pub struct SpiConfig {
    /// Directory holding the `spidevB.S` device nodes.
    pub dev_root: PathBuf,
    pub bus: u8,
    pub slave_selects: Vec<u8>,
    /// MOSI, MISO, SCLK and the slave select lines.
    pub pins: Vec<Pin>,
    pub mode: SpiMode,
    pub bit_order: BitOrder,
    /// Clock frequency in hertz (Hz).
    pub clock_speed: u32,
    pub bits_per_word: u8,
}

impl Default for SpiConfig {
    fn default() -> SpiConfig {
        SpiConfig {
            dev_root: PathBuf::from(PATH_DEV),
            bus: 0,
            slave_selects: vec![0],
            pins: Vec::new(),
            mode: SpiMode::Mode0,
            bit_order: BitOrder::MsbFirst,
            clock_speed: 1_000_000,
            bits_per_word: 8,
        }
    }
}

impl SpiConfig {
    fn device_path(&self, slave_select: u8) -> PathBuf {
        self.dev_root.join(format!("spidev{}.{}", self.bus, slave_select))
    }
}

/// SPI module owning one bus and its slave select devices.
#[derive(Debug)]
pub struct SpiBus {
    name: String,
    arbiter: Arbiter,
    config: Option<SpiConfig>,
    devices: HashMap<u8, File>,
    enabled: bool,
}

impl SpiBus {
    pub fn new(name: &str, arbiter: Arbiter) -> SpiBus {
        SpiBus {
            name: String::from(name),
            arbiter,
            config: None,
            devices: HashMap::new(),
            enabled: false,
        }
    }

    fn open(config: &SpiConfig, slave_select: u8) -> Result<File> {
        let path = config.device_path(slave_select);
        let spidev = OpenOptions::new().read(true).write(true).open(&path)?;
        let fd = spidev.as_raw_fd();

        let lsb_first = u8::from(config.bit_order == BitOrder::LsbFirst);

        unsafe {
            ioctl::set_mode(fd, config.mode as u8)?;
            ioctl::set_lsb_first(fd, lsb_first)?;
            ioctl::set_bits_per_word(fd, config.bits_per_word)?;
            ioctl::set_clock_speed(fd, config.clock_speed)?;
        }

        let mut mode = 0u8;
        let mut clock_speed = 0u32;
        unsafe {
            ioctl::mode(fd, &mut mode)?;
            ioctl::clock_speed(fd, &mut clock_speed)?;
        }

        debug!(
            "Opened {} (mode {:#04x}, {} Hz)",
            path.display(),
            mode,
            clock_speed
        );

        Ok(spidev)
    }

    fn device(&mut self, slave_select: u8) -> Result<&mut File> {
        if !self.enabled {
            return Err(Error::NotEnabled(self.name.clone()));
        }

        self.devices
            .get_mut(&slave_select)
            .ok_or(Error::UnknownSlaveSelect(slave_select))
    }
}

impl Configure for SpiBus {
    type Config = SpiConfig;

    fn set_configuration(&mut self, config: SpiConfig) -> Result<()> {
        if self.enabled {
            return Err(Error::InvalidConfiguration(format!("{} is enabled", self.name)));
        }

        if config.slave_selects.is_empty() {
            return Err(Error::InvalidConfiguration(String::from(
                "SPI bus needs at least one slave select",
            )));
        }

        if config.clock_speed == 0 || config.bits_per_word == 0 {
            return Err(Error::InvalidConfiguration(format!(
                "Invalid SPI clock speed {} Hz or word size {} bits",
                config.clock_speed, config.bits_per_word
            )));
        }

        self.config = Some(config);

        Ok(())
    }
}

impl Module for SpiBus {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::Spi
    }

    fn enable(&mut self) -> Result<()> {
        if self.enabled {
            return Ok(());
        }

        let config = self
            .config
            .as_ref()
            .ok_or_else(|| Error::NotConfigured(self.name.clone()))?;

        self.arbiter.assign_all(&config.pins, &self.name)?;

        let mut devices = HashMap::new();
        for &slave_select in &config.slave_selects {
            match SpiBus::open(config, slave_select) {
                Ok(spidev) => {
                    devices.insert(slave_select, spidev);
                }
                Err(e) => {
                    self.arbiter.release_all(&config.pins);
                    return Err(e);
                }
            }
        }

        self.devices = devices;
        self.enabled = true;

        Ok(())
    }

    fn disable(&mut self) -> Result<()> {
        if self.enabled {
            if let Some(ref config) = self.config {
                self.arbiter.release_all(&config.pins);
            }

            self.devices.clear();
            self.enabled = false;
        }

        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl SpiModule for SpiBus {
    fn write(&mut self, slave_select: u8, data: &[u8]) -> Result<()> {
        self.device(slave_select)?.write_all(data)?;

        Ok(())
    }

    fn read(&mut self, slave_select: u8, buffer: &mut [u8]) -> Result<usize> {
        Ok(self.device(slave_select)?.read(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn config(dev_root: PathBuf) -> SpiConfig {
        SpiConfig {
            dev_root,
            slave_selects: vec![0, 1],
            pins: vec![19, 21, 23, 24, 26],
            ..Default::default()
        }
    }

    #[test]
    fn mode_bits() {
        assert_eq!(SpiMode::Mode0 as u8, 0);
        assert_eq!(SpiMode::Mode1 as u8, 1);
        assert_eq!(SpiMode::Mode2 as u8, 2);
        assert_eq!(SpiMode::Mode3 as u8, 3);
        assert_eq!(SpiMode::Mode3.to_string(), "Mode3");
    }

    #[test]
    fn device_paths() {
        let config = SpiConfig {
            bus: 1,
            ..Default::default()
        };
        assert_eq!(config.device_path(2), PathBuf::from("/dev/spidev1.2"));
    }

    #[test]
    fn invalid_configurations_are_refused() {
        let mut spi = SpiBus::new("spi0", Arbiter::new());

        let no_ss = SpiConfig {
            slave_selects: Vec::new(),
            ..Default::default()
        };
        assert!(matches!(
            spi.set_configuration(no_ss),
            Err(Error::InvalidConfiguration(_))
        ));

        let no_clock = SpiConfig {
            clock_speed: 0,
            ..Default::default()
        };
        assert!(matches!(
            spi.set_configuration(no_clock),
            Err(Error::InvalidConfiguration(_))
        ));

        assert!(matches!(spi.enable(), Err(Error::NotConfigured(_))));
    }

    #[test]
    fn transfers_require_enable() {
        let mut spi = SpiBus::new("spi0", Arbiter::new());
        spi.set_configuration(SpiConfig::default()).unwrap();

        assert!(matches!(spi.write(0, &[1, 2]), Err(Error::NotEnabled(_))));
        assert!(matches!(
            spi.read(0, &mut [0u8; 2]),
            Err(Error::NotEnabled(_))
        ));
    }

    #[test]
    fn failed_open_releases_pins() {
        let dir = tempfile::tempdir().unwrap();
        let arbiter = Arbiter::new();
        let mut spi = SpiBus::new("spi0", arbiter.clone());
        spi.set_configuration(config(dir.path().to_path_buf()))
            .unwrap();

        assert!(matches!(spi.enable(), Err(Error::Io(_))));
        assert!(!arbiter.is_assigned(19));
        assert!(!spi.is_enabled());
    }

    #[test]
    fn regular_file_rejects_spidev_requests() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("spidev0.0"), "").unwrap();
        fs::write(dir.path().join("spidev0.1"), "").unwrap();
        let arbiter = Arbiter::new();
        let mut spi = SpiBus::new("spi0", arbiter.clone());
        spi.set_configuration(config(dir.path().to_path_buf()))
            .unwrap();

        match spi.enable() {
            Err(Error::Io(e)) => assert_eq!(e.raw_os_error(), Some(libc::ENOTTY)),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(!arbiter.is_assigned(26));
    }

    #[test]
    fn pins_owned_elsewhere_block_enable() {
        let arbiter = Arbiter::new();
        arbiter.assign(24, "gpio").unwrap();
        let mut spi = SpiBus::new("spi0", arbiter.clone());
        spi.set_configuration(config(PathBuf::from("/nonexistent")))
            .unwrap();

        assert!(matches!(spi.enable(), Err(Error::AlreadyAssigned { .. })));
        assert_eq!(arbiter.owner(24).as_deref(), Some("gpio"));
        assert!(!arbiter.is_assigned(19));
    }
}
