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
use std::fs::File;
use std::os::unix::fs::FileExt;
use std::path::PathBuf;

use log::debug;

use super::{ensure_overlay, find_first_match};
use crate::arbiter::Arbiter;
use crate::error::{Error, Result};
use crate::module::{AnalogModule, Configure, Module, ModuleKind};
use crate::pin::Pin;

/// A kernel overlay loaded through a cape manager slots file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overlay {
    /// Glob pattern matching the slots file.
    pub slots: String,
    /// Overlay name written to the slots file.
    pub name: String,
}

/// Where the per-channel sample files live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelDirectory {
    Fixed(PathBuf),
    /// Glob pattern matching one file inside the directory. The parent of
    /// the first match is used.
    Discover(String),
}

#[derive(Debug, Clone)]
pub struct SysfsAnalogConfig {
    pub overlay: Option<Overlay>,
    pub channels: ChannelDirectory,
    /// Sample file name without the channel number, e.g. `AIN` or
    /// `saradc_ch`.
    pub file_prefix: String,
    /// Analog channel for each pin the module handles.
    pub pins: HashMap<Pin, u32>,
}

/// Analog input module reading ADC samples from sysfs files.
#[derive(Debug)]
pub struct SysfsAnalog {
    name: String,
    arbiter: Arbiter,
    config: Option<SysfsAnalogConfig>,
    channel_dir: Option<PathBuf>,
    // Pins claimed by the last successful enable
    claimed: Vec<Pin>,
    open_pins: HashMap<Pin, File>,
}

impl SysfsAnalog {
    pub fn new(name: &str, arbiter: Arbiter) -> SysfsAnalog {
        SysfsAnalog {
            name: String::from(name),
            arbiter,
            config: None,
            channel_dir: None,
            claimed: Vec::new(),
            open_pins: HashMap::new(),
        }
    }

    fn sample_path(&self, pin: Pin) -> Result<PathBuf> {
        let (config, dir) = match (self.config.as_ref(), self.channel_dir.as_ref()) {
            (Some(config), Some(dir)) => (config, dir),
            _ => return Err(Error::NotEnabled(self.name.clone())),
        };

        let channel = config.pins.get(&pin).ok_or_else(|| Error::PinNotInModule {
            pin,
            module: self.name.clone(),
        })?;

        Ok(dir.join(format!("{}{}", config.file_prefix, channel)))
    }
}

impl Configure for SysfsAnalog {
    type Config = SysfsAnalogConfig;

    fn set_configuration(&mut self, config: SysfsAnalogConfig) -> Result<()> {
        if self.channel_dir.is_some() {
            return Err(Error::InvalidConfiguration(format!("{} is enabled", self.name)));
        }

        if config.file_prefix.is_empty() {
            return Err(Error::InvalidConfiguration(String::from(
                "analog sample file prefix is empty",
            )));
        }

        self.config = Some(config);

        Ok(())
    }
}

impl Module for SysfsAnalog {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::Analog
    }

    fn enable(&mut self) -> Result<()> {
        if self.channel_dir.is_some() {
            return Ok(());
        }

        let config = self
            .config
            .as_ref()
            .ok_or_else(|| Error::NotConfigured(self.name.clone()))?;

        if let Some(ref overlay) = config.overlay {
            ensure_overlay(&overlay.slots, &overlay.name)?;
        }

        let dir = match config.channels {
            ChannelDirectory::Fixed(ref dir) => dir.clone(),
            ChannelDirectory::Discover(ref pattern) => {
                let marker = find_first_match(pattern)?;
                marker
                    .parent()
                    .map(|dir| dir.to_path_buf())
                    .ok_or_else(|| Error::NoMatchingPath(pattern.clone()))?
            }
        };

        let mut pins: Vec<Pin> = config.pins.keys().copied().collect();
        pins.sort_unstable();
        self.arbiter.assign_all(&pins, &self.name)?;

        debug!("Analog channels of {} in {}", self.name, dir.display());
        self.channel_dir = Some(dir);
        self.claimed = pins;

        Ok(())
    }

    fn disable(&mut self) -> Result<()> {
        self.open_pins.clear();

        self.channel_dir = None;
        self.arbiter.release_all(&self.claimed);
        self.claimed.clear();

        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.channel_dir.is_some()
    }
}

impl AnalogModule for SysfsAnalog {
    fn read(&mut self, pin: Pin) -> Result<u32> {
        let path = self.sample_path(pin)?;

        if !self.open_pins.contains_key(&pin) {
            let file = File::open(&path)?;
            self.open_pins.insert(pin, file);
        }

        let file = self
            .open_pins
            .get(&pin)
            .ok_or(Error::PinNotConfigured(pin))?;

        // Samples are at most a handful of ASCII digits plus a newline
        let mut buffer = [0u8; 16];
        let len = file.read_at(&mut buffer, 0)?;
        let content = String::from_utf8_lossy(&buffer[..len]);

        content.trim().parse::<u32>().map_err(|_| Error::Parse {
            path,
            content: content.into_owned(),
        })
    }
}
