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

use super::write_to_file;
use crate::error::{Error, Result};
use crate::module::{Configure, Led, LedModule, Module, ModuleKind};

pub const PATH_SYS_CLASS_LEDS: &str = "/sys/class/leds";

#[derive(Debug, Clone)]
pub struct SysfsLedConfig {
    pub root: PathBuf,
    /// Lower-case LED name mapped to its directory under `root`.
    pub leds: HashMap<String, String>,
}

impl Default for SysfsLedConfig {
    fn default() -> SysfsLedConfig {
        SysfsLedConfig {
            root: PathBuf::from(PATH_SYS_CLASS_LEDS),
            leds: HashMap::new(),
        }
    }
}

/// An on-board LED controlled through `trigger` and `brightness`.
#[derive(Debug)]
pub struct SysfsLed {
    name: String,
    dir: PathBuf,
    trigger: String,
}

impl SysfsLed {
    fn new(name: String, dir: PathBuf) -> SysfsLed {
        SysfsLed {
            name,
            dir,
            trigger: String::new(),
        }
    }
}

impl Led for SysfsLed {
    fn set_trigger(&mut self, trigger: &str) -> Result<()> {
        write_to_file(self.dir.join("trigger"), trigger)?;
        self.trigger = String::from(trigger);

        Ok(())
    }

    fn trigger(&self) -> &str {
        &self.trigger
    }

    fn set_on(&mut self, on: bool) -> Result<()> {
        if self.trigger != "none" {
            return Err(Error::TriggerNotNone(self.name.clone()));
        }

        write_to_file(self.dir.join("brightness"), if on { "1" } else { "0" })
    }
}

/// LED module. LEDs aren't pins, so nothing is claimed.
#[derive(Debug)]
pub struct SysfsLeds {
    name: String,
    config: Option<SysfsLedConfig>,
    enabled: bool,
    leds: HashMap<String, SysfsLed>,
}

impl SysfsLeds {
    pub fn new(name: &str) -> SysfsLeds {
        SysfsLeds {
            name: String::from(name),
            config: None,
            enabled: false,
            leds: HashMap::new(),
        }
    }
}

impl Configure for SysfsLeds {
    type Config = SysfsLedConfig;

    fn set_configuration(&mut self, config: SysfsLedConfig) -> Result<()> {
        if let Some(name) = config.leds.keys().find(|name| name.to_lowercase() != **name) {
            return Err(Error::InvalidConfiguration(format!(
                "LED name {} isn't lower case",
                name
            )));
        }

        self.leds.clear();
        self.config = Some(config);

        Ok(())
    }
}

impl Module for SysfsLeds {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::Led
    }

    fn enable(&mut self) -> Result<()> {
        if self.config.is_none() {
            return Err(Error::NotConfigured(self.name.clone()));
        }

        self.enabled = true;

        Ok(())
    }

    fn disable(&mut self) -> Result<()> {
        self.leds.clear();
        self.enabled = false;

        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl LedModule for SysfsLeds {
    fn led(&mut self, name: &str) -> Result<&mut dyn Led> {
        if !self.enabled {
            return Err(Error::NotEnabled(self.name.clone()));
        }

        let key = name.to_lowercase();

        if !self.leds.contains_key(&key) {
            let dir = match self.config {
                Some(ref config) => match config.leds.get(&key) {
                    Some(dir) => config.root.join(dir),
                    None => return Err(Error::UnknownLed(String::from(name))),
                },
                None => return Err(Error::NotConfigured(self.name.clone())),
            };

            self.leds.insert(key.clone(), SysfsLed::new(key.clone(), dir));
        }

        match self.leds.get_mut(&key) {
            Some(led) => Ok(led),
            None => Err(Error::UnknownLed(String::from(name))),
        }
    }
}
