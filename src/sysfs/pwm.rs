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

use log::debug;

use super::{ensure_overlay, find_first_match, write_to_file, PATH_CAPEMGR_SLOTS};
use crate::arbiter::Arbiter;
use crate::error::{Error, Result};
use crate::module::{Configure, Module, ModuleKind, PwmModule};
use crate::pin::Pin;

/// Overlay and device directory for one PWM output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PwmChannel {
    /// Overlay that creates the channel's device directory.
    pub overlay: String,
    /// Glob pattern matching the device directory.
    pub device: String,
}

impl PwmChannel {
    /// Channel backed by the `bone_pwm_<name>` overlay on a BeagleBone,
    /// where `name` is a header position such as `P9_14`.
    pub fn beaglebone(name: &str) -> PwmChannel {
        PwmChannel {
            overlay: format!("bone_pwm_{}", name),
            device: format!("/sys/devices/ocp.*/pwm_test_{}.*", name),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SysfsPwmConfig {
    /// Glob pattern matching the cape manager slots file.
    pub slots: String,
    /// Overlay loaded when the module is enabled.
    pub base_overlay: Option<String>,
    pub pins: HashMap<Pin, PwmChannel>,
}

impl Default for SysfsPwmConfig {
    fn default() -> SysfsPwmConfig {
        SysfsPwmConfig {
            slots: String::from(PATH_CAPEMGR_SLOTS),
            base_overlay: Some(String::from("am33xx_pwm")),
            pins: HashMap::new(),
        }
    }
}

#[derive(Debug)]
struct OpenChannel {
    dir: PathBuf,
}

impl OpenChannel {
    fn write(&self, file: &str, value: &str) -> Result<()> {
        write_to_file(self.dir.join(file), value)
    }
}

/// PWM module driving overlay-created `pwm_test` devices.
///
/// A pin is claimed and its overlay loaded the first time it's enabled.
/// Period and duty cycle can only be set on pins that have been enabled
/// at least once.
#[derive(Debug)]
pub struct SysfsPwm {
    name: String,
    arbiter: Arbiter,
    config: Option<SysfsPwmConfig>,
    enabled: bool,
    open_pins: HashMap<Pin, OpenChannel>,
}

impl SysfsPwm {
    pub fn new(name: &str, arbiter: Arbiter) -> SysfsPwm {
        SysfsPwm {
            name: String::from(name),
            arbiter,
            config: None,
            enabled: false,
            open_pins: HashMap::new(),
        }
    }

    fn open(&mut self, pin: Pin) -> Result<()> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| Error::NotConfigured(self.name.clone()))?;
        let channel = config.pins.get(&pin).ok_or_else(|| Error::PinNotInModule {
            pin,
            module: self.name.clone(),
        })?;

        self.arbiter.assign(pin, &self.name)?;

        let dir = ensure_overlay(&config.slots, &channel.overlay)
            .and_then(|_| find_first_match(&channel.device));
        let dir = match dir {
            Ok(dir) => dir,
            Err(e) => {
                self.arbiter.release(pin);
                return Err(e);
            }
        };

        let open_channel = OpenChannel { dir };
        // Active-high, so duty is the time spent high
        if let Err(e) = open_channel.write("polarity", "0") {
            self.arbiter.release(pin);
            return Err(e);
        }

        debug!("Opened PWM pin {} at {}", pin, open_channel.dir.display());
        self.open_pins.insert(pin, open_channel);

        Ok(())
    }

    fn channel(&self, pin: Pin) -> Result<&OpenChannel> {
        if !self.enabled {
            return Err(Error::NotEnabled(self.name.clone()));
        }

        self.open_pins.get(&pin).ok_or(Error::PinNotConfigured(pin))
    }
}

impl Configure for SysfsPwm {
    type Config = SysfsPwmConfig;

    fn set_configuration(&mut self, config: SysfsPwmConfig) -> Result<()> {
        if !self.open_pins.is_empty() {
            return Err(Error::InvalidConfiguration(format!(
                "{} has open pins",
                self.name
            )));
        }

        self.config = Some(config);

        Ok(())
    }
}

impl Module for SysfsPwm {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::Pwm
    }

    fn enable(&mut self) -> Result<()> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| Error::NotConfigured(self.name.clone()))?;

        if let Some(ref overlay) = config.base_overlay {
            ensure_overlay(&config.slots, overlay)?;
        }

        self.enabled = true;

        Ok(())
    }

    fn disable(&mut self) -> Result<()> {
        // Outputs keep running; only the claims are dropped
        for (pin, _) in self.open_pins.drain() {
            self.arbiter.release(pin);
        }

        self.enabled = false;

        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl PwmModule for SysfsPwm {
    fn enable_pin(&mut self, pin: Pin, enabled: bool) -> Result<()> {
        if !self.enabled {
            return Err(Error::NotEnabled(self.name.clone()));
        }

        if !self.open_pins.contains_key(&pin) {
            if !enabled {
                return Ok(());
            }

            self.open(pin)?;
        }

        self.channel(pin)?
            .write("run", if enabled { "1" } else { "0" })
    }

    fn set_period(&mut self, pin: Pin, ns: u64) -> Result<()> {
        self.channel(pin)?.write("period", &ns.to_string())
    }

    fn set_duty(&mut self, pin: Pin, ns: u64) -> Result<()> {
        self.channel(pin)?.write("duty", &ns.to_string())
    }
}
