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

use crate::arbiter::Arbiter;
use crate::error::Result;
use crate::module::{Module, ModuleKind};
use crate::pin::Pin;

/// Holds pins that are owned by a kernel driver, such as the serial
/// console, so no other module can claim them.
#[derive(Debug)]
pub struct PreassignedPins {
    name: String,
    pins: Vec<Pin>,
    arbiter: Arbiter,
    enabled: bool,
}

impl PreassignedPins {
    pub fn new(name: &str, pins: Vec<Pin>, arbiter: Arbiter) -> PreassignedPins {
        PreassignedPins {
            name: String::from(name),
            pins,
            arbiter,
            enabled: false,
        }
    }

    pub fn pins(&self) -> &[Pin] {
        &self.pins
    }
}

impl Module for PreassignedPins {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::Preassigned
    }

    fn enable(&mut self) -> Result<()> {
        self.arbiter.assign_all(&self.pins, &self.name)?;
        self.enabled = true;

        Ok(())
    }

    fn disable(&mut self) -> Result<()> {
        if self.enabled {
            self.arbiter.release_all(&self.pins);
            self.enabled = false;
        }

        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_on_enable_and_releases_on_disable() {
        let arbiter = Arbiter::new();
        let mut serial = PreassignedPins::new("serial", vec![8, 10], arbiter.clone());

        serial.enable().unwrap();
        assert_eq!(arbiter.owner(8).as_deref(), Some("serial"));
        assert!(arbiter.assign(10, "gpio").is_err());

        serial.disable().unwrap();
        serial.disable().unwrap();
        assert!(!arbiter.is_assigned(8));
        assert!(!arbiter.is_assigned(10));
    }

    #[test]
    fn conflicting_enable_claims_nothing() {
        let arbiter = Arbiter::new();
        arbiter.assign(10, "gpio").unwrap();
        let mut serial = PreassignedPins::new("serial", vec![8, 10], arbiter.clone());

        assert!(serial.enable().is_err());
        assert!(!serial.is_enabled());
        assert!(!arbiter.is_assigned(8));

        serial.disable().unwrap();
        assert_eq!(arbiter.owner(10).as_deref(), Some("gpio"));
    }
}
