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

//! In-memory board for tests and for exercising code without hardware.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use log::trace;

use super::Board;
use crate::arbiter::Arbiter;
use crate::capability::Capabilities;
use crate::cpuinfo::CpuInfo;
use crate::driver::{Driver, ModuleSet};
use crate::error::{Error, Result};
use crate::module::{AnalogModule, GpioModule, Led, LedModule, Module, ModuleKind};
use crate::pin::{Addressing, Level, Mode, ModuleTag, Pin, PinDefinition, PinRegistry};

/// Every level written through the mock GPIO module, in order.
pub type WriteLog = Arc<Mutex<Vec<(Pin, Level)>>>;

const GPIO_PINS: Pin = 10;
const ANALOG_PINS: [Pin; 2] = [10, 11];
const LED_NAMES: [&str; 2] = ["led0", "led1"];

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
struct State {
    inputs: Mutex<HashMap<Pin, Level>>,
    samples: Mutex<HashMap<Pin, u32>>,
    leds: Mutex<HashMap<String, bool>>,
}

/// A board with 12 pins and no hardware behind them.
///
/// Pins 0 through 9 are GPIO pins, except pin 1 is input-only and pin 2 is
/// output-only. Pins 10 and 11 are analog inputs. Two LEDs, `led0` and
/// `led1`, are available.
///
/// Input levels and analog samples can be seeded before or after
/// [`init`](Board::init), and written levels are recorded in a shared
/// [`WriteLog`]. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct MockBoard {
    state: Arc<State>,
    writes: WriteLog,
}

impl MockBoard {
    pub fn new() -> MockBoard {
        MockBoard::default()
    }

    /// Sets the level returned when reading `pin` before anything was
    /// written to it.
    pub fn set_input(&self, pin: Pin, level: Level) {
        lock(&self.state.inputs).insert(pin, level);
    }

    /// Sets the raw sample returned by an analog read on `pin`.
    pub fn set_analog(&self, pin: Pin, value: u32) {
        lock(&self.state.samples).insert(pin, value);
    }

    /// Returns the shared write log.
    pub fn write_log(&self) -> WriteLog {
        self.writes.clone()
    }

    /// Returns a copy of every level written so far.
    pub fn writes(&self) -> Vec<(Pin, Level)> {
        lock(&self.writes).clone()
    }

    /// Returns whether the LED is currently switched on.
    pub fn led_on(&self, name: &str) -> Option<bool> {
        lock(&self.state.leds).get(name).copied()
    }

    fn registry() -> PinRegistry {
        let mut pins = Vec::new();

        for pin in 0..GPIO_PINS {
            let capabilities = match pin {
                1 => Capabilities::INPUT_ONLY,
                2 => Capabilities::OUTPUT_ONLY,
                _ => Capabilities::GPIO,
            };
            let name = format!("gpio{}", pin);
            pins.push(PinDefinition::new(
                &[name.as_str()],
                &[ModuleTag::Gpio],
                capabilities,
                Addressing::gpio(u32::from(pin)),
            ));
        }

        for (channel, _) in ANALOG_PINS.iter().enumerate() {
            let name = format!("ain{}", channel);
            pins.push(PinDefinition::new(
                &[name.as_str()],
                &[ModuleTag::Analog],
                Capabilities::ANALOG_IN,
                Addressing::analog(channel as u32),
            ));
        }

        PinRegistry::new(pins)
    }
}

impl Board for MockBoard {
    fn name(&self) -> &str {
        "Mock"
    }

    // Only ever selected explicitly
    fn matches(&self, _cpuinfo: &CpuInfo) -> bool {
        false
    }

    fn init(&self, arbiter: &Arbiter) -> Result<Driver> {
        let registry = MockBoard::registry();

        let mut gpio = MockGpio {
            name: String::from("gpio"),
            arbiter: arbiter.clone(),
            pins: registry.pins_with(ModuleTag::Gpio),
            state: self.state.clone(),
            writes: self.writes.clone(),
            enabled: false,
            modes: HashMap::new(),
            outputs: HashMap::new(),
        };
        gpio.enable()?;

        let mut analog = MockAnalog {
            name: String::from("analog"),
            arbiter: arbiter.clone(),
            pins: registry.pins_with(ModuleTag::Analog),
            state: self.state.clone(),
            enabled: false,
        };
        analog.enable()?;

        let mut leds = MockLeds {
            state: self.state.clone(),
            enabled: false,
            leds: HashMap::new(),
        };
        leds.enable()?;

        let modules = ModuleSet {
            gpio: Some(Box::new(gpio)),
            analog: Some(Box::new(analog)),
            leds: Some(Box::new(leds)),
            ..Default::default()
        };

        Ok(Driver::new(self.name(), registry, modules))
    }
}

#[derive(Debug)]
struct MockGpio {
    name: String,
    arbiter: Arbiter,
    pins: Vec<Pin>,
    state: Arc<State>,
    writes: WriteLog,
    enabled: bool,
    modes: HashMap<Pin, Mode>,
    outputs: HashMap<Pin, Level>,
}

impl Module for MockGpio {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::Gpio
    }

    fn enable(&mut self) -> Result<()> {
        self.enabled = true;

        Ok(())
    }

    fn disable(&mut self) -> Result<()> {
        let pins: Vec<Pin> = self.modes.keys().copied().collect();
        for pin in pins {
            self.close_pin(pin)?;
        }
        self.enabled = false;

        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl GpioModule for MockGpio {
    fn set_mode(&mut self, pin: Pin, mode: Mode) -> Result<()> {
        if !self.enabled {
            return Err(Error::NotEnabled(self.name.clone()));
        }
        if !self.pins.contains(&pin) {
            return Err(Error::PinNotInModule {
                pin,
                module: self.name.clone(),
            });
        }

        self.arbiter.assign(pin, &self.name)?;
        self.modes.insert(pin, mode);
        if mode != Mode::Output {
            self.outputs.remove(&pin);
        }
        trace!("Mock pin {} set to {}", pin, mode);

        Ok(())
    }

    fn write(&mut self, pin: Pin, level: Level) -> Result<()> {
        match self.modes.get(&pin) {
            Some(Mode::Output) => (),
            Some(_) => return Err(Error::NotAnOutput(pin)),
            None => return Err(Error::PinNotConfigured(pin)),
        }

        self.outputs.insert(pin, level);
        lock(&self.writes).push((pin, level));

        Ok(())
    }

    fn read(&self, pin: Pin) -> Result<Level> {
        if !self.modes.contains_key(&pin) {
            return Err(Error::PinNotConfigured(pin));
        }

        if let Some(level) = self.outputs.get(&pin) {
            return Ok(*level);
        }

        Ok(lock(&self.state.inputs)
            .get(&pin)
            .copied()
            .unwrap_or(Level::Low))
    }

    fn close_pin(&mut self, pin: Pin) -> Result<()> {
        if self.modes.remove(&pin).is_some() {
            self.outputs.remove(&pin);
            self.arbiter.release(pin);
        }

        Ok(())
    }
}

#[derive(Debug)]
struct MockAnalog {
    name: String,
    arbiter: Arbiter,
    pins: Vec<Pin>,
    state: Arc<State>,
    enabled: bool,
}

impl Module for MockAnalog {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::Analog
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

impl AnalogModule for MockAnalog {
    fn read(&mut self, pin: Pin) -> Result<u32> {
        if !self.enabled {
            return Err(Error::NotEnabled(self.name.clone()));
        }
        if !self.pins.contains(&pin) {
            return Err(Error::PinNotInModule {
                pin,
                module: self.name.clone(),
            });
        }

        Ok(lock(&self.state.samples).get(&pin).copied().unwrap_or(0))
    }
}

#[derive(Debug)]
struct MockLed {
    name: String,
    trigger: String,
    state: Arc<State>,
}

impl Led for MockLed {
    fn set_trigger(&mut self, trigger: &str) -> Result<()> {
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

        lock(&self.state.leds).insert(self.name.clone(), on);

        Ok(())
    }
}

#[derive(Debug)]
struct MockLeds {
    state: Arc<State>,
    enabled: bool,
    leds: HashMap<String, MockLed>,
}

impl Module for MockLeds {
    fn name(&self) -> &str {
        "leds"
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::Led
    }

    fn enable(&mut self) -> Result<()> {
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

impl LedModule for MockLeds {
    fn led(&mut self, name: &str) -> Result<&mut dyn Led> {
        if !self.enabled {
            return Err(Error::NotEnabled(String::from("leds")));
        }

        let name = name.to_lowercase();
        if !LED_NAMES.contains(&name.as_str()) {
            return Err(Error::UnknownLed(name));
        }

        let state = self.state.clone();
        let led: &mut dyn Led = self.leds.entry(name.clone()).or_insert_with(|| MockLed {
            name,
            trigger: String::from("heartbeat"),
            state,
        });

        Ok(led)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_layout() {
        let registry = MockBoard::registry();

        assert_eq!(registry.len(), 12);
        assert_eq!(registry.pins_with(ModuleTag::Gpio), (0..10).collect::<Vec<Pin>>());
        assert_eq!(registry.pins_with(ModuleTag::Analog), vec![10, 11]);
        assert!(!registry.get(1).unwrap().capabilities().supports(Mode::Output));
        assert!(!registry.get(2).unwrap().capabilities().supports(Mode::Input));
        assert_eq!(registry.lookup("AIN1").unwrap(), 11);
    }

    #[test]
    fn gpio_reads_back_writes_then_seeded_inputs() {
        let board = MockBoard::new();
        board.set_input(4, Level::High);

        let arbiter = Arbiter::new();
        let mut driver = board.init(&arbiter).unwrap();
        let gpio = driver.modules_mut().gpio.as_mut().unwrap();

        gpio.set_mode(4, Mode::Input).unwrap();
        assert_eq!(gpio.read(4).unwrap(), Level::High);
        assert!(matches!(gpio.write(4, Level::Low), Err(Error::NotAnOutput(4))));

        gpio.set_mode(3, Mode::Output).unwrap();
        gpio.write(3, Level::High).unwrap();
        assert_eq!(gpio.read(3).unwrap(), Level::High);
        assert_eq!(board.writes(), vec![(3, Level::High)]);

        board.set_input(3, Level::Low);
        gpio.set_mode(3, Mode::InputPullUp).unwrap();
        assert!(matches!(gpio.write(3, Level::High), Err(Error::NotAnOutput(3))));
        assert_eq!(gpio.read(3).unwrap(), Level::Low);
        assert_eq!(board.writes(), vec![(3, Level::High)]);
        assert_eq!(arbiter.owner(3).as_deref(), Some("gpio"));

        driver.close().unwrap();
        assert!(!arbiter.is_assigned(3));
    }

    #[test]
    fn analog_claims_its_pins_at_init() {
        let board = MockBoard::new();
        board.set_analog(11, 512);

        let arbiter = Arbiter::new();
        let mut driver = board.init(&arbiter).unwrap();

        assert_eq!(arbiter.owner(10).as_deref(), Some("analog"));
        let analog = driver.modules_mut().analog.as_mut().unwrap();
        assert_eq!(analog.read(11).unwrap(), 512);
        assert_eq!(analog.read(10).unwrap(), 0);
        assert!(matches!(analog.read(5), Err(Error::PinNotInModule { pin: 5, .. })));
    }

    #[test]
    fn led_requires_trigger_none() {
        let board = MockBoard::new();
        let mut driver = board.init(&Arbiter::new()).unwrap();
        let leds = driver.modules_mut().leds.as_mut().unwrap();

        let led = leds.led("LED0").unwrap();
        assert!(matches!(led.set_on(true), Err(Error::TriggerNotNone(_))));
        led.set_trigger("none").unwrap();
        led.set_on(true).unwrap();
        assert_eq!(board.led_on("led0"), Some(true));

        assert!(matches!(leds.led("led7"), Err(Error::UnknownLed(_))));
    }
}
