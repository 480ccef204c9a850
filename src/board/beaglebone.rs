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

//! BeagleBone on pre-device-tree kernels, driving the GPIO banks directly.
//!
//! The P8/P9 header table is shared with the device tree driver in
//! [`BeagleBoneBlack`](super::BeagleBoneBlack).

use std::collections::HashMap;
use std::sync::Arc;

use super::Board;
use crate::arbiter::Arbiter;
use crate::capability::Capabilities;
use crate::cpuinfo::CpuInfo;
use crate::driver::{Driver, ModuleSet};
use crate::error::Result;
use crate::module::{Configure, Module};
use crate::pin::{Addressing, ModuleTag, PinDefinition, PinRegistry};
use crate::regmap::{MemoryMap, PinMux, RegisterBlock, RegisterGpio, RegisterGpioConfig, RegisterPin};

// Physical window covering the L4 peripherals, including all GPIO banks
pub const MMAP_OFFSET: u32 = 0x44c0_0000;
pub const MMAP_SIZE: usize = (0x48ff_ffff - MMAP_OFFSET) as usize;

/// GPIO bank base addresses as word offsets into the mapped window.
pub const GPIO_BANKS: [usize; 4] = [
    ((0x44e0_7000 - MMAP_OFFSET) >> 2) as usize,
    ((0x4804_c000 - MMAP_OFFSET) >> 2) as usize,
    ((0x481a_c000 - MMAP_OFFSET) >> 2) as usize,
    ((0x481a_e000 - MMAP_OFFSET) >> 2) as usize,
];

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Signal {
    Gpio { port: u8, bit: u8 },
    Analog(u32),
}

/// One expansion header pin: position, mode 0 pad name and function.
#[derive(Debug, Copy, Clone)]
pub(crate) struct HeaderPin {
    pub name: &'static str,
    pub mux: &'static str,
    pub signal: Signal,
}

impl HeaderPin {
    /// `GPIOn_m` alias of a GPIO pin.
    pub fn gpio_name(&self) -> Option<String> {
        match self.signal {
            Signal::Gpio { port, bit } => Some(format!("GPIO{}_{}", port, bit)),
            Signal::Analog(_) => None,
        }
    }

    /// Kernel GPIO number: 32 lines per bank.
    pub fn kernel_gpio(&self) -> Option<u32> {
        match self.signal {
            Signal::Gpio { port, bit } => Some(u32::from(port) * 32 + u32::from(bit)),
            Signal::Analog(_) => None,
        }
    }
}

const fn gpio(name: &'static str, mux: &'static str, port: u8, bit: u8) -> HeaderPin {
    HeaderPin {
        name,
        mux,
        signal: Signal::Gpio { port, bit },
    }
}

const fn ain(name: &'static str, mux: &'static str, channel: u32) -> HeaderPin {
    HeaderPin {
        name,
        mux,
        signal: Signal::Analog(channel),
    }
}

pub(crate) const HEADER: [HeaderPin; 72] = [
    gpio("P8.3", "gpmc_ad6", 1, 6),
    gpio("P8.4", "gpmc_ad7", 1, 7),
    gpio("P8.5", "gpmc_ad2", 1, 2),
    gpio("P8.6", "gpmc_ad3", 1, 3),
    gpio("P8.7", "gpmc_advn_ale", 2, 2),
    gpio("P8.8", "gpmc_oen_ren", 2, 3),
    gpio("P8.9", "gpmc_ben0_cle", 2, 5),
    gpio("P8.10", "gpmc_wen", 2, 4),
    gpio("P8.11", "gpmc_ad13", 1, 13),
    gpio("P8.12", "gpmc_ad12", 1, 12),
    gpio("P8.13", "gpmc_ad9", 0, 23),
    gpio("P8.14", "gpmc_ad10", 0, 26),
    gpio("P8.15", "gpmc_ad15", 1, 15),
    gpio("P8.16", "gpmc_ad14", 1, 14),
    gpio("P8.17", "gpmc_ad11", 0, 27),
    gpio("P8.18", "gpmc_clk", 2, 1),
    gpio("P8.19", "gpmc_ad8", 0, 22),
    gpio("P8.20", "gpmc_csn2", 1, 31),
    gpio("P8.21", "gpmc_csn1", 1, 30),
    gpio("P8.22", "gpmc_ad5", 1, 5),
    gpio("P8.23", "gpmc_ad4", 1, 4),
    gpio("P8.24", "gpmc_ad1", 1, 1),
    gpio("P8.25", "gpmc_ad0", 1, 0),
    gpio("P8.26", "gpmc_csn0", 1, 29),
    gpio("P8.27", "lcd_vsync", 2, 22),
    gpio("P8.28", "lcd_pclk", 2, 24),
    gpio("P8.29", "lcd_hsync", 2, 23),
    gpio("P8.30", "lcd_ac_bias_en", 2, 25),
    gpio("P8.31", "lcd_data14", 0, 10),
    gpio("P8.32", "lcd_data15", 0, 11),
    gpio("P8.33", "lcd_data13", 0, 9),
    gpio("P8.34", "lcd_data11", 2, 17),
    gpio("P8.35", "lcd_data12", 0, 8),
    gpio("P8.36", "lcd_data10", 2, 16),
    gpio("P8.37", "lcd_data8", 2, 14),
    gpio("P8.38", "lcd_data9", 2, 15),
    gpio("P8.40", "lcd_data7", 2, 13),
    gpio("P8.41", "lcd_data4", 2, 10),
    gpio("P8.42", "lcd_data5", 2, 11),
    gpio("P8.43", "lcd_data2", 2, 8),
    gpio("P8.44", "lcd_data3", 2, 9),
    gpio("P8.45", "lcd_data0", 2, 6),
    gpio("P9.11", "gpmc_wait0", 0, 30),
    gpio("P9.12", "gpmc_ben1", 1, 28),
    gpio("P9.13", "gpmc_wpn", 0, 31),
    gpio("P9.14", "gpmc_a2", 1, 18),
    gpio("P9.15", "gpmc_a0", 1, 16),
    gpio("P9.16", "gpmc_a3", 1, 19),
    gpio("P9.17", "spi0_cs0", 0, 5),
    gpio("P9.18", "spi0_d1", 0, 4),
    gpio("P9.19", "uart1_rtsn", 0, 13),
    gpio("P9.20", "uart1_ctsn", 0, 12),
    gpio("P9.21", "spi0_d0", 0, 3),
    gpio("P9.22", "spi0_sclk", 0, 2),
    gpio("P9.23", "gpmc_a1", 1, 17),
    gpio("P9.24", "uart1_txd", 0, 15),
    gpio("P9.25", "mcasp0_ahclkx", 3, 21),
    gpio("P9.26", "uart1_rxd", 0, 14),
    gpio("P9.27", "mcasp0_fsr", 3, 19),
    gpio("P9.28", "mcasp0_ahclkr", 3, 17),
    gpio("P9.29", "mcasp0_fsx", 3, 15),
    gpio("P9.30", "mcasp0_axr0", 3, 16),
    gpio("P9.31", "mcasp0_aclkx", 3, 14),
    ain("P9.33", "ain4", 4),
    ain("P9.35", "ain6", 6),
    ain("P9.36", "ain5", 5),
    ain("P9.37", "ain2", 2),
    ain("P9.38", "ain3", 3),
    ain("P9.39", "ain0", 0),
    ain("P9.40", "ain1", 1),
    gpio("P9.41", "xdma_event_intr1", 0, 20),
    gpio("P9.42", "ecap0_in_pwm0_out", 0, 7),
];

// User LEDs, driven as plain outputs
const USER_LEDS: [HeaderPin; 4] = [
    gpio("USR0", "gpmc_a5", 1, 21),
    gpio("USR1", "gpmc_a6", 1, 22),
    gpio("USR2", "gpmc_a7", 1, 23),
    gpio("USR3", "gpmc_a8", 1, 24),
];

/// BeagleBone with a 3.2-era kernel.
///
/// GPIO goes through the memory-mapped bank registers, with pads muxed
/// through debugfs. Needs root. Only GPIO is provided.
#[derive(Debug)]
pub struct BeagleBone {
    registers: Option<Arc<dyn RegisterBlock>>,
    mux: PinMux,
}

impl BeagleBone {
    /// Maps the GPIO banks through `/dev/mem` when the driver is
    /// initialized.
    pub fn new() -> BeagleBone {
        BeagleBone {
            registers: None,
            mux: PinMux::default(),
        }
    }

    /// Uses `registers` as the peripheral window instead of mapping
    /// `/dev/mem`.
    pub fn with_registers(registers: Arc<dyn RegisterBlock>, mux: PinMux) -> BeagleBone {
        BeagleBone {
            registers: Some(registers),
            mux,
        }
    }

    fn registry() -> PinRegistry {
        let mut pins = Vec::with_capacity(HEADER.len() + USER_LEDS.len());

        for (header_pin, capabilities) in HEADER
            .iter()
            .map(|p| (p, Capabilities::GPIO))
            .chain(USER_LEDS.iter().map(|p| (p, Capabilities::OUTPUT_ONLY)))
        {
            let def = match (header_pin.signal, header_pin.gpio_name()) {
                (Signal::Gpio { port, bit }, Some(gpio_name)) => PinDefinition::new(
                    &[header_pin.name, header_pin.mux, gpio_name.as_str()],
                    &[ModuleTag::Gpio],
                    capabilities,
                    Addressing::Register {
                        port: GPIO_BANKS[usize::from(port)],
                        bit,
                        mux: header_pin.mux,
                    },
                ),
                _ => PinDefinition::new(
                    &[header_pin.name, header_pin.mux],
                    &[ModuleTag::Analog],
                    Capabilities::ANALOG_IN,
                    Addressing::None,
                ),
            };

            pins.push(def);
        }

        PinRegistry::new(pins)
    }
}

impl Default for BeagleBone {
    fn default() -> BeagleBone {
        BeagleBone::new()
    }
}

impl Board for BeagleBone {
    fn name(&self) -> &str {
        "BeagleBone"
    }

    // Never probed automatically
    fn matches(&self, _cpuinfo: &CpuInfo) -> bool {
        false
    }

    fn init(&self, arbiter: &Arbiter) -> Result<Driver> {
        let registers: Arc<dyn RegisterBlock> = match self.registers {
            Some(ref registers) => Arc::clone(registers),
            None => Arc::new(MemoryMap::open(MMAP_OFFSET, MMAP_SIZE)?),
        };

        let registry = BeagleBone::registry();

        let mut pins = HashMap::new();
        for (pin, def) in registry.iter() {
            if let Addressing::Register { port, bit, mux } = *def.addressing() {
                pins.insert(
                    pin,
                    RegisterPin {
                        port,
                        bit,
                        mux: String::from(mux),
                    },
                );
            }
        }

        let mut gpio = RegisterGpio::new("gpio", arbiter.clone(), registers, self.mux.clone());
        gpio.set_configuration(RegisterGpioConfig { pins })?;
        gpio.enable()?;

        let modules = ModuleSet {
            gpio: Some(Box::new(gpio)),
            ..Default::default()
        };

        Ok(Driver::new(self.name(), registry, modules))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::pin::{Level, Mode};
    use crate::regmap::RegisterArray;
    use std::fs;

    // Large enough for bank 0 only
    const WINDOW: usize = GPIO_BANKS[0] + 0x200;

    #[test]
    fn bank_offsets() {
        assert_eq!(GPIO_BANKS[0], 0x8_1c00);
        assert_eq!(GPIO_BANKS[1], 0xd1_3000);
        assert_eq!(MMAP_SIZE, 0x43f_ffff);
    }

    #[test]
    fn header_table() {
        let registry = BeagleBone::registry();
        assert_eq!(registry.len(), 76);

        let pin = registry.lookup("gpio1_6").unwrap();
        assert_eq!(registry.name(pin).unwrap(), "P8.3");
        assert_eq!(
            *registry.get(pin).unwrap().addressing(),
            Addressing::Register {
                port: GPIO_BANKS[1],
                bit: 6,
                mux: "gpmc_ad6"
            }
        );

        let usr0 = registry.lookup("USR0").unwrap();
        assert!(!registry
            .get(usr0)
            .unwrap()
            .capabilities()
            .supports(Mode::Input));
        assert_eq!(registry.pins_with(ModuleTag::Analog).len(), 7);
        assert_eq!(HEADER[22].kernel_gpio(), Some(32));
    }

    #[test]
    fn drives_bank_registers() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("gpmc_ad9"), "").unwrap();
        fs::write(dir.path().join("gpmc_ad6"), "").unwrap();

        let registers = Arc::new(RegisterArray::new(WINDOW));
        let board = BeagleBone::with_registers(registers.clone(), PinMux::new(dir.path()));
        let arbiter = Arbiter::new();
        let mut driver = board.init(&arbiter).unwrap();

        let registry = driver.registry().clone();
        let p8_13 = registry.lookup("P8.13").unwrap();
        let p8_3 = registry.lookup("P8.3").unwrap();

        let gpio = match driver.modules_mut().gpio {
            Some(ref mut gpio) => gpio,
            None => panic!("no GPIO module"),
        };

        gpio.set_mode(p8_13, Mode::Output).unwrap();
        gpio.write(p8_13, Level::High).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("gpmc_ad9")).unwrap(), "7");
        assert_eq!(registers.read(GPIO_BANKS[0] + (0x194 >> 2)), 1 << 23);

        // Bank 1 lies outside the simulated window
        assert!(matches!(
            gpio.set_mode(p8_3, Mode::Output),
            Err(Error::RegisterOutOfRange(_))
        ));
        assert!(!arbiter.is_assigned(p8_3));

        driver.close().unwrap();
        assert!(!arbiter.is_assigned(p8_13));
    }
}
