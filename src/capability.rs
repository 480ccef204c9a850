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

//! Hardware functions a pin may offer.

use std::fmt;

use crate::pin::Mode;

/// One hardware function of a pin.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Hash)]
#[repr(u8)]
pub enum Capability {
    Input = 0,
    Output = 1,
    InputPullUp = 2,
    InputPullDown = 3,
    PwmOut = 4,
    AnalogIn = 5,
}

const ALL: [Capability; 6] = [
    Capability::Input,
    Capability::Output,
    Capability::InputPullUp,
    Capability::InputPullDown,
    Capability::PwmOut,
    Capability::AnalogIn,
];

impl Capability {
    fn bit(self) -> u8 {
        1 << self as u8
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Capability::Input => write!(f, "input"),
            Capability::Output => write!(f, "output"),
            Capability::InputPullUp => write!(f, "input_pullup"),
            Capability::InputPullDown => write!(f, "input_pulldown"),
            Capability::PwmOut => write!(f, "pwm_out"),
            Capability::AnalogIn => write!(f, "analog_in"),
        }
    }
}

impl From<Mode> for Capability {
    fn from(mode: Mode) -> Capability {
        match mode {
            Mode::Input => Capability::Input,
            Mode::Output => Capability::Output,
            Mode::InputPullUp => Capability::InputPullUp,
            Mode::InputPullDown => Capability::InputPullDown,
        }
    }
}

/// The set of hardware functions a pin offers.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Default)]
pub struct Capabilities {
    bits: u8,
}

impl Capabilities {
    pub const NONE: Capabilities = Capabilities { bits: 0 };
    pub const INPUT_ONLY: Capabilities = Capabilities { bits: 0b0000_0001 };
    pub const OUTPUT_ONLY: Capabilities = Capabilities { bits: 0b0000_0010 };
    /// Digital input and output, including both pull resistor modes.
    pub const GPIO: Capabilities = Capabilities { bits: 0b0000_1111 };
    pub const GPIO_PWM: Capabilities = Capabilities { bits: 0b0001_1111 };
    pub const ANALOG_IN: Capabilities = Capabilities { bits: 0b0010_0000 };

    /// Returns a copy of this set with `capability` added.
    pub const fn with(self, capability: Capability) -> Capabilities {
        Capabilities {
            bits: self.bits | (1 << capability as u8),
        }
    }

    pub fn contains(&self, capability: Capability) -> bool {
        (self.bits & capability.bit()) > 0
    }

    /// Returns `true` if a pin with these capabilities can be put in `mode`.
    pub fn supports(&self, mode: Mode) -> bool {
        self.contains(Capability::from(mode))
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        ALL.iter().copied().filter(move |cap| self.contains(*cap))
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for cap in self.iter() {
            if !first {
                write!(f, ",")?;
            }
            write!(f, "{}", cap)?;
            first = false;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpio_profile_supports_every_digital_mode() {
        for mode in [
            Mode::Input,
            Mode::Output,
            Mode::InputPullUp,
            Mode::InputPullDown,
        ] {
            assert!(Capabilities::GPIO.supports(mode));
        }
        assert!(!Capabilities::GPIO.contains(Capability::AnalogIn));
    }

    #[test]
    fn with_adds_a_single_capability() {
        let caps = Capabilities::NONE.with(Capability::Output);

        assert_eq!(caps, Capabilities::OUTPUT_ONLY);
        assert!(!caps.supports(Mode::Input));
    }

    #[test]
    fn display_lists_members_in_order() {
        assert_eq!(
            Capabilities::INPUT_ONLY.with(Capability::AnalogIn).to_string(),
            "input,analog_in"
        );
        assert_eq!(Capabilities::NONE.to_string(), "");
    }
}
