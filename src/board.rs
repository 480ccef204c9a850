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

//! Supported boards and driver selection.
//!
//! Each [`Board`] knows how to recognize its host from `/proc/cpuinfo` and
//! how to assemble a [`Driver`]: the pin registry plus one configured
//! module per capability the board offers.
//!
//! Automatic detection only considers device tree kernels. The
//! register-mapped [`BeagleBone`] driver has to be selected explicitly
//! through [`Hardware::with_board`].
//!
//! [`Hardware::with_board`]: crate::hardware::Hardware::with_board

use log::info;

use crate::arbiter::Arbiter;
use crate::cpuinfo::CpuInfo;
use crate::driver::Driver;
use crate::error::Result;

mod beaglebone;
mod beaglebone_black;
mod mock;
mod odroid_c1;
mod raspberry_pi;

pub use self::beaglebone::BeagleBone;
pub use self::beaglebone_black::BeagleBoneBlack;
pub use self::mock::{MockBoard, WriteLog};
pub use self::odroid_c1::OdroidC1;
pub use self::raspberry_pi::RaspberryPi;

/// Board support.
pub trait Board {
    fn name(&self) -> &str;

    /// Returns `true` if the host described by `cpuinfo` is this board.
    fn matches(&self, cpuinfo: &CpuInfo) -> bool;

    /// Builds the pin registry and modules, claiming pins through
    /// `arbiter`.
    ///
    /// Modules that depend on optional kernel support (analog, PWM, I2C,
    /// SPI) are left disabled if they can't be enabled.
    fn init(&self, arbiter: &Arbiter) -> Result<Driver>;
}

/// Returns the automatically detectable boards, in probing order.
pub fn candidates() -> Vec<Box<dyn Board>> {
    vec![
        Box::new(BeagleBoneBlack),
        Box::new(RaspberryPi),
        Box::new(OdroidC1),
    ]
}

/// Returns the first board in `boards` matching `cpuinfo`.
pub fn detect<'a>(cpuinfo: &CpuInfo, boards: &[&'a dyn Board]) -> Option<&'a dyn Board> {
    let board = boards.iter().copied().find(|board| board.matches(cpuinfo));

    match board {
        Some(board) => info!("Detected {}", board.name()),
        None => info!(
            "No supported board found (Hardware: {})",
            cpuinfo.hardware().unwrap_or("unknown")
        ),
    }

    board
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cpuinfo(hardware: &str) -> CpuInfo {
        CpuInfo::parse(&format!(
            "processor\t: 0\nmodel name\t: ARMv7 Processor rev 5 (v7l)\n\n\
             processor\t: 1\nmodel name\t: ARMv7 Processor rev 5 (v7l)\n\n\
             Hardware\t: {}\nRevision\t: 000a\n",
            hardware
        ))
    }

    fn detected(hardware: &str) -> Option<String> {
        let boards = candidates();
        let boards: Vec<&dyn Board> = boards.iter().map(|board| board.as_ref()).collect();

        detect(&cpuinfo(hardware), &boards).map(|board| board.name().to_owned())
    }

    #[test]
    fn detection_order() {
        assert_eq!(
            detected("Generic AM33XX (Flattened Device Tree)").as_deref(),
            Some("BeagleBone Black")
        );
        assert_eq!(detected("BCM2835").as_deref(), Some("Raspberry Pi"));
        assert_eq!(detected("BCM2711").as_deref(), Some("Raspberry Pi"));
        assert_eq!(detected("ODROIDC").as_deref(), Some("Odroid C1"));
        assert_eq!(detected("ODROID-C2"), None);
        assert_eq!(detected("sun8i"), None);
    }

    #[test]
    fn missing_hardware_line_matches_nothing() {
        let boards = candidates();
        let boards: Vec<&dyn Board> = boards.iter().map(|board| board.as_ref()).collect();

        assert!(detect(&CpuInfo::parse("processor\t: 0\n"), &boards).is_none());
    }
}
