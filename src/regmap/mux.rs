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

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::Result;

pub const PATH_OMAP_MUX: &str = "/sys/kernel/debug/omap_mux";

/// Pin multiplexer control through the kernel's debugfs mux nodes.
///
/// User space can't write the control module registers directly, so the
/// mux function and pull configuration go through one file per pad.
#[derive(Debug, Clone)]
pub struct PinMux {
    root: PathBuf,
}

impl Default for PinMux {
    fn default() -> PinMux {
        PinMux::new(PATH_OMAP_MUX)
    }
}

impl PinMux {
    pub fn new<P: AsRef<Path>>(root: P) -> PinMux {
        PinMux {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Writes `value` as lower-case hex without prefix to the node for
    /// `signal`.
    pub fn set(&self, signal: &str, value: u32) -> Result<()> {
        let path = self.root.join(signal);

        OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&path)?
            .write_fmt(format_args!("{:x}", value))?;

        debug!("Mux {} set to {:#x}", signal, value);

        Ok(())
    }
}
