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

//! Host identification through `/proc/cpuinfo`.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::Result;

const PATH_PROC_CPUINFO: &str = "/proc/cpuinfo";

/// Parsed `key : value` pairs of `/proc/cpuinfo`, grouped per CPU.
///
/// A `processor` line starts a new CPU. Keys seen before the first
/// `processor` line belong to CPU 0, and board-wide keys listed after the
/// per-CPU blocks (`Hardware`, `Revision`, `Serial` on ARM kernels) end up
/// with the last CPU. If a key repeats within one CPU, the last value is
/// kept.
#[derive(Debug, Clone, Default)]
pub struct CpuInfo {
    cpus: Vec<HashMap<String, String>>,
}

impl CpuInfo {
    /// Reads and parses `/proc/cpuinfo`.
    pub fn new() -> Result<CpuInfo> {
        CpuInfo::from_path(PATH_PROC_CPUINFO)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<CpuInfo> {
        let reader = BufReader::new(File::open(path)?);

        let mut cpuinfo = CpuInfo::default();
        for line in reader.lines() {
            cpuinfo.add_line(&line?);
        }

        Ok(cpuinfo)
    }

    /// Parses the contents of a cpuinfo dump.
    pub fn parse(content: &str) -> CpuInfo {
        let mut cpuinfo = CpuInfo::default();
        for line in content.lines() {
            cpuinfo.add_line(line);
        }

        cpuinfo
    }

    fn add_line(&mut self, line: &str) {
        let (key, value) = match line.split_once(':') {
            Some((key, value)) => (key.trim(), value.trim()),
            None => return,
        };

        if key.is_empty() {
            return;
        }

        if key == "processor" {
            // The first processor line claims CPU 0, including any keys
            // that were listed before it.
            if !self.cpus.is_empty() && self.cpus[self.cpus.len() - 1].contains_key("processor")
            {
                self.cpus.push(HashMap::new());
            }
        }

        if self.cpus.is_empty() {
            self.cpus.push(HashMap::new());
        }

        let last = self.cpus.len() - 1;
        self.cpus[last].insert(String::from(key), String::from(value));
    }

    /// Returns the value of `key` for `cpu`.
    pub fn get(&self, cpu: usize, key: &str) -> Option<&str> {
        self.cpus
            .get(cpu)
            .and_then(|values| values.get(key))
            .map(String::as_str)
    }

    /// Returns the value of `key` for the last CPU.
    pub fn last(&self, key: &str) -> Option<&str> {
        self.cpus.len().checked_sub(1).and_then(|cpu| self.get(cpu, key))
    }

    pub fn cpu_count(&self) -> usize {
        self.cpus.len()
    }

    /// Returns the board-wide `Hardware` value.
    pub fn hardware(&self) -> Option<&str> {
        self.last("Hardware")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ODROID_C1: &str = "processor\t: 0
model name\t: ARMv7 Processor rev 1 (v7l)
BogoMIPS\t: 3.27

processor\t: 1
model name\t: ARMv7 Processor rev 1 (v7l)

processor\t: 2
model name\t: ARMv7 Processor rev 1 (v7l)

processor\t: 3
model name\t: ARMv7 Processor rev 1 (v7l)
BogoMIPS\t: 3.30

Hardware\t: ODROIDC
Revision\t: 000a
Serial\t\t: 1b00000000000000
";

    #[test]
    fn board_keys_land_on_last_cpu() {
        let cpuinfo = CpuInfo::parse(ODROID_C1);

        assert_eq!(cpuinfo.cpu_count(), 4);
        assert_eq!(cpuinfo.get(3, "Hardware"), Some("ODROIDC"));
        assert_eq!(cpuinfo.get(0, "Hardware"), None);
        assert_eq!(cpuinfo.hardware(), Some("ODROIDC"));
        assert_eq!(cpuinfo.get(3, "BogoMIPS"), Some("3.30"));
        assert_eq!(cpuinfo.get(0, "BogoMIPS"), Some("3.27"));
    }

    #[test]
    fn keys_before_first_processor_belong_to_cpu_zero() {
        let cpuinfo = CpuInfo::parse("vendor : acme\nprocessor : 0\nflags : fpu\n");

        assert_eq!(cpuinfo.cpu_count(), 1);
        assert_eq!(cpuinfo.get(0, "vendor"), Some("acme"));
        assert_eq!(cpuinfo.get(0, "flags"), Some("fpu"));
    }

    #[test]
    fn values_may_contain_colons() {
        let cpuinfo = CpuInfo::parse("Hardware\t: Generic AM33XX (Flattened Device Tree)\nSerial : a:b\n");

        assert_eq!(cpuinfo.hardware(), Some("Generic AM33XX (Flattened Device Tree)"));
        assert_eq!(cpuinfo.last("Serial"), Some("a:b"));
        assert_eq!(cpuinfo.get(1, "Serial"), None);
    }

    #[test]
    fn reads_from_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cpuinfo");
        std::fs::write(&path, "processor : 0\nHardware : BCM2835\n").unwrap();

        let cpuinfo = CpuInfo::from_path(&path).unwrap();
        assert_eq!(cpuinfo.hardware(), Some("BCM2835"));
        assert!(CpuInfo::from_path(dir.path().join("missing")).is_err());
    }
}
