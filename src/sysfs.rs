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

//! Kernel pseudo-file interfaces: sysfs GPIO, analog, PWM and LEDs.
//!
//! Paths that differ between kernels are part of each module's
//! configuration. Directories the kernel creates with unpredictable
//! suffixes (`ocp.2`, `helper.14`) are resolved with [`find_first_match`].

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use log::debug;

use crate::error::{Error, Result};

mod analog;
mod gpio;
mod led;
mod pwm;

pub use self::analog::{ChannelDirectory, Overlay, SysfsAnalog, SysfsAnalogConfig};
pub use self::gpio::{SysfsGpio, SysfsGpioConfig};
pub use self::led::{SysfsLed, SysfsLedConfig, SysfsLeds};
pub use self::pwm::{PwmChannel, SysfsPwm, SysfsPwmConfig};

/// Cape manager slots file used to load overlays on BeagleBone kernels.
pub const PATH_CAPEMGR_SLOTS: &str = "/sys/devices/bone_capemgr.*/slots";

/// Writes `value` to an existing file, replacing its contents.
pub fn write_to_file<P: AsRef<Path>>(path: P, value: &str) -> Result<()> {
    OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(path.as_ref())?
        .write_all(value.as_bytes())?;

    Ok(())
}

/// Returns the first path, in sorted order, matching `pattern`.
///
/// `*` matches any run of characters and `?` a single character, within
/// one path component.
pub fn find_first_match(pattern: &str) -> Result<PathBuf> {
    let mut candidates = vec![PathBuf::new()];

    for component in Path::new(pattern).components() {
        let part = match component {
            Component::Normal(part) => part.to_string_lossy().into_owned(),
            other => {
                for candidate in candidates.iter_mut() {
                    candidate.push(other.as_os_str());
                }
                continue;
            }
        };

        if !part.contains(|c: char| c == '*' || c == '?') {
            for candidate in candidates.iter_mut() {
                candidate.push(&part);
            }
            continue;
        }

        let mut matches = Vec::new();
        for candidate in &candidates {
            let dir = if candidate.as_os_str().is_empty() {
                Path::new(".")
            } else {
                candidate.as_path()
            };

            let entries = match fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(_) => continue,
            };

            for entry in entries.flatten() {
                let name = entry.file_name();
                if wildcard_match(&part, &name.to_string_lossy()) {
                    matches.push(candidate.join(&name));
                }
            }
        }

        matches.sort();
        candidates = matches;
    }

    candidates
        .into_iter()
        .find(|path| path.exists())
        .ok_or_else(|| Error::NoMatchingPath(String::from(pattern)))
}

fn wildcard_match(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();

    // Iterative matcher with single-star backtracking
    let (mut p, mut n) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while n < name.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == name[n]) {
            p += 1;
            n += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, n));
            p += 1;
        } else if let Some((star_p, star_n)) = star {
            p = star_p + 1;
            n = star_n + 1;
            star = Some((star_p, star_n + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

/// Loads a kernel overlay by writing `token` to the slots file matching
/// `slots`, unless the file already lists it.
pub fn ensure_overlay(slots: &str, token: &str) -> Result<()> {
    let path = find_first_match(slots)?;

    if fs::read_to_string(&path)?.contains(token) {
        return Ok(());
    }

    File::create(&path)?.write_all(token.as_bytes())?;
    debug!("Loaded overlay {} through {}", token, path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcards() {
        assert!(wildcard_match("ocp.*", "ocp.2"));
        assert!(wildcard_match("pwm_test_P9_14.*", "pwm_test_P9_14.15"));
        assert!(!wildcard_match("pwm_test_P9_14.*", "pwm_test_P9_16.15"));
        assert!(wildcard_match("helper.?4", "helper.14"));
        assert!(wildcard_match("*", ""));
        assert!(wildcard_match("a*b*c", "aXXbYYc"));
        assert!(!wildcard_match("a*b*c", "aXXbYY"));
        assert!(!wildcard_match("ocp.*", "bone_capemgr.9"));
    }

    #[test]
    fn first_match_is_sorted_and_spans_components() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("ocp.3/helper.15")).unwrap();
        fs::create_dir_all(dir.path().join("ocp.2/helper.14")).unwrap();
        fs::create_dir_all(dir.path().join("ocp.2/other")).unwrap();
        fs::write(dir.path().join("ocp.3/helper.15/AIN0"), "").unwrap();
        fs::write(dir.path().join("ocp.2/helper.14/AIN0"), "").unwrap();

        let pattern = format!("{}/ocp.*/helper.*/AIN0", dir.path().display());
        assert_eq!(
            find_first_match(&pattern).unwrap(),
            dir.path().join("ocp.2/helper.14/AIN0")
        );
    }

    #[test]
    fn no_match_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = format!("{}/bone_capemgr.*/slots", dir.path().display());

        match find_first_match(&pattern) {
            Err(Error::NoMatchingPath(p)) => assert_eq!(p, pattern),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn overlay_is_written_once() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("bone_capemgr.9")).unwrap();
        let slots = dir.path().join("bone_capemgr.9/slots");
        fs::write(&slots, " 0: 54:PF---\n").unwrap();
        let pattern = format!("{}/bone_capemgr.*/slots", dir.path().display());

        ensure_overlay(&pattern, "cape-bone-iio").unwrap();
        assert_eq!(fs::read_to_string(&slots).unwrap(), "cape-bone-iio");

        // A loaded overlay shows up in the slot list, so nothing is written
        fs::write(&slots, " 7: ff:P-O-L Override Board Name,00A0,Override Manuf,cape-bone-iio\n")
            .unwrap();
        ensure_overlay(&pattern, "cape-bone-iio").unwrap();
        assert!(fs::read_to_string(&slots).unwrap().starts_with(" 7:"));
    }

    #[test]
    fn write_to_file_requires_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export");

        assert!(write_to_file(&path, "38").is_err());
        fs::write(&path, "").unwrap();
        write_to_file(&path, "38").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "38");
    }
}
