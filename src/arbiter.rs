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

//! Pin ownership bookkeeping shared by all modules of a driver.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;

use crate::error::{Error, Result};
use crate::pin::Pin;

/// Tracks which module owns which pin.
///
/// `Arbiter` is a cheap handle: clones share the same table, so every
/// module of a driver can hold its own copy.
#[derive(Clone, Default)]
pub struct Arbiter {
    owners: Arc<Mutex<HashMap<Pin, String>>>,
}

impl fmt::Debug for Arbiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arbiter")
            .field("owners", &format_args!("{{ .. }}"))
            .finish()
    }
}

impl Arbiter {
    pub fn new() -> Arbiter {
        Arbiter::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Pin, String>> {
        // Every mutation is a single insert or remove
        self.owners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Records `owner` as the owner of `pin`.
    ///
    /// Assigning a pin to the module that already owns it succeeds. If a
    /// different module owns the pin, `AlreadyAssigned` is returned and the
    /// existing ownership is left untouched.
    pub fn assign(&self, pin: Pin, owner: &str) -> Result<()> {
        let mut owners = self.lock();

        Self::check(&owners, pin, owner)?;
        owners.insert(pin, String::from(owner));
        debug!("Pin {} assigned to {}", pin, owner);

        Ok(())
    }

    /// Assigns every pin in `pins` to `owner`, or none of them.
    ///
    /// All pins are checked before any is recorded, so a conflict on any
    /// pin leaves the table exactly as it was.
    pub fn assign_all(&self, pins: &[Pin], owner: &str) -> Result<()> {
        let mut owners = self.lock();

        for &pin in pins {
            Self::check(&owners, pin, owner)?;
        }

        for &pin in pins {
            owners.insert(pin, String::from(owner));
        }
        debug!("Pins {:?} assigned to {}", pins, owner);

        Ok(())
    }

    /// Releases `pin`. Releasing an unowned pin does nothing.
    pub fn release(&self, pin: Pin) {
        if let Some(owner) = self.lock().remove(&pin) {
            debug!("Pin {} released by {}", pin, owner);
        }
    }

    pub fn release_all(&self, pins: &[Pin]) {
        let mut owners = self.lock();

        for pin in pins {
            owners.remove(pin);
        }
    }

    /// Returns the name of the module that owns `pin`.
    pub fn owner(&self, pin: Pin) -> Option<String> {
        self.lock().get(&pin).cloned()
    }

    pub fn is_assigned(&self, pin: Pin) -> bool {
        self.lock().contains_key(&pin)
    }

    fn check(owners: &HashMap<Pin, String>, pin: Pin, owner: &str) -> Result<()> {
        match owners.get(&pin) {
            Some(current) if current != owner => Err(Error::AlreadyAssigned {
                pin,
                owner: current.clone(),
            }),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assign_unassigned_pin_succeeds() {
        let arbiter = Arbiter::new();

        for pin in 0..16 {
            arbiter.assign(pin, "gpio").unwrap();
            assert_eq!(arbiter.owner(pin).as_deref(), Some("gpio"));
        }
    }

    #[test]
    fn conflicting_assign_keeps_original_owner() {
        let arbiter = Arbiter::new();
        arbiter.assign(5, "gpio").unwrap();

        match arbiter.assign(5, "pwm") {
            Err(Error::AlreadyAssigned { pin, owner }) => {
                assert_eq!(pin, 5);
                assert_eq!(owner, "gpio");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(arbiter.owner(5).as_deref(), Some("gpio"));
    }

    #[test]
    fn reassign_to_same_owner_is_allowed() {
        let arbiter = Arbiter::new();
        arbiter.assign(2, "gpio").unwrap();
        arbiter.assign(2, "gpio").unwrap();

        assert_eq!(arbiter.owner(2).as_deref(), Some("gpio"));
    }

    #[test]
    fn released_pin_is_assignable_again() {
        let arbiter = Arbiter::new();
        arbiter.assign(3, "gpio").unwrap();
        arbiter.release(3);

        assert!(!arbiter.is_assigned(3));
        arbiter.assign(3, "i2c1").unwrap();
        assert_eq!(arbiter.owner(3).as_deref(), Some("i2c1"));
    }

    #[test]
    fn releasing_unassigned_pin_is_a_no_op() {
        let arbiter = Arbiter::new();
        arbiter.assign(1, "gpio").unwrap();
        arbiter.release(7);
        arbiter.release(7);

        assert_eq!(arbiter.owner(1).as_deref(), Some("gpio"));
        assert!(!arbiter.is_assigned(7));
    }

    #[test]
    fn assign_all_is_all_or_nothing() {
        let arbiter = Arbiter::new();
        arbiter.assign(4, "gpio").unwrap();

        assert!(arbiter.assign_all(&[2, 3, 4, 5], "spi0").is_err());
        for pin in [2, 3, 5] {
            assert!(!arbiter.is_assigned(pin));
        }
        assert_eq!(arbiter.owner(4).as_deref(), Some("gpio"));

        arbiter.assign_all(&[2, 3, 5], "spi0").unwrap();
        arbiter.release_all(&[2, 3, 5]);
        assert!(!arbiter.is_assigned(2));
    }

    #[test]
    fn clones_share_the_table() {
        let arbiter = Arbiter::new();
        let other = arbiter.clone();
        other.assign(9, "analog").unwrap();

        assert!(arbiter.assign(9, "gpio").is_err());
    }
}
