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

//! Direct register access through a memory-mapped window of physical memory.
//!
//! Registers are addressed as 32-bit word offsets relative to the start of
//! the mapping. Only the `/dev/mem` open and `mmap` call involve the
//! kernel; every read and write afterwards is a plain volatile memory
//! access.
//!
//! Read-modify-write helpers are not atomic across processes. Only one
//! process should map the same physical region at a time.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

mod gpio;
mod mem;
mod mux;

pub use self::gpio::{RegisterGpio, RegisterGpioConfig, RegisterPin};
pub use self::mem::MemoryMap;
pub use self::mux::PinMux;

/// A window of 32-bit registers.
pub trait RegisterBlock: fmt::Debug + Send + Sync {
    /// Returns the number of 32-bit words in the window.
    fn len(&self) -> usize;

    fn read(&self, offset: usize) -> u32;

    fn write(&self, offset: usize, value: u32);

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn set_bits(&self, offset: usize, mask: u32) {
        self.write(offset, self.read(offset) | mask);
    }

    fn clear_bits(&self, offset: usize, mask: u32) {
        self.write(offset, self.read(offset) & !mask);
    }
}

/// Register window backed by ordinary memory.
///
/// Useful for simulating a peripheral. Out of range reads return 0 and
/// out of range writes are ignored.
pub struct RegisterArray {
    words: Vec<AtomicU32>,
}

impl fmt::Debug for RegisterArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterArray")
            .field("len", &self.words.len())
            .field("words", &format_args!("{{ .. }}"))
            .finish()
    }
}

impl RegisterArray {
    pub fn new(len: usize) -> RegisterArray {
        RegisterArray {
            words: (0..len).map(|_| AtomicU32::new(0)).collect(),
        }
    }
}

impl RegisterBlock for RegisterArray {
    fn len(&self) -> usize {
        self.words.len()
    }

    fn read(&self, offset: usize) -> u32 {
        self.words
            .get(offset)
            .map(|word| word.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    fn write(&self, offset: usize, value: u32) {
        if let Some(word) = self.words.get(offset) {
            word.store(value, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_clear_bits_preserve_other_bits() {
        let regs = RegisterArray::new(4);
        regs.write(2, 0b1010);

        regs.set_bits(2, 0b0101);
        assert_eq!(regs.read(2), 0b1111);

        regs.clear_bits(2, 0b1001);
        assert_eq!(regs.read(2), 0b0110);
        assert_eq!(regs.read(1), 0);
    }

    #[test]
    fn out_of_range_access_is_inert() {
        let regs = RegisterArray::new(1);
        regs.write(5, 0xffff_ffff);

        assert_eq!(regs.read(5), 0);
        assert_eq!(regs.len(), 1);
    }
}
