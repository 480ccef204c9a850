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

use std::fmt;
use std::fs::OpenOptions;
use std::io;
use std::mem::size_of;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::ptr;

use libc::{self, c_void, off_t, size_t, MAP_FAILED, MAP_SHARED, O_SYNC, PROT_READ, PROT_WRITE};
use log::debug;

use super::RegisterBlock;
use crate::error::Result;

pub const PATH_DEV_MEM: &str = "/dev/mem";

/// A window of physical memory mapped into the process.
pub struct MemoryMap {
    mem_ptr: *mut u32,
    size: usize,
}

impl fmt::Debug for MemoryMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryMap")
            .field("mem_ptr", &self.mem_ptr)
            .field("size", &self.size)
            .finish()
    }
}

impl MemoryMap {
    /// Maps `size` bytes of `/dev/mem`, starting at physical address `base`.
    pub fn open(base: u32, size: usize) -> Result<MemoryMap> {
        MemoryMap::open_path(PATH_DEV_MEM, base, size)
    }

    /// Maps `size` bytes of the memory device at `path`, starting at `base`.
    pub fn open_path<P: AsRef<Path>>(path: P, base: u32, size: usize) -> Result<MemoryMap> {
        let mem_file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(O_SYNC)
            .open(path.as_ref())?;

        let mem_ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                size as size_t,
                PROT_READ | PROT_WRITE,
                MAP_SHARED,
                mem_file.as_raw_fd(),
                base as off_t,
            )
        };

        if mem_ptr == MAP_FAILED {
            return Err(io::Error::last_os_error().into());
        }

        debug!(
            "Mapped {} bytes of {} at {:#010x}",
            size,
            path.as_ref().display(),
            base
        );

        // The file descriptor can be closed once the mapping exists
        Ok(MemoryMap {
            mem_ptr: mem_ptr as *mut u32,
            size,
        })
    }
}

impl RegisterBlock for MemoryMap {
    fn len(&self) -> usize {
        self.size / size_of::<u32>()
    }

    #[inline(always)]
    fn read(&self, offset: usize) -> u32 {
        if offset >= self.len() {
            return 0;
        }

        unsafe { ptr::read_volatile(self.mem_ptr.add(offset)) }
    }

    #[inline(always)]
    fn write(&self, offset: usize, value: u32) {
        if offset >= self.len() {
            return;
        }

        unsafe {
            ptr::write_volatile(self.mem_ptr.add(offset), value);
        }
    }
}

impl Drop for MemoryMap {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.mem_ptr as *mut c_void, self.size as size_t);
        }
    }
}

// Required because of the raw pointer to our memory-mapped file
unsafe impl Send for MemoryMap {}

unsafe impl Sync for MemoryMap {}
