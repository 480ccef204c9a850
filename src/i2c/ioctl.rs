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

// Based on i2c.h, i2c-dev.h and the documentation at https://www.kernel.org/doc/Documentation/i2c
// and http://smbus.org/specs/SMBus_3_1_20180319.pdf

use std::io;

use libc::{c_int, c_ulong, ioctl};

// Capabilities returned by REQ_FUNCS
const FUNC_I2C: c_ulong = 0x01;
const FUNC_SMBUS_READ_BYTE_DATA: c_ulong = 0x08_0000;
const FUNC_SMBUS_WRITE_BYTE_DATA: c_ulong = 0x10_0000;
const FUNC_SMBUS_READ_WORD_DATA: c_ulong = 0x20_0000;
const FUNC_SMBUS_WRITE_WORD_DATA: c_ulong = 0x40_0000;
const FUNC_SMBUS_READ_I2C_BLOCK: c_ulong = 0x0400_0000;
const FUNC_SMBUS_WRITE_I2C_BLOCK: c_ulong = 0x0800_0000;

/// Bus functionality reported by the adapter driver.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct Functionality {
    funcs: c_ulong,
}

impl Functionality {
    pub fn new(funcs: c_ulong) -> Functionality {
        Functionality { funcs }
    }

    pub fn i2c(&self) -> bool {
        (self.funcs & FUNC_I2C) > 0
    }

    pub fn smbus_byte_data(&self) -> bool {
        (self.funcs & (FUNC_SMBUS_READ_BYTE_DATA | FUNC_SMBUS_WRITE_BYTE_DATA))
            == (FUNC_SMBUS_READ_BYTE_DATA | FUNC_SMBUS_WRITE_BYTE_DATA)
    }

    pub fn smbus_word_data(&self) -> bool {
        (self.funcs & (FUNC_SMBUS_READ_WORD_DATA | FUNC_SMBUS_WRITE_WORD_DATA))
            == (FUNC_SMBUS_READ_WORD_DATA | FUNC_SMBUS_WRITE_WORD_DATA)
    }

    pub fn i2c_block(&self) -> bool {
        (self.funcs & (FUNC_SMBUS_READ_I2C_BLOCK | FUNC_SMBUS_WRITE_I2C_BLOCK))
            == (FUNC_SMBUS_READ_I2C_BLOCK | FUNC_SMBUS_WRITE_I2C_BLOCK)
    }
}

// ioctl() requests supported by i2cdev
const REQ_SLAVE: c_ulong = 0x0703; // Set slave address
const REQ_FUNCS: c_ulong = 0x0705; // Read I2C bus capabilities
const REQ_SMBUS: c_ulong = 0x0720; // SMBus: Transfer

/// Maximum data bytes per block transfer.
pub const SMBUS_BLOCK_MAX: usize = 32;

/// Transfer direction of an SMBus request.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum SmbusReadWrite {
    Read = 1,
    Write = 0,
}

/// Size class of the data carried by an SMBus request.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum SmbusSize {
    ByteData = 2,
    WordData = 3,
    I2cBlockData = 8,
}

/// Data carried by an SMBus request.
///
/// Holds a single byte, a 16-bit word (low byte first), or a block, where
/// the first byte contains the length, followed by up to 32 bytes of data,
/// with the final byte used as padding.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[repr(C)]
pub struct SmbusData {
    pub data: [u8; SMBUS_BLOCK_MAX + 2],
}

impl SmbusData {
    pub fn new() -> SmbusData {
        SmbusData {
            data: [0u8; SMBUS_BLOCK_MAX + 2],
        }
    }

    pub fn with_byte(value: u8) -> SmbusData {
        let mut buffer = SmbusData::new();
        buffer.data[0] = value;

        buffer
    }

    pub fn with_word(value: u16) -> SmbusData {
        let mut buffer = SmbusData::new();

        // Low byte is sent first (SMBus 3.1 spec @ 6.5.4)
        buffer.data[0] = (value & 0xFF) as u8;
        buffer.data[1] = (value >> 8) as u8;

        buffer
    }

    /// Block with its length prefix. `values` is truncated to 32 bytes.
    pub fn with_block(values: &[u8]) -> SmbusData {
        let len = values.len().min(SMBUS_BLOCK_MAX);
        let mut buffer = SmbusData::new();

        buffer.data[0] = len as u8;
        buffer.data[1..=len].copy_from_slice(&values[..len]);

        buffer
    }

    pub fn byte(&self) -> u8 {
        self.data[0]
    }

    pub fn word(&self) -> u16 {
        // Low byte is received first (SMBus 3.1 spec @ 6.5.5)
        u16::from(self.data[0]) | (u16::from(self.data[1]) << 8)
    }

    /// Data bytes of a block, as indicated by the length prefix.
    pub fn block(&self) -> &[u8] {
        let len = usize::from(self.data[0]).min(SMBUS_BLOCK_MAX);

        &self.data[1..=len]
    }
}

impl Default for SmbusData {
    fn default() -> SmbusData {
        SmbusData::new()
    }
}

// Specifies SMBus request parameters
#[repr(C)]
struct SmbusRequest<'a> {
    read_write: u8,
    command: u8,
    size: u32,
    data: &'a mut SmbusData,
}

pub unsafe fn smbus_request(
    fd: c_int,
    read_write: SmbusReadWrite,
    command: u8,
    size: SmbusSize,
    data: &mut SmbusData,
) -> io::Result<i32> {
    let mut request = SmbusRequest {
        read_write: read_write as u8,
        command,
        size: size as u32,
        data,
    };

    parse_retval!(ioctl(fd, REQ_SMBUS, &mut request))
}

pub unsafe fn set_slave_address(fd: c_int, value: c_ulong) -> io::Result<i32> {
    parse_retval!(ioctl(fd, REQ_SLAVE, value))
}

pub unsafe fn funcs(fd: c_int) -> io::Result<Functionality> {
    let mut funcs: c_ulong = 0;

    parse_retval!(ioctl(fd, REQ_FUNCS, &mut funcs))?;

    Ok(Functionality::new(funcs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem;

    #[test]
    fn request_layout() {
        assert_eq!(mem::size_of::<SmbusData>(), 34);
        assert_eq!(
            mem::size_of::<SmbusRequest<'_>>(),
            8 + mem::size_of::<usize>()
        );
    }

    #[test]
    fn block_prefix() {
        let buffer = SmbusData::with_block(&[0xde, 0xad, 0xbe]);
        assert_eq!(&buffer.data[..5], &[3, 0xde, 0xad, 0xbe, 0]);
        assert_eq!(buffer.block(), &[0xde, 0xad, 0xbe]);

        let long = [0x55u8; 40];
        assert_eq!(SmbusData::with_block(&long).block().len(), 32);
    }

    #[test]
    fn word_is_little_endian() {
        let buffer = SmbusData::with_word(0x1234);
        assert_eq!(&buffer.data[..2], &[0x34, 0x12]);
        assert_eq!(buffer.word(), 0x1234);
    }

    #[test]
    fn functionality_bits() {
        let funcs = Functionality::new(0x0c7f_0001);
        assert!(funcs.i2c());
        assert!(funcs.smbus_byte_data());
        assert!(funcs.smbus_word_data());
        assert!(funcs.i2c_block());
        assert!(!Functionality::new(FUNC_SMBUS_READ_I2C_BLOCK).i2c_block());
    }
}
