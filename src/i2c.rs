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

//! I2C bus access through the `i2cdev` character device.
//!
//! Every [`I2cDevice`] transaction programs its slave address into the
//! shared bus descriptor before transferring data. Both steps run under
//! one lock per bus, so devices on the same bus can be used from several
//! threads without one caller's transfer reaching another caller's
//! slave.
//!
//! Register-oriented transfers use the kernel's SMBus interface: single
//! bytes, 16-bit words (low byte first) and I2C blocks of up to 32 bytes.
//! Failed transfers are never retried. The OS error code is available
//! through the wrapped [`io::Error`].

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use libc::c_ulong;
use log::{debug, trace};

use crate::arbiter::Arbiter;
use crate::error::{Error, Result};
use crate::module::{Configure, I2cModule, Module, ModuleKind};
use crate::pin::Pin;

pub mod ioctl;

pub use self::ioctl::{SmbusData, SmbusReadWrite, SmbusSize, SMBUS_BLOCK_MAX};

pub const PATH_DEV_I2C_1: &str = "/dev/i2c-1";

/// Raw access to one I2C bus.
///
/// Implemented by [`I2cDev`] for the kernel character device. Callers go
/// through [`I2cDevice`], which holds the bus lock across
/// [`select_slave`] and the transfer that follows it.
///
/// [`select_slave`]: Transport::select_slave
pub trait Transport: fmt::Debug + Send {
    fn select_slave(&mut self, address: u16) -> io::Result<()>;

    fn smbus(
        &mut self,
        read_write: SmbusReadWrite,
        command: u8,
        size: SmbusSize,
        data: &mut SmbusData,
    ) -> io::Result<()>;

    /// Plain I2C read: START, address + R, incoming bytes, STOP.
    fn read(&mut self, buffer: &mut [u8]) -> io::Result<usize>;

    /// Plain I2C write: START, address + W, outgoing bytes, STOP.
    fn write(&mut self, buffer: &[u8]) -> io::Result<usize>;
}

/// An open `/dev/i2c-N` descriptor.
#[derive(Debug)]
pub struct I2cDev {
    i2cdev: File,
}

impl I2cDev {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<I2cDev> {
        let i2cdev = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path.as_ref())?;

        let funcs = unsafe { ioctl::funcs(i2cdev.as_raw_fd())? };
        if !funcs.i2c_block() {
            debug!(
                "{} doesn't report I2C block support, block transfers may fail",
                path.as_ref().display()
            );
        }

        debug!("Opened {} ({:?})", path.as_ref().display(), funcs);

        Ok(I2cDev { i2cdev })
    }
}

impl Transport for I2cDev {
    fn select_slave(&mut self, address: u16) -> io::Result<()> {
        unsafe { ioctl::set_slave_address(self.i2cdev.as_raw_fd(), c_ulong::from(address))? };

        Ok(())
    }

    fn smbus(
        &mut self,
        read_write: SmbusReadWrite,
        command: u8,
        size: SmbusSize,
        data: &mut SmbusData,
    ) -> io::Result<()> {
        unsafe {
            ioctl::smbus_request(self.i2cdev.as_raw_fd(), read_write, command, size, data)?
        };

        Ok(())
    }

    fn read(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
        self.i2cdev.read(buffer)
    }

    fn write(&mut self, buffer: &[u8]) -> io::Result<usize> {
        self.i2cdev.write(buffer)
    }
}

// Empty while the bus is disabled
type SharedTransport = Arc<Mutex<Option<Box<dyn Transport>>>>;

fn lock(transport: &SharedTransport) -> MutexGuard<'_, Option<Box<dyn Transport>>> {
    // A panic mid-transaction leaves no state behind in the transport
    transport.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A slave device on an enabled I2C bus.
///
/// Cloning is cheap. Clones share the bus lock. Once the bus is disabled,
/// every transfer fails with `NotEnabled`.
#[derive(Clone)]
pub struct I2cDevice {
    bus: String,
    address: u16,
    transport: SharedTransport,
}

impl I2cDevice {
    /// Returns the 7-bit slave address.
    pub fn address(&self) -> u16 {
        self.address
    }

    fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Box<dyn Transport>) -> io::Result<T>,
    {
        let mut guard = lock(&self.transport);
        let transport = guard
            .as_mut()
            .ok_or_else(|| Error::NotEnabled(self.bus.clone()))?;

        transport.select_slave(self.address)?;

        Ok(f(transport)?)
    }

    fn smbus_read(&self, command: u8, size: SmbusSize, data: &mut SmbusData) -> Result<()> {
        self.transaction(|transport| transport.smbus(SmbusReadWrite::Read, command, size, data))
    }

    fn smbus_write(&self, command: u8, size: SmbusSize, data: &mut SmbusData) -> Result<()> {
        self.transaction(|transport| transport.smbus(SmbusReadWrite::Write, command, size, data))
    }

    /// Reads one byte from register `command`.
    pub fn read_byte(&self, command: u8) -> Result<u8> {
        let mut data = SmbusData::new();
        self.smbus_read(command, SmbusSize::ByteData, &mut data)?;
        trace!("i2c {:#04x} read  [{:#04x}] = {:#04x}", self.address, command, data.byte());

        Ok(data.byte())
    }

    /// Writes one byte to register `command`.
    pub fn write_byte(&self, command: u8, value: u8) -> Result<()> {
        trace!("i2c {:#04x} write [{:#04x}] = {:#04x}", self.address, command, value);

        self.smbus_write(command, SmbusSize::ByteData, &mut SmbusData::with_byte(value))
    }

    /// Reads a 16-bit word from register `command`. The low byte is
    /// received first.
    pub fn read_word(&self, command: u8) -> Result<u16> {
        let mut data = SmbusData::new();
        self.smbus_read(command, SmbusSize::WordData, &mut data)?;
        trace!("i2c {:#04x} read  [{:#04x}] = {:#06x}", self.address, command, data.word());

        Ok(data.word())
    }

    /// Writes a 16-bit word to register `command`, low byte first.
    pub fn write_word(&self, command: u8, value: u16) -> Result<()> {
        trace!("i2c {:#04x} write [{:#04x}] = {:#06x}", self.address, command, value);

        self.smbus_write(command, SmbusSize::WordData, &mut SmbusData::with_word(value))
    }

    /// Reads `len` bytes starting at register `command`.
    ///
    /// Returns exactly `len` bytes, or an error. `len` can't exceed 32.
    pub fn read_block(&self, command: u8, len: usize) -> Result<Vec<u8>> {
        if len > SMBUS_BLOCK_MAX {
            return Err(Error::BlockTooLarge(len));
        }

        let mut data = SmbusData::new();
        data.data[0] = len as u8;
        self.smbus_read(command, SmbusSize::I2cBlockData, &mut data)?;

        let actual = usize::from(data.data[0]);
        if actual != len {
            return Err(Error::ShortTransfer {
                expected: len,
                actual,
            });
        }

        trace!("i2c {:#04x} read  [{:#04x}] = {:02x?}", self.address, command, data.block());

        Ok(data.block().to_vec())
    }

    /// Writes up to 32 bytes starting at register `command`.
    pub fn write_block(&self, command: u8, values: &[u8]) -> Result<()> {
        if values.len() > SMBUS_BLOCK_MAX {
            return Err(Error::BlockTooLarge(values.len()));
        }

        trace!("i2c {:#04x} write [{:#04x}] = {:02x?}", self.address, command, values);

        self.smbus_write(command, SmbusSize::I2cBlockData, &mut SmbusData::with_block(values))
    }

    /// Fills `buffer` with incoming data, without sending a register
    /// address first. Returns how many bytes were read.
    pub fn read(&self, buffer: &mut [u8]) -> Result<usize> {
        self.transaction(|transport| Transport::read(&mut **transport, buffer))
    }

    /// Sends `buffer` as is. Returns how many bytes were written.
    pub fn write(&self, buffer: &[u8]) -> Result<usize> {
        self.transaction(|transport| Transport::write(&mut **transport, buffer))
    }
}

impl fmt::Debug for I2cDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("I2cDevice")
            .field("bus", &self.bus)
            .field("address", &format_args!("{:#04x}", self.address))
            .field("transport", &format_args!("{{ .. }}"))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct I2cConfig {
    /// Bus character device.
    pub device: PathBuf,
    /// SDA and SCL, claimed while the bus is enabled.
    pub pins: Vec<Pin>,
}

impl Default for I2cConfig {
    fn default() -> I2cConfig {
        I2cConfig {
            device: PathBuf::from(PATH_DEV_I2C_1),
            pins: Vec::new(),
        }
    }
}

/// I2C module owning one bus.
#[derive(Debug)]
pub struct I2cBus {
    name: String,
    arbiter: Arbiter,
    config: Option<I2cConfig>,
    transport: SharedTransport,
    // Installed at the next enable instead of opening the device
    injected: Option<Box<dyn Transport>>,
    enabled: bool,
}

impl I2cBus {
    pub fn new(name: &str, arbiter: Arbiter) -> I2cBus {
        I2cBus {
            name: String::from(name),
            arbiter,
            config: None,
            transport: Arc::new(Mutex::new(None)),
            injected: None,
            enabled: false,
        }
    }

    /// Constructs a bus that uses `transport` instead of opening the
    /// configured device the first time it's enabled.
    pub fn from_transport(name: &str, arbiter: Arbiter, transport: Box<dyn Transport>) -> I2cBus {
        I2cBus {
            injected: Some(transport),
            ..I2cBus::new(name, arbiter)
        }
    }

    fn pins(&self) -> &[Pin] {
        match self.config {
            Some(ref config) => &config.pins,
            None => &[],
        }
    }
}

impl Configure for I2cBus {
    type Config = I2cConfig;

    fn set_configuration(&mut self, config: I2cConfig) -> Result<()> {
        if self.enabled {
            return Err(Error::InvalidConfiguration(format!("{} is enabled", self.name)));
        }

        self.config = Some(config);

        Ok(())
    }
}

impl Module for I2cBus {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::I2c
    }

    fn enable(&mut self) -> Result<()> {
        if self.enabled {
            return Ok(());
        }

        let config = self
            .config
            .as_ref()
            .ok_or_else(|| Error::NotConfigured(self.name.clone()))?;

        self.arbiter.assign_all(&config.pins, &self.name)?;

        let transport: Box<dyn Transport> = match self.injected.take() {
            Some(transport) => transport,
            None => match I2cDev::open(&config.device) {
                Ok(i2cdev) => Box::new(i2cdev),
                Err(e) => {
                    self.arbiter.release_all(&config.pins);
                    return Err(e);
                }
            },
        };

        *lock(&self.transport) = Some(transport);
        self.enabled = true;

        Ok(())
    }

    fn disable(&mut self) -> Result<()> {
        if self.enabled {
            // Closes the descriptor. Devices handed out earlier see an
            // empty slot from now on.
            lock(&self.transport).take();
            self.arbiter.release_all(self.pins());
            self.enabled = false;
        }

        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl I2cModule for I2cBus {
    fn device(&self, address: u16) -> Result<I2cDevice> {
        // Filter out reserved, invalid and 10-bit addresses
        if address < 8 || (address >> 3) == 0b1111 || address > 0x7F {
            return Err(Error::InvalidSlaveAddress(address));
        }

        if !self.enabled {
            return Err(Error::NotEnabled(self.name.clone()));
        }

        Ok(I2cDevice {
            bus: self.name.clone(),
            address,
            transport: Arc::clone(&self.transport),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::thread;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Select(u16),
        Smbus(SmbusReadWrite, u8, SmbusSize, SmbusData),
        Write(Vec<u8>),
    }

    #[derive(Debug)]
    struct Scripted {
        log: Arc<Mutex<Vec<Event>>>,
        replies: VecDeque<io::Result<SmbusData>>,
    }

    impl Transport for Scripted {
        fn select_slave(&mut self, address: u16) -> io::Result<()> {
            self.log.lock().unwrap().push(Event::Select(address));
            Ok(())
        }

        fn smbus(
            &mut self,
            read_write: SmbusReadWrite,
            command: u8,
            size: SmbusSize,
            data: &mut SmbusData,
        ) -> io::Result<()> {
            self.log
                .lock()
                .unwrap()
                .push(Event::Smbus(read_write, command, size, *data));

            match self.replies.pop_front() {
                Some(Ok(reply)) => {
                    if read_write == SmbusReadWrite::Read {
                        *data = reply;
                    }
                    Ok(())
                }
                Some(Err(e)) => Err(e),
                None => Ok(()),
            }
        }

        fn read(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
            buffer.fill(0xa5);
            Ok(buffer.len())
        }

        fn write(&mut self, buffer: &[u8]) -> io::Result<usize> {
            self.log.lock().unwrap().push(Event::Write(buffer.to_vec()));
            Ok(buffer.len())
        }
    }

    fn bus(replies: Vec<io::Result<SmbusData>>) -> (I2cBus, Arc<Mutex<Vec<Event>>>, Arbiter) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let arbiter = Arbiter::new();
        let transport = Scripted {
            log: Arc::clone(&log),
            replies: replies.into_iter().collect(),
        };

        let mut bus = I2cBus::from_transport("i2c1", arbiter.clone(), Box::new(transport));
        bus.set_configuration(I2cConfig {
            pins: vec![3, 5],
            ..Default::default()
        })
        .unwrap();
        bus.enable().unwrap();

        (bus, log, arbiter)
    }

    #[test]
    fn enable_claims_bus_pins() {
        let (mut bus, _, arbiter) = bus(Vec::new());
        assert_eq!(arbiter.owner(3).as_deref(), Some("i2c1"));
        assert_eq!(arbiter.owner(5).as_deref(), Some("i2c1"));

        bus.disable().unwrap();
        assert!(!arbiter.is_assigned(3));
        assert!(matches!(bus.device(0x40), Err(Error::NotEnabled(_))));
    }

    #[test]
    fn disable_closes_the_bus_for_existing_devices() {
        let (mut bus, log, arbiter) = bus(Vec::new());
        let device = bus.device(0x40).unwrap();

        bus.disable().unwrap();
        assert!(lock(&bus.transport).is_none());
        assert!(!arbiter.is_assigned(3));

        assert!(matches!(
            device.write_byte(1, 0xff),
            Err(Error::NotEnabled(ref name)) if name == "i2c1"
        ));
        assert!(matches!(device.read(&mut [0u8; 2]), Err(Error::NotEnabled(_))));
        assert!(log.lock().unwrap().is_empty());

        // Pins can now go to another module
        arbiter.assign(3, "gpio").unwrap();
        bus.disable().unwrap();
        assert_eq!(arbiter.owner(3).as_deref(), Some("gpio"));
    }

    #[test]
    fn missing_device_releases_pins() {
        let dir = tempfile::tempdir().unwrap();
        let arbiter = Arbiter::new();
        let mut bus = I2cBus::new("i2c1", arbiter.clone());
        bus.set_configuration(I2cConfig {
            device: dir.path().join("i2c-9"),
            pins: vec![3, 5],
        })
        .unwrap();

        assert!(matches!(bus.enable(), Err(Error::Io(_))));
        assert!(!arbiter.is_assigned(3));
        assert!(!bus.is_enabled());
    }

    #[test]
    fn reserved_addresses_are_refused() {
        let (bus, _, _) = bus(Vec::new());

        for &address in &[0x00, 0x07, 0x78, 0x7f, 0x80, 0x3ff] {
            assert!(matches!(
                bus.device(address),
                Err(Error::InvalidSlaveAddress(a)) if a == address
            ));
        }
        assert_eq!(bus.device(0x08).unwrap().address(), 0x08);
        assert_eq!(bus.device(0x77).unwrap().address(), 0x77);
    }

    #[test]
    fn block_read_returns_requested_bytes() {
        let reply = SmbusData::with_block(&[1, 2, 3, 4]);
        let (bus, log, _) = bus(vec![Ok(reply)]);
        let device = bus.device(0x40).unwrap();

        assert_eq!(device.read_block(0x10, 4).unwrap(), vec![1, 2, 3, 4]);

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0], Event::Select(0x40));
        match log[1] {
            Event::Smbus(SmbusReadWrite::Read, 0x10, SmbusSize::I2cBlockData, data) => {
                assert_eq!(data.data[0], 4)
            }
            ref other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn short_block_read_is_an_error() {
        let reply = SmbusData::with_block(&[1, 2]);
        let (bus, _, _) = bus(vec![Ok(reply)]);

        assert!(matches!(
            bus.device(0x40).unwrap().read_block(0x10, 4),
            Err(Error::ShortTransfer {
                expected: 4,
                actual: 2
            })
        ));
    }

    #[test]
    fn oversized_blocks_never_reach_the_bus() {
        let (bus, log, _) = bus(Vec::new());
        let device = bus.device(0x40).unwrap();

        assert!(matches!(device.read_block(0, 33), Err(Error::BlockTooLarge(33))));
        assert!(matches!(
            device.write_block(0, &[0u8; 33]),
            Err(Error::BlockTooLarge(33))
        ));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn os_error_propagates_without_retry() {
        let (bus, log, _) = bus(vec![Err(io::Error::from_raw_os_error(libc::EREMOTEIO))]);

        match bus.device(0x40).unwrap().read_byte(0x01) {
            Err(Error::Io(e)) => assert_eq!(e.raw_os_error(), Some(libc::EREMOTEIO)),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn writes_carry_expected_payloads() {
        let (bus, log, _) = bus(Vec::new());
        let device = bus.device(0x20).unwrap();

        device.write_byte(0x0a, 0xff).unwrap();
        device.write_word(0x02, 0x1234).unwrap();
        device.write_block(0x40, &[9, 8, 7]).unwrap();
        device.write(&[0x80, 0x01]).unwrap();

        let log = log.lock().unwrap();
        assert_eq!(
            log[1],
            Event::Smbus(
                SmbusReadWrite::Write,
                0x0a,
                SmbusSize::ByteData,
                SmbusData::with_byte(0xff)
            )
        );
        match log[3] {
            Event::Smbus(SmbusReadWrite::Write, 0x02, SmbusSize::WordData, data) => {
                assert_eq!(&data.data[..2], &[0x34, 0x12])
            }
            ref other => panic!("unexpected event: {:?}", other),
        }
        match log[5] {
            Event::Smbus(SmbusReadWrite::Write, 0x40, SmbusSize::I2cBlockData, data) => {
                assert_eq!(&data.data[..4], &[3, 9, 8, 7])
            }
            ref other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(log[7], Event::Write(vec![0x80, 0x01]));
    }

    #[test]
    fn reads_decode_replies() {
        let (bus, _, _) = bus(vec![
            Ok(SmbusData::with_byte(0x42)),
            Ok(SmbusData::with_word(0xbeef)),
        ]);
        let device = bus.device(0x48).unwrap();

        assert_eq!(device.read_byte(0x00).unwrap(), 0x42);
        assert_eq!(device.read_word(0x00).unwrap(), 0xbeef);

        let mut buffer = [0u8; 3];
        assert_eq!(device.read(&mut buffer).unwrap(), 3);
        assert_eq!(buffer, [0xa5; 3]);
    }

    #[test]
    fn select_and_transfer_do_not_interleave() {
        let (bus, log, _) = bus(Vec::new());

        let handles: Vec<_> = [0x20u16, 0x21]
            .iter()
            .map(|&address| {
                let device = bus.device(address).unwrap();
                thread::spawn(move || {
                    for i in 0..200 {
                        device.write_byte(address as u8, i as u8).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 800);
        for pair in log.chunks(2) {
            match (&pair[0], &pair[1]) {
                (Event::Select(address), Event::Smbus(_, command, _, _)) => {
                    assert_eq!(*address, u16::from(*command))
                }
                other => panic!("interleaved transaction: {:?}", other),
            }
        }
    }
}
