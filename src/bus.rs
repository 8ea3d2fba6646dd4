//! Host-side seams: the shared bus, the bus lock and the scoped guard around it.

use embedded_hal::i2c::{ErrorType, I2c};

use crate::types::Error;

/// Parameters used to register a device on the bus
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DeviceConfig {
    /// 7-bit device address
    pub address: u8,
    /// SCL clock in Hz
    pub scl_speed_hz: u32,
}

/// A shared I²C bus able to probe addresses and hand out per-device handles.
///
/// Every method is a single bus transaction bounded by `timeout_ms`. The driver takes the
/// [`BusLock`] around each call except [`I2cBus::attach`] and [`I2cBus::detach`], which only
/// register or unregister the device.
pub trait I2cBus {
    /// Transport error
    type Error: embedded_hal::i2c::Error;
    /// Handle of one attached device
    type Device;

    /// Check whether something acknowledges `address`
    fn probe(&mut self, address: u8, timeout_ms: u32) -> Result<(), Self::Error>;

    /// Register a device
    fn attach(&mut self, config: &DeviceConfig) -> Result<Self::Device, Self::Error>;

    /// Write `bytes`, then read `buf.len()` bytes in one combined transaction
    fn write_read(
        &mut self,
        device: &mut Self::Device,
        bytes: &[u8],
        buf: &mut [u8],
        timeout_ms: u32,
    ) -> Result<(), Self::Error>;

    /// Write `bytes`
    fn write(&mut self, device: &mut Self::Device, bytes: &[u8], timeout_ms: u32) -> Result<(), Self::Error>;

    /// Unregister a device
    fn detach(&mut self, device: Self::Device);

    /// `error` means the transaction ran into its `timeout_ms`.
    ///
    /// [`embedded_hal::i2c::ErrorKind`] has no timeout variant, so hosts that can tell a stalled
    /// transfer apart from a NACK or an arbitration loss override this. The driver then reports
    /// [`Error::Timeout`] instead of [`Error::I2c`].
    fn is_timeout(error: &Self::Error) -> bool {
        let _ = error;
        false
    }
}

/// Mutual exclusion shared by every client of the bus
pub trait BusLock {
    /// Try to take the lock, waiting at most `timeout_ms`
    fn try_lock(&self, timeout_ms: u32) -> bool;
    /// Release a lock taken with [`BusLock::try_lock`]
    fn unlock(&self);
}

impl<L: BusLock + ?Sized> BusLock for &L {
    fn try_lock(&self, timeout_ms: u32) -> bool {
        (**self).try_lock(timeout_ms)
    }
    fn unlock(&self) {
        (**self).unlock()
    }
}

/// Lock for a bus the driver owns exclusively
#[derive(Clone, Copy, Debug, Default)]
pub struct NoLock;
impl BusLock for NoLock {
    fn try_lock(&self, _timeout_ms: u32) -> bool {
        true
    }
    fn unlock(&self) {}
}

/// Holds the bus lock until dropped
#[must_use]
pub struct BusGuard<'a, L: BusLock> {
    lock: &'a L,
}
impl<'a, L: BusLock> BusGuard<'a, L> {
    /// Take `lock` or fail with [`Error::Timeout`]
    pub fn acquire<E>(lock: &'a L, timeout_ms: u32) -> Result<Self, Error<E>> {
        if lock.try_lock(timeout_ms) {
            Ok(Self { lock })
        } else {
            Err(Error::Timeout)
        }
    }
}
impl<L: BusLock> Drop for BusGuard<'_, L> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}

/// Adapts a plain [`embedded_hal::i2c::I2c`] implementation to [`I2cBus`].
///
/// The device handle is the address itself and the timeouts are whatever the HAL applies.
/// Probing is a zero-length write.
#[derive(Debug)]
pub struct HalBus<I2C> {
    i2c: I2C,
}
impl<I2C> HalBus<I2C> {
    /// Wrap `i2c`
    pub fn new(i2c: I2C) -> Self {
        Self { i2c }
    }
    /// Return the wrapped bus
    pub fn into_inner(self) -> I2C {
        self.i2c
    }
}
impl<I2C: I2c> I2cBus for HalBus<I2C> {
    type Error = <I2C as ErrorType>::Error;
    type Device = u8;

    fn probe(&mut self, address: u8, _timeout_ms: u32) -> Result<(), Self::Error> {
        self.i2c.write(address, &[])
    }

    fn attach(&mut self, config: &DeviceConfig) -> Result<u8, Self::Error> {
        Ok(config.address)
    }

    fn write_read(&mut self, device: &mut u8, bytes: &[u8], buf: &mut [u8], _timeout_ms: u32) -> Result<(), Self::Error> {
        self.i2c.write_read(*device, bytes, buf)
    }

    fn write(&mut self, device: &mut u8, bytes: &[u8], _timeout_ms: u32) -> Result<(), Self::Error> {
        self.i2c.write(*device, bytes)
    }

    fn detach(&mut self, _device: u8) {}
}
