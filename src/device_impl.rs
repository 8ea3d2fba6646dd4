use crate::bus::*;
use crate::calibration::*;
use crate::hw_def::*;
use crate::types::*;

use embedded_hal::delay::DelayNs;

cfg_if::cfg_if! {
    if #[cfg(feature = "defmt")] {
        use defmt::{debug, info, trace, warn};
    } else if #[cfg(feature = "log")] {
        use log::{debug, info, trace, warn};
    } else {
        macro_rules! trace {
            ($($arg:tt)*) => {{ let _ = format_args!($($arg)*); }};
        }
        macro_rules! debug {
            ($($arg:tt)*) => {{ let _ = format_args!($($arg)*); }};
        }
        macro_rules! info {
            ($($arg:tt)*) => {{ let _ = format_args!($($arg)*); }};
        }
        macro_rules! warn {
            ($($arg:tt)*) => {{ let _ = format_args!($($arg)*); }};
        }
    }
}

/// Classify a failed transaction: a transfer that ran into its timeout is [`Error::Timeout`]
fn transport_error<B: I2cBus>(error: B::Error) -> Error<B::Error> {
    if B::is_timeout(&error) {
        Error::Timeout
    } else {
        Error::I2c(error)
    }
}

impl<B, L, Delay> Bme280<B, L, Delay>
where
    B: I2cBus,
    L: BusLock,
    Delay: DelayNs,
{
    /// Create a new driver with the default [`Config`]. Nothing touches the bus until [`Self::init`].
    pub fn new(bus: B, lock: L, delay: Delay) -> Self {
        Self::with_config(bus, lock, delay, Config::default())
    }

    /// Create a new driver with custom timeouts and retry counts
    pub fn with_config(bus: B, lock: L, delay: Delay, config: Config) -> Self {
        Self {
            bus,
            lock,
            delay,
            config,
            session: None,
            available: false,
            not_found_reported: false,
        }
    }

    /// The device is attached, identified, calibrated and configured
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Address the device was found at
    pub fn address(&self) -> Option<I2cAddr> {
        self.available_session().map(|s| s.address)
    }

    /// Calibration loaded by the last successful [`Self::init`]
    pub fn calibration(&self) -> Option<&CalibrationData> {
        self.available_session().map(|s| &s.calibration)
    }

    /// Timeouts and retry counts in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn available_session(&self) -> Option<&Session<B::Device>> {
        self.session.as_ref().filter(|_| self.available)
    }

    /// Find, identify, calibrate and configure the device.
    ///
    /// Tries [`I2cAddr::Primary`] then [`I2cAddr::Secondary`]; failures at one address are
    /// handled here and only [`Error::NotFound`] is reported when both fail. Does nothing when
    /// the device is already available.
    pub fn init(&mut self) -> Result<(), Error<B::Error>> {
        if self.available {
            return Ok(());
        }

        for addr in I2cAddr::CANDIDATES {
            match self.bring_up(addr) {
                Ok(()) => {
                    self.available = true;
                    self.not_found_reported = false;
                    info!("bme280: initialized at address {:#x}", addr.as_u8());
                    return Ok(());
                }
                Err(e) => {
                    debug!("bme280: no usable device at {:#x}: {:?}", addr.as_u8(), e.kind());
                }
            }
        }

        if !self.not_found_reported {
            warn!("bme280: not detected (checked 0x76, 0x77)");
            self.not_found_reported = true;
        }
        Err(Error::NotFound)
    }

    /// Read the status, the raw burst and compensate it.
    ///
    /// A transport failure or lock timeout drops the session: [`Self::is_available`] turns false
    /// and the next read fails with [`Error::InvalidState`] until [`Self::init`] succeeds again.
    /// A sample without a conversion fails with [`Error::InvalidResponse`] and keeps the session.
    pub fn read(&mut self) -> Result<Measurement, Error<B::Error>> {
        if !self.available {
            return Err(Error::InvalidState);
        }

        let mut status = [0u8; 1];
        self.read_registers_or_release(REG_STATUS, &mut status)?;
        if status[0] & STATUS_MEASURING != 0 {
            trace!("bme280: conversion running, status={:#x}", status[0]);
            self.delay.delay_ms(self.config.measuring_wait_ms);
        }

        let mut raw = [0u8; DATA_LEN];
        self.read_registers_or_release(REG_PRESS_MSB, &mut raw)?;
        let sample = RawSample::from_bytes(&raw);

        let calibration = match self.session.as_ref() {
            Some(session) => session.calibration,
            None => return Err(Error::InvalidState),
        };
        calibration.compensate(sample).map_err(|_| {
            debug!("bme280: skipped sample p={} t={}", sample.pressure, sample.temperature);
            Error::InvalidResponse
        })
    }

    /// Detach the device and mark the driver unavailable
    pub fn release(&mut self) {
        self.available = false;
        if let Some(session) = self.session.take() {
            self.bus.detach(session.device);
        }
    }

    /// Destroy the driver and return the bus, the lock and the delay
    pub fn free(mut self) -> (B, L, Delay) {
        self.release();
        (self.bus, self.lock, self.delay)
    }

    fn bring_up(&mut self, addr: I2cAddr) -> Result<(), Error<B::Error>> {
        self.probe(addr)?;

        let device_config = DeviceConfig {
            address: addr.as_u8(),
            scl_speed_hz: self.config.scl_speed_hz,
        };
        let device = self.bus.attach(&device_config).map_err(transport_error::<B>)?;
        self.session = Some(Session {
            device,
            address: addr,
            calibration: CalibrationData::default(),
        });

        let res = self.identify_and_setup();
        if res.is_err() {
            self.release();
        }
        res
    }

    fn identify_and_setup(&mut self) -> Result<(), Error<B::Error>> {
        self.verify_chip_id()?;

        let calibration = self.read_calibration()?;
        trace!("bme280: calibration loaded, dig_t1={}", calibration.dig_t1);
        if let Some(session) = self.session.as_mut() {
            session.calibration = calibration;
        }

        self.configure()
    }

    fn probe(&mut self, addr: I2cAddr) -> Result<(), Error<B::Error>> {
        let mut res = Err(Error::NotFound);
        for attempt in 0..self.config.probe_attempts {
            if attempt > 0 {
                self.delay.delay_ms(self.config.retry_delay_ms);
            }
            res = self.probe_once(addr);
            match &res {
                Ok(()) => break,
                Err(e) => trace!("bme280: probe {:#x} attempt {} failed: {:?}", addr.as_u8(), attempt, e.kind()),
            }
        }
        res
    }

    fn probe_once(&mut self, addr: I2cAddr) -> Result<(), Error<B::Error>> {
        let _guard = BusGuard::acquire::<B::Error>(&self.lock, self.config.lock_timeout_ms)?;
        self.bus
            .probe(addr.as_u8(), self.config.probe_timeout_ms)
            .map_err(transport_error::<B>)
    }

    fn verify_chip_id(&mut self) -> Result<(), Error<B::Error>> {
        let mut res = Err(Error::NotFound);
        for attempt in 0..self.config.chip_id_attempts {
            if attempt > 0 {
                self.delay.delay_ms(self.config.retry_delay_ms);
            }
            let mut chip_id = [0u8; 1];
            res = self.read_registers(REG_CHIP_ID, &mut chip_id);
            match &res {
                Ok(()) if chip_id[0] == CHIP_ID => return Ok(()),
                Ok(()) => {
                    debug!("bme280: unexpected chip id {:#x}", chip_id[0]);
                    return Err(Error::NotFound);
                }
                Err(e) => trace!("bme280: chip id attempt {} failed: {:?}", attempt, e.kind()),
            }
        }
        res
    }

    fn read_calibration(&mut self) -> Result<CalibrationData, Error<B::Error>> {
        let mut block0 = [0u8; CALIB_00_LEN];
        let mut block1 = [0u8; CALIB_26_LEN];
        self.read_registers(REG_CALIB_00, &mut block0)?;
        self.read_registers(REG_CALIB_26, &mut block1)?;
        Ok(CalibrationData::from_registers(&block0, &block1))
    }

    fn configure(&mut self) -> Result<(), Error<B::Error>> {
        self.write_register(REG_RESET, RESET_CMD)?;
        self.delay.delay_ms(self.config.reset_settle_ms);
        // ctrl_hum only latches on the following ctrl_meas write
        self.write_register(REG_CTRL_HUM, CTRL_HUM_SETTING)?;
        self.write_register(REG_CTRL_MEAS, CTRL_MEAS_SETTING)?;
        self.write_register(REG_CONFIG, CONFIG_SETTING)
    }

    fn read_registers_or_release(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), Error<B::Error>> {
        let res = self.read_registers(reg, buf);
        if let Err(e) = &res {
            warn!("bme280: read of {:#x} failed ({:?}), releasing device", reg, e.kind());
            self.release();
        }
        res
    }

    /// Read `buf.len()` bytes starting at `reg` under the bus lock
    fn read_registers(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), Error<B::Error>> {
        let Some(session) = self.session.as_mut() else {
            return Err(Error::InvalidArgument);
        };
        if buf.is_empty() {
            return Err(Error::InvalidArgument);
        }
        let _guard = BusGuard::acquire::<B::Error>(&self.lock, self.config.lock_timeout_ms)?;
        self.bus
            .write_read(&mut session.device, &[reg], buf, self.config.transfer_timeout_ms)
            .map_err(transport_error::<B>)
    }

    /// Write one register under the bus lock
    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), Error<B::Error>> {
        let Some(session) = self.session.as_mut() else {
            return Err(Error::InvalidArgument);
        };
        let _guard = BusGuard::acquire::<B::Error>(&self.lock, self.config.lock_timeout_ms)?;
        self.bus
            .write(&mut session.device, &[reg, value], self.config.transfer_timeout_ms)
            .map_err(transport_error::<B>)
    }
}
