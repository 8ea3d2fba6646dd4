use crate::bus::I2cBus;
use crate::calibration::CalibrationData;
use crate::hw_def::*;

use core::fmt;

#[cfg(feature = "defmt")]
use defmt::Format;

/// BME280 device driver
pub struct Bme280<B: I2cBus, L, Delay> {
    pub(crate) bus: B,
    pub(crate) lock: L,
    pub(crate) delay: Delay,
    pub(crate) config: Config,
    pub(crate) session: Option<Session<B::Device>>,
    pub(crate) available: bool,
    /// a "not found" warning was logged since the last successful init
    pub(crate) not_found_reported: bool,
}

/// Attached, identified and calibrated device
pub(crate) struct Session<D> {
    pub(crate) device: D,
    pub(crate) address: I2cAddr,
    pub(crate) calibration: CalibrationData,
}

/// All possible errors in this crate
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Debug)]
pub enum Error<E> {
    /// I²C communication error
    I2c(E),
    /// Register access without an attached device, or an empty transfer
    InvalidArgument,
    /// [`crate::Bme280::read`] called before a successful init
    InvalidState,
    /// The bus lock could not be taken in time, or a transfer hit its timeout
    Timeout,
    /// No BME280 answered at either address
    NotFound,
    /// The sample holds no conversion; the session stays valid
    InvalidResponse,
}

/// Error category, independent of the bus error type
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// see [`Error::I2c`]
    I2c(embedded_hal::i2c::ErrorKind),
    /// see [`Error::InvalidArgument`]
    InvalidArgument,
    /// see [`Error::InvalidState`]
    InvalidState,
    /// see [`Error::Timeout`]
    Timeout,
    /// see [`Error::NotFound`]
    NotFound,
    /// see [`Error::InvalidResponse`]
    InvalidResponse,
}

impl<E: embedded_hal::i2c::Error> Error<E> {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::I2c(e) => ErrorKind::I2c(e.kind()),
            Error::InvalidArgument => ErrorKind::InvalidArgument,
            Error::InvalidState => ErrorKind::InvalidState,
            Error::Timeout => ErrorKind::Timeout,
            Error::NotFound => ErrorKind::NotFound,
            Error::InvalidResponse => ErrorKind::InvalidResponse,
        }
    }
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::I2c(e) => write!(f, "I2C error: {e:?}"),
            Error::InvalidArgument => write!(f, "invalid argument"),
            Error::InvalidState => write!(f, "sensor not initialized"),
            Error::Timeout => write!(f, "bus timeout"),
            Error::NotFound => write!(f, "BME280 not found at 0x76 or 0x77"),
            Error::InvalidResponse => write!(f, "no conversion available"),
        }
    }
}

impl<E: fmt::Debug> core::error::Error for Error<E> {}

/// Raw ADC counts of one burst read
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RawSample {
    /// 20-bit pressure
    pub pressure: i32,
    /// 20-bit temperature
    pub temperature: i32,
    /// 16-bit humidity
    pub humidity: i32,
}
impl RawSample {
    /// Unpack the `press_msb..=hum_lsb` burst.
    ///
    /// Pressure and temperature are msb, lsb and the high nibble of xlsb; humidity is msb, lsb.
    pub fn from_bytes(raw: &[u8; DATA_LEN]) -> Self {
        Self {
            pressure: (raw[0] as i32) << 12 | (raw[1] as i32) << 4 | (raw[2] as i32) >> 4,
            temperature: (raw[3] as i32) << 12 | (raw[4] as i32) << 4 | (raw[5] as i32) >> 4,
            humidity: (raw[6] as i32) << 8 | raw[7] as i32,
        }
    }

    /// Either the temperature or the pressure channel holds no conversion
    pub fn is_skipped(&self) -> bool {
        self.temperature == ADC_TP_SKIPPED || self.pressure == ADC_TP_SKIPPED
    }
}

/// Compensated measurement
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Measurement {
    /// degrees centigrade
    pub centigrade: f32,
    /// degrees fahrenheit
    pub fahrenheit: f32,
    /// relative humidity in percent, within 0..=100
    pub humidity_percent: f32,
    /// pressure in hectopascal
    pub pressure_hpa: f32,
}

/// Timeouts, retry counts and delays used by the driver.
///
/// The defaults were tuned on a contended ESP32 bus shared with a touch controller and an IMU.
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Config {
    /// longest wait for the bus lock
    pub lock_timeout_ms: u32,
    /// timeout handed to [`crate::I2cBus::probe`]
    pub probe_timeout_ms: u32,
    /// timeout handed to register transfers
    pub transfer_timeout_ms: u32,
    /// probe attempts per candidate address
    pub probe_attempts: u8,
    /// chip-id read attempts per candidate address
    pub chip_id_attempts: u8,
    /// pause between two probe or chip-id attempts
    pub retry_delay_ms: u32,
    /// pause after the soft reset
    pub reset_settle_ms: u32,
    /// pause when the status register reports a running conversion
    pub measuring_wait_ms: u32,
    /// SCL clock used when attaching the device
    pub scl_speed_hz: u32,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 100,
            probe_timeout_ms: 100,
            transfer_timeout_ms: 60,
            probe_attempts: 3,
            chip_id_attempts: 3,
            retry_delay_ms: 10,
            reset_settle_ms: 5,
            measuring_wait_ms: 2,
            scl_speed_hz: 100_000,
        }
    }
}
impl Config {
    /// Upper bound of the time one [`crate::Bme280::init`] call can block, in milliseconds.
    ///
    /// Counts every lock wait, transfer timeout and delay of both candidate addresses.
    pub const fn worst_case_init_ms(&self) -> u32 {
        let probe_attempts = self.probe_attempts as u32;
        let chip_id_attempts = self.chip_id_attempts as u32;
        let probe = probe_attempts * (self.lock_timeout_ms + self.probe_timeout_ms)
            + probe_attempts.saturating_sub(1) * self.retry_delay_ms;
        let chip_id = chip_id_attempts * (self.lock_timeout_ms + self.transfer_timeout_ms)
            + chip_id_attempts.saturating_sub(1) * self.retry_delay_ms;
        // two calibration reads, four configuration writes
        let setup = 6 * (self.lock_timeout_ms + self.transfer_timeout_ms) + self.reset_settle_ms;
        I2cAddr::CANDIDATES.len() as u32 * (probe + chip_id + setup)
    }

    /// Upper bound of the time one [`crate::Bme280::read`] call can block, in milliseconds
    pub const fn worst_case_read_ms(&self) -> u32 {
        2 * (self.lock_timeout_ms + self.transfer_timeout_ms) + self.measuring_wait_ms
    }
}

/// [`Config::worst_case_init_ms`] of the default configuration
pub const DEFAULT_WORST_CASE_INIT_MS: u32 = 2 * (3 * 200 + 2 * 10 + 3 * 160 + 2 * 10 + 6 * 160 + 5);
