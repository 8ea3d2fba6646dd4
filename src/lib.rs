//! This is a platform-agnostic Rust driver for the Bosch BME280 humidity, pressure and
//! temperature sensor sitting on an I²C bus shared with other devices. Register access goes
//! through the [`I2cBus`] and [`BusLock`] seams so every transaction is serialized against the
//! other bus clients, and delays use the [`embedded-hal`] traits.
//!
//! [`embedded-hal`]: https://github.com/rust-embedded/embedded-hal/tree/master/embedded-hal
//!
//! This driver allows you to:
//! - Discover the device at either of its two addresses, with bounded probe and chip-id retries.
//! - Load the factory calibration and configure normal mode (x1 oversampling, 1 s standby).
//! - Read compensated temperature, relative humidity and pressure.
//! - Recover from a wedged bus: a failed read drops the session and the next `init` rediscovers.
//! - Run the integer compensation formulas on their own through [`CalibrationData`].
//!
//! This driver does not yet support the following device features:
//! - SPI.
//! - Forced mode, other oversampling settings and the IIR filter.
//!
//! ## Features
//!
//! - `defmt`: Enables logging using the `defmt` framework.
//! - `log`: Enables logging using the `log` framework.
//!
//! Datasheet:
//!   [BME280](https://www.bosch-sensortec.com/media/boschsensortec/downloads/datasheets/bst-bme280-ds002.pdf)
//!
//! ## Example:
//!
//! ```ignore
//! use bme280_bus::{Bme280, HalBus, NoLock};
//!
//! // Platform-specific
//! let i2c = /* embedded_hal::i2c::I2c instance */;
//! let delay = /* embedded_hal::delay::DelayNs instance */;
//!
//! let mut bme280 = Bme280::new(HalBus::new(i2c), NoLock, delay);
//!
//! loop {
//!     if !bme280.is_available() && bme280.init().is_err() {
//!         sleep_secs(30);
//!         continue;
//!     }
//!     match bme280.read() {
//!         Ok(m) => println!("{:0.1} °C, {:0.0} %RH, {:0.1} hPa",
//!             m.centigrade, m.humidity_percent, m.pressure_hpa),
//!         // a transport failure already dropped the session, init runs again next round
//!         Err(e) => println!("{e}"),
//!     }
//!     sleep_secs(5);
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![no_std]

#[cfg(all(feature = "defmt", feature = "log"))]
compile_error!("Features \"defmt\" and \"log\" are mutually exclusive and cannot be enabled together");

mod bus;
mod calibration;
mod device_impl;
mod hw_def;
mod types;

pub use crate::{bus::*, calibration::*, hw_def::*, types::*};
