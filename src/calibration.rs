//! Factory calibration and the fixed-point compensation formulas.
//!
//! The arithmetic follows the integer reference implementation in the BME280 datasheet
//! (section 4.2.3 and 8.2): 32-bit for temperature and humidity, 64-bit for pressure. The
//! shift amounts and widths fix the rounding of every result, so none of this may be turned
//! into floating point. Products use wrapping arithmetic so a corrupt calibration set yields
//! garbage instead of a panic, matching what the reference code does on two's-complement
//! targets.

use crate::hw_def::*;
use crate::types::{Measurement, RawSample};

#[cfg(feature = "defmt")]
use defmt::Format;

/// Upper clamp of the humidity accumulator, 100 %RH in Q22.10 before the final `>> 12`
const HUMIDITY_ACC_MAX: i32 = 419_430_400;

/// Per-unit trimming coefficients read from the device NVM
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[allow(missing_docs)]
pub struct CalibrationData {
    pub dig_t1: u16,
    pub dig_t2: i16,
    pub dig_t3: i16,
    pub dig_p1: u16,
    pub dig_p2: i16,
    pub dig_p3: i16,
    pub dig_p4: i16,
    pub dig_p5: i16,
    pub dig_p6: i16,
    pub dig_p7: i16,
    pub dig_p8: i16,
    pub dig_p9: i16,
    pub dig_h1: u8,
    pub dig_h2: i16,
    pub dig_h3: u8,
    pub dig_h4: i16,
    pub dig_h5: i16,
    pub dig_h6: i8,
}

/// Why a raw sample could not be compensated
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SampleError {
    /// temperature or pressure reported the "no conversion" value
    Skipped,
}

/// Sign-extend the 12-bit `dig_H4`/`dig_H5` fields
fn sign_extend_12(raw: u16) -> i16 {
    ((raw << 4) as i16) >> 4
}

impl CalibrationData {
    /// Decode the `0x88..=0xA1` and `0xE1..=0xE7` register blocks
    pub fn from_registers(block0: &[u8; CALIB_00_LEN], block1: &[u8; CALIB_26_LEN]) -> Self {
        let u16_at = |i: usize| u16::from_le_bytes([block0[i], block0[i + 1]]);
        let i16_at = |i: usize| i16::from_le_bytes([block0[i], block0[i + 1]]);
        Self {
            dig_t1: u16_at(0),
            dig_t2: i16_at(2),
            dig_t3: i16_at(4),
            dig_p1: u16_at(6),
            dig_p2: i16_at(8),
            dig_p3: i16_at(10),
            dig_p4: i16_at(12),
            dig_p5: i16_at(14),
            dig_p6: i16_at(16),
            dig_p7: i16_at(18),
            dig_p8: i16_at(20),
            dig_p9: i16_at(22),
            // 0xA0 is reserved
            dig_h1: block0[25],
            dig_h2: i16::from_le_bytes([block1[0], block1[1]]),
            dig_h3: block1[2],
            // 0xE5 is shared: low nibble belongs to H4, high nibble to H5
            dig_h4: sign_extend_12((block1[3] as u16) << 4 | (block1[4] & 0x0F) as u16),
            dig_h5: sign_extend_12((block1[5] as u16) << 4 | (block1[4] >> 4) as u16),
            dig_h6: block1[6] as i8,
        }
    }

    /// Compensate one raw sample.
    ///
    /// The fine temperature is computed first and feeds both the pressure and the humidity
    /// formula; it only lives for the duration of this call.
    pub fn compensate(&self, raw: RawSample) -> Result<Measurement, SampleError> {
        if raw.is_skipped() {
            return Err(SampleError::Skipped);
        }

        let t_fine = self.t_fine(raw.temperature);
        let centigrade = temperature_centi(t_fine) as f32 / 100.0;

        let pressure_hpa = match self.pressure_q24_8(raw.pressure, t_fine) {
            Some(p) => (p as f64 / 256.0) as f32 / 100.0,
            None => 0.0,
        };

        let humidity_percent = if raw.humidity == ADC_H_SKIPPED {
            0.0
        } else {
            (self.humidity_q22_10(raw.humidity, t_fine) as f32 / 1024.0).clamp(0.0, 100.0)
        };

        Ok(Measurement {
            centigrade,
            fahrenheit: centigrade * 1.8 + 32.0,
            humidity_percent,
            pressure_hpa,
        })
    }

    /// Fine temperature shared by the pressure and humidity formulas
    pub fn t_fine(&self, adc_t: i32) -> i32 {
        let t1 = self.dig_t1 as i32;
        let t2 = self.dig_t2 as i32;
        let t3 = self.dig_t3 as i32;

        let var1 = ((adc_t >> 3) - (t1 << 1)).wrapping_mul(t2) >> 11;
        let delta = (adc_t >> 4) - t1;
        let var2 = (delta.wrapping_mul(delta) >> 12).wrapping_mul(t3) >> 14;
        var1.wrapping_add(var2)
    }

    /// Pressure in Pa as Q24.8, `None` when the first-stage divisor is zero
    pub fn pressure_q24_8(&self, adc_p: i32, t_fine: i32) -> Option<i64> {
        let p1 = self.dig_p1 as i64;
        let p2 = self.dig_p2 as i64;
        let p3 = self.dig_p3 as i64;
        let p4 = self.dig_p4 as i64;
        let p5 = self.dig_p5 as i64;
        let p6 = self.dig_p6 as i64;
        let p7 = self.dig_p7 as i64;
        let p8 = self.dig_p8 as i64;
        let p9 = self.dig_p9 as i64;

        let mut var1 = t_fine as i64 - 128_000;
        let mut var2 = var1.wrapping_mul(var1).wrapping_mul(p6);
        var2 = var2.wrapping_add(var1.wrapping_mul(p5) << 17);
        var2 = var2.wrapping_add(p4 << 35);
        var1 = (var1.wrapping_mul(var1).wrapping_mul(p3) >> 8).wrapping_add(var1.wrapping_mul(p2) << 12);
        var1 = ((1i64 << 47).wrapping_add(var1)).wrapping_mul(p1) >> 33;
        if var1 == 0 {
            return None;
        }

        let mut p = 1_048_576 - adc_p as i64;
        p = ((p << 31).wrapping_sub(var2)).wrapping_mul(3125).wrapping_div(var1);
        var1 = p9.wrapping_mul(p >> 13).wrapping_mul(p >> 13) >> 25;
        var2 = p8.wrapping_mul(p) >> 19;
        Some((p.wrapping_add(var1).wrapping_add(var2) >> 8).wrapping_add(p7 << 4))
    }

    /// Relative humidity as Q22.10
    pub fn humidity_q22_10(&self, adc_h: i32, t_fine: i32) -> i32 {
        let h1 = self.dig_h1 as i32;
        let h2 = self.dig_h2 as i32;
        let h3 = self.dig_h3 as i32;
        let h4 = self.dig_h4 as i32;
        let h5 = self.dig_h5 as i32;
        let h6 = self.dig_h6 as i32;

        let v = t_fine.wrapping_sub(76_800);
        let x = ((adc_h << 14).wrapping_sub(h4 << 20).wrapping_sub(h5.wrapping_mul(v)).wrapping_add(16_384)) >> 15;
        let y = ((v.wrapping_mul(h6) >> 10).wrapping_mul((v.wrapping_mul(h3) >> 11) + 32_768) >> 10) + 2_097_152;
        let y = y.wrapping_mul(h2).wrapping_add(8_192) >> 14;
        let mut acc = x.wrapping_mul(y);
        acc = acc.wrapping_sub((((acc >> 15).wrapping_mul(acc >> 15) >> 7).wrapping_mul(h1)) >> 4);
        acc.clamp(0, HUMIDITY_ACC_MAX) >> 12
    }
}

/// Temperature in 0.01 °C
fn temperature_centi(t_fine: i32) -> i32 {
    t_fine.wrapping_mul(5).wrapping_add(128) >> 8
}
