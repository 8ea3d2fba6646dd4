/// Chip identification register
pub const REG_CHIP_ID: u8 = 0xD0;
/// Soft reset register
pub const REG_RESET: u8 = 0xE0;
/// Humidity oversampling control
pub const REG_CTRL_HUM: u8 = 0xF2;
/// Device status
pub const REG_STATUS: u8 = 0xF3;
/// Temperature/pressure oversampling and mode control
pub const REG_CTRL_MEAS: u8 = 0xF4;
/// Standby time, IIR filter and SPI config
pub const REG_CONFIG: u8 = 0xF5;
/// First byte of the 8-byte burst read (press_msb .. hum_lsb)
pub const REG_PRESS_MSB: u8 = 0xF7;
/// First calibration block (0x88..=0xA1)
pub const REG_CALIB_00: u8 = 0x88;
/// Second calibration block (0xE1..=0xE7)
pub const REG_CALIB_26: u8 = 0xE1;

/// Length of the first calibration block
pub const CALIB_00_LEN: usize = 26;
/// Length of the second calibration block
pub const CALIB_26_LEN: usize = 7;
/// Length of the pressure/temperature/humidity data burst
pub const DATA_LEN: usize = 8;

/// Expected content of [`REG_CHIP_ID`]
pub const CHIP_ID: u8 = 0x60;
/// Value written to [`REG_RESET`] to trigger a power-on-reset sequence
pub const RESET_CMD: u8 = 0xB6;

/// `status.measuring`: set while a conversion is running
pub const STATUS_MEASURING: u8 = 0x08;

/// Humidity oversampling x1
pub const CTRL_HUM_SETTING: u8 = 0x01;
/// Temperature x1, pressure x1, normal mode
pub const CTRL_MEAS_SETTING: u8 = 0x27;
/// 1000 ms standby, filter off
pub const CONFIG_SETTING: u8 = 0xA0;

/// Raw temperature/pressure value reported when the channel holds no conversion
pub const ADC_TP_SKIPPED: i32 = 0x80000;
/// Raw humidity value reported when the channel holds no conversion
pub const ADC_H_SKIPPED: i32 = 0x8000;

/// I²C address, selected by the level of the SDO pin
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum I2cAddr {
    /// SDO tied to GND
    Primary,
    /// SDO tied to VDDIO
    Secondary,
}
impl I2cAddr {
    /// Addresses in the order discovery tries them
    pub const CANDIDATES: [I2cAddr; 2] = [I2cAddr::Primary, I2cAddr::Secondary];

    /// 7-bit bus address
    pub const fn as_u8(self) -> u8 {
        match self {
            I2cAddr::Primary => 0x76,
            I2cAddr::Secondary => 0x77,
        }
    }
}
