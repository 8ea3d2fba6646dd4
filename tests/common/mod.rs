#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use bme280_bus::{BusLock, CalibrationData, DeviceConfig, I2cBus, CALIB_00_LEN, CALIB_26_LEN};
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};

/// Datasheet worked example (T, P) plus typical humidity trims
pub const REFERENCE: CalibrationData = CalibrationData {
    dig_t1: 27504,
    dig_t2: 26435,
    dig_t3: -1000,
    dig_p1: 36477,
    dig_p2: -10685,
    dig_p3: 3024,
    dig_p4: 2855,
    dig_p5: 140,
    dig_p6: -7,
    dig_p7: 15500,
    dig_p8: -14600,
    dig_p9: 6000,
    dig_h1: 75,
    dig_h2: 362,
    dig_h3: 0,
    dig_h4: 313,
    dig_h5: 50,
    dig_h6: 30,
};

/// adc_P = 415148, adc_T = 519888, adc_H = 30000
pub const REFERENCE_DATA: [u8; 8] = [0x65, 0x5A, 0xC0, 0x7E, 0xED, 0x00, 0x75, 0x30];

pub fn calibration_blocks(cal: &CalibrationData) -> ([u8; CALIB_00_LEN], [u8; CALIB_26_LEN]) {
    let mut block0 = [0u8; CALIB_00_LEN];
    let words: [u16; 12] = [
        cal.dig_t1,
        cal.dig_t2 as u16,
        cal.dig_t3 as u16,
        cal.dig_p1,
        cal.dig_p2 as u16,
        cal.dig_p3 as u16,
        cal.dig_p4 as u16,
        cal.dig_p5 as u16,
        cal.dig_p6 as u16,
        cal.dig_p7 as u16,
        cal.dig_p8 as u16,
        cal.dig_p9 as u16,
    ];
    for (ii, word) in words.iter().enumerate() {
        block0[ii * 2..ii * 2 + 2].copy_from_slice(&word.to_le_bytes());
    }
    block0[25] = cal.dig_h1;

    let h4 = cal.dig_h4 as u16 & 0x0FFF;
    let h5 = cal.dig_h5 as u16 & 0x0FFF;
    let h2 = cal.dig_h2.to_le_bytes();
    let block1 = [
        h2[0],
        h2[1],
        cal.dig_h3,
        (h4 >> 4) as u8,
        (h4 & 0x0F) as u8 | ((h5 & 0x0F) << 4) as u8,
        (h5 >> 4) as u8,
        cal.dig_h6 as u8,
    ];
    (block0, block1)
}

/// Register file of one simulated BME280
pub fn reference_registers(chip_id: u8) -> [u8; 256] {
    let mut regs = [0u8; 256];
    let (block0, block1) = calibration_blocks(&REFERENCE);
    regs[0x88..0x88 + CALIB_00_LEN].copy_from_slice(&block0);
    regs[0xE1..0xE1 + CALIB_26_LEN].copy_from_slice(&block1);
    regs[0xD0] = chip_id;
    regs[0xF7..0xFF].copy_from_slice(&REFERENCE_DATA);
    regs
}

#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    Probe(u8),
    Attach(u8, u32),
    WriteRead(u8, u8, usize),
    Write(u8, Vec<u8>),
    Detach(u8),
}

#[derive(Default)]
pub struct BusState {
    /// simulated devices and their register files
    pub chips: Vec<(u8, [u8; 256])>,
    /// probes that fail before the bus starts answering
    pub probe_failures: u32,
    /// transfers that fail before the bus starts answering
    pub transfer_failures: u32,
    /// every transfer fails
    pub wedged: bool,
    /// reads starting at this register fail
    pub failing_register: Option<u8>,
    /// every transfer runs into its timeout
    pub stalled: bool,
    pub ops: Vec<Op>,
}
impl BusState {
    fn chip(&mut self, address: u8) -> Option<&mut [u8; 256]> {
        self.chips.iter_mut().find(|(a, _)| *a == address).map(|(_, regs)| regs)
    }

    fn transfer_fails(&mut self) -> bool {
        if self.wedged {
            return true;
        }
        if self.transfer_failures > 0 {
            self.transfer_failures -= 1;
            return true;
        }
        false
    }

    pub fn attached(&self) -> usize {
        self.ops.iter().filter(|op| matches!(op, Op::Attach(..))).count()
    }

    pub fn detached(&self) -> usize {
        self.ops.iter().filter(|op| matches!(op, Op::Detach(..))).count()
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Write(_, bytes) => Some(bytes.clone()),
                _ => None,
            })
            .collect()
    }
}

/// Scripted bus; the test keeps a clone of `state` to inject faults and inspect traffic
#[derive(Clone, Default)]
pub struct FakeBus {
    pub state: Rc<RefCell<BusState>>,
}
impl FakeBus {
    pub fn with_chip(address: u8, chip_id: u8) -> Self {
        let bus = Self::default();
        bus.state.borrow_mut().chips.push((address, reference_registers(chip_id)));
        bus
    }

    pub fn set(&self, address: u8, reg: u8, bytes: &[u8]) {
        let mut state = self.state.borrow_mut();
        let regs = state.chip(address).expect("no chip at address");
        regs[reg as usize..reg as usize + bytes.len()].copy_from_slice(bytes);
    }
}

const NACK: ErrorKind = ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address);
/// what a transfer reports after its `timeout_ms`
const STALLED: ErrorKind = ErrorKind::Other;

impl I2cBus for FakeBus {
    type Error = ErrorKind;
    type Device = u8;

    fn probe(&mut self, address: u8, _timeout_ms: u32) -> Result<(), ErrorKind> {
        let mut state = self.state.borrow_mut();
        state.ops.push(Op::Probe(address));
        if state.probe_failures > 0 {
            state.probe_failures -= 1;
            return Err(NACK);
        }
        state.chip(address).map(|_| ()).ok_or(NACK)
    }

    fn attach(&mut self, config: &DeviceConfig) -> Result<u8, ErrorKind> {
        self.state.borrow_mut().ops.push(Op::Attach(config.address, config.scl_speed_hz));
        Ok(config.address)
    }

    fn write_read(&mut self, device: &mut u8, bytes: &[u8], buf: &mut [u8], _timeout_ms: u32) -> Result<(), ErrorKind> {
        let mut state = self.state.borrow_mut();
        state.ops.push(Op::WriteRead(*device, bytes[0], buf.len()));
        if state.stalled {
            return Err(STALLED);
        }
        if state.transfer_fails() || state.failing_register == Some(bytes[0]) {
            return Err(ErrorKind::Bus);
        }
        let regs = state.chip(*device).ok_or(NACK)?;
        let start = bytes[0] as usize;
        buf.copy_from_slice(&regs[start..start + buf.len()]);
        Ok(())
    }

    fn write(&mut self, device: &mut u8, bytes: &[u8], _timeout_ms: u32) -> Result<(), ErrorKind> {
        let mut state = self.state.borrow_mut();
        state.ops.push(Op::Write(*device, bytes.to_vec()));
        if state.stalled {
            return Err(STALLED);
        }
        if state.transfer_fails() {
            return Err(ErrorKind::Bus);
        }
        state.chip(*device).map(|_| ()).ok_or(NACK)
    }

    fn detach(&mut self, device: u8) {
        self.state.borrow_mut().ops.push(Op::Detach(device));
    }

    fn is_timeout(error: &ErrorKind) -> bool {
        *error == STALLED
    }
}

/// Lock that counts acquisitions and can be told to time out
#[derive(Default)]
pub struct CountingLock {
    pub refuse: Cell<bool>,
    /// refuse once this many acquisitions were granted
    pub grant_limit: Cell<Option<u32>>,
    pub held: Cell<u32>,
    pub taken: Cell<u32>,
}
impl BusLock for CountingLock {
    fn try_lock(&self, _timeout_ms: u32) -> bool {
        if self.refuse.get() || self.grant_limit.get().is_some_and(|limit| self.taken.get() >= limit) {
            return false;
        }
        assert_eq!(self.held.get(), 0, "lock taken twice");
        self.held.set(1);
        self.taken.set(self.taken.get() + 1);
        true
    }
    fn unlock(&self) {
        assert_eq!(self.held.get(), 1, "unlock without lock");
        self.held.set(0);
    }
}

/// Delay that records the requested milliseconds
#[derive(Clone, Default)]
pub struct RecordingDelay {
    pub total_ms: Rc<Cell<u32>>,
    pub calls: Rc<RefCell<Vec<u32>>>,
}
impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.delay_ms(ns / 1_000_000);
    }
    fn delay_ms(&mut self, ms: u32) {
        self.total_ms.set(self.total_ms.get() + ms);
        self.calls.borrow_mut().push(ms);
    }
}
