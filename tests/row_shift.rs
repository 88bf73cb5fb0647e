#![allow(missing_docs)]
//! Host-level tests for the bit-banged row shift and round-robin scanning.

use core::convert::Infallible;
use std::cell::RefCell;
use std::rc::Rc;

use embedded_hal::digital::{ErrorKind, ErrorType, OutputPin};
use tlc_mux::Error;
use tlc_mux::grayscale::GrayscaleRows;
use tlc_mux::pulse::{PULSE_TIMING_DEFAULT, PulseGenerator, PulseTiming, SimulatedPulses};
use tlc_mux::row_shift::{BitBangPort, RowScanner, SerialShiftPort, rows_needed_address_bits};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Line {
    Sin,
    Sclk,
    RowLatch,
    Address(usize),
}

type Log = Rc<RefCell<Vec<(Line, bool)>>>;

/// Output pin that records every level it is driven to.
struct FakePin {
    line: Line,
    log: Log,
}

impl ErrorType for FakePin {
    type Error = Infallible;
}

impl OutputPin for FakePin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.log.borrow_mut().push((self.line, false));
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.log.borrow_mut().push((self.line, true));
        Ok(())
    }
}

fn fake_port<const ADDRESS_BITS: usize>(log: &Log) -> BitBangPort<FakePin, ADDRESS_BITS> {
    let pin = |line| FakePin {
        line,
        log: Rc::clone(log),
    };
    BitBangPort::new(
        pin(Line::Sin),
        pin(Line::Sclk),
        pin(Line::RowLatch),
        core::array::from_fn(|bit| pin(Line::Address(bit))),
    )
}

/// What the chips and the row decoder saw, replayed from a pin log.
#[derive(Debug, Default)]
struct Wire {
    /// SIN level at each SCLK rising edge.
    bits: Vec<bool>,
    /// Row address on the address lines at each SCLK rising edge.
    address_at_clock: Vec<usize>,
    /// Number of bits clocked in when each row-latch rising edge happened.
    latch_after_bits: Vec<usize>,
    /// Row address at each row-latch rising edge.
    latch_address: Vec<usize>,
}

impl Wire {
    fn replay(log: &Log) -> Self {
        let mut wire = Self::default();
        let mut sin = false;
        let mut address = 0_usize;
        for &(line, high) in log.borrow().iter() {
            match line {
                Line::Sin => sin = high,
                Line::Address(bit) => {
                    address = (address & !(1 << bit)) | (usize::from(high) << bit);
                }
                Line::Sclk if high => {
                    wire.bits.push(sin);
                    wire.address_at_clock.push(address);
                }
                Line::RowLatch if high => {
                    wire.latch_after_bits.push(wire.bits.len());
                    wire.latch_address.push(address);
                }
                Line::Sclk | Line::RowLatch => {}
            }
        }
        wire
    }

    fn bytes(&self) -> Vec<u8> {
        self.bits
            .chunks(8)
            .map(|bits| bits.iter().fold(0, |byte, &bit| (byte << 1) | u8::from(bit)))
            .collect()
    }
}

/// Output pin whose every write fails.
struct BrokenPin;

impl ErrorType for BrokenPin {
    type Error = ErrorKind;
}

impl OutputPin for BrokenPin {
    fn set_low(&mut self) -> Result<(), ErrorKind> {
        Err(ErrorKind::Other)
    }

    fn set_high(&mut self) -> Result<(), ErrorKind> {
        Err(ErrorKind::Other)
    }
}

/// Port that remembers which rows were shifted.
#[derive(Default)]
struct RecordingPort {
    rows: Vec<usize>,
    bytes: usize,
}

impl SerialShiftPort for RecordingPort {
    type Error = Infallible;

    fn set_row_address(&mut self, row: usize) -> Result<(), Infallible> {
        self.rows.push(row);
        Ok(())
    }

    fn shift_byte(&mut self, _byte: u8) -> Result<(), Infallible> {
        self.bytes += 1;
        Ok(())
    }

    fn pulse_latch(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

fn test_pattern() -> GrayscaleRows<4, 48> {
    let mut rows = GrayscaleRows::new();
    for row in 0..4 {
        for channel in 0..32 {
            rows.set(row, channel, (row * 900 + channel * 37) as u16);
        }
    }
    rows
}

#[test]
fn rows_needed_address_bits_is_ceiling_log2() {
    assert_eq!(rows_needed_address_bits(1), 0);
    assert_eq!(rows_needed_address_bits(2), 1);
    assert_eq!(rows_needed_address_bits(4), 2);
    assert_eq!(rows_needed_address_bits(5), 3);
    assert_eq!(rows_needed_address_bits(8), 3);
    assert_eq!(rows_needed_address_bits(9), 4);
}

#[test]
fn shift_byte_sends_msb_first() {
    let log = Log::default();
    let mut port = fake_port::<2>(&log);
    port.shift_byte(0b1010_0001).unwrap();

    let wire = Wire::replay(&log);
    assert_eq!(
        wire.bits,
        [true, false, true, false, false, false, false, true]
    );
}

#[test]
fn sclk_returns_low_after_every_bit() {
    let log = Log::default();
    let mut port = fake_port::<2>(&log);
    port.shift_byte(0xFF).unwrap();

    let clock: Vec<bool> = log
        .borrow()
        .iter()
        .filter(|(line, _)| *line == Line::Sclk)
        .map(|&(_, high)| high)
        .collect();
    assert_eq!(clock.len(), 16);
    assert!(clock.chunks(2).all(|pair| pair == [true, false]));
}

#[test]
fn row_address_is_binary_on_the_address_lines() {
    let log = Log::default();
    let mut port = fake_port::<3>(&log);
    port.set_row_address(5).unwrap();

    let levels: Vec<(Line, bool)> = log
        .borrow()
        .iter()
        .copied()
        .filter(|(line, _)| matches!(line, Line::Address(_)))
        .collect();
    assert_eq!(
        levels,
        [
            (Line::Address(0), true),
            (Line::Address(1), false),
            (Line::Address(2), true)
        ]
    );
}

#[test]
#[should_panic(expected = "row does not fit the address lines")]
fn row_address_beyond_the_lines_panics() {
    let log = Log::default();
    let mut port = fake_port::<2>(&log);
    let _ = port.set_row_address(4);
}

#[test]
fn shift_row_sends_the_whole_chain_under_a_stable_address() {
    let rows = test_pattern();
    for row in 0..4 {
        let log = Log::default();
        let mut port = fake_port::<2>(&log);
        RowScanner::<4>::shift_row(&rows, row, &mut port).unwrap();

        let wire = Wire::replay(&log);
        assert_eq!(wire.bytes(), rows.row_bytes(row));
        assert_eq!(wire.bits.len(), 48 * 8);
        assert!(wire.address_at_clock.iter().all(|&address| address == row));
        assert_eq!(wire.latch_after_bits, [48 * 8]);
        assert_eq!(wire.latch_address, [row]);
    }
}

#[test]
fn on_boundary_rearms_latch_after_the_shift() {
    let rows = test_pattern();
    let mut scanner = RowScanner::<4>::new();
    let mut port = RecordingPort::default();
    let mut pulses = SimulatedPulses::new(PULSE_TIMING_DEFAULT);

    pulses.disarm_latch();
    assert_eq!(scanner.on_boundary(&rows, &mut port, &mut pulses).unwrap(), 0);
    assert!(pulses.latch_armed());
    assert_eq!(port.bytes, 48);
    assert_eq!(scanner.next_row(), 1);
}

#[test]
fn every_row_is_shifted_once_per_row_count_boundaries() {
    let timing = PulseTiming::new(16, 4, 2, 1).unwrap();
    let rows = GrayscaleRows::<4, 24>::filled(1);
    let mut scanner = RowScanner::<4>::new();
    let mut port = RecordingPort::default();
    let mut pulses = SimulatedPulses::new(timing);
    pulses.start();

    for _ in 0..40 {
        pulses.tick_until_boundary();
        assert!(pulses.take_boundary());
        scanner.on_boundary(&rows, &mut port, &mut pulses).unwrap();
    }

    assert_eq!(pulses.missed_boundaries(), 0);
    for row in 0..4 {
        let shifts: Vec<usize> = (0..port.rows.len())
            .filter(|&boundary| port.rows[boundary] == row)
            .collect();
        assert_eq!(shifts.len(), 10, "row {row}");
        assert!(shifts.windows(2).all(|pair| pair[1] - pair[0] == 4));
    }
}

#[test]
fn single_row_is_shifted_every_boundary() {
    let rows = GrayscaleRows::<1, 24>::new();
    let mut scanner = RowScanner::<1>::new();
    let mut port = RecordingPort::default();
    let mut pulses = SimulatedPulses::new(PULSE_TIMING_DEFAULT);

    for _ in 0..3 {
        assert_eq!(scanner.on_boundary(&rows, &mut port, &mut pulses).unwrap(), 0);
    }
    assert_eq!(port.rows, [0, 0, 0]);
}

#[test]
fn pin_failure_keeps_latch_disarmed_and_row_pending() {
    let rows = GrayscaleRows::<2, 24>::new();
    let mut scanner = RowScanner::<2>::new();
    let mut port = BitBangPort::new(BrokenPin, BrokenPin, BrokenPin, [BrokenPin]);
    let mut pulses = SimulatedPulses::new(PULSE_TIMING_DEFAULT);

    let result = scanner.on_boundary(&rows, &mut port, &mut pulses);
    assert!(matches!(result, Err(Error::CannotSetOutputState)));
    assert!(!pulses.latch_armed());
    assert_eq!(scanner.next_row(), 0);
}

#[test]
fn into_parts_returns_the_pins() {
    let log = Log::default();
    let port = fake_port::<2>(&log);
    let (sin, sclk, row_latch, address) = port.into_parts();
    assert_eq!(sin.line, Line::Sin);
    assert_eq!(sclk.line, Line::Sclk);
    assert_eq!(row_latch.line, Line::RowLatch);
    assert_eq!(address[1].line, Line::Address(1));
}
