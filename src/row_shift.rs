//! Shifting one row at a time into a multiplexed TLC5940 chain.
//!
//! Every cycle boundary, [`RowScanner`] picks the next row (round robin), puts its address on
//! the row-select lines, shifts the row's packed bytes MSB first, strobes the row latch, and
//! re-arms XLAT so the coming latch pulse commits the row while BLANK is asserted.
//!
//! The wire side is the [`SerialShiftPort`] capability; [`BitBangPort`] implements it on plain
//! GPIO pins.

use embedded_hal::digital::{OutputPin, PinState};

use crate::grayscale::GrayscaleRows;
use crate::pulse::{PulseGenerator, PulseTiming};
use crate::{Error, Result};

/// Upper estimate of pulse-timer ticks one bit costs in [`BitBangPort::shift_byte`] on an RP2040
/// release build at PWM divider 1 (system clock cycles): three SIO writes plus the loop.
pub const BIT_BANG_TICKS_PER_BIT: u32 = 24;

/// Check that a [`BitBangPort`] can shift a `row_bytes` row within one period of `timing`.
///
/// # Errors
///
/// Returns [`Error::ShiftExceedsPeriod`] when it cannot.
pub const fn check_bit_bang_budget(timing: &PulseTiming, row_bytes: usize) -> Result<()> {
    timing.check_shift_budget(row_bytes, BIT_BANG_TICKS_PER_BIT)
}

/// Address lines needed to select one of `row_count` rows in binary.
#[must_use]
pub const fn rows_needed_address_bits(row_count: usize) -> usize {
    assert!(row_count > 0, "row_count must be positive");
    (usize::BITS - (row_count - 1).leading_zeros()) as usize
}

// ============================================================================
// SerialShiftPort
// ============================================================================

/// The serial lines of a row-multiplexed chip chain.
pub trait SerialShiftPort {
    /// Error reported by the underlying lines.
    type Error;

    /// Present `row` on the row-select lines. The address stays stable until the next call.
    ///
    /// # Errors
    ///
    /// Returns an error if a line cannot be driven.
    fn set_row_address(&mut self, row: usize) -> Result<(), Self::Error>;

    /// Shift `byte` into the chain, most significant bit first.
    ///
    /// # Errors
    ///
    /// Returns an error if a line cannot be driven.
    fn shift_byte(&mut self, byte: u8) -> Result<(), Self::Error>;

    /// Strobe the row latch so the address decoder routes the coming XLAT to the addressed row.
    ///
    /// # Errors
    ///
    /// Returns an error if a line cannot be driven.
    fn pulse_latch(&mut self) -> Result<(), Self::Error>;
}

// ============================================================================
// BitBangPort
// ============================================================================

/// [`SerialShiftPort`] on GPIO outputs.
///
/// - `sin` / `sclk`: serial data and clock of the chip chain. SCLK idles low; each bit is data
///   level, SCLK high, SCLK low.
/// - `row_latch`: idles low, pulsed high once the row has been shifted.
/// - `address`: `ADDRESS_BITS` row-select lines carrying the row number in binary, bit 0 first.
///   They hold one value for the whole shift of a row.
///
/// Works with any [`embedded_hal::digital::OutputPin`], such as `embassy_rp::gpio::Output`.
pub struct BitBangPort<P, const ADDRESS_BITS: usize> {
    sin: P,
    sclk: P,
    row_latch: P,
    address: [P; ADDRESS_BITS],
}

impl<P: OutputPin, const ADDRESS_BITS: usize> BitBangPort<P, ADDRESS_BITS> {
    /// Rows these address lines can select.
    pub const ROW_CAPACITY: usize = 1 << ADDRESS_BITS;

    /// Create the port from its pins.
    #[must_use]
    pub const fn new(sin: P, sclk: P, row_latch: P, address: [P; ADDRESS_BITS]) -> Self {
        Self {
            sin,
            sclk,
            row_latch,
            address,
        }
    }

    /// Give the pins back.
    #[must_use]
    pub fn into_parts(self) -> (P, P, P, [P; ADDRESS_BITS]) {
        (self.sin, self.sclk, self.row_latch, self.address)
    }
}

fn drive<P: OutputPin>(pin: &mut P, state: PinState) -> Result<()> {
    pin.set_state(state).map_err(|_| Error::CannotSetOutputState)
}

impl<P: OutputPin, const ADDRESS_BITS: usize> SerialShiftPort for BitBangPort<P, ADDRESS_BITS> {
    type Error = Error;

    fn set_row_address(&mut self, row: usize) -> Result<()> {
        assert!(row < Self::ROW_CAPACITY, "row does not fit the address lines");
        drive(&mut self.row_latch, PinState::Low)?;
        for (bit, pin) in self.address.iter_mut().enumerate() {
            drive(pin, PinState::from((row >> bit) & 1 == 1))?;
        }
        Ok(())
    }

    fn shift_byte(&mut self, byte: u8) -> Result<()> {
        for bit in (0..u8::BITS).rev() {
            drive(&mut self.sin, PinState::from((byte >> bit) & 1 == 1))?;
            drive(&mut self.sclk, PinState::High)?;
            drive(&mut self.sclk, PinState::Low)?;
        }
        Ok(())
    }

    fn pulse_latch(&mut self) -> Result<()> {
        drive(&mut self.row_latch, PinState::High)?;
        drive(&mut self.row_latch, PinState::Low)
    }
}

// ============================================================================
// RowScanner
// ============================================================================

/// Round-robin row selection and the per-boundary shift sequence.
///
/// Each call to [`on_boundary`](Self::on_boundary) shifts exactly one row, so with `ROW_COUNT`
/// rows every row is refreshed once every `ROW_COUNT` periods.
///
/// ```rust
/// use core::convert::Infallible;
/// use tlc_mux::grayscale::GrayscaleRows;
/// use tlc_mux::pulse::{PULSE_TIMING_DEFAULT, SimulatedPulses};
/// use tlc_mux::row_shift::{RowScanner, SerialShiftPort};
///
/// // Counts bytes instead of driving pins.
/// #[derive(Default)]
/// struct CountingPort(usize);
///
/// impl SerialShiftPort for CountingPort {
///     type Error = Infallible;
///     fn set_row_address(&mut self, _row: usize) -> Result<(), Infallible> { Ok(()) }
///     fn shift_byte(&mut self, _byte: u8) -> Result<(), Infallible> { self.0 += 1; Ok(()) }
///     fn pulse_latch(&mut self) -> Result<(), Infallible> { Ok(()) }
/// }
///
/// let rows = GrayscaleRows::<2, 48>::filled(100);
/// let mut scanner = RowScanner::<2>::new();
/// let mut port = CountingPort::default();
/// let mut pulses = SimulatedPulses::new(PULSE_TIMING_DEFAULT);
///
/// assert_eq!(scanner.on_boundary(&rows, &mut port, &mut pulses).unwrap(), 0);
/// assert_eq!(scanner.on_boundary(&rows, &mut port, &mut pulses).unwrap(), 1);
/// assert_eq!(scanner.next_row(), 0);
/// assert_eq!(port.0, 96);
/// assert!(pulses.latch_armed());
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RowScanner<const ROW_COUNT: usize> {
    next_row: usize,
}

impl<const ROW_COUNT: usize> RowScanner<ROW_COUNT> {
    /// Create a scanner that starts at row 0.
    #[must_use]
    pub const fn new() -> Self {
        assert!(ROW_COUNT > 0, "ROW_COUNT must be positive");
        Self { next_row: 0 }
    }

    /// The row the next boundary will shift.
    #[must_use]
    pub const fn next_row(&self) -> usize {
        self.next_row
    }

    /// Handle one cycle boundary: shift the next row and advance. Returns the row shifted.
    ///
    /// # Errors
    ///
    /// Returns the port's error if a line cannot be driven. See [`shift_next`](Self::shift_next).
    pub fn on_boundary<const ROW_BYTES: usize, Port, Pulses>(
        &mut self,
        rows: &GrayscaleRows<ROW_COUNT, ROW_BYTES>,
        port: &mut Port,
        pulses: &mut Pulses,
    ) -> Result<usize>
    where
        Port: SerialShiftPort,
        Error: From<Port::Error>,
        Pulses: PulseGenerator,
    {
        self.shift_next(rows.row_bytes(self.next_row), port, pulses)
    }

    /// Shift `bytes` as the contents of [`next_row`](Self::next_row) and advance. Returns the
    /// row shifted.
    ///
    /// XLAT is disarmed before the shift and re-armed once the whole row is in the chain. The
    /// gate follows the pulse generator's rules: on a PWM slice it changes at the next boundary,
    /// so a shift that finishes within its period is committed by the XLAT at the next
    /// boundary, and after a failed shift no further XLAT is emitted until a row shifts cleanly.
    ///
    /// # Errors
    ///
    /// Returns the port's error if a line cannot be driven; XLAT then stays disarmed and the
    /// same row is tried again at the next boundary.
    pub fn shift_next<Port, Pulses>(
        &mut self,
        bytes: &[u8],
        port: &mut Port,
        pulses: &mut Pulses,
    ) -> Result<usize>
    where
        Port: SerialShiftPort,
        Error: From<Port::Error>,
        Pulses: PulseGenerator,
    {
        let row = self.next_row;
        pulses.disarm_latch();
        Self::shift_bytes(row, bytes, port)?;
        pulses.arm_latch();
        self.next_row = (row + 1) % ROW_COUNT;
        Ok(row)
    }

    /// Address `row` and shift all of its bytes, then strobe the row latch.
    ///
    /// # Errors
    ///
    /// Returns the port's error if a line cannot be driven.
    ///
    /// # Panics
    ///
    /// Panics if `row >= ROW_COUNT`.
    pub fn shift_row<const ROW_BYTES: usize, Port>(
        rows: &GrayscaleRows<ROW_COUNT, ROW_BYTES>,
        row: usize,
        port: &mut Port,
    ) -> Result<()>
    where
        Port: SerialShiftPort,
        Error: From<Port::Error>,
    {
        Self::shift_bytes(row, rows.row_bytes(row), port)
    }

    fn shift_bytes<Port>(row: usize, bytes: &[u8], port: &mut Port) -> Result<()>
    where
        Port: SerialShiftPort,
        Error: From<Port::Error>,
    {
        port.set_row_address(row)?;
        for &byte in bytes {
            port.shift_byte(byte)?;
        }
        port.pulse_latch()?;
        Ok(())
    }
}
