//! BLANK/XLAT and GSCLK pulse trains.
//!
//! Two free-running trains keep a TLC5940 chain displaying:
//!
//! - **BLANK/XLAT:** once per period, BLANK turns every output off for a short window and, while
//!   BLANK is still asserted, XLAT commits the freshly shifted row. Both come from one
//!   phase-correct counter, so XLAT is nested strictly inside BLANK on both edges.
//! - **GSCLK:** a square wave that advances each chip's 12-bit PWM counter. One BLANK/XLAT period
//!   normally spans exactly 4096 GSCLK cycles, one full PWM cycle.
//!
//! ```text
//! counter   top ....\           /.... top ....\           /....
//!                    \         /               \         /
//!                     \_______/                 \_______/
//!                         0 <- boundary              0 <- boundary
//! BLANK   ___________|‾‾‾‾‾‾‾|_______________________|‾‾‾‾‾‾‾|____
//! XLAT    _____________|‾‾‾|___________________________|‾‾‾|______
//! ```
//!
//! [`PulseTiming`] is the validated static configuration, [`PulseGenerator`] the capability the
//! row scanner drives, and [`SimulatedPulses`] a tick-accurate model used on the host. The RP2040
//! PWM adapter lives in [`pwm_pulses`] (embedded builds only).

use crate::{Error, Result};

#[cfg(not(feature = "host"))]
pub mod pwm_pulses;

/// GSCLK cycles in one full TLC5940 PWM cycle (12 bits).
pub const GSCLK_CYCLES_PER_PWM_CYCLE: u32 = 4096;

/// Default BLANK compare value (BLANK asserted for 4 ticks around each boundary).
pub const BLANK_COMPARE_DEFAULT: u16 = 2;

/// Default XLAT compare value (XLAT asserted for 2 ticks around each boundary).
pub const LATCH_COMPARE_DEFAULT: u16 = 1;

/// Default GSCLK top: a 4-tick GSCLK period, so the BLANK/XLAT period is 8192 ticks.
pub const GSCLK_TOP_DEFAULT: u16 = 3;

/// Default timing for generated devices: [`PulseTiming::for_gsclk_top`] with [`GSCLK_TOP_DEFAULT`].
pub const PULSE_TIMING_DEFAULT: PulseTiming = match PulseTiming::for_gsclk_top(GSCLK_TOP_DEFAULT) {
    Ok(timing) => timing,
    Err(_) => panic!("default pulse timing must be valid"),
};

// ============================================================================
// PulseTiming
// ============================================================================

/// Validated timing for both pulse trains, in ticks of the pulse timer.
///
/// BLANK/XLAT runs on a phase-correct counter that climbs from 0 to `period_top - 1` and falls
/// back, holding each end for two ticks, so one period is `2 * period_top` ticks and the cycle
/// boundary is the counter bottom. BLANK is asserted while the counter is below `blank_compare`,
/// XLAT while it is below `latch_compare`; both windows are centered on the boundary.
///
/// GSCLK runs on its own counter from 0 to `gsclk_top`, so its period is `gsclk_top + 1` ticks.
///
/// Constructors reject any timing where XLAT could fire outside BLANK, so a `const` timing that
/// compiles is a timing the chips can live with:
///
/// ```rust
/// use tlc_mux::pulse::PulseTiming;
///
/// const TIMING: PulseTiming = match PulseTiming::new(8192, 2, 1, 3) {
///     Ok(timing) => timing,
///     Err(_) => panic!("invalid timing"),
/// };
/// assert_eq!(TIMING.blank_period(), 16_384);
/// assert_eq!(TIMING.gsclk_cycles_per_period(), 4096);
///
/// // XLAT as wide as BLANK is rejected.
/// assert!(PulseTiming::new(8192, 2, 2, 3).is_err());
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PulseTiming {
    period_top: u16,
    blank_compare: u16,
    latch_compare: u16,
    gsclk_top: u16,
}

impl PulseTiming {
    /// Create a timing, checking `0 < latch_compare < blank_compare < period_top` and
    /// `gsclk_top >= 1`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ZeroPeriod`], [`Error::GsclkPeriodTooShort`],
    /// [`Error::LatchNotInsideBlank`] or [`Error::BlankNotInsidePeriod`] for the first violated
    /// constraint.
    pub const fn new(
        period_top: u16,
        blank_compare: u16,
        latch_compare: u16,
        gsclk_top: u16,
    ) -> Result<Self> {
        if period_top == 0 {
            return Err(Error::ZeroPeriod);
        }
        if gsclk_top == 0 {
            return Err(Error::GsclkPeriodTooShort);
        }
        if latch_compare == 0 || latch_compare >= blank_compare {
            return Err(Error::LatchNotInsideBlank);
        }
        if blank_compare >= period_top {
            return Err(Error::BlankNotInsidePeriod);
        }
        Ok(Self {
            period_top,
            blank_compare,
            latch_compare,
            gsclk_top,
        })
    }

    /// Timing where one BLANK/XLAT period is exactly one 4096-step PWM cycle of the chips, with
    /// the default BLANK and XLAT windows.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GsclkPeriodTooShort`] for `gsclk_top == 0` and [`Error::PeriodOverflow`]
    /// when the period no longer fits the 16-bit counter (`gsclk_top > 30`).
    pub const fn for_gsclk_top(gsclk_top: u16) -> Result<Self> {
        if gsclk_top == 0 {
            return Err(Error::GsclkPeriodTooShort);
        }
        // 2 * period_top == 4096 * (gsclk_top + 1)
        let period_top = (GSCLK_CYCLES_PER_PWM_CYCLE / 2) * (gsclk_top as u32 + 1);
        if period_top > u16::MAX as u32 {
            return Err(Error::PeriodOverflow);
        }
        Self::new(
            period_top as u16,
            BLANK_COMPARE_DEFAULT,
            LATCH_COMPARE_DEFAULT,
            gsclk_top,
        )
    }

    /// Half the BLANK/XLAT period in ticks. The counter turns at `period_top - 1`.
    #[must_use]
    pub const fn period_top(&self) -> u16 {
        self.period_top
    }

    /// BLANK is asserted while the counter is below this value.
    #[must_use]
    pub const fn blank_compare(&self) -> u16 {
        self.blank_compare
    }

    /// XLAT is asserted while the counter is below this value.
    #[must_use]
    pub const fn latch_compare(&self) -> u16 {
        self.latch_compare
    }

    /// Highest value of the GSCLK counter.
    #[must_use]
    pub const fn gsclk_top(&self) -> u16 {
        self.gsclk_top
    }

    /// Ticks from one cycle boundary to the next.
    #[must_use]
    pub const fn blank_period(&self) -> u32 {
        2 * self.period_top as u32
    }

    /// Ticks per period with BLANK asserted.
    #[must_use]
    pub const fn blank_duty(&self) -> u32 {
        2 * self.blank_compare as u32
    }

    /// Ticks per period with XLAT asserted.
    #[must_use]
    pub const fn latch_duty(&self) -> u32 {
        2 * self.latch_compare as u32
    }

    /// Ticks per GSCLK cycle.
    #[must_use]
    pub const fn gsclk_period(&self) -> u32 {
        self.gsclk_top as u32 + 1
    }

    /// Whole GSCLK cycles in one BLANK/XLAT period.
    #[must_use]
    pub const fn gsclk_cycles_per_period(&self) -> u32 {
        self.blank_period() / self.gsclk_period()
    }

    /// Full PWM cycles per second of the chips (`GSCLK frequency / 4096`).
    #[must_use]
    pub const fn refresh_hz(&self, tick_hz: u32) -> u32 {
        tick_hz / self.gsclk_period() / GSCLK_CYCLES_PER_PWM_CYCLE
    }

    /// How often each of `row_count` rows is shifted and shown, per second.
    #[must_use]
    pub const fn row_refresh_hz(&self, tick_hz: u32, row_count: usize) -> u32 {
        assert!(row_count > 0, "row_count must be positive");
        tick_hz / self.blank_period() / row_count as u32
    }

    /// Check that shifting `row_bytes` bytes at `ticks_per_bit` timer ticks per bit ends before
    /// the next XLAT window opens.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShiftExceedsPeriod`] when it does not.
    pub const fn check_shift_budget(&self, row_bytes: usize, ticks_per_bit: u32) -> Result<()> {
        let shift_ticks = row_bytes as u64 * 8 * ticks_per_bit as u64;
        let budget = (self.blank_period() - self.latch_duty()) as u64;
        if shift_ticks >= budget {
            Err(Error::ShiftExceedsPeriod)
        } else {
            Ok(())
        }
    }
}

impl Default for PulseTiming {
    fn default() -> Self {
        PULSE_TIMING_DEFAULT
    }
}

// ============================================================================
// PulseGenerator
// ============================================================================

/// The pulse hardware as seen by the row scanner.
///
/// Implementations own the BLANK, XLAT and GSCLK outputs. Nothing here can fail at runtime;
/// configuration errors are caught when the [`PulseTiming`] is built.
pub trait PulseGenerator {
    /// Apply `timing`. The generator must be stopped.
    fn configure(&mut self, timing: PulseTiming);

    /// Start both trains.
    fn start(&mut self);

    /// Stop both trains.
    fn stop(&mut self);

    /// Whether the trains are running.
    fn is_running(&self) -> bool;

    /// Consume the cycle-boundary event. Returns `true` once for each boundary since the last
    /// call; boundaries that pile up are merged.
    fn take_boundary(&mut self) -> bool;

    /// Let XLAT pulse at the coming boundaries.
    ///
    /// Like a double-buffered PWM compare, the gate may change only at the next boundary: the
    /// XLAT window around that boundary can still open under the previous gate.
    fn arm_latch(&mut self);

    /// Suppress XLAT from the next boundary on. See [`arm_latch`](Self::arm_latch).
    fn disarm_latch(&mut self);
}

// ============================================================================
// SimulatedPulses
// ============================================================================

/// Tick-accurate model of both pulse trains, for host tests and simulations.
///
/// Each [`tick`](Self::tick) is one timer tick. The model counts XLAT pulses, GSCLK cycles,
/// boundaries, and boundaries that arrived while the previous one was still unhandled.
///
/// The boundary is flagged on the tick the counter wraps, the second of its two ticks at 0. That
/// tick lies inside both windows, so code servicing the boundary starts while BLANK and XLAT are
/// still asserted. The XLAT gate is double-buffered the way a PWM compare is: [`arm_latch`] and
/// [`disarm_latch`] take effect at the wrap, so the XLAT tick just before it still follows the
/// previous gate.
///
/// [`arm_latch`]: PulseGenerator::arm_latch
/// [`disarm_latch`]: PulseGenerator::disarm_latch
///
/// ```rust
/// use tlc_mux::pulse::{PULSE_TIMING_DEFAULT, PulseGenerator, SimulatedPulses};
///
/// let mut pulses = SimulatedPulses::new(PULSE_TIMING_DEFAULT);
/// pulses.start();
/// assert_eq!(pulses.tick_until_boundary(), PULSE_TIMING_DEFAULT.blank_period());
/// assert!(pulses.take_boundary());
/// assert_eq!(pulses.gsclk_cycles(), 4096);
/// ```
#[derive(Clone, Debug)]
pub struct SimulatedPulses {
    timing: PulseTiming,
    running: bool,
    latch_armed: bool,
    latch_in_effect: bool,
    counter: u16,
    counting_up: bool,
    gsclk_counter: u16,
    boundary_pending: bool,
    boundary_count: u32,
    missed_boundaries: u32,
    latch_count: u32,
    gsclk_cycles: u32,
}

impl SimulatedPulses {
    /// Create a stopped model with `timing` and XLAT armed.
    #[must_use]
    pub const fn new(timing: PulseTiming) -> Self {
        Self {
            timing,
            running: false,
            latch_armed: true,
            latch_in_effect: true,
            counter: 0,
            counting_up: true,
            gsclk_counter: 0,
            boundary_pending: false,
            boundary_count: 0,
            missed_boundaries: 0,
            latch_count: 0,
            gsclk_cycles: 0,
        }
    }

    /// Timing in use.
    #[must_use]
    pub const fn timing(&self) -> PulseTiming {
        self.timing
    }

    /// Advance one timer tick. Returns `true` when this tick reached a cycle boundary.
    pub fn tick(&mut self) -> bool {
        if !self.running {
            return false;
        }
        let latch_was_asserted = self.latch_asserted();

        self.gsclk_counter = if self.gsclk_counter >= self.timing.gsclk_top {
            0
        } else {
            self.gsclk_counter + 1
        };
        if self.gsclk_counter == 0 {
            self.gsclk_cycles = self.gsclk_cycles.wrapping_add(1);
        }

        // Phase-correct: 0 and the top value each last two ticks, one on either side of the turn.
        let top = self.timing.period_top - 1;
        let mut boundary = false;
        if self.counting_up {
            if self.counter >= top {
                self.counting_up = false;
            } else {
                self.counter += 1;
            }
        } else if self.counter == 0 {
            self.counting_up = true;
            boundary = true;
        } else {
            self.counter -= 1;
        }

        if boundary {
            self.latch_in_effect = self.latch_armed;
        }
        if !latch_was_asserted && self.latch_asserted() {
            self.latch_count = self.latch_count.wrapping_add(1);
        }
        if boundary {
            if self.boundary_pending {
                self.missed_boundaries = self.missed_boundaries.wrapping_add(1);
            }
            self.boundary_pending = true;
            self.boundary_count = self.boundary_count.wrapping_add(1);
        }
        boundary
    }

    /// Tick until the next boundary and return the number of ticks taken (0 if stopped).
    pub fn tick_until_boundary(&mut self) -> u32 {
        if !self.running {
            return 0;
        }
        let mut ticks = 1;
        while !self.tick() {
            ticks += 1;
        }
        ticks
    }

    /// Advance `ticks` timer ticks and return how many boundaries were reached.
    pub fn advance(&mut self, ticks: u32) -> u32 {
        (0..ticks).map(|_| u32::from(self.tick())).sum()
    }

    /// Whether BLANK is asserted (outputs forced off).
    #[must_use]
    pub const fn blank_asserted(&self) -> bool {
        self.running && self.counter < self.timing.blank_compare
    }

    /// Whether XLAT is asserted.
    #[must_use]
    pub const fn latch_asserted(&self) -> bool {
        self.running && self.latch_in_effect && self.counter < self.timing.latch_compare
    }

    /// Level of the GSCLK output.
    #[must_use]
    pub const fn gsclk_high(&self) -> bool {
        self.running && self.gsclk_counter < self.timing.gsclk_period().div_ceil(2) as u16
    }

    /// Whether XLAT was last armed. The counter picks this up at the next boundary.
    #[must_use]
    pub const fn latch_armed(&self) -> bool {
        self.latch_armed
    }

    /// Whether the counter currently lets XLAT pulse.
    #[must_use]
    pub const fn latch_in_effect(&self) -> bool {
        self.latch_in_effect
    }

    /// Boundaries reached since creation.
    #[must_use]
    pub const fn boundary_count(&self) -> u32 {
        self.boundary_count
    }

    /// Boundaries that arrived while the previous one had not been taken yet.
    ///
    /// Anything non-zero means a row shift did not finish within one period.
    #[must_use]
    pub const fn missed_boundaries(&self) -> u32 {
        self.missed_boundaries
    }

    /// XLAT pulses emitted since creation.
    #[must_use]
    pub const fn latch_count(&self) -> u32 {
        self.latch_count
    }

    /// Completed GSCLK cycles since creation.
    #[must_use]
    pub const fn gsclk_cycles(&self) -> u32 {
        self.gsclk_cycles
    }
}

impl PulseGenerator for SimulatedPulses {
    fn configure(&mut self, timing: PulseTiming) {
        assert!(!self.running, "stop the pulse generator before configuring it");
        self.timing = timing;
    }

    fn start(&mut self) {
        self.counter = 0;
        self.counting_up = true;
        self.gsclk_counter = 0;
        self.boundary_pending = false;
        self.latch_in_effect = self.latch_armed;
        self.running = true;
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn take_boundary(&mut self) -> bool {
        core::mem::take(&mut self.boundary_pending)
    }

    fn arm_latch(&mut self) {
        self.latch_armed = true;
    }

    fn disarm_latch(&mut self) {
        self.latch_armed = false;
    }
}
