#![allow(missing_docs)]
//! Host-level tests for pulse timing and the simulated BLANK/XLAT/GSCLK trains.

use tlc_mux::Error;
use tlc_mux::pulse::{
    GSCLK_CYCLES_PER_PWM_CYCLE, PULSE_TIMING_DEFAULT, PulseGenerator, PulseTiming,
    SimulatedPulses,
};
use tlc_mux::row_shift::{BIT_BANG_TICKS_PER_BIT, check_bit_bang_budget};

const SMALL: PulseTiming = match PulseTiming::new(16, 4, 2, 1) {
    Ok(timing) => timing,
    Err(_) => panic!("invalid timing"),
};

fn running(timing: PulseTiming) -> SimulatedPulses {
    let mut pulses = SimulatedPulses::new(timing);
    pulses.start();
    pulses
}

/// Record `(blank, latch)` for one full period, starting half a period after a boundary so the
/// BLANK window around the next boundary lies entirely inside the recording.
fn record_window(timing: PulseTiming) -> Vec<(bool, bool)> {
    let mut pulses = running(timing);
    pulses.tick_until_boundary();
    pulses.advance(timing.blank_period() / 2);
    (0..timing.blank_period())
        .map(|_| {
            pulses.tick();
            (pulses.blank_asserted(), pulses.latch_asserted())
        })
        .collect()
}

#[test]
fn default_timing_matches_one_pwm_cycle() {
    let timing = PULSE_TIMING_DEFAULT;
    assert_eq!(timing.period_top(), 8192);
    assert_eq!(timing.blank_compare(), 2);
    assert_eq!(timing.latch_compare(), 1);
    assert_eq!(timing.gsclk_top(), 3);
    assert_eq!(timing.blank_period(), 16_384);
    assert_eq!(timing.blank_duty(), 4);
    assert_eq!(timing.latch_duty(), 2);
    assert_eq!(timing.gsclk_period(), 4);
    assert_eq!(timing.gsclk_cycles_per_period(), GSCLK_CYCLES_PER_PWM_CYCLE);
    assert_eq!(PulseTiming::default(), timing);
}

#[test]
fn refresh_rates_follow_tick_rate() {
    let timing = PULSE_TIMING_DEFAULT;
    assert_eq!(timing.refresh_hz(125_000_000), 7629);
    assert_eq!(timing.row_refresh_hz(125_000_000, 4), 1907);
}

#[test]
fn for_gsclk_top_keeps_4096_clocks_per_period() {
    for gsclk_top in 1..=30 {
        let timing = PulseTiming::for_gsclk_top(gsclk_top).unwrap();
        assert_eq!(timing.gsclk_cycles_per_period(), 4096, "gsclk_top {gsclk_top}");
    }
}

#[test]
fn for_gsclk_top_rejects_zero_and_overflow() {
    assert!(matches!(
        PulseTiming::for_gsclk_top(0),
        Err(Error::GsclkPeriodTooShort)
    ));
    assert!(matches!(
        PulseTiming::for_gsclk_top(31),
        Err(Error::PeriodOverflow)
    ));
}

#[test]
fn new_rejects_zero_period() {
    assert!(matches!(PulseTiming::new(0, 2, 1, 3), Err(Error::ZeroPeriod)));
}

#[test]
fn new_rejects_zero_gsclk_top() {
    assert!(matches!(
        PulseTiming::new(8192, 2, 1, 0),
        Err(Error::GsclkPeriodTooShort)
    ));
}

#[test]
fn new_rejects_latch_not_inside_blank() {
    for (blank, latch) in [(2, 0), (2, 2), (2, 3)] {
        assert!(matches!(
            PulseTiming::new(8192, blank, latch, 3),
            Err(Error::LatchNotInsideBlank)
        ));
    }
}

#[test]
fn new_rejects_blank_filling_the_period() {
    assert!(matches!(
        PulseTiming::new(2, 2, 1, 3),
        Err(Error::BlankNotInsidePeriod)
    ));
    assert!(PulseTiming::new(3, 2, 1, 1).is_ok());
}

#[test]
fn shift_budget_ends_before_next_latch_window() {
    // 16_384 - 2 ticks available; 48 bytes are 384 bits.
    assert!(PULSE_TIMING_DEFAULT.check_shift_budget(48, 42).is_ok());
    assert!(matches!(
        PULSE_TIMING_DEFAULT.check_shift_budget(48, 43),
        Err(Error::ShiftExceedsPeriod)
    ));
}

#[test]
fn bit_bang_budget_rejects_rows_too_long_for_the_period() {
    assert!(check_bit_bang_budget(&PULSE_TIMING_DEFAULT, 48).is_ok());
    assert!(check_bit_bang_budget(&PULSE_TIMING_DEFAULT, 72).is_ok());

    // 8192 - 2 ticks available; 72 bytes at 24 ticks per bit need 13_824.
    let fast = PulseTiming::for_gsclk_top(1).unwrap();
    assert_eq!(BIT_BANG_TICKS_PER_BIT, 24);
    assert!(check_bit_bang_budget(&fast, 24).is_ok());
    assert!(matches!(
        check_bit_bang_budget(&fast, 72),
        Err(Error::ShiftExceedsPeriod)
    ));
}

const _: () = assert!(check_bit_bang_budget(&PULSE_TIMING_DEFAULT, 48).is_ok());

#[test]
fn boundary_arrives_once_per_period() {
    let mut pulses = running(PULSE_TIMING_DEFAULT);
    assert_eq!(pulses.tick_until_boundary(), 16_384);
    assert_eq!(pulses.tick_until_boundary(), 16_384);
    assert_eq!(pulses.boundary_count(), 2);
    assert_eq!(pulses.advance(16_384 * 3), 3);
}

#[test]
fn latch_window_is_strictly_inside_blank_window() {
    for timing in [PULSE_TIMING_DEFAULT, SMALL] {
        let window = record_window(timing);
        let blank: Vec<usize> = (0..window.len()).filter(|&i| window[i].0).collect();
        let latch: Vec<usize> = (0..window.len()).filter(|&i| window[i].1).collect();

        assert!(window.iter().all(|&(blank, latch)| blank || !latch));
        assert_eq!(blank.len() as u32, timing.blank_duty());
        assert_eq!(latch.len() as u32, timing.latch_duty());
        assert_eq!(blank.last().unwrap() - blank[0] + 1, blank.len());
        assert!(blank[0] < latch[0]);
        assert!(latch.last().unwrap() < blank.last().unwrap());
    }
}

#[test]
fn gsclk_runs_4096_square_cycles_per_period() {
    let mut pulses = running(PULSE_TIMING_DEFAULT);
    let mut high_ticks = 0;
    for _ in 0..PULSE_TIMING_DEFAULT.blank_period() {
        pulses.tick();
        high_ticks += u32::from(pulses.gsclk_high());
    }
    assert_eq!(pulses.gsclk_cycles(), 4096);
    assert_eq!(high_ticks, 8192);
}

#[test]
fn small_timing_runs_in_step() {
    let mut pulses = running(SMALL);
    assert_eq!(pulses.tick_until_boundary(), 32);
    assert_eq!(pulses.gsclk_cycles(), 16);
}

#[test]
fn one_latch_pulse_per_period() {
    let mut pulses = running(PULSE_TIMING_DEFAULT);
    for _ in 0..3 {
        pulses.tick_until_boundary();
        assert!(pulses.take_boundary());
    }
    assert_eq!(pulses.latch_count(), 3);
}

#[test]
fn disarmed_latch_never_pulses() {
    let mut pulses = SimulatedPulses::new(SMALL);
    pulses.disarm_latch();
    pulses.start();
    assert!(!pulses.latch_in_effect());
    let mut blank_seen = false;
    for _ in 0..SMALL.blank_period() * 3 {
        pulses.tick();
        assert!(!pulses.latch_asserted());
        blank_seen |= pulses.blank_asserted();
    }
    assert!(blank_seen);
    assert_eq!(pulses.latch_count(), 0);

    pulses.arm_latch();
    pulses.advance(SMALL.blank_period());
    assert_eq!(pulses.latch_count(), 1);
}

#[test]
fn latch_gate_changes_at_the_next_boundary() {
    let mut pulses = running(SMALL);
    pulses.tick_until_boundary();
    assert!(pulses.take_boundary());
    let latches = pulses.latch_count();

    // A shift disarms XLAT and then fails, so it is never re-armed.
    pulses.disarm_latch();
    assert!(!pulses.latch_armed());
    assert!(pulses.latch_in_effect());

    // The window before the wrap still opens under the old gate.
    pulses.tick_until_boundary();
    assert_eq!(pulses.latch_count(), latches + 1);
    assert!(!pulses.latch_in_effect());
    assert!(!pulses.latch_asserted());

    pulses.advance(SMALL.blank_period() * 3);
    assert_eq!(pulses.latch_count(), latches + 1);

    pulses.arm_latch();
    pulses.advance(SMALL.blank_period());
    assert_eq!(pulses.latch_count(), latches + 2);
}

#[test]
fn boundary_is_flagged_inside_the_latch_window() {
    for timing in [PULSE_TIMING_DEFAULT, SMALL] {
        let mut pulses = running(timing);
        pulses.tick_until_boundary();
        assert!(pulses.blank_asserted());
        assert!(pulses.latch_asserted());
    }
}

#[test]
fn take_boundary_consumes_the_event() {
    let mut pulses = running(SMALL);
    assert!(!pulses.take_boundary());
    pulses.tick_until_boundary();
    assert!(pulses.take_boundary());
    assert!(!pulses.take_boundary());
}

#[test]
fn untaken_boundary_counts_as_missed() {
    let mut pulses = running(SMALL);
    pulses.tick_until_boundary();
    pulses.tick_until_boundary();
    assert_eq!(pulses.missed_boundaries(), 1);
    assert!(pulses.take_boundary());

    pulses.tick_until_boundary();
    assert!(pulses.take_boundary());
    assert_eq!(pulses.missed_boundaries(), 1);
}

#[test]
fn stopped_generator_is_quiet() {
    let mut pulses = SimulatedPulses::new(SMALL);
    assert!(!pulses.is_running());
    assert!(!pulses.tick());
    assert_eq!(pulses.tick_until_boundary(), 0);
    assert!(!pulses.blank_asserted());
    assert!(!pulses.gsclk_high());

    pulses.start();
    assert!(pulses.is_running());
    pulses.stop();
    assert!(!pulses.is_running());
    assert_eq!(pulses.advance(100), 0);
}

#[test]
fn configure_applies_new_timing_when_stopped() {
    let mut pulses = SimulatedPulses::new(PULSE_TIMING_DEFAULT);
    pulses.configure(SMALL);
    assert_eq!(pulses.timing(), SMALL);
    pulses.start();
    assert_eq!(pulses.tick_until_boundary(), 32);
}

#[test]
#[should_panic(expected = "stop the pulse generator before configuring it")]
fn configure_while_running_panics() {
    let mut pulses = running(SMALL);
    pulses.configure(PULSE_TIMING_DEFAULT);
}
