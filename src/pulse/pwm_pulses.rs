//! BLANK/XLAT and GSCLK on two RP2040/RP2350 PWM slices.
//!
//! See [`PwmPulses`] for wiring and usage.

#[cfg(feature = "defmt")]
use defmt::info;
use embassy_rp::pwm::{Config, Pwm};

use super::{PulseGenerator, PulseTiming};

/// Which output of a PWM slice a signal uses.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PwmChannel {
    /// Output A (even GPIO of the slice).
    A,
    /// Output B (odd GPIO of the slice).
    B,
}

/// [`PulseGenerator`] on two PWM slices.
///
/// - The BLANK/XLAT slice runs phase-correct with XLAT on output A and BLANK on output B. Sharing
///   one counter keeps XLAT nested inside BLANK without any software timing.
/// - The GSCLK slice runs edge-aligned with a 50% duty square wave on either output.
///
/// The cycle boundary is the BLANK/XLAT slice's wrap flag, which the hardware raises at the
/// bottom of each phase-correct cycle.
///
/// Compare values are double-buffered by the PWM block and latched at the wrap, so
/// [`arm_latch`](PulseGenerator::arm_latch) and [`disarm_latch`](PulseGenerator::disarm_latch)
/// take effect at the next boundary. The XLAT tick just before that wrap still uses the compare
/// latched one boundary earlier.
///
/// # Example
///
/// ```rust,no_run
/// # #![no_std]
/// # #![no_main]
/// use embassy_rp::pwm::{Config, Pwm};
/// use tlc_mux::pulse::{PULSE_TIMING_DEFAULT, PulseGenerator, pwm_pulses::{PwmChannel, PwmPulses}};
/// # #[panic_handler]
/// # fn panic(_info: &core::panic::PanicInfo) -> ! { loop {} }
///
/// fn example(p: embassy_rp::Peripherals) {
///     // XLAT on GPIO 10 (slice 5 A), BLANK on GPIO 11 (slice 5 B), GSCLK on GPIO 12 (slice 6 A).
///     let blank_latch = Pwm::new_output_ab(p.PWM_SLICE5, p.PIN_10, p.PIN_11, Config::default());
///     let gsclk = Pwm::new_output_a(p.PWM_SLICE6, p.PIN_12, Config::default());
///     let mut pulses = PwmPulses::new(blank_latch, gsclk, PwmChannel::A, PULSE_TIMING_DEFAULT);
///     pulses.start();
/// }
/// ```
pub struct PwmPulses<'d> {
    blank_latch: Pwm<'d>,
    blank_latch_cfg: Config, // Stored so reconfiguring never resets the divider
    gsclk: Pwm<'d>,
    gsclk_cfg: Config,
    gsclk_channel: PwmChannel,
    timing: PulseTiming,
    latch_armed: bool,
}

impl<'d> PwmPulses<'d> {
    /// Wrap the two slices, configure them for `timing` and leave them stopped with XLAT armed.
    #[must_use]
    pub fn new(
        blank_latch: Pwm<'d>,
        gsclk: Pwm<'d>,
        gsclk_channel: PwmChannel,
        timing: PulseTiming,
    ) -> Self {
        let mut pulses = Self {
            blank_latch,
            blank_latch_cfg: Config::default(),
            gsclk,
            gsclk_cfg: Config::default(),
            gsclk_channel,
            timing,
            latch_armed: true,
        };
        pulses.configure(timing);
        pulses
    }

    fn apply(&mut self) {
        self.blank_latch.set_config(&self.blank_latch_cfg);
        self.gsclk.set_config(&self.gsclk_cfg);
    }

    fn latch_compare(&self) -> u16 {
        if self.latch_armed {
            self.timing.latch_compare()
        } else {
            0
        }
    }
}

impl PulseGenerator for PwmPulses<'_> {
    fn configure(&mut self, timing: PulseTiming) {
        assert!(
            !self.blank_latch_cfg.enable,
            "stop the pulse generator before configuring it"
        );
        self.timing = timing;

        let mut blank_latch_cfg = Config::default();
        // Phase-correct: 2 * (top + 1) ticks per period
        blank_latch_cfg.top = timing.period_top() - 1;
        blank_latch_cfg.phase_correct = true;
        blank_latch_cfg.divider = 1u8.into();
        blank_latch_cfg.compare_a = self.latch_compare();
        blank_latch_cfg.compare_b = timing.blank_compare();
        blank_latch_cfg.enable = false;

        let mut gsclk_cfg = Config::default();
        gsclk_cfg.top = timing.gsclk_top();
        gsclk_cfg.phase_correct = false;
        gsclk_cfg.divider = 1u8.into();
        let half = timing.gsclk_top().div_ceil(2).max(1);
        match self.gsclk_channel {
            PwmChannel::A => gsclk_cfg.compare_a = half,
            PwmChannel::B => gsclk_cfg.compare_b = half,
        }
        gsclk_cfg.enable = false;

        self.blank_latch_cfg = blank_latch_cfg;
        self.gsclk_cfg = gsclk_cfg;
        self.apply();

        #[cfg(feature = "defmt")]
        info!(
            "pulses period_top={} blank={} latch={} gsclk_top={}",
            timing.period_top(),
            timing.blank_compare(),
            timing.latch_compare(),
            timing.gsclk_top()
        );
    }

    fn start(&mut self) {
        self.blank_latch.clear_wrapped();
        self.gsclk_cfg.enable = true;
        self.blank_latch_cfg.enable = true;
        self.apply();
        #[cfg(feature = "defmt")]
        info!("pulses started");
    }

    fn stop(&mut self) {
        self.blank_latch_cfg.enable = false;
        self.gsclk_cfg.enable = false;
        self.apply();
        #[cfg(feature = "defmt")]
        info!("pulses stopped");
    }

    fn is_running(&self) -> bool {
        self.blank_latch_cfg.enable
    }

    fn take_boundary(&mut self) -> bool {
        if self.blank_latch.wrapped() {
            self.blank_latch.clear_wrapped();
            true
        } else {
            false
        }
    }

    fn arm_latch(&mut self) {
        self.latch_armed = true;
        // Only compare A changes; rewriting the stored config keeps top and divider intact.
        self.blank_latch_cfg.compare_a = self.latch_compare();
        self.blank_latch.set_config(&self.blank_latch_cfg);
    }

    fn disarm_latch(&mut self) {
        self.latch_armed = false;
        self.blank_latch_cfg.compare_a = 0;
        self.blank_latch.set_config(&self.blank_latch_cfg);
    }
}
