//! Row-multiplexed TLC5940 LED driver chains for Pico 1 and 2 (with a host build for testing).
//!
//! Several "rows" of daisy-chained TLC5940 chips share one set of SIN, SCLK, BLANK, XLAT and
//! GSCLK lines. One row is addressed at a time; after every BLANK/XLAT period the next row's
//! grayscale data is shifted out and committed by the following XLAT pulse.
//!
//! # Glossary
//!
//! - **Row:** One multiplexed time slot of chained chips, addressed through external decoding.
//! - **Channel:** One PWM output of one chip within a row. Channel `i` is output `i % 16` of chip
//!   `i / 16`.
//! - **BLANK:** Forces all outputs off. Asserted around every period boundary.
//! - **XLAT:** Latches the shift register into the grayscale register. Always inside BLANK.
//! - **GSCLK:** The free-running grayscale clock. 4096 GSCLK cycles make one PWM cycle.
//! - **PWM ([Pulse Width Modulation](https://en.wikipedia.org/wiki/Pulse-width_modulation)) Slices:**
//!   Both Pico 1 and 2 have 8 or more slices (two outputs each). These "slices" are unrelated to Rust
//!   slices.
//!
//! # Modules
//!
//! - [`grayscale`]: the packed 12-bit row buffers.
//! - [`pulse`]: BLANK/XLAT and GSCLK timing, the [`PulseGenerator`](pulse::PulseGenerator)
//!   capability, and a tick-accurate host model.
//! - [`row_shift`]: the bit-serial shift protocol and round-robin row scanning.
//! - [`tlc_mux`]: the shared device handle application code writes to.
#![cfg_attr(not(feature = "host"), no_std)]
#![cfg_attr(not(feature = "host"), no_main)]

// Compile-time checks: exactly one board must be selected (unless testing with host feature)
#[cfg(all(not(any(feature = "pico1", feature = "pico2")), not(feature = "host")))]
compile_error!("Must enable exactly one board feature: 'pico1' or 'pico2'");

#[cfg(all(feature = "pico1", feature = "pico2"))]
compile_error!("Cannot enable both 'pico1' and 'pico2' features simultaneously");

// Compile-time checks: exactly one architecture must be selected (unless testing with host feature)
#[cfg(all(not(any(feature = "arm", feature = "riscv")), not(feature = "host")))]
compile_error!("Must enable exactly one architecture feature: 'arm' or 'riscv'");

#[cfg(all(feature = "arm", feature = "riscv"))]
compile_error!("Cannot enable both 'arm' and 'riscv' features simultaneously");

// Compile-time check: pico1 only supports ARM
#[cfg(all(feature = "pico1", feature = "riscv"))]
compile_error!("Pico 1 (RP2040) only supports ARM architecture, not RISC-V");

mod error;
pub mod grayscale;
pub mod pulse;
pub mod row_shift;
pub mod tlc_mux;

// Re-export error types and result (used throughout)
pub use crate::error::{Error, Result};
