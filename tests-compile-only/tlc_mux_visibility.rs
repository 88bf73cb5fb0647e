//! Compile-only verification of the tlc_mux! macro: visibility modifiers and optional fields.
//!
//! Run via: `cargo build --no-default-features --features pico1,arm,defmt --bin tlc_mux_visibility --target thumbv6m-none-eabi`

#![cfg(not(feature = "host"))]
#![no_std]
#![no_main]
#![allow(dead_code, reason = "Compile-time verification only")]

use defmt_rtt as _;
use panic_probe as _;
use tlc_mux::pulse::PulseTiming;
use tlc_mux::tlc_mux;

const SLOW: PulseTiming = match PulseTiming::for_gsclk_top(7) {
    Ok(timing) => timing,
    Err(_) => panic!("invalid timing"),
};

// Private, required fields only
tlc_mux! {
    SmallPanel {
        rows: 2,
        row_bytes: 24,
        address_bits: 1,
    }
}

mod public_test {
    use super::{SLOW, tlc_mux};

    // Public, every field, fields out of order
    tlc_mux! {
        pub WidePanel {
            initial: 4095,
            address_bits: 3,
            timing: SLOW,
            row_bytes: 72,
            rows: 8,
        }
    }

    // Crate-visible, no trailing comma
    tlc_mux! {
        pub(crate) TallPanel {
            rows: 16,
            row_bytes: 24,
            address_bits: 4
        }
    }
}

/// Generated types exist and deref to the shared handle.
fn test_tlc_mux_generated_types() {
    let _small = core::mem::size_of::<SmallPanel>();
    let _wide = core::mem::size_of::<public_test::WidePanel>();
    let _tall = core::mem::size_of::<public_test::TallPanel>();

    fn channels(panel: &public_test::WidePanel) -> u16 {
        panel.get(7, 47)
    }
    let _ = channels;
}

#[embassy_executor::main]
async fn main(_spawner: embassy_executor::Spawner) {}
