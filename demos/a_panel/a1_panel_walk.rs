#![no_std]
#![no_main]
#![cfg(not(feature = "host"))]

use core::{convert::Infallible, panic};
use embassy_executor::Spawner;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::pwm::{Config, Pwm};
use embassy_time::Timer;
use tlc_mux::{
    Result,
    grayscale::GRAYSCALE_MAX,
    pulse::pwm_pulses::PwmChannel,
    tlc_mux,
};
use {defmt::info, defmt_rtt as _, panic_probe as _};

// Four rows of two TLC5940s, rows selected through a 2-to-4 decoder.
tlc_mux! {
    Panel {
        rows: 4,
        row_bytes: 48,
        address_bits: 2,
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) -> ! {
    let err = inner_main(spawner).await.unwrap_err();
    panic!("{err}");
}

async fn inner_main(spawner: Spawner) -> Result<Infallible> {
    let p = embassy_rp::init(Default::default());

    let panel = Panel::new(
        // XLAT on GPIO 10, BLANK on GPIO 11 (both slice 5)
        Pwm::new_output_ab(p.PWM_SLICE5, p.PIN_10, p.PIN_11, Config::default()),
        // GSCLK on GPIO 12 (slice 6 A)
        Pwm::new_output_a(p.PWM_SLICE6, p.PIN_12, Config::default()),
        PwmChannel::A,
        Output::new(p.PIN_2, Level::Low), // SIN
        Output::new(p.PIN_3, Level::Low), // SCLK
        Output::new(p.PIN_4, Level::Low), // row latch
        [
            Output::new(p.PIN_6, Level::Low),
            Output::new(p.PIN_7, Level::Low),
        ],
        spawner,
    )?;
    info!("Panel running");

    // Walk one lit channel across every row.
    loop {
        for row in 0..4 {
            for channel in 0..32 {
                panel.update(|rows| {
                    rows.clear();
                    rows.set(row, channel, GRAYSCALE_MAX);
                });
                Timer::after_millis(50).await;
            }
        }
        info!("Panel walk done, {} rows shifted", panel.shifted_row_count());
    }
}
