//! A device abstraction for row-multiplexed TLC5940 chains.
//!
//! Application code owns a [`TlcMux`] handle and writes grayscale values through it. A device
//! loop ([`tlc_mux_device_loop`]) waits for each BLANK/XLAT cycle boundary and shifts the next
//! row from the same storage.
//!
//! Writes run inside a critical section. A row shift copies its row out inside one as well and
//! then drives the pins with interrupts enabled, so a shift never sees the half of a write that
//! spans a shared byte, and a write never lands between two bytes of a shift.
//!
//! On embedded builds, the `tlc_mux!` macro generates a concrete device type that wires PWM
//! slices and GPIO pins and spawns the loop as an embassy task.
//!
//! # Example: host simulation
//!
//! ```rust
//! use core::convert::Infallible;
//! use tlc_mux::pulse::{PULSE_TIMING_DEFAULT, PulseGenerator, SimulatedPulses};
//! use tlc_mux::row_shift::{RowScanner, SerialShiftPort};
//! use tlc_mux::tlc_mux::{TlcMux, TlcMuxStatic};
//!
//! struct NullPort;
//!
//! impl SerialShiftPort for NullPort {
//!     type Error = Infallible;
//!     fn set_row_address(&mut self, _row: usize) -> Result<(), Infallible> { Ok(()) }
//!     fn shift_byte(&mut self, _byte: u8) -> Result<(), Infallible> { Ok(()) }
//!     fn pulse_latch(&mut self) -> Result<(), Infallible> { Ok(()) }
//! }
//!
//! // 4 rows of 2 chips each.
//! static PANEL_STATIC: TlcMuxStatic<4, 48> = TlcMux::new_static();
//! let panel = TlcMux::new(&PANEL_STATIC, 0);
//! panel.set(2, 31, 4095);
//!
//! let mut scanner = RowScanner::<4>::new();
//! let mut pulses = SimulatedPulses::new(PULSE_TIMING_DEFAULT);
//! pulses.start();
//! pulses.tick_until_boundary();
//! assert_eq!(panel.service_boundary(&mut scanner, &mut NullPort, &mut pulses).unwrap(), Some(0));
//! assert_eq!(panel.service_boundary(&mut scanner, &mut NullPort, &mut pulses).unwrap(), None);
//! assert_eq!(panel.shifted_row_count(), 1);
//! ```

use core::cell::RefCell;

#[cfg(feature = "defmt")]
use defmt::{info, warn};
use embassy_futures::yield_now;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use portable_atomic::{AtomicU32, Ordering};

use crate::grayscale::GrayscaleRows;
use crate::pulse::PulseGenerator;
use crate::row_shift::{RowScanner, SerialShiftPort};
use crate::{Error, Result};

#[doc(hidden)]
pub use paste;

/// Static resources for [`TlcMux`].
pub struct TlcMuxStatic<const ROW_COUNT: usize, const ROW_BYTES: usize> {
    rows: Mutex<CriticalSectionRawMutex, RefCell<GrayscaleRows<ROW_COUNT, ROW_BYTES>>>,
    shifted_rows: AtomicU32,
}

impl<const ROW_COUNT: usize, const ROW_BYTES: usize> TlcMuxStatic<ROW_COUNT, ROW_BYTES> {
    /// Create static resources with every channel at 0.
    #[must_use]
    pub const fn new_static() -> Self {
        Self {
            rows: Mutex::new(RefCell::new(GrayscaleRows::new())),
            shifted_rows: AtomicU32::new(0),
        }
    }

    fn with_rows<T>(&self, f: impl FnOnce(&mut GrayscaleRows<ROW_COUNT, ROW_BYTES>) -> T) -> T {
        self.rows.lock(|rows| f(&mut rows.borrow_mut()))
    }
}

/// Handle to a row-multiplexed chain's grayscale storage.
///
/// Rows and channels are 0-based; channel `i` is output `i % 16` of chip `i / 16` in the row.
/// Values are 12-bit (`0..=4095`). Out-of-range rows or channels panic.
///
/// The handle is `Copy`; every copy refers to the same static storage.
#[derive(Clone, Copy)]
pub struct TlcMux<const ROW_COUNT: usize, const ROW_BYTES: usize> {
    tlc_mux_static: &'static TlcMuxStatic<ROW_COUNT, ROW_BYTES>,
}

impl<const ROW_COUNT: usize, const ROW_BYTES: usize> TlcMux<ROW_COUNT, ROW_BYTES> {
    /// Number of multiplexed rows.
    pub const ROW_COUNT: usize = ROW_COUNT;
    /// Channels in each row.
    pub const CHANNEL_COUNT: usize = GrayscaleRows::<ROW_COUNT, ROW_BYTES>::CHANNEL_COUNT;

    /// Create static resources for a device.
    #[must_use]
    pub const fn new_static() -> TlcMuxStatic<ROW_COUNT, ROW_BYTES> {
        TlcMuxStatic::new_static()
    }

    /// Create a handle and set every channel of every row to `initial_value`.
    ///
    /// Call before the device loop starts so the first committed row is already valid.
    #[must_use]
    pub fn new(
        tlc_mux_static: &'static TlcMuxStatic<ROW_COUNT, ROW_BYTES>,
        initial_value: u16,
    ) -> Self {
        let tlc_mux = Self { tlc_mux_static };
        tlc_mux.set_all(initial_value);
        tlc_mux
    }

    /// Set every channel of every row to 0.
    pub fn clear(&self) {
        self.tlc_mux_static.with_rows(GrayscaleRows::clear);
    }

    /// Set every channel of `row` to 0.
    pub fn clear_row(&self, row: usize) {
        self.tlc_mux_static.with_rows(|rows| rows.clear_row(row));
    }

    /// Grayscale value of `channel` in `row`.
    #[must_use]
    pub fn get(&self, row: usize, channel: usize) -> u16 {
        self.tlc_mux_static.with_rows(|rows| rows.get(row, channel))
    }

    /// Set `channel` in `row` to `value`.
    pub fn set(&self, row: usize, channel: usize, value: u16) {
        self.tlc_mux_static.with_rows(|rows| rows.set(row, channel, value));
    }

    /// Set every channel of `row` to `value`.
    pub fn set_row(&self, row: usize, value: u16) {
        self.tlc_mux_static.with_rows(|rows| rows.set_row(row, value));
    }

    /// Set every channel of every row to `value`.
    pub fn set_all(&self, value: u16) {
        self.tlc_mux_static.with_rows(|rows| rows.set_all(value));
    }

    /// Run `f` on the storage inside one critical section, so several writes reach the chips
    /// together. Keep `f` short: boundaries are not serviced while it runs.
    pub fn update<T>(&self, f: impl FnOnce(&mut GrayscaleRows<ROW_COUNT, ROW_BYTES>) -> T) -> T {
        self.tlc_mux_static.with_rows(f)
    }

    /// Rows shifted out since start-up (wraps at `u32::MAX`).
    #[must_use]
    pub fn shifted_row_count(&self) -> u32 {
        self.tlc_mux_static.shifted_rows.load(Ordering::Relaxed)
    }

    /// If a cycle boundary is pending, shift the next row. Returns the row shifted, if any.
    ///
    /// # Errors
    ///
    /// Returns the port's error if a line cannot be driven.
    pub fn service_boundary<Port, Pulses>(
        &self,
        scanner: &mut RowScanner<ROW_COUNT>,
        port: &mut Port,
        pulses: &mut Pulses,
    ) -> Result<Option<usize>>
    where
        Port: SerialShiftPort,
        Error: From<Port::Error>,
        Pulses: PulseGenerator,
    {
        if !pulses.take_boundary() {
            return Ok(None);
        }
        self.shift_next_row(scanner, port, pulses).map(Some)
    }

    /// Shift the scanner's next row now, without waiting for a boundary.
    ///
    /// # Errors
    ///
    /// Returns the port's error if a line cannot be driven.
    pub fn shift_next_row<Port, Pulses>(
        &self,
        scanner: &mut RowScanner<ROW_COUNT>,
        port: &mut Port,
        pulses: &mut Pulses,
    ) -> Result<usize>
    where
        Port: SerialShiftPort,
        Error: From<Port::Error>,
        Pulses: PulseGenerator,
    {
        let next_row = scanner.next_row();
        let bytes = self.tlc_mux_static.with_rows(|rows| *rows.row_bytes(next_row));
        let row = scanner.shift_next(&bytes, port, pulses)?;
        self.tlc_mux_static.shifted_rows.fetch_add(1, Ordering::Relaxed);
        Ok(row)
    }
}

/// Device loop for [`TlcMux`].
///
/// Shifts row 0 before starting the pulse trains, so the first XLAT commits real data, then
/// services every cycle boundary for as long as the device lives. Port errors are logged and the
/// failed row is retried at the next boundary.
pub async fn tlc_mux_device_loop<const ROW_COUNT: usize, const ROW_BYTES: usize, Port, Pulses>(
    tlc_mux: TlcMux<ROW_COUNT, ROW_BYTES>,
    mut pulses: Pulses,
    mut port: Port,
) -> !
where
    Port: SerialShiftPort,
    Error: From<Port::Error>,
    Pulses: PulseGenerator,
{
    let mut scanner = RowScanner::<ROW_COUNT>::new();
    if let Err(_err) = tlc_mux.shift_next_row(&mut scanner, &mut port, &mut pulses) {
        #[cfg(feature = "defmt")]
        warn!(
            "tlc_mux_device_loop: first row shift failed: {}",
            defmt::Display2Format(&_err)
        );
    }
    pulses.start();
    #[cfg(feature = "defmt")]
    info!(
        "tlc_mux_device_loop: started with {} rows of {} bytes",
        ROW_COUNT, ROW_BYTES
    );

    loop {
        if let Err(_err) = tlc_mux.service_boundary(&mut scanner, &mut port, &mut pulses) {
            #[cfg(feature = "defmt")]
            warn!(
                "tlc_mux_device_loop: row {} shift failed: {}",
                scanner.next_row(),
                defmt::Display2Format(&_err)
            );
        }
        yield_now().await;
    }
}

/// Macro to generate a row-multiplexed TLC5940 device type (includes syntax details).
///
/// The generated type owns static storage, derefs to [`TlcMux`], and spawns an embassy task
/// running [`tlc_mux_device_loop`] with [`PwmPulses`](crate::pulse::pwm_pulses::PwmPulses) and a
/// [`BitBangPort`](crate::row_shift::BitBangPort) on `embassy_rp::gpio::Output` pins.
///
/// **Required fields:**
///
/// - `rows` - Number of multiplexed rows
/// - `row_bytes` - Packed bytes per row (24 per chip)
/// - `address_bits` - Row-select lines; must address every row
///
/// A [`BitBangPort`](crate::row_shift::BitBangPort) row of `row_bytes` must shift within one
/// period of `timing` (see [`check_bit_bang_budget`](crate::row_shift::check_bit_bang_budget));
/// otherwise the expansion fails to compile.
///
/// **Optional fields:**
///
/// - `timing` - A `const` [`PulseTiming`](crate::pulse::PulseTiming)
///   (default: [`PULSE_TIMING_DEFAULT`](crate::pulse::PULSE_TIMING_DEFAULT))
/// - `initial` - Grayscale value of every channel at start-up (default: 0)
///
/// # Example
///
/// ```rust,no_run
/// # #![no_std]
/// # #![no_main]
/// # use panic_probe as _;
/// # use core::convert::Infallible;
/// # use core::default::Default;
/// use embassy_rp::gpio::{Level, Output};
/// use embassy_rp::pwm::{Config, Pwm};
/// use tlc_mux::{Result, pulse::pwm_pulses::PwmChannel, tlc_mux};
///
/// // Four rows of two chips, selected through two address lines.
/// tlc_mux! {
///     Panel {
///         rows: 4,
///         row_bytes: 48,
///         address_bits: 2,
///         initial: 100,
///     }
/// }
///
/// # #[embassy_executor::main]
/// # async fn main(spawner: embassy_executor::Spawner) -> ! {
/// #     let err = example(spawner).await.unwrap_err();
/// #     core::panic!("{err}");
/// # }
/// async fn example(spawner: embassy_executor::Spawner) -> Result<Infallible> {
///     let p = embassy_rp::init(Default::default());
///     let panel = Panel::new(
///         Pwm::new_output_ab(p.PWM_SLICE5, p.PIN_10, p.PIN_11, Config::default()),
///         Pwm::new_output_a(p.PWM_SLICE6, p.PIN_12, Config::default()),
///         PwmChannel::A,
///         Output::new(p.PIN_2, Level::Low),
///         Output::new(p.PIN_3, Level::Low),
///         Output::new(p.PIN_4, Level::Low),
///         [Output::new(p.PIN_6, Level::Low), Output::new(p.PIN_7, Level::Low)],
///         spawner,
///     )?;
///
///     panel.set(0, 0, 4095);
///     panel.set_row(3, 2048);
///
///     core::future::pending().await // run forever
/// }
/// ```
#[cfg(not(feature = "host"))]
#[macro_export]
macro_rules! tlc_mux {
    ($($tt:tt)*) => { $crate::__tlc_mux_impl! { $($tt)* } };
}
#[cfg(not(feature = "host"))]
#[doc(inline)]
pub use tlc_mux;

// Public for macro expansion in downstream crates.
#[cfg(not(feature = "host"))]
#[doc(hidden)]
#[macro_export]
macro_rules! __tlc_mux_impl {
    // Entry point - name without visibility defaults to public
    (
        $name:ident {
            $($fields:tt)*
        }
    ) => {
        $crate::__tlc_mux_impl! {
            @__fill_defaults
            vis: pub,
            name: $name,
            rows: _UNSET_,
            row_bytes: _UNSET_,
            address_bits: _UNSET_,
            timing: $crate::pulse::PULSE_TIMING_DEFAULT,
            initial: 0,
            fields: [ $($fields)* ]
        }
    };

    // Entry point - name with explicit visibility
    (
        $vis:vis $name:ident {
            $($fields:tt)*
        }
    ) => {
        $crate::__tlc_mux_impl! {
            @__fill_defaults
            vis: $vis,
            name: $name,
            rows: _UNSET_,
            row_bytes: _UNSET_,
            address_bits: _UNSET_,
            timing: $crate::pulse::PULSE_TIMING_DEFAULT,
            initial: 0,
            fields: [ $($fields)* ]
        }
    };

    // Fill defaults: rows
    (@__fill_defaults
        vis: $vis:vis,
        name: $name:ident,
        rows: $rows:tt,
        row_bytes: $row_bytes:tt,
        address_bits: $address_bits:tt,
        timing: $timing:expr,
        initial: $initial:expr,
        fields: [ rows: $rows_value:expr $(, $($rest:tt)* )? ]
    ) => {
        $crate::__tlc_mux_impl! {
            @__fill_defaults
            vis: $vis,
            name: $name,
            rows: ($rows_value),
            row_bytes: $row_bytes,
            address_bits: $address_bits,
            timing: $timing,
            initial: $initial,
            fields: [ $($($rest)*)? ]
        }
    };

    // Fill defaults: row_bytes
    (@__fill_defaults
        vis: $vis:vis,
        name: $name:ident,
        rows: $rows:tt,
        row_bytes: $row_bytes:tt,
        address_bits: $address_bits:tt,
        timing: $timing:expr,
        initial: $initial:expr,
        fields: [ row_bytes: $row_bytes_value:expr $(, $($rest:tt)* )? ]
    ) => {
        $crate::__tlc_mux_impl! {
            @__fill_defaults
            vis: $vis,
            name: $name,
            rows: $rows,
            row_bytes: ($row_bytes_value),
            address_bits: $address_bits,
            timing: $timing,
            initial: $initial,
            fields: [ $($($rest)*)? ]
        }
    };

    // Fill defaults: address_bits
    (@__fill_defaults
        vis: $vis:vis,
        name: $name:ident,
        rows: $rows:tt,
        row_bytes: $row_bytes:tt,
        address_bits: $address_bits:tt,
        timing: $timing:expr,
        initial: $initial:expr,
        fields: [ address_bits: $address_bits_value:expr $(, $($rest:tt)* )? ]
    ) => {
        $crate::__tlc_mux_impl! {
            @__fill_defaults
            vis: $vis,
            name: $name,
            rows: $rows,
            row_bytes: $row_bytes,
            address_bits: ($address_bits_value),
            timing: $timing,
            initial: $initial,
            fields: [ $($($rest)*)? ]
        }
    };

    // Fill defaults: timing
    (@__fill_defaults
        vis: $vis:vis,
        name: $name:ident,
        rows: $rows:tt,
        row_bytes: $row_bytes:tt,
        address_bits: $address_bits:tt,
        timing: $timing:expr,
        initial: $initial:expr,
        fields: [ timing: $timing_value:expr $(, $($rest:tt)* )? ]
    ) => {
        $crate::__tlc_mux_impl! {
            @__fill_defaults
            vis: $vis,
            name: $name,
            rows: $rows,
            row_bytes: $row_bytes,
            address_bits: $address_bits,
            timing: $timing_value,
            initial: $initial,
            fields: [ $($($rest)*)? ]
        }
    };

    // Fill defaults: initial
    (@__fill_defaults
        vis: $vis:vis,
        name: $name:ident,
        rows: $rows:tt,
        row_bytes: $row_bytes:tt,
        address_bits: $address_bits:tt,
        timing: $timing:expr,
        initial: $initial:expr,
        fields: [ initial: $initial_value:expr $(, $($rest:tt)* )? ]
    ) => {
        $crate::__tlc_mux_impl! {
            @__fill_defaults
            vis: $vis,
            name: $name,
            rows: $rows,
            row_bytes: $row_bytes,
            address_bits: $address_bits,
            timing: $timing,
            initial: $initial_value,
            fields: [ $($($rest)*)? ]
        }
    };

    // Fill defaults: done
    (@__fill_defaults
        vis: $vis:vis,
        name: $name:ident,
        rows: $rows:tt,
        row_bytes: $row_bytes:tt,
        address_bits: $address_bits:tt,
        timing: $timing:expr,
        initial: $initial:expr,
        fields: [ ]
    ) => {
        $crate::__tlc_mux_impl! {
            @__build
            vis: $vis,
            name: $name,
            rows: $rows,
            row_bytes: $row_bytes,
            address_bits: $address_bits,
            timing: $timing,
            initial: $initial
        }
    };

    // Build errors for missing fields
    (@__build
        vis: $vis:vis,
        name: $name:ident,
        rows: _UNSET_,
        row_bytes: $row_bytes:tt,
        address_bits: $address_bits:tt,
        timing: $timing:expr,
        initial: $initial:expr
    ) => {
        compile_error!("tlc_mux! requires `rows: ...`");
    };

    (@__build
        vis: $vis:vis,
        name: $name:ident,
        rows: $rows:tt,
        row_bytes: _UNSET_,
        address_bits: $address_bits:tt,
        timing: $timing:expr,
        initial: $initial:expr
    ) => {
        compile_error!("tlc_mux! requires `row_bytes: ...`");
    };

    (@__build
        vis: $vis:vis,
        name: $name:ident,
        rows: $rows:tt,
        row_bytes: $row_bytes:tt,
        address_bits: _UNSET_,
        timing: $timing:expr,
        initial: $initial:expr
    ) => {
        compile_error!("tlc_mux! requires `address_bits: ...`");
    };

    // Build with all fields set
    (@__build
        vis: $vis:vis,
        name: $name:ident,
        rows: $rows:tt,
        row_bytes: $row_bytes:tt,
        address_bits: $address_bits:tt,
        timing: $timing:expr,
        initial: $initial:expr
    ) => {
        $crate::tlc_mux::paste::paste! {
            const _: () = ::core::assert!(
                $rows <= (1_usize << $address_bits),
                "tlc_mux! `address_bits` cannot select every row"
            );

            const [<$name:upper _TLC_MUX_TIMING>]: $crate::pulse::PulseTiming = $timing;

            const _: () = ::core::assert!(
                $crate::row_shift::check_bit_bang_budget(&[<$name:upper _TLC_MUX_TIMING>], $row_bytes)
                    .is_ok(),
                "tlc_mux! `row_bytes` cannot be shifted within one period of `timing`"
            );

            static [<$name:upper _TLC_MUX_STATIC>]: $crate::tlc_mux::TlcMuxStatic<{ $rows }, { $row_bytes }> =
                $crate::tlc_mux::TlcMux::<{ $rows }, { $row_bytes }>::new_static();
            static [<$name:upper _TLC_MUX_CELL>]: ::static_cell::StaticCell<$name> =
                ::static_cell::StaticCell::new();

            $vis struct $name {
                tlc_mux: $crate::tlc_mux::TlcMux<{ $rows }, { $row_bytes }>,
            }

            impl $name {
                /// Create the device and spawn its background task.
                ///
                /// - `blank_latch`: PWM slice with XLAT on output A and BLANK on output B
                /// - `gsclk`: PWM slice driving GSCLK on `gsclk_channel`
                /// - `sin`, `sclk`: serial data and clock of the chip chain
                /// - `row_latch`: row-select latch strobe
                /// - `address`: row-select lines, bit 0 first
                /// - `spawner`: Task spawner for background operations
                #[allow(clippy::too_many_arguments, reason = "One argument per wire")]
                pub fn new(
                    blank_latch: ::embassy_rp::pwm::Pwm<'static>,
                    gsclk: ::embassy_rp::pwm::Pwm<'static>,
                    gsclk_channel: $crate::pulse::pwm_pulses::PwmChannel,
                    sin: ::embassy_rp::gpio::Output<'static>,
                    sclk: ::embassy_rp::gpio::Output<'static>,
                    row_latch: ::embassy_rp::gpio::Output<'static>,
                    address: [::embassy_rp::gpio::Output<'static>; $address_bits],
                    spawner: ::embassy_executor::Spawner,
                ) -> $crate::Result<&'static Self> {
                    let tlc_mux = $crate::tlc_mux::TlcMux::new(&[<$name:upper _TLC_MUX_STATIC>], $initial);
                    let pulses = $crate::pulse::pwm_pulses::PwmPulses::new(
                        blank_latch,
                        gsclk,
                        gsclk_channel,
                        [<$name:upper _TLC_MUX_TIMING>],
                    );
                    let port = $crate::row_shift::BitBangPort::new(sin, sclk, row_latch, address);

                    let token = [<$name:snake _tlc_mux_task>](tlc_mux, pulses, port);
                    spawner.spawn(token).map_err($crate::Error::TaskSpawn)?;

                    Ok([<$name:upper _TLC_MUX_CELL>].init(Self { tlc_mux }))
                }
            }

            impl ::core::ops::Deref for $name {
                type Target = $crate::tlc_mux::TlcMux<{ $rows }, { $row_bytes }>;

                fn deref(&self) -> &Self::Target {
                    &self.tlc_mux
                }
            }

            #[::embassy_executor::task]
            async fn [<$name:snake _tlc_mux_task>](
                tlc_mux: $crate::tlc_mux::TlcMux<{ $rows }, { $row_bytes }>,
                pulses: $crate::pulse::pwm_pulses::PwmPulses<'static>,
                port: $crate::row_shift::BitBangPort<::embassy_rp::gpio::Output<'static>, { $address_bits }>,
            ) -> ! {
                $crate::tlc_mux::tlc_mux_device_loop(tlc_mux, pulses, port).await
            }
        }
    };
}
