use core::convert::Infallible;

use derive_more::derive::{Display, Error};

/// A specialized `Result` where the error is this crate's `Error` type.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Define a unified error type for this crate.
///
/// Out-of-range rows, channels and grayscale values are caller bugs and trap with `assert!`
/// instead of showing up here. Everything below is either a configuration defect, caught before
/// pulses start, or a failure reported by the hardware layer.
#[expect(missing_docs, reason = "The variants are self-explanatory.")]
#[derive(Debug, Display, Error)]
pub enum Error {
    // `#[error(not(source))]` below tells `derive_more` that `embassy_executor::SpawnError` does
    // not implement Rust's `core::error::Error` trait.
    #[cfg(any(feature = "pico1", feature = "pico2"))]
    #[display("{_0:?}")]
    TaskSpawn(#[error(not(source))] embassy_executor::SpawnError),

    #[display("BLANK/XLAT period must be non-zero")]
    ZeroPeriod,

    #[display("GSCLK period must be at least two ticks")]
    GsclkPeriodTooShort,

    #[display("XLAT window must be non-empty and strictly inside the BLANK window")]
    LatchNotInsideBlank,

    #[display("BLANK window must be shorter than the BLANK/XLAT period")]
    BlankNotInsidePeriod,

    #[display("BLANK/XLAT period does not fit the 16-bit PWM counter")]
    PeriodOverflow,

    #[display("Row shift does not finish before the next XLAT window")]
    ShiftExceedsPeriod,

    #[display("Error setting output state")]
    CannotSetOutputState,
}

impl From<Infallible> for Error {
    fn from(_: Infallible) -> Self {
        Self::CannotSetOutputState
    }
}

#[cfg(any(feature = "pico1", feature = "pico2"))]
impl From<embassy_executor::SpawnError> for Error {
    fn from(err: embassy_executor::SpawnError) -> Self {
        Self::TaskSpawn(err)
    }
}
