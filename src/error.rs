use derive_more::derive::{Display, Error};

use crate::servo::ServoHandle;
use crate::tick_source::TickSourceError;

/// A specialized `Result` where the error is this crate's `Error` type.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Define a unified error type for this crate.
///
/// Every failure is reported as a value; nothing in this crate panics on bad input, and the tick
/// path never produces an error at all.
///
/// Besides the three slot failures (`InvalidHandle`, `SlotUnavailable`, `ResourceExhausted`),
/// `InvalidBounds` rejects pulse bounds that could not hold a valid pulse, and `TickSource`
/// carries the reason a timer refused to arm.
#[derive(Clone, Copy, Debug, Display, Error, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The handle does not name a slot of the servo table.
    #[display("Servo handle {_0} is out of range")]
    InvalidHandle(#[error(not(source))] ServoHandle),

    /// The slot is unassigned, disabled, has an invalid pin, or has no valid pulse configured.
    #[display("Servo slot {_0} is not available")]
    SlotUnavailable(#[error(not(source))] ServoHandle),

    /// The servo table is full, or the requested pin is outside the legal range.
    #[display("No servo slot available for this pin")]
    ResourceExhausted,

    /// Pulse bounds must satisfy `TICK_INTERVAL_US <= min_us < max_us <= REFRESH_INTERVAL_US`.
    #[display("Pulse bounds {min_us}..={max_us} µs do not fit a refresh frame")]
    InvalidBounds {
        /// Requested minimum pulse width (µs).
        min_us: u16,
        /// Requested maximum pulse width (µs).
        max_us: u16,
    },

    /// Arming or re-arming the tick source failed.
    #[display("Tick source failed: {_0}")]
    TickSource(TickSourceError),
}

impl From<TickSourceError> for Error {
    fn from(err: TickSourceError) -> Self {
        Self::TickSource(err)
    }
}
