//! A device abstraction that multiplexes up to sixteen hobby servos onto one periodic timer.
//!
//! Each servo gets a software PWM signal: every 20 ms frame, the tick scheduler drives the pin
//! high at the first tick and low once the pulse has lasted its configured number of 10 µs ticks.
//! Any output pin can carry a servo; no PWM hardware is used.
//!
//! **After reading the example below, see also:**
//!
//! - [`ServoTable`]: the shared table; [`IsrServo`] dereferences to it for every per-servo call.
//! - [`servo_channel!`](macro@crate::servo_channel): keyword-argument setup with default bounds.
//! - [`TickSource`]: the timer collaborator. [`TickerTickSource`](crate::tick_source::TickerTickSource)
//!   is an `embassy-time` implementation.
//!
//! # Example
//!
//! ```rust
//! # use core::convert::Infallible;
//! # use embedded_hal::digital::{ErrorType, OutputPin};
//! use isr_servo::pin_bank::OutputPinBank;
//! use isr_servo::tick_source::{TickSource, TickSourceError};
//! use isr_servo::{IsrServo, ServoTable, servo_channel};
//!
//! # struct Gpio;
//! # impl ErrorType for Gpio { type Error = Infallible; }
//! # impl OutputPin for Gpio {
//! #     fn set_low(&mut self) -> Result<(), Infallible> { Ok(()) }
//! #     fn set_high(&mut self) -> Result<(), Infallible> { Ok(()) }
//! # }
//! # struct HardwareTimer;
//! # impl TickSource for HardwareTimer {
//! #     fn arm(&mut self, _interval_us: u32) -> Result<(), TickSourceError> { Ok(()) }
//! #     fn disarm(&mut self) {}
//! #     fn rearm(&mut self) -> Result<(), TickSourceError> { Ok(()) }
//! # }
//! # fn main() -> isr_servo::Result<()> {
//! // The timer interrupt calls `SERVO_TABLE.tick()` every 10 µs.
//! static SERVO_TABLE: ServoTable<OutputPinBank<Gpio, 8>> =
//!     ServoTable::new(OutputPinBank::new([Gpio, Gpio, Gpio, Gpio, Gpio, Gpio, Gpio, Gpio]));
//!
//! let mut isr_servo = IsrServo::new(&SERVO_TABLE, HardwareTimer);
//! let pan = isr_servo.setup(4)?; // first setup arms the timer
//! let tilt = servo_channel! {
//!     servo: isr_servo,
//!     pin: 5,
//!     min_us: 800,
//! }?;
//!
//! isr_servo.set_position(pan, 90)?;
//! let applied_us = isr_servo.set_pulse_width(tilt, 3000)?;
//! assert_eq!(applied_us, 2400); // clamped to the servo's maximum
//!
//! isr_servo.delete(tilt);
//! assert_eq!(isr_servo.num_in_use(), 1);
//! # Ok(())
//! # }
//! ```

use core::ops::Deref;

use crate::pin_bank::PinBank;
use crate::servo::{
    REFRESH_INTERVAL_US, SERVO_MAX_US_DEFAULT, SERVO_MIN_US_DEFAULT, ServoHandle,
    TICK_INTERVAL_US,
};
use crate::tick_source::{TickSource, TickSourceError};
use crate::{Error, Result};

mod servo_table;

pub use servo_table::ServoTable;

/// The servo context: owns the tick source and borrows the table the tick source drives.
///
/// Per-servo operations ([`set_position`](ServoTable::set_position),
/// [`enable`](ServoTable::enable), ...) are reached through [`Deref`] to [`ServoTable`].
///
/// The tick source is armed by the first [`setup`](Self::setup) and disarmed when the
/// `IsrServo` is dropped.
///
/// See the [module-level example](mod@crate::isr_servo) for usage.
pub struct IsrServo<'a, T: TickSource, P: PinBank> {
    table: &'a ServoTable<P>,
    tick_source: T,
    initialized: bool,
    armed: bool,
}

impl<'a, T: TickSource, P: PinBank> IsrServo<'a, T, P> {
    /// Create a servo context. Nothing is armed until the first `setup`.
    #[must_use]
    pub const fn new(table: &'a ServoTable<P>, tick_source: T) -> Self {
        Self {
            table,
            tick_source,
            initialized: false,
            armed: false,
        }
    }

    /// Attach a servo on `pin` with the default bounds
    /// ([`SERVO_MIN_US_DEFAULT`]..=[`SERVO_MAX_US_DEFAULT`] µs).
    ///
    /// # Errors
    ///
    /// As for [`setup_with_bounds`](Self::setup_with_bounds).
    pub fn setup(&mut self, pin: u8) -> Result<ServoHandle> {
        self.setup_with_bounds(pin, SERVO_MIN_US_DEFAULT, SERVO_MAX_US_DEFAULT)
    }

    /// Attach a servo on `pin` with pulse bounds `min_us..=max_us`.
    ///
    /// The servo takes the lowest free slot, starts at its minimum pulse (position 0), and is
    /// enabled. The first call arms the tick source.
    ///
    /// # Errors
    ///
    /// - [`Error::ResourceExhausted`] if `pin` is outside the pin bank or all slots are taken.
    /// - [`Error::InvalidBounds`] unless `TICK_INTERVAL_US <= min_us < max_us <= REFRESH_INTERVAL_US`.
    /// - [`Error::TickSource`] if this is the first setup and arming fails. No slot is taken;
    ///   later setups succeed without a running timer until [`rearm`](Self::rearm) succeeds.
    pub fn setup_with_bounds(&mut self, pin: u8, min_us: u16, max_us: u16) -> Result<ServoHandle> {
        if !P::is_valid_pin(pin) {
            return Err(Error::ResourceExhausted);
        }
        validate_bounds(min_us, max_us)?;

        if !self.initialized {
            self.initialized = true;
            if let Err(err) = self.tick_source.arm(u32::from(TICK_INTERVAL_US)) {
                error!("could not arm tick source: {}", err);
                return Err(err.into());
            }
            self.armed = true;
            info!("tick source armed at {} us", TICK_INTERVAL_US);
        }

        let handle = self.table.claim(pin, min_us, max_us)?;
        info!(
            "servo {} on pin {} ({}..={} us)",
            handle.index(),
            pin,
            min_us,
            max_us
        );
        Ok(handle)
    }

    /// Start the tick source again, with its last interval or, if it never ran, the tick interval.
    ///
    /// # Errors
    ///
    /// [`Error::TickSource`] if the tick source refuses.
    pub fn rearm(&mut self) -> Result<()> {
        let result = match self.tick_source.rearm() {
            Err(TickSourceError::NeverArmed) => self.tick_source.arm(u32::from(TICK_INTERVAL_US)),
            other => other,
        };
        if let Err(err) = result {
            error!("could not rearm tick source: {}", err);
            return Err(err.into());
        }
        self.initialized = true;
        self.armed = true;
        info!("tick source rearmed");
        Ok(())
    }

    /// Stop the tick source. Pins keep their last level; slots keep their configuration.
    pub fn disarm(&mut self) {
        self.tick_source.disarm();
        self.armed = false;
        info!("tick source disarmed");
    }

    /// Whether the tick source is currently running.
    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.armed
    }

    /// The servo table this context configures.
    #[must_use]
    pub const fn table(&self) -> &'a ServoTable<P> {
        self.table
    }

    /// The owned tick source.
    #[must_use]
    pub const fn tick_source(&self) -> &T {
        &self.tick_source
    }
}

impl<T: TickSource, P: PinBank> Deref for IsrServo<'_, T, P> {
    type Target = ServoTable<P>;

    fn deref(&self) -> &Self::Target {
        self.table
    }
}

impl<T: TickSource, P: PinBank> Drop for IsrServo<'_, T, P> {
    fn drop(&mut self) {
        if self.armed {
            self.disarm();
        }
    }
}

const fn validate_bounds(min_us: u16, max_us: u16) -> Result<()> {
    if TICK_INTERVAL_US <= min_us && min_us < max_us && max_us <= REFRESH_INTERVAL_US {
        Ok(())
    } else {
        Err(Error::InvalidBounds { min_us, max_us })
    }
}

/// Attach a servo using keyword arguments. Expands to
/// [`IsrServo::setup_with_bounds`] and evaluates to its `Result`.
///
/// **Required fields:**
///
/// - `servo`: the [`IsrServo`] to configure (a place expression; borrowed mutably)
/// - `pin`: the pin number
///
/// **Optional fields:**
///
/// - `min_us`: minimum pulse width in µs (default: [`SERVO_MIN_US_DEFAULT`])
/// - `max_us`: maximum pulse width in µs (default: [`SERVO_MAX_US_DEFAULT`])
///
/// Fields may appear in any order.
///
/// # Example
///
/// ```rust,ignore
/// let gripper = servo_channel! {
///     servo: isr_servo,
///     pin: 7,
///     max_us: 2000,
/// }?;
/// ```
#[macro_export]
macro_rules! servo_channel {
    ($($tt:tt)*) => { $crate::__servo_channel_impl! { $($tt)* } };
}
#[doc(inline)]
pub use servo_channel;

// Public for macro expansion in downstream crates.
#[doc(hidden)]
#[macro_export]
macro_rules! __servo_channel_impl {
    // Fill defaults: servo
    (@__fill_defaults
        servo: $servo:tt,
        pin: $pin:tt,
        min_us: $min_us:expr,
        max_us: $max_us:expr,
        fields: [ servo: $servo_value:expr $(, $($rest:tt)* )? ]
    ) => {
        $crate::__servo_channel_impl! {
            @__fill_defaults
            servo: $servo_value,
            pin: $pin,
            min_us: $min_us,
            max_us: $max_us,
            fields: [ $($($rest)*)? ]
        }
    };

    // Fill defaults: pin
    (@__fill_defaults
        servo: $servo:tt,
        pin: $pin:tt,
        min_us: $min_us:expr,
        max_us: $max_us:expr,
        fields: [ pin: $pin_value:expr $(, $($rest:tt)* )? ]
    ) => {
        $crate::__servo_channel_impl! {
            @__fill_defaults
            servo: $servo,
            pin: $pin_value,
            min_us: $min_us,
            max_us: $max_us,
            fields: [ $($($rest)*)? ]
        }
    };

    // Fill defaults: min_us
    (@__fill_defaults
        servo: $servo:tt,
        pin: $pin:tt,
        min_us: $min_us:expr,
        max_us: $max_us:expr,
        fields: [ min_us: $min_us_value:expr $(, $($rest:tt)* )? ]
    ) => {
        $crate::__servo_channel_impl! {
            @__fill_defaults
            servo: $servo,
            pin: $pin,
            min_us: $min_us_value,
            max_us: $max_us,
            fields: [ $($($rest)*)? ]
        }
    };

    // Fill defaults: max_us
    (@__fill_defaults
        servo: $servo:tt,
        pin: $pin:tt,
        min_us: $min_us:expr,
        max_us: $max_us:expr,
        fields: [ max_us: $max_us_value:expr $(, $($rest:tt)* )? ]
    ) => {
        $crate::__servo_channel_impl! {
            @__fill_defaults
            servo: $servo,
            pin: $pin,
            min_us: $min_us,
            max_us: $max_us_value,
            fields: [ $($($rest)*)? ]
        }
    };

    // Fill defaults: terminate and build
    (@__fill_defaults
        servo: $servo:tt,
        pin: $pin:tt,
        min_us: $min_us:expr,
        max_us: $max_us:expr,
        fields: [ ]
    ) => {
        $crate::__servo_channel_impl! {
            @__build
            servo: $servo,
            pin: $pin,
            min_us: $min_us,
            max_us: $max_us
        }
    };

    // Build errors for missing fields
    (@__build
        servo: _UNSET_,
        pin: $pin:tt,
        min_us: $min_us:expr,
        max_us: $max_us:expr
    ) => {
        compile_error!("servo_channel! requires `servo: ...`")
    };

    (@__build
        servo: $servo:tt,
        pin: _UNSET_,
        min_us: $min_us:expr,
        max_us: $max_us:expr
    ) => {
        compile_error!("servo_channel! requires `pin: ...`")
    };

    (@__build
        servo: $servo:tt,
        pin: $pin:tt,
        min_us: $min_us:expr,
        max_us: $max_us:expr
    ) => {
        $servo.setup_with_bounds($pin, $min_us, $max_us)
    };

    // Entry point; last so the internal rules above match first
    ($($fields:tt)*) => {
        $crate::__servo_channel_impl! {
            @__fill_defaults
            servo: _UNSET_,
            pin: _UNSET_,
            min_us: $crate::servo::SERVO_MIN_US_DEFAULT,
            max_us: $crate::servo::SERVO_MAX_US_DEFAULT,
            fields: [ $($fields)* ]
        }
    };
}
