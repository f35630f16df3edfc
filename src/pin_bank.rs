//! Numbered output pins, as seen by the servo table.
//!
//! The table stores plain pin numbers so that any slot can drive any pin. [`PinBank`] is the
//! collaborator that turns a number into a level on a wire. [`OutputPinBank`] adapts an array of
//! `embedded-hal` output pins.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embedded_hal::digital::{OutputPin, PinState};

use crate::servo::UNASSIGNED_PIN;

/// A bank of digital outputs addressed by pin number.
///
/// Both methods take `&self`: the tick interrupt writes pins while normal code configures new
/// ones. They are expected to be O(1) and to never fail for a pin in `0..PIN_COUNT`.
pub trait PinBank {
    /// Valid pin numbers are `0..PIN_COUNT`. Must be below [`UNASSIGNED_PIN`].
    const PIN_COUNT: u8;

    /// Make `pin` a push-pull output.
    fn configure_as_output(&self, pin: u8);

    /// Drive `pin` high or low.
    fn write(&self, pin: u8, state: PinState);

    /// Whether `pin` addresses a pin of this bank.
    #[must_use]
    fn is_valid_pin(pin: u8) -> bool {
        pin < Self::PIN_COUNT
    }
}

/// A [`PinBank`] over `N` `embedded-hal` output pins; pin number `i` is `pins[i]`.
///
/// The array is kept behind a critical-section mutex, held for one pin operation at a time.
/// Write errors are dropped: the scheduler cannot act on them, and the next frame writes again.
///
/// # Example
///
/// ```rust
/// use core::convert::Infallible;
/// use embedded_hal::digital::{ErrorType, OutputPin, PinState};
/// use isr_servo::pin_bank::{OutputPinBank, PinBank};
///
/// struct Led;
/// impl ErrorType for Led {
///     type Error = Infallible;
/// }
/// impl OutputPin for Led {
///     fn set_low(&mut self) -> Result<(), Infallible> { Ok(()) }
///     fn set_high(&mut self) -> Result<(), Infallible> { Ok(()) }
/// }
///
/// let bank = OutputPinBank::new([Led, Led]);
/// assert_eq!(OutputPinBank::<Led, 2>::PIN_COUNT, 2);
/// bank.write(1, PinState::High);
/// ```
pub struct OutputPinBank<O, const N: usize> {
    pins: Mutex<CriticalSectionRawMutex, RefCell<[O; N]>>,
}

impl<O: OutputPin, const N: usize> OutputPinBank<O, N> {
    /// Wrap `pins`; their array index becomes their pin number.
    #[must_use]
    pub const fn new(pins: [O; N]) -> Self {
        Self {
            pins: Mutex::new(RefCell::new(pins)),
        }
    }

    fn with_pin(&self, pin: u8, action: impl FnOnce(&mut O)) {
        self.pins.lock(|pins| {
            if let Some(output) = pins.borrow_mut().get_mut(usize::from(pin)) {
                action(output);
            }
        });
    }
}

impl<O: OutputPin, const N: usize> PinBank for OutputPinBank<O, N> {
    #[allow(
        clippy::cast_possible_truncation,
        reason = "the assert bounds N below u8::MAX"
    )]
    const PIN_COUNT: u8 = {
        assert!(
            N < UNASSIGNED_PIN as usize,
            "an OutputPinBank holds at most 254 pins"
        );
        N as u8
    };

    fn configure_as_output(&self, pin: u8) {
        self.with_pin(pin, |output| {
            let _ = output.set_low();
        });
    }

    fn write(&self, pin: u8, state: PinState) {
        self.with_pin(pin, |output| {
            let _ = output.set_state(state);
        });
    }
}
