//! Servo channel slots and the pulse-width arithmetic behind them.
//!
//! A hobby servo such as the SG90 expects one pulse every 20 ms. The pulse width (roughly
//! 544-2400 µs) selects the position. This module holds the constants of that signal, the
//! [`ServoHandle`] returned to callers, and the per-slot state the tick scheduler reads.
//!
//! Every slot field is its own atomic. Normal code writes them; the tick interrupt only reads them.
//! Multi-field consistency within a single tick is not guaranteed, and does not need to be: the
//! worst case is one frame with a pulse computed from a half-updated slot.

use derive_more::derive::Display;
use portable_atomic::{AtomicBool, AtomicU8, AtomicU16, Ordering};

/// Number of servo channels (slots) in the table.
pub const MAX_SERVOS: usize = 16;

/// Scheduler tick interval in microseconds. This is the timing resolution of every pulse.
pub const TICK_INTERVAL_US: u16 = 10;

/// Servo refresh period in microseconds (50 Hz).
pub const REFRESH_INTERVAL_US: u16 = 20_000;

/// Number of ticks in one refresh frame.
pub const FRAME_TICKS: u16 = REFRESH_INTERVAL_US / TICK_INTERVAL_US;

/// Default minimum pulse width for hobby servos (microseconds).
pub const SERVO_MIN_US_DEFAULT: u16 = 544;

/// Default maximum pulse width for hobby servos (microseconds).
pub const SERVO_MAX_US_DEFAULT: u16 = 2_400;

/// Logical position range is `0..=MAX_DEGREES`.
pub const MAX_DEGREES: u16 = 180;

/// Pin value marking a slot as unassigned. Lies outside every pin bank's valid range.
pub const UNASSIGNED_PIN: u8 = u8::MAX;

/// Index of a slot in the servo table. Stable from `setup` until `delete`.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ServoHandle(u8);

impl ServoHandle {
    /// Wrap a raw slot index. Out-of-range indexes are allowed and rejected by each operation.
    #[must_use]
    pub const fn new(index: u8) -> Self {
        Self(index)
    }

    /// The slot index.
    #[must_use]
    pub const fn index(self) -> u8 {
        self.0
    }
}

impl From<u8> for ServoHandle {
    fn from(index: u8) -> Self {
        Self(index)
    }
}

impl From<ServoHandle> for u8 {
    fn from(handle: ServoHandle) -> Self {
        handle.0
    }
}

/// Re-map `value` from `[in_min, in_max]` onto `[out_min, out_max]`.
///
/// Integer arithmetic, truncating toward zero. Values outside the input range extrapolate. A
/// degenerate input range maps everything to `out_min`.
#[must_use]
pub const fn map_linear(value: i64, in_min: i64, in_max: i64, out_min: i64, out_max: i64) -> i64 {
    let Some(scaled) = value
        .saturating_sub(in_min)
        .saturating_mul(out_max.saturating_sub(out_min))
        .checked_div(in_max.saturating_sub(in_min))
    else {
        return out_min;
    };
    out_min.saturating_add(scaled)
}

/// Convert a pulse width to whole ticks (truncating).
#[must_use]
pub const fn us_to_ticks(pulse_us: u16) -> u16 {
    pulse_us / TICK_INTERVAL_US
}

/// Convert ticks back to microseconds.
#[must_use]
pub const fn ticks_to_us(ticks: u16) -> u16 {
    ticks.saturating_mul(TICK_INTERVAL_US)
}

/// Degrees to a tick count on `[min_ticks, max_ticks]`, not clamped.
///
/// Maps in tick units, so the result is always a whole multiple of the tick interval away from
/// `min_ticks`.
#[must_use]
pub const fn degrees_to_ticks(degrees: u16, min_ticks: u16, max_ticks: u16) -> i64 {
    map_linear(
        degrees as i64,
        0,
        MAX_DEGREES as i64,
        min_ticks as i64,
        max_ticks as i64,
    )
}

/// Pulse width on `[min_us, max_us]` back to degrees.
#[must_use]
pub const fn us_to_degrees(pulse_us: u16, min_us: u16, max_us: u16) -> u16 {
    let degrees = map_linear(
        pulse_us as i64,
        min_us as i64,
        max_us as i64,
        0,
        MAX_DEGREES as i64,
    );
    clamp_to_u16(degrees)
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "the value is range-checked first"
)]
const fn clamp_to_u16(value: i64) -> u16 {
    if value < 0 {
        0
    } else if value > u16::MAX as i64 {
        u16::MAX
    } else {
        value as u16
    }
}

/// One slot of the servo table.
pub(crate) struct ServoChannel {
    pin: AtomicU8,
    pulse_ticks: AtomicU16,
    position: AtomicU16,
    enabled: AtomicBool,
    min_us: AtomicU16,
    max_us: AtomicU16,
}

impl ServoChannel {
    pub(crate) const fn new() -> Self {
        Self {
            pin: AtomicU8::new(UNASSIGNED_PIN),
            pulse_ticks: AtomicU16::new(0),
            position: AtomicU16::new(0),
            enabled: AtomicBool::new(false),
            min_us: AtomicU16::new(0),
            max_us: AtomicU16::new(0),
        }
    }

    pub(crate) fn pin(&self) -> u8 {
        self.pin.load(Ordering::Relaxed)
    }

    pub(crate) fn is_assigned(&self) -> bool {
        self.pin() != UNASSIGNED_PIN
    }

    // Acquire pairs with the Release in `assign`/`set_enabled` so the scheduler sees a newly
    // enabled slot with its pin and pulse already in place.
    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub(crate) fn pulse_ticks(&self) -> u16 {
        self.pulse_ticks.load(Ordering::Relaxed)
    }

    pub(crate) fn position(&self) -> u16 {
        self.position.load(Ordering::Relaxed)
    }

    pub(crate) fn min_us(&self) -> u16 {
        self.min_us.load(Ordering::Relaxed)
    }

    pub(crate) fn max_us(&self) -> u16 {
        self.max_us.load(Ordering::Relaxed)
    }

    pub(crate) fn min_ticks(&self) -> u16 {
        us_to_ticks(self.min_us())
    }

    pub(crate) fn max_ticks(&self) -> u16 {
        us_to_ticks(self.max_us())
    }

    /// A pulse shorter than `min_ticks` means the slot was never given a usable width.
    pub(crate) fn has_valid_pulse(&self) -> bool {
        self.pulse_ticks() >= self.min_ticks()
    }

    pub(crate) fn pulse_width_us(&self) -> u16 {
        ticks_to_us(self.pulse_ticks())
    }

    /// Take an unassigned slot: bounds, minimum pulse, position 0, then enable.
    pub(crate) fn assign(&self, pin: u8, min_us: u16, max_us: u16) {
        self.min_us.store(min_us, Ordering::Relaxed);
        self.max_us.store(max_us, Ordering::Relaxed);
        self.pulse_ticks.store(us_to_ticks(min_us), Ordering::Relaxed);
        self.position.store(0, Ordering::Relaxed);
        self.pin.store(pin, Ordering::Relaxed);
        self.set_enabled(true);
    }

    /// Return the slot to its unassigned state. Disables first so the scheduler stops using it.
    pub(crate) fn reset(&self) {
        self.set_enabled(false);
        self.pin.store(UNASSIGNED_PIN, Ordering::Relaxed);
        self.pulse_ticks.store(0, Ordering::Relaxed);
        self.position.store(0, Ordering::Relaxed);
        self.min_us.store(0, Ordering::Relaxed);
        self.max_us.store(0, Ordering::Relaxed);
    }

    /// Store `degrees` verbatim and the matching tick count.
    ///
    /// Degrees are not clamped, but the tick count is held inside `[min_ticks, max_ticks]` so an
    /// enabled slot always carries a legal pulse.
    pub(crate) fn apply_degrees(&self, degrees: u16) -> u16 {
        let min_ticks = self.min_ticks();
        let max_ticks = self.max_ticks();
        let ticks = clamp_to_u16(degrees_to_ticks(degrees, min_ticks, max_ticks))
            .max(min_ticks)
            .min(max_ticks);
        self.position.store(degrees, Ordering::Relaxed);
        self.pulse_ticks.store(ticks, Ordering::Relaxed);
        ticks
    }

    /// Clamp `pulse_us` into the slot's bounds, store its ticks and the implied position.
    ///
    /// Returns the clamped width.
    pub(crate) fn apply_pulse_width(&self, pulse_us: u16) -> u16 {
        let min_us = self.min_us();
        let max_us = self.max_us();
        let clamped_us = if pulse_us < min_us {
            min_us
        } else if pulse_us > max_us {
            max_us
        } else {
            pulse_us
        };
        self.pulse_ticks
            .store(us_to_ticks(clamped_us), Ordering::Relaxed);
        self.position.store(
            us_to_degrees(clamped_us, min_us, max_us),
            Ordering::Relaxed,
        );
        clamped_us
    }

    #[cfg(test)]
    pub(crate) fn force_pin(&self, pin: u8) {
        self.pin.store(pin, Ordering::Relaxed);
    }

    #[cfg(test)]
    pub(crate) fn force_pulse_ticks(&self, ticks: u16) {
        self.pulse_ticks.store(ticks, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::{
        FRAME_TICKS, SERVO_MAX_US_DEFAULT, SERVO_MIN_US_DEFAULT, ServoChannel, degrees_to_ticks,
        map_linear, us_to_degrees, us_to_ticks,
    };

    #[test]
    fn frame_is_two_thousand_ticks() {
        assert_eq!(FRAME_TICKS, 2000);
    }

    #[test]
    fn map_linear_truncates_toward_zero() {
        // 90 * 1856 / 180 = 928 exactly; 1 * 1856 / 180 = 10.31 truncates to 10.
        assert_eq!(map_linear(90, 0, 180, 544, 2400), 1472);
        assert_eq!(map_linear(1, 0, 180, 544, 2400), 554);
        // (1500 - 544) * 180 / 1856 = 92.7 truncates to 92.
        assert_eq!(map_linear(1500, 544, 2400, 0, 180), 92);
    }

    #[test]
    fn map_linear_with_degenerate_range_returns_out_min() {
        assert_eq!(map_linear(7, 3, 3, 10, 20), 10);
    }

    #[test]
    fn degrees_extrapolate_past_180() {
        // 54 + 270 * 186 / 180 = 333
        assert_eq!(degrees_to_ticks(270, 54, 240), 333);
    }

    #[test]
    fn bounds_convert_to_ticks_by_truncation() {
        assert_eq!(us_to_ticks(SERVO_MIN_US_DEFAULT), 54);
        assert_eq!(us_to_ticks(SERVO_MAX_US_DEFAULT), 240);
        assert_eq!(us_to_degrees(SERVO_MAX_US_DEFAULT, 544, 2400), 180);
    }

    #[test]
    fn assign_starts_at_minimum_pulse() {
        let channel = ServoChannel::new();
        assert!(!channel.is_assigned());
        channel.assign(4, 544, 2400);
        assert!(channel.is_assigned());
        assert!(channel.is_enabled());
        assert_eq!(channel.pulse_ticks(), 54);
        assert_eq!(channel.position(), 0);
        assert!(channel.has_valid_pulse());
    }

    #[test]
    fn apply_degrees_keeps_degrees_but_bounds_ticks() {
        let channel = ServoChannel::new();
        channel.assign(4, 544, 2400);
        assert_eq!(channel.apply_degrees(90), 147);
        assert_eq!(channel.apply_degrees(250), 240);
        assert_eq!(channel.position(), 250);
    }

    #[test]
    fn apply_degrees_maps_in_tick_units() {
        let channel = ServoChannel::new();
        channel.assign(4, 544, 2400);
        // 54 + 20 * 186 / 180 = 74; mapping in µs first would give 75.
        assert_eq!(channel.apply_degrees(20), 74);
        assert_eq!(channel.apply_degrees(29), 74);

        channel.assign(4, 1005, 1995);
        // Ticks 100..=199; one degree truncates back to the minimum.
        assert_eq!(channel.apply_degrees(1), 100);
    }

    #[test]
    fn reset_clears_every_field() {
        let channel = ServoChannel::new();
        channel.assign(4, 544, 2400);
        channel.apply_pulse_width(1500);
        channel.reset();
        assert!(!channel.is_assigned());
        assert!(!channel.is_enabled());
        assert_eq!(channel.pulse_ticks(), 0);
        assert_eq!(channel.position(), 0);
        assert_eq!(channel.min_us(), 0);
        assert_eq!(channel.max_us(), 0);
    }
}
