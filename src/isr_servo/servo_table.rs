//! The fixed servo table and its tick-driven pulse scheduler.

use embedded_hal::digital::PinState;
use portable_atomic::{AtomicU8, AtomicU16, Ordering};

use crate::pin_bank::PinBank;
use crate::servo::{
    FRAME_TICKS, MAX_SERVOS, ServoChannel, ServoHandle, UNASSIGNED_PIN,
};
use crate::{Error, Result};

#[allow(
    clippy::cast_possible_truncation,
    reason = "MAX_SERVOS is 16 and always fits a u8"
)]
const MAX_SERVOS_U8: u8 = MAX_SERVOS as u8;

/// Sixteen servo slots shared between normal code and the tick interrupt.
///
/// The interrupt side only calls [`tick`](Self::tick). Everything else is normal-context API,
/// usually reached through [`IsrServo`](crate::IsrServo), which dereferences to this table.
/// There is no lock: each slot field is an independent atomic, and a configuration call may be
/// interrupted by a tick at any point.
///
/// Normal-context calls are meant for a single thread of control. Slots are claimed only through
/// `IsrServo::setup`, which takes `&mut self`.
pub struct ServoTable<P> {
    channels: [ServoChannel; MAX_SERVOS],
    in_use: AtomicU8,
    // Private to `tick`: runs 1..=FRAME_TICKS.
    frame_tick: AtomicU16,
    pins: P,
}

impl<P: PinBank> ServoTable<P> {
    /// Create an empty table driving `pins`. All slots start unassigned and disabled.
    #[must_use]
    pub const fn new(pins: P) -> Self {
        const {
            assert!(
                P::PIN_COUNT < UNASSIGNED_PIN,
                "pin bank must leave room for the unassigned pin value"
            );
        }
        Self {
            channels: [const { ServoChannel::new() }; MAX_SERVOS],
            in_use: AtomicU8::new(0),
            frame_tick: AtomicU16::new(1),
            pins,
        }
    }

    /// The pin bank this table drives.
    #[must_use]
    pub const fn pins(&self) -> &P {
        &self.pins
    }

    /// Advance the scheduler by one tick. Call once per tick interval from the tick source.
    ///
    /// Every enabled slot with a valid pin is driven high at frame tick 1 and low when the frame
    /// tick reaches its `pulse_ticks`. Other slots are never written. After the scan, the frame
    /// tick advances and wraps to 1 after [`FRAME_TICKS`].
    ///
    /// A slot with `pulse_ticks == 1` matches the low comparison first and so produces no pulse.
    ///
    /// Does not allocate, block, log, or panic.
    pub fn tick(&self) {
        let frame_tick = self.frame_tick.load(Ordering::Relaxed);

        for channel in &self.channels {
            if !channel.is_enabled() {
                continue;
            }
            let pin = channel.pin();
            if !P::is_valid_pin(pin) {
                continue;
            }
            if frame_tick == channel.pulse_ticks() {
                // Pulse ends; high again at frame tick 1.
                self.pins.write(pin, PinState::Low);
            } else if frame_tick == 1 {
                self.pins.write(pin, PinState::High);
            }
        }

        let next_tick = if frame_tick >= FRAME_TICKS {
            1
        } else {
            frame_tick.saturating_add(1)
        };
        self.frame_tick.store(next_tick, Ordering::Relaxed);
    }

    /// Set the position in degrees, mapped linearly onto the slot's pulse bounds.
    ///
    /// Degrees are stored as given; the pulse is held inside the slot's bounds.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidHandle`] for an out-of-range handle, [`Error::SlotUnavailable`] unless the
    /// slot is enabled with a valid pin. Nothing is changed on error.
    pub fn set_position(&self, handle: ServoHandle, degrees: u16) -> Result<()> {
        let channel = self.usable_channel(handle)?;
        let pulse_ticks = channel.apply_degrees(degrees);
        debug!(
            "servo {} position {} deg -> {} ticks",
            handle.index(),
            degrees,
            pulse_ticks
        );
        Ok(())
    }

    /// The last commanded position in degrees.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidHandle`] or [`Error::SlotUnavailable`], as for [`set_position`](Self::set_position).
    pub fn position(&self, handle: ServoHandle) -> Result<u16> {
        Ok(self.usable_channel(handle)?.position())
    }

    /// Set the pulse width in microseconds, clamped into the slot's bounds.
    ///
    /// Returns the width actually applied. The position is back-computed from it.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidHandle`] or [`Error::SlotUnavailable`], as for [`set_position`](Self::set_position).
    pub fn set_pulse_width(&self, handle: ServoHandle, pulse_us: u16) -> Result<u16> {
        let channel = self.usable_channel(handle)?;
        let clamped_us = channel.apply_pulse_width(pulse_us);
        debug!(
            "servo {} pulse {} us (requested {} us)",
            handle.index(),
            clamped_us,
            pulse_us
        );
        Ok(clamped_us)
    }

    /// The current pulse width in microseconds (a whole number of ticks).
    ///
    /// # Errors
    ///
    /// [`Error::InvalidHandle`] or [`Error::SlotUnavailable`], as for [`set_position`](Self::set_position).
    pub fn pulse_width(&self, handle: ServoHandle) -> Result<u16> {
        Ok(self.usable_channel(handle)?.pulse_width_us())
    }

    /// Free the slot so a later `setup` can reuse it.
    ///
    /// Does nothing when no servo is in use, when the handle is out of range, or when the slot
    /// is already unassigned. Deleting twice is safe.
    pub fn delete(&self, handle: ServoHandle) {
        if self.num_in_use() == 0 {
            return;
        }
        let Ok(channel) = self.channel(handle) else {
            return;
        };
        if self.release(channel) {
            info!("servo {} deleted", handle.index());
        }
    }

    /// Whether the slot currently produces pulses.
    ///
    /// A slot found with an out-of-range pin is disabled and unassigned before returning `false`.
    #[must_use]
    pub fn is_enabled(&self, handle: ServoHandle) -> bool {
        let Ok(channel) = self.channel(handle) else {
            return false;
        };
        if !self.heal_pin(handle, channel) {
            return false;
        }
        channel.is_enabled()
    }

    /// Resume pulses on the slot.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidHandle`] for an out-of-range handle. [`Error::SlotUnavailable`] when the
    /// slot has no valid pin (it is then disabled and unassigned) or no valid pulse.
    pub fn enable(&self, handle: ServoHandle) -> Result<()> {
        let channel = self.channel(handle)?;
        if !self.heal_pin(handle, channel) || !channel.has_valid_pulse() {
            return Err(Error::SlotUnavailable(handle));
        }
        channel.set_enabled(true);
        Ok(())
    }

    /// Stop pulses on the slot. The pin keeps its last level.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidHandle`] for an out-of-range handle.
    pub fn disable(&self, handle: ServoHandle) -> Result<()> {
        let channel = self.channel(handle)?;
        channel.set_enabled(false);
        self.heal_pin(handle, channel);
        Ok(())
    }

    /// Disable an enabled slot, or enable a disabled one under the same checks as
    /// [`enable`](Self::enable).
    ///
    /// # Errors
    ///
    /// As for [`enable`](Self::enable) and [`disable`](Self::disable).
    pub fn toggle(&self, handle: ServoHandle) -> Result<()> {
        if self.channel(handle)?.is_enabled() {
            self.disable(handle)
        } else {
            self.enable(handle)
        }
    }

    /// Enable every disabled slot that has a legal pin and a valid pulse.
    pub fn enable_all(&self) {
        for channel in &self.channels {
            if channel.has_valid_pulse() && !channel.is_enabled() && P::is_valid_pin(channel.pin())
            {
                channel.set_enabled(true);
            }
        }
    }

    /// Disable every slot, valid or not.
    pub fn disable_all(&self) {
        for channel in &self.channels {
            channel.set_enabled(false);
        }
    }

    /// Number of assigned slots.
    #[must_use]
    pub fn num_in_use(&self) -> u8 {
        self.in_use.load(Ordering::Relaxed)
    }

    /// Number of free slots.
    #[must_use]
    pub fn num_available(&self) -> u8 {
        MAX_SERVOS_U8.saturating_sub(self.num_in_use())
    }

    /// Take the lowest-index unassigned slot for `pin`. Bounds are already validated.
    pub(crate) fn claim(&self, pin: u8, min_us: u16, max_us: u16) -> Result<ServoHandle> {
        if !P::is_valid_pin(pin) || self.num_in_use() >= MAX_SERVOS_U8 {
            return Err(Error::ResourceExhausted);
        }
        let Some((channel, index)) = self
            .channels
            .iter()
            .zip(0..MAX_SERVOS_U8)
            .find(|(channel, _)| !channel.is_assigned())
        else {
            return Err(Error::ResourceExhausted);
        };

        self.pins.configure_as_output(pin);
        channel.assign(pin, min_us, max_us);
        self.in_use.fetch_add(1, Ordering::Relaxed);
        Ok(ServoHandle::new(index))
    }

    fn channel(&self, handle: ServoHandle) -> Result<&ServoChannel> {
        self.channels
            .get(usize::from(handle.index()))
            .ok_or(Error::InvalidHandle(handle))
    }

    fn usable_channel(&self, handle: ServoHandle) -> Result<&ServoChannel> {
        let channel = self.channel(handle)?;
        if channel.is_enabled() && P::is_valid_pin(channel.pin()) {
            Ok(channel)
        } else {
            Err(Error::SlotUnavailable(handle))
        }
    }

    /// Unassign an assigned slot and keep the in-use count in step. Returns whether it was.
    fn release(&self, channel: &ServoChannel) -> bool {
        if !channel.is_assigned() {
            return false;
        }
        channel.reset();
        // The count can only be zero here if the table was corrupted; never wrap.
        let _ = self
            .in_use
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |count| {
                count.checked_sub(1)
            });
        true
    }

    /// Returns whether the slot's pin is valid. A slot holding an out-of-range pin other than
    /// the unassigned marker is disabled and unassigned.
    fn heal_pin(&self, handle: ServoHandle, channel: &ServoChannel) -> bool {
        let pin = channel.pin();
        if P::is_valid_pin(pin) {
            return true;
        }
        channel.set_enabled(false);
        if pin != UNASSIGNED_PIN {
            warn!(
                "servo {} had invalid pin {}; disabling and unassigning",
                handle.index(),
                pin
            );
            self.release(channel);
        }
        false
    }

    #[cfg(test)]
    fn channel_for_test(&self, index: usize) -> &ServoChannel {
        self.channels.get(index).expect("slot index in range")
    }
}
