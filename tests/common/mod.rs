//! Host doubles shared by the integration tests: a pin bank that records every write and a tick
//! source whose arming can be scripted to fail.
#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use embedded_hal::digital::PinState;
use isr_servo::ServoTable;
use isr_servo::pin_bank::PinBank;
use isr_servo::tick_source::{TickSource, TickSourceError};

/// A pin bank with 18 pins (0..=17) that records configuration and writes in order.
#[derive(Default)]
pub struct RecordingPins {
    configured: RefCell<Vec<u8>>,
    writes: RefCell<Vec<(u8, PinState)>>,
}

impl RecordingPins {
    /// Pins configured as outputs, in order.
    pub fn configured(&self) -> Vec<u8> {
        self.configured.borrow().clone()
    }

    /// Drain and return every write since the last call.
    pub fn take_writes(&self) -> Vec<(u8, PinState)> {
        self.writes.take()
    }

    /// The last level written to `pin`, if any.
    pub fn level(&self, pin: u8) -> Option<PinState> {
        self.writes
            .borrow()
            .iter()
            .rev()
            .find(|(written_pin, _)| *written_pin == pin)
            .map(|(_, state)| *state)
    }
}

impl PinBank for RecordingPins {
    const PIN_COUNT: u8 = 18;

    fn configure_as_output(&self, pin: u8) {
        self.configured.borrow_mut().push(pin);
    }

    fn write(&self, pin: u8, state: PinState) {
        self.writes.borrow_mut().push((pin, state));
    }
}

/// What a [`ScriptedTickSource`] has been asked to do. Shared with the test after the tick
/// source moves into an `IsrServo`.
#[derive(Default)]
pub struct TickLog {
    pub arm_calls: Cell<u32>,
    pub disarm_calls: Cell<u32>,
    pub armed: Cell<bool>,
    pub last_interval_us: Cell<Option<u32>>,
    pub fail_next_arm: Cell<bool>,
}

pub struct ScriptedTickSource {
    log: Rc<TickLog>,
}

impl ScriptedTickSource {
    pub fn new() -> (Self, Rc<TickLog>) {
        let log = Rc::new(TickLog::default());
        (
            Self {
                log: Rc::clone(&log),
            },
            log,
        )
    }
}

impl ScriptedTickSource {
    pub fn log_disarm_calls(&self) -> u32 {
        self.log.disarm_calls.get()
    }
}

impl TickSource for ScriptedTickSource {
    fn arm(&mut self, interval_us: u32) -> Result<(), TickSourceError> {
        self.log.arm_calls.set(self.log.arm_calls.get() + 1);
        if self.log.fail_next_arm.take() {
            return Err(TickSourceError::IntervalOutOfRange(interval_us));
        }
        self.log.armed.set(true);
        self.log.last_interval_us.set(Some(interval_us));
        Ok(())
    }

    fn disarm(&mut self) {
        self.log.disarm_calls.set(self.log.disarm_calls.get() + 1);
        self.log.armed.set(false);
    }

    fn rearm(&mut self) -> Result<(), TickSourceError> {
        if self.log.last_interval_us.get().is_none() {
            return Err(TickSourceError::NeverArmed);
        }
        self.log.armed.set(true);
        Ok(())
    }
}

/// Stand in for the timer interrupt: call `tick` `count` times.
pub fn run_ticks<P: PinBank>(table: &ServoTable<P>, count: u32) {
    for _ in 0..count {
        table.tick();
    }
}
