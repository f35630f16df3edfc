//! Software PWM for up to sixteen hobby servos, driven by one periodic timer interrupt.
//!
//! Hardware PWM channels are scarce and tied to particular pins. This crate instead runs a tick
//! scheduler every 10 µs from a single timer and bit-bangs a 50 Hz servo signal on any output
//! pin.
//!
//! Start with [`IsrServo`] (see the [`isr_servo`] module for an example).
//!
//! # Glossary
//!
//! - **Tick:** one scheduler step, [`TICK_INTERVAL_US`](servo::TICK_INTERVAL_US) (10 µs) apart.
//! - **Frame:** one 20 ms refresh period, [`FRAME_TICKS`](servo::FRAME_TICKS) ticks long. Every
//!   enabled servo gets one pulse per frame, unless its pulse is a single tick (then none).
//! - **Slot:** one of the sixteen entries of the [`ServoTable`]. A [`ServoHandle`](servo::ServoHandle)
//!   is a slot index.
//! - **Tick source:** the periodic timer, abstracted as [`TickSource`](tick_source::TickSource).
//! - **Pin bank:** the numbered outputs, abstracted as [`PinBank`](pin_bank::PinBank).
//!
//! # Features
//!
//! - `defmt`: log through `defmt`.
//! - `embedded`: the RP2040 stack used by the demo binaries (implies `defmt`).
#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

mod error;
pub mod isr_servo;
pub mod pin_bank;
pub mod servo;
pub mod tick_source;

// Re-export error types and result (used throughout)
pub use crate::error::{Error, Result};
pub use crate::isr_servo::{IsrServo, ServoTable};
