//! The periodic tick that drives the pulse scheduler.
//!
//! A [`TickSource`] owns one timer and, once armed, calls
//! [`ServoTable::tick`](crate::ServoTable::tick) every `interval_us` until disarmed. How the call
//! reaches the table is up to the implementation: a hardware timer interrupt handler usually
//! holds a `&'static ServoTable`; [`TickerTickSource`] hands the table to [`tick_loop`].
//!
//! # Example: embassy ticker
//!
//! On targets where an `embassy-time` ticker is fast enough, spawn [`tick_loop`] as a task and
//! give the [`TickerTickSource`] to [`IsrServo`](crate::IsrServo):
//!
//! ```rust,ignore
//! static TICKER_STATIC: TickerStatic = TickerTickSource::new_static();
//!
//! #[embassy_executor::task]
//! async fn servo_tick_task(table: &'static ServoTable<Pins>) -> ! {
//!     tick_loop(&TICKER_STATIC, table).await
//! }
//!
//! spawner.spawn(servo_tick_task(table))?;
//! let mut isr_servo = IsrServo::new(table, TickerTickSource::new(&TICKER_STATIC));
//! let handle = isr_servo.setup(4)?; // first setup starts the ticker
//! ```

use derive_more::derive::{Display, Error};
use embassy_futures::select::{Either, select};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Ticker};

use crate::isr_servo::ServoTable;
use crate::pin_bank::PinBank;

/// Failures reported by a [`TickSource`].
#[derive(Clone, Copy, Debug, Display, Error, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TickSourceError {
    /// The timer cannot represent this interval (microseconds).
    #[display("Tick interval of {_0} µs cannot be represented by the timer")]
    IntervalOutOfRange(#[error(not(source))] u32),

    /// `rearm` was called before any successful `arm`.
    #[display("Tick source was never armed")]
    NeverArmed,
}

/// A single periodic timer.
pub trait TickSource {
    /// Start ticking every `interval_us` microseconds.
    ///
    /// # Errors
    ///
    /// Returns [`TickSourceError::IntervalOutOfRange`] when the timer cannot count this interval.
    fn arm(&mut self, interval_us: u32) -> Result<(), TickSourceError>;

    /// Stop ticking.
    fn disarm(&mut self);

    /// Start ticking again with the last interval that armed successfully.
    ///
    /// # Errors
    ///
    /// Returns [`TickSourceError::NeverArmed`] when there is no such interval.
    fn rearm(&mut self) -> Result<(), TickSourceError>;
}

/// Commands sent to the tick loop.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum TickerCommand {
    Start(Duration),
    Stop,
}

// Public so applications can place it in a `static`; hidden from docs.
#[doc(hidden)]
/// Static resources for [`TickerTickSource`].
pub struct TickerStatic {
    command: Signal<CriticalSectionRawMutex, TickerCommand>,
}

impl TickerStatic {
    /// Create static resources for the ticker tick source.
    #[must_use]
    pub const fn new_static() -> Self {
        Self {
            command: Signal::new(),
        }
    }

    fn signal(&self, command: TickerCommand) {
        self.command.signal(command);
    }

    async fn wait(&self) -> TickerCommand {
        self.command.wait().await
    }
}

/// A [`TickSource`] backed by an `embassy-time` [`Ticker`] running in [`tick_loop`].
///
/// Arming signals the loop; the most recent command always wins.
pub struct TickerTickSource {
    ticker_static: &'static TickerStatic,
    last_interval: Option<Duration>,
}

impl TickerTickSource {
    /// Create static resources for a ticker tick source.
    #[must_use]
    pub const fn new_static() -> TickerStatic {
        TickerStatic::new_static()
    }

    /// Create a tick source handle. [`tick_loop`] must run with the same static resources.
    #[must_use]
    pub const fn new(ticker_static: &'static TickerStatic) -> Self {
        Self {
            ticker_static,
            last_interval: None,
        }
    }
}

impl TickSource for TickerTickSource {
    fn arm(&mut self, interval_us: u32) -> Result<(), TickSourceError> {
        let interval = ticker_interval(interval_us)?;
        self.ticker_static.signal(TickerCommand::Start(interval));
        self.last_interval = Some(interval);
        Ok(())
    }

    fn disarm(&mut self) {
        self.ticker_static.signal(TickerCommand::Stop);
    }

    fn rearm(&mut self) -> Result<(), TickSourceError> {
        let interval = self.last_interval.ok_or(TickSourceError::NeverArmed)?;
        self.ticker_static.signal(TickerCommand::Start(interval));
        Ok(())
    }
}

/// The interval must be non-zero and land exactly on the `embassy-time` tick grid.
fn ticker_interval(interval_us: u32) -> Result<Duration, TickSourceError> {
    let micros = u64::from(interval_us);
    let interval = Duration::from_micros(micros);
    if micros == 0 || interval.as_micros() != micros {
        return Err(TickSourceError::IntervalOutOfRange(interval_us));
    }
    Ok(interval)
}

/// Device loop for [`TickerTickSource`]: tick `table` at the armed interval until disarmed.
///
/// Spawn it from an `embassy-executor` task; it never returns.
pub async fn tick_loop<P: PinBank>(ticker_static: &TickerStatic, table: &ServoTable<P>) -> ! {
    let mut command = ticker_static.wait().await;
    loop {
        command = match command {
            TickerCommand::Start(interval) => run_ticker(interval, ticker_static, table).await,
            TickerCommand::Stop => ticker_static.wait().await,
        };
    }
}

async fn run_ticker<P: PinBank>(
    interval: Duration,
    ticker_static: &TickerStatic,
    table: &ServoTable<P>,
) -> TickerCommand {
    let mut ticker = Ticker::every(interval);
    loop {
        match select(ticker.next(), ticker_static.wait()).await {
            Either::First(()) => table.tick(),
            Either::Second(command) => return command,
        }
    }
}
