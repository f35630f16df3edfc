#![no_std]
#![no_main]

use core::{convert::Infallible, panic};
use embassy_executor::Spawner;
use embassy_rp::gpio::{Level, Output};
use embassy_time::Timer;
use isr_servo::{
    IsrServo, Result, ServoTable,
    pin_bank::OutputPinBank,
    tick_source::{TickerStatic, TickerTickSource, tick_loop},
};
use static_cell::StaticCell;
use {defmt::info, defmt_rtt as _, panic_probe as _};

type DemoPins = OutputPinBank<Output<'static>, 4>;

static TICKER_STATIC: TickerStatic = TickerTickSource::new_static();
static SERVO_TABLE: StaticCell<ServoTable<DemoPins>> = StaticCell::new();

#[embassy_executor::task]
async fn servo_tick_task(table: &'static ServoTable<DemoPins>) -> ! {
    tick_loop(&TICKER_STATIC, table).await
}

#[embassy_executor::main]
async fn main(spawner: Spawner) -> ! {
    let err = inner_main(spawner).await.unwrap_err();
    panic!("{err}");
}

async fn inner_main(spawner: Spawner) -> Result<Infallible> {
    let p = embassy_rp::init(Default::default());

    // Pin number i is the i-th output below: servo pin 2 is GPIO 11.
    let table: &'static ServoTable<DemoPins> = SERVO_TABLE.init(ServoTable::new(OutputPinBank::new([
        Output::new(p.PIN_8, Level::Low),
        Output::new(p.PIN_9, Level::Low),
        Output::new(p.PIN_11, Level::Low),
        Output::new(p.PIN_12, Level::Low),
    ])));
    defmt::unwrap!(spawner.spawn(servo_tick_task(table)));

    let mut isr_servo = IsrServo::new(table, TickerTickSource::new(&TICKER_STATIC));
    let servo = isr_servo.setup(2)?;
    info!("Sweeping servo {} on GPIO 11", servo);

    isr_servo.set_position(servo, 0)?;
    Timer::after_millis(400).await;
    isr_servo.set_position(servo, 180)?;
    Timer::after_millis(400).await;

    // Sweep by 10 degrees, up and back down. Include 180 degrees.
    let sweep = (0..=180).step_by(10).chain((0..180).step_by(10).rev());
    loop {
        for degrees in sweep.clone() {
            isr_servo.set_position(servo, degrees)?;
            info!(
                "{} degrees, {} us",
                isr_servo.position(servo)?,
                isr_servo.pulse_width(servo)?
            );
            Timer::after_millis(150).await;
        }
    }
}
