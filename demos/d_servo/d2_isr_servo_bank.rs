#![no_std]
#![no_main]

use core::{convert::Infallible, future, panic};
use embassy_executor::Spawner;
use embassy_rp::gpio::{Level, Output};
use embassy_time::Timer;
use isr_servo::{
    IsrServo, Result, ServoTable,
    pin_bank::OutputPinBank,
    servo::ServoHandle,
    servo_channel,
    tick_source::{TickerStatic, TickerTickSource, tick_loop},
};
use static_cell::StaticCell;
use {defmt::info, defmt_rtt as _, panic_probe as _};

type BankPins = OutputPinBank<Output<'static>, 8>;

static TICKER_STATIC: TickerStatic = TickerTickSource::new_static();
static SERVO_TABLE: StaticCell<ServoTable<BankPins>> = StaticCell::new();

#[embassy_executor::task]
async fn servo_tick_task(table: &'static ServoTable<BankPins>) -> ! {
    tick_loop(&TICKER_STATIC, table).await
}

#[embassy_executor::main]
async fn main(spawner: Spawner) -> ! {
    let err = inner_main(spawner).await.unwrap_err();
    panic!("{err}");
}

async fn inner_main(spawner: Spawner) -> Result<Infallible> {
    let p = embassy_rp::init(Default::default());

    let table: &'static ServoTable<BankPins> = SERVO_TABLE.init(ServoTable::new(OutputPinBank::new([
        Output::new(p.PIN_2, Level::Low),
        Output::new(p.PIN_3, Level::Low),
        Output::new(p.PIN_4, Level::Low),
        Output::new(p.PIN_5, Level::Low),
        Output::new(p.PIN_6, Level::Low),
        Output::new(p.PIN_7, Level::Low),
        Output::new(p.PIN_8, Level::Low),
        Output::new(p.PIN_9, Level::Low),
    ])));
    defmt::unwrap!(spawner.spawn(servo_tick_task(table)));

    let mut isr_servo = IsrServo::new(table, TickerTickSource::new(&TICKER_STATIC));

    // Six servos with default bounds, plus a gripper with a narrower range.
    let mut servos = [ServoHandle::new(0); 6];
    for (pin, servo) in (0..).zip(servos.iter_mut()) {
        *servo = isr_servo.setup(pin)?;
    }
    let gripper = servo_channel! {
        servo: isr_servo,
        pin: 7,
        min_us: 1000,
        max_us: 2000,
    }?;
    info!(
        "{} servos in use, {} slots free",
        isr_servo.num_in_use(),
        isr_servo.num_available()
    );

    // Fan out: each servo 30 degrees further than the last.
    for (degrees, servo) in (0..).step_by(30).zip(servos) {
        isr_servo.set_position(servo, degrees)?;
    }
    Timer::after_secs(1).await;

    // Open and close the gripper by pulse width.
    for pulse_us in [1000, 2000, 1500] {
        let applied_us = isr_servo.set_pulse_width(gripper, pulse_us)?;
        info!("gripper at {} us", applied_us);
        Timer::after_millis(500).await;
    }

    // Relax every other servo, then everything, then bring them all back.
    for servo in servos.into_iter().step_by(2) {
        isr_servo.toggle(servo)?;
    }
    Timer::after_secs(1).await;
    isr_servo.disable_all();
    Timer::after_secs(1).await;
    isr_servo.enable_all();

    // Free the gripper's slot; its pin keeps its last level.
    isr_servo.delete(gripper);
    info!("{} servos in use", isr_servo.num_in_use());

    future::pending().await // run forever
}
