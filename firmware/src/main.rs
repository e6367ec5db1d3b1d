#![no_std]
#![no_main]

mod gpio;
mod hbridge;
mod link;
mod tachometer;

use defmt::*;
use embassy_executor::{InterruptExecutor, Spawner};
use embassy_rp::{
    bind_interrupts,
    gpio::{Input, Level, Output, Pull},
    interrupt,
    interrupt::{InterruptExt, Priority},
    peripherals::UART0,
    pwm::Pwm,
    uart::{self, Uart},
};
use embassy_time::{Duration, Instant, Ticker, Timer};
use gpio::BoardOutputs;
use hbridge::{BridgeInputs, DualHBridge};
use link::{Link, LinkQueues};
use motor_control_logic::config::DEFAULT_SCHEDULE;
use motor_control_logic::{
    Channel, CommandMailbox, ControlConfig, ControlLoop, Dispatcher, Disposition, Tuning,
};
use static_cell::StaticCell;
use tachometer::{Tachometer, TachometerState};
use {defmt_rtt as _, panic_probe as _};

const CONFIG: ControlConfig = ControlConfig::DEFAULT;
const BAUD_RATE: u32 = 115_200;

bind_interrupts!(struct Irqs {
    UART0_IRQ => uart::InterruptHandler<UART0>;
});

static MAILBOX: CommandMailbox = CommandMailbox::new(Tuning::new(CONFIG.integral_limit));
static TACHOMETER: StaticCell<TachometerState> = StaticCell::new();
static LINK: StaticCell<LinkQueues> = StaticCell::new();

/// Tachometer edges.
static EXECUTOR_HIGH: InterruptExecutor = InterruptExecutor::new();
/// Control tick.
static EXECUTOR_MED: InterruptExecutor = InterruptExecutor::new();

#[interrupt]
unsafe fn SWI_IRQ_1() {
    unsafe { EXECUTOR_HIGH.on_interrupt() }
}

#[interrupt]
unsafe fn SWI_IRQ_0() {
    unsafe { EXECUTOR_MED.on_interrupt() }
}

type MotorLoop = ControlLoop<'static, Tachometer, DualHBridge>;

#[embassy_executor::task]
async fn control_task(mut control: MotorLoop, mut link: Link) {
    control.enable(&MAILBOX);
    let mut ticker = Ticker::every(Duration::from_millis(CONFIG.tick_period_ms.into()));
    loop {
        ticker.next().await;
        control.tick(Instant::now(), &MAILBOX, &mut link);
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_rp::init(Default::default());
    info!("motor controller starting");

    let tachometer = &*TACHOMETER.init(TachometerState::new());
    let queues = &*LINK.init(LinkQueues::new());

    let uart_config = {
        let mut config = uart::Config::default();
        config.baudrate = BAUD_RATE;
        config
    };
    let uart = Uart::new(
        p.UART0,
        p.PIN_0,
        p.PIN_1,
        Irqs,
        p.DMA_CH0,
        p.DMA_CH1,
        uart_config,
    );
    let (tx, rx) = uart.split();
    spawner.spawn(unwrap!(link::rx_task(rx, queues)));
    spawner.spawn(unwrap!(link::tx_task(tx, queues)));

    interrupt::SWI_IRQ_1.set_priority(Priority::P1);
    let high = EXECUTOR_HIGH.start(interrupt::SWI_IRQ_1);
    let tach_a = Input::new(p.PIN_16, Pull::Up);
    let tach_b = Input::new(p.PIN_17, Pull::Up);
    high.spawn(unwrap!(tachometer::edge_task(tach_a, Channel::A, tachometer)));
    high.spawn(unwrap!(tachometer::edge_task(tach_b, Channel::B, tachometer)));

    let pwm_config = hbridge::pwm_config();
    let (a1, a2) = Pwm::new_output_ab(p.PWM_SLICE1, p.PIN_2, p.PIN_3, pwm_config.clone()).split();
    let (b1, b2) = Pwm::new_output_ab(p.PWM_SLICE2, p.PIN_4, p.PIN_5, pwm_config).split();
    let bridge = DualHBridge::new(
        BridgeInputs {
            in1: unwrap!(a1),
            in2: unwrap!(a2),
        },
        BridgeInputs {
            in1: unwrap!(b1),
            in2: unwrap!(b2),
        },
    );

    let control = ControlLoop::new(
        CONFIG,
        DEFAULT_SCHEDULE,
        Tachometer::new(tachometer),
        bridge,
    );
    interrupt::SWI_IRQ_0.set_priority(Priority::P2);
    let medium = EXECUTOR_MED.start(interrupt::SWI_IRQ_0);
    medium.spawn(unwrap!(control_task(control, Link::new(queues))));

    let outputs = BoardOutputs::new()
        .with(0, Output::new(p.PIN_6, Level::Low))
        .with(1, Output::new(p.PIN_7, Level::Low))
        .with(2, Output::new(p.PIN_8, Level::Low))
        .with(3, Output::new(p.PIN_9, Level::Low))
        .with(13, Output::new(p.PIN_25, Level::Low));

    let mut link = Link::new(queues);
    let mut dispatcher = Dispatcher::new(outputs);
    loop {
        match dispatcher.poll(&mut link, &MAILBOX, Instant::now()) {
            Disposition::Handled => {}
            Disposition::Idle => Timer::after_millis(1).await,
            Disposition::Reset => {
                info!("reset requested by host");
                Timer::after_millis(10).await;
                cortex_m::peripheral::SCB::sys_reset();
            }
        }
    }
}
