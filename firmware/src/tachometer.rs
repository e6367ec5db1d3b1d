//! Tachometer period measurement.
//!
//! One task per channel waits for rising edges and timestamps them. The control tick reads the
//! result through [`Tachometer`].

use core::cell::Cell;

use critical_section::Mutex;
use embassy_rp::gpio::Input;
use embassy_time::{Duration, Instant};
use motor_control_logic::{Channel, PeriodSensor};

/// Unit of the reported period.
pub const PERIOD_UNIT_US: u64 = 100;

/// Without an edge for this long the motor is considered stalled and the period reads 0.
/// Twice the period of the slowest setpoint.
pub const STALL_TIMEOUT: Duration = Duration::from_millis(200);

#[derive(Clone, Copy)]
struct EdgeTiming {
    enabled: bool,
    last_edge: Option<Instant>,
    /// In [`PERIOD_UNIT_US`], 0 until two edges were seen.
    period: u32,
    pulses: u32,
}

impl EdgeTiming {
    const IDLE: EdgeTiming = EdgeTiming {
        enabled: false,
        last_edge: None,
        period: 0,
        pulses: 0,
    };
}

/// Edge timing shared between the edge tasks and the control tick.
pub struct TachometerState {
    channels: [Mutex<Cell<EdgeTiming>>; 2],
}

impl TachometerState {
    pub const fn new() -> Self {
        Self {
            channels: [
                Mutex::new(Cell::new(EdgeTiming::IDLE)),
                Mutex::new(Cell::new(EdgeTiming::IDLE)),
            ],
        }
    }

    fn update<R>(&self, channel: Channel, f: impl FnOnce(&mut EdgeTiming) -> R) -> R {
        critical_section::with(|cs| {
            let cell = self.channels[channel.index()].borrow(cs);
            let mut timing = cell.get();
            let result = f(&mut timing);
            cell.set(timing);
            result
        })
    }

    fn record_edge(&self, channel: Channel, now: Instant) {
        self.update(channel, |timing| {
            // Pulses are counted while disabled too, so the position survives a stop.
            timing.pulses = timing.pulses.wrapping_add(1);
            if !timing.enabled {
                return;
            }
            if let Some(last) = timing.last_edge {
                let units = now.saturating_duration_since(last).as_micros() / PERIOD_UNIT_US;
                timing.period = u32::try_from(units).unwrap_or(u32::MAX).max(1);
            }
            timing.last_edge = Some(now);
        });
    }
}

/// [`PeriodSensor`] view of the shared edge timing, owned by the control loop.
pub struct Tachometer {
    state: &'static TachometerState,
}

impl Tachometer {
    pub fn new(state: &'static TachometerState) -> Self {
        Self { state }
    }
}

impl PeriodSensor for Tachometer {
    fn period(&mut self, channel: Channel) -> u32 {
        let now = Instant::now();
        self.state.update(channel, |timing| match timing.last_edge {
            Some(last) if timing.enabled && now.saturating_duration_since(last) <= STALL_TIMEOUT => {
                timing.period
            }
            _ => 0,
        })
    }

    fn take_pulse_count(&mut self, channel: Channel) -> u32 {
        self.state
            .update(channel, |timing| core::mem::take(&mut timing.pulses))
    }

    fn enable(&mut self, channel: Channel) {
        self.state.update(channel, |timing| {
            timing.enabled = true;
            timing.last_edge = None;
            timing.period = 0;
        });
    }

    fn disable(&mut self, channel: Channel) {
        self.state.update(channel, |timing| {
            timing.enabled = false;
            timing.period = 0;
        });
    }
}

#[embassy_executor::task(pool_size = 2)]
pub async fn edge_task(mut input: Input<'static>, channel: Channel, state: &'static TachometerState) {
    defmt::debug!("tachometer {} listening", channel);
    loop {
        input.wait_for_rising_edge().await;
        state.record_edge(channel, Instant::now());
    }
}
