//! The periodic control tick.
//!
//! Every tick runs one pass of the state machine below for channel A and then channel B:
//!
//! ```md
//! Stopped   --setpoint != 0-->       Enabling   (measurement enabled)
//! Enabling  --first valid reading--> Running    (that reading is discarded)
//! moving    --direction change-->    Reversing  (one tick at zero duty)
//! Reversing --next tick-->           Enabling or Running
//! any       --setpoint == 0-->       Stopped    (measurement disabled, one telemetry record)
//! ```
//!
//! The loop owns the sensor and the bridge. The main context only reaches the motors through
//! the [`CommandMailbox`], and every side effect of a command happens here, within one tick.

use embassy_time::Instant;

use crate::config::{ControlConfig, ENABLING_TICKS, TelemetryPolicy};
use crate::controller::{Controller, TraceSink};
use crate::hardware::{HBridge, PeriodSensor};
use crate::mailbox::{CommandMailbox, Tuning};
use crate::packet::PacketSink;
use crate::schedule::GainSchedule;
use crate::telemetry::Telemetry;
use crate::{Channel, Direction};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotorState {
    Stopped,
    /// Measurement was just enabled and its first readings are not trusted yet.
    Enabling,
    Running,
    /// Holding zero duty for one tick before driving the other way.
    Reversing,
}

/// Tick owned state of one motor.
#[derive(Clone, Debug)]
pub struct Motor<'a> {
    channel: Channel,
    controller: Controller<'a>,
    setpoint: u32,
    direction: Direction,
    duty: u16,
    period: u32,
    position: i32,
    enabling: u8,
    state: MotorState,
}

impl<'a> Motor<'a> {
    fn new(channel: Channel, schedule: GainSchedule<'a>, integral_limit: i32) -> Self {
        Self {
            channel,
            controller: Controller::new(schedule, integral_limit),
            setpoint: 0,
            direction: Direction::Forward,
            duty: 0,
            period: 0,
            position: 0,
            enabling: 0,
            state: MotorState::Stopped,
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }
    pub fn controller(&self) -> &Controller<'a> {
        &self.controller
    }
    pub fn setpoint(&self) -> u32 {
        self.setpoint
    }
    pub fn direction(&self) -> Direction {
        self.direction
    }
    pub fn duty(&self) -> u16 {
        self.duty
    }
    /// Period read on the last tick that got that far, after enabling filtering.
    pub fn period(&self) -> u32 {
        self.period
    }
    /// Signed pulse count since start up. Wraps.
    pub fn position(&self) -> i32 {
        self.position
    }
    /// Non zero until the first reading after enabling has been thrown away.
    pub fn enabling(&self) -> u8 {
        self.enabling
    }
    pub fn state(&self) -> MotorState {
        self.state
    }

    fn apply_tuning(&mut self, tuning: Tuning) {
        self.controller.set_override(tuning.override_gain);
        self.controller.set_integral_limit(tuning.integral_limit);
    }

    /// Snapshot for the host. The millisecond timestamp wraps after about 49.7 days.
    #[allow(clippy::cast_possible_truncation)]
    fn telemetry(&self, now: Instant) -> Telemetry {
        Telemetry {
            timestamp_ms: now.as_millis() as u32,
            channel: self.channel,
            direction: self.direction,
            duty: self.duty,
            period: self.period,
            position: self.position,
        }
    }

    /// Duty after applying `delta`, saturated to `[0, ceiling]`. A non zero result is raised to
    /// at least `floor`.
    fn next_duty(&self, delta: i32, config: &ControlConfig) -> u16 {
        let ceiling = config.duty_ceiling;
        let floor = config.duty_floor.min(ceiling);
        let duty = (i64::from(self.duty) + i64::from(delta)).clamp(0, i64::from(ceiling));
        let duty = u16::try_from(duty).unwrap_or(ceiling);
        if duty == 0 { 0 } else { duty.max(floor) }
    }
}

/// Both motors plus the peripherals the tick drives.
pub struct ControlLoop<'a, S: PeriodSensor, B: HBridge> {
    config: ControlConfig,
    schedule: GainSchedule<'a>,
    motors: [Motor<'a>; 2],
    sensor: S,
    bridge: B,
    enabled: bool,
}

impl<'a, S: PeriodSensor, B: HBridge> ControlLoop<'a, S, B> {
    /// Both motors start stopped. The loop does nothing until [`ControlLoop::enable`].
    pub fn new(config: ControlConfig, schedule: GainSchedule<'a>, sensor: S, bridge: B) -> Self {
        let motor = |channel| Motor::new(channel, schedule, config.integral_limit);
        Self {
            config,
            schedule,
            motors: [motor(Channel::A), motor(Channel::B)],
            sensor,
            bridge,
            enabled: false,
        }
    }

    pub fn config(&self) -> &ControlConfig {
        &self.config
    }
    pub fn schedule(&self) -> GainSchedule<'a> {
        self.schedule
    }
    pub fn motor(&self, channel: Channel) -> &Motor<'a> {
        &self.motors[channel.index()]
    }
    pub fn sensor(&self) -> &S {
        &self.sensor
    }
    pub fn bridge(&self) -> &B {
        &self.bridge
    }
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Stop ticking and switch off both measurement channels.
    pub fn disable(&mut self) {
        self.enabled = false;
        for channel in Channel::ALL {
            self.sensor.disable(channel);
        }
        log_debug!("control loop disabled");
    }

    /// Restart ticking from a clean controller history.
    pub fn enable(&mut self, mailbox: &CommandMailbox) {
        self.disable();
        for channel in Channel::ALL {
            let motor = &mut self.motors[channel.index()];
            motor.controller.reset();
            motor.apply_tuning(mailbox.tuning(channel));
        }
        for channel in Channel::ALL {
            self.sensor.enable(channel);
        }
        self.enabled = true;
        log_debug!("control loop enabled");
    }

    /// Run one control tick. A disabled loop does nothing.
    pub fn tick(&mut self, now: Instant, mailbox: &CommandMailbox, sink: &mut impl PacketSink) {
        self.tick_observed(now, mailbox, sink, &mut ());
    }

    /// [`ControlLoop::tick`], handing every controller computation to `trace`.
    pub fn tick_observed(
        &mut self,
        now: Instant,
        mailbox: &CommandMailbox,
        sink: &mut impl PacketSink,
        trace: &mut impl TraceSink,
    ) {
        if !self.enabled {
            return;
        }
        for channel in Channel::ALL {
            self.tick_motor(channel, now, mailbox, &mut *sink, &mut *trace);
        }
    }

    fn tick_motor(
        &mut self,
        channel: Channel,
        now: Instant,
        mailbox: &CommandMailbox,
        sink: &mut impl PacketSink,
        trace: &mut impl TraceSink,
    ) {
        let config = self.config;
        let motor = &mut self.motors[channel.index()];

        let command = mailbox.take_command(channel);
        motor.apply_tuning(mailbox.tuning(channel));
        // A stop and a restart the other way can both land between two ticks, so the driven
        // direction decides as well as the one-shot.
        let reversing = command.changing_direction
            || (command.direction != motor.direction && motor.state != MotorState::Stopped);
        motor.direction = command.direction;

        if command.setpoint == 0 {
            motor.duty = 0;
            if motor.state != MotorState::Stopped {
                self.sensor.disable(channel);
                motor.controller.set_set_point(0);
                motor.setpoint = 0;
                motor.period = 0;
                motor.enabling = 0;
                motor.state = MotorState::Stopped;
                log_debug!("motor {} stopped", channel.index());
                Telemetry::emit(sink, &motor.telemetry(now));
            }
            self.bridge.set_duty(channel, motor.direction, 0);
            return;
        }

        if command.restart || motor.state == MotorState::Stopped {
            motor.enabling = ENABLING_TICKS;
            self.sensor.enable(channel);
            motor.state = MotorState::Enabling;
            log_debug!("motor {} starting", channel.index());
        }

        motor.setpoint = command.setpoint;
        motor.controller.set_set_point(command.setpoint);

        if reversing {
            motor.duty = 0;
            self.bridge.set_duty(channel, motor.direction, 0);
            motor.state = MotorState::Reversing;
            log_debug!("motor {} reversing", channel.index());
            return;
        }

        let mut period = self.sensor.period(channel);
        if motor.enabling > 0 && period != 0 {
            // The first reading after enabling spans an arbitrary gap.
            period = 0;
            motor.enabling = 0;
        }
        motor.period = period;
        motor.state = if motor.enabling > 0 {
            MotorState::Enabling
        } else {
            MotorState::Running
        };

        let pulses = i32::try_from(self.sensor.take_pulse_count(channel)).unwrap_or(i32::MAX);
        motor.position = motor
            .position
            .wrapping_add(pulses.wrapping_mul(motor.direction.sign()));

        let operating_point = (u64::from(period) + u64::from(motor.setpoint)) / 2;
        let operating_point = u32::try_from(operating_point).unwrap_or(u32::MAX);
        let gain_index = self.schedule.index_for(operating_point, config.overflow);
        let delta = motor.controller.tick_observed(period, gain_index, trace);

        if delta == 0 {
            if config.telemetry == TelemetryPolicy::EveryTick {
                Telemetry::emit(sink, &motor.telemetry(now));
            }
            return;
        }

        motor.duty = motor.next_duty(delta, &config);
        self.bridge.set_duty(channel, motor.direction, motor.duty);
        Telemetry::emit(sink, &motor.telemetry(now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_SCHEDULE;
    use crate::controller::TickTrace;
    use crate::hardware::mock::{MockBridge, MockSensor, MockTransport, SensorCall};
    use crate::schedule::{Gain, ScheduleOverflow, q16};

    type TestLoop = ControlLoop<'static, MockSensor, MockBridge>;

    fn setup(config: ControlConfig) -> (TestLoop, CommandMailbox, MockTransport) {
        let mailbox = CommandMailbox::default();
        let mut control = ControlLoop::new(
            config,
            DEFAULT_SCHEDULE,
            MockSensor::default(),
            MockBridge::default(),
        );
        control.enable(&mailbox);
        (control, mailbox, MockTransport::default())
    }

    fn tick(control: &mut TestLoop, mailbox: &CommandMailbox, transport: &mut MockTransport) {
        control.tick(Instant::from_millis(42), mailbox, transport);
    }

    /// Start channel A at 50 % (setpoint 525) and get it past the enabling window.
    fn running(config: ControlConfig) -> (TestLoop, CommandMailbox, MockTransport) {
        let (mut control, mailbox, mut transport) = setup(config);
        mailbox.set_speed(Channel::A, Direction::Forward, 50);
        control.sensor.set_period(Channel::A, 600);
        // The first reading after enabling is discarded.
        tick(&mut control, &mailbox, &mut transport);
        assert_eq!(control.motor(Channel::A).state(), MotorState::Running);
        tick(&mut control, &mailbox, &mut transport);
        assert_ne!(control.motor(Channel::A).duty(), 0);
        (control, mailbox, transport)
    }

    fn commands_for(bridge: &MockBridge, channel: Channel) -> Vec<(Direction, u16)> {
        bridge
            .history
            .iter()
            .filter(|(ch, _, _)| *ch == channel)
            .map(|&(_, direction, duty)| (direction, duty))
            .collect()
    }

    #[test]
    fn stopped_motors_hold_zero_duty() {
        let (mut control, mailbox, mut transport) = setup(ControlConfig::DEFAULT);
        tick(&mut control, &mailbox, &mut transport);
        assert_eq!(
            control.bridge().history,
            vec![
                (Channel::A, Direction::Forward, 0),
                (Channel::B, Direction::Forward, 0)
            ]
        );
        assert!(transport.sent.is_empty());
        for channel in Channel::ALL {
            assert_eq!(control.motor(channel).state(), MotorState::Stopped);
        }
    }

    #[test]
    fn enabling_waits_for_the_first_reading() {
        let (mut control, mailbox, mut transport) = setup(ControlConfig::DEFAULT);
        mailbox.set_speed(Channel::A, Direction::Forward, 50);
        // A slow motor takes far longer than ten ticks to produce an edge pair.
        for _ in 0..3 * ENABLING_TICKS {
            tick(&mut control, &mailbox, &mut transport);
            let motor = control.motor(Channel::A);
            assert_eq!(motor.enabling(), ENABLING_TICKS);
            assert_eq!(motor.state(), MotorState::Enabling);
            assert_eq!(motor.setpoint(), 525);
        }
        // No reading, no correction.
        assert_eq!(control.motor(Channel::A).duty(), 0);
        assert!(transport.sent.is_empty());

        control.sensor.set_period(Channel::A, 600);
        tick(&mut control, &mailbox, &mut transport);
        let motor = control.motor(Channel::A);
        assert_eq!(motor.state(), MotorState::Running);
        assert_eq!(motor.period(), 0);
        assert_eq!(motor.duty(), 0);
    }

    #[test]
    fn first_reading_after_enabling_is_discarded() {
        let (mut control, mailbox, mut transport) = setup(ControlConfig::DEFAULT);
        mailbox.set_speed(Channel::A, Direction::Forward, 50);
        tick(&mut control, &mailbox, &mut transport);
        assert_eq!(control.motor(Channel::A).state(), MotorState::Enabling);

        control.sensor.set_period(Channel::A, 600);
        tick(&mut control, &mailbox, &mut transport);
        let motor = control.motor(Channel::A);
        assert_eq!(motor.period(), 0);
        assert_eq!(motor.enabling(), 0);
        assert_eq!(motor.state(), MotorState::Running);
        assert_eq!(motor.duty(), 0);

        tick(&mut control, &mailbox, &mut transport);
        // error = 525 - 600 = -75, operating point 562 selects Kc = -5.
        // The raw correction of 375 is lifted to the duty floor.
        let motor = control.motor(Channel::A);
        assert_eq!(motor.period(), 600);
        assert_eq!(motor.duty(), 3000);
        assert_eq!(
            control.bridge().last(Channel::A),
            Some((Direction::Forward, 3000))
        );
        let telemetry = Telemetry::decode(transport.sent.last().unwrap()).unwrap();
        assert_eq!(telemetry.channel, Channel::A);
        assert_eq!(telemetry.duty, 3000);
        assert_eq!(telemetry.period, 600);
        assert_eq!(telemetry.timestamp_ms, 42);
    }

    #[test]
    fn duty_saturates() {
        let (mut control, mailbox, mut transport) = setup(ControlConfig::DEFAULT);
        mailbox.set_tuning(
            Channel::A,
            Tuning {
                override_gain: Some(Gain::new(q16(-30000), q16(0), q16(0))),
                integral_limit: 1000,
            },
        );
        mailbox.set_speed(Channel::A, Direction::Forward, 50);
        control.sensor.set_period(Channel::A, 10000);
        tick(&mut control, &mailbox, &mut transport);
        tick(&mut control, &mailbox, &mut transport);
        assert_eq!(control.motor(Channel::A).duty(), 0xFFFF);

        control.sensor.set_period(Channel::A, 1);
        tick(&mut control, &mailbox, &mut transport);
        // Saturated at zero, the floor only lifts non zero duties.
        assert_eq!(control.motor(Channel::A).duty(), 0);
        assert_eq!(
            control.bridge().last(Channel::A),
            Some((Direction::Forward, 0))
        );
    }

    #[test]
    fn duty_respects_ceiling() {
        let config = ControlConfig {
            duty_ceiling: 40000,
            ..ControlConfig::DEFAULT
        };
        let (mut control, mailbox, mut transport) = setup(config);
        mailbox.set_speed(Channel::B, Direction::Reverse, 100);
        control.sensor.set_period(Channel::B, 9000);
        for _ in 0..20 {
            tick(&mut control, &mailbox, &mut transport);
            assert!(control.motor(Channel::B).duty() <= 40000);
        }
        assert_eq!(control.motor(Channel::B).duty(), 40000);
    }

    #[test]
    fn stop_takes_effect_within_one_tick() {
        let (mut control, mailbox, mut transport) = running(ControlConfig::DEFAULT);
        let sent = transport.sent.len();

        mailbox.set_speed(Channel::A, Direction::Forward, 0);
        tick(&mut control, &mailbox, &mut transport);
        let motor = control.motor(Channel::A);
        assert_eq!(motor.state(), MotorState::Stopped);
        assert_eq!(motor.duty(), 0);
        assert_eq!(motor.controller().set_point(), 0);
        assert!(!control.sensor().is_enabled(Channel::A));
        assert_eq!(
            control.bridge().last(Channel::A),
            Some((Direction::Forward, 0))
        );
        assert_eq!(transport.sent.len(), sent + 1);
        let telemetry = Telemetry::decode(&transport.sent[sent]).unwrap();
        assert_eq!(telemetry.duty, 0);

        // Only the transition disables measurement and reports.
        tick(&mut control, &mailbox, &mut transport);
        let disables = control
            .sensor()
            .calls
            .iter()
            .filter(|call| **call == SensorCall::Disable(Channel::A))
            .count();
        // One from enable(), one from the stop.
        assert_eq!(disables, 2);
        assert_eq!(transport.sent.len(), sent + 1);
    }

    #[test]
    fn reversal_holds_zero_duty_for_exactly_one_tick() {
        let (mut control, mailbox, mut transport) = running(ControlConfig::DEFAULT);
        let before = commands_for(control.bridge(), Channel::A).len();

        mailbox.set_speed(Channel::A, Direction::Reverse, 50);
        tick(&mut control, &mailbox, &mut transport);
        assert_eq!(control.motor(Channel::A).state(), MotorState::Reversing);
        assert_eq!(control.motor(Channel::A).duty(), 0);

        tick(&mut control, &mailbox, &mut transport);
        assert_eq!(control.motor(Channel::A).state(), MotorState::Running);

        let after = &commands_for(control.bridge(), Channel::A)[before..];
        assert_eq!(after[0], (Direction::Reverse, 0));
        assert_eq!(after.len(), 2);
        assert_eq!(after[1].0, Direction::Reverse);
        assert_ne!(after[1].1, 0);
    }

    #[test]
    fn stop_and_reverse_between_ticks_still_pass_through_zero() {
        let (mut control, mailbox, mut transport) = running(ControlConfig::DEFAULT);
        let before = commands_for(control.bridge(), Channel::A).len();

        // The tick never sees the stop on its own.
        mailbox.set_speed(Channel::A, Direction::Reverse, 0);
        mailbox.set_speed(Channel::A, Direction::Reverse, 50);
        assert!(!mailbox.command(Channel::A).changing_direction);

        tick(&mut control, &mailbox, &mut transport);
        let motor = control.motor(Channel::A);
        assert_eq!(motor.state(), MotorState::Reversing);
        assert_eq!(motor.duty(), 0);
        // Measurement restarts, so the next reading is thrown away.
        assert_eq!(motor.enabling(), ENABLING_TICKS);

        for _ in 0..2 {
            tick(&mut control, &mailbox, &mut transport);
        }
        let after = &commands_for(control.bridge(), Channel::A)[before..];
        assert_eq!(after[0], (Direction::Reverse, 0));
        assert!(after.iter().all(|(direction, _)| *direction == Direction::Reverse));
        assert_eq!(control.motor(Channel::A).state(), MotorState::Running);
        assert_ne!(control.motor(Channel::A).duty(), 0);
    }

    #[test]
    fn starting_in_reverse_from_stop() {
        let (mut control, mailbox, mut transport) = setup(ControlConfig::DEFAULT);
        mailbox.set_speed(Channel::A, Direction::Forward, 0);
        mailbox.set_speed(Channel::A, Direction::Reverse, 50);
        assert!(mailbox.command(Channel::A).changing_direction);

        tick(&mut control, &mailbox, &mut transport);
        assert!(!mailbox.command(Channel::A).changing_direction);
        assert_eq!(control.motor(Channel::A).state(), MotorState::Reversing);
        assert_eq!(
            control.bridge().last(Channel::A),
            Some((Direction::Reverse, 0))
        );
        // The controller did not run.
        assert_eq!(control.motor(Channel::A).controller().tick_skip_count(), 1);

        tick(&mut control, &mailbox, &mut transport);
        let motor = control.motor(Channel::A);
        assert_eq!(motor.direction(), Direction::Reverse);
        assert_eq!(motor.state(), MotorState::Enabling);
        // No reading yet, so the controller ran and skipped.
        assert_eq!(motor.controller().tick_skip_count(), 2);
    }

    #[test]
    fn position_follows_direction() {
        let (mut control, mailbox, mut transport) = running(ControlConfig::DEFAULT);
        control.sensor.add_pulses(Channel::A, 5);
        tick(&mut control, &mailbox, &mut transport);
        assert_eq!(control.motor(Channel::A).position(), 5);

        mailbox.set_speed(Channel::A, Direction::Reverse, 50);
        control.sensor.add_pulses(Channel::A, 3);
        // The reversal tick leaves the pulses for the next tick.
        tick(&mut control, &mailbox, &mut transport);
        assert_eq!(control.motor(Channel::A).position(), 5);
        tick(&mut control, &mailbox, &mut transport);
        assert_eq!(control.motor(Channel::A).position(), 2);
    }

    #[test]
    fn exhausted_pool_drops_telemetry_only() {
        let (mut control, mailbox, _) = setup(ControlConfig::DEFAULT);
        let mut transport = MockTransport::with_capacity(0);
        mailbox.set_speed(Channel::A, Direction::Forward, 50);
        control.sensor.set_period(Channel::A, 600);
        for _ in 0..2 {
            tick(&mut control, &mailbox, &mut transport);
        }
        assert_eq!(control.motor(Channel::A).duty(), 3000);
        assert!(transport.sent.is_empty());
    }

    #[test]
    fn telemetry_policy() {
        for (policy, expected) in [(TelemetryPolicy::OnChange, 0), (TelemetryPolicy::EveryTick, 2)] {
            let config = ControlConfig {
                telemetry: policy,
                ..ControlConfig::DEFAULT
            };
            let (mut control, mailbox, mut transport) = setup(config);
            mailbox.set_speed(Channel::A, Direction::Forward, 50);
            control.sensor.set_period(Channel::A, 525);
            // The discarded reading and then a reading on target both leave the duty alone.
            tick(&mut control, &mailbox, &mut transport);
            tick(&mut control, &mailbox, &mut transport);
            assert_eq!(control.motor(Channel::A).duty(), 0);
            assert_eq!(transport.sent.len(), expected, "{policy:?}");
        }
    }

    #[test]
    fn overflow_policy() {
        for (overflow, expected) in [(ScheduleOverflow::Saturate, 0xFFFF), (ScheduleOverflow::Skip, 0)] {
            let config = ControlConfig {
                overflow,
                ..ControlConfig::DEFAULT
            };
            let (mut control, mailbox, mut transport) = setup(config);
            mailbox.set_speed(Channel::A, Direction::Forward, 50);
            // Operating point far beyond the last bound of the schedule.
            control.sensor.set_period(Channel::A, 100_000);
            tick(&mut control, &mailbox, &mut transport);
            tick(&mut control, &mailbox, &mut transport);
            assert_eq!(control.motor(Channel::A).duty(), expected, "{overflow:?}");
        }
    }

    #[test]
    fn disabled_loop_does_nothing() {
        let (mut control, mailbox, mut transport) = setup(ControlConfig::DEFAULT);
        control.disable();
        assert!(!control.is_enabled());
        assert!(!control.sensor().is_enabled(Channel::A));
        assert!(!control.sensor().is_enabled(Channel::B));
        mailbox.set_speed(Channel::A, Direction::Forward, 50);
        tick(&mut control, &mailbox, &mut transport);
        assert!(control.bridge().history.is_empty());
        assert_eq!(control.motor(Channel::A).state(), MotorState::Stopped);

        // Re-enabling resets the controllers and picks the command up.
        control.enable(&mailbox);
        assert!(control.sensor().is_enabled(Channel::B));
        tick(&mut control, &mailbox, &mut transport);
        assert_eq!(control.motor(Channel::A).state(), MotorState::Enabling);
    }

    #[test]
    fn tuning_reaches_the_controller() {
        let (mut control, mailbox, mut transport) = setup(ControlConfig::DEFAULT);
        let tuning = Tuning {
            override_gain: Some(Gain::new(q16(-2), q16(0), q16(1))),
            integral_limit: 7,
        };
        mailbox.set_tuning(Channel::B, tuning);
        tick(&mut control, &mailbox, &mut transport);
        let controller = control.motor(Channel::B).controller();
        assert_eq!(controller.override_gain(), tuning.override_gain);
        assert_eq!(controller.integral_limit(), 7);
        assert_eq!(control.motor(Channel::A).controller().override_gain(), None);
    }

    #[test]
    fn traces_every_computing_tick() {
        let (mut control, mailbox, mut transport) = setup(ControlConfig::DEFAULT);
        mailbox.set_speed(Channel::A, Direction::Forward, 50);
        mailbox.set_speed(Channel::B, Direction::Forward, 50);
        control.sensor.set_period(Channel::A, 600);
        control.sensor.set_period(Channel::B, 600);
        let mut traces: Vec<TickTrace> = vec![];
        for _ in 0..3 {
            control.tick_observed(
                Instant::from_millis(0),
                &mailbox,
                &mut transport,
                &mut |trace: &TickTrace| traces.push(*trace),
            );
        }
        // The first tick discards both readings.
        assert_eq!(traces.len(), 4);
        assert!(traces.iter().all(|trace| trace.gain_index == 3 && trace.error == -75));
    }
}
