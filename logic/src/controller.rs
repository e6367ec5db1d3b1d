use crate::schedule::{Gain, GainSchedule, Q16};

/// Numerator of the integral accumulation rate.
pub const INTEGRAL_SCALE: i64 = 25;
/// Denominator of the integral accumulation rate, per elapsed tick.
pub const BASE_SCALE: i64 = 256;
/// Derivative scale, per elapsed tick.
pub const DERIVATIVE_SCALE: i64 = 10;
/// Scale of the Q16 gain coefficients.
pub const FP_SCALE: i64 = 1 << 16;

fn clamp_cast(value: i64) -> i32 {
    value
        .clamp(i32::MIN.into(), i32::MAX.into())
        .try_into()
        .expect("Bounds checked by clamp")
}

/// Intermediate values of one computing controller tick.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickTrace {
    pub gain_index: usize,
    pub gain: Gain,
    pub error: i32,
    pub derivative: i32,
    pub integral: i32,
    /// Proportional contribution.
    pub p: i32,
    /// Derivative contribution.
    pub d: i32,
    /// Integral contribution.
    pub i: i32,
    pub output: i32,
}

/// Receives a [`TickTrace`] after every tick that ran the control math.
pub trait TraceSink {
    fn record(&mut self, trace: &TickTrace);
}

impl TraceSink for () {
    fn record(&mut self, _trace: &TickTrace) {}
}

impl<F: FnMut(&TickTrace)> TraceSink for F {
    fn record(&mut self, trace: &TickTrace) {
        self(trace);
    }
}

/// Gain scheduled PID controller for one axis.
///
/// The controller returns a *delta* to apply to the actuator, not an absolute output.
/// A measurement of 0 means no valid sample arrived this tick: the tick is skipped and the next
/// valid tick rescales its integral and derivative terms by the number of ticks that elapsed.
#[derive(Clone, Debug)]
pub struct Controller<'a> {
    schedule: GainSchedule<'a>,
    set_point: u32,
    /// Error of the last computing tick.
    error: i32,
    integral_error: i32,
    tick_skip_count: u32,
    integral_limit: i32,
    override_gain: Option<Gain>,
}

impl<'a> Controller<'a> {
    pub fn new(schedule: GainSchedule<'a>, integral_limit: i32) -> Self {
        Self {
            schedule,
            set_point: 0,
            error: 0,
            integral_error: 0,
            tick_skip_count: 1,
            integral_limit,
            override_gain: None,
        }
    }

    pub fn schedule(&self) -> GainSchedule<'a> {
        self.schedule
    }
    pub fn set_point(&self) -> u32 {
        self.set_point
    }
    pub fn set_set_point(&mut self, set_point: u32) {
        self.set_point = set_point;
    }
    pub fn error(&self) -> i32 {
        self.error
    }
    pub fn integral_error(&self) -> i32 {
        self.integral_error
    }
    pub fn tick_skip_count(&self) -> u32 {
        self.tick_skip_count
    }
    pub fn integral_limit(&self) -> i32 {
        self.integral_limit
    }
    pub fn set_integral_limit(&mut self, integral_limit: i32) {
        self.integral_limit = integral_limit;
    }
    pub fn override_gain(&self) -> Option<Gain> {
        self.override_gain
    }
    /// Force a fixed gain set, bypassing the schedule. `None` returns to the schedule.
    pub fn set_override(&mut self, gain: Option<Gain>) {
        self.override_gain = gain;
    }
    /// Override the gains. All zero gains clear the override instead.
    pub fn set_gains(&mut self, kc: Q16, kd: Q16, ki: Q16) {
        let gain = Gain::new(kc, kd, ki);
        self.override_gain = if gain.is_zero() { None } else { Some(gain) };
    }

    /// Clear the error history. The set point and override are kept.
    pub fn reset(&mut self) {
        self.error = 0;
        self.integral_error = 0;
        self.tick_skip_count = 1;
    }

    /// Run one tick and return the delta to apply to the actuator.
    pub fn tick(&mut self, measured: u32, gain_index: usize) -> i32 {
        self.tick_observed(measured, gain_index, &mut ())
    }

    /// [`Controller::tick`], reporting the intermediate values to `sink`.
    pub fn tick_observed(
        &mut self,
        measured: u32,
        gain_index: usize,
        sink: &mut impl TraceSink,
    ) -> i32 {
        let scheduled = match self.schedule.gain(gain_index) {
            Some(gain) if measured != 0 => gain,
            _ => {
                self.tick_skip_count = self.tick_skip_count.saturating_add(1);
                return 0;
            }
        };
        let gain = self.override_gain.unwrap_or(scheduled);
        let elapsed = i64::from(self.tick_skip_count);

        let error = clamp_cast(i64::from(self.set_point) - i64::from(measured));

        let limit = i64::from(self.integral_limit).abs();
        let integral = i64::from(self.integral_error)
            + (i64::from(error) * INTEGRAL_SCALE) / (BASE_SCALE * elapsed);
        self.integral_error = clamp_cast(integral.clamp(-limit, limit));

        let derivative =
            clamp_cast((i64::from(error) - i64::from(self.error)) * (DERIVATIVE_SCALE * elapsed));
        self.error = error;
        self.tick_skip_count = 1;

        let p = clamp_cast(i64::from(error) * i64::from(gain.kc.to_bits()) / FP_SCALE);
        let d = clamp_cast(i64::from(derivative) * i64::from(gain.kd.to_bits()) / FP_SCALE);
        let i = clamp_cast(i64::from(self.integral_error) * i64::from(gain.ki.to_bits()) / FP_SCALE);
        let output = p.saturating_add(d).saturating_add(i);

        sink.record(&TickTrace {
            gain_index,
            gain,
            error,
            derivative,
            integral: self.integral_error,
            p,
            d,
            i,
            output,
        });
        output
    }
}
