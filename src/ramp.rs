//! Planning for gradual setpoint changes.
//!
//! A ramp walks a setpoint from its present value towards a target in fixed steps, so the load
//! never sees a jump larger than one step while the output is energised. The intermediate values
//! start at the present value and stop strictly before the target is reached or crossed. The
//! target itself is never part of the plan; the caller always finishes with one exact set at the
//! target, which also absorbs any floating point drift from stepping.

use core::time::Duration;

use crate::command::round_setpoint;
use crate::error::ConfigError;

/// Step size and pacing for ramping one quantity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampConfig {
    step_size: f64,
    pacing_interval: Duration,
}

impl RampConfig {
    /// 50mV / 50mA steps, 50ms apart.
    pub const DEFAULT: RampConfig = RampConfig {
        step_size: 0.05,
        pacing_interval: Duration::from_millis(50),
    };

    pub fn new(step_size: f64, pacing_interval: Duration) -> Result<Self, ConfigError> {
        Ok(Self {
            step_size: validate_step(step_size)?,
            pacing_interval,
        })
    }

    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    pub fn set_step_size(&mut self, step_size: f64) -> Result<(), ConfigError> {
        self.step_size = validate_step(step_size)?;
        Ok(())
    }

    /// Delay after each intermediate set.
    pub fn pacing_interval(&self) -> Duration {
        self.pacing_interval
    }

    pub fn set_pacing_interval(&mut self, pacing_interval: Duration) {
        self.pacing_interval = pacing_interval;
    }

    /// Plan the intermediate values between `present` and `target`.
    pub fn steps(&self, present: f64, target: f64) -> Result<RampSteps, ConfigError> {
        RampSteps::new(present, target, self.step_size)
    }
}

impl Default for RampConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Step sizes must be positive and finite or a ramp would never terminate.
pub(crate) fn validate_step(step_size: f64) -> Result<f64, ConfigError> {
    if step_size.is_finite() && step_size > 0.0 {
        Ok(step_size)
    } else {
        Err(ConfigError::NonPositiveStep(step_size))
    }
}

/// Iterator over the intermediate setpoints of a ramp, already rounded to the PSU resolution.
#[derive(Debug, Clone)]
pub struct RampSteps {
    start: f64,
    step: f64,
    target: f64,
    index: u64,
    count: u64,
}

impl RampSteps {
    pub fn new(present: f64, target: f64, step_size: f64) -> Result<Self, ConfigError> {
        let step_size = validate_step(step_size)?;
        for value in [present, target] {
            if !value.is_finite() {
                return Err(ConfigError::NonFiniteSetpoint(value));
            }
        }
        let step = if present > target {
            -step_size
        } else {
            step_size
        };
        // Upper bound only; values that round onto or past the target are cut in `next`.
        let count = ((target - present).abs() / step_size).ceil();
        if !count.is_finite() || count > u64::MAX as f64 {
            return Err(ConfigError::NonPositiveStep(step_size));
        }
        Ok(Self {
            start: present,
            step,
            target: round_setpoint(target),
            index: 0,
            count: count as u64,
        })
    }

    fn reached(&self, value: f64) -> bool {
        if self.step < 0.0 {
            value <= self.target
        } else {
            value >= self.target
        }
    }
}

impl Iterator for RampSteps {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        if self.index >= self.count {
            return None;
        }
        // Multiply rather than accumulate so drift does not build up over long ramps.
        let value = round_setpoint(self.start + self.index as f64 * self.step);
        if self.reached(value) {
            self.count = self.index;
            return None;
        }
        self.index += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.count - self.index).unwrap_or(usize::MAX);
        (0, Some(remaining))
    }
}
