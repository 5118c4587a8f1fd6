//! Averaged IR sampling.
//!
//! One sample is the integer mean of `sample_count` back-to-back raw reads of
//! a channel. Any failed raw read fails the whole sample.

use railbot_traits::{IrChannel, IrSensors};

use crate::error::Result;
use crate::hw_error::hw_report;

pub struct SensorSampler<S> {
    sensors: S,
    sample_count: u32,
}

impl<S: IrSensors> SensorSampler<S> {
    /// `sample_count` is raised to 1 if zero.
    pub fn new(sensors: S, sample_count: u32) -> Self {
        Self {
            sensors,
            sample_count: sample_count.max(1),
        }
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    /// Truncating mean of `sample_count` raw reads of `channel`.
    pub fn sample(&mut self, channel: IrChannel) -> Result<i32> {
        let mut sum: i64 = 0;
        for _ in 0..self.sample_count {
            let raw = self
                .sensors
                .read_raw(channel)
                .map_err(|e| hw_report(e, "reading IR sensor"))?;
            sum += i64::from(raw);
        }
        let mean = sum / i64::from(self.sample_count);
        // Mean of u16 values always fits in i32.
        let mean = i32::try_from(mean).unwrap_or(i32::MAX);
        tracing::trace!(channel = channel.name(), mean, "ir sample");
        Ok(mean)
    }

    /// Sample both channels of a pair, first then second.
    pub fn sample_pair(&mut self, pair: (IrChannel, IrChannel)) -> Result<(i32, i32)> {
        let a = self.sample(pair.0)?;
        let b = self.sample(pair.1)?;
        Ok((a, b))
    }

    pub fn sensors_mut(&mut self) -> &mut S {
        &mut self.sensors
    }

    pub fn into_inner(self) -> S {
        self.sensors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::ScriptedIr;

    #[test]
    fn mean_truncates() {
        let ir = ScriptedIr::new().with_sequence(IrChannel::BackLeft, [10, 11, 11]);
        let mut s = SensorSampler::new(ir, 3);
        // 32 / 3 = 10
        assert_eq!(s.sample(IrChannel::BackLeft).unwrap(), 10);
    }

    #[test]
    fn zero_count_is_one_read() {
        let ir = ScriptedIr::new().with_constant(IrChannel::BackLeft, 7);
        let mut s = SensorSampler::new(ir, 0);
        assert_eq!(s.sample_count(), 1);
        assert_eq!(s.sample(IrChannel::BackLeft).unwrap(), 7);
        assert_eq!(s.sensors_mut().reads(IrChannel::BackLeft), 1);
    }

    #[test]
    fn any_failed_read_fails_the_sample() {
        let ir = ScriptedIr::new()
            .with_constant(IrChannel::LeftFrontA, 500)
            .failing(IrChannel::LeftFrontB);
        let mut s = SensorSampler::new(ir, 4);
        assert!(
            s.sample_pair((IrChannel::LeftFrontA, IrChannel::LeftFrontB))
                .is_err()
        );
    }
}
