//! Time sampling: maps a sample index to a time in seconds.
//!
//! A sampling is stored as a time-per-cycle plus the stored times of one
//! cycle. One stored time means uniform, several mean cyclic, and a
//! time-per-cycle of [`ACYCLIC_TIME_PER_CYCLE`] marks an explicit
//! (acyclic) time list.

use crate::util::Chrono;

/// Time-per-cycle marker for acyclic samplings.
pub const ACYCLIC_TIME_PER_CYCLE: Chrono = f64::MAX / 32.0;

const TIME_EPSILON: Chrono = 1e-9;

/// Classification of a sampling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeSamplingType {
    Uniform,
    Cyclic,
    Acyclic,
}

/// Sample-time cadence shared by properties through an archive-wide index.
#[derive(Clone, Debug)]
pub struct TimeSampling {
    time_per_cycle: Chrono,
    stored_times: Vec<Chrono>,
}

impl TimeSampling {
    /// One sample per second starting at 0 (archive entry 0).
    pub fn identity() -> Self {
        Self::uniform(1.0, 0.0)
    }

    pub fn uniform(time_per_cycle: Chrono, start_time: Chrono) -> Self {
        Self {
            time_per_cycle,
            stored_times: vec![start_time],
        }
    }

    /// `times` is one cycle; the pattern repeats every `time_per_cycle` seconds.
    pub fn cyclic(time_per_cycle: Chrono, times: Vec<Chrono>) -> Self {
        if times.len() <= 1 {
            return Self::uniform(time_per_cycle, times.first().copied().unwrap_or(0.0));
        }
        Self {
            time_per_cycle,
            stored_times: times,
        }
    }

    pub fn acyclic(times: Vec<Chrono>) -> Self {
        Self {
            time_per_cycle: ACYCLIC_TIME_PER_CYCLE,
            stored_times: times,
        }
    }

    /// Rebuild from the stored form found in an archive.
    pub fn from_stored(time_per_cycle: Chrono, stored_times: Vec<Chrono>) -> Self {
        if time_per_cycle >= ACYCLIC_TIME_PER_CYCLE * 0.5 {
            Self::acyclic(stored_times)
        } else if stored_times.is_empty() {
            Self::uniform(time_per_cycle, 0.0)
        } else {
            Self {
                time_per_cycle,
                stored_times,
            }
        }
    }

    pub fn sampling_type(&self) -> TimeSamplingType {
        if self.time_per_cycle >= ACYCLIC_TIME_PER_CYCLE * 0.5 {
            TimeSamplingType::Acyclic
        } else if self.stored_times.len() > 1 {
            TimeSamplingType::Cyclic
        } else {
            TimeSamplingType::Uniform
        }
    }

    #[inline]
    pub fn is_uniform(&self) -> bool {
        self.sampling_type() == TimeSamplingType::Uniform
    }

    #[inline]
    pub fn is_cyclic(&self) -> bool {
        self.sampling_type() == TimeSamplingType::Cyclic
    }

    #[inline]
    pub fn is_acyclic(&self) -> bool {
        self.sampling_type() == TimeSamplingType::Acyclic
    }

    pub fn time_per_cycle(&self) -> Chrono {
        self.time_per_cycle
    }

    pub fn stored_times(&self) -> &[Chrono] {
        &self.stored_times
    }

    /// Stored times per cycle (1 for uniform).
    pub fn samples_per_cycle(&self) -> usize {
        self.stored_times.len().max(1)
    }

    /// First stored time, or 0.
    pub fn start_time(&self) -> Chrono {
        self.stored_times.first().copied().unwrap_or(0.0)
    }

    /// Time of sample `index`.
    pub fn sample_time(&self, index: usize) -> Chrono {
        match self.sampling_type() {
            TimeSamplingType::Acyclic => match self.stored_times.get(index) {
                Some(&t) => t,
                None => self.stored_times.last().copied().unwrap_or(0.0),
            },
            _ => {
                let spc = self.samples_per_cycle();
                let cycle = (index / spc) as Chrono;
                let local = self.stored_times.get(index % spc).copied().unwrap_or(0.0);
                local + cycle * self.time_per_cycle
            }
        }
    }

    /// Largest index whose time is <= `time`, clamped to `[0, num_samples)`.
    pub fn floor_index(&self, time: Chrono, num_samples: usize) -> (usize, Chrono) {
        if num_samples == 0 {
            return (0, 0.0);
        }
        let last = num_samples - 1;
        if time <= self.sample_time(0) {
            return (0, self.sample_time(0));
        }
        if time >= self.sample_time(last) {
            return (last, self.sample_time(last));
        }
        let idx = match self.sampling_type() {
            TimeSamplingType::Uniform => {
                let steps = (time - self.start_time()) / self.time_per_cycle;
                ((steps + TIME_EPSILON).floor() as usize).min(last)
            }
            _ => {
                let (mut lo, mut hi) = (0usize, last);
                while lo < hi {
                    let mid = lo + (hi - lo + 1) / 2;
                    if self.sample_time(mid) <= time + TIME_EPSILON {
                        lo = mid;
                    } else {
                        hi = mid - 1;
                    }
                }
                lo
            }
        };
        (idx, self.sample_time(idx))
    }

    /// Smallest index whose time is >= `time`, clamped to `[0, num_samples)`.
    pub fn ceil_index(&self, time: Chrono, num_samples: usize) -> (usize, Chrono) {
        let (floor, floor_time) = self.floor_index(time, num_samples);
        if num_samples == 0 || floor_time + TIME_EPSILON >= time || floor + 1 >= num_samples {
            return (floor, floor_time);
        }
        (floor + 1, self.sample_time(floor + 1))
    }

    /// Index whose time is closest to `time`; ties go to the earlier sample.
    pub fn near_index(&self, time: Chrono, num_samples: usize) -> (usize, Chrono) {
        let (floor, floor_time) = self.floor_index(time, num_samples);
        let (ceil, ceil_time) = self.ceil_index(time, num_samples);
        if (time - floor_time).abs() <= (ceil_time - time).abs() {
            (floor, floor_time)
        } else {
            (ceil, ceil_time)
        }
    }

    /// Same cadence within floating point noise.
    pub fn is_equivalent(&self, other: &TimeSampling) -> bool {
        let close = |a: Chrono, b: Chrono| (a - b).abs() <= TIME_EPSILON * a.abs().max(1.0);
        self.sampling_type() == other.sampling_type()
            && (self.is_acyclic() || close(self.time_per_cycle, other.time_per_cycle))
            && self.stored_times.len() == other.stored_times.len()
            && self
                .stored_times
                .iter()
                .zip(&other.stored_times)
                .all(|(a, b)| close(*a, *b))
    }
}

impl Default for TimeSampling {
    fn default() -> Self {
        Self::identity()
    }
}

impl PartialEq for TimeSampling {
    fn eq(&self, other: &Self) -> bool {
        self.is_equivalent(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_sampling() {
        let ts = TimeSampling::uniform(1.0 / 24.0, 0.0);
        assert!(ts.is_uniform());
        assert_eq!(ts.sample_time(0), 0.0);
        assert!((ts.sample_time(24) - 1.0).abs() < 1e-10);
        assert_eq!(ts.near_index(1.0 / 24.0, 3).0, 1);
        assert_eq!(ts.near_index(10.0, 3).0, 2);
        assert_eq!(ts.near_index(-1.0, 3).0, 0);
    }

    #[test]
    fn test_cyclic_sampling() {
        let ts = TimeSampling::cyclic(1.0, vec![0.0, 0.25]);
        assert!(ts.is_cyclic());
        assert_eq!(ts.samples_per_cycle(), 2);
        assert_eq!(ts.sample_time(3), 1.25);
        assert_eq!(ts.floor_index(1.1, 10).0, 2);
        assert_eq!(ts.ceil_index(1.1, 10).0, 3);
    }

    #[test]
    fn test_acyclic_sampling() {
        let ts = TimeSampling::acyclic(vec![0.0, 0.5, 1.0, 2.0]);
        assert!(ts.is_acyclic());
        assert_eq!(ts.sample_time(3), 2.0);
        assert_eq!(ts.near_index(1.4, 4).0, 2);
        assert_eq!(ts.near_index(1.6, 4).0, 3);

        let stored = TimeSampling::from_stored(ts.time_per_cycle(), ts.stored_times().to_vec());
        assert_eq!(stored, ts);
    }

    #[test]
    fn test_identity() {
        let ts = TimeSampling::identity();
        assert_eq!(ts, TimeSampling::uniform(1.0, 0.0));
        assert_eq!(ts.near_index(0.7, 1).0, 0);
    }
}
