//! running stats and a microsecond pacing timer
use serde::Serialize;
use std::fmt;

/// Windowed mean/sigma with a decaying peak.
///
/// Sessions feed it their buffer depth every render round so a status dump can
/// show how much jitter each sender is living with.
#[derive(Debug, Clone, Serialize)]
pub struct StreamTimeStat {
    peak: f64,
    mean: f64,
    sigma: f64,
    window: u64,
    peak_decay: f64,
}

impl StreamTimeStat {
    pub fn build(window_size: u64, peak_decay: f64) -> StreamTimeStat {
        StreamTimeStat {
            peak: 0.0,
            mean: 0.0,
            sigma: 0.0,
            window: window_size.max(1),
            peak_decay,
        }
    }
    pub fn clear(&mut self) -> () {
        self.peak = 0.0;
        self.mean = 0.0;
        self.sigma = 0.0;
    }
    pub fn get_peak(&self) -> f64 {
        self.peak
    }
    pub fn get_mean(&self) -> f64 {
        self.mean
    }
    pub fn get_sigma(&self) -> f64 {
        self.sigma
    }
    pub fn get_window(&self) -> u64 {
        self.window
    }
    pub fn add_sample(&mut self, sample: f64) -> () {
        if sample > self.peak {
            self.peak = sample;
        } else {
            self.peak = (self.peak - self.peak_decay).max(sample);
        }
        let w = self.window as f64;
        self.mean += (sample - self.mean) / w;
        self.sigma += ((sample - self.mean).abs() - self.sigma) / w;
    }
}

impl fmt::Display for StreamTimeStat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{{ peak: {:.1}, mean: {:.1}, sigma: {:.1}, window: {} }}",
            self.peak, self.mean, self.sigma, self.window
        )
    }
}


/// Interval timer on the microsecond clock.
///
/// `advance` moves the deadline by exactly one interval so a pacing loop does not
/// drift when it wakes late.
pub struct MicroTimer {
    last_time: u128,
    interval: u128,
}

impl MicroTimer {
    pub fn new(now: u128, interval: u128) -> MicroTimer {
        MicroTimer {
            last_time: now,
            interval,
        }
    }
    pub fn set_interval(&mut self, interval: u128) -> () {
        self.interval = interval;
    }
    pub fn expired(&self, now: u128) -> bool {
        (self.last_time + self.interval) <= now
    }
    pub fn reset(&mut self, now: u128) {
        self.last_time = now;
    }
    pub fn advance(&mut self) {
        self.last_time += self.interval;
    }
    /// microseconds until the timer expires (0 if it already has)
    pub fn remaining(&self, now: u128) -> u128 {
        (self.last_time + self.interval).saturating_sub(now)
    }
    pub fn since(&self, now: u128) -> u128 {
        now.saturating_sub(self.last_time)
    }
}

#[cfg(test)]
mod test_micro_timer {
    use super::*;

    #[test]
    fn test_expiration() {
        let mut now = 1000;
        let mut mt = MicroTimer::new(now, 100);
        assert!(!mt.expired(now));
        now += 99;
        assert!(!mt.expired(now));
        assert_eq!(mt.remaining(now), 1);
        now += 1;
        assert!(mt.expired(now));
        mt.reset(now);
        assert!(!mt.expired(now));
        assert_eq!(mt.since(now + 10), 10);
        mt.set_interval(9);
        now += 10;
        assert!(mt.expired(now));
        assert_eq!(mt.remaining(now), 0);
    }
    #[test]
    fn advance_keeps_cadence() {
        let mut mt = MicroTimer::new(0, 100);
        // woke up late, deadline still moves by one interval
        assert!(mt.expired(130));
        mt.advance();
        assert_eq!(mt.remaining(130), 70);
        mt.advance();
        assert!(!mt.expired(299));
        assert!(mt.expired(300));
    }
}
