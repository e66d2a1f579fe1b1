use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Decides, at each checkpoint, whether enough time has passed that the
/// running program should yield control back to the host. Implementations
/// trade timer precision against per-checkpoint cost.
pub trait Estimator {
    fn elapsed(&mut self) -> bool;
}

/// Reads the clock on every checkpoint. Precise and expensive.
pub struct Exact {
    interval: Duration,
    deadline: Instant,
}

impl Exact {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: Instant::now() + interval,
        }
    }
}

impl Estimator for Exact {
    fn elapsed(&mut self) -> bool {
        let now = Instant::now();
        if now >= self.deadline {
            self.deadline = now + self.interval;
            true
        } else {
            false
        }
    }
}

/// Never reads the clock: yields every `period` checkpoints. Deterministic,
/// so tests and debuggers prefer it.
pub struct Countdown {
    period: u32,
    left: u32,
}

impl Countdown {
    pub fn new(period: u32) -> Self {
        let period = period.max(1);
        Self { period, left: period }
    }
}

impl Estimator for Countdown {
    fn elapsed(&mut self) -> bool {
        self.left -= 1;
        if self.left == 0 {
            self.left = self.period;
            true
        } else {
            false
        }
    }
}

/// xorshift64; cheap and deterministic, which is all reservoir sampling
/// needs here.
struct XorShift(u64);

impl XorShift {
    fn new(seed: u64) -> Self {
        Self(seed | 1)
    }

    fn next_u32(&mut self) -> u32 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        (x >> 32) as u32
    }
}

const RESERVOIR_CAPACITY: usize = 100;

/// Keeps a reservoir sample of observed inter-checkpoint gaps and charges
/// the running average against the yield interval, smoothing over bursty
/// checkpoint rates.
pub struct Reservoir {
    yield_interval: Duration,
    samples: VecDeque<Duration>,
    seen: u64,
    last: Instant,
    charged: Duration,
    rng: XorShift,
}

impl Reservoir {
    pub fn new(yield_interval: Duration) -> Self {
        Self {
            yield_interval,
            samples: VecDeque::with_capacity(RESERVOIR_CAPACITY),
            seen: 0,
            last: Instant::now(),
            charged: Duration::ZERO,
            rng: XorShift::new(0x9e3779b97f4a7c15),
        }
    }

    fn record(&mut self, gap: Duration) {
        self.seen += 1;
        if self.samples.len() < RESERVOIR_CAPACITY {
            self.samples.push_back(gap);
        } else {
            let slot = self.rng.next_u32() as u64 % self.seen;
            if (slot as usize) < RESERVOIR_CAPACITY {
                self.samples[slot as usize] = gap;
            }
        }
    }

    fn average(&self) -> Duration {
        if self.samples.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self.samples.iter().sum();
        total / self.samples.len() as u32
    }
}

impl Estimator for Reservoir {
    fn elapsed(&mut self) -> bool {
        let now = Instant::now();
        self.record(now - self.last);
        self.last = now;
        self.charged += self.average();
        if self.charged >= self.yield_interval {
            self.charged = Duration::ZERO;
            true
        } else {
            false
        }
    }
}

/// Reads the clock only once per resample window and assumes the
/// checkpoint rate holds steady in between, estimating elapsed time from
/// the checkpoint count alone.
pub struct Velocity {
    yield_interval: Duration,
    resample_interval: Duration,
    window_start: Instant,
    checks_in_window: u32,
    checks_per_yield: u32,
    checks_since_yield: u32,
}

impl Velocity {
    pub fn new(yield_interval: Duration, resample_interval: Duration) -> Self {
        Self {
            yield_interval,
            resample_interval,
            window_start: Instant::now(),
            checks_in_window: 0,
            // Until the first resample, behave like a short countdown.
            checks_per_yield: 1000,
            checks_since_yield: 0,
        }
    }

    fn resample(&mut self, now: Instant) {
        let window = now - self.window_start;
        if window.is_zero() || self.checks_in_window == 0 {
            return;
        }
        let rate = self.checks_in_window as f64 / window.as_secs_f64();
        let per_yield = rate * self.yield_interval.as_secs_f64();
        self.checks_per_yield = per_yield.max(1.0) as u32;
        self.window_start = now;
        self.checks_in_window = 0;
    }
}

impl Estimator for Velocity {
    fn elapsed(&mut self) -> bool {
        self.checks_in_window += 1;
        self.checks_since_yield += 1;
        if self.checks_in_window % 1024 == 0 {
            let now = Instant::now();
            if now - self.window_start >= self.resample_interval {
                self.resample(now);
            }
        }
        if self.checks_since_yield >= self.checks_per_yield {
            self.checks_since_yield = 0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn countdown_fires_on_a_fixed_period() {
        let mut est = Countdown::new(3);
        let fired: Vec<bool> = (0..9).map(|_| est.elapsed()).collect();
        assert_eq!(
            fired,
            vec![false, false, true, false, false, true, false, false, true]
        );
    }

    #[test]
    fn countdown_period_zero_is_clamped() {
        let mut est = Countdown::new(0);
        assert!(est.elapsed());
        assert!(est.elapsed());
    }

    #[test]
    fn exact_fires_once_the_interval_passes() {
        let mut est = Exact::new(Duration::ZERO);
        assert!(est.elapsed());
    }

    #[test]
    fn exact_holds_before_the_deadline() {
        let mut est = Exact::new(Duration::from_secs(3600));
        assert!(!est.elapsed());
        assert!(!est.elapsed());
    }

    #[test]
    fn reservoir_eventually_charges_past_the_interval() {
        let mut est = Reservoir::new(Duration::ZERO);
        // The very first check records a gap and charges at least zero,
        // which already meets a zero interval.
        assert!(est.elapsed());
    }

    #[test]
    fn velocity_counts_checkpoints_between_resamples() {
        let mut est = Velocity::new(Duration::from_millis(10), Duration::from_secs(3600));
        let mut fired = 0;
        for _ in 0..2500 {
            if est.elapsed() {
                fired += 1;
            }
        }
        // Default rate is one yield per thousand checks until resampled.
        assert_eq!(fired, 2);
    }
}
