use std::time::{Duration, Instant};

/// Accumulates elapsed time over several start/stop spans.
#[derive(Debug, Default)]
pub struct Timer {
    start: Option<Instant>,
    total: Duration,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.start = Some(Instant::now());
    }

    /// Stop and return the span just measured.
    pub fn stop(&mut self) -> Duration {
        match self.start.take() {
            Some(start) => {
                let elapsed = start.elapsed();
                self.total += elapsed;
                elapsed
            }
            None => Duration::ZERO,
        }
    }

    pub fn total_ms(&self) -> f64 {
        self.total.as_secs_f64() * 1000.0
    }
}

/// Run `f` once and return its result with the elapsed time.
pub fn time_fn<F, R>(f: F) -> (R, Duration)
where
    F: FnOnce() -> R,
{
    let start = Instant::now();
    let result = f();
    (result, start.elapsed())
}

/// Latency distribution in milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencyStats {
    pub mean_ms: f64,
    pub median_ms: f64,
    pub p95_ms: f64,
    pub max_ms: f64,
}

impl LatencyStats {
    /// `None` for an empty sample.
    pub fn from_times(mut times: Vec<f64>) -> Option<Self> {
        if times.is_empty() {
            return None;
        }
        times.sort_by(f64::total_cmp);
        let n = times.len();
        let median = if n % 2 == 0 {
            (times[n / 2 - 1] + times[n / 2]) / 2.0
        } else {
            times[n / 2]
        };
        Some(Self {
            mean_ms: times.iter().sum::<f64>() / n as f64,
            median_ms: median,
            p95_ms: times[((n as f64 * 0.95) as usize).min(n - 1)],
            max_ms: times[n - 1],
        })
    }

    /// Call `f` `warmup` times unmeasured, then `iterations` times measured.
    pub fn measure<F, R>(warmup: usize, iterations: usize, mut f: F) -> Option<Self>
    where
        F: FnMut() -> R,
    {
        for _ in 0..warmup {
            let _ = f();
        }
        let times = (0..iterations)
            .map(|_| time_fn(&mut f).1.as_secs_f64() * 1000.0)
            .collect();
        Self::from_times(times)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_accumulates() {
        let mut timer = Timer::new();
        timer.start();
        std::thread::sleep(Duration::from_millis(5));
        let first = timer.stop();
        assert!(first.as_millis() >= 5);
        assert_eq!(timer.stop(), Duration::ZERO);
        assert!(timer.total_ms() >= 5.0);
    }

    #[test]
    fn test_latency_stats() {
        let stats = LatencyStats::from_times(vec![5.0, 1.0, 3.0, 2.0, 4.0]).unwrap();
        assert!((stats.mean_ms - 3.0).abs() < 1e-9);
        assert!((stats.median_ms - 3.0).abs() < 1e-9);
        assert_eq!(stats.max_ms, 5.0);
        assert!(LatencyStats::from_times(Vec::new()).is_none());
    }

    #[test]
    fn test_measure_runs_every_iteration() {
        let mut calls = 0;
        let stats = LatencyStats::measure(2, 8, || calls += 1).unwrap();
        assert_eq!(calls, 10);
        assert!(stats.max_ms >= stats.median_ms);
    }
}
