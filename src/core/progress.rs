use serde::Serialize;

/// One `(timestamp, bytes transferred)` observation, timestamps in ms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Sample {
    pub time: i64,
    pub bytes: u64,
}

/// 单个任务的进度采样
///
/// Keeps the start time and the last two samples reported by the transport.
/// Speeds are whole bytes per second, time remaining is whole seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressTracker {
    start_time: i64,
    end_time: Option<i64>,
    previous: Sample,
    current: Sample,
}

impl ProgressTracker {
    pub fn start(now: i64) -> Self {
        let origin = Sample { time: now, bytes: 0 };
        Self {
            start_time: now,
            end_time: None,
            previous: origin,
            current: origin,
        }
    }

    /// Shifts `current` into `previous` and stores the new sample.
    pub fn record(&mut self, now: i64, bytes: u64, total: u64) {
        self.previous = self.current;
        self.current = Sample { time: now, bytes };
        if bytes == total {
            self.end_time = Some(now);
        }
    }

    pub fn finish(&mut self, now: i64) {
        if self.end_time.is_none() {
            self.end_time = Some(now);
        }
    }

    pub fn start_time(&self) -> i64 {
        self.start_time
    }

    pub fn end_time(&self) -> Option<i64> {
        self.end_time
    }

    pub fn previous(&self) -> Sample {
        self.previous
    }

    pub fn current(&self) -> Sample {
        self.current
    }

    /// Bytes per second. `0` before the first byte and once everything is sent.
    pub fn speed(&self, total: u64, average: bool) -> u64 {
        if self.current.bytes == 0 || self.current.bytes >= total {
            return 0;
        }

        let (bytes, elapsed_ms) = if average {
            (self.current.bytes, self.current.time - self.start_time)
        } else {
            (
                self.current.bytes.saturating_sub(self.previous.bytes),
                self.current.time - self.previous.time,
            )
        };

        if elapsed_ms <= 0 {
            return 0;
        }

        (bytes as f64 / (elapsed_ms as f64 / 1000.0)).round() as u64
    }

    /// Seconds left, never below 1 while in flight. `None` without a usable speed.
    pub fn time_remaining(&self, total: u64, average: bool) -> Option<u64> {
        let remaining = total.saturating_sub(self.current.bytes);
        if remaining == 0 {
            // 字节已发完，等待服务器响应
            return Some(1);
        }

        let speed = self.speed(total, average);
        if speed == 0 {
            return None;
        }

        Some(remaining.div_ceil(speed).max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_way_after_one_second() {
        let mut progress = ProgressTracker::start(0);
        progress.record(1000, 500, 1000);

        assert_eq!(progress.speed(1000, true), 500);
        assert_eq!(progress.speed(1000, false), 500);
        assert_eq!(progress.time_remaining(1000, true), Some(1));
        assert_eq!(progress.end_time(), None);
    }

    #[test]
    fn test_instant_speed_uses_last_two_samples() {
        let mut progress = ProgressTracker::start(0);
        progress.record(1000, 100, 10_000);
        progress.record(1500, 600, 10_000);

        assert_eq!(progress.previous(), Sample { time: 1000, bytes: 100 });
        // 600 bytes over 1.5 s
        assert_eq!(progress.speed(10_000, true), 400);
        // 500 bytes over 0.5 s
        assert_eq!(progress.speed(10_000, false), 1000);
        assert_eq!(progress.time_remaining(10_000, false), Some(10));
        assert_eq!(progress.time_remaining(10_000, true), Some(24));
    }

    #[test]
    fn test_fully_sent_reports_zero_speed() {
        let mut progress = ProgressTracker::start(0);
        progress.record(2000, 1000, 1000);

        assert_eq!(progress.speed(1000, true), 0);
        assert_eq!(progress.end_time(), Some(2000));
        assert_eq!(progress.time_remaining(1000, true), Some(1));
    }

    #[test]
    fn test_no_bytes_yet() {
        let progress = ProgressTracker::start(0);
        assert_eq!(progress.speed(1000, true), 0);
        assert_eq!(progress.time_remaining(1000, true), None);
    }

    #[test]
    fn test_time_remaining_is_at_least_one_second() {
        let mut progress = ProgressTracker::start(0);
        progress.record(1000, 999_990, 1_000_000);
        assert_eq!(progress.time_remaining(1_000_000, true), Some(1));
    }

    #[test]
    fn test_same_timestamp_does_not_divide_by_zero() {
        let mut progress = ProgressTracker::start(0);
        progress.record(0, 10, 100);
        assert_eq!(progress.speed(100, true), 0);
        assert_eq!(progress.speed(100, false), 0);
    }
}
