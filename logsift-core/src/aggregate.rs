use crate::error::{Result, SiftError};
use crate::event::{iso8601, Event};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_BUCKET_WIDTH_SECS: i64 = 10;
pub const DEFAULT_MAX_BUCKETS: u64 = 1_000_000;

/// One fixed-width time window and the number of Events inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    /// Inclusive lower bound, epoch seconds.
    pub window_start: i64,
    pub count: u64,
}

impl Bucket {
    pub fn window_start_iso(&self) -> String {
        iso8601(self.window_start)
    }
}

/// Partitions Events into contiguous windows of `width_secs`.
#[derive(Debug, Clone)]
pub struct TimeBucketAggregator {
    width_secs: i64,
    max_buckets: u64,
}

impl Default for TimeBucketAggregator {
    fn default() -> Self {
        Self {
            width_secs: DEFAULT_BUCKET_WIDTH_SECS,
            max_buckets: DEFAULT_MAX_BUCKETS,
        }
    }
}

impl TimeBucketAggregator {
    pub fn new(width_secs: i64) -> Result<Self> {
        if width_secs <= 0 {
            return Err(SiftError::InvalidConfig(format!(
                "bucket width must be positive, got {}",
                width_secs
            )));
        }
        Ok(Self {
            width_secs,
            ..Self::default()
        })
    }

    pub fn with_max_buckets(mut self, max_buckets: u64) -> Self {
        self.max_buckets = max_buckets;
        self
    }

    pub fn width_secs(&self) -> i64 {
        self.width_secs
    }

    /// Start of the window that contains `time`. Windows are aligned to
    /// multiples of the width from the epoch.
    pub fn window_start(&self, time: i64) -> i64 {
        time - time.rem_euclid(self.width_secs)
    }

    /// Builds the gapless, ascending bucket sequence from the window holding
    /// the earliest Event through the window holding the latest one.
    ///
    /// An empty input yields an empty sequence.
    pub fn aggregate(&self, events: &[Event]) -> Result<Vec<Bucket>> {
        let (Some(min_time), Some(max_time)) = (
            events.iter().map(|e| e.time).min(),
            events.iter().map(|e| e.time).max(),
        ) else {
            return Ok(Vec::new());
        };

        let first = self.window_start(min_time);
        let last = self.window_start(max_time);
        let required = ((last as i128 - first as i128) / self.width_secs as i128 + 1) as u64;
        if required > self.max_buckets {
            return Err(SiftError::BucketLimit {
                required,
                limit: self.max_buckets,
            });
        }

        let mut buckets: Vec<Bucket> = (0..required)
            .map(|i| Bucket {
                window_start: first + i as i64 * self.width_secs,
                count: 0,
            })
            .collect();

        for event in events {
            let index = ((event.time as i128 - first as i128) / self.width_secs as i128) as usize;
            buckets[index].count += 1;
        }

        debug!(
            "Aggregated {} events into {} buckets of {}s",
            events.len(),
            buckets.len(),
            self.width_secs
        );
        Ok(buckets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_at(time: i64) -> Event {
        Event {
            time,
            event: None,
            user: None,
            ip: None,
            path: None,
            pid: None,
            format: "TXT".to_string(),
        }
    }

    fn events_at(times: &[i64]) -> Vec<Event> {
        times.iter().copied().map(event_at).collect()
    }

    #[test]
    fn test_single_event_yields_one_bucket() {
        let buckets = TimeBucketAggregator::default()
            .aggregate(&events_at(&[1234]))
            .unwrap();
        assert_eq!(buckets, vec![Bucket { window_start: 1230, count: 1 }]);
    }

    #[test]
    fn test_gaps_are_filled_with_zero_buckets() {
        let buckets = TimeBucketAggregator::default()
            .aggregate(&events_at(&[3, 5, 41, 12]))
            .unwrap();

        let starts: Vec<i64> = buckets.iter().map(|b| b.window_start).collect();
        let counts: Vec<u64> = buckets.iter().map(|b| b.count).collect();
        assert_eq!(starts, vec![0, 10, 20, 30, 40]);
        assert_eq!(counts, vec![2, 1, 0, 0, 1]);
    }

    #[test]
    fn test_counts_sum_and_contiguity() {
        let times: Vec<i64> = (0..500).map(|i| 1_700_000_000 + (i * 37) % 613).collect();
        let aggregator = TimeBucketAggregator::new(10).unwrap();
        let buckets = aggregator.aggregate(&events_at(&times)).unwrap();

        let total: u64 = buckets.iter().map(|b| b.count).sum();
        assert_eq!(total, times.len() as u64);
        for pair in buckets.windows(2) {
            assert_eq!(pair[1].window_start - pair[0].window_start, 10);
        }
        assert_eq!(buckets[0].window_start, aggregator.window_start(*times.iter().min().unwrap()));
        assert_eq!(
            buckets.last().unwrap().window_start,
            aggregator.window_start(*times.iter().max().unwrap())
        );
    }

    #[test]
    fn test_order_independent() {
        let aggregator = TimeBucketAggregator::default();
        let forward = aggregator.aggregate(&events_at(&[1, 15, 29, 29])).unwrap();
        let backward = aggregator.aggregate(&events_at(&[29, 29, 15, 1])).unwrap();
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_boundary_belongs_to_next_window() {
        let buckets = TimeBucketAggregator::default()
            .aggregate(&events_at(&[9, 10]))
            .unwrap();
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].count, 1);
        assert_eq!(buckets[1].count, 1);
    }

    #[test]
    fn test_custom_width() {
        let buckets = TimeBucketAggregator::new(60)
            .unwrap()
            .aggregate(&events_at(&[0, 59, 60, 185]))
            .unwrap();
        let counts: Vec<u64> = buckets.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![2, 1, 0, 1]);
    }

    #[test]
    fn test_empty_input() {
        let buckets = TimeBucketAggregator::default().aggregate(&[]).unwrap();
        assert!(buckets.is_empty());
    }

    #[test]
    fn test_invalid_width() {
        assert!(matches!(
            TimeBucketAggregator::new(0),
            Err(SiftError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_bucket_limit() {
        let result = TimeBucketAggregator::default()
            .with_max_buckets(5)
            .aggregate(&events_at(&[0, 1000]));
        assert!(matches!(
            result,
            Err(SiftError::BucketLimit { required: 101, limit: 5 })
        ));
    }
}
