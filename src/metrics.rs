//! Trial timing statistics and the running ranking.
//!
//! [`TrialCollector`] consumes trial durations one at a time for a single
//! Configuration and finalizes them into [`TrialStatistics`]. [`Ranking`]
//! keeps the K fastest Configurations seen so far, plus the running best and
//! worst, so a partial sweep always has a usable answer.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Finalized statistics for one Configuration's trials
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialStatistics {
    pub trials: usize,
    pub mean_s: f64,
    /// Sample standard deviation (N-1 denominator); 0 for a single trial
    pub std_dev_s: f64,
    pub min_s: f64,
    pub max_s: f64,
    /// Bytes written by one trial divided by the mean duration
    pub throughput_bps: f64,
}

/// Collects trial durations for one Configuration
#[derive(Debug, Clone)]
pub struct TrialCollector {
    bytes_per_trial: u64,
    durations: Vec<f64>,
}

impl TrialCollector {
    pub fn new(bytes_per_trial: u64, expected_trials: usize) -> Self {
        Self {
            bytes_per_trial,
            durations: Vec::with_capacity(expected_trials),
        }
    }

    /// Record one completed trial
    pub fn record(&mut self, elapsed: Duration) {
        self.durations.push(elapsed.as_secs_f64());
    }

    pub fn trials(&self) -> usize {
        self.durations.len()
    }

    pub fn durations(&self) -> &[f64] {
        &self.durations
    }

    /// Compute statistics over the recorded trials, or `None` if there are none.
    pub fn finalize(&self) -> Option<TrialStatistics> {
        summarize(&self.durations, self.bytes_per_trial)
    }
}

/// Mean, sample standard deviation and throughput over `durations` (seconds).
pub fn summarize(durations: &[f64], bytes_per_trial: u64) -> Option<TrialStatistics> {
    if durations.is_empty() {
        return None;
    }
    let n = durations.len();
    let mean = durations.iter().sum::<f64>() / n as f64;
    let std_dev = if n > 1 {
        let sum_sq: f64 = durations.iter().map(|d| (d - mean).powi(2)).sum();
        (sum_sq / (n - 1) as f64).sqrt()
    } else {
        0.0
    };
    let min = durations.iter().copied().fold(f64::INFINITY, f64::min);
    let max = durations.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let throughput = if mean > 0.0 {
        bytes_per_trial as f64 / mean
    } else {
        0.0
    };

    Some(TrialStatistics {
        trials: n,
        mean_s: mean,
        std_dev_s: std_dev,
        min_s: min,
        max_s: max,
        throughput_bps: throughput,
    })
}

/// One ranked entry: the position of the Configuration in the sweep and its
/// payload (usually the full result record).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ranked<T> {
    pub index: usize,
    pub mean_s: f64,
    pub item: T,
}

/// Bounded top-K ranking by ascending mean duration.
///
/// Ties keep insertion order, so of two equally fast Configurations the one
/// benchmarked first ranks higher.
#[derive(Debug, Clone)]
pub struct Ranking<T> {
    capacity: usize,
    top: Vec<Ranked<T>>,
    worst: Option<Ranked<T>>,
    offered: usize,
}

impl<T: Clone> Ranking<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            top: Vec::with_capacity(capacity + 1),
            worst: None,
            offered: 0,
        }
    }

    /// Offer a finished Configuration. Returns true if it is the new fastest.
    pub fn offer(&mut self, index: usize, mean_s: f64, item: T) -> bool {
        self.offered += 1;
        let entry = Ranked {
            index,
            mean_s,
            item,
        };

        if self.worst.as_ref().map_or(true, |w| mean_s > w.mean_s) {
            self.worst = Some(entry.clone());
        }

        let position = self.top.partition_point(|r| r.mean_s <= mean_s);
        if position >= self.capacity {
            return false;
        }
        self.top.insert(position, entry);
        self.top.truncate(self.capacity);
        position == 0
    }

    /// The current top entries, fastest first
    pub fn top(&self) -> &[Ranked<T>] {
        &self.top
    }

    pub fn best(&self) -> Option<&Ranked<T>> {
        self.top.first()
    }

    pub fn worst(&self) -> Option<&Ranked<T>> {
        self.worst.as_ref()
    }

    /// How many Configurations have been offered so far
    pub fn offered(&self) -> usize {
        self.offered
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_trial_has_zero_std_dev() {
        let mut collector = TrialCollector::new(1000, 1);
        collector.record(Duration::from_millis(250));
        let stats = collector.finalize().unwrap();

        assert_eq!(stats.trials, 1);
        assert_eq!(stats.std_dev_s, 0.0);
        assert!((stats.mean_s - 0.25).abs() < 1e-12);
        assert!((stats.throughput_bps - 4000.0).abs() < 1e-6);
    }

    #[test]
    fn test_identical_trials() {
        let stats = summarize(&[0.5, 0.5, 0.5, 0.5], 10).unwrap();
        assert_eq!(stats.std_dev_s, 0.0);
        assert_eq!(stats.mean_s, 0.5);
        assert_eq!(stats.min_s, 0.5);
        assert_eq!(stats.max_s, 0.5);
    }

    #[test]
    fn test_sample_std_dev_uses_n_minus_one() {
        // mean 2, squared deviations 1 + 0 + 1, divided by 2
        let stats = summarize(&[1.0, 2.0, 3.0], 6).unwrap();
        assert!((stats.mean_s - 2.0).abs() < 1e-12);
        assert!((stats.std_dev_s - 1.0).abs() < 1e-12);
        assert!((stats.throughput_bps - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_collector() {
        assert!(TrialCollector::new(10, 3).finalize().is_none());
    }

    #[test]
    fn test_ranking_decreasing_then_increasing() {
        let means = [5.0, 4.0, 3.0, 2.0, 1.0, 1.5, 2.5, 6.0, 0.5];
        let mut ranking = Ranking::new(3);

        for (i, &mean) in means.iter().enumerate() {
            ranking.offer(i, mean, ());
            let top = ranking.top();
            assert!(top.len() <= 3);
            assert!(top.windows(2).all(|w| w[0].mean_s <= w[1].mean_s));

            let mut seen: Vec<f64> = means[..=i].to_vec();
            seen.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let expected: Vec<f64> = seen.into_iter().take(3).collect();
            let got: Vec<f64> = top.iter().map(|r| r.mean_s).collect();
            assert_eq!(got, expected);
        }

        assert_eq!(ranking.best().unwrap().index, 8);
        assert_eq!(ranking.worst().unwrap().index, 7);
        assert_eq!(ranking.offered(), means.len());
    }

    #[test]
    fn test_ranking_reports_new_best() {
        let mut ranking = Ranking::new(2);
        assert!(ranking.offer(0, 3.0, "a"));
        assert!(!ranking.offer(1, 4.0, "b"));
        assert!(ranking.offer(2, 1.0, "c"));
        assert!(!ranking.offer(3, 9.0, "d"));
        let items: Vec<&str> = ranking.top().iter().map(|r| r.item).collect();
        assert_eq!(items, vec!["c", "a"]);
    }

    #[test]
    fn test_ranking_ties_keep_first() {
        let mut ranking = Ranking::new(3);
        ranking.offer(0, 1.0, 'x');
        ranking.offer(1, 1.0, 'y');
        let order: Vec<usize> = ranking.top().iter().map(|r| r.index).collect();
        assert_eq!(order, vec![0, 1]);
    }

    #[test]
    fn test_zero_capacity_ranking() {
        let mut ranking = Ranking::new(0);
        assert!(!ranking.offer(0, 1.0, ()));
        assert!(ranking.top().is_empty());
        assert!(ranking.worst().is_some());
    }
}
