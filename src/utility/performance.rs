//! Bounded sliding-window statistics over one score.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::ExecutionError;

/// Time series of one score with a bounded sliding window.
///
/// Every sample goes into a window of at most `capacity` values. From the
/// window the range derives a moving average and an upper/lower boundary one
/// standard deviation around it. The punctual values and all three derived
/// series are also kept as an unbounded history, so a finished run can be
/// inspected in full.
///
/// The standard deviation is taken around the most recently recorded average,
/// i.e. the average as it stood before the new sample arrived (for the first
/// sample, the new average itself). This reproduces the scoring step it feeds
/// and is a known approximation of the window's own deviation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRange {
    capacity: usize,
    window: VecDeque<f64>,
    punctual: Vec<f64>,
    averages: Vec<f64>,
    tops: Vec<f64>,
    bottoms: Vec<f64>,
}

impl PerformanceRange {
    /// Creates an empty range. A zero capacity is treated as one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            window: VecDeque::with_capacity(capacity),
            punctual: Vec::new(),
            averages: Vec::new(),
            tops: Vec::new(),
            bottoms: Vec::new(),
        }
    }

    /// Records a new sample and updates the derived series.
    pub fn add_value(&mut self, value: f64) {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(value);
        self.punctual.push(value);

        let avg = self.window_average();
        let reference = self.averages.last().copied().unwrap_or(avg);
        let sd = self.deviation_around(reference);

        self.averages.push(avg);
        self.tops.push(avg + sd);
        self.bottoms.push(avg - sd);
    }

    /// Mean of the current window; 0 when the window is empty.
    #[must_use]
    pub fn window_average(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = self.window.len() as f64;
        self.window.iter().sum::<f64>() / n
    }

    fn deviation_around(&self, reference: f64) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = self.window.len() as f64;
        let var = self
            .window
            .iter()
            .map(|v| (v - reference) * (v - reference))
            .sum::<f64>()
            / n;
        var.sqrt()
    }

    /// Sliding window size.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of samples currently in the sliding window.
    #[must_use]
    pub fn num_sliding_values(&self) -> usize {
        self.window.len()
    }

    /// Number of samples ever recorded.
    #[must_use]
    pub fn num_values(&self) -> usize {
        self.punctual.len()
    }

    /// Samples in the sliding window, oldest first.
    pub fn window(&self) -> impl Iterator<Item = f64> + '_ {
        self.window.iter().copied()
    }

    /// Every sample recorded.
    #[must_use]
    pub fn punctual_values(&self) -> &[f64] {
        &self.punctual
    }

    /// Moving average after each sample.
    #[must_use]
    pub fn averages(&self) -> &[f64] {
        &self.averages
    }

    /// Upper boundary after each sample.
    #[must_use]
    pub fn tops(&self) -> &[f64] {
        &self.tops
    }

    /// Lower boundary after each sample.
    #[must_use]
    pub fn bottoms(&self) -> &[f64] {
        &self.bottoms
    }

    /// Latest sample.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::EmptyWindow` if nothing was recorded.
    pub fn current_punctual(&self) -> Result<f64, ExecutionError> {
        last(&self.punctual)
    }

    /// Latest moving average.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::EmptyWindow` if nothing was recorded.
    pub fn current_average(&self) -> Result<f64, ExecutionError> {
        last(&self.averages)
    }

    /// Latest upper boundary (average + deviation).
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::EmptyWindow` if nothing was recorded.
    pub fn current_top(&self) -> Result<f64, ExecutionError> {
        last(&self.tops)
    }

    /// Latest lower boundary (average - deviation).
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::EmptyWindow` if nothing was recorded.
    pub fn current_bottom(&self) -> Result<f64, ExecutionError> {
        last(&self.bottoms)
    }
}

fn last(series: &[f64]) -> Result<f64, ExecutionError> {
    series.last().copied().ok_or(ExecutionError::EmptyWindow)
}
