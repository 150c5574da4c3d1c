//! Rolling statistics over a fixed-length window

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Rolling window of `f64` samples with an O(1) running sum.
///
/// The oldest sample is evicted once the window is full.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollingWindow {
    values: VecDeque<f64>,
    window_size: usize,
    sum: f64,
}

impl RollingWindow {
    pub fn new(window_size: usize) -> Self {
        let window_size = window_size.max(1);
        Self {
            values: VecDeque::with_capacity(window_size),
            window_size,
            sum: 0.0,
        }
    }

    /// Add a sample, returning the evicted one when the window was full
    #[inline]
    pub fn push(&mut self, value: f64) -> Option<f64> {
        let evicted = if self.values.len() >= self.window_size {
            self.values.pop_front()
        } else {
            None
        };
        if let Some(old) = evicted {
            self.sum -= old;
        }
        self.values.push_back(value);
        self.sum += value;
        evicted
    }

    #[inline]
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Mean of the samples in the window
    #[inline]
    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.sum / self.values.len() as f64)
    }

    /// Population variance
    pub fn variance(&self) -> Option<f64> {
        let mean = self.mean()?;
        let sum_sq: f64 = self
            .values
            .iter()
            .map(|x| {
                let diff = x - mean;
                diff * diff
            })
            .sum();
        Some(sum_sq / self.values.len() as f64)
    }

    pub fn std_dev(&self) -> Option<f64> {
        self.variance().map(f64::sqrt)
    }

    pub fn min(&self) -> Option<f64> {
        self.values.iter().copied().reduce(f64::min)
    }

    pub fn max(&self) -> Option<f64> {
        self.values.iter().copied().reduce(f64::max)
    }

    #[inline]
    pub fn last(&self) -> Option<f64> {
        self.values.back().copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.values.len() >= self.window_size
    }

    #[inline]
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }
}
