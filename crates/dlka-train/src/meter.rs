//! Running averages of named scalar metrics.

use std::collections::BTreeMap;

use crate::error::{Result, TrainError};

/// Accumulates named scalars across updates.
///
/// The first update fixes the set of tracked keys. Later updates may omit
/// keys (their averages are left unchanged) but may not introduce new ones.
#[derive(Debug, Clone, Default)]
pub struct AverageMeter {
    sums: BTreeMap<String, f64>,
    averages: BTreeMap<String, f64>,
    count: usize,
}

impl AverageMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one observation per key.
    pub fn update<I, K>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        let values: Vec<(String, f64)> = values.into_iter().map(|(k, v)| (k.into(), v)).collect();

        if self.count > 0 {
            if let Some((key, _)) = values.iter().find(|(k, _)| !self.sums.contains_key(k)) {
                return Err(TrainError::unknown_metric(key.clone()));
            }
        }

        self.count += 1;
        for (key, value) in values {
            let sum = self.sums.entry(key.clone()).or_insert(0.0);
            *sum += value;
            self.averages.insert(key, *sum / self.count as f64);
        }
        Ok(())
    }

    /// Current average of `key`.
    pub fn mean(&self, key: &str) -> Option<f64> {
        self.averages.get(key).copied()
    }

    /// Accumulated sum of `key`.
    pub fn sum(&self, key: &str) -> Option<f64> {
        self.sums.get(key).copied()
    }

    /// All averages, ordered by key.
    pub fn averages(&self) -> &BTreeMap<String, f64> {
        &self.averages
    }

    /// Number of updates so far.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
