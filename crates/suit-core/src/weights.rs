//! Weight assignments and their validation.
//!
//! Validation never rescales: a sum that misses 1 is reported back so the user
//! can fix it.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::config::Tolerance;
use crate::error::WeightError;

/// Layer id → weight in `[0, 1]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightAssignment {
    weights: BTreeMap<String, f64>,
}

impl WeightAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Equal weights of `1 / n` for each id.
    pub fn uniform<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        let w = if ids.is_empty() { 0.0 } else { 1.0 / ids.len() as f64 };
        Self {
            weights: ids.into_iter().map(|id| (id, w)).collect(),
        }
    }

    /// Set (or replace) the weight for one layer.
    pub fn set(&mut self, id: impl Into<String>, weight: f64) {
        self.weights.insert(id.into(), weight);
    }

    pub fn get(&self, id: &str) -> Option<f64> {
        self.weights.get(id).copied()
    }

    pub fn remove(&mut self, id: &str) -> Option<f64> {
        self.weights.remove(id)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(k, &v)| (k.as_str(), v))
    }

    pub fn sum(&self) -> f64 {
        self.weights.values().sum()
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for WeightAssignment {
    fn from_iter<T: IntoIterator<Item = (S, f64)>>(iter: T) -> Self {
        Self {
            weights: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Check coverage, range and normalization, in that order.
/// Hands back the assignment it checked.
pub fn validate<'w, 'a, I>(
    weights: &'w WeightAssignment,
    expected_ids: I,
    tolerance: &Tolerance,
) -> Result<&'w WeightAssignment, WeightError>
where
    I: IntoIterator<Item = &'a str>,
{
    let expected: BTreeSet<&str> = expected_ids.into_iter().collect();
    let missing: Vec<String> = expected
        .iter()
        .filter(|id| weights.get(id).is_none())
        .map(|id| id.to_string())
        .collect();
    let unexpected: Vec<String> = weights
        .iter()
        .filter(|(id, _)| !expected.contains(id))
        .map(|(id, _)| id.to_string())
        .collect();
    if !missing.is_empty() || !unexpected.is_empty() {
        return Err(WeightError::Incomplete { missing, unexpected });
    }

    if let Some((id, weight)) = weights.iter().find(|&(_, w)| !(0.0..=1.0).contains(&w)) {
        return Err(WeightError::OutOfRange {
            id: id.to_string(),
            weight,
        });
    }

    let sum = weights.sum();
    if !tolerance.is_close(sum, 1.0) {
        return Err(WeightError::NotNormalized { sum });
    }
    Ok(weights)
}
