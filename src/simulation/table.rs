// src/simulation/table.rs

//! Outcome probability tables and the helpers that post-process them.

use crate::core::{WalkError, WalkResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::fmt;

/// Every photon-number outcome on `modes` detectors with at most
/// `max_photons` photons in total, in lexicographic order.
pub fn fock_outcomes(modes: usize, max_photons: usize) -> Vec<Vec<usize>> {
    let mut outcomes = Vec::new();
    let mut current = Vec::with_capacity(modes);
    push_outcomes(modes, max_photons, &mut current, &mut outcomes);
    outcomes
}

fn push_outcomes(remaining: usize, budget: usize, current: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
    if remaining == 0 {
        out.push(current.clone());
        return;
    }
    for n in 0..=budget {
        current.push(n);
        push_outcomes(remaining - 1, budget - n, current, out);
        current.pop();
    }
}

/// Probabilities keyed by per-detector outcome (photon counts, or 0/1 for
/// threshold detectors).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProbabilityTable {
    entries: BTreeMap<Vec<usize>, f64>,
}

impl ProbabilityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the probability of `outcome`, replacing any previous value.
    pub fn insert(&mut self, outcome: Vec<usize>, probability: f64) {
        self.entries.insert(outcome, probability);
    }

    fn accumulate(&mut self, outcome: Vec<usize>, probability: f64) {
        *self.entries.entry(outcome).or_insert(0.0) += probability;
    }

    pub fn get(&self, outcome: &[usize]) -> Option<f64> {
        self.entries.get(outcome).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[usize], f64)> {
        self.entries.iter().map(|(k, v)| (k.as_slice(), *v))
    }

    /// Sum of all entries.
    pub fn total(&self) -> f64 {
        self.entries.values().sum()
    }

    /// Rescales the entries to sum to 1.
    ///
    /// # Errors
    /// `WalkError::Backend` if the total is zero or not finite.
    pub fn normalized(&self) -> WalkResult<Self> {
        let total = self.total();
        if !total.is_finite() || total <= 0.0 {
            return Err(WalkError::backend(format!(
                "Cannot normalize a table with total probability {}",
                total
            )));
        }
        Ok(Self {
            entries: self.entries.iter().map(|(k, v)| (k.clone(), v / total)).collect(),
        })
    }

    /// Keeps only outcomes with exactly `photons` photons (clicks) in total.
    pub fn filter_photon_number(&self, photons: usize) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|(k, _)| k.iter().sum::<usize>() == photons)
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
        }
    }

    /// Sums out every detector not listed in `positions`. The new outcomes
    /// follow the order of `positions`.
    ///
    /// # Errors
    /// `WalkError::Evaluation` if a position is beyond an outcome's length.
    pub fn marginal(&self, positions: &[usize]) -> WalkResult<Self> {
        let mut out = Self::new();
        for (outcome, p) in &self.entries {
            let mut key = Vec::with_capacity(positions.len());
            for &pos in positions {
                let count = outcome.get(pos).ok_or_else(|| {
                    WalkError::evaluation(
                        format!("{:?}", outcome),
                        format!("no detector at position {}", pos),
                    )
                })?;
                key.push(*count);
            }
            out.accumulate(key, *p);
        }
        Ok(out)
    }

    /// Distribution of the detector-wise sum of two independent outcomes,
    /// truncated to `max_photons` in total.
    ///
    /// # Errors
    /// `WalkError::Evaluation` if the two tables have different outcome lengths.
    pub fn convolve(&self, other: &ProbabilityTable, max_photons: usize) -> WalkResult<Self> {
        let mut out = Self::new();
        for (a, pa) in &self.entries {
            for (b, pb) in &other.entries {
                if a.len() != b.len() {
                    return Err(WalkError::evaluation(
                        format!("{:?}", b),
                        format!("cannot combine with an outcome over {} detectors", a.len()),
                    ));
                }
                let sum: Vec<usize> = a.iter().zip(b).map(|(x, y)| x + y).collect();
                if sum.iter().sum::<usize>() <= max_photons {
                    out.accumulate(sum, pa * pb);
                }
            }
        }
        Ok(out)
    }

    /// Draws `shots` outcomes from the normalized table with a seeded RNG
    /// and returns how often each one occurred.
    ///
    /// # Errors
    /// `WalkError::Backend` if the table cannot be normalized.
    pub fn sample(&self, shots: usize, seed: u64) -> WalkResult<BTreeMap<Vec<usize>, usize>> {
        let normalized = self.normalized()?;
        let outcomes: Vec<&Vec<usize>> = normalized.entries.keys().collect();
        let cumulative: Vec<f64> = normalized
            .entries
            .values()
            .scan(0.0, |acc, p| {
                *acc += p;
                Some(*acc)
            })
            .collect();

        let mut rng = StdRng::seed_from_u64(seed);
        let mut counts = BTreeMap::new();
        for _ in 0..shots {
            let draw: f64 = rng.random::<f64>();
            let index = cumulative.partition_point(|&c| c <= draw).min(outcomes.len() - 1);
            *counts.entry(outcomes[index].clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

impl FromIterator<(Vec<usize>, f64)> for ProbabilityTable {
    fn from_iter<I: IntoIterator<Item = (Vec<usize>, f64)>>(iter: I) -> Self {
        Self { entries: iter.into_iter().collect() }
    }
}

impl fmt::Display for ProbabilityTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (outcome, p) in &self.entries {
            let label: Vec<String> = outcome.iter().map(|n| n.to_string()).collect();
            writeln!(f, "  [{}]: {:.6e}", label.join(","), p)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[(&[usize], f64)]) -> ProbabilityTable {
        entries.iter().map(|(k, v)| (k.to_vec(), *v)).collect()
    }

    #[test]
    fn test_fock_outcomes_counts() {
        // Outcomes of 3 detectors with ≤ 2 photons: C(5, 3) = 10.
        let outcomes = fock_outcomes(3, 2);
        assert_eq!(outcomes.len(), 10);
        assert_eq!(outcomes[0], vec![0, 0, 0]);
        assert!(outcomes.iter().all(|o| o.iter().sum::<usize>() <= 2));
        assert_eq!(fock_outcomes(0, 3), vec![Vec::<usize>::new()]);
    }

    #[test]
    fn test_normalize_and_filter() -> WalkResult<()> {
        let t = table(&[(&[0, 0], 0.2), (&[1, 0], 0.1), (&[0, 1], 0.1)]);
        let n = t.normalized()?;
        assert!((n.total() - 1.0).abs() < 1e-12);
        assert!((n.get(&[0, 0]).unwrap() - 0.5).abs() < 1e-12);
        let one = t.filter_photon_number(1);
        assert_eq!(one.len(), 2);
        assert!(ProbabilityTable::new().normalized().is_err());
        Ok(())
    }

    #[test]
    fn test_marginal_sums_other_detectors() -> WalkResult<()> {
        let t = table(&[(&[0, 1], 0.3), (&[1, 1], 0.2), (&[1, 0], 0.5)]);
        let m = t.marginal(&[1])?;
        assert!((m.get(&[1]).unwrap() - 0.5).abs() < 1e-12);
        assert!((m.get(&[0]).unwrap() - 0.5).abs() < 1e-12);
        assert!(matches!(t.marginal(&[2]), Err(WalkError::Evaluation { .. })));
        Ok(())
    }

    #[test]
    fn test_convolve_adds_counts() -> WalkResult<()> {
        let a = table(&[(&[0, 0], 0.5), (&[1, 0], 0.5)]);
        let b = table(&[(&[0, 0], 0.5), (&[0, 1], 0.5)]);
        let c = a.convolve(&b, 2)?;
        assert_eq!(c.len(), 4);
        assert!((c.get(&[1, 1]).unwrap() - 0.25).abs() < 1e-12);
        let truncated = a.convolve(&b, 1)?;
        assert!(truncated.get(&[1, 1]).is_none());
        assert!(a.convolve(&table(&[(&[0], 1.0)]), 2).is_err());
        Ok(())
    }

    #[test]
    fn test_sampling_is_seeded() -> WalkResult<()> {
        let t = table(&[(&[0], 0.25), (&[1], 0.75)]);
        let first = t.sample(2000, 7)?;
        assert_eq!(first, t.sample(2000, 7)?);
        assert_eq!(first.values().sum::<usize>(), 2000);
        let ones = first.get(&vec![1]).copied().unwrap_or(0) as f64 / 2000.0;
        assert!((ones - 0.75).abs() < 0.05);
        Ok(())
    }
}
