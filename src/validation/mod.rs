// src/validation/mod.rs

//! Physicality checks for evolved states and computed probabilities.

use crate::core::{PROBABILITY_TOLERANCE, WalkError, WalkResult};
use crate::simulation::{GaussianState, PhotonicBackend, ProbabilityTable};
use tracing::warn;

// Default tolerance values (can be overridden by caller)
const DEFAULT_MOMENT_TOLERANCE: f64 = 1e-9;
const DEFAULT_NORM_TOLERANCE: f64 = 1e-6;

/// Checks that a computed probability lies in [0, 1] up to numerical slack
/// and clamps it into range.
///
/// # Arguments
/// * `value` - The raw probability from the backend.
/// * `tolerance` - Allowed excursion outside [0, 1]. Defaults to
///   `PROBABILITY_TOLERANCE`.
///
/// # Returns
/// * `Ok(p)` with `p` clamped to [0, 1].
/// * `Err(WalkError::Backend)` if the value is not finite or too far out of range.
pub fn check_probability(value: f64, tolerance: Option<f64>) -> WalkResult<f64> {
    let effective_tolerance = tolerance.unwrap_or(PROBABILITY_TOLERANCE);
    if !value.is_finite() {
        return Err(WalkError::backend(format!("Probability is not finite: {}", value)));
    }
    if value < -effective_tolerance || value > 1.0 + effective_tolerance {
        return Err(WalkError::backend(format!(
            "Probability {} outside [0, 1] (tolerance {})",
            value, effective_tolerance
        )));
    }
    if !(0.0..=1.0).contains(&value) {
        warn!(value, "probability clamped into [0, 1]");
    }
    Ok(value.clamp(0.0, 1.0))
}

/// Checks that the entries of a probability table sum to 1.
///
/// # Returns
/// * `Ok(())` if normalized within tolerance.
/// * `Err(WalkError::Backend)` otherwise.
pub fn check_normalization(table: &ProbabilityTable, tolerance: Option<f64>) -> WalkResult<()> {
    let effective_tolerance = tolerance.unwrap_or(DEFAULT_NORM_TOLERANCE);
    let total = table.total();
    if (total - 1.0).abs() > effective_tolerance {
        Err(WalkError::backend(format!(
            "Probability table normalization failed. Sum = {} (Deviation > {})",
            total, effective_tolerance
        )))
    } else {
        Ok(())
    }
}

/// Checks the moment matrices of a Gaussian state: `⟨Δa_i†Δa_j⟩` must be
/// Hermitian with non-negative diagonal and `⟨Δa_iΔa_j⟩` must be symmetric.
///
/// # Returns
/// * `Ok(())` if every check passes within tolerance.
/// * `Err(WalkError::Backend)` naming the first violated entry.
pub fn validate_state(state: &GaussianState, tolerance: Option<f64>) -> WalkResult<()> {
    let tol = tolerance.unwrap_or(DEFAULT_MOMENT_TOLERANCE);
    let modes = state.num_modes();
    for i in 0..modes {
        let occupation = state.normal_moment(i, i)?;
        if occupation.re < -tol || occupation.im.abs() > tol {
            return Err(WalkError::backend(format!(
                "Mode {} has unphysical occupation {}",
                i, occupation
            )));
        }
        for j in i + 1..modes {
            let (nij, nji) = (state.normal_moment(i, j)?, state.normal_moment(j, i)?);
            if (nij - nji.conj()).norm() > tol {
                return Err(WalkError::backend(format!(
                    "Normal moments not Hermitian at ({}, {}): {} vs {}",
                    i, j, nij, nji
                )));
            }
            let (mij, mji) = (state.anomalous_moment(i, j)?, state.anomalous_moment(j, i)?);
            if (mij - mji).norm() > tol {
                return Err(WalkError::backend(format!(
                    "Anomalous moments not symmetric at ({}, {}): {} vs {}",
                    i, j, mij, mji
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_probability() {
        assert_eq!(check_probability(0.25, None), Ok(0.25));
        assert_eq!(check_probability(-1e-12, None), Ok(0.0));
        assert_eq!(check_probability(1.0 + 1e-12, None), Ok(1.0));
        assert!(matches!(check_probability(1.1, None), Err(WalkError::Backend { .. })));
        assert!(matches!(check_probability(f64::NAN, None), Err(WalkError::Backend { .. })));
        assert!(check_probability(-0.05, Some(0.1)).is_ok());
    }

    #[test]
    fn test_check_normalization() {
        let mut table = ProbabilityTable::new();
        table.insert(vec![0], 0.4);
        table.insert(vec![1], 0.6);
        assert!(check_normalization(&table, None).is_ok());
        table.insert(vec![2], 0.1);
        assert!(check_normalization(&table, None).is_err());
        assert!(check_normalization(&table, Some(0.2)).is_ok());
    }

    #[test]
    fn test_evolved_state_is_physical() -> WalkResult<()> {
        let mut state = GaussianState::vacuum(3, 4, 8)?;
        state.prepare_two_mode_squeezed(0, 1, 0.6, 0.4)?;
        state.prepare_thermal(2, 0.2)?;
        state.beam_splitter(1, 2, 0.3, 1.2)?;
        state.loss(2, 0.7)?;
        validate_state(&state, None)
    }
}
