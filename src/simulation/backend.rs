// src/simulation/backend.rs

//! The photonic backend seam.
//!
//! A circuit is executed against any [`PhotonicBackend`]. The crate ships
//! one implementation, [`GaussianState`](super::GaussianState).

use crate::core::{WalkError, WalkResult};
use num_complex::Complex;

/// Clicking detectors a single threshold query may ask for (2^n terms).
pub(crate) const MAX_THRESHOLD_CLICKS: usize = 20;

/// Gaussian-state operations and detection statistics a walk needs.
///
/// Modes are addressed by the contiguous indices of a
/// [`ModeAssignment`](crate::core::ModeAssignment). Every method fails with
/// `WalkError::Backend` on an out-of-range mode or parameter.
pub trait PhotonicBackend {
    /// Number of modes the backend holds.
    fn num_modes(&self) -> usize;

    /// Largest photon number per mode a Fock query may ask for.
    fn cutoff(&self) -> usize;

    /// Largest number of modes this backend accepts.
    fn max_modes(&self) -> usize;

    /// Replaces `mode` by vacuum, discarding any correlations it carried.
    fn prepare_vacuum(&mut self, mode: usize) -> WalkResult<()>;

    /// Replaces `mode_a` and `mode_b` by a two-mode squeezed vacuum with
    /// squeezing `r` and phase `phase`.
    fn prepare_two_mode_squeezed(
        &mut self,
        mode_a: usize,
        mode_b: usize,
        r: f64,
        phase: f64,
    ) -> WalkResult<()>;

    /// Displaces `mode` by `amplitude`.
    fn prepare_coherent(&mut self, mode: usize, amplitude: Complex<f64>) -> WalkResult<()>;

    /// Replaces `mode` by a thermal state with `mean_photons` photons.
    fn prepare_thermal(&mut self, mode: usize, mean_photons: f64) -> WalkResult<()>;

    /// Lossless two-mode coupler: `a → t·a − r*·b`, `b → r·a + t·b` with
    /// `t = √(1 − R)` and `r = √R·e^(iφ)`.
    fn beam_splitter(
        &mut self,
        mode_a: usize,
        mode_b: usize,
        reflectivity: f64,
        phase: f64,
    ) -> WalkResult<()>;

    /// Pure loss channel keeping a fraction `transmission` of the light.
    fn loss(&mut self, mode: usize, transmission: f64) -> WalkResult<()>;

    /// Joint probability of detecting exactly `photons[i]` photons on
    /// `modes[i]`, all other modes traced out.
    fn fock_probability(&self, modes: &[usize], photons: &[usize]) -> WalkResult<f64>;

    /// Joint probability of the click (`true`) / no-click pattern on
    /// `modes`, all other modes traced out.
    fn threshold_probability(&self, modes: &[usize], clicks: &[bool]) -> WalkResult<f64>;

    /// Joint probability that detector `i`, which counts the photons of all
    /// modes in `detectors[i]` together, registers `photons[i]` photons.
    ///
    /// Light in different modes of one detector does not interfere, so the
    /// result sums [`fock_probability`](Self::fock_probability) over every
    /// way of sharing each count among the detector's modes.
    fn detector_fock_probability(&self, detectors: &[Vec<usize>], photons: &[usize]) -> WalkResult<f64> {
        check_detectors(detectors, photons.len())?;
        let modes: Vec<usize> = detectors.iter().flatten().copied().collect();
        let mut counts = Vec::with_capacity(modes.len());
        let mut total = 0.0;
        for_each_split(detectors, photons, &mut counts, &mut |split: &[usize]| {
            total += self.fock_probability(&modes, split)?;
            Ok(())
        })?;
        Ok(total)
    }

    /// Joint click pattern of detectors that each read a set of modes. A
    /// detector clicks when any of its modes holds a photon.
    fn detector_threshold_probability(&self, detectors: &[Vec<usize>], clicks: &[bool]) -> WalkResult<f64> {
        check_detectors(detectors, clicks.len())?;
        if detectors.iter().all(|modes| modes.len() == 1) {
            let modes: Vec<usize> = detectors.iter().map(|modes| modes[0]).collect();
            return self.threshold_probability(&modes, clicks);
        }
        let on: Vec<&Vec<usize>> = detectors.iter().zip(clicks).filter(|(_, c)| **c).map(|(d, _)| d).collect();
        if on.len() > MAX_THRESHOLD_CLICKS {
            return Err(WalkError::backend(format!(
                "Threshold query with {} clicking detectors exceeds the limit of {}",
                on.len(),
                MAX_THRESHOLD_CLICKS
            )));
        }
        let dark: Vec<usize> = detectors
            .iter()
            .zip(clicks)
            .filter(|(_, c)| !**c)
            .flat_map(|(d, _)| d.iter().copied())
            .collect();

        // P(clicks on C, none on V) = Σ_{T⊆C} (−1)^|T| P(vacuum on V ∪ T)
        let mut total = 0.0;
        for subset in 0u64..(1u64 << on.len()) {
            let mut projected = dark.clone();
            for (bit, modes) in on.iter().enumerate() {
                if (subset >> bit) & 1 == 1 {
                    projected.extend(modes.iter().copied());
                }
            }
            let sign = if subset.count_ones() % 2 == 0 { 1.0 } else { -1.0 };
            total += sign * self.threshold_probability(&projected, &vec![false; projected.len()])?;
        }
        Ok(total)
    }
}

fn check_detectors(detectors: &[Vec<usize>], outcomes: usize) -> WalkResult<()> {
    if detectors.len() != outcomes {
        return Err(WalkError::backend(format!(
            "Query names {} detectors but {} outcomes",
            detectors.len(),
            outcomes
        )));
    }
    if let Some(i) = detectors.iter().position(|modes| modes.is_empty()) {
        return Err(WalkError::backend(format!("Detector {} reads no mode", i)));
    }
    Ok(())
}

/// Calls `visit` with every per-mode split of the detector counts, in the
/// flattened mode order of `detectors`.
fn for_each_split<F>(detectors: &[Vec<usize>], photons: &[usize], counts: &mut Vec<usize>, visit: &mut F) -> WalkResult<()>
where
    F: FnMut(&[usize]) -> WalkResult<()>,
{
    match detectors.split_first() {
        None => visit(counts),
        Some((modes, rest)) => split_among(modes.len(), photons[0], rest, &photons[1..], counts, visit),
    }
}

fn split_among<F>(
    slots: usize,
    remaining: usize,
    detectors: &[Vec<usize>],
    photons: &[usize],
    counts: &mut Vec<usize>,
    visit: &mut F,
) -> WalkResult<()>
where
    F: FnMut(&[usize]) -> WalkResult<()>,
{
    if slots == 1 {
        counts.push(remaining);
        let result = for_each_split(detectors, photons, counts, visit);
        counts.pop();
        return result;
    }
    for n in 0..=remaining {
        counts.push(n);
        let result = split_among(slots - 1, remaining - n, detectors, photons, counts, visit);
        counts.pop();
        result?;
    }
    Ok(())
}
