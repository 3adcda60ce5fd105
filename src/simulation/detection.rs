// src/simulation/detection.rs

//! Detection patterns and their evaluation against an evolved state.

use super::backend::PhotonicBackend;
use crate::core::{DetectionMode, DetectorLayout, TimeBin, WalkError, WalkResult};
use crate::validation::check_probability;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::trace;

/// A detection event on the herald plus every monitored time bin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomePattern {
    /// Photon-number-resolved counts.
    Fock { herald: usize, photons: Vec<usize> },
    /// Click (`true`) / no-click pattern.
    Threshold { herald: bool, clicks: Vec<bool> },
}

impl OutcomePattern {
    /// Fock pattern conditioned on exactly one herald photon.
    pub fn fock(photons: impl Into<Vec<usize>>) -> Self {
        OutcomePattern::Fock { herald: 1, photons: photons.into() }
    }

    /// Threshold pattern conditioned on a herald click.
    pub fn threshold(clicks: impl Into<Vec<bool>>) -> Self {
        OutcomePattern::Threshold { herald: true, clicks: clicks.into() }
    }

    pub fn detection_mode(&self) -> DetectionMode {
        match self {
            OutcomePattern::Fock { .. } => DetectionMode::Fock,
            OutcomePattern::Threshold { .. } => DetectionMode::Threshold,
        }
    }

    /// Number of monitored-mode entries (herald excluded).
    pub fn len(&self) -> usize {
        match self {
            OutcomePattern::Fock { photons, .. } => photons.len(),
            OutcomePattern::Threshold { clicks, .. } => clicks.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for OutcomePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomePattern::Fock { herald, photons } => {
                let counts: Vec<String> = photons.iter().map(|n| n.to_string()).collect();
                write!(f, "Fock[h={} | {}]", herald, counts.join(","))
            }
            OutcomePattern::Threshold { herald, clicks } => {
                let bits: Vec<&str> = clicks.iter().map(|&c| if c { "1" } else { "0" }).collect();
                write!(f, "Threshold[h={} | {}]", u8::from(*herald), bits.join(","))
            }
        }
    }
}

/// The herald detector plus the monitored time-bin detectors, each reading
/// one or more modes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DetectorSet {
    herald: Vec<usize>,
    time_bins: Vec<TimeBin>,
    detectors: Vec<Vec<usize>>,
}

impl DetectorSet {
    /// Herald plus every signal time bin.
    pub(crate) fn all_time_bins(layout: &DetectorLayout) -> Self {
        Self {
            herald: layout.herald().to_vec(),
            time_bins: (0..layout.num_time_bins()).collect(),
            detectors: layout.time_bins().to_vec(),
        }
    }

    /// Herald plus the listed time bins, in the given order.
    ///
    /// # Errors
    /// `WalkError::Config` for an unknown or repeated time bin.
    pub(crate) fn select(layout: &DetectorLayout, time_bins: &[TimeBin]) -> WalkResult<Self> {
        let mut detectors = Vec::with_capacity(time_bins.len());
        for (i, &tb) in time_bins.iter().enumerate() {
            if time_bins[..i].contains(&tb) {
                return Err(WalkError::config(format!("Time bin {} monitored twice", tb)));
            }
            detectors.push(layout.time_bin(tb)?.to_vec());
        }
        Ok(Self { herald: layout.herald().to_vec(), time_bins: time_bins.to_vec(), detectors })
    }

    pub(crate) fn time_bins(&self) -> &[TimeBin] {
        &self.time_bins
    }

    pub(crate) fn detectors(&self) -> &[Vec<usize>] {
        &self.detectors
    }

    fn with_herald(&self) -> Vec<Vec<usize>> {
        std::iter::once(self.herald.clone()).chain(self.detectors.iter().cloned()).collect()
    }

    /// Probability of `pattern` under the configured detection mode.
    ///
    /// # Errors
    /// `WalkError::Evaluation` when the pattern's length or kind does not
    /// match, or a Fock count exceeds the backend cutoff.
    pub(crate) fn evaluate<B: PhotonicBackend>(
        &self,
        backend: &B,
        mode: DetectionMode,
        pattern: &OutcomePattern,
    ) -> WalkResult<f64> {
        if pattern.detection_mode() != mode {
            return Err(WalkError::evaluation(
                pattern,
                format!("pattern kind does not match {:?} detection", mode),
            ));
        }
        if pattern.len() != self.detectors.len() {
            return Err(WalkError::evaluation(
                pattern,
                format!(
                    "pattern has {} entries but {} time bins are monitored",
                    pattern.len(),
                    self.detectors.len()
                ),
            ));
        }

        let raw = match pattern {
            OutcomePattern::Fock { herald, photons } => {
                let counts: Vec<usize> = std::iter::once(*herald).chain(photons.iter().copied()).collect();
                if let Some(&n) = counts.iter().find(|&&n| n > backend.cutoff()) {
                    return Err(WalkError::evaluation(
                        pattern,
                        format!("photon number {} exceeds cutoff {}", n, backend.cutoff()),
                    ));
                }
                backend.detector_fock_probability(&self.with_herald(), &counts)?
            }
            OutcomePattern::Threshold { herald, clicks } => {
                let outcome: Vec<bool> = std::iter::once(*herald).chain(clicks.iter().copied()).collect();
                backend.detector_threshold_probability(&self.with_herald(), &outcome)?
            }
        };
        trace!(%pattern, raw, "pattern evaluated");
        check_probability(raw, None)
    }

    /// P(herald = 1) for Fock detection, P(herald click) for threshold.
    pub(crate) fn herald_probability<B: PhotonicBackend>(&self, backend: &B, mode: DetectionMode) -> WalkResult<f64> {
        let herald = [self.herald.clone()];
        let raw = match mode {
            DetectionMode::Fock => backend.detector_fock_probability(&herald, &[1])?,
            DetectionMode::Threshold => backend.detector_threshold_probability(&herald, &[true])?,
        };
        check_probability(raw, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DEFAULT_MAX_MODES, ModeAssignment};
    use crate::simulation::GaussianState;
    use num_complex::Complex;

    fn setup() -> (GaussianState, DetectorSet) {
        let assignment = ModeAssignment::new(1, 0, DEFAULT_MAX_MODES).unwrap();
        let mut state = GaussianState::vacuum(3, 2, DEFAULT_MAX_MODES).unwrap();
        state.prepare_two_mode_squeezed(0, 1, 0.5, 0.0).unwrap();
        (state, DetectorSet::all_time_bins(&DetectorLayout::new(&assignment)))
    }

    #[test]
    fn test_display() {
        assert_eq!(OutcomePattern::fock(vec![0, 2]).to_string(), "Fock[h=1 | 0,2]");
        assert_eq!(
            OutcomePattern::threshold(vec![true, false]).to_string(),
            "Threshold[h=1 | 1,0]"
        );
    }

    #[test]
    fn test_heralded_photon_in_first_bin() -> WalkResult<()> {
        let (state, detectors) = setup();
        let r: f64 = 0.5;
        let p = detectors.evaluate(&state, DetectionMode::Fock, &OutcomePattern::fock(vec![1, 0]))?;
        assert!((p - r.tanh().powi(2) / r.cosh().powi(2)).abs() < 1e-10);
        let h = detectors.herald_probability(&state, DetectionMode::Fock)?;
        assert!((h - p).abs() < 1e-10);
        Ok(())
    }

    #[test]
    fn test_mismatched_patterns_rejected() {
        let (state, detectors) = setup();
        let short = OutcomePattern::fock(vec![1]);
        let err = detectors.evaluate(&state, DetectionMode::Fock, &short).unwrap_err();
        assert!(matches!(&err, WalkError::Evaluation { pattern, .. } if pattern == "Fock[h=1 | 1]"));

        let wrong_kind = OutcomePattern::threshold(vec![true, false]);
        assert!(matches!(
            detectors.evaluate(&state, DetectionMode::Fock, &wrong_kind),
            Err(WalkError::Evaluation { .. })
        ));

        let too_many = OutcomePattern::fock(vec![3, 0]);
        assert!(matches!(
            detectors.evaluate(&state, DetectionMode::Fock, &too_many),
            Err(WalkError::Evaluation { .. })
        ));
    }

    #[test]
    fn test_select_time_bins() {
        let assignment = ModeAssignment::new(2, 0, DEFAULT_MAX_MODES).unwrap();
        let layout = DetectorLayout::new(&assignment);
        let detectors = DetectorSet::select(&layout, &[2, 1]).unwrap();
        assert_eq!(detectors.detectors(), &[vec![3], vec![2]]);
        assert_eq!(detectors.time_bins(), &[2, 1]);
        assert!(DetectorSet::select(&layout, &[1, 1]).is_err());
        assert!(DetectorSet::select(&layout, &[3]).is_err());
    }

    #[test]
    fn test_detector_adds_light_of_its_modes() -> WalkResult<()> {
        // Bin 1 reads modes 2 and 3; their coherent light adds up without
        // interfering, whatever the relative phase.
        let assignment = ModeAssignment::new(1, 1, DEFAULT_MAX_MODES)?;
        let mut layout = DetectorLayout::new(&assignment);
        layout.attach(2, 3)?;
        let detectors = DetectorSet::all_time_bins(&layout);
        let mean: f64 = 0.2 + 0.3;

        for phase in [0.0, std::f64::consts::FRAC_PI_2, std::f64::consts::PI] {
            let mut state = GaussianState::vacuum(4, 3, DEFAULT_MAX_MODES)?;
            state.prepare_two_mode_squeezed(0, 1, 0.4, 0.0)?;
            state.prepare_coherent(2, Complex::from_polar(0.2f64.sqrt(), 0.0))?;
            state.prepare_coherent(3, Complex::from_polar(0.3f64.sqrt(), phase))?;

            let herald = detectors.herald_probability(&state, DetectionMode::Fock)?;
            for n in 0..=2usize {
                let pattern = OutcomePattern::fock(vec![1, n]);
                let p = detectors.evaluate(&state, DetectionMode::Fock, &pattern)?;
                let poisson = (-mean).exp() * mean.powi(n as i32) / (1..=n).product::<usize>() as f64;
                assert!((p - herald * poisson).abs() < 1e-10);
            }
            let dark = detectors.evaluate(
                &state,
                DetectionMode::Threshold,
                &OutcomePattern::threshold(vec![true, false]),
            )?;
            let p_click = detectors.evaluate(
                &state,
                DetectionMode::Threshold,
                &OutcomePattern::threshold(vec![true, true]),
            )?;
            assert!((p_click - dark * ((mean).exp() - 1.0)).abs() < 1e-10);
        }
        Ok(())
    }
}
