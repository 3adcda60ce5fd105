// src/simulation/results.rs

use super::detection::{DetectorSet, OutcomePattern};
use super::engine::GaussianState;
use super::backend::PhotonicBackend;
use super::table::{ProbabilityTable, fock_outcomes};
use crate::core::{DetectionMode, DetectorLayout, ModeAssignment, TimeBin, WalkError, WalkResult};
use std::fmt;
use tracing::{debug, instrument};

/// The evolved state of one walk, ready for detection queries.
///
/// Immutable: every query reads the same final state, so patterns can be
/// evaluated in any order and from several threads.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    state: GaussianState,
    assignment: ModeAssignment,
    layout: DetectorLayout,
    detection_mode: DetectionMode,
    detectors: DetectorSet,
}

impl SimulationResult {
    pub(crate) fn new(
        state: GaussianState,
        assignment: ModeAssignment,
        layout: DetectorLayout,
        detection_mode: DetectionMode,
    ) -> Self {
        let detectors = DetectorSet::all_time_bins(&layout);
        Self { state, assignment, layout, detection_mode, detectors }
    }

    /// Restricts detection to `time_bins`, in the given order. Patterns
    /// evaluated on the returned result list those bins only.
    ///
    /// # Errors
    /// `WalkError::Config` for an unknown or repeated time bin.
    pub fn with_monitored_time_bins(&self, time_bins: &[TimeBin]) -> WalkResult<Self> {
        Ok(Self {
            detectors: DetectorSet::select(&self.layout, time_bins)?,
            ..self.clone()
        })
    }

    pub fn state(&self) -> &GaussianState {
        &self.state
    }

    pub fn assignment(&self) -> &ModeAssignment {
        &self.assignment
    }

    pub fn detection_mode(&self) -> DetectionMode {
        self.detection_mode
    }

    pub fn monitored_time_bins(&self) -> &[TimeBin] {
        self.detectors.time_bins()
    }

    /// Backend modes read by each monitored time-bin detector.
    pub fn monitored_modes(&self) -> &[Vec<usize>] {
        self.detectors.detectors()
    }

    /// Modes read by every detector of the walk.
    pub fn detector_layout(&self) -> &DetectorLayout {
        &self.layout
    }

    /// Probability of `pattern`, a value in [0, 1].
    ///
    /// # Errors
    /// `WalkError::Evaluation` for a pattern of the wrong length or kind, or
    /// a Fock count above the cutoff. `WalkError::Backend` for numerical
    /// failures.
    pub fn probability(&self, pattern: &OutcomePattern) -> WalkResult<f64> {
        self.detectors.evaluate(&self.state, self.detection_mode, pattern)
    }

    /// Evaluates each pattern lazily and independently.
    pub fn probabilities<'a, I>(&'a self, patterns: I) -> impl Iterator<Item = WalkResult<f64>> + 'a
    where
        I: IntoIterator<Item = OutcomePattern>,
        I::IntoIter: 'a,
    {
        patterns.into_iter().map(move |pattern| self.probability(&pattern))
    }

    /// Probability that the herald fires: one photon for Fock detection, a
    /// click for threshold detection.
    pub fn herald_probability(&self) -> WalkResult<f64> {
        self.detectors.herald_probability(&self.state, self.detection_mode)
    }

    /// Heralded (herald = 1) Fock probabilities of every outcome on the
    /// monitored bins with at most `max_photons` photons in total.
    ///
    /// # Errors
    /// `WalkError::Evaluation` if `max_photons` exceeds the cutoff.
    #[instrument(skip(self), fields(bins = self.detectors.detectors().len()))]
    pub fn fock_table(&self, max_photons: usize) -> WalkResult<ProbabilityTable> {
        if max_photons > self.state.cutoff() {
            return Err(WalkError::evaluation(
                format!("≤{} photons", max_photons),
                format!("exceeds cutoff {}", self.state.cutoff()),
            ));
        }
        let mut table = ProbabilityTable::new();
        for outcome in fock_outcomes(self.detectors.detectors().len(), max_photons) {
            let pattern = OutcomePattern::fock(outcome.clone());
            let p = self.detectors.evaluate(&self.state, DetectionMode::Fock, &pattern)?;
            table.insert(outcome, p);
        }
        debug!(entries = table.len(), total = table.total(), "fock table computed");
        Ok(table)
    }

    /// Probabilities of all `2^m` click patterns on the monitored bins, each
    /// with a herald click. Clicks are encoded as 1.
    #[instrument(skip(self), fields(bins = self.detectors.detectors().len()))]
    pub fn threshold_table(&self) -> WalkResult<ProbabilityTable> {
        let bins = self.detectors.detectors().len();
        if bins >= usize::BITS as usize {
            return Err(WalkError::backend(format!("Too many monitored bins ({})", bins)));
        }
        let mut table = ProbabilityTable::new();
        for bits in 0usize..(1usize << bins) {
            let clicks: Vec<bool> = (0..bins).map(|i| (bits >> (bins - 1 - i)) & 1 == 1).collect();
            let outcome = clicks.iter().map(|&c| usize::from(c)).collect();
            let pattern = OutcomePattern::threshold(clicks);
            let p = self.detectors.evaluate(&self.state, DetectionMode::Threshold, &pattern)?;
            table.insert(outcome, p);
        }
        debug!(entries = table.len(), total = table.total(), "threshold table computed");
        Ok(table)
    }
}

impl fmt::Display for SimulationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Simulation Result: {} steps, {:?} detection",
            self.assignment.steps(),
            self.detection_mode
        )?;
        let bins: Vec<String> = self.monitored_time_bins().iter().map(|tb| format!("t{}", tb)).collect();
        writeln!(f, "  Monitored: H, {}", bins.join(", "))?;
        for mode in 0..self.state.num_modes() {
            if let Ok(n) = self.state.mean_photon_number(mode) {
                writeln!(f, "  mode {}: ⟨n⟩ = {:.6e}", mode, n)?;
            }
        }
        Ok(())
    }
}
