// src/core/modes.rs

//! Mode bookkeeping: which backend mode carries which time bin.

use super::error::{WalkError, WalkResult};
use std::fmt;
use std::ops::Range;

/// A discrete temporal slot. Bin 0 exists before the first crystal and
/// crystal `k` makes bin `k` reachable.
pub type TimeBin = usize;

/// What a backend mode is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    /// The idler arm of the pair source. Only detected, never walked.
    Herald,
    /// One time bin of the walking photon.
    Signal,
    /// Auxiliary light: the mismatch lane and dark-count sources.
    Noise,
}

/// A (role, index) pair. `index` is the time bin for signal modes, the
/// noise slot for noise modes and always 0 for the herald.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModeKey {
    pub role: Role,
    pub index: usize,
}

impl ModeKey {
    pub fn herald() -> Self {
        Self { role: Role::Herald, index: 0 }
    }

    pub fn signal(time_bin: TimeBin) -> Self {
        Self { role: Role::Signal, index: time_bin }
    }

    pub fn noise(slot: usize) -> Self {
        Self { role: Role::Noise, index: slot }
    }
}

impl fmt::Display for ModeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.role {
            Role::Herald => write!(f, "H"),
            Role::Signal => write!(f, "t{}", self.index),
            Role::Noise => write!(f, "n{}", self.index),
        }
    }
}

/// Deterministic mapping from [`ModeKey`] to the contiguous backend range
/// `[0, total_modes)`.
///
/// Layout: herald → 0, signal bin `k` → `1 + k`, noise slot `j` →
/// `steps + 2 + j`. The mapping is a bijection by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeAssignment {
    steps: usize,
    noise_modes: usize,
}

impl ModeAssignment {
    /// Lays out the modes for a walk of `steps` crystals plus `noise_modes`
    /// auxiliary modes.
    ///
    /// # Errors
    /// `WalkError::Config` if `steps == 0` or the layout needs more than
    /// `max_modes` modes.
    pub fn new(steps: usize, noise_modes: usize, max_modes: usize) -> WalkResult<Self> {
        if steps < 1 {
            return Err(WalkError::config(format!(
                "A walk needs at least one step, got {}",
                steps
            )));
        }
        let total = steps
            .checked_add(2)
            .and_then(|n| n.checked_add(noise_modes))
            .ok_or_else(|| WalkError::config("Mode count overflows usize"))?;
        if total > max_modes {
            return Err(WalkError::config(format!(
                "Walk needs {} modes but the backend supports at most {}",
                total, max_modes
            )));
        }
        Ok(Self { steps, noise_modes })
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Number of time bins, `steps + 1`.
    pub fn signal_modes(&self) -> usize {
        self.steps + 1
    }

    pub fn noise_modes(&self) -> usize {
        self.noise_modes
    }

    pub fn total_modes(&self) -> usize {
        self.steps + 2 + self.noise_modes
    }

    pub fn herald(&self) -> usize {
        0
    }

    /// Backend mode of time bin `time_bin`.
    pub fn signal(&self, time_bin: TimeBin) -> WalkResult<usize> {
        if time_bin > self.steps {
            return Err(WalkError::config(format!(
                "Time bin {} does not exist in a {}-step walk",
                time_bin, self.steps
            )));
        }
        Ok(1 + time_bin)
    }

    /// Backend mode of noise slot `slot`.
    pub fn noise(&self, slot: usize) -> WalkResult<usize> {
        if slot >= self.noise_modes {
            return Err(WalkError::config(format!(
                "Noise slot {} out of range ({} noise modes)",
                slot, self.noise_modes
            )));
        }
        Ok(self.steps + 2 + slot)
    }

    pub fn mode(&self, key: ModeKey) -> WalkResult<usize> {
        match key.role {
            Role::Herald if key.index == 0 => Ok(self.herald()),
            Role::Herald => Err(WalkError::config(format!(
                "There is a single herald mode, got herald index {}",
                key.index
            ))),
            Role::Signal => self.signal(key.index),
            Role::Noise => self.noise(key.index),
        }
    }

    /// Inverse lookup of [`ModeAssignment::mode`].
    pub fn key_of(&self, mode: usize) -> WalkResult<ModeKey> {
        let signal_end = 2 + self.steps;
        match mode {
            0 => Ok(ModeKey::herald()),
            m if m < signal_end => Ok(ModeKey::signal(m - 1)),
            m if m < self.total_modes() => Ok(ModeKey::noise(m - signal_end)),
            m => Err(WalkError::config(format!(
                "Mode {} out of range ({} modes)",
                m,
                self.total_modes()
            ))),
        }
    }

    /// Backend modes of all time bins, in time-bin order.
    pub fn signal_range(&self) -> Range<usize> {
        1..self.steps + 2
    }

    /// Modes that end at a detector: the herald followed by every time bin.
    pub fn detected_modes(&self) -> Vec<usize> {
        std::iter::once(self.herald()).chain(self.signal_range()).collect()
    }

    /// The time-bin ladder of the signal itself.
    pub fn signal_lane(&self) -> WalkLane {
        WalkLane { index: 0, modes: self.signal_range().collect() }
    }

    /// A ladder of `steps + 1` noise modes starting at noise slot
    /// `first_slot`, walked alongside the signal but never interfering with it.
    pub fn noise_lane(&self, index: usize, first_slot: usize) -> WalkResult<WalkLane> {
        let modes = (first_slot..first_slot + self.signal_modes())
            .map(|slot| self.noise(slot))
            .collect::<WalkResult<Vec<_>>>()?;
        Ok(WalkLane { index, modes })
    }

    /// All keys in backend-mode order.
    pub fn keys(&self) -> impl Iterator<Item = ModeKey> + '_ {
        std::iter::once(ModeKey::herald())
            .chain((0..=self.steps).map(ModeKey::signal))
            .chain((0..self.noise_modes).map(ModeKey::noise))
    }
}

/// One copy of the time-bin ladder that the crystals act on.
///
/// Lane 0 carries the signal. Further lanes carry light in an orthogonal
/// spectral-temporal mode: it walks through the same crystals and reaches the
/// same detectors, but never interferes with lane 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkLane {
    index: usize,
    modes: Vec<usize>,
}

impl WalkLane {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of crystals the ladder is long enough for.
    pub fn steps(&self) -> usize {
        self.modes.len().saturating_sub(1)
    }

    pub fn modes(&self) -> &[usize] {
        &self.modes
    }

    /// Backend mode of `time_bin` in this lane.
    pub fn mode(&self, time_bin: TimeBin) -> WalkResult<usize> {
        self.modes.get(time_bin).copied().ok_or_else(|| {
            WalkError::config(format!(
                "Time bin {} does not exist in lane {} of {} bins",
                time_bin,
                self.index,
                self.modes.len()
            ))
        })
    }
}

/// The modes each detector reads.
///
/// A detector counts the photons of all its modes together, so light in
/// different modes reaches it without interfering. Every mode belongs to at
/// most one detector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectorLayout {
    herald: Vec<usize>,
    time_bins: Vec<Vec<usize>>,
}

impl DetectorLayout {
    /// A single-mode detector on the herald and on every time bin.
    pub fn new(assignment: &ModeAssignment) -> Self {
        Self {
            herald: vec![assignment.herald()],
            time_bins: assignment.signal_range().map(|mode| vec![mode]).collect(),
        }
    }

    /// Adds `extra` to the detector that already reads `mode`.
    ///
    /// # Errors
    /// `WalkError::Config` if no detector reads `mode`, or `extra` already
    /// belongs to another detector.
    pub fn attach(&mut self, mode: usize, extra: usize) -> WalkResult<()> {
        if let Some(owner) = self.detector_of(extra) {
            if Some(owner) == self.detector_of(mode) {
                return Ok(());
            }
            return Err(WalkError::config(format!("Mode {} is already read by another detector", extra)));
        }
        let index = self
            .detector_of(mode)
            .ok_or_else(|| WalkError::config(format!("Mode {} does not reach a detector", mode)))?;
        match index {
            Detector::Herald => self.herald.push(extra),
            Detector::TimeBin(tb) => self.time_bins[tb].push(extra),
        }
        Ok(())
    }

    /// Attaches every mode of `lane` to the detector of the same time bin.
    pub fn attach_lane(&mut self, lane: &WalkLane) -> WalkResult<()> {
        if lane.modes().len() != self.time_bins.len() {
            return Err(WalkError::config(format!(
                "Lane {} has {} time bins, the detectors expect {}",
                lane.index(),
                lane.modes().len(),
                self.time_bins.len()
            )));
        }
        for (tb, &mode) in lane.modes().iter().enumerate() {
            let primary = self.time_bins[tb][0];
            self.attach(primary, mode)?;
        }
        Ok(())
    }

    pub fn herald(&self) -> &[usize] {
        &self.herald
    }

    pub fn num_time_bins(&self) -> usize {
        self.time_bins.len()
    }

    /// Modes of every time-bin detector, in time-bin order.
    pub fn time_bins(&self) -> &[Vec<usize>] {
        &self.time_bins
    }

    /// Modes read by the detector of `time_bin`.
    pub fn time_bin(&self, time_bin: TimeBin) -> WalkResult<&[usize]> {
        self.time_bins.get(time_bin).map(Vec::as_slice).ok_or_else(|| {
            WalkError::config(format!(
                "Time bin {} does not exist ({} time bins)",
                time_bin,
                self.time_bins.len()
            ))
        })
    }

    fn detector_of(&self, mode: usize) -> Option<Detector> {
        if self.herald.contains(&mode) {
            return Some(Detector::Herald);
        }
        self.time_bins.iter().position(|modes| modes.contains(&mode)).map(Detector::TimeBin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Detector {
    Herald,
    TimeBin(TimeBin),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DEFAULT_MAX_MODES;

    #[test]
    fn test_layout_without_noise() -> WalkResult<()> {
        let modes = ModeAssignment::new(3, 0, DEFAULT_MAX_MODES)?;
        assert_eq!(modes.total_modes(), 5);
        assert_eq!(modes.herald(), 0);
        assert_eq!(modes.signal(0)?, 1);
        assert_eq!(modes.signal(3)?, 4);
        assert!(modes.signal(4).is_err());
        assert!(modes.noise(0).is_err());
        Ok(())
    }

    #[test]
    fn test_noise_modes_follow_signal_modes() -> WalkResult<()> {
        let modes = ModeAssignment::new(2, 3, DEFAULT_MAX_MODES)?;
        assert_eq!(modes.total_modes(), 7);
        assert_eq!(modes.noise(0)?, 4);
        assert_eq!(modes.noise(2)?, 6);
        assert_eq!(modes.key_of(5)?, ModeKey::noise(1));
        assert_eq!(modes.key_of(3)?, ModeKey::signal(2));
        assert!(modes.key_of(7).is_err());
        Ok(())
    }

    #[test]
    fn test_keys_round_trip() -> WalkResult<()> {
        let modes = ModeAssignment::new(4, 2, DEFAULT_MAX_MODES)?;
        for (expected_mode, key) in modes.keys().enumerate() {
            assert_eq!(modes.mode(key)?, expected_mode);
            assert_eq!(modes.key_of(expected_mode)?, key);
        }
        assert_eq!(modes.keys().count(), modes.total_modes());
        Ok(())
    }

    #[test]
    fn test_rejects_zero_steps_and_mode_limit() {
        assert!(matches!(
            ModeAssignment::new(0, 0, DEFAULT_MAX_MODES),
            Err(WalkError::Config { .. })
        ));
        assert!(matches!(ModeAssignment::new(5, 0, 6), Err(WalkError::Config { .. })));
        assert!(ModeAssignment::new(4, 0, 6).is_ok());
        assert!(ModeAssignment::new(usize::MAX, 0, usize::MAX).is_err());
    }

    #[test]
    fn test_only_one_herald() {
        let modes = ModeAssignment::new(1, 0, DEFAULT_MAX_MODES).unwrap();
        assert!(modes.mode(ModeKey { role: Role::Herald, index: 1 }).is_err());
        assert_eq!(modes.detected_modes(), vec![0, 1, 2]);
    }

    #[test]
    fn test_noise_lane_follows_signal_layout() -> WalkResult<()> {
        let modes = ModeAssignment::new(2, 4, DEFAULT_MAX_MODES)?;
        assert_eq!(modes.signal_lane().modes(), &[1, 2, 3]);
        let lane = modes.noise_lane(1, 0)?;
        assert_eq!(lane.modes(), &[4, 5, 6]);
        assert_eq!(lane.steps(), 2);
        assert_eq!(lane.mode(2)?, 6);
        assert!(lane.mode(3).is_err());
        assert!(modes.noise_lane(1, 2).is_err());
        Ok(())
    }

    #[test]
    fn test_detector_layout_groups_modes() -> WalkResult<()> {
        let modes = ModeAssignment::new(1, 4, DEFAULT_MAX_MODES)?;
        let mut detectors = DetectorLayout::new(&modes);
        assert_eq!(detectors.herald(), &[0]);
        assert_eq!(detectors.time_bin(1)?, &[2]);

        detectors.attach_lane(&modes.noise_lane(1, 0)?)?;
        detectors.attach(0, 5)?;
        detectors.attach(3, 6)?;
        assert_eq!(detectors.herald(), &[0, 5]);
        assert_eq!(detectors.time_bin(0)?, &[1, 3, 6]);
        assert_eq!(detectors.time_bin(1)?, &[2, 4]);

        // Re-attaching to the same detector is a no-op, stealing is not allowed.
        detectors.attach(1, 6)?;
        assert!(detectors.attach(2, 6).is_err());
        assert!(detectors.attach(7, 8).is_err());
        assert!(detectors.time_bin(2).is_err());
        Ok(())
    }
}
