// src/noise/mod.rs

//! Experimental imperfections expressed as circuit elements.
//!
//! Mismatch acts on the input, before the coherent seed and the crystals.
//! Loss and dark counts act after the last walk operation. Dark-count light
//! sits in its own mode, so it never interferes with the walk. Mismatch and dark counts each need auxiliary modes; [`NoiseLayout`]
//! decides how many before the mode assignment is built.

use crate::core::{
    DARK_COUNT_TAP, ModeAssignment, Role, WalkConfig, WalkError, WalkLane, WalkResult,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The imperfection an element models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseKind {
    /// Beam splitter to vacuum, i.e. a loss channel.
    Loss,
    /// Coupler that moves part of the heralded light into a mode the seed
    /// cannot interfere with. The detector still sees that light.
    Mismatch,
    /// Weak independent light read by a detector alongside its mode.
    DarkCount,
}

/// Where in the circuit a noise element acts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NoiseStage {
    /// After the pair source, before the coherent seed and the crystals.
    Input,
    /// After the last crystal, in front of the detectors.
    Detector,
}

impl NoiseKind {
    pub fn stage(self) -> NoiseStage {
        match self {
            NoiseKind::Mismatch => NoiseStage::Input,
            NoiseKind::Loss | NoiseKind::DarkCount => NoiseStage::Detector,
        }
    }

    /// Application order: mismatch, then loss, then dark counts at the detector.
    pub(crate) fn rank(self) -> u8 {
        match self {
            NoiseKind::Mismatch => 0,
            NoiseKind::Loss => 1,
            NoiseKind::DarkCount => 2,
        }
    }
}

/// One noise element attached to a built circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseElement {
    pub kind: NoiseKind,
    /// The mode that is degraded.
    pub target_mode: usize,
    /// Lost fraction (Loss), coupler reflectivity (Mismatch) or mean
    /// photon number reaching the detector (DarkCount).
    pub parameter: f64,
    /// Mismatched mode or dark-count source. The detector of `target_mode`
    /// also reads it.
    pub auxiliary_mode: Option<usize>,
}

impl NoiseElement {
    /// A loss channel that removes `loss` of the light in `mode`.
    pub fn loss(mode: usize, loss: f64) -> Self {
        Self { kind: NoiseKind::Loss, target_mode: mode, parameter: loss, auxiliary_mode: None }
    }

    /// Moves a fraction `reflectivity` of the light in `mode` into `twin`.
    pub fn mismatch(mode: usize, twin: usize, reflectivity: f64) -> Self {
        Self {
            kind: NoiseKind::Mismatch,
            target_mode: mode,
            parameter: reflectivity,
            auxiliary_mode: Some(twin),
        }
    }

    pub fn dark_count(mode: usize, source: usize, rate: f64) -> Self {
        Self {
            kind: NoiseKind::DarkCount,
            target_mode: mode,
            parameter: rate,
            auxiliary_mode: Some(source),
        }
    }

    /// Transmission of a loss channel, `1 - loss`.
    pub fn transmission(&self) -> f64 {
        1.0 - self.parameter
    }

    /// Checks the element against a mode layout.
    pub fn validate(&self, assignment: &ModeAssignment) -> WalkResult<()> {
        let total = assignment.total_modes();
        if self.target_mode >= total {
            return Err(WalkError::config(format!(
                "{} targets mode {} but the walk has {} modes",
                self, self.target_mode, total
            )));
        }
        match self.kind {
            NoiseKind::Loss | NoiseKind::Mismatch => {
                if !(0.0..=1.0).contains(&self.parameter) {
                    return Err(WalkError::config(format!("{} parameter must lie in [0, 1]", self)));
                }
            }
            NoiseKind::DarkCount => {
                if !self.parameter.is_finite() || self.parameter < 0.0 {
                    return Err(WalkError::config(format!("{} rate must be non-negative", self)));
                }
            }
        }
        match (self.kind, self.auxiliary_mode) {
            (NoiseKind::Loss, None) => Ok(()),
            (NoiseKind::Loss, Some(_)) => {
                Err(WalkError::config(format!("{} must not name an auxiliary mode", self)))
            }
            (_, None) => Err(WalkError::config(format!("{} needs an auxiliary mode", self))),
            (_, Some(aux)) => {
                if aux == self.target_mode || assignment.key_of(aux)?.role != Role::Noise {
                    return Err(WalkError::config(format!(
                        "{} auxiliary mode {} is not a noise mode",
                        self, aux
                    )));
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for NoiseElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind, self.auxiliary_mode) {
            (NoiseKind::Loss, _) => write!(f, "Loss({:.4}) | {}", self.parameter, self.target_mode),
            (NoiseKind::Mismatch, Some(aux)) => {
                write!(f, "Mismatch({:.4}) | ({}, {})", self.parameter, self.target_mode, aux)
            }
            (NoiseKind::DarkCount, Some(aux)) => {
                write!(f, "DarkCount({:.2e}) | ({}, {})", self.parameter, aux, self.target_mode)
            }
            (kind, None) => write!(f, "{:?}({}) | {}", kind, self.parameter, self.target_mode),
        }
    }
}

/// How many auxiliary modes each noise kind needs.
///
/// Mismatch gets a full lane, one twin mode per time bin, so the mismatched
/// light walks through the crystals too. Dark counts get one source per
/// detector (herald included). Mismatch slots come first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NoiseLayout {
    pub mismatch_slots: usize,
    pub dark_count_slots: usize,
}

impl NoiseLayout {
    pub fn for_config(config: &WalkConfig) -> Self {
        let signal_modes = config.steps + 1;
        Self {
            mismatch_slots: if config.mode_mismatch > 0.0 { signal_modes } else { 0 },
            dark_count_slots: if config.dark_count_rate > 0.0 { signal_modes + 1 } else { 0 },
        }
    }

    pub fn total(&self) -> usize {
        self.mismatch_slots + self.dark_count_slots
    }

    /// The lane carrying mismatched light, if mismatch is enabled.
    pub fn mismatch_lane(&self, assignment: &ModeAssignment) -> WalkResult<Option<WalkLane>> {
        if self.mismatch_slots == 0 {
            return Ok(None);
        }
        if self.mismatch_slots != assignment.signal_modes() {
            return Err(WalkError::config(format!(
                "Mismatch lane needs {} modes, {} reserved",
                assignment.signal_modes(),
                self.mismatch_slots
            )));
        }
        assignment.noise_lane(1, 0).map(Some)
    }

    /// Noise slot feeding the `detector`-th detected mode.
    pub fn dark_count_slot(&self, detector: usize) -> Option<usize> {
        (detector < self.dark_count_slots).then_some(self.mismatch_slots + detector)
    }
}

/// Mean photon number a dark-count source needs so that, after its weak
/// tap, the detector sees `rate` photons on average.
pub fn dark_count_source_photons(rate: f64) -> f64 {
    rate / DARK_COUNT_TAP
}

/// Derives every noise element requested by `config`. Elements whose
/// parameter is zero are skipped.
pub fn inject_noise(
    config: &WalkConfig,
    assignment: &ModeAssignment,
    layout: &NoiseLayout,
) -> WalkResult<Vec<NoiseElement>> {
    let mut elements = Vec::new();
    let lane = layout.mismatch_lane(assignment)?;

    if let Some(lane) = &lane {
        elements.push(NoiseElement::mismatch(
            assignment.signal(0)?,
            lane.mode(0)?,
            config.mode_mismatch,
        ));
    }

    let loss = config.effective_loss();
    if loss > 0.0 {
        let lane_modes = lane.iter().flat_map(|lane| lane.modes().iter().copied());
        for mode in assignment.detected_modes().into_iter().chain(lane_modes) {
            elements.push(NoiseElement::loss(mode, loss));
        }
    }

    if config.dark_count_rate > 0.0 {
        for (detector, mode) in assignment.detected_modes().into_iter().enumerate() {
            let slot = layout.dark_count_slot(detector).ok_or_else(|| {
                WalkError::config(format!("No dark-count source reserved for mode {}", mode))
            })?;
            elements.push(NoiseElement::dark_count(
                mode,
                assignment.noise(slot)?,
                config.dark_count_rate,
            ));
        }
    }

    for element in &elements {
        element.validate(assignment)?;
    }
    Ok(elements)
}
