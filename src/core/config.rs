//! Walk configuration: the single immutable description of a simulation request.

use super::error::{WalkError, WalkResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How detectors report light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMode {
    /// Photon-number-resolving detection.
    #[default]
    Fock,
    /// Click/no-click detection; any photon number ≥ 1 is a click.
    Threshold,
}

/// Optic axis of a birefringent crystal relative to the {H, V} basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrystalOrientation {
    /// H passes, V is delayed into the next time bin.
    ZeroDeg,
    /// D passes, A is delayed; the crystal also rotates the basis.
    #[default]
    FortyFiveDeg,
}

impl CrystalOrientation {
    /// The orientation of the other crystal in an alternating cascade.
    pub fn alternate(self) -> Self {
        match self {
            CrystalOrientation::ZeroDeg => CrystalOrientation::FortyFiveDeg,
            CrystalOrientation::FortyFiveDeg => CrystalOrientation::ZeroDeg,
        }
    }
}

impl fmt::Display for CrystalOrientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrystalOrientation::ZeroDeg => write!(f, "0°"),
            CrystalOrientation::FortyFiveDeg => write!(f, "45°"),
        }
    }
}

/// The light that emulates detector dark counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DarkCountSource {
    /// Phase-insensitive thermal light.
    #[default]
    Thermal,
    /// A weak laser with a fixed phase.
    Coherent,
}

/// Parameters of one walk simulation.
///
/// Built once per request and never mutated by the simulator. Every field has
/// a default, so a JSON document only needs the fields it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkConfig {
    /// Number of crystals in the cascade (≥ 1).
    pub steps: usize,
    /// Whether `loss` is applied before the detectors.
    pub include_loss: bool,
    /// Fraction of light lost before each detector, in [0, 1].
    pub loss: f64,
    /// Fraction of the heralded light that cannot interfere with the
    /// coherent seed, in [0, 1]. It still walks and is still detected.
    pub mode_mismatch: f64,
    /// Mean dark-count photon number per detector and pulse (≥ 0).
    pub dark_count_rate: f64,
    /// Photon-number-resolving or click detection.
    pub detection_mode: DetectionMode,
    /// Two-mode squeezing magnitude `r` of the heralded source (≥ 0).
    pub squeezing: f64,
    /// Two-mode squeezing phase in radians.
    pub squeezing_phase: f64,
    /// Amplitude |α| of the coherent seed injected at time bin 0.
    pub coherent_amplitude: f64,
    /// Phase of the coherent seed in radians.
    pub coherent_phase: f64,
    /// Phase picked up by the delayed component in each crystal.
    pub group_delay_phase: f64,
    /// Crystal orientation at odd steps (45° unless set); even steps use the
    /// other one.
    pub first_orientation: CrystalOrientation,
    /// Transmission of the heralded photon before the walk, in [0, 1].
    /// Zero removes the heralded photon while keeping the herald detector.
    pub heralded_transmission: f64,
    /// The kind of light that emulates dark counts.
    pub dark_count_source: DarkCountSource,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            steps: 1,
            include_loss: false,
            loss: 0.0,
            mode_mismatch: 0.0,
            dark_count_rate: 0.0,
            detection_mode: DetectionMode::Fock,
            squeezing: 0.1,
            squeezing_phase: 0.0,
            coherent_amplitude: 0.0,
            coherent_phase: 0.0,
            group_delay_phase: 0.0,
            first_orientation: CrystalOrientation::FortyFiveDeg,
            heralded_transmission: 1.0,
            dark_count_source: DarkCountSource::Thermal,
        }
    }
}

impl WalkConfig {
    /// Creates a noiseless Fock-detection configuration for `steps` crystals.
    pub fn new(steps: usize) -> Self {
        Self { steps, ..Self::default() }
    }

    /// Parses a JSON document and validates the result.
    pub fn from_json(json: &str) -> WalkResult<Self> {
        let config: WalkConfig = serde_json::from_str(json)
            .map_err(|e| WalkError::config(format!("Invalid walk configuration JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Enables loss with the given lost fraction.
    pub fn with_loss(mut self, loss: f64) -> Self {
        self.include_loss = true;
        self.loss = loss;
        self
    }

    pub fn with_mode_mismatch(mut self, mode_mismatch: f64) -> Self {
        self.mode_mismatch = mode_mismatch;
        self
    }

    pub fn with_dark_counts(mut self, rate: f64) -> Self {
        self.dark_count_rate = rate;
        self
    }

    pub fn with_dark_count_source(mut self, source: DarkCountSource) -> Self {
        self.dark_count_source = source;
        self
    }

    pub fn with_detection(mut self, mode: DetectionMode) -> Self {
        self.detection_mode = mode;
        self
    }

    pub fn with_squeezing(mut self, r: f64) -> Self {
        self.squeezing = r;
        self
    }

    pub fn with_squeezing_phase(mut self, phase: f64) -> Self {
        self.squeezing_phase = phase;
        self
    }

    /// Seeds time bin 0 with a coherent state of amplitude `amplitude·e^(i·phase)`.
    pub fn with_coherent(mut self, amplitude: f64, phase: f64) -> Self {
        self.coherent_amplitude = amplitude;
        self.coherent_phase = phase;
        self
    }

    pub fn with_group_delay_phase(mut self, phase: f64) -> Self {
        self.group_delay_phase = phase;
        self
    }

    pub fn with_first_orientation(mut self, orientation: CrystalOrientation) -> Self {
        self.first_orientation = orientation;
        self
    }

    pub fn with_heralded_transmission(mut self, transmission: f64) -> Self {
        self.heralded_transmission = transmission;
        self
    }

    /// The lost fraction actually applied, zero when loss is disabled.
    pub fn effective_loss(&self) -> f64 {
        if self.include_loss { self.loss } else { 0.0 }
    }

    /// Orientation of the crystal at 1-indexed `step`.
    pub fn orientation_for_step(&self, step: usize) -> CrystalOrientation {
        if step % 2 == 1 {
            self.first_orientation
        } else {
            self.first_orientation.alternate()
        }
    }

    /// Checks every invariant; fails fast with `WalkError::Config`.
    pub fn validate(&self) -> WalkResult<()> {
        if self.steps < 1 {
            return Err(WalkError::config(format!(
                "A walk needs at least one step, got {}",
                self.steps
            )));
        }
        check_unit_interval("loss", self.loss)?;
        check_unit_interval("mode_mismatch", self.mode_mismatch)?;
        check_unit_interval("heralded_transmission", self.heralded_transmission)?;
        check_non_negative("dark_count_rate", self.dark_count_rate)?;
        check_non_negative("squeezing", self.squeezing)?;
        check_non_negative("coherent_amplitude", self.coherent_amplitude)?;
        for (name, phase) in [
            ("squeezing_phase", self.squeezing_phase),
            ("coherent_phase", self.coherent_phase),
            ("group_delay_phase", self.group_delay_phase),
        ] {
            if !phase.is_finite() {
                return Err(WalkError::config(format!("{} must be finite, got {}", name, phase)));
            }
        }
        Ok(())
    }
}

fn check_unit_interval(name: &str, value: f64) -> WalkResult<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(WalkError::config(format!("{} must lie in [0, 1], got {}", name, value)));
    }
    Ok(())
}

fn check_non_negative(name: &str, value: f64) -> WalkResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(WalkError::config(format!(
            "{} must be finite and non-negative, got {}",
            name, value
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_steps_rejected() {
        let err = WalkConfig::new(0).validate().unwrap_err();
        assert!(matches!(err, WalkError::Config { .. }));
    }

    #[test]
    fn test_out_of_range_parameters_rejected() {
        assert!(WalkConfig::new(2).with_loss(1.5).validate().is_err());
        assert!(WalkConfig::new(2).with_mode_mismatch(-0.1).validate().is_err());
        assert!(WalkConfig::new(2).with_dark_counts(-1e-6).validate().is_err());
        assert!(WalkConfig::new(2).with_squeezing(-0.5).validate().is_err());
        assert!(WalkConfig::new(2).with_squeezing(f64::NAN).validate().is_err());
        assert!(WalkConfig::new(2).with_heralded_transmission(2.0).validate().is_err());
        assert!(WalkConfig::new(2).with_group_delay_phase(f64::INFINITY).validate().is_err());
    }

    #[test]
    fn test_orientation_alternates() {
        let config = WalkConfig::new(4);
        assert_eq!(config.orientation_for_step(1), CrystalOrientation::FortyFiveDeg);
        assert_eq!(config.orientation_for_step(2), CrystalOrientation::ZeroDeg);
        assert_eq!(config.orientation_for_step(3), CrystalOrientation::FortyFiveDeg);

        let flipped = config.with_first_orientation(CrystalOrientation::ZeroDeg);
        assert_eq!(flipped.orientation_for_step(1), CrystalOrientation::ZeroDeg);
        assert_eq!(flipped.orientation_for_step(2), CrystalOrientation::FortyFiveDeg);
    }

    #[test]
    fn test_loss_ignored_unless_enabled() {
        let mut config = WalkConfig::new(1);
        config.loss = 0.4;
        assert_eq!(config.effective_loss(), 0.0);
        assert_eq!(config.with_loss(0.4).effective_loss(), 0.4);
    }

    #[test]
    fn test_from_json_partial_document() {
        let config = WalkConfig::from_json(
            r#"{ "steps": 3, "detection_mode": "threshold", "first_orientation": "zero_deg" }"#,
        )
        .unwrap();
        assert_eq!(config.steps, 3);
        assert_eq!(config.detection_mode, DetectionMode::Threshold);
        assert_eq!(config.first_orientation, CrystalOrientation::ZeroDeg);
        assert_eq!(config.squeezing, WalkConfig::default().squeezing);
    }

    #[test]
    fn test_json_round_trip() {
        let config = WalkConfig::new(4)
            .with_loss(0.2)
            .with_dark_counts(1e-5)
            .with_dark_count_source(DarkCountSource::Coherent)
            .with_coherent(0.3, 1.0);
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(WalkConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_from_json_validates() {
        let err = WalkConfig::from_json(r#"{ "steps": 0 }"#).unwrap_err();
        assert!(matches!(err, WalkError::Config { .. }));
        let err = WalkConfig::from_json("not json").unwrap_err();
        assert!(matches!(err, WalkError::Config { .. }));
    }
}
