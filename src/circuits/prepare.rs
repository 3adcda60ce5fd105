//! Input state preparation.

use crate::core::{DarkCountSource, ModeAssignment, WalkConfig, WalkError, WalkResult};
use crate::noise::{NoiseLayout, dark_count_source_photons};
use std::fmt;

/// A state-preparation step, executed before any walk operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Preparation {
    /// Two-mode squeezed vacuum across `mode_a` (herald) and `mode_b`.
    TwoModeSqueezed { mode_a: usize, mode_b: usize, r: f64, phase: f64 },
    /// Attenuates a mode before the walk (removes heralded photons).
    Attenuate { mode: usize, transmission: f64 },
    /// Coherent amplitude `amplitude·e^(i·phase)` added to the mode.
    Coherent { mode: usize, amplitude: f64, phase: f64 },
    /// Thermal light with the given mean photon number.
    Thermal { mode: usize, mean_photons: f64 },
    /// Leaves the mode in vacuum.
    Vacuum { mode: usize },
}

impl fmt::Display for Preparation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Preparation::TwoModeSqueezed { mode_a, mode_b, r, phase } => {
                write!(f, "S2gate(r={:.4}, φ={:.3}) | ({}, {})", r, phase, mode_a, mode_b)
            }
            Preparation::Attenuate { mode, transmission } => {
                write!(f, "Attenuate(η={:.4}) | {}", transmission, mode)
            }
            Preparation::Coherent { mode, amplitude, phase } => {
                write!(f, "Coherent(|α|={:.4}, φ={:.3}) | {}", amplitude, phase, mode)
            }
            Preparation::Thermal { mode, mean_photons } => {
                write!(f, "Thermal(n̄={:.3e}) | {}", mean_photons, mode)
            }
            Preparation::Vacuum { mode } => write!(f, "Vacuum | {}", mode),
        }
    }
}

/// The walk input, split around the input-stage noise.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedInput {
    /// Pair source, heralded-photon attenuation and auxiliary modes.
    pub sources: Vec<Preparation>,
    /// The coherent seed, injected after input-stage mismatch so that only
    /// the heralded light is split off.
    pub seed: Option<Preparation>,
}

/// Prepares the walk input: the heralded pair source on (herald, bin 0), the
/// optional coherent seed on bin 0, a vacuum mismatch lane and weak sources
/// for dark counts.
///
/// # Errors
/// `WalkError::Config` if the squeezing magnitude is negative or not finite.
pub fn prepare_input(
    config: &WalkConfig,
    assignment: &ModeAssignment,
    layout: &NoiseLayout,
) -> WalkResult<PreparedInput> {
    if !config.squeezing.is_finite() || config.squeezing < 0.0 {
        return Err(WalkError::config(format!(
            "Squeezing magnitude must be non-negative, got {}",
            config.squeezing
        )));
    }
    let origin = assignment.signal(0)?;
    let mut preparations = vec![Preparation::TwoModeSqueezed {
        mode_a: assignment.herald(),
        mode_b: origin,
        r: config.squeezing,
        phase: config.squeezing_phase,
    }];
    if config.heralded_transmission < 1.0 {
        preparations.push(Preparation::Attenuate {
            mode: origin,
            transmission: config.heralded_transmission,
        });
    }
    let seed = (config.coherent_amplitude > 0.0).then_some(Preparation::Coherent {
        mode: origin,
        amplitude: config.coherent_amplitude,
        phase: config.coherent_phase,
    });

    for slot in 0..layout.mismatch_slots {
        preparations.push(Preparation::Vacuum { mode: assignment.noise(slot)? });
    }

    let source_photons = dark_count_source_photons(config.dark_count_rate);
    for detector in 0..layout.dark_count_slots {
        let slot = layout.mismatch_slots + detector;
        let mode = assignment.noise(slot)?;
        preparations.push(match config.dark_count_source {
            DarkCountSource::Thermal => Preparation::Thermal { mode, mean_photons: source_photons },
            DarkCountSource::Coherent => Preparation::Coherent {
                mode,
                amplitude: source_photons.sqrt(),
                phase: 0.0,
            },
        });
    }
    Ok(PreparedInput { sources: preparations, seed })
}
