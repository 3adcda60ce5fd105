// src/simulation/mod.rs

//! Executes a [`Circuit`] on a photonic backend.
//! This module contains the `Simulator` entry point, the [`PhotonicBackend`]
//! seam and the Gaussian engine that implements it.

mod backend;
mod detection;
pub(crate) mod engine;
pub(crate) mod linalg;
mod results;
mod table;

// Re-export the main public interface types
pub use backend::PhotonicBackend;
pub use detection::OutcomePattern;
pub use engine::GaussianState;
pub use results::SimulationResult;
pub use table::{ProbabilityTable, fock_outcomes};

use crate::circuits::{Circuit, CircuitBuilder, Preparation};
use crate::core::{DARK_COUNT_TAP, DEFAULT_CUTOFF, DEFAULT_MAX_MODES, WalkConfig, WalkError, WalkResult};
use crate::noise::{NoiseElement, NoiseKind, NoiseStage};
use crate::operations::WalkOperation;
use crate::validation::validate_state;
use num_complex::Complex;
use tracing::{debug, instrument};

/// Runs walk circuits on the Gaussian engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Simulator {
    cutoff: usize,
    max_modes: usize,
}

impl Default for Simulator {
    fn default() -> Self {
        Self { cutoff: DEFAULT_CUTOFF, max_modes: DEFAULT_MAX_MODES }
    }
}

impl Simulator {
    /// Creates a new Simulator with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Largest per-mode photon number Fock queries may ask for.
    pub fn with_cutoff(mut self, cutoff: usize) -> Self {
        self.cutoff = cutoff;
        self
    }

    /// Largest number of modes a circuit may use.
    pub fn with_max_modes(mut self, max_modes: usize) -> Self {
        self.max_modes = max_modes;
        self
    }

    pub fn cutoff(&self) -> usize {
        self.cutoff
    }

    pub fn max_modes(&self) -> usize {
        self.max_modes
    }

    /// Builds the circuit for `config` within this simulator's mode limit.
    pub fn compile(&self, config: &WalkConfig) -> WalkResult<Circuit> {
        CircuitBuilder::new(config.clone()).max_modes(self.max_modes).build()
    }

    /// Runs `circuit` from vacuum and returns the evolved state.
    ///
    /// # Returns
    /// * `Ok(SimulationResult)` holding the final state and the detector layout.
    /// * `Err(WalkError::Config)` if the circuit needs more modes than allowed.
    /// * `Err(WalkError::Backend)` on numerical failure.
    #[instrument(skip(self, circuit), fields(modes = circuit.num_modes(), operations = circuit.len()))]
    pub fn run(&self, circuit: &Circuit) -> WalkResult<SimulationResult> {
        if circuit.num_modes() > self.max_modes {
            return Err(WalkError::config(format!(
                "Circuit needs {} modes but the simulator allows {}",
                circuit.num_modes(),
                self.max_modes
            )));
        }
        let mut state = GaussianState::vacuum(circuit.num_modes(), self.cutoff, self.max_modes)?;
        execute(circuit, &mut state)?;
        validate_state(&state, None)?;
        debug!("walk evolved");
        Ok(SimulationResult::new(
            state,
            circuit.assignment().clone(),
            circuit.detectors().clone(),
            circuit.config().detection_mode,
        ))
    }

    /// Compiles and runs `config` in one call.
    pub fn simulate(&self, config: &WalkConfig) -> WalkResult<SimulationResult> {
        self.run(&self.compile(config)?)
    }
}

/// Applies every layer of `circuit` to `backend`: the sources, input-stage
/// noise, the coherent seed, the scheduled walk operations, then the noise in
/// front of the detectors.
///
/// # Errors
/// `WalkError::Backend` if the backend has fewer modes than the circuit, or
/// any backend call fails.
pub fn execute<B: PhotonicBackend>(circuit: &Circuit, backend: &mut B) -> WalkResult<()> {
    if backend.num_modes() < circuit.num_modes() {
        return Err(WalkError::backend(format!(
            "Backend holds {} modes, circuit needs {}",
            backend.num_modes(),
            circuit.num_modes()
        )));
    }
    for prep in circuit.preparations() {
        apply_preparation(backend, prep)?;
    }
    for element in circuit.noise_at(NoiseStage::Input) {
        apply_noise(backend, element)?;
    }
    if let Some(seed) = circuit.seed() {
        apply_preparation(backend, seed)?;
    }
    for op in circuit.operations() {
        apply_operation(backend, op)?;
    }
    for element in circuit.noise_at(NoiseStage::Detector) {
        apply_noise(backend, element)?;
    }
    Ok(())
}

fn apply_preparation<B: PhotonicBackend>(backend: &mut B, prep: &Preparation) -> WalkResult<()> {
    match *prep {
        Preparation::TwoModeSqueezed { mode_a, mode_b, r, phase } => {
            backend.prepare_two_mode_squeezed(mode_a, mode_b, r, phase)
        }
        Preparation::Attenuate { mode, transmission } => backend.loss(mode, transmission),
        Preparation::Coherent { mode, amplitude, phase } => {
            backend.prepare_coherent(mode, Complex::from_polar(amplitude, phase))
        }
        Preparation::Thermal { mode, mean_photons } => backend.prepare_thermal(mode, mean_photons),
        Preparation::Vacuum { mode } => backend.prepare_vacuum(mode),
    }
}

fn apply_operation<B: PhotonicBackend>(backend: &mut B, op: &WalkOperation) -> WalkResult<()> {
    let (mode_a, mode_b) = op.modes();
    backend.beam_splitter(mode_a, mode_b, op.reflectivity(), op.phase())
}

fn apply_noise<B: PhotonicBackend>(backend: &mut B, element: &NoiseElement) -> WalkResult<()> {
    match (element.kind, element.auxiliary_mode) {
        (NoiseKind::Loss, _) => backend.loss(element.target_mode, element.transmission()),
        (NoiseKind::Mismatch, Some(twin)) => {
            backend.beam_splitter(element.target_mode, twin, element.parameter, 0.0)
        }
        // The source is read by the target's detector; only its weak tap arrives.
        (NoiseKind::DarkCount, Some(source)) => backend.loss(source, DARK_COUNT_TAP),
        (kind, None) => Err(WalkError::backend(format!(
            "{:?} element on mode {} has no auxiliary mode",
            kind, element.target_mode
        ))),
    }
}

/// Fock table of a walk whose heralded photon only partially overlaps the
/// coherent seed.
///
/// The seed is split by intensity: `overlap·|α|²` interferes with the
/// heralded photon, the rest walks in a distinguishable mode with the
/// heralded photon removed. The two heralded tables are convolved and
/// normalized. The overlap replaces `mode_mismatch` in both walks.
///
/// # Errors
/// `WalkError::Config` if `overlap` is outside [0, 1], plus any error from
/// building, running or tabulating either walk.
#[instrument(skip(simulator, config), fields(steps = config.steps))]
pub fn partially_distinguishable_table(
    simulator: &Simulator,
    config: &WalkConfig,
    overlap: f64,
    max_photons: usize,
) -> WalkResult<ProbabilityTable> {
    if !(0.0..=1.0).contains(&overlap) {
        return Err(WalkError::config(format!("Mode overlap must lie in [0, 1], got {}", overlap)));
    }
    let amplitude = config.coherent_amplitude;
    let phase = config.coherent_phase;

    let indistinguishable = config
        .clone()
        .with_mode_mismatch(0.0)
        .with_coherent(amplitude * overlap.sqrt(), phase);
    let distinguishable = config
        .clone()
        .with_mode_mismatch(0.0)
        .with_coherent(amplitude * (1.0 - overlap).sqrt(), phase)
        .with_heralded_transmission(0.0);

    let first = simulator.simulate(&indistinguishable)?.fock_table(max_photons)?;
    let second = simulator.simulate(&distinguishable)?.fock_table(max_photons)?;
    first.convolve(&second, max_photons)?.normalized()
}
