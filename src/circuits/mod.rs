// src/circuits/mod.rs

//! Assembles a complete, immutable walk circuit from a [`WalkConfig`].
//!
//! A [`Circuit`] holds the ordered layers that the simulator runs in turn:
//! the light sources, input-stage noise, the coherent seed, the causally
//! scheduled crystal operations, and the noise in front of the detectors.
//! It also records which modes each detector reads.

mod prepare;
pub mod schedule;

pub use prepare::{PreparedInput, Preparation, prepare_input};
pub use schedule::{schedule, verify_causal_order};

use crate::core::{DEFAULT_MAX_MODES, DetectorLayout, ModeAssignment, WalkConfig, WalkResult};
use crate::noise::{NoiseElement, NoiseLayout, NoiseStage, inject_noise};
use crate::operations::{WalkOperation, crystal_step};
use std::fmt;
use tracing::{debug, instrument};

/// A fully built walk: mode layout, input preparation, scheduled operations,
/// noise and detectors. Immutable once built.
#[derive(Clone, PartialEq)]
pub struct Circuit {
    config: WalkConfig,
    assignment: ModeAssignment,
    preparations: Vec<Preparation>,
    seed: Option<Preparation>,
    /// Causally ordered; see [`schedule`].
    operations: Vec<WalkOperation>,
    /// Sorted by stage, then in mismatch, loss, dark-count order.
    noise: Vec<NoiseElement>,
    detectors: DetectorLayout,
}

impl Circuit {
    /// Builds the circuit for `config` with the default mode limit.
    pub fn from_config(config: &WalkConfig) -> WalkResult<Self> {
        CircuitBuilder::new(config.clone()).build()
    }

    pub fn config(&self) -> &WalkConfig {
        &self.config
    }

    pub fn assignment(&self) -> &ModeAssignment {
        &self.assignment
    }

    /// Pair source, attenuation and auxiliary-mode states, run first.
    pub fn preparations(&self) -> &[Preparation] {
        &self.preparations
    }

    /// The coherent seed, injected after input-stage noise.
    pub fn seed(&self) -> Option<&Preparation> {
        self.seed.as_ref()
    }

    /// Returns the walk operations in execution order.
    pub fn operations(&self) -> &[WalkOperation] {
        &self.operations
    }

    /// Operations contributed by crystal `step`, in execution order.
    pub fn operations_for_step(&self, step: usize) -> impl Iterator<Item = &WalkOperation> {
        self.operations.iter().filter(move |op| op.key().step == step)
    }

    pub fn noise(&self) -> &[NoiseElement] {
        &self.noise
    }

    /// Noise elements acting at `stage`, in application order.
    pub fn noise_at(&self, stage: NoiseStage) -> impl Iterator<Item = &NoiseElement> {
        self.noise.iter().filter(move |element| element.kind.stage() == stage)
    }

    pub fn detectors(&self) -> &DetectorLayout {
        &self.detectors
    }

    pub fn num_modes(&self) -> usize {
        self.assignment.total_modes()
    }

    /// Returns the number of walk operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

//-------------------------------------------------------------------------
// Circuit Builder
//-------------------------------------------------------------------------

/// Builds a [`Circuit`] with method chaining.
///
/// The walk itself is fully determined by the config; the builder only adds
/// the backend mode limit and any extra noise elements the caller attaches
/// (for example a distinct loss on a single detector).
pub struct CircuitBuilder {
    config: WalkConfig,
    max_modes: usize,
    reserved_noise_modes: usize,
    extra_noise: Vec<NoiseElement>,
}

impl CircuitBuilder {
    pub fn new(config: WalkConfig) -> Self {
        Self {
            config,
            max_modes: DEFAULT_MAX_MODES,
            reserved_noise_modes: 0,
            extra_noise: Vec::new(),
        }
    }

    /// Sets the largest mode count the target backend supports.
    pub fn max_modes(mut self, max_modes: usize) -> Self {
        self.max_modes = max_modes;
        self
    }

    /// Reserves vacuum noise modes, appended after the config's own noise
    /// modes, for caller-supplied mismatch or dark-count elements. Each such
    /// mode is read by the detector of the element's target mode.
    pub fn reserve_noise_modes(mut self, count: usize) -> Self {
        self.reserved_noise_modes = count;
        self
    }

    pub fn add_noise(mut self, element: NoiseElement) -> Self {
        self.extra_noise.push(element);
        self
    }

    pub fn add_noises<I>(mut self, elements: I) -> Self
    where
        I: IntoIterator<Item = NoiseElement>,
    {
        self.extra_noise.extend(elements);
        self
    }

    /// Validates the config and derives every layer of the circuit.
    ///
    /// # Errors
    /// `WalkError::Config` for invalid parameters, a layout beyond the mode
    /// limit, or extra noise elements that are invalid or whose auxiliary
    /// mode cannot be given to a detector.
    #[instrument(skip(self), fields(steps = self.config.steps))]
    pub fn build(self) -> WalkResult<Circuit> {
        let config = self.config;
        config.validate()?;

        let layout = NoiseLayout::for_config(&config);
        let assignment = ModeAssignment::new(
            config.steps,
            layout.total() + self.reserved_noise_modes,
            self.max_modes,
        )?;

        let input = prepare_input(&config, &assignment, &layout)?;
        let mut preparations = input.sources;
        for slot in layout.total()..assignment.noise_modes() {
            preparations.push(Preparation::Vacuum { mode: assignment.noise(slot)? });
        }

        let mut lanes = vec![assignment.signal_lane()];
        lanes.extend(layout.mismatch_lane(&assignment)?);
        let mut raw = Vec::new();
        for step in 1..=config.steps {
            for lane in &lanes {
                raw.extend(crystal_step(
                    config.orientation_for_step(step),
                    step,
                    lane,
                    config.group_delay_phase,
                )?);
            }
        }
        let operations = schedule(raw)?;

        let mut noise = inject_noise(&config, &assignment, &layout)?;
        for element in &self.extra_noise {
            element.validate(&assignment)?;
        }
        noise.extend(self.extra_noise);
        noise.sort_by_key(|element| (element.kind.stage(), element.kind.rank()));

        let mut detectors = DetectorLayout::new(&assignment);
        for lane in &lanes[1..] {
            detectors.attach_lane(lane)?;
        }
        for element in &noise {
            if let Some(aux) = element.auxiliary_mode {
                detectors.attach(element.target_mode, aux)?;
            }
        }

        debug!(
            modes = assignment.total_modes(),
            preparations = preparations.len(),
            operations = operations.len(),
            noise = noise.len(),
            "walk circuit built"
        );

        Ok(Circuit { config, assignment, preparations, seed: input.seed, operations, noise, detectors })
    }
}

impl fmt::Display for Circuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "utbe::Circuit[{} steps, {} modes, {} operations, {} noise elements]",
            self.assignment.steps(),
            self.num_modes(),
            self.operations.len(),
            self.noise.len()
        )?;
        for prep in &self.preparations {
            writeln!(f, "  {}", prep)?;
        }
        for element in self.noise_at(NoiseStage::Input) {
            writeln!(f, "  {}", element)?;
        }
        if let Some(seed) = &self.seed {
            writeln!(f, "  {}", seed)?;
        }
        for op in &self.operations {
            writeln!(f, "  {}", op)?;
        }
        for element in self.noise_at(NoiseStage::Detector) {
            writeln!(f, "  {}", element)?;
        }
        Ok(())
    }
}

// Keep the Debug impl delegating to Display
impl fmt::Debug for Circuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
