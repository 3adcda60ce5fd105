//! Numerical constants shared by the walk builder and the backend.

/// Optical constants of the crystal cascade and its detectors.
pub mod walk_constants {
    /// Reflectivity of the basis-changing beam splitter of a 45° crystal.
    pub const BALANCED_REFLECTIVITY: f64 = 0.5;
    /// A SWAP is a beam splitter that reflects everything.
    pub const SWAP_REFLECTIVITY: f64 = 1.0;
    /// Fraction of a dark-count source that reaches its detector.
    pub const DARK_COUNT_TAP: f64 = 0.01;
    /// Default per-mode photon-number cutoff of the Fock evaluator.
    pub const DEFAULT_CUTOFF: usize = 6;
    /// Default number of modes the Gaussian backend accepts.
    pub const DEFAULT_MAX_MODES: usize = 64;
    /// Slack allowed when a computed probability leaves [0, 1].
    pub const PROBABILITY_TOLERANCE: f64 = 1e-9;
}
