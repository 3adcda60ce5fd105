// src/core/mod.rs

//! Core data structures and types

pub mod config;
pub mod error;
pub mod modes;

// Re-export public types for convenient access via `utbe::core::TypeName`
pub use config::{CrystalOrientation, DarkCountSource, DetectionMode, WalkConfig};
pub use error::{WalkError, WalkResult};
pub use modes::{DetectorLayout, ModeAssignment, ModeKey, Role, TimeBin, WalkLane};

pub mod constants;
pub use constants::walk_constants::{
    BALANCED_REFLECTIVITY, DARK_COUNT_TAP, DEFAULT_CUTOFF, DEFAULT_MAX_MODES,
    PROBABILITY_TOLERANCE, SWAP_REFLECTIVITY,
};
