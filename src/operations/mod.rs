// src/operations/mod.rs

//! Defines the two-mode operations a birefringent crystal applies to
//! neighbouring time bins, and the builder that derives them from the
//! crystal orientation.
//!
//! A crystal delays one polarization component by exactly one time bin. In
//! the mode picture every crystal therefore acts on each boundary between
//! time bins `b - 1` and `b` that exists when light reaches it.

use crate::core::{
    BALANCED_REFLECTIVITY, CrystalOrientation, SWAP_REFLECTIVITY, TimeBin, WalkError, WalkLane,
    WalkResult,
};
use std::cmp::Ordering;
use std::fmt;

/// Position of an operation in the causal order.
///
/// Ordering is the execution order: steps ascend, boundaries descend within
/// a step (later time bins first), and a SWAP precedes the beam splitter on
/// the same boundary. Lanes never share modes and are ordered last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScheduleKey {
    /// 1-indexed crystal number.
    pub step: usize,
    /// Boundary `b` links time bins `b - 1` and `b`.
    pub boundary: TimeBin,
    /// 0 for SWAP, 1 for beam splitter.
    pub kind_rank: u8,
    /// The [`WalkLane`] the operation acts on.
    pub lane: usize,
}

impl Ord for ScheduleKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.step
            .cmp(&other.step)
            .then_with(|| other.boundary.cmp(&self.boundary))
            .then_with(|| self.kind_rank.cmp(&other.kind_rank))
            .then_with(|| self.lane.cmp(&other.lane))
    }
}

impl PartialOrd for ScheduleKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ScheduleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {} boundary {}", self.step, self.boundary)?;
        if self.lane > 0 {
            write!(f, " lane {}", self.lane)?;
        }
        Ok(())
    }
}

/// A walk operation between two backend modes.
#[derive(Debug, Clone, PartialEq)]
pub enum WalkOperation {
    /// Partial mixing of two time bins. Crystals only ever use 50:50.
    BeamSplit {
        /// Mode of the earlier time bin.
        mode_a: usize,
        /// Mode of the later time bin.
        mode_b: usize,
        /// Fraction of intensity exchanged between the modes.
        reflectivity: f64,
        /// Phase of the reflected amplitude.
        phase: f64,
        key: ScheduleKey,
    },

    /// Full exchange of two time bins: a beam splitter with reflectivity 1.
    /// Carries the group-delay phase of the delayed component.
    Swap {
        mode_a: usize,
        mode_b: usize,
        phase: f64,
        key: ScheduleKey,
    },
}

impl WalkOperation {
    pub fn key(&self) -> ScheduleKey {
        match self {
            WalkOperation::BeamSplit { key, .. } | WalkOperation::Swap { key, .. } => *key,
        }
    }

    pub fn modes(&self) -> (usize, usize) {
        match self {
            WalkOperation::BeamSplit { mode_a, mode_b, .. }
            | WalkOperation::Swap { mode_a, mode_b, .. } => (*mode_a, *mode_b),
        }
    }

    /// Reflectivity handed to the backend beam splitter.
    pub fn reflectivity(&self) -> f64 {
        match self {
            WalkOperation::BeamSplit { reflectivity, .. } => *reflectivity,
            WalkOperation::Swap { .. } => SWAP_REFLECTIVITY,
        }
    }

    pub fn phase(&self) -> f64 {
        match self {
            WalkOperation::BeamSplit { phase, .. } | WalkOperation::Swap { phase, .. } => *phase,
        }
    }

    pub fn is_swap(&self) -> bool {
        matches!(self, WalkOperation::Swap { .. })
    }

    /// Whether the two operations touch a common mode.
    pub fn shares_mode(&self, other: &WalkOperation) -> bool {
        let (a, b) = self.modes();
        let (c, d) = other.modes();
        a == c || a == d || b == c || b == d
    }
}

impl fmt::Display for WalkOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalkOperation::BeamSplit { mode_a, mode_b, reflectivity, key, .. } => {
                write!(f, "BS(R={:.2}) | ({}, {})  [{}]", reflectivity, mode_a, mode_b, key)
            }
            WalkOperation::Swap { mode_a, mode_b, phase, key } => {
                write!(f, "SWAP(φ={:.3}) | ({}, {})  [{}]", phase, mode_a, mode_b, key)
            }
        }
    }
}

/// Builds the operations one crystal applies on a single boundary.
///
/// * `ZeroDeg`: the V component of bin `b - 1` moves into bin `b`, a SWAP.
/// * `FortyFiveDeg`: the same shift in the rotated D/A basis, a SWAP followed
///   by a 50:50 beam splitter.
///
/// # Errors
/// `WalkError::Config` if `boundary` is 0, lies beyond `step`, or names a
/// time bin outside `lane`.
pub fn crystal_operations(
    orientation: CrystalOrientation,
    step: usize,
    boundary: TimeBin,
    lane: &WalkLane,
    group_delay_phase: f64,
) -> WalkResult<Vec<WalkOperation>> {
    if step == 0 || step > lane.steps() {
        return Err(WalkError::config(format!(
            "Step {} outside walk of {} steps",
            step,
            lane.steps()
        )));
    }
    if boundary == 0 || boundary > step {
        return Err(WalkError::config(format!(
            "Boundary {} is not reachable at step {}",
            boundary, step
        )));
    }
    let mode_a = lane.mode(boundary - 1)?;
    let mode_b = lane.mode(boundary)?;
    let key = |kind_rank| ScheduleKey { step, boundary, kind_rank, lane: lane.index() };

    let swap = WalkOperation::Swap {
        mode_a,
        mode_b,
        phase: group_delay_phase,
        key: key(0),
    };
    let ops = match orientation {
        CrystalOrientation::ZeroDeg => vec![swap],
        CrystalOrientation::FortyFiveDeg => vec![
            swap,
            WalkOperation::BeamSplit {
                mode_a,
                mode_b,
                reflectivity: BALANCED_REFLECTIVITY,
                phase: 0.0,
                key: key(1),
            },
        ],
    };
    Ok(ops)
}

/// All operations of crystal `step` on `lane`, boundary by boundary in
/// ascending order. The result is not yet causally ordered.
pub fn crystal_step(
    orientation: CrystalOrientation,
    step: usize,
    lane: &WalkLane,
    group_delay_phase: f64,
) -> WalkResult<Vec<WalkOperation>> {
    let mut ops = Vec::with_capacity(2 * step);
    for boundary in 1..=step {
        ops.extend(crystal_operations(orientation, step, boundary, lane, group_delay_phase)?);
    }
    Ok(ops)
}
