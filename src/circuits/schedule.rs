//! Causal ordering of walk operations.
//!
//! Within one crystal, light that has just been moved into bin `b` must not
//! be moved again into bin `b + 1`. Processing boundaries from the latest
//! time bin down to the earliest guarantees this.

use crate::core::{WalkError, WalkResult};
use crate::operations::WalkOperation;
use tracing::trace;

/// Sorts `operations` into execution order and verifies the result.
///
/// The order is total: by step, then by boundary (latest first), then SWAP
/// before beam splitter, then lane. Two operations with the same key make
/// the order ambiguous and are rejected.
pub fn schedule(mut operations: Vec<WalkOperation>) -> WalkResult<Vec<WalkOperation>> {
    operations.sort_by_key(|op| op.key());
    for pair in operations.windows(2) {
        if pair[0].key() == pair[1].key() {
            return Err(WalkError::config(format!(
                "Ambiguous schedule: two operations at {} with the same kind",
                pair[0].key()
            )));
        }
    }
    verify_causal_order(&operations)?;
    trace!(operations = operations.len(), "walk operations scheduled");
    Ok(operations)
}

/// Checks that `operations` is in causal order.
///
/// Keys must strictly increase, and within a step an operation that shares a
/// mode with a later one must sit on a boundary that is not earlier.
pub fn verify_causal_order(operations: &[WalkOperation]) -> WalkResult<()> {
    for pair in operations.windows(2) {
        if pair[0].key() >= pair[1].key() {
            return Err(WalkError::config(format!(
                "Operation at {} scheduled before {}",
                pair[0].key(),
                pair[1].key()
            )));
        }
    }
    for (i, first) in operations.iter().enumerate() {
        for second in &operations[i + 1..] {
            let same_step = first.key().step == second.key().step;
            if same_step && first.shares_mode(second) && first.key().boundary < second.key().boundary {
                return Err(WalkError::config(format!(
                    "Backward-in-time coupling: {} runs before {}",
                    first.key(),
                    second.key()
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CrystalOrientation, DEFAULT_MAX_MODES, ModeAssignment};
    use crate::operations::{ScheduleKey, crystal_step};

    fn naive_ops(steps: usize) -> Vec<WalkOperation> {
        let lane = ModeAssignment::new(steps, 0, DEFAULT_MAX_MODES).unwrap().signal_lane();
        let mut ops = Vec::new();
        for step in 1..=steps {
            let orientation = if step % 2 == 1 {
                CrystalOrientation::ZeroDeg
            } else {
                CrystalOrientation::FortyFiveDeg
            };
            ops.extend(crystal_step(orientation, step, &lane, 0.0).unwrap());
        }
        ops
    }

    #[test]
    fn test_later_boundaries_first_within_step() -> WalkResult<()> {
        let ops = schedule(naive_ops(3))?;
        let keys: Vec<_> = ops.iter().map(|op| (op.key().step, op.key().boundary)).collect();
        assert_eq!(
            keys,
            vec![(1, 1), (2, 2), (2, 2), (2, 1), (2, 1), (3, 3), (3, 2), (3, 1)]
        );
        Ok(())
    }

    #[test]
    fn test_schedule_is_independent_of_input_order() -> WalkResult<()> {
        let mut reversed = naive_ops(4);
        reversed.reverse();
        assert_eq!(schedule(reversed)?, schedule(naive_ops(4))?);
        Ok(())
    }

    #[test]
    fn test_naive_order_fails_verification() {
        let ops = naive_ops(2);
        assert!(matches!(verify_causal_order(&ops), Err(WalkError::Config { .. })));
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let op = WalkOperation::Swap {
            mode_a: 1,
            mode_b: 2,
            phase: 0.0,
            key: ScheduleKey { step: 1, boundary: 1, kind_rank: 0, lane: 0 },
        };
        assert!(schedule(vec![op.clone(), op]).is_err());
    }

    #[test]
    fn test_lanes_interleave_without_conflict() -> WalkResult<()> {
        let assignment = ModeAssignment::new(2, 3, DEFAULT_MAX_MODES)?;
        let twin = assignment.noise_lane(1, 0)?;
        let mut ops = naive_ops(2);
        for step in 1..=2 {
            ops.extend(crystal_step(CrystalOrientation::FortyFiveDeg, step, &twin, 0.0)?);
        }
        let scheduled = schedule(ops)?;
        let lanes: Vec<_> = scheduled.iter().filter(|op| op.key().step == 1).map(|op| op.key().lane).collect();
        assert_eq!(lanes, vec![0, 1, 1]);
        Ok(())
    }
}
