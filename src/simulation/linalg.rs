// src/simulation/linalg.rs

//! Complex matrix aliases and the loop hafnian used by the Gaussian engine.

use nalgebra::DMatrix;
use num_complex::Complex;
use num_traits::{One, Zero};
use std::collections::HashMap;

pub(crate) type C64 = Complex<f64>;
pub(crate) type CMatrix = DMatrix<C64>;

/// Submatrix on rows and columns `indices`. Indices may repeat, which is how
/// a photon number above one enters the hafnian.
pub(crate) fn principal_submatrix(a: &CMatrix, indices: &[usize]) -> CMatrix {
    a.select_rows(indices).select_columns(indices)
}

/// Loop hafnian of the symmetric matrix `a` whose loop weights are `loops`.
///
/// Sums, over all ways to partition the indices into pairs and singletons,
/// the product of `a[i][j]` for pairs and `loops[i]` for singletons.
/// Memoised over the set of unpaired indices; `a` must have fewer than 64 rows.
pub(crate) fn loop_hafnian(a: &CMatrix, loops: &[C64]) -> C64 {
    let dim = a.nrows();
    debug_assert!(dim < 64 && loops.len() == dim && a.is_square());
    let full: u64 = if dim == 0 { 0 } else { u64::MAX >> (64 - dim) };
    let mut memo = HashMap::new();
    loop_hafnian_rec(a, loops, full, &mut memo)
}

fn loop_hafnian_rec(a: &CMatrix, loops: &[C64], mask: u64, memo: &mut HashMap<u64, C64>) -> C64 {
    if mask == 0 {
        return C64::one();
    }
    if let Some(value) = memo.get(&mask) {
        return *value;
    }
    let i = mask.trailing_zeros() as usize;
    let rest = mask & !(1u64 << i);

    let mut total = C64::zero();
    if !loops[i].is_zero() {
        total += loops[i] * loop_hafnian_rec(a, loops, rest, memo);
    }
    let mut partners = rest;
    while partners != 0 {
        let j = partners.trailing_zeros() as usize;
        partners &= partners - 1;
        let weight = a[(i, j)];
        if !weight.is_zero() {
            total += weight * loop_hafnian_rec(a, loops, rest & !(1u64 << j), memo);
        }
    }
    memo.insert(mask, total);
    total
}
