// src/simulation/engine.rs

//! Gaussian-state engine: the default [`PhotonicBackend`].
//!
//! The state of `M` modes is kept as the mean fields `α_i = ⟨a_i⟩` and the
//! normally ordered moments
//!
//! * `N_ij = ⟨Δa_i† Δa_j⟩`
//! * `M_ij = ⟨Δa_i Δa_j⟩`
//!
//! Every walk operation is passive or a pure-loss channel, so the state stays
//! Gaussian and evolution is a handful of row/column updates.
//!
//! Detection statistics come from the Husimi covariance of the reduced state,
//! `σ_Q = [[Nᵀ + I, M], [M*, N + I]]`, and the complex mean `μ = (α, α*)`.
//! The vacuum probability is `exp(−½ μ†σ_Q⁻¹μ) / √det σ_Q`; Fock
//! probabilities multiply it by a loop hafnian. Threshold probabilities are
//! sums of vacuum probabilities (inclusion–exclusion over clicking modes).

use super::backend::{MAX_THRESHOLD_CLICKS, PhotonicBackend};
use super::linalg::{C64, CMatrix, loop_hafnian, principal_submatrix};
use crate::core::{WalkError, WalkResult};
use nalgebra::DVector;
use num_complex::Complex;
use num_traits::{One, Zero};
use tracing::trace;

/// Total photons a single Fock query may ask for. The loop hafnian runs over
/// twice this many indices.
const MAX_FOCK_PHOTONS: usize = 14;

/// Gaussian state of a set of optical modes.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianState {
    means: Vec<C64>,
    n: CMatrix,
    m: CMatrix,
    cutoff: usize,
    max_modes: usize,
}

/// Husimi data of a reduced state.
struct Husimi {
    inverse: CMatrix,
    mean: DVector<C64>,
    vacuum_probability: f64,
}

impl GaussianState {
    /// All-vacuum state on `num_modes` modes.
    ///
    /// # Errors
    /// `WalkError::Backend` if `num_modes` is zero or exceeds `max_modes`.
    pub fn vacuum(num_modes: usize, cutoff: usize, max_modes: usize) -> WalkResult<Self> {
        if num_modes == 0 {
            return Err(WalkError::backend("Cannot create a state with zero modes"));
        }
        if num_modes > max_modes {
            return Err(WalkError::backend(format!(
                "State needs {} modes, limit is {}",
                num_modes, max_modes
            )));
        }
        Ok(Self {
            means: vec![C64::zero(); num_modes],
            n: CMatrix::zeros(num_modes, num_modes),
            m: CMatrix::zeros(num_modes, num_modes),
            cutoff,
            max_modes,
        })
    }

    /// Mean field `⟨a⟩` of `mode`.
    pub fn mean_field(&self, mode: usize) -> WalkResult<Complex<f64>> {
        self.check_mode(mode)?;
        Ok(self.means[mode])
    }

    /// Mean photon number `⟨a†a⟩` of `mode`.
    pub fn mean_photon_number(&self, mode: usize) -> WalkResult<f64> {
        self.check_mode(mode)?;
        Ok(self.means[mode].norm_sqr() + self.n[(mode, mode)].re)
    }

    /// `⟨Δa_i† Δa_j⟩`.
    pub fn normal_moment(&self, i: usize, j: usize) -> WalkResult<Complex<f64>> {
        self.check_mode(i)?;
        self.check_mode(j)?;
        Ok(self.n[(i, j)])
    }

    /// `⟨Δa_i Δa_j⟩`.
    pub fn anomalous_moment(&self, i: usize, j: usize) -> WalkResult<Complex<f64>> {
        self.check_mode(i)?;
        self.check_mode(j)?;
        Ok(self.m[(i, j)])
    }

    fn check_mode(&self, mode: usize) -> WalkResult<()> {
        if mode >= self.means.len() {
            return Err(WalkError::backend(format!(
                "Mode {} out of range for a {}-mode state",
                mode,
                self.means.len()
            )));
        }
        Ok(())
    }

    fn check_pair(&self, mode_a: usize, mode_b: usize) -> WalkResult<()> {
        self.check_mode(mode_a)?;
        self.check_mode(mode_b)?;
        if mode_a == mode_b {
            return Err(WalkError::backend(format!(
                "Two-mode operation needs distinct modes, got {} twice",
                mode_a
            )));
        }
        Ok(())
    }

    fn check_query(&self, modes: &[usize], len: usize) -> WalkResult<()> {
        if modes.len() != len {
            return Err(WalkError::backend(format!(
                "Query names {} modes but {} outcomes",
                modes.len(),
                len
            )));
        }
        for (i, &mode) in modes.iter().enumerate() {
            self.check_mode(mode)?;
            if modes[..i].contains(&mode) {
                return Err(WalkError::backend(format!("Mode {} queried twice", mode)));
            }
        }
        Ok(())
    }

    fn clear_mode(&mut self, mode: usize) {
        self.means[mode] = C64::zero();
        for k in 0..self.means.len() {
            self.n[(mode, k)] = C64::zero();
            self.n[(k, mode)] = C64::zero();
            self.m[(mode, k)] = C64::zero();
            self.m[(k, mode)] = C64::zero();
        }
    }

    /// Applies the 2×2 unitary `u` acting on `(a_a, a_b)`.
    fn apply_two_mode_unitary(&mut self, a: usize, b: usize, u: [[C64; 2]; 2]) {
        let (x, y) = (self.means[a], self.means[b]);
        self.means[a] = u[0][0] * x + u[0][1] * y;
        self.means[b] = u[1][0] * x + u[1][1] * y;

        let conj = [[u[0][0].conj(), u[0][1].conj()], [u[1][0].conj(), u[1][1].conj()]];
        // N → U* N Uᵀ, M → U M Uᵀ
        mix_rows(&mut self.n, a, b, &conj);
        mix_cols(&mut self.n, a, b, &u);
        mix_rows(&mut self.m, a, b, &u);
        mix_cols(&mut self.m, a, b, &u);
    }

    fn husimi(&self, modes: &[usize]) -> WalkResult<Husimi> {
        let k = modes.len();
        if k == 0 {
            return Ok(Husimi {
                inverse: CMatrix::zeros(0, 0),
                mean: DVector::zeros(0),
                vacuum_probability: 1.0,
            });
        }
        let mut sigma = CMatrix::identity(2 * k, 2 * k);
        for (i, &p) in modes.iter().enumerate() {
            for (j, &q) in modes.iter().enumerate() {
                sigma[(i, j)] += self.n[(q, p)];
                sigma[(k + i, k + j)] += self.n[(p, q)];
                sigma[(i, k + j)] = self.m[(p, q)];
                sigma[(k + i, j)] = self.m[(p, q)].conj();
            }
        }
        let mean = DVector::from_iterator(
            2 * k,
            modes
                .iter()
                .map(|&p| self.means[p])
                .chain(modes.iter().map(|&p| self.means[p].conj())),
        );

        let lu = sigma.lu();
        let det = lu.determinant();
        let inverse = lu
            .try_inverse()
            .ok_or_else(|| WalkError::backend(format!("Singular Husimi covariance on modes {:?}", modes)))?;
        if !det.re.is_finite() || det.re <= 0.0 {
            return Err(WalkError::backend(format!(
                "Husimi covariance on modes {:?} has non-positive determinant {}",
                modes, det
            )));
        }
        let weighted = &inverse * &mean;
        let exponent = mean.dotc(&weighted);
        let vacuum_probability = (-0.5 * exponent.re).exp() / det.re.sqrt();

        Ok(Husimi { inverse, mean, vacuum_probability })
    }
}

fn mix_rows(mat: &mut CMatrix, a: usize, b: usize, u: &[[C64; 2]; 2]) {
    for c in 0..mat.ncols() {
        let (x, y) = (mat[(a, c)], mat[(b, c)]);
        mat[(a, c)] = u[0][0] * x + u[0][1] * y;
        mat[(b, c)] = u[1][0] * x + u[1][1] * y;
    }
}

fn mix_cols(mat: &mut CMatrix, a: usize, b: usize, u: &[[C64; 2]; 2]) {
    for r in 0..mat.nrows() {
        let (x, y) = (mat[(r, a)], mat[(r, b)]);
        mat[(r, a)] = x * u[0][0] + y * u[0][1];
        mat[(r, b)] = x * u[1][0] + y * u[1][1];
    }
}

fn factorial(n: usize) -> f64 {
    (1..=n).map(|k| k as f64).product()
}

impl PhotonicBackend for GaussianState {
    fn num_modes(&self) -> usize {
        self.means.len()
    }

    fn cutoff(&self) -> usize {
        self.cutoff
    }

    fn max_modes(&self) -> usize {
        self.max_modes
    }

    fn prepare_vacuum(&mut self, mode: usize) -> WalkResult<()> {
        self.check_mode(mode)?;
        self.clear_mode(mode);
        Ok(())
    }

    fn prepare_two_mode_squeezed(
        &mut self,
        mode_a: usize,
        mode_b: usize,
        r: f64,
        phase: f64,
    ) -> WalkResult<()> {
        self.check_pair(mode_a, mode_b)?;
        if !r.is_finite() || r < 0.0 {
            return Err(WalkError::backend(format!("Squeezing must be non-negative, got {}", r)));
        }
        self.clear_mode(mode_a);
        self.clear_mode(mode_b);
        let (s, c) = (r.sinh(), r.cosh());
        let pair = Complex::from_polar(s * c, phase);
        self.n[(mode_a, mode_a)] = C64::new(s * s, 0.0);
        self.n[(mode_b, mode_b)] = C64::new(s * s, 0.0);
        self.m[(mode_a, mode_b)] = pair;
        self.m[(mode_b, mode_a)] = pair;
        trace!(mode_a, mode_b, r, "two-mode squeezed vacuum prepared");
        Ok(())
    }

    fn prepare_coherent(&mut self, mode: usize, amplitude: Complex<f64>) -> WalkResult<()> {
        self.check_mode(mode)?;
        if !amplitude.is_finite() {
            return Err(WalkError::backend(format!("Non-finite displacement {}", amplitude)));
        }
        self.means[mode] += amplitude;
        Ok(())
    }

    fn prepare_thermal(&mut self, mode: usize, mean_photons: f64) -> WalkResult<()> {
        self.check_mode(mode)?;
        if !mean_photons.is_finite() || mean_photons < 0.0 {
            return Err(WalkError::backend(format!(
                "Thermal mean photon number must be non-negative, got {}",
                mean_photons
            )));
        }
        self.clear_mode(mode);
        self.n[(mode, mode)] = C64::new(mean_photons, 0.0);
        Ok(())
    }

    fn beam_splitter(
        &mut self,
        mode_a: usize,
        mode_b: usize,
        reflectivity: f64,
        phase: f64,
    ) -> WalkResult<()> {
        self.check_pair(mode_a, mode_b)?;
        if !(0.0..=1.0).contains(&reflectivity) || !phase.is_finite() {
            return Err(WalkError::backend(format!(
                "Invalid beam splitter R={} φ={}",
                reflectivity, phase
            )));
        }
        let t = C64::new((1.0 - reflectivity).sqrt(), 0.0);
        let r = Complex::from_polar(reflectivity.sqrt(), phase);
        self.apply_two_mode_unitary(mode_a, mode_b, [[t, -r.conj()], [r, t]]);
        Ok(())
    }

    fn loss(&mut self, mode: usize, transmission: f64) -> WalkResult<()> {
        self.check_mode(mode)?;
        if !(0.0..=1.0).contains(&transmission) {
            return Err(WalkError::backend(format!(
                "Loss transmission must lie in [0, 1], got {}",
                transmission
            )));
        }
        let scale = transmission.sqrt();
        self.means[mode] *= scale;
        for k in 0..self.means.len() {
            self.n[(mode, k)] *= scale;
            self.n[(k, mode)] *= scale;
            self.m[(mode, k)] *= scale;
            self.m[(k, mode)] *= scale;
        }
        Ok(())
    }

    fn fock_probability(&self, modes: &[usize], photons: &[usize]) -> WalkResult<f64> {
        self.check_query(modes, photons.len())?;
        if let Some(&n) = photons.iter().find(|&&n| n > self.cutoff) {
            return Err(WalkError::backend(format!(
                "Photon number {} exceeds cutoff {}",
                n, self.cutoff
            )));
        }
        let total: usize = photons.iter().sum();
        if total > MAX_FOCK_PHOTONS {
            return Err(WalkError::backend(format!(
                "Fock query for {} photons exceeds the limit of {}",
                total, MAX_FOCK_PHOTONS
            )));
        }

        let husimi = self.husimi(modes)?;
        if total == 0 {
            return Ok(husimi.vacuum_probability);
        }

        let k = modes.len();
        let dim = 2 * k;
        // Ã = X(I − σ_Q⁻¹), with X swapping the a and a† blocks.
        let mut a_tilde = CMatrix::zeros(dim, dim);
        for i in 0..dim {
            let swapped = (i + k) % dim;
            for j in 0..dim {
                let delta = if swapped == j { C64::one() } else { C64::zero() };
                a_tilde[(i, j)] = delta - husimi.inverse[(swapped, j)];
            }
        }
        for i in 0..dim {
            for j in i + 1..dim {
                let sym = (a_tilde[(i, j)] + a_tilde[(j, i)]) * 0.5;
                a_tilde[(i, j)] = sym;
                a_tilde[(j, i)] = sym;
            }
        }
        let weighted = &husimi.inverse * &husimi.mean;
        let gamma: Vec<C64> = (0..dim).map(|i| weighted[(i + k) % dim]).collect();

        let mut indices = Vec::with_capacity(2 * total);
        for offset in [0, k] {
            for (i, &count) in photons.iter().enumerate() {
                indices.extend(std::iter::repeat_n(i + offset, count));
            }
        }
        let reduced = principal_submatrix(&a_tilde, &indices);
        let loops: Vec<C64> = indices.iter().map(|&i| gamma[i]).collect();
        let weight = loop_hafnian(&reduced, &loops);
        if weight.im.abs() > 1e-9 {
            trace!(imaginary = weight.im, "loop hafnian has an imaginary residue");
        }

        let norm: f64 = photons.iter().map(|&n| factorial(n)).product();
        Ok(husimi.vacuum_probability * weight.re / norm)
    }

    fn threshold_probability(&self, modes: &[usize], clicks: &[bool]) -> WalkResult<f64> {
        self.check_query(modes, clicks.len())?;
        let (on, off): (Vec<(usize, bool)>, Vec<(usize, bool)>) =
            modes.iter().copied().zip(clicks.iter().copied()).partition(|&(_, click)| click);
        if on.len() > MAX_THRESHOLD_CLICKS {
            return Err(WalkError::backend(format!(
                "Threshold query with {} clicking detectors exceeds the limit of {}",
                on.len(),
                MAX_THRESHOLD_CLICKS
            )));
        }
        let dark: Vec<usize> = off.into_iter().map(|(mode, _)| mode).collect();

        // P(clicks on C, none on V) = Σ_{T⊆C} (−1)^|T| P(vacuum on V ∪ T)
        let mut total = 0.0;
        for subset in 0u64..(1u64 << on.len()) {
            let mut projected = dark.clone();
            projected.extend(
                on.iter()
                    .enumerate()
                    .filter(|(bit, _)| (subset >> bit) & 1 == 1)
                    .map(|(_, &(mode, _))| mode),
            );
            let sign = if subset.count_ones() % 2 == 0 { 1.0 } else { -1.0 };
            total += sign * self.husimi(&projected)?.vacuum_probability;
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-10;

    fn state(modes: usize) -> GaussianState {
        GaussianState::vacuum(modes, 8, 16).unwrap()
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < TOL,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_vacuum_statistics() -> WalkResult<()> {
        let s = state(3);
        assert_close(s.fock_probability(&[0, 1, 2], &[0, 0, 0])?, 1.0);
        assert_close(s.fock_probability(&[1], &[1])?, 0.0);
        assert_close(s.threshold_probability(&[0, 2], &[false, false])?, 1.0);
        assert_close(s.threshold_probability(&[0], &[true])?, 0.0);
        Ok(())
    }

    #[test]
    fn test_two_mode_squeezed_coincidences() -> WalkResult<()> {
        let r: f64 = 0.4;
        let mut s = state(2);
        s.prepare_two_mode_squeezed(0, 1, r, 0.3)?;
        let (t, c) = (r.tanh(), r.cosh());
        for n in 0..4 {
            let expected = t.powi(2 * n as i32) / (c * c);
            assert_close(s.fock_probability(&[0, 1], &[n, n])?, expected);
        }
        assert_close(s.fock_probability(&[0, 1], &[1, 0])?, 0.0);
        assert_close(s.fock_probability(&[0, 1], &[2, 1])?, 0.0);
        // Each arm alone is thermal with n̄ = sinh²r.
        let nbar = r.sinh().powi(2);
        assert_close(s.fock_probability(&[1], &[1])?, nbar / (nbar + 1.0).powi(2));
        assert_close(s.threshold_probability(&[0, 1], &[true, true])?, t * t);
        assert_close(s.threshold_probability(&[0, 1], &[true, false])?, 0.0);
        Ok(())
    }

    #[test]
    fn test_coherent_state_is_poissonian() -> WalkResult<()> {
        let alpha = Complex::from_polar(0.8, 1.1);
        let mut s = state(1);
        s.prepare_coherent(0, alpha)?;
        let mean = alpha.norm_sqr();
        for n in 0..6 {
            let expected = (-mean).exp() * mean.powi(n as i32) / factorial(n);
            assert_close(s.fock_probability(&[0], &[n])?, expected);
        }
        assert_close(s.threshold_probability(&[0], &[true])?, 1.0 - (-mean).exp());
        Ok(())
    }

    #[test]
    fn test_thermal_state_is_geometric() -> WalkResult<()> {
        let nbar = 0.35;
        let mut s = state(2);
        s.prepare_thermal(1, nbar)?;
        for n in 0..5 {
            let expected = nbar.powi(n as i32) / (nbar + 1.0).powi(n as i32 + 1);
            assert_close(s.fock_probability(&[1], &[n])?, expected);
        }
        assert_close(s.threshold_probability(&[1], &[true])?, nbar / (nbar + 1.0));
        Ok(())
    }

    #[test]
    fn test_beam_splitter_conserves_photon_number() -> WalkResult<()> {
        let mut s = state(3);
        s.prepare_two_mode_squeezed(0, 1, 0.3, 0.0)?;
        s.prepare_coherent(2, C64::new(0.5, 0.0))?;
        let before = s.mean_photon_number(1)? + s.mean_photon_number(2)?;
        let heralded_before = s.fock_probability(&[0, 1], &[1, 1])?;

        s.beam_splitter(1, 2, 0.3, 0.7)?;
        let after = s.mean_photon_number(1)? + s.mean_photon_number(2)?;
        assert_close(after, before);
        assert_close(s.mean_photon_number(0)?, 0.3f64.sinh().powi(2));

        // Splitting the photon between two outputs keeps the heralded rate
        // once the coherent input is removed.
        let mut pure = state(3);
        pure.prepare_two_mode_squeezed(0, 1, 0.3, 0.0)?;
        pure.beam_splitter(1, 2, 0.5, 0.0)?;
        let split = pure.fock_probability(&[0, 1, 2], &[1, 1, 0])?
            + pure.fock_probability(&[0, 1, 2], &[1, 0, 1])?;
        let mut reference = state(2);
        reference.prepare_two_mode_squeezed(0, 1, 0.3, 0.0)?;
        assert_close(split, reference.fock_probability(&[0, 1], &[1, 1])?);
        assert!(heralded_before > 0.0);
        Ok(())
    }

    #[test]
    fn test_full_swap_exchanges_modes() -> WalkResult<()> {
        let mut s = state(2);
        s.prepare_coherent(0, C64::new(0.6, 0.0))?;
        s.beam_splitter(0, 1, 1.0, 0.0)?;
        assert_close(s.mean_photon_number(0)?, 0.0);
        assert_close(s.mean_photon_number(1)?, 0.36);
        Ok(())
    }

    #[test]
    fn test_loss_attenuates_intensity() -> WalkResult<()> {
        let mut s = state(1);
        s.prepare_coherent(0, C64::new(1.0, 0.0))?;
        s.loss(0, 0.25)?;
        assert_close(s.fock_probability(&[0], &[0])?, (-0.25f64).exp());

        let mut t = state(2);
        t.prepare_two_mode_squeezed(0, 1, 0.5, 0.0)?;
        t.loss(1, 0.0)?;
        assert_close(t.fock_probability(&[1], &[0])?, 1.0);
        Ok(())
    }

    #[test]
    fn test_invalid_queries_rejected() {
        let s = state(2);
        assert!(matches!(s.fock_probability(&[0], &[9]), Err(WalkError::Backend { .. })));
        assert!(matches!(s.fock_probability(&[5], &[0]), Err(WalkError::Backend { .. })));
        assert!(matches!(s.fock_probability(&[0, 0], &[0, 0]), Err(WalkError::Backend { .. })));
        assert!(matches!(s.threshold_probability(&[0], &[true, false]), Err(WalkError::Backend { .. })));
        assert!(GaussianState::vacuum(17, 8, 16).is_err());
    }

    #[test]
    fn test_invalid_operations_rejected() {
        let mut s = state(2);
        assert!(s.beam_splitter(0, 0, 0.5, 0.0).is_err());
        assert!(s.beam_splitter(0, 1, 1.5, 0.0).is_err());
        assert!(s.loss(0, -0.1).is_err());
        assert!(s.prepare_thermal(1, f64::NAN).is_err());
        assert!(s.prepare_two_mode_squeezed(0, 1, -0.2, 0.0).is_err());
    }

    #[test]
    fn test_state_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<GaussianState>();
    }
}
