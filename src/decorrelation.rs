//! Stochastic frequency decorrelation.
//!
//! An SED scaling is normally deterministic in frequency. Decorrelation
//! injects a multiplicative perturbation per frequency channel whose
//! correlation falls off with distance in log-frequency, constrained to be
//! exactly one at a reference frequency. The machinery is a conditional
//! Gaussian: a correlation matrix over the augmented frequency list is
//! inverted, the reference channel is conditioned out, and the remaining
//! block yields a covariance square root and conditional mean.

use std::cell::RefCell;

use nalgebra::{DMatrix, DVector};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};
use tracing::debug;

use crate::components::SedModel;
use crate::error::{SkyError, SkyResult};

/// Max-norm residual allowed for ‖M·M⁻¹ − I‖ before the inverse is
/// declared unstable.
const INVERSE_TOLERANCE: f64 = 1e-8;

/// Relative diagonal jitter added per stabilization attempt.
const STABILIZE_EPS: f64 = 1e-12;

/// Number of jitter retries before giving up with `SingularMatrix`.
const STABILIZE_RETRIES: usize = 3;

/// Invert a symmetric matrix, stabilizing rather than propagating NaNs.
///
/// Uses a symmetric eigendecomposition. When an eigenvalue is not strictly
/// positive, a small diagonal term is added and the decomposition retried a
/// bounded number of times; the reconstructed inverse is accepted only if
/// its residual against the original matrix is within tolerance.
fn invert_safe(matrix: &DMatrix<f64>) -> SkyResult<DMatrix<f64>> {
    let n = matrix.nrows();
    let identity = DMatrix::<f64>::identity(n, n);
    let mut work = matrix.clone();
    let mut residual = f64::INFINITY;

    for _ in 0..=STABILIZE_RETRIES {
        let eig = work.clone().symmetric_eigen();
        if eig.eigenvalues.iter().all(|&w| w > 0.0) {
            let inv_diag =
                DVector::from_iterator(n, eig.eigenvalues.iter().map(|&w| 1.0 / w));
            let inverse =
                &eig.eigenvectors * DMatrix::from_diagonal(&inv_diag) * eig.eigenvectors.transpose();
            residual = (matrix * &inverse - &identity).abs().max();
            if residual < INVERSE_TOLERANCE {
                return Ok(inverse);
            }
        }
        let scale = work.diagonal().amax().max(1.0);
        work += &identity * (scale * STABILIZE_EPS);
    }

    Err(SkyError::SingularMatrix { residual })
}

/// Conditional mean and covariance square root of the per-frequency
/// multiplicative perturbation, keyed by (frequencies, reference frequency,
/// correlation length). Recomputed per call; nothing is cached.
#[derive(Debug, Clone, PartialEq)]
pub struct DecorrelationModel {
    covariance: DMatrix<f64>,
    mean: DVector<f64>,
}

impl DecorrelationModel {
    /// Solve for the perturbation statistics over `freqs`.
    ///
    /// `corrlen` is the correlation length in natural-log-frequency space;
    /// a non-positive value disables decorrelation (unit mean, zero
    /// covariance). The reference frequency is prepended to the frequency
    /// list when absent; when it is already present, its channel comes back
    /// with zero covariance and unit mean (the constrained channel does not
    /// fluctuate). The output is always sized to `freqs`.
    pub fn build(freqs: &[f64], freq_ref: f64, corrlen: f64) -> SkyResult<Self> {
        let n = freqs.len();
        if n == 0 {
            return Err(SkyError::DimensionMismatch {
                expected: 1,
                got: 0,
            });
        }
        if corrlen <= 0.0 {
            return Ok(DecorrelationModel {
                covariance: DMatrix::zeros(n, n),
                mean: DVector::from_element(n, 1.0),
            });
        }

        let mut freqtot = freqs.to_vec();
        let (indref, added) = match freqs.iter().position(|&f| f == freq_ref) {
            Some(i) => (i, false),
            None => {
                freqtot.insert(0, freq_ref);
                (0, true)
            }
        };

        let m = freqtot.len();
        let logf: Vec<f64> = freqtot.iter().map(|f| f.ln()).collect();
        let corr = DMatrix::from_fn(m, m, |i, j| {
            (-0.5 * ((logf[i] - logf[j]) / corrlen).powi(2)).exp()
        });

        let corr_inv = invert_safe(&corr)?;

        // Unconstrained block: drop the reference row/column of the inverse
        // and invert back.
        let unconstrained_inv = corr_inv
            .clone()
            .remove_row(indref)
            .remove_column(indref);
        let unconstrained = invert_safe(&unconstrained_inv)?;

        // Conditional mean against the constrained reference channel.
        let cross = corr_inv.column(indref).clone_owned().remove_row(indref);
        let mean_u = -(&unconstrained * cross);

        // Non-negative-definite square root: eigenvalues are clamped at
        // zero so mild numerical noise cannot produce an invalid root.
        let eig = unconstrained.symmetric_eigen();
        let sqrt_diag = DVector::from_iterator(
            m - 1,
            eig.eigenvalues.iter().map(|&w| w.max(0.0).sqrt()),
        );
        let covar_u =
            &eig.eigenvectors * DMatrix::from_diagonal(&sqrt_diag) * eig.eigenvectors.transpose();

        if added {
            // Dropping the synthetic reference row/column already restored
            // the input shape and ordering.
            return Ok(DecorrelationModel {
                covariance: covar_u,
                mean: mean_u,
            });
        }

        // The reference was part of the input list: reinsert its channel at
        // the original position with zero covariance and unit mean.
        let tail = n - 1 - indref;
        let mut covariance = DMatrix::<f64>::zeros(n, n);
        covariance
            .view_mut((0, 0), (indref, indref))
            .copy_from(&covar_u.view((0, 0), (indref, indref)));
        covariance
            .view_mut((indref + 1, 0), (tail, indref))
            .copy_from(&covar_u.view((indref, 0), (tail, indref)));
        covariance
            .view_mut((0, indref + 1), (indref, tail))
            .copy_from(&covar_u.view((0, indref), (indref, tail)));
        covariance
            .view_mut((indref + 1, indref + 1), (tail, tail))
            .copy_from(&covar_u.view((indref, indref), (tail, tail)));

        let mut mean = DVector::from_element(n, 1.0);
        mean.rows_mut(0, indref).copy_from(&mean_u.rows(0, indref));
        mean.rows_mut(indref + 1, tail)
            .copy_from(&mean_u.rows(indref, tail));

        Ok(DecorrelationModel { covariance, mean })
    }

    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }

    pub fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    /// One perturbation realization: mean + covariance · z, z ~ N(0, I).
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> DVector<f64> {
        let n = self.mean.len();
        let z = DVector::from_iterator(n, (0..n).map(|_| StandardNormal.sample(rng)));
        &self.mean + &self.covariance * z
    }
}

/// An SED model wrapped with stochastic frequency decorrelation.
///
/// Intensity and polarization decorrelate independently, with Q and U
/// sharing one perturbation (polarization decorrelates as a unit). With a
/// non-positive correlation length the wrapper reproduces the inner model
/// exactly.
#[derive(Debug)]
pub struct Decorrelated<M> {
    inner: M,
    freq_ref_i: f64,
    freq_ref_p: f64,
    corr_len: f64,
    rng: RefCell<StdRng>,
}

impl<M> Decorrelated<M> {
    pub fn new(inner: M, freq_ref_i: f64, freq_ref_p: f64, corr_len: f64, seed: u64) -> Self {
        Decorrelated {
            inner,
            freq_ref_i,
            freq_ref_p,
            corr_len,
            rng: RefCell::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn inner(&self) -> &M {
        &self.inner
    }
}

impl<M: SedModel> SedModel for Decorrelated<M> {
    fn evaluate(&self, nu: f64) -> SkyResult<Array2<f64>> {
        self.evaluate_many(std::slice::from_ref(&nu))?
            .pop()
            .ok_or(SkyError::DimensionMismatch {
                expected: 1,
                got: 0,
            })
    }

    fn evaluate_many(&self, freqs: &[f64]) -> SkyResult<Vec<Array2<f64>>> {
        let mut outputs = self.inner.evaluate_many(freqs)?;

        let model_i = DecorrelationModel::build(freqs, self.freq_ref_i, self.corr_len)?;
        let model_p = DecorrelationModel::build(freqs, self.freq_ref_p, self.corr_len)?;

        let mut rng = self.rng.borrow_mut();
        let rho_i = model_i.draw(&mut *rng);
        let rho_p = model_p.draw(&mut *rng);
        debug!(
            n_freqs = freqs.len(),
            corr_len = self.corr_len,
            "drew frequency-decorrelation perturbation"
        );

        for (k, out) in outputs.iter_mut().enumerate() {
            out.row_mut(0).mapv_inplace(|v| v * rho_i[k]);
            out.row_mut(1).mapv_inplace(|v| v * rho_p[k]);
            out.row_mut(2).mapv_inplace(|v| v * rho_p[k]);
        }
        Ok(outputs)
    }
}
