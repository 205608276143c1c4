//! Spherical-harmonic coefficient storage and the narrow interface to an
//! external harmonic-transform library.
//!
//! The synthesis core never computes transforms itself: everything that
//! touches spherical harmonics goes through [`SphericalTransform`]. Pixel
//! maps exchanged over this interface are ordered by the nested scheme of
//! [`crate::healpix`].

use ndarray::{Array1, Array2, ArrayView1};
use num_complex::Complex64;
use rand::RngCore;

use crate::error::SkyResult;
use crate::spectrum::AngularPowerSpectrum;

/// Packed spherical-harmonic coefficients a_lm for a real field.
///
/// Coefficients are stored for m in 0..=lmax and l in m..=lmax at index
/// `m * (2 * lmax + 1 - m) / 2 + l`, the layout conventionally produced by
/// harmonic-analysis libraries.
#[derive(Debug, Clone, PartialEq)]
pub struct Alm {
    lmax: usize,
    coeffs: Vec<Complex64>,
}

impl Alm {
    /// All-zero coefficients up to `lmax`.
    pub fn zeros(lmax: usize) -> Self {
        let len = (lmax + 1) * (lmax + 2) / 2;
        Alm {
            lmax,
            coeffs: vec![Complex64::new(0.0, 0.0); len],
        }
    }

    pub fn lmax(&self) -> usize {
        self.lmax
    }

    /// Number of stored (l, m) coefficients.
    pub fn len(&self) -> usize {
        self.coeffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coeffs.is_empty()
    }

    fn index(&self, l: usize, m: usize) -> usize {
        debug_assert!(m <= l && l <= self.lmax);
        m * (2 * self.lmax + 1 - m) / 2 + l
    }

    pub fn get(&self, l: usize, m: usize) -> Complex64 {
        self.coeffs[self.index(l, m)]
    }

    pub fn set(&mut self, l: usize, m: usize, value: Complex64) {
        let idx = self.index(l, m);
        self.coeffs[idx] = value;
    }

    /// Multiply every coefficient of degree l by `f(l)`.
    pub fn scale_by_ell(&mut self, f: impl Fn(usize) -> f64) {
        for m in 0..=self.lmax {
            for l in m..=self.lmax {
                let idx = m * (2 * self.lmax + 1 - m) / 2 + l;
                self.coeffs[idx] *= f(l);
            }
        }
    }

    /// Hard band-limit: unit response below `lcut`, zero at and above.
    ///
    /// Applied to synthesized coefficients to prevent aliasing when the
    /// field is later evaluated at sub-pixel positions.
    pub fn band_limit(&mut self, lcut: usize) {
        self.scale_by_ell(|l| if l < lcut { 1.0 } else { 0.0 });
    }
}

/// Abstract harmonic-transform capability consumed by the synthesis core.
///
/// Implementations are expected to be polarization-aware and to use the
/// pixel ordering of [`crate::healpix`]. All methods are deterministic for
/// a given input (and RNG state, for synthesis).
pub trait SphericalTransform {
    /// Largest multipole the implementation supports for maps at `nside`.
    fn max_multipole(&self, nside: u32) -> usize;

    /// Draw a joint realization of correlated (T, E, B, Φ) coefficient sets
    /// consistent with the ten-spectrum covariance structure of `spectra`,
    /// up to `lmax`, consuming `rng`.
    fn synthesize_correlated(
        &self,
        spectra: &AngularPowerSpectrum,
        lmax: usize,
        rng: &mut dyn RngCore,
    ) -> SkyResult<[Alm; 4]>;

    /// Forward transform of a scalar map.
    fn map_to_alm(&self, map: ArrayView1<'_, f64>, lmax: usize) -> SkyResult<Alm>;

    /// Inverse transform of a scalar coefficient set.
    fn alm_to_map(&self, alm: &Alm, nside: u32) -> SkyResult<Array1<f64>>;

    /// Polarized inverse transform: (T, E, B) coefficients to (T, Q, U)
    /// maps of shape `(3, npix)`.
    fn alm_to_maps_pol(&self, alms: &[Alm; 3], nside: u32) -> SkyResult<Array2<f64>>;

    /// Map plus its first angular derivatives: returns
    /// `(f, ∂f/∂θ, sin⁻¹θ · ∂f/∂φ)`.
    fn alm_to_map_der1(
        &self,
        alm: &Alm,
        nside: u32,
        lmax: usize,
    ) -> SkyResult<(Array1<f64>, Array1<f64>, Array1<f64>)>;
}
