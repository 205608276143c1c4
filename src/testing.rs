//! Test support: a deterministic reference harmonic backend.
//!
//! Implements [`SphericalTransform`] over axisymmetric (m = 0) modes only,
//! using Legendre recurrences and equal-area pixel quadrature. That subset
//! is exact enough to exercise the synthesis, displacement and
//! interpolation chains deterministically; it is not a general transform.
//! Limitations, by design:
//!
//! - `synthesize_correlated` draws from the auto-spectra only (the tests
//!   use spectra whose cross terms are zero);
//! - the polarized inverse transform treats E and B as scalar fields
//!   standing in for Q and U (zero coefficients still map to zero maps).

use std::f64::consts::PI;

use ndarray::{Array1, Array2, ArrayView1, Axis};
use num_complex::Complex64;
use rand::RngCore;
use rand_distr::{Distribution, StandardNormal};

use crate::error::SkyResult;
use crate::healpix;
use crate::sht::{Alm, SphericalTransform};
use crate::spectrum::{AngularPowerSpectrum, SpectrumKind};

#[derive(Debug)]
pub struct ReferenceBackend;

/// P_l(x) for l = 0..=lmax by the standard three-term recurrence.
fn legendre(lmax: usize, x: f64) -> Vec<f64> {
    let mut p = vec![0.0; lmax + 1];
    p[0] = 1.0;
    if lmax >= 1 {
        p[1] = x;
    }
    for l in 2..=lmax {
        let lf = l as f64;
        p[l] = ((2.0 * lf - 1.0) * x * p[l - 1] - (lf - 1.0) * p[l - 2]) / lf;
    }
    p
}

/// dP_l/dθ for l = 0..=lmax at colatitude θ, via
/// dP_l/dθ = l (x P_l − P_{l−1}) / sin θ with x = cos θ.
fn legendre_dtheta(lmax: usize, theta: f64) -> Vec<f64> {
    let x = theta.cos();
    let sint = theta.sin();
    let p = legendre(lmax, x);
    let mut d = vec![0.0; lmax + 1];
    if sint.abs() < 1e-12 {
        return d; // axisymmetric derivative vanishes at the poles
    }
    for l in 1..=lmax {
        d[l] = l as f64 * (x * p[l] - p[l - 1]) / sint;
    }
    d
}

/// sqrt((2l+1)/4π), the m = 0 spherical-harmonic normalization.
fn norm(l: usize) -> f64 {
    ((2 * l + 1) as f64 / (4.0 * PI)).sqrt()
}

impl SphericalTransform for ReferenceBackend {
    fn max_multipole(&self, nside: u32) -> usize {
        4 * nside as usize
    }

    fn synthesize_correlated(
        &self,
        spectra: &AngularPowerSpectrum,
        lmax: usize,
        rng: &mut dyn RngCore,
    ) -> SkyResult<[Alm; 4]> {
        let mut alms = [
            Alm::zeros(lmax),
            Alm::zeros(lmax),
            Alm::zeros(lmax),
            Alm::zeros(lmax),
        ];
        let kinds = [
            SpectrumKind::TT,
            SpectrumKind::EE,
            SpectrumKind::BB,
            SpectrumKind::PP,
        ];
        for l in 2..=lmax.min(spectra.lmax()) {
            for (k, kind) in kinds.iter().enumerate() {
                let z: f64 = StandardNormal.sample(rng);
                let amp = spectra.get(*kind, l).max(0.0).sqrt();
                alms[k].set(l, 0, Complex64::new(amp * z, 0.0));
            }
        }
        Ok(alms)
    }

    fn map_to_alm(&self, map: ArrayView1<'_, f64>, lmax: usize) -> SkyResult<Alm> {
        let nside = healpix::npix_to_nside(map.len()).expect("valid map length");
        let domega = 4.0 * PI / map.len() as f64;
        let mut alm = Alm::zeros(lmax);
        for p in 0..map.len() {
            let (theta, _) = healpix::pix_to_ang(nside, p);
            let leg = legendre(lmax, theta.cos());
            for l in 0..=lmax {
                let contrib = map[p] * norm(l) * leg[l] * domega;
                let prev = alm.get(l, 0);
                alm.set(l, 0, prev + Complex64::new(contrib, 0.0));
            }
        }
        Ok(alm)
    }

    fn alm_to_map(&self, alm: &Alm, nside: u32) -> SkyResult<Array1<f64>> {
        let npix = healpix::npix(nside);
        let lmax = alm.lmax();
        let mut map = Array1::zeros(npix);
        for p in 0..npix {
            let (theta, _) = healpix::pix_to_ang(nside, p);
            let leg = legendre(lmax, theta.cos());
            let mut v = 0.0;
            for l in 0..=lmax {
                v += alm.get(l, 0).re * norm(l) * leg[l];
            }
            map[p] = v;
        }
        Ok(map)
    }

    fn alm_to_maps_pol(&self, alms: &[Alm; 3], nside: u32) -> SkyResult<Array2<f64>> {
        let rows = [
            self.alm_to_map(&alms[0], nside)?,
            self.alm_to_map(&alms[1], nside)?,
            self.alm_to_map(&alms[2], nside)?,
        ];
        let mut out = Array2::zeros((3, healpix::npix(nside)));
        for (k, row) in rows.iter().enumerate() {
            out.index_axis_mut(Axis(0), k).assign(row);
        }
        Ok(out)
    }

    fn alm_to_map_der1(
        &self,
        alm: &Alm,
        nside: u32,
        lmax: usize,
    ) -> SkyResult<(Array1<f64>, Array1<f64>, Array1<f64>)> {
        let npix = healpix::npix(nside);
        let lmax = lmax.min(alm.lmax());
        let mut map = Array1::zeros(npix);
        let mut dtheta = Array1::zeros(npix);
        let dphi = Array1::zeros(npix); // m = 0: no φ-dependence
        for p in 0..npix {
            let (theta, _) = healpix::pix_to_ang(nside, p);
            let leg = legendre(lmax, theta.cos());
            let dleg = legendre_dtheta(lmax, theta);
            let mut v = 0.0;
            let mut dv = 0.0;
            for l in 0..=lmax {
                let a = alm.get(l, 0).re * norm(l);
                v += a * leg[l];
                dv += a * dleg[l];
            }
            map[p] = v;
            dtheta[p] = dv;
        }
        Ok((map, dtheta, dphi))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn assert_close(a: f64, b: f64, tol: f64) {
        assert!(
            (a - b).abs() < tol,
            "expected {a} ~= {b} (diff = {})",
            (a - b).abs()
        );
    }

    #[test]
    fn legendre_known_values() {
        let p = legendre(3, 0.5);
        assert_close(p[0], 1.0, 1e-15);
        assert_close(p[1], 0.5, 1e-15);
        assert_close(p[2], 0.5 * (3.0 * 0.25 - 1.0), 1e-15);
        assert_close(p[3], 0.5 * (5.0 * 0.125 - 3.0 * 0.5), 1e-15);
    }

    #[test]
    fn derivative_matches_finite_difference() {
        let theta = 1.1;
        let h = 1e-6;
        let lmax = 8;
        let d = legendre_dtheta(lmax, theta);
        let plus = legendre(lmax, (theta + h).cos());
        let minus = legendre(lmax, (theta - h).cos());
        for l in 0..=lmax {
            let fd = (plus[l] - minus[l]) / (2.0 * h);
            assert_close(d[l], fd, 1e-6);
        }
    }

    #[test]
    fn analysis_recovers_low_multipoles() {
        // f(θ) = cosθ is sqrt(4π/3)·Y_10; quadrature over pixel centers
        // should recover a_10 to a fraction of a percent.
        let backend = ReferenceBackend;
        let nside = 16;
        let (theta, _) = healpix::pixel_positions(nside);
        let map = theta.mapv(f64::cos);
        let alm = backend.map_to_alm(map.view(), 8).unwrap();

        let expected = (4.0 * PI / 3.0).sqrt();
        assert_close(alm.get(1, 0).re, expected, expected * 1e-2);
        for l in [0usize, 2, 3, 4] {
            assert!(alm.get(l, 0).re.abs() < 1e-2, "l = {l} leaked");
        }
    }

    #[test]
    fn synthesis_analysis_roundtrip_for_dipole() {
        let backend = ReferenceBackend;
        let mut alm = Alm::zeros(4);
        alm.set(1, 0, Complex64::new(2.5, 0.0));
        let map = backend.alm_to_map(&alm, 16).unwrap();
        let back = backend.map_to_alm(map.view(), 4).unwrap();
        assert_close(back.get(1, 0).re, 2.5, 0.05);
    }

    #[test]
    fn zero_coefficients_give_zero_everything() {
        let backend = ReferenceBackend;
        let alm = Alm::zeros(12);
        let (map, dtheta, dphi) = backend.alm_to_map_der1(&alm, 8, 12).unwrap();
        assert!(map.iter().all(|&v| v == 0.0));
        assert!(dtheta.iter().all(|&v| v == 0.0));
        assert!(dphi.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn correlated_synthesis_is_seed_deterministic() {
        let backend = ReferenceBackend;
        let mut spec = AngularPowerSpectrum::zeros(16);
        let tt: Vec<f64> = (2..=16).map(|l| 1.0 / l as f64).collect();
        spec.set_spectrum(SpectrumKind::TT, &tt).unwrap();

        let mut rng_a = StdRng::seed_from_u64(21);
        let mut rng_b = StdRng::seed_from_u64(21);
        let a = backend.synthesize_correlated(&spec, 16, &mut rng_a).unwrap();
        let b = backend.synthesize_correlated(&spec, 16, &mut rng_b).unwrap();
        assert_eq!(a, b);
    }
}
