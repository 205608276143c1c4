//! Harmonic Taylor interpolation of a pixel-space field at displaced
//! positions.
//!
//! Each query position is anchored to the nearest pixel center, and the
//! field is expanded around that center in powers of the angular deviation
//! (dθ, sinθ·dφ). Order-o terms need the full set of order-o mixed partial
//! derivatives; these are built from the previous order's retained
//! derivative fields, one forward transform per parent, with the
//! derivative primitive supplying both the θ- and φ-derivative children at
//! once. Parents are dropped as soon as they are differentiated and
//! children as soon as they are accumulated at the final order, so working
//! memory stays at O(order) field buffers.

use std::f64::consts::{PI, TAU};

use ndarray::{Array1, ArrayView1};
use tracing::debug;

use crate::error::{SkyError, SkyResult};
use crate::healpix;
use crate::sht::SphericalTransform;

/// Lazy cumulative Taylor interpolation.
///
/// Yields exactly `order + 1` values: the cumulative interpolation result
/// after each order 0..=`order`. Consume to exhaustion for the final
/// result; partial prefixes give the lower-order approximations. A backend
/// failure ends the sequence after yielding the error.
#[derive(Debug)]
pub struct TaylorSeries<'a, B: ?Sized> {
    sht: &'a B,
    nside: u32,
    lmax: usize,
    order: usize,
    next_order: usize,
    ipix: Vec<usize>,
    dtheta: Array1<f64>,
    dphi: Array1<f64>,
    result: Array1<f64>,
    derivs: Vec<Option<Array1<f64>>>,
    failed: bool,
}

/// Begin a Taylor interpolation of `m` at the query positions
/// `(theta, phi)`.
///
/// `lmax` bounds the harmonic transforms used for derivative fields and
/// defaults to `3 · nside`; asking for more than the backend supports at
/// this resolution fails with `OutOfRange` before any work is done.
pub fn taylor_interpolate<'a, B: SphericalTransform + ?Sized>(
    sht: &'a B,
    m: ArrayView1<'_, f64>,
    theta: ArrayView1<'_, f64>,
    phi: ArrayView1<'_, f64>,
    order: usize,
    lmax: Option<usize>,
) -> SkyResult<TaylorSeries<'a, B>> {
    let nside = healpix::npix_to_nside(m.len()).ok_or(SkyError::DimensionMismatch {
        expected: nearest_npix(m.len()),
        got: m.len(),
    })?;
    if phi.len() != theta.len() {
        return Err(SkyError::DimensionMismatch {
            expected: theta.len(),
            got: phi.len(),
        });
    }

    let lmax = lmax.unwrap_or(3 * nside as usize);
    let supported = sht.max_multipole(nside);
    if lmax > supported {
        return Err(SkyError::OutOfRange {
            requested: lmax,
            supported,
        });
    }

    // Anchor each query to the nearest pixel center and record the
    // deviation from it. The φ-deviation is wrapped into (−π, π] and
    // pre-scaled by sin(colatitude), matching how the derivative primitive
    // expresses the φ-derivative.
    let n = theta.len();
    let mut ipix = Vec::with_capacity(n);
    let mut dtheta = Array1::zeros(n);
    let mut dphi = Array1::zeros(n);
    let mut result = Array1::zeros(n);
    for q in 0..n {
        let p = healpix::ang_to_pix(nside, theta[q], phi[q]);
        let (t0, p0) = healpix::pix_to_ang(nside, p);
        dtheta[q] = theta[q] - t0;
        let mut dp = phi[q] - p0;
        if dp > PI {
            dp -= TAU;
        }
        if dp < -PI {
            dp += TAU;
        }
        dphi[q] = dp * t0.sin();
        result[q] = m[p];
        ipix.push(p);
    }

    Ok(TaylorSeries {
        sht,
        nside,
        lmax,
        order,
        next_order: 0,
        ipix,
        dtheta,
        dphi,
        result,
        derivs: vec![Some(m.to_owned())],
        failed: false,
    })
}

impl<B: SphericalTransform + ?Sized> TaylorSeries<'_, B> {
    /// Accumulate the order-`o` correction terms and replace the retained
    /// derivative fields with the order-`o` set.
    fn advance(&mut self, o: usize) -> SkyResult<()> {
        let mut next: Vec<Option<Array1<f64>>> = (0..=o).map(|_| None).collect();
        let mut used = vec![false; o + 1];

        // Walk the previous level in steps of two (plus the last parent):
        // each derivative call yields both the θ- and φ-derivative child,
        // so odd parents before the last are covered by their predecessor.
        for i in 0..o {
            if i < o - 1 && i % 2 == 1 {
                continue;
            }
            let Some(parent) = self.derivs[i].take() else {
                continue;
            };
            let alm = self.sht.map_to_alm(parent.view(), self.lmax)?;
            drop(parent);
            let (_, dth, dph) = self.sht.alm_to_map_der1(&alm, self.nside, self.lmax)?;
            next[i] = Some(dth);
            next[i + 1] = Some(dph);

            for j in i..(i + 2).min(o + 1) {
                if used[j] {
                    continue;
                }
                if let Some(field) = next[j].as_ref() {
                    let weight = binomial(o, j) / factorial(o);
                    for (q, &p) in self.ipix.iter().enumerate() {
                        self.result[q] += weight
                            * field[p]
                            * self.dtheta[q].powi((o - j) as i32)
                            * self.dphi[q].powi(j as i32);
                    }
                }
                used[j] = true;
                // At the final order the derivative fields have no further
                // use; release them immediately.
                if o == self.order {
                    next[j] = None;
                }
            }
        }

        self.derivs = next;
        debug!(order = o, "accumulated taylor order");
        Ok(())
    }
}

impl<B: SphericalTransform + ?Sized> Iterator for TaylorSeries<'_, B> {
    type Item = SkyResult<Array1<f64>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.next_order > self.order {
            return None;
        }
        if self.next_order == 0 {
            self.next_order = 1;
            return Some(Ok(self.result.clone()));
        }
        let o = self.next_order;
        match self.advance(o) {
            Ok(()) => {
                self.next_order += 1;
                Some(Ok(self.result.clone()))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

fn factorial(n: usize) -> f64 {
    (1..=n).map(|k| k as f64).product()
}

fn binomial(n: usize, k: usize) -> f64 {
    factorial(n) / (factorial(k) * factorial(n - k))
}

/// Closest valid HEALPix map size, for error reporting.
fn nearest_npix(len: usize) -> usize {
    let guess = ((len as f64 / 12.0).sqrt().round() as usize).max(1);
    healpix::npix(guess.next_power_of_two() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ReferenceBackend;

    fn assert_close(a: f64, b: f64, tol: f64) {
        assert!(
            (a - b).abs() < tol,
            "expected {a} ~= {b} (diff = {})",
            (a - b).abs()
        );
    }

    /// Smooth axisymmetric test field: f(θ) = cos θ.
    fn cos_theta_map(nside: u32) -> Array1<f64> {
        let (theta, _) = healpix::pixel_positions(nside);
        theta.mapv(f64::cos)
    }

    #[test]
    fn order_zero_at_pixel_centers_is_exact() {
        let nside = 4;
        let m = cos_theta_map(nside);
        let (theta, phi) = healpix::pixel_positions(nside);
        let sht = ReferenceBackend;

        let mut series =
            taylor_interpolate(&sht, m.view(), theta.view(), phi.view(), 0, None).unwrap();
        let first = series.next().unwrap().unwrap();
        assert_eq!(first, m);
        assert!(series.next().is_none());
    }

    #[test]
    fn yields_exactly_order_plus_one_values() {
        let nside = 4;
        let m = cos_theta_map(nside);
        let (theta, phi) = healpix::pixel_positions(nside);
        let sht = ReferenceBackend;

        for order in [0usize, 1, 3] {
            let series =
                taylor_interpolate(&sht, m.view(), theta.view(), phi.view(), order, None).unwrap();
            let steps: Vec<_> = series.collect::<SkyResult<_>>().unwrap();
            assert_eq!(steps.len(), order + 1);
        }
    }

    #[test]
    fn zero_deviation_leaves_all_orders_equal() {
        // Queries at exact pixel centers: every correction term carries a
        // factor dθ or dφ equal to zero, so all cumulative orders match.
        let nside = 4;
        let m = cos_theta_map(nside);
        let (theta, phi) = healpix::pixel_positions(nside);
        let sht = ReferenceBackend;

        let series =
            taylor_interpolate(&sht, m.view(), theta.view(), phi.view(), 3, None).unwrap();
        let steps: Vec<_> = series.collect::<SkyResult<_>>().unwrap();
        assert_eq!(steps.len(), 4);
        for step in &steps {
            assert_eq!(step, &m);
        }
    }

    #[test]
    fn successive_orders_refine_toward_displaced_value() {
        // Displace every query a fraction of a pixel toward the south and
        // check the expansion moves toward cos(θ + δ).
        let nside = 8;
        let m = cos_theta_map(nside);
        let (theta, phi) = healpix::pixel_positions(nside);
        let delta = 0.01;
        let qtheta = theta.mapv(|t| (t + delta).min(std::f64::consts::PI));
        let sht = ReferenceBackend;

        let series =
            taylor_interpolate(&sht, m.view(), qtheta.view(), phi.view(), 2, None).unwrap();
        let steps: Vec<_> = series.collect::<SkyResult<_>>().unwrap();
        assert_eq!(steps.len(), 3);

        // Use an equatorial pixel (well away from the poles) for the check.
        let q = (0..theta.len())
            .min_by(|&a, &b| {
                let da = (theta[a] - std::f64::consts::FRAC_PI_2).abs();
                let db = (theta[b] - std::f64::consts::FRAC_PI_2).abs();
                da.partial_cmp(&db).unwrap()
            })
            .unwrap();
        let target = qtheta[q].cos();
        let err0 = (steps[0][q] - target).abs();
        let err1 = (steps[1][q] - target).abs();
        assert!(
            err1 < err0,
            "first order did not improve: {err0} -> {err1}"
        );
    }

    #[test]
    fn excessive_lmax_is_out_of_range() {
        let nside = 4;
        let m = cos_theta_map(nside);
        let (theta, phi) = healpix::pixel_positions(nside);
        let sht = ReferenceBackend;
        let supported = sht.max_multipole(nside);

        let err = taylor_interpolate(
            &sht,
            m.view(),
            theta.view(),
            phi.view(),
            3,
            Some(supported + 1),
        )
        .unwrap_err();
        assert_eq!(
            err,
            SkyError::OutOfRange {
                requested: supported + 1,
                supported,
            }
        );
    }

    #[test]
    fn invalid_map_length_is_dimension_mismatch() {
        let m = Array1::zeros(100); // not 12·nside²
        let theta = Array1::zeros(1);
        let phi = Array1::zeros(1);
        let sht = ReferenceBackend;
        assert!(matches!(
            taylor_interpolate(&sht, m.view(), theta.view(), phi.view(), 1, None),
            Err(SkyError::DimensionMismatch { .. })
        ));
    }
}
