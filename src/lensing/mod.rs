//! Weak-lensing remapping of a correlated CMB realization.
//!
//! Ties together the synthesis chain: draw a correlated (T, E, B, Φ)
//! realization, turn the potential's gradient into a per-pixel
//! displacement on the sphere, evaluate each component map at the
//! displaced positions by Taylor interpolation, and re-apply the
//! polarization-frame rotation induced by the displacement.

pub mod displace;
pub mod taylor;

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::error::{SkyError, SkyResult};
use crate::healpix;
use crate::realization::simulate_correlated;
use crate::sht::SphericalTransform;
use crate::spectrum::AngularPowerSpectrum;

pub use displace::{offset_positions, DisplacementField, Rotation};
pub use taylor::{taylor_interpolate, TaylorSeries};

/// Options for [`lens`].
#[derive(Debug, Clone)]
pub struct LensOptions {
    /// Maximum multipole for the joint synthesis. Defaults to `8 · nside`,
    /// capped at the spectrum's own maximum.
    pub synlmax: Option<usize>,
    /// Taylor expansion order.
    pub order: usize,
    /// Use the lower-fidelity additive geodesic offset instead of the
    /// spherical-trigonometry step.
    pub geodesic: bool,
    /// Synthesize polarization. When off, the result is `(1, npix)`.
    pub pol: bool,
    /// Multipole limit for interpolation derivatives. Defaults to
    /// `3 · nside`.
    pub interp_lmax: Option<usize>,
    /// Residual lensing-power fractions per multipole (l = 2..=lmax), for
    /// partial delensing.
    pub delensing: Option<Vec<f64>>,
}

impl Default for LensOptions {
    fn default() -> Self {
        LensOptions {
            synlmax: None,
            order: 3,
            geodesic: false,
            pol: true,
            interp_lmax: None,
            delensing: None,
        }
    }
}

/// Synthesize a lensed CMB realization.
///
/// Draws a (T, Q, U) + Φ realization of `spectra` at resolution `nside`
/// with the given `seed`, displaces every pixel along the potential's
/// gradient, and returns the remapped maps — shape `(3, npix)`, or
/// `(1, npix)` without polarization. All randomness comes from the seed;
/// identical inputs give bit-identical output.
pub fn lens<B: SphericalTransform + ?Sized>(
    sht: &B,
    spectra: &AngularPowerSpectrum,
    nside: u32,
    seed: u64,
    opts: &LensOptions,
) -> SkyResult<Array2<f64>> {
    if !healpix::is_valid_nside(nside) {
        return Err(SkyError::DimensionMismatch {
            expected: nside.max(1).next_power_of_two() as usize,
            got: nside as usize,
        });
    }

    let delensed;
    let spectra = match &opts.delensing {
        Some(fractions) => {
            delensed = spectra.delensed(fractions)?;
            &delensed
        }
        None => spectra,
    };

    let synlmax = opts
        .synlmax
        .unwrap_or(8 * nside as usize)
        .min(spectra.lmax());
    info!(nside, synlmax, seed, "synthesizing lensed realization");

    let mut rng = StdRng::seed_from_u64(seed);
    let realization = simulate_correlated(sht, spectra, nside, synlmax, opts.pol, &mut rng)?;

    // Gradient of the potential, then the per-pixel displacement.
    let (_, grad_theta, grad_phi) =
        sht.alm_to_map_der1(&realization.potential, nside, synlmax)?;
    let (itheta, iphi) = healpix::pixel_positions(nside);
    let pol = opts.pol && realization.maps.nrows() >= 3;
    let disp = offset_positions(
        itheta.view(),
        iphi.view(),
        grad_theta.view(),
        grad_phi.view(),
        pol,
        opts.geodesic,
    )?;
    debug!(order = opts.order, geodesic = opts.geodesic, "displacement field ready");

    // Interpolate the components one at a time, consuming each Taylor
    // sequence to exhaustion.
    let mut lensed = Array2::zeros(realization.maps.raw_dim());
    for (k, comp) in realization.maps.outer_iter().enumerate() {
        let series = taylor_interpolate(
            sht,
            comp,
            disp.theta.view(),
            disp.phi.view(),
            opts.order,
            opts.interp_lmax,
        )?;
        let mut last: Option<Array1<f64>> = None;
        for step in series {
            last = Some(step?);
        }
        if let Some(v) = last {
            lensed.row_mut(k).assign(&v);
        }
    }

    if let Some(rot) = &disp.rot {
        apply_rotation(&mut lensed, rot);
    }
    Ok(lensed)
}

/// Rotate the (Q, U) rows of a polarized map set by the per-pixel frame
/// rotation (cos 2γ, sin 2γ).
///
/// The rotation takes effect in place: Q' = c·Q − s·U, U' = s·Q + c·U.
/// Maps with fewer than three rows are left untouched.
pub fn apply_rotation(maps: &mut Array2<f64>, rot: &Rotation) {
    if maps.nrows() < 3 {
        return;
    }
    for p in 0..maps.ncols() {
        let q = maps[[1, p]];
        let u = maps[[2, p]];
        maps[[1, p]] = rot.cos2g[p] * q - rot.sin2g[p] * u;
        maps[[2, p]] = rot.sin2g[p] * q + rot.cos2g[p] * u;
    }
}
