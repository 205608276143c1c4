//! Correlated field generation.
//!
//! Draws one statistically consistent realization of the (T, Q, U) sky and
//! its lensing potential from a ten-spectrum covariance block. The
//! temperature and polarization coefficients are band-limited before the
//! inverse transform so that later sub-pixel evaluation cannot alias; the
//! potential stays in coefficient form for the gradient step.

use ndarray::{Array2, Axis};
use rand::RngCore;
use tracing::debug;

use crate::error::SkyResult;
use crate::sht::{Alm, SphericalTransform};
use crate::spectrum::AngularPowerSpectrum;

/// One realization of the sky: (T, Q, U) pixel maps — shape `(3, npix)`,
/// or `(1, npix)` without polarization, never a bare pixel vector — and
/// the lensing-potential coefficients. Immutable once created; the
/// potential is consumed by the displacement step and then discarded.
#[derive(Debug, Clone)]
pub struct SkyRealization {
    pub maps: Array2<f64>,
    pub potential: Alm,
}

/// Draw a correlated (T, E, B, Φ) realization and return it in pixel
/// space, with the potential kept as coefficients.
///
/// The joint draw is delegated to the harmonic backend; the hard
/// band-limit (unit below `3·nside`, zero above) is applied to the T/E/B
/// coefficients only.
pub fn simulate_correlated<B: SphericalTransform + ?Sized>(
    sht: &B,
    spectra: &AngularPowerSpectrum,
    nside: u32,
    synlmax: usize,
    pol: bool,
    rng: &mut dyn RngCore,
) -> SkyResult<SkyRealization> {
    let [t, e, b, potential] = sht.synthesize_correlated(spectra, synlmax, rng)?;
    debug!(nside, synlmax, pol, "synthesized correlated coefficient sets");

    let cut = 3 * nside as usize;
    let mut cmb = [t, e, b];
    for alm in &mut cmb {
        alm.band_limit(cut);
    }

    let maps = if pol {
        sht.alm_to_maps_pol(&cmb, nside)?
    } else {
        let [t, _, _] = cmb;
        sht.alm_to_map(&t, nside)?.insert_axis(Axis(0))
    };

    Ok(SkyRealization { maps, potential })
}
