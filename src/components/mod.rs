//! Sky emission components and their frequency-scaling laws.
//!
//! Each component owns its templates and spectral parameters and
//! implements [`SedModel`]: maps of (T, Q, U) scaled to a requested
//! observing frequency. Components are built from config structs whose
//! `build` method validates required fields once, up front; the selected
//! scaling law is a tagged enum resolved at build time.

pub mod ame;
pub mod cmb;
pub mod dust;
pub mod freefree;
pub mod synchrotron;

pub use ame::{Ame, AmeConfig, AmeModel};
pub use cmb::{Cmb, CmbConfig, CmbModel, CmbSky};
pub use dust::{Dust, DustConfig, DustModel};
pub use freefree::{Freefree, FreefreeConfig, FreefreeModel};
pub use synchrotron::{Synchrotron, SynchrotronConfig, SynchrotronModel};

use ndarray::{Array1, Array2};

use crate::error::SkyResult;
use crate::units::{BOLTZMANN_K, PLANCK_H};

/// The scaling contract every emission component implements: (T, Q, U)
/// maps of shape `(3, npix)` at an observing frequency in GHz.
pub trait SedModel {
    fn evaluate(&self, nu: f64) -> SkyResult<Array2<f64>>;

    /// Maps at several frequencies. Components with joint cross-frequency
    /// behavior (decorrelation) override this; the default is an
    /// independent per-frequency evaluation.
    fn evaluate_many(&self, freqs: &[f64]) -> SkyResult<Vec<Array2<f64>>> {
        freqs.iter().map(|&nu| self.evaluate(nu)).collect()
    }
}

/// A spectral parameter that is either spatially constant or a per-pixel
/// map.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamMap {
    Constant(f64),
    Map(Array1<f64>),
}

impl ParamMap {
    pub fn at(&self, p: usize) -> f64 {
        match self {
            ParamMap::Constant(c) => *c,
            ParamMap::Map(m) => m[p],
        }
    }

    /// Pixel count for map-valued parameters, None for constants.
    pub fn len(&self) -> Option<usize> {
        match self {
            ParamMap::Constant(_) => None,
            ParamMap::Map(m) => Some(m.len()),
        }
    }
}

impl From<f64> for ParamMap {
    fn from(c: f64) -> Self {
        ParamMap::Constant(c)
    }
}

impl From<Array1<f64>> for ParamMap {
    fn from(m: Array1<f64>) -> Self {
        ParamMap::Map(m)
    }
}

/// Power-law scaling from reference frequency `nu_0` to `nu` with
/// spectral index `b`.
pub fn power_law(nu: f64, nu_0: f64, b: f64) -> f64 {
    (nu / nu_0).powf(b)
}

/// Black-body ratio scaling for an emitter of temperature `t` (kelvin),
/// from reference frequency `nu_0` to `nu` (both GHz).
pub fn black_body(nu: f64, nu_0: f64, t: f64) -> f64 {
    let ex = |f: f64| (-PLANCK_H * f * 1e9 / (BOLTZMANN_K * t)).exp();
    nu / nu_0 * ex(nu) / ex(nu_0) * (ex(nu_0) - 1.0) / (ex(nu) - 1.0)
}
