//! The CMB component: a lensed realization synthesized on the fly, or
//! precomputed template maps, scaled from thermodynamic to Rayleigh-Jeans
//! units per observing frequency.

use ndarray::{stack, Array1, Array2, Axis};

use crate::components::SedModel;
use crate::error::{SkyError, SkyResult};
use crate::lensing::{lens, LensOptions};
use crate::sht::SphericalTransform;
use crate::spectrum::AngularPowerSpectrum;
use crate::units::cmb_to_rj;

const COMPONENT: &str = "CMB";

fn require<T>(value: Option<T>, field: &'static str) -> SkyResult<T> {
    value.ok_or(SkyError::ConfigurationMissing {
        component: COMPONENT,
        field,
    })
}

/// Available CMB models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmbModel {
    /// Synthesize and lens a realization from input spectra.
    Taylens,
    /// Scale stored (T, Q, U) template maps.
    PreComputed,
}

/// CMB parameters. `Taylens` requires the spectra, resolution and seed
/// (plus the delensing fractions when `delens` is set); `PreComputed`
/// requires the three template maps.
#[derive(Debug, Clone, Default)]
pub struct CmbConfig {
    pub model: Option<CmbModel>,
    pub cmb_specs: Option<AngularPowerSpectrum>,
    pub delens: Option<bool>,
    pub delensing_ells: Option<Vec<f64>>,
    pub nside: Option<u32>,
    pub cmb_seed: Option<u64>,
    pub a_i: Option<Array1<f64>>,
    pub a_q: Option<Array1<f64>>,
    pub a_u: Option<Array1<f64>>,
}

impl CmbConfig {
    pub fn build(self) -> SkyResult<Cmb> {
        let model = require(self.model, "model")?;
        let kind = match model {
            CmbModel::Taylens => {
                let delensing = if self.delens.unwrap_or(false) {
                    Some(require(self.delensing_ells, "delensing_ells")?)
                } else {
                    None
                };
                CmbKind::Taylens {
                    specs: require(self.cmb_specs, "cmb_specs")?,
                    nside: require(self.nside, "nside")?,
                    seed: require(self.cmb_seed, "cmb_seed")?,
                    delensing,
                }
            }
            CmbModel::PreComputed => {
                let a_i = require(self.a_i, "a_i")?;
                let a_q = require(self.a_q, "a_q")?;
                let a_u = require(self.a_u, "a_u")?;
                for t in [&a_q, &a_u] {
                    if t.len() != a_i.len() {
                        return Err(SkyError::DimensionMismatch {
                            expected: a_i.len(),
                            got: t.len(),
                        });
                    }
                }
                CmbKind::PreComputed { a_i, a_q, a_u }
            }
        };
        Ok(Cmb { kind })
    }
}

#[derive(Debug, Clone)]
enum CmbKind {
    Taylens {
        specs: AngularPowerSpectrum,
        nside: u32,
        seed: u64,
        delensing: Option<Vec<f64>>,
    },
    PreComputed {
        a_i: Array1<f64>,
        a_q: Array1<f64>,
        a_u: Array1<f64>,
    },
}

/// Validated CMB component.
#[derive(Debug, Clone)]
pub struct Cmb {
    kind: CmbKind,
}

impl Cmb {
    /// Realize the (T, Q, U) maps in µK_CMB. The Taylens model runs the
    /// full synthesis and lensing chain once; the result is then scaled
    /// per frequency through [`SedModel`].
    pub fn signal<B: SphericalTransform + ?Sized>(&self, sht: &B) -> SkyResult<CmbSky> {
        let maps = match &self.kind {
            CmbKind::Taylens {
                specs,
                nside,
                seed,
                delensing,
            } => {
                let opts = LensOptions {
                    delensing: delensing.clone(),
                    ..LensOptions::default()
                };
                lens(sht, specs, *nside, *seed, &opts)?
            }
            CmbKind::PreComputed { a_i, a_q, a_u } => {
                stack(Axis(0), &[a_i.view(), a_q.view(), a_u.view()]).map_err(|_| {
                    SkyError::DimensionMismatch {
                        expected: a_i.len(),
                        got: a_q.len(),
                    }
                })?
            }
        };
        Ok(CmbSky { maps })
    }
}

/// A realized CMB sky in µK_CMB, scaled to µK_RJ at each requested
/// frequency.
#[derive(Debug, Clone)]
pub struct CmbSky {
    maps: Array2<f64>,
}

impl CmbSky {
    pub fn maps(&self) -> &Array2<f64> {
        &self.maps
    }
}

impl SedModel for CmbSky {
    fn evaluate(&self, nu: f64) -> SkyResult<Array2<f64>> {
        Ok(&self.maps * cmb_to_rj(nu))
    }
}
