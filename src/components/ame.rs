//! Anomalous microwave emission: spinning-dust scaling from a tabulated
//! emissivity curve, unpolarized or with template-derived polarization
//! angles.

use ndarray::{Array1, Array2};

use crate::components::{ParamMap, SedModel};
use crate::error::{SkyError, SkyResult};

const COMPONENT: &str = "AME";

fn require<T>(value: Option<T>, field: &'static str) -> SkyResult<T> {
    value.ok_or(SkyError::ConfigurationMissing {
        component: COMPONENT,
        field,
    })
}

/// Available AME scaling laws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmeModel {
    /// Unpolarized spinning-dust scaling.
    SpDust,
    /// Polarized variant: Q/U from a polarization angle computed from
    /// supplied angle templates and a polarization fraction.
    SpDustPol,
}

/// AME parameters. The emissivity table arrives already parsed: a
/// frequency row and an emissivity row, both in the same units the
/// reference frequency uses. Polarization fields are only required by
/// `SpDustPol`.
#[derive(Debug, Clone, Default)]
pub struct AmeConfig {
    pub model: Option<AmeModel>,
    pub a_i: Option<Array1<f64>>,
    pub nu_0_i: Option<f64>,
    pub emissivity_freqs: Option<Array1<f64>>,
    pub emissivity: Option<Array1<f64>>,
    pub nu_peak_0: Option<f64>,
    pub nu_peak: Option<ParamMap>,
    pub pol_frac: Option<f64>,
    pub angle_q: Option<Array1<f64>>,
    pub angle_u: Option<Array1<f64>>,
}

impl AmeConfig {
    pub fn build(self) -> SkyResult<Ame> {
        let model = require(self.model, "model")?;
        let a_i = require(self.a_i, "a_i")?;
        let npix = a_i.len();
        let emissivity_freqs = require(self.emissivity_freqs, "emissivity_freqs")?;
        let emissivity = require(self.emissivity, "emissivity")?;
        if emissivity.len() != emissivity_freqs.len() {
            return Err(SkyError::DimensionMismatch {
                expected: emissivity_freqs.len(),
                got: emissivity.len(),
            });
        }
        let nu_peak = require(self.nu_peak, "nu_peak")?;
        if let Some(len) = nu_peak.len() {
            if len != npix {
                return Err(SkyError::DimensionMismatch {
                    expected: npix,
                    got: len,
                });
            }
        }
        let pol = match model {
            AmeModel::SpDust => None,
            AmeModel::SpDustPol => {
                let angle_q = require(self.angle_q, "angle_q")?;
                let angle_u = require(self.angle_u, "angle_u")?;
                for t in [&angle_q, &angle_u] {
                    if t.len() != npix {
                        return Err(SkyError::DimensionMismatch {
                            expected: npix,
                            got: t.len(),
                        });
                    }
                }
                Some(Polarization {
                    pol_frac: require(self.pol_frac, "pol_frac")?,
                    angle_q,
                    angle_u,
                })
            }
        };
        Ok(Ame {
            a_i,
            nu_0_i: require(self.nu_0_i, "nu_0_i")?,
            emissivity_freqs,
            emissivity,
            nu_peak_0: require(self.nu_peak_0, "nu_peak_0")?,
            nu_peak,
            pol,
        })
    }
}

#[derive(Debug, Clone)]
struct Polarization {
    pol_frac: f64,
    angle_q: Array1<f64>,
    angle_u: Array1<f64>,
}

/// Validated AME component.
#[derive(Debug, Clone)]
pub struct Ame {
    a_i: Array1<f64>,
    nu_0_i: f64,
    emissivity_freqs: Array1<f64>,
    emissivity: Array1<f64>,
    nu_peak_0: f64,
    nu_peak: ParamMap,
    pol: Option<Polarization>,
}

impl Ame {
    /// Linear interpolation of the emissivity table; zero outside its
    /// frequency range.
    fn emissivity_at(&self, f: f64) -> f64 {
        let xs = &self.emissivity_freqs;
        let ys = &self.emissivity;
        let n = xs.len();
        if n == 0 || f < xs[0] || f > xs[n - 1] {
            return 0.0;
        }
        for k in 1..n {
            if f <= xs[k] {
                let w = (f - xs[k - 1]) / (xs[k] - xs[k - 1]);
                return ys[k - 1] + w * (ys[k] - ys[k - 1]);
            }
        }
        ys[n - 1]
    }

    /// Spinning-dust scaling from the reference frequency to `nu`, with
    /// the emissivity curve shifted by the local peak frequency.
    fn spdust_scaling(&self, nu: f64, p: usize) -> f64 {
        let shift = self.nu_peak_0 / self.nu_peak.at(p);
        let num = self.emissivity_at(nu * shift);
        let den = self.emissivity_at(self.nu_0_i * shift);
        (self.nu_0_i / nu).powi(2) * num / den
    }
}

impl SedModel for Ame {
    fn evaluate(&self, nu: f64) -> SkyResult<Array2<f64>> {
        let npix = self.a_i.len();
        let mut out = Array2::zeros((3, npix));
        match &self.pol {
            None => {
                for p in 0..npix {
                    out[[0, p]] = self.spdust_scaling(nu, p) * self.a_i[p];
                }
            }
            Some(pol) => {
                // Polarization angles come from the supplied Q/U templates
                // so they survive resolution changes consistently.
                for p in 0..npix {
                    let scaling = self.spdust_scaling(nu, p);
                    let angle = pol.angle_u[p].atan2(pol.angle_q[p]);
                    out[[0, p]] = scaling * self.a_i[p];
                    out[[1, p]] = scaling * self.a_i[p] * pol.pol_frac * angle.cos();
                    out[[2, p]] = scaling * self.a_i[p] * pol.pol_frac * angle.sin();
                }
            }
        }
        Ok(out)
    }
}
