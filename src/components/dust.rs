//! Thermal dust emission: modified black body, with optional stochastic
//! frequency decorrelation.

use ndarray::{Array1, Array2};

use crate::components::{black_body, power_law, ParamMap, SedModel};
use crate::decorrelation::Decorrelated;
use crate::error::{SkyError, SkyResult};

const COMPONENT: &str = "Dust";

fn require<T>(value: Option<T>, field: &'static str) -> SkyResult<T> {
    value.ok_or(SkyError::ConfigurationMissing {
        component: COMPONENT,
        field,
    })
}

/// Available dust scaling laws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DustModel {
    /// Power law times a black-body ratio, with the same spectral index in
    /// temperature and polarization.
    ModifiedBlackBody,
}

/// Dust parameters. `corr_len` is only required when the component is
/// wrapped with decorrelation.
#[derive(Debug, Clone, Default)]
pub struct DustConfig {
    pub model: Option<DustModel>,
    pub a_i: Option<Array1<f64>>,
    pub a_q: Option<Array1<f64>>,
    pub a_u: Option<Array1<f64>>,
    pub nu_0_i: Option<f64>,
    pub nu_0_p: Option<f64>,
    pub spectral_index: Option<ParamMap>,
    pub temp: Option<ParamMap>,
    pub corr_len: Option<f64>,
}

impl DustConfig {
    pub fn build(self) -> SkyResult<Dust> {
        let _model = require(self.model, "model")?;
        let a_i = require(self.a_i, "a_i")?;
        let a_q = require(self.a_q, "a_q")?;
        let a_u = require(self.a_u, "a_u")?;
        let npix = a_i.len();
        for t in [&a_q, &a_u] {
            if t.len() != npix {
                return Err(SkyError::DimensionMismatch {
                    expected: npix,
                    got: t.len(),
                });
            }
        }
        let spectral_index = require(self.spectral_index, "spectral_index")?;
        let temp = require(self.temp, "temp")?;
        for param in [&spectral_index, &temp] {
            if let Some(len) = param.len() {
                if len != npix {
                    return Err(SkyError::DimensionMismatch {
                        expected: npix,
                        got: len,
                    });
                }
            }
        }
        Ok(Dust {
            a_i,
            a_q,
            a_u,
            nu_0_i: require(self.nu_0_i, "nu_0_i")?,
            nu_0_p: require(self.nu_0_p, "nu_0_p")?,
            spectral_index,
            temp,
            corr_len: self.corr_len,
        })
    }
}

/// Validated dust component.
#[derive(Debug, Clone)]
pub struct Dust {
    a_i: Array1<f64>,
    a_q: Array1<f64>,
    a_u: Array1<f64>,
    nu_0_i: f64,
    nu_0_p: f64,
    spectral_index: ParamMap,
    temp: ParamMap,
    corr_len: Option<f64>,
}

impl Dust {
    /// Wrap this component with stochastic frequency decorrelation, seeded
    /// for reproducibility. Requires `corr_len` to have been configured.
    pub fn with_decorrelation(self, seed: u64) -> SkyResult<Decorrelated<Dust>> {
        let corr_len = require(self.corr_len, "corr_len")?;
        let (nu_0_i, nu_0_p) = (self.nu_0_i, self.nu_0_p);
        Ok(Decorrelated::new(self, nu_0_i, nu_0_p, corr_len, seed))
    }
}

impl SedModel for Dust {
    fn evaluate(&self, nu: f64) -> SkyResult<Array2<f64>> {
        let npix = self.a_i.len();
        let mut out = Array2::zeros((3, npix));
        for p in 0..npix {
            let index = self.spectral_index.at(p);
            let temp = self.temp.at(p);
            let scaling_i =
                power_law(nu, self.nu_0_i, index) * black_body(nu, self.nu_0_i, temp);
            let scaling_p =
                power_law(nu, self.nu_0_p, index) * black_body(nu, self.nu_0_p, temp);
            out[[0, p]] = self.a_i[p] * scaling_i;
            out[[1, p]] = self.a_q[p] * scaling_p;
            out[[2, p]] = self.a_u[p] * scaling_p;
        }
        Ok(out)
    }
}
