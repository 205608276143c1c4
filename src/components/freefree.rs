//! Free-free emission: unpolarized power law.

use ndarray::{Array1, Array2};

use crate::components::{power_law, ParamMap, SedModel};
use crate::error::{SkyError, SkyResult};

const COMPONENT: &str = "Freefree";

fn require<T>(value: Option<T>, field: &'static str) -> SkyResult<T> {
    value.ok_or(SkyError::ConfigurationMissing {
        component: COMPONENT,
        field,
    })
}

/// Available free-free scaling laws; only the power law exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreefreeModel {
    PowerLaw,
}

#[derive(Debug, Clone, Default)]
pub struct FreefreeConfig {
    pub model: Option<FreefreeModel>,
    pub a_i: Option<Array1<f64>>,
    pub nu_0_i: Option<f64>,
    pub spectral_index: Option<ParamMap>,
}

impl FreefreeConfig {
    pub fn build(self) -> SkyResult<Freefree> {
        let _model = require(self.model, "model")?;
        let a_i = require(self.a_i, "a_i")?;
        let spectral_index = require(self.spectral_index, "spectral_index")?;
        if let Some(len) = spectral_index.len() {
            if len != a_i.len() {
                return Err(SkyError::DimensionMismatch {
                    expected: a_i.len(),
                    got: len,
                });
            }
        }
        Ok(Freefree {
            a_i,
            nu_0_i: require(self.nu_0_i, "nu_0_i")?,
            spectral_index,
        })
    }
}

/// Validated free-free component.
#[derive(Debug, Clone)]
pub struct Freefree {
    a_i: Array1<f64>,
    nu_0_i: f64,
    spectral_index: ParamMap,
}

impl SedModel for Freefree {
    fn evaluate(&self, nu: f64) -> SkyResult<Array2<f64>> {
        let npix = self.a_i.len();
        let mut out = Array2::zeros((3, npix));
        for p in 0..npix {
            out[[0, p]] =
                self.a_i[p] * power_law(nu, self.nu_0_i, self.spectral_index.at(p));
        }
        Ok(out)
    }
}
