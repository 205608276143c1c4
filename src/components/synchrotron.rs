//! Synchrotron emission: power law, optionally with spectral curvature.

use ndarray::{Array1, Array2};

use crate::components::{power_law, ParamMap, SedModel};
use crate::error::{SkyError, SkyResult};

const COMPONENT: &str = "Synchrotron";

fn require<T>(value: Option<T>, field: &'static str) -> SkyResult<T> {
    value.ok_or(SkyError::ConfigurationMissing {
        component: COMPONENT,
        field,
    })
}

/// Available synchrotron scaling laws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynchrotronModel {
    PowerLaw,
    CurvedPowerLaw,
}

/// Synchrotron parameters; all fields must be supplied except the
/// curvature pair, which is only required by `CurvedPowerLaw`.
#[derive(Debug, Clone, Default)]
pub struct SynchrotronConfig {
    pub model: Option<SynchrotronModel>,
    pub a_i: Option<Array1<f64>>,
    pub a_q: Option<Array1<f64>>,
    pub a_u: Option<Array1<f64>>,
    pub nu_0_i: Option<f64>,
    pub nu_0_p: Option<f64>,
    pub spectral_index: Option<ParamMap>,
    pub spectral_curvature: Option<ParamMap>,
    pub nu_curve: Option<f64>,
}

impl SynchrotronConfig {
    pub fn build(self) -> SkyResult<Synchrotron> {
        let model = require(self.model, "model")?;
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
        if let Some(len) = spectral_index.len() {
            if len != npix {
                return Err(SkyError::DimensionMismatch {
                    expected: npix,
                    got: len,
                });
            }
        }
        let curvature = match model {
            SynchrotronModel::PowerLaw => None,
            SynchrotronModel::CurvedPowerLaw => Some((
                require(self.spectral_curvature, "spectral_curvature")?,
                require(self.nu_curve, "nu_curve")?,
            )),
        };
        Ok(Synchrotron {
            curvature,
            a_i,
            a_q,
            a_u,
            nu_0_i: require(self.nu_0_i, "nu_0_i")?,
            nu_0_p: require(self.nu_0_p, "nu_0_p")?,
            spectral_index,
        })
    }
}

/// Validated synchrotron component.
#[derive(Debug, Clone)]
pub struct Synchrotron {
    a_i: Array1<f64>,
    a_q: Array1<f64>,
    a_u: Array1<f64>,
    nu_0_i: f64,
    nu_0_p: f64,
    spectral_index: ParamMap,
    curvature: Option<(ParamMap, f64)>,
}

impl SedModel for Synchrotron {
    fn evaluate(&self, nu: f64) -> SkyResult<Array2<f64>> {
        let npix = self.a_i.len();
        let mut out = Array2::zeros((3, npix));
        for p in 0..npix {
            let mut index = self.spectral_index.at(p);
            if let Some((curv, nu_curve)) = &self.curvature {
                index += power_law(nu, *nu_curve, curv.at(p)).ln();
            }
            out[[0, p]] = self.a_i[p] * power_law(nu, self.nu_0_i, index);
            let scaling_p = power_law(nu, self.nu_0_p, index);
            out[[1, p]] = self.a_q[p] * scaling_p;
            out[[2, p]] = self.a_u[p] * scaling_p;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn assert_close(a: f64, b: f64, tol: f64) {
        assert!(
            (a - b).abs() < tol,
            "expected {a} ~= {b} (diff = {})",
            (a - b).abs()
        );
    }

    fn base_config() -> SynchrotronConfig {
        SynchrotronConfig {
            model: Some(SynchrotronModel::PowerLaw),
            a_i: Some(array![10.0, 20.0]),
            a_q: Some(array![1.0, -1.0]),
            a_u: Some(array![0.5, 0.25]),
            nu_0_i: Some(30.0),
            nu_0_p: Some(30.0),
            spectral_index: Some(ParamMap::Constant(-3.0)),
            ..SynchrotronConfig::default()
        }
    }

    #[test]
    fn missing_field_is_reported_by_name() {
        let mut config = base_config();
        config.spectral_index = None;
        assert_eq!(
            config.build().unwrap_err(),
            SkyError::ConfigurationMissing {
                component: "Synchrotron",
                field: "spectral_index",
            }
        );
    }

    #[test]
    fn curvature_only_required_for_curved_model() {
        let plain = base_config().build();
        assert!(plain.is_ok());

        let mut curved = base_config();
        curved.model = Some(SynchrotronModel::CurvedPowerLaw);
        assert_eq!(
            curved.clone().build().unwrap_err(),
            SkyError::ConfigurationMissing {
                component: "Synchrotron",
                field: "spectral_curvature",
            }
        );
        curved.spectral_curvature = Some(ParamMap::Constant(-0.05));
        curved.nu_curve = Some(23.0);
        assert!(curved.build().is_ok());
    }

    #[test]
    fn reference_frequency_returns_templates() {
        let sync = base_config().build().unwrap();
        let out = sync.evaluate(30.0).unwrap();
        assert_eq!(out, array![[10.0, 20.0], [1.0, -1.0], [0.5, 0.25]]);
    }

    #[test]
    fn power_law_scales_all_channels() {
        let sync = base_config().build().unwrap();
        let out = sync.evaluate(60.0).unwrap();
        let scale = 2.0f64.powf(-3.0);
        assert_close(out[[0, 0]], 10.0 * scale, 1e-12);
        assert_close(out[[1, 1]], -scale, 1e-12);
        assert_close(out[[2, 0]], 0.5 * scale, 1e-12);
    }

    #[test]
    fn zero_curvature_matches_plain_power_law() {
        let plain = base_config().build().unwrap();

        let mut config = base_config();
        config.model = Some(SynchrotronModel::CurvedPowerLaw);
        config.spectral_curvature = Some(ParamMap::Constant(0.0));
        config.nu_curve = Some(23.0);
        let curved = config.build().unwrap();

        for nu in [10.0, 30.0, 90.0] {
            assert_eq!(plain.evaluate(nu).unwrap(), curved.evaluate(nu).unwrap());
        }
    }

    #[test]
    fn template_length_mismatch_rejected() {
        let mut config = base_config();
        config.a_u = Some(array![1.0]);
        assert_eq!(
            config.build().unwrap_err(),
            SkyError::DimensionMismatch {
                expected: 2,
                got: 1
            }
        );
    }
}
