//! Angular power spectra of the correlated (T, E, B, Φ) sky.
//!
//! A spectrum set holds per-multipole values for the ten auto- and
//! cross-spectra of temperature, the two polarization modes, and the
//! lensing potential. Spectra are produced externally (already parsed into
//! arrays) and are immutable once constructed; monopole and dipole entries
//! are zero by convention.

use std::f64::consts::PI;

use ndarray::{Array2, ArrayView1};

use crate::error::{SkyError, SkyResult};

/// The ten spectra carried by an [`AngularPowerSpectrum`], in storage
/// order. `P` denotes the lensing potential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpectrumKind {
    TT,
    EE,
    BB,
    PP,
    TE,
    EB,
    BP,
    TB,
    EP,
    TP,
}

impl SpectrumKind {
    pub const COUNT: usize = 10;

    pub fn index(self) -> usize {
        match self {
            SpectrumKind::TT => 0,
            SpectrumKind::EE => 1,
            SpectrumKind::BB => 2,
            SpectrumKind::PP => 3,
            SpectrumKind::TE => 4,
            SpectrumKind::EB => 5,
            SpectrumKind::BP => 6,
            SpectrumKind::TB => 7,
            SpectrumKind::EP => 8,
            SpectrumKind::TP => 9,
        }
    }
}

/// Ordered per-multipole values for the ten (T, E, B, P) spectra,
/// indexed by l from 0 to `lmax`.
#[derive(Debug, Clone, PartialEq)]
pub struct AngularPowerSpectrum {
    lmax: usize,
    cls: Array2<f64>, // (10, lmax + 1)
}

impl AngularPowerSpectrum {
    /// All-zero spectra up to `lmax`.
    pub fn zeros(lmax: usize) -> Self {
        AngularPowerSpectrum {
            lmax,
            cls: Array2::zeros((SpectrumKind::COUNT, lmax + 1)),
        }
    }

    /// Fill one spectrum with per-multipole values for l = 2..=lmax.
    ///
    /// Entries for l < 2 stay zero. Intended for externally produced raw
    /// C_l values; for CAMB-convention columns use [`Self::from_camb`].
    pub fn set_spectrum(&mut self, kind: SpectrumKind, values: &[f64]) -> SkyResult<()> {
        let expected = self.lmax.saturating_sub(1);
        if values.len() != expected {
            return Err(SkyError::DimensionMismatch {
                expected,
                got: values.len(),
            });
        }
        for (i, &v) in values.iter().enumerate() {
            self.cls[[kind.index(), i + 2]] = v;
        }
        Ok(())
    }

    /// Build the ten-spectrum set from CAMB-convention columns.
    ///
    /// Each column holds l(l+1)C_l/2π for l = 2..=lmax (the CAMB output
    /// convention), so every spectrum is divided by l(l+1)/2π here. The
    /// lensing potential carries one extra power of l(l+1) per potential
    /// factor: PP is divided by (l(l+1))², TP and EP by (l(l+1))^(3/2).
    /// EB, TB and BP are zero.
    pub fn from_camb(
        tt: &[f64],
        ee: &[f64],
        bb: &[f64],
        te: &[f64],
        pp: &[f64],
        tp: &[f64],
        ep: &[f64],
    ) -> SkyResult<Self> {
        let n = tt.len();
        for col in [ee, bb, te, pp, tp, ep] {
            if col.len() != n {
                return Err(SkyError::DimensionMismatch {
                    expected: n,
                    got: col.len(),
                });
            }
        }
        let lmax = n + 1;
        let mut out = Self::zeros(lmax);
        for i in 0..n {
            let l = (i + 2) as f64;
            let ll1 = l * (l + 1.0);
            let fac = 2.0 * PI / ll1;
            out.cls[[SpectrumKind::TT.index(), i + 2]] = fac * tt[i];
            out.cls[[SpectrumKind::EE.index(), i + 2]] = fac * ee[i];
            out.cls[[SpectrumKind::BB.index(), i + 2]] = fac * bb[i];
            out.cls[[SpectrumKind::TE.index(), i + 2]] = fac * te[i];
            out.cls[[SpectrumKind::PP.index(), i + 2]] = fac * pp[i] / ll1;
            out.cls[[SpectrumKind::TP.index(), i + 2]] = fac * tp[i] / ll1.sqrt();
            out.cls[[SpectrumKind::EP.index(), i + 2]] = fac * ep[i] / ll1.sqrt();
        }
        Ok(out)
    }

    /// Copy with partial removal of lensing-potential power.
    ///
    /// `fractions` holds the residual power fraction f_l per multipole for
    /// l = 2..=lmax: PP is multiplied by f_l, the TP and EP cross-spectra
    /// by sqrt(f_l).
    pub fn delensed(&self, fractions: &[f64]) -> SkyResult<Self> {
        let expected = self.lmax.saturating_sub(1);
        if fractions.len() != expected {
            return Err(SkyError::DimensionMismatch {
                expected,
                got: fractions.len(),
            });
        }
        let mut out = self.clone();
        for (i, &f) in fractions.iter().enumerate() {
            out.cls[[SpectrumKind::PP.index(), i + 2]] *= f;
            out.cls[[SpectrumKind::TP.index(), i + 2]] *= f.sqrt();
            out.cls[[SpectrumKind::EP.index(), i + 2]] *= f.sqrt();
        }
        Ok(out)
    }

    pub fn lmax(&self) -> usize {
        self.lmax
    }

    /// C_l for one spectrum at one multipole.
    pub fn get(&self, kind: SpectrumKind, l: usize) -> f64 {
        self.cls[[kind.index(), l]]
    }

    /// One spectrum as a view over l = 0..=lmax.
    pub fn values(&self, kind: SpectrumKind) -> ArrayView1<'_, f64> {
        self.cls.row(kind.index())
    }
}
