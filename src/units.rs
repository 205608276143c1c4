//! Temperature-unit conversion between thermodynamic (CMB) and
//! Rayleigh-Jeans brightness temperature.

/// CMB monopole temperature in kelvin.
pub const T_CMB: f64 = 2.7255;

/// Planck constant, J s.
pub(crate) const PLANCK_H: f64 = 6.62607004e-34;

/// Boltzmann constant, J/K.
pub(crate) const BOLTZMANN_K: f64 = 1.38064852e-23;

/// Conversion factor from thermodynamic (µK_CMB) to Rayleigh-Jeans
/// (µK_RJ) temperature at frequency `nu` in GHz.
///
/// The factor is x²eˣ/(eˣ−1)² with x = hν/(k·T_CMB); it tends to one in
/// the Rayleigh-Jeans limit and suppresses high frequencies.
pub fn cmb_to_rj(nu: f64) -> f64 {
    let x = PLANCK_H * nu * 1e9 / (BOLTZMANN_K * T_CMB);
    x * x * x.exp() / x.exp_m1().powi(2)
}
