//! Microwave-sky map synthesis library.
//!
//! Microsky simulates the microwave sky in temperature and linear
//! polarization at arbitrary observing frequencies: a lensed CMB
//! realization drawn from an angular power spectrum, plus foreground
//! emission components scaled by their SED laws, with optional stochastic
//! frequency decorrelation. Harmonic transforms are consumed through the
//! narrow [`sht::SphericalTransform`] interface.

pub mod components;
pub mod decorrelation;
pub mod error;
pub mod healpix;
pub mod lensing;
pub mod realization;
pub mod sht;
pub mod spectrum;
pub mod units;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{SkyError, SkyResult};
