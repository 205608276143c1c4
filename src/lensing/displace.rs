//! Geometric displacement of pixel positions along the lensing gradient.
//!
//! Each pixel is stepped along its local gradient direction by the
//! gradient magnitude, as a great-circle step on the sphere rather than a
//! flat-plane offset. When polarization is present, the step also induces
//! a rotation of the local (Q, U) frame; the (cos 2γ, sin 2γ) pair for
//! that rotation comes out of the same spherical triangle.

use std::f64::consts::{PI, TAU};

use ndarray::{Array1, ArrayView1};
use tracing::debug;

use crate::error::{SkyError, SkyResult};

/// Pixels processed per chunk. Chunking caps peak memory for intermediate
/// quantities; results are identical for any chunk size.
const CHUNK: usize = 0x10000;

/// Per-pixel (Q, U) frame rotation as (cos 2γ, sin 2γ).
#[derive(Debug, Clone, PartialEq)]
pub struct Rotation {
    pub cos2g: Array1<f64>,
    pub sin2g: Array1<f64>,
}

/// Per-pixel displaced angular positions, plus the polarization-frame
/// rotation when requested.
///
/// Invariants: colatitudes lie in [0, π] (reflected at the poles, with the
/// longitude shifted by π on reflection) and longitudes in (−π, π].
#[derive(Debug, Clone, PartialEq)]
pub struct DisplacementField {
    pub theta: Array1<f64>,
    pub phi: Array1<f64>,
    pub rot: Option<Rotation>,
}

/// Offset positions along the gradient (∂Φ/∂θ, sin⁻¹θ·∂Φ/∂φ).
///
/// `pol` requests the frame rotation; `geodesic` selects the lower-fidelity
/// additive offset (no curvature correction, no rotation) instead of the
/// default spherical-trigonometry step.
pub fn offset_positions(
    theta: ArrayView1<'_, f64>,
    phi: ArrayView1<'_, f64>,
    dtheta: ArrayView1<'_, f64>,
    dphi: ArrayView1<'_, f64>,
    pol: bool,
    geodesic: bool,
) -> SkyResult<DisplacementField> {
    let n = theta.len();
    for len in [phi.len(), dtheta.len(), dphi.len()] {
        if len != n {
            return Err(SkyError::DimensionMismatch {
                expected: n,
                got: len,
            });
        }
    }

    let mut otheta = Array1::zeros(n);
    let mut ophi = Array1::zeros(n);

    if geodesic {
        for p in 0..n {
            let (t, f) = fix_angle(theta[p] + dtheta[p], phi[p] + dphi[p] / theta[p].sin());
            otheta[p] = t;
            ophi[p] = f;
        }
        return Ok(DisplacementField {
            theta: otheta,
            phi: ophi,
            rot: None,
        });
    }

    let mut rot = pol.then(|| Rotation {
        cos2g: Array1::zeros(n),
        sin2g: Array1::zeros(n),
    });

    // Chunked to bound the working set independent of npix.
    let mut start = 0;
    while start < n {
        let end = (start + CHUNK).min(n);
        for p in start..end {
            let (t, f, r) = offset_one(theta[p], phi[p], dtheta[p], dphi[p], pol);
            otheta[p] = t;
            ophi[p] = f;
            if let (Some(rot), Some((c, s))) = (rot.as_mut(), r) {
                rot.cos2g[p] = c;
                rot.sin2g[p] = s;
            }
        }
        debug!(start, end, "displaced pixel chunk");
        start = end;
    }

    Ok(DisplacementField {
        theta: otheta,
        phi: ophi,
        rot,
    })
}

/// Great-circle step for one pixel. Returns the displaced (θ, φ) and the
/// rotation pair when `pol` is set.
fn offset_one(
    theta: f64,
    phi: f64,
    dtheta: f64,
    dphi: f64,
    pol: bool,
) -> (f64, f64, Option<(f64, f64)>) {
    let d = (dtheta * dtheta + dphi * dphi).sqrt();
    if d == 0.0 {
        // No deflection: stay put, identity frame rotation.
        return (theta, wrap_longitude(phi), pol.then_some((1.0, 0.0)));
    }

    let grad_t = dtheta / d;
    let grad_p = dphi / d;
    let (sind, cosd) = d.sin_cos();
    let (sint, cost) = theta.sin_cos();

    // New colatitude from the spherical law of cosines.
    let ocost = (cosd * cost - sind * sint * grad_t).clamp(-1.0, 1.0);
    let osint = (1.0 - ocost * ocost).sqrt();
    let otheta = ocost.acos();

    // Longitude correction; degenerate only when the step lands exactly on
    // a pole, where longitude is arbitrary.
    let ophi = if osint == 0.0 {
        phi
    } else {
        phi + (sind * grad_p / osint).clamp(-1.0, 1.0).asin()
    };

    if !pol {
        return (otheta, wrap_longitude(ophi), None);
    }

    let a = grad_p / (sind * cost / sint + grad_t * cosd);
    let nom = grad_t + grad_p * a;
    let denom = 1.0 + a * a;
    let cos2g = 2.0 * nom * nom / denom - 1.0;
    let sin2g = 2.0 * nom * (grad_p - grad_t * a) / denom;
    (otheta, wrap_longitude(ophi), Some((cos2g, sin2g)))
}

/// Reflect a colatitude that left [0, π] back inside, shifting the
/// longitude by π, and wrap the longitude into (−π, π].
pub fn fix_angle(theta: f64, phi: f64) -> (f64, f64) {
    let (mut theta, mut phi) = (theta, phi);
    if theta < 0.0 {
        theta = -theta;
        phi += PI;
    }
    if theta > PI {
        theta = TAU - theta;
        phi += PI;
    }
    (theta, wrap_longitude(phi))
}

/// Wrap a longitude into (−π, π].
///
/// Single whole-turn steps keep the common case (at most one turn out of
/// range) exact in floating point.
pub fn wrap_longitude(mut phi: f64) -> f64 {
    while phi > PI {
        phi -= TAU;
    }
    while phi <= -PI {
        phi += TAU;
    }
    phi
}
