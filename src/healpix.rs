//! HEALPix (Hierarchical Equal Area isoLatitude Pixelisation) pixelization.
//!
//! Implements the nested indexing scheme for HEALPix in the (colatitude,
//! longitude) convention used throughout this crate: θ ∈ [0, π] measured
//! from the north pole, φ ∈ [0, 2π). Maps handled by the harmonic-transform
//! interface are ordered by this scheme.
//!
//! The 12 base pixels are laid out as:
//! - 0–3: north polar cap
//! - 4–7: equatorial belt
//! - 8–11: south polar cap
//!
//! Within each base pixel, `x` increases northeast and `y` increases
//! northwest.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI, TAU};

use ndarray::Array1;

/// Total number of pixels for a given nside: 12 * nside^2.
pub fn npix(nside: u32) -> usize {
    12 * nside as usize * nside as usize
}

/// Whether `nside` is a valid resolution parameter (a positive power of two).
pub fn is_valid_nside(nside: u32) -> bool {
    nside > 0 && nside.is_power_of_two()
}

/// Recover nside from a pixel count, if the count is a valid map size.
pub fn npix_to_nside(npix: usize) -> Option<u32> {
    if npix == 0 || npix % 12 != 0 {
        return None;
    }
    let ns2 = npix / 12;
    let nside = (ns2 as f64).sqrt().round() as usize;
    if nside * nside == ns2 && is_valid_nside(nside as u32) {
        Some(nside as u32)
    } else {
        None
    }
}

/// Convert (colatitude, longitude) in radians to a nested pixel index.
///
/// `theta` is the colatitude in [0, π]; `phi` is the longitude, any value
/// (wrapped into [0, 2π) internally).
pub fn ang_to_pix(nside: u32, theta: f64, phi: f64) -> usize {
    let (base, x, y) = ang_to_base_xy(theta, phi, nside as f64);
    compose_nested(base, x, y, nside) as usize
}

/// Convert a nested pixel index to the (colatitude, longitude) of its center.
pub fn pix_to_ang(nside: u32, ipix: usize) -> (f64, f64) {
    let (base, x, y) = decompose_nested(ipix as u64, nside);
    base_xy_to_ang(base, x as f64 + 0.5, y as f64 + 0.5, nside as f64)
}

/// Colatitude and longitude of every pixel center, in index order.
pub fn pixel_positions(nside: u32) -> (Array1<f64>, Array1<f64>) {
    let n = npix(nside);
    let mut theta = Array1::zeros(n);
    let mut phi = Array1::zeros(n);
    for p in 0..n {
        let (t, f) = pix_to_ang(nside, p);
        theta[p] = t;
        phi[p] = f;
    }
    (theta, phi)
}

// ---------------------------------------------------------------------------
// Internal: coordinate ↔ (base, x, y)
// ---------------------------------------------------------------------------

/// Convert (colatitude, longitude) to (base, x, y) with continuous coords.
fn ang_to_base_xy(theta: f64, phi: f64, ns: f64) -> (u64, u64, u64) {
    let z = theta.cos();
    let mut phi = phi % TAU;
    if phi < 0.0 {
        phi += TAU;
    }

    let phi_t = phi % FRAC_PI_2;

    // Determine quadrant column
    let column = ((phi / FRAC_PI_2).floor() as i64).rem_euclid(4) as u64;

    if z.abs() >= 2.0 / 3.0 {
        // Polar cap
        let north = z >= 0.0;
        let zfactor = if north { 1.0 } else { -1.0 };

        // Solve eqns 19/20 from the HEALPix paper for kx = Ns - xx, ky = Ns - yy
        let root_x = (1.0 - z * zfactor) * 3.0 * (ns * (2.0 * phi_t - PI) / PI).powi(2);
        let kx = if root_x <= 0.0 { 0.0 } else { root_x.sqrt() };

        let root_y = (1.0 - z * zfactor) * 3.0 * (ns * 2.0 * phi_t / PI).powi(2);
        let ky = if root_y <= 0.0 { 0.0 } else { root_y.sqrt() };

        let (xx, yy) = if north { (ns - kx, ns - ky) } else { (ky, kx) };

        let x = (xx.floor() as u64).min(ns as u64 - 1);
        let y = (yy.floor() as u64).min(ns as u64 - 1);

        let base = if north { column } else { 8 + column };
        (base, x, y)
    } else {
        // Equatorial region
        let zunits = (z + 2.0 / 3.0) / (4.0 / 3.0);
        let phiunits = phi_t / FRAC_PI_2;

        let u1 = zunits + phiunits;
        let u2 = zunits - phiunits + 1.0;

        let mut xx = u1 * ns;
        let mut yy = u2 * ns;

        let base = if xx >= ns {
            xx -= ns;
            if yy >= ns {
                yy -= ns;
                column // north polar
            } else {
                ((column + 1) % 4) + 4 // right equatorial
            }
        } else if yy >= ns {
            yy -= ns;
            column + 4 // left equatorial
        } else {
            8 + column // south polar
        };

        let x = (xx.floor() as u64).min(ns as u64 - 1);
        let y = (yy.floor() as u64).min(ns as u64 - 1);

        (base, x, y)
    }
}

/// Convert (base, x, y) continuous coords back to (colatitude, longitude).
fn base_xy_to_ang(base: u64, x: f64, y: f64, ns: f64) -> (f64, f64) {
    let x_norm = x / ns;
    let y_norm = y / ns;

    // Check if this pixel is in the polar or equatorial regime
    let is_polar_region = if is_north(base) {
        (x_norm + y_norm) > 1.0
    } else if is_south(base) {
        (x_norm + y_norm) < 1.0
    } else {
        false
    };

    let (z, phi) = if !is_polar_region {
        // Equatorial computation
        let (phi_off, z_off, chp) = if base <= 3 {
            (1.0, 0.0, base)
        } else if base <= 7 {
            (0.0, -1.0, base - 4)
        } else {
            (1.0, -2.0, base - 8)
        };

        let z = (2.0 / 3.0) * (x_norm + y_norm + z_off);
        let phi = FRAC_PI_4 * (x_norm - y_norm + phi_off + 2.0 * chp as f64);
        (z, phi)
    } else {
        // Polar computation — inverse of eqns 19/20 from the HEALPix paper
        let north = is_north(base);
        let zfactor = if north { 1.0 } else { -1.0 };

        // For south polar, swap and flip to work in north-polar convention
        let (px, py) = if north { (x, y) } else { (ns - y, ns - x) };

        let kx = ns - px;
        let ky = ns - py;

        // phi_t = pi * (Ns - y) / (2 * ((Ns - x) + (Ns - y)))
        let phi_t = if kx + ky == 0.0 {
            0.0
        } else {
            PI * ky / (2.0 * (kx + ky))
        };

        // Recover z, using two branches to avoid division-by-zero
        let z = if phi_t < FRAC_PI_4 {
            let denom = (2.0 * phi_t - PI) * ns;
            if denom.abs() < 1e-15 {
                zfactor
            } else {
                let val = PI * kx / denom;
                (1.0 - val * val / 3.0) * zfactor
            }
        } else {
            let denom = 2.0 * phi_t * ns;
            if denom.abs() < 1e-15 {
                zfactor
            } else {
                let val = PI * ky / denom;
                (1.0 - val * val / 3.0) * zfactor
            }
        };

        let base_col = if is_south(base) { base - 8 } else { base };
        let phi = FRAC_PI_2 * base_col as f64 + phi_t;
        (z, phi)
    };

    let theta = z.clamp(-1.0, 1.0).acos();
    let mut phi = phi;
    if phi < 0.0 {
        phi += TAU;
    }
    if phi >= TAU {
        phi -= TAU;
    }
    (theta, phi)
}

// ---------------------------------------------------------------------------
// Internal: base pixel classification
// ---------------------------------------------------------------------------

fn is_north(base: u64) -> bool {
    base <= 3
}

fn is_south(base: u64) -> bool {
    base >= 8
}

// ---------------------------------------------------------------------------
// Internal: XY ↔ nested bit-interleaving
// ---------------------------------------------------------------------------

/// Compose a nested index from (base, x, y).
fn compose_nested(base: u64, x: u64, y: u64, nside: u32) -> u64 {
    let ns2 = nside as u64 * nside as u64;
    base * ns2 + xy_to_nested_sub(x, y)
}

/// Decompose a nested index into (base, x, y).
fn decompose_nested(ipix: u64, nside: u32) -> (u64, u64, u64) {
    let ns2 = nside as u64 * nside as u64;
    let base = ipix / ns2;
    let (x, y) = nested_sub_to_xy(ipix % ns2);
    (base, x, y)
}

/// Bit-interleave (x, y) → sub-index. x provides even bits, y provides odd bits.
fn xy_to_nested_sub(x: u64, y: u64) -> u64 {
    let mut result = 0u64;
    let mut xx = x;
    let mut yy = y;
    let mut bit = 0;
    while xx > 0 || yy > 0 {
        result |= (xx & 1) << bit;
        bit += 1;
        result |= (yy & 1) << bit;
        bit += 1;
        xx >>= 1;
        yy >>= 1;
    }
    result
}

/// De-interleave sub-index → (x, y).
fn nested_sub_to_xy(sub: u64) -> (u64, u64) {
    let mut x = 0u64;
    let mut y = 0u64;
    let mut s = sub;
    let mut bit = 0;
    while s > 0 {
        x |= (s & 1) << bit;
        s >>= 1;
        y |= (s & 1) << bit;
        s >>= 1;
        bit += 1;
    }
    (x, y)
}
