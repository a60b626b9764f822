// Orbital Mechanics - Keplerian position solver and element blending
// Converts daily osculating elements into heliocentric positions

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Convergence tolerance on successive eccentric anomaly estimates (radians)
pub const KEPLER_TOLERANCE: f64 = 1e-6;

/// Iteration cap for Kepler's equation. Reaching it is not an error.
pub const KEPLER_MAX_ITERATIONS: u32 = 10;

// =============================================================================
// 3D VECTOR MATHEMATICS
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }

    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn scale(&self, s: f64) -> Self {
        Self {
            x: self.x * s,
            y: self.y * s,
            z: self.z * s,
        }
    }

    pub fn add(&self, other: &Vector3) -> Vector3 {
        Vector3 {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
        }
    }

    pub fn sub(&self, other: &Vector3) -> Vector3 {
        Vector3 {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
        }
    }

    /// Linear interpolation, `t = 0` gives `self`, `t = 1` gives `other`
    pub fn lerp(&self, other: &Vector3, t: f64) -> Vector3 {
        self.add(&other.sub(self).scale(t))
    }

    pub fn distance(&self, other: &Vector3) -> f64 {
        self.sub(other).magnitude()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

// =============================================================================
// KEPLERIAN ORBITAL ELEMENTS
// =============================================================================

/// Osculating elements for one body on one calendar day.
/// Angles are stored in degrees and only converted for trigonometry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct OrbitalElements {
    /// Semi-major axis (AU)
    pub a: f64,
    /// Eccentricity (0 <= e < 1)
    pub e: f64,
    /// Inclination (degrees)
    pub i: f64,
    /// Longitude of ascending node (degrees)
    pub om: f64,
    /// Argument of periapsis (degrees)
    pub w: f64,
    /// Mean anomaly at epoch (degrees)
    #[serde(rename = "M0")]
    pub m0: f64,
    /// Orbital period (days)
    #[serde(rename = "T")]
    pub t: f64,
}

impl OrbitalElements {
    /// Placeholder elements for the central star, which is never orbited
    pub fn zeroed() -> Self {
        Self::default()
    }

    pub fn is_zeroed(&self) -> bool {
        *self == Self::zeroed()
    }
}

// =============================================================================
// KEPLER SOLVER
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeplerSolution {
    /// Eccentric anomaly (radians), best available estimate
    pub eccentric_anomaly: f64,
    pub iterations: u32,
    pub converged: bool,
}

/// Solve Kepler's equation E = M + e*sin(E) by fixed-point iteration from E0 = M.
///
/// Stops once successive estimates differ by less than [`KEPLER_TOLERANCE`] or
/// after [`KEPLER_MAX_ITERATIONS`] updates. Contraction is only guaranteed to
/// reach the tolerance within the cap for e <= 0.25; past that the last
/// estimate is returned with `converged == false`.
pub fn solve_kepler_equation(mean_anomaly: f64, eccentricity: f64) -> KeplerSolution {
    let mut e_anom = mean_anomaly;

    for iteration in 1..=KEPLER_MAX_ITERATIONS {
        let next = mean_anomaly + eccentricity * e_anom.sin();
        let delta = (next - e_anom).abs();
        e_anom = next;

        if delta < KEPLER_TOLERANCE {
            return KeplerSolution {
                eccentric_anomaly: e_anom,
                iterations: iteration,
                converged: true,
            };
        }
    }

    KeplerSolution {
        eccentric_anomaly: e_anom,
        iterations: KEPLER_MAX_ITERATIONS,
        converged: false,
    }
}

/// Heliocentric Cartesian position (AU) for `elements` advanced by `elapsed_days`.
///
/// Degenerate input (a = 0, T = 0) yields a defined point rather than NaN:
/// a zero period means no mean motion, a zero axis puts the body at the origin.
pub fn solve_position(elements: &OrbitalElements, elapsed_days: f64) -> Vector3 {
    let a = elements.a;
    let e = elements.e;

    let mean_motion = if elements.t > 0.0 {
        2.0 * PI / elements.t
    } else {
        0.0
    };
    let mean_anomaly = elements.m0.to_radians() + mean_motion * elapsed_days;

    let eccentric_anomaly = solve_kepler_equation(mean_anomaly, e).eccentric_anomaly;

    // tan(f/2) = sqrt((1+e)/(1-e)) tan(E/2), written with atan2 so E = pi is finite
    let half_e = eccentric_anomaly / 2.0;
    let true_anomaly =
        2.0 * ((1.0 + e).sqrt() * half_e.sin()).atan2((1.0 - e).sqrt() * half_e.cos());

    let r = a * (1.0 - e * eccentric_anomaly.cos());
    if r == 0.0 || !r.is_finite() {
        return Vector3::zero();
    }

    // 3-1-3 rotation: node (om), inclination (i), argument of latitude (w + f)
    let cos_om = elements.om.to_radians().cos();
    let sin_om = elements.om.to_radians().sin();
    let cos_i = elements.i.to_radians().cos();
    let sin_i = elements.i.to_radians().sin();
    let u = elements.w.to_radians() + true_anomaly;
    let cos_u = u.cos();
    let sin_u = u.sin();

    Vector3::new(
        r * (cos_om * cos_u - sin_om * sin_u * cos_i),
        r * (sin_om * cos_u + cos_om * sin_u * cos_i),
        r * (sin_u * sin_i),
    )
}

// =============================================================================
// ELEMENT BLENDING
// =============================================================================

/// Wrap an angle into [0, 360)
pub fn normalize_degrees(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Signed shortest rotation from `from` to `to`, in [-180, 180]
pub fn shortest_arc_degrees(from: f64, to: f64) -> f64 {
    let diff = (to - from).rem_euclid(360.0);
    if diff > 180.0 {
        diff - 360.0
    } else {
        diff
    }
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn lerp_angle(a: f64, b: f64, t: f64) -> f64 {
    normalize_degrees(a + shortest_arc_degrees(a, b) * t)
}

/// Interpolate between two element sets, `t` clamped to [0, 1].
/// Angular fields take the shortest arc so 350 -> 10 passes through 0, not 180.
pub fn blend_elements(a: &OrbitalElements, b: &OrbitalElements, t: f64) -> OrbitalElements {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };

    if a == b {
        return *a;
    }

    OrbitalElements {
        a: lerp(a.a, b.a, t),
        e: lerp(a.e, b.e, t),
        i: lerp_angle(a.i, b.i, t),
        om: lerp_angle(a.om, b.om, t),
        w: lerp_angle(a.w, b.w, t),
        m0: lerp_angle(a.m0, b.m0, t),
        t: lerp(a.t, b.t, t),
    }
}

// =============================================================================
// TESTS
// =============================================================================
