// Body catalog - tracked bodies, their display roles and spring tuning
// Roles are resolved once from names so frame code never branches on strings

use serde::{Deserialize, Serialize};

use crate::error::{OrbitalError, Result};

// =============================================================================
// DISPLAY ROLE
// =============================================================================

/// How a body is placed in the geocentric visualization frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BodyKind {
    /// Fixed visual center (Earth)
    Reference,
    /// Central star, mirrored opposite the reference body
    Star,
    /// Everything else, divided by its orbit compression factor
    Other { orbit_correction: f64 },
}

/// Extra compression for outer bodies so the system fits on screen
pub fn orbit_correction(name: &str) -> f64 {
    match name.to_lowercase().as_str() {
        "jupiter" => 1.8,
        "saturn" => 2.6,
        "uranus" => 4.2,
        "neptune" => 5.4,
        "pluto" => 6.0,
        _ => 1.0,
    }
}

impl BodyKind {
    pub fn for_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "earth" => BodyKind::Reference,
            "sun" => BodyKind::Star,
            other => BodyKind::Other {
                orbit_correction: orbit_correction(other),
            },
        }
    }
}

// =============================================================================
// SIZE CLASS & SPRING TUNING
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodySize {
    Small,
    Medium,
    Large,
    Star,
}

/// Spring-damper constants for one body
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpringParams {
    pub stiffness: f64,
    pub damping: f64,
    pub speed_factor: f64,
}

impl BodySize {
    /// Smaller bodies follow their targets more fluidly; the star is held stiffest
    pub fn spring_params(&self) -> SpringParams {
        match self {
            BodySize::Small => SpringParams {
                stiffness: 9.0,
                damping: 0.72,
                speed_factor: 1.4,
            },
            BodySize::Medium => SpringParams {
                stiffness: 7.5,
                damping: 0.75,
                speed_factor: 1.2,
            },
            BodySize::Large => SpringParams {
                stiffness: 6.0,
                damping: 0.78,
                speed_factor: 1.0,
            },
            BodySize::Star => SpringParams {
                stiffness: 12.0,
                damping: 0.7,
                speed_factor: 1.0,
            },
        }
    }

    pub fn from_radius_km(radius_km: f64) -> Self {
        if radius_km >= 100_000.0 {
            BodySize::Star
        } else if radius_km >= 20_000.0 {
            BodySize::Large
        } else if radius_km >= 4_000.0 {
            BodySize::Medium
        } else {
            BodySize::Small
        }
    }
}

// =============================================================================
// CATALOG
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyConfig {
    pub id: String,
    pub name: String,
    /// Ephemeris provider identifier (JPL Horizons major-body code)
    pub horizons_id: String,
    pub radius_km: f64,
    pub size: BodySize,
    pub kind: BodyKind,
}

impl BodyConfig {
    pub fn new(name: &str, horizons_id: &str, radius_km: f64) -> Self {
        Self {
            id: name.to_lowercase(),
            name: name.to_string(),
            horizons_id: horizons_id.to_string(),
            radius_km,
            size: BodySize::from_radius_km(radius_km),
            kind: BodyKind::for_name(name),
        }
    }

    pub fn is_star(&self) -> bool {
        self.kind == BodyKind::Star
    }
}

/// Ordered list of tracked bodies; a body's position in the list is its slot
/// in every daily element record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyCatalog {
    bodies: Vec<BodyConfig>,
    reference: usize,
}

impl BodyCatalog {
    /// Requires exactly one reference body and at most one star
    pub fn from_bodies(bodies: Vec<BodyConfig>) -> Result<Self> {
        let references: Vec<usize> = bodies
            .iter()
            .enumerate()
            .filter(|(_, b)| b.kind == BodyKind::Reference)
            .map(|(idx, _)| idx)
            .collect();
        let stars = bodies.iter().filter(|b| b.is_star()).count();

        if references.len() != 1 {
            return Err(OrbitalError::Config(format!(
                "expected exactly one reference body, found {}",
                references.len()
            )));
        }
        if stars > 1 {
            return Err(OrbitalError::Config(format!(
                "expected at most one star, found {}",
                stars
            )));
        }

        Ok(Self {
            reference: references[0],
            bodies,
        })
    }

    /// Sun, eight planets and Pluto
    pub fn solar_system() -> Self {
        let bodies = vec![
            BodyConfig::new("Sun", "10", 696_340.0),
            BodyConfig::new("Mercury", "199", 2_439.7),
            BodyConfig::new("Venus", "299", 6_051.8),
            BodyConfig::new("Earth", "399", 6_371.0),
            BodyConfig::new("Mars", "499", 3_389.5),
            BodyConfig::new("Jupiter", "599", 69_911.0),
            BodyConfig::new("Saturn", "699", 58_232.0),
            BodyConfig::new("Uranus", "799", 25_362.0),
            BodyConfig::new("Neptune", "899", 24_622.0),
            BodyConfig::new("Pluto", "999", 1_188.3),
        ];
        Self {
            reference: 3,
            bodies,
        }
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn bodies(&self) -> &[BodyConfig] {
        &self.bodies
    }

    pub fn get(&self, index: usize) -> Option<&BodyConfig> {
        self.bodies.get(index)
    }

    pub fn reference_index(&self) -> usize {
        self.reference
    }

    pub fn star_index(&self) -> Option<usize> {
        self.bodies.iter().position(|b| b.is_star())
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.bodies.iter().position(|b| b.id == id)
    }

    /// Reference body first, then the rest in catalog order
    pub fn resolution_order(&self) -> impl Iterator<Item = usize> + '_ {
        let reference = self.reference;
        std::iter::once(reference).chain((0..self.bodies.len()).filter(move |&i| i != reference))
    }
}

impl Default for BodyCatalog {
    fn default() -> Self {
        Self::solar_system()
    }
}
