// Frame Transform - heliocentric AU to the geocentric visualization frame
// The reference body sits at the origin; the star is mirrored opposite it.

use crate::bodies::BodyKind;
use crate::orbital_mechanics::Vector3;

/// Scene units per AU
pub const VISUALIZATION_SCALE: f64 = 10.0;

/// Map a heliocentric position into display coordinates.
///
/// Display convention: the two in-plane axes are swapped (x <-> y) and z stays
/// vertical. This is a presentation choice kept for output compatibility.
pub fn to_visualization_frame(
    kind: BodyKind,
    heliocentric: &Vector3,
    reference_heliocentric: &Vector3,
) -> Vector3 {
    match kind {
        BodyKind::Reference => Vector3::zero(),
        BodyKind::Star => {
            let mirrored = reference_heliocentric.scale(-VISUALIZATION_SCALE);
            Vector3::new(mirrored.y, mirrored.x, 0.0)
        }
        BodyKind::Other { orbit_correction } => {
            let correction = if orbit_correction.is_finite() && orbit_correction > 0.0 {
                orbit_correction
            } else {
                1.0
            };
            let geocentric = heliocentric
                .sub(reference_heliocentric)
                .scale(VISUALIZATION_SCALE / correction);
            Vector3::new(geocentric.y, geocentric.x, geocentric.z)
        }
    }
}
