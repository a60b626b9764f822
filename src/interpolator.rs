// Orbital Interpolator - sub-day positions from daily element records

use chrono::{DateTime, Days, Timelike, Utc};

use crate::bodies::BodyCatalog;
use crate::data_cache::DailyElementsTable;
use crate::orbital_mechanics::{blend_elements, solve_position, OrbitalElements, Vector3};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Progress of `instant` through its UTC calendar day, in [0, 1)
pub fn day_fraction(instant: &DateTime<Utc>) -> f64 {
    let seconds = instant.num_seconds_from_midnight() as f64
        + instant.nanosecond().min(999_999_999) as f64 / 1e9;
    (seconds / SECONDS_PER_DAY).clamp(0.0, 1.0)
}

/// Heliocentric position of one body at an exact instant.
///
/// Each record holds osculating elements at 00:00 UTC of its day, so both
/// bracketing days are evaluated at zero elapsed time and blended linearly.
/// Returns `None` when the instant's own day has no record for the body.
pub fn interpolate_position(
    body_index: usize,
    table: &DailyElementsTable,
    instant: &DateTime<Utc>,
) -> Option<Vector3> {
    let day = instant.date_naive();
    let current = table.slot(&day, body_index)?;
    let position = solve_position(current, 0.0);

    let next = day
        .checked_add_days(Days::new(1))
        .and_then(|next_day| table.slot(&next_day, body_index));

    match next {
        Some(next) if next != current => {
            let next_position = solve_position(next, 0.0);
            Some(position.lerp(&next_position, day_fraction(instant)))
        }
        _ => Some(position),
    }
}

/// Element set blended between the bracketing day records.
///
/// Unlike [`interpolate_position`] this interpolates the orbit itself, which
/// keeps the body on a valid ellipse when neighbouring records differ a lot.
pub fn interpolate_elements(
    body_index: usize,
    table: &DailyElementsTable,
    instant: &DateTime<Utc>,
) -> Option<OrbitalElements> {
    let day = instant.date_naive();
    let current = table.slot(&day, body_index)?;
    let next = day
        .checked_add_days(Days::new(1))
        .and_then(|next_day| table.slot(&next_day, body_index));

    Some(match next {
        Some(next) => blend_elements(current, next, day_fraction(instant)),
        None => *current,
    })
}

/// Positions for every catalog body at one instant, indexed like the catalog
pub fn interpolate_frame(
    catalog: &BodyCatalog,
    table: &DailyElementsTable,
    instant: &DateTime<Utc>,
) -> Vec<Option<Vector3>> {
    (0..catalog.len())
        .map(|idx| interpolate_position(idx, table, instant))
        .collect()
}
