// JPL Horizons API Client
// Fetches daily osculating elements and ecliptic longitude series

use chrono::{Days, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::future::Future;

use crate::bodies::BodyConfig;
use crate::data_cache::EphemerisProvider;
use crate::error::EphemerisError;
use crate::orbital_mechanics::OrbitalElements;

pub const HORIZONS_BASE_URL: &str = "https://ssd.jpl.nasa.gov/api/horizons.api";

const START_MARKER: &str = "$$SOE";
const END_MARKER: &str = "$$EOE";

// =============================================================================
// API RESPONSE TYPES
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HorizonsResponse {
    pub signature: Option<Signature>,
    pub result: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signature {
    pub source: Option<String>,
    pub version: Option<String>,
}

/// Observer-frame ecliptic longitude of a body on one day
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LongitudePoint {
    pub date: NaiveDate,
    /// Degrees, [0, 360)
    pub longitude: f64,
}

// =============================================================================
// TABLE PARSING
// =============================================================================

/// Data rows between the `$$SOE` / `$$EOE` markers
fn ephemeris_rows(result: &str) -> Result<Vec<Vec<String>>, EphemerisError> {
    let start = result
        .find(START_MARKER)
        .ok_or_else(|| EphemerisError::Parse("missing $$SOE marker".to_string()))?;
    let body = &result[start + START_MARKER.len()..];
    let end = body
        .find(END_MARKER)
        .ok_or_else(|| EphemerisError::Parse("missing $$EOE marker".to_string()))?;

    Ok(body[..end]
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.split(',').map(|c| c.trim().to_string()).collect())
        .collect())
}

fn column(row: &[String], idx: usize, name: &str) -> Result<f64, EphemerisError> {
    row.get(idx)
        .ok_or_else(|| EphemerisError::Parse(format!("missing column {}", name)))?
        .parse::<f64>()
        .map_err(|e| EphemerisError::Parse(format!("bad {} value: {}", name, e)))
}

/// Parse the first row of an ELEMENTS table in CSV form.
///
/// Columns: JDTDB, Calendar Date, EC, QR, IN, OM, W, Tp, N, MA, TA, A, AD, PR
pub fn parse_elements(result: &str) -> Result<OrbitalElements, EphemerisError> {
    let rows = ephemeris_rows(result)?;
    let row = rows
        .first()
        .ok_or_else(|| EphemerisError::Parse("empty elements table".to_string()))?;

    Ok(OrbitalElements {
        a: column(row, 11, "A")?,
        e: column(row, 2, "EC")?,
        i: column(row, 4, "IN")?,
        om: column(row, 5, "OM")?,
        w: column(row, 6, "W")?,
        m0: column(row, 9, "MA")?,
        t: column(row, 13, "PR")?,
    })
}

/// Parse an OBSERVER table with quantity 31 (ObsEcLon, ObsEcLat) in CSV form
pub fn parse_longitudes(result: &str) -> Result<Vec<LongitudePoint>, EphemerisError> {
    ephemeris_rows(result)?
        .into_iter()
        .map(|row| {
            let stamp = row
                .first()
                .ok_or_else(|| EphemerisError::Parse("empty observer row".to_string()))?;
            let date = NaiveDateTime::parse_from_str(stamp, "%Y-%b-%d %H:%M")
                .map_err(|e| EphemerisError::Parse(format!("bad date '{}': {}", stamp, e)))?
                .date();
            // solar/lunar presence flags precede the longitude and may be blank
            let longitude = row[1..]
                .iter()
                .find_map(|c| c.parse::<f64>().ok())
                .ok_or_else(|| EphemerisError::Parse(format!("no longitude on {}", date)))?;
            Ok(LongitudePoint { date, longitude })
        })
        .collect()
}

// =============================================================================
// API CLIENT
// =============================================================================

#[derive(Debug, Clone)]
pub struct HorizonsClient {
    base_url: String,
    client: reqwest::Client,
}

impl HorizonsClient {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    async fn query(&self, params: &[(&str, String)]) -> Result<String, EphemerisError> {
        let response = self.client.get(&self.base_url).query(params).send().await?;

        if !response.status().is_success() {
            return Err(EphemerisError::Status(response.status().as_u16()));
        }

        let data: HorizonsResponse = response.json().await?;
        if let Some(error) = data.error {
            return Err(EphemerisError::Parse(error));
        }
        data.result
            .ok_or_else(|| EphemerisError::Parse("response has no result".to_string()))
    }

    /// Heliocentric ecliptic elements at 00:00 TDB of `date`
    pub async fn fetch_elements_for(
        &self,
        body: &BodyConfig,
        date: NaiveDate,
    ) -> Result<OrbitalElements, EphemerisError> {
        let stop = date
            .checked_add_days(Days::new(1))
            .ok_or_else(|| EphemerisError::Parse(format!("date out of range: {}", date)))?;

        let params = [
            ("format", "json".to_string()),
            ("COMMAND", format!("'{}'", body.horizons_id)),
            ("OBJ_DATA", "'NO'".to_string()),
            ("MAKE_EPHEM", "'YES'".to_string()),
            ("EPHEM_TYPE", "'ELEMENTS'".to_string()),
            ("CENTER", "'500@10'".to_string()),
            ("REF_PLANE", "'ECLIPTIC'".to_string()),
            ("OUT_UNITS", "'AU-D'".to_string()),
            ("CSV_FORMAT", "'YES'".to_string()),
            ("START_TIME", format!("'{}'", date)),
            ("STOP_TIME", format!("'{}'", stop)),
            ("STEP_SIZE", "'1 d'".to_string()),
        ];

        let result = self.query(&params).await?;
        parse_elements(&result).map_err(|e| match e {
            EphemerisError::Parse(msg) if msg.starts_with("empty") => EphemerisError::MissingData {
                body: body.id.clone(),
                date: date.to_string(),
            },
            other => other,
        })
    }

    /// Daily geocentric ecliptic longitudes over `[start, end]`
    pub async fn fetch_longitudes(
        &self,
        body: &BodyConfig,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<LongitudePoint>, EphemerisError> {
        let params = [
            ("format", "json".to_string()),
            ("COMMAND", format!("'{}'", body.horizons_id)),
            ("OBJ_DATA", "'NO'".to_string()),
            ("MAKE_EPHEM", "'YES'".to_string()),
            ("EPHEM_TYPE", "'OBSERVER'".to_string()),
            ("CENTER", "'500@399'".to_string()),
            ("QUANTITIES", "'31'".to_string()),
            ("CSV_FORMAT", "'YES'".to_string()),
            ("START_TIME", format!("'{}'", start)),
            ("STOP_TIME", format!("'{}'", end)),
            ("STEP_SIZE", "'1 d'".to_string()),
        ];

        let result = self.query(&params).await?;
        parse_longitudes(&result)
    }
}

impl Default for HorizonsClient {
    fn default() -> Self {
        Self::new(HORIZONS_BASE_URL.to_string())
    }
}

impl EphemerisProvider for HorizonsClient {
    fn fetch_elements(
        &self,
        body: &BodyConfig,
        date: NaiveDate,
    ) -> impl Future<Output = Result<OrbitalElements, EphemerisError>> + Send {
        let client = self.clone();
        let body = body.clone();
        async move { client.fetch_elements_for(&body, date).await }
    }
}
