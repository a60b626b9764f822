// Animation Driver - maps wall-clock playback onto a calendar span and
// smooths per-body positions with a spring-damper filter

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::bodies::{BodyCatalog, BodyKind};
use crate::data_cache::DailyElementsTable;
use crate::error::{OrbitalError, Result};
use crate::frame_transform::to_visualization_frame;
use crate::interpolator::interpolate_frame;
use crate::orbital_mechanics::Vector3;

/// Largest wall-clock step accepted from one frame (seconds)
pub const MAX_FRAME_DELTA: f64 = 0.1;

/// Minimum wall-clock gap between displayed-date callbacks (seconds, ~10 Hz)
pub const DATE_UPDATE_INTERVAL: f64 = 0.1;

// =============================================================================
// PLAYBACK CONFIGURATION
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    Idle,
    Running,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub total_duration: Duration,
}

impl PlaybackConfig {
    /// Plays `[start_date 00:00, end_date 00:00]` UTC over `total_duration`
    pub fn new(
        start_date: NaiveDate,
        end_date: NaiveDate,
        total_duration: Duration,
    ) -> Result<Self> {
        let start = start_date.and_time(chrono::NaiveTime::MIN).and_utc();
        let end = end_date.and_time(chrono::NaiveTime::MIN).and_utc();
        Self::from_instants(start, end, total_duration)
    }

    pub fn from_instants(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        total_duration: Duration,
    ) -> Result<Self> {
        if end <= start {
            return Err(OrbitalError::InvalidRange {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        if total_duration.is_zero() {
            return Err(OrbitalError::InvalidDuration(
                "total playback duration must be positive".to_string(),
            ));
        }
        Ok(Self {
            start,
            end,
            total_duration,
        })
    }

    /// Calendar instant reached after `progress` (0..=1) of the playback
    pub fn instant_at(&self, progress: f64) -> DateTime<Utc> {
        if progress >= 1.0 {
            return self.end;
        }
        let progress = progress.max(0.0);
        let span_ms = (self.end - self.start).num_milliseconds() as f64;
        self.start + chrono::Duration::milliseconds((span_ms * progress).round() as i64)
    }
}

// =============================================================================
// SPRING STATE
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SmoothedBodyState {
    pub position: Vector3,
    pub velocity: Vector3,
    pub target: Vector3,
    initialized: bool,
}

impl SmoothedBodyState {
    /// The first target places the body directly; later ones are followed
    pub fn set_target(&mut self, target: Vector3) {
        self.target = target;
        if !self.initialized {
            self.snap(target);
        }
    }

    pub fn snap(&mut self, target: Vector3) {
        self.target = target;
        self.position = target;
        self.velocity = Vector3::zero();
        self.initialized = true;
    }

    /// v = v*damping + (target - current)*stiffness*dt*speed; current += v
    pub fn step(&mut self, dt: f64, params: &crate::bodies::SpringParams) {
        let pull = self
            .target
            .sub(&self.position)
            .scale(params.stiffness * dt * params.speed_factor);
        self.velocity = self.velocity.scale(params.damping).add(&pull);
        self.position = self.position.add(&self.velocity);

        if !self.position.is_finite() {
            self.snap(self.target);
        }
    }
}

// =============================================================================
// TARGET RESOLUTION
// =============================================================================

/// Visualization-frame targets for every body at `instant`.
///
/// The reference body is resolved first since every other transform depends
/// on it. Missing records fall back to the last known heliocentric position
/// in `last_known`, then to the origin; good positions refresh `last_known`.
pub fn resolve_targets(
    catalog: &BodyCatalog,
    table: &DailyElementsTable,
    instant: &DateTime<Utc>,
    last_known: &mut [Option<Vector3>],
) -> Vec<Vector3> {
    let raw = interpolate_frame(catalog, table, instant);
    let mut targets = vec![Vector3::zero(); catalog.len()];
    let mut reference = Vector3::zero();

    for idx in catalog.resolution_order() {
        let Some(body) = catalog.get(idx) else {
            continue;
        };

        let heliocentric = match raw[idx] {
            Some(p) if p.is_finite() => {
                last_known[idx] = Some(p);
                Some(p)
            }
            _ => last_known[idx],
        };

        if body.kind == BodyKind::Reference {
            reference = heliocentric.unwrap_or_else(Vector3::zero);
        }

        targets[idx] = match (body.kind, heliocentric) {
            (BodyKind::Other { .. }, None) => Vector3::zero(),
            (kind, helio) => {
                to_visualization_frame(kind, &helio.unwrap_or_else(Vector3::zero), &reference)
            }
        };
    }

    targets
}

// =============================================================================
// ANIMATION DRIVER
// =============================================================================

/// Positions emitted to the renderer for one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameUpdate {
    pub instant: DateTime<Utc>,
    pub progress: f64,
    pub positions: BTreeMap<String, Vector3>,
    /// Set on throttled frames only
    pub displayed_date: Option<DateTime<Utc>>,
    pub completed: bool,
}

type PositionListener = Box<dyn FnMut(&BTreeMap<String, Vector3>) + Send + Sync>;
type DateListener = Box<dyn FnMut(DateTime<Utc>) + Send + Sync>;

pub struct AnimationDriver {
    catalog: BodyCatalog,
    config: Option<PlaybackConfig>,
    state: PlaybackState,
    bodies: Vec<SmoothedBodyState>,
    last_known: Vec<Option<Vector3>>,
    accumulated: f64,
    since_date_update: f64,
    current_instant: Option<DateTime<Utc>>,
    position_listener: Option<PositionListener>,
    date_listener: Option<DateListener>,
}

impl AnimationDriver {
    pub fn new(catalog: BodyCatalog) -> Self {
        let count = catalog.len();
        Self {
            catalog,
            config: None,
            state: PlaybackState::Idle,
            bodies: vec![SmoothedBodyState::default(); count],
            last_known: vec![None; count],
            accumulated: 0.0,
            since_date_update: 0.0,
            current_instant: None,
            position_listener: None,
            date_listener: None,
        }
    }

    pub fn catalog(&self) -> &BodyCatalog {
        &self.catalog
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn config(&self) -> Option<&PlaybackConfig> {
        self.config.as_ref()
    }

    pub fn current_instant(&self) -> Option<DateTime<Utc>> {
        self.current_instant
    }

    pub fn progress(&self) -> f64 {
        match &self.config {
            Some(config) => (self.accumulated / config.total_duration.as_secs_f64()).min(1.0),
            None => 0.0,
        }
    }

    pub fn body_state(&self, id: &str) -> Option<&SmoothedBodyState> {
        self.catalog.index_of(id).and_then(|idx| self.bodies.get(idx))
    }

    /// Full-rate position updates
    pub fn on_positions<F>(&mut self, listener: F)
    where
        F: FnMut(&BTreeMap<String, Vector3>) + Send + Sync + 'static,
    {
        self.position_listener = Some(Box::new(listener));
    }

    /// Throttled (~10 Hz) displayed-date updates
    pub fn on_date<F>(&mut self, listener: F)
    where
        F: FnMut(DateTime<Utc>) + Send + Sync + 'static,
    {
        self.date_listener = Some(Box::new(listener));
    }

    /// Begin a new playback session; all smoothing state is discarded
    pub fn start(&mut self, config: PlaybackConfig) {
        log::info!(
            "Starting playback {} -> {} over {:.1}s",
            config.start,
            config.end,
            config.total_duration.as_secs_f64()
        );
        self.config = Some(config);
        self.state = PlaybackState::Running;
        self.accumulated = 0.0;
        self.since_date_update = 0.0;
        self.current_instant = Some(config.start);
        self.bodies = vec![SmoothedBodyState::default(); self.catalog.len()];
        self.last_known = vec![None; self.catalog.len()];
    }

    pub fn stop(&mut self) {
        if self.state == PlaybackState::Running {
            log::info!("Playback stopped at {:?}", self.current_instant);
        }
        self.state = PlaybackState::Idle;
    }

    /// Advance one rendered frame by `frame_dt` wall-clock seconds.
    /// Returns `None` unless the driver is running.
    pub fn tick(&mut self, frame_dt: f64, table: &DailyElementsTable) -> Option<FrameUpdate> {
        if self.state != PlaybackState::Running {
            return None;
        }
        let config = self.config?;

        let dt = if frame_dt.is_finite() {
            frame_dt.clamp(0.0, MAX_FRAME_DELTA)
        } else {
            0.0
        };
        self.accumulated += dt;
        self.since_date_update += dt;

        let progress = self.accumulated / config.total_duration.as_secs_f64();
        let completed = progress >= 1.0;
        let instant = config.instant_at(progress);
        self.current_instant = Some(instant);

        let targets = resolve_targets(&self.catalog, table, &instant, &mut self.last_known);

        for (idx, target) in targets.into_iter().enumerate() {
            let Some(body) = self.catalog.get(idx) else {
                continue;
            };
            let state = &mut self.bodies[idx];
            if completed {
                state.snap(target);
            } else {
                state.set_target(target);
                state.step(dt, &body.size.spring_params());
            }
        }

        let positions: BTreeMap<String, Vector3> = self
            .catalog
            .bodies()
            .iter()
            .zip(self.bodies.iter())
            .map(|(body, state)| (body.id.clone(), state.position))
            .collect();

        let displayed_date = if completed || self.since_date_update >= DATE_UPDATE_INTERVAL {
            // keep the remainder so the cadence does not drift below 10 Hz
            self.since_date_update = (self.since_date_update - DATE_UPDATE_INTERVAL)
                .clamp(0.0, DATE_UPDATE_INTERVAL);
            Some(instant)
        } else {
            None
        };

        if let Some(listener) = self.position_listener.as_mut() {
            listener(&positions);
        }
        if let (Some(date), Some(listener)) = (displayed_date, self.date_listener.as_mut()) {
            listener(date);
        }

        if completed {
            self.state = PlaybackState::Complete;
            log::info!("Playback complete at {}", instant);
        }

        Some(FrameUpdate {
            instant,
            progress: progress.min(1.0),
            positions,
            displayed_date,
            completed,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
