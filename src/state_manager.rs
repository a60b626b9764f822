// State Manager - Thread-safe playback state handling
// Owns the animation session and element cache, runs the frame loop and
// exposes the commands used by playback controls and the renderer.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::animation::{resolve_targets, AnimationDriver, PlaybackConfig, PlaybackState};
use crate::api_client::HorizonsClient;
use crate::bodies::BodyCatalog;
use crate::config::Config;
use crate::data_cache::{
    parse_date, CacheStore, CoverageMetadata, DataCache, EphemerisProvider, ExtendReport,
    FileStore, MemoryStore,
};
use crate::error::{OrbitalError, Result};

// =============================================================================
// GLOBAL STATE
// =============================================================================

pub struct AppState<P: EphemerisProvider = HorizonsClient> {
    pub driver: Arc<RwLock<AnimationDriver>>,
    pub cache: Arc<DataCache<P>>,
    pub is_running: Arc<RwLock<bool>>,
}

impl AppState<HorizonsClient> {
    pub fn from_config(config: &Config) -> Result<Self> {
        let store: Box<dyn CacheStore> = match &config.cache_dir {
            Some(dir) => Box::new(FileStore::new(dir)?),
            None => Box::new(MemoryStore::new()),
        };
        let provider = HorizonsClient::new(config.horizons_base_url.clone());
        Ok(Self::with_cache(DataCache::with_store(
            BodyCatalog::solar_system(),
            provider,
            store,
        )))
    }
}

impl<P: EphemerisProvider> AppState<P> {
    pub fn with_cache(cache: DataCache<P>) -> Self {
        let driver = AnimationDriver::new(cache.catalog().clone());
        Self {
            driver: Arc::new(RwLock::new(driver)),
            cache: Arc::new(cache),
            is_running: Arc::new(RwLock::new(false)),
        }
    }
}

// =============================================================================
// FRAME LOOP (runs in background thread)
// =============================================================================

/// Ticks the driver against whatever is already cached; never fetches
pub fn start_playback_loop<P>(
    driver: Arc<RwLock<AnimationDriver>>,
    cache: Arc<DataCache<P>>,
    is_running: Arc<RwLock<bool>>,
    frame_interval: Duration,
) -> thread::JoinHandle<()>
where
    P: EphemerisProvider + 'static,
{
    *is_running.write() = true;

    thread::spawn(move || {
        let mut last_frame = Instant::now();

        loop {
            let start = Instant::now();
            let frame_dt = start.duration_since(last_frame).as_secs_f64();
            last_frame = start;

            if driver.read().state() == PlaybackState::Running {
                let table = cache.snapshot();
                let update = driver.write().tick(frame_dt, &table);
                if let Some(update) = update {
                    log::debug!(
                        "frame {} progress {:.3}",
                        update.instant,
                        update.progress
                    );
                }
            }

            if !*is_running.read() {
                break;
            }

            // Sleep to maintain frame rate
            let elapsed = start.elapsed();
            if elapsed < frame_interval {
                thread::sleep(frame_interval - elapsed);
            }
        }
    })
}

// =============================================================================
// SERIALIZABLE STATE FOR FRONTEND
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontendBody {
    pub id: String,
    pub name: String,
    pub position: [f64; 3], // scene units
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackStatus {
    pub state: PlaybackState,
    pub progress: f64,
    pub current_date: Option<String>,
    pub coverage: CoverageMetadata,
    pub bodies: Vec<FrontendBody>,
}

impl AnimationDriver {
    pub fn to_frontend(&self) -> Vec<FrontendBody> {
        self.catalog()
            .bodies()
            .iter()
            .filter_map(|b| {
                let state = self.body_state(&b.id)?;
                Some(FrontendBody {
                    id: b.id.clone(),
                    name: b.name.clone(),
                    position: [state.position.x, state.position.y, state.position.z],
                })
            })
            .collect()
    }
}

// =============================================================================
// COMMANDS
// =============================================================================

pub fn get_playback_status<P: EphemerisProvider>(state: &AppState<P>) -> PlaybackStatus {
    let driver = state.driver.read();
    PlaybackStatus {
        state: driver.state(),
        progress: driver.progress(),
        current_date: driver.current_instant().map(|t| t.to_rfc3339()),
        coverage: state.cache.coverage(),
        bodies: driver.to_frontend(),
    }
}

/// Fetch any missing element records for `[start, end]` ahead of playback
pub async fn prefetch_range<P: EphemerisProvider>(
    state: &AppState<P>,
    start: &str,
    end: &str,
) -> std::result::Result<ExtendReport, String> {
    state
        .cache
        .extend_range_str(start, end)
        .await
        .map_err(|e| e.to_string())
}

pub fn start_playback<P: EphemerisProvider>(
    state: &AppState<P>,
    start: &str,
    end: &str,
    duration_seconds: f64,
) -> std::result::Result<(), String> {
    if !(duration_seconds.is_finite() && duration_seconds > 0.0) {
        return Err(format!("Invalid playback duration: {}", duration_seconds));
    }
    let duration = Duration::try_from_secs_f64(duration_seconds)
        .map_err(|e| OrbitalError::InvalidDuration(format!("{}: {}", duration_seconds, e)))
        .map_err(|e| e.to_string())?;
    let start_date = parse_date(start).map_err(|e| e.to_string())?;
    let end_date = parse_date(end).map_err(|e| e.to_string())?;
    let config =
        PlaybackConfig::new(start_date, end_date, duration).map_err(|e| e.to_string())?;

    if !state.cache.check_availability(start_date, end_date) {
        log::warn!(
            "Starting playback {}..{} with incomplete element data",
            start_date,
            end_date
        );
    }

    state.driver.write().start(config);
    Ok(())
}

pub fn stop_playback<P: EphemerisProvider>(state: &AppState<P>) {
    state.driver.write().stop();
}

/// Unsmoothed visualization positions at an RFC 3339 instant
pub fn get_positions_at<P: EphemerisProvider>(
    state: &AppState<P>,
    instant: &str,
) -> std::result::Result<BTreeMap<String, [f64; 3]>, String> {
    let instant: DateTime<Utc> = DateTime::parse_from_rfc3339(instant)
        .map_err(|e| format!("Invalid instant '{}': {}", instant, e))?
        .with_timezone(&Utc);

    let catalog = state.cache.catalog();
    let table = state.cache.snapshot();
    let targets = resolve_targets(catalog, &table, &instant, &mut vec![None; catalog.len()]);

    Ok(catalog
        .bodies()
        .iter()
        .zip(targets)
        .map(|(body, p)| (body.id.clone(), [p.x, p.y, p.z]))
        .collect())
}

pub async fn prune_cache<P: EphemerisProvider>(
    state: &AppState<P>,
    cutoff: &str,
) -> std::result::Result<usize, String> {
    let cutoff = parse_date(cutoff).map_err(|e| e.to_string())?;
    Ok(state.cache.prune_before(cutoff).await)
}

pub async fn clear_cache<P: EphemerisProvider>(
    state: &AppState<P>,
) -> std::result::Result<(), String> {
    state.cache.clear().await.map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_cache::tests::MockProvider;

    fn app() -> AppState<MockProvider> {
        AppState::with_cache(DataCache::new(BodyCatalog::solar_system(), MockProvider::new()))
    }

    #[tokio::test]
    async fn test_prefetch_then_query_positions() {
        let state = app();
        let report = prefetch_range(&state, "2025-01-01", "2025-01-02").await.unwrap();
        assert_eq!(report.failed, 0);

        let positions = get_positions_at(&state, "2025-01-01T12:00:00Z").unwrap();
        assert_eq!(positions.len(), 10);
        assert_eq!(positions["earth"], [0.0, 0.0, 0.0]);
        assert_eq!(positions["sun"][2], 0.0);
    }

    #[tokio::test]
    async fn test_prefetch_rejects_bad_range() {
        let state = app();
        assert!(prefetch_range(&state, "2025-01-05", "2025-01-01").await.is_err());
        assert!(prefetch_range(&state, "yesterday", "2025-01-01").await.is_err());
    }

    #[test]
    fn test_start_and_stop_playback() {
        let state = app();
        assert!(start_playback(&state, "2025-01-02", "2025-01-01", 10.0).is_err());
        assert!(start_playback(&state, "2025-01-01", "2025-01-02", 0.0).is_err());
        assert!(start_playback(&state, "2025-01-01", "2025-01-02", 1e20).is_err());
        assert_eq!(get_playback_status(&state).state, PlaybackState::Idle);

        start_playback(&state, "2025-01-01", "2025-01-02", 10.0).unwrap();
        assert_eq!(get_playback_status(&state).state, PlaybackState::Running);

        stop_playback(&state);
        assert_eq!(get_playback_status(&state).state, PlaybackState::Idle);
    }

    #[test]
    fn test_positions_at_rejects_bad_instant() {
        let state = app();
        assert!(get_positions_at(&state, "noon").is_err());
    }

    #[tokio::test]
    async fn test_prune_and_clear_commands() {
        let state = app();
        prefetch_range(&state, "2025-01-01", "2025-01-04").await.unwrap();
        assert_eq!(prune_cache(&state, "2025-01-03").await.unwrap(), 2);
        clear_cache(&state).await.unwrap();
        assert!(state.cache.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_loop_runs_playback_to_completion() {
        let state = app();
        prefetch_range(&state, "2025-01-01", "2025-01-02").await.unwrap();
        start_playback(&state, "2025-01-01", "2025-01-02", 0.2).unwrap();

        let handle = start_playback_loop(
            state.driver.clone(),
            state.cache.clone(),
            state.is_running.clone(),
            Duration::from_millis(5),
        );

        let deadline = Instant::now() + Duration::from_secs(5);
        while state.driver.read().state() != PlaybackState::Complete && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        *state.is_running.write() = false;
        handle.join().unwrap();

        let status = get_playback_status(&state);
        assert_eq!(status.state, PlaybackState::Complete);
        assert_eq!(status.progress, 1.0);
        assert_eq!(status.bodies.len(), 10);
    }
}
