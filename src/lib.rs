// Orbital Playback - Keplerian positions, daily element cache and smoothed animation
// Library entry point; the renderer and playback controls live outside this crate

pub mod animation;
pub mod api_client;
pub mod bodies;
pub mod config;
pub mod data_cache;
pub mod error;
pub mod frame_transform;
pub mod interpolator;
pub mod orbital_mechanics;
pub mod state_manager;

pub use animation::{AnimationDriver, FrameUpdate, PlaybackConfig, PlaybackState};
pub use bodies::{BodyCatalog, BodyConfig, BodyKind};
pub use config::Config;
pub use data_cache::{CoverageMetadata, DailyElementsTable, DataCache, EphemerisProvider};
pub use error::{EphemerisError, OrbitalError, Result};
pub use orbital_mechanics::{blend_elements, solve_position, OrbitalElements, Vector3};
pub use state_manager::AppState;

use state_manager::{get_playback_status, prefetch_range, start_playback, start_playback_loop};

/// Prefetch the configured span, then play it back on the frame loop,
/// logging the displayed date as it advances.
pub async fn run(config: Config) -> Result<()> {
    let app_state = AppState::from_config(&config)?;
    app_state.cache.load().await?;

    let start = config.playback_start.to_string();
    let end = config.playback_end.to_string();

    match prefetch_range(&app_state, &start, &end).await {
        Ok(report) => log::info!(
            "Prefetched {} day(s): {} fetched, {} failed",
            report.days,
            report.fetched,
            report.failed
        ),
        Err(e) => log::warn!("Prefetch failed: {}", e),
    }

    app_state
        .driver
        .write()
        .on_date(|date| log::info!("Displayed date {}", date.format("%Y-%m-%d %H:%M")));

    start_playback(
        &app_state,
        &start,
        &end,
        config.playback_duration.as_secs_f64(),
    )
    .map_err(OrbitalError::Config)?;

    // Start background frame loop
    let handle = start_playback_loop(
        app_state.driver.clone(),
        app_state.cache.clone(),
        app_state.is_running.clone(),
        config.frame_interval(),
    );

    loop {
        tokio::time::sleep(std::time::Duration::from_millis(250)).await;
        if get_playback_status(&app_state).state != PlaybackState::Running {
            break;
        }
    }

    *app_state.is_running.write() = false;
    if handle.join().is_err() {
        log::warn!("Frame loop panicked");
    }

    let status = get_playback_status(&app_state);
    for body in &status.bodies {
        log::info!(
            "{:>8}: ({:.3}, {:.3}, {:.3})",
            body.name,
            body.position[0],
            body.position[1],
            body.position[2]
        );
    }
    Ok(())
}
