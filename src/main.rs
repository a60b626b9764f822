// Headless playback driver

use orbital_playback::Config;

#[tokio::main]
async fn main() {
    env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    if let Err(e) = orbital_playback::run(config).await {
        log::error!("Playback failed: {}", e);
        std::process::exit(1);
    }
}
