use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use shutter::cloud::{HttpCloudClient, RegionSessions};
use shutter::config::ConfigManager;
use shutter::constants::scheduling;
use shutter::discovery;
use shutter::runner::RunLoop;
use shutter::scheduler::SnapshotScheduler;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/main.toml".to_string());

    // Config decides the default log level, so load it first; RUST_LOG
    // still wins when set.
    let config_manager = ConfigManager::new(&config_path).await?;
    let config = config_manager.get_current_config();

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(format!("shutter={}", config.log_level))
            .add_directive("hyper=warn".parse()?)
            .add_directive("reqwest=warn".parse()?),
    };
    fmt().with_env_filter(env_filter).init();

    info!("Starting shutter snapshot agent");
    info!(
        "Configuration loaded: {} regions, {} pinned instances, default policy {}/{} on {}",
        config.regions.len(),
        config.instances.len(),
        config.defaults.frequency,
        config.defaults.retention_count,
        config.defaults.root_volume_selector
    );

    let sessions = Arc::new(RegionSessions::new(&config));
    let cloud = Arc::new(HttpCloudClient::new(config.api_key.clone(), sessions));

    // Discovery failure is fatal: with no instance set there is nothing to do
    let instances = discovery::discover(cloud.as_ref(), &config).await?;
    if instances.is_empty() {
        info!("No eligible instances found, nothing to do");
        return Ok(());
    }

    let scheduler = Arc::new(SnapshotScheduler::new(
        cloud.clone(),
        scheduling::DEFAULT_JITTER_MINUTES,
        Duration::from_secs(config.copy_wait_timeout_seconds),
    ));
    let runner = RunLoop::new(cloud, scheduler, config.concurrency_limit);

    // One pass over the fleet; external cron drives repetition
    let report = runner.run(instances).await;

    if report.failed > 0 {
        warn!(
            "{} of {} instances failed this pass; see log for details",
            report.failed, report.instances
        );
    }

    Ok(())
}
