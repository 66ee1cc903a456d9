use clap::Parser;
use queue_warden::config::Config;
use queue_warden::{bootstrap, deletion_bridge::DeletionBridge};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

/// Maintenance daemon that cleans up stalled, slow, and orphaned entries in
/// media-library download queues.
#[derive(Parser, Debug)]
#[command(name = "queue-warden", version, about)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, short, default_value = "queue-warden.yaml")]
    config: PathBuf,

    /// Suppress every mutating backend call; reads proceed normally. Overrides the
    /// config file's `general.testRun` when set.
    #[arg(long, env = "QUEUE_WARDEN__GENERAL__TEST_RUN")]
    test_run: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load configuration: {err}");
            return ExitCode::FAILURE;
        }
    };
    if cli.test_run {
        config.general.test_run = true;
    }

    let filter = config.general.log_level.as_filter_directive();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();

    if config.general.test_run {
        info!("test run enabled: mutating backend calls will be suppressed");
    }

    let mut scheduler = match bootstrap::build_scheduler(config.clone()).await {
        Ok(scheduler) => scheduler,
        Err(err) => {
            error!(error = %err, "setup failed");
            return ExitCode::FAILURE;
        }
    };

    spawn_deletion_bridges(&config).await;

    match scheduler.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "scheduler exited with an error");
            ExitCode::FAILURE
        }
    }
}

/// Build a [`DeletionBridge`] for every configured curator instance and let it run in
/// the background for the life of the process. A bridge that fails to construct (e.g.
/// an unreachable curator) is skipped with a warning rather than aborting startup,
/// since the deletion bridge is a convenience on top of the core cycle loop, not a
/// dependency of it.
async fn spawn_deletion_bridges(config: &Config) {
    use queue_warden::gateway::{build_http_client, CuratorGateway, HttpCuratorGateway};
    use std::sync::Arc;

    let Ok(http_client) = build_http_client(config.general.ssl_verification) else {
        return;
    };

    for (kind, instances) in &config.instances {
        for instance in instances {
            let gateway: Arc<dyn CuratorGateway> = Arc::new(HttpCuratorGateway::new(
                http_client.clone(),
                *kind,
                instance,
                config.general.test_run,
            ));
            let root_folders = match gateway.list_root_folders().await {
                Ok(folders) => folders
                    .into_iter()
                    .filter(|f| f.accessible)
                    .map(|f| f.path)
                    .collect::<Vec<_>>(),
                Err(err) => {
                    tracing::warn!(curator = gateway.name(), error = %err, "skipping deletion bridge: could not list root folders");
                    continue;
                }
            };
            if root_folders.is_empty() {
                continue;
            }
            match DeletionBridge::new(gateway, &root_folders) {
                Ok(bridge) => {
                    tokio::spawn(bridge.run());
                }
                Err(err) => {
                    tracing::warn!(error = %err, "skipping deletion bridge: failed to start watcher");
                }
            }
        }
    }
}
