// # labeldnsd - Label-driven DNS daemon
//
// This is a THIN integration layer. All reconciliation logic lives in
// labeldns-core; the daemon is responsible for:
// 1. Reading configuration from environment variables (and a secret file)
// 2. Initializing tracing and the runtime
// 3. Registering the provider, container source and IP source plugins
// 4. Starting the sync scheduler and stopping it on SIGINT/SIGTERM
//
// ## Configuration
//
// ### Credentials (exactly one)
// - `API_TOKEN`: Cloudflare API token
// - `API_TOKEN_FILE`: File holding the token (e.g. a Docker secret)
//
// ### Identity
// - `PROJECT_LABEL`: First half of the tracking id (default `docker-compose-external-dns`)
// - `INSTANCE_ID`: Second half of the tracking id (default `1`)
//
// ### Scheduling
// - `EXECUTION_FREQUENCY_SECONDS`: Seconds between sync cycles (default 60)
// - `DDNS_EXECUTION_FREQUENCY_MINUTES`: Minutes between public address lookups (default 60)
//
// ### Endpoints
// - `DOCKER_HOST`: Docker Engine endpoint (default `http://localhost:2375`)
// - `DDNS_IP_LOOKUP_URL`: Public address lookup service (default `https://ipinfo.io`)
//
// ### Logging
// - `LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export API_TOKEN_FILE=/run/secrets/cloudflare_token
// export DOCKER_HOST=tcp://docker-socket-proxy:2375
// export INSTANCE_ID=home
//
// labeldnsd
// ```

use anyhow::{Context, Result};
use labeldns_core::config::{
    ContainerSourceConfig, EngineConfig, IpSourceConfig, ProviderConfig, SyncConfig,
    TrackingConfig,
};
use labeldns_core::{EngineEvent, ProviderRegistry, Scheduler, SyncEngine};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Upper bound on waiting for an in-flight cycle at shutdown
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LabeldnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<LabeldnsExitCode> for ExitCode {
    fn from(code: LabeldnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Daemon configuration, as read from the environment
struct Config {
    /// ⚠️ NEVER log this value
    api_token: String,
    project_label: String,
    instance_id: String,
    sync_interval_secs: u64,
    ddns_interval_mins: u64,
    docker_host: String,
    ip_lookup_url: String,
    log_level: Level,
}

impl Config {
    /// Load configuration from the process environment
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to
    /// its value (unset or empty variables are treated alike)
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let engine_defaults = EngineConfig::default();

        Ok(Self {
            api_token: read_api_token(var("API_TOKEN"), var("API_TOKEN_FILE"))?,
            project_label: var("PROJECT_LABEL")
                .unwrap_or_else(|| labeldns_core::config::DEFAULT_PROJECT_LABEL.to_string()),
            instance_id: var("INSTANCE_ID")
                .unwrap_or_else(|| labeldns_core::config::DEFAULT_INSTANCE_ID.to_string()),
            sync_interval_secs: parse_positive(
                "EXECUTION_FREQUENCY_SECONDS",
                var("EXECUTION_FREQUENCY_SECONDS"),
                engine_defaults.sync_interval_secs,
            )?,
            ddns_interval_mins: parse_positive(
                "DDNS_EXECUTION_FREQUENCY_MINUTES",
                var("DDNS_EXECUTION_FREQUENCY_MINUTES"),
                engine_defaults.ddns_interval_mins,
            )?,
            docker_host: normalize_docker_host(
                var("DOCKER_HOST").unwrap_or_else(|| "http://localhost:2375".to_string()),
            )?,
            ip_lookup_url: var("DDNS_IP_LOOKUP_URL")
                .unwrap_or_else(|| "https://ipinfo.io".to_string()),
            log_level: parse_log_level(var("LOG_LEVEL").as_deref().unwrap_or("info"))?,
        })
    }

    /// Convert to the core configuration and validate it
    fn to_sync_config(&self) -> Result<SyncConfig> {
        let config = SyncConfig {
            tracking: TrackingConfig::new(&self.project_label, &self.instance_id),
            provider: ProviderConfig::Cloudflare {
                api_token: self.api_token.clone(),
            },
            containers: ContainerSourceConfig::Docker {
                host: self.docker_host.clone(),
            },
            ip_source: IpSourceConfig::Http {
                url: self.ip_lookup_url.clone(),
            },
            engine: EngineConfig {
                sync_interval_secs: self.sync_interval_secs,
                ddns_interval_mins: self.ddns_interval_mins,
                ..EngineConfig::default()
            },
        };
        config.validate()?;
        Ok(config)
    }
}

/// Resolve the API token from exactly one of `API_TOKEN` / `API_TOKEN_FILE`
fn read_api_token(inline: Option<String>, file: Option<String>) -> Result<String> {
    let token = match (inline, file) {
        (Some(_), Some(_)) => {
            anyhow::bail!("Set only one of API_TOKEN and API_TOKEN_FILE, not both")
        }
        (None, None) => anyhow::bail!(
            "API_TOKEN or API_TOKEN_FILE is required. \
            Set it via: export API_TOKEN_FILE=/run/secrets/cloudflare_token"
        ),
        (Some(token), None) => token,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read API_TOKEN_FILE {}", path))?,
    };

    let token = token.trim().to_string();
    if token.is_empty() {
        anyhow::bail!("The API token is empty");
    }
    Ok(token)
}

fn parse_positive(key: &str, value: Option<String>, default: u64) -> Result<u64> {
    let Some(value) = value else {
        return Ok(default);
    };
    match value.trim().parse::<u64>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => anyhow::bail!("{} must be a positive integer. Got: {}", key, value),
    }
}

/// Accept the Docker CLI's `tcp://` spelling; the Engine is reached over HTTP
fn normalize_docker_host(host: String) -> Result<String> {
    if let Some(rest) = host.strip_prefix("tcp://") {
        return Ok(format!("http://{}", rest));
    }
    if host.starts_with("unix://") {
        anyhow::bail!(
            "DOCKER_HOST '{}' is a unix socket. Expose the Engine over TCP \
            (e.g. through a socket proxy) and use tcp:// or http://",
            host
        );
    }
    Ok(host)
}

fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            level
        ),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return LabeldnsExitCode::ConfigError.into();
        }
    };

    let sync_config = match config.to_sync_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration validation error: {:#}", e);
            return LabeldnsExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return LabeldnsExitCode::ConfigError.into();
    }

    info!("Starting labeldnsd daemon");

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return LabeldnsExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run_daemon(sync_config)).into()
}

/// Build the engine from the registered plugins
fn build_engine(
    registry: &ProviderRegistry,
    config: &SyncConfig,
) -> Result<(Arc<SyncEngine>, mpsc::Receiver<EngineEvent>)> {
    let provider = registry.create_provider(&config.provider)?;
    let containers = registry.create_container_source(&config.containers)?;
    let ip_source = registry.create_ip_source(&config.ip_source)?;

    let (engine, events) = SyncEngine::new(
        Arc::from(provider),
        Arc::from(containers),
        Arc::from(ip_source),
        &config.engine,
    )?;
    engine.initialize(&config.tracking.tracking_id())?;

    Ok((Arc::new(engine), events))
}

fn register_plugins(registry: &ProviderRegistry) {
    #[cfg(feature = "cloudflare")]
    {
        info!("Registering Cloudflare provider");
        labeldns_provider_cloudflare::register(registry);
    }

    #[cfg(feature = "docker")]
    {
        info!("Registering Docker container source");
        labeldns_docker::register(registry);
    }

    #[cfg(feature = "http")]
    {
        info!("Registering HTTP IP source");
        labeldns_ip_http::register(registry);
    }
}

/// Run the daemon until a shutdown signal arrives
async fn run_daemon(config: SyncConfig) -> LabeldnsExitCode {
    let registry = ProviderRegistry::new();
    register_plugins(&registry);

    let (engine, mut events) = match build_engine(&registry, &config) {
        Ok(built) => built,
        Err(e) => {
            error!("Startup error: {:#}", e);
            return LabeldnsExitCode::ConfigError;
        }
    };

    info!(
        "Tracking id {}; syncing every {}s, DDNS lookups every {}m",
        config.tracking.tracking_id(),
        config.engine.sync_interval_secs,
        config.engine.ddns_interval_mins
    );

    // The engine logs outcomes itself; keep the channel drained
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!("Engine event: {:?}", event);
        }
    });

    let scheduler = Scheduler::from_arc(Arc::clone(&engine));
    if let Err(e) = scheduler.start() {
        error!("Failed to start sync scheduler: {}", e);
        return LabeldnsExitCode::RuntimeError;
    }

    match wait_for_shutdown().await {
        Ok(signal) => info!("Received shutdown signal: {}", signal),
        Err(e) => {
            error!("Shutdown error: {}", e);
            return LabeldnsExitCode::RuntimeError;
        }
    }

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, shutdown(&scheduler, &engine)).await {
        Ok(Ok(())) => {
            info!("Shutdown complete");
            LabeldnsExitCode::CleanShutdown
        }
        Ok(Err(e)) => {
            error!("Shutdown error: {}", e);
            LabeldnsExitCode::RuntimeError
        }
        Err(_) => {
            error!("Shutdown timeout after {:?}", SHUTDOWN_TIMEOUT);
            LabeldnsExitCode::RuntimeError
        }
    }
}

/// Stop the sync scheduler, then the dynamic address discovery if running
async fn shutdown(scheduler: &Scheduler<SyncEngine>, engine: &SyncEngine) -> Result<()> {
    info!("Stopping sync scheduler");
    scheduler.stop_and_wait().await?;

    if engine.dynamic_address().is_running() {
        info!("Stopping dynamic address discovery");
        if let Err(e) = engine.dynamic_address().stop_and_wait().await {
            warn!("Failed to stop dynamic address discovery: {}", e);
        }
    }
    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let received = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(received)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
