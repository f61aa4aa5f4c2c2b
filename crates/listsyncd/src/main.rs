// # listsyncd - listsync Daemon
//
// The listsyncd daemon is a thin integration layer. It is responsible for:
// 1. Reading configuration from environment variables (and `.env`)
// 2. Initializing logging and the runtime
// 3. Registering backends and building them from configuration
// 4. Running the ListService until SIGTERM/SIGINT
//
// ## Configuration
//
// ### Store
// - `LISTSYNC_STORE_TYPE`: Store type (file, memory). Default `file`
// - `LISTSYNC_STORE_PATH`: Directory of the database file. Default `./data`
// - `LISTSYNC_DB`: Database name. Default `checker`
//
// ### Cache
// - `LISTSYNC_CACHE_TYPE`: Cache type (redis, memory). Default `redis`
// - `LISTSYNC_REDIS_URL`: Redis database the list readers cache in.
//   Default `redis://127.0.0.1:6379/0`
//
// ### Collections
// - `LISTSYNC_IP_COLLECTION`, `LISTSYNC_DOMAIN_COLLECTION`,
//   `LISTSYNC_URL_COLLECTION`: Result collections
// - `LISTSYNC_IP_URLS_COLLECTION`, `LISTSYNC_DOMAIN_URLS_COLLECTION`,
//   `LISTSYNC_URL_URLS_COLLECTION`: Source registries
// - `LISTSYNC_META_COLLECTION`, `LISTSYNC_SETTINGS_COLLECTION`
//
// ### Fetching
// - `LISTSYNC_LOCAL_HOSTS`: Hosts served from disk. Default `localhost,127.0.0.1`.
//   Add the machine's public address here when sources are registered
//   through it, e.g. `localhost,127.0.0.1,203.0.113.7`
// - `LISTSYNC_LOCAL_PORT`: Port of the local file service. Default `8000`
// - `LISTSYNC_LOCAL_ROOT`: Directory local sources are read from. Default `.`
// - `LISTSYNC_FETCH_TIMEOUT_SECS`: Remote fetch timeout. Default `30`
// - `LISTSYNC_GLOBAL_IPS_ONLY`: Drop non-routable IPs. Default `true`
//
// ### Engine
// - `LISTSYNC_WATCH_INTERVAL_MS`: Registry poll delay. Default `1000`
// - `LISTSYNC_SETTINGS_POLL_SECS`: Settings reconcile interval. Default `10`
// - `LISTSYNC_LOG_LEVEL`: trace, debug, info, warn, error. Default `info`
//
// ## Example
//
// ```bash
// export LISTSYNC_STORE_PATH=/var/lib/listsync
// export LISTSYNC_LOCAL_ROOT=/srv/lists
// listsyncd
// ```

use anyhow::{Context, Result};
use listsync_core::config::{
    CacheConfig, Collections, EngineConfig, ExtractionConfig, FetchConfig, StoreConfig,
    UpdaterConfig,
};
use listsync_core::{BackendRegistry, IntervalScheduler, ListService};
use std::env;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum ListsyncExitCode {
    CleanShutdown = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<ListsyncExitCode> for ExitCode {
    fn from(code: ListsyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
#[derive(Debug)]
struct Config {
    updater: UpdaterConfig,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from any variable source
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let store = match var("LISTSYNC_STORE_TYPE", "file").as_str() {
            "file" => StoreConfig::File {
                path: var("LISTSYNC_STORE_PATH", "./data"),
                database: var("LISTSYNC_DB", "checker"),
            },
            "memory" => StoreConfig::Memory,
            other => anyhow::bail!(
                "LISTSYNC_STORE_TYPE '{}' is not supported. Supported types: file, memory",
                other
            ),
        };

        let cache = match var("LISTSYNC_CACHE_TYPE", "redis").as_str() {
            "redis" => CacheConfig::Redis {
                url: var("LISTSYNC_REDIS_URL", "redis://127.0.0.1:6379/0"),
            },
            "memory" => CacheConfig::Memory,
            other => anyhow::bail!(
                "LISTSYNC_CACHE_TYPE '{}' is not supported. Supported types: redis, memory",
                other
            ),
        };

        let defaults = Collections::default();
        let collections = Collections {
            ip: var("LISTSYNC_IP_COLLECTION", &defaults.ip),
            domain: var("LISTSYNC_DOMAIN_COLLECTION", &defaults.domain),
            url: var("LISTSYNC_URL_COLLECTION", &defaults.url),
            metadata: var("LISTSYNC_META_COLLECTION", &defaults.metadata),
            ip_sources: var("LISTSYNC_IP_URLS_COLLECTION", &defaults.ip_sources),
            domain_sources: var("LISTSYNC_DOMAIN_URLS_COLLECTION", &defaults.domain_sources),
            url_sources: var("LISTSYNC_URL_URLS_COLLECTION", &defaults.url_sources),
            settings: var("LISTSYNC_SETTINGS_COLLECTION", &defaults.settings),
        };

        let fetch_defaults = FetchConfig::default();
        let fetch = FetchConfig {
            local_hosts: var("LISTSYNC_LOCAL_HOSTS", &fetch_defaults.local_hosts.join(","))
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            local_port: parse(&lookup, "LISTSYNC_LOCAL_PORT", fetch_defaults.local_port)?,
            local_root: var("LISTSYNC_LOCAL_ROOT", &fetch_defaults.local_root),
            timeout_secs: parse(
                &lookup,
                "LISTSYNC_FETCH_TIMEOUT_SECS",
                fetch_defaults.timeout_secs,
            )?,
            ..fetch_defaults
        };

        let extraction = ExtractionConfig {
            global_ips_only: parse(
                &lookup,
                "LISTSYNC_GLOBAL_IPS_ONLY",
                ExtractionConfig::default().global_ips_only,
            )?,
        };

        let engine_defaults = EngineConfig::default();
        let engine = EngineConfig {
            watch_interval_ms: parse(
                &lookup,
                "LISTSYNC_WATCH_INTERVAL_MS",
                engine_defaults.watch_interval_ms,
            )?,
            settings_poll_secs: parse(
                &lookup,
                "LISTSYNC_SETTINGS_POLL_SECS",
                engine_defaults.settings_poll_secs,
            )?,
            ..engine_defaults
        };

        Ok(Self {
            updater: UpdaterConfig {
                store,
                cache,
                collections,
                fetch,
                extraction,
                engine,
            },
            log_level: var("LISTSYNC_LOG_LEVEL", "info"),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        self.updater.validate()?;

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "LISTSYNC_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }
}

/// Parse an optional variable, falling back to `default` when unset
fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has invalid value '{}': {}", name, raw, e)),
        None => Ok(default),
    }
}

fn main() -> ExitCode {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ListsyncExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return ListsyncExitCode::ConfigError.into();
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return ListsyncExitCode::ConfigError.into();
    }

    info!("Starting listsyncd daemon");
    info!(
        "Store: {}, cache: {}, transport: {}",
        config.updater.store.type_name(),
        config.updater.cache.type_name(),
        config.updater.fetch.transport
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return ListsyncExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        let service = match build_service(config.updater).await {
            Ok(service) => service,
            Err(e) => {
                error!("Startup error: {:#}", e);
                return ListsyncExitCode::ConfigError;
            }
        };

        if let Err(e) = run_daemon(service).await {
            error!("Daemon error: {:#}", e);
            ListsyncExitCode::RuntimeError
        } else {
            ListsyncExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Build the backends and assemble the service
async fn build_service(config: UpdaterConfig) -> Result<ListService> {
    let registry = BackendRegistry::with_builtins();

    #[cfg(feature = "http")]
    {
        info!("Registering HTTP transport");
        listsync_http::register(&registry);
    }

    #[cfg(feature = "redis")]
    {
        info!("Registering Redis cache");
        listsync_redis::register(&registry);
    }

    let store = registry
        .create_store(&config.store)
        .await
        .context("Failed to open document store")?;
    let cache = registry
        .create_cache(&config.cache)
        .context("Failed to create cache")?;
    let transport = registry
        .create_transport(&config.fetch)
        .context("Failed to create transport")?;
    let scheduler = Arc::new(IntervalScheduler::new());

    Ok(ListService::new(config, store, cache, transport, scheduler)?)
}

/// Run the service until a shutdown signal arrives
async fn run_daemon(service: ListService) -> Result<()> {
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(signal) => info!("Received shutdown signal: {}", signal),
            Err(e) => error!("Shutdown signal error: {}", e),
        }
        let _ = tx.send(());
    });

    service.run_with_shutdown(rx).await?;
    info!("Daemon stopped");
    Ok(())
}

/// Wait for SIGTERM or SIGINT
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let signal = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(signal)
}

/// Wait for CTRL-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
