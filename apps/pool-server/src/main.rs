mod registered_modules;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use federation::{FederationConfig, FederationModule};
use nodes_registry::api::rest::middleware::RequestFilters;
use nodes_registry::api::rest::routes::router;
use nodes_registry::{NodesRegistryConfig, RegistryModule};
use poolkit::plugins::PoolMetadata;
use poolkit::{
    BuildInfo, EventDispatcher, ModuleManager, PLUGIN_MANAGER_SERVICE, PluginCatalog,
    PluginManager, ServiceContainer, UnitCtx, module_config_or_default, module_enabled,
};
use poolkit_bootstrap::{AppConfig, cancel_on_shutdown, init_logging};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const BUILD_INFO: BuildInfo = BuildInfo::from_env(
    "pool-server",
    env!("CARGO_PKG_VERSION"),
    option_env!("POOL_GIT_COMMIT"),
    option_env!("POOL_BUILD_DATE"),
    option_env!("POOL_BUILD_TARGET"),
);

/// Node pool server: admits compute nodes, tracks their health and federates with peer pools
#[derive(Parser)]
#[command(name = "pool-server")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print effective configuration (YAML) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Run,
    /// Validate configuration and exit
    Check,
    /// Print build information and exit
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_verbosity(cli.verbose);

    if cli.print_config {
        println!("Effective configuration:\n{}", config.to_yaml()?);
        return Ok(());
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Version => {
            println!("{BUILD_INFO}");
            Ok(())
        }
        Commands::Check => check_config(&config),
        Commands::Run => {
            init_logging(&config.logging)?;
            tracing::info!(build = %BUILD_INFO, "Pool server starting");
            run_server(&config).await
        }
    }
}

fn check_config(config: &AppConfig) -> Result<()> {
    let catalog = PluginCatalog::from_inventory();
    for plugin in &config.plugins {
        if catalog.get(plugin.kind()).is_none() {
            anyhow::bail!(
                "plugin '{}' has unknown kind '{}' (known kinds: {})",
                plugin.name,
                plugin.kind(),
                catalog.kinds().join(", ")
            );
        }
    }
    registry_config(config)?;
    federation_config(config)?;

    println!("Configuration is valid");
    println!("{}", config.to_yaml()?);
    Ok(())
}

fn registry_config(config: &AppConfig) -> Result<Option<NodesRegistryConfig>> {
    if !module_enabled(config, nodes_registry::MODULE_NAME) {
        return Ok(None);
    }
    let registry: NodesRegistryConfig =
        module_config_or_default(config, nodes_registry::MODULE_NAME)?;
    Ok(Some(registry))
}

/// Federation only runs when its section is present and not disabled.
fn federation_config(config: &AppConfig) -> Result<Option<FederationConfig>> {
    if !config.has_module(federation::MODULE_NAME)
        || !module_enabled(config, federation::MODULE_NAME)
    {
        return Ok(None);
    }
    let federation: FederationConfig = module_config_or_default(config, federation::MODULE_NAME)?;
    Ok(Some(federation))
}

async fn load_plugins(config: &AppConfig) -> Result<PluginManager> {
    let catalog = PluginCatalog::from_inventory();
    let plugins = PluginManager::new();

    let report = plugins.load_from_configs(&catalog, &config.plugins).await;
    tracing::info!(loaded = ?report.loaded, skipped = report.skipped.len(), "Configured plugins loaded");

    if let Some(dir) = &config.plugin_dir {
        let report = plugins
            .load_from_dir(&catalog, dir)
            .await
            .with_context(|| format!("failed to load plugin manifests from {}", dir.display()))?;
        tracing::info!(dir = %dir.display(), loaded = ?report.loaded, skipped = report.skipped.len(), "Plugin manifests loaded");
    }
    Ok(plugins)
}

/// Register the enabled modules. Returns the registry module when it is enabled.
fn register_modules(
    modules: &ModuleManager,
    config: &AppConfig,
) -> Result<Option<Arc<RegistryModule>>> {
    let registry = registry_config(config)?;
    let max_nodes = registry.as_ref().map_or(0, |r| r.max_nodes);

    let registry = registry.map(|r| Arc::new(RegistryModule::new(r)));
    if let Some(module) = &registry {
        modules.register(module.clone())?;
    }

    if let Some(federation) = federation_config(config)? {
        let pool = PoolMetadata {
            address: config.server.address.clone(),
            location: config.server.location.clone(),
            max_nodes,
            ..PoolMetadata::default()
        };
        let module = FederationModule::new(federation, pool);
        let module = if registry.is_some() {
            module.after(nodes_registry::MODULE_NAME)
        } else {
            module
        };
        modules.register(Arc::new(module))?;
    }

    tracing::info!(modules = ?modules.start_order(), "Modules registered");
    Ok(registry)
}

async fn run_server(config: &AppConfig) -> Result<()> {
    let cancel = CancellationToken::new();
    let signals = cancel_on_shutdown(cancel.clone());

    let plugins = Arc::new(load_plugins(config).await?);
    let container = Arc::new(ServiceContainer::new());
    container.register(PLUGIN_MANAGER_SERVICE, plugins.clone())?;
    let ctx = UnitCtx::new(container, Arc::new(EventDispatcher::new()), cancel.child_token());

    let modules = ModuleManager::new(ctx);
    let registry = register_modules(&modules, config)?;

    let served = match modules.start_all().await {
        Ok(()) => serve(config, registry.as_deref(), &plugins, &cancel).await,
        Err(e) => Err(e.into()),
    };

    cancel.cancel();
    if let Err(e) = signals.await {
        tracing::warn!(error = %e, "Signal watcher ended abnormally");
    }

    let stopped = modules.stop_all().await;
    if let Err(e) = plugins.shutdown_all().await {
        tracing::warn!(error = %e, "Plugin shutdown reported an error");
    }

    served?;
    stopped?;
    tracing::info!("Pool server stopped");
    Ok(())
}

async fn serve(
    config: &AppConfig,
    registry: Option<&RegistryModule>,
    plugins: &PluginManager,
    cancel: &CancellationToken,
) -> Result<()> {
    let Some(service) = registry.and_then(RegistryModule::service) else {
        tracing::info!("Nodes registry disabled, no API is served");
        cancel.cancelled().await;
        return Ok(());
    };

    let listener = tokio::net::TcpListener::bind(&config.server.address)
        .await
        .with_context(|| format!("failed to bind {}", config.server.address))?;
    tracing::info!(address = %listener.local_addr()?, "Registry API listening");

    let app = router(service, RequestFilters::from_plugins(plugins));
    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("registry API server failed")
}
