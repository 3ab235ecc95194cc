use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use photohost::{
    Config, create_router,
    gallery::GalleryService,
    legacy::LegacyImporter,
    startup_checks,
    storage::{self, DynObjectStore},
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Global options that apply to all commands
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: PathBuf,

    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the web server (default if no command specified)
    Serve {
        #[arg(short, long)]
        port: Option<u16>,

        #[arg(long)]
        host: Option<String>,

        /// Automatically quit after specified number of seconds (useful for testing)
        #[arg(long)]
        quit_after: Option<u64>,
    },

    /// Import a gallery directory that uses the `<ms>-<hash>[-flags].<ext>` layout
    ImportLegacy {
        /// Root of the legacy gallery; first-level subdirectories become folders
        #[arg(short, long)]
        source: PathBuf,

        /// Import only this photo identifier (flags in the on-disk name are ignored)
        #[arg(long)]
        photo: Option<String>,

        /// Legacy directory holding `--photo`; the gallery root when omitted
        #[arg(long, requires = "photo")]
        folder: Option<String>,
    },

    /// Report objects left behind by interrupted writes
    Audit {
        /// Delete what the audit finds
        #[arg(long)]
        fix: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Set up logging first
    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config(&cli.config)?;

    match cli.command {
        Some(Commands::Serve {
            port,
            host,
            quit_after,
        }) => run_server(config, port, host, quit_after).await,
        Some(Commands::ImportLegacy {
            source,
            photo,
            folder,
        }) => import_legacy(config, source, photo, folder.unwrap_or_default()).await,
        Some(Commands::Audit { fix }) => audit(config, fix).await,
        None => run_server(config, None, None, None).await,
    }
}

fn load_config(config_path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
    if config_path.exists() {
        let config_content = std::fs::read_to_string(config_path)?;
        let config = toml_edit::de::from_str::<Config>(&config_content)?;
        info!("Configuration loaded from: {:?}", config_path);
        Ok(config)
    } else {
        info!("Config file not found at {:?}, using defaults", config_path);
        Ok(Config::default())
    }
}

async fn check_and_open_store(config: &Config) -> Result<DynObjectStore, Box<dyn std::error::Error>> {
    match startup_checks::perform_startup_checks(config).await {
        Ok(()) => info!("All startup checks passed"),
        Err(errors) => {
            for error in &errors {
                tracing::error!("Startup check failed: {}", error);
            }
            if errors.iter().any(|e| e.is_critical()) {
                tracing::error!("Critical startup check failed, exiting");
                return Err("Critical startup check failed".into());
            } else {
                tracing::warn!("Non-critical startup checks failed, continuing");
            }
        }
    }

    let store = storage::create_store(&config.storage).await?;
    info!("Using {} storage backend", store.name());
    Ok(store)
}

async fn run_server(
    config: Config,
    port: Option<u16>,
    host: Option<String>,
    quit_after: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let host = host.unwrap_or(config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    info!("Starting {} server", config.app.name);

    let store = check_and_open_store(&config).await?;
    let gallery = Arc::new(GalleryService::new(store, config.gallery.clone()));
    let app = create_router(gallery, config);

    let addr = SocketAddr::from((host.parse::<std::net::IpAddr>()?, port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Set up graceful shutdown
    let server = axum::serve(listener, app);
    let graceful = server.with_graceful_shutdown(shutdown_signal(quit_after));

    if let Err(e) = graceful.await {
        tracing::error!("Server error: {}", e);
    }

    info!("Server stopped");
    Ok(())
}

async fn import_legacy(
    config: Config,
    source: PathBuf,
    photo: Option<String>,
    folder: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = check_and_open_store(&config).await?;
    let gallery = GalleryService::new(store, config.gallery.clone());
    let importer = LegacyImporter::new(&gallery, source.clone());

    let report = match photo {
        Some(identifier) => {
            info!("Importing {} from {:?}", identifier, source.join(&folder));
            importer.import_one(&folder, &identifier).await?
        }
        None => {
            info!("Importing legacy gallery from {:?}", source);
            importer.run().await?
        }
    };

    println!("Imported: {}", report.imported);
    println!("Skipped (unrecognized names): {}", report.skipped.len());
    for skipped in &report.skipped {
        println!("  {}", skipped);
    }
    println!("Failed: {}", report.failed.len());
    for (path, reason) in &report.failed {
        println!("  {}: {}", path, reason);
    }

    Ok(())
}

async fn audit(config: Config, fix: bool) -> Result<(), Box<dyn std::error::Error>> {
    let store = check_and_open_store(&config).await?;
    let gallery = GalleryService::new(store, config.gallery.clone());

    let report = gallery.audit().await?;
    if report.is_clean() {
        println!("No orphaned objects found");
        return Ok(());
    }

    println!("Orphaned content ({}):", report.orphaned_content.len());
    for key in &report.orphaned_content {
        println!("  {}", key);
    }
    println!("Records without content ({}):", report.dangling_metadata.len());
    for key in &report.dangling_metadata {
        println!("  {}", key);
    }
    println!(
        "Unreferenced thumbnail sets ({}):",
        report.unreferenced_thumbnails.len()
    );
    for prefix in &report.unreferenced_thumbnails {
        println!("  {}", prefix);
    }

    if fix {
        let removed = gallery.sweep(&report).await?;
        println!("Removed {} object(s)", removed);
    } else {
        println!("Run with --fix to delete them");
    }

    Ok(())
}

async fn shutdown_signal(quit_after: Option<u64>) {
    use tokio::signal;
    use tokio::time::{Duration, sleep};

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let quit_timer = async {
        if let Some(seconds) = quit_after {
            info!(
                "Server will automatically shut down after {} seconds",
                seconds
            );
            sleep(Duration::from_secs(seconds)).await;
            info!("Quit timer expired, shutting down");
        } else {
            std::future::pending::<()>().await
        }
    };

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        },
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        },
        _ = quit_timer => {},
    }
}
