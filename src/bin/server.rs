use std::path::PathBuf;
use std::process::exit;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;

use linecache::config::Config;
use linecache::server;

#[tokio::main]
pub async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(cli.log_filter.clone()))
        .init();

    let database_file = resolve_database_file(&cli.database_file);

    let config = Config {
        database_file,
        listen_addr: cli.listen_addr,
        port: cli.port,
        idle_timeout_secs: cli.idle_timeout_secs,
        log_filter: cli.log_filter,
    };

    let db = match linecache::db::Db::open(&config.database_file).await {
        Ok(db) => db,
        Err(err) => {
            tracing::error!(%err, path = %config.database_file.display(), "failed to open store");
            exit(1);
        }
    };

    let listener = match TcpListener::bind(config.listen_address()).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(%err, addr = %config.listen_address(), "failed to bind listener");
            exit(1);
        }
    };

    let idle_timeout = Duration::from_secs(config.idle_timeout_secs);
    server::run_with_idle_timeout(listener, db, idle_timeout, signal::ctrl_c()).await;
}

/// Resolves `path` relative to the running executable's directory when it
/// is itself relative.
fn resolve_database_file(path: &std::path::Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }

    match std::env::current_exe().ok().and_then(|p| p.parent().map(|p| p.to_path_buf())) {
        Some(dir) => dir.join(path),
        None => path.to_path_buf(),
    }
}

#[derive(Parser, Debug)]
#[clap(name = "linecache-server", version, author, about = "A persistent memcached-protocol cache")]
struct Cli {
    /// Path to the SQLite-backed persistent store, resolved relative to the
    /// executable's directory if relative.
    database_file: PathBuf,

    #[clap(long = "listen", default_value = "127.0.0.1")]
    listen_addr: String,

    #[clap(long = "port", default_value_t = 11211)]
    port: u16,

    #[clap(long = "idle-timeout", default_value_t = 60)]
    idle_timeout_secs: u64,

    #[clap(long = "log", default_value = "info")]
    log_filter: String,
}
