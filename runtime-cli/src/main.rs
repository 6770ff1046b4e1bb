//! `optimaizer-runtime`: the binary that hosts the Agent Runtime Manager
//! (spec.md §4.1) and the Streaming Dispatcher (spec.md §4.4) in one
//! process. `serve` auto-starts every `alwaysOn` agent found across the
//! store's known users and then serves the streaming HTTP surface until
//! signaled to stop; `import`/`list` manage `AgentConfig` rows in the store
//! without needing a running server.

mod wiring;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use optimaizer_core::runtime::AgentRuntimeManager;
use optimaizer_core::store::{agent_workspace_namespace, Store};
use optimaizer_core::{AgentConfig, SqliteStore};
use optimaizer_streaming::StreamDispatcher;
use tracing::{error, info, warn};

const APP_NAME: &str = "optimaizer";

#[derive(Parser)]
#[command(name = "optimaizer-runtime", about = "Agent Runtime Manager and Streaming Dispatcher host")]
struct Cli {
    /// SQLite database path; defaults to `$XDG_DATA_HOME/optimaizer/store.sqlite3`.
    #[arg(long, env = "OPTIMAIZER_DB_PATH")]
    db_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Auto-starts every alwaysOn agent across `--user-id` and serves the
    /// streaming dispatcher until interrupted.
    Serve {
        /// User ids to scan for alwaysOn agents; may be repeated.
        #[arg(long = "user-id", required = true)]
        user_ids: Vec<String>,
        /// Overrides the bound port; falls back to `PORT`, then 8090.
        #[arg(long, env = "PORT")]
        port: Option<u16>,
    },
    /// Imports an `AgentConfig` JSON file into the store's agent workspace.
    Import { path: PathBuf },
    /// Lists the AgentConfig ids stored for a user.
    List {
        #[arg(long = "user-id")]
        user_id: String,
    },
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_NAME)
        .join("store.sqlite3")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env_override_dir = std::env::var("OPTIMAIZER_ENV_PATH").ok().map(PathBuf::from);
    config::load_and_apply(APP_NAME, env_override_dir.as_deref()).ok();
    let _log_guard = config::init_file_logging(
        dirs::data_dir().unwrap_or_else(std::env::temp_dir).join(APP_NAME).join("logs"),
        "optimaizer-runtime",
    )
    .ok();

    let db_path = cli.db_path.unwrap_or_else(default_db_path);
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store: Arc<dyn Store> = Arc::new(SqliteStore::new(&db_path)?);

    match cli.command {
        Command::Serve { user_ids, port } => {
            let addr = format!("127.0.0.1:{}", port.unwrap_or(8090));
            serve(store, user_ids, addr).await
        }
        Command::Import { path } => import(store, path).await,
        Command::List { user_id } => list(store.as_ref(), user_id).await,
    }
}

async fn serve(store: Arc<dyn Store>, user_ids: Vec<String>, addr: String) -> anyhow::Result<()> {
    let manager = Arc::new(AgentRuntimeManager::new());

    let outcome = manager
        .auto_start_always_on(store.as_ref(), &user_ids, |config| {
            wiring::build_wiring(config, store.clone())
        })
        .await;
    for agent_id in &outcome.deployed {
        info!(agent_id, "deployed");
    }
    for (agent_id, reason) in &outcome.failed {
        warn!(agent_id, reason, "failed to deploy");
    }

    let dispatcher = Arc::new(StreamDispatcher::new());
    dispatcher.register_provider(
        "mock",
        Arc::new(optimaizer_core::MockLlm::fixed(
            "this deployment has no real model provider configured",
        )),
    );

    let manager_for_shutdown = manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for shutdown signal");
            return;
        }
        info!("shutdown signal received, stopping every deployed agent");
        manager_for_shutdown.stop_all().await;
        std::process::exit(0);
    });

    optimaizer_streaming::run_server(dispatcher, Some(&addr)).await?;
    Ok(())
}

async fn import(store: Arc<dyn Store>, path: PathBuf) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&path)?;
    let config: AgentConfig = serde_json::from_str(&raw)?;
    let namespace = agent_workspace_namespace(&config.owner_user_id);
    store
        .put(&namespace, &config.id, &serde_json::to_value(&config)?)
        .await
        .map_err(|e| anyhow::anyhow!("store put failed: {e}"))?;
    println!("imported agent {} for user {}", config.id, config.owner_user_id);
    Ok(())
}

async fn list(store: &dyn Store, user_id: String) -> anyhow::Result<()> {
    let namespace = agent_workspace_namespace(&user_id);
    let keys = store
        .list(&namespace)
        .await
        .map_err(|e| anyhow::anyhow!("store list failed: {e}"))?;
    for key in keys {
        println!("{key}");
    }
    Ok(())
}
