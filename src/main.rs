//!
//! src/main.rs
//!
//! Entry point. `serve` (the default) runs the http service until Ctrl-C,
//! `seed-user` creates a login account.
//!

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use track_resolver::{
    auth::{seed_user, SeedOutcome},
    config,
    errors::CatalogError,
    fetch::AcrCloudClient,
    logging,
    persistent::SqliteCatalog,
    server::{create_router, AppState},
};

#[derive(Parser, Debug)]
#[command(name = "track-resolver", version, about = "Track catalog service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the http service
    Serve,
    /// Create a user that can log in
    SeedUser {
        #[arg(long, env = "TEST_USER_EMAIL")]
        email: String,
        #[arg(long, env = "TEST_USER_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

async fn serve() -> Result<(), CatalogError> {
    let cfgs = config::load_config()?;
    let _guard = logging::init_logging(&cfgs.logging)?;

    info!(
        service = env!("CARGO_PKG_NAME"),
        version = %env!("CARGO_PKG_VERSION"),
        bind = %cfgs.server.bind_addr,
        "server.start"
    );

    let store = Arc::new(SqliteCatalog::init(&cfgs.persistence.db_url).await?);
    let provider = Arc::new(AcrCloudClient::new(&cfgs.http, &cfgs.provider)?);
    let state = AppState::build(store.clone(), provider, &cfgs.auth);
    let router = create_router(state);

    let shutdown = CancellationToken::new();
    let trigger = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!(msg = "shutting server down", "server.signal");
                shutdown.cancel();
            }
        })
    };

    let signal = shutdown.clone();
    let served = axum::Server::try_bind(&cfgs.server.bind_addr)
        .map_err(|e| CatalogError::Config(format!("bind {}: {e}", cfgs.server.bind_addr)))?
        .serve(router.into_make_service())
        .with_graceful_shutdown(async move { signal.cancelled().await })
        .await
        .map_err(|e| CatalogError::Internal(format!("server: {e}")));

    // server may have exited on its own
    shutdown.cancel();
    trigger.abort();
    store.close().await;
    info!("server.exit");
    served
}

async fn seed(email: &str, password: &str) -> Result<(), CatalogError> {
    let persistence = config::load_persistence();
    let store = SqliteCatalog::init(&persistence.db_url).await?;

    let outcome = seed_user(&store, email, password).await;
    store.close().await;

    match outcome? {
        SeedOutcome::Created(id) => println!("created user {id}"),
        SeedOutcome::AlreadyExists => println!("user already exists"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), CatalogError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve().await,
        Command::SeedUser { email, password } => seed(&email, &password).await,
    }
}
