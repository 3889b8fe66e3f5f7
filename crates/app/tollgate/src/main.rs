//! Tollgate binary: auth service, gateway, and migrations.

pub use self::error::{Error, Result};
mod error;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use clap::Parser;
use cli::{AuthArgs, Cli, Commands, GatewayArgs, MigrateArgs, Verifier};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tollgate_api::AppState;
use tollgate_api::config::ApiConfig;
use tollgate_core::auth::settings::AuthSettings;
use tollgate_core::email::LogEmailSender;
use tollgate_gateway::GatewayState;
use tollgate_gateway::config::{GatewayConfig, VerifierMode};
use tracing::{error, info};
use url::Url;

mod cli;
mod logging;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Cli::parse();
    logging::init()?;

    match args.command {
        Commands::Auth(args) => run_auth(args).await,
        Commands::Gateway(args) => run_gateway(args).await,
        Commands::Migrate(args) => run_migrate(args).await,
        Commands::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(StdDuration::from_secs(30))
        .connect(database_url)
        .await?;
    Ok(pool)
}

fn auth_settings(args: &AuthArgs) -> Result<AuthSettings> {
    let settings = AuthSettings::new(args.jwt_signed_key.clone(), args.password_salt.clone())
        .with_access_ttl(Duration::seconds(args.access_ttl_secs))
        .with_refresh_ttl(Duration::seconds(args.refresh_ttl_secs))
        .with_confirm_ttl(Duration::seconds(args.email_token_ttl_secs))
        .with_reset_ttl(Duration::seconds(args.email_token_ttl_secs))
        .with_token_bytes(args.token_bytes)
        .with_links(args.confirm_link_base.clone(), args.reset_link_base.clone());
    settings.validate()?;
    Ok(settings)
}

async fn run_auth(args: AuthArgs) -> Result<()> {
    let settings = auth_settings(&args)?;
    let config = ApiConfig {
        bind_addr: args.bind.clone(),
        database_url: if args.in_memory {
            None
        } else {
            args.database_url.clone()
        },
        auth: settings,
    };
    let mailer = Arc::new(LogEmailSender);

    let state = match &config.database_url {
        Some(url) => {
            let pool = connect(url, args.max_connections).await?;
            info!("running database migrations");
            tollgate_api::migrate(&pool).await?;
            AppState::with_pool(config.clone(), pool, mailer)?
        }
        None if args.in_memory => {
            info!("using in-memory credential store");
            AppState::in_memory(config.clone(), mailer)?
        }
        None => {
            return Err(Error::Custom(
                "set DATABASE_URL (or --database-url), or pass --in-memory".into(),
            ));
        }
    };

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "auth service listening");
    axum::serve(listener, tollgate_api::router(state)).await?;
    Ok(())
}

async fn run_gateway(args: GatewayArgs) -> Result<()> {
    let verifier = match args.verifier {
        Verifier::Remote => VerifierMode::Remote,
        Verifier::Local => {
            let jwt_secret = args
                .jwt_signed_key
                .filter(|k| !k.is_empty())
                .ok_or_else(|| {
                    Error::Custom("--verifier local requires JWT_SIGNED_KEY".into())
                })?;
            VerifierMode::Local { jwt_secret }
        }
    };

    let mut config = GatewayConfig::new(
        Url::parse(&args.auth_service_url)?,
        Url::parse(&args.data_service_url)?,
        verifier,
    );
    config.bind_addr = args.bind;
    config.upstream_timeout = StdDuration::from_secs(args.upstream_timeout_secs);
    config.max_body_bytes = args.max_body_bytes;

    let bind_addr = config.bind_addr.clone();
    info!(
        auth = %config.auth_service_url,
        data = %config.data_service_url,
        verifier = ?config.verifier,
        "configuring gateway"
    );
    let state = GatewayState::new(config)?;

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %listener.local_addr()?, "gateway listening");
    axum::serve(listener, tollgate_gateway::router(state)).await?;
    Ok(())
}

async fn run_migrate(args: MigrateArgs) -> Result<()> {
    let pool = connect(&args.database_url, 1).await?;
    tollgate_api::migrate(&pool).await?;
    info!("migrations applied");
    Ok(())
}
