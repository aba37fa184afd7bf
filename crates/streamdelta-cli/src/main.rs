mod api;
mod check;
mod collect;
mod middleware;
mod playlists;
mod report;
mod scheduler;
mod services;
#[cfg(test)]
mod test_support;

use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use futures::FutureExt;
use streamdelta_core::TenantId;
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, AppState},
    check::CheckRunner,
    middleware::AuthState,
    playlists::PlaylistCommands,
    scheduler::{CheckCallback, TenantScheduler},
    services::Services,
};

#[derive(Debug, Parser)]
#[command(name = "streamdelta")]
#[command(about = "Daily playlist stream tracking and reports")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Collect every tracked playlist and store today's snapshot
    Collect {
        #[arg(long, allow_hyphen_values = true)]
        tenant: TenantId,
    },
    /// Collect in a child process, then deliver today's report
    Check {
        #[arg(long, allow_hyphen_values = true)]
        tenant: TenantId,
    },
    /// Deliver the report for stored snapshots without collecting
    Report {
        #[arg(long, allow_hyphen_values = true)]
        tenant: TenantId,
        /// Report date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Manage tracked playlists
    Playlists {
        #[command(subcommand)]
        command: PlaylistCommands,
    },
    /// Run the scheduler and the admin HTTP API
    Serve {
        /// Restore every stored tenant's trigger at startup instead of on
        /// first contact
        #[arg(long)]
        hydrate_all: bool,
    },
}

impl Commands {
    /// The tenant a command acts for; `serve` acts for none.
    fn tenant(&self) -> Option<&TenantId> {
        match self {
            Commands::Collect { tenant }
            | Commands::Check { tenant }
            | Commands::Report { tenant, .. } => Some(tenant),
            Commands::Playlists { command } => Some(command.tenant()),
            Commands::Serve { .. } => None,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match streamdelta_core::load_app_config_from_env() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            if let Some(tenant) = cli.command.tenant() {
                if let Some(channel) = services::fallback_channel(|key| std::env::var(key).ok()) {
                    services::notify_config_failure(&channel, tenant, &e).await;
                }
            }
            return Err(e.into());
        }
    };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let services = Services::from_config(Arc::clone(&config))?;

    match cli.command {
        Commands::Collect { tenant } => collect::run_collect(&services, &tenant).await,
        Commands::Check { tenant } => {
            let outcome = CheckRunner::from_services(&services)?.run(&tenant).await?;
            tracing::info!(tenant = %tenant, outcome = ?outcome, "check: finished");
            Ok(())
        }
        Commands::Report { tenant, date } => report::run_report(&services, &tenant, date).await,
        Commands::Playlists { command } => playlists::run_playlists(&services, command).await,
        Commands::Serve { hydrate_all } => serve(services, hydrate_all).await,
    }
}

async fn serve(services: Services, hydrate_all: bool) -> anyhow::Result<()> {
    let config = Arc::clone(&services.config);
    let auth = AuthState::from_keys(&config.api_keys, config.is_development())?;
    let checks = Arc::new(CheckRunner::from_services(&services)?);

    let runner = Arc::clone(&checks);
    let on_fire: CheckCallback = Arc::new(move |tenant: TenantId| {
        let runner = Arc::clone(&runner);
        async move {
            if let Err(e) = runner.run(&tenant).await {
                let error = format!("{e:#}");
                tracing::error!(tenant = %tenant, error = %error, "scheduler: scheduled check failed");
            }
        }
        .boxed()
    });

    let scheduler = Arc::new(
        TenantScheduler::start(Arc::clone(&services.store), on_fire)
            .await
            .context("failed to start scheduler")?,
    );
    if let Err(e) = scheduler.hydrate_global().await {
        tracing::error!(error = %e, "scheduler: failed to restore global trigger");
    }
    if hydrate_all {
        hydrate_every_tenant(&services, &scheduler).await;
    }

    let app = build_app(
        AppState {
            scheduler: Arc::clone(&scheduler),
            store: Arc::clone(&services.store),
            checks,
        },
        auth,
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, env = %config.env, "server: listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown().await?;
    Ok(())
}

async fn hydrate_every_tenant(services: &Services, scheduler: &TenantScheduler) {
    let tenants = match streamdelta_store::list_tenants(services.store.as_ref()).await {
        Ok(tenants) => tenants,
        Err(e) => {
            tracing::error!(error = %e, "scheduler: failed to list tenants for hydration");
            return;
        }
    };
    for tenant in &tenants {
        if let Err(e) = scheduler.hydrate_tenant(tenant).await {
            tracing::warn!(tenant = %tenant, error = %e, "scheduler: tenant hydration failed");
        }
    }
    tracing::info!(tenants = tenants.len(), "scheduler: eager hydration complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
