//! # mysqlctl: provisioning control layer for tenant MySQL databases
//!
//! `mysqlctl` hands out isolated MySQL databases. A caller asks for a *provision* and
//! gets back a fresh database, a user that can reach only that database, and a connection
//! bundle. Underneath, the service keeps a fleet of MySQL servers. Some are registered by
//! address and some are created as workloads in a compute cluster.
//!
//! ## Architecture
//!
//! ```text
//!            HTTP (axum)                    background tasks
//!                │                     ┌──────────┴───────────┐
//!                ↓                     ↓                      ↓
//! ┌───────────────────────────┐  revoke sweeper        readiness poller
//! │ ProvisionOrchestrator     │     ↑ events                  │
//! │   ├ DatabaseLifecycleMgr ─┼─────┘                         │
//! │   └ UserLifecycleMgr      │                               │
//! └────────────┬──────────────┘                               ↓
//!              ↓                                  ServerFleetProvisioner
//!       ServerRegistry ←──────────────────────────────────────┘
//!              │                   │                          │
//!         record store      AdminConnector             ClusterClient
//!      (memory/postgres)    (mysql_async)                 (kube)
//! ```
//!
//! Every side effect has two halves: a record in the store and a physical change on a
//! server or cluster. Managers write the record first and undo it when the physical half
//! fails, so the store never describes something that does not exist.
//!
//! ## Configuration
//!
//! See [`config`]: a YAML file overlaid by `MYSQLCTL_`-prefixed environment variables.

pub mod api;
pub mod cluster;
pub mod config;
pub mod db;
pub mod errors;
pub mod events;
pub mod lifecycle;
pub mod mysql;
pub mod names;
pub mod telemetry;
pub mod types;

#[cfg(test)]
mod test;
#[cfg(test)]
pub mod test_utils;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
};
use bon::Builder;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tokio_util::sync::{CancellationToken, DropGuard};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, debug, info, instrument};

use crate::api::handlers::{databases, healthz, provisions, servers, users};
use crate::db::handlers::{Stores, in_memory::in_memory_stores, postgres_stores};
use crate::events::EventBus;
use crate::lifecycle::{
    DatabaseLifecycleManager, ProvisionOrchestrator, ServerFleetProvisioner, ServerRegistry, UserLifecycleManager, reactor,
};
use crate::mysql::{AdminConnector, MysqlAdminConnector};

pub use config::Config;

/// Shared state handed to every handler.
///
/// ```ignore
/// let state = AppState::builder()
///     .registry(registry)
///     .fleet(fleet)
///     .databases(databases)
///     .users(users)
///     .orchestrator(orchestrator)
///     .config(config)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub registry: ServerRegistry,
    pub fleet: ServerFleetProvisioner,
    pub databases: DatabaseLifecycleManager,
    pub users: UserLifecycleManager,
    pub orchestrator: ProvisionOrchestrator,
    pub config: Config,
}

/// Get the mysqlctl record store migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Open the configured record store, running migrations for PostgreSQL
async fn setup_stores(config: &Config) -> anyhow::Result<(Stores, Option<PgPool>)> {
    match &config.store {
        config::StoreConfig::Memory => {
            info!("Using in-memory record store; records are lost on restart");
            Ok((in_memory_stores(), None))
        }
        config::StoreConfig::Postgres { url, pool } => {
            info!("Using PostgreSQL record store");
            let pg = PgPoolOptions::new()
                .max_connections(pool.max_connections)
                .min_connections(pool.min_connections)
                .acquire_timeout(Duration::from_secs(pool.acquire_timeout_secs))
                .connect(url)
                .await?;
            migrator().run(&pg).await?;
            Ok((postgres_stores(pg.clone()), Some(pg)))
        }
    }
}

#[instrument(skip_all)]
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/provisions", post(provisions::create_provision))
        .route(
            "/provisions/{id}",
            get(provisions::get_provision).delete(provisions::delete_provision),
        )
        .route("/provisions/{id}/pack", get(provisions::pack_provision))
        .route("/servers", get(servers::list_servers).post(servers::create_server))
        .route("/servers/register", post(servers::register_server))
        .route("/servers/{id}", get(servers::get_server).delete(servers::delete_server))
        .route("/servers/{id}/users", get(servers::server_users))
        .route("/servers/{id}/databases", get(servers::server_databases))
        .route("/servers/{id}/status", get(servers::server_status))
        .route("/databases", post(databases::create_database))
        .route(
            "/databases/{id}",
            get(databases::get_database)
                .patch(databases::update_database)
                .delete(databases::delete_database),
        )
        .route("/databases/{id}/stats", get(databases::database_stats))
        .route("/databases/{id}/tables", get(databases::database_tables))
        .route("/databases/{id}/connections", get(databases::database_connections))
        .route("/users", post(users::create_user))
        .route("/users/{id}", get(users::get_user).delete(users::delete_user))
        .route(
            "/users/{id}/grants/{database_id}",
            post(users::grant_database).delete(users::revoke_database),
        );

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/api/v1", api_routes)
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

/// Background tasks running alongside the HTTP server.
///
/// Dropping this cancels the shutdown token through `drop_guard`, which stops every task.
/// [`shutdown`](BackgroundServices::shutdown) also waits for them to finish.
pub struct BackgroundServices {
    background_tasks: Vec<tokio::task::JoinHandle<()>>,
    shutdown_token: CancellationToken,
    // Pub so that we can disarm it if we want to
    pub drop_guard: Option<DropGuard>,
}

impl BackgroundServices {
    /// Gracefully shutdown all background tasks
    pub async fn shutdown(self) {
        self.shutdown_token.cancel();
        for handle in self.background_tasks {
            let _ = handle.await;
        }
    }
}

fn setup_background_services(
    config: &Config,
    events: &EventBus,
    users: UserLifecycleManager,
    fleet: ServerFleetProvisioner,
    shutdown_token: CancellationToken,
) -> BackgroundServices {
    let drop_guard = shutdown_token.clone().drop_guard();
    let mut background_tasks = Vec::new();

    if config.background.revoke_sweeper.enabled {
        // Subscribe here so removals published before the task first polls are not missed
        let rx = events.subscribe();
        let handle = tokio::spawn(reactor::run_revoke_sweeper(users, rx, shutdown_token.clone()));
        background_tasks.push(handle);
    } else {
        info!("Revoke sweeper disabled; removed databases keep their grants in user records");
    }

    if config.background.readiness_poller.enabled && !config.clusters.is_empty() {
        let interval = config.background.readiness_poller.interval;
        let handle = tokio::spawn(reactor::run_readiness_poller(fleet, interval, shutdown_token.clone()));
        background_tasks.push(handle);
    } else {
        debug!("Readiness poller not started");
    }

    BackgroundServices {
        background_tasks,
        shutdown_token,
        drop_guard: Some(drop_guard),
    }
}

/// Owns the router, the record store pool and the background services.
///
/// 1. **Create**: [`Application::new`] opens the store, connects to clusters, wires the
///    managers and starts background tasks
/// 2. **Serve**: [`Application::serve`] handles requests until the shutdown future resolves
/// 3. **Shutdown**: background tasks are stopped, then the pool and telemetry
pub struct Application {
    router: Router,
    config: Config,
    pool: Option<PgPool>,
    bg_services: BackgroundServices,
}

impl Application {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting mysqlctl with configuration: {:#?}", config);

        let (stores, pool) = setup_stores(&config).await?;
        let clusters = cluster::kubernetes::connect_clusters(&config.clusters).await?;
        let events = EventBus::new();
        let connector: Arc<dyn AdminConnector> = Arc::new(MysqlAdminConnector::new());

        let registry = ServerRegistry::new(stores.servers.clone());
        let fleet = ServerFleetProvisioner::new(
            registry.clone(),
            &stores,
            connector.clone(),
            clusters,
            config.server_template.clone(),
            config.provisioning.clone(),
        );
        let databases =
            DatabaseLifecycleManager::new(registry.clone(), stores.databases.clone(), connector.clone(), events.clone());
        let users = UserLifecycleManager::new(
            registry.clone(),
            stores.databases.clone(),
            stores.users.clone(),
            connector,
            events.clone(),
        );
        let orchestrator = ProvisionOrchestrator::new(
            registry.clone(),
            databases.clone(),
            users.clone(),
            stores.provisions.clone(),
            config.provisioning.clone(),
        );

        let shutdown_token = CancellationToken::new();
        let bg_services = setup_background_services(&config, &events, users.clone(), fleet.clone(), shutdown_token);

        let app_state = AppState::builder()
            .registry(registry)
            .fleet(fleet)
            .databases(databases)
            .users(users)
            .orchestrator(orchestrator)
            .config(config.clone())
            .build();

        Ok(Self {
            router: build_router(app_state),
            config,
            pool,
            bg_services,
        })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "mysqlctl listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        self.bg_services.shutdown().await;

        if let Some(pool) = self.pool {
            info!("Closing database connections...");
            pool.close().await;
        }

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
