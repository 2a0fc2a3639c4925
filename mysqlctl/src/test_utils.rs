//! Test utilities: recording fakes for the physical side and a fully wired harness.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum_test::TestServer;
use parking_lot::Mutex;

use crate::cluster::{Cluster, ClusterClient, Clusters, WorkloadKind, WorkloadObject, WorkloadStatus};
use crate::config::Config;
use crate::db::handlers::Stores;
use crate::db::handlers::in_memory::in_memory_stores;
use crate::db::models::{databases::DatabaseDBResponse, servers::ServerCreateDBRequest, servers::ServerDBResponse, users::UserDBResponse};
use crate::events::EventBus;
use crate::lifecycle::{
    CreateDatabase, CreateUser, DatabaseLifecycleManager, ProvisionOrchestrator, RegisterServer, ServerFleetProvisioner,
    ServerRegistry, UserLifecycleManager,
};
use crate::mysql::{AdminConnector, AdminCredentials, QueryRow};
use crate::types::DatabaseId;
use crate::{AppState, build_router};

pub const TEST_CLUSTER: &str = "cloud1";
pub const TEST_DOMAIN: &str = "cluster.test";

/// Records every statement and query; fails those containing a configured substring.
#[derive(Default)]
pub struct RecordingConnector {
    statements: Mutex<Vec<String>>,
    queries: Mutex<Vec<String>>,
    failures: Mutex<Vec<String>>,
    responses: Mutex<Vec<(String, Vec<QueryRow>)>>,
}

impl RecordingConnector {
    /// Executed statements in order, failed attempts included
    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().clone()
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }

    pub fn fail_on(&self, fragment: &str) {
        self.failures.lock().push(fragment.to_string());
    }

    pub fn respond_with(&self, fragment: &str, rows: Vec<QueryRow>) {
        self.responses.lock().push((fragment.to_string(), rows));
    }

    fn check(&self, sql: &str) -> anyhow::Result<()> {
        match self.failures.lock().iter().find(|f| sql.contains(f.as_str())) {
            Some(fragment) => anyhow::bail!("injected failure on {fragment}"),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AdminConnector for RecordingConnector {
    async fn execute(&self, _credentials: &AdminCredentials, sql: &str) -> anyhow::Result<()> {
        self.statements.lock().push(sql.to_string());
        self.check(sql)
    }

    async fn query(&self, _credentials: &AdminCredentials, sql: &str) -> anyhow::Result<Vec<QueryRow>> {
        self.queries.lock().push(sql.to_string());
        self.check(sql)?;
        let responses = self.responses.lock();
        Ok(responses
            .iter()
            .find(|(fragment, _)| sql.contains(fragment.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }
}

type ObjectKey = (String, WorkloadKind, String);

/// In-memory cluster that keeps the objects applied to it.
#[derive(Default)]
pub struct RecordingCluster {
    namespaces: Mutex<Vec<String>>,
    live: Mutex<Vec<ObjectKey>>,
    applied: Mutex<Vec<ObjectKey>>,
    deleted: Mutex<Vec<ObjectKey>>,
    failing_kinds: Mutex<Vec<WorkloadKind>>,
    statuses: Mutex<HashMap<String, WorkloadStatus>>,
}

impl RecordingCluster {
    pub fn namespaces(&self) -> Vec<String> {
        self.namespaces.lock().clone()
    }

    pub fn applied(&self) -> Vec<ObjectKey> {
        self.applied.lock().clone()
    }

    /// Every delete call, including ones for objects that were already gone
    pub fn deleted(&self) -> Vec<ObjectKey> {
        self.deleted.lock().clone()
    }

    pub fn fail_apply(&self, kind: WorkloadKind) {
        self.failing_kinds.lock().push(kind);
    }

    pub fn set_status(&self, deployment: &str, status: WorkloadStatus) {
        self.statuses.lock().insert(deployment.to_string(), status);
    }

    /// Drop a live object behind the provisioner's back
    pub fn forget(&self, kind: WorkloadKind, name: &str) {
        self.live.lock().retain(|(_, k, n)| !(*k == kind && n == name));
    }
}

#[async_trait]
impl ClusterClient for RecordingCluster {
    async fn ensure_namespace(&self, namespace: &str) -> anyhow::Result<()> {
        let mut namespaces = self.namespaces.lock();
        if !namespaces.iter().any(|ns| ns == namespace) {
            namespaces.push(namespace.to_string());
        }
        Ok(())
    }

    async fn apply(&self, namespace: &str, object: &WorkloadObject) -> anyhow::Result<()> {
        if self.failing_kinds.lock().contains(&object.kind()) {
            anyhow::bail!("injected failure applying {}", object.kind());
        }
        let key = (namespace.to_string(), object.kind(), object.name().to_string());
        self.applied.lock().push(key.clone());
        let mut live = self.live.lock();
        if !live.contains(&key) {
            live.push(key);
        }
        Ok(())
    }

    async fn delete(&self, namespace: &str, kind: WorkloadKind, name: &str) -> anyhow::Result<bool> {
        let key = (namespace.to_string(), kind, name.to_string());
        self.deleted.lock().push(key.clone());
        let mut live = self.live.lock();
        let before = live.len();
        live.retain(|k| k != &key);
        Ok(live.len() != before)
    }

    async fn workload_status(&self, namespace: &str, name: &str) -> anyhow::Result<Option<WorkloadStatus>> {
        let exists = self
            .live
            .lock()
            .iter()
            .any(|(ns, kind, n)| ns == namespace && *kind == WorkloadKind::Deployment && n == name);
        if !exists {
            return Ok(None);
        }
        Ok(Some(self.statuses.lock().get(name).cloned().unwrap_or(WorkloadStatus {
            uid: None,
            ready: false,
        })))
    }
}

/// Managers wired to in-memory stores, a recording connector and one recording cluster.
pub struct Harness {
    pub config: Config,
    pub stores: Stores,
    pub events: EventBus,
    pub connector: Arc<RecordingConnector>,
    pub cluster: Arc<RecordingCluster>,
    pub registry: ServerRegistry,
    pub fleet: ServerFleetProvisioner,
    pub databases: DatabaseLifecycleManager,
    pub users: UserLifecycleManager,
    pub orchestrator: ProvisionOrchestrator,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    pub fn new() -> Self {
        let config = Config::default();
        let stores = in_memory_stores();
        let events = EventBus::new();
        let connector = Arc::new(RecordingConnector::default());
        let cluster = Arc::new(RecordingCluster::default());

        let clusters = Clusters::new([Cluster {
            id: TEST_CLUSTER.to_string(),
            domain: TEST_DOMAIN.to_string(),
            client: cluster.clone(),
        }]);

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
            connector.clone(),
            events.clone(),
        );
        let orchestrator = ProvisionOrchestrator::new(
            registry.clone(),
            databases.clone(),
            users.clone(),
            stores.provisions.clone(),
            config.provisioning.clone(),
        );

        Self {
            config,
            stores,
            events,
            connector,
            cluster,
            registry,
            fleet,
            databases,
            users,
            orchestrator,
        }
    }

    /// An external server at `<name>.db.internal:3306`
    pub async fn ready_server(&self, name: &str, zone: Option<&str>) -> ServerDBResponse {
        self.registry
            .register(RegisterServer {
                name: name.to_string(),
                hostname: format!("{name}.db.internal"),
                port: 3306,
                username: "root".to_string(),
                password: "rootpass".to_string(),
                zone: zone.map(str::to_string),
            })
            .await
            .expect("Failed to register test server")
    }

    /// A cluster-hosted server whose workload has not reported ready
    pub async fn pending_server(&self, name: &str) -> ServerDBResponse {
        self.registry
            .create_pending(&ServerCreateDBRequest {
                name: name.to_string(),
                cluster_id: Some(TEST_CLUSTER.to_string()),
                namespace: Some("mysql".to_string()),
                endpoint: None,
                username: "root".to_string(),
                password: "rootpass".to_string(),
                zone: None,
            })
            .await
            .expect("Failed to create pending test server")
    }

    pub async fn database(&self, server: &ServerDBResponse, name: &str) -> DatabaseDBResponse {
        self.databases
            .create(CreateDatabase {
                server_id: server.id,
                name: name.to_string(),
                connection_limit: None,
            })
            .await
            .expect("Failed to create test database")
    }

    pub async fn user(&self, server: &ServerDBResponse, username: &str, databases: &[DatabaseId]) -> UserDBResponse {
        self.users
            .create(CreateUser {
                server_id: server.id,
                username: username.to_string(),
                password: format!("{username}-password"),
                databases: databases.to_vec(),
            })
            .await
            .expect("Failed to create test user")
    }

    pub fn app_state(&self) -> AppState {
        AppState::builder()
            .registry(self.registry.clone())
            .fleet(self.fleet.clone())
            .databases(self.databases.clone())
            .users(self.users.clone())
            .orchestrator(self.orchestrator.clone())
            .config(self.config.clone())
            .build()
    }
}

/// A test server over the harness' managers, returned alongside the harness for assertions.
pub fn create_test_app() -> (TestServer, Harness) {
    let harness = Harness::new();
    let router = build_router(harness.app_state());
    let server = TestServer::new(router).expect("Failed to create test server");
    (server, harness)
}
