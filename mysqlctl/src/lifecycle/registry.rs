//! Server records and the placement policy.

use tracing::{debug, info, instrument};

use crate::db::handlers::ServerStore;
use crate::db::models::servers::{Endpoint, ServerCreateDBRequest, ServerDBResponse, ServerFilter, ServerUpdateDBRequest};
use crate::errors::{Error, Result};
use crate::names::validate_dns_label;
use crate::types::{Resource, ServerId, abbrev_uuid};

/// A server not managed by any cluster, registered by its address
#[derive(Debug, Clone)]
pub struct RegisterServer {
    pub name: String,
    pub hostname: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub zone: Option<String>,
}

#[derive(Clone)]
pub struct ServerRegistry {
    servers: ServerStore,
}

impl ServerRegistry {
    pub fn new(servers: ServerStore) -> Self {
        Self { servers }
    }

    /// Pick a server for a new database/user pair.
    ///
    /// First ready server in `zone`, falling back to the first ready server anywhere. Load is
    /// not considered and nothing is reserved, so concurrent callers may get the same server.
    #[instrument(skip(self), err)]
    pub async fn select_server(&self, zone: Option<&str>) -> Result<ServerDBResponse> {
        if zone.is_some()
            && let Some(server) = self.servers.list(&ServerFilter::ready_in_zone(zone)).await?.into_iter().next()
        {
            debug!("Selected server {} in requested zone", server.name);
            return Ok(server);
        }

        match self.servers.list(&ServerFilter::ready_in_zone(None)).await?.into_iter().next() {
            Some(server) => {
                debug!("Selected server {} (zone {:?})", server.name, server.zone);
                Ok(server)
            }
            None => Err(Error::NoAvailableServer {
                zone: zone.map(str::to_string),
            }),
        }
    }

    #[instrument(skip(self), fields(server_id = %abbrev_uuid(&id)), err)]
    pub async fn resolve(&self, id: ServerId) -> Result<ServerDBResponse> {
        self.servers
            .get_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found(Resource::Server, id))
    }

    pub async fn list(&self, filter: &ServerFilter) -> Result<Vec<ServerDBResponse>> {
        Ok(self.servers.list(filter).await?)
    }

    /// Record a server reachable at a known address
    #[instrument(skip(self, request), fields(name = %request.name), err)]
    pub async fn register(&self, request: RegisterServer) -> Result<ServerDBResponse> {
        if request.name.trim().is_empty() {
            return Err(Error::BadRequest {
                message: "Server name must not be empty".to_string(),
            });
        }
        if request.hostname.trim().is_empty() || request.port == 0 {
            return Err(Error::BadRequest {
                message: "Server hostname and port are required".to_string(),
            });
        }
        if request.username.is_empty() {
            return Err(Error::BadRequest {
                message: "Server admin username must not be empty".to_string(),
            });
        }

        let server = self
            .servers
            .create(&ServerCreateDBRequest {
                name: request.name,
                cluster_id: None,
                namespace: None,
                endpoint: Some(Endpoint {
                    hostname: request.hostname,
                    port: request.port,
                }),
                username: request.username,
                password: request.password,
                zone: request.zone,
            })
            .await?;
        info!("Registered external server {} ({})", server.name, abbrev_uuid(&server.id));
        Ok(server)
    }

    /// Record a cluster-hosted server; it has no endpoint until its workload reports ready.
    pub async fn create_pending(&self, request: &ServerCreateDBRequest) -> Result<ServerDBResponse> {
        validate_dns_label("server name", &request.name)?;
        Ok(self.servers.create(request).await?)
    }

    pub async fn find_workload(&self, cluster_id: &str, namespace: &str, name: &str) -> Result<Option<ServerDBResponse>> {
        let filter = ServerFilter::workload(cluster_id, namespace, name);
        Ok(self.servers.list(&filter).await?.into_iter().next())
    }

    /// Every server backed by a cluster workload, ready or not
    pub async fn cluster_hosted(&self) -> Result<Vec<ServerDBResponse>> {
        let servers = self.servers.list(&ServerFilter::default()).await?;
        Ok(servers.into_iter().filter(|s| s.cluster_id.is_some()).collect())
    }

    #[instrument(skip(self, request), fields(server_id = %abbrev_uuid(&id)), err)]
    pub async fn update(&self, id: ServerId, request: &ServerUpdateDBRequest) -> Result<ServerDBResponse> {
        Ok(self.servers.update(id, request).await?)
    }

    #[instrument(skip(self), fields(server_id = %abbrev_uuid(&id)), err)]
    pub async fn remove(&self, id: ServerId) -> Result<bool> {
        Ok(self.servers.delete(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::in_memory::in_memory_stores;

    fn external(name: &str, zone: Option<&str>) -> RegisterServer {
        RegisterServer {
            name: name.to_string(),
            hostname: format!("{name}.db.internal"),
            port: 3306,
            username: "root".to_string(),
            password: "rootpass".to_string(),
            zone: zone.map(str::to_string),
        }
    }

    fn pending(name: &str, zone: Option<&str>) -> ServerCreateDBRequest {
        ServerCreateDBRequest {
            name: name.to_string(),
            cluster_id: Some("cloud1".to_string()),
            namespace: Some("mysql".to_string()),
            endpoint: None,
            username: "root".to_string(),
            password: "rootpass".to_string(),
            zone: zone.map(str::to_string),
        }
    }

    fn registry() -> ServerRegistry {
        ServerRegistry::new(in_memory_stores().servers)
    }

    #[tokio::test]
    async fn test_select_without_zone_returns_first_registered() {
        let registry = registry();
        let first = registry.register(external("alpha", Some("ca"))).await.unwrap();
        registry.register(external("beta", Some("eu"))).await.unwrap();

        let selected = registry.select_server(None).await.unwrap();
        assert_eq!(selected.id, first.id);
    }

    #[tokio::test]
    async fn test_select_with_zone_stays_inside_zone() {
        let registry = registry();
        registry.register(external("alpha", Some("ca"))).await.unwrap();
        let eu1 = registry.register(external("beta", Some("eu"))).await.unwrap();
        registry.register(external("gamma", Some("eu"))).await.unwrap();

        let selected = registry.select_server(Some("eu")).await.unwrap();
        assert_eq!(selected.id, eu1.id);
    }

    #[tokio::test]
    async fn test_select_falls_back_when_zone_is_empty() {
        let registry = registry();
        let ca = registry.register(external("alpha", Some("ca"))).await.unwrap();

        let selected = registry.select_server(Some("eu")).await.unwrap();
        assert_eq!(selected.id, ca.id);
    }

    #[tokio::test]
    async fn test_select_with_no_servers_fails() {
        let err = registry().select_server(Some("eu")).await.unwrap_err();
        assert!(matches!(err, Error::NoAvailableServer { zone: Some(z) } if z == "eu"));
    }

    #[tokio::test]
    async fn test_pending_servers_are_not_selectable() {
        let registry = registry();
        registry.create_pending(&pending("sure-vervet", Some("eu"))).await.unwrap();
        assert!(matches!(
            registry.select_server(Some("eu")).await,
            Err(Error::NoAvailableServer { .. })
        ));

        let ready = registry.register(external("beta", Some("ca"))).await.unwrap();
        assert_eq!(registry.select_server(Some("eu")).await.unwrap().id, ready.id);
        let hosted = registry.cluster_hosted().await.unwrap();
        assert_eq!(hosted.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(), vec!["sure-vervet"]);
    }

    #[tokio::test]
    async fn test_register_requires_address() {
        let mut request = external("alpha", None);
        request.port = 0;
        assert!(matches!(registry().register(request).await, Err(Error::BadRequest { .. })));
    }

    #[tokio::test]
    async fn test_resolve_missing_server() {
        let id = uuid::Uuid::new_v4();
        let err = registry().resolve(id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { resource: Resource::Server, id: missing } if missing == id.to_string()));
    }
}
