//! PostgreSQL repository for server records.

use crate::db::{
    errors::Result,
    handlers::repository::Repository,
    models::servers::{Endpoint, ServerCreateDBRequest, ServerDBResponse, ServerFilter, ServerUpdateDBRequest},
};
use crate::types::{ServerId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::instrument;
use uuid::Uuid;

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct Server {
    id: ServerId,
    name: String,
    cluster_id: Option<String>,
    namespace: Option<String>,
    hostname: Option<String>,
    port: Option<i32>,
    username: String,
    password: String,
    zone: Option<String>,
    uid: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<Server> for ServerDBResponse {
    fn from(server: Server) -> Self {
        let endpoint = match (server.hostname, server.port) {
            (Some(hostname), Some(port)) => u16::try_from(port).ok().map(|port| Endpoint { hostname, port }),
            _ => None,
        };
        Self {
            id: server.id,
            name: server.name,
            cluster_id: server.cluster_id,
            namespace: server.namespace,
            endpoint,
            username: server.username,
            password: server.password,
            zone: server.zone,
            uid: server.uid,
            created_at: server.created_at,
            updated_at: server.updated_at,
        }
    }
}

pub struct Servers {
    db: PgPool,
}

impl Servers {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl Repository for Servers {
    type CreateRequest = ServerCreateDBRequest;
    type UpdateRequest = ServerUpdateDBRequest;
    type Response = ServerDBResponse;
    type Id = ServerId;
    type Filter = ServerFilter;

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create(&self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let server = sqlx::query_as::<_, Server>(
            r#"
            INSERT INTO mysql_servers (id, name, cluster_id, namespace, hostname, port, username, password, zone)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.name)
        .bind(&request.cluster_id)
        .bind(&request.namespace)
        .bind(request.endpoint.as_ref().map(|e| e.hostname.clone()))
        .bind(request.endpoint.as_ref().map(|e| i32::from(e.port)))
        .bind(&request.username)
        .bind(&request.password)
        .bind(&request.zone)
        .fetch_one(&self.db)
        .await?;

        Ok(server.into())
    }

    #[instrument(skip(self), fields(server_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&self, id: Self::Id) -> Result<Option<Self::Response>> {
        let server = sqlx::query_as::<_, Server>("SELECT * FROM mysql_servers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(server.map(Into::into))
    }

    #[instrument(skip(self, filter), err)]
    async fn list(&self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let servers = sqlx::query_as::<_, Server>(
            r#"
            SELECT * FROM mysql_servers
            WHERE ($1::text IS NULL OR zone = $1)
              AND ($2::text IS NULL OR cluster_id = $2)
              AND ($3::text IS NULL OR namespace = $3)
              AND ($4::text IS NULL OR name = $4)
              AND ($5::bool IS NULL OR (hostname IS NOT NULL AND port IS NOT NULL) = $5)
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(&filter.zone)
        .bind(&filter.cluster_id)
        .bind(&filter.namespace)
        .bind(&filter.name)
        .bind(filter.ready)
        .fetch_all(&self.db)
        .await?;

        Ok(servers.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self), fields(server_id = %abbrev_uuid(&id)), err)]
    async fn delete(&self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM mysql_servers WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(server_id = %abbrev_uuid(&id)), err)]
    async fn update(&self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let endpoint = request.endpoint.clone().flatten();
        let server = sqlx::query_as::<_, Server>(
            r#"
            UPDATE mysql_servers SET
                hostname = CASE WHEN $2 THEN $3 ELSE hostname END,
                port = CASE WHEN $2 THEN $4 ELSE port END,
                uid = CASE WHEN $5 THEN $6 ELSE uid END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.endpoint.is_some())
        .bind(endpoint.as_ref().map(|e| e.hostname.clone()))
        .bind(endpoint.as_ref().map(|e| i32::from(e.port)))
        .bind(request.uid.is_some())
        .bind(request.uid.clone().flatten())
        .fetch_one(&self.db)
        .await?;

        Ok(server.into())
    }
}
