//! PostgreSQL repository for provision records.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::provisions::{ProvisionCreateDBRequest, ProvisionDBResponse, ProvisionFilter, ProvisionUpdateDBRequest},
};
use crate::types::{ProvisionId, abbrev_uuid};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

const COLUMNS: &str = "id, server_id, database_id, user_id, created_at";

#[derive(sqlx::FromRow)]
struct Provision {
    id: ProvisionId,
    server_id: Uuid,
    database_id: Uuid,
    user_id: Uuid,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<Provision> for ProvisionDBResponse {
    fn from(p: Provision) -> Self {
        Self {
            id: p.id,
            server_id: p.server_id,
            database_id: p.database_id,
            user_id: p.user_id,
            created_at: p.created_at,
        }
    }
}

pub struct Provisions {
    db: PgPool,
}

impl Provisions {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl Repository for Provisions {
    type CreateRequest = ProvisionCreateDBRequest;
    type UpdateRequest = ProvisionUpdateDBRequest;
    type Response = ProvisionDBResponse;
    type Id = ProvisionId;
    type Filter = ProvisionFilter;

    #[instrument(skip(self, request), fields(database_id = %abbrev_uuid(&request.database_id), user_id = %abbrev_uuid(&request.user_id)), err)]
    async fn create(&self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let provision = sqlx::query_as::<_, Provision>(&format!(
            "INSERT INTO mysql_provisions (id, server_id, database_id, user_id) VALUES ($1, $2, $3, $4) RETURNING {COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(request.server_id)
        .bind(request.database_id)
        .bind(request.user_id)
        .fetch_one(&self.db)
        .await?;

        Ok(provision.into())
    }

    #[instrument(skip(self), fields(provision_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&self, id: Self::Id) -> Result<Option<Self::Response>> {
        let provision = sqlx::query_as::<_, Provision>(&format!("SELECT {COLUMNS} FROM mysql_provisions WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(provision.map(Into::into))
    }

    #[instrument(skip(self, filter), err)]
    async fn list(&self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let provisions = sqlx::query_as::<_, Provision>(&format!(
            r#"
            SELECT {COLUMNS} FROM mysql_provisions
            WHERE ($1::uuid IS NULL OR server_id = $1)
              AND ($2::uuid IS NULL OR database_id = $2)
              AND ($3::uuid IS NULL OR user_id = $3)
            ORDER BY created_at ASC, id ASC
            "#
        ))
        .bind(filter.server_id)
        .bind(filter.database_id)
        .bind(filter.user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(provisions.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self), fields(provision_id = %abbrev_uuid(&id)), err)]
    async fn delete(&self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM mysql_provisions WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update(&self, id: Self::Id, _request: &Self::UpdateRequest) -> Result<Self::Response> {
        // Nothing is mutable on a provision; an update is a fetch that must find the row
        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }
}
