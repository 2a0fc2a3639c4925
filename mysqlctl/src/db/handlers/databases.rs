//! PostgreSQL repository for database records.

use crate::db::{
    errors::Result,
    handlers::repository::Repository,
    models::databases::{DatabaseCreateDBRequest, DatabaseDBResponse, DatabaseFilter, DatabaseUpdateDBRequest},
};
use crate::types::{DatabaseId, ServerId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::instrument;
use uuid::Uuid;

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct Database {
    id: DatabaseId,
    server_id: ServerId,
    name: String,
    connection_limit: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<Database> for DatabaseDBResponse {
    fn from(db: Database) -> Self {
        Self {
            id: db.id,
            server_id: db.server_id,
            name: db.name,
            connection_limit: db.connection_limit.and_then(|l| u32::try_from(l).ok()),
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

pub struct Databases {
    db: PgPool,
}

impl Databases {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl Repository for Databases {
    type CreateRequest = DatabaseCreateDBRequest;
    type UpdateRequest = DatabaseUpdateDBRequest;
    type Response = DatabaseDBResponse;
    type Id = DatabaseId;
    type Filter = DatabaseFilter;

    #[instrument(skip(self, request), fields(name = %request.name, server_id = %abbrev_uuid(&request.server_id)), err)]
    async fn create(&self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let database = sqlx::query_as::<_, Database>(
            r#"
            INSERT INTO mysql_databases (id, server_id, name, connection_limit)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.server_id)
        .bind(&request.name)
        .bind(request.connection_limit.map(i64::from))
        .fetch_one(&self.db)
        .await?;

        Ok(database.into())
    }

    #[instrument(skip(self), fields(database_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&self, id: Self::Id) -> Result<Option<Self::Response>> {
        let database = sqlx::query_as::<_, Database>("SELECT * FROM mysql_databases WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(database.map(Into::into))
    }

    #[instrument(skip(self, filter), err)]
    async fn list(&self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let databases = sqlx::query_as::<_, Database>(
            r#"
            SELECT * FROM mysql_databases
            WHERE ($1::uuid IS NULL OR server_id = $1)
              AND ($2::text IS NULL OR name = $2)
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(filter.server_id)
        .bind(&filter.name)
        .fetch_all(&self.db)
        .await?;

        Ok(databases.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self), fields(database_id = %abbrev_uuid(&id)), err)]
    async fn delete(&self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM mysql_databases WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(database_id = %abbrev_uuid(&id)), err)]
    async fn update(&self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let database = sqlx::query_as::<_, Database>(
            r#"
            UPDATE mysql_databases SET
                connection_limit = CASE WHEN $2 THEN $3 ELSE connection_limit END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.connection_limit.is_some())
        .bind(request.connection_limit.flatten().map(i64::from))
        .fetch_one(&self.db)
        .await?;

        Ok(database.into())
    }
}
