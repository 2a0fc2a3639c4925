//! PostgreSQL repository for user records.

use crate::db::{
    errors::Result,
    handlers::repository::Repository,
    models::users::{UserCreateDBRequest, UserDBResponse, UserFilter, UserUpdateDBRequest},
};
use crate::types::{DatabaseId, DbUserId, ServerId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::instrument;
use uuid::Uuid;

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct User {
    id: DbUserId,
    server_id: ServerId,
    username: String,
    password: String,
    databases: Vec<DatabaseId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<User> for UserDBResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            server_id: user.server_id,
            username: user.username,
            password: user.password,
            databases: user.databases,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

pub struct Users {
    db: PgPool,
}

impl Users {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl Repository for Users {
    type CreateRequest = UserCreateDBRequest;
    type UpdateRequest = UserUpdateDBRequest;
    type Response = UserDBResponse;
    type Id = DbUserId;
    type Filter = UserFilter;

    #[instrument(skip(self, request), fields(username = %request.username), err)]
    async fn create(&self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO mysql_users (id, server_id, username, password, databases)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.server_id)
        .bind(&request.username)
        .bind(&request.password)
        .bind(&request.databases)
        .fetch_one(&self.db)
        .await?;

        Ok(user.into())
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&self, id: Self::Id) -> Result<Option<Self::Response>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM mysql_users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(user.map(Into::into))
    }

    #[instrument(skip(self, filter), err)]
    async fn list(&self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM mysql_users
            WHERE ($1::uuid IS NULL OR server_id = $1)
              AND ($2::text IS NULL OR username = $2)
              AND ($3::uuid IS NULL OR $3 = ANY(databases))
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(filter.server_id)
        .bind(&filter.username)
        .bind(filter.database_id)
        .fetch_all(&self.db)
        .await?;

        Ok(users.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn delete(&self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM mysql_users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn update(&self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE mysql_users SET
                databases = CASE
                    WHEN $2::uuid IS NULL OR $2 = ANY(array_remove(databases, $3::uuid))
                        THEN array_remove(databases, $3::uuid)
                    ELSE array_append(array_remove(databases, $3::uuid), $2::uuid)
                END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.add_database)
        .bind(request.remove_database)
        .fetch_one(&self.db)
        .await?;

        Ok(user.into())
    }
}
