//! Administrative connections to managed MySQL servers.
//!
//! Every physical statement (create/drop of databases and users, grants, diagnostics) runs
//! through an [`AdminConnector`] using the [`AdminCredentials`] of the owning server record.
//! Credentials are passed per call rather than held by the connector, so the lifecycle
//! managers decide which server a statement targets.
//!
//! The production connector opens one connection per call and closes it afterwards; there
//! is no pooling and no timeout.

pub mod statements;

use async_trait::async_trait;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, OptsBuilder, Row, Value};
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, instrument};

/// One row of a diagnostics query, keyed by column name
pub type QueryRow = Map<String, JsonValue>;

/// Administrator login for a single server
#[derive(Clone, PartialEq, Eq)]
pub struct AdminCredentials {
    pub hostname: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Executes administrative statements against a server.
#[async_trait]
pub trait AdminConnector: Send + Sync {
    /// Run a statement that returns no rows.
    async fn execute(&self, credentials: &AdminCredentials, statement: &str) -> anyhow::Result<()>;

    /// Run a read-only query and return its rows.
    async fn query(&self, credentials: &AdminCredentials, statement: &str) -> anyhow::Result<Vec<QueryRow>>;
}

/// [`AdminConnector`] backed by `mysql_async`
#[derive(Debug, Clone, Default)]
pub struct MysqlAdminConnector;

impl MysqlAdminConnector {
    pub fn new() -> Self {
        Self
    }

    async fn connect(credentials: &AdminCredentials) -> anyhow::Result<Conn> {
        let opts = OptsBuilder::default()
            .ip_or_hostname(credentials.hostname.clone())
            .tcp_port(credentials.port)
            .user(Some(credentials.username.clone()))
            .pass(Some(credentials.password.clone()));
        let conn = Conn::new(opts).await?;
        Ok(conn)
    }
}

#[async_trait]
impl AdminConnector for MysqlAdminConnector {
    #[instrument(skip(self, credentials, statement), fields(host = %credentials.hostname), err)]
    async fn execute(&self, credentials: &AdminCredentials, statement: &str) -> anyhow::Result<()> {
        let mut conn = Self::connect(credentials).await?;
        let result = conn.query_drop(statement).await;
        // Disconnect even when the statement failed; the statement error wins
        let closed = conn.disconnect().await;
        result?;
        if let Err(e) = closed {
            debug!("Error closing admin connection: {}", e);
        }
        Ok(())
    }

    #[instrument(skip(self, credentials, statement), fields(host = %credentials.hostname), err)]
    async fn query(&self, credentials: &AdminCredentials, statement: &str) -> anyhow::Result<Vec<QueryRow>> {
        let mut conn = Self::connect(credentials).await?;
        let result = conn.query::<Row, _>(statement).await;
        let closed = conn.disconnect().await;
        let rows = result?;
        if let Err(e) = closed {
            debug!("Error closing admin connection: {}", e);
        }
        Ok(rows.iter().map(row_to_json).collect())
    }
}

fn row_to_json(row: &Row) -> QueryRow {
    let mut out = Map::new();
    for (index, column) in row.columns_ref().iter().enumerate() {
        let value = row.as_ref(index).map(value_to_json).unwrap_or(JsonValue::Null);
        out.insert(column.name_str().into_owned(), value);
    }
    out
}

fn value_to_json(value: &Value) -> JsonValue {
    match value {
        Value::NULL => JsonValue::Null,
        Value::Int(i) => JsonValue::from(*i),
        Value::UInt(u) => JsonValue::from(*u),
        Value::Float(f) => JsonValue::from(*f),
        Value::Double(d) => JsonValue::from(*d),
        Value::Bytes(bytes) => bytes_to_json(bytes),
        Value::Date(year, month, day, hour, minute, second, _) => JsonValue::String(format!(
            "{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}"
        )),
        Value::Time(negative, days, hours, minutes, seconds, _) => {
            let sign = if *negative { "-" } else { "" };
            let hours = u32::from(*hours) + days * 24;
            JsonValue::String(format!("{sign}{hours:02}:{minutes:02}:{seconds:02}"))
        }
    }
}

// The text protocol returns every value as bytes; numeric aggregates should stay numeric
fn bytes_to_json(bytes: &[u8]) -> JsonValue {
    let text = String::from_utf8_lossy(bytes);
    if let Ok(i) = text.parse::<i64>() {
        return JsonValue::from(i);
    }
    if text.contains('.')
        && let Ok(f) = text.parse::<f64>()
    {
        return JsonValue::from(f);
    }
    JsonValue::String(text.into_owned())
}
