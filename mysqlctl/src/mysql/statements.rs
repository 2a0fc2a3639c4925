//! SQL text for the administrative statements.
//!
//! Builders assume names have passed [`crate::names::validate_identifier`]; they quote
//! identifiers with backticks and escape string literals, but do not reject input.

/// Privileges handed to provisioned users: schema DDL plus full DML, nothing server-wide.
pub const USER_PRIVILEGES: &str =
    "CREATE VIEW, ALTER, SHOW VIEW, CREATE, INSERT, SELECT, DELETE, TRIGGER, REFERENCES, UPDATE, DROP, INDEX";

/// Backtick-quote an identifier, doubling embedded backticks
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Escape a value for use inside a single-quoted string literal
pub fn escape_string_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("''"),
            '\0' => escaped.push_str("\\0"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn account(username: &str) -> String {
    format!("'{}'@'%'", escape_string_literal(username))
}

pub fn create_database(name: &str) -> String {
    format!("CREATE DATABASE {}", quote_identifier(name))
}

pub fn drop_database(name: &str) -> String {
    format!("DROP DATABASE {}", quote_identifier(name))
}

pub fn create_user(username: &str, password: &str) -> String {
    format!(
        "CREATE USER {} IDENTIFIED BY '{}'",
        account(username),
        escape_string_literal(password)
    )
}

pub fn drop_user(username: &str) -> String {
    format!("DROP USER {}", account(username))
}

pub fn grant(database: &str, username: &str) -> String {
    format!(
        "GRANT {USER_PRIVILEGES} ON {}.* TO {}",
        quote_identifier(database),
        account(username)
    )
}

pub fn revoke(database: &str, username: &str) -> String {
    format!(
        "REVOKE {USER_PRIVILEGES} ON {}.* FROM {}",
        quote_identifier(database),
        account(username)
    )
}

/// Size in MiB of all tables in the schema, one row keyed `database`, `size`
pub fn database_stats(database: &str) -> String {
    format!(
        "SELECT table_schema AS `database`, SUM(data_length + index_length) / 1024 / 1024 AS `size` \
         FROM information_schema.TABLES WHERE table_schema = '{}' GROUP BY table_schema",
        escape_string_literal(database)
    )
}

pub fn database_tables(database: &str) -> String {
    format!(
        "SELECT table_name FROM information_schema.tables WHERE table_schema = '{}'",
        escape_string_literal(database)
    )
}

/// Number of sessions currently using the schema, one row keyed `connections`
pub fn database_connections(database: &str) -> String {
    format!(
        "SELECT COUNT(*) AS `connections` FROM information_schema.processlist WHERE DB = '{}'",
        escape_string_literal(database)
    )
}

/// Every account on the server, one row per `host`, `user`
pub const SERVER_USERS: &str = "SELECT host, user FROM mysql.user";

pub const SERVER_DATABASES: &str = "SHOW DATABASES";

/// Slow-query counters, rows keyed `Variable_name`, `Value`
pub const SERVER_SLOW_STATUS: &str = "SHOW GLOBAL STATUS LIKE '%slow%'";
