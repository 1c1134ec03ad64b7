use std::sync::{Arc, Mutex};

use anyhow::Context;
use mysql::prelude::Queryable;
use rusqlite::OptionalExtension;

use crate::lock;

/// Live connection into one sub-database, handed out by a backend and cached
/// under its normalized logical name.
///
/// Handles are cheap to clone; clones share the underlying driver connection.
/// Dropping the last clone closes it.
#[derive(Clone)]
pub enum TestConn {
    Sqlite(Arc<Mutex<rusqlite::Connection>>),
    Postgres(Arc<Mutex<postgres::Client>>),
    Mysql(Arc<Mutex<mysql::Conn>>),
}

impl TestConn {
    pub fn db_type(&self) -> &'static str {
        return match self {
            TestConn::Sqlite(_) => "sqlite",
            TestConn::Postgres(_) => "postgres",
            TestConn::Mysql(_) => "mysql",
        };
    }

    /// Runs one or more raw statements, discarding any result rows.
    pub fn execute(&self, query: &str) -> anyhow::Result<()> {
        match self {
            TestConn::Sqlite(conn) => {
                lock(conn)
                    .execute_batch(query)
                    .context("Failed to execute sqlite statement")?;
            }
            TestConn::Postgres(client) => {
                lock(client)
                    .batch_execute(query)
                    .context("Failed to execute postgres statement")?;
            }
            TestConn::Mysql(conn) => {
                lock(conn)
                    .query_drop(query)
                    .context("Failed to execute mysql statement")?;
            }
        }
        return Ok(());
    }

    /// Returns the first column of the first matching row as text, or `None`
    /// when the query matches nothing.
    pub fn query_first_string(&self, query: &str) -> anyhow::Result<Option<String>> {
        let value = match self {
            TestConn::Sqlite(conn) => lock(conn)
                .query_row(query, [], |row| row.get::<_, String>(0))
                .optional()
                .context("Failed to query sqlite")?,
            TestConn::Postgres(client) => lock(client)
                .query_opt(query, &[])
                .context("Failed to query postgres")?
                .map(|row| row.get::<_, String>(0)),
            TestConn::Mysql(conn) => lock(conn)
                .query_first::<String, _>(query)
                .context("Failed to query mysql")?,
        };
        return Ok(value);
    }
}
