use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use postgres::error::SqlState;
use postgres::{Client, NoTls};
use testcontainers::runners::SyncRunner;
use testcontainers::{Container, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tracing::{debug, info};

use super::{State, TestDatabase, target_db_name};
use crate::conn::TestConn;
use crate::error::Error;
use crate::lock;
use crate::name::DEFAULT_DB_NAME;

pub const DB_TYPE_POSTGRES: &str = "postgres";

const POSTGRES_USER: &str = "testuser";
const POSTGRES_PASSWORD: &str = "password";
const POSTGRES_PORT: u16 = 5432;
const STARTUP_TIMEOUT: Duration = Duration::from_secs(60);

struct PostgresServer {
    host: String,
    port: u16,
    container: Container<Postgres>,
}

/// Containerized postgres backend. One container per instance; every logical
/// name gets its own database inside it, created on first request.
pub struct PostgresTestDb {
    state: Mutex<State<PostgresServer>>,
    pool: Mutex<HashMap<String, TestConn>>,
}

impl Default for PostgresTestDb {
    fn default() -> Self {
        return Self::new();
    }
}

impl PostgresTestDb {
    pub fn new() -> Self {
        return Self {
            state: Mutex::new(State::Uninitialized),
            pool: Mutex::new(HashMap::new()),
        };
    }

    fn uri(host: &str, port: u16, db_name: &str) -> String {
        return format!("postgres://{POSTGRES_USER}:{POSTGRES_PASSWORD}@{host}:{port}/{db_name}");
    }

    fn ensure_ready(&self) -> anyhow::Result<(String, u16)> {
        let mut state = lock(&self.state);
        if let State::Ready(server) = &*state {
            return Ok((server.host.clone(), server.port));
        }

        info!("starting postgres container");
        let container = Postgres::default()
            .with_db_name(DEFAULT_DB_NAME)
            .with_user(POSTGRES_USER)
            .with_password(POSTGRES_PASSWORD)
            .with_startup_timeout(STARTUP_TIMEOUT)
            .start()
            .context("Failed to start postgres container")?;
        let host = container
            .get_host()
            .context("Failed to get postgres container host")?
            .to_string();
        let port = container
            .get_host_port_ipv4(POSTGRES_PORT)
            .context("Failed to get postgres container port")?;
        debug!("postgres container ready at {host}:{port}");

        let client = Client::connect(&Self::uri(&host, port, DEFAULT_DB_NAME), NoTls)
            .context("Failed to connect to the default postgres database")?;
        lock(&self.pool).insert(
            DEFAULT_DB_NAME.to_string(),
            TestConn::Postgres(Arc::new(Mutex::new(client))),
        );

        *state = State::Ready(PostgresServer {
            host: host.clone(),
            port,
            container,
        });
        return Ok((host, port));
    }
}

impl TestDatabase for PostgresTestDb {
    fn db_type(&self) -> &'static str {
        return DB_TYPE_POSTGRES;
    }

    fn init(&self) -> anyhow::Result<()> {
        self.ensure_ready()?;
        return Ok(());
    }

    fn conn_db_name(&self, name: &str) -> anyhow::Result<TestConn> {
        let (host, port) = self.ensure_ready()?;
        let name = target_db_name(name);
        let mut pool = lock(&self.pool);
        if let Some(conn) = pool.get(&name) {
            return Ok(conn.clone());
        }

        let mut admin = Client::connect(&Self::uri(&host, port, DEFAULT_DB_NAME), NoTls)
            .context("Failed to connect to postgres for database creation")?;
        // Quoted: normalized names may contain dashes or start with a digit,
        // which bare identifiers do not allow. The normalized charset can
        // never contain a double quote.
        if let Err(err) = admin.batch_execute(&format!("CREATE DATABASE \"{name}\"")) {
            // Another suite sharing the server may have created it already.
            if err.code() != Some(&SqlState::DUPLICATE_DATABASE) {
                return Err(anyhow::Error::new(err)
                    .context(format!("Failed to create postgres database {name}")));
            }
            debug!("postgres database {name} already exists");
        }

        let client = Client::connect(&Self::uri(&host, port, &name), NoTls)
            .context("Failed to connect to the postgres database created for tests")?;
        debug!("connected to postgres database {name}");
        let conn = TestConn::Postgres(Arc::new(Mutex::new(client)));
        pool.insert(name, conn.clone());
        return Ok(conn);
    }

    fn close(&self, name: &str) -> Result<(), Error> {
        let name = target_db_name(name);
        return match lock(&self.pool).remove(&name) {
            Some(_) => Ok(()),
            None => Err(Error::NotFound(name)),
        };
    }

    fn close_all(&self) -> Result<(), Error> {
        let mut state = lock(&self.state);
        let previous = std::mem::replace(&mut *state, State::Closed);
        lock(&self.pool).clear();
        drop(state);

        let mut errors = Vec::new();
        if let State::Ready(server) = previous {
            info!("stopping postgres container");
            if let Err(err) = server.container.stop() {
                errors.push(Error::Other(
                    anyhow::Error::new(err).context("Failed to stop postgres container"),
                ));
            }
        }
        return Error::aggregate(errors).map_or(Ok(()), Err);
    }
}
