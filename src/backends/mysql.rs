use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use mysql::prelude::Queryable;
use mysql::{Conn, Opts};
use testcontainers::runners::SyncRunner;
use testcontainers::{Container, ImageExt};
use testcontainers_modules::mysql::Mysql;
use tracing::{debug, info};

use super::{State, TestDatabase, target_db_name};
use crate::conn::TestConn;
use crate::error::Error;
use crate::lock;
use crate::name::DEFAULT_DB_NAME;

pub const DB_TYPE_MYSQL: &str = "mysql";

const MYSQL_USER: &str = "testuser";
const MYSQL_PASSWORD: &str = "password";
const MYSQL_PORT: u16 = 3306;
const STARTUP_TIMEOUT: Duration = Duration::from_secs(60);

struct MysqlServer {
    host: String,
    port: u16,
    container: Container<Mysql>,
}

/// Containerized mysql backend. Sub-databases are created as root and granted
/// to the test user, connections are handed out as that user.
pub struct MysqlTestDb {
    state: Mutex<State<MysqlServer>>,
    pool: Mutex<HashMap<String, TestConn>>,
}

impl Default for MysqlTestDb {
    fn default() -> Self {
        return Self::new();
    }
}

impl MysqlTestDb {
    pub fn new() -> Self {
        return Self {
            state: Mutex::new(State::Uninitialized),
            pool: Mutex::new(HashMap::new()),
        };
    }

    fn connect(uri: &str) -> Result<Conn, mysql::Error> {
        let opts = Opts::from_url(uri)?;
        return Conn::new(opts);
    }

    fn user_uri(host: &str, port: u16, db_name: &str) -> String {
        return format!("mysql://{MYSQL_USER}:{MYSQL_PASSWORD}@{host}:{port}/{db_name}");
    }

    fn root_uri(host: &str, port: u16) -> String {
        return format!("mysql://root@{host}:{port}/");
    }

    fn ensure_ready(&self) -> anyhow::Result<(String, u16)> {
        let mut state = lock(&self.state);
        if let State::Ready(server) = &*state {
            return Ok((server.host.clone(), server.port));
        }

        info!("starting mysql container");
        let container = Mysql::default()
            .with_env_var("MYSQL_DATABASE", DEFAULT_DB_NAME)
            .with_env_var("MYSQL_USER", MYSQL_USER)
            .with_env_var("MYSQL_PASSWORD", MYSQL_PASSWORD)
            .with_startup_timeout(STARTUP_TIMEOUT)
            .start()
            .context("Failed to start mysql container")?;
        let host = container
            .get_host()
            .context("Failed to get mysql container host")?
            .to_string();
        let port = container
            .get_host_port_ipv4(MYSQL_PORT)
            .context("Failed to get mysql container port")?;
        debug!("mysql container ready at {host}:{port}");

        let conn = Self::connect(&Self::user_uri(&host, port, DEFAULT_DB_NAME))
            .context("Failed to connect to the default mysql database")?;
        lock(&self.pool).insert(
            DEFAULT_DB_NAME.to_string(),
            TestConn::Mysql(Arc::new(Mutex::new(conn))),
        );

        *state = State::Ready(MysqlServer {
            host: host.clone(),
            port,
            container,
        });
        return Ok((host, port));
    }
}

impl TestDatabase for MysqlTestDb {
    fn db_type(&self) -> &'static str {
        return DB_TYPE_MYSQL;
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

        let mut root = Self::connect(&Self::root_uri(&host, port))
            .context("Failed to connect to mysql as root")?;
        // Backticked: normalized names may contain dashes or start with a
        // digit, which bare identifiers do not allow. The normalized charset
        // can never contain a backtick.
        root.query_drop(format!("CREATE DATABASE IF NOT EXISTS `{name}`"))
            .with_context(|| format!("Failed to create mysql database {name}"))?;
        root.query_drop(format!(
            "GRANT ALL PRIVILEGES ON `{name}`.* TO '{MYSQL_USER}'@'%'"
        ))
        .with_context(|| format!("Failed to grant privileges on mysql database {name}"))?;
        root.query_drop("FLUSH PRIVILEGES")
            .context("Failed to flush mysql privileges")?;

        let conn = Self::connect(&Self::user_uri(&host, port, &name))
            .context("Failed to connect to the mysql database created for tests")?;
        debug!("connected to mysql database {name}");
        let conn = TestConn::Mysql(Arc::new(Mutex::new(conn)));
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
            info!("stopping mysql container");
            if let Err(err) = server.container.stop() {
                errors.push(Error::Other(
                    anyhow::Error::new(err).context("Failed to stop mysql container"),
                ));
            }
        }
        return Error::aggregate(errors).map_or(Ok(()), Err);
    }
}
