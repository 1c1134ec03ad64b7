use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use rusqlite::{Connection, OpenFlags};
use tempfile::TempDir;
use tracing::debug;

use super::{State, TestDatabase, target_db_name};
use crate::conn::TestConn;
use crate::error::Error;
use crate::lock;

pub const DB_TYPE_SQLITE: &str = "sqlite";

/// Marker every working directory this backend creates must carry. Checked
/// again before recursive removal.
const TEST_DB_DIR: &str = "testdbs";
const SQLITE_DIR_PREFIX: &str = "testdbs_sqlite";
const LOCAL_DIR: &str = "./testdbs_sqlite";

struct Workdir {
    dir: PathBuf,
    // None in local-directory mode, which is never removed at teardown.
    tmp: Option<TempDir>,
}

/// File-based backend: one database file per logical name under a shared
/// working directory. The directory is chosen lazily on first use; file
/// creation is deferred to the first connection request for each name.
pub struct SqliteTestDb {
    local_dir: Option<PathBuf>,
    state: Mutex<State<Workdir>>,
    pool: Mutex<HashMap<String, TestConn>>,
}

impl SqliteTestDb {
    /// `local` selects the fixed `./testdbs_sqlite` directory instead of a
    /// fresh temporary one; files in it survive teardown for inspection.
    pub fn new(local: bool) -> Self {
        if local {
            return Self::with_local_dir(LOCAL_DIR);
        }
        return Self {
            local_dir: None,
            state: Mutex::new(State::Uninitialized),
            pool: Mutex::new(HashMap::new()),
        };
    }

    /// Local-directory mode with an explicit directory.
    pub fn with_local_dir(dir: impl Into<PathBuf>) -> Self {
        return Self {
            local_dir: Some(dir.into()),
            state: Mutex::new(State::Uninitialized),
            pool: Mutex::new(HashMap::new()),
        };
    }

    /// The working directory holding the database files, once initialized.
    pub fn data_dir(&self) -> Option<PathBuf> {
        if let State::Ready(workdir) = &*lock(&self.state) {
            return Some(workdir.dir.clone());
        }
        return None;
    }

    fn ensure_ready(&self) -> anyhow::Result<PathBuf> {
        let mut state = lock(&self.state);
        if let State::Ready(workdir) = &*state {
            return Ok(workdir.dir.clone());
        }
        let workdir = match &self.local_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)
                    .context("Failed to create local sqlite directory")?;
                debug!("using local sqlite directory {}", dir.display());
                Workdir {
                    dir: dir.clone(),
                    tmp: None,
                }
            }
            None => {
                let tmp = tempfile::Builder::new()
                    .prefix(SQLITE_DIR_PREFIX)
                    .tempdir()
                    .context("Failed to create temporary directory for sqlite databases")?;
                debug!("created sqlite working directory {}", tmp.path().display());
                Workdir {
                    dir: tmp.path().to_path_buf(),
                    tmp: Some(tmp),
                }
            }
        };
        let dir = workdir.dir.clone();
        *state = State::Ready(workdir);
        return Ok(dir);
    }

    fn open(path: &Path) -> anyhow::Result<Connection> {
        // A stale file from a previous run would leak state between suites.
        if path.exists() {
            std::fs::remove_file(path).context("Failed to remove pre-existing sqlite file")?;
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI,
        )
        .context("Failed to open sqlite database")?;
        return Ok(conn);
    }
}

impl TestDatabase for SqliteTestDb {
    fn db_type(&self) -> &'static str {
        return DB_TYPE_SQLITE;
    }

    fn init(&self) -> anyhow::Result<()> {
        self.ensure_ready()?;
        return Ok(());
    }

    fn conn_db_name(&self, name: &str) -> anyhow::Result<TestConn> {
        let dir = self.ensure_ready()?;
        let name = target_db_name(name);
        let mut pool = lock(&self.pool);
        if let Some(conn) = pool.get(&name) {
            return Ok(conn.clone());
        }
        let path = dir.join(format!("{name}.sqlite"));
        let conn = Self::open(&path)?;
        debug!("opened sqlite database {}", path.display());
        let conn = TestConn::Sqlite(Arc::new(Mutex::new(conn)));
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
        if let State::Ready(workdir) = previous {
            if let Some(tmp) = workdir.tmp {
                let dir_name = tmp
                    .path()
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or_default();
                assert!(
                    dir_name.contains(TEST_DB_DIR),
                    "refusing to delete {}: not a directory created by testdbs",
                    tmp.path().display()
                );
                debug!("removing sqlite working directory {}", tmp.path().display());
                if let Err(err) = tmp.close() {
                    errors.push(Error::Other(
                        anyhow::Error::new(err)
                            .context("Failed to remove sqlite working directory"),
                    ));
                }
            }
        }
        return Error::aggregate(errors).map_or(Ok(()), Err);
    }
}
