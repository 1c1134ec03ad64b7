use anyhow::Context;
use tracing::info;

use crate::backends::TestDatabase;
use crate::backends::mysql::MysqlTestDb;
use crate::backends::postgres::PostgresTestDb;
use crate::backends::sqlite::SqliteTestDb;
use crate::error::Error;
use crate::options::Options;

/// Startup cost class of a backend, deciding whether it runs by default or
/// only when all backends are requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Speed {
    Fast,
    Slow,
}

struct RegistryEntry {
    speed: Speed,
    db: Box<dyn TestDatabase>,
}

/// The set of configured backends for one test suite.
///
/// Meant to be constructed once at the start of a test binary, initialized,
/// consumed through [`list`], and torn down at the end:
///
/// ```no_run
/// use testdbs::options::Options;
/// use testdbs::registry::Registry;
///
/// let options = Options::from_env();
/// let mut registry = Registry::new(&options);
/// registry.initialize(&options).unwrap();
/// for db in registry.list() {
///     let conn = db.conn().unwrap();
///     // run assertions against conn
/// }
/// registry.teardown_all().unwrap();
/// ```
///
/// [`list`]: Registry::list
pub struct Registry {
    entries: Vec<RegistryEntry>,
    active: Vec<usize>,
    initialized: bool,
}

impl Registry {
    /// The default backend set: sqlite as the fast backend, mysql and
    /// postgres as the slow opt-in ones.
    pub fn new(options: &Options) -> Self {
        let mut registry = Self::empty();
        registry.register(Speed::Fast, Box::new(SqliteTestDb::new(options.local_sqlite)));
        registry.register(Speed::Slow, Box::new(MysqlTestDb::new()));
        registry.register(Speed::Slow, Box::new(PostgresTestDb::new()));
        return registry;
    }

    /// A registry with no backends, to be filled via [`register`].
    ///
    /// [`register`]: Registry::register
    pub fn empty() -> Self {
        return Registry {
            entries: Vec::new(),
            active: Vec::new(),
            initialized: false,
        };
    }

    pub fn register(&mut self, speed: Speed, db: Box<dyn TestDatabase>) {
        self.entries.push(RegistryEntry { speed, db });
    }

    /// Selects the active backends for this run and initializes each of them
    /// in registration order. Fast backends always run; slow ones join when
    /// `options.all_dbs` is set, skipping any whose `db_type` is already
    /// active.
    pub fn initialize(&mut self, options: &Options) -> anyhow::Result<()> {
        let mut active: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.speed == Speed::Fast)
            .map(|(idx, _)| idx)
            .collect();
        if options.all_dbs {
            for (idx, entry) in self.entries.iter().enumerate() {
                let duplicate = active
                    .iter()
                    .any(|&a| self.entries[a].db.db_type() == entry.db.db_type());
                if entry.speed == Speed::Slow && !duplicate {
                    active.push(idx);
                }
            }
        }

        for &idx in &active {
            let db = &self.entries[idx].db;
            info!("initializing {} test database", db.db_type());
            db.init()
                .with_context(|| format!("Failed to initialize {} test database", db.db_type()))?;
        }
        self.active = active;
        self.initialized = true;
        return Ok(());
    }

    /// The active backends, in initialization order.
    ///
    /// # Panics
    ///
    /// When called before [`initialize`](Registry::initialize); that is a
    /// usage error in the owning test binary.
    pub fn list(&self) -> Vec<&dyn TestDatabase> {
        if !self.initialized {
            panic!("testdbs: Registry::list called before Registry::initialize");
        }
        return self
            .active
            .iter()
            .map(|&idx| self.entries[idx].db.as_ref())
            .collect();
    }

    /// Tears down every active backend, collecting all failures instead of
    /// stopping at the first. A failure here should fail the test run.
    pub fn teardown_all(&mut self) -> Result<(), Error> {
        let mut errors = Vec::new();
        for &idx in &self.active {
            let db = &self.entries[idx].db;
            info!("tearing down {} test database", db.db_type());
            if let Err(err) = db.close_all() {
                errors.push(err);
            }
        }
        return Error::aggregate(errors).map_or(Ok(()), Err);
    }
}
