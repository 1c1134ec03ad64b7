use crate::conn::TestConn;
use crate::error::Error;
use crate::name::{DEFAULT_DB_NAME, normalize_db_name};

pub mod mysql;
pub mod postgres;
pub mod sqlite;

/// One kind of test database backend.
///
/// A backend owns at most one underlying server process (or working directory
/// for the file-based kind) and a cache of connections into isolated
/// sub-databases, keyed by normalized logical name. Fixtures are shared
/// between concurrently running tests, hence the `&self` methods and the
/// `Send + Sync` bound.
pub trait TestDatabase: Send + Sync {
    /// Backend discriminator: `"sqlite"`, `"postgres"` or `"mysql"`.
    fn db_type(&self) -> &'static str;

    /// Provisions the backing server or working directory. Idempotent: the
    /// first call does the work, later calls (including concurrent ones)
    /// return once the backend is ready. Called again after [`close_all`]
    /// it provisions a fresh instance.
    ///
    /// [`close_all`]: TestDatabase::close_all
    fn init(&self) -> anyhow::Result<()>;

    /// Connection to the default database, shorthand for
    /// `conn_db_name(DEFAULT_DB_NAME)`.
    fn conn(&self) -> anyhow::Result<TestConn> {
        return self.conn_db_name(DEFAULT_DB_NAME);
    }

    /// Connection to the sub-database for the given logical name, creating it
    /// on first request. Repeated calls with the same name return the same
    /// cached handle.
    fn conn_db_name(&self, name: &str) -> anyhow::Result<TestConn>;

    /// Evicts exactly one cached connection. [`Error::NotFound`] if the name
    /// was never opened; other cached names are unaffected.
    fn close(&self, name: &str) -> Result<(), Error>;

    /// Drops every cached connection, then tears the backend down (server
    /// termination, or working-directory removal for the file-based kind).
    /// Individual failures are aggregated instead of short-circuiting.
    fn close_all(&self) -> Result<(), Error>;
}

/// Lifecycle of a backend instance. There is no explicit "initializing"
/// variant: that phase is the time the state lock is held while provisioning,
/// which also serializes concurrent first access.
pub(crate) enum State<S> {
    Uninitialized,
    Ready(S),
    Closed,
}

/// Cache key for a logical name: normalized, with the default name standing
/// in for an empty result.
pub(crate) fn target_db_name(name: &str) -> String {
    let name = normalize_db_name(name);
    if name.is_empty() {
        return DEFAULT_DB_NAME.to_string();
    }
    return name;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_names_fall_back_to_the_default() {
        assert_eq!(target_db_name(""), DEFAULT_DB_NAME);
        assert_eq!(target_db_name("./.."), DEFAULT_DB_NAME);
        assert_eq!(target_db_name("Custom Name"), "customname");
    }
}
