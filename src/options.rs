use clap::Parser;
use clap::builder::FalseyValueParser;

/// Run-mode switches for a test suite using this crate.
///
/// Suites that own their command line can parse these with clap; the
/// environment variables cover harnesses that cannot (`cargo test` swallows
/// unknown flags passed to the test binary on stable).
#[derive(Parser, Clone, Debug, Default)]
#[command(name = "testdbs", about = "test database fixtures", long_about = None)]
pub struct Options {
    /// Run against every configured backend, including the slow-to-start
    /// container ones
    #[arg(long, env = "TESTDBS_ALL", value_parser = FalseyValueParser::new())]
    pub all_dbs: bool,

    /// Create sqlite database files in ./testdbs_sqlite instead of a fresh
    /// temporary directory
    #[arg(long, env = "SQLITE_LOCAL_DIR", value_parser = FalseyValueParser::new())]
    pub local_sqlite: bool,
}

impl Options {
    /// Builds options from the environment alone. Presence of the variable
    /// counts, whatever its value, matching the original flag semantics.
    pub fn from_env() -> Self {
        return Options {
            all_dbs: std::env::var_os("TESTDBS_ALL").is_some(),
            local_sqlite: std::env::var_os("SQLITE_LOCAL_DIR").is_some(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_fast_only() {
        let options = Options::default();
        assert!(!options.all_dbs);
        assert!(!options.local_sqlite);
    }

    #[test]
    fn parses_flags() {
        let options = Options::parse_from(["testdbs", "--all-dbs"]);
        assert!(options.all_dbs);
        assert!(!options.local_sqlite);
    }

    #[test]
    fn env_values_are_read_leniently() {
        // Whatever value the variable carries counts as set, like the
        // original presence check; only falsey values ("", "0", "false")
        // leave the flag off.
        unsafe { std::env::set_var("TESTDBS_ALL", "1") };
        assert!(Options::parse_from(["testdbs"]).all_dbs);

        unsafe { std::env::set_var("TESTDBS_ALL", "0") };
        assert!(!Options::parse_from(["testdbs"]).all_dbs);

        unsafe { std::env::remove_var("TESTDBS_ALL") };
        assert!(!Options::parse_from(["testdbs"]).all_dbs);
    }
}
