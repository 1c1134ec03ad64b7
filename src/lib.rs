pub mod backends;
pub mod conn;
pub mod error;
pub mod name;
pub mod options;
pub mod registry;

use std::sync::{Mutex, MutexGuard};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    return mutex.lock().expect("testdbs lock poisoned");
}

/// Installs a fmt subscriber writing through the test capture writer. Safe to
/// call from every test; only the first call installs anything.
pub fn init_logging(level: tracing::Level) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_test_writer()
        .try_init();
}
