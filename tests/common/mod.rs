#![allow(dead_code)]

use testdbs::backends::TestDatabase;
use testdbs::conn::TestConn;
use testdbs::error::Error;

pub fn init_logging() {
    testdbs::init_logging(tracing::Level::DEBUG);
}

pub fn create_item_table(conn: &TestConn) {
    conn.execute("CREATE TABLE item (id INTEGER PRIMARY KEY, name TEXT)")
        .expect("Failed to create test table");
}

const SELECT_FIRST_ITEM: &str = "SELECT name FROM item WHERE id = 1";

/// Runs the lifecycle every backend has to support: idempotent init, cache
/// hits for repeated and normalized names, isolation between names, not-found
/// on closing unknown names, and teardown.
pub fn exercise_backend(db: &dyn TestDatabase) {
    db.init().expect("Failed to initialize backend");
    db.init().expect("Second init must be a no-op");

    let conn = db.conn_db_name("custom").unwrap();
    create_item_table(&conn);
    conn.execute("INSERT INTO item (id, name) VALUES (1, 'sample item')")
        .unwrap();

    // A second request for the same logical name must return the cached
    // handle into the same sub-database.
    let again = db.conn_db_name("custom").unwrap();
    assert_eq!(
        again.query_first_string(SELECT_FIRST_ITEM).unwrap().as_deref(),
        Some("sample item")
    );

    // Normalization maps to the same cache entry.
    let normalized = db.conn_db_name("Custom.").unwrap();
    assert_eq!(
        normalized
            .query_first_string(SELECT_FIRST_ITEM)
            .unwrap()
            .as_deref(),
        Some("sample item")
    );

    // A different logical name must not see rows written under "custom".
    let other = db.conn_db_name("custom2").unwrap();
    create_item_table(&other);
    assert_eq!(other.query_first_string(SELECT_FIRST_ITEM).unwrap(), None);

    // Names that survive normalization but are not valid as bare SQL
    // identifiers: a dash and a leading digit. Provisioning quotes them.
    for name in ["my-db", "2nd"] {
        let conn = db.conn_db_name(name).unwrap();
        create_item_table(&conn);
        conn.execute("INSERT INTO item (id, name) VALUES (1, 'quoted name')")
            .unwrap();
        assert_eq!(
            conn.query_first_string(SELECT_FIRST_ITEM).unwrap().as_deref(),
            Some("quoted name")
        );
        db.close(name).unwrap();
    }

    let err = db.close("never-opened").unwrap_err();
    assert!(matches!(err, Error::NotFound(_)), "got {err:?}");

    // The failed close must not have evicted anything.
    db.close("custom2").unwrap();
    db.close("custom").unwrap();

    db.close_all().expect("Failed to tear the backend down");
}
