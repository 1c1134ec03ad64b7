mod common;

use testdbs::backends::TestDatabase;
use testdbs::backends::postgres::PostgresTestDb;

#[test]
#[ignore = "requires a running docker daemon"]
fn full_lifecycle() {
    common::init_logging();
    common::exercise_backend(&PostgresTestDb::new());
}

#[test]
#[ignore = "requires a running docker daemon"]
fn repeated_create_of_the_same_database_is_tolerated() {
    common::init_logging();
    let db = PostgresTestDb::new();
    let conn = db.conn_db_name("custom").unwrap();
    common::create_item_table(&conn);
    drop(conn);

    // Evict the cached handle, then request the name again: the CREATE
    // DATABASE hits an existing database and must be treated as success.
    db.close("custom").unwrap();
    let conn = db.conn_db_name("custom").unwrap();
    assert_eq!(
        conn.query_first_string("SELECT name FROM item WHERE id = 1")
            .unwrap(),
        None
    );
    drop(conn);
    db.close_all().unwrap();
}
