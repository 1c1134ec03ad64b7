mod common;

use testdbs::backends::TestDatabase;
use testdbs::backends::mysql::MysqlTestDb;

#[test]
#[ignore = "requires a running docker daemon"]
fn full_lifecycle() {
    common::init_logging();
    common::exercise_backend(&MysqlTestDb::new());
}

#[test]
#[ignore = "requires a running docker daemon"]
fn test_user_can_write_into_created_databases() {
    common::init_logging();
    let db = MysqlTestDb::new();

    // The sub-database is created as root but the handed-out connection runs
    // as the granted test user.
    let conn = db.conn_db_name("granted").unwrap();
    common::create_item_table(&conn);
    conn.execute("INSERT INTO item (id, name) VALUES (1, 'written as testuser')")
        .unwrap();
    assert_eq!(
        conn.query_first_string("SELECT name FROM item WHERE id = 1")
            .unwrap()
            .as_deref(),
        Some("written as testuser")
    );
    drop(conn);
    db.close_all().unwrap();
}
