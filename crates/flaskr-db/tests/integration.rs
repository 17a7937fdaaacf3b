use flaskr_db::{
    initialize_schema, parse_timestamp, ConnectionSettings, ConnectionSlot, DbError, Resources,
    SlotState, Value, SCHEMA_RESOURCE,
};
use std::sync::Arc;

fn slot_with_schema(schema: &str) -> (tempfile::TempDir, ConnectionSlot, Resources) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    std::fs::write(dir.path().join(SCHEMA_RESOURCE), schema).expect("failed to write schema");
    let settings = ConnectionSettings::new(dir.path().join("flaskr.sqlite"));
    let slot = ConnectionSlot::new(Arc::new(settings));
    let resources = Resources::new(dir.path());
    (dir, slot, resources)
}

#[test]
fn duplicate_username_violates_uniqueness() {
    let (_dir, mut slot, resources) = slot_with_schema(
        "CREATE TABLE user (id INTEGER PRIMARY KEY, username TEXT UNIQUE NOT NULL);",
    );
    initialize_schema(&mut slot, &resources).expect("failed to initialize schema");

    let db = slot.acquire().expect("failed to acquire connection");
    db.execute("INSERT INTO user (username) VALUES (?1)", ["alice"])
        .expect("first insert should succeed");

    let err = db
        .execute("INSERT INTO user (username) VALUES (?1)", ["alice"])
        .expect_err("duplicate insert should fail");
    assert!(err.is_unique_violation(), "unexpected error: {err:?}");
}

#[test]
fn timestamp_round_trips_through_storage() {
    let (_dir, mut slot, resources) =
        slot_with_schema("CREATE TABLE post (id INTEGER PRIMARY KEY, created TIMESTAMP NOT NULL);");
    initialize_schema(&mut slot, &resources).expect("failed to initialize schema");

    let inputs = [
        "2024-03-01 12:30:00",
        "2024-03-01T12:30:00.250",
        "2024-03-01",
        "2024-03-01T12:30:00+05:30",
        "2024-03-01T12",
        "2024-03-01T12:30:00+05:30:15",
        "20240301T123000",
    ];

    let db = slot.acquire().expect("failed to acquire connection");
    for input in inputs {
        db.execute("INSERT INTO post (created) VALUES (?1)", [input])
            .expect("failed to insert");
    }

    let rows = db
        .query("SELECT created FROM post ORDER BY id", [])
        .expect("failed to query");
    assert_eq!(rows.len(), inputs.len());
    for (row, input) in rows.iter().zip(inputs) {
        let expected = parse_timestamp(input).expect("input should parse");
        assert_eq!(row["created"], expected, "round trip of {input}");
    }
}

#[test]
fn default_timestamp_column_decodes() {
    let (_dir, mut slot, resources) = slot_with_schema(
        "CREATE TABLE post (id INTEGER PRIMARY KEY, created TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP);",
    );
    initialize_schema(&mut slot, &resources).expect("failed to initialize schema");

    let db = slot.acquire().expect("failed to acquire connection");
    db.execute("INSERT INTO post DEFAULT VALUES", [])
        .expect("failed to insert");
    let row = db
        .query_one("SELECT created FROM post", [])
        .expect("failed to query")
        .expect("expected one row");
    assert!(matches!(row["created"], Value::DateTime(_)), "got {:?}", row["created"]);
}

#[test]
fn bootstrap_against_unopenable_path_fails() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let settings = ConnectionSettings::new(dir.path().join("no-such-dir").join("flaskr.sqlite"));
    let mut slot = ConnectionSlot::new(Arc::new(settings));

    let err = initialize_schema(&mut slot, &Resources::new(dir.path()))
        .expect_err("bootstrap should fail");
    assert!(matches!(err, DbError::Open { .. }), "unexpected error: {err:?}");
    assert_eq!(slot.state(), SlotState::Empty);
}
