#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! Integration tests for `PortfolioDb`: byte round-trips, migrations,
//! and the baseline schema constraints.

use folio_vault::db::{PortfolioDb, SQLITE_HEADER};
use folio_vault::VaultError;

fn seeded() -> PortfolioDb {
    let db = PortfolioDb::open_empty().expect("open should succeed");
    db.connection()
        .execute_batch(
            "INSERT INTO accounts (id, name) VALUES ('acc', 'Checking');
             INSERT INTO categories (id, name) VALUES ('cat', 'Rent');
             INSERT INTO transactions (id, account_id, category_id, amount, date, payee)
                 VALUES ('t1', 'acc', 'cat', -120000, '2024-03-01', 'Landlord');",
        )
        .expect("seed should succeed");
    db
}

fn count(db: &PortfolioDb, table: &str) -> i64 {
    db.connection()
        .query_row(&format!("SELECT count(*) FROM {table}"), [], |r| r.get(0))
        .unwrap()
}

// -------------------------------------------------------------------------
// Serialization
// -------------------------------------------------------------------------

#[test]
fn serialized_bytes_are_a_sqlite_file() {
    let bytes = seeded().to_bytes().unwrap();
    assert!(bytes.starts_with(SQLITE_HEADER));
}

#[test]
fn roundtrip_preserves_rows_and_version() {
    let bytes = seeded().to_bytes().unwrap();
    let db = PortfolioDb::from_bytes(&bytes).unwrap();

    assert_eq!(count(&db, "accounts"), 1);
    assert_eq!(count(&db, "transactions"), 1);
    assert_eq!(db.schema_version().unwrap(), 1);

    let (amount, payee): (i64, String) = db
        .connection()
        .query_row(
            "SELECT amount, payee FROM transactions WHERE id = 't1'",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .unwrap();
    assert_eq!(amount, -120_000);
    assert_eq!(payee, "Landlord");
}

#[test]
fn repeated_roundtrips_are_stable() {
    let mut bytes = seeded().to_bytes().unwrap();
    for _ in 0..3 {
        bytes = PortfolioDb::from_bytes(&bytes).unwrap().to_bytes().unwrap();
    }
    let db = PortfolioDb::from_bytes(&bytes).unwrap();
    assert_eq!(count(&db, "categories"), 1);
}

#[test]
fn truncated_header_is_rejected() {
    let bytes = seeded().to_bytes().unwrap();
    let result = PortfolioDb::from_bytes(&bytes[..10]);
    assert!(matches!(result, Err(VaultError::EngineInitFailed(_))));
}

// -------------------------------------------------------------------------
// Schema constraints
// -------------------------------------------------------------------------

#[test]
fn foreign_keys_are_enforced_after_reload() {
    let bytes = seeded().to_bytes().unwrap();
    let db = PortfolioDb::from_bytes(&bytes).unwrap();

    let orphan = db.connection().execute(
        "INSERT INTO transactions (id, account_id, amount, date, payee)
             VALUES ('t2', 'missing', 1, '2024-03-02', 'Nobody')",
        [],
    );
    assert!(orphan.is_err());
}

#[test]
fn deleting_account_cascades_to_transactions() {
    let db = seeded();
    db.connection()
        .execute("DELETE FROM accounts WHERE id = 'acc'", [])
        .unwrap();
    assert_eq!(count(&db, "transactions"), 0);
}

#[test]
fn deleting_category_nulls_reference() {
    let db = seeded();
    db.connection()
        .execute("DELETE FROM categories WHERE id = 'cat'", [])
        .unwrap();
    let category: Option<String> = db
        .connection()
        .query_row(
            "SELECT category_id FROM transactions WHERE id = 't1'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert!(category.is_none());
}

#[test]
fn lifecycle_timestamps_default() {
    let db = PortfolioDb::open_empty().unwrap();
    db.connection()
        .execute("INSERT INTO imports (id) VALUES ('imp')", [])
        .unwrap();
    let created: i64 = db
        .connection()
        .query_row("SELECT created_at FROM imports", [], |r| r.get(0))
        .unwrap();
    assert!(created > 1_600_000_000);
}
