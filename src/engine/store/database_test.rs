use tempfile::tempdir;

use super::database::{Database, StoreOptions};
use super::tenant::Tenant;
use crate::engine::errors::EngineError;

fn tenant(name: &str) -> Tenant {
    Tenant::parse(name).unwrap()
}

#[test]
fn unknown_tenant_is_rejected_before_running_sql() {
    let db = Database::in_memory().unwrap();
    let err = db
        .with_tenant(&tenant("ghost"), |_| Ok(()))
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownTenant(ref t) if t == "ghost"));
}

#[test]
fn ensure_schema_existence_is_idempotent() {
    let db = Database::in_memory().unwrap();
    let acme = tenant("acme");

    db.ensure_schema_existence(&acme).unwrap();
    db.ensure_schema_existence(&acme).unwrap();

    assert!(db.has_schema(&acme).unwrap());
    assert_eq!(db.tenants().unwrap(), vec!["acme".to_string()]);
}

#[test]
fn tenants_get_separate_namespaces() {
    let db = Database::in_memory().unwrap();
    let (acme, globex) = (tenant("acme"), tenant("globex"));
    for t in [&acme, &globex] {
        db.ensure_schema_existence(t).unwrap();
        db.with_tenant(t, |conn| {
            conn.execute_batch(&format!("CREATE TABLE {}.notes (body TEXT)", t.schema()))?;
            Ok(())
        })
        .unwrap();
    }

    db.with_tenant(&acme, |conn| {
        conn.execute(&format!("INSERT INTO {} VALUES ('hello')", acme.table("notes")), [])?;
        Ok(())
    })
    .unwrap();

    let count = |t: &Tenant| -> i64 {
        db.with_tenant(t, |conn| {
            Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {}", t.table("notes")), [], |r| r.get(0))?)
        })
        .unwrap()
    };
    assert_eq!(count(&acme), 1);
    assert_eq!(count(&globex), 0);
}

#[test]
fn failed_transaction_rolls_back() {
    let db = Database::in_memory().unwrap();
    let acme = tenant("acme");
    db.ensure_schema_existence(&acme).unwrap();
    db.with_tenant(&acme, |conn| {
        conn.execute_batch(&format!("CREATE TABLE {}.notes (body TEXT NOT NULL)", acme.schema()))?;
        Ok(())
    })
    .unwrap();

    let result = db.with_tenant_tx(&acme, |conn| {
        conn.execute(&format!("INSERT INTO {} VALUES ('kept?')", acme.table("notes")), [])?;
        conn.execute(&format!("INSERT INTO {} VALUES (NULL)", acme.table("notes")), [])?;
        Ok(())
    });
    assert!(matches!(result, Err(EngineError::Constraint(_))));

    let rows: i64 = db
        .with_tenant(&acme, |conn| {
            Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {}", acme.table("notes")), [], |r| r.get(0))?)
        })
        .unwrap();
    assert_eq!(rows, 0);
}

#[test]
fn constraint_errors_keep_the_engine_message() {
    let db = Database::in_memory().unwrap();
    let acme = tenant("acme");
    db.ensure_schema_existence(&acme).unwrap();

    let err = db
        .with_tenant(&acme, |conn| {
            conn.execute_batch(&format!(
                "CREATE TABLE {}.notes (id INTEGER, CONSTRAINT uniq_notes_id UNIQUE (id));",
                acme.schema()
            ))?;
            conn.execute(&format!("INSERT INTO {} VALUES (1)", acme.table("notes")), [])?;
            conn.execute(&format!("INSERT INTO {} VALUES (1)", acme.table("notes")), [])?;
            Ok(())
        })
        .unwrap_err();

    assert!(err.is_constraint());
    assert!(err.to_string().contains("UNIQUE constraint failed: notes.id"), "{err}");
}

#[test]
fn file_backed_tenants_persist_across_reopen() {
    let dir = tempdir().unwrap();
    let options = StoreOptions {
        data_dir: Some(dir.path().to_path_buf()),
        ..StoreOptions::default()
    };
    let acme = tenant("acme");

    {
        let db = Database::open(options.clone()).unwrap();
        db.ensure_schema_existence(&acme).unwrap();
        db.with_tenant(&acme, |conn| {
            conn.execute_batch(&format!(
                "CREATE TABLE {}.notes (body TEXT); INSERT INTO {} VALUES ('persisted');",
                acme.schema(),
                acme.table("notes")
            ))?;
            Ok(())
        })
        .unwrap();
    }

    assert!(dir.path().join("acme.db").exists());

    let db = Database::open(options).unwrap();
    let body: String = db
        .with_tenant(&acme, |conn| {
            Ok(conn.query_row(&format!("SELECT body FROM {}", acme.table("notes")), [], |r| r.get(0))?)
        })
        .unwrap();
    assert_eq!(body, "persisted");
}

#[test]
fn reopen_attaches_every_tenant_file_in_data_dir() {
    let dir = tempdir().unwrap();
    let options = StoreOptions {
        data_dir: Some(dir.path().to_path_buf()),
        ..StoreOptions::default()
    };

    {
        let db = Database::open(options.clone()).unwrap();
        for name in ["beta", "acme"] {
            let t = tenant(name);
            db.ensure_schema_existence(&t).unwrap();
            db.with_tenant(&t, |conn| {
                conn.execute_batch(&format!(
                    "CREATE TABLE {}.notes (body TEXT); INSERT INTO {} VALUES ('{name}');",
                    t.schema(),
                    t.table("notes")
                ))?;
                Ok(())
            })
            .unwrap();
        }
    }
    std::fs::write(dir.path().join("Not-A-Tenant.db"), b"").unwrap();
    std::fs::write(dir.path().join("notes.txt"), b"").unwrap();

    let db = Database::open(options).unwrap();
    assert_eq!(db.tenants().unwrap(), vec!["acme".to_string(), "beta".to_string()]);

    let beta = tenant("beta");
    let body: String = db
        .with_tenant(&beta, |conn| {
            Ok(conn.query_row(&format!("SELECT body FROM {}", beta.table("notes")), [], |r| r.get(0))?)
        })
        .unwrap();
    assert_eq!(body, "beta");
}

#[test]
fn more_tenants_than_sqlite_attach_limit() {
    let db = Database::in_memory().unwrap();
    let tenants: Vec<Tenant> = (0..15).map(|n| tenant(&format!("tenant_{n}"))).collect();

    for t in &tenants {
        db.ensure_schema_existence(t).unwrap();
        db.with_tenant(t, |conn| {
            conn.execute_batch(&format!(
                "CREATE TABLE {}.notes (body TEXT); INSERT INTO {} VALUES ('{}');",
                t.schema(),
                t.table("notes"),
                t.as_str()
            ))?;
            Ok(())
        })
        .unwrap();
    }

    assert_eq!(db.tenants().unwrap().len(), 15);
    for t in &tenants {
        let body: String = db
            .with_tenant(t, |conn| {
                Ok(conn.query_row(&format!("SELECT body FROM {}", t.table("notes")), [], |r| r.get(0))?)
            })
            .unwrap();
        assert_eq!(body, t.as_str());
    }
}
