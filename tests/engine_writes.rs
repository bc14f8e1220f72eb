//! Write paths through the engine: create defaults and validation, batch
//! inserts, unique keys (single and compound), update/upsert/delete, and
//! transactional rollback.

use conductor_data::{
    DataError, EngineConfig, FieldValue, Filter, InMemoryRepository, IsolationLevel, QueryEngine,
    RepositoryOps, Row, SchemaRegistry, WriteOp,
};
use std::sync::Arc;
use uuid::Uuid;

fn engine() -> QueryEngine<InMemoryRepository> {
    let schema = Arc::new(SchemaRegistry::platform());
    let repo = InMemoryRepository::new(schema.clone());
    QueryEngine::new(schema, repo, EngineConfig::default())
}

fn s(v: &str) -> FieldValue {
    FieldValue::String(v.to_string())
}

fn row(pairs: Vec<(&str, FieldValue)>) -> Row {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

fn id_of(r: &Row) -> Uuid {
    match r.get("id") {
        Some(FieldValue::Uuid(u)) => *u,
        other => panic!("row has no uuid id: {other:?}"),
    }
}

async fn seed_project(engine: &QueryEngine<InMemoryRepository>) -> Uuid {
    let user = engine
        .create("User", row(vec![("email", s("owner@conductor.dev"))]))
        .await
        .unwrap();
    let project = engine
        .create(
            "Project",
            row(vec![
                ("name", s("api-gateway")),
                ("owner_id", FieldValue::Uuid(id_of(&user))),
            ]),
        )
        .await
        .unwrap();
    id_of(&project)
}

fn file_row(project_id: Uuid, path: &str) -> Row {
    row(vec![
        ("path", s(path)),
        ("name", s(path.rsplit('/').next().unwrap())),
        ("size", FieldValue::Int(120)),
        ("checksum", s("abc123")),
        ("project_id", FieldValue::Uuid(project_id)),
    ])
}

#[tokio::test]
async fn test_create_fills_generated_columns_and_defaults() {
    let engine = engine();
    let user = engine
        .create("User", row(vec![("email", s("a@conductor.dev"))]))
        .await
        .unwrap();

    assert!(matches!(user.get("id"), Some(FieldValue::Uuid(_))));
    assert!(matches!(user.get("created_at"), Some(FieldValue::DateTime(_))));
    assert_eq!(user.get("role"), Some(&s("DEVELOPER")));
    assert_eq!(user.get("is_active"), Some(&FieldValue::Bool(true)));
    // Nullable field left out of the payload materializes as NULL.
    assert_eq!(user.get("name"), Some(&FieldValue::Null));
}

#[tokio::test]
async fn test_create_payload_validation() {
    let engine = engine();

    // Unknown field.
    let err = engine
        .create(
            "User",
            row(vec![("email", s("a@x.dev")), ("nickname", s("al"))]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::Schema { .. }));

    // Enum membership.
    let err = engine
        .create(
            "User",
            row(vec![("email", s("a@x.dev")), ("role", s("SUPERADMIN"))]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::Filter { .. }));

    // Null into a required column.
    let err = engine
        .create(
            "User",
            row(vec![("email", FieldValue::Null)]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::Filter { .. }));

    // Missing required column without a default.
    let err = engine.create("User", Row::new()).await.unwrap_err();
    let DataError::Filter { field, .. } = err else {
        panic!("expected filter error");
    };
    assert_eq!(field, "email");

    // Type mismatch.
    let err = engine
        .create(
            "User",
            row(vec![("email", s("a@x.dev")), ("is_active", s("yes"))]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::Filter { .. }));
}

#[tokio::test]
async fn test_single_unique_key_enforced() {
    let engine = engine();
    engine
        .create("User", row(vec![("email", s("dup@conductor.dev"))]))
        .await
        .unwrap();
    let err = engine
        .create("User", row(vec![("email", s("dup@conductor.dev"))]))
        .await
        .unwrap_err();
    let DataError::UniquenessViolation { fields, .. } = err else {
        panic!("expected uniqueness violation");
    };
    assert_eq!(fields, vec!["email".to_string()]);
}

#[tokio::test]
async fn test_compound_unique_key_scoped_per_project() {
    let engine = engine();
    let p1 = seed_project(&engine).await;
    let user = engine
        .find_unique("User", Filter::eq("email", "owner@conductor.dev"))
        .await
        .unwrap()
        .unwrap();
    let p2 = id_of(
        &engine
            .create(
                "Project",
                row(vec![
                    ("name", s("second")),
                    ("owner_id", id_of(&user).into()),
                ]),
            )
            .await
            .unwrap(),
    );

    engine
        .create("ProjectFile", file_row(p1, "src/main.rs"))
        .await
        .unwrap();
    // Same path in another project is fine.
    engine
        .create("ProjectFile", file_row(p2, "src/main.rs"))
        .await
        .unwrap();
    // Same (project_id, path) pair is not.
    let err = engine
        .create("ProjectFile", file_row(p1, "src/main.rs"))
        .await
        .unwrap_err();
    let DataError::UniquenessViolation { fields, .. } = err else {
        panic!("expected uniqueness violation");
    };
    assert_eq!(fields, vec!["project_id".to_string(), "path".to_string()]);
}

#[tokio::test]
async fn test_create_many_all_or_nothing() {
    let engine = engine();
    let project_id = seed_project(&engine).await;

    let batch = vec![
        file_row(project_id, "a.rs"),
        file_row(project_id, "b.rs"),
        file_row(project_id, "a.rs"),
    ];
    let err = engine
        .create_many("ProjectFile", batch.clone(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::UniquenessViolation { .. }));
    // The whole batch was rejected, including the valid rows.
    assert_eq!(engine.count("ProjectFile", None).await.unwrap(), 0);

    let inserted = engine
        .create_many("ProjectFile", batch, true)
        .await
        .unwrap();
    assert_eq!(inserted, 2);
    assert_eq!(engine.count("ProjectFile", None).await.unwrap(), 2);
}

#[tokio::test]
async fn test_update_returns_row_and_touches_updated_at() {
    let engine = engine();
    let created = engine
        .create("User", row(vec![("email", s("a@conductor.dev"))]))
        .await
        .unwrap();

    let updated = engine
        .update(
            "User",
            Filter::eq("email", "a@conductor.dev"),
            row(vec![("name", s("Alex"))]),
        )
        .await
        .unwrap();
    assert_eq!(updated.get("name"), Some(&s("Alex")));
    assert_ne!(updated.get("updated_at"), created.get("updated_at"));

    // Rewriting the unique field the filter keys on still returns the row.
    let moved = engine
        .update(
            "User",
            Filter::eq("email", "a@conductor.dev"),
            row(vec![("email", s("b@conductor.dev"))]),
        )
        .await
        .unwrap();
    assert_eq!(moved.get("email"), Some(&s("b@conductor.dev")));

    let err = engine
        .update(
            "User",
            Filter::eq("email", "gone@conductor.dev"),
            row(vec![("name", s("x"))]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::NotFound { .. }));

    // Non-unique filters are rejected; update_many is the bulk path.
    let err = engine
        .update(
            "User",
            Filter::eq("name", "Alex"),
            row(vec![("name", s("y"))]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::Filter { .. }));
}

#[tokio::test]
async fn test_update_many_counts_affected_rows() {
    let engine = engine();
    for email in ["a@x.dev", "b@x.dev", "c@x.dev"] {
        engine
            .create("User", row(vec![("email", s(email))]))
            .await
            .unwrap();
    }
    let affected = engine
        .update_many(
            "User",
            Filter::ne("email", "c@x.dev"),
            row(vec![("is_active", FieldValue::Bool(false))]),
        )
        .await
        .unwrap();
    assert_eq!(affected, 2);
    let inactive = engine
        .count("User", Some(Filter::eq("is_active", false)))
        .await
        .unwrap();
    assert_eq!(inactive, 2);
}

#[tokio::test]
async fn test_upsert_creates_then_updates() {
    let engine = engine();
    let unique = Filter::eq("email", "ops@conductor.dev");

    let first = engine
        .upsert(
            "User",
            unique.clone(),
            row(vec![("email", s("ops@conductor.dev")), ("name", s("Ops"))]),
            row(vec![("name", s("Ops Updated"))]),
        )
        .await
        .unwrap();
    assert_eq!(first.get("name"), Some(&s("Ops")));

    let second = engine
        .upsert(
            "User",
            unique.clone(),
            row(vec![("email", s("ops@conductor.dev")), ("name", s("Ops"))]),
            row(vec![("name", s("Ops Updated"))]),
        )
        .await
        .unwrap();
    assert_eq!(second.get("name"), Some(&s("Ops Updated")));
    assert_eq!(id_of(&first), id_of(&second));
    assert_eq!(engine.count("User", None).await.unwrap(), 1);
}

#[tokio::test]
async fn test_delete_returns_removed_row() {
    let engine = engine();
    engine
        .create("User", row(vec![("email", s("gone@conductor.dev"))]))
        .await
        .unwrap();

    let removed = engine
        .delete("User", Filter::eq("email", "gone@conductor.dev"))
        .await
        .unwrap();
    assert_eq!(removed.get("email"), Some(&s("gone@conductor.dev")));
    assert_eq!(engine.count("User", None).await.unwrap(), 0);

    let err = engine
        .delete("User", Filter::eq("email", "gone@conductor.dev"))
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::NotFound { .. }));
}

#[tokio::test]
async fn test_delete_many_counts() {
    let engine = engine();
    let project_id = seed_project(&engine).await;
    for path in ["a.rs", "b.rs", "c.md"] {
        engine
            .create("ProjectFile", file_row(project_id, path))
            .await
            .unwrap();
    }
    let removed = engine
        .delete_many("ProjectFile", Filter::contains("path", ".rs"))
        .await
        .unwrap();
    assert_eq!(removed, 2);
    assert_eq!(engine.count("ProjectFile", None).await.unwrap(), 1);
}

#[tokio::test]
async fn test_transaction_rollback_discards_writes() {
    let engine = engine();
    let project_id = seed_project(&engine).await;

    let result: Result<(), DataError> = engine
        .with_transaction(IsolationLevel::Serializable, |tx| {
            Box::pin(async move {
                tx.execute_write(
                    "ProjectFile",
                    WriteOp::Create {
                        data: file_row(project_id, "tmp.rs"),
                    },
                )
                .await?;
                Err(DataError::Transaction("forced failure".to_string()))
            })
        })
        .await;
    assert!(result.is_err());
    assert_eq!(engine.count("ProjectFile", None).await.unwrap(), 0);

    engine
        .with_transaction(IsolationLevel::Serializable, |tx| {
            Box::pin(async move {
                tx.execute_write(
                    "ProjectFile",
                    WriteOp::Create {
                        data: file_row(project_id, "kept.rs"),
                    },
                )
                .await?;
                Ok(())
            })
        })
        .await
        .unwrap();
    assert_eq!(engine.count("ProjectFile", None).await.unwrap(), 1);

    // Reads inside an open transaction see its own writes.
    let seen = engine
        .with_transaction(IsolationLevel::ReadCommitted, |tx| {
            Box::pin(async move {
                tx.execute_write(
                    "ProjectFile",
                    WriteOp::Create {
                        data: file_row(project_id, "own-write.rs"),
                    },
                )
                .await?;
                tx.execute_count("ProjectFile", None).await
            })
        })
        .await
        .unwrap();
    assert_eq!(seen, 2);
}

#[tokio::test]
async fn test_write_payload_preserves_json_tri_state() {
    let engine = engine();
    let user = engine
        .create("User", row(vec![("email", s("dev@x.dev"))]))
        .await
        .unwrap();
    let session = engine
        .create(
            "Session",
            row(vec![
                ("session_id", s("sess-1")),
                ("data", FieldValue::Json(serde_json::json!({"theme": "dark"}))),
                ("expires_at", FieldValue::DateTime(chrono::Utc::now())),
                ("user_id", FieldValue::Uuid(id_of(&user))),
            ]),
        )
        .await
        .unwrap();

    // Absent key: the stored document is untouched.
    engine
        .update(
            "Session",
            Filter::eq("session_id", "sess-1"),
            row(vec![("expires_at", FieldValue::DateTime(chrono::Utc::now()))]),
        )
        .await
        .unwrap();
    let after = engine
        .find_unique_or_throw("Session", Filter::eq("session_id", "sess-1"))
        .await
        .unwrap();
    assert_eq!(after.get("data"), session.get("data"));

    // Writing a JSON literal null is distinct from writing relational NULL.
    engine
        .update(
            "Session",
            Filter::eq("session_id", "sess-1"),
            row(vec![("data", FieldValue::Json(serde_json::Value::Null))]),
        )
        .await
        .unwrap();
    assert_eq!(
        engine
            .count(
                "Session",
                Some(Filter::json_null("data", conductor_data::JsonNullFilter::JsonNull))
            )
            .await
            .unwrap(),
        1
    );

    engine
        .update(
            "Session",
            Filter::eq("session_id", "sess-1"),
            row(vec![("data", FieldValue::Null)]),
        )
        .await
        .unwrap();
    assert_eq!(
        engine
            .count(
                "Session",
                Some(Filter::json_null("data", conductor_data::JsonNullFilter::DbNull))
            )
            .await
            .unwrap(),
        1
    );
}
