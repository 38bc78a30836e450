#![allow(clippy::unwrap_used, clippy::expect_used)]

mod util;

use std::sync::Arc;

use tempfile::tempdir;

use clientdesk_lib::{
    model::{
        Assignment, AuditAction, ClientDraft, ClientFilter, ClientStatus, EmployeeFilter,
        NewClient, Role,
    },
    mutations::MutationOrchestrator,
    store::{ClientStore, SqliteStore},
    sync::{ClientView, ListSynchronizer},
};

use util::{employee, sqlite_store};

#[tokio::test]
async fn insert_returns_stored_row_with_new_id() -> anyhow::Result<()> {
    let store = sqlite_store().await;
    let draft = ClientDraft::new("Jo", "Acme", "1 Main St");

    let first = store.insert_client(&NewClient::ongoing(&draft, "u-1")).await?;
    let second = store.insert_client(&NewClient::ongoing(&draft, "u-1")).await?;

    assert!(first.id > 0);
    assert_ne!(first.id, second.id);
    assert_eq!(first.status, ClientStatus::Ongoing);
    assert!(first.created_at > 0);
    Ok(())
}

#[tokio::test]
async fn update_of_missing_row_is_not_found() -> anyhow::Result<()> {
    let store = sqlite_store().await;
    let err = store
        .update_client(41, &ClientDraft::new("a", "b", "c"))
        .await
        .expect_err("no such client");
    assert_eq!(err.code(), "SQLX/ROW_NOT_FOUND");
    Ok(())
}

#[tokio::test]
async fn assignment_batch_rolls_back_on_unknown_employee() -> anyhow::Result<()> {
    let store = sqlite_store().await;
    store
        .upsert_employee(&employee("emp-1", "Sam Carter", Role::Employee, true))
        .await?;
    let client = store
        .insert_client(&NewClient::ongoing(&ClientDraft::new("Jo", "Acme", "1 Main St"), "u-1"))
        .await?;

    let batch = vec![
        Assignment {
            client_id: client.id,
            employee_id: "emp-1".into(),
        },
        Assignment {
            client_id: client.id,
            employee_id: "ghost".into(),
        },
    ];
    let err = store.insert_assignments(&batch).await.expect_err("fk violation");
    assert!(err.code().starts_with("Sqlite/"), "{err}");

    let stored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM client_assignments")
        .fetch_one(store.pool())
        .await?;
    assert_eq!(stored, 0);

    store.insert_assignments(&batch[..1]).await?;
    let clients = store.select_clients(&ClientFilter::all()).await?;
    assert_eq!(clients[0].assignments, vec!["emp-1"]);
    Ok(())
}

#[tokio::test]
async fn employee_filter_honours_role_and_activity() -> anyhow::Result<()> {
    let store = sqlite_store().await;
    for emp in [
        employee("f-1", "Zed", Role::FinanceEmployee, true),
        employee("f-2", "Amy", Role::FinanceEmployee, false),
        employee("e-1", "Bob", Role::Employee, false),
    ] {
        store.upsert_employee(&emp).await?;
    }

    let finance = store
        .select_employees(&EmployeeFilter {
            role: Role::FinanceEmployee,
            active_only: true,
        })
        .await?;
    assert_eq!(finance.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(), vec!["f-1"]);

    let staff = store
        .select_employees(&EmployeeFilter {
            role: Role::Employee,
            active_only: false,
        })
        .await?;
    assert_eq!(staff.len(), 1);
    assert!(!staff[0].is_active);
    Ok(())
}

#[tokio::test]
async fn create_saga_writes_audit_and_notification_rows() -> anyhow::Result<()> {
    let store = sqlite_store().await;
    let sync = Arc::new(ListSynchronizer::new(store.clone(), ClientView::All));
    let orchestrator = MutationOrchestrator::new(store.clone(), store.clone(), sync.clone());

    let outcome = orchestrator
        .create_client(&ClientDraft::new("Acme Corp Contact", "Acme Corp", "1 Main St"), "u-3")
        .await?;
    orchestrator
        .edit_client(outcome.client.id, &ClientDraft::new("Acme", "Acme Corp", "1 Main St"), "u-4")
        .await?;

    let audit = store.audit_entries().await?;
    assert_eq!(audit.len(), 2);
    assert_eq!(audit[0].action, AuditAction::ClientAdded);
    assert_eq!(audit[0].client_name, "Acme Corp Contact");
    assert_eq!(audit[1].action, AuditAction::ClientUpdated);
    assert_eq!(audit[1].actor_id, "u-4");

    let notes = store.notifications_for("u-3").await?;
    assert_eq!(notes.len(), 1);
    assert_eq!(
        notes[0].description,
        "A new client \"Acme Corp Contact\" from Acme Corp has been created."
    );
    assert!(store.notifications_for("u-4").await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn reopening_a_file_database_keeps_rows() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("nested").join("clients.sqlite3");

    let store = SqliteStore::open(&path).await?;
    store
        .insert_client(&NewClient::ongoing(&ClientDraft::new("Jo", "Acme", "1 Main St"), "u-1"))
        .await?;
    store.pool().close().await;

    let reopened = SqliteStore::open(&path).await?;
    let clients = reopened.select_clients(&ClientFilter::all()).await?;
    assert_eq!(clients.len(), 1);
    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_migrations")
        .fetch_one(reopened.pool())
        .await?;
    assert_eq!(applied as usize, clientdesk_lib::migrate::known_versions().count());
    Ok(())
}
