//! Seams to the remote data store and the audit/notification sink.
//!
//! Both are external collaborators: the core only depends on these traits. The
//! SQLite adapter backs the CLI, the in-memory adapter backs tests.

use async_trait::async_trait;

use crate::{
    model::{
        Assignment, AuditAction, AuditLogEntry, Client, ClientDraft, ClientFilter, ClientId,
        Employee, EmployeeFilter, NewClient, NewNotification, Notification,
    },
    AppResult,
};

pub mod memory;
pub mod sqlite;

pub use memory::{MemoryStore, StoreOp};
pub use sqlite::SqliteStore;

#[async_trait]
pub trait ClientStore: Send + Sync {
    /// Clients matching `filter`, each with its assignment employee ids attached.
    async fn select_clients(&self, filter: &ClientFilter) -> AppResult<Vec<Client>>;

    async fn select_employees(&self, filter: &EmployeeFilter) -> AppResult<Vec<Employee>>;

    /// Inserts one client and returns the stored row, including its new id.
    async fn insert_client(&self, row: &NewClient) -> AppResult<Client>;

    /// Overwrites name, company and address of `id` and returns the stored row.
    async fn update_client(&self, id: ClientId, patch: &ClientDraft) -> AppResult<Client>;

    /// Inserts the batch atomically: either every row is stored or none is.
    async fn insert_assignments(&self, rows: &[Assignment]) -> AppResult<()>;
}

#[async_trait]
pub trait ActivitySink: Send + Sync {
    async fn append_audit(&self, entry: &AuditLogEntry) -> AppResult<()>;

    async fn create_notification(&self, notification: &NewNotification)
        -> AppResult<Notification>;

    async fn log_client_added(
        &self,
        actor_id: &str,
        client_id: ClientId,
        name: &str,
    ) -> AppResult<()> {
        self.append_audit(&AuditLogEntry {
            actor_id: actor_id.to_string(),
            client_id,
            client_name: name.to_string(),
            action: AuditAction::ClientAdded,
        })
        .await
    }

    async fn log_client_updated(
        &self,
        actor_id: &str,
        client_id: ClientId,
        name: &str,
    ) -> AppResult<()> {
        self.append_audit(&AuditLogEntry {
            actor_id: actor_id.to_string(),
            client_id,
            client_name: name.to_string(),
            action: AuditAction::ClientUpdated,
        })
        .await
    }
}
