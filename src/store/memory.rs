use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use super::{ActivitySink, ClientStore};
use crate::{
    model::{
        Assignment, AuditLogEntry, Client, ClientDraft, ClientFilter, ClientId, ClientStatus,
        Employee, EmployeeFilter, NewClient, NewNotification, Notification,
    },
    time::now_ms,
    AppError, AppResult,
};

/// Operations the in-memory store counts and can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    SelectClients,
    SelectEmployees,
    InsertClient,
    UpdateClient,
    InsertAssignments,
    AppendAudit,
    CreateNotification,
}

impl StoreOp {
    fn as_str(&self) -> &'static str {
        match self {
            StoreOp::SelectClients => "select_clients",
            StoreOp::SelectEmployees => "select_employees",
            StoreOp::InsertClient => "insert_client",
            StoreOp::UpdateClient => "update_client",
            StoreOp::InsertAssignments => "insert_assignments",
            StoreOp::AppendAudit => "append_audit",
            StoreOp::CreateNotification => "create_notification",
        }
    }
}

#[derive(Default)]
struct Tables {
    clients: Vec<Client>,
    employees: Vec<Employee>,
    assignments: Vec<Assignment>,
    audit: Vec<AuditLogEntry>,
    notifications: Vec<Notification>,
    next_id: ClientId,
    calls: HashMap<StoreOp, usize>,
    failing: HashSet<StoreOp>,
}

impl Tables {
    fn enter(&mut self, op: StoreOp) -> AppResult<()> {
        *self.calls.entry(op).or_default() += 1;
        if self.failing.contains(&op) {
            return Err(AppError::new("MEMORY/INJECTED", "injected store failure")
                .with_context("op", op.as_str()));
        }
        Ok(())
    }

    fn with_assignments(&self, client: &Client) -> Client {
        let mut joined = client.clone();
        joined.assignments = self
            .assignments
            .iter()
            .filter(|row| row.client_id == client.id)
            .map(|row| row.employee_id.clone())
            .collect();
        joined
    }
}

/// Process-local store and sink with per-operation counters and failure injection.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Adds a client row directly, bypassing counters.
    pub fn seed_client(
        &self,
        name: &str,
        company: &str,
        address: &str,
        status: ClientStatus,
    ) -> Client {
        let mut tables = self.lock();
        tables.next_id += 1;
        let client = Client {
            id: tables.next_id,
            name: name.to_string(),
            company: company.to_string(),
            address: address.to_string(),
            status,
            created_by: "seed".to_string(),
            created_at: now_ms(),
            assignments: Vec::new(),
        };
        tables.clients.push(client.clone());
        client
    }

    pub fn seed_employee(&self, employee: Employee) {
        self.lock().employees.push(employee);
    }

    pub fn seed_assignment(&self, client_id: ClientId, employee_id: &str) {
        self.lock().assignments.push(Assignment {
            client_id,
            employee_id: employee_id.to_string(),
        });
    }

    pub fn set_failing(&self, op: StoreOp, failing: bool) {
        let mut tables = self.lock();
        if failing {
            tables.failing.insert(op);
        } else {
            tables.failing.remove(&op);
        }
    }

    pub fn calls(&self, op: StoreOp) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.lock().calls.values().sum()
    }

    pub fn audit_entries(&self) -> Vec<AuditLogEntry> {
        self.lock().audit.clone()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.lock().notifications.clone()
    }

    pub fn assignments(&self) -> Vec<Assignment> {
        self.lock().assignments.clone()
    }

    pub fn client_count(&self) -> usize {
        self.lock().clients.len()
    }
}

#[async_trait]
impl ClientStore for MemoryStore {
    async fn select_clients(&self, filter: &ClientFilter) -> AppResult<Vec<Client>> {
        tokio::task::yield_now().await;
        let mut tables = self.lock();
        tables.enter(StoreOp::SelectClients)?;
        Ok(tables
            .clients
            .iter()
            .filter(|client| filter.matches(client))
            .map(|client| tables.with_assignments(client))
            .collect())
    }

    async fn select_employees(&self, filter: &EmployeeFilter) -> AppResult<Vec<Employee>> {
        tokio::task::yield_now().await;
        let mut tables = self.lock();
        tables.enter(StoreOp::SelectEmployees)?;
        Ok(tables
            .employees
            .iter()
            .filter(|employee| filter.matches(employee))
            .cloned()
            .collect())
    }

    async fn insert_client(&self, row: &NewClient) -> AppResult<Client> {
        tokio::task::yield_now().await;
        let mut tables = self.lock();
        tables.enter(StoreOp::InsertClient)?;
        tables.next_id += 1;
        let client = Client {
            id: tables.next_id,
            name: row.name.clone(),
            company: row.company.clone(),
            address: row.address.clone(),
            status: row.status.clone(),
            created_by: row.created_by.clone(),
            created_at: now_ms(),
            assignments: Vec::new(),
        };
        tables.clients.push(client.clone());
        Ok(client)
    }

    async fn update_client(&self, id: ClientId, patch: &ClientDraft) -> AppResult<Client> {
        tokio::task::yield_now().await;
        let mut tables = self.lock();
        tables.enter(StoreOp::UpdateClient)?;
        let Some(index) = tables.clients.iter().position(|client| client.id == id) else {
            return Err(AppError::new("SQLX/ROW_NOT_FOUND", "Record not found")
                .with_context("client_id", id.to_string()));
        };
        {
            let client = &mut tables.clients[index];
            client.name = patch.name.clone();
            client.company = patch.company.clone();
            client.address = patch.address.clone();
        }
        let updated = tables.with_assignments(&tables.clients[index]);
        Ok(updated)
    }

    async fn insert_assignments(&self, rows: &[Assignment]) -> AppResult<()> {
        tokio::task::yield_now().await;
        let mut tables = self.lock();
        tables.enter(StoreOp::InsertAssignments)?;

        let mut seen: HashSet<&Assignment> = tables.assignments.iter().collect();
        for row in rows {
            if !tables.clients.iter().any(|client| client.id == row.client_id) {
                return Err(AppError::new("Sqlite/787", "FOREIGN KEY constraint failed")
                    .with_context("client_id", row.client_id.to_string()));
            }
            if !seen.insert(row) {
                return Err(AppError::new(
                    "Sqlite/1555",
                    "UNIQUE constraint failed: client_assignments.client_id, client_assignments.employee_id",
                )
                .with_context("employee_id", row.employee_id.clone()));
            }
        }
        tables.assignments.extend(rows.iter().cloned());
        Ok(())
    }
}

#[async_trait]
impl ActivitySink for MemoryStore {
    async fn append_audit(&self, entry: &AuditLogEntry) -> AppResult<()> {
        tokio::task::yield_now().await;
        let mut tables = self.lock();
        tables.enter(StoreOp::AppendAudit)?;
        tables.audit.push(entry.clone());
        Ok(())
    }

    async fn create_notification(
        &self,
        notification: &NewNotification,
    ) -> AppResult<Notification> {
        tokio::task::yield_now().await;
        let mut tables = self.lock();
        tables.enter(StoreOp::CreateNotification)?;
        let stored = Notification {
            id: Uuid::now_v7().to_string(),
            title: notification.title.clone(),
            description: notification.description.clone(),
            scheduled_at: notification.scheduled_at,
            created_by: notification.created_by.clone(),
            assigned_to: notification.assigned_to.clone(),
        };
        tables.notifications.push(stored.clone());
        Ok(stored)
    }
}
