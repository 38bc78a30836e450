use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{ConnectOptions, Row, SqlitePool};
use uuid::Uuid;

use super::{ActivitySink, ClientStore};
use crate::{
    error::STORE_DECODE,
    migrate,
    model::{
        ensure_positive_id, ensure_present, Assignment, AuditAction, AuditLogEntry, Client, ClientDraft,
        ClientFilter, ClientId, ClientStatus, Employee, EmployeeFilter, NewClient,
        NewNotification, Notification, Role,
    },
    time::now_ms,
    AppError, AppResult,
};

const CLIENT_COLUMNS: &str = "id, name, company, address, status, created_by, created_at";

fn deserialize_client(row: &SqliteRow) -> AppResult<Client> {
    let id = ensure_positive_id("clients", "id", row.try_get("id")?)?;
    let status: String = row.try_get("status")?;
    Ok(Client {
        id,
        name: row.try_get("name")?,
        company: row.try_get("company")?,
        address: row.try_get("address")?,
        status: ClientStatus::from(status),
        created_by: ensure_present("clients", "created_by", row.try_get("created_by")?)?,
        created_at: row.try_get("created_at")?,
        assignments: Vec::new(),
    })
}

fn deserialize_employee(row: &SqliteRow) -> AppResult<Employee> {
    let role: String = row.try_get("role")?;
    let is_active: i64 = row.try_get("is_active")?;
    Ok(Employee {
        id: ensure_present("employees", "id", row.try_get("id")?)?,
        full_name: row.try_get("full_name")?,
        role: Role::from(role),
        is_active: is_active != 0,
    })
}

/// SQLite-backed client store and activity sink.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if needed) the database file and applies migrations.
    pub async fn open(db_path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full)
            .foreign_keys(true)
            .log_statements(log::LevelFilter::Off);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        sqlx::query("PRAGMA busy_timeout = 5000;")
            .execute(&pool)
            .await
            .ok();
        migrate::apply_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// In-memory database with the schema applied; one connection so all
    /// queries see the same data.
    pub async fn in_memory() -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        sqlx::query("PRAGMA foreign_keys=ON;").execute(&pool).await?;
        migrate::apply_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn upsert_employee(&self, employee: &Employee) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO employees (id, full_name, role, is_active) VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(id) DO UPDATE SET full_name = excluded.full_name, \
             role = excluded.role, is_active = excluded.is_active",
        )
        .bind(&employee.id)
        .bind(&employee.full_name)
        .bind(employee.role.as_str())
        .bind(employee.is_active as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn audit_entries(&self) -> AppResult<Vec<AuditLogEntry>> {
        let rows = sqlx::query(
            "SELECT actor_id, client_id, client_name, action FROM activity_logs ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| -> AppResult<AuditLogEntry> {
                let action: String = row.try_get("action")?;
                let action = AuditAction::parse(&action).ok_or_else(|| {
                    AppError::new(STORE_DECODE, "Unknown audit action")
                        .with_context("action", action.clone())
                })?;
                Ok(AuditLogEntry {
                    actor_id: row.try_get("actor_id")?,
                    client_id: row.try_get("client_id")?,
                    client_name: row.try_get("client_name")?,
                    action,
                })
            })
            .collect()
    }

    pub async fn notifications_for(&self, user_id: &str) -> AppResult<Vec<Notification>> {
        let rows = sqlx::query(
            "SELECT id, title, description, scheduled_at, created_by, assigned_to \
             FROM notifications WHERE assigned_to = ? ORDER BY scheduled_at, id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| -> AppResult<Notification> {
                Ok(Notification {
                    id: row.try_get("id")?,
                    title: row.try_get("title")?,
                    description: row.try_get("description")?,
                    scheduled_at: row.try_get("scheduled_at")?,
                    created_by: row.try_get("created_by")?,
                    assigned_to: row.try_get("assigned_to")?,
                })
            })
            .collect()
    }

    async fn assignments_for(&self, client_id: ClientId) -> AppResult<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT employee_id FROM client_assignments WHERE client_id = ? ORDER BY rowid",
        )
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn fetch_client(&self, id: ClientId) -> AppResult<Client> {
        let row = sqlx::query(&format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = ?"))
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        let mut client = deserialize_client(&row)?;
        client.assignments = self.assignments_for(id).await?;
        Ok(client)
    }
}

#[async_trait]
impl ClientStore for SqliteStore {
    async fn select_clients(&self, filter: &ClientFilter) -> AppResult<Vec<Client>> {
        let status = filter.status.as_ref().map(|status| status.as_str().to_string());

        let rows = sqlx::query(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients \
             WHERE (?1 IS NULL OR status = ?1) ORDER BY created_at, id"
        ))
        .bind(status.clone())
        .fetch_all(&self.pool)
        .await?;
        let mut clients = rows
            .iter()
            .map(deserialize_client)
            .collect::<AppResult<Vec<_>>>()?;

        let joined = sqlx::query(
            "SELECT a.client_id, a.employee_id FROM client_assignments a \
             JOIN clients c ON c.id = a.client_id \
             WHERE (?1 IS NULL OR c.status = ?1) ORDER BY a.rowid",
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        let mut by_client: HashMap<ClientId, Vec<String>> = HashMap::new();
        for row in joined {
            let client_id: ClientId = row.try_get("client_id")?;
            by_client
                .entry(client_id)
                .or_default()
                .push(row.try_get("employee_id")?);
        }
        for client in &mut clients {
            if let Some(ids) = by_client.remove(&client.id) {
                client.assignments = ids;
            }
        }
        Ok(clients)
    }

    async fn select_employees(&self, filter: &EmployeeFilter) -> AppResult<Vec<Employee>> {
        let rows = sqlx::query(
            "SELECT id, full_name, role, is_active FROM employees \
             WHERE role = ?1 AND (?2 = 0 OR is_active = 1) ORDER BY full_name, id",
        )
        .bind(filter.role.as_str())
        .bind(filter.active_only as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(deserialize_employee).collect()
    }

    async fn insert_client(&self, row: &NewClient) -> AppResult<Client> {
        let result = sqlx::query(
            "INSERT INTO clients (name, company, address, status, created_by, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&row.name)
        .bind(&row.company)
        .bind(&row.address)
        .bind(row.status.as_str())
        .bind(&row.created_by)
        .bind(now_ms())
        .execute(&self.pool)
        .await?;
        self.fetch_client(result.last_insert_rowid()).await
    }

    async fn update_client(&self, id: ClientId, patch: &ClientDraft) -> AppResult<Client> {
        let result =
            sqlx::query("UPDATE clients SET name = ?1, company = ?2, address = ?3 WHERE id = ?4")
                .bind(&patch.name)
                .bind(&patch.company)
                .bind(&patch.address)
                .bind(id)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::new("SQLX/ROW_NOT_FOUND", "Record not found")
                .with_context("client_id", id.to_string()));
        }
        self.fetch_client(id).await
    }

    async fn insert_assignments(&self, rows: &[Assignment]) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        for row in rows {
            sqlx::query("INSERT INTO client_assignments (client_id, employee_id) VALUES (?1, ?2)")
                .bind(row.client_id)
                .bind(&row.employee_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl ActivitySink for SqliteStore {
    async fn append_audit(&self, entry: &AuditLogEntry) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO activity_logs (actor_id, client_id, client_name, action, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&entry.actor_id)
        .bind(entry.client_id)
        .bind(&entry.client_name)
        .bind(entry.action.as_str())
        .bind(now_ms())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn create_notification(
        &self,
        notification: &NewNotification,
    ) -> AppResult<Notification> {
        let id = Uuid::now_v7().to_string();
        sqlx::query(
            "INSERT INTO notifications \
             (id, title, description, scheduled_at, created_by, assigned_to, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&id)
        .bind(&notification.title)
        .bind(&notification.description)
        .bind(notification.scheduled_at)
        .bind(&notification.created_by)
        .bind(&notification.assigned_to)
        .bind(now_ms())
        .execute(&self.pool)
        .await?;
        Ok(Notification {
            id,
            title: notification.title.clone(),
            description: notification.description.clone(),
            scheduled_at: notification.scheduled_at,
            created_by: notification.created_by.clone(),
            assigned_to: notification.assigned_to.clone(),
        })
    }
}
