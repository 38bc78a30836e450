use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use crate::{error::STORE_DECODE, AppError, AppResult};

pub const VALIDATION_NOT_PERMITTED: &str = "VALIDATION/NOT_PERMITTED";
pub const VALIDATION_CLIENT_UNKNOWN: &str = "VALIDATION/CLIENT_NOT_FOUND";
pub const VALIDATION_IDENTITY_REQUIRED: &str = "VALIDATION/IDENTITY_REQUIRED";

pub const NEW_CLIENT_NOTIFICATION_TITLE: &str = "New Client Created";

/// Store-assigned client identifier.
pub type ClientId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ClientStatus {
    Ongoing,
    Ecomplete,
    /// Any status this core does not act on.
    Other(String),
}

impl ClientStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ClientStatus::Ongoing => "ongoing",
            ClientStatus::Ecomplete => "ecomplete",
            ClientStatus::Other(raw) => raw.as_str(),
        }
    }
}

impl From<&str> for ClientStatus {
    fn from(raw: &str) -> Self {
        match raw {
            "ongoing" => ClientStatus::Ongoing,
            "ecomplete" => ClientStatus::Ecomplete,
            other => ClientStatus::Other(other.to_string()),
        }
    }
}

impl From<String> for ClientStatus {
    fn from(raw: String) -> Self {
        ClientStatus::from(raw.as_str())
    }
}

impl From<ClientStatus> for String {
    fn from(status: ClientStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role tag attached to a user or employee record.
///
/// Unknown tags are kept verbatim and grant no extra view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Admin,
    Head,
    Employee,
    FinanceEmployee,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "admin",
            Role::Head => "head",
            Role::Employee => "employee",
            Role::FinanceEmployee => "finance.employee",
            Role::Other(raw) => raw.as_str(),
        }
    }
}

impl From<&str> for Role {
    fn from(raw: &str) -> Self {
        match raw {
            "admin" => Role::Admin,
            "head" => Role::Head,
            "employee" => Role::Employee,
            "finance.employee" => Role::FinanceEmployee,
            other => Role::Other(other.to_string()),
        }
    }
}

impl From<String> for Role {
    fn from(raw: String) -> Self {
        Role::from(raw.as_str())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "../target/bindings/")]
pub struct Client {
    #[ts(type = "number")]
    pub id: ClientId,
    pub name: String,
    pub company: String,
    pub address: String,
    #[ts(type = "string")]
    pub status: ClientStatus,
    pub created_by: String,
    #[ts(type = "number")]
    pub created_at: i64,
    /// Employee ids joined from `client_assignments`.
    #[serde(default)]
    pub assignments: Vec<String>,
}

/// Editable client fields shared by the create and edit forms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../target/bindings/")]
pub struct ClientDraft {
    pub name: String,
    pub company: String,
    pub address: String,
}

impl ClientDraft {
    pub fn new(
        name: impl Into<String>,
        company: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            company: company.into(),
            address: address.into(),
        }
    }

    pub fn from_client(client: &Client) -> Self {
        Self::new(&client.name, &client.company, &client.address)
    }

    pub fn validate(&self) -> AppResult<()> {
        for (field, value) in [
            ("name", &self.name),
            ("company", &self.company),
            ("address", &self.address),
        ] {
            if value.is_empty() {
                return Err(AppError::field_required(field));
            }
        }
        Ok(())
    }
}

/// Row written by a create; the store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewClient {
    pub name: String,
    pub company: String,
    pub address: String,
    pub status: ClientStatus,
    pub created_by: String,
}

impl NewClient {
    pub fn ongoing(draft: &ClientDraft, created_by: &str) -> Self {
        Self {
            name: draft.name.clone(),
            company: draft.company.clone(),
            address: draft.address.clone(),
            status: ClientStatus::Ongoing,
            created_by: created_by.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientFilter {
    pub status: Option<ClientStatus>,
}

impl ClientFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_status(status: ClientStatus) -> Self {
        Self {
            status: Some(status),
        }
    }

    pub fn matches(&self, client: &Client) -> bool {
        self.status
            .as_ref()
            .map_or(true, |status| &client.status == status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../target/bindings/")]
pub struct Employee {
    pub id: String,
    pub full_name: String,
    #[ts(type = "string")]
    pub role: Role,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmployeeFilter {
    pub role: Role,
    pub active_only: bool,
}

impl EmployeeFilter {
    pub fn matches(&self, employee: &Employee) -> bool {
        employee.role == self.role && (!self.active_only || employee.is_active)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Assignment {
    pub client_id: ClientId,
    pub employee_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    #[serde(rename = "clientAdded")]
    ClientAdded,
    #[serde(rename = "clientUpdated")]
    ClientUpdated,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::ClientAdded => "clientAdded",
            AuditAction::ClientUpdated => "clientUpdated",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "clientAdded" => Some(AuditAction::ClientAdded),
            "clientUpdated" => Some(AuditAction::ClientUpdated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub actor_id: String,
    pub client_id: ClientId,
    /// Client name as it was when the action happened.
    pub client_name: String,
    pub action: AuditAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNotification {
    pub title: String,
    pub description: String,
    pub scheduled_at: i64,
    pub created_by: String,
    pub assigned_to: String,
}

impl NewNotification {
    /// Notification raised for the actor after a client is created.
    pub fn client_created(draft: &ClientDraft, actor_id: &str, now: i64) -> Self {
        Self {
            title: NEW_CLIENT_NOTIFICATION_TITLE.to_string(),
            description: format!(
                "A new client \"{}\" from {} has been created.",
                draft.name, draft.company
            ),
            scheduled_at: now,
            created_by: actor_id.to_string(),
            assigned_to: actor_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../target/bindings/")]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub description: String,
    #[ts(type = "number")]
    pub scheduled_at: i64,
    pub created_by: String,
    pub assigned_to: String,
}

/// Shape problems found while turning a store row into a record.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("{table}.{column} must be a positive id, got {value}")]
    NonPositiveId {
        table: &'static str,
        column: &'static str,
        value: i64,
    },
    #[error("{table}.{column} is empty")]
    EmptyField {
        table: &'static str,
        column: &'static str,
    },
}

impl From<RecordError> for AppError {
    fn from(err: RecordError) -> Self {
        let (table, column) = match &err {
            RecordError::NonPositiveId { table, column, .. } => (*table, *column),
            RecordError::EmptyField { table, column } => (*table, *column),
        };
        AppError::new(STORE_DECODE, err.to_string())
            .with_context("table", table)
            .with_context("column", column)
    }
}

pub fn ensure_positive_id(
    table: &'static str,
    column: &'static str,
    value: i64,
) -> Result<ClientId, RecordError> {
    if value > 0 {
        Ok(value)
    } else {
        Err(RecordError::NonPositiveId {
            table,
            column,
            value,
        })
    }
}

pub fn ensure_present(
    table: &'static str,
    column: &'static str,
    value: String,
) -> Result<String, RecordError> {
    if value.is_empty() {
        Err(RecordError::EmptyField { table, column })
    } else {
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VALIDATION_FIELD_REQUIRED;

    #[test]
    fn unknown_roles_round_trip_verbatim() {
        let role: Role = serde_json::from_str("\"auditor\"").expect("parse role");
        assert_eq!(role, Role::Other("auditor".into()));
        assert_eq!(serde_json::to_string(&role).unwrap(), "\"auditor\"");
        assert_eq!(Role::from("finance.employee"), Role::FinanceEmployee);
    }

    #[test]
    fn status_serializes_as_plain_text() {
        assert_eq!(
            serde_json::to_string(&ClientStatus::Ecomplete).unwrap(),
            "\"ecomplete\""
        );
        assert_eq!(ClientStatus::from("closed").as_str(), "closed");
    }

    #[test]
    fn draft_validation_names_first_missing_field() {
        let err = ClientDraft::new("Jo", "", "1 Main St")
            .validate()
            .expect_err("company missing");
        assert_eq!(err.code(), VALIDATION_FIELD_REQUIRED);
        assert_eq!(err.context().get("field").map(String::as_str), Some("company"));

        let err = ClientDraft::new("Jo", "Acme", "")
            .validate()
            .expect_err("address missing");
        assert_eq!(err.context().get("field").map(String::as_str), Some("address"));

        // Only an empty value is missing; whitespace is stored as typed.
        assert!(ClientDraft::new("Jo", "Acme", "   ").validate().is_ok());

        assert!(ClientDraft::new("Jo", "Acme", "1 Main St").validate().is_ok());
    }

    #[test]
    fn notification_text_mentions_name_and_company() {
        let draft = ClientDraft::new("Acme Corp Contact", "Acme Corp", "1 Main St");
        let note = NewNotification::client_created(&draft, "user-1", 42);
        assert_eq!(note.title, "New Client Created");
        assert_eq!(
            note.description,
            "A new client \"Acme Corp Contact\" from Acme Corp has been created."
        );
        assert_eq!(note.created_by, "user-1");
        assert_eq!(note.assigned_to, "user-1");
        assert_eq!(note.scheduled_at, 42);
    }

    #[test]
    fn audit_actions_use_camel_case_tags() {
        assert_eq!(
            serde_json::to_string(&AuditAction::ClientAdded).unwrap(),
            "\"clientAdded\""
        );
        assert_eq!(
            AuditAction::parse("clientUpdated"),
            Some(AuditAction::ClientUpdated)
        );
        assert_eq!(AuditAction::parse("clientDeleted"), None);
    }

    #[test]
    fn record_errors_map_to_decode_code() {
        let err: AppError = ensure_positive_id("clients", "id", 0).unwrap_err().into();
        assert_eq!(err.code(), STORE_DECODE);
        assert_eq!(err.context().get("column").map(String::as_str), Some("id"));
    }
}
