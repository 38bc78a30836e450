//! Create, edit and assign sagas plus the form state that drives them.
//!
//! Each saga runs persist, then audit log, then notification, then the local
//! patch. Nothing after the persist step runs when the persist fails, and a
//! failing side effect never undoes the persist.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::json;

use crate::{
    error::{SINK_LOG_FAILED, SINK_NOTIFY_FAILED, VALIDATION_MUTATION_IN_FLIGHT},
    logging::OpScope,
    model::{Assignment, Client, ClientDraft, ClientId, NewClient, NewNotification, Notification, Role},
    store::{ActivitySink, ClientStore},
    sync::{ListSynchronizer, Snapshot},
    time::now_ms,
    util::fenced,
    AppError, AppResult,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MutationState {
    #[default]
    Idle,
    Submitting,
    Succeeded,
    Failed(AppError),
}

impl MutationState {
    pub fn is_submitting(&self) -> bool {
        matches!(self, MutationState::Submitting)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateForm {
    pub open: bool,
    pub draft: ClientDraft,
    pub state: MutationState,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditForm {
    pub open: bool,
    pub selected: Option<ClientId>,
    pub draft: ClientDraft,
    pub state: MutationState,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignForm {
    pub open: bool,
    pub selected: Option<ClientId>,
    pub employee_ids: BTreeSet<String>,
    pub state: MutationState,
}

#[derive(Default)]
struct Forms {
    create: CreateForm,
    edit: EditForm,
    assign: AssignForm,
}

#[derive(Debug, Clone)]
pub struct CreateOutcome {
    pub client: Client,
    pub notification: Option<Notification>,
    /// Side-effect failures that did not undo the create.
    pub warnings: Vec<AppError>,
    pub snapshot: Snapshot,
}

#[derive(Debug, Clone)]
pub struct EditOutcome {
    pub client: Client,
    pub warnings: Vec<AppError>,
    pub snapshot: Snapshot,
}

#[derive(Debug, Clone)]
pub struct AssignOutcome {
    pub client_id: ClientId,
    pub assigned: usize,
    /// Snapshot from the follow-up refresh; `None` when that refresh failed.
    pub snapshot: Option<Snapshot>,
    pub warnings: Vec<AppError>,
}

fn in_flight(operation: &'static str) -> AppError {
    AppError::new(
        VALIDATION_MUTATION_IN_FLIGHT,
        "This change is still being saved.",
    )
    .with_context("operation", operation)
}

fn sink_error(code: &'static str, message: &'static str, client_id: ClientId, cause: AppError) -> AppError {
    AppError::new(code, message)
        .with_context("client_id", client_id.to_string())
        .with_cause(cause)
}

pub struct MutationOrchestrator<S: ?Sized, K: ?Sized> {
    store: Arc<S>,
    sink: Arc<K>,
    sync: Arc<ListSynchronizer<S>>,
    forms: Mutex<Forms>,
}

impl<S, K> MutationOrchestrator<S, K>
where
    S: ClientStore + ?Sized,
    K: ActivitySink + ?Sized,
{
    pub fn new(store: Arc<S>, sink: Arc<K>, sync: Arc<ListSynchronizer<S>>) -> Self {
        Self {
            store,
            sink,
            sync,
            forms: Mutex::new(Forms::default()),
        }
    }

    fn forms(&self) -> MutexGuard<'_, Forms> {
        self.forms.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Validates and stores a new `ongoing` client, then logs, notifies the
    /// actor and appends the stored row to the local set.
    pub async fn create_client(
        &self,
        draft: &ClientDraft,
        actor_id: &str,
    ) -> AppResult<CreateOutcome> {
        let scope = OpScope::new("client_create", None, Some(actor_id));
        if let Err(err) = draft.validate() {
            scope.fail(&err);
            return Err(err);
        }

        let row = NewClient::ongoing(draft, actor_id);
        let client = match fenced("insert_client", self.store.insert_client(&row)).await {
            Ok(client) => client,
            Err(err) => {
                let err = AppError::persist("insert_client", err);
                scope.fail(&err);
                return Err(err);
            }
        };

        let mut warnings = Vec::new();
        if let Err(err) = fenced(
            "log_client_added",
            self.sink.log_client_added(actor_id, client.id, &draft.name),
        )
        .await
        {
            let err = sink_error(
                SINK_LOG_FAILED,
                "The client was saved but the activity log entry was not.",
                client.id,
                err,
            );
            scope.sink_failed(client.id, &err);
            warnings.push(err);
        }

        let notice = NewNotification::client_created(draft, actor_id, now_ms());
        let notification =
            match fenced("create_notification", self.sink.create_notification(&notice)).await {
                Ok(stored) => Some(stored),
                Err(err) => {
                    let err = sink_error(
                        SINK_NOTIFY_FAILED,
                        "The client was saved but the notification was not sent.",
                        client.id,
                        err,
                    );
                    scope.sink_failed(client.id, &err);
                    warnings.push(err);
                    None
                }
            };

        // A view that would not list the new row keeps its snapshot as is.
        let snapshot = if self.sync.admits(&client) {
            self.sync
                .set()
                .apply(|current| current.with_appended(client.clone()))
        } else {
            self.sync.snapshot()
        };
        scope.success(
            Some(client.id),
            json!({ "version": snapshot.version(), "warnings": warnings.len() }),
        );
        Ok(CreateOutcome {
            client,
            notification,
            warnings,
            snapshot,
        })
    }

    /// Stores new name/company/address for `client_id`, logs the update and
    /// swaps the returned row into the local set in place.
    pub async fn edit_client(
        &self,
        client_id: ClientId,
        edits: &ClientDraft,
        actor_id: &str,
    ) -> AppResult<EditOutcome> {
        let scope = OpScope::new("client_update", Some(client_id), Some(actor_id));
        if let Err(err) = edits.validate() {
            scope.fail(&err);
            return Err(err);
        }

        let client = match fenced("update_client", self.store.update_client(client_id, edits)).await
        {
            Ok(client) => client,
            Err(err) => {
                let err = AppError::persist("update_client", err)
                    .with_context("client_id", client_id.to_string());
                scope.fail(&err);
                return Err(err);
            }
        };

        let mut warnings = Vec::new();
        if let Err(err) = fenced(
            "log_client_updated",
            self.sink.log_client_updated(actor_id, client_id, &edits.name),
        )
        .await
        {
            let err = sink_error(
                SINK_LOG_FAILED,
                "The client was updated but the activity log entry was not.",
                client_id,
                err,
            );
            scope.sink_failed(client_id, &err);
            warnings.push(err);
        }

        // Last write wins when two edits of the same client race.
        let snapshot = self
            .sync
            .set()
            .apply(|current| current.with_replaced(client.clone()));
        scope.success(
            None,
            json!({ "version": snapshot.version(), "warnings": warnings.len() }),
        );
        Ok(EditOutcome {
            client,
            warnings,
            snapshot,
        })
    }

    /// Stores one assignment per employee as a single batch, then re-fetches
    /// the client set. An empty selection returns `Ok(None)` without touching
    /// the store.
    pub async fn assign_employees(
        &self,
        client_id: ClientId,
        employee_ids: &BTreeSet<String>,
        role: &Role,
    ) -> AppResult<Option<AssignOutcome>> {
        if employee_ids.is_empty() {
            return Ok(None);
        }
        let scope = OpScope::new("client_assign", Some(client_id), None);

        let rows: Vec<Assignment> = employee_ids
            .iter()
            .map(|employee_id| Assignment {
                client_id,
                employee_id: employee_id.clone(),
            })
            .collect();
        if let Err(err) = fenced("insert_assignments", self.store.insert_assignments(&rows)).await {
            let err = AppError::persist("insert_assignments", err)
                .with_context("client_id", client_id.to_string())
                .with_context("batch", rows.len().to_string());
            scope.fail(&err);
            return Err(err);
        }

        let mut warnings = Vec::new();
        let snapshot = match self.sync.load(role).await {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                scope.warn(json!({ "refresh": "failed", "code": err.code() }));
                warnings.push(err);
                None
            }
        };
        scope.success(None, json!({ "assigned": rows.len() }));
        Ok(Some(AssignOutcome {
            client_id,
            assigned: rows.len(),
            snapshot,
            warnings,
        }))
    }

    pub fn create_form(&self) -> CreateForm {
        self.forms().create.clone()
    }

    pub fn open_create(&self) {
        let mut forms = self.forms();
        forms.create.open = true;
        if !forms.create.state.is_submitting() {
            forms.create.state = MutationState::Idle;
        }
    }

    pub fn set_create_draft(&self, draft: ClientDraft) {
        self.forms().create.draft = draft;
    }

    /// Closes the create form and drops its draft; refused while submitting.
    pub fn close_create(&self) -> AppResult<()> {
        let mut forms = self.forms();
        if forms.create.state.is_submitting() {
            return Err(in_flight("client_create"));
        }
        forms.create = CreateForm::default();
        Ok(())
    }

    pub async fn submit_create(&self, actor_id: &str) -> AppResult<CreateOutcome> {
        let draft = {
            let mut forms = self.forms();
            if forms.create.state.is_submitting() {
                return Err(in_flight("client_create"));
            }
            forms.create.state = MutationState::Submitting;
            forms.create.draft.clone()
        };

        let result = self.create_client(&draft, actor_id).await;

        let mut forms = self.forms();
        match &result {
            Ok(_) => {
                forms.create = CreateForm {
                    open: false,
                    draft: ClientDraft::default(),
                    state: MutationState::Succeeded,
                };
            }
            Err(err) => forms.create.state = MutationState::Failed(err.clone()),
        }
        result
    }

    pub fn edit_form(&self) -> EditForm {
        self.forms().edit.clone()
    }

    /// Selects `client` and pre-fills the edit draft from it.
    pub fn open_edit(&self, client: &Client) -> AppResult<()> {
        let mut forms = self.forms();
        if forms.edit.state.is_submitting() {
            return Err(in_flight("client_update"));
        }
        forms.edit = EditForm {
            open: true,
            selected: Some(client.id),
            draft: ClientDraft::from_client(client),
            state: MutationState::Idle,
        };
        Ok(())
    }

    pub fn set_edit_draft(&self, draft: ClientDraft) {
        self.forms().edit.draft = draft;
    }

    pub fn close_edit(&self) -> AppResult<()> {
        let mut forms = self.forms();
        if forms.edit.state.is_submitting() {
            return Err(in_flight("client_update"));
        }
        forms.edit = EditForm::default();
        Ok(())
    }

    /// Submits the edit draft; `Ok(None)` when no client is selected.
    pub async fn submit_edit(&self, actor_id: &str) -> AppResult<Option<EditOutcome>> {
        let (client_id, draft) = {
            let mut forms = self.forms();
            if forms.edit.state.is_submitting() {
                return Err(in_flight("client_update"));
            }
            let Some(client_id) = forms.edit.selected else {
                return Ok(None);
            };
            forms.edit.state = MutationState::Submitting;
            (client_id, forms.edit.draft.clone())
        };

        let result = self.edit_client(client_id, &draft, actor_id).await;

        let mut forms = self.forms();
        match &result {
            Ok(_) => {
                forms.edit = EditForm {
                    state: MutationState::Succeeded,
                    ..EditForm::default()
                };
            }
            Err(err) => forms.edit.state = MutationState::Failed(err.clone()),
        }
        result.map(Some)
    }

    pub fn assign_form(&self) -> AssignForm {
        self.forms().assign.clone()
    }

    pub fn open_assign(&self, client_id: ClientId) -> AppResult<()> {
        let mut forms = self.forms();
        if forms.assign.state.is_submitting() {
            return Err(in_flight("client_assign"));
        }
        forms.assign = AssignForm {
            open: true,
            selected: Some(client_id),
            employee_ids: BTreeSet::new(),
            state: MutationState::Idle,
        };
        Ok(())
    }

    /// Replaces the selected employee set.
    pub fn select_employees<I>(&self, employee_ids: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.forms().assign.employee_ids = employee_ids.into_iter().collect();
    }

    /// Adds or removes one employee; returns whether it is now selected.
    pub fn toggle_employee(&self, employee_id: &str) -> bool {
        let mut forms = self.forms();
        let ids = &mut forms.assign.employee_ids;
        if ids.remove(employee_id) {
            false
        } else {
            ids.insert(employee_id.to_string());
            true
        }
    }

    pub fn close_assign(&self) -> AppResult<()> {
        let mut forms = self.forms();
        if forms.assign.state.is_submitting() {
            return Err(in_flight("client_assign"));
        }
        forms.assign = AssignForm::default();
        Ok(())
    }

    /// Submits the selected employees. No client or no employees selected is
    /// a no-op that leaves the form as it is.
    pub async fn submit_assign(&self, role: &Role) -> AppResult<Option<AssignOutcome>> {
        let (client_id, employee_ids) = {
            let mut forms = self.forms();
            if forms.assign.state.is_submitting() {
                return Err(in_flight("client_assign"));
            }
            let Some(client_id) = forms.assign.selected else {
                return Ok(None);
            };
            if forms.assign.employee_ids.is_empty() {
                return Ok(None);
            }
            forms.assign.state = MutationState::Submitting;
            (client_id, forms.assign.employee_ids.clone())
        };

        let result = self.assign_employees(client_id, &employee_ids, role).await;

        let mut forms = self.forms();
        match &result {
            Ok(_) => {
                forms.assign = AssignForm {
                    state: MutationState::Succeeded,
                    ..AssignForm::default()
                };
            }
            Err(err) => forms.assign.state = MutationState::Failed(err.clone()),
        }
        result
    }
}
