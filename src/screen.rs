//! One client-list screen instance: the synchronized set, the search query,
//! the assign roster and the mutation forms, all bound to a single view.

use std::sync::{Arc, Mutex};

use crate::{
    identity::{Identity, IdentityProvider},
    model::{
        Client, ClientId, Employee, Role, VALIDATION_CLIENT_UNKNOWN, VALIDATION_IDENTITY_REQUIRED,
        VALIDATION_NOT_PERMITTED,
    },
    mutations::{AssignOutcome, CreateOutcome, EditOutcome, MutationOrchestrator},
    roster::Roster,
    search::{filter_employees, SearchView},
    store::{ActivitySink, ClientStore},
    sync::{ClientView, ListSynchronizer, Snapshot},
    AppError, AppResult,
};

/// What happened when the screen first saw a role.
#[derive(Debug, Clone)]
pub struct MountReport {
    pub identity: Identity,
    /// `None` when the client load failed; the error is in `errors`.
    pub snapshot: Option<Snapshot>,
    /// Roster size, `None` when the role has no roster or the load failed.
    pub employees: Option<usize>,
    pub errors: Vec<AppError>,
}

fn identity_required() -> AppError {
    AppError::new(VALIDATION_IDENTITY_REQUIRED, "Sign in to continue.")
}

fn not_permitted(action: &'static str, view: ClientView) -> AppError {
    AppError::new(VALIDATION_NOT_PERMITTED, "You are not allowed to do that here.")
        .with_context("action", action)
        .with_context("view", view.as_str())
}

fn client_unknown(client_id: ClientId) -> AppError {
    AppError::new(VALIDATION_CLIENT_UNKNOWN, "That client is no longer listed.")
        .with_context("client_id", client_id.to_string())
}

pub struct ClientListScreen<S: ?Sized, K: ?Sized> {
    identity: Arc<dyn IdentityProvider>,
    sync: Arc<ListSynchronizer<S>>,
    search: SearchView,
    roster: Roster<S>,
    employee_query: Mutex<String>,
    mutations: MutationOrchestrator<S, K>,
}

impl<S, K> ClientListScreen<S, K>
where
    S: ClientStore + ?Sized,
    K: ActivitySink + ?Sized,
{
    pub fn new(
        store: Arc<S>,
        sink: Arc<K>,
        identity: Arc<dyn IdentityProvider>,
        view: ClientView,
    ) -> Self {
        let sync = Arc::new(ListSynchronizer::new(store.clone(), view));
        Self {
            identity,
            roster: Roster::new(store.clone(), view),
            mutations: MutationOrchestrator::new(store, sink, sync.clone()),
            sync,
            search: SearchView::default(),
            employee_query: Mutex::new(String::new()),
        }
    }

    pub fn view(&self) -> ClientView {
        self.sync.view()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.identity.current()
    }

    fn require_identity(&self) -> AppResult<Identity> {
        self.identity.current().ok_or_else(identity_required)
    }

    /// Loads clients and roster for the current role. Returns `None` while no
    /// identity is available; load failures are collected, never raised.
    pub async fn mount(&self) -> Option<MountReport> {
        let identity = self.identity.current()?;
        let mut errors = Vec::new();

        let snapshot = match self.sync.load(&identity.role).await {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                errors.push(err);
                None
            }
        };
        let employees = match self.roster.load(&identity.role).await {
            Ok(count) => count,
            Err(err) => {
                errors.push(err);
                None
            }
        };

        Some(MountReport {
            identity,
            snapshot,
            employees,
            errors,
        })
    }

    pub async fn refresh(&self) -> AppResult<Snapshot> {
        let identity = self.require_identity()?;
        self.sync.load(&identity.role).await
    }

    pub fn snapshot(&self) -> Snapshot {
        self.sync.snapshot()
    }

    /// Clients currently shown: the snapshot narrowed by the search query.
    pub fn displayed(&self) -> Arc<Vec<Client>> {
        self.search.apply(&self.sync.snapshot())
    }

    pub fn query(&self) -> String {
        self.search.query()
    }

    pub fn set_query(&self, query: impl Into<String>) {
        self.search.set_query(query);
    }

    pub fn employees(&self) -> Arc<Vec<Employee>> {
        self.roster.employees()
    }

    pub fn set_employee_query(&self, query: impl Into<String>) {
        *self.employee_query.lock().unwrap_or_else(|e| e.into_inner()) = query.into();
    }

    /// Roster entries matching the assign-form search box.
    pub fn assignable_employees(&self) -> Vec<Employee> {
        let query = self
            .employee_query
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        filter_employees(&self.roster.employees(), &query)
    }

    pub fn can_assign(&self) -> bool {
        match (self.view(), self.identity.current()) {
            (_, None) => false,
            (ClientView::Finance, Some(identity)) => identity.role == Role::Head,
            (ClientView::All, Some(_)) => true,
        }
    }

    /// Creating is an all-clients action; new rows are `ongoing` and would
    /// never appear in the finance listing.
    pub fn can_create(&self) -> bool {
        self.view() == ClientView::All && self.identity.current().is_some()
    }

    pub fn can_edit(&self) -> bool {
        self.view() == ClientView::All && self.identity.current().is_some()
    }

    pub fn mutations(&self) -> &MutationOrchestrator<S, K> {
        &self.mutations
    }

    fn listed(&self, client_id: ClientId) -> AppResult<Client> {
        self.sync
            .snapshot()
            .get(client_id)
            .cloned()
            .ok_or_else(|| client_unknown(client_id))
    }

    pub async fn submit_create(&self) -> AppResult<CreateOutcome> {
        let identity = self.require_identity()?;
        if !self.can_create() {
            return Err(not_permitted("create", self.view()));
        }
        self.mutations.submit_create(&identity.user_id).await
    }

    pub fn open_edit(&self, client_id: ClientId) -> AppResult<()> {
        if !self.can_edit() {
            return Err(not_permitted("edit", self.view()));
        }
        let client = self.listed(client_id)?;
        self.mutations.open_edit(&client)
    }

    pub async fn submit_edit(&self) -> AppResult<Option<EditOutcome>> {
        let identity = self.require_identity()?;
        self.mutations.submit_edit(&identity.user_id).await
    }

    pub fn open_assign(&self, client_id: ClientId) -> AppResult<()> {
        if !self.can_assign() {
            return Err(not_permitted("assign", self.view()));
        }
        self.listed(client_id)?;
        self.mutations.open_assign(client_id)
    }

    pub async fn submit_assign(&self) -> AppResult<Option<AssignOutcome>> {
        let identity = self.require_identity()?;
        self.mutations.submit_assign(&identity.role).await
    }
}
