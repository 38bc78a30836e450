//! List synchronizer: fetches the role-scoped client set and publishes it as
//! immutable, versioned snapshots.

use std::sync::{Arc, RwLock};

use serde_json::json;

use crate::{
    logging::OpScope,
    model::{Client, ClientFilter, ClientId, ClientStatus, Role},
    store::ClientStore,
    util::fenced,
    AppError, AppResult,
};

/// Which client listing a screen shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientView {
    /// Every client, no status filter.
    All,
    /// Completed engagements handed to finance.
    Finance,
}

impl ClientView {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientView::All => "all",
            ClientView::Finance => "finance",
        }
    }
}

/// Store filter for `view` as seen by `role`; `None` means no query is issued.
pub fn scope_for(view: ClientView, role: &Role) -> Option<ClientFilter> {
    match (view, role) {
        (ClientView::All, _) => Some(ClientFilter::all()),
        (ClientView::Finance, Role::FinanceEmployee | Role::Admin) => {
            Some(ClientFilter::with_status(ClientStatus::Ecomplete))
        }
        (ClientView::Finance, _) => None,
    }
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    version: u64,
    clients: Arc<Vec<Client>>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            version: 0,
            clients: Arc::new(Vec::new()),
        }
    }
}

impl Snapshot {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn clients(&self) -> &[Client] {
        &self.clients
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn get(&self, id: ClientId) -> Option<&Client> {
        self.clients.iter().find(|client| client.id == id)
    }

    pub fn ids(&self) -> Vec<ClientId> {
        self.clients.iter().map(|client| client.id).collect()
    }

    fn next(&self, clients: Vec<Client>) -> Snapshot {
        Snapshot {
            version: self.version + 1,
            clients: Arc::new(clients),
        }
    }

    pub fn with_all(&self, clients: Vec<Client>) -> Snapshot {
        self.next(clients)
    }

    pub fn with_appended(&self, client: Client) -> Snapshot {
        let mut clients = Vec::with_capacity(self.clients.len() + 1);
        clients.extend(self.clients.iter().cloned());
        clients.push(client);
        self.next(clients)
    }

    /// Swaps the element with `client.id` in place; unchanged when absent.
    pub fn with_replaced(&self, client: Client) -> Snapshot {
        let Some(index) = self.clients.iter().position(|c| c.id == client.id) else {
            return self.clone();
        };
        let mut clients = self.clients.as_ref().clone();
        clients[index] = client;
        self.next(clients)
    }
}

/// Shared cell holding the current snapshot for one screen.
#[derive(Debug, Clone, Default)]
pub struct ClientSet {
    inner: Arc<RwLock<Snapshot>>,
}

impl ClientSet {
    pub fn current(&self) -> Snapshot {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Derives and publishes the next snapshot under the write lock, so
    /// concurrent patches never drop each other.
    pub fn apply<F>(&self, f: F) -> Snapshot
    where
        F: FnOnce(&Snapshot) -> Snapshot,
    {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let next = f(&guard);
        *guard = next.clone();
        next
    }
}

pub struct ListSynchronizer<S: ?Sized> {
    store: Arc<S>,
    view: ClientView,
    set: ClientSet,
}

impl<S> ListSynchronizer<S>
where
    S: ClientStore + ?Sized,
{
    pub fn new(store: Arc<S>, view: ClientView) -> Self {
        Self {
            store,
            view,
            set: ClientSet::default(),
        }
    }

    pub fn view(&self) -> ClientView {
        self.view
    }

    pub fn set(&self) -> &ClientSet {
        &self.set
    }

    pub fn snapshot(&self) -> Snapshot {
        self.set.current()
    }

    /// Whether `client` belongs in this view's listing regardless of role.
    pub fn admits(&self, client: &Client) -> bool {
        match self.view {
            ClientView::All => true,
            ClientView::Finance => {
                ClientFilter::with_status(ClientStatus::Ecomplete).matches(client)
            }
        }
    }

    /// Re-fetches the scoped set and publishes it. On failure the previous
    /// snapshot stays in place and the error is returned for reporting.
    pub async fn load(&self, role: &Role) -> AppResult<Snapshot> {
        let scope = OpScope::new("clients_load", None, None);

        let Some(filter) = scope_for(self.view, role) else {
            let snapshot = self.set.apply(|current| current.with_all(Vec::new()));
            scope.success(
                None,
                json!({ "view": self.view.as_str(), "role": role.as_str(), "rows": 0, "scoped_out": true }),
            );
            return Ok(snapshot);
        };

        match fenced("select_clients", self.store.select_clients(&filter)).await {
            Ok(clients) => {
                let rows = clients.len();
                let snapshot = self.set.apply(|current| current.with_all(clients));
                scope.success(
                    None,
                    json!({
                        "view": self.view.as_str(),
                        "role": role.as_str(),
                        "rows": rows,
                        "version": snapshot.version(),
                    }),
                );
                Ok(snapshot)
            }
            Err(err) => {
                let err = AppError::store_unavailable("select_clients", err)
                    .with_context("view", self.view.as_str());
                scope.fail(&err);
                Err(err)
            }
        }
    }
}
