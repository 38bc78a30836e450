use std::sync::{Arc, Mutex};

use crate::{
    model::{Client, Employee},
    sync::Snapshot,
};

fn contains_folded(haystack: &str, folded_needle: &str) -> bool {
    haystack.to_lowercase().contains(folded_needle)
}

fn client_matches_folded(client: &Client, folded_needle: &str) -> bool {
    contains_folded(&client.name, folded_needle)
        || contains_folded(&client.company, folded_needle)
        || contains_folded(&client.address, folded_needle)
}

/// Case-insensitive substring match on name, company or address.
pub fn client_matches(client: &Client, query: &str) -> bool {
    client_matches_folded(client, &query.to_lowercase())
}

/// Order-preserving subsequence of `clients` matching `query`. An empty
/// query returns the input unchanged.
pub fn filter_clients(clients: &[Client], query: &str) -> Vec<Client> {
    if query.is_empty() {
        return clients.to_vec();
    }
    let needle = query.to_lowercase();
    clients
        .iter()
        .filter(|client| client_matches_folded(client, &needle))
        .cloned()
        .collect()
}

pub fn filter_employees(employees: &[Employee], query: &str) -> Vec<Employee> {
    if query.is_empty() {
        return employees.to_vec();
    }
    let needle = query.to_lowercase();
    employees
        .iter()
        .filter(|employee| contains_folded(&employee.full_name, &needle))
        .cloned()
        .collect()
}

struct Cached {
    version: u64,
    query: String,
    rows: Arc<Vec<Client>>,
}

/// Search query plus the filtered view derived from it. The view is
/// recomputed whenever the snapshot version or the query differs from the
/// last computation, so a stale result is never returned.
#[derive(Default)]
pub struct SearchView {
    query: Mutex<String>,
    cache: Mutex<Option<Cached>>,
}

impl SearchView {
    pub fn query(&self) -> String {
        self.query.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set_query(&self, query: impl Into<String>) {
        *self.query.lock().unwrap_or_else(|e| e.into_inner()) = query.into();
    }

    pub fn apply(&self, snapshot: &Snapshot) -> Arc<Vec<Client>> {
        let query = self.query();
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(hit) = cache.as_ref() {
            if hit.version == snapshot.version() && hit.query == query {
                return hit.rows.clone();
            }
        }
        let rows = Arc::new(filter_clients(snapshot.clients(), &query));
        *cache = Some(Cached {
            version: snapshot.version(),
            query,
            rows: rows.clone(),
        });
        rows
    }
}
