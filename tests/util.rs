#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

use std::sync::{Arc, Mutex};

use tracing::subscriber::{self, DefaultGuard};
use tracing_subscriber::{fmt, EnvFilter};

use clientdesk_lib::{
    identity::{Identity, IdentityProvider, StaticIdentity},
    model::{ClientStatus, Employee, Role},
    store::{MemoryStore, SqliteStore},
    ClientListScreen, ClientView,
};

pub fn employee(id: &str, full_name: &str, role: Role, is_active: bool) -> Employee {
    Employee {
        id: id.into(),
        full_name: full_name.into(),
        role,
        is_active,
    }
}

pub fn identity(user_id: &str, role: Role) -> Arc<dyn IdentityProvider> {
    Arc::new(StaticIdentity(Identity::new(user_id, role)))
}

/// Memory store with two ongoing clients, one completed client and a small staff.
pub fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.seed_client("Ada Lovelace", "Analytical Engines", "12 St James Sq", ClientStatus::Ongoing);
    store.seed_client("Grace Hopper", "Navy Labs", "1 Harbor Rd", ClientStatus::Ecomplete);
    store.seed_client("Linus", "Kernel Co", "Helsinki", ClientStatus::Ongoing);
    store.seed_employee(employee("emp-1", "Sam Carter", Role::Employee, true));
    store.seed_employee(employee("emp-2", "Jack O'Neill", Role::Employee, false));
    store.seed_employee(employee("fin-1", "Daniel Jackson", Role::FinanceEmployee, true));
    store.seed_employee(employee("fin-2", "Teal'c", Role::FinanceEmployee, false));
    store
}

pub fn memory_screen(
    store: &Arc<MemoryStore>,
    view: ClientView,
    user_id: &str,
    role: Role,
) -> ClientListScreen<MemoryStore, MemoryStore> {
    ClientListScreen::new(store.clone(), store.clone(), identity(user_id, role), view)
}

pub async fn sqlite_store() -> Arc<SqliteStore> {
    Arc::new(SqliteStore::in_memory().await.expect("open in-memory store"))
}

pub struct BufferWriter(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for BufferWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

pub fn init_buffer_subscriber() -> (Arc<Mutex<Vec<u8>>>, DefaultGuard) {
    let buffer: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
    let writer = buffer.clone();
    let subscriber = fmt()
        .with_env_filter(EnvFilter::new("clientdesk=debug"))
        .with_writer(move || BufferWriter(writer.clone()))
        .json()
        .finish();
    let guard = subscriber::set_default(subscriber);
    (buffer, guard)
}

/// Parsed JSON log lines emitted by the `clientdesk` target.
pub fn log_lines(buffer: &Arc<Mutex<Vec<u8>>>) -> Vec<serde_json::Value> {
    let raw = String::from_utf8(buffer.lock().unwrap().clone()).expect("log utf8");
    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("json log line"))
        .collect()
}
