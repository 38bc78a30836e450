use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::model::Role;

/// The signed-in user as seen by a screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }
}

/// Supplies the current identity; `None` until the role is known.
pub trait IdentityProvider: Send + Sync {
    fn current(&self) -> Option<Identity>;
}

/// Fixed identity, used by the CLI and tests.
#[derive(Debug, Clone)]
pub struct StaticIdentity(pub Identity);

impl IdentityProvider for StaticIdentity {
    fn current(&self) -> Option<Identity> {
        Some(self.0.clone())
    }
}

/// Session-backed identity that can be set after the screen exists.
#[derive(Debug, Default)]
pub struct SessionIdentity {
    inner: RwLock<Option<Identity>>,
}

impl SessionIdentity {
    pub fn sign_in(&self, identity: Identity) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(identity);
    }

    pub fn sign_out(&self) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *guard = None;
    }
}

impl IdentityProvider for SessionIdentity {
    fn current(&self) -> Option<Identity> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
