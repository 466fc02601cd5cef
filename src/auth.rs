use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use ulid::Ulid;

use crate::engine::Engine;

/// Answers "who is making this request". `None` means signed out.
#[async_trait]
pub trait IdentitySource: Send + Sync {
    async fn current_requester(&self) -> Option<Ulid>;
}

/// An identity already known to the caller.
#[derive(Debug, Clone, Copy)]
pub struct StaticIdentity(pub Option<Ulid>);

#[async_trait]
impl IdentitySource for StaticIdentity {
    async fn current_requester(&self) -> Option<Ulid> {
        self.0
    }
}

/// Session token → email, as handed out by the sign-in provider.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: DashMap<String, String>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sign_in(&self, token: impl Into<String>, email: impl Into<String>) {
        self.sessions.insert(token.into(), email.into());
    }

    pub fn sign_out(&self, token: &str) {
        self.sessions.remove(token);
    }

    /// Identity for one request carrying `token` (or no token at all).
    pub fn identity(&self, engine: Arc<Engine>, token: Option<&str>) -> SessionIdentity {
        let email = token.and_then(|t| self.sessions.get(t).map(|e| e.value().clone()));
        SessionIdentity { engine, email }
    }
}

/// Resolves the session's email to a registered user.
pub struct SessionIdentity {
    engine: Arc<Engine>,
    email: Option<String>,
}

#[async_trait]
impl IdentitySource for SessionIdentity {
    async fn current_requester(&self) -> Option<Ulid> {
        let email = self.email.as_deref()?;
        self.engine.find_user_by_email(email).await.map(|u| u.id)
    }
}
