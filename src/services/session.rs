use std::sync::{Arc, PoisonError, RwLock};

use crate::models::Principal;
use crate::services::actor::BackendActor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStatus {
    Idle,
    Connecting,
    Ready,
}

#[derive(Default)]
struct SessionState {
    actor: Option<Arc<dyn BackendActor>>,
    connecting: bool,
}

/// Identity plus the actor bound to it. Queries are only enabled while ready.
#[derive(Clone, Default)]
pub struct Session {
    inner: Arc<RwLock<SessionState>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_connecting(&self) {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        state.actor = None;
        state.connecting = true;
    }

    pub fn connect(&self, actor: Arc<dyn BackendActor>) {
        let principal = actor.principal();
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        state.actor = Some(actor);
        state.connecting = false;
        tracing::info!(principal = %principal, "session connected");
    }

    pub fn disconnect(&self) {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        state.actor = None;
        state.connecting = false;
    }

    pub fn status(&self) -> LoginStatus {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        match (&state.actor, state.connecting) {
            (_, true) => LoginStatus::Connecting,
            (Some(_), false) => LoginStatus::Ready,
            (None, false) => LoginStatus::Idle,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status() == LoginStatus::Ready
    }

    pub fn actor(&self) -> Option<Arc<dyn BackendActor>> {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        if state.connecting {
            return None;
        }
        state.actor.clone()
    }

    /// Authenticated identity; the anonymous principal does not count.
    pub fn identity(&self) -> Option<Principal> {
        self.actor()
            .map(|actor| actor.principal())
            .filter(|p| !p.is_anonymous())
    }
}
