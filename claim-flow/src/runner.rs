//! FlowRunner – wraps the controller with the _load → step → save_ pattern.
//!
//! ## When should you use `FlowRunner`?
//! * **Web services**: one user message per HTTP request; the reply goes back to the client
//!   and the session is saved for the next roundtrip.
//! * **Tests and demos**: no need to repeat the load-step-save boilerplate.
//!
//! Use [`FlowController::step`] directly when you already own the [`Session`]
//! and manage persistence yourself.
//!
//! Turns for the same session are serialized: a second message waits until
//! the first one has been stepped and saved. Different sessions never wait
//! on each other.
//!
//! ```rust,ignore
//! // At startup
//! let runner = FlowRunner::new(controller, Arc::new(InMemorySessionStore::new()));
//!
//! // In request handler
//! let turn = runner.run(&session_id, &message).await?;
//! ```

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::{
    controller::FlowController,
    error::{FlowError, Result},
    storage::{Session, SessionStore, UserProfile},
    turn::Turn,
};

/// High-level helper that owns session persistence around the controller.
#[derive(Clone)]
pub struct FlowRunner {
    controller: Arc<FlowController>,
    store: Arc<dyn SessionStore>,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl FlowRunner {
    pub fn new(controller: Arc<FlowController>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            controller,
            store,
            locks: Arc::new(DashMap::new()),
        }
    }

    pub fn controller(&self) -> &FlowController {
        &self.controller
    }

    /// Create and persist a fresh session for `user`
    pub async fn open(&self, user: UserProfile) -> Result<Session> {
        let session = Session::for_user(user);
        self.store.save(session.clone()).await?;
        debug!(session_id = %session.id, user = %session.user.email, "session opened");
        Ok(session)
    }

    pub async fn session(&self, session_id: &str) -> Result<Session> {
        self.store
            .get(session_id)
            .await?
            .ok_or_else(|| FlowError::SessionNotFound(session_id.to_string()))
    }

    /// Process one user message for `session_id` and persist the result.
    ///
    /// The session is saved only when the step succeeds, so a failed turn
    /// leaves the stored conversation untouched.
    pub async fn run(&self, session_id: &str, message: &str) -> Result<Turn> {
        let lock = self.lock_for(session_id);
        let guard = lock.lock().await;

        let Some(mut session) = self.store.get(session_id).await? else {
            drop(guard);
            self.locks.remove(session_id);
            return Err(FlowError::SessionNotFound(session_id.to_string()));
        };

        let turn = self.controller.step(&mut session, message).await?;
        self.store.save(session).await?;
        drop(guard);
        Ok(turn)
    }

    /// Drop the session. Closing an unknown session is not an error.
    pub async fn close(&self, session_id: &str) -> Result<()> {
        let lock = self.lock_for(session_id);
        {
            let _guard = lock.lock().await;
            self.store.delete(session_id).await?;
        }
        self.locks.remove(session_id);
        debug!(session_id = %session_id, "session closed");
        Ok(())
    }

    fn lock_for(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(session_id.to_string())
            .or_default()
            .value()
            .clone()
    }
}
