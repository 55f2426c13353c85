//! Test sessions and the session manager
//!
//! A session is a container with at most one "current" run and an
//! append-only history of every run it created. The manager tracks
//! open sessions and fires lifecycle events as they open and close.

use crate::error::{EngineError, EngineResult};
use crate::runner::events::EventHandlers;
use crate::runner::run::{RunConfig, TestRun};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

struct SessionState {
    id: Uuid,
    open: AtomicBool,
    current: Mutex<Option<TestRun>>,
    history: Mutex<Vec<TestRun>>,
    run_changed: EventHandlers<TestRun>,
}

/// Handle to one test session. Cloneable; all clones share the same
/// session.
#[derive(Clone)]
pub struct TestSession {
    state: Arc<SessionState>,
}

impl TestSession {
    fn new() -> Self {
        Self {
            state: Arc::new(SessionState {
                id: Uuid::new_v4(),
                open: AtomicBool::new(true),
                current: Mutex::new(None),
                history: Mutex::new(Vec::new()),
                run_changed: EventHandlers::new(),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.state.id
    }

    pub fn is_open(&self) -> bool {
        self.state.open.load(Ordering::SeqCst)
    }

    /// Create a run and make it current. The previous current run
    /// keeps executing and finishing on its own; the session does not
    /// cancel it.
    pub fn create_run(&self, config: RunConfig) -> EngineResult<TestRun> {
        if !self.is_open() {
            return Err(EngineError::SessionClosed);
        }

        let run = TestRun::new(config);
        {
            let mut current = self.state.current.lock().expect("current run poisoned");
            *current = Some(run.clone());
        }
        self.state
            .history
            .lock()
            .expect("run history poisoned")
            .push(run.clone());
        self.state.run_changed.emit(&run);
        Ok(run)
    }

    /// The current run, if any
    pub fn current_run(&self) -> Option<TestRun> {
        self.state
            .current
            .lock()
            .expect("current run poisoned")
            .clone()
    }

    /// Every run this session created, oldest first
    pub fn history(&self) -> Vec<TestRun> {
        self.state
            .history
            .lock()
            .expect("run history poisoned")
            .clone()
    }

    /// Notified whenever the current-run pointer is replaced
    pub fn on_run_changed(&self, handler: impl Fn(&TestRun) + Send + Sync + 'static) {
        self.state.run_changed.subscribe(handler);
    }

    /// Close the session exactly once; further operations fail
    fn close(&self) -> EngineResult<()> {
        if self.state.open.swap(false, Ordering::SeqCst) {
            Ok(())
        } else {
            Err(EngineError::SessionClosed)
        }
    }
}

/// Tracks open sessions by id and fires opened/closed events
pub struct SessionManager {
    sessions: Mutex<HashMap<Uuid, TestSession>>,
    opened: EventHandlers<TestSession>,
    closed: EventHandlers<TestSession>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            opened: EventHandlers::new(),
            closed: EventHandlers::new(),
        }
    }

    /// Open a new session
    pub fn open_session(&self) -> TestSession {
        let session = TestSession::new();
        self.sessions
            .lock()
            .expect("session map poisoned")
            .insert(session.id(), session.clone());
        self.opened.emit(&session);
        session
    }

    /// Look up an open session
    pub fn session(&self, id: Uuid) -> Option<TestSession> {
        self.sessions
            .lock()
            .expect("session map poisoned")
            .get(&id)
            .cloned()
    }

    /// Ids of every open session
    pub fn open_sessions(&self) -> Vec<TestSession> {
        self.sessions
            .lock()
            .expect("session map poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// Close a session and forget it
    pub fn close_session(&self, id: Uuid) -> EngineResult<()> {
        let session = self
            .sessions
            .lock()
            .expect("session map poisoned")
            .remove(&id)
            .ok_or_else(|| EngineError::UnknownSession(id.to_string()))?;
        session.close()?;
        self.closed.emit(&session);
        Ok(())
    }

    pub fn on_session_opened(&self, handler: impl Fn(&TestSession) + Send + Sync + 'static) {
        self.opened.subscribe(handler);
    }

    pub fn on_session_closed(&self, handler: impl Fn(&TestSession) + Send + Sync + 'static) {
        self.closed.subscribe(handler);
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}
