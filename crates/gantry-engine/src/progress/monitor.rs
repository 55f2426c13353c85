//! Hierarchical progress monitoring
//!
//! A [`ProgressMonitor`] tracks one long-running task: name, total and
//! completed work units, a status line, and a cancellation flag. Work
//! can be subdivided by creating sub-monitors that represent a fixed
//! share of the parent's total and forward their progress
//! proportionally.
//!
//! Monitors are single-writer: only the thread driving the task may
//! call `begin_task`, `worked`, `set_status`, `done` or
//! `create_sub_monitor`. Cancellation is the one exception: a
//! [`CancelHandle`] may be used from any thread.

use crate::error::{EngineError, EngineResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// Point-in-time copy of a monitor's state, handed to observers
#[derive(Debug, Clone)]
pub struct ProgressSnapshot {
    pub task_name: String,
    pub status: String,
    /// Total work units, or NaN while unknown/indeterminate
    pub total_work: f64,
    pub completed_work: f64,
    pub is_running: bool,
    pub is_done: bool,
    pub is_canceled: bool,
    /// Name of the active sub-task, if one is running
    pub child_task: Option<String>,
}

impl ProgressSnapshot {
    /// Completed fraction in `0.0..=1.0`, or `None` while the total is
    /// indeterminate
    pub fn fraction(&self) -> Option<f64> {
        if self.total_work.is_nan() {
            None
        } else {
            Some(self.completed_work / self.total_work)
        }
    }
}

/// Observes the state changes of one monitor.
///
/// Observers render or forward progress; they never own monitor state.
pub trait ProgressObserver: Send {
    fn task_started(&mut self, _snapshot: &ProgressSnapshot) {}
    fn changed(&mut self, _snapshot: &ProgressSnapshot) {}
    fn task_finished(&mut self, _snapshot: &ProgressSnapshot) {}
}

type CancelCallback = Box<dyn FnOnce() + Send>;

struct ParentLink {
    parent: Arc<MonitorShared>,
    parent_units: f64,
}

#[derive(Default)]
struct MonitorState {
    task_name: String,
    status: String,
    total_work: f64,
    completed_work: f64,
    began: bool,
    is_running: bool,
    is_done: bool,
    child: Option<Weak<MonitorShared>>,
    child_name: Option<String>,
}

struct MonitorShared {
    state: Mutex<MonitorState>,
    canceled: AtomicBool,
    cancel_callbacks: Mutex<Vec<CancelCallback>>,
    observers: Mutex<Vec<Box<dyn ProgressObserver>>>,
    parent: Option<ParentLink>,
}

enum Notification {
    Started,
    Changed,
    Finished,
}

impl MonitorShared {
    fn new(parent: Option<ParentLink>) -> Self {
        Self {
            state: Mutex::new(MonitorState {
                total_work: f64::NAN,
                ..MonitorState::default()
            }),
            canceled: AtomicBool::new(false),
            cancel_callbacks: Mutex::new(Vec::new()),
            observers: Mutex::new(Vec::new()),
            parent,
        }
    }

    fn snapshot(&self) -> ProgressSnapshot {
        let state = self.state.lock().expect("monitor state poisoned");
        ProgressSnapshot {
            task_name: state.task_name.clone(),
            status: state.status.clone(),
            total_work: state.total_work,
            completed_work: state.completed_work,
            is_running: state.is_running,
            is_done: state.is_done,
            is_canceled: self.canceled.load(Ordering::SeqCst),
            child_task: state.child_name.clone(),
        }
    }

    fn notify(&self, kind: Notification) {
        let snapshot = self.snapshot();
        let mut observers = self.observers.lock().expect("observer list poisoned");
        for observer in observers.iter_mut() {
            match kind {
                Notification::Started => observer.task_started(&snapshot),
                Notification::Changed => observer.changed(&snapshot),
                Notification::Finished => observer.task_finished(&snapshot),
            }
        }
    }

    fn begin_task(self: &Arc<Self>, task_name: &str, total_work: f64) -> EngineResult<()> {
        if total_work.is_infinite() || (!total_work.is_nan() && total_work <= 0.0) {
            return Err(EngineError::out_of_range(
                "total work units",
                "finite and positive, or NaN for indeterminate",
                total_work,
            ));
        }

        {
            let state = self.state.lock().expect("monitor state poisoned");
            if state.is_running {
                return Err(EngineError::invalid_state("task may not be started twice"));
            }
            if state.is_done {
                return Err(EngineError::invalid_state(
                    "task may not be restarted after it completes",
                ));
            }
        }

        // Register with the parent before committing, so a rejected
        // sub-task leaves this monitor untouched.
        if let Some(link) = &self.parent {
            link.parent.begin_sub_task(Arc::downgrade(self), task_name)?;
        }

        {
            let mut state = self.state.lock().expect("monitor state poisoned");
            state.began = true;
            state.is_running = true;
            state.total_work = total_work;
            state.task_name = task_name.to_string();
        }

        self.notify(Notification::Started);
        self.notify(Notification::Changed);
        Ok(())
    }

    fn set_status(&self, status: &str) -> EngineResult<()> {
        {
            let mut state = self.state.lock().expect("monitor state poisoned");
            if !state.is_running {
                return Err(EngineError::invalid_state(
                    "status cannot be set unless the task is running",
                ));
            }
            if state.status == status {
                return Ok(());
            }
            state.status = status.to_string();
        }
        self.notify(Notification::Changed);
        Ok(())
    }

    fn worked(&self, work_units: f64) -> EngineResult<()> {
        if !work_units.is_finite() || work_units < 0.0 {
            return Err(EngineError::out_of_range(
                "work units",
                "finite and non-negative",
                work_units,
            ));
        }

        let (delta, total) = {
            let mut state = self.state.lock().expect("monitor state poisoned");
            if !state.is_running {
                return Err(EngineError::invalid_state(
                    "work may not be reported unless the task is running",
                ));
            }

            let mut new_completed = state.completed_work + work_units;
            if !state.total_work.is_nan() && new_completed > state.total_work {
                new_completed = state.total_work;
            }
            let delta = new_completed - state.completed_work;
            state.completed_work = new_completed;
            (delta, state.total_work)
        };

        if delta > 0.0 {
            self.notify(Notification::Changed);
            self.forward_to_parent(delta, total)?;
        }
        Ok(())
    }

    /// Forward a completed-work delta to the parent in proportion to
    /// this sub-task's allotted share
    fn forward_to_parent(&self, delta: f64, total: f64) -> EngineResult<()> {
        if let Some(link) = &self.parent {
            if !total.is_nan() {
                link.parent.worked(delta * link.parent_units / total)?;
            }
        }
        Ok(())
    }

    fn done(&self) {
        // Finish any active sub-task first, exactly as if it had been
        // told the work was done.
        let child = {
            let state = self.state.lock().expect("monitor state poisoned");
            state.child.as_ref().and_then(Weak::upgrade)
        };
        if let Some(child) = child {
            child.done();
        }

        let (final_delta, total, began) = {
            let mut state = self.state.lock().expect("monitor state poisoned");
            if state.is_done {
                return;
            }
            state.is_running = false;
            state.is_done = true;

            let mut final_delta = 0.0;
            if !state.total_work.is_nan() && state.completed_work != state.total_work {
                final_delta = state.total_work - state.completed_work;
                state.completed_work = state.total_work;
            }
            (final_delta, state.total_work, state.began)
        };

        // One last worked delta before the terminal notification.
        if final_delta > 0.0 {
            self.notify(Notification::Changed);
            let _ = self.forward_to_parent(final_delta, total);
        }

        if let Some(link) = &self.parent {
            if began {
                // An indeterminate sub-task contributes its full share
                // only once it finishes.
                if total.is_nan() {
                    let _ = link.parent.worked(link.parent_units);
                }
                link.parent.end_sub_task(self);
            }
        }

        self.notify(Notification::Finished);
    }

    fn begin_sub_task(&self, child: Weak<MonitorShared>, name: &str) -> EngineResult<()> {
        {
            let mut state = self.state.lock().expect("monitor state poisoned");
            if !state.is_running {
                return Err(EngineError::invalid_state(
                    "sub-tasks may not be started unless the task is running",
                ));
            }
            if state.child.as_ref().is_some_and(|c| c.strong_count() > 0) {
                return Err(EngineError::invalid_state(
                    "there is already an active sub-task",
                ));
            }
            state.child = Some(child);
            state.child_name = Some(name.to_string());
        }
        self.notify(Notification::Changed);
        Ok(())
    }

    fn end_sub_task(&self, child: &MonitorShared) {
        {
            let mut state = self.state.lock().expect("monitor state poisoned");
            let is_current = state
                .child
                .as_ref()
                .and_then(Weak::upgrade)
                .is_some_and(|c| std::ptr::eq(Arc::as_ptr(&c), child));
            if !is_current {
                return;
            }
            state.child = None;
            state.child_name = None;
        }
        self.notify(Notification::Changed);
    }

    /// Set the canceled flag exactly once and run the registered
    /// callbacks outside any lock. Safe to call from any thread.
    fn cancel(&self) {
        if self.canceled.swap(true, Ordering::SeqCst) {
            return;
        }

        let callbacks = {
            let mut callbacks = self.cancel_callbacks.lock().expect("cancel list poisoned");
            std::mem::take(&mut *callbacks)
        };
        for callback in callbacks {
            callback();
        }

        // Cancellation flows both ways through the sub-task chain;
        // idempotence terminates the walk.
        if let Some(link) = &self.parent {
            link.parent.cancel();
        }
        let child = {
            let state = self.state.lock().expect("monitor state poisoned");
            state.child.as_ref().and_then(Weak::upgrade)
        };
        if let Some(child) = child {
            child.cancel();
        }
    }

    fn on_canceled(&self, callback: CancelCallback) {
        let run_now = {
            let mut callbacks = self.cancel_callbacks.lock().expect("cancel list poisoned");
            if self.canceled.load(Ordering::SeqCst) {
                true
            } else {
                callbacks.push(callback);
                return;
            }
        };
        if run_now {
            callback();
        }
    }
}

/// Owner handle for one task's progress monitor.
///
/// Dropping the handle is equivalent to calling [`done`](Self::done).
pub struct ProgressMonitor {
    shared: Arc<MonitorShared>,
}

impl ProgressMonitor {
    /// Create a root monitor
    pub fn new() -> Self {
        Self {
            shared: Arc::new(MonitorShared::new(None)),
        }
    }

    /// Attach an observer. Observers attached after `begin_task` miss
    /// the start notification.
    pub fn add_observer(&self, observer: Box<dyn ProgressObserver>) {
        self.shared
            .observers
            .lock()
            .expect("observer list poisoned")
            .push(observer);
    }

    /// Notify that the task is starting.
    ///
    /// `total_work` must be finite and positive, or NaN for an
    /// indeterminate amount. Fails if called twice or after `done`.
    pub fn begin_task(&self, task_name: &str, total_work: f64) -> EngineResult<()> {
        self.shared.begin_task(task_name, total_work)
    }

    /// Set the status line. No notification is sent when the text is
    /// unchanged.
    pub fn set_status(&self, status: &str) -> EngineResult<()> {
        self.shared.set_status(status)
    }

    /// Report completed work units. The cumulative total is clamped at
    /// `total_work`; excess is silently discarded.
    pub fn worked(&self, work_units: f64) -> EngineResult<()> {
        self.shared.worked(work_units)
    }

    /// Notify that the work is done. Idempotent; finishes any active
    /// sub-task first and forces the completed count to the total.
    pub fn done(&self) {
        self.shared.done();
    }

    /// Request cancellation. The only operation safe to invoke from
    /// another thread; see [`CancelHandle`].
    pub fn cancel(&self) {
        self.shared.cancel();
    }

    /// Whether cancellation has been requested
    pub fn is_canceled(&self) -> bool {
        self.shared.canceled.load(Ordering::SeqCst)
    }

    /// Cooperative checkpoint: fail with [`EngineError::Canceled`] if
    /// cancellation was requested
    pub fn check_canceled(&self) -> EngineResult<()> {
        if self.is_canceled() {
            Err(EngineError::Canceled)
        } else {
            Ok(())
        }
    }

    /// Register a callback run when cancellation occurs. A callback
    /// registered after cancellation fires immediately. Callbacks must
    /// not block and must not call back into the monitor.
    pub fn on_canceled(&self, callback: impl FnOnce() + Send + 'static) {
        self.shared.on_canceled(Box::new(callback));
    }

    /// A cloneable handle restricted to the thread-safe cancellation
    /// surface
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            shared: self.shared.clone(),
        }
    }

    /// Create a sub-monitor representing `parent_units` of this task's
    /// total work.
    ///
    /// The sub-task forwards progress proportionally as it works; an
    /// indeterminate sub-task contributes its full share when it
    /// finishes. Only one sub-task may be active at a time; beginning a
    /// second one fails.
    pub fn create_sub_monitor(&self, parent_units: f64) -> EngineResult<ProgressMonitor> {
        if !parent_units.is_finite() || parent_units < 0.0 {
            return Err(EngineError::out_of_range(
                "parent work units",
                "finite and non-negative",
                parent_units,
            ));
        }

        let child = Arc::new(MonitorShared::new(Some(ParentLink {
            parent: self.shared.clone(),
            parent_units,
        })));
        if self.is_canceled() {
            child.canceled.store(true, Ordering::SeqCst);
        }
        Ok(ProgressMonitor { shared: child })
    }

    /// Current state as a snapshot
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.shared.snapshot()
    }

    /// Total work units, NaN while unknown
    pub fn total_work(&self) -> f64 {
        self.shared.state.lock().expect("monitor state poisoned").total_work
    }

    /// Work units completed so far
    pub fn completed_work(&self) -> f64 {
        self.shared
            .state
            .lock()
            .expect("monitor state poisoned")
            .completed_work
    }

    /// Whether `begin_task` has been called and `done` has not
    pub fn is_running(&self) -> bool {
        self.shared.state.lock().expect("monitor state poisoned").is_running
    }

    /// Whether `done` has been called
    pub fn is_done(&self) -> bool {
        self.shared.state.lock().expect("monitor state poisoned").is_done
    }
}

impl Default for ProgressMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ProgressMonitor {
    fn drop(&mut self) {
        self.shared.done();
    }
}

/// Thread-safe cancellation surface of a monitor.
///
/// Cloneable and sendable; `cancel` may be called concurrently with
/// the task thread's own operations.
#[derive(Clone)]
pub struct CancelHandle {
    shared: Arc<MonitorShared>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.shared.cancel();
    }

    pub fn is_canceled(&self) -> bool {
        self.shared.canceled.load(Ordering::SeqCst)
    }

    pub fn on_canceled(&self, callback: impl FnOnce() + Send + 'static) {
        self.shared.on_canceled(Box::new(callback));
    }
}
