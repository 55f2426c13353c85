//! Progress monitoring across an isolation boundary
//!
//! A task running in another process or sandbox reports progress
//! through a [`RemoteProgressForwarder`], which streams state changes
//! over a transport to a [`RemoteProgressDispatcher`] that applies
//! them to the real monitor on the local side. Cancellation travels
//! the other way, fire-and-forget, so no progress call ever blocks on
//! the boundary.
//!
//! Boundary failures never crash the reporting task: the first failure
//! is handed to the [`FaultSink`] and later sends become no-ops.

use crate::progress::monitor::{ProgressMonitor, ProgressObserver, ProgressSnapshot};
use crate::error::EngineResult;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};

/// One state change crossing the boundary, remote → local
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressMessage {
    BeginTask { task_name: String, total_work: f64 },
    SetStatus(String),
    Worked(f64),
    Done,
}

/// Failure to deliver across the boundary
#[derive(Debug, Clone)]
pub struct TransportError(pub String);

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "progress transport failed: {}", self.0)
    }
}

/// Carries progress messages from the remote side to the local side
pub trait ProgressTransport: Send {
    fn send(&self, message: ProgressMessage) -> Result<(), TransportError>;
}

impl ProgressTransport for Sender<ProgressMessage> {
    fn send(&self, message: ProgressMessage) -> Result<(), TransportError> {
        Sender::send(self, message).map_err(|e| TransportError(e.to_string()))
    }
}

/// Delivers the one-way cancellation signal, local → remote
pub trait CancelTransport: Send {
    fn send_cancel(&self) -> Result<(), TransportError>;
}

impl CancelTransport for Sender<()> {
    fn send_cancel(&self) -> Result<(), TransportError> {
        Sender::send(self, ()).map_err(|e| TransportError(e.to_string()))
    }
}

/// Receives faults that must not be raised to the faulting caller
pub trait FaultSink: Send + Sync {
    fn report(&self, context: &str, message: &str);
}

/// Writes faults to stderr
#[derive(Debug, Default)]
pub struct StderrFaultSink;

impl FaultSink for StderrFaultSink {
    fn report(&self, context: &str, message: &str) {
        eprintln!("gantry: {}: {}", context, message);
    }
}

/// Collects faults in memory; the test-facing sink
#[derive(Debug, Default, Clone)]
pub struct CollectingFaultSink {
    faults: Arc<Mutex<Vec<String>>>,
}

impl CollectingFaultSink {
    pub fn faults(&self) -> Vec<String> {
        self.faults.lock().expect("fault list poisoned").clone()
    }
}

impl FaultSink for CollectingFaultSink {
    fn report(&self, context: &str, message: &str) {
        self.faults
            .lock()
            .expect("fault list poisoned")
            .push(format!("{}: {}", context, message));
    }
}

/// Observer on the remote mirror that streams deltas across the
/// transport
struct ForwardingObserver {
    transport: Box<dyn ProgressTransport>,
    faults: Arc<dyn FaultSink>,
    broken: AtomicBool,
    last_completed: f64,
    last_status: String,
}

impl ForwardingObserver {
    fn send(&self, message: ProgressMessage) {
        if self.broken.load(Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.transport.send(message) {
            // Report the break once; everything after is a no-op.
            if !self.broken.swap(true, Ordering::SeqCst) {
                self.faults.report("remote progress forwarding", &e.to_string());
            }
        }
    }
}

impl ProgressObserver for ForwardingObserver {
    fn task_started(&mut self, snapshot: &ProgressSnapshot) {
        self.send(ProgressMessage::BeginTask {
            task_name: snapshot.task_name.clone(),
            total_work: snapshot.total_work,
        });
    }

    fn changed(&mut self, snapshot: &ProgressSnapshot) {
        if snapshot.completed_work > self.last_completed {
            let delta = snapshot.completed_work - self.last_completed;
            self.last_completed = snapshot.completed_work;
            self.send(ProgressMessage::Worked(delta));
        }
        if snapshot.status != self.last_status {
            self.last_status = snapshot.status.clone();
            self.send(ProgressMessage::SetStatus(snapshot.status.clone()));
        }
    }

    fn task_finished(&mut self, _snapshot: &ProgressSnapshot) {
        self.send(ProgressMessage::Done);
    }
}

/// Remote-side stand-in for a monitor that lives across the boundary.
///
/// Exposes the full monitor surface; every call is reflected in a
/// local mirror (so sub-monitor accounting stays exact) and streamed
/// to the owning side. Cancellation arrives asynchronously and is
/// observed at the next call to [`is_canceled`](Self::is_canceled) or
/// [`check_canceled`](Self::check_canceled).
pub struct RemoteProgressForwarder {
    mirror: ProgressMonitor,
    cancel_rx: Mutex<Receiver<()>>,
}

impl RemoteProgressForwarder {
    fn new(
        transport: Box<dyn ProgressTransport>,
        cancel_rx: Receiver<()>,
        faults: Arc<dyn FaultSink>,
    ) -> Self {
        let mirror = ProgressMonitor::new();
        mirror.add_observer(Box::new(ForwardingObserver {
            transport,
            faults,
            broken: AtomicBool::new(false),
            last_completed: 0.0,
            last_status: String::new(),
        }));
        Self {
            mirror,
            cancel_rx: Mutex::new(cancel_rx),
        }
    }

    pub fn begin_task(&self, task_name: &str, total_work: f64) -> EngineResult<()> {
        self.mirror.begin_task(task_name, total_work)
    }

    pub fn set_status(&self, status: &str) -> EngineResult<()> {
        self.mirror.set_status(status)
    }

    pub fn worked(&self, work_units: f64) -> EngineResult<()> {
        self.mirror.worked(work_units)
    }

    pub fn done(&self) {
        self.mirror.done();
    }

    /// Create a further sub-monitor on the remote side. Its progress
    /// flows through the mirror, so proportional accounting is
    /// preserved across the boundary.
    pub fn create_sub_monitor(&self, parent_units: f64) -> EngineResult<ProgressMonitor> {
        self.mirror.create_sub_monitor(parent_units)
    }

    /// Whether the owning side requested cancellation
    pub fn is_canceled(&self) -> bool {
        self.poll_cancel();
        self.mirror.is_canceled()
    }

    /// Cooperative cancellation checkpoint
    pub fn check_canceled(&self) -> EngineResult<()> {
        self.poll_cancel();
        self.mirror.check_canceled()
    }

    fn poll_cancel(&self) {
        let rx = self.cancel_rx.lock().expect("cancel receiver poisoned");
        match rx.try_recv() {
            Ok(()) => self.mirror.cancel(),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {}
        }
    }
}

/// Local-side counterpart: applies forwarded messages to the real
/// monitor and pushes cancellation back without blocking.
pub struct RemoteProgressDispatcher {
    monitor: ProgressMonitor,
    rx: Receiver<ProgressMessage>,
    faults: Arc<dyn FaultSink>,
}

impl RemoteProgressDispatcher {
    fn new(
        monitor: ProgressMonitor,
        rx: Receiver<ProgressMessage>,
        cancel_tx: Box<dyn CancelTransport>,
        faults: Arc<dyn FaultSink>,
    ) -> Self {
        // Fire-and-forget cancellation delivery; a dead remote side is
        // a fault, not an error for the canceling caller.
        let cancel_faults = faults.clone();
        monitor.on_canceled(move || {
            if let Err(e) = cancel_tx.send_cancel() {
                cancel_faults.report("remote cancel delivery", &e.to_string());
            }
        });

        Self { monitor, rx, faults }
    }

    /// Apply every message already queued, without blocking
    pub fn pump_pending(&self) {
        loop {
            match self.rx.try_recv() {
                Ok(message) => self.apply(message),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    /// Apply messages until the remote side finishes or disconnects,
    /// then return the monitor
    pub fn run(self) -> ProgressMonitor {
        while let Ok(message) = self.rx.recv() {
            let finished = matches!(message, ProgressMessage::Done);
            self.apply(message);
            if finished {
                break;
            }
        }
        self.monitor
    }

    /// The monitored task as seen on the local side
    pub fn monitor(&self) -> &ProgressMonitor {
        &self.monitor
    }

    fn apply(&self, message: ProgressMessage) {
        let result = match message {
            ProgressMessage::BeginTask {
                task_name,
                total_work,
            } => self.monitor.begin_task(&task_name, total_work),
            ProgressMessage::SetStatus(status) => self.monitor.set_status(&status),
            ProgressMessage::Worked(units) => self.monitor.worked(units),
            ProgressMessage::Done => {
                self.monitor.done();
                Ok(())
            }
        };
        if let Err(e) = result {
            self.faults.report("remote progress dispatch", &e.to_string());
        }
    }
}

/// Wire a forwarder/dispatcher pair over in-process channels.
///
/// Real isolation boundaries supply their own transports; the channel
/// pair carries the same protocol.
pub fn remote_progress_pair(
    monitor: ProgressMonitor,
    faults: Arc<dyn FaultSink>,
) -> (RemoteProgressForwarder, RemoteProgressDispatcher) {
    let (progress_tx, progress_rx) = mpsc::channel();
    let (cancel_tx, cancel_rx) = mpsc::channel::<()>();

    let forwarder =
        RemoteProgressForwarder::new(Box::new(progress_tx), cancel_rx, faults.clone());
    let dispatcher =
        RemoteProgressDispatcher::new(monitor, progress_rx, Box::new(cancel_tx), faults);
    (forwarder, dispatcher)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair_with_sink() -> (
        RemoteProgressForwarder,
        RemoteProgressDispatcher,
        CollectingFaultSink,
    ) {
        let sink = CollectingFaultSink::default();
        let (forwarder, dispatcher) =
            remote_progress_pair(ProgressMonitor::new(), Arc::new(sink.clone()));
        (forwarder, dispatcher, sink)
    }

    #[test]
    fn forwarded_sequence_reproduces_local_state() {
        let (forwarder, dispatcher, sink) = pair_with_sink();

        forwarder.begin_task("remote work", 10.0).unwrap();
        forwarder.set_status("crunching").unwrap();
        forwarder.worked(4.0).unwrap();
        forwarder.worked(2.0).unwrap();
        dispatcher.pump_pending();

        let local = dispatcher.monitor();
        assert!(local.is_running());
        assert_eq!(local.completed_work(), 6.0);
        assert_eq!(local.snapshot().status, "crunching");

        forwarder.done();
        dispatcher.pump_pending();
        assert!(dispatcher.monitor().is_done());
        assert_eq!(dispatcher.monitor().completed_work(), 10.0);
        assert!(sink.faults().is_empty());
    }

    #[test]
    fn remote_sub_monitor_preserves_proportions() {
        let (forwarder, dispatcher, _sink) = pair_with_sink();

        forwarder.begin_task("remote work", 10.0).unwrap();
        {
            let sub = forwarder.create_sub_monitor(5.0).unwrap();
            sub.begin_task("half", 2.0).unwrap();
            sub.worked(1.0).unwrap();
        }
        dispatcher.pump_pending();
        assert_eq!(dispatcher.monitor().completed_work(), 5.0);
    }

    #[test]
    fn cancellation_crosses_the_boundary_without_blocking() {
        let (forwarder, dispatcher, sink) = pair_with_sink();
        forwarder.begin_task("remote work", 10.0).unwrap();
        dispatcher.pump_pending();

        dispatcher.monitor().cancel();
        assert!(forwarder.is_canceled());
        assert!(forwarder.check_canceled().is_err());
        assert!(sink.faults().is_empty());
    }

    #[test]
    fn broken_channel_reports_one_fault_and_never_panics() {
        let (forwarder, dispatcher, sink) = pair_with_sink();
        drop(dispatcher);

        forwarder.begin_task("remote work", 10.0).unwrap();
        forwarder.worked(1.0).unwrap();
        forwarder.worked(1.0).unwrap();
        forwarder.done();

        assert_eq!(sink.faults().len(), 1);
    }

    #[test]
    fn cancel_after_remote_side_gone_reports_fault_only() {
        let sink = CollectingFaultSink::default();
        let (forwarder, dispatcher) =
            remote_progress_pair(ProgressMonitor::new(), Arc::new(sink.clone()));
        drop(forwarder);

        dispatcher.monitor().cancel();
        assert_eq!(sink.faults().len(), 1);
        assert!(sink.faults()[0].contains("remote cancel delivery"));
    }

    #[test]
    fn dispatcher_runs_on_a_worker_thread() {
        let (forwarder, dispatcher, _sink) = pair_with_sink();

        let pump = std::thread::spawn(move || dispatcher.run());

        forwarder.begin_task("remote work", 4.0).unwrap();
        forwarder.worked(4.0).unwrap();
        forwarder.done();

        let local = pump.join().unwrap();
        assert!(local.is_done());
        assert_eq!(local.completed_work(), 4.0);
    }
}
