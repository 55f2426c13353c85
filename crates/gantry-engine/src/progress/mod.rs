//! Progress monitoring: local monitors, presenters, and the
//! cross-boundary proxy pair

pub mod monitor;
pub mod presenter;
pub mod remote;

pub use monitor::{CancelHandle, ProgressMonitor, ProgressObserver, ProgressSnapshot};
pub use presenter::{LogObserver, NullObserver};
pub use remote::{
    remote_progress_pair, CancelTransport, CollectingFaultSink, FaultSink, ProgressMessage,
    ProgressTransport, RemoteProgressDispatcher, RemoteProgressForwarder, StderrFaultSink,
    TransportError,
};
