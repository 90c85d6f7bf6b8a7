//! Cross-thread event delivery
//!
//! Background workers never touch objects. They post [`Event`]s naming a
//! [`TargetId`]; the interpreter thread drains the queue and resolves ids to
//! objects through the player's target table.
//!
//! A worker that must not run ahead of the interpreter posts an
//! [`Event::Sync`] right after its dispatch and blocks on the matching
//! rendezvous. The interpreter acknowledges it once every earlier event has
//! been dispatched.

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use flare_core::ObjectRef;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Identifier of an object that background work may post events to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(u64);

impl TargetId {
    /// Allocate a fresh id
    pub fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        TargetId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for TargetId {
    fn default() -> Self {
        Self::new()
    }
}

/// Interpreter-side table of live targets
///
/// The table holds a handle on each registered object, keeping it alive
/// until the worker posting to it retires.
pub type TargetTable = Rc<RefCell<FxHashMap<TargetId, ObjectRef>>>;

/// Create an empty target table
pub fn target_table() -> TargetTable {
    Rc::new(RefCell::new(FxHashMap::default()))
}

/// One-shot acknowledgement sent back to a blocked worker
#[derive(Debug)]
pub struct Rendezvous(Sender<()>);

/// Worker side of a [`Rendezvous`]
#[derive(Debug)]
pub struct RendezvousWait(Receiver<()>);

impl Rendezvous {
    /// Create a linked pair
    pub fn new() -> (Rendezvous, RendezvousWait) {
        let (tx, rx) = channel::bounded(1);
        (Rendezvous(tx), RendezvousWait(rx))
    }

    /// Release the waiting worker
    pub fn signal(self) {
        let _ = self.0.send(());
    }
}

impl RendezvousWait {
    /// Block until signalled
    ///
    /// Returns `false` if the rendezvous was dropped unsignalled, which
    /// happens when the player shuts down.
    pub fn wait(self) -> bool {
        self.0.recv().is_ok()
    }
}

/// Something for the interpreter thread to do
#[derive(Debug)]
pub enum Event {
    /// Dispatch an event of type `kind` on `target`
    Dispatch {
        /// Receiving object
        target: TargetId,
        /// Event type (`"timer"`, `"timerComplete"`, ...)
        kind: String,
    },
    /// Acknowledge once every earlier event is dispatched
    Sync(Rendezvous),
    /// The worker for `target` is done; drop the table entry
    Retire(TargetId),
}

/// Producer handle, cloneable and `Send`
#[derive(Debug, Clone)]
pub struct EventSender(Sender<Event>);

impl EventSender {
    /// Post an event; `false` if the queue is gone
    pub fn send(&self, event: Event) -> bool {
        self.0.send(event).is_ok()
    }

    /// Post a dispatch
    pub fn dispatch(&self, target: TargetId, kind: &str) -> bool {
        self.send(Event::Dispatch {
            target,
            kind: kind.to_string(),
        })
    }

    /// Post a sync point and block until the interpreter reaches it
    ///
    /// Returns `false` if the queue went away first.
    pub fn sync(&self) -> bool {
        let (rendezvous, wait) = Rendezvous::new();
        self.send(Event::Sync(rendezvous)) && wait.wait()
    }

    /// Post a retirement
    pub fn retire(&self, target: TargetId) -> bool {
        self.send(Event::Retire(target))
    }
}

/// Consumer side, owned by the interpreter thread
#[derive(Debug)]
pub struct EventQueue {
    tx: Sender<Event>,
    rx: Receiver<Event>,
}

impl EventQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        let (tx, rx) = channel::unbounded();
        Self { tx, rx }
    }

    /// New producer handle
    pub fn sender(&self) -> EventSender {
        EventSender(self.tx.clone())
    }

    /// Take the next event without blocking
    pub fn try_next(&self) -> Option<Event> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Take the next event, waiting up to `timeout`
    pub fn next_timeout(&self, timeout: Duration) -> Option<Event> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Events waiting to be drained
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether nothing is waiting
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Drop everything queued, releasing blocked producers
    pub fn clear(&self) -> usize {
        self.rx.try_iter().count()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Cooperative stop flag
///
/// Workers look at it only after each sleep, so an in-flight sleep always
/// completes before the worker notices.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Fresh, uncancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether a stop was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
