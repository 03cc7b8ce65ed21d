//! Connection lifetimes.
//!
//! A client runs in one [`ConnectionMode`] for its whole life:
//!
//! - `PerRequest`: a connection is opened for one call and dropped after it.
//! - `PerWorker`: each worker (a thread, or a caller-named task) lazily gets
//!   its own connection. A thread's connection is dropped when the thread
//!   exits; a named worker keeps its connection until it is explicitly closed.
//! - `Single`: one connection shared by every caller, with the same lazy
//!   create and explicit close semantics.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::thread::ThreadId;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// How long connections live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionMode {
    #[default]
    PerRequest,
    PerWorker,
    Single,
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionMode::PerRequest => "per-request",
            ConnectionMode::PerWorker => "per-worker",
            ConnectionMode::Single => "single",
        })
    }
}

/// Identity of a logical worker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WorkerKey {
    Thread(ThreadId),
    Named(String),
}

impl WorkerKey {
    /// The calling thread.
    pub fn current() -> Self {
        WorkerKey::Thread(std::thread::current().id())
    }

    pub fn named(name: impl Into<String>) -> Self {
        WorkerKey::Named(name.into())
    }
}

/// Key of a pooled connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SlotKey {
    Worker(WorkerKey),
    Shared,
}

/// Which pool slot, if any, a call in `mode` uses. `None` means the call
/// gets a fresh connection of its own.
pub fn slot_for(mode: ConnectionMode, worker: &WorkerKey) -> Option<SlotKey> {
    match mode {
        ConnectionMode::PerRequest => None,
        ConnectionMode::PerWorker => Some(SlotKey::Worker(worker.clone())),
        ConnectionMode::Single => Some(SlotKey::Shared),
    }
}

type Slots<C> = Mutex<HashMap<SlotKey, Arc<C>>>;

/// Slot of the current thread in one pool, released when the thread exits.
trait ThreadSlot {
    fn is_in(&self, pool: *const ()) -> bool;
    fn is_live(&self) -> bool;
    fn release(&self);
}

struct ThreadSlotGuard<C> {
    slots: Weak<Slots<C>>,
    key: SlotKey,
}

impl<C> ThreadSlot for ThreadSlotGuard<C> {
    fn is_in(&self, pool: *const ()) -> bool {
        std::ptr::eq(self.slots.as_ptr().cast::<()>(), pool)
    }

    fn is_live(&self) -> bool {
        self.slots.strong_count() > 0
    }

    fn release(&self) {
        if let Some(slots) = self.slots.upgrade() {
            slots
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&self.key);
        }
    }
}

#[derive(Default)]
struct ThreadSlots(Vec<Box<dyn ThreadSlot>>);

impl Drop for ThreadSlots {
    fn drop(&mut self) {
        for slot in &self.0 {
            slot.release();
        }
    }
}

thread_local! {
    static THREAD_SLOTS: RefCell<ThreadSlots> = RefCell::new(ThreadSlots::default());
}

/// Pooled connections keyed by slot.
///
/// Slots keyed by the current thread are released when that thread exits.
/// Named and shared slots stay until [`close`](Self::close) or
/// [`close_all`](Self::close_all).
#[derive(Debug)]
pub struct ConnectionPool<C> {
    slots: Arc<Slots<C>>,
}

impl<C> Default for ConnectionPool<C> {
    fn default() -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<C: Send + Sync + 'static> ConnectionPool<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The connection in `key`, created with `connect` if the slot is empty.
    pub fn acquire(&self, key: &SlotKey, connect: impl FnOnce() -> Result<C>) -> Result<Arc<C>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(conn) = slots.get(key) {
            return Ok(Arc::clone(conn));
        }
        let conn = Arc::new(connect()?);
        slots.insert(key.clone(), Arc::clone(&conn));
        drop(slots);

        if let SlotKey::Worker(WorkerKey::Thread(id)) = key {
            if *id == std::thread::current().id() {
                self.release_on_thread_exit(key);
            }
        }
        Ok(conn)
    }

    fn release_on_thread_exit(&self, key: &SlotKey) {
        let pool = Arc::as_ptr(&self.slots).cast::<()>();
        let guard = ThreadSlotGuard {
            slots: Arc::downgrade(&self.slots),
            key: key.clone(),
        };
        // Already gone when the thread is tearing down its locals.
        let _ = THREAD_SLOTS.try_with(|registered| {
            let mut registered = registered.borrow_mut();
            registered.0.retain(|slot| slot.is_live());
            if !registered.0.iter().any(|slot| slot.is_in(pool)) {
                registered.0.push(Box::new(guard));
            }
        });
    }

    /// Drop the connection in `key`. Callers still holding it finish their
    /// exchange; the next acquire opens a new one. Returns whether the slot
    /// was occupied.
    pub fn close(&self, key: &SlotKey) -> bool {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some()
    }

    /// Drop every pooled connection.
    pub fn close_all(&self) {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of pooled connections.
    pub fn open_count(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
