use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use tokio::sync::oneshot;
use tracing::trace;

use crate::connection::{Chain, Connection, Node};
use crate::listener::IntoListener;
use crate::scheduler::Scheduler;

/// A single emission point with any number of independently revocable
/// listeners.
///
/// Listeners run through the signal's [`Scheduler`], never inline with the
/// firing call. Within one emission they are scheduled in chain order, which
/// is most-recently-connected-first. Cloning the signal yields another handle
/// to the same emission point.
pub struct Signal<T>(Rc<Inner<T>>);

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self { Self(self.0.clone()) }
}

/// Rendezvous slot for one task parked in [`Signal::wait`]. Taking the sender
/// out resumes (on send) or cancels (on drop) that task.
type WaitSlot<T> = Rc<RefCell<Option<oneshot::Sender<T>>>>;

struct Inner<T> {
    chain: Chain<T>,
    waiting: RefCell<HashMap<usize, WaitSlot<T>>>,
    next_waiter: Cell<usize>,
    scheduler: Scheduler,
}

impl<T: 'static> Signal<T> {
    /// Creates a signal dispatching through the given scheduler handle.
    pub fn new(scheduler: &Scheduler) -> Self {
        Self(Rc::new(Inner {
            chain: Chain::new(),
            waiting: RefCell::new(HashMap::new()),
            next_waiter: Cell::new(0),
            scheduler: scheduler.clone(),
        }))
    }

    /// Connects a listener. It will be invoked with the payload of every
    /// subsequent emission until disconnected.
    pub fn connect<L: IntoListener<T>>(&self, listener: L) -> Connection<T> {
        self.attach(Rc::new(Node::new(listener.into_listener())))
    }

    /// Connects a listener that is disconnected before its first invocation,
    /// guaranteeing at most one delivery even when several emissions schedule
    /// it before it first runs.
    pub fn once<L: IntoListener<T>>(&self, listener: L) -> Connection<T> {
        let callback = listener.into_listener();
        let chain = self.0.chain.downgrade();
        let fired = Cell::new(false);
        let node = Rc::new_cyclic(|weak: &Weak<Node<T>>| {
            let weak = weak.clone();
            Node::new(Rc::new(move |payload| {
                // Back-to-back emissions can both schedule this wrapper before
                // it runs; only the first one through delivers.
                if fired.replace(true) {
                    return;
                }
                if let Some(node) = weak.upgrade() {
                    chain.disconnect(&node);
                }
                callback(payload)
            }))
        });
        self.attach(node)
    }

    fn attach(&self, node: Rc<Node<T>>) -> Connection<T> {
        self.0.chain.push(node.clone());
        Connection::new(self.0.chain.downgrade(), node)
    }

    /// Parks the calling task until the next emission and returns its payload.
    ///
    /// Resumption goes through the same scheduled one-shot dispatch as any
    /// other listener, never inline with the firing call. Returns `None` when
    /// the signal is torn down with [`Signal::disconnect_all`] while parked;
    /// an emission that happened before `wait` was called is never observed.
    pub async fn wait(&self) -> Option<T> {
        let (resume, parked) = oneshot::channel();
        let id = self.0.next_waiter.get();
        self.0.next_waiter.set(id + 1);
        let slot: WaitSlot<T> = Rc::new(RefCell::new(Some(resume)));
        self.0.waiting.borrow_mut().insert(id, slot.clone());

        let inner = Rc::downgrade(&self.0);
        self.once(move |payload: T| {
            if let Some(inner) = inner.upgrade() {
                inner.waiting.borrow_mut().remove(&id);
            }
            if let Some(resume) = slot.borrow_mut().take() {
                let _ = resume.send(payload);
            }
        });
        parked.await.ok()
    }

    /// Disconnects every listener and cancels every task parked in
    /// [`Signal::wait`]. Idempotent. The signal stays usable: listeners
    /// connected afterwards receive future emissions normally.
    pub fn disconnect_all(&self) {
        self.0.chain.sever_all();
        let waiters: Vec<WaitSlot<T>> = self.0.waiting.borrow_mut().drain().map(|(_, slot)| slot).collect();
        if !waiters.is_empty() {
            trace!("disconnect_all: cancelling {} parked waiters", waiters.len());
        }
        for slot in waiters {
            // Dropping the sender abandons the parked wait.
            slot.borrow_mut().take();
        }
    }
}

impl<T> Signal<T>
where T: Clone + 'static
{
    /// Fires the signal, scheduling every connected listener on the immediate
    /// path with its own clone of `payload`.
    ///
    /// Listeners never run inline: code after `fire` returns executes before
    /// any listener body. A listener disconnected by an earlier callback of
    /// the same emission is skipped.
    pub fn fire(&self, payload: T) {
        for node in self.0.chain.iter() {
            if !node.is_connected() {
                continue;
            }
            let payload = payload.clone();
            self.0.scheduler.spawn(move || {
                // Re-check at run time: an earlier callback of this emission
                // may have disconnected this listener in the meantime.
                if node.is_connected() {
                    node.invoke(payload)
                }
            });
        }
    }

    /// Fires the signal on the deferred path: every connected listener is
    /// queued, in chain order, into the next batched scheduling tick.
    ///
    /// Use when ordering relative to other deferred work matters more than
    /// latency. The snapshot is taken here; a listener disconnected between
    /// this call and the tick still runs.
    pub fn fire_deferred(&self, payload: T) {
        for node in self.0.chain.iter() {
            if !node.is_connected() {
                continue;
            }
            let payload = payload.clone();
            self.0.scheduler.defer(move || node.invoke(payload));
        }
    }
}

impl<T> std::fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal").field("listeners", &self.0.chain.live_count()).finish()
    }
}
