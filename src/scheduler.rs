use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use tokio::sync::oneshot;
use tracing::trace;

pub(crate) type Job = Box<dyn FnOnce()>;

/// Cooperative dispatch facade over a current-thread tokio `LocalSet`.
///
/// Every signal holds a clone of this handle and routes all listener
/// invocations through it: [`Scheduler::spawn`] for immediate dispatch,
/// [`Scheduler::defer`] for the next batched tick. The immediate path keeps at
/// most one idle worker task parked for reuse, so sequential dispatches do not
/// manufacture a fresh task per invocation.
///
/// The handle is explicit shared state; it must be passed to
/// [`Signal::new`](crate::Signal::new) rather than living in a static.
#[derive(Clone)]
pub struct Scheduler(Rc<Inner>);

struct Inner {
    /// At most one parked worker, resumable with its next job.
    idle: Cell<Option<oneshot::Sender<Job>>>,
    /// Jobs queued for the next batched scheduling tick.
    deferred: RefCell<VecDeque<Job>>,
    flush_pending: Cell<bool>,
    workers_spawned: Cell<usize>,
}

impl Default for Scheduler {
    fn default() -> Self { Self::new() }
}

impl Scheduler {
    pub fn new() -> Self {
        Self(Rc::new(Inner {
            idle: Cell::new(None),
            deferred: RefCell::new(VecDeque::new()),
            flush_pending: Cell::new(false),
            workers_spawned: Cell::new(0),
        }))
    }

    /// Schedules `job` to run as soon as the executor is free, never inline
    /// with the caller.
    ///
    /// Must be called from within a [`tokio::task::LocalSet`] on a
    /// current-thread runtime.
    pub fn spawn(&self, job: impl FnOnce() + 'static) { self.dispatch(Box::new(job)) }

    fn dispatch(&self, job: Job) {
        match self.0.idle.take() {
            Some(worker) => {
                // A send only fails when the runtime tore the parked worker
                // down already; fall back to manufacturing a fresh one.
                if let Err(job) = worker.send(job) {
                    self.spawn_worker(job);
                }
            }
            None => self.spawn_worker(job),
        }
    }

    fn spawn_worker(&self, first: Job) {
        let n = self.0.workers_spawned.get() + 1;
        self.0.workers_spawned.set(n);
        trace!("spawning dispatch worker #{}", n);
        tokio::task::spawn_local(run_worker(Rc::downgrade(&self.0), first));
    }

    /// Queues `job` for the next batched scheduling tick.
    ///
    /// All jobs deferred before that tick run as one FIFO batch, after any
    /// immediate work already scheduled; jobs deferred while the batch drains
    /// land in the following one.
    pub fn defer(&self, job: impl FnOnce() + 'static) {
        self.0.deferred.borrow_mut().push_back(Box::new(job));
        if self.0.flush_pending.replace(true) {
            return;
        }
        let inner = Rc::downgrade(&self.0);
        tokio::task::spawn_local(async move {
            tokio::task::yield_now().await;
            let Some(inner) = inner.upgrade() else { return };
            inner.flush_pending.set(false);
            let batch: Vec<Job> = inner.deferred.borrow_mut().drain(..).collect();
            trace!("flushing {} deferred jobs", batch.len());
            drop(inner);
            for job in batch {
                job();
            }
        });
    }
}

/// Runs its first job, then parks in the scheduler's idle slot and is resumed
/// with further jobs. Exits when another worker already holds the slot (at
/// most one stays idle) or when the scheduler itself is gone.
async fn run_worker(scheduler: Weak<Inner>, first: Job) {
    let mut job = first;
    loop {
        job();
        let Some(inner) = scheduler.upgrade() else { break };
        let occupied = {
            let current = inner.idle.take();
            let occupied = current.is_some();
            inner.idle.set(current);
            occupied
        };
        if occupied {
            break;
        }
        let (resume, parked) = oneshot::channel();
        inner.idle.set(Some(resume));
        // Park without keeping the scheduler alive; a dropped scheduler closes
        // the channel and ends the worker.
        drop(inner);
        match parked.await {
            Ok(next) => job = next,
            Err(_) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn sequential_dispatches_reuse_one_worker() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let scheduler = Scheduler::new();
                let ran = Rc::new(Cell::new(0));
                for _ in 0..3 {
                    let ran = ran.clone();
                    scheduler.spawn(move || ran.set(ran.get() + 1));
                    settle().await;
                }
                assert_eq!(ran.get(), 3);
                assert_eq!(scheduler.0.workers_spawned.get(), 1);
            })
            .await;
    }

    #[tokio::test]
    async fn concurrent_dispatches_fan_out_then_settle_to_one_idle_worker() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let scheduler = Scheduler::new();
                let ran = Rc::new(Cell::new(0));
                for _ in 0..3 {
                    let ran = ran.clone();
                    scheduler.spawn(move || ran.set(ran.get() + 1));
                }
                // No idle worker was available for any of the three.
                assert_eq!(scheduler.0.workers_spawned.get(), 3);
                settle().await;
                assert_eq!(ran.get(), 3);

                // Only one of them parked; the next dispatch reuses it.
                let ran2 = ran.clone();
                scheduler.spawn(move || ran2.set(ran2.get() + 1));
                settle().await;
                assert_eq!(ran.get(), 4);
                assert_eq!(scheduler.0.workers_spawned.get(), 3);
            })
            .await;
    }

    #[tokio::test]
    async fn spawned_job_does_not_run_inline() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let scheduler = Scheduler::new();
                let ran = Rc::new(Cell::new(false));
                let flag = ran.clone();
                scheduler.spawn(move || flag.set(true));
                assert!(!ran.get());
                settle().await;
                assert!(ran.get());
            })
            .await;
    }

    #[tokio::test]
    async fn deferred_jobs_drain_as_one_batch_in_order() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let scheduler = Scheduler::new();
                let order = Rc::new(RefCell::new(Vec::new()));
                for label in ["a", "b", "c"] {
                    let order = order.clone();
                    scheduler.defer(move || order.borrow_mut().push(label));
                }
                assert!(order.borrow().is_empty());
                settle().await;
                assert_eq!(*order.borrow(), ["a", "b", "c"]);
            })
            .await;
    }

    #[tokio::test]
    async fn deferred_jobs_run_after_already_scheduled_immediate_work() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let scheduler = Scheduler::new();
                let order = Rc::new(RefCell::new(Vec::new()));
                let deferred = order.clone();
                scheduler.defer(move || deferred.borrow_mut().push("deferred"));
                let immediate = order.clone();
                scheduler.spawn(move || immediate.borrow_mut().push("immediate"));
                settle().await;
                assert_eq!(*order.borrow(), ["immediate", "deferred"]);
            })
            .await;
    }
}
