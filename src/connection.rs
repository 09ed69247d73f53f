use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::listener::Listener;

/// One registered listener record. The chain owns the forward links; a record
/// flips `connected` at most once, from true to false, and is never reused for
/// a different callback.
pub(crate) struct Node<T> {
    connected: Cell<bool>,
    callback: Listener<T>,
    next: RefCell<Option<Rc<Node<T>>>>,
}

impl<T> Node<T> {
    pub(crate) fn new(callback: Listener<T>) -> Self {
        Self { connected: Cell::new(true), callback, next: RefCell::new(None) }
    }

    pub(crate) fn is_connected(&self) -> bool { self.connected.get() }

    /// Flips the record dead. Returns false when it already was.
    pub(crate) fn sever(&self) -> bool { self.connected.replace(false) }

    pub(crate) fn invoke(&self, payload: T) { (self.callback)(payload) }
}

/// Singly linked chain of listener records. New records are spliced at the
/// head, so traversal visits the most recently connected listener first.
pub(crate) struct Chain<T> {
    head: Rc<RefCell<Option<Rc<Node<T>>>>>,
}

impl<T> Chain<T> {
    pub(crate) fn new() -> Self { Self { head: Rc::new(RefCell::new(None)) } }

    pub(crate) fn downgrade(&self) -> WeakChain<T> { WeakChain { head: Rc::downgrade(&self.head) } }

    pub(crate) fn push(&self, node: Rc<Node<T>>) {
        let mut head = self.head.borrow_mut();
        *node.next.borrow_mut() = head.take();
        *head = Some(node);
    }

    /// Unlinks a record by rewriting its predecessor's forward pointer (or the
    /// head). The record's own forward pointer is left untouched, so a
    /// traversal that already holds it keeps walking the node set that existed
    /// when it began.
    pub(crate) fn unlink(&self, node: &Rc<Node<T>>) {
        let mut head = self.head.borrow_mut();
        let Some(first) = head.as_ref() else { return };
        if Rc::ptr_eq(first, node) {
            *head = node.next.borrow().clone();
            return;
        }
        let mut prev = first.clone();
        loop {
            let next = prev.next.borrow().clone();
            match next {
                Some(ref n) if Rc::ptr_eq(n, node) => {
                    *prev.next.borrow_mut() = node.next.borrow().clone();
                    return;
                }
                Some(n) => prev = n,
                None => return,
            }
        }
    }

    /// Snapshot traversal starting from the current head.
    pub(crate) fn iter(&self) -> ChainIter<T> { ChainIter { cursor: self.head.borrow().clone() } }

    /// Flags every record dead without unlinking, then drops the whole chain
    /// by clearing the head.
    pub(crate) fn sever_all(&self) {
        let mut cursor = self.head.borrow_mut().take();
        while let Some(node) = cursor {
            node.sever();
            cursor = node.next.borrow().clone();
        }
    }

    pub(crate) fn live_count(&self) -> usize { self.iter().filter(|node| node.is_connected()).count() }
}

pub(crate) struct WeakChain<T> {
    head: Weak<RefCell<Option<Rc<Node<T>>>>>,
}

impl<T> Clone for WeakChain<T> {
    fn clone(&self) -> Self { Self { head: self.head.clone() } }
}

impl<T> WeakChain<T> {
    /// Severs the record and unlinks it if the owning chain is still alive.
    pub(crate) fn disconnect(&self, node: &Rc<Node<T>>) {
        if !node.sever() {
            return;
        }
        if let Some(head) = self.head.upgrade() {
            Chain { head }.unlink(node);
        }
    }
}

pub(crate) struct ChainIter<T> {
    cursor: Option<Rc<Node<T>>>,
}

impl<T> Iterator for ChainIter<T> {
    type Item = Rc<Node<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.cursor.take()?;
        self.cursor = node.next.borrow().clone();
        Some(node)
    }
}

/// Handle to one registered listener.
///
/// Dropping the handle does not disconnect the listener; call
/// [`Connection::disconnect`] to revoke delivery. Handles are cheap to clone
/// and clones refer to the same listener record.
pub struct Connection<T> {
    chain: WeakChain<T>,
    node: Rc<Node<T>>,
}

impl<T> Clone for Connection<T> {
    fn clone(&self) -> Self { Self { chain: self.chain.clone(), node: self.node.clone() } }
}

impl<T> Connection<T> {
    pub(crate) fn new(chain: WeakChain<T>, node: Rc<Node<T>>) -> Self { Self { chain, node } }

    /// Whether the listener is still registered.
    pub fn is_connected(&self) -> bool { self.node.is_connected() }

    /// Disconnects the listener. Idempotent; disconnecting an already
    /// disconnected handle is a no-op.
    pub fn disconnect(&self) { self.chain.disconnect(&self.node) }
}

impl<T> std::fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").field("connected", &self.is_connected()).finish()
    }
}
