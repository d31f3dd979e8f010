//! In-process remote store shared by any number of simulated clients.
//!
//! Every write is broadcast on the change feed to all matching subscribers,
//! including the client that authored it, exactly as the hosted store does.
//! Faults can be injected per collection and operation to exercise rollback.

use futures::future::LocalBoxFuture;
use futures::FutureExt;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tokio::sync::mpsc;

use super::{ChangeEvent, ChangeOp, EventKinds, Filter, OrderBy, RemoteResult, RemoteStore, Subscription};
use crate::codec::{row_id, Collection, Row};
use crate::error::RemoteError;

/// What a client asked the store to do, in call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCall {
    Select(Collection),
    Insert(Collection),
    Update(Collection),
    Delete(Collection),
}

impl RemoteCall {
    pub fn is_write(&self) -> bool {
        !matches!(self, RemoteCall::Select(_))
    }
}

struct Subscriber {
    id: u64,
    collection: Collection,
    kinds: EventKinds,
    sender: mpsc::UnboundedSender<ChangeEvent>,
}

#[derive(Default)]
struct MemoryInner {
    tables: HashMap<Collection, Vec<Row>>,
    subscribers: Vec<Subscriber>,
    next_subscription_id: u64,
    injected_failures: HashMap<(Collection, ChangeOp), usize>,
    calls: Vec<RemoteCall>,
}

impl MemoryInner {
    fn take_failure(&mut self, collection: Collection, op: ChangeOp) -> RemoteResult<()> {
        if let Some(remaining) = self.injected_failures.get_mut(&(collection, op)) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(RemoteError::Rejected {
                    message: format!("injected {} failure on {}", op, collection),
                });
            }
        }
        Ok(())
    }

    fn broadcast(&mut self, event: ChangeEvent) {
        // Closed receivers are dropped here rather than on unsubscribe
        self.subscribers.retain(|sub| {
            if sub.collection != event.collection || !sub.kinds.contains(event.op) {
                return !sub.sender.is_closed();
            }
            sub.sender.send(event.clone()).is_ok()
        });
    }
}

/// Cheap to clone; clones share the same tables and feed.
#[derive(Clone, Default)]
pub struct MemoryRemote {
    inner: Rc<RefCell<MemoryInner>>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed rows without emitting feed events or logging calls.
    pub fn seed(&self, collection: Collection, rows: Vec<Row>) {
        self.inner
            .borrow_mut()
            .tables
            .entry(collection)
            .or_default()
            .extend(rows);
    }

    pub fn rows(&self, collection: Collection) -> Vec<Row> {
        self.inner
            .borrow()
            .tables
            .get(&collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Make the next `count` writes of `op` on `collection` fail.
    pub fn fail_next(&self, collection: Collection, op: ChangeOp, count: usize) {
        self.inner
            .borrow_mut()
            .injected_failures
            .insert((collection, op), count);
    }

    /// Drop every feed for `collection`, as a lost realtime connection would.
    pub fn disconnect(&self, collection: Collection) {
        self.inner
            .borrow_mut()
            .subscribers
            .retain(|sub| sub.collection != collection);
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.inner.borrow().calls.clone()
    }

    pub fn write_count(&self) -> usize {
        self.inner.borrow().calls.iter().filter(|c| c.is_write()).count()
    }

    pub fn subscriber_count(&self, collection: Collection) -> usize {
        self.inner
            .borrow()
            .subscribers
            .iter()
            .filter(|sub| sub.collection == collection && !sub.sender.is_closed())
            .count()
    }

    fn do_insert(&self, collection: Collection, rows: Vec<Row>) -> RemoteResult<()> {
        let mut inner = self.inner.borrow_mut();
        inner.calls.push(RemoteCall::Insert(collection));
        inner.take_failure(collection, ChangeOp::Insert)?;

        let table = inner.tables.entry(collection).or_default();
        for row in &rows {
            let id = row_id(row);
            if id.is_some() && table.iter().any(|existing| row_id(existing) == id) {
                return Err(RemoteError::Rejected {
                    message: format!("duplicate key {:?} in {}", id, collection),
                });
            }
        }
        table.extend(rows.iter().cloned());

        for row in rows {
            inner.broadcast(ChangeEvent::new(collection, ChangeOp::Insert, row));
        }
        Ok(())
    }

    fn do_update(&self, collection: Collection, patch: Row, filter: Filter) -> RemoteResult<usize> {
        let mut inner = self.inner.borrow_mut();
        inner.calls.push(RemoteCall::Update(collection));
        inner.take_failure(collection, ChangeOp::Update)?;

        let mut updated = Vec::new();
        if let Some(table) = inner.tables.get_mut(&collection) {
            for row in table.iter_mut().filter(|row| filter.matches(row)) {
                for (key, value) in &patch {
                    row.insert(key.clone(), value.clone());
                }
                updated.push(row.clone());
            }
        }

        let matched = updated.len();
        for row in updated {
            inner.broadcast(ChangeEvent::new(collection, ChangeOp::Update, row));
        }
        Ok(matched)
    }

    fn do_delete(&self, collection: Collection, filter: Filter) -> RemoteResult<usize> {
        let mut inner = self.inner.borrow_mut();
        inner.calls.push(RemoteCall::Delete(collection));
        inner.take_failure(collection, ChangeOp::Delete)?;

        let removed = match inner.tables.get_mut(&collection) {
            Some(table) => {
                let (gone, kept): (Vec<Row>, Vec<Row>) = table.drain(..).partition(|row| filter.matches(row));
                *table = kept;
                gone
            }
            None => Vec::new(),
        };

        let count = removed.len();
        for row in removed {
            inner.broadcast(ChangeEvent::new(collection, ChangeOp::Delete, row));
        }
        Ok(count)
    }
}

impl RemoteStore for MemoryRemote {
    fn select(
        &self,
        collection: Collection,
        filter: Filter,
        order: Option<OrderBy>,
    ) -> LocalBoxFuture<'_, RemoteResult<Vec<Row>>> {
        async move {
            tokio::task::yield_now().await;
            let mut inner = self.inner.borrow_mut();
            inner.calls.push(RemoteCall::Select(collection));
            let mut rows: Vec<Row> = inner
                .tables
                .get(&collection)
                .map(|table| table.iter().filter(|row| filter.matches(row)).cloned().collect())
                .unwrap_or_default();
            if let Some(order) = order {
                order.sort(&mut rows);
            }
            Ok(rows)
        }
        .boxed_local()
    }

    fn insert(&self, collection: Collection, rows: Vec<Row>) -> LocalBoxFuture<'_, RemoteResult<()>> {
        async move {
            tokio::task::yield_now().await;
            self.do_insert(collection, rows)
        }
        .boxed_local()
    }

    fn update(&self, collection: Collection, patch: Row, filter: Filter) -> LocalBoxFuture<'_, RemoteResult<usize>> {
        async move {
            tokio::task::yield_now().await;
            self.do_update(collection, patch, filter)
        }
        .boxed_local()
    }

    fn delete(&self, collection: Collection, filter: Filter) -> LocalBoxFuture<'_, RemoteResult<usize>> {
        async move {
            tokio::task::yield_now().await;
            self.do_delete(collection, filter)
        }
        .boxed_local()
    }

    fn subscribe(&self, collection: Collection, kinds: EventKinds) -> RemoteResult<Subscription> {
        let mut inner = self.inner.borrow_mut();
        let (sender, receiver) = mpsc::unbounded_channel();
        inner.next_subscription_id += 1;
        let id = inner.next_subscription_id;
        inner.subscribers.push(Subscriber {
            id,
            collection,
            kinds,
            sender,
        });
        Ok(Subscription::new(id, collection, kinds, receiver))
    }

    fn unsubscribe(&self, subscription: Subscription) {
        self.inner
            .borrow_mut()
            .subscribers
            .retain(|sub| sub.id != subscription.id);
    }
}
