//! Remote relational store contract.
//!
//! The store is an external collaborator: the engine only needs
//! select/insert/update/delete on named collections and a change feed per
//! collection. Futures are boxed and local because the whole engine runs on
//! one cooperative thread.

pub mod memory;

use futures::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tokio::sync::mpsc;

use crate::codec::{text, Collection, Row};
use crate::constants::fields;
use crate::error::RemoteError;

pub use memory::{MemoryRemote, RemoteCall};

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Kind of change carried by a feed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
    /// Structural change: re-fetch the scope and replace it wholesale.
    FullReload,
}

impl fmt::Display for ChangeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChangeOp::Insert => "insert",
            ChangeOp::Update => "update",
            ChangeOp::Delete => "delete",
            ChangeOp::FullReload => "full-reload",
        };
        f.write_str(name)
    }
}

/// A change-feed notification. Delete events carry the removed row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub collection: Collection,
    pub op: ChangeOp,
    pub row: Row,
}

impl ChangeEvent {
    pub fn new(collection: Collection, op: ChangeOp, row: Row) -> Self {
        Self { collection, op, row }
    }

    pub fn full_reload(collection: Collection) -> Self {
        Self::new(collection, ChangeOp::FullReload, Row::new())
    }
}

/// Which event kinds a subscription wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventKinds {
    pub insert: bool,
    pub update: bool,
    pub delete: bool,
}

impl EventKinds {
    pub const ALL: EventKinds = EventKinds {
        insert: true,
        update: true,
        delete: true,
    };

    /// Append-only collections only care about inserts and deletes.
    pub const INSERT_DELETE: EventKinds = EventKinds {
        insert: true,
        update: false,
        delete: true,
    };

    pub fn contains(&self, op: ChangeOp) -> bool {
        match op {
            ChangeOp::Insert => self.insert,
            ChangeOp::Update => self.update,
            ChangeOp::Delete => self.delete,
            ChangeOp::FullReload => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    All,
    Eq(String, Value),
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Filter::Eq(field.to_string(), value.into())
    }

    pub fn id(id: &str) -> Self {
        Self::eq(fields::ID, id)
    }

    pub fn matches(&self, row: &Row) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(field, value) => row.get(field) == Some(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub ascending: bool,
}

impl OrderBy {
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            ascending: true,
        }
    }

    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            ascending: false,
        }
    }

    /// Stable in-place sort. Values compare as text, which orders ISO dates.
    pub fn sort(&self, rows: &mut [Row]) {
        rows.sort_by(|a, b| {
            let ordering = text(a, &self.field).cmp(&text(b, &self.field));
            if self.ascending { ordering } else { ordering.reverse() }
        });
    }
}

/// Live change feed for one collection. Dropping it without calling
/// `RemoteStore::unsubscribe` leaks the server-side registration.
#[derive(Debug)]
pub struct Subscription {
    pub id: u64,
    pub collection: Collection,
    pub kinds: EventKinds,
    receiver: mpsc::UnboundedReceiver<ChangeEvent>,
}

impl Subscription {
    pub fn new(
        id: u64,
        collection: Collection,
        kinds: EventKinds,
        receiver: mpsc::UnboundedReceiver<ChangeEvent>,
    ) -> Self {
        Self {
            id,
            collection,
            kinds,
            receiver,
        }
    }

    /// Wait for the next event. `None` means the channel dropped.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.receiver.recv().await
    }

    /// Non-blocking poll. `Err(true)` means the channel dropped.
    pub fn try_next(&mut self) -> Result<ChangeEvent, bool> {
        match self.receiver.try_recv() {
            Ok(event) => Ok(event),
            Err(mpsc::error::TryRecvError::Empty) => Err(false),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(true),
        }
    }
}

pub trait RemoteStore {
    fn select(
        &self,
        collection: Collection,
        filter: Filter,
        order: Option<OrderBy>,
    ) -> LocalBoxFuture<'_, RemoteResult<Vec<Row>>>;

    fn insert(&self, collection: Collection, rows: Vec<Row>) -> LocalBoxFuture<'_, RemoteResult<()>>;

    /// Returns the number of rows matched.
    fn update(&self, collection: Collection, patch: Row, filter: Filter) -> LocalBoxFuture<'_, RemoteResult<usize>>;

    /// Returns the number of rows removed.
    fn delete(&self, collection: Collection, filter: Filter) -> LocalBoxFuture<'_, RemoteResult<usize>>;

    fn subscribe(&self, collection: Collection, kinds: EventKinds) -> RemoteResult<Subscription>;

    fn unsubscribe(&self, subscription: Subscription);
}
