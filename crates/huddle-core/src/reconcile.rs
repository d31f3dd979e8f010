//! Folds change-feed events into the local view.
//!
//! Rules per event kind:
//! - insert: no-op if the id is already held (usually our own optimistic
//!   write), otherwise added to its group.
//! - update: replaces the record in place; unknown ids are inserted.
//! - delete: removes the id from whichever group holds it; no-op if absent.
//! - board insert/delete change which parents exist, so they are escalated
//!   to a full reload of boards and tasks instead of being patched. An insert
//!   of a board already held is our own echo and needs no reload.
//!
//! The echo of one of our confirmed updates is only skipped while a later
//! write of ours to the same record is still in flight; that write's own
//! echo brings the record up to date. Otherwise the echo is applied, so a
//! reload that landed mid-write cannot leave the record behind.
//!
//! Ids that have been deleted are remembered, so a late insert or update for
//! one (a stale echo, or an update racing a delete) never resurrects it. Ids
//! are never reused, which makes this safe.
//!
//! Applying the same event twice leaves the view as it was after the first.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::codec::{row_digest, row_id, Collection, Row};
use crate::error::CoreResult;
use crate::models::{Board, CalendarEvent, Message, Suggestion, Task};
use crate::remote::{ChangeEvent, ChangeOp, Filter, OrderBy, RemoteStore};
use crate::store::{AppDataStore, StoredEntity};
use crate::constants::fields;

/// What happened to one feed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Applied,
    Skipped(SkipReason),
    /// Membership may have changed: the caller must run `full_reload`.
    ReloadRequired(Collection),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyPresent,
    OwnEcho,
    Deleted,
    Absent,
    MalformedRow,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EchoKey {
    collection: Collection,
    id: String,
    digest: String,
}

#[derive(Debug, Default)]
pub struct ReconciliationMerger {
    // Updates we wrote and confirmed, until their echo arrives
    pending_echoes: HashSet<EchoKey>,
    tombstones: HashSet<(Collection, String)>,
    in_flight: HashMap<(Collection, String), usize>,
}

impl ReconciliationMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a confirmed write of ours so its echo on the feed is a no-op.
    pub fn acknowledge(&mut self, collection: Collection, op: ChangeOp, row: &Row) {
        let Some(id) = row_id(row) else {
            return;
        };
        match op {
            ChangeOp::Update => {
                self.pending_echoes.insert(EchoKey {
                    collection,
                    id,
                    digest: row_digest(row),
                });
            }
            ChangeOp::Delete => {
                self.tombstones.insert((collection, id));
            }
            // Inserts are recognised by id already being present
            ChangeOp::Insert | ChangeOp::FullReload => {}
        }
    }

    pub fn is_deleted(&self, collection: Collection, id: &str) -> bool {
        self.tombstones.contains(&(collection, id.to_string()))
    }

    /// Mark a write of ours to `id` as sent and not yet answered.
    pub fn begin_write(&mut self, collection: Collection, id: &str) {
        *self.in_flight.entry((collection, id.to_string())).or_default() += 1;
    }

    pub fn finish_write(&mut self, collection: Collection, id: &str) {
        let key = (collection, id.to_string());
        if let Some(count) = self.in_flight.get_mut(&key) {
            *count -= 1;
            if *count == 0 {
                self.in_flight.remove(&key);
            }
        }
    }

    pub fn write_in_flight(&self, collection: Collection, id: &str) -> bool {
        self.in_flight.contains_key(&(collection, id.to_string()))
    }

    /// Drop echo and delete bookkeeping for a collection whose local copy
    /// was just replaced by the authoritative set. Tombstones of records
    /// with a write still in flight are kept for its rollback.
    pub fn forget(&mut self, collection: Collection) {
        self.pending_echoes.retain(|key| key.collection != collection);
        let in_flight = &self.in_flight;
        self.tombstones.retain(|(c, id)| {
            *c != collection || in_flight.contains_key(&(*c, id.clone()))
        });
    }

    pub fn pending_echo_count(&self) -> usize {
        self.pending_echoes.len()
    }

    pub fn tombstone_count(&self) -> usize {
        self.tombstones.len()
    }

    pub fn apply(&mut self, store: &mut AppDataStore, event: &ChangeEvent) -> MergeOutcome {
        if event.op == ChangeOp::FullReload {
            return MergeOutcome::ReloadRequired(event.collection);
        }

        match event.collection {
            Collection::Boards => match event.op {
                ChangeOp::Update => self.apply_typed::<Board>(store, event),
                ChangeOp::Insert if row_id(&event.row).is_some_and(|id| store.has_board(&id)) => {
                    debug!("board insert already present");
                    MergeOutcome::Skipped(SkipReason::AlreadyPresent)
                }
                _ => {
                    // Tombstone now so a stale update cannot slip in before the reload lands
                    if event.op == ChangeOp::Delete {
                        if let Some(id) = row_id(&event.row) {
                            self.tombstones.insert((Collection::Boards, id));
                        }
                    }
                    MergeOutcome::ReloadRequired(Collection::Boards)
                }
            },
            Collection::Tasks => self.apply_typed::<Task>(store, event),
            Collection::Messages => self.apply_typed::<Message>(store, event),
            Collection::CalendarEvents => self.apply_typed::<CalendarEvent>(store, event),
            Collection::Suggestions => self.apply_typed::<Suggestion>(store, event),
        }
    }

    fn apply_typed<E: StoredEntity>(&mut self, store: &mut AppDataStore, event: &ChangeEvent) -> MergeOutcome {
        let collection = E::COLLECTION;
        let Some(id) = row_id(&event.row) else {
            warn!(%collection, op = %event.op, "feed row without id");
            return MergeOutcome::Skipped(SkipReason::MalformedRow);
        };

        match event.op {
            ChangeOp::Insert | ChangeOp::Update => {
                if self.is_deleted(collection, &id) {
                    debug!(%collection, %id, op = %event.op, "ignoring change for deleted record");
                    return MergeOutcome::Skipped(SkipReason::Deleted);
                }

                let slot = E::slot_mut(store);
                if event.op == ChangeOp::Insert && slot.contains(&id) {
                    debug!(%collection, %id, "insert already present");
                    return MergeOutcome::Skipped(SkipReason::AlreadyPresent);
                }

                if event.op == ChangeOp::Update {
                    let key = EchoKey {
                        collection,
                        id: id.clone(),
                        digest: row_digest(&event.row),
                    };
                    let own = self.pending_echoes.remove(&key);
                    if own && slot.contains(&id) && self.write_in_flight(collection, &id) {
                        debug!(%collection, %id, "own update echoed behind a newer write");
                        return MergeOutcome::Skipped(SkipReason::OwnEcho);
                    }
                }

                let entity = E::from_wire(&event.row);
                let parent = entity.group_key();
                slot.upsert(&parent, entity);
                debug!(%collection, %id, op = %event.op, %parent, "merged");
                MergeOutcome::Applied
            }
            ChangeOp::Delete => {
                self.tombstones.insert((collection, id.clone()));
                match E::slot_mut(store).remove_any(&id) {
                    Some(_) => {
                        debug!(%collection, %id, "merged delete");
                        MergeOutcome::Applied
                    }
                    None => MergeOutcome::Skipped(SkipReason::Absent),
                }
            }
            ChangeOp::FullReload => MergeOutcome::ReloadRequired(collection),
        }
    }
}

/// Order the authoritative set is fetched in for each collection.
pub fn reload_order(collection: Collection) -> Option<OrderBy> {
    match collection {
        Collection::Boards | Collection::Messages => Some(OrderBy::asc(fields::CREATED_AT)),
        Collection::Suggestions => Some(OrderBy::desc(fields::CREATED_AT)),
        Collection::Tasks | Collection::CalendarEvents => None,
    }
}

/// Decode `rows` and replace the whole local collection with them.
pub fn replace_collection(store: &mut AppDataStore, collection: Collection, rows: &[Row]) {
    match collection {
        Collection::Boards => rebuild::<Board>(store, rows),
        Collection::Tasks => rebuild::<Task>(store, rows),
        Collection::Messages => rebuild::<Message>(store, rows),
        Collection::CalendarEvents => rebuild::<CalendarEvent>(store, rows),
        Collection::Suggestions => rebuild::<Suggestion>(store, rows),
    }
}

fn rebuild<E: StoredEntity>(store: &mut AppDataStore, rows: &[Row]) {
    let entities: Vec<E> = rows
        .iter()
        .map(E::from_wire)
        .filter(|entity| !entity.id().is_empty())
        .collect();
    E::slot_mut(store).rebuild(entities);
}

/// Re-fetch the authoritative set for `scope` and replace the local copy.
///
/// A board-scoped reload also refetches tasks, since the set of parents
/// changed. Both are swapped in under one borrow so no frame shows boards
/// and tasks from different generations. The merger's bookkeeping for each
/// replaced collection is dropped with it.
pub async fn full_reload(
    remote: &dyn RemoteStore,
    store: &RefCell<AppDataStore>,
    merger: &RefCell<ReconciliationMerger>,
    scope: Collection,
) -> CoreResult<()> {
    let mut fetched = Vec::new();
    let collections: &[Collection] = match scope {
        Collection::Boards => &[Collection::Boards, Collection::Tasks],
        _ => std::slice::from_ref(&scope),
    };

    for &collection in collections {
        let rows = remote
            .select(collection, Filter::All, reload_order(collection))
            .await?;
        fetched.push((collection, rows));
    }

    let mut store = store.borrow_mut();
    let mut merger = merger.borrow_mut();
    for (collection, rows) in &fetched {
        replace_collection(&mut store, *collection, rows);
        merger.forget(*collection);
        info!(%collection, rows = rows.len(), "full reload");
    }
    Ok(())
}
