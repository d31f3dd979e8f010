use std::collections::{BTreeMap, HashMap};

use crate::codec::WireEntity;
use crate::models::{Task, TaskStatus};

/// Ordered child lists keyed by parent id.
///
/// An id lives in at most one group at a time: moving an entity to another
/// group removes it from the previous one first. Empty groups are dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityStore<T> {
    groups: BTreeMap<String, Vec<T>>,
    // id -> group key
    index: HashMap<String, String>,
}

impl<T> Default for EntityStore<T> {
    fn default() -> Self {
        Self {
            groups: BTreeMap::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: WireEntity> EntityStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.groups.clear();
        self.index.clear();
    }

    // ===== Getters =====

    pub fn get(&self, parent_id: &str) -> &[T] {
        self.groups.get(parent_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Group key, position and entity for `id`.
    pub fn find(&self, id: &str) -> Option<(&str, usize, &T)> {
        let parent = self.index.get(id)?;
        let group = self.groups.get(parent)?;
        let position = group.iter().position(|e| e.id() == id)?;
        Some((parent.as_str(), position, &group[position]))
    }

    pub fn get_by_id(&self, id: &str) -> Option<&T> {
        self.find(id).map(|(_, _, entity)| entity)
    }

    pub fn group_keys(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn groups(&self) -> impl Iterator<Item = (&str, &[T])> {
        self.groups.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.groups.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    // ===== Mutations =====

    /// Insert or replace. An entity already in this group is replaced in
    /// place; one held by another group is moved here. New entities are
    /// appended, or prepended for newest-first collections.
    pub fn upsert(&mut self, parent_id: &str, entity: T) -> Option<T> {
        let id = entity.id().to_string();

        if let Some(group) = self.groups.get_mut(parent_id) {
            if let Some(slot) = group.iter_mut().find(|e| e.id() == id) {
                return Some(std::mem::replace(slot, entity));
            }
        }

        let previous = self.remove_any(&id).map(|(_, _, old)| old);
        let group = self.groups.entry(parent_id.to_string()).or_default();
        if T::NEWEST_FIRST {
            group.insert(0, entity);
        } else {
            group.push(entity);
        }
        self.index.insert(id, parent_id.to_string());
        previous
    }

    /// Put an entity back at a known position (clamped to the group length).
    pub fn insert_at(&mut self, parent_id: &str, position: usize, entity: T) {
        let id = entity.id().to_string();
        self.remove_any(&id);
        let group = self.groups.entry(parent_id.to_string()).or_default();
        let position = position.min(group.len());
        group.insert(position, entity);
        self.index.insert(id, parent_id.to_string());
    }

    pub fn remove(&mut self, parent_id: &str, id: &str) -> Option<(usize, T)> {
        if self.index.get(id).map(String::as_str) != Some(parent_id) {
            return None;
        }
        let group = self.groups.get_mut(parent_id)?;
        let position = group.iter().position(|e| e.id() == id)?;
        let removed = group.remove(position);
        if group.is_empty() {
            self.groups.remove(parent_id);
        }
        self.index.remove(id);
        Some((position, removed))
    }

    /// Remove `id` from whichever group holds it.
    pub fn remove_any(&mut self, id: &str) -> Option<(String, usize, T)> {
        let parent = self.index.get(id)?.clone();
        self.remove(&parent, id)
            .map(|(position, entity)| (parent, position, entity))
    }

    pub fn remove_group(&mut self, parent_id: &str) -> Vec<T> {
        let removed = self.groups.remove(parent_id).unwrap_or_default();
        for entity in &removed {
            self.index.remove(entity.id());
        }
        removed
    }

    /// Replace one group wholesale. Ids present elsewhere are moved here.
    pub fn replace_all(&mut self, parent_id: &str, entities: Vec<T>) {
        self.remove_group(parent_id);
        let mut group: Vec<T> = Vec::with_capacity(entities.len());
        for entity in entities {
            let id = entity.id().to_string();
            if group.iter().any(|e| e.id() == id) {
                continue;
            }
            self.remove_any(&id);
            self.index.insert(id, parent_id.to_string());
            group.push(entity);
        }
        if !group.is_empty() {
            self.groups.insert(parent_id.to_string(), group);
        }
    }

    /// Replace the whole store, regrouping by each entity's own parent key.
    /// Input order is kept within each group; duplicate ids keep the first.
    pub fn rebuild(&mut self, entities: Vec<T>) {
        self.clear();
        for entity in entities {
            if self.contains(entity.id()) {
                continue;
            }
            let parent = entity.group_key();
            self.index.insert(entity.id().to_string(), parent.clone());
            self.groups.entry(parent).or_default().push(entity);
        }
    }
}

impl EntityStore<Task> {
    pub fn filter_by_status(&self, parent_id: &str, status: TaskStatus) -> Vec<&Task> {
        self.get(parent_id)
            .iter()
            .filter(|task| task.status == status)
            .collect()
    }
}
