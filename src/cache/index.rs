//! Four-level nested index: scope -> collection -> resource -> verb -> entry.
//!
//! Intermediate maps are created lazily on insert and pruned as soon as a
//! deletion leaves them empty, so an empty map is never observable.

use super::key::{ApiCacheKey, KeyLevel, KeyPath, Verb};
use super::list::{NodeId, RecencyList};
use super::validators::Validators;
use crate::{Error, Result};
use std::collections::hash_map::Entry as MapEntry;
use std::collections::HashMap;
use tracing::debug;

pub type VerbMap<T> = HashMap<Verb, Entry<T>>;
pub type ResourceMap<T> = HashMap<String, VerbMap<T>>;
pub type CollectionMap<T> = HashMap<String, ResourceMap<T>>;
pub type ScopeMap<T> = HashMap<String, CollectionMap<T>>;

/// Leaf of the index: one cached response.
#[derive(Debug, Clone)]
pub struct Entry<T> {
    pub key: ApiCacheKey,
    pub payload: T,
    pub validators: Validators,
    /// The entry's node in the recency list.
    pub node: NodeId,
}

/// How far a [`KeyPath`] resolved, with the map found at each level.
#[derive(Debug)]
pub struct Descent<'a, T> {
    pub collections: Option<&'a CollectionMap<T>>,
    pub resources: Option<&'a ResourceMap<T>>,
    pub verbs: Option<&'a VerbMap<T>>,
    pub entry: Option<&'a Entry<T>>,
}

impl<'a, T> Descent<'a, T> {
    fn none() -> Self {
        Self {
            collections: None,
            resources: None,
            verbs: None,
            entry: None,
        }
    }

    /// Deepest level that resolved, `None` when the scope is unknown.
    pub fn depth(&self) -> Option<KeyLevel> {
        if self.entry.is_some() {
            Some(KeyLevel::Verb)
        } else if self.verbs.is_some() {
            Some(KeyLevel::Resource)
        } else if self.resources.is_some() {
            Some(KeyLevel::Collection)
        } else if self.collections.is_some() {
            Some(KeyLevel::Scope)
        } else {
            None
        }
    }
}

pub struct HierarchicalIndex<T> {
    scopes: ScopeMap<T>,
    size: usize,
}

impl<T> Default for HierarchicalIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HierarchicalIndex<T> {
    pub fn new() -> Self {
        Self {
            scopes: HashMap::new(),
            size: 0,
        }
    }

    /// Number of leaf entries.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Walk the nested maps as far as `path` resolves.
    pub fn descend(&self, path: KeyPath<'_>) -> Descent<'_, T> {
        let mut out = Descent::none();
        let Some(collections) = self.scopes.get(path.scope) else {
            return out;
        };
        out.collections = Some(collections);

        let Some(resources) = path.collection.and_then(|c| collections.get(c)) else {
            return out;
        };
        out.resources = Some(resources);

        let Some(verbs) = path.resource.and_then(|r| resources.get(r)) else {
            return out;
        };
        out.verbs = Some(verbs);

        out.entry = path.verb.and_then(|v| verbs.get(&v));
        out
    }

    pub fn get(&self, key: &ApiCacheKey) -> Option<&Entry<T>> {
        self.descend(key.path()).entry
    }

    /// Insert or overwrite the entry for `key` and return its list node.
    ///
    /// An existing entry keeps its node, which is demoted one slot. A new
    /// entry gets a fresh node appended at the tail.
    pub fn upsert(
        &mut self,
        key: ApiCacheKey,
        payload: T,
        validators: Validators,
        list: &mut RecencyList<ApiCacheKey>,
    ) -> NodeId {
        let verbs = self
            .scopes
            .entry(key.scope.clone())
            .or_default()
            .entry(key.collection.clone())
            .or_default()
            .entry(key.resource.clone())
            .or_default();

        match verbs.entry(key.verb) {
            MapEntry::Occupied(mut slot) => {
                let entry = slot.get_mut();
                entry.payload = payload;
                entry.validators = validators;
                list.demote(entry.node);
                entry.node
            }
            MapEntry::Vacant(slot) => {
                let node = list.alloc(key.clone());
                list.add(node);
                slot.insert(Entry {
                    key,
                    payload,
                    validators,
                    node,
                });
                self.size += 1;
                node
            }
        }
    }

    /// Remove every entry under `path` and prune the branches left empty.
    ///
    /// Fails with [`Error::NotFound`] naming the first level that does not
    /// resolve. Levels after the first absent one in `path` are ignored.
    pub fn invalidate(&mut self, path: KeyPath<'_>) -> Result<Vec<Entry<T>>> {
        let scope = path.scope;
        let collections = self
            .scopes
            .get_mut(scope)
            .ok_or_else(|| Error::not_found(KeyLevel::Scope, scope))?;

        let removed: Vec<Entry<T>> = match path.collection {
            None => {
                let subtree = self.scopes.remove(scope).unwrap_or_default();
                flatten_collections(subtree)
            }
            Some(collection) => {
                let resources = collections
                    .get_mut(collection)
                    .ok_or_else(|| Error::not_found(KeyLevel::Collection, collection))?;

                let removed = match path.resource {
                    None => {
                        let subtree = collections.remove(collection).unwrap_or_default();
                        flatten_resources(subtree)
                    }
                    Some(resource) => {
                        let verbs = resources
                            .get_mut(resource)
                            .ok_or_else(|| Error::not_found(KeyLevel::Resource, resource))?;

                        let removed = match path.verb {
                            None => {
                                let subtree = resources.remove(resource).unwrap_or_default();
                                subtree.into_values().collect()
                            }
                            Some(verb) => {
                                let entry = verbs.remove(&verb).ok_or_else(|| {
                                    Error::not_found(KeyLevel::Verb, verb.as_str())
                                })?;
                                if verbs.is_empty() {
                                    resources.remove(resource);
                                }
                                vec![entry]
                            }
                        };
                        if resources.is_empty() {
                            collections.remove(collection);
                        }
                        removed
                    }
                };
                if collections.is_empty() {
                    self.scopes.remove(scope);
                }
                removed
            }
        };

        self.size = self.size.saturating_sub(removed.len());
        debug!(
            scope,
            level = %path.granularity(),
            removed = removed.len(),
            "invalidated cache entries"
        );
        Ok(removed)
    }

    /// Drop the whole structure at once.
    pub fn clear(&mut self) {
        self.scopes = HashMap::new();
        self.size = 0;
    }
}

fn flatten_collections<T>(collections: CollectionMap<T>) -> Vec<Entry<T>> {
    collections
        .into_values()
        .flat_map(flatten_resources)
        .collect()
}

fn flatten_resources<T>(resources: ResourceMap<T>) -> Vec<Entry<T>> {
    resources
        .into_values()
        .flat_map(|verbs| verbs.into_values())
        .collect()
}
