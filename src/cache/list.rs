//! Recency list: an arena-backed doubly linked list of keys.
//!
//! The head is the oldest node (next eviction candidate) and the tail is the
//! most recently appended one. Nodes live in a slot arena and are addressed by
//! [`NodeId`], so the index can hold on to a node without aliasing it.

use tracing::error;

/// Stable handle to a node in a [`RecencyList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug)]
struct Node<K> {
    key: K,
    prev: Option<NodeId>,
    next: Option<NodeId>,
    /// The owner dropped this node while it was still linked; the slot is
    /// recycled once the node gets detached.
    released: bool,
}

#[derive(Debug)]
enum Slot<K> {
    Occupied(Node<K>),
    Vacant { next_free: Option<usize> },
}

pub struct RecencyList<K> {
    slots: Vec<Slot<K>>,
    free_head: Option<usize>,
    head: Option<NodeId>,
    tail: Option<NodeId>,
}

impl<K> Default for RecencyList<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> std::fmt::Debug for RecencyList<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecencyList")
            .field("slots", &self.slots.len())
            .field("head", &self.head)
            .field("tail", &self.tail)
            .finish()
    }
}

impl<K> RecencyList<K> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_head: None,
            head: None,
            tail: None,
        }
    }

    /// The oldest node.
    pub fn head(&self) -> Option<NodeId> {
        self.head
    }

    /// The most recently appended node.
    pub fn tail(&self) -> Option<NodeId> {
        self.tail
    }

    pub fn key(&self, id: NodeId) -> Option<&K> {
        self.node(id).map(|n| &n.key)
    }

    pub fn prev(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.prev)
    }

    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.next)
    }

    /// Number of arena slots currently holding a node.
    pub fn allocated(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s, Slot::Occupied(_)))
            .count()
    }

    /// Create a detached node for `key`. It joins the list on [`add`](Self::add).
    pub fn alloc(&mut self, key: K) -> NodeId {
        let node = Node {
            key,
            prev: None,
            next: None,
            released: false,
        };
        match self.free_head {
            Some(idx) => {
                self.free_head = match self.slots[idx] {
                    Slot::Vacant { next_free } => next_free,
                    Slot::Occupied(_) => None,
                };
                self.slots[idx] = Slot::Occupied(node);
                NodeId(idx)
            }
            None => {
                self.slots.push(Slot::Occupied(node));
                NodeId(self.slots.len() - 1)
            }
        }
    }

    /// Append `id` at the tail.
    pub fn add(&mut self, id: NodeId) {
        let old_tail = self.tail;
        match self.node_mut(id) {
            Some(node) => {
                node.prev = old_tail;
                node.next = None;
            }
            None => {
                error!(node = id.0, "add: node slot is vacant");
                return;
            }
        }

        if self.head.is_none() {
            self.head = Some(id);
        }
        if let Some(tail) = old_tail {
            self.set_next(tail, Some(id));
        }
        self.tail = Some(id);
    }

    /// Detach a node from wherever it sits and clear its links.
    ///
    /// A node that is already detached and is not the head is left alone.
    pub fn remove_node(&mut self, id: NodeId) {
        let (prev, next) = match self.node(id) {
            Some(node) => (node.prev, node.next),
            None => {
                error!(node = id.0, "remove_node: node slot is vacant");
                return;
            }
        };
        if prev.is_none() && next.is_none() && self.head != Some(id) {
            return;
        }

        match prev {
            Some(p) => self.set_next(p, next),
            None => self.head = next,
        }
        match next {
            Some(n) => self.set_prev(n, prev),
            None => self.tail = prev,
        }

        self.detach(id);
    }

    /// Move `id` exactly one slot toward the tail.
    ///
    /// A node without links is (re)appended at the tail. This includes the
    /// sole node of a one-element list, which ends up linked to itself.
    pub fn demote(&mut self, id: NodeId) {
        let (prev, next) = match self.node(id) {
            Some(node) => (node.prev, node.next),
            None => {
                error!(node = id.0, "demote: node slot is vacant");
                return;
            }
        };

        if prev.is_none() && next.is_none() {
            self.add(id);
            return;
        }

        let Some(next_node) = next else {
            return;
        };
        let parent = prev;
        let grandchild = match self.node(next_node) {
            Some(node) => node.next,
            None => {
                error!(node = next_node.0, "demote: successor slot is vacant");
                return;
            }
        };

        // [parent, id, next_node, grandchild] -> [parent, next_node, id, grandchild]
        match parent {
            Some(p) => self.set_next(p, Some(next_node)),
            None => self.head = Some(next_node),
        }
        self.set_prev(next_node, parent);
        self.set_next(next_node, Some(id));
        self.set_prev(id, Some(next_node));
        self.set_next(id, grandchild);
        match grandchild {
            Some(g) => self.set_prev(g, Some(id)),
            None => self.tail = Some(id),
        }
    }

    /// Give the node's slot back to the arena once its owner is gone.
    ///
    /// Nodes still reachable through the list are only marked and get
    /// recycled when they are detached.
    pub fn release(&mut self, id: NodeId) {
        let linked = self.head == Some(id) || self.tail == Some(id);
        match self.node_mut(id) {
            Some(node) if linked || node.prev.is_some() || node.next.is_some() => {
                node.released = true;
            }
            Some(_) => {
                self.free(id);
            }
            None => error!(node = id.0, "release: node slot is vacant"),
        }
    }

    /// Drop every node at once.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free_head = None;
        self.head = None;
        self.tail = None;
    }

    /// Node ids from head to tail. Stops after visiting as many nodes as the
    /// arena holds, so a corrupted chain cannot loop forever.
    pub fn ids(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cursor = self.head;
        while let Some(id) = cursor {
            if out.len() >= self.slots.len() {
                break;
            }
            out.push(id);
            cursor = self.next(id);
        }
        out
    }

    fn detach(&mut self, id: NodeId) {
        let released = match self.node_mut(id) {
            Some(node) => {
                node.prev = None;
                node.next = None;
                node.released
            }
            None => return,
        };
        let still_referenced = self.head == Some(id) || self.tail == Some(id);
        if released && !still_referenced {
            self.free(id);
        }
    }

    fn free(&mut self, id: NodeId) -> Option<K> {
        let slot = self.slots.get_mut(id.0)?;
        let old = std::mem::replace(
            slot,
            Slot::Vacant {
                next_free: self.free_head,
            },
        );
        match old {
            Slot::Occupied(node) => {
                self.free_head = Some(id.0);
                Some(node.key)
            }
            vacant @ Slot::Vacant { .. } => {
                *slot = vacant;
                None
            }
        }
    }

    fn node(&self, id: NodeId) -> Option<&Node<K>> {
        match self.slots.get(id.0) {
            Some(Slot::Occupied(node)) => Some(node),
            _ => None,
        }
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node<K>> {
        match self.slots.get_mut(id.0) {
            Some(Slot::Occupied(node)) => Some(node),
            _ => None,
        }
    }

    fn set_next(&mut self, id: NodeId, next: Option<NodeId>) {
        match self.node_mut(id) {
            Some(node) => node.next = next,
            None => error!(node = id.0, "link: node slot is vacant"),
        }
    }

    fn set_prev(&mut self, id: NodeId, prev: Option<NodeId>) {
        match self.node_mut(id) {
            Some(node) => node.prev = prev,
            None => error!(node = id.0, "link: node slot is vacant"),
        }
    }
}

impl<K: Clone> RecencyList<K> {
    /// Detach the head and return its key.
    pub fn remove_oldest(&mut self) -> Option<K> {
        let head = self.head?;
        let (key, next) = match self.node(head) {
            Some(node) => (node.key.clone(), node.next),
            None => {
                error!(node = head.0, "remove_oldest: head slot is vacant");
                return None;
            }
        };

        match next {
            None => {
                self.head = None;
                self.tail = None;
            }
            Some(n) => {
                self.head = Some(n);
                self.set_prev(n, None);
            }
        }

        self.detach(head);
        Some(key)
    }

    /// Keys from head (oldest) to tail (newest).
    pub fn keys(&self) -> Vec<K> {
        self.ids()
            .into_iter()
            .filter_map(|id| self.key(id).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_of(keys: &[&'static str]) -> (RecencyList<&'static str>, Vec<NodeId>) {
        let mut list = RecencyList::new();
        let ids = keys
            .iter()
            .map(|k| {
                let id = list.alloc(*k);
                list.add(id);
                id
            })
            .collect();
        (list, ids)
    }

    fn assert_order(list: &RecencyList<&'static str>, expected: &[&'static str]) {
        assert_eq!(list.keys(), expected);
        let ids = list.ids();
        assert_eq!(list.head(), ids.first().copied());
        assert_eq!(list.tail(), ids.last().copied());
        for pair in ids.windows(2) {
            assert_eq!(list.next(pair[0]), Some(pair[1]));
            assert_eq!(list.prev(pair[1]), Some(pair[0]));
        }
        if let Some(first) = ids.first() {
            assert_eq!(list.prev(*first), None);
        }
        if let Some(last) = ids.last() {
            assert_eq!(list.next(*last), None);
        }
    }

    #[test]
    fn test_add_links_nodes_in_order() {
        let (list, ids) = list_of(&["a", "b", "c"]);
        assert_order(&list, &["a", "b", "c"]);
        assert_eq!(list.head(), Some(ids[0]));
        assert_eq!(list.tail(), Some(ids[2]));
    }

    #[test]
    fn test_remove_oldest() {
        let mut empty: RecencyList<&str> = RecencyList::new();
        assert_eq!(empty.remove_oldest(), None);

        let (mut list, _) = list_of(&["a", "b", "c"]);
        assert_eq!(list.remove_oldest(), Some("a"));
        assert_order(&list, &["b", "c"]);
        assert_eq!(list.remove_oldest(), Some("b"));
        assert_eq!(list.remove_oldest(), Some("c"));
        assert_eq!(list.head(), None);
        assert_eq!(list.tail(), None);
        assert_eq!(list.remove_oldest(), None);
    }

    #[test]
    fn test_demote_moves_one_slot() {
        let (mut list, ids) = list_of(&["a", "b", "c", "d"]);
        list.demote(ids[1]);
        assert_order(&list, &["a", "c", "b", "d"]);
        list.demote(ids[1]);
        assert_order(&list, &["a", "c", "d", "b"]);
    }

    #[test]
    fn test_demote_head() {
        let (mut list, ids) = list_of(&["a", "b", "c", "d"]);
        list.demote(ids[0]);
        assert_order(&list, &["b", "a", "c", "d"]);
        assert_eq!(list.remove_oldest(), Some("b"));
    }

    #[test]
    fn test_demote_tail_is_noop() {
        let (mut list, ids) = list_of(&["a", "b", "c"]);
        list.demote(ids[2]);
        assert_order(&list, &["a", "b", "c"]);
    }

    #[test]
    fn test_demote_into_tail_position() {
        let (mut list, ids) = list_of(&["a", "b", "c"]);
        list.demote(ids[1]);
        assert_order(&list, &["a", "c", "b"]);
        assert_eq!(list.tail(), Some(ids[1]));
    }

    #[test]
    fn test_demote_two_nodes() {
        let (mut list, ids) = list_of(&["a", "b"]);
        list.demote(ids[0]);
        assert_order(&list, &["b", "a"]);
        assert_eq!(list.head(), Some(ids[1]));
        assert_eq!(list.tail(), Some(ids[0]));
    }

    #[test]
    fn test_demote_detached_node_appends() {
        let (mut list, _) = list_of(&["a", "b"]);
        let c = list.alloc("c");
        list.demote(c);
        assert_order(&list, &["a", "b", "c"]);
    }

    #[test]
    fn test_demote_singleton_links_node_to_itself() {
        let (mut list, ids) = list_of(&["only"]);
        let only = ids[0];

        list.demote(only);

        assert_eq!(list.head(), Some(only));
        assert_eq!(list.tail(), Some(only));
        assert_eq!(list.prev(only), Some(only));
        assert_eq!(list.next(only), Some(only));

        // A later append still hangs off the self-linked node.
        let next = list.alloc("next");
        list.add(next);
        assert_eq!(list.next(only), Some(next));
        assert_eq!(list.prev(next), Some(only));
        assert_eq!(list.prev(only), Some(only));
        assert_eq!(list.remove_oldest(), Some("only"));
        assert_eq!(list.head(), Some(next));
        assert_eq!(list.prev(next), None);
    }

    #[test]
    fn test_remove_node_positions() {
        let (mut list, ids) = list_of(&["a", "b", "c"]);
        list.remove_node(ids[1]);
        assert_order(&list, &["a", "c"]);
        assert_eq!(list.prev(ids[1]), None);
        assert_eq!(list.next(ids[1]), None);

        list.remove_node(ids[0]);
        assert_order(&list, &["c"]);

        list.remove_node(ids[2]);
        assert_order(&list, &[]);
        assert_eq!(list.head(), None);
        assert_eq!(list.tail(), None);
    }

    #[test]
    fn test_remove_tail_node() {
        let (mut list, ids) = list_of(&["a", "b", "c"]);
        list.remove_node(ids[2]);
        assert_order(&list, &["a", "b"]);
        assert_eq!(list.tail(), Some(ids[1]));
    }

    #[test]
    fn test_remove_detached_node_leaves_list_alone() {
        let (mut list, _) = list_of(&["a", "b"]);
        let stray = list.alloc("stray");
        list.remove_node(stray);
        assert_order(&list, &["a", "b"]);
    }

    #[test]
    fn test_operation_sequence() {
        let (mut list, ids) = list_of(&["1", "2", "3", "4"]);
        list.demote(ids[0]);
        assert_order(&list, &["2", "1", "3", "4"]);
        list.demote(ids[0]);
        assert_order(&list, &["2", "3", "1", "4"]);
        assert_eq!(list.remove_oldest(), Some("2"));
        assert_order(&list, &["3", "1", "4"]);
    }

    #[test]
    fn test_release_recycles_detached_slots() {
        let (mut list, ids) = list_of(&["a", "b", "c"]);
        list.remove_node(ids[1]);
        list.release(ids[1]);
        assert_eq!(list.allocated(), 2);

        let d = list.alloc("d");
        assert_eq!(d, ids[1]);
        list.add(d);
        assert_order(&list, &["a", "c", "d"]);
    }

    #[test]
    fn test_release_of_linked_node_is_deferred() {
        let (mut list, ids) = list_of(&["a", "b"]);
        list.release(ids[0]);
        assert_eq!(list.allocated(), 2);
        assert_eq!(list.remove_oldest(), Some("a"));
        assert_eq!(list.allocated(), 1);
    }

    #[test]
    fn test_clear() {
        let (mut list, _) = list_of(&["a", "b", "c"]);
        list.clear();
        assert_eq!(list.head(), None);
        assert_eq!(list.tail(), None);
        assert_eq!(list.allocated(), 0);
        assert!(list.keys().is_empty());
    }
}
