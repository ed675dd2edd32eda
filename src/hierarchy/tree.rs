use std::collections::hash_map::Entry;
use std::collections::HashMap;

use super::node::{Node, NodeId};

/// The node arena and its lookup indexes.
///
/// Nodes are stored in a flat map keyed by stable identity; every query is
/// O(1) or O(depth), never a full scan. The per-component index serves
/// `component`-lookups from expressions; page roots keep page order for
/// deterministic traversal.
#[derive(Clone, Debug, Default)]
pub struct NodeTree {
    nodes: HashMap<NodeId, Node>,
    by_component: HashMap<String, Vec<NodeId>>,
    page_roots: Vec<(String, Vec<NodeId>)>,
}

impl NodeTree {
    pub(crate) fn insert(&mut self, node: Node) {
        self.by_component
            .entry(node.component().to_string())
            .or_default()
            .push(node.id.clone());
        self.nodes.insert(node.id.clone(), node);
    }

    pub(crate) fn add_page_root(&mut self, page: &str, root: NodeId) {
        match self.page_roots.iter_mut().find(|(p, _)| p == page) {
            Some((_, roots)) => roots.push(root),
            None => self.page_roots.push((page.to_string(), vec![root])),
        }
    }

    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Liveness check: destroyed nodes simply stop existing here.
    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All instances of a component, one per row path.
    pub fn instances_of(&self, component: &str) -> &[NodeId] {
        self.by_component
            .get(component)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// First (often only) instance of a component.
    pub fn find_by_component(&self, component: &str) -> Option<&Node> {
        self.instances_of(component).first().and_then(|id| self.get(id))
    }

    pub fn children(&self, id: &NodeId) -> Vec<&Node> {
        self.get(id)
            .map(|node| {
                node.children
                    .iter()
                    .filter_map(|child| self.get(child))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn parent(&self, id: &NodeId) -> Option<&Node> {
        self.get(id)?.parent.as_ref().and_then(|p| self.get(p))
    }

    /// Ancestors from nearest parent up to the page root.
    pub fn ancestors(&self, id: &NodeId) -> Vec<&Node> {
        let mut out = Vec::new();
        let mut current = self.parent(id);
        while let Some(node) = current {
            out.push(node);
            current = self.parent(&node.id);
        }
        out
    }

    pub fn page_of(&self, id: &NodeId) -> Option<&str> {
        self.get(id).map(|node| node.page.as_str())
    }

    /// Nearest ancestor that repeats, if any.
    pub fn repeating_ancestor_of(&self, id: &NodeId) -> Option<&Node> {
        let mut current = self.parent(id);
        while let Some(node) = current {
            if node.kind.is_repeating() {
                return Some(node);
            }
            current = self.parent(&node.id);
        }
        None
    }

    pub fn page_roots(&self) -> &[(String, Vec<NodeId>)] {
        &self.page_roots
    }

    /// Deterministic pre-order traversal: pages in layout order, roots and
    /// children in declaration/row order. Resolution and reconciliation
    /// both walk this order.
    pub fn dfs_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        for (_, roots) in &self.page_roots {
            for root in roots {
                self.dfs_visit(root, &mut order);
            }
        }
        order
    }

    /// Pre-order traversal of one subtree.
    pub fn subtree_of(&self, id: &NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        self.dfs_visit(id, &mut order);
        order
    }

    fn dfs_visit(&self, id: &NodeId, order: &mut Vec<NodeId>) {
        let Some(node) = self.get(id) else { return };
        order.push(node.id.clone());
        for child in &node.children {
            self.dfs_visit(child, order);
        }
    }
}

/// Memoized per-node derived values.
///
/// Entries are keyed by node identity and validated against a version
/// number the engine bumps only for nodes whose subtree actually changed,
/// so a change in one subtree leaves sibling subtrees' cached results
/// untouched.
#[derive(Clone, Debug, Default)]
pub struct SelectorCache<T> {
    entries: HashMap<NodeId, (u64, T)>,
}

impl<T> SelectorCache<T> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn get_or_compute(
        &mut self,
        node: &NodeId,
        version: u64,
        compute: impl FnOnce() -> T,
    ) -> &T {
        match self.entries.entry(node.clone()) {
            Entry::Occupied(entry) => {
                let slot = entry.into_mut();
                if slot.0 != version {
                    *slot = (version, compute());
                }
                &slot.1
            }
            Entry::Vacant(entry) => &entry.insert((version, compute())).1,
        }
    }

    pub fn cached(&self, node: &NodeId, version: u64) -> Option<&T> {
        self.entries
            .get(node)
            .filter(|(v, _)| *v == version)
            .map(|(_, value)| value)
    }

    /// Drops entries for nodes that no longer exist.
    pub fn retain_live(&mut self, tree: &NodeTree) {
        self.entries.retain(|id, _| tree.contains(id));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
