use core::fmt;

use uuid::Uuid;

use crate::binding::RowContext;
use crate::layout::ComponentType;

/// Stable identity of one node: the component id plus the chain of
/// ancestor row uuids it is nested within, outer-to-inner.
///
/// Identity survives rebuilds and row reorderings as long as the component
/// and row identities are unchanged — required for reconciliation and
/// effect cleanup downstream. Row indices are deliberately not part of the
/// identity; they live in the node's row context.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeId {
    component: String,
    rows: Vec<Uuid>,
}

impl NodeId {
    pub fn root(component: impl Into<String>) -> NodeId {
        NodeId {
            component: component.into(),
            rows: Vec::new(),
        }
    }

    pub fn nested(component: impl Into<String>, rows: Vec<Uuid>) -> NodeId {
        NodeId {
            component: component.into(),
            rows,
        }
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn rows(&self) -> &[Uuid] {
        &self.rows
    }

    /// True when this node lives inside the given row.
    pub fn within_row(&self, uuid: Uuid) -> bool {
        self.rows.contains(&uuid)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.component)?;
        for (i, uuid) in self.rows.iter().enumerate() {
            write!(f, "{}{}", if i == 0 { '@' } else { '/' }, uuid)?;
        }
        Ok(())
    }
}

/// One instantiated (component × row-path) unit of the hierarchy.
///
/// Parent/child relationships are id references into the tree's arena, not
/// object pointers, so structural changes are cheap map edits.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub page: String,
    pub kind: ComponentType,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub row_context: RowContext,
}

impl Node {
    pub fn component(&self) -> &str {
        self.id.component()
    }

    /// Index of this node within its nearest repeating ancestor's rows.
    pub fn row_index(&self) -> Option<usize> {
        self.row_context.innermost().map(|entry| entry.index)
    }

    pub fn row_uuid(&self) -> Option<Uuid> {
        self.row_context.innermost().map(|entry| entry.uuid)
    }
}
