use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::node::NodeId;

/// One repetition of a repeating container.
///
/// The uuid is assigned once and travels with the row through reorderings;
/// the index is positional and recomputed to stay dense (0..N-1) after any
/// structural change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub uuid: Uuid,
    pub index: usize,
}

impl Row {
    fn fresh(index: usize) -> Row {
        Row {
            uuid: Uuid::new_v4(),
            index,
        }
    }
}

/// Current rows of every repeating container, keyed by the container's node
/// id (which embeds ancestor row uuids, so nested repeating groups keep
/// independent row lists per outer row).
#[derive(Clone, Debug, Default)]
pub struct RowState {
    rows: HashMap<NodeId, Vec<Row>>,
}

impl RowState {
    pub fn rows(&self, container: &NodeId) -> &[Row] {
        self.rows.get(container).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self, container: &NodeId) -> usize {
        self.rows(container).len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Aligns the row list with a data-model array length. Existing rows
    /// keep their uuids; new rows get fresh ones; surplus rows are dropped.
    /// Returns whether anything changed.
    pub fn set_len(&mut self, container: &NodeId, len: usize) -> bool {
        let current = self.rows.get(container).map_or(0, Vec::len);
        if current == len {
            return false;
        }
        if len == 0 {
            self.rows.remove(container);
            return true;
        }
        let rows = self.rows.entry(container.clone()).or_default();
        while rows.len() < len {
            rows.push(Row::fresh(rows.len()));
        }
        rows.truncate(len);
        true
    }

    /// Inserts a fresh row at `at` (or at the end), renumbering siblings.
    pub fn add(&mut self, container: &NodeId, at: Option<usize>) -> Row {
        let rows = self.rows.entry(container.clone()).or_default();
        let at = at.unwrap_or(rows.len()).min(rows.len());
        let row = Row::fresh(at);
        rows.insert(at, row);
        Self::reindex(rows);
        rows[at]
    }

    /// Removes the row at `index`, renumbering the rest. The removed row's
    /// uuid identifies every destroyed node.
    pub fn remove(&mut self, container: &NodeId, index: usize) -> Option<Row> {
        let rows = self.rows.get_mut(container)?;
        if index >= rows.len() {
            return None;
        }
        let removed = rows.remove(index);
        Self::reindex(rows);
        if rows.is_empty() {
            self.rows.remove(container);
        }
        Some(removed)
    }

    /// Moves a row; its uuid travels, only indices are recomputed.
    pub fn shift(&mut self, container: &NodeId, from: usize, to: usize) -> bool {
        let Some(rows) = self.rows.get_mut(container) else {
            return false;
        };
        if from >= rows.len() || to >= rows.len() || from == to {
            return false;
        }
        let row = rows.remove(from);
        rows.insert(to, row);
        Self::reindex(rows);
        true
    }

    /// Drops row lists of containers nested inside a removed row: any
    /// container whose identity embeds the destroyed uuid is gone.
    pub fn purge_uuid(&mut self, uuid: Uuid) {
        self.rows.retain(|id, _| !id.rows().contains(&uuid));
    }

    fn reindex(rows: &mut [Row]) {
        for (i, row) in rows.iter_mut().enumerate() {
            row.index = i;
        }
    }
}
