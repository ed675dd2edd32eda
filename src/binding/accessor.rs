use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tracing::debug;

use super::path::{FieldPath, Segment};

/// One committed change to the data model, in write order. Emitted for
/// persistence, diffing and undo; `old`/`new` snapshot the value at `path`
/// before and after the write.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataPatch {
    pub path: FieldPath,
    pub old: Json,
    pub new: Json,
}

/// The backend-shaped form-data object with path-based access.
///
/// Reads are non-destructive and treat unresolvable paths (missing fields,
/// indices past array bounds) as absent rather than as errors. Writes go
/// through the single owning engine and report every change as a
/// [`DataPatch`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DataModel {
    root: Json,
}

impl DataModel {
    pub fn new(root: Json) -> Self {
        Self { root }
    }

    pub fn empty() -> Self {
        Self {
            root: Json::Object(serde_json::Map::new()),
        }
    }

    pub fn root(&self) -> &Json {
        &self.root
    }

    pub fn read(&self, path: &FieldPath) -> Option<&Json> {
        let mut current = &self.root;
        for segment in path.segments() {
            current = match (segment, current) {
                (Segment::Field(name), Json::Object(map)) => map.get(name)?,
                (Segment::Index(idx), Json::Array(items)) => items.get(*idx)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Length of the array at `path`, or 0 when absent or not an array.
    pub fn array_len(&self, path: &FieldPath) -> usize {
        match self.read(path) {
            Some(Json::Array(items)) => items.len(),
            _ => 0,
        }
    }

    /// Writes `new` at `path`, creating intermediate objects and padding
    /// arrays with nulls as needed. Returns `None` when the value is
    /// already equal (so coalesced edits do not produce empty patches).
    pub fn write(&mut self, path: &FieldPath, new: Json) -> Option<DataPatch> {
        let slot = Self::slot_mut(&mut self.root, path.segments());
        if *slot == new {
            return None;
        }
        let old = std::mem::replace(slot, new.clone());
        Some(DataPatch {
            path: path.clone(),
            old,
            new,
        })
    }

    /// Inserts `value` at position `index` of the array at `path`, padding
    /// the array when it is shorter than `index`.
    pub fn insert_row(&mut self, path: &FieldPath, index: usize, value: Json) -> DataPatch {
        let slot = Self::slot_mut(&mut self.root, path.segments());
        if !slot.is_array() {
            if !slot.is_null() {
                debug!(path = %path, "replacing non-array value with array for row insert");
            }
            *slot = Json::Array(Vec::new());
        }
        let old = slot.clone();
        if let Json::Array(items) = slot {
            while items.len() < index {
                items.push(Json::Null);
            }
            items.insert(index, value);
        }
        DataPatch {
            path: path.clone(),
            old,
            new: slot.clone(),
        }
    }

    /// Removes position `index` of the array at `path`. `None` when there
    /// is no such row to remove.
    pub fn remove_row(&mut self, path: &FieldPath, index: usize) -> Option<DataPatch> {
        let slot = Self::slot_mut(&mut self.root, path.segments());
        match slot {
            Json::Array(items) if index < items.len() => {
                let old = Json::Array(items.clone());
                items.remove(index);
                Some(DataPatch {
                    path: path.clone(),
                    old,
                    new: slot.clone(),
                })
            }
            _ => None,
        }
    }

    /// Moves the row at `from` to position `to` within the array at `path`.
    pub fn move_row(&mut self, path: &FieldPath, from: usize, to: usize) -> Option<DataPatch> {
        let slot = Self::slot_mut(&mut self.root, path.segments());
        match slot {
            Json::Array(items) if from < items.len() && to < items.len() && from != to => {
                let old = Json::Array(items.clone());
                let row = items.remove(from);
                items.insert(to, row);
                Some(DataPatch {
                    path: path.clone(),
                    old,
                    new: slot.clone(),
                })
            }
            _ => None,
        }
    }

    // Walks to the slot for `segments`, materializing missing containers.
    // An existing value of the wrong shape is replaced; the write wins.
    fn slot_mut<'a>(current: &'a mut Json, segments: &[Segment]) -> &'a mut Json {
        let mut slot = current;
        for segment in segments {
            match segment {
                Segment::Field(name) => {
                    if !slot.is_object() {
                        *slot = Json::Object(serde_json::Map::new());
                    }
                    slot = slot
                        .as_object_mut()
                        .unwrap()
                        .entry(name.clone())
                        .or_insert(Json::Null);
                }
                Segment::Index(idx) => {
                    if !slot.is_array() {
                        *slot = Json::Array(Vec::new());
                    }
                    let items = slot.as_array_mut().unwrap();
                    while items.len() <= *idx {
                        items.push(Json::Null);
                    }
                    slot = &mut items[*idx];
                }
            }
        }
        slot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn path(s: &str) -> FieldPath {
        FieldPath::parse(s).unwrap()
    }

    #[test]
    fn test_read_nested() {
        let model = DataModel::new(json!({"group": [{"field": "a"}, {"field": "b"}]}));
        assert_eq!(model.read(&path("group[1].field")), Some(&json!("b")));
        assert_eq!(model.read(&path("group[2].field")), None);
        assert_eq!(model.read(&path("missing.field")), None);
    }

    #[test]
    fn test_write_produces_patch_with_old_value() {
        let mut model = DataModel::new(json!({"name": "old"}));
        let patch = model.write(&path("name"), json!("new")).unwrap();
        assert_eq!(patch.old, json!("old"));
        assert_eq!(patch.new, json!("new"));
        assert_eq!(model.read(&path("name")), Some(&json!("new")));
    }

    #[test]
    fn test_write_unchanged_is_no_patch() {
        let mut model = DataModel::new(json!({"name": "same"}));
        assert_eq!(model.write(&path("name"), json!("same")), None);
    }

    #[test]
    fn test_write_autovivifies() {
        let mut model = DataModel::empty();
        let patch = model.write(&path("group[1].field"), json!("x")).unwrap();
        assert_eq!(patch.old, Json::Null);
        assert_eq!(
            model.root(),
            &json!({"group": [null, {"field": "x"}]})
        );
    }

    #[test]
    fn test_remove_row_shifts() {
        let mut model = DataModel::new(json!({"rows": [1, 2, 3]}));
        let patch = model.remove_row(&path("rows"), 1).unwrap();
        assert_eq!(patch.new, json!([1, 3]));
        assert_eq!(model.remove_row(&path("rows"), 9), None);
    }

    #[test]
    fn test_move_row() {
        let mut model = DataModel::new(json!({"rows": ["a", "b", "c"]}));
        model.move_row(&path("rows"), 0, 2).unwrap();
        assert_eq!(model.read(&path("rows")), Some(&json!(["b", "c", "a"])));
    }
}
