use std::collections::HashMap;

use serde_json::Value as Json;
use tracing::{debug, warn};

use crate::binding::{DataModel, DataPatch, FieldPath};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::expression::{OptionItem, TextResolver};
use crate::hierarchy::{build_tree, HierarchyError, NodeId, NodeTree, Row, RowState, GROUP_BINDING};
use crate::layout::{ClaimGraph, LayoutDiagnostic, LayoutSet};
use crate::resolve::{Environment, ResolutionEngine, ResolvedProps};

// Row-sync iterates until nested repeating groups stabilize; real layouts
// nest a handful of levels at most.
const MAX_ROW_SYNC_PASSES: usize = 32;

/// The single owner of all engine state: layout, claim graph, row state,
/// node tree, resolved properties, and both copies of the data model.
///
/// Everything external goes through intents on this type — there is no
/// direct mutation of tree structures from outside. User edits land in the
/// echo copy immediately (responsive echo) and reach the canonical,
/// resolution-triggering copy on [`flush`](Self::flush); the embedding
/// application owns the debounce timer and must flush synchronously before
/// page navigation or save.
pub struct FormEngine {
    config: EngineConfig,
    layout: LayoutSet,
    claims: ClaimGraph,
    rows: RowState,
    tree: NodeTree,
    resolution: ResolutionEngine,
    canonical: DataModel,
    echo: DataModel,
    pending: Vec<(FieldPath, Json)>,
    patch_log: Vec<DataPatch>,
    options: HashMap<String, Vec<OptionItem>>,
    language: String,
    texts: Box<dyn TextResolver>,
    instance: HashMap<String, String>,
}

impl FormEngine {
    pub fn new(
        config: EngineConfig,
        layout_json: &Json,
        data: Json,
        texts: Box<dyn TextResolver>,
        instance: HashMap<String, String>,
    ) -> Result<FormEngine> {
        let layout = LayoutSet::from_json(layout_json)?;
        let claims = ClaimGraph::build(&layout);
        let canonical = DataModel::new(data);
        let echo = canonical.clone();
        let language = config.default_language.clone();
        let resolution = ResolutionEngine::new(config.max_expression_depth);
        let mut engine = FormEngine {
            config,
            layout,
            claims,
            rows: RowState::default(),
            tree: NodeTree::default(),
            resolution,
            canonical,
            echo,
            pending: Vec::new(),
            patch_log: Vec::new(),
            options: HashMap::new(),
            language,
            texts,
            instance,
        };
        engine.sync_rows();
        engine.resolution.sync_structure(&engine.tree);
        engine.resolve_now();
        Ok(engine)
    }

    // ---- queries -------------------------------------------------------

    pub fn tree(&self) -> &NodeTree {
        &self.tree
    }

    pub fn resolution(&self) -> &ResolutionEngine {
        &self.resolution
    }

    pub fn resolved(&self, id: &NodeId) -> Option<&ResolvedProps> {
        self.resolution.resolved(id)
    }

    /// Canonical (resolution-triggering) data model.
    pub fn data(&self) -> &DataModel {
        &self.canonical
    }

    /// Echo copy including not-yet-flushed edits.
    pub fn current_data(&self) -> &DataModel {
        &self.echo
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// All configuration errors found while parsing and claiming.
    pub fn diagnostics(&self) -> Vec<&LayoutDiagnostic> {
        self.layout
            .diagnostics()
            .iter()
            .chain(self.claims.diagnostics())
            .collect()
    }

    /// Drains the ordered patch stream for persistence/diffing.
    pub fn take_patches(&mut self) -> Vec<DataPatch> {
        std::mem::take(&mut self.patch_log)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    // ---- intents -------------------------------------------------------

    /// Records a user edit. The echo copy updates immediately; the
    /// canonical model and resolution wait for [`flush`](Self::flush).
    ///
    /// Returns `false` (a no-op, not an error) when the node has been
    /// destroyed in the meantime — render callbacks race with row removal
    /// by nature.
    pub fn set_value(&mut self, id: &NodeId, binding: &str, value: Json) -> Result<bool> {
        if !self.tree.contains(id) {
            debug!(node = %id, "set_value on destroyed node ignored");
            return Ok(false);
        }
        let path = self
            .resolution
            .resolved(id)
            .and_then(|props| props.binding(binding).cloned())
            .ok_or_else(|| {
                Error::internal(format!("node '{}' has no binding '{}'", id, binding))
            })?;
        self.echo.write(&path, value.clone());
        self.pending.push((path, value));
        Ok(true)
    }

    /// Applies queued edits to the canonical model and re-resolves what
    /// they touched. Synchronous; called by the embedding application
    /// after the debounce window, or immediately on navigation/save.
    pub fn flush(&mut self) -> Vec<DataPatch> {
        if self.pending.is_empty() {
            return Vec::new();
        }
        let mut patches = Vec::new();
        for (path, value) in std::mem::take(&mut self.pending) {
            if let Some(patch) = self.canonical.write(&path, value) {
                patches.push(patch);
            }
        }
        if patches.is_empty() {
            return patches;
        }
        self.patch_log.extend(patches.iter().cloned());
        // Writes may have grown arrays under repeating groups.
        if self.sync_rows() {
            self.resolution.sync_structure(&self.tree);
        }
        self.resolution.mark_data_changes(&patches);
        self.resolve_now();
        patches
    }

    /// Adds a row to a repeating container, at `at` or at the end.
    pub fn add_row(&mut self, container: &NodeId, at: Option<usize>) -> Result<Row> {
        self.flush();
        let binding = self.repeating_binding(container)?;
        if self.rows.len(container) >= self.config.max_rows {
            return Err(Error::internal(format!(
                "row limit {} reached for '{}'",
                self.config.max_rows, container
            )));
        }
        let row = self.rows.add(container, at);
        let patch = self
            .canonical
            .insert_row(&binding, row.index, Json::Object(serde_json::Map::new()));
        self.patch_log.push(patch.clone());
        self.after_structural_change(container, &[patch]);
        Ok(row)
    }

    /// Removes a row and its whole subtree of nodes; the destroyed nodes'
    /// state is torn down and remaining rows are renumbered densely.
    pub fn remove_row(&mut self, container: &NodeId, index: usize) -> Result<Row> {
        self.flush();
        let binding = self.repeating_binding(container)?;
        let len = self.rows.len(container);
        let row = self
            .rows
            .remove(container, index)
            .ok_or(HierarchyError::RowOutOfRange {
                container: container.to_string(),
                index,
                len,
            })?;
        let mut patches = Vec::new();
        if let Some(patch) = self.canonical.remove_row(&binding, index) {
            self.patch_log.push(patch.clone());
            patches.push(patch);
        }
        self.rows.purge_uuid(row.uuid);
        self.after_structural_change(container, &patches);
        Ok(row)
    }

    /// Moves a row; uuids travel with it, indices are recomputed.
    pub fn move_row(&mut self, container: &NodeId, from: usize, to: usize) -> Result<()> {
        self.flush();
        let binding = self.repeating_binding(container)?;
        let len = self.rows.len(container);
        if !self.rows.shift(container, from, to) {
            return Err(HierarchyError::RowOutOfRange {
                container: container.to_string(),
                index: from.max(to),
                len,
            }
            .into());
        }
        let mut patches = Vec::new();
        if let Some(patch) = self.canonical.move_row(&binding, from, to) {
            self.patch_log.push(patch.clone());
            patches.push(patch);
        }
        self.after_structural_change(container, &patches);
        Ok(())
    }

    pub fn set_language(&mut self, language: impl Into<String>) {
        self.flush();
        self.language = language.into();
        self.resolution.mark_language_changed();
        self.resolve_now();
    }

    /// Injects a loaded options list and re-resolves its dependents.
    pub fn set_options(&mut self, key: impl Into<String>, items: Vec<OptionItem>) {
        self.flush();
        let key = key.into();
        self.options.insert(key.clone(), items);
        self.resolution.mark_options_changed(&key);
        self.resolve_now();
    }

    pub fn set_instance_value(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.flush();
        self.instance.insert(key.into(), value.into());
        self.resolution.mark_instance_changed();
        self.resolve_now();
    }

    // ---- internals -----------------------------------------------------

    fn repeating_binding(&self, container: &NodeId) -> Result<FieldPath> {
        let node = self
            .tree
            .get(container)
            .filter(|node| node.kind.is_repeating())
            .ok_or_else(|| HierarchyError::UnknownContainer(container.to_string()))?;
        let component = self
            .layout
            .page(&node.page)
            .and_then(|page| page.component(node.component()))
            .ok_or_else(|| HierarchyError::UnknownContainer(container.to_string()))?;
        let binding = component
            .bindings
            .get(GROUP_BINDING)
            .ok_or_else(|| HierarchyError::UnknownContainer(container.to_string()))?;
        Ok(node.row_context.substitute(binding))
    }

    fn after_structural_change(&mut self, container: &NodeId, patches: &[DataPatch]) {
        self.echo = self.canonical.clone();
        self.tree = build_tree(&self.layout, &self.claims, &self.rows);
        self.resolution.sync_structure(&self.tree);
        // Sibling rows' indices shifted, so every binding under the
        // container may now point elsewhere.
        self.resolution.mark_subtree_dirty(&self.tree, container);
        // Nodes outside the container may have recorded reads under the
        // mutated array (an expression addressing a row by index).
        self.resolution.mark_data_changes(patches);
        self.resolve_now();
    }

    /// Seeds/extends row lists from data-model array lengths and rebuilds
    /// the tree until nested groups stabilize. Returns whether row state
    /// changed.
    fn sync_rows(&mut self) -> bool {
        let mut any_change = false;
        for pass in 0.. {
            let tree = build_tree(&self.layout, &self.claims, &self.rows);
            let mut changed = false;
            for id in tree.dfs_order() {
                let Some(node) = tree.get(&id) else { continue };
                if !node.kind.is_repeating() {
                    continue;
                }
                let Some(component) = self
                    .layout
                    .page(&node.page)
                    .and_then(|page| page.component(node.component()))
                else {
                    continue;
                };
                let Some(binding) = component.bindings.get(GROUP_BINDING) else {
                    continue;
                };
                let absolute = node.row_context.substitute(binding);
                let len = self.canonical.array_len(&absolute).min(self.config.max_rows);
                changed |= self.rows.set_len(&id, len);
            }
            if !changed {
                self.tree = tree;
                break;
            }
            any_change = true;
            if pass >= MAX_ROW_SYNC_PASSES {
                warn!("row sync did not stabilize; keeping last tree");
                self.tree = tree;
                break;
            }
        }
        any_change
    }

    fn resolve_now(&mut self) {
        let env = Environment {
            data: &self.canonical,
            options: &self.options,
            language: &self.language,
            texts: self.texts.as_ref(),
            instance: &self.instance,
        };
        self.resolution.resolve(&self.tree, &self.layout, &env);
    }
}
