use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};
use uuid::Uuid;

use super::resolved::{PropValue, ResolvedProps};
use crate::binding::{DataModel, DataPatch, RowContext};
use crate::expression::{
    ComponentLookup, ComponentValueSource, DataSources, Expression, ExpressionEvaluator,
    OptionItem, ReadTrace, TextResolver, Value,
};
use crate::hierarchy::{Node, NodeId, NodeTree};
use crate::layout::LayoutSet;

/// Binding name carrying a component's primary value.
pub const VALUE_BINDING: &str = "simpleBinding";

/// The external state one resolution pass evaluates against. All inputs
/// are borrowed; the engine owns nothing here.
pub struct Environment<'a> {
    pub data: &'a DataModel,
    pub options: &'a HashMap<String, Vec<OptionItem>>,
    pub language: &'a str,
    pub texts: &'a dyn TextResolver,
    pub instance: &'a HashMap<String, String>,
}

// Component-value lookups during resolution read through the node tree:
// the instance nearest the caller's row scope wins, hidden instances read
// as null, and the underlying data path is reported for dependency
// tracking.
struct TreeValueSource<'a> {
    tree: &'a NodeTree,
    layout: &'a LayoutSet,
    data: &'a DataModel,
    hidden: &'a HashSet<NodeId>,
}

impl ComponentValueSource for TreeValueSource<'_> {
    fn component_value(&self, component_id: &str, ctx: &RowContext) -> ComponentLookup {
        let instances = self.tree.instances_of(component_id);
        if instances.is_empty() {
            return ComponentLookup::default();
        }
        let chain: Vec<Uuid> = ctx.entries().iter().map(|e| e.uuid).collect();
        // Longest row-path prefix wins: the instance in the caller's own
        // row beats the top-level one. Out-of-scope instances score zero
        // but remain candidates (cross-row references fall back to the
        // first instance).
        let best = instances
            .iter()
            .max_by_key(|id| {
                if chain.starts_with(id.rows()) {
                    id.rows().len() + 1
                } else {
                    0
                }
            })
            .unwrap();
        let Some(node) = self.tree.get(best) else {
            return ComponentLookup::default();
        };
        if self.hidden.contains(&node.id) {
            return ComponentLookup {
                value: Some(Value::Null),
                read_path: None,
            };
        }
        let binding = self
            .layout
            .page(&node.page)
            .and_then(|page| page.component(component_id))
            .and_then(|component| component.bindings.get(VALUE_BINDING));
        let Some(binding) = binding else {
            return ComponentLookup {
                value: Some(Value::Null),
                read_path: None,
            };
        };
        let absolute = node.row_context.substitute(binding);
        let value = self
            .data
            .read(&absolute)
            .map(Value::from_json)
            .unwrap_or(Value::Null);
        ComponentLookup {
            value: Some(value),
            read_path: Some(absolute),
        }
    }
}

/// Incremental resolver: turns expression-bearing components into
/// [`ResolvedProps`] per node.
///
/// There is no static dependency graph. Each node's evaluation records
/// which data sources it read ([`ReadTrace`]); a later change overlapping
/// any recorded read marks exactly those nodes dirty, approximating "this
/// node would evaluate differently" without re-running the whole tree on
/// every keystroke.
///
/// Ordering is deterministic: pages in layout order, containers before
/// children, sibling properties in declaration order. A node resolved as
/// hidden suppresses its whole subtree — descendants' expressions are
/// never evaluated in that pass.
pub struct ResolutionEngine {
    evaluator: ExpressionEvaluator,
    resolved: HashMap<NodeId, ResolvedProps>,
    traces: HashMap<NodeId, ReadTrace>,
    hidden: HashSet<NodeId>,
    dirty: HashSet<NodeId>,
    // (node, property) pairs already reported; failures log once.
    reported: HashSet<(NodeId, String)>,
    node_versions: HashMap<NodeId, u64>,
    version: u64,
}

impl ResolutionEngine {
    pub fn new(max_expression_depth: usize) -> Self {
        Self {
            evaluator: ExpressionEvaluator::new(max_expression_depth),
            resolved: HashMap::new(),
            traces: HashMap::new(),
            hidden: HashSet::new(),
            dirty: HashSet::new(),
            reported: HashSet::new(),
            node_versions: HashMap::new(),
            version: 0,
        }
    }

    pub fn evaluator(&self) -> &ExpressionEvaluator {
        &self.evaluator
    }

    pub fn resolved(&self, id: &NodeId) -> Option<&ResolvedProps> {
        self.resolved.get(id)
    }

    /// Whether a node is effectively hidden (own expression or ancestor).
    pub fn is_hidden(&self, id: &NodeId) -> bool {
        self.hidden.contains(id)
    }

    /// Version of the last change affecting this node; selector caches key
    /// their entries on it.
    pub fn node_version(&self, id: &NodeId) -> u64 {
        self.node_versions.get(id).copied().unwrap_or(0)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn mark_all_dirty(&mut self, tree: &NodeTree) {
        self.dirty.extend(tree.dfs_order());
    }

    /// Marks nodes whose recorded reads overlap any changed path.
    pub fn mark_data_changes(&mut self, patches: &[DataPatch]) {
        for (id, trace) in &self.traces {
            if patches.iter().any(|patch| trace.reads_path(&patch.path)) {
                self.dirty.insert(id.clone());
            }
        }
    }

    pub fn mark_options_changed(&mut self, key: &str) {
        for (id, trace) in &self.traces {
            if trace.options.contains(key) {
                self.dirty.insert(id.clone());
            }
        }
    }

    pub fn mark_language_changed(&mut self) {
        for (id, trace) in &self.traces {
            if trace.language {
                self.dirty.insert(id.clone());
            }
        }
    }

    pub fn mark_instance_changed(&mut self) {
        for (id, trace) in &self.traces {
            if trace.instance {
                self.dirty.insert(id.clone());
            }
        }
    }

    /// Marks a whole subtree dirty (row moves change every embedded index
    /// without changing identities).
    pub fn mark_subtree_dirty(&mut self, tree: &NodeTree, root: &NodeId) {
        self.dirty.extend(tree.subtree_of(root));
    }

    /// Reconciles per-node state after a structural change: state for
    /// destroyed nodes is torn down, new nodes are marked for resolution.
    /// In-flight work for destroyed nodes becomes a no-op because their
    /// entries are simply gone.
    pub fn sync_structure(&mut self, tree: &NodeTree) {
        let before = self.resolved.len();
        self.resolved.retain(|id, _| tree.contains(id));
        self.traces.retain(|id, _| tree.contains(id));
        self.hidden.retain(|id| tree.contains(id));
        self.dirty.retain(|id| tree.contains(id));
        self.node_versions.retain(|id, _| tree.contains(id));
        self.reported.retain(|(id, _)| tree.contains(id));
        let destroyed = before - self.resolved.len();
        if destroyed > 0 {
            debug!(destroyed, "tore down state for destroyed nodes");
        }
        for id in tree.dfs_order() {
            if !self.resolved.contains_key(&id) {
                self.dirty.insert(id);
            }
        }
    }

    /// Runs one synchronous resolution pass over the dirty set, cascading
    /// hidden-state flips down the tree. Returns how many nodes were
    /// re-resolved.
    pub fn resolve(&mut self, tree: &NodeTree, layout: &LayoutSet, env: &Environment<'_>) -> usize {
        self.version += 1;
        let mut hidden = HashSet::new();
        let mut resolved_count = 0;
        for id in tree.dfs_order() {
            let Some(node) = tree.get(&id) else { continue };
            let parent_hidden = node
                .parent
                .as_ref()
                .map(|p| hidden.contains(p))
                .unwrap_or(false);

            let reusable = !self.dirty.contains(&id)
                && self
                    .resolved
                    .get(&id)
                    .is_some_and(|props| props.hidden_by_ancestor == parent_hidden);
            if reusable {
                if self.resolved[&id].is_hidden() {
                    hidden.insert(id);
                }
                continue;
            }

            let (props, trace) = if parent_hidden {
                (ResolvedProps::hidden_by_ancestor(), ReadTrace::default())
            } else {
                self.resolve_node(node, tree, layout, env, &hidden)
            };
            resolved_count += 1;
            if props.is_hidden() {
                hidden.insert(id.clone());
            }
            if self.resolved.get(&id) != Some(&props) {
                self.node_versions.insert(id.clone(), self.version);
            }
            self.resolved.insert(id.clone(), props);
            self.traces.insert(id, trace);
        }
        self.hidden = hidden;
        self.dirty.clear();
        resolved_count
    }

    // Visibility first; a node hidden by its own expression resolves
    // nothing further (the subtree is suppressed by the caller's walk).
    fn resolve_node(
        &mut self,
        node: &Node,
        tree: &NodeTree,
        layout: &LayoutSet,
        env: &Environment<'_>,
        hidden: &HashSet<NodeId>,
    ) -> (ResolvedProps, ReadTrace) {
        let component = layout
            .page(&node.page)
            .and_then(|page| page.component(node.component()));
        let Some(component) = component else {
            // A node for a component no longer in the layout is stale;
            // resolve it as inert rather than crash a render callback.
            debug!(node = %node.id, "no layout component for node");
            return (ResolvedProps::default(), ReadTrace::default());
        };

        let source = TreeValueSource {
            tree,
            layout,
            data: env.data,
            hidden,
        };
        let sources = DataSources::new(
            env.data,
            env.options,
            env.language,
            env.texts,
            env.instance,
            &source,
            &node.row_context,
        );
        let mut props = ResolvedProps::default();

        if let Some(expr) = &component.hidden {
            let (value, error) = self.eval_prop(&node.id, "hidden", expr, &sources);
            props.hidden = value.truthy();
            if let Some(error) = error {
                props.errors.insert("hidden".to_string(), error);
            }
            if props.hidden {
                return (props, sources.into_trace());
            }
        }
        if let Some(expr) = &component.required {
            let (value, error) = self.eval_prop(&node.id, "required", expr, &sources);
            props.required = value.truthy();
            if let Some(error) = error {
                props.errors.insert("required".to_string(), error);
            }
        }
        if let Some(expr) = &component.read_only {
            let (value, error) = self.eval_prop(&node.id, "readOnly", expr, &sources);
            props.read_only = value.truthy();
            if let Some(error) = error {
                props.errors.insert("readOnly".to_string(), error);
            }
        }
        for (name, expr) in &component.texts {
            let key = format!("textResourceBindings.{}", name);
            let resolved = match self.eval_text(&node.id, &key, expr, &sources) {
                Ok(value) => PropValue::Evaluated(value),
                Err(error) => {
                    props.errors.insert(key, error.clone());
                    PropValue::Error(error)
                }
            };
            props.texts.insert(name.clone(), resolved);
        }
        for (name, binding) in &component.bindings {
            props
                .bindings
                .insert(name.clone(), node.row_context.substitute(binding));
        }
        if let Some(binding) = props.bindings.get(VALUE_BINDING) {
            props.value = Some(sources.data_model_at(binding));
        }
        for (name, raw) in &component.extra {
            let resolved = match Expression::detect(raw) {
                Some(expr) => {
                    let (value, error) = self.eval_prop(&node.id, name, expr.clone(), &sources);
                    match error {
                        Some(error) => {
                            props.errors.insert(name.clone(), error.clone());
                            PropValue::Error(error)
                        }
                        None => PropValue::Evaluated(value),
                    }
                }
                None => PropValue::Literal(raw.clone()),
            };
            props.extra.insert(name.clone(), resolved);
        }
        (props, sources.into_trace())
    }

    // A literal string in a text binding is itself a translation key.
    fn eval_text(
        &mut self,
        node: &NodeId,
        key: &str,
        expr: &Expression,
        sources: &DataSources<'_>,
    ) -> Result<Value, String> {
        if let Expression::Literal(Value::String(text_key)) = expr {
            return Ok(sources.text(text_key));
        }
        let (value, error) = self.eval_prop(node, key, expr.clone(), sources);
        match error {
            Some(error) => Err(error),
            None => Ok(value),
        }
    }

    fn eval_prop(
        &mut self,
        node: &NodeId,
        key: &str,
        expr: impl std::borrow::Borrow<Expression>,
        sources: &DataSources<'_>,
    ) -> (Value, Option<String>) {
        let expr = expr.borrow();
        if let Expression::Literal(value) = expr {
            return (value.clone(), None);
        }
        match self.evaluator.evaluate(expr, sources) {
            Ok(value) => (value, None),
            Err(error) => {
                let marker = (node.clone(), key.to_string());
                if self.reported.insert(marker) {
                    warn!(node = %node, property = key, %error, "expression evaluation failed");
                }
                (Value::Null, Some(error.to_string()))
            }
        }
    }
}
