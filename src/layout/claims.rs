use std::collections::HashMap;

use tracing::warn;

use super::component::{Component, LayoutSet, Page};
use super::LayoutDiagnostic;

/// Ownership edges from container components to their children, per page.
///
/// Each child id is claimed by at most one parent: the layout is a forest,
/// never a DAG. A second claim on an already-claimed child is rejected
/// (first claim wins) and reported; a claim on a nonexistent id is dropped.
/// Both are configuration errors, not fatal ones — the rest of the page
/// still renders.
#[derive(Clone, Debug, Default)]
pub struct ClaimGraph {
    // page id -> child id -> parent id
    claimed_by: HashMap<String, HashMap<String, String>>,
    // page id -> parent id -> claimed child ids, in declaration order
    children: HashMap<String, HashMap<String, Vec<String>>>,
    diagnostics: Vec<LayoutDiagnostic>,
}

impl ClaimGraph {
    pub fn build(layout: &LayoutSet) -> ClaimGraph {
        let mut graph = ClaimGraph::default();
        for page in layout.pages() {
            let claimed = graph.claimed_by.entry(page.id.clone()).or_default();
            let children = graph.children.entry(page.id.clone()).or_default();
            for component in page.components() {
                if !component.kind.is_container() {
                    continue;
                }
                for child in &component.children {
                    if !page.contains(child) {
                        let diagnostic = LayoutDiagnostic::DanglingChild {
                            page: page.id.clone(),
                            parent: component.id.clone(),
                            child: child.clone(),
                        };
                        warn!(%diagnostic, "dropping child reference");
                        graph.diagnostics.push(diagnostic);
                        continue;
                    }
                    if let Some(first) = claimed.get(child) {
                        let diagnostic = LayoutDiagnostic::DuplicateClaim {
                            page: page.id.clone(),
                            child: child.clone(),
                            first: first.clone(),
                            second: component.id.clone(),
                        };
                        warn!(%diagnostic, "keeping first claim");
                        graph.diagnostics.push(diagnostic);
                        continue;
                    }
                    claimed.insert(child.clone(), component.id.clone());
                    children
                        .entry(component.id.clone())
                        .or_default()
                        .push(child.clone());
                }
            }
        }
        graph
    }

    pub fn children_of(&self, page: &str, parent: &str) -> &[String] {
        self.children
            .get(page)
            .and_then(|m| m.get(parent))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn parent_of(&self, page: &str, child: &str) -> Option<&str> {
        self.claimed_by
            .get(page)
            .and_then(|m| m.get(child))
            .map(String::as_str)
    }

    pub fn is_claimed(&self, page: &str, id: &str) -> bool {
        self.parent_of(page, id).is_some()
    }

    /// Page roots: components never claimed as children, declaration order.
    pub fn roots<'a>(&self, page: &'a Page) -> Vec<&'a Component> {
        page.components()
            .iter()
            .filter(|c| !self.is_claimed(&page.id, &c.id))
            .collect()
    }

    pub fn diagnostics(&self) -> &[LayoutDiagnostic] {
        &self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn layout(raw: serde_json::Value) -> LayoutSet {
        LayoutSet::from_json(&raw).unwrap()
    }

    #[test]
    fn test_claims_recorded_for_containers() {
        let layout = layout(json!({
            "page1": [
                {"id": "g", "type": "Group", "children": ["a", "b"]},
                {"id": "a", "type": "Input"},
                {"id": "b", "type": "Input"},
                {"id": "free", "type": "Header"}
            ]
        }));
        let graph = ClaimGraph::build(&layout);
        assert_eq!(graph.children_of("page1", "g"), ["a", "b"]);
        assert_eq!(graph.parent_of("page1", "a"), Some("g"));
        let roots: Vec<_> = graph
            .roots(layout.page("page1").unwrap())
            .iter()
            .map(|c| c.id.clone())
            .collect();
        assert_eq!(roots, ["g", "free"]);
    }

    #[test]
    fn test_duplicate_claim_first_wins() {
        let layout = layout(json!({
            "page1": [
                {"id": "g1", "type": "Group", "children": ["x"]},
                {"id": "g2", "type": "Group", "children": ["x"]},
                {"id": "x", "type": "Input"}
            ]
        }));
        let graph = ClaimGraph::build(&layout);
        assert_eq!(graph.parent_of("page1", "x"), Some("g1"));
        assert_eq!(graph.children_of("page1", "g2"), [] as [&str; 0]);
        assert_eq!(
            graph.diagnostics(),
            &[LayoutDiagnostic::DuplicateClaim {
                page: "page1".to_string(),
                child: "x".to_string(),
                first: "g1".to_string(),
                second: "g2".to_string(),
            }]
        );
    }

    #[test]
    fn test_dangling_child_dropped() {
        let layout = layout(json!({
            "page1": [
                {"id": "g", "type": "Group", "children": ["ghost", "a"]},
                {"id": "a", "type": "Input"}
            ]
        }));
        let graph = ClaimGraph::build(&layout);
        assert_eq!(graph.children_of("page1", "g"), ["a"]);
        assert!(matches!(
            graph.diagnostics()[0],
            LayoutDiagnostic::DanglingChild { .. }
        ));
    }
}
