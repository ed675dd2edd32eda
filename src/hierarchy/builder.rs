use tracing::warn;
use uuid::Uuid;

use super::node::{Node, NodeId};
use super::row::RowState;
use super::tree::NodeTree;
use crate::binding::{RowContext, RowEntry};
use crate::layout::{ClaimGraph, Component, LayoutSet, Page};

/// Binding name under which a repeating container declares the array it
/// repeats over.
pub const GROUP_BINDING: &str = "group";

/// Materializes the node hierarchy from the claim graph and the current
/// row state.
///
/// One node per (component, row-path) pair: page roots are the components
/// never claimed as children; containers instantiate their claimed
/// children once per row (non-repeating containers count as exactly one
/// virtual row). Rebuilding with unchanged inputs produces identical node
/// identities, so reconciliation against a previous build is a no-op.
pub fn build_tree(layout: &LayoutSet, claims: &ClaimGraph, rows: &RowState) -> NodeTree {
    let mut tree = NodeTree::default();
    for page in layout.pages() {
        for root in claims.roots(page) {
            let id = instantiate(
                &mut tree,
                page,
                root,
                claims,
                rows,
                None,
                &RowContext::empty(),
                &[],
            );
            tree.add_page_root(&page.id, id);
        }
    }
    tree
}

#[allow(clippy::too_many_arguments)]
fn instantiate(
    tree: &mut NodeTree,
    page: &Page,
    component: &Component,
    claims: &ClaimGraph,
    rows: &RowState,
    parent: Option<NodeId>,
    ctx: &RowContext,
    chain: &[Uuid],
) -> NodeId {
    let id = NodeId::nested(component.id.clone(), chain.to_vec());
    let mut children = Vec::new();

    if component.kind.is_repeating() {
        match component.bindings.get(GROUP_BINDING) {
            Some(binding) => {
                let absolute = ctx.substitute(binding);
                for row in rows.rows(&id) {
                    let child_ctx = ctx.extended(RowEntry {
                        binding: absolute.clone(),
                        uuid: row.uuid,
                        index: row.index,
                    });
                    let mut child_chain = chain.to_vec();
                    child_chain.push(row.uuid);
                    for child_id in claims.children_of(&page.id, &component.id) {
                        let Some(child) = page.component(child_id) else {
                            continue;
                        };
                        children.push(instantiate(
                            tree,
                            page,
                            child,
                            claims,
                            rows,
                            Some(id.clone()),
                            &child_ctx,
                            &child_chain,
                        ));
                    }
                }
            }
            None => {
                warn!(component = %component.id, "repeating container has no group binding; producing no rows");
            }
        }
    } else if component.kind.is_container() {
        for child_id in claims.children_of(&page.id, &component.id) {
            let Some(child) = page.component(child_id) else {
                continue;
            };
            children.push(instantiate(
                tree,
                page,
                child,
                claims,
                rows,
                Some(id.clone()),
                ctx,
                chain,
            ));
        }
    }

    tree.insert(Node {
        id: id.clone(),
        page: page.id.clone(),
        kind: component.kind,
        parent,
        children,
        row_context: ctx.clone(),
    });
    id
}
