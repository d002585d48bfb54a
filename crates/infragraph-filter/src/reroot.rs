use infragraph_core::{MutableStore, NodeId};
use infragraph_error::{Error, Result};
use tracing::debug;

/// Focus the graph on `root`.
///
/// Without `hoist`, everything that is neither an ancestor nor a descendant
/// of `root` is destroyed, so the path from the store root is kept. With
/// `hoist`, `root` is moved directly under the store root and every other
/// top-level node is destroyed.
pub fn reroot(store: &mut MutableStore, root: NodeId, hoist: bool) -> Result<()> {
    let store_root = store.root();
    if root == store_root {
        return Ok(());
    }
    if !store.is_ancestor(store_root, root) {
        return Err(Error::invalid_argument(format!(
            "{root} is not within the store root"
        )));
    }

    if hoist {
        let top = store.scopes(root).first().copied();
        store.hoist_node(root, store_root)?;
        if let Some(top) = top
            && top != root
            && store.contains_node(top)
        {
            store.destroy_node(top, false)?;
        }
        let others: Vec<NodeId> = store
            .node(store_root)?
            .children()
            .iter()
            .copied()
            .filter(|child| *child != root)
            .collect();
        destroy_all(store, &others)?;
    } else {
        let mut chain = store.ancestors(root);
        chain.retain(|ancestor| *ancestor != store_root);
        chain.insert(0, root);
        for scope in chain {
            let siblings = store.siblings(scope);
            destroy_all(store, &siblings)?;
        }
    }

    debug!(%root, hoist, nodes = store.counts().nodes, "graph rerooted");
    Ok(())
}

fn destroy_all(store: &mut MutableStore, ids: &[NodeId]) -> Result<()> {
    for id in ids {
        if store.contains_node(*id) {
            store.destroy_node(*id, false)?;
        }
    }
    Ok(())
}
