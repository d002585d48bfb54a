use infragraph_core::MutableStore;
use infragraph_error::Result;
use tracing::debug;

use crate::filters::{
    collapse_cdk_owned_nodes, collapse_wrapper_nodes, destroy_extraneous_edges,
    prune_extraneous_nodes,
};
use crate::plan::FilterPreset;

pub fn apply_preset(store: &mut MutableStore, preset: FilterPreset) -> Result<()> {
    match preset {
        FilterPreset::Compact => {
            prune_extraneous_nodes(store)?;
            collapse_cdk_owned_nodes(store)?;
            collapse_wrapper_nodes(store)?;
            destroy_extraneous_edges(store)?;
        }
        FilterPreset::NonExtraneous => {
            prune_extraneous_nodes(store)?;
            destroy_extraneous_edges(store)?;
        }
        FilterPreset::None => {}
    }
    debug!(%preset, nodes = store.counts().nodes, "preset applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_preset_names() {
        let names: Vec<&str> = FilterPreset::iter().map(|p| p.as_str()).collect();
        assert_eq!(names, vec!["compact", "non-extraneous", "none"]);
        assert_eq!(
            FilterPreset::from_str("non-extraneous").unwrap(),
            FilterPreset::NonExtraneous
        );
        assert!(FilterPreset::from_str("verbose").is_err());
    }
}
