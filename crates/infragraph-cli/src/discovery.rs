//! Locating the construct tree inside an assembly directory.

use std::path::{Path, PathBuf};

use infragraph_error::{Error, Result};
use tracing::debug;
use walkdir::WalkDir;

pub const TREE_FILE_NAME: &str = "tree.json";

/// Directories that never hold the app's own tree.
fn should_skip_dir(name: &str) -> bool {
    matches!(name, "node_modules" | "asset" | "infragraph") || name.starts_with("asset.")
}

/// `input` itself when it is a file, otherwise the shallowest `tree.json`
/// below it.
pub fn locate_tree(input: &Path) -> Result<PathBuf> {
    if input.is_file() {
        return Ok(input.to_path_buf());
    }
    if !input.is_dir() {
        return Err(Error::file_not_found(input.display().to_string()));
    }

    let mut found: Vec<(usize, PathBuf)> = WalkDir::new(input)
        .max_depth(3)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || entry
                    .file_name()
                    .to_str()
                    .is_none_or(|name| !should_skip_dir(name))
        })
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == TREE_FILE_NAME)
        .map(|entry| (entry.depth(), entry.into_path()))
        .collect();
    found.sort();

    let (_, tree) = found.into_iter().next().ok_or_else(|| {
        Error::file_not_found(input.join(TREE_FILE_NAME).display().to_string())
    })?;
    debug!(path = %tree.display(), "construct tree located");
    Ok(tree)
}
