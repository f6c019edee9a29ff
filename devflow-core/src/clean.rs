//! Removal of build output directories.

use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};

/// Removes each of `paths` under `root`, returning the ones that existed.
///
/// Paths must stay inside `root`: absolute paths and `..` are rejected
/// before anything is deleted.
pub fn clean_paths(root: &Path, paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    for path in paths {
        let escapes = path.is_absolute()
            || path
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)));
        if escapes || path.as_os_str().is_empty() {
            return Err(Error::Configuration(format!(
                "Refusing to clean '{}': paths must be relative to the project directory",
                path.display()
            )));
        }
    }

    let mut removed = Vec::new();
    for path in paths {
        let target = root.join(path);
        let metadata = match std::fs::symlink_metadata(&target) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %target.display(), "nothing to clean");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        if metadata.is_dir() {
            std::fs::remove_dir_all(&target)?;
        } else {
            std::fs::remove_file(&target)?;
        }
        debug!(path = %target.display(), "removed");
        removed.push(target);
    }

    Ok(removed)
}
