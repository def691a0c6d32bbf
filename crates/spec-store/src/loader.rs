//! Spec directory loader.
//!
//! Enumerates every `*.yaml` / `*.yml` file in a directory and parses each one
//! into a JSON value (JSON is a valid subset of YAML, so `serde_yaml` alone is
//! enough). Files are returned in lexicographic filename order: the merge
//! policy is order-sensitive, and directory enumeration order is not portable
//! across platforms.

use crate::error::{Result, SpecStoreError};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// A parsed OpenAPI document together with the file it came from.
#[derive(Debug, Clone)]
pub struct LoadedSpec {
    /// File name without directory (used for logs and collision context).
    pub name: String,
    /// Full path of the source file.
    pub path: PathBuf,
    /// Parsed document. Always an object at the root.
    pub document: Value,
}

fn has_spec_extension(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    )
}

/// Load every spec file in `dir`, in lexicographic filename order.
///
/// # Errors
///
/// Returns an error if the directory is missing or unreadable, contains zero
/// spec files, or any file fails to read or parse. These are all fatal
/// configuration errors: the caller is expected to abort server construction.
pub fn load_spec_dir(dir: &Path) -> Result<Vec<LoadedSpec>> {
    if !dir.is_dir() {
        return Err(SpecStoreError::SpecDirMissing {
            path: dir.to_path_buf(),
        });
    }

    let entries = std::fs::read_dir(dir).map_err(|e| SpecStoreError::SpecDirRead {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file() && has_spec_extension(p))
        .collect();

    if paths.is_empty() {
        return Err(SpecStoreError::NoSpecsFound {
            path: dir.to_path_buf(),
        });
    }

    // Lexicographic order keeps merge results deterministic across platforms.
    paths.sort();

    let mut specs = Vec::with_capacity(paths.len());
    for path in paths {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        tracing::info!(spec = %name, "loading OpenAPI spec");

        let content =
            std::fs::read_to_string(&path).map_err(|e| SpecStoreError::SpecReadFile {
                path: path.clone(),
                source: e,
            })?;

        let document: Value =
            serde_yaml::from_str(&content).map_err(|e| SpecStoreError::SpecParse {
                path: path.clone(),
                source: e,
            })?;

        if !document.is_object() {
            return Err(SpecStoreError::SpecNotAMapping { path });
        }

        specs.push(LoadedSpec {
            name,
            path,
            document,
        });
    }

    tracing::info!(count = specs.len(), dir = %dir.display(), "loaded API specs");

    Ok(specs)
}
