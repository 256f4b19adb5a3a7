//! Workspace roots and the path safety gate. Every apply operation resolves
//! each candidate path through [`WorkspaceRoots::safe_path`] before any I/O;
//! paths that escape their root are rejected, collected, and surfaced by the
//! caller - never silently written.

use crate::errors::AppError;
use std::path::{Component, Path, PathBuf};

/// A named top-level directory boundary. Multiple roots may coexist; a file
/// path is only ever safe relative to exactly one resolved root.
#[derive(Debug, Clone)]
pub struct WorkspaceRoot {
    pub name: String,
    pub path: PathBuf,
}

/// Ordered set of named roots; the first is the default.
#[derive(Debug, Clone)]
pub struct WorkspaceRoots {
    roots: Vec<WorkspaceRoot>,
}

impl WorkspaceRoots {
    pub fn new(roots: Vec<WorkspaceRoot>) -> Result<Self, AppError> {
        if roots.is_empty() {
            return Err(AppError::InvalidInput(
                "At least one workspace root is required".to_string(),
            ));
        }
        for root in &roots {
            if !root.path.is_dir() {
                return Err(AppError::MissingRoot(root.path.display().to_string()));
            }
        }
        Ok(Self { roots })
    }

    /// Workspace-name prefixes in parsed paths are only meaningful with
    /// multiple roots.
    pub fn is_single_root(&self) -> bool {
        self.roots.len() == 1
    }

    pub fn default_root(&self) -> &WorkspaceRoot {
        &self.roots[0]
    }

    /// Selects the root matching `workspace_name`. Unknown names warn and
    /// fall back to the default root.
    pub fn resolve(&self, workspace_name: Option<&str>) -> &WorkspaceRoot {
        match workspace_name {
            None => self.default_root(),
            Some(name) => match self.roots.iter().find(|r| r.name == name) {
                Some(root) => root,
                None => {
                    log::warn!(
                        "Workspace '{}' not found, using default root '{}'",
                        name,
                        self.default_root().name
                    );
                    self.default_root()
                }
            },
        }
    }

    /// The safety gate: sanitizes `file_path`, resolves it against the root
    /// chosen by `workspace_name`, and returns `None` when the result would
    /// escape that root.
    pub fn safe_path(&self, workspace_name: Option<&str>, file_path: &str) -> Option<PathBuf> {
        let root = self.resolve(workspace_name);
        create_safe_path(&root.path, file_path)
    }
}

/// Strips characters illegal in file names and collapses repeated
/// separators. Backslashes become forward slashes first so Windows-style
/// input gets the same treatment. Traversal is left intact here - the join
/// step rejects it rather than papering over it.
pub fn sanitize_file_name(name: &str) -> String {
    let mut sanitized: String = name
        .replace('\\', "/")
        .chars()
        .filter(|c| !matches!(c, '\0' | '<' | '>' | ':' | '"' | '|' | '?' | '*'))
        .collect();
    while sanitized.contains("//") {
        sanitized = sanitized.replace("//", "/");
    }
    sanitized.trim().to_string()
}

/// Joins `file_name` onto `parent` and verifies the result is still a
/// descendant of `parent`, using path components as the boundary rather than
/// a naive string prefix. Returns `None` on traversal, absolute-path
/// injection, or an empty sanitized name.
pub fn create_safe_path(parent: &Path, file_name: &str) -> Option<PathBuf> {
    let sanitized = sanitize_file_name(file_name);
    if sanitized.is_empty() {
        return None;
    }

    // Lexical normalization: the target may not exist yet, so canonicalize
    // is not an option. Any `..` that survives sanitization pops a segment;
    // popping past the root is traversal.
    let mut normalized = PathBuf::new();
    for component in Path::new(&sanitized).components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return None;
                }
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if normalized.as_os_str().is_empty() {
        return None;
    }

    let full_path = parent.join(&normalized);
    if !full_path.starts_with(parent) {
        return None;
    }
    Some(full_path)
}
