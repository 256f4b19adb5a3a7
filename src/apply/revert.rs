//! The revert ledger: pre-change file states captured before the first
//! mutation of an apply run, persisted so the next invocation can undo it.

use crate::errors::AppError;
use crate::workspace::WorkspaceRoots;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

/// State of one file before an apply run touched it. `is_new` means the file
/// did not exist; its `content` is meaningless and revert deletes it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct OriginalFileState {
    pub file_path: String,
    pub content: String,
    pub is_new: bool,
    pub workspace_name: Option<String>,
}

/// On-disk ledger, one per workspace, overwritten by each apply run.
#[derive(Serialize, Deserialize, Default)]
struct Ledger {
    states: Vec<OriginalFileState>,
}

const LEDGER_DIR: &str = ".pasteup";
const LEDGER_FILE: &str = "last-applied.toml";

fn ledger_path(roots: &WorkspaceRoots) -> std::path::PathBuf {
    roots.default_root().path.join(LEDGER_DIR).join(LEDGER_FILE)
}

/// Captures a file's pre-change state. A missing file is recorded as new.
pub async fn capture_state(
    absolute_path: &Path,
    file_path: &str,
    workspace_name: Option<String>,
) -> Result<OriginalFileState, AppError> {
    if absolute_path.exists() {
        let content = fs::read_to_string(absolute_path).await?;
        Ok(OriginalFileState {
            file_path: file_path.to_string(),
            content,
            is_new: false,
            workspace_name,
        })
    } else {
        Ok(OriginalFileState {
            file_path: file_path.to_string(),
            content: String::new(),
            is_new: true,
            workspace_name,
        })
    }
}

pub async fn save_ledger(
    roots: &WorkspaceRoots,
    states: &[OriginalFileState],
) -> Result<(), AppError> {
    let path = ledger_path(roots);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let ledger = Ledger {
        states: states.to_vec(),
    };
    let serialized = toml::to_string(&ledger)
        .map_err(|e| AppError::Revert(format!("Failed to serialize ledger: {}", e)))?;
    fs::write(&path, serialized).await?;
    Ok(())
}

pub async fn load_ledger(roots: &WorkspaceRoots) -> Result<Vec<OriginalFileState>, AppError> {
    let path = ledger_path(roots);
    if !path.exists() {
        return Err(AppError::Revert(
            "No recent changes found to revert".to_string(),
        ));
    }
    let serialized = fs::read_to_string(&path).await?;
    let ledger: Ledger = toml::from_str(&serialized)?;
    Ok(ledger.states)
}

pub async fn clear_ledger(roots: &WorkspaceRoots) -> Result<(), AppError> {
    let path = ledger_path(roots);
    if path.exists() {
        fs::remove_file(&path).await?;
    }
    Ok(())
}

/// Restores every captured state: created files are deleted, overwritten
/// ones rewritten with their original bytes. Best-effort per file - one
/// failure is reported and the rest still revert. Returns true when every
/// file reverted cleanly.
pub async fn revert_files(roots: &WorkspaceRoots, states: &[OriginalFileState]) -> bool {
    let mut all_ok = true;

    for state in states {
        let Some(safe_path) = roots.safe_path(state.workspace_name.as_deref(), &state.file_path)
        else {
            log::error!("Cannot revert file with unsafe path: {}", state.file_path);
            all_ok = false;
            continue;
        };

        let result = if state.is_new {
            match fs::remove_file(&safe_path).await {
                Ok(()) => Ok(()),
                // Already gone is fine.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e),
            }
        } else {
            fs::write(&safe_path, state.content.as_bytes()).await
        };

        if let Err(e) = result {
            log::error!("Failed to revert {}: {}", state.file_path, e);
            all_ok = false;
        }
    }

    all_ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::WorkspaceRoot;
    use tempfile::tempdir;

    fn roots_for(dir: &Path) -> WorkspaceRoots {
        WorkspaceRoots::new(vec![WorkspaceRoot {
            name: "main".to_string(),
            path: dir.to_path_buf(),
        }])
        .unwrap()
    }

    #[tokio::test]
    async fn capture_distinguishes_new_and_existing() {
        let dir = tempdir().unwrap();
        let existing = dir.path().join("a.txt");
        tokio::fs::write(&existing, "original").await.unwrap();

        let state = capture_state(&existing, "a.txt", None).await.unwrap();
        assert!(!state.is_new);
        assert_eq!(state.content, "original");

        let missing = dir.path().join("b.txt");
        let state = capture_state(&missing, "b.txt", None).await.unwrap();
        assert!(state.is_new);
    }

    #[tokio::test]
    async fn revert_restores_bytes_and_deletes_created_files() {
        let dir = tempdir().unwrap();
        let roots = roots_for(dir.path());

        let existing = dir.path().join("kept.txt");
        tokio::fs::write(&existing, "before\n").await.unwrap();
        let created = dir.path().join("made.txt");

        let states = vec![
            capture_state(&existing, "kept.txt", None).await.unwrap(),
            capture_state(&created, "made.txt", None).await.unwrap(),
        ];

        // Simulate the apply run.
        tokio::fs::write(&existing, "after\n").await.unwrap();
        tokio::fs::write(&created, "new file\n").await.unwrap();

        assert!(revert_files(&roots, &states).await);
        assert_eq!(
            tokio::fs::read_to_string(&existing).await.unwrap(),
            "before\n"
        );
        assert!(!created.exists());
    }

    #[tokio::test]
    async fn revert_continues_past_individual_failures() {
        let dir = tempdir().unwrap();
        let roots = roots_for(dir.path());
        let good = dir.path().join("good.txt");
        tokio::fs::write(&good, "changed").await.unwrap();

        let states = vec![
            OriginalFileState {
                file_path: "../escape.txt".to_string(),
                content: String::new(),
                is_new: false,
                workspace_name: None,
            },
            OriginalFileState {
                file_path: "good.txt".to_string(),
                content: "restored".to_string(),
                is_new: false,
                workspace_name: None,
            },
        ];

        assert!(!revert_files(&roots, &states).await);
        assert_eq!(tokio::fs::read_to_string(&good).await.unwrap(), "restored");
    }

    #[tokio::test]
    async fn ledger_round_trips() {
        let dir = tempdir().unwrap();
        let roots = roots_for(dir.path());
        let states = vec![OriginalFileState {
            file_path: "src/a.rs".to_string(),
            content: "fn a() {}\n".to_string(),
            is_new: false,
            workspace_name: Some("main".to_string()),
        }];

        save_ledger(&roots, &states).await.unwrap();
        let loaded = load_ledger(&roots).await.unwrap();
        assert_eq!(loaded, states);

        clear_ledger(&roots).await.unwrap();
        assert!(load_ledger(&roots).await.is_err());
    }
}
