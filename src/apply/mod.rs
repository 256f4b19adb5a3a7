//! The change-application engine. A run moves through Collecting (path
//! safety, pre-change capture), Confirming (new files need an explicit yes),
//! Processing (mode-specific) and Committing; the returned states feed the
//! revert ledger.

pub mod completion;
pub mod fast_replace;
pub mod intelligent;
pub mod patch;
pub mod revert;

use crate::api::ModelClient;
use crate::errors::AppError;
use crate::parser::{DiffPatch, ParsedFile};
use crate::utils::cancel::CancellationToken;
use crate::workspace::WorkspaceRoots;
use async_trait::async_trait;
use revert::OriginalFileState;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;

pub use intelligent::IntelligentOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    FastReplace,
    IntelligentUpdate,
}

/// How a run ended. `Completed` and `Cancelled` carry the states of every
/// file actually written, for the ledger; a cancelled intelligent run wrote
/// nothing and carries an empty list.
#[derive(Debug)]
pub enum ApplyOutcome {
    Completed(Vec<OriginalFileState>),
    Cancelled(Vec<OriginalFileState>),
    Declined,
}

/// Yes/no questions asked mid-run (new-file creation, rate-limit fallback).
/// A trait so the engine stays testable without a terminal.
#[async_trait]
pub trait Confirmer: Send + Sync {
    async fn confirm(&self, message: &str) -> bool;
}

/// Reports streamed progress as `(received_bytes, expected_bytes)` for the
/// largest file in the run.
pub type ProgressCallback = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// A parsed file vetted by the path safety gate.
#[derive(Debug, Clone)]
pub struct TargetFile {
    pub file: ParsedFile,
    pub absolute_path: PathBuf,
    pub exists: bool,
}

/// Collecting phase: resolves every parsed file against the workspace roots.
/// Unsafe paths are skipped, surfaced via the returned list and a warning;
/// the run continues with the rest.
pub fn collect_targets(
    roots: &WorkspaceRoots,
    files: &[ParsedFile],
) -> (Vec<TargetFile>, Vec<String>) {
    let mut targets = Vec::new();
    let mut skipped = Vec::new();

    for file in files {
        match roots.safe_path(file.workspace_name.as_deref(), &file.file_path) {
            Some(absolute_path) => {
                let exists = absolute_path.is_file();
                targets.push(TargetFile {
                    file: file.clone(),
                    absolute_path,
                    exists,
                });
            }
            None => {
                log::warn!("Skipping file with unsafe path: {}", file.file_path);
                skipped.push(file.file_path.clone());
            }
        }
    }

    (targets, skipped)
}

/// Confirming phase: if any target is new, ask before the first write.
/// Declining is a clean no-op, not an error.
pub async fn confirm_new_files(confirmer: &dyn Confirmer, targets: &[TargetFile]) -> bool {
    let new_files: Vec<&str> = targets
        .iter()
        .filter(|t| !t.exists)
        .map(|t| t.file.file_path.as_str())
        .collect();
    if new_files.is_empty() {
        return true;
    }
    let message = format!(
        "This will create {} new file(s): {}. Continue?",
        new_files.len(),
        new_files.join(", ")
    );
    confirmer.confirm(&message).await
}

/// Applies vetted targets in the requested mode. Callers run
/// [`collect_targets`] once and hand the result over, so unsafe paths are
/// warned about exactly once per run. The model client is only consulted in
/// intelligent mode.
pub async fn apply_files(
    targets: &[TargetFile],
    mode: ApplyMode,
    client: Option<&dyn ModelClient>,
    confirmer: &dyn Confirmer,
    options: &IntelligentOptions,
    cancel: &CancellationToken,
    progress: Option<ProgressCallback>,
) -> Result<ApplyOutcome, AppError> {
    if targets.is_empty() {
        return Err(AppError::InvalidInput(
            "No applicable files found in the response".to_string(),
        ));
    }
    if !confirm_new_files(confirmer, &targets).await {
        return Ok(ApplyOutcome::Declined);
    }

    match mode {
        ApplyMode::FastReplace => fast_replace::run(targets, cancel).await,
        ApplyMode::IntelligentUpdate => {
            let client = client.ok_or(AppError::MissingApiKey)?;
            intelligent::run(client, confirmer, targets, options, cancel, progress).await
        }
    }
}

/// Result of a patch run. Patch mode is not all-or-nothing: successes stand,
/// failures are reported and can be retried through the intelligent engine.
#[derive(Debug)]
pub struct PatchReport {
    pub states: Vec<OriginalFileState>,
    pub failed: Vec<DiffPatch>,
}

/// Applies each patch independently: parse, capture the pre-change state,
/// apply hunks against the current content, write.
pub async fn apply_patches(
    roots: &WorkspaceRoots,
    patches: &[DiffPatch],
    cancel: &CancellationToken,
) -> Result<PatchReport, AppError> {
    let mut states = Vec::new();
    let mut failed = Vec::new();

    for diff in patches {
        if cancel.is_cancelled() {
            break;
        }
        let Some(path) = roots.safe_path(diff.workspace_name.as_deref(), &diff.file_path) else {
            log::warn!("Skipping patch with unsafe path: {}", diff.file_path);
            continue;
        };

        let parsed = match patch::parse_patch(&diff.content) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!("Patch for {} failed to parse: {}", diff.file_path, e);
                failed.push(diff.clone());
                continue;
            }
        };

        let state =
            revert::capture_state(&path, &diff.file_path, diff.workspace_name.clone()).await?;
        let original = if state.is_new {
            None
        } else {
            Some(state.content.as_str())
        };

        match patch::apply_patch(original, &parsed) {
            Ok(new_content) => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).await?;
                }
                fs::write(&path, new_content).await?;
                states.push(state);
            }
            Err(e) => {
                log::warn!("Patch for {} did not apply: {}", diff.file_path, e);
                failed.push(diff.clone());
            }
        }
    }

    Ok(PatchReport { states, failed })
}

/// Offers the intelligent engine as a second chance for failed patches: each
/// one is re-rendered as a commented file block and merged by the model.
/// States from the retry are appended to `report.states`.
#[allow(clippy::too_many_arguments)]
pub async fn retry_failed_patches(
    roots: &WorkspaceRoots,
    report: &mut PatchReport,
    client: &dyn ModelClient,
    confirmer: &dyn Confirmer,
    options: &IntelligentOptions,
    cancel: &CancellationToken,
    progress: Option<ProgressCallback>,
) -> Result<(), AppError> {
    if report.failed.is_empty() {
        return Ok(());
    }
    let message = format!(
        "{} patch(es) failed to apply cleanly. Retry them with the model?",
        report.failed.len()
    );
    if !confirmer.confirm(&message).await {
        return Ok(());
    }

    let as_files: Vec<ParsedFile> = report
        .failed
        .iter()
        .map(|p| ParsedFile {
            file_path: p.file_path.clone(),
            content: format!("// {}\n{}", p.file_path, p.content),
            workspace_name: p.workspace_name.clone(),
        })
        .collect();

    let (targets, _) = collect_targets(roots, &as_files);
    match intelligent::run(client, confirmer, &targets, options, cancel, progress).await? {
        ApplyOutcome::Completed(mut states) => {
            report.states.append(&mut states);
            report.failed.clear();
        }
        ApplyOutcome::Cancelled(_) | ApplyOutcome::Declined => {}
    }
    Ok(())
}
