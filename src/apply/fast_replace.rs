//! Fast Replace: write parsed contents to disk verbatim, no model involved.
//! Each file commits independently; cancelling mid-run keeps what was
//! already written and leaves the rest untouched.

use super::revert::{self, OriginalFileState};
use super::{ApplyOutcome, TargetFile};
use crate::errors::AppError;
use crate::parser::normalizer;
use crate::utils::cancel::CancellationToken;
use tokio::fs;

pub async fn run(
    targets: &[TargetFile],
    cancel: &CancellationToken,
) -> Result<ApplyOutcome, AppError> {
    let mut states: Vec<OriginalFileState> = Vec::new();

    for target in targets {
        if cancel.is_cancelled() {
            return Ok(ApplyOutcome::Cancelled(states));
        }

        let state = revert::capture_state(
            &target.absolute_path,
            &target.file.file_path,
            target.file.workspace_name.clone(),
        )
        .await?;

        if let Some(parent) = target.absolute_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&target.absolute_path, normalizer::normalize(&target.file.content)).await?;
        log::debug!("Replaced {}", target.file.file_path);
        states.push(state);
    }

    Ok(ApplyOutcome::Completed(states))
}
