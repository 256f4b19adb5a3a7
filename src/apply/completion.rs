//! Applies a parsed code completion: a single insertion at a 1-based
//! line/character position in an existing file.

use super::revert::{self, OriginalFileState};
use crate::errors::AppError;
use crate::parser::CodeCompletion;
use crate::workspace::WorkspaceRoots;
use tokio::fs;

pub async fn run(
    roots: &WorkspaceRoots,
    completion: &CodeCompletion,
) -> Result<Vec<OriginalFileState>, AppError> {
    let path = roots
        .safe_path(completion.workspace_name.as_deref(), &completion.file_path)
        .ok_or_else(|| {
            AppError::InvalidInput(format!("Unsafe completion path: {}", completion.file_path))
        })?;
    if !path.is_file() {
        return Err(AppError::InvalidInput(format!(
            "Completion target does not exist: {}",
            completion.file_path
        )));
    }

    let state = revert::capture_state(
        &path,
        &completion.file_path,
        completion.workspace_name.clone(),
    )
    .await?;

    let updated = insert_at(
        &state.content,
        completion.line,
        completion.character,
        &completion.content,
    );
    fs::write(&path, updated).await?;
    log::debug!(
        "Inserted completion at {}:{}:{}",
        completion.file_path,
        completion.line,
        completion.character
    );

    Ok(vec![state])
}

/// Inserts `text` at the given 1-based line and character. Positions past
/// the end of the file or line clamp rather than fail; the model is often
/// off by a little.
fn insert_at(content: &str, line: usize, character: usize, text: &str) -> String {
    let mut lines: Vec<String> = content.split('\n').map(|l| l.to_string()).collect();
    let line_index = line.saturating_sub(1).min(lines.len().saturating_sub(1));

    let target = &mut lines[line_index];
    let char_count = target.chars().count();
    let column = character.saturating_sub(1).min(char_count);
    let byte_offset = target
        .char_indices()
        .nth(column)
        .map(|(offset, _)| offset)
        .unwrap_or(target.len());
    target.insert_str(byte_offset, text);

    lines.join("\n")
}
