//! The multi-file block scanner: every fenced block is treated independently
//! and becomes a [`ParsedFile`] when its first line names a file, either as a
//! comment-prefixed path or an XML `<file path="...">` tag.

use super::normalizer;
use super::path_hint;
use super::ParsedFile;

#[derive(Debug, PartialEq)]
enum ScanState {
    Text,
    Content,
}

#[derive(Default)]
struct CurrentBlock {
    file_path: String,
    workspace_name: Option<String>,
    content: String,
    is_first_content_line: bool,
    is_xml_block: bool,
}

/// Forward scan over fenced blocks. Blocks without a recognizable filename
/// line are skipped; blocks keyed by the same `(workspace, path)` are merged
/// in encounter order with a blank-line separator. A fence left open at
/// end-of-input is finalized with whatever content was collected.
pub fn parse_multiple_files(text: &str, single_root_workspace: bool) -> Vec<ParsedFile> {
    let mut files: Vec<ParsedFile> = Vec::new();
    let mut state = ScanState::Text;
    let mut block = CurrentBlock::default();

    for line in text.lines() {
        match state {
            ScanState::Text => {
                if line.trim_start().starts_with("```") {
                    state = ScanState::Content;
                    block = CurrentBlock {
                        is_first_content_line: true,
                        ..CurrentBlock::default()
                    };
                }
            }
            ScanState::Content => {
                if line.trim() == "```" {
                    state = ScanState::Text;
                    finalize_block(&mut files, &block);
                    block = CurrentBlock::default();
                    continue;
                }

                if block.is_first_content_line && block.file_path.is_empty() {
                    block.is_first_content_line = false;

                    if let Some(path) = path_hint::extract_xml_file_tag(line) {
                        assign_name(&mut block, &path, single_root_workspace);
                        block.is_xml_block = true;
                        continue;
                    }
                    if path_hint::is_comment_like(line) {
                        if let Some(path) = path_hint::extract_path_from_line(line) {
                            assign_name(&mut block, &path, single_root_workspace);
                            continue;
                        }
                    }
                    // No filename line: keep scanning so the closing fence is
                    // consumed, the content is discarded at finalize.
                }
                block.is_first_content_line = false;

                // Well-formed CDATA wrapper lines inside an XML file block
                // are markup, not content.
                if block.is_xml_block {
                    let trimmed = line.trim();
                    if trimmed == "<![CDATA[" || trimmed == "]]>" || trimmed == "</file>" {
                        continue;
                    }
                }

                if block.content.is_empty() {
                    block.content.push_str(line);
                } else {
                    block.content.push('\n');
                    block.content.push_str(line);
                }
            }
        }
    }

    if state == ScanState::Content {
        finalize_block(&mut files, &block);
    }

    files
}

fn assign_name(block: &mut CurrentBlock, path: &str, single_root_workspace: bool) {
    let (workspace_name, relative_path) =
        path_hint::split_workspace_prefix(path, single_root_workspace);
    block.workspace_name = workspace_name;
    block.file_path = relative_path;
}

fn finalize_block(files: &mut Vec<ParsedFile>, block: &CurrentBlock) {
    if block.file_path.is_empty() {
        return;
    }
    let cleaned = normalizer::cleanup(&block.content);
    if !path_hint::has_real_code(&cleaned) {
        log::debug!(
            "Discarding block for {} with no real code",
            block.file_path
        );
        return;
    }

    // Duplicate keys are a deliberate merge: models split long files across
    // multiple blocks.
    let existing = files.iter_mut().find(|f| {
        f.file_path == block.file_path && f.workspace_name == block.workspace_name
    });
    match existing {
        Some(file) => {
            file.content.push_str("\n\n");
            file.content.push_str(&cleaned);
        }
        None => files.push(ParsedFile {
            file_path: block.file_path.clone(),
            content: cleaned,
            workspace_name: block.workspace_name.clone(),
        }),
    }
}

/// The fence-less single-file form: the very first line is a comment naming
/// a path and the rest is plain file content.
pub fn parse_file_content_only(text: &str, single_root_workspace: bool) -> Option<ParsedFile> {
    if text.contains("```") {
        return None;
    }

    let trimmed = text.trim_start();
    let mut lines = trimmed.lines();
    let first_line = lines.next()?;
    if !path_hint::is_comment_like(first_line) {
        return None;
    }
    let path = path_hint::extract_path_from_line(first_line)?;

    let content = normalizer::cleanup(&lines.collect::<Vec<_>>().join("\n"));
    if !path_hint::has_real_code(&content) {
        return None;
    }

    let (workspace_name, file_path) =
        path_hint::split_workspace_prefix(&path, single_root_workspace);
    Some(ParsedFile {
        file_path,
        content,
        workspace_name,
    })
}
