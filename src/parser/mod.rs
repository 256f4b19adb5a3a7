//! Turns a pasted chat response into structured edits. AI output has no
//! fixed grammar, so everything here is heuristic line scanning; the rule is
//! that absence of a match is a valid empty result, never an error.

pub mod completion;
pub mod diff;
pub mod files;
pub mod normalizer;
pub mod path_hint;

/// One proposed file, workspace-relative with forward slashes. Duplicate
/// `(workspace_name, file_path)` occurrences in one response are merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFile {
    pub file_path: String,
    pub content: String,
    pub workspace_name: Option<String>,
}

/// One unified-diff patch; `content` holds the full `---`/`+++`/`@@` text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffPatch {
    pub file_path: String,
    pub content: String,
    pub workspace_name: Option<String>,
}

/// A single insertion at a 1-based line/character position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeCompletion {
    pub file_path: String,
    pub content: String,
    pub line: usize,
    pub character: usize,
    pub workspace_name: Option<String>,
}

/// Result of parsing one response; exactly one payload per variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedResponse {
    Files(Vec<ParsedFile>),
    Patches(Vec<DiffPatch>),
    Completion(CodeCompletion),
}

impl ParsedResponse {
    pub fn is_empty(&self) -> bool {
        match self {
            ParsedResponse::Files(files) => files.is_empty(),
            ParsedResponse::Patches(patches) => patches.is_empty(),
            ParsedResponse::Completion(_) => false,
        }
    }
}

/// Classifies and extracts a response. Dispatch order, first match wins:
/// code completion, diff patches, single file without fences, multi-file
/// blocks (the default; may be empty).
pub fn parse_response(response: &str, single_root_workspace: bool) -> ParsedResponse {
    if let Some(completion) = completion::parse_code_completion(response, single_root_workspace) {
        return ParsedResponse::Completion(completion);
    }

    if diff::looks_like_patches(response) {
        return ParsedResponse::Patches(diff::extract_diff_patches(response));
    }

    if let Some(file) = files::parse_file_content_only(response, single_root_workspace) {
        return ParsedResponse::Files(vec![file]);
    }

    ParsedResponse::Files(files::parse_multiple_files(response, single_root_workspace))
}
