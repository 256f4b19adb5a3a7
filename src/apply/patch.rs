//! Parsing and applying standard unified-diff hunks. Context lines must
//! match the target exactly; a mismatch fails the patch, which the caller
//! reports (and can hand to the intelligent-update fallback).

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PatchError {
    #[error("patch has no hunks")]
    Empty,
    #[error("malformed hunk header: {0}")]
    MalformedHeader(String),
    #[error("malformed hunk line: {0}")]
    MalformedLine(String),
    #[error("hunk does not match file content at line {line}")]
    ContextMismatch { line: usize },
    #[error("patch creates a file that already exists")]
    AlreadyExists,
}

#[derive(Debug, Clone)]
pub enum HunkLine {
    Context(String),
    Remove(String),
    Add(String),
}

/// One `@@ -a,b +c,d @@` section.
#[derive(Debug, Clone)]
pub struct Hunk {
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
    pub lines: Vec<HunkLine>,
}

#[derive(Debug, Clone)]
pub struct ParsedPatch {
    /// Old side was `/dev/null`: this patch creates the file.
    pub creates_file: bool,
    pub hunks: Vec<Hunk>,
    /// Whether the new side ends without a trailing newline
    /// (`\ No newline at end of file` after the last added line).
    trailing_newline: bool,
}

/// Parses the `---`/`+++`/`@@` text of a single-file patch.
pub fn parse_patch(content: &str) -> Result<ParsedPatch, PatchError> {
    let mut creates_file = false;
    let mut hunks: Vec<Hunk> = Vec::new();
    let mut trailing_newline = true;
    let mut last_was_add_or_context = false;

    for line in content.lines() {
        if let Some(old_side) = line.strip_prefix("--- ") {
            creates_file = old_side.trim() == "/dev/null";
            continue;
        }
        if line.starts_with("+++ ") || line.starts_with("diff --git ") || line.starts_with("index ")
        {
            continue;
        }
        if line.starts_with("@@") {
            hunks.push(parse_hunk_header(line)?);
            last_was_add_or_context = false;
            continue;
        }

        let Some(hunk) = hunks.last_mut() else {
            // Prose above the first hunk header is tolerated.
            continue;
        };
        match line.chars().next() {
            Some(' ') => {
                hunk.lines.push(HunkLine::Context(line[1..].to_string()));
                last_was_add_or_context = true;
            }
            Some('-') => {
                hunk.lines.push(HunkLine::Remove(line[1..].to_string()));
                last_was_add_or_context = false;
            }
            Some('+') => {
                hunk.lines.push(HunkLine::Add(line[1..].to_string()));
                last_was_add_or_context = true;
            }
            Some('\\') => {
                // "\ No newline at end of file"
                if last_was_add_or_context {
                    trailing_newline = false;
                }
            }
            // An empty line inside a hunk is a context line whose leading
            // space was trimmed somewhere along the paste.
            None => {
                hunk.lines.push(HunkLine::Context(String::new()));
                last_was_add_or_context = true;
            }
            Some(_) => return Err(PatchError::MalformedLine(line.to_string())),
        }
    }

    if hunks.is_empty() {
        return Err(PatchError::Empty);
    }
    Ok(ParsedPatch {
        creates_file,
        hunks,
        trailing_newline,
    })
}

/// `@@ -old_start,old_count +new_start,new_count @@` with counts optional.
fn parse_hunk_header(line: &str) -> Result<Hunk, PatchError> {
    let malformed = || PatchError::MalformedHeader(line.to_string());

    let inner = line
        .strip_prefix("@@")
        .and_then(|rest| rest.split("@@").next())
        .ok_or_else(malformed)?
        .trim();
    let mut parts = inner.split_whitespace();
    let old = parts.next().and_then(|p| p.strip_prefix('-')).ok_or_else(malformed)?;
    let new = parts.next().and_then(|p| p.strip_prefix('+')).ok_or_else(malformed)?;

    let parse_range = |range: &str| -> Result<(usize, usize), PatchError> {
        match range.split_once(',') {
            Some((start, count)) => Ok((
                start.parse().map_err(|_| malformed())?,
                count.parse().map_err(|_| malformed())?,
            )),
            None => Ok((range.parse().map_err(|_| malformed())?, 1)),
        }
    };

    let (old_start, old_count) = parse_range(old)?;
    let (new_start, new_count) = parse_range(new)?;
    Ok(Hunk {
        old_start,
        old_count,
        new_start,
        new_count,
        lines: Vec::new(),
    })
}

/// Applies a parsed patch to file content. For creation patches `original`
/// must be `None`.
pub fn apply_patch(original: Option<&str>, patch: &ParsedPatch) -> Result<String, PatchError> {
    if patch.creates_file && original.is_some() {
        return Err(PatchError::AlreadyExists);
    }
    let original = original.unwrap_or("");
    let old_lines: Vec<&str> = original.lines().collect();

    let mut output: Vec<String> = Vec::new();
    // Cursor into old_lines; hunk starts are 1-based old-file coordinates.
    let mut cursor = 0usize;

    for hunk in &patch.hunks {
        // An old_start of 0 appears in creation hunks (`@@ -0,0 +1,n @@`).
        let hunk_start = hunk.old_start.saturating_sub(1);
        if hunk_start < cursor || hunk_start > old_lines.len() {
            return Err(PatchError::ContextMismatch {
                line: hunk.old_start,
            });
        }
        output.extend(old_lines[cursor..hunk_start].iter().map(|l| l.to_string()));
        cursor = hunk_start;

        for line in &hunk.lines {
            match line {
                HunkLine::Context(expected) => {
                    let actual = old_lines.get(cursor).copied().ok_or(
                        PatchError::ContextMismatch { line: cursor + 1 },
                    )?;
                    if actual != expected {
                        return Err(PatchError::ContextMismatch { line: cursor + 1 });
                    }
                    output.push(actual.to_string());
                    cursor += 1;
                }
                HunkLine::Remove(expected) => {
                    let actual = old_lines.get(cursor).copied().ok_or(
                        PatchError::ContextMismatch { line: cursor + 1 },
                    )?;
                    if actual != expected {
                        return Err(PatchError::ContextMismatch { line: cursor + 1 });
                    }
                    cursor += 1;
                }
                HunkLine::Add(text) => output.push(text.clone()),
            }
        }
    }

    output.extend(old_lines[cursor..].iter().map(|l| l.to_string()));

    let mut result = output.join("\n");
    let keep_newline = if cursor == old_lines.len() {
        // The patch reached the end of the file; the new side decides.
        patch.trailing_newline
    } else {
        original.ends_with('\n') || original.is_empty()
    };
    if keep_newline && !result.is_empty() {
        result.push('\n');
    }
    Ok(result)
}
