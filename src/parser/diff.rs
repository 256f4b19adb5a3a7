//! Pulling unified-diff patches out of free text. Tolerated dialects: fenced
//! ```` ```diff ````/```` ```patch ```` blocks, raw text starting with `--- `
//! or `diff --git`, several consecutive file sections in one block, and the
//! `/dev/null` new-file form. Patch bodies are kept byte-for-byte (modulo
//! CRLF normalization) because patch tooling is whitespace-sensitive.

use super::path_hint;
use super::DiffPatch;

pub fn extract_diff_patches(text: &str) -> Vec<DiffPatch> {
    let normalized = text.replace("\r\n", "\n");

    let trimmed = normalized.trim_start();
    if trimmed.starts_with("--- ") || trimmed.starts_with("diff --git") {
        return split_file_sections(trimmed);
    }

    let mut patches = Vec::new();
    for region in fenced_diff_regions(&normalized) {
        patches.extend(split_file_sections(&region));
    }
    patches
}

/// Returns true when the text should be dispatched to the diff extractor at
/// all: a diff/patch fence, or raw diff text at the very start.
pub fn looks_like_patches(text: &str) -> bool {
    let trimmed = text.trim_start();
    if trimmed.starts_with("--- ") || trimmed.starts_with("diff --git") {
        return true;
    }
    text.lines()
        .any(|line| matches!(line.trim(), "```diff" | "```patch"))
}

/// Interiors of ```` ```diff ```` / ```` ```patch ```` blocks, in order.
fn fenced_diff_regions(text: &str) -> Vec<String> {
    let mut regions = Vec::new();
    let mut current: Option<Vec<&str>> = None;

    for line in text.lines() {
        match current.as_mut() {
            None => {
                if matches!(line.trim(), "```diff" | "```patch") {
                    current = Some(Vec::new());
                }
            }
            Some(lines) => {
                if line.trim() == "```" {
                    regions.push(lines.join("\n"));
                    current = None;
                } else {
                    lines.push(line);
                }
            }
        }
    }
    // Unclosed trailing block.
    if let Some(lines) = current {
        regions.push(lines.join("\n"));
    }
    regions
}

/// Splits a region into per-file patches. A section starts at a `diff --git`
/// line, or at a `--- ` line whose successor is a `+++ ` line (a bare `--- `
/// could be a removed line of a file that itself contains dashes).
fn split_file_sections(region: &str) -> Vec<DiffPatch> {
    let lines: Vec<&str> = region.lines().collect();
    let mut starts = Vec::new();
    // Inside a `diff --git` section, the first `---`/`+++` pair belongs to
    // that section rather than starting a new one.
    let mut awaiting_headers = false;

    for (i, line) in lines.iter().enumerate() {
        if line.starts_with("diff --git ") {
            starts.push(i);
            awaiting_headers = true;
        } else if line.starts_with("--- ")
            && lines.get(i + 1).is_some_and(|l| l.starts_with("+++ "))
        {
            if awaiting_headers {
                awaiting_headers = false;
            } else {
                starts.push(i);
            }
        }
    }

    let mut patches = Vec::new();
    for (idx, &start) in starts.iter().enumerate() {
        let end = starts.get(idx + 1).copied().unwrap_or(lines.len());
        if let Some(patch) = build_patch(&lines[start..end]) {
            patches.push(patch);
        }
    }
    patches
}

fn build_patch(section: &[&str]) -> Option<DiffPatch> {
    let file_path = section_file_path(section)?;

    // The hunk text starts at the `--- ` header; `diff --git`/`index` noise
    // above it is dropped.
    let body_start = section
        .iter()
        .position(|l| l.starts_with("--- "))
        .unwrap_or(0);
    let mut content = section[body_start..].join("\n");
    if !content.ends_with('\n') {
        content.push('\n');
    }

    let (workspace_name, file_path) = path_hint::split_workspace_prefix(&file_path, true);
    Some(DiffPatch {
        file_path,
        content,
        workspace_name,
    })
}

/// The `+++` side names the file (the `---` side may be `/dev/null` for a
/// new file); `a/`/`b/` prefixes and trailing tab metadata are stripped.
fn section_file_path(section: &[&str]) -> Option<String> {
    for line in section {
        if let Some(rest) = line.strip_prefix("+++ ") {
            if let Some(path) = clean_header_path(rest) {
                return Some(path);
            }
        }
    }
    for line in section {
        if let Some(rest) = line.strip_prefix("--- ") {
            if let Some(path) = clean_header_path(rest) {
                return Some(path);
            }
        }
        if let Some(rest) = line.strip_prefix("diff --git ") {
            // `diff --git a/x b/x`: take the b/ path.
            if let Some(b_path) = rest.split_whitespace().last() {
                return clean_header_path(b_path);
            }
        }
    }
    None
}

fn clean_header_path(raw: &str) -> Option<String> {
    let path = raw.split('\t').next().unwrap_or(raw).trim();
    if path.is_empty() || path == "/dev/null" {
        return None;
    }
    let path = path
        .strip_prefix("a/")
        .or_else(|| path.strip_prefix("b/"))
        .unwrap_or(path);
    Some(path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_raw_unfenced_patch() {
        let text = "--- a/x.ts\n+++ b/x.ts\n@@ -1,1 +1,1 @@\n-old\n+new\n";
        let patches = extract_diff_patches(text);
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].file_path, "x.ts");
        assert_eq!(patches[0].content, text);
    }

    #[test]
    fn extracts_fenced_diff_block() {
        let text = "Here is the fix:\n```diff\n--- a/src/app.py\n+++ b/src/app.py\n@@ -2,3 +2,3 @@\n def f():\n-    return 1\n+    return 2\n```\n";
        let patches = extract_diff_patches(text);
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].file_path, "src/app.py");
        assert!(patches[0].content.starts_with("--- a/src/app.py\n"));
        assert!(patches[0].content.contains("+    return 2"));
    }

    // One patch per +++ header.
    #[test]
    fn splits_multiple_file_sections_in_one_block() {
        let text = "```diff\n--- a/a.rs\n+++ b/a.rs\n@@ -1,1 +1,1 @@\n-x\n+y\n--- a/b.rs\n+++ b/b.rs\n@@ -1,1 +1,1 @@\n-p\n+q\n```\n";
        let patches = extract_diff_patches(text);
        assert_eq!(patches.len(), 2);
        assert_eq!(patches[0].file_path, "a.rs");
        assert_eq!(patches[1].file_path, "b.rs");
        assert!(!patches[0].content.contains("b.rs"));
    }

    #[test]
    fn handles_git_diff_headers() {
        let text = "diff --git a/src/lib.rs b/src/lib.rs\nindex 123..456 100644\n--- a/src/lib.rs\n+++ b/src/lib.rs\n@@ -1,1 +1,1 @@\n-a\n+b\n";
        let patches = extract_diff_patches(text);
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].file_path, "src/lib.rs");
        // diff --git / index noise is dropped from the body.
        assert!(patches[0].content.starts_with("--- a/src/lib.rs\n"));
    }

    #[test]
    fn new_file_path_comes_from_plus_side() {
        let text = "--- /dev/null\n+++ b/src/new.rs\n@@ -0,0 +1,1 @@\n+pub fn f() {}\n";
        let patches = extract_diff_patches(text);
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].file_path, "src/new.rs");
    }

    #[test]
    fn preserves_patch_bytes() {
        let body = "--- a/x.py\n+++ b/x.py\n@@ -1,2 +1,2 @@\n def f():\n-    return  1\n+    return  2\n";
        let text = format!("```diff\n{}```\n", body);
        let patches = extract_diff_patches(&text);
        assert_eq!(patches[0].content, body);
    }

    #[test]
    fn trigger_detection() {
        assert!(looks_like_patches("--- a/x\n+++ b/x\n"));
        assert!(looks_like_patches("diff --git a/x b/x\n"));
        assert!(looks_like_patches("text\n```diff\n--- a/x\n```"));
        assert!(!looks_like_patches("```rust\n// a.rs\nfn f() {}\n```"));
    }
}
