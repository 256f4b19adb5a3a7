//! Recognizing "this line names a file" conventions: comment-prefixed paths
//! (`// src/main.rs`), XML file tags (`<file path="...">`), and optional
//! `workspace/` or `workspace:` prefixes.

const COMMENT_MARKERS: [&str; 6] = ["//", "#", "--", "/*", "*", "<!--"];

pub fn is_comment_like(line: &str) -> bool {
    let trimmed = line.trim_start();
    COMMENT_MARKERS.iter().any(|m| trimmed.starts_with(m))
}

/// Extracts a file path from a line of code, if the line is an XML file tag
/// or a comment containing a path-looking token with an extension.
pub fn extract_path_from_line(line: &str) -> Option<String> {
    if let Some(path) = extract_xml_file_tag(line) {
        return Some(normalize_separators(&path));
    }

    let trimmed = line.trim();
    let marker = COMMENT_MARKERS.iter().find(|m| trimmed.starts_with(**m))?;
    let mut stripped = trimmed[marker.len()..].trim();
    // Closing halves of block comments are not part of the path.
    for closer in ["*/", "-->"] {
        if let Some(rest) = stripped.strip_suffix(closer) {
            stripped = rest.trim();
        }
    }

    stripped
        .split_whitespace()
        .find_map(|token| path_like_token(token))
        .map(|p| normalize_separators(&p))
}

/// `<file path="...">` (single or double quotes).
pub fn extract_xml_file_tag(line: &str) -> Option<String> {
    let trimmed = line.trim();
    let rest = trimmed.strip_prefix("<file")?;
    let attr_pos = rest.find("path=")?;
    let after = &rest[attr_pos + "path=".len()..];
    let quote = after.chars().next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    let inner = &after[1..];
    let end = inner.find(quote)?;
    Some(inner[..end].to_string())
}

/// A token counts as a path when it is made of path characters and ends in a
/// short alphanumeric extension, or names a dotfile like `.gitignore`.
fn path_like_token(token: &str) -> Option<String> {
    let token = token.trim_matches(|c| matches!(c, ',' | ';' | ':' | '`' | '\'' | '"'));
    if token.is_empty() || token.contains("://") {
        return None;
    }
    let valid = token.chars().all(|c| {
        c.is_alphanumeric()
            || matches!(c, '.' | '/' | '\\' | '_' | '-' | '[' | ']' | '(' | ')' | '@' | '+')
    });
    if !valid {
        return None;
    }

    let last_segment = token.rsplit(['/', '\\']).next().unwrap_or(token);
    // Dotfiles: `.gitignore`, `.env`.
    if last_segment.len() > 1
        && last_segment.starts_with('.')
        && !last_segment[1..].contains('.')
        && last_segment[1..].chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-')
    {
        return Some(token.to_string());
    }

    let (stem, extension) = last_segment.rsplit_once('.')?;
    if stem.is_empty()
        || extension.is_empty()
        || extension.len() > 10
        || !extension.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return None;
    }
    Some(token.to_string())
}

fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

/// Splits a leading `workspace:` or `workspace/` segment off a path. With a
/// single-root workspace the prefix is meaningless and left in place.
pub fn split_workspace_prefix(
    file_path: &str,
    single_root_workspace: bool,
) -> (Option<String>, String) {
    if single_root_workspace {
        return (None, file_path.to_string());
    }

    if let Some((prefix, rest)) = file_path.split_once(':') {
        if !prefix.is_empty() && !rest.is_empty() && !prefix.contains('/') {
            return (Some(prefix.to_string()), rest.to_string());
        }
    }

    // Prefix detection only looks at the first segment, and only when a
    // slash exists at all.
    if let Some((prefix, rest)) = file_path.split_once('/') {
        if !prefix.is_empty() && !rest.is_empty() {
            return (Some(prefix.to_string()), rest.to_string());
        }
    }

    (None, file_path.to_string())
}

/// True when anything beyond blank lines and bare elision comments
/// (`// ...`, `# ...`) remains. Blocks without real code are discarded so a
/// truncated response cannot blank a real file.
pub fn has_real_code(content: &str) -> bool {
    content.lines().any(|line| {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return false;
        }
        !is_elision_comment(trimmed)
    })
}

fn is_elision_comment(trimmed: &str) -> bool {
    let Some(marker) = COMMENT_MARKERS.iter().find(|m| trimmed.starts_with(**m)) else {
        return false;
    };
    let mut rest = trimmed[marker.len()..].trim();
    for closer in ["*/", "-->"] {
        if let Some(stripped) = rest.strip_suffix(closer) {
            rest = stripped.trim();
        }
    }
    !rest.is_empty() && rest.chars().all(|c| c == '.' || c == '…')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_path_from_slash_comment() {
        assert_eq!(
            extract_path_from_line("// src/main.rs"),
            Some("src/main.rs".to_string())
        );
    }

    #[test]
    fn extracts_path_from_hash_and_dash_comments() {
        assert_eq!(
            extract_path_from_line("# scripts/build.py"),
            Some("scripts/build.py".to_string())
        );
        assert_eq!(
            extract_path_from_line("-- db/schema.sql"),
            Some("db/schema.sql".to_string())
        );
    }

    #[test]
    fn extracts_path_from_block_comment() {
        assert_eq!(
            extract_path_from_line("/* src/app.css */"),
            Some("src/app.css".to_string())
        );
        assert_eq!(
            extract_path_from_line("<!-- index.html -->"),
            Some("index.html".to_string())
        );
    }

    #[test]
    fn extracts_path_from_xml_file_tag() {
        assert_eq!(
            extract_path_from_line("<file path=\"src/a.ts\">"),
            Some("src/a.ts".to_string())
        );
        assert_eq!(
            extract_path_from_line("<file path='b.py'>"),
            Some("b.py".to_string())
        );
    }

    #[test]
    fn ignores_non_comment_lines() {
        assert_eq!(extract_path_from_line("let x = a.b"), None);
        assert_eq!(extract_path_from_line("plain prose sentence."), None);
    }

    #[test]
    fn finds_path_among_other_words() {
        assert_eq!(
            extract_path_from_line("// File: src/index.ts (updated)"),
            Some("src/index.ts".to_string())
        );
    }

    #[test]
    fn accepts_dotfiles() {
        assert_eq!(
            extract_path_from_line("# .gitignore"),
            Some(".gitignore".to_string())
        );
    }

    #[test]
    fn normalizes_backslashes() {
        assert_eq!(
            extract_path_from_line("// src\\win\\main.rs"),
            Some("src/win/main.rs".to_string())
        );
    }

    #[test]
    fn splits_workspace_prefix_with_multiple_roots() {
        let (ws, path) = split_workspace_prefix("frontend/src/index.ts", false);
        assert_eq!(ws.as_deref(), Some("frontend"));
        assert_eq!(path, "src/index.ts");
    }

    #[test]
    fn keeps_prefix_with_single_root() {
        let (ws, path) = split_workspace_prefix("frontend/src/index.ts", true);
        assert_eq!(ws, None);
        assert_eq!(path, "frontend/src/index.ts");
    }

    #[test]
    fn digit_prefix_still_counts_as_workspace() {
        let (ws, path) = split_workspace_prefix("2048/src/game.ts", false);
        assert_eq!(ws.as_deref(), Some("2048"));
        assert_eq!(path, "src/game.ts");
    }

    #[test]
    fn bare_filename_has_no_prefix() {
        let (ws, path) = split_workspace_prefix("main.rs", false);
        assert_eq!(ws, None);
        assert_eq!(path, "main.rs");
    }

    #[test]
    fn colon_prefix_is_split() {
        let (ws, path) = split_workspace_prefix("backend:src/app.py", false);
        assert_eq!(ws.as_deref(), Some("backend"));
        assert_eq!(path, "src/app.py");
    }

    #[test]
    fn elision_only_content_is_not_real_code() {
        assert!(!has_real_code("// ..."));
        assert!(!has_real_code("# ...\n\n// ….."));
        assert!(!has_real_code("/* ... */\n<!-- ... -->"));
        assert!(!has_real_code("\n\n"));
    }

    #[test]
    fn code_lines_are_real_code() {
        assert!(has_real_code("console.log(1)"));
        assert!(has_real_code("// ...\nlet x = 1;"));
        // A comment that says something is not an elision.
        assert!(has_real_code("// keep this file"));
    }
}
