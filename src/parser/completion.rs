//! The code-completion form: a single fenced block whose first line is a
//! comment carrying a path and a 1-based `line:col` insertion point, e.g.
//! `// src/main.rs 12:4`.

use super::normalizer;
use super::path_hint;
use super::CodeCompletion;

pub fn parse_code_completion(text: &str, single_root_workspace: bool) -> Option<CodeCompletion> {
    let block = extract_single_block(text)?;
    let mut lines = block.lines();
    let header = lines.next()?;

    if !path_hint::is_comment_like(header) {
        return None;
    }
    let path = path_hint::extract_path_from_line(header)?;
    let (line, character) = extract_position(header)?;

    let content = normalizer::cleanup(&lines.collect::<Vec<_>>().join("\n"));
    if content.is_empty() {
        return None;
    }

    let (workspace_name, file_path) =
        path_hint::split_workspace_prefix(&path, single_root_workspace);
    Some(CodeCompletion {
        file_path,
        content,
        line,
        character,
        workspace_name,
    })
}

/// Returns the interior of the text's one fenced block, accepting a missing
/// closing fence at end-of-input. More than one block means this is not a
/// completion.
fn extract_single_block(text: &str) -> Option<String> {
    let mut interior: Option<Vec<&str>> = None;
    let mut current: Option<Vec<&str>> = None;

    for line in text.lines() {
        match current.as_mut() {
            None => {
                if line.trim_start().starts_with("```") {
                    if interior.is_some() {
                        return None; // second block
                    }
                    current = Some(Vec::new());
                }
            }
            Some(lines) => {
                if line.trim() == "```" {
                    interior = current.take();
                } else {
                    lines.push(line);
                }
            }
        }
    }

    // Unclosed trailing fence.
    if let Some(lines) = current {
        interior = Some(lines);
    }

    interior.map(|lines| lines.join("\n"))
}

/// Finds a `line:col` token with both halves positive integers.
fn extract_position(header: &str) -> Option<(usize, usize)> {
    for token in header.split_whitespace() {
        let token = token.trim_matches(|c: char| !c.is_ascii_digit() && c != ':');
        if let Some((line, character)) = token.split_once(':') {
            if let (Ok(line), Ok(character)) = (line.parse::<usize>(), character.parse::<usize>())
            {
                if line >= 1 && character >= 1 {
                    return Some((line, character));
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_completion_block() {
        let text = "```rust\n// src/main.rs 12:4\nlet total = items.iter().sum();\n```\n";
        let completion = parse_code_completion(text, true).unwrap();
        assert_eq!(completion.file_path, "src/main.rs");
        assert_eq!(completion.line, 12);
        assert_eq!(completion.character, 4);
        assert_eq!(completion.content, "let total = items.iter().sum();");
    }

    #[test]
    fn accepts_unclosed_fence() {
        let text = "```python\n# app.py 3:1\nreturn cached";
        let completion = parse_code_completion(text, true).unwrap();
        assert_eq!(completion.file_path, "app.py");
        assert_eq!(completion.content, "return cached");
    }

    #[test]
    fn splits_workspace_prefix() {
        let text = "```ts\n// frontend/src/app.ts 8:2\nconsole.log(1)\n```";
        let completion = parse_code_completion(text, false).unwrap();
        assert_eq!(completion.workspace_name.as_deref(), Some("frontend"));
        assert_eq!(completion.file_path, "src/app.ts");
    }

    #[test]
    fn rejects_header_without_position() {
        let text = "```rust\n// src/main.rs\nlet x = 1;\n```";
        assert!(parse_code_completion(text, true).is_none());
    }

    #[test]
    fn rejects_multiple_blocks() {
        let text = "```rust\n// a.rs 1:1\nx\n```\n```rust\n// b.rs 1:1\ny\n```";
        assert!(parse_code_completion(text, true).is_none());
    }
}
