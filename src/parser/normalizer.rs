/// Best-effort cleanup of model output. Strips the wrapper markup chat
/// responses tend to arrive in (markdown fences, `<files>`/`<file>` tags,
/// CDATA markers, DOCTYPE preludes, leading think-blocks) without touching
/// the interior. Never fails; unrecognized input passes through.
///
/// `cleanup` returns the trimmed interior. `normalize` additionally
/// guarantees exactly one trailing newline and is idempotent.
pub fn normalize(raw: &str) -> String {
    let mut content = cleanup(raw);
    content.push('\n');
    content
}

pub fn cleanup(raw: &str) -> String {
    let mut content = raw.trim().to_string();

    // A reasoning prelude is dropped before any wrapper stripping.
    if content.starts_with("<think>") {
        if let Some(end) = content.find("</think>") {
            content = content[end + "</think>".len()..].trim_start().to_string();
        }
    }

    // Strip one wrapper layer per iteration, outside in, until nothing
    // changes. Opening markers only match at the start, closing only at the
    // end, so interior fences and tags survive.
    loop {
        let before = content.clone();

        content = strip_opening_wrapper(&content);
        content = strip_closing_wrapper(&content);

        if content == before {
            break;
        }
    }

    // Wrapper tags can also appear mid-text when a response interleaves
    // several conventions; remove them wherever they occur.
    content = remove_tag_everywhere(&content, "<files", true);
    content = remove_tag_everywhere(&content, "</files>", false);
    content = remove_tag_everywhere(&content, "<file ", true);
    content = remove_tag_everywhere(&content, "<file>", false);
    content = remove_tag_everywhere(&content, "</file>", false);
    content = remove_tag_everywhere(&content, "<![CDATA[", false);
    content = remove_tag_everywhere(&content, "]]>", false);

    if content.trim_start().to_ascii_lowercase().starts_with("<!doctype") {
        let rest = content.trim_start();
        if let Some(pos) = rest.find('>') {
            content = rest[pos + 1..].to_string();
        }
    }

    content.trim().to_string()
}

fn strip_opening_wrapper(content: &str) -> String {
    if let Some(rest) = content.strip_prefix("```") {
        // Opening fence line, with or without a language tag.
        if let Some(pos) = rest.find('\n') {
            return rest[pos + 1..].to_string();
        }
        return String::new();
    }
    for opener in ["<files", "<file", "<!DOCTYPE", "<!doctype"] {
        if content.starts_with(opener) {
            if let Some(pos) = content.find('>') {
                return content[pos + 1..].trim_start().to_string();
            }
        }
    }
    if let Some(rest) = content.strip_prefix("<![CDATA[") {
        return rest.trim_start().to_string();
    }
    content.to_string()
}

fn strip_closing_wrapper(content: &str) -> String {
    let trimmed = content.trim_end();
    for closer in ["```", "</files>", "</file>", "]]>", "]]"] {
        if let Some(rest) = trimmed.strip_suffix(closer) {
            return rest.trim_end().to_string();
        }
    }
    content.to_string()
}

/// Removes every occurrence of a marker. When `with_attributes` is set the
/// marker opens a tag and everything through the next `>` goes with it.
fn remove_tag_everywhere(content: &str, marker: &str, with_attributes: bool) -> String {
    let mut result = String::with_capacity(content.len());
    let mut rest = content;
    while let Some(start) = rest.find(marker) {
        result.push_str(&rest[..start]);
        let after_marker = &rest[start + marker.len()..];
        if with_attributes {
            match after_marker.find('>') {
                Some(end) => rest = &after_marker[end + 1..],
                None => {
                    rest = "";
                }
            }
        } else {
            rest = after_marker;
        }
    }
    result.push_str(rest);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_fenced_interior() {
        assert_eq!(normalize("```ts\nconst x = 1\n```"), "const x = 1\n");
    }

    #[test]
    fn accepts_unclosed_fence() {
        assert_eq!(normalize("```python\nprint(1)"), "print(1)\n");
    }

    #[test]
    fn strips_file_wrappers_and_cdata() {
        let raw = "<files>\n<file path=\"a.ts\">\n<![CDATA[\nlet a = 1\n]]>\n</file>\n</files>";
        assert_eq!(normalize(raw), "let a = 1\n");
    }

    #[test]
    fn drops_doctype_prelude() {
        assert_eq!(normalize("<!DOCTYPE html>\n<html></html>"), "<html></html>\n");
    }

    #[test]
    fn drops_leading_think_block() {
        assert_eq!(normalize("<think>hmm</think>\nfn main() {}"), "fn main() {}\n");
    }

    #[test]
    fn passes_plain_text_through() {
        assert_eq!(normalize("hello world"), "hello world\n");
    }

    #[test]
    fn normalize_is_idempotent() {
        let samples = [
            "```rust\nfn f() {}\n```",
            "plain",
            "",
            "<file path=\"x\">\nbody\n</file>",
            "<!DOCTYPE html><p>x</p>",
            "a\n```\nb\n```\nc",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn keeps_interior_fences_intact() {
        let raw = "intro\n```\ncode\n```\noutro";
        assert_eq!(cleanup(raw), "intro\n```\ncode\n```\noutro");
    }
}
