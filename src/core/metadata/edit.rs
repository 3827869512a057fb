//! core::metadata::edit
//!
//! Line-level edits to a front-matter block.
//!
//! Repairs rewrite a single `key: value` line and leave every other byte of
//! the file untouched, so formatting, comments and field order survive.

/// Set a top-level scalar field in the front-matter of `content`.
///
/// Replaces the existing `key:` line if there is one, otherwise inserts a
/// new line just before the closing delimiter. Returns `None` when
/// `content` has no terminated front-matter block. The line ending style
/// of the file is preserved.
///
/// # Example
///
/// ```
/// use corpuscheck::core::metadata::edit::set_field;
///
/// let doc = "---\ntitle: A\ncontent_hash: \"old\"\n---\nbody\n";
/// let updated = set_field(doc, "content_hash", "\"new\"").unwrap();
/// assert_eq!(updated, "---\ntitle: A\ncontent_hash: \"new\"\n---\nbody\n");
///
/// let inserted = set_field("---\ntitle: A\n---\n", "status", "active").unwrap();
/// assert_eq!(inserted, "---\ntitle: A\nstatus: active\n---\n");
/// ```
pub fn set_field(content: &str, key: &str, value: &str) -> Option<String> {
    let newline = if content.contains("\r\n") { "\r\n" } else { "\n" };
    let bom = if content.starts_with('\u{feff}') { "\u{feff}" } else { "" };
    let text = &content[bom.len()..];

    let eol = if newline == "\r\n" { "\r" } else { "" };
    let owned = format!("{key}: {value}{eol}");

    let mut lines: Vec<&str> = text.split('\n').collect();
    if lines.first().map(|l| l.trim_end()) != Some("---") {
        return None;
    }

    let close = lines
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, l)| matches!(l.trim_end(), "---" | "..."))
        .map(|(i, _)| i)?;

    let existing = (1..close).find(|&i| {
        lines[i]
            .strip_prefix(key)
            .map(|rest| rest.starts_with(':'))
            .unwrap_or(false)
    });

    match existing {
        Some(i) => lines[i] = &owned,
        None => lines.insert(close, &owned),
    }

    Some(format!("{bom}{}", lines.join("\n")))
}

/// Read the literal value text of a top-level field, if present.
pub fn field_text(content: &str, key: &str) -> Option<String> {
    let text = content.trim_start_matches('\u{feff}');
    let mut lines = text.lines();
    if lines.next()?.trim_end() != "---" {
        return None;
    }
    for line in lines {
        if matches!(line.trim_end(), "---" | "...") {
            break;
        }
        if let Some(rest) = line.strip_prefix(key).and_then(|r| r.strip_prefix(':')) {
            return Some(rest.trim().to_string());
        }
    }
    None
}

/// Replace the body of `content`, keeping its front-matter bytes intact.
///
/// Returns `None` when `content` has no terminated front-matter block.
pub fn replace_body(content: &str, body: &str) -> Option<String> {
    let text = content.trim_start_matches('\u{feff}');
    let prefix_len = content.len() - text.len();

    let first_end = text.find('\n')?;
    if text[..first_end].trim_end() != "---" {
        return None;
    }

    let mut offset = first_end + 1;
    while offset <= text.len() {
        let line_end = text[offset..]
            .find('\n')
            .map(|i| offset + i)
            .unwrap_or(text.len());
        if matches!(text[offset..line_end].trim_end(), "---" | "...") {
            let head_end = prefix_len + (line_end + 1).min(text.len());
            let mut head = content[..head_end].to_string();
            if !head.ends_with('\n') {
                head.push('\n');
            }
            return Some(head + body);
        }
        if line_end == text.len() {
            break;
        }
        offset = line_end + 1;
    }
    None
}
