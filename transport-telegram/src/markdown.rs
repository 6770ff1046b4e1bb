//! Legacy-Markdown normalization (spec.md §6): the model writes
//! CommonMark-ish text; Telegram's `parse_mode=Markdown` only understands a
//! much older, single-asterisk dialect. This coerces the common constructs
//! the model tends to emit into that dialect before a message is sent.

use once_cell::sync::Lazy;
use regex::Regex;

static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*([^*]+)\*\*").unwrap());
static IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)]+)\)").unwrap());
static HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#{1,6})\s+(.*)$").unwrap());
static HR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(-{3,}|\*{3,}|_{3,})\s*$").unwrap());

/// Coerces model-authored Markdown into Telegram's legacy `Markdown`
/// dialect, line by line (spec.md §6):
///
/// - `# Heading` / `## Heading` → `*Heading*` (a bold line; legacy Markdown
///   has no heading syntax).
/// - `**bold**` → `*bold*` (legacy Markdown's bold marker is single-asterisk).
/// - `![alt](url)` → `alt: url` (images render as plain link text).
/// - `> quoted` → `│ quoted` (legacy Markdown has no blockquote syntax).
/// - a line that is only `---`/`***`/`___` → `———` (no horizontal rule
///   syntax either).
pub fn normalize_markdown(text: &str) -> String {
    let lines: Vec<String> = text.lines().map(normalize_line).collect();
    let mut out = lines.join("\n");
    if text.ends_with('\n') {
        out.push('\n');
    }
    out
}

fn normalize_line(line: &str) -> String {
    if let Some(caps) = HEADING.captures(line) {
        return format!("*{}*", caps[2].trim());
    }
    if HR.is_match(line) {
        return "———".to_string();
    }

    let mut line = line.to_string();
    if let Some(rest) = line.strip_prefix("> ") {
        line = format!("│ {rest}");
    } else if line == ">" {
        line = "│".to_string();
    }

    let line = BOLD.replace_all(&line, "*$1*").into_owned();
    IMAGE.replace_all(&line, "$1: $2").into_owned()
}
