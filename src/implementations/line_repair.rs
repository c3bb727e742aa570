//! Rejoins lines that PDF-to-text extraction broke at the page column width.
//!
//! The benchmark embeds long shell pipelines and prose; the text rendering
//! wraps both at a fixed column. Each rule below recognizes one common break
//! pattern and joins the fragment back onto the line it belongs to.

use log::debug;
use regex::Regex;
use std::sync::OnceLock;

fn page_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*Page\s+\d+\s*$").expect("valid regex"))
}

fn section_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\.\d+").expect("valid regex"))
}

fn qualifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(Manual\)|\(Automated\)").expect("valid regex"))
}

fn trailing_word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(the|in|a|an|to|of|for|with|from|by|or|and|into|onto)\s*$").expect(
            "valid regex"
        )
    })
}

fn terminator_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[.:;!?}\])'"]\s*$"#).expect("valid regex"))
}

/// Drop `Page N` header lines left over from the PDF rendering
pub fn strip_page_lines(text: &str) -> String {
    text.lines()
        .filter(|line| !page_line_re().is_match(line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Count double quotes that are neither escaped nor inside single quotes
fn unbalanced_double_quotes(text: &str) -> usize {
    let mut in_single_quote = false;
    let mut count = 0;
    let mut prev = '\0';
    for ch in text.chars() {
        match ch {
            '\'' => in_single_quote = !in_single_quote,
            '"' if !in_single_quote && prev != '\\' => count += 1,
            _ => {}
        }
        prev = ch;
    }
    count
}

fn starts_with_any(text: &str, chars: &str) -> bool {
    text.chars().next().map_or(false, |c| chars.contains(c))
}

fn starts_lowercase(text: &str) -> bool {
    text.chars().next().map_or(false, char::is_lowercase)
}

/// Whether `next` is a column-break continuation of `current`.
///
/// `current` has trailing whitespace removed but keeps its indentation.
fn is_broken_continuation(current: &str, next: &str, in_block: bool) -> bool {
    let next_trimmed = next.trim();

    if next_trimmed.is_empty()
        || next_trimmed.starts_with("=====")
        || page_line_re().is_match(next_trimmed)
        || section_number_re().is_match(next_trimmed)
    {
        return false;
    }

    // Outside a `{ ... }` block code needs three spaces of indentation.
    let is_code = current.starts_with("   ") || (in_block && current.starts_with(' '));
    let next_at_column_zero = !next.starts_with(' ');

    if current.ends_with("<<<") || current.ends_with("$(") {
        return true;
    }
    if current.ends_with("||") || current.ends_with("&&") {
        return true;
    }
    if current.ends_with('|') && is_code {
        return true;
    }
    if current.trim_end().ends_with(">>") && next_trimmed.starts_with('/') {
        return true;
    }
    // ${var//-<break>/_}
    if current.ends_with('-') && next_trimmed.starts_with("/_") {
        return true;
    }
    if current.ends_with("--") && is_code && starts_with_any(next_trimmed, "'\"/\\$") {
        return true;
    }
    if is_code && next_at_column_zero {
        if unbalanced_double_quotes(current) % 2 == 1 {
            return true;
        }
        if next_trimmed != "}" {
            return true;
        }
    }

    // Title split before its qualifier
    if section_number_re().is_match(current)
        && !qualifier_re().is_match(current)
        && qualifier_re().is_match(next_trimmed)
    {
        return true;
    }

    if trailing_word_re().is_match(current) {
        if starts_with_any(next_trimmed, "\"'/\\$") || starts_lowercase(next_trimmed) {
            return true;
        }
    }

    !current.starts_with("   ")
        && current.chars().count() > 60
        && !terminator_re().is_match(current)
        && starts_lowercase(next_trimmed)
        && !next_trimmed.starts_with("- ")
        && !next_trimmed.starts_with("• ")
}

/// Greedily join every line with the continuation fragments that follow it
pub fn repair_broken_lines(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut result: Vec<String> = Vec::with_capacity(lines.len());
    let mut block_depth: usize = 0;
    let mut i = 0;

    while i < lines.len() {
        let mut current = lines[i].to_string();

        match current.trim() {
            "{" => block_depth += 1,
            "}" => block_depth = block_depth.saturating_sub(1),
            _ => {}
        }
        let in_block = block_depth > 0;

        while i + 1 < lines.len() {
            let stripped = current.trim_end();
            if !is_broken_continuation(stripped, lines[i + 1], in_block) {
                break;
            }
            i += 1;
            current = format!("{} {}", stripped, lines[i].trim_start());
        }

        result.push(current);
        i += 1;
    }

    debug!("Line repair: {} lines in, {} lines out", lines.len(), result.len());
    result.join("\n")
}

/// Full clean-up of a raw text rendering: page headers removed, then repaired
pub fn clean_document(text: &str, repair: bool) -> String {
    let stripped = strip_page_lines(text);
    if repair {
        repair_broken_lines(&stripped)
    } else {
        stripped
    }
}
