use log::{ debug, info, warn };
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::errors::ForgeResult;
use crate::models::checkpoint::{ Checkpoint, CheckpointRecord, SectionKind };

/// Lines after a title within which `Profile Applicability:` must appear
pub const PROFILE_LOOKAHEAD: usize = 5;

fn title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(\d+(?:\.\d+)+)\s+(.+?\((?:Manual|Automated)\))\s*$").expect(
            "valid regex"
        )
    })
}

fn toc_leader_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*\d+(?:\.\d+)+\s+.*\.{4,}\s*\d+\s*$").expect("valid regex"))
}

/// Match a checkpoint title line, returning `(id, title)`
pub fn match_title(line: &str) -> Option<(String, String)> {
    title_re()
        .captures(line)
        .map(|caps| (caps[1].to_string(), caps[2].trim().to_string()))
}

/// Table-of-contents entries start with a dotted id and end in a dotted
/// leader and a page number; body text ending in a leader is not one
pub fn is_toc_line(line: &str) -> bool {
    toc_leader_re().is_match(line)
}

fn has_profile_within(lines: &[&str], start: usize) -> bool {
    lines
        .iter()
        .skip(start)
        .take(PROFILE_LOOKAHEAD)
        .any(|line| line.trim_start().starts_with(SectionKind::ProfileApplicability.label()))
}

/// Remove leading and trailing blank lines, keeping inner text untouched
fn trim_blank_lines(lines: &[&str]) -> String {
    let start = lines.iter().position(|l| !l.trim().is_empty());
    let end = lines.iter().rposition(|l| !l.trim().is_empty());
    match (start, end) {
        (Some(start), Some(end)) => lines[start..=end].join("\n"),
        _ => String::new(),
    }
}

/// Checkpoint under construction
struct Builder<'a> {
    checkpoint: Checkpoint,
    section: Option<SectionKind>,
    buffer: Vec<&'a str>,
}

impl<'a> Builder<'a> {
    fn new(id: String, title: String) -> Self {
        Self {
            checkpoint: Checkpoint::new(id, title),
            section: None,
            buffer: Vec::new(),
        }
    }

    fn flush_section(&mut self) {
        if let Some(kind) = self.section.take() {
            let text = trim_blank_lines(&self.buffer);
            if !text.is_empty() {
                self.checkpoint.sections
                    .entry(kind)
                    .and_modify(|existing| {
                        existing.push('\n');
                        existing.push_str(&text);
                    })
                    .or_insert(text);
            }
        }
        self.buffer.clear();
    }

    fn finish(mut self) -> Checkpoint {
        self.flush_section();
        self.checkpoint
    }
}

/// Parses the text rendering of a CIS benchmark into checkpoints
#[derive(Debug, Default, Clone)]
pub struct DocumentParser;

impl DocumentParser {
    pub fn new() -> Self {
        Self
    }

    /// Split the document into checkpoints, in document order.
    ///
    /// Never fails on content: unrecognized lines before the first section
    /// header of a checkpoint are ignored, and table-of-contents entries are
    /// dropped.
    pub fn parse(&self, text: &str) -> Vec<Checkpoint> {
        let lines: Vec<&str> = text.lines().collect();
        let mut checkpoints = Vec::new();
        let mut current: Option<Builder> = None;
        let mut discarded = 0usize;

        for (idx, line) in lines.iter().enumerate() {
            if is_toc_line(line) {
                discarded += 1;
                continue;
            }

            if let Some((id, title)) = match_title(line) {
                if has_profile_within(&lines, idx + 1) {
                    if let Some(builder) = current.take() {
                        checkpoints.push(builder.finish());
                    }
                    debug!("Found checkpoint {} at line {}", id, idx + 1);
                    current = Some(Builder::new(id, title));
                    continue;
                }
                if current.is_none() {
                    discarded += 1;
                    continue;
                }
            }

            let Some(builder) = current.as_mut() else {
                continue;
            };

            if let Some((kind, rest)) = SectionKind::match_header(line) {
                builder.flush_section();
                builder.section = Some(kind);
                if !rest.is_empty() {
                    builder.buffer.push(rest);
                }
                continue;
            }

            if builder.section.is_some() {
                builder.buffer.push(*line);
            }
        }

        if let Some(builder) = current.take() {
            checkpoints.push(builder.finish());
        }

        info!(
            "Parsed {} checkpoints ({} table-of-contents lines discarded)",
            checkpoints.len(),
            discarded
        );
        for checkpoint in checkpoints.iter().filter(|c| c.sections.is_empty()) {
            warn!("Checkpoint {} has no recognized sections", checkpoint.id);
        }

        checkpoints
    }

    /// `(id, title)` pairs in document order, first occurrence of each id
    pub fn index(&self, text: &str) -> Vec<(String, String)> {
        let mut seen = HashSet::new();
        self.parse(text)
            .into_iter()
            .filter(|c| seen.insert(c.id.clone()))
            .map(|c| (c.id, c.title))
            .collect()
    }

    /// Serialize checkpoints as a pretty-printed JSON array
    pub fn to_json(&self, checkpoints: &[Checkpoint]) -> ForgeResult<String> {
        let records: Vec<CheckpointRecord> = checkpoints.iter().map(CheckpointRecord::from).collect();
        Ok(serde_json::to_string_pretty(&records)?)
    }
}
