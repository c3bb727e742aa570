//! Reading the compliance report a generated playbook prints, and the
//! independent analysis the LLM writes about it.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::models::status::ComplianceStatus;

fn requirement_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^REQUIREMENT\s+(\d+)\s*-\s*(.*?):?\s*$").expect("valid regex"))
}

fn analysis_requirement_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^[\W_]*requirement\s+(\d+)\b").expect("valid regex"))
}

fn field_value<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    line.strip_prefix(label).map(str::trim)
}

/// Undo the JSON quoting ansible's debug callback puts around report lines
fn normalize_report_line(line: &str) -> String {
    let trimmed = line.trim();
    let trimmed = trimmed.strip_prefix("\"msg\":").unwrap_or(trimmed).trim();
    trimmed
        .trim_end_matches(',')
        .trim_matches('"')
        .trim()
        .to_string()
}

/// One `REQUIREMENT N - ...:` block of the compliance report
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportEntry {
    pub number: usize,
    pub description: String,
    pub exit_code: Option<String>,
    pub data: Option<String>,
    pub status: Option<String>,
}

impl ReportEntry {
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code.as_deref().and_then(|c| c.trim().parse().ok())
    }

    /// Parsed status, `None` when missing or not one of PASS/FAIL/NA/UNKNOWN
    pub fn compliance_status(&self) -> Option<ComplianceStatus> {
        self.status.as_deref().and_then(ComplianceStatus::from_report)
    }
}

/// Compliance report printed by the "Generate compliance report" task
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComplianceReport {
    pub entries: BTreeMap<usize, ReportEntry>,
    pub overall: Option<String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Field {
    None,
    Data,
}

impl ComplianceReport {
    pub fn parse(output: &str) -> Self {
        let text = output.replace("\\n", "\n");
        let mut report = ComplianceReport::default();
        let mut current: Option<ReportEntry> = None;
        let mut field = Field::None;
        let mut in_overall = false;

        for raw in text.lines() {
            let line = normalize_report_line(raw);

            if let Some(caps) = requirement_header_re().captures(&line) {
                if let Some(entry) = current.take() {
                    report.entries.insert(entry.number, entry);
                }
                let number = caps[1].parse().unwrap_or(0);
                current = Some(ReportEntry {
                    number,
                    description: caps[2].trim().to_string(),
                    ..ReportEntry::default()
                });
                field = Field::None;
                in_overall = false;
                continue;
            }

            if line.starts_with("OVERALL COMPLIANCE") {
                if let Some(entry) = current.take() {
                    report.entries.insert(entry.number, entry);
                }
                in_overall = true;
                field = Field::None;
                if let Some(pos) = line.find("Result:") {
                    report.overall = Some(line[pos + "Result:".len()..].trim().to_string());
                }
                continue;
            }

            if in_overall {
                if let Some(value) = field_value(&line, "Result:") {
                    report.overall = Some(value.to_string());
                    in_overall = false;
                }
                continue;
            }

            let Some(entry) = current.as_mut() else {
                continue;
            };

            if let Some(value) = field_value(&line, "Exit code:") {
                entry.exit_code = Some(value.to_string());
                field = Field::None;
            } else if let Some(value) = field_value(&line, "Data:") {
                entry.data = Some(value.to_string());
                field = Field::Data;
            } else if let Some(value) = field_value(&line, "Status:") {
                entry.status = Some(value.to_string());
                field = Field::None;
            } else if
                line.starts_with("Task:") ||
                line.starts_with("Command:") ||
                line.starts_with("Rationale:")
            {
                field = Field::None;
            } else if field == Field::Data && !line.is_empty() {
                if let Some(data) = entry.data.as_mut() {
                    data.push('\n');
                    data.push_str(&line);
                }
            }
        }

        if let Some(entry) = current.take() {
            report.entries.insert(entry.number, entry);
        }
        report
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.overall.is_none()
    }

    pub fn overall_status(&self) -> Option<ComplianceStatus> {
        self.overall.as_deref().and_then(ComplianceStatus::from_report)
    }

    pub fn statuses(&self) -> Vec<(usize, ComplianceStatus)> {
        self.entries
            .values()
            .filter_map(|e| e.compliance_status().map(|s| (e.number, s)))
            .collect()
    }
}

/// Status text that still holds an un-rendered Jinja2 expression or any
/// value outside PASS/FAIL/NA/UNKNOWN
pub fn is_unevaluated_status(value: &str) -> bool {
    let v = value.trim();
    v.contains("{{") ||
        v.contains("{%") ||
        v.contains("'PASS' if") ||
        v.contains("\"PASS\" if") ||
        ComplianceStatus::from_report(v).is_none()
}

/// The LLM's independent reading of the execution output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComplianceAnalysis {
    pub requirements: BTreeMap<usize, ComplianceStatus>,
    pub overall: Option<ComplianceStatus>,
    /// `Some(true)` for `COMPLIANCE ANALYSIS: PASS`
    pub logic_verdict: Option<bool>,
    pub explanation: String,
}

impl ComplianceAnalysis {
    pub fn parse(text: &str) -> Self {
        let mut analysis = ComplianceAnalysis::default();
        let mut current: Option<usize> = None;
        let mut explanation = Vec::new();
        let mut in_explanation = false;

        for raw in text.lines() {
            let line = raw.trim().trim_start_matches(&['*', '#', '-', ' '][..]).replace("**", "");
            let line = line.trim();

            if let Some(value) = line.strip_prefix("COMPLIANCE ANALYSIS:") {
                let value = value.trim().to_uppercase();
                analysis.logic_verdict = if value.starts_with("PASS") {
                    Some(true)
                } else if value.starts_with("FAIL") {
                    Some(false)
                } else {
                    None
                };
                continue;
            }
            if let Some(pos) = line.find("COMPLIANCE STATUS:") {
                let value = first_word(&line[pos + "COMPLIANCE STATUS:".len()..]);
                analysis.overall = ComplianceStatus::from_analysis(&value);
                current = None;
                continue;
            }
            if let Some(caps) = analysis_requirement_re().captures(line) {
                current = caps[1].parse().ok();
                in_explanation = false;
            }
            if let Some(pos) = line.find("Compliance Status:") {
                let value = first_word(&line[pos + "Compliance Status:".len()..]);
                if let (Some(number), Some(status)) = (current, ComplianceStatus::from_analysis(&value)) {
                    analysis.requirements.entry(number).or_insert(status);
                }
                continue;
            }
            if let Some(value) = line.strip_prefix("Explanation:") {
                in_explanation = true;
                explanation.push(value.trim().to_string());
                continue;
            }
            if in_explanation && !line.is_empty() {
                explanation.push(line.to_string());
            }
        }

        analysis.explanation = explanation.join("\n");
        analysis
    }
}

/// Status token at the start of `text`; keeps `NON-COMPLIANT` and `N/A` whole
fn first_word(text: &str) -> String {
    text.trim()
        .split(|c: char| c.is_whitespace() || c == '|' || c == ',' || c == '(')
        .next()
        .unwrap_or("")
        .trim_matches(|c: char| !c.is_alphanumeric() && c != '-' && c != '/')
        .to_string()
}
