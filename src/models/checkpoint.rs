use serde::{ Deserialize, Serialize };
use std::collections::BTreeMap;
use std::fmt;

/// Section headers of a benchmark checkpoint, in document order.
///
/// The derived `Ord` follows declaration order, so a `BTreeMap` keyed by
/// `SectionKind` iterates sections in the fixed header order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SectionKind {
    ProfileApplicability,
    Description,
    Rationale,
    Impact,
    Audit,
    Remediation,
    DefaultValue,
    References,
    AdditionalInformation,
    CisControls,
}

impl SectionKind {
    pub const ALL: [SectionKind; 10] = [
        SectionKind::ProfileApplicability,
        SectionKind::Description,
        SectionKind::Rationale,
        SectionKind::Impact,
        SectionKind::Audit,
        SectionKind::Remediation,
        SectionKind::DefaultValue,
        SectionKind::References,
        SectionKind::AdditionalInformation,
        SectionKind::CisControls,
    ];

    /// Header label as it appears in the benchmark text, colon included
    pub fn label(&self) -> &'static str {
        match self {
            SectionKind::ProfileApplicability => "Profile Applicability:",
            SectionKind::Description => "Description:",
            SectionKind::Rationale => "Rationale:",
            SectionKind::Impact => "Impact:",
            SectionKind::Audit => "Audit:",
            SectionKind::Remediation => "Remediation:",
            SectionKind::DefaultValue => "Default Value:",
            SectionKind::References => "References:",
            SectionKind::AdditionalInformation => "Additional Information:",
            SectionKind::CisControls => "CIS Controls:",
        }
    }

    /// Match a header line, returning the section and any text after the label
    pub fn match_header(line: &str) -> Option<(SectionKind, &str)> {
        let trimmed = line.trim();
        SectionKind::ALL.iter().find_map(|kind| {
            trimmed.strip_prefix(kind.label()).map(|rest| (*kind, rest.trim()))
        })
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label().trim_end_matches(':'))
    }
}

/// Whether the benchmark marks the checkpoint as scorable by automation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Automation {
    Automated,
    Manual,
}

impl Automation {
    pub fn from_title(title: &str) -> Option<Self> {
        if title.ends_with("(Automated)") {
            Some(Automation::Automated)
        } else if title.ends_with("(Manual)") {
            Some(Automation::Manual)
        } else {
            None
        }
    }
}

/// One numbered security control of the benchmark
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub id: String,
    /// Title including the trailing `(Manual)` / `(Automated)` qualifier
    pub title: String,
    pub sections: BTreeMap<SectionKind, String>,
}

impl Checkpoint {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            sections: BTreeMap::new(),
        }
    }

    /// Section text, or the empty string when the section is absent
    pub fn section(&self, kind: SectionKind) -> &str {
        self.sections.get(&kind).map(String::as_str).unwrap_or("")
    }

    pub fn automation(&self) -> Option<Automation> {
        Automation::from_title(&self.title)
    }

    /// Playbook file name for this checkpoint, e.g. `cis_audit_1_1_1_1.yml`
    pub fn playbook_file_name(&self) -> String {
        format!("cis_audit_{}.yml", self.id.replace('.', "_"))
    }
}

fn is_empty(value: &str) -> bool {
    value.is_empty()
}

/// JSON form of a checkpoint.
///
/// Required fields are always emitted (empty string when absent); optional
/// fields are omitted unless they carry text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub name: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "is_empty")]
    pub profile_applicability: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rationale: String,
    #[serde(default, skip_serializing_if = "is_empty")]
    pub impact: String,
    #[serde(default)]
    pub audit: String,
    #[serde(default)]
    pub remediation: String,
    #[serde(default, skip_serializing_if = "is_empty")]
    pub default_value: String,
    #[serde(default)]
    pub references: String,
    #[serde(default, skip_serializing_if = "is_empty")]
    pub additional_information: String,
    #[serde(default, skip_serializing_if = "is_empty")]
    pub cis_controls: String,
}

impl From<&Checkpoint> for CheckpointRecord {
    fn from(checkpoint: &Checkpoint) -> Self {
        let text = |kind| checkpoint.section(kind).to_string();
        CheckpointRecord {
            name: checkpoint.title.clone(),
            id: checkpoint.id.clone(),
            profile_applicability: text(SectionKind::ProfileApplicability),
            description: text(SectionKind::Description),
            rationale: text(SectionKind::Rationale),
            impact: text(SectionKind::Impact),
            audit: text(SectionKind::Audit),
            remediation: text(SectionKind::Remediation),
            default_value: text(SectionKind::DefaultValue),
            references: text(SectionKind::References),
            additional_information: text(SectionKind::AdditionalInformation),
            cis_controls: text(SectionKind::CisControls),
        }
    }
}

impl From<CheckpointRecord> for Checkpoint {
    fn from(record: CheckpointRecord) -> Self {
        let mut checkpoint = Checkpoint::new(record.id, record.name);
        let fields = [
            (SectionKind::ProfileApplicability, record.profile_applicability),
            (SectionKind::Description, record.description),
            (SectionKind::Rationale, record.rationale),
            (SectionKind::Impact, record.impact),
            (SectionKind::Audit, record.audit),
            (SectionKind::Remediation, record.remediation),
            (SectionKind::DefaultValue, record.default_value),
            (SectionKind::References, record.references),
            (SectionKind::AdditionalInformation, record.additional_information),
            (SectionKind::CisControls, record.cis_controls),
        ];
        for (kind, text) in fields {
            if !text.is_empty() {
                checkpoint.sections.insert(kind, text);
            }
        }
        checkpoint
    }
}
