use serde::{ Deserialize, Serialize };
use std::fmt;

/// Compliance verdict for one requirement or a whole checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComplianceStatus {
    Pass,
    Fail,
    NotApplicable,
    Unknown,
}

impl ComplianceStatus {
    /// Parse the playbook vocabulary: PASS, FAIL, NA, UNKNOWN
    pub fn from_report(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "PASS" => Some(ComplianceStatus::Pass),
            "FAIL" => Some(ComplianceStatus::Fail),
            "NA" | "N/A" => Some(ComplianceStatus::NotApplicable),
            "UNKNOWN" => Some(ComplianceStatus::Unknown),
            _ => None,
        }
    }

    /// Parse the analysis vocabulary: COMPLIANT, NON-COMPLIANT, NA, UNKNOWN
    pub fn from_analysis(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().replace('_', "-").as_str() {
            "COMPLIANT" => Some(ComplianceStatus::Pass),
            "NON-COMPLIANT" | "NONCOMPLIANT" => Some(ComplianceStatus::Fail),
            "NA" | "N/A" | "NOT APPLICABLE" => Some(ComplianceStatus::NotApplicable),
            "UNKNOWN" => Some(ComplianceStatus::Unknown),
            _ => None,
        }
    }

    pub fn report_label(&self) -> &'static str {
        match self {
            ComplianceStatus::Pass => "PASS",
            ComplianceStatus::Fail => "FAIL",
            ComplianceStatus::NotApplicable => "NA",
            ComplianceStatus::Unknown => "UNKNOWN",
        }
    }

    pub fn analysis_label(&self) -> &'static str {
        match self {
            ComplianceStatus::Pass => "COMPLIANT",
            ComplianceStatus::Fail => "NON-COMPLIANT",
            ComplianceStatus::NotApplicable => "NA",
            ComplianceStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ComplianceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.report_label())
    }
}
