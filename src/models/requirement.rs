use serde::{ Deserialize, Serialize };

/// How the benchmark expresses the audit procedure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditProcedure {
    /// A self-contained shell script, kept verbatim
    Script(String),
    /// Prose with inline commands
    Prose,
}

/// Requirements derived once from a checkpoint's audit procedure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementSet {
    pub checkpoint_id: String,
    pub objective: String,
    /// Numbered audit requirements, in audit-procedure order
    pub requirements: Vec<String>,
    /// Structural rules every generated playbook must follow
    pub directives: Vec<String>,
}

/// The requirement list handed to one generation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementList {
    pub objective: String,
    pub requirements: Vec<String>,
    pub directives: Vec<String>,
    /// Feedback from every failed attempt so far, oldest first
    pub feedback: Vec<String>,
}

impl RequirementSet {
    /// Build a fresh list for an attempt. The base ordering is never touched.
    pub fn for_attempt(&self, feedback: &[String]) -> RequirementList {
        RequirementList {
            objective: self.objective.clone(),
            requirements: self.requirements.clone(),
            directives: self.directives.clone(),
            feedback: feedback.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.requirements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }
}

impl RequirementList {
    /// Requirements as a numbered block: `1. ...`
    pub fn numbered(&self) -> String {
        self.requirements
            .iter()
            .enumerate()
            .map(|(i, r)| format!("{}. {}", i + 1, r))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
