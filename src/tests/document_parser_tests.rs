#[cfg(test)]
mod tests {
    use crate::implementations::document_parser::{ is_toc_line, match_title, DocumentParser };
    use crate::models::checkpoint::{ Automation, Checkpoint, CheckpointRecord, SectionKind };
    use crate::tests::{ setup, SAMPLE_BENCHMARK };

    fn parse_sample() -> Vec<Checkpoint> {
        setup();
        DocumentParser::new().parse(SAMPLE_BENCHMARK)
    }

    #[test]
    fn test_match_title() {
        let (id, title) = match_title(
            "1.1.1.1 Ensure cramfs kernel module is not available (Automated)"
        ).expect("title should match");
        assert_eq!(id, "1.1.1.1");
        assert_eq!(title, "Ensure cramfs kernel module is not available (Automated)");

        assert!(match_title("5.2.4 Ensure sshd access is configured (Manual)").is_some());
        // A single-segment number is a chapter, not a checkpoint
        assert!(match_title("1 Initial Setup (Manual)").is_none());
        assert!(match_title("1.1.1.1 Ensure cramfs kernel module is not available").is_none());
    }

    #[test]
    fn test_toc_lines_are_recognized() {
        assert!(is_toc_line("1.1.1.1 Ensure cramfs is disabled (Automated) ........ 17"));
        assert!(is_toc_line("  1.1 Filesystem ..................... 12"));
        assert!(!is_toc_line("Recommendations ..................... 5"));
        assert!(!is_toc_line("expect output ...... 5"));
        assert!(!is_toc_line("1.1.1.1 Ensure cramfs is disabled (Automated)"));
    }

    #[test]
    fn test_parse_finds_checkpoints_in_order() {
        let checkpoints = parse_sample();
        let ids: Vec<&str> = checkpoints.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["1.1.1.1", "1.1.1.2"], "ToC entries and headings must not become checkpoints");
        assert_eq!(checkpoints[0].automation(), Some(Automation::Automated));
    }

    #[test]
    fn test_sections_are_kept_verbatim() {
        let checkpoints = parse_sample();
        let cramfs = &checkpoints[0];

        assert_eq!(
            cramfs.section(SectionKind::ProfileApplicability),
            " Level 1 - Server\n Level 1 - Workstation"
        );
        let audit = cramfs.section(SectionKind::Audit);
        assert!(audit.starts_with("Run the following script to verify:\n#!/usr/bin/env bash\n{"));
        assert!(audit.ends_with("  fi\n}"));
        assert_eq!(cramfs.section(SectionKind::References), "1. NIST SP 800-53 Rev. 5: CM-7");
        assert_eq!(
            cramfs.section(SectionKind::CisControls),
            "v8 4.8 Uninstall or Disable Unnecessary Services"
        );
    }

    #[test]
    fn test_inline_header_text_starts_the_section() {
        let checkpoints = parse_sample();
        assert_eq!(
            checkpoints[1].section(SectionKind::Remediation),
            "Unload the module:\n# modprobe -r freevxfs"
        );
    }

    #[test]
    fn test_missing_sections_are_empty() {
        let checkpoints = parse_sample();
        let freevxfs = &checkpoints[1];
        assert_eq!(freevxfs.section(SectionKind::Rationale), "");
        assert_eq!(freevxfs.section(SectionKind::References), "");

        let text = "2.1.1 Ensure time sync is in use (Automated)\nProfile Applicability:\n";
        let parsed = DocumentParser::new().parse(text);
        assert_eq!(parsed.len(), 1);
        assert!(parsed[0].sections.is_empty(), "Header without text yields no section");
    }

    #[test]
    fn test_repeated_header_appends() {
        let text = concat!(
            "3.1.1 Ensure IPv6 status is identified (Manual)\n",
            "Profile Applicability:\n",
            " Level 1 - Server\n",
            "Audit:\n",
            "First part.\n",
            "Audit:\n",
            "Second part.\n"
        );
        let parsed = DocumentParser::new().parse(text);
        assert_eq!(parsed[0].section(SectionKind::Audit), "First part.\nSecond part.");
    }

    #[test]
    fn test_body_lines_ending_in_a_leader_are_kept() {
        let text = concat!(
            "1.2.1 Contents ........................ 3\n",
            "3.1.1 Ensure IPv6 status is identified (Manual)\n",
            "Profile Applicability:\n",
            " Level 1 - Server\n",
            "Audit:\n",
            "Run the check and expect output ...... 5\n",
            "Remediation:\n",
            "None.\n"
        );
        let parsed = DocumentParser::new().parse(text);
        assert_eq!(parsed.len(), 1);
        assert_eq!(
            parsed[0].section(SectionKind::Audit),
            "Run the check and expect output ...... 5"
        );
    }

    #[test]
    fn test_json_required_and_optional_fields() {
        let checkpoints = parse_sample();
        let json = DocumentParser::new().to_json(&checkpoints).expect("serializes");
        let value: serde_json::Value = serde_json::from_str(&json).expect("valid JSON");

        let second = &value[1];
        for field in ["name", "id", "description", "rationale", "audit", "remediation", "references"] {
            assert!(second.get(field).is_some(), "required field {} missing", field);
        }
        assert_eq!(second["rationale"], "");
        assert!(second.get("impact").is_none(), "empty optional field must be omitted");
        assert!(second.get("profile_applicability").is_some());
        assert!(value[0].get("cis_controls").is_some());
    }

    #[test]
    fn test_json_round_trip() {
        let parser = DocumentParser::new();
        let checkpoints = parse_sample();
        let json = parser.to_json(&checkpoints).expect("serializes");

        let records: Vec<CheckpointRecord> = serde_json::from_str(&json).expect("deserializes");
        let restored: Vec<Checkpoint> = records.into_iter().map(Checkpoint::from).collect();
        assert_eq!(restored, checkpoints);
    }

    #[test]
    fn test_parse_is_idempotent() {
        let parser = DocumentParser::new();
        let first = parser.to_json(&parser.parse(SAMPLE_BENCHMARK)).expect("serializes");
        let second = parser.to_json(&parser.parse(SAMPLE_BENCHMARK)).expect("serializes");
        assert_eq!(first, second);
    }

    #[test]
    fn test_index_lists_each_id_once() {
        let mut text = SAMPLE_BENCHMARK.to_string();
        text.push_str("\n1.1.1.1 Ensure cramfs kernel module is not available (Automated)\nProfile Applicability:\n Level 2\n");
        let index = DocumentParser::new().index(&text);
        assert_eq!(
            index,
            vec![
                ("1.1.1.1".to_string(), "Ensure cramfs kernel module is not available (Automated)".to_string()),
                ("1.1.1.2".to_string(), "Ensure freevxfs kernel module is not available (Automated)".to_string())
            ]
        );
    }

    #[test]
    fn test_playbook_file_name() {
        let checkpoint = Checkpoint::new("1.1.1.1", "Ensure cramfs is disabled (Automated)");
        assert_eq!(checkpoint.playbook_file_name(), "cis_audit_1_1_1_1.yml");
    }
}
