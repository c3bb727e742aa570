#[cfg(test)]
mod tests {
    use crate::errors::ForgeError;
    use crate::implementations::config::GeneratorConfig;
    use crate::implementations::document_parser::DocumentParser;
    use crate::implementations::mock::MockLlmClient;
    use crate::implementations::requirement_extractor::{
        classify_audit,
        parse_decomposition,
        strip_numbering,
        RequirementExtractor,
    };
    use crate::models::checkpoint::{ Checkpoint, SectionKind };
    use crate::models::requirement::AuditProcedure;
    use crate::tests::{ setup, SAMPLE_BENCHMARK };

    fn sample(id: &str) -> Checkpoint {
        DocumentParser::new()
            .parse(SAMPLE_BENCHMARK)
            .into_iter()
            .find(|c| c.id == id)
            .expect("sample checkpoint")
    }

    #[test]
    fn test_strip_numbering() {
        assert_eq!(strip_numbering("2. Check that cramfs is not loaded"), "Check that cramfs is not loaded");
        assert_eq!(strip_numbering("3) Verify the module is blacklisted"), "Verify the module is blacklisted");
        assert_eq!(strip_numbering("- Verify owner"), "Verify owner");
        assert_eq!(strip_numbering("Verify 2.5 settings"), "Verify 2.5 settings");
    }

    #[test]
    fn test_classify_script_audit() {
        let audit = "Run the following script to verify:\n#!/usr/bin/env bash\n{\n  echo \"** PASS **\"\n}\nNote: run as root.";
        match classify_audit(audit) {
            AuditProcedure::Script(script) => {
                assert_eq!(script, "#!/usr/bin/env bash\n{\n  echo \"** PASS **\"\n}");
            }
            AuditProcedure::Prose => panic!("expected a script"),
        }

        let braced = "Run the following:\n{\n  l_output=\"\"\n  echo \"$l_output\"\n}";
        assert!(matches!(classify_audit(braced), AuditProcedure::Script(_)));
    }

    #[test]
    fn test_classify_prose_audit() {
        let audit = "Run the following command and verify that nothing is returned:\n# lsmod | grep freevxfs";
        assert_eq!(classify_audit(audit), AuditProcedure::Prose);

        // inline braces are not a script block
        let awk = "# awk -F: '{print $1}' /etc/passwd\nVerify no output is returned";
        assert_eq!(classify_audit(awk), AuditProcedure::Prose);
    }

    #[test]
    fn test_parse_decomposition() {
        let answer = "```json\n{\"objective\": \"Verify freevxfs is unavailable\", \"requirements\": [\"1. Run lsmod | grep freevxfs and expect no output. Rationale: PASS when nothing is returned, FAIL otherwise.\", \"2. Check modprobe configuration\"]}\n```";
        let (objective, requirements) = parse_decomposition(answer).expect("parses");

        assert_eq!(objective, "Verify freevxfs is unavailable");
        assert_eq!(requirements.len(), 2);
        assert!(requirements[0].starts_with("Run lsmod"));
        assert_eq!(requirements[0].matches("Rationale:").count(), 1);
        assert!(requirements[1].starts_with("Check modprobe configuration Rationale:"));
    }

    #[test]
    fn test_parse_decomposition_rejects_garbage() {
        assert!(parse_decomposition("I cannot help with that.").is_none());
        assert!(parse_decomposition("{\"objective\": \"x\", \"requirements\": []}").is_none());
    }

    #[tokio::test]
    async fn test_script_audit_yields_single_requirement_without_llm() {
        setup();
        let llm = MockLlmClient::new();
        let config = GeneratorConfig::default();
        let checkpoint = sample("1.1.1.1");

        let set = RequirementExtractor::new(&llm, &config).extract(&checkpoint).await.expect("extracts");

        assert_eq!(llm.call_count(), 0);
        assert_eq!(set.len(), 1);
        assert!(set.requirements[0].contains("l_mname=\"cramfs\""), "script must be embedded verbatim");
        assert!(set.requirements[0].contains("/tmp/cis_audit_1_1_1_1.sh"));
        assert_eq!(set.directives.len(), 4);
        assert!(set.directives.iter().any(|d| d.contains("Generate compliance report")));
    }

    #[tokio::test]
    async fn test_prose_audit_is_decomposed() {
        setup();
        let llm = MockLlmClient::new();
        llm.add_response(
            r#"{"objective": "Verify freevxfs is not loaded", "requirements": ["Run lsmod | grep freevxfs. Rationale: PASS when empty, FAIL otherwise."]}"#
        );
        let config = GeneratorConfig::default();
        let checkpoint = sample("1.1.1.2");

        let set = RequirementExtractor::new(&llm, &config).extract(&checkpoint).await.expect("extracts");

        assert_eq!(set.checkpoint_id, "1.1.1.2");
        assert_eq!(set.objective, "Verify freevxfs is not loaded");
        assert_eq!(set.requirements.len(), 1);
        let prompts = llm.prompts();
        assert!(prompts[0].contains("# lsmod | grep freevxfs"), "audit text goes into the prompt");
    }

    #[tokio::test]
    async fn test_unparseable_answer_uses_fallback() {
        setup();
        let llm = MockLlmClient::with_default("Sorry, here are some thoughts instead of JSON.");
        let config = GeneratorConfig::default();
        let checkpoint = sample("1.1.1.2");

        let set = RequirementExtractor::new(&llm, &config).extract(&checkpoint).await.expect("extracts");
        assert_eq!(set.requirements.len(), 3);
        assert!(set.requirements.iter().all(|r| r.contains("Rationale:")));
    }

    #[tokio::test]
    async fn test_empty_audit_is_rejected() {
        let llm = MockLlmClient::new();
        let config = GeneratorConfig::default();
        let mut checkpoint = sample("1.1.1.2");
        checkpoint.sections.remove(&SectionKind::Audit);

        let result = RequirementExtractor::new(&llm, &config).extract(&checkpoint).await;
        assert!(matches!(result, Err(ForgeError::InvalidInput(_))));
    }

    #[test]
    fn test_each_attempt_gets_a_fresh_list() {
        let set = crate::models::requirement::RequirementSet {
            checkpoint_id: "1.1.1.2".to_string(),
            objective: "o".to_string(),
            requirements: vec!["first".to_string(), "second".to_string()],
            directives: vec![],
        };
        let feedback = vec!["fix syntax".to_string()];
        let retry = set.for_attempt(&feedback);
        let first = set.for_attempt(&[]);

        assert_eq!(retry.requirements, set.requirements);
        assert_eq!(retry.feedback, feedback);
        assert!(first.feedback.is_empty());
        assert_eq!(first.numbered(), "1. first\n2. second");
    }
}
