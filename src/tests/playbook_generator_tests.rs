#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use crate::config::WorkflowOptions;
    use crate::implementations::config::{ render_template, GeneratorConfig };
    use crate::implementations::llm::strip_code_fences;
    use crate::implementations::mock::MockLlmClient;
    use crate::implementations::playbook_generator::{
        fix_yaml_special_chars,
        postprocess_playbook,
        save_playbook,
        PlaybookGenerator,
    };
    use crate::models::checkpoint::{ Checkpoint, SectionKind };
    use crate::models::requirement::RequirementSet;
    use crate::tests::setup;

    fn checkpoint() -> Checkpoint {
        let mut checkpoint = Checkpoint::new(
            "1.1.1.2",
            "Ensure freevxfs kernel module is not available (Automated)"
        );
        checkpoint.sections.insert(SectionKind::Audit, "# lsmod | grep freevxfs".to_string());
        checkpoint.sections.insert(SectionKind::Remediation, "# modprobe -r freevxfs".to_string());
        checkpoint
    }

    fn requirements() -> RequirementSet {
        RequirementSet {
            checkpoint_id: "1.1.1.2".to_string(),
            objective: "Verify the freevxfs module is not loaded".to_string(),
            requirements: vec![
                "Run `lsmod | grep freevxfs`. Rationale: PASS when nothing is returned.".to_string()
            ],
            directives: vec!["Never change system state.".to_string()],
        }
    }

    #[test]
    fn test_regex_in_double_quotes_becomes_block_scalar() {
        let playbook = concat!(
            "    - name: Check sshd\n",
            "      shell: \"grep -E '^\\s*PermitRootLogin\\s+no' /etc/ssh/sshd_config\"\n",
            "      register: req_1\n"
        );
        let fixed = fix_yaml_special_chars(playbook);
        assert_eq!(
            fixed,
            concat!(
                "    - name: Check sshd\n",
                "      shell: |\n",
                "        grep -E '^\\s*PermitRootLogin\\s+no' /etc/ssh/sshd_config\n",
                "      register: req_1\n"
            )
        );
    }

    #[test]
    fn test_valid_escapes_are_left_alone() {
        let playbook = "      msg: \"line one\\nline two\\t\\\"quoted\\\"\"\n";
        assert_eq!(fix_yaml_special_chars(playbook), playbook);

        let plain = "      shell: lsmod | grep freevxfs\n";
        assert_eq!(fix_yaml_special_chars(plain), plain);
    }

    #[test]
    fn test_block_scalars_and_raw_bodies_are_left_alone() {
        let playbook = concat!(
            "    - name: Check sshd\n",
            "      shell: |\n",
            "        echo: \"\\s+found\"\n",
            "\n",
            "        grep -E '^\\s*Port' /etc/ssh/sshd_config\n",
            "      register: req_1\n",
            "    - name: Check modules\n",
            "      shell: >-\n",
            "        line: \"\\d+\"\n",
            "      args:\n",
            "        cmd: {% raw %}\n",
            "          pattern: \"\\s*\"\n",
            "        {% endraw %}\n"
        );
        assert_eq!(fix_yaml_special_chars(playbook), playbook);

        // Keys after the block closes are still rewritten
        let after = concat!(
            "      shell: |\n",
            "        echo ok\n",
            "      stdout_pattern: \"^\\s*ok\"\n"
        );
        assert!(fix_yaml_special_chars(after).contains("      stdout_pattern: |\n        ^\\s*ok\n"));
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```yaml\n---\n- hosts: all\n```"), "---\n- hosts: all");
        assert_eq!(
            strip_code_fences("Here is the playbook:\n```\n- hosts: all\n```\nEnjoy."),
            "- hosts: all"
        );
        assert_eq!(strip_code_fences("  - hosts: all  "), "- hosts: all");
        assert_eq!(postprocess_playbook("```yaml\n- hosts: all\n```"), "- hosts: all\n");
    }

    #[test]
    fn test_first_attempt_prompt_has_no_feedback() {
        let llm = MockLlmClient::new();
        let config = GeneratorConfig::default();
        let options = WorkflowOptions::default();
        let generator = PlaybookGenerator::new(&llm, &config, &options);

        let list = requirements().for_attempt(&[]);
        let prompt = generator.build_prompt(&checkpoint(), &list, Some("- hosts: old")).unwrap();

        assert!(prompt.contains("1.1.1.2"));
        assert!(prompt.contains("1. Run `lsmod | grep freevxfs`."));
        assert!(prompt.contains("- Never change system state."));
        assert!(prompt.contains("# modprobe -r freevxfs"));
        assert!(prompt.contains("become_user: root"));
        assert!(!prompt.contains("Previous playbook"));
        assert!(!prompt.contains("{{feedback}}"));
    }

    #[test]
    fn test_retry_prompt_carries_feedback_and_previous_playbook() {
        let llm = MockLlmClient::new();
        let config = GeneratorConfig::default();
        let options = WorkflowOptions::default();
        let generator = PlaybookGenerator::new(&llm, &config, &options);

        let feedback = vec![
            "CRITICAL FIX REQUIRED (syntax check, stage 1):\nbad indentation".to_string(),
            "CRITICAL FIX REQUIRED (execution check, stage 3):\nundefined variable".to_string()
        ];
        let list = requirements().for_attempt(&feedback);
        let previous = "- hosts: all\n  tasks: [{{ broken }}]";
        let prompt = generator.build_prompt(&checkpoint(), &list, Some(previous)).unwrap();

        assert!(prompt.contains("--- Attempt 1 ---\nCRITICAL FIX REQUIRED (syntax check, stage 1)"));
        assert!(prompt.contains("--- Attempt 2 ---"));
        assert!(prompt.contains("Previous playbook:"));
        // Jinja in the previous playbook is carried over untouched
        assert!(prompt.contains("[{{ broken }}]"));
    }

    #[tokio::test]
    async fn test_generate_cleans_the_answer() {
        setup();
        let llm = MockLlmClient::new();
        llm.add_response("```yaml\n---\n- name: Audit 1.1.1.2\n  hosts: all\n```");
        let config = GeneratorConfig::default();
        let options = WorkflowOptions::default();
        let generator = PlaybookGenerator::new(&llm, &config, &options);

        let playbook = generator
            .generate(&checkpoint(), &requirements().for_attempt(&[]), None).await
            .expect("generated");
        assert_eq!(playbook, "---\n- name: Audit 1.1.1.2\n  hosts: all\n");
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_answer_is_an_error() {
        let llm = MockLlmClient::with_default("```yaml\n```");
        let config = GeneratorConfig::default();
        let options = WorkflowOptions::default();
        let generator = PlaybookGenerator::new(&llm, &config, &options);

        let result = generator.generate(&checkpoint(), &requirements().for_attempt(&[]), None).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_save_playbook_creates_directory() {
        let dir = tempfile::tempdir().expect("temp dir");
        let output_dir = dir.path().join("playbooks");
        let path = save_playbook(&output_dir, "cis_audit_1_1_1_2.yml", "- hosts: all\n").unwrap();

        assert_eq!(path, output_dir.join("cis_audit_1_1_1_2.yml"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "- hosts: all\n");

        // a later attempt overwrites the same file
        save_playbook(&output_dir, "cis_audit_1_1_1_2.yml", "- hosts: localhost\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "- hosts: localhost\n");
    }

    #[test]
    fn test_render_template_is_single_pass() {
        let mut params = HashMap::new();
        params.insert("audit", "echo {{ item }} {{title}}".to_string());
        params.insert("title", "Ensure x".to_string());

        let rendered = render_template("{{title}}: {{audit}} {{missing}}", &params);
        assert_eq!(rendered, "Ensure x: echo {{ item }} {{title}} {{missing}}");
    }
}
