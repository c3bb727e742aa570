use async_trait::async_trait;
use log::{ debug, info, warn };
use std::path::{ Path, PathBuf };
use std::process::Stdio;
use tokio::process::Command;

use crate::errors::{ ForgeError, ForgeResult };
use crate::models::execution::{ RunOptions, ToolOutput };
use crate::traits::playbook_runner::PlaybookRunner;

pub const NAVIGATOR: &str = "ansible-navigator";

/// Find ansible-navigator: explicit path, then `PATH`, then common virtualenvs
pub fn locate_navigator(configured: Option<&Path>) -> ForgeResult<PathBuf> {
    if let Some(path) = configured {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        warn!("Configured navigator path {} does not exist", path.display());
    }

    let mut candidates: Vec<PathBuf> = std::env
        ::var_os("PATH")
        .map(|paths| {
            std::env
                ::split_paths(&paths)
                .map(|dir| dir.join(NAVIGATOR))
                .collect()
        })
        .unwrap_or_default();
    candidates.push(PathBuf::from(".venv/bin").join(NAVIGATOR));
    candidates.push(PathBuf::from("venv/bin").join(NAVIGATOR));
    if let Some(home) = std::env::var_os("HOME") {
        candidates.push(PathBuf::from(home).join(".local/bin").join(NAVIGATOR));
    }

    candidates
        .into_iter()
        .find(|p| p.is_file())
        .ok_or_else(|| ForgeError::ExternalToolFailure {
            tool: NAVIGATOR.to_string(),
            message: "executable not found in PATH or virtualenv".to_string(),
        })
}

/// Command-line arguments for one navigator run
pub fn navigator_args(playbook: &Path, options: &RunOptions) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        playbook.display().to_string(),
        "-i".to_string(),
        format!("{},", options.host),
        "-u".to_string(),
        options.remote_user.clone(),
        "-v".to_string()
    ];
    if options.syntax_only {
        args.push("--syntax-check".to_string());
    }
    if !options.skip_tags.is_empty() {
        args.push("--skip-tags".to_string());
        args.push(options.skip_tags.join(","));
    }
    args.push("--mode".to_string());
    args.push("stdout".to_string());
    args
}

/// Runs playbooks through `ansible-navigator` in stdout mode
pub struct AnsibleNavigator {
    executable: PathBuf,
}

impl AnsibleNavigator {
    pub fn new(executable: PathBuf) -> Self {
        Self { executable }
    }

    pub fn locate(configured: Option<&Path>) -> ForgeResult<Self> {
        let executable = locate_navigator(configured)?;
        info!("Using {}", executable.display());
        Ok(Self::new(executable))
    }
}

#[async_trait]
impl PlaybookRunner for AnsibleNavigator {
    async fn run(&self, playbook: &Path, options: &RunOptions) -> ForgeResult<ToolOutput> {
        let args = navigator_args(playbook, options);
        debug!("{} {}", self.executable.display(), args.join(" "));

        let child = Command::new(&self.executable)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ForgeError::ExternalToolFailure {
                tool: NAVIGATOR.to_string(),
                message: format!("failed to start: {}", e),
            })?;

        match tokio::time::timeout(options.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let result = ToolOutput {
                    exit_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                    timed_out: false,
                };
                debug!(
                    "{} exited with {:?} ({} bytes of output)",
                    NAVIGATOR,
                    result.exit_code,
                    result.stdout.len() + result.stderr.len()
                );
                Ok(result)
            }
            Ok(Err(e)) =>
                Err(ForgeError::ExternalToolFailure {
                    tool: NAVIGATOR.to_string(),
                    message: e.to_string(),
                }),
            Err(_) => {
                warn!("{} timed out after {}s", NAVIGATOR, options.timeout.as_secs());
                Ok(ToolOutput {
                    exit_code: None,
                    stdout: String::new(),
                    stderr: format!(
                        "Playbook run timed out after {} seconds",
                        options.timeout.as_secs()
                    ),
                    timed_out: true,
                })
            }
        }
    }

    fn name(&self) -> &str {
        NAVIGATOR
    }
}

fn is_status_line(trimmed: &str) -> bool {
    ["ok:", "changed:", "failed:", "fatal:", "skipping:", "...ignoring", "included:"]
        .iter()
        .any(|prefix| trimmed.starts_with(prefix))
}

/// Drop verbose per-task result bodies, keeping task headers, status lines,
/// the recap and the full compliance report task.
pub fn filter_verbose_task_output(output: &str) -> String {
    let mut kept = Vec::new();
    let mut in_report_task = false;
    let mut in_recap = false;

    for line in output.lines() {
        let trimmed = line.trim_start();

        if trimmed.starts_with("TASK [") || trimmed.starts_with("PLAY [") {
            in_report_task = trimmed.to_lowercase().contains("compliance report");
            in_recap = false;
            kept.push(line.to_string());
            continue;
        }
        if trimmed.starts_with("PLAY RECAP") {
            in_recap = true;
            in_report_task = false;
            kept.push(line.to_string());
            continue;
        }
        if in_recap || in_report_task {
            kept.push(line.to_string());
            continue;
        }
        if is_status_line(trimmed) {
            // fatal bodies carry the error message
            if trimmed.starts_with("fatal:") || trimmed.starts_with("failed:") {
                kept.push(line.to_string());
            } else if let Some(pos) = line.find(" => ") {
                kept.push(line[..pos].to_string());
            } else {
                kept.push(line.to_string());
            }
        }
    }

    kept.join("\n")
}
