use clap::{ Parser, Subcommand };
use std::path::PathBuf;

pub mod commands;
pub mod ui;

#[derive(Parser)]
#[command(
    name = "cisforge",
    about = "Turns CIS RHEL Benchmark checkpoints into validated Ansible compliance-audit playbooks",
    version,
    author,
    long_about = None
)]
pub struct ForgeCli {
    /// Sets the log level (error, warn, info, debug, trace)
    #[arg(short, long, global = true, default_value = "info")]
    pub log_level: String,

    /// Shorthand for --log-level debug
    #[arg(short, long, global = true, default_value = "false")]
    pub verbose: bool,

    /// Path to configuration file (YAML)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rejoin lines broken by PDF text extraction
    Repair {
        /// Benchmark text rendering
        #[arg(short, long)]
        input: PathBuf,

        /// Output file for the cleaned text
        #[arg(short, long)]
        output: PathBuf,

        /// Only drop page headers, keep line breaks as they are
        #[arg(long, default_value = "false")]
        no_repair: bool,
    },

    /// Parse benchmark text into checkpoint records (JSON)
    Parse {
        /// Benchmark text rendering
        #[arg(short, long)]
        input: PathBuf,

        /// Output file; prints to stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// List `<id> <title>` lines instead of JSON
        #[arg(long, default_value = "false")]
        id_only: bool,
    },

    /// Build the persisted embedding index of the benchmark text
    Index {
        /// Benchmark text rendering
        #[arg(short, long)]
        input: PathBuf,

        /// Output file for the index (JSON)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print the sections of one checkpoint
    Show {
        /// Checkpoint id, or a query starting with one
        #[arg(long)]
        checkpoint: String,

        /// Checkpoint records written by `parse`
        #[arg(long)]
        store: Option<PathBuf>,

        /// Embedding index written by `index`
        #[arg(long)]
        index: Option<PathBuf>,
    },

    /// Generate and validate audit playbooks
    Generate {
        /// Checkpoint ids to process, in order; prompts for ids when omitted
        #[arg(short, long, num_args = 1..)]
        checkpoint: Vec<String>,

        /// Process every checkpoint in the record store
        #[arg(long, default_value = "false")]
        all: bool,

        /// Checkpoint records written by `parse`
        #[arg(long)]
        store: Option<PathBuf>,

        /// Embedding index written by `index`
        #[arg(long)]
        index: Option<PathBuf>,

        /// Host the final playbook runs against
        #[arg(short, long, default_value = "localhost")]
        target_host: String,

        /// Host used while validating; defaults to the target host
        #[arg(long)]
        test_host: Option<String>,

        /// Privilege escalation user written into the playbook
        #[arg(short = 'u', long)]
        become_user: Option<String>,

        /// Attempts per checkpoint; defaults to max(requirements, 3)
        #[arg(long)]
        max_retries: Option<u32>,

        /// Do not run the validated playbook on the target host
        #[arg(long, default_value = "false")]
        skip_execution: bool,

        /// Accept extracted requirements without review
        #[arg(long, default_value = "false")]
        no_interactive: bool,

        /// Directory for generated playbooks
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Playbook file name (single checkpoint only)
        #[arg(short, long)]
        filename: Option<String>,
    },
}
