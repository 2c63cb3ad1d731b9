//! cqa-docs - CQA checks and JTBD rewriting for AsciiDoc documentation.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use cqa_docs::{CqaConfig, FixOptions, JtbdOptions, LintOptions, ValidateOptions};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(name = "cqa-docs")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate documents against the CQA short-description rules
    Validate {
        /// Repository root (contains docs/, assemblies/)
        #[arg(long)]
        docs_dir: Option<PathBuf>,

        /// Path to the JTBD mapping (default: docs/jtbd-mapping.yaml)
        #[arg(long)]
        mapping: Option<PathBuf>,

        /// Print the machine-readable summary
        #[arg(long)]
        json: bool,

        /// List files that need shortdesc fixes
        #[arg(long)]
        fix_shortdesc: bool,

        /// Only report JTBD mapping coverage (no CQA checks)
        #[arg(long)]
        jtbd_only: bool,

        /// Where to write the JSON report (default: cqa_report.json under the root)
        #[arg(long)]
        report_file: Option<PathBuf>,
    },

    /// Insert missing abstracts and bring existing ones within the length bounds
    FixShortdesc {
        #[arg(long)]
        docs_dir: Option<PathBuf>,

        /// Report changes without writing
        #[arg(long)]
        dry_run: bool,

        /// YAML map of repo-relative path to abstract text
        #[arg(long)]
        shortdescs: Option<PathBuf>,
    },

    /// Stamp mapped documents and rewrite assembly abstracts from their jobs
    ApplyJtbd {
        #[arg(long)]
        docs_dir: Option<PathBuf>,

        #[arg(long)]
        mapping: Option<PathBuf>,

        #[arg(long)]
        dry_run: bool,

        /// Only print the job to path mapping
        #[arg(long)]
        report: bool,

        /// Also stamp topic files
        #[arg(long)]
        topics: bool,
    },

    /// Apply mechanical fixes from prose-linter findings
    LintFix {
        /// Path handed to the linter
        #[arg(default_value = "docs/")]
        path: String,

        #[arg(long)]
        docs_dir: Option<PathBuf>,

        #[arg(long)]
        dry_run: bool,

        /// Write fixes to the documents
        #[arg(long)]
        auto_fix: bool,

        /// Only generate the report
        #[arg(long)]
        report_only: bool,

        /// Re-run the linter instead of reading its cached output
        #[arg(long)]
        refresh: bool,

        /// Report file
        #[arg(long, default_value = "vale_report.txt")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = CqaConfig::mta();
    let clean = match cli.command {
        Commands::Validate {
            docs_dir,
            mapping,
            json,
            fix_shortdesc,
            jtbd_only,
            report_file,
        } => cqa_docs::run_validate(
            &config,
            &ValidateOptions {
                docs_dir,
                mapping,
                json,
                fix_shortdesc,
                jtbd_only,
                report_file,
            },
        )?,
        Commands::FixShortdesc {
            docs_dir,
            dry_run,
            shortdescs,
        } => cqa_docs::run_fix_shortdesc(
            &config,
            &FixOptions {
                docs_dir,
                dry_run,
                shortdescs,
            },
        )?,
        Commands::ApplyJtbd {
            docs_dir,
            mapping,
            dry_run,
            report,
            topics,
        } => cqa_docs::run_apply_jtbd(
            &config,
            &JtbdOptions {
                docs_dir,
                mapping,
                dry_run,
                report,
                topics,
            },
        )?,
        Commands::LintFix {
            path,
            docs_dir,
            dry_run,
            auto_fix,
            report_only,
            refresh,
            output,
        } => cqa_docs::run_lint_fix(
            &config,
            &LintOptions {
                docs_dir,
                target: path,
                dry_run,
                auto_fix,
                report_only,
                refresh,
                output,
            },
        )?,
    };

    if !clean {
        std::process::exit(1);
    }
    Ok(())
}
