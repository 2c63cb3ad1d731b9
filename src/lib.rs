//! CQA short-description validation, shortdesc rewriting, and JTBD mapping for
//! AsciiDoc documentation repos.

mod audit;
mod batch;
mod discovery;
mod error;
mod jtbd;
mod lint;
mod locate;
mod rewrite;
mod rules;
mod types;

#[cfg(test)]
mod test_support;

pub use audit::{
    check_shortdesc, check_shortdesc_length, check_text_between_includes, count_procedure_steps,
    validate_assembly, validate_document, validate_module,
};
pub use batch::{
    Batch, Change, ChangeKind, FileError, FileReport, FixSummary, JtbdSummary, ValidationSummary,
};
pub use discovery::{find_documents, find_root, find_root_from, rel_path};
pub use error::CqaError;
pub use jtbd::{
    load_mapping, AssemblyRef, JobEntry, Mapping, MappingSupport, PathIndex, Resolver, TargetKind,
};
pub use lint::{
    fix_finding, load_findings, parse_findings, render_report, Finding, Findings, FixOutcome,
    LintFixer, LintSummary,
};
pub use locate::{fold_lines, locate, Located, Span};
pub use rewrite::{fit_shortdesc, insert, normalize_existing, rewrite, truncate_at_word};
pub use rules::{Rules, ROLE_ABSTRACT, STAMP_PREFIX};
pub use types::{is_assembly_file, Check, ContentType, CqaConfig, Violation};

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const REPORT_STATEMENT_CHARS: usize = 80;

#[derive(Debug, Clone, Default)]
pub struct ValidateOptions {
    pub docs_dir: Option<PathBuf>,
    pub mapping: Option<PathBuf>,
    pub json: bool,
    pub fix_shortdesc: bool,
    pub jtbd_only: bool,
    pub report_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct FixOptions {
    pub docs_dir: Option<PathBuf>,
    pub dry_run: bool,
    /// YAML map of repo-relative path to abstract text.
    pub shortdescs: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct JtbdOptions {
    pub docs_dir: Option<PathBuf>,
    pub mapping: Option<PathBuf>,
    pub dry_run: bool,
    pub report: bool,
    pub topics: bool,
}

#[derive(Debug, Clone, Default)]
pub struct LintOptions {
    pub docs_dir: Option<PathBuf>,
    /// Path handed to the linter, relative to the root.
    pub target: String,
    pub dry_run: bool,
    pub auto_fix: bool,
    pub report_only: bool,
    pub refresh: bool,
    pub output: PathBuf,
}

fn resolve_root(config: &CqaConfig, root_override: Option<&Path>) -> PathBuf {
    match root_override {
        Some(p) => p.to_path_buf(),
        None => find_root(config),
    }
}

fn mapping_path(root: &Path, config: &CqaConfig, mapping_override: Option<&Path>) -> PathBuf {
    match mapping_override {
        Some(p) => p.to_path_buf(),
        None => root.join(config.mapping_path),
    }
}

/// Validate every document under the root.
///
/// Returns `Ok(true)` when every document passed.
pub fn run_validate(config: &CqaConfig, opts: &ValidateOptions) -> Result<bool> {
    let root = resolve_root(config, opts.docs_dir.as_deref());
    let rules = Rules::new(config);
    let batch = Batch::new(&root, config, &rules, true);

    if opts.jtbd_only {
        let support = MappingSupport::load(&mapping_path(&root, config, opts.mapping.as_deref()));
        if let Some(mapping) = support.mapping() {
            let index = PathIndex::build(mapping);
            for rel in batch.mapped_documents(&index) {
                println!("MAPPED: {}", rel);
            }
            println!("\nJTBD jobs: {}", mapping.jobs.len());
        }
        return Ok(true);
    }

    let summary = batch.validate();
    let report_path = opts
        .report_file
        .clone()
        .unwrap_or_else(|| root.join(config.report_path));
    summary
        .write_report(&report_path)
        .with_context(|| format!("writing {}", report_path.display()))?;

    if opts.json {
        println!("{}", summary.to_json()?);
        return Ok(summary.is_clean());
    }

    for report in &summary.failed {
        println!("{}", report.path);
        for v in &report.errors {
            println!("  - [{}] {}", v.check, v.message);
        }
    }
    if summary.is_clean() {
        println!("All {} checked files passed CQA 2.1 checks.", summary.passed);
    } else {
        println!(
            "\nTotal: {} passed, {} failed",
            summary.passed,
            summary.failed.len()
        );
    }

    if opts.fix_shortdesc {
        let needing: Vec<_> = summary
            .failed
            .iter()
            .filter(|r| r.needs_shortdesc_fix())
            .collect();
        if !needing.is_empty() {
            println!("\nFiles needing shortdesc fixes:");
            for report in needing {
                println!("  {}", report.path);
            }
        }
    }

    Ok(summary.is_clean())
}

/// Insert abstracts from the shortdesc table and bring existing ones within bounds.
///
/// Returns `Ok(true)` when no document failed to read or write and no shortdesc
/// violation is left.
pub fn run_fix_shortdesc(config: &CqaConfig, opts: &FixOptions) -> Result<bool> {
    let root = resolve_root(config, opts.docs_dir.as_deref());
    let rules = Rules::new(config);
    let table: BTreeMap<String, String> = match &opts.shortdescs {
        Some(path) => jtbd::read_yaml(path)
            .with_context(|| format!("loading shortdesc table {}", path.display()))?,
        None => BTreeMap::new(),
    };

    let summary = Batch::new(&root, config, &rules, opts.dry_run).fix_shortdesc(&table);
    for change in &summary.changes {
        let label = match change.kind {
            ChangeKind::Fixed => "Fixed:",
            ChangeKind::Shortened => "Shortened:",
            ChangeKind::Expanded => "Expanded:",
            ChangeKind::Assembly | ChangeKind::Topic => continue,
        };
        println!("{} {}", label, change.path);
    }
    for e in &summary.errors {
        eprintln!("Error: {}: {}", e.path, e.message);
    }
    println!("Total changes: {}", summary.changes.len());
    if !summary.unfixed.is_empty() {
        println!("\nStill failing shortdesc checks:");
        for u in &summary.unfixed {
            println!("  {}: {}", u.path, u.message);
        }
    }

    Ok(summary.is_clean())
}

/// Stamp mapped documents and rewrite assembly shortdescs from their jobs.
///
/// Returns `Ok(true)` when there were no conflicts and no I/O failures.
pub fn run_apply_jtbd(config: &CqaConfig, opts: &JtbdOptions) -> Result<bool> {
    let root = resolve_root(config, opts.docs_dir.as_deref());
    let path = mapping_path(&root, config, opts.mapping.as_deref());
    let mapping = match MappingSupport::load(&path) {
        MappingSupport::Available(mapping) => mapping,
        MappingSupport::Unavailable(reason) => {
            return Err(CqaError::MappingUnavailable { reason }.into());
        }
    };

    if opts.report {
        print_mapping(&mapping);
        return Ok(true);
    }

    let rules = Rules::new(config);
    let summary = Batch::new(&root, config, &rules, opts.dry_run).apply_jtbd(&mapping, opts.topics);

    let prefix = if opts.dry_run { "[dry-run] " } else { "" };
    for missing in &summary.missing {
        eprintln!("Skip (missing): {}", missing);
    }
    for (path, jobs) in &summary.conflicts {
        eprintln!("Conflict: {} is mapped by jobs {}", path, jobs.join(", "));
    }
    for change in &summary.changes {
        let what = match change.kind {
            ChangeKind::Assembly => "assembly",
            ChangeKind::Topic => "topic",
            _ => continue,
        };
        println!(
            "{}Updated {}: {} (job: {})",
            prefix,
            what,
            change.path,
            change.job.as_deref().unwrap_or_default()
        );
    }
    for e in &summary.errors {
        eprintln!("Error: {}: {}", e.path, e.message);
    }
    println!(
        "\nDone. Assemblies updated: {}; Topics updated: {}",
        summary.count(ChangeKind::Assembly),
        summary.count(ChangeKind::Topic)
    );

    Ok(summary.conflicts.is_empty() && summary.errors.is_empty())
}

fn print_mapping(mapping: &Mapping) {
    for job in &mapping.jobs {
        println!("\nJob: {}", job.id);
        let statement: String = job.statement.chars().take(REPORT_STATEMENT_CHARS).collect();
        println!("  Statement: {}...", statement);
        for assembly in &job.assemblies {
            println!("  Assembly: {}", assembly.path());
        }
        for topic in &job.topics {
            println!("  Topic: {}", topic);
        }
    }
}

/// Apply mechanical fixes from prose-linter findings and write the text report.
///
/// Returns `Ok(true)` when nothing is left for manual review.
pub fn run_lint_fix(config: &CqaConfig, opts: &LintOptions) -> Result<bool> {
    let root = resolve_root(config, opts.docs_dir.as_deref());
    let findings = load_findings(&root, &opts.target, opts.refresh);
    if findings.is_empty() {
        println!("No linter findings.");
        return Ok(true);
    }

    let dry_run = opts.dry_run || opts.report_only || !opts.auto_fix;
    let summary = LintFixer::new(&root, dry_run).fix_all(&findings);
    let report = render_report(&summary);

    let output = if opts.output.is_absolute() {
        opts.output.clone()
    } else {
        root.join(&opts.output)
    };
    std::fs::write(&output, &report)
        .with_context(|| format!("writing {}", output.display()))?;
    println!("{}", report);
    println!("Report saved to: {}", output.display());
    if dry_run && summary.fixed() > 0 {
        println!("Dry run: {} fixes not written (use --auto-fix)", summary.fixed());
    }

    Ok(summary.manual_review.is_empty())
}
