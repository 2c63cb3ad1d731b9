//! Batch driver: apply validation and rewriting to every document in a repo.
//!
//! Per-document failures are recorded in the summaries and never stop the batch.

use crate::audit::{has_shortdesc_violation, validate_document};
use crate::discovery::{find_documents, rel_path};
use crate::error::{CqaError, Result};
use crate::jtbd::{DocTarget, Mapping, PathIndex, Resolver, TargetKind};
use crate::locate::locate;
use crate::rewrite::{insert, normalize_existing, rewrite};
use crate::rules::Rules;
use crate::types::{char_len, Check, CqaConfig, Violation};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Violations for one failing document.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: String,
    pub errors: Vec<Violation>,
}

impl FileReport {
    pub fn needs_shortdesc_fix(&self) -> bool {
        has_shortdesc_violation(&self.errors)
    }
}

#[derive(Debug, Default)]
pub struct ValidationSummary {
    pub passed: usize,
    pub failed: Vec<FileReport>,
}

#[derive(Serialize)]
struct ReportJson<'a> {
    passed: usize,
    failed_count: usize,
    failed: &'a [FileReport],
}

impl ValidationSummary {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Machine-readable summary: `passed`, `failed_count`, and per-file errors.
    pub fn to_json(&self) -> Result<String> {
        let report = ReportJson {
            passed: self.passed,
            failed_count: self.failed.len(),
            failed: &self.failed,
        };
        serde_json::to_string_pretty(&report).map_err(|e| CqaError::Report {
            detail: e.to_string(),
        })
    }

    /// Write the JSON summary to the report artifact.
    pub fn write_report(&self, path: &Path) -> Result<()> {
        write_document(path, &self.to_json()?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// A missing abstract was inserted from the shortdesc table.
    Fixed,
    Shortened,
    Expanded,
    /// An assembly got a JTBD stamp and, when resolvable, a job-focused shortdesc.
    Assembly,
    /// A topic got a JTBD stamp.
    Topic,
}

#[derive(Debug, Clone)]
pub struct Change {
    pub path: String,
    pub kind: ChangeKind,
    pub job: Option<String>,
}

/// A document the run could not finish, with the reason.
#[derive(Debug, Clone)]
pub struct FileError {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct FixSummary {
    pub changes: Vec<Change>,
    /// Documents whose shortdesc still fails validation after the fix.
    pub unfixed: Vec<FileError>,
    pub errors: Vec<FileError>,
}

impl FixSummary {
    pub fn is_clean(&self) -> bool {
        self.unfixed.is_empty() && self.errors.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct JtbdSummary {
    pub changes: Vec<Change>,
    /// Mapped paths with no file behind them.
    pub missing: Vec<String>,
    /// Paths claimed by more than one job; never rewritten.
    pub conflicts: Vec<(String, Vec<String>)>,
    pub errors: Vec<FileError>,
}

impl JtbdSummary {
    pub fn count(&self, kind: ChangeKind) -> usize {
        self.changes.iter().filter(|c| c.kind == kind).count()
    }
}

/// One run over a documentation repo.
pub struct Batch<'a> {
    root: &'a Path,
    config: &'a CqaConfig,
    rules: &'a Rules,
    dry_run: bool,
}

impl<'a> Batch<'a> {
    pub fn new(root: &'a Path, config: &'a CqaConfig, rules: &'a Rules, dry_run: bool) -> Self {
        Self {
            root,
            config,
            rules,
            dry_run,
        }
    }

    /// Validate every document. Read-only.
    pub fn validate(&self) -> ValidationSummary {
        let mut summary = ValidationSummary::default();
        for path in find_documents(self.root, self.config) {
            let rel = rel_path(&path, self.root);
            let errors = match read_document(&path) {
                Ok(text) => validate_document(&path, &text, self.rules),
                Err(e) => {
                    warn!("{}", e);
                    vec![Violation::new(Check::Read, e.to_string())]
                }
            };
            debug!(path = %rel, violations = errors.len(), "validated");
            if errors.is_empty() {
                summary.passed += 1;
            } else {
                summary.failed.push(FileReport { path: rel, errors });
            }
        }
        info!(
            passed = summary.passed,
            failed = summary.failed.len(),
            "validation finished"
        );
        summary
    }

    /// Documents that the mapping references and that exist under the root.
    pub fn mapped_documents(&self, index: &PathIndex<'_>) -> Vec<String> {
        let mapped: Vec<&str> = index.mapped_paths().collect();
        find_documents(self.root, self.config)
            .iter()
            .map(|p| rel_path(p, self.root))
            .filter(|rel| mapped.contains(&rel.as_str()))
            .collect()
    }

    /// Insert missing abstracts from `table`, then bring every other existing
    /// shortdesc within bounds. Shortdesc violations left afterwards are listed
    /// as unfixed.
    pub fn fix_shortdesc(&self, table: &BTreeMap<String, String>) -> FixSummary {
        let mut summary = FixSummary::default();
        let table: BTreeMap<String, &String> = table
            .iter()
            .map(|(rel, text)| (rel.trim_start_matches("./").to_string(), text))
            .collect();

        for (rel, shortdesc) in &table {
            let path = self.root.join(rel);
            if !path.is_file() {
                debug!(path = %rel, "shortdesc table entry has no file");
                continue;
            }
            self.fix_one(&path, rel, &mut summary, |text| {
                let inserted = insert(text, shortdesc, self.rules);
                normalize_existing(&inserted, self.rules)
            });
        }

        for path in find_documents(self.root, self.config) {
            let rel = rel_path(&path, self.root);
            if table.contains_key(&rel) {
                continue;
            }
            self.fix_one(&path, &rel, &mut summary, |text| normalize_existing(text, self.rules));
        }

        summary
    }

    fn fix_one<F: FnOnce(&str) -> String>(
        &self,
        path: &Path,
        rel: &str,
        summary: &mut FixSummary,
        fix: F,
    ) {
        let mut kind = ChangeKind::Fixed;
        let mut remaining = Vec::new();
        let result = self.transform(path, |text| {
            kind = fix_kind(text, self.rules);
            let updated = fix(text);
            remaining = validate_document(path, &updated, self.rules)
                .into_iter()
                .filter(|v| v.check == Check::Shortdesc)
                .map(|v| v.message)
                .collect();
            updated
        });
        let readable = result.is_ok();
        self.record(&mut summary.changes, &mut summary.errors, rel, result, kind, None);
        if readable && !remaining.is_empty() {
            debug!(path = %rel, "shortdesc still failing after fix");
            summary.unfixed.push(FileError {
                path: rel.to_string(),
                message: remaining.join("; "),
            });
        }
    }

    /// Stamp mapped documents and rewrite assembly shortdescs from their jobs.
    pub fn apply_jtbd(&self, mapping: &Mapping, include_topics: bool) -> JtbdSummary {
        let index = PathIndex::build(mapping);
        let resolver = Resolver::new(self.rules);
        let mut summary = JtbdSummary {
            conflicts: index
                .conflicts
                .iter()
                .map(|(path, jobs)| (path.clone(), jobs.clone()))
                .collect(),
            ..JtbdSummary::default()
        };

        for (rel, target) in &index.targets {
            if target.kind == TargetKind::Topic && !include_topics {
                continue;
            }
            let path = self.root.join(rel);
            if !path.is_file() {
                summary.missing.push(rel.clone());
                continue;
            }
            let (result, kind) = match target.kind {
                TargetKind::Assembly => (
                    self.transform(&path, |text| update_assembly(text, target, &resolver, self.rules)),
                    ChangeKind::Assembly,
                ),
                TargetKind::Topic => (
                    self.transform(&path, |text| resolver.stamp(text, target.job)),
                    ChangeKind::Topic,
                ),
            };
            let job = Some(target.job.id.clone());
            self.record(&mut summary.changes, &mut summary.errors, rel, result, kind, job);
        }

        summary
    }

    /// Read, transform, and write back when the text changed (unless dry-run).
    fn transform<F: FnOnce(&str) -> String>(&self, path: &Path, f: F) -> Result<bool> {
        let text = read_document(path)?;
        let updated = f(&text);
        if updated == text {
            return Ok(false);
        }
        if !self.dry_run {
            write_document(path, &updated)?;
        }
        Ok(true)
    }

    fn record(
        &self,
        changes: &mut Vec<Change>,
        errors: &mut Vec<FileError>,
        rel: &str,
        result: Result<bool>,
        kind: ChangeKind,
        job: Option<String>,
    ) {
        match result {
            Ok(true) => {
                debug!(path = %rel, ?kind, dry_run = self.dry_run, "changed");
                changes.push(Change {
                    path: rel.to_string(),
                    kind,
                    job,
                });
            }
            Ok(false) => {}
            Err(e) => {
                warn!("{}", e);
                errors.push(FileError {
                    path: rel.to_string(),
                    message: e.to_string(),
                });
            }
        }
    }
}

/// How a fix changed `before`: a new abstract, or a resized existing one.
fn fix_kind(before: &str, rules: &Rules) -> ChangeKind {
    match locate(before, rules).paragraph_text() {
        None => ChangeKind::Fixed,
        Some(current) if char_len(&current) < rules.shortdesc_min => ChangeKind::Expanded,
        Some(_) => ChangeKind::Shortened,
    }
}

fn update_assembly(text: &str, target: &DocTarget<'_>, resolver: &Resolver<'_>, rules: &Rules) -> String {
    let stamped = resolver.stamp(text, target.job);
    let found = locate(&stamped, rules);
    let has_marker = found.role_marker.is_some();
    let existing = found.paragraph_text();
    match resolver.resolve(target.job, target.focus, existing.as_deref()) {
        Some(candidate) if has_marker => rewrite(&stamped, &candidate, rules),
        Some(candidate) => insert(&stamped, &candidate, rules),
        None => stamped,
    }
}

pub fn read_document(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| CqaError::Read {
        path: path.to_path_buf(),
        source,
    })
}

pub fn write_document(path: &Path, text: &str) -> Result<()> {
    std::fs::write(path, text).map_err(|source| CqaError::Write {
        path: path.to_path_buf(),
        source,
    })
}
