//! JTBD mapping: load the job-to-document mapping, derive job-focused shortdescs,
//! and stamp provenance comments into documents.

use crate::error::{CqaError, Result};
use crate::locate::{fold_lines, locate};
use crate::rewrite::truncate_at_word;
use crate::rules::{Rules, STAMP_PREFIX};
use crate::types::char_len;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

const STATEMENT_MARKER: &str = " so I can ";
const STATEMENT_LEAD: &str = "So you can ";

/// Top-level mapping document. `jobs` is required.
#[derive(Debug, Clone, Deserialize)]
pub struct Mapping {
    pub jobs: Vec<JobEntry>,
}

/// One job and the documents it drives.
#[derive(Debug, Clone, Deserialize)]
pub struct JobEntry {
    pub id: String,
    #[serde(default)]
    pub statement: String,
    #[serde(default)]
    pub persona: String,
    #[serde(default)]
    pub outcomes: Vec<String>,
    #[serde(default)]
    pub assemblies: Vec<AssemblyRef>,
    #[serde(default)]
    pub topics: Vec<String>,
}

/// An assembly listed either as a bare path or with a shortdesc override.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AssemblyRef {
    Path(String),
    Detailed {
        path: String,
        #[serde(default)]
        shortdesc_focus: Option<String>,
    },
}

impl AssemblyRef {
    pub fn path(&self) -> &str {
        match self {
            Self::Path(path) | Self::Detailed { path, .. } => path,
        }
    }

    pub fn shortdesc_focus(&self) -> Option<&str> {
        match self {
            Self::Path(_) => None,
            Self::Detailed { shortdesc_focus, .. } => shortdesc_focus.as_deref(),
        }
    }
}

/// Whether JTBD-driven rewriting can run in this process.
#[derive(Debug, Clone)]
pub enum MappingSupport {
    Available(Mapping),
    Unavailable(String),
}

impl MappingSupport {
    /// Load the mapping at `path`, degrading to `Unavailable` on any failure.
    pub fn load(path: &Path) -> Self {
        if !path.is_file() {
            let reason = format!("mapping not found: {}", path.display());
            warn!("{}", reason);
            return Self::Unavailable(reason);
        }
        match load_mapping(path) {
            Ok(mapping) => {
                debug!("loaded {} JTBD jobs from {}", mapping.jobs.len(), path.display());
                Self::Available(mapping)
            }
            Err(e) => {
                warn!("JTBD resolver disabled: {}", e);
                Self::Unavailable(e.to_string())
            }
        }
    }

    pub fn mapping(&self) -> Option<&Mapping> {
        match self {
            Self::Available(mapping) => Some(mapping),
            Self::Unavailable(_) => None,
        }
    }
}

/// Parse a JTBD mapping file.
pub fn load_mapping(path: &Path) -> Result<Mapping> {
    read_yaml(path)
}

/// Read and deserialize a YAML file.
#[cfg(feature = "jtbd")]
pub fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).map_err(|source| CqaError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&text).map_err(|e| CqaError::MappingParse {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

/// Read and deserialize a YAML file.
#[cfg(not(feature = "jtbd"))]
pub fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    Err(CqaError::MappingUnavailable {
        reason: format!(
            "cannot read {}: built without the `jtbd` feature",
            path.display()
        ),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Assembly,
    Topic,
}

/// A document's assignment to a job.
#[derive(Debug, Clone)]
pub struct DocTarget<'m> {
    pub job: &'m JobEntry,
    pub kind: TargetKind,
    pub focus: Option<&'m str>,
}

/// Repo-relative path to job assignment, with double assignments set aside.
#[derive(Debug, Default)]
pub struct PathIndex<'m> {
    pub targets: BTreeMap<String, DocTarget<'m>>,
    /// Paths claimed by more than one job, with every claiming job id.
    pub conflicts: BTreeMap<String, Vec<String>>,
}

impl<'m> PathIndex<'m> {
    pub fn build(mapping: &'m Mapping) -> Self {
        let mut index = PathIndex::default();
        for job in &mapping.jobs {
            for assembly in &job.assemblies {
                index.assign(assembly.path(), job, TargetKind::Assembly, assembly.shortdesc_focus());
            }
            for topic in &job.topics {
                index.assign(topic, job, TargetKind::Topic, None);
            }
        }
        for (path, jobs) in &index.conflicts {
            warn!("{} is mapped to more than one job ({}); skipping it", path, jobs.join(", "));
        }
        index
    }

    fn assign(&mut self, raw: &str, job: &'m JobEntry, kind: TargetKind, focus: Option<&'m str>) {
        let path = normalize_rel(raw);
        if path.is_empty() {
            return;
        }
        if let Some(jobs) = self.conflicts.get_mut(&path) {
            if !jobs.contains(&job.id) {
                jobs.push(job.id.clone());
            }
            return;
        }
        match self.targets.get(&path) {
            Some(existing) if existing.job.id != job.id => {
                let first = existing.job.id.clone();
                self.targets.remove(&path);
                self.conflicts.insert(path, vec![first, job.id.clone()]);
            }
            Some(_) => {}
            None => {
                self.targets.insert(path, DocTarget { job, kind, focus });
            }
        }
    }

    /// Every path the mapping mentions, conflicting or not.
    pub fn mapped_paths(&self) -> impl Iterator<Item = &str> {
        self.targets
            .keys()
            .chain(self.conflicts.keys())
            .map(String::as_str)
    }
}

fn normalize_rel(raw: &str) -> String {
    raw.trim().trim_start_matches("./").replace('\\', "/")
}

/// Derives job-focused shortdescs and stamps provenance blocks.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'r> {
    rules: &'r Rules,
}

impl<'r> Resolver<'r> {
    pub fn new(rules: &'r Rules) -> Self {
        Self { rules }
    }

    /// Pick a shortdesc for `job`: the entry override, then the first two outcomes,
    /// then the statement's "so I can" clause. `None` keeps `existing` untouched,
    /// including when the candidate already matches it.
    pub fn resolve(
        &self,
        job: &JobEntry,
        entry_override: Option<&str>,
        existing: Option<&str>,
    ) -> Option<String> {
        let from_override = entry_override.and_then(|focus| self.screen(focus));
        let candidate = from_override
            .or_else(|| {
                let combined = job
                    .outcomes
                    .iter()
                    .take(2)
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(" ");
                self.screen(&combined)
            })
            .or_else(|| {
                let (_, clause) = job.statement.split_once(STATEMENT_MARKER)?;
                let clause = clause.trim().trim_end_matches('.');
                self.screen(&format!("{}{}", STATEMENT_LEAD, clause))
            })?;

        if existing.map(fold_lines).as_deref() == Some(candidate.as_str()) {
            return None;
        }
        Some(candidate)
    }

    fn screen(&self, raw: &str) -> Option<String> {
        let folded = fold_lines(raw);
        if folded.is_empty() {
            return None;
        }
        let cut = truncate_at_word(&folded, self.rules.shortdesc_max);
        (char_len(&cut) >= self.rules.shortdesc_min).then_some(cut)
    }

    /// Ensure one provenance block for `job` exists in `text`.
    ///
    /// The block goes after the content-type line, or at the top. A stamp for a
    /// different job is replaced; a stamp for the same job is left alone.
    pub fn stamp(&self, text: &str, job: &JobEntry) -> String {
        let header = format!("{}{}", STAMP_PREFIX, job.id);
        let block = [
            header.clone(),
            format!("// Statement: {}", fold_lines(&job.statement)),
            format!("// Persona: {}", fold_lines(&job.persona)),
        ];

        let mut lines: Vec<String> = text.split('\n').map(str::to_string).collect();

        if let Some(at) = lines.iter().position(|l| l.starts_with(STAMP_PREFIX)) {
            if lines[at].trim_end() == header {
                return text.to_string();
            }
            let mut end = at + 1;
            for prefix in ["// Statement: ", "// Persona: "] {
                if end < lines.len() && lines[end].starts_with(prefix) {
                    end += 1;
                }
            }
            lines.splice(at..end, block);
            return lines.join("\n");
        }

        match locate(text, self.rules).content_type_line {
            Some(span) => {
                let at = text[..span.start].matches('\n').count() + 1;
                lines.splice(at..at, block);
                lines.join("\n")
            }
            None => format!("{}\n\n{}", block.join("\n"), text),
        }
    }
}
