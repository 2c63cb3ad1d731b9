//! Core types for CQA validation and shortdesc maintenance.

use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Configuration for document discovery, validation, and rewriting.
///
/// Different documentation repos can customize behavior by providing different configs.
#[derive(Debug, Clone)]
pub struct CqaConfig {
    /// Minimum short description length, in characters.
    pub shortdesc_min: usize,

    /// Maximum short description length, in characters.
    pub shortdesc_max: usize,

    /// Maximum numbered steps in a procedure module.
    pub max_procedure_steps: usize,

    /// Extension (without the dot) of documents to scan.
    pub document_extension: &'static str,

    /// Directory names skipped while enumerating documents.
    /// mta: the rendered `website` tree is not source content.
    pub skip_dirs: Vec<&'static str>,

    /// Repo root marker entries, checked in order when no docs dir is given.
    pub root_markers: Vec<&'static str>,

    /// JTBD mapping location, relative to the repo root.
    pub mapping_path: &'static str,

    /// Validation report artifact, relative to the repo root.
    pub report_path: &'static str,

    /// Clause appended to short descriptions below the minimum.
    pub filler_clause: &'static str,
}

impl CqaConfig {
    /// Config matching the MTA documentation layout: `docs/` and `assemblies/`
    /// under the repo root, with the rendered website excluded.
    pub fn mta() -> Self {
        Self {
            shortdesc_min: 50,
            shortdesc_max: 300,
            max_procedure_steps: 10,
            document_extension: "adoc",
            skip_dirs: vec!["website", ".git", "node_modules", "target"],
            root_markers: vec!["docs", ".git"],
            mapping_path: "docs/jtbd-mapping.yaml",
            report_path: "cqa_report.json",
            filler_clause: "Use this when writing or matching rules.",
        }
    }

    /// Same limits as `mta()`, but every directory except `.git` is scanned.
    pub fn strict() -> Self {
        Self {
            skip_dirs: vec![".git"],
            ..Self::mta()
        }
    }
}

impl Default for CqaConfig {
    fn default() -> Self {
        Self::mta()
    }
}

/// Declared content type of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentType {
    Concept,
    Procedure,
    Reference,
    Assembly,
    Snippet,
    /// Present but not one of the recognized tags. Holds the uppercased value.
    Other(String),
}

impl ContentType {
    /// Parse a raw attribute value, case-insensitively. Empty values yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let value = raw.trim().to_uppercase();
        let parsed = match value.as_str() {
            "" => return None,
            "CONCEPT" => Self::Concept,
            "PROCEDURE" => Self::Procedure,
            "REFERENCE" => Self::Reference,
            "ASSEMBLY" => Self::Assembly,
            "SNIPPET" => Self::Snippet,
            _ => Self::Other(value),
        };
        Some(parsed)
    }

    /// Whether the short description rules apply to this content type.
    pub fn requires_shortdesc(&self) -> bool {
        matches!(
            self,
            Self::Concept | Self::Procedure | Self::Reference | Self::Assembly
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Concept => "CONCEPT",
            Self::Procedure => "PROCEDURE",
            Self::Reference => "REFERENCE",
            Self::Assembly => "ASSEMBLY",
            Self::Snippet => "SNIPPET",
            Self::Other(value) => value,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check names reported by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    ContentType,
    Shortdesc,
    Procedure,
    NoTextBetweenIncludes,
    /// File-level I/O failure, distinct from content violations.
    Read,
}

impl Check {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ContentType => "content_type",
            Self::Shortdesc => "shortdesc",
            Self::Procedure => "procedure",
            Self::NoTextBetweenIncludes => "no_text_between_includes",
            Self::Read => "read",
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A violation found during validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub check: Check,
    pub message: String,
}

impl Violation {
    pub fn new(check: Check, message: impl Into<String>) -> Self {
        Self {
            check,
            message: message.into(),
        }
    }
}

/// Check if a file path names an assembly (`assembly_*.adoc` and variants).
pub fn is_assembly_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|name| name.contains("assembly_"))
        .unwrap_or(false)
}

/// Count characters the way lengths are reported to writers.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_parse_recognized() {
        assert_eq!(ContentType::parse("CONCEPT"), Some(ContentType::Concept));
        assert_eq!(ContentType::parse("procedure"), Some(ContentType::Procedure));
        assert_eq!(ContentType::parse(" Reference "), Some(ContentType::Reference));
        assert_eq!(ContentType::parse("ASSEMBLY"), Some(ContentType::Assembly));
        assert_eq!(ContentType::parse("snippet"), Some(ContentType::Snippet));
    }

    #[test]
    fn content_type_parse_other_and_empty() {
        assert_eq!(
            ContentType::parse("module"),
            Some(ContentType::Other("MODULE".to_string()))
        );
        assert_eq!(ContentType::parse("   "), None);
    }

    #[test]
    fn content_type_requires_shortdesc() {
        assert!(ContentType::Concept.requires_shortdesc());
        assert!(ContentType::Assembly.requires_shortdesc());
        assert!(!ContentType::Snippet.requires_shortdesc());
        assert!(!ContentType::Other("X".into()).requires_shortdesc());
    }

    #[test]
    fn check_names_are_snake_case() {
        let json = serde_json::to_string(&Check::NoTextBetweenIncludes).unwrap();
        assert_eq!(json, "\"no_text_between_includes\"");
        assert_eq!(Check::Shortdesc.to_string(), "shortdesc");
    }

    #[test]
    fn is_assembly_file_matches() {
        assert!(is_assembly_file(Path::new("assemblies/assembly_intro.adoc")));
        assert!(is_assembly_file(Path::new("docs/topics/x/assembly_platform.adoc")));
    }

    #[test]
    fn is_assembly_file_rejects() {
        assert!(!is_assembly_file(Path::new("docs/topics/con_intro.adoc")));
        assert!(!is_assembly_file(Path::new("assembly.adoc")));
        assert!(!is_assembly_file(Path::new("assemblies/master.adoc")));
    }

    #[test]
    fn strict_config_keeps_limits() {
        let strict = CqaConfig::strict();
        let mta = CqaConfig::mta();
        assert_eq!(strict.shortdesc_min, mta.shortdesc_min);
        assert_eq!(strict.shortdesc_max, mta.shortdesc_max);
        assert_eq!(strict.skip_dirs, vec![".git"]);
    }
}
