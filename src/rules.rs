//! Compiled CQA patterns and limits, built once per run from a [`CqaConfig`].

use crate::types::CqaConfig;
use regex::Regex;

/// Literal abstract-role marker that introduces a short description.
pub const ROLE_ABSTRACT: &str = "[role=\"_abstract\"]";

/// Line prefix of a JTBD provenance stamp.
pub const STAMP_PREFIX: &str = "// JTBD job: ";

/// Pattern set and limits passed by reference into every component.
#[derive(Debug, Clone)]
pub struct Rules {
    pub shortdesc_min: usize,
    pub shortdesc_max: usize,
    pub max_procedure_steps: usize,
    pub filler_clause: String,
    title: Regex,
    content_type: Regex,
    self_reference: Regex,
    procedure_step: Regex,
    structural: Regex,
    allowed_between_includes: Vec<Regex>,
}

impl Rules {
    pub fn new(config: &CqaConfig) -> Self {
        Self {
            shortdesc_min: config.shortdesc_min,
            shortdesc_max: config.shortdesc_max,
            max_procedure_steps: config.max_procedure_steps,
            filler_clause: config.filler_clause.to_string(),
            title: compile(r"^=+[ \t]+\S"),
            content_type: compile(r"(?i)^:_(?:mod-docs-)?content-type:[ \t]*(.*)$"),
            self_reference: compile(
                r"(?i)\b(this\s+(?:document|section|module|topic|guide)\s+(?:describes|explains|contains)|in\s+this\s+(?:document|section))\b",
            ),
            procedure_step: compile(r"^\.[ \t]+\d+\.[ \t]+"),
            structural: compile(
                r"^(?:(?:include|ifdef|ifndef|ifeval|endif)::|//|\[.*\]$|:!?[A-Za-z0-9_-]+!?:|(?:-{2,}|={4,}|\*{4,}|\.{4,}|_{4,}|\+{4,}|\|===)$)",
            ),
            allowed_between_includes: vec![
                compile(r"^\s*//"),
                compile(r"^\s*ifdef::"),
                compile(r"^\s*ifndef::"),
                compile(r"^\s*endif::"),
                compile(r"^\s*:![A-Za-z0-9_-]+:?\s*$"),
                compile(r"^\s*:[A-Za-z0-9_-]+:.*$"),
                compile(r"^\s*={2,}\s+"),
                compile(r"^\s*\[role=.*\]\s*$"),
                compile(r"^\s*\*\s+link:"),
            ],
        }
    }

    /// A heading line: one or more `=` markers, a space, then text.
    pub fn is_title(&self, line: &str) -> bool {
        self.title.is_match(line)
    }

    pub fn is_role_marker(&self, line: &str) -> bool {
        line.trim() == ROLE_ABSTRACT
    }

    /// Byte range of the content-type value within `line`, when the line declares one.
    pub fn content_type_value(&self, line: &str) -> Option<(usize, usize)> {
        let caps = self.content_type.captures(line)?;
        let value = caps.get(1)?;
        let raw = value.as_str();
        let lead = raw.len() - raw.trim_start().len();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        let start = value.start() + lead;
        Some((start, start + trimmed.len()))
    }

    pub fn is_self_referential(&self, text: &str) -> bool {
        self.self_reference.is_match(text)
    }

    pub fn is_procedure_step(&self, line: &str) -> bool {
        self.procedure_step.is_match(line)
    }

    /// Directives, comments, attribute lines, and block delimiters. Never prose.
    pub fn is_structural(&self, line: &str) -> bool {
        self.structural.is_match(line.trim())
    }

    /// Lines tolerated between two `include::` directives in an assembly.
    pub fn is_allowed_between_includes(&self, line: &str) -> bool {
        line.trim().is_empty()
            || line.contains("include::")
            || self
                .allowed_between_includes
                .iter()
                .any(|pat| pat.is_match(line))
    }
}

impl Default for Rules {
    fn default() -> Self {
        Self::new(&CqaConfig::default())
    }
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in CQA pattern must compile")
}

/// Iterate `(byte_offset, line)` pairs with the line terminator stripped.
pub(crate) fn line_spans(text: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut offset = 0;
    text.split_inclusive('\n').map(move |raw| {
        let start = offset;
        offset += raw.len();
        let line = raw.strip_suffix('\n').unwrap_or(raw);
        (start, line.strip_suffix('\r').unwrap_or(line))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- title ---

    #[test]
    fn title_matches_levels() {
        let rules = Rules::default();
        assert!(rules.is_title("= Example"));
        assert!(rules.is_title("== Section"));
        assert!(rules.is_title("=\tTabbed"));
    }

    #[test]
    fn title_rejects_delimiters_and_text() {
        let rules = Rules::default();
        assert!(!rules.is_title("===="));
        assert!(!rules.is_title("=NoSpace"));
        assert!(!rules.is_title("= "));
        assert!(!rules.is_title("// = comment"));
    }

    // --- content type ---

    #[test]
    fn content_type_value_both_spellings() {
        let rules = Rules::default();
        let line = ":_mod-docs-content-type: PROCEDURE";
        let (s, e) = rules.content_type_value(line).unwrap();
        assert_eq!(&line[s..e], "PROCEDURE");
        let line = ":_content-type:   concept  ";
        let (s, e) = rules.content_type_value(line).unwrap();
        assert_eq!(&line[s..e], "concept");
    }

    #[test]
    fn content_type_value_case_insensitive_name() {
        let rules = Rules::default();
        assert!(rules.content_type_value(":_Mod-Docs-Content-Type: ASSEMBLY").is_some());
    }

    #[test]
    fn content_type_value_empty_is_none() {
        let rules = Rules::default();
        assert!(rules.content_type_value(":_content-type:").is_none());
        assert!(rules.content_type_value(":context: foo").is_none());
    }

    // --- self reference ---

    #[test]
    fn self_reference_detected() {
        let rules = Rules::default();
        assert!(rules.is_self_referential("This document describes how to configure it."));
        assert!(rules.is_self_referential("this  MODULE explains the settings."));
        assert!(rules.is_self_referential("Settings are listed in this section."));
    }

    #[test]
    fn self_reference_not_detected() {
        let rules = Rules::default();
        assert!(!rules.is_self_referential("Configure the service for use with the platform."));
        assert!(!rules.is_self_referential("This guide is short."));
    }

    // --- steps and includes ---

    #[test]
    fn procedure_step_lines() {
        let rules = Rules::default();
        assert!(rules.is_procedure_step(". 1. Open the console."));
        assert!(rules.is_procedure_step(".  12. Save."));
        assert!(!rules.is_procedure_step(". Open the console."));
        assert!(!rules.is_procedure_step("1. Open."));
    }

    #[test]
    fn allowed_between_includes_whitelist() {
        let rules = Rules::default();
        for line in [
            "",
            "   ",
            "// comment",
            "ifdef::context[]",
            "ifndef::context[]",
            "endif::[]",
            ":!context:",
            ":context: install",
            "== Additional resources",
            "[role=\"_additional-resources\"]",
            "* link:https://example.com[Example]",
            "include::topics/a.adoc[leveloffset=+1]",
        ] {
            assert!(rules.is_allowed_between_includes(line), "{line:?}");
        }
        assert!(!rules.is_allowed_between_includes("Some free text."));
        assert!(!rules.is_allowed_between_includes("* plain item"));
    }

    #[test]
    fn structural_lines() {
        let rules = Rules::default();
        for line in [
            "include::snippets/abstract.adoc[]",
            "ifdef::upstream[]",
            "ifndef::upstream[]",
            "endif::[]",
            "// comment",
            "[source,yaml]",
            "  [NOTE]  ",
            ":context: install",
            ":!context:",
            "----",
            "====",
            "****",
            "....",
            "|===",
            "--",
        ] {
            assert!(rules.is_structural(line), "{line:?}");
        }
        assert!(!rules.is_structural("Configure the service."));
        assert!(!rules.is_structural("= Title"));
        assert!(!rules.is_structural("[Optional] steps follow."));
    }

    // --- line_spans ---

    #[test]
    fn line_spans_offsets() {
        let text = "a\r\nbc\n\nd";
        let spans: Vec<_> = line_spans(text).collect();
        assert_eq!(spans, vec![(0, "a"), (3, "bc"), (6, ""), (7, "d")]);
    }
}
