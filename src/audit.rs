//! CQA 2.1 checks for modules and assemblies.

use crate::locate::{locate, Located};
use crate::rules::{Rules, ROLE_ABSTRACT};
use crate::types::{char_len, is_assembly_file, Check, ContentType, Violation};
use std::path::Path;

const PREVIEW_CHARS: usize = 60;

/// Validate one document, dispatching on whether its file name marks an assembly.
pub fn validate_document(path: &Path, text: &str, rules: &Rules) -> Vec<Violation> {
    let found = locate(text, rules);
    if is_assembly_file(path) {
        validate_assembly(&found, rules)
    } else {
        let content_type = found.content_type();
        validate_module(&found, content_type.as_ref(), rules)
    }
}

/// Run the module checks for a declared content type.
pub fn validate_module(
    found: &Located<'_>,
    content_type: Option<&ContentType>,
    rules: &Rules,
) -> Vec<Violation> {
    let mut violations = Vec::new();

    if let Some(ContentType::Other(value)) = content_type {
        violations.push(Violation::new(
            Check::ContentType,
            format!("Unknown content type: {}", value),
        ));
    }

    if content_type.is_some_and(ContentType::requires_shortdesc) {
        violations.extend(check_shortdesc(found, rules));
    }

    if content_type == Some(&ContentType::Procedure) {
        let steps = count_procedure_steps(found.text(), rules);
        if steps > rules.max_procedure_steps {
            violations.push(Violation::new(
                Check::Procedure,
                format!(
                    "Procedure has {} steps (max {})",
                    steps, rules.max_procedure_steps
                ),
            ));
        }
    }

    violations
}

/// Run the assembly checks, then the module checks as an ASSEMBLY.
pub fn validate_assembly(found: &Located<'_>, rules: &Rules) -> Vec<Violation> {
    let mut violations = Vec::new();

    let content_type = found.content_type();
    if content_type != Some(ContentType::Assembly) {
        let got = content_type
            .map(|ct| ct.to_string())
            .unwrap_or_else(|| "None".to_string());
        violations.push(Violation::new(
            Check::ContentType,
            format!(
                "Assembly should have _mod-docs-content-type: ASSEMBLY, got {}",
                got
            ),
        ));
    }

    violations.extend(check_text_between_includes(found.text(), rules));
    violations.extend(validate_module(found, Some(&ContentType::Assembly), rules));
    violations
}

/// Presence, separation, length, and self-reference checks on the shortdesc.
///
/// A missing role marker short-circuits the rest.
pub fn check_shortdesc(found: &Located<'_>, rules: &Rules) -> Vec<Violation> {
    if found.role_marker.is_none() {
        return vec![Violation::new(
            Check::Shortdesc,
            format!("Missing {}", ROLE_ABSTRACT),
        )];
    }

    let mut violations = Vec::new();
    if found.blank_line_before_marker() == Some(false) {
        violations.push(Violation::new(
            Check::Shortdesc,
            format!(
                "Missing blank line between level-0 title and {}",
                ROLE_ABSTRACT
            ),
        ));
    }

    let text = found.paragraph_text().unwrap_or_default();
    if let Some(message) = check_shortdesc_length(&text, rules) {
        violations.push(Violation::new(Check::Shortdesc, message));
    }
    if !text.is_empty() && rules.is_self_referential(&text) {
        violations.push(Violation::new(
            Check::Shortdesc,
            "Short description contains self-referential language",
        ));
    }
    violations
}

/// Length message for a folded shortdesc, or `None` when it is within bounds.
pub fn check_shortdesc_length(text: &str, rules: &Rules) -> Option<String> {
    if text.is_empty() {
        return Some("Short description is missing".to_string());
    }
    let n = char_len(text);
    if n < rules.shortdesc_min {
        Some(format!(
            "Short description too short ({} < {} chars)",
            n, rules.shortdesc_min
        ))
    } else if n > rules.shortdesc_max {
        Some(format!(
            "Short description too long ({} > {} chars)",
            n, rules.shortdesc_max
        ))
    } else {
        None
    }
}

/// Count numbered step lines (`. 1. Do this`).
pub fn count_procedure_steps(text: &str, rules: &Rules) -> usize {
    text.lines().filter(|l| rules.is_procedure_step(l)).count()
}

/// Flag content lines that sit between two consecutive `include::` directives.
///
/// Lines after the last include are not between includes and are not flagged.
pub fn check_text_between_includes(text: &str, rules: &Rules) -> Vec<Violation> {
    let mut violations = Vec::new();
    let mut pending: Vec<Violation> = Vec::new();
    let mut seen_include = false;

    for (i, line) in text.lines().enumerate() {
        let stripped = line.trim();
        if stripped.starts_with("include::") {
            violations.append(&mut pending);
            seen_include = true;
            continue;
        }
        if !seen_include || rules.is_allowed_between_includes(line) {
            continue;
        }
        let preview: String = stripped.chars().take(PREVIEW_CHARS).collect();
        pending.push(Violation::new(
            Check::NoTextBetweenIncludes,
            format!(
                "Line {}: Text between include statements: {}...",
                i + 1,
                preview
            ),
        ));
    }

    violations
}

/// Whether any violation is in the shortdesc category.
pub fn has_shortdesc_violation(violations: &[Violation]) -> bool {
    violations.iter().any(|v| v.check == Check::Shortdesc)
}
