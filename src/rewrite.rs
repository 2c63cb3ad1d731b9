//! Shortdesc rewriter: splice a paragraph into an existing abstract, or insert a new one.
//!
//! Every paragraph written goes through [`fit_shortdesc`] first, so output lengths
//! always land within the configured bounds. Compliant input comes back unchanged.

use crate::locate::{fold_lines, locate};
use crate::rules::{Rules, ROLE_ABSTRACT};
use crate::types::char_len;

const ELLIPSIS: char = '\u{2026}';

/// Bring a paragraph within `[shortdesc_min, shortdesc_max]`.
///
/// Short text gets the filler clause; long text is cut at a word boundary with an
/// ellipsis. Returns `None` when the result still cannot reach the minimum.
pub fn fit_shortdesc(paragraph: &str, rules: &Rules) -> Option<String> {
    let folded = fold_lines(paragraph);
    if folded.is_empty() {
        return None;
    }
    let fitted = if char_len(&folded) < rules.shortdesc_min {
        let extended = format!("{} {}", folded, rules.filler_clause);
        truncate_at_word(&extended, rules.shortdesc_max)
    } else {
        truncate_at_word(&folded, rules.shortdesc_max)
    };
    (char_len(&fitted) >= rules.shortdesc_min).then_some(fitted)
}

/// Cut `text` to at most `max` characters without splitting a word.
///
/// The ellipsis counts toward `max` and is only added when content was removed.
/// A single word longer than the budget is cut hard.
pub fn truncate_at_word(text: &str, max: usize) -> String {
    let text = text.trim();
    if char_len(text) <= max {
        return text.to_string();
    }
    let budget = max.saturating_sub(1);
    let cut = text
        .char_indices()
        .nth(budget)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let head = &text[..cut];
    let at_boundary = text[cut..].starts_with(char::is_whitespace);
    let kept = if at_boundary {
        head.trim_end()
    } else {
        match head.rfind(char::is_whitespace) {
            Some(ws) => head[..ws].trim_end(),
            None => head,
        }
    };
    format!("{}{}", kept, ELLIPSIS)
}

/// Replace the located shortdesc paragraph with `new_paragraph`.
///
/// Text outside the paragraph is left byte-identical. Returns the input unchanged
/// when there is no role marker, when the paragraph cannot be fitted, or when the
/// fitted paragraph equals the current one.
pub fn rewrite(text: &str, new_paragraph: &str, rules: &Rules) -> String {
    let found = locate(text, rules);
    let Some(marker) = found.role_marker else {
        return text.to_string();
    };
    let Some(fitted) = fit_shortdesc(new_paragraph, rules) else {
        return text.to_string();
    };
    match found.paragraph {
        Some(span) => {
            if found.paragraph_text().as_deref() == Some(fitted.as_str()) {
                return text.to_string();
            }
            format!("{}{}{}", &text[..span.start], fitted, &text[span.end..])
        }
        None => {
            // Fill under the marker; keep a blank line before whatever follows it.
            let eol = line_ending(text);
            let rest = &text[marker.end..];
            let next = rest
                .strip_prefix(eol)
                .or_else(|| rest.strip_prefix('\n'))
                .unwrap_or(rest);
            let gap = match next.lines().next() {
                Some(line) if !line.trim().is_empty() => eol,
                _ => "",
            };
            format!("{}{eol}{fitted}{gap}{}", &text[..marker.end], rest)
        }
    }
}

/// Normalize the existing shortdesc in place (lengthen or shorten as needed).
pub fn normalize_existing(text: &str, rules: &Rules) -> String {
    match locate(text, rules).paragraph_text() {
        Some(current) => rewrite(text, &current, rules),
        None => text.to_string(),
    }
}

/// Insert a metadata block after the first title when no role marker exists.
///
/// Attribute, comment, and blank lines directly under the title stay above the
/// block; a trailing blank run there collapses into the block's leading blank line.
pub fn insert(text: &str, new_paragraph: &str, rules: &Rules) -> String {
    let found = locate(text, rules);
    if found.role_marker.is_some() {
        return text.to_string();
    }
    let Some(title) = found.title else {
        return text.to_string();
    };
    let Some(fitted) = fit_shortdesc(new_paragraph, rules) else {
        return text.to_string();
    };

    let lines: Vec<&str> = text.split('\n').collect();
    let title_idx = text[..title.start].matches('\n').count();

    let mut after = title_idx + 1;
    while after < lines.len() && is_header_line(lines[after]) {
        after += 1;
    }
    let mut kept_end = after;
    while kept_end > title_idx + 1 && lines[kept_end - 1].trim().is_empty() {
        kept_end -= 1;
    }

    // Lines are split on '\n', so CRLF documents keep their '\r' on each line.
    let cr = line_ending(text).strip_suffix('\n').unwrap_or_default();
    let marker = format!("{ROLE_ABSTRACT}{cr}");
    let paragraph = format!("{fitted}{cr}");

    let mut out: Vec<&str> = Vec::with_capacity(lines.len() + 4);
    out.extend_from_slice(&lines[..kept_end]);
    out.push(cr);
    out.push(&marker);
    out.push(&paragraph);
    if after < lines.len() {
        out.push(cr);
        out.extend_from_slice(&lines[after..]);
    } else {
        out.push("");
    }
    out.join("\n")
}

/// The document's line terminator, judged by its first line break.
fn line_ending(text: &str) -> &'static str {
    match text.find('\n') {
        Some(i) if text[..i].ends_with('\r') => "\r\n",
        _ => "\n",
    }
}

/// Lines that may sit between a title and its abstract.
fn is_header_line(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with(':') || trimmed.starts_with("//")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{check_shortdesc, has_shortdesc_violation, validate_document};
    use crate::test_support::{compliant_concept, words_of_len, SCENARIO_A_PARAGRAPH};
    use std::path::Path;

    fn rules() -> Rules {
        Rules::default()
    }

    // --- truncate_at_word ---

    #[test]
    fn truncate_never_splits_a_word() {
        let text = words_of_len(310);
        let cut = truncate_at_word(&text, 300);
        assert!(char_len(&cut) <= 300);
        assert!(cut.ends_with(ELLIPSIS));
        let body = cut.trim_end_matches(ELLIPSIS);
        assert!(body.split(' ').all(|w| w == "word"));
    }

    #[test]
    fn truncate_keeps_word_ending_at_budget() {
        // "word" ends exactly at char 299, followed by a space.
        let text = format!("{} tail", words_of_len(299));
        let cut = truncate_at_word(&text, 300);
        assert_eq!(cut, format!("{}{}", words_of_len(299), ELLIPSIS));
    }

    #[test]
    fn truncate_short_text_unchanged() {
        assert_eq!(truncate_at_word("  short text ", 300), "short text");
    }

    #[test]
    fn truncate_single_long_word() {
        let cut = truncate_at_word(&"x".repeat(400), 300);
        assert_eq!(char_len(&cut), 300);
    }

    #[test]
    fn truncate_counts_chars_not_bytes() {
        let text = "é".repeat(301);
        assert_eq!(char_len(&truncate_at_word(&text, 300)), 300);
    }

    // --- fit_shortdesc ---

    #[test]
    fn fit_extends_short_paragraph() {
        let rules = rules();
        let fitted = fit_shortdesc("Configure the proxy settings.", &rules).unwrap();
        assert_eq!(
            fitted,
            "Configure the proxy settings. Use this when writing or matching rules."
        );
    }

    #[test]
    fn fit_rejects_unreachable_minimum() {
        assert_eq!(fit_shortdesc("Tiny.", &rules()), None);
        assert_eq!(fit_shortdesc("   ", &rules()), None);
    }

    #[test]
    fn fit_output_always_within_bounds() {
        let rules = rules();
        for n in [9, 20, 49, 50, 150, 300, 301, 310, 900] {
            if let Some(fitted) = fit_shortdesc(&words_of_len(n), &rules) {
                let len = char_len(&fitted);
                assert!((50..=300).contains(&len), "{n} -> {len}");
            }
        }
    }

    #[test]
    fn fit_folds_lines() {
        let rules = rules();
        let para = format!("{}\n{}", words_of_len(30), words_of_len(30));
        assert_eq!(
            fit_shortdesc(&para, &rules).unwrap(),
            format!("{} {}", words_of_len(30), words_of_len(30))
        );
    }

    // --- rewrite ---

    #[test]
    fn rewrite_replaces_only_paragraph() {
        let rules = rules();
        let text = "= T\n\n[role=\"_abstract\"]\nOld text\nover two lines.\n\nBody stays.\n";
        let new = words_of_len(70);
        let out = rewrite(text, &new, &rules);
        assert_eq!(
            out,
            format!("= T\n\n[role=\"_abstract\"]\n{new}\n\nBody stays.\n")
        );
    }

    #[test]
    fn rewrite_same_paragraph_is_noop() {
        let rules = rules();
        let text = compliant_concept();
        assert_eq!(rewrite(&text, SCENARIO_A_PARAGRAPH, &rules), text);
    }

    #[test]
    fn rewrite_multiline_equivalent_is_noop() {
        let rules = rules();
        let text = format!(
            "= T\n\n[role=\"_abstract\"]\n{}\n{}\n",
            words_of_len(30),
            words_of_len(30)
        );
        let same = format!("{} {}", words_of_len(30), words_of_len(30));
        assert_eq!(rewrite(&text, &same, &rules), text);
    }

    #[test]
    fn rewrite_without_marker_is_noop() {
        let rules = rules();
        let text = "= T\n\nBody.\n";
        assert_eq!(rewrite(text, &words_of_len(80), &rules), text);
    }

    #[test]
    fn rewrite_fills_empty_marker() {
        let rules = rules();
        let text = "= T\n\n[role=\"_abstract\"]\n";
        let new = words_of_len(60);
        assert_eq!(
            rewrite(text, &new, &rules),
            format!("= T\n\n[role=\"_abstract\"]\n{new}\n")
        );
    }

    #[test]
    fn normalize_leaves_directive_under_marker() {
        let rules = rules();
        let text = "= T\n\n[role=\"_abstract\"]\n\ninclude::snippets/abstract.adoc[]\n\nBody.\n";
        assert_eq!(normalize_existing(text, &rules), text);
    }

    #[test]
    fn rewrite_fills_above_directive_and_keeps_it() {
        let rules = rules();
        let new = words_of_len(60);
        let spaced = "= T\n\n[role=\"_abstract\"]\n\ninclude::snippets/abstract.adoc[]\n";
        let out = rewrite(spaced, &new, &rules);
        assert_eq!(
            out,
            format!("= T\n\n[role=\"_abstract\"]\n{new}\n\ninclude::snippets/abstract.adoc[]\n")
        );
        assert_eq!(rewrite(&out, &new, &rules), out);

        let tight = "= T\n\n[role=\"_abstract\"]\nifdef::upstream[]\n";
        assert_eq!(
            rewrite(tight, &new, &rules),
            format!("= T\n\n[role=\"_abstract\"]\n{new}\n\nifdef::upstream[]\n")
        );
    }

    #[test]
    fn rewrite_empty_marker_keeps_crlf() {
        let rules = rules();
        let new = words_of_len(60);
        let text = "= T\r\n\r\n[role=\"_abstract\"]\r\n\r\ninclude::a.adoc[]\r\n";
        let out = rewrite(text, &new, &rules);
        assert_eq!(
            out,
            format!("= T\r\n\r\n[role=\"_abstract\"]\r\n{new}\r\n\r\ninclude::a.adoc[]\r\n")
        );
        assert!(!out.replace("\r\n", "").contains('\n'));
    }

    #[test]
    fn rewrite_truncated_long_paragraph_passes() {
        // Scenario B, repair half.
        let rules = rules();
        let long = words_of_len(310);
        let text = format!(
            ":_mod-docs-content-type: CONCEPT\n= T\n\n[role=\"_abstract\"]\n{long}\n\nBody.\n"
        );
        let out = rewrite(&text, &long, &rules);
        assert_ne!(out, text);
        let v = validate_document(Path::new("con_t.adoc"), &out, &rules);
        assert!(v.is_empty(), "{v:?}");
        assert_eq!(rewrite(&out, &long, &rules), out);
    }

    #[test]
    fn normalize_existing_expands_and_is_idempotent() {
        let rules = rules();
        let text = "= T\n\n[role=\"_abstract\"]\nConfigure the proxy settings.\n\nBody.\n";
        let once = normalize_existing(text, &rules);
        assert!(once.contains("Use this when writing or matching rules."));
        assert_eq!(normalize_existing(&once, &rules), once);
    }

    // --- insert ---

    #[test]
    fn insert_after_title() {
        // Scenario A.
        let rules = rules();
        let text = "= Example\n\nBody text.\n";
        let out = insert(text, SCENARIO_A_PARAGRAPH, &rules);
        assert_eq!(
            out,
            format!("= Example\n\n[role=\"_abstract\"]\n{SCENARIO_A_PARAGRAPH}\n\nBody text.\n")
        );
        let found = locate(&out, &rules);
        assert!(check_shortdesc(&found, &rules).is_empty());
    }

    #[test]
    fn insert_preserves_attribute_and_comment_lines() {
        let rules = rules();
        let text = "\
:_mod-docs-content-type: CONCEPT
= Example
:context: example
// keep me

Body text.
";
        let out = insert(text, SCENARIO_A_PARAGRAPH, &rules);
        assert_eq!(
            out,
            format!(
                "\
:_mod-docs-content-type: CONCEPT
= Example
:context: example
// keep me

[role=\"_abstract\"]
{SCENARIO_A_PARAGRAPH}

Body text.
"
            )
        );
        let v = validate_document(Path::new("con_example.adoc"), &out, &rules);
        assert!(!has_shortdesc_violation(&v), "{v:?}");
    }

    #[test]
    fn insert_keeps_crlf_line_endings() {
        let rules = rules();
        let out = insert("= Example\r\n\r\nBody.\r\n", SCENARIO_A_PARAGRAPH, &rules);
        assert_eq!(
            out,
            format!("= Example\r\n\r\n[role=\"_abstract\"]\r\n{SCENARIO_A_PARAGRAPH}\r\n\r\nBody.\r\n")
        );
        assert!(!out.replace("\r\n", "").contains('\n'));
    }

    #[test]
    fn insert_title_only_document() {
        let rules = rules();
        let out = insert("= Example", SCENARIO_A_PARAGRAPH, &rules);
        assert_eq!(
            out,
            format!("= Example\n\n[role=\"_abstract\"]\n{SCENARIO_A_PARAGRAPH}\n")
        );
    }

    #[test]
    fn insert_only_after_first_title() {
        let rules = rules();
        let text = "= One\n\nIntro.\n\n== Two\n\nMore.\n";
        let out = insert(text, SCENARIO_A_PARAGRAPH, &rules);
        assert_eq!(out.matches(ROLE_ABSTRACT).count(), 1);
        assert!(out.ends_with("== Two\n\nMore.\n"));
    }

    #[test]
    fn insert_truncates_long_paragraph() {
        let rules = rules();
        let out = insert("= T\n\nBody.\n", &words_of_len(500), &rules);
        let found = locate(&out, &rules);
        assert!(check_shortdesc(&found, &rules).is_empty());
    }

    #[test]
    fn insert_is_idempotent() {
        let rules = rules();
        let once = insert("= Example\n\nBody.\n", SCENARIO_A_PARAGRAPH, &rules);
        assert_eq!(insert(&once, SCENARIO_A_PARAGRAPH, &rules), once);
        let compliant = compliant_concept();
        assert_eq!(insert(&compliant, SCENARIO_A_PARAGRAPH, &rules), compliant);
    }

    #[test]
    fn insert_without_title_is_noop() {
        let rules = rules();
        assert_eq!(insert("Body only.\n", SCENARIO_A_PARAGRAPH, &rules), "Body only.\n");
    }

    #[test]
    fn insert_rejects_unfittable_paragraph() {
        let rules = rules();
        assert_eq!(insert("= T\n", "Hi.", &rules), "= T\n");
    }
}
