//! Markup region locator: title, content type, abstract marker, and shortdesc paragraph.
//!
//! This is the only place that walks raw document text looking for the metadata
//! region. Callers get byte spans back and never re-parse.

use crate::rules::{line_spans, Rules};
use crate::types::ContentType;

/// Half-open byte range into the located text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// Located regions of one document. All spans are optional.
#[derive(Debug, Clone)]
pub struct Located<'a> {
    text: &'a str,
    /// First heading line.
    pub title: Option<Span>,
    /// Full content-type attribute line.
    pub content_type_line: Option<Span>,
    content_type_value: Option<Span>,
    /// Abstract-role marker line.
    pub role_marker: Option<Span>,
    /// First paragraph after the marker, from its first to its last non-blank byte line.
    pub paragraph: Option<Span>,
    blank_before_marker: Option<bool>,
}

/// Locate the metadata regions of `text`. Never fails; absence is `None`.
pub fn locate<'a>(text: &'a str, rules: &Rules) -> Located<'a> {
    let lines: Vec<(usize, &str)> = line_spans(text).collect();
    let span_of = |i: usize| Span {
        start: lines[i].0,
        end: lines[i].0 + lines[i].1.len(),
    };

    let mut title_idx = None;
    let mut marker_idx = None;
    let mut content_type_line = None;
    let mut content_type_value = None;

    for (i, (start, line)) in lines.iter().enumerate() {
        if title_idx.is_none() && rules.is_title(line) {
            title_idx = Some(i);
        }
        if marker_idx.is_none() && rules.is_role_marker(line) {
            marker_idx = Some(i);
        }
        if content_type_line.is_none() {
            if let Some((s, e)) = rules.content_type_value(line) {
                content_type_line = Some(span_of(i));
                content_type_value = Some(Span {
                    start: start + s,
                    end: start + e,
                });
            }
        }
    }

    // Prose only: a directive or delimiter under the marker means no paragraph.
    let is_prose = |i: usize| !lines[i].1.trim().is_empty() && !rules.is_structural(lines[i].1);
    let paragraph = marker_idx.and_then(|m| {
        let first = (m + 1..lines.len()).find(|&i| !lines[i].1.trim().is_empty())?;
        if !is_prose(first) {
            return None;
        }
        let last = (first..lines.len()).take_while(|&i| is_prose(i)).last()?;
        Some(Span {
            start: span_of(first).start,
            end: span_of(last).end,
        })
    });

    let blank_before_marker = match (title_idx, marker_idx) {
        (Some(t), Some(m)) if t < m => {
            Some(lines[t + 1..m].iter().any(|(_, l)| l.trim().is_empty()))
        }
        _ => None,
    };

    Located {
        text,
        title: title_idx.map(span_of),
        content_type_line,
        content_type_value,
        role_marker: marker_idx.map(span_of),
        paragraph,
        blank_before_marker,
    }
}

impl<'a> Located<'a> {
    pub fn text(&self) -> &'a str {
        self.text
    }

    pub fn slice(&self, span: Span) -> &'a str {
        &self.text[span.start..span.end]
    }

    /// Title text without the level markers.
    pub fn title_text(&self) -> Option<&'a str> {
        self.title
            .map(|s| self.slice(s).trim_start_matches('=').trim())
    }

    pub fn content_type(&self) -> Option<ContentType> {
        self.content_type_value
            .and_then(|s| ContentType::parse(self.slice(s)))
    }

    /// Shortdesc paragraph with line breaks folded to single spaces.
    pub fn paragraph_text(&self) -> Option<String> {
        self.paragraph.map(|s| fold_lines(self.slice(s)))
    }

    /// Whether a blank line separates the title from the role marker.
    ///
    /// `None` when there is no title, no marker, or the marker precedes the title.
    pub fn blank_line_before_marker(&self) -> Option<bool> {
        self.blank_before_marker
    }
}

/// Fold line breaks to single spaces, trimming each line.
pub fn fold_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> Rules {
        Rules::default()
    }

    #[test]
    fn locate_full_module() {
        let text = "\
:_mod-docs-content-type: CONCEPT
[id=\"intro_{context}\"]
= Introduction

[role=\"_abstract\"]
First line of the abstract
continues here.

Body text.
";
        let rules = rules();
        let found = locate(text, &rules);
        assert_eq!(found.title_text(), Some("Introduction"));
        assert_eq!(found.content_type(), Some(ContentType::Concept));
        assert_eq!(
            found.paragraph_text().as_deref(),
            Some("First line of the abstract continues here.")
        );
        assert_eq!(found.blank_line_before_marker(), Some(true));
        let para = found.paragraph.unwrap();
        assert_eq!(
            &text[para.start..para.end],
            "First line of the abstract\ncontinues here."
        );
    }

    #[test]
    fn locate_skips_blank_run_after_marker() {
        let text = "= T\n\n[role=\"_abstract\"]\n\n\nThe paragraph.\n";
        let rules = rules();
        let found = locate(text, &rules);
        assert_eq!(found.paragraph_text().as_deref(), Some("The paragraph."));
    }

    #[test]
    fn locate_paragraph_at_eof_without_newline() {
        let text = "= T\n\n[role=\"_abstract\"]\nEnds here";
        let rules = rules();
        let found = locate(text, &rules);
        let para = found.paragraph.unwrap();
        assert_eq!(para.end, text.len());
    }

    #[test]
    fn locate_marker_tolerates_whitespace() {
        let text = "= T\n\n  [role=\"_abstract\"]  \nText.\n";
        let rules = rules();
        assert!(locate(text, &rules).role_marker.is_some());
    }

    #[test]
    fn locate_no_marker_keeps_title() {
        let text = "= Example\n\nBody.\n";
        let rules = rules();
        let found = locate(text, &rules);
        assert!(found.role_marker.is_none());
        assert!(found.paragraph.is_none());
        assert_eq!(found.title_text(), Some("Example"));
        assert_eq!(found.blank_line_before_marker(), None);
    }

    #[test]
    fn locate_marker_without_paragraph() {
        let text = "= T\n\n[role=\"_abstract\"]\n\n";
        let rules = rules();
        let found = locate(text, &rules);
        assert!(found.role_marker.is_some());
        assert!(found.paragraph.is_none());
    }

    #[test]
    fn locate_directive_under_marker_is_not_a_paragraph() {
        let rules = rules();
        for directive in ["include::snippets/abstract.adoc[]", "ifdef::upstream[]", "----", "[NOTE]", "// todo"] {
            let text = format!("= T\n\n[role=\"_abstract\"]\n\n{directive}\nMore.\n");
            let found = locate(&text, &rules);
            assert!(found.role_marker.is_some());
            assert!(found.paragraph.is_none(), "{directive}");
        }
    }

    #[test]
    fn locate_paragraph_stops_at_directive() {
        let text = "= T\n\n[role=\"_abstract\"]\nThe paragraph.\ninclude::a.adoc[]\n";
        let rules = rules();
        assert_eq!(locate(text, &rules).paragraph_text().as_deref(), Some("The paragraph."));
    }

    #[test]
    fn locate_first_title_only() {
        let text = "= First\n\n== Second\n";
        let rules = rules();
        assert_eq!(locate(text, &rules).title_text(), Some("First"));
    }

    #[test]
    fn locate_marker_directly_after_title() {
        let text = "= T\n[role=\"_abstract\"]\nText.\n";
        let rules = rules();
        assert_eq!(locate(text, &rules).blank_line_before_marker(), Some(false));
    }

    #[test]
    fn locate_empty_document() {
        let rules = rules();
        let found = locate("", &rules);
        assert!(found.title.is_none());
        assert!(found.role_marker.is_none());
        assert!(found.content_type().is_none());
    }

    #[test]
    fn fold_lines_joins_with_single_space() {
        assert_eq!(fold_lines("  a \n b\r\nc  "), "a b c");
    }
}
