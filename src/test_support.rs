//! Fixtures shared by the unit test modules.

/// Words of `word ` repeated to exactly `n` characters, never ending in a space.
pub(crate) fn words_of_len(n: usize) -> String {
    let mut s = "word ".repeat(n / 5 + 1);
    s.truncate(n);
    if s.ends_with(' ') {
        s.pop();
        s.push('x');
    }
    s
}

pub(crate) const SCENARIO_A_PARAGRAPH: &str =
    "Configure the Example service for use with the platform and review its settings.";

/// A concept module that passes every CQA check.
pub(crate) fn compliant_concept() -> String {
    format!(
        "\
:_mod-docs-content-type: CONCEPT
[id=\"example_{{context}}\"]
= Example

[role=\"_abstract\"]
{SCENARIO_A_PARAGRAPH}

Body text.
"
    )
}

#[test]
fn words_of_len_exact() {
    for n in [1, 40, 49, 50, 300, 310] {
        let s = words_of_len(n);
        assert_eq!(s.chars().count(), n);
        assert!(!s.ends_with(' '));
    }
}
