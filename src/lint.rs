//! Prose-linter findings: load them (cached or from a bounded linter run) and
//! apply the mechanical fixes they carry.

use crate::batch::{read_document, write_document, FileError};
use crate::error::{CqaError, Result};
use regex::{NoExpand, Regex, RegexBuilder};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Cached linter output, relative to the repo root.
pub const CACHE_FILE: &str = "vale_output.json";

/// Wall-clock ceiling for one linter run.
pub const LINTER_TIMEOUT: Duration = Duration::from_secs(300);

const INCLUDED_CHECK_PREFIXES: &[&str] = &["RedHat.", "AsciiDocDITA."];

const AUTO_FIXABLE_CHECKS: &[&str] = &[
    "RedHat.TermsErrors",
    "RedHat.TermsWarnings",
    "RedHat.Hyphens",
    "RedHat.Using",
    "RedHat.Spacing",
    "RedHat.CaseSensitiveTerms",
];

/// Files that discuss conscious-language terms rather than use them.
const CONSCIOUS_LANGUAGE_EXCLUSIONS: &[&str] = &["making-open-source-more-inclusive.adoc"];

const MANUAL_REVIEW_SHOWN: usize = 10;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawAlert {
    check: String,
    line: usize,
    span: (usize, usize),
    #[serde(default)]
    severity: String,
    #[serde(default)]
    message: String,
    #[serde(default, rename = "Match")]
    matched: String,
    #[serde(default)]
    action: Option<RawAction>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawAction {
    #[serde(default)]
    name: String,
    #[serde(default)]
    params: Option<Vec<String>>,
}

/// One linter finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub file: String,
    /// 1-based line number.
    pub line: usize,
    /// 1-based inclusive column range.
    pub span: (usize, usize),
    pub check: String,
    pub severity: String,
    pub message: String,
    pub matched: String,
    pub action: Option<String>,
    pub params: Vec<String>,
}

impl Finding {
    pub fn can_auto_fix(&self) -> bool {
        if matches!(self.action.as_deref(), Some("replace" | "edit")) {
            return true;
        }
        AUTO_FIXABLE_CHECKS.contains(&self.check.as_str()) && !self.params.is_empty()
    }
}

/// Outcome of one fix attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixOutcome {
    pub success: bool,
    pub original: String,
    pub replacement: String,
    pub message: String,
}

impl FixOutcome {
    fn applied(original: &str, replacement: &str, message: impl Into<String>) -> Self {
        Self {
            success: true,
            original: original.to_string(),
            replacement: replacement.to_string(),
            message: message.into(),
        }
    }

    fn skipped(original: &str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            original: original.to_string(),
            replacement: String::new(),
            message: message.into(),
        }
    }
}

pub type Findings = BTreeMap<String, Vec<Finding>>;

/// Parse linter JSON output, keeping only the checks this tool handles.
pub fn parse_findings(json: &str) -> Result<Findings> {
    let raw: BTreeMap<String, Vec<RawAlert>> =
        serde_json::from_str(json).map_err(|e| CqaError::LinterOutput {
            detail: e.to_string(),
        })?;
    let mut findings = Findings::new();
    for (file, alerts) in raw {
        let kept: Vec<Finding> = alerts
            .into_iter()
            .filter(|a| INCLUDED_CHECK_PREFIXES.iter().any(|p| a.check.starts_with(p)))
            .map(|a| {
                let action = a.action.unwrap_or_default();
                Finding {
                    file: file.clone(),
                    line: a.line,
                    span: a.span,
                    check: a.check,
                    severity: a.severity,
                    message: a.message,
                    matched: a.matched,
                    action: (!action.name.is_empty()).then_some(action.name),
                    params: action.params.unwrap_or_default(),
                }
            })
            .collect();
        if !kept.is_empty() {
            findings.insert(file, kept);
        }
    }
    Ok(findings)
}

/// Run the linter on `target` with a wall-clock ceiling; returns raw stdout.
pub fn run_linter(root: &Path, target: &str, timeout: Duration) -> Result<String> {
    info!("running: vale --output=JSON {}", target);
    let mut child = Command::new("vale")
        .arg("--output=JSON")
        .arg(target)
        .current_dir(root)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| CqaError::LinterFailed {
            detail: format!("could not start vale: {}", e),
        })?;

    let mut stdout = child.stdout.take().ok_or_else(|| CqaError::LinterFailed {
        detail: "vale stdout was not captured".to_string(),
    })?;
    let reader = std::thread::spawn(move || {
        let mut out = String::new();
        stdout.read_to_string(&mut out).map(|_| out)
    });

    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(_)) => break,
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(CqaError::LinterFailed {
                    detail: format!("vale timed out after {} seconds", timeout.as_secs()),
                });
            }
            Ok(None) => std::thread::sleep(Duration::from_millis(100)),
            Err(e) => {
                return Err(CqaError::LinterFailed {
                    detail: e.to_string(),
                })
            }
        }
    }

    // Vale exits 1 when it finds issues, so the status is not an error signal.
    match reader.join() {
        Ok(Ok(out)) => Ok(out),
        Ok(Err(e)) => Err(CqaError::LinterFailed {
            detail: format!("reading vale output: {}", e),
        }),
        Err(_) => Err(CqaError::LinterFailed {
            detail: "vale output reader panicked".to_string(),
        }),
    }
}

/// Load findings from the cache or a fresh linter run. Every failure degrades to
/// no findings.
pub fn load_findings(root: &Path, target: &str, refresh: bool) -> Findings {
    let cache = root.join(CACHE_FILE);
    if cache.is_file() && !refresh {
        info!("using cached linter output from {}", cache.display());
        match read_document(&cache).and_then(|text| parse_findings(&text)) {
            Ok(findings) => return findings,
            Err(e) => warn!("cache is invalid, running the linter: {}", e),
        }
    }

    let output = match run_linter(root, target, LINTER_TIMEOUT) {
        Ok(output) => output,
        Err(e) => {
            warn!("{}", e);
            return Findings::new();
        }
    };
    if output.trim().is_empty() {
        return Findings::new();
    }
    if let Err(e) = write_document(&cache, &output) {
        warn!("could not cache linter output: {}", e);
    }
    parse_findings(&output).unwrap_or_else(|e| {
        warn!("{}", e);
        Findings::new()
    })
}

/// Attempt the fix for one finding against the whole file text.
pub fn fix_finding(content: &str, finding: &Finding) -> (String, FixOutcome) {
    if finding.check == "RedHat.ConsciousLanguage"
        && CONSCIOUS_LANGUAGE_EXCLUSIONS
            .iter()
            .any(|f| finding.file.contains(f))
    {
        return (
            content.to_string(),
            FixOutcome::skipped(
                &finding.matched,
                "Skipped: File discusses conscious language terms",
            ),
        );
    }

    let mut lines: Vec<String> = content.split('\n').map(str::to_string).collect();
    let Some(line) = finding.line.checked_sub(1).and_then(|i| lines.get(i)) else {
        return (
            content.to_string(),
            FixOutcome::skipped(
                &finding.matched,
                format!("Line {} not found in file", finding.line),
            ),
        );
    };

    let result = match (finding.action.as_deref(), finding.params.first()) {
        (Some("replace"), Some(replacement)) => apply_replacement(line, finding, replacement),
        (Some("edit"), Some(_)) => apply_regex_edit(line, finding),
        _ if finding.check == "RedHat.Spacing" => fix_double_spaces(line, finding),
        _ if finding.check == "RedHat.Using" => fix_using(line, finding),
        _ => Err(FixOutcome::skipped(
            &finding.matched,
            format!("No automatic fix available for {}", finding.check),
        )),
    };

    match result {
        Ok((new_line, outcome)) => {
            lines[finding.line - 1] = new_line;
            (lines.join("\n"), outcome)
        }
        Err(outcome) => (content.to_string(), outcome),
    }
}

type LineFix = std::result::Result<(String, FixOutcome), FixOutcome>;

fn apply_replacement(line: &str, finding: &Finding, replacement: &str) -> LineFix {
    let start = char_to_byte(line, finding.span.0.saturating_sub(1));
    let end = char_to_byte(line, finding.span.1);
    let at_span = match (start, end) {
        (Some(s), Some(e)) if s <= e && line[s..e].eq_ignore_ascii_case(&finding.matched) => {
            Some((s, e))
        }
        _ => None,
    };
    let (start, end) = match at_span {
        Some(range) => range,
        None => {
            let pattern = RegexBuilder::new(&regex::escape(&finding.matched))
                .case_insensitive(true)
                .build()
                .map_err(|e| FixOutcome::skipped(&finding.matched, e.to_string()))?;
            let m = pattern.find(line).ok_or_else(|| {
                FixOutcome::skipped(
                    &finding.matched,
                    format!("Could not locate '{}' in line {}", finding.matched, finding.line),
                )
            })?;
            (m.start(), m.end())
        }
    };

    let actual = &line[start..end];
    let replacement = match_initial_case(actual, replacement);
    let new_line = format!("{}{}{}", &line[..start], replacement, &line[end..]);
    let message = format!("Replaced '{}' with '{}'", actual, replacement);
    Ok((new_line, FixOutcome::applied(actual, &replacement, message)))
}

fn apply_regex_edit(line: &str, finding: &Finding) -> LineFix {
    let [_, pattern, replacement, ..] = finding.params.as_slice() else {
        return Err(FixOutcome::skipped(
            &finding.matched,
            "Invalid regex edit parameters",
        ));
    };
    let re = Regex::new(pattern).map_err(|e| FixOutcome::skipped(&finding.matched, e.to_string()))?;
    let new_line = re.replacen(line, 1, replacement.as_str()).into_owned();
    if new_line == line {
        return Err(FixOutcome::skipped(&finding.matched, "Regex pattern did not match"));
    }
    let fixed = re.replacen(&finding.matched, 1, replacement.as_str()).into_owned();
    Ok((new_line, FixOutcome::applied(&finding.matched, &fixed, "Applied regex replacement")))
}

fn fix_double_spaces(line: &str, finding: &Finding) -> LineFix {
    let spaces = Regex::new(r" {2,}").map_err(|e| FixOutcome::skipped(&finding.matched, e.to_string()))?;
    let new_line = spaces.replace_all(line, NoExpand(" ")).into_owned();
    if new_line == line {
        return Err(FixOutcome::skipped(&finding.matched, "No double spaces found"));
    }
    let fixed = spaces.replace_all(&finding.matched, NoExpand(" ")).into_owned();
    Ok((new_line, FixOutcome::applied(&finding.matched, &fixed, "Fixed double spacing")))
}

fn fix_using(line: &str, finding: &Finding) -> LineFix {
    let using = Regex::new(r"(?i)\b(\w+)(\s+)using\b")
        .map_err(|e| FixOutcome::skipped(&finding.matched, e.to_string()))?;
    let caps = using.captures(line).ok_or_else(|| {
        FixOutcome::skipped(&finding.matched, "Could not find 'using' pattern")
    })?;
    let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
    let fixed_span = format!("{}{}by using", &caps[1], &caps[2]);
    let new_line = format!("{}{}{}", &line[..whole.0], fixed_span, &line[whole.1..]);
    let fixed = finding.matched.replace(" using", " by using");
    Ok((new_line, FixOutcome::applied(&finding.matched, &fixed, "Changed 'using' to 'by using'")))
}

fn char_to_byte(line: &str, chars: usize) -> Option<usize> {
    if chars == line.chars().count() {
        return Some(line.len());
    }
    line.char_indices().nth(chars).map(|(i, _)| i)
}

/// Capitalize `replacement` when the text it replaces starts with a capital.
fn match_initial_case(actual: &str, replacement: &str) -> String {
    let upper_actual = actual.chars().next().is_some_and(char::is_uppercase);
    let mut chars = replacement.chars();
    match chars.next() {
        Some(first) if upper_actual && first.is_lowercase() => {
            first.to_uppercase().chain(chars).collect()
        }
        _ => replacement.to_string(),
    }
}

/// Per-file fix counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileCounts {
    pub fixed: usize,
    pub skipped: usize,
    pub manual_review: usize,
}

/// Everything one fixer run did.
#[derive(Debug, Default)]
pub struct LintSummary {
    pub total_findings: usize,
    pub files: BTreeMap<String, FileCounts>,
    pub results: Vec<(Finding, FixOutcome)>,
    pub manual_review: Vec<Finding>,
    pub errors: Vec<FileError>,
}

impl LintSummary {
    pub fn fixed(&self) -> usize {
        self.results.iter().filter(|(_, r)| r.success).count()
    }
}

/// Applies auto-fixable findings file by file.
pub struct LintFixer<'a> {
    root: &'a Path,
    dry_run: bool,
}

impl<'a> LintFixer<'a> {
    pub fn new(root: &'a Path, dry_run: bool) -> Self {
        Self { root, dry_run }
    }

    pub fn fix_all(&self, findings: &Findings) -> LintSummary {
        let mut summary = LintSummary {
            total_findings: findings.values().map(Vec::len).sum(),
            ..LintSummary::default()
        };
        for (file, file_findings) in findings {
            match self.fix_file(file, file_findings, &mut summary) {
                Ok(counts) => {
                    summary.files.insert(file.clone(), counts);
                }
                Err(e) => {
                    warn!("{}", e);
                    summary.errors.push(FileError {
                        path: file.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }
        summary
    }

    fn fix_file(&self, file: &str, findings: &[Finding], summary: &mut LintSummary) -> Result<FileCounts> {
        let path: PathBuf = self.root.join(file);
        let original = read_document(&path)?;
        let mut content = original.clone();
        let mut counts = FileCounts::default();

        // Back to front so earlier spans stay valid.
        let mut ordered: Vec<&Finding> = findings.iter().collect();
        ordered.sort_by_key(|f| std::cmp::Reverse((f.line, f.span.0)));

        for finding in ordered {
            if !finding.can_auto_fix() {
                counts.manual_review += 1;
                summary.manual_review.push(finding.clone());
                continue;
            }
            let (updated, outcome) = fix_finding(&content, finding);
            content = updated;
            if outcome.success {
                counts.fixed += 1;
            } else {
                counts.skipped += 1;
            }
            summary.results.push((finding.clone(), outcome));
        }

        if !self.dry_run && content != original {
            write_document(&path, &content)?;
        }
        Ok(counts)
    }
}

/// Human-readable report of findings, fixes, and manual-review items.
pub fn render_report(summary: &LintSummary) -> String {
    let rule = "=".repeat(80);
    let thin = "-".repeat(40);
    let mut out = vec![
        rule.clone(),
        "DOCUMENTATION LINT FINDINGS REPORT".to_string(),
        "CQA 2.1 content quality checks".to_string(),
        rule.clone(),
        String::new(),
        "SUMMARY".to_string(),
        thin.clone(),
        format!("Total issues found:     {}", summary.total_findings),
        format!("Automatically fixed:    {}", summary.fixed()),
        format!("Need manual review:     {}", summary.manual_review.len()),
        format!("Files affected:         {}", summary.files.len() + summary.errors.len()),
        String::new(),
    ];

    let mut by_type: BTreeMap<&str, usize> = BTreeMap::new();
    for (finding, _) in &summary.results {
        *by_type.entry(finding.check.as_str()).or_default() += 1;
    }
    for finding in &summary.manual_review {
        *by_type.entry(finding.check.as_str()).or_default() += 1;
    }
    let mut by_type: Vec<_> = by_type.into_iter().collect();
    by_type.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    out.push("ISSUES BY TYPE".to_string());
    out.push(thin.clone());
    for (check, count) in by_type {
        out.push(format!("  {:4}  {}", count, check));
    }
    out.push(String::new());

    if summary.results.iter().any(|(_, r)| r.success) {
        out.push("AUTOMATIC FIXES APPLIED".to_string());
        out.push(thin.clone());
        for (finding, result) in summary.results.iter().filter(|(_, r)| r.success) {
            out.push(format!("  {}:{}", finding.file, finding.line));
            out.push(format!("    {}", finding.check));
            out.push(format!("    '{}' -> '{}'", result.original, result.replacement));
        }
        out.push(String::new());
    }

    if !summary.manual_review.is_empty() {
        out.push("ISSUES REQUIRING MANUAL REVIEW".to_string());
        out.push(thin);
        let mut grouped: BTreeMap<&str, Vec<&Finding>> = BTreeMap::new();
        for finding in &summary.manual_review {
            grouped.entry(finding.check.as_str()).or_default().push(finding);
        }
        for (check, findings) in grouped {
            out.push(format!("\n  {} ({} issues)", check, findings.len()));
            out.push(format!("  {}", "~".repeat(38)));
            for finding in findings.iter().take(MANUAL_REVIEW_SHOWN) {
                out.push(format!("    {}:{}", finding.file, finding.line));
                out.push(format!("      Match: '{}'", finding.matched));
                out.push(format!("      Message: {}", finding.message));
            }
            if findings.len() > MANUAL_REVIEW_SHOWN {
                out.push(format!("    ... and {} more", findings.len() - MANUAL_REVIEW_SHOWN));
            }
        }
    }

    for e in &summary.errors {
        out.push(format!("  error: {}: {}", e.path, e.message));
    }
    out.push(String::new());
    out.join("\n")
}
