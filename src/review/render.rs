//! Markdown rendering of an aggregated review.
//!
//! Used by the presentation layer before posting: one summary comment for
//! the whole review, bounded by `max_comment_length`.

use super::types::{AgentReviewResult, Severity};

const TRUNCATION_MARKER: &str = "\n\n*…truncated*";

impl AgentReviewResult {
    /// Format one agent's result as a Markdown section.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        md.push_str(&format!("### {} Review\n\n", self.kind.title()));
        md.push_str(&format!("{}\n\n", self.feedback));

        let Some(highest) = self.max_severity() else {
            md.push_str("No suggestions.\n");
            return md;
        };
        md.push_str(&format!("Highest severity: **{highest}**\n\n"));

        md.push_str("| Severity | Location | Issue | Suggestion |\n");
        md.push_str("|----------|----------|-------|------------|\n");
        for s in &self.suggestions {
            md.push_str(&format!(
                "| {} | `{}` | {} | {} |\n",
                s.severity.label(),
                s.location(),
                escape_cell(&s.issue),
                escape_cell(&s.suggestion),
            ));
        }
        md
    }
}

/// Render the summary comment for a review.
///
/// Returns `None` for an empty review: nothing should be posted.
pub fn render_review(results: &[AgentReviewResult], max_len: usize) -> Option<String> {
    if results.is_empty() {
        return None;
    }

    let total: usize = results.iter().map(|r| r.suggestions.len()).sum();
    let count = |severity: Severity| -> usize {
        results.iter().map(|r| r.count_by_severity(severity)).sum()
    };

    let mut md = String::from("## Agentic Code Review\n\n");
    md.push_str(&format!(
        "{} agent(s) reported {} suggestion(s). Critical: {} | High: {} | Medium: {} | Low: {}\n\n",
        results.len(),
        total,
        count(Severity::Critical),
        count(Severity::High),
        count(Severity::Medium),
        count(Severity::Low),
    ));

    for result in results {
        md.push_str("---\n\n");
        md.push_str(&result.to_markdown());
        md.push('\n');
    }

    Some(truncate_comment(&md, max_len))
}

/// Cut `text` to at most `max_len` characters, marking the cut.
pub fn truncate_comment(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    let marker_len = TRUNCATION_MARKER.chars().count();
    if max_len <= marker_len {
        return text.chars().take(max_len).collect();
    }
    let mut out: String = text.chars().take(max_len - marker_len).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

// ── Tests ────────────────────────────────────────────────────────
