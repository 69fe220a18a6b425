//! Review agent definitions.
//!
//! Every agent is an [`AnalysisTask`] record: a focus list and a handful of
//! labels that are rendered into the shared system prompt and output
//! contract. One routine ([`AnalysisTask::run`]) evaluates all of them, so
//! adding an agent means adding a record to [`TASKS`].

use serde::Deserialize;

use super::types::{AgentKind, AgentReviewResult, AnalysisRequest, Suggestion};
use crate::providers::{ChatMessage, CompletionClient, CompletionError};

// ── Task records ─────────────────────────────────────────────────

/// Prompt and fallback text for one review specialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisTask {
    pub kind: AgentKind,
    /// Expert persona, e.g. "a security expert".
    pub persona: &'static str,
    /// Bullet points the agent focuses on.
    pub focus: &'static [&'static str],
    /// What `feedback` summarizes, e.g. "Overall security assessment".
    pub assessment: &'static str,
    /// Placeholder for the `issue` field.
    pub issue_hint: &'static str,
    /// Placeholder for the `suggestion` field.
    pub fix_hint: &'static str,
    /// Ending of the user instruction ("for security vulnerabilities").
    pub instruction: &'static str,
    /// Feedback used when the structured reply has none.
    pub default_feedback: &'static str,
}

/// All agents, in [`AgentKind`] declaration order.
pub static TASKS: [AnalysisTask; 5] = [
    AnalysisTask {
        kind: AgentKind::Security,
        persona: "a security expert",
        focus: &[
            "SQL injection vulnerabilities",
            "XSS vulnerabilities",
            "Authentication/authorization issues",
            "Data validation problems",
            "Sensitive data exposure",
            "Insecure dependencies",
            "CORS misconfigurations",
        ],
        assessment: "Overall security assessment",
        issue_hint: "Security issue description",
        fix_hint: "How to fix it",
        instruction: "for security vulnerabilities",
        default_feedback: "No security issues detected.",
    },
    AnalysisTask {
        kind: AgentKind::Performance,
        persona: "a performance expert",
        focus: &[
            "Algorithm efficiency (O(n) complexity)",
            "Database query optimization",
            "Memory usage patterns",
            "Caching opportunities",
            "Unnecessary loops or iterations",
            "Blocking operations",
            "Resource leaks",
        ],
        assessment: "Overall performance assessment",
        issue_hint: "Performance issue description",
        fix_hint: "How to optimize it",
        instruction: "for performance issues",
        default_feedback: "No performance issues detected.",
    },
    AnalysisTask {
        kind: AgentKind::CodeQuality,
        persona: "a code quality expert",
        focus: &[
            "Code readability and clarity",
            "Naming conventions",
            "Function/method length and complexity",
            "DRY principle violations",
            "SOLID principles",
            "Error handling",
            "Code organization and structure",
            "Type safety",
        ],
        assessment: "Overall code quality assessment",
        issue_hint: "Code quality issue description",
        fix_hint: "How to improve it",
        instruction: "for code quality issues",
        default_feedback: "Code quality looks good.",
    },
    AnalysisTask {
        kind: AgentKind::Documentation,
        persona: "a documentation expert",
        focus: &[
            "Missing function/method documentation",
            "Incomplete or unclear comments",
            "README updates needed",
            "API documentation",
            "Type definitions documentation",
            "Example usage",
            "Changelog updates",
        ],
        assessment: "Overall documentation assessment",
        issue_hint: "Documentation issue description",
        fix_hint: "What documentation to add",
        instruction: "for documentation needs",
        default_feedback: "Documentation looks adequate.",
    },
    AnalysisTask {
        kind: AgentKind::Testing,
        persona: "a testing expert",
        focus: &[
            "Missing unit tests for new functions",
            "Integration test coverage",
            "Edge case testing",
            "Error condition testing",
            "Mock usage",
            "Test organization",
            "Test naming conventions",
        ],
        assessment: "Overall testing assessment",
        issue_hint: "Testing issue description",
        fix_hint: "What tests to add",
        instruction: "for testing needs",
        default_feedback: "Testing coverage looks adequate.",
    },
];

/// Look up the record for `kind`.
pub fn task_for(kind: AgentKind) -> &'static AnalysisTask {
    let index = match kind {
        AgentKind::Security => 0,
        AgentKind::Performance => 1,
        AgentKind::CodeQuality => 2,
        AgentKind::Documentation => 3,
        AgentKind::Testing => 4,
    };
    &TASKS[index]
}

// ── Parsed reply ─────────────────────────────────────────────────

/// Outcome of interpreting a raw completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedReply {
    /// The reply matched the JSON contract.
    Structured(AgentReviewResult),
    /// The reply was not a JSON object; its text became the feedback.
    RawText(AgentReviewResult),
}

impl ParsedReply {
    pub fn is_raw_text(&self) -> bool {
        matches!(self, Self::RawText(_))
    }

    pub fn into_result(self) -> AgentReviewResult {
        match self {
            Self::Structured(result) | Self::RawText(result) => result,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReplyEnvelope {
    #[serde(default)]
    feedback: Option<serde_json::Value>,
    #[serde(default)]
    suggestions: Option<serde_json::Value>,
}

impl AnalysisTask {
    /// System instruction: persona, focus list and the output contract.
    pub fn system_prompt(&self) -> String {
        let focus = self
            .focus
            .iter()
            .map(|f| format!("- {f}"))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"You are {persona} reviewing code changes. Focus on:
{focus}

Respond in JSON format with:
{{
  "feedback": "{assessment}",
  "suggestions": [
    {{
      "file": "filename",
      "line_start": number,
      "line_end": number,
      "issue": "{issue}",
      "suggestion": "{fix}",
      "severity": "low|medium|high|critical"
    }}
  ]
}}"#,
            persona = self.persona,
            focus = focus,
            assessment = self.assessment,
            issue = self.issue_hint,
            fix = self.fix_hint,
        )
    }

    /// User instruction embedding the diff verbatim.
    pub fn user_prompt(&self, request: &AnalysisRequest) -> String {
        format!(
            "Review this code diff {}:\n\n{}",
            self.instruction,
            request.diff()
        )
    }

    /// The two-message conversation sent to the backend.
    pub fn messages(&self, request: &AnalysisRequest) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(self.system_prompt()),
            ChatMessage::user(self.user_prompt(request)),
        ]
    }

    /// Run this agent against `request`.
    ///
    /// Backend failures propagate; parsing never fails.
    pub async fn run(
        &self,
        client: &CompletionClient,
        request: &AnalysisRequest,
    ) -> Result<ParsedReply, CompletionError> {
        let raw = client.complete(&self.messages(request)).await?;
        let reply = self.parse_reply(&raw);
        if reply.is_raw_text() {
            tracing::warn!(
                kind = %self.kind,
                chars = raw.len(),
                "Agent reply did not match the JSON contract, using raw text as feedback"
            );
        }
        Ok(reply)
    }

    /// Interpret a raw completion.
    ///
    /// - A reply that is entirely one JSON object (bare, or the sole
    ///   content of a Markdown fence) is structured: a non-empty string
    ///   `feedback` is used verbatim, else the default; each well-formed
    ///   entry of `suggestions` is kept, malformed entries are skipped.
    /// - A fenced object carrying neither `feedback` nor `suggestions` is
    ///   an example snippet, not a verdict, and counts as prose.
    /// - Anything else becomes the feedback verbatim with no suggestions.
    pub fn parse_reply(&self, raw: &str) -> ParsedReply {
        if raw.trim().is_empty() {
            // An empty completion is an empty object: nothing to report.
            return ParsedReply::Structured(self.result(self.default_feedback.into(), vec![]));
        }

        let envelope = whole_reply_object(raw).and_then(|(json, fenced)| {
            serde_json::from_str::<ReplyEnvelope>(json)
                .ok()
                .filter(|env| !fenced || env.feedback.is_some() || env.suggestions.is_some())
        });

        let Some(envelope) = envelope else {
            return ParsedReply::RawText(self.result(raw.to_string(), vec![]));
        };

        let feedback = envelope
            .feedback
            .as_ref()
            .and_then(serde_json::Value::as_str)
            .filter(|f| !f.trim().is_empty())
            .map_or_else(|| self.default_feedback.to_string(), str::to_string);

        let suggestions = match envelope.suggestions {
            Some(serde_json::Value::Array(items)) => self.well_formed_suggestions(items),
            _ => vec![],
        };

        ParsedReply::Structured(self.result(feedback, suggestions))
    }

    fn well_formed_suggestions(&self, items: Vec<serde_json::Value>) -> Vec<Suggestion> {
        let total = items.len();
        let kept: Vec<Suggestion> = items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect();
        if kept.len() < total {
            tracing::debug!(
                kind = %self.kind,
                skipped = total - kept.len(),
                "Skipping malformed suggestions"
            );
        }
        kept
    }

    fn result(&self, feedback: String, suggestions: Vec<Suggestion>) -> AgentReviewResult {
        AgentReviewResult {
            kind: self.kind,
            feedback,
            suggestions,
        }
    }
}

// ── Reply shape ──────────────────────────────────────────────────

/// JSON object text of a reply that consists of nothing else.
///
/// Returns the object and whether it came out of a code fence. A fence
/// must wrap the whole reply; one embedded in prose is not extracted.
fn whole_reply_object(raw: &str) -> Option<(&str, bool)> {
    let text = raw.trim();
    if text.starts_with('{') {
        return Some((text, false));
    }

    let inner = text.strip_prefix("```")?.strip_suffix("```")?;
    if inner.contains("```") {
        return None;
    }
    // Drop a language tag such as `json` on the opening fence line.
    let body = match inner.split_once('\n') {
        Some((tag, rest)) if !tag.trim_start().starts_with('{') => rest,
        _ => inner,
    };
    let body = body.trim();
    body.starts_with('{').then_some((body, true))
}

// ── Tests ────────────────────────────────────────────────────────
