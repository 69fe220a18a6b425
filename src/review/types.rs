//! Data model of the multi-agent review engine.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

// ── Agent kind ───────────────────────────────────────────────────

/// The fixed set of review specializations.
///
/// Declaration order is the output order of every review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Security,
    Performance,
    CodeQuality,
    Documentation,
    Testing,
}

impl AgentKind {
    /// Every kind, in declaration order.
    pub const ALL: [AgentKind; 5] = [
        Self::Security,
        Self::Performance,
        Self::CodeQuality,
        Self::Documentation,
        Self::Testing,
    ];

    /// Wire name (`code_quality`, …).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Security => "security",
            Self::Performance => "performance",
            Self::CodeQuality => "code_quality",
            Self::Documentation => "documentation",
            Self::Testing => "testing",
        }
    }

    /// Human-readable title.
    pub fn title(self) -> &'static str {
        match self {
            Self::Security => "Security",
            Self::Performance => "Performance",
            Self::CodeQuality => "Code Quality",
            Self::Documentation => "Documentation",
            Self::Testing => "Testing",
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Severity ─────────────────────────────────────────────────────

/// Urgency of a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Severity {
    /// Informational suggestion, not a blocker.
    Low,
    /// Should be addressed but not urgent.
    Medium,
    /// Important issue that should be fixed before merge.
    High,
    /// Must-fix: correctness or security problem.
    Critical,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }

    /// Parse a model-provided severity; anything unrecognized is `Low`.
    pub fn from_str_lossy(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "critical" => Self::Critical,
            "high" => Self::High,
            "medium" => Self::Medium,
            _ => Self::Low,
        }
    }
}

impl From<String> for Severity {
    fn from(s: String) -> Self {
        Self::from_str_lossy(&s)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

fn default_severity() -> Severity {
    Severity::Low
}

/// Line number given as a number or a numeric string; anything else is `None`.
fn lenient_line<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Line {
        Number(u32),
        Text(String),
        Other(serde::de::IgnoredAny),
    }

    Ok(match Option::<Line>::deserialize(deserializer)? {
        Some(Line::Number(n)) => Some(n),
        Some(Line::Text(s)) => s.trim().parse().ok(),
        Some(Line::Other(_)) | None => None,
    })
}

// ── Suggestion ───────────────────────────────────────────────────

/// One actionable finding from an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Path of the file the finding refers to.
    pub file: String,
    #[serde(
        default,
        deserialize_with = "lenient_line",
        skip_serializing_if = "Option::is_none"
    )]
    pub line_start: Option<u32>,
    #[serde(
        default,
        deserialize_with = "lenient_line",
        skip_serializing_if = "Option::is_none"
    )]
    pub line_end: Option<u32>,
    /// What is wrong.
    pub issue: String,
    /// How to fix it.
    #[serde(default)]
    pub suggestion: String,
    #[serde(default = "default_severity")]
    pub severity: Severity,
}

impl Suggestion {
    /// `path:start-end`, `path:line` or just `path`.
    pub fn location(&self) -> String {
        match (self.line_start, self.line_end) {
            (Some(start), Some(end)) if end != start => format!("{}:{}-{}", self.file, start, end),
            (Some(line), _) | (None, Some(line)) => format!("{}:{}", self.file, line),
            (None, None) => self.file.clone(),
        }
    }
}

// ── Agent result ─────────────────────────────────────────────────

/// Complete output of one agent.
///
/// `feedback` is never empty; `suggestions` may be.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentReviewResult {
    #[serde(rename = "type")]
    pub kind: AgentKind,
    pub feedback: String,
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
}

impl AgentReviewResult {
    /// Count suggestions at a given severity.
    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.suggestions
            .iter()
            .filter(|s| s.severity == severity)
            .count()
    }

    /// Highest severity among the suggestions.
    pub fn max_severity(&self) -> Option<Severity> {
        self.suggestions.iter().map(|s| s.severity).max()
    }
}

// ── Per-agent outcome ────────────────────────────────────────────

/// Settled outcome of one agent in a fan-out.
#[derive(Debug, Clone)]
pub enum AgentOutcome {
    Completed(AgentReviewResult),
    Failed { kind: AgentKind, reason: String },
}

impl AgentOutcome {
    pub fn kind(&self) -> AgentKind {
        match self {
            Self::Completed(result) => result.kind,
            Self::Failed { kind, .. } => *kind,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn into_result(self) -> Option<AgentReviewResult> {
        match self {
            Self::Completed(result) => Some(result),
            Self::Failed { .. } => None,
        }
    }
}

// ── Analysis request ─────────────────────────────────────────────

/// The diff of one change, shared read-only by every agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    diff: String,
}

impl AnalysisRequest {
    pub fn new(diff: impl Into<String>) -> Self {
        Self { diff: diff.into() }
    }

    pub fn diff(&self) -> &str {
        &self.diff
    }

    /// Paths named by the diff's file headers, deduplicated and sorted.
    pub fn changed_files(&self) -> Vec<String> {
        let mut files = BTreeSet::new();
        for line in self.diff.lines() {
            if let Some(rest) = line.strip_prefix("diff --git ") {
                if let Some((_, b)) = rest.split_once(" b/") {
                    files.insert(b.trim().to_string());
                }
            } else if let Some(path) = line.strip_prefix("+++ ") {
                let path = path.split('\t').next().unwrap_or(path).trim();
                if path != "/dev/null" {
                    files.insert(path.strip_prefix("b/").unwrap_or(path).to_string());
                }
            }
        }
        files.into_iter().collect()
    }

    /// Rough token count (~4 characters per token).
    pub fn estimated_tokens(&self) -> usize {
        self.diff.chars().count().div_ceil(4)
    }
}

impl From<&str> for AnalysisRequest {
    fn from(diff: &str) -> Self {
        Self::new(diff)
    }
}

impl From<String> for AnalysisRequest {
    fn from(diff: String) -> Self {
        Self::new(diff)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn severity_parses_leniently() {
        let s: Severity = serde_json::from_str(r#""HIGH""#).unwrap();
        assert_eq!(s, Severity::High);
        let s: Severity = serde_json::from_str(r#""info""#).unwrap();
        assert_eq!(s, Severity::Low);
        assert_eq!(serde_json::to_string(&Severity::Critical).unwrap(), r#""critical""#);
    }

    #[test]
    fn agent_kind_wire_names() {
        assert_eq!(
            serde_json::to_string(&AgentKind::CodeQuality).unwrap(),
            r#""code_quality""#
        );
        let names: Vec<&str> = AgentKind::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(
            names,
            ["security", "performance", "code_quality", "documentation", "testing"]
        );
    }

    #[test]
    fn result_serializes_kind_as_type() {
        let result = AgentReviewResult {
            kind: AgentKind::Testing,
            feedback: "Add tests".into(),
            suggestions: vec![],
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["type"], "testing");
        assert_eq!(json["suggestions"], serde_json::json!([]));
    }

    #[test]
    fn suggestion_location_formats() {
        let mut s = Suggestion {
            file: "src/db.rs".into(),
            line_start: Some(10),
            line_end: Some(14),
            issue: "raw SQL".into(),
            suggestion: "bind parameters".into(),
            severity: Severity::Critical,
        };
        assert_eq!(s.location(), "src/db.rs:10-14");
        s.line_end = Some(10);
        assert_eq!(s.location(), "src/db.rs:10");
        s.line_start = None;
        s.line_end = None;
        assert_eq!(s.location(), "src/db.rs");
    }

    #[test]
    fn line_numbers_accept_numeric_strings() {
        let s: Suggestion = serde_json::from_str(
            r#"{"file": "a.py", "line_start": " 7 ", "line_end": "eight", "issue": "x"}"#,
        )
        .unwrap();
        assert_eq!(s.line_start, Some(7));
        assert_eq!(s.line_end, None);

        let s: Suggestion =
            serde_json::from_str(r#"{"file": "a.py", "line_start": -3, "issue": "x"}"#).unwrap();
        assert_eq!(s.line_start, None);
    }

    #[test]
    fn result_severity_helpers() {
        let mk = |severity| Suggestion {
            file: "a.py".into(),
            line_start: None,
            line_end: None,
            issue: "i".into(),
            suggestion: "s".into(),
            severity,
        };
        let result = AgentReviewResult {
            kind: AgentKind::Security,
            feedback: "f".into(),
            suggestions: vec![mk(Severity::Low), mk(Severity::High), mk(Severity::High)],
        };
        assert_eq!(result.count_by_severity(Severity::High), 2);
        assert_eq!(result.max_severity(), Some(Severity::High));
    }

    #[test]
    fn changed_files_from_git_and_unified_headers() {
        let diff = "diff --git a/src/app.ts b/src/app.ts\n\
                    --- a/src/app.ts\n\
                    +++ b/src/app.ts\n\
                    @@ -1 +1 @@\n\
                    -a\n\
                    +b\n\
                    --- a/old.py\n\
                    +++ /dev/null\n\
                    --- a/x.py\t2024-01-01\n\
                    +++ b/x.py\t2024-01-02\n";
        let request = AnalysisRequest::new(diff);
        assert_eq!(request.changed_files(), vec!["src/app.ts", "x.py"]);
    }

    #[test]
    fn estimated_tokens_rounds_up() {
        assert_eq!(AnalysisRequest::new("").estimated_tokens(), 0);
        assert_eq!(AnalysisRequest::new("abcde").estimated_tokens(), 2);
    }

    #[test]
    fn outcome_accessors() {
        let failed = AgentOutcome::Failed {
            kind: AgentKind::Performance,
            reason: "boom".into(),
        };
        assert_eq!(failed.kind(), AgentKind::Performance);
        assert!(!failed.is_completed());
        assert!(failed.into_result().is_none());
    }
}
