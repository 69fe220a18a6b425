//! Multi-agent code review engine.
//!
//! One diff is reviewed by up to five specialized agents (security,
//! performance, code quality, documentation, testing). Each agent sends a
//! two-message conversation to the completion backend and parses the reply
//! into an [`AgentReviewResult`]; the [`ReviewPipeline`] runs the enabled
//! agents concurrently and aggregates their results.
//!
//! ## Architecture
//!
//! ```text
//! AnalysisRequest ─▸ ReviewPipeline ─┬─▸ AnalysisTask(security)      ─┐
//!                                    ├─▸ AnalysisTask(performance)   ─┤
//!                                    ├─▸ …                            ├─▸ Vec<AgentReviewResult>
//!                                    └─▸ AnalysisTask(testing)       ─┘
//!                                              │
//!                                              └─▸ CompletionClient (retry, backoff, fallback)
//! ```
//!
//! ## Extension
//!
//! Add an agent by adding an [`AgentKind`] variant and an
//! [`AnalysisTask`] record in [`agents::TASKS`].

pub mod agents;
pub mod pipeline;
pub mod render;
pub mod types;

pub use agents::{task_for, AnalysisTask, ParsedReply};
pub use pipeline::ReviewPipeline;
pub use render::render_review;
pub use types::{
    AgentKind, AgentOutcome, AgentReviewResult, AnalysisRequest, Severity, Suggestion,
};
