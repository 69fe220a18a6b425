//! Multi-agent review pipeline.
//!
//! Fans one diff out to every enabled agent concurrently, waits for all of
//! them, and returns their results in [`AgentKind`] declaration order:
//!
//! ```text
//!          ┌─▸ security ──────┐
//! diff ────┼─▸ performance ───┤
//!          ├─▸ code_quality ──┼─▸ join all ─▸ ordered results | nothing
//!          ├─▸ documentation ─┤
//!          └─▸ testing ───────┘
//! ```
//!
//! [`ReviewPipeline::review`] is all-or-nothing: one failed agent voids the
//! whole review. [`ReviewPipeline::review_settled`] exposes per-agent
//! outcomes for callers that prefer a best-effort review.

use futures_util::future::join_all;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::agents::{task_for, AnalysisTask};
use super::types::{AgentKind, AgentOutcome, AgentReviewResult, AnalysisRequest};
use crate::config::Config;
use crate::providers::{CompletionBackend, CompletionClient, ModelSettings};

/// Review orchestrator bound to one configuration snapshot.
pub struct ReviewPipeline {
    tasks: Vec<&'static AnalysisTask>,
    client: CompletionClient,
    raw_fallbacks: AtomicUsize,
}

impl ReviewPipeline {
    /// Build a pipeline from `config`.
    ///
    /// The enabled agents and model settings are copied out of `config`
    /// here; later changes to the configuration do not affect this pipeline.
    pub fn from_config(config: &Config, backend: Arc<dyn CompletionBackend>) -> Self {
        let tasks = config.enabled_agents().into_iter().map(task_for).collect();
        let client = CompletionClient::new(backend, ModelSettings::from_config(config));
        Self::with_client(tasks, client)
    }

    /// Create a pipeline from explicit tasks (for testing or extension).
    pub fn with_client(mut tasks: Vec<&'static AnalysisTask>, client: CompletionClient) -> Self {
        tasks.sort_by_key(|task| task.kind);
        tasks.dedup_by_key(|task| task.kind);
        Self {
            tasks,
            client,
            raw_fallbacks: AtomicUsize::new(0),
        }
    }

    /// Enabled agents, in output order.
    pub fn agents(&self) -> Vec<AgentKind> {
        self.tasks.iter().map(|task| task.kind).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// How many agent replies so far fell back to raw-text feedback.
    pub fn raw_fallbacks(&self) -> usize {
        self.raw_fallbacks.load(Ordering::Relaxed)
    }

    /// Run every enabled agent and return one outcome per agent.
    ///
    /// Agents run concurrently; the result order is the declaration order
    /// of [`AgentKind`], independent of completion order.
    pub async fn review_settled(&self, request: &AnalysisRequest) -> Vec<AgentOutcome> {
        if self.tasks.is_empty() {
            tracing::info!("No review agents enabled, skipping review");
            return vec![];
        }

        tracing::info!(
            agents = self.tasks.len(),
            files = request.changed_files().len(),
            "Starting comprehensive agentic review"
        );

        let runs = self.tasks.iter().map(|task| async move {
            match task.run(&self.client, request).await {
                Ok(reply) => {
                    if reply.is_raw_text() {
                        self.raw_fallbacks.fetch_add(1, Ordering::Relaxed);
                    }
                    let result = reply.into_result();
                    tracing::info!(
                        kind = %task.kind,
                        suggestions = result.suggestions.len(),
                        "Agent review completed"
                    );
                    AgentOutcome::Completed(result)
                }
                Err(e) => {
                    tracing::warn!(kind = %task.kind, error = %e, "Agent review failed");
                    AgentOutcome::Failed {
                        kind: task.kind,
                        reason: e.to_string(),
                    }
                }
            }
        });

        join_all(runs).await
    }

    /// Run every enabled agent; all results or none.
    ///
    /// Returns an empty list when no agent is enabled or when any agent
    /// failed. Callers must treat an empty list as "no review produced".
    pub async fn review(&self, request: &AnalysisRequest) -> Vec<AgentReviewResult> {
        let outcomes = self.review_settled(request).await;

        let failed: Vec<AgentKind> = outcomes
            .iter()
            .filter(|outcome| !outcome.is_completed())
            .map(AgentOutcome::kind)
            .collect();

        if !failed.is_empty() {
            let kinds = failed
                .iter()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::error!(
                failed = %kinds,
                "Error in agent reviews, discarding {} result(s)",
                outcomes.len() - failed.len()
            );
            return vec![];
        }

        let results: Vec<AgentReviewResult> = outcomes
            .into_iter()
            .filter_map(AgentOutcome::into_result)
            .collect();
        if !results.is_empty() {
            tracing::info!("All {} agent reviews completed successfully", results.len());
        }
        results
    }
}

// ── Tests ────────────────────────────────────────────────────────
