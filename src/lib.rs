//! Multi-agent code review over an OpenAI-compatible completion backend.

pub mod config;
pub mod providers;
pub mod review;

pub use config::Config;
pub use review::{AgentKind, AgentReviewResult, AnalysisRequest, ReviewPipeline};
