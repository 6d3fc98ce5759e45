//! Review orchestration for patchbot.
//!
//! Provides the review pipeline: event decoding, prompt construction, the
//! model client, the GitHub gateway, and the orchestrator that ties them
//! together for one pull request.

pub mod event;
pub mod github;
pub mod llm;
pub mod pipeline;
pub mod prompt;
