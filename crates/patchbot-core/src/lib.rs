//! Core types, configuration, and error handling for patchbot.
//!
//! This crate provides the shared foundation used by the other crates:
//! - [`PatchbotError`] - unified error type using `thiserror` and `miette`
//! - [`PatchbotConfig`] - configuration from `.patchbot.toml` and the environment
//! - [`Env`] - environment lookups that tests can replace
//! - Shared types: [`PullRequestDescriptor`], [`ChangedFile`], [`FileStatus`],
//!   [`TriggerMode`], [`RepoRef`], [`OutputFormat`]

mod config;
mod env;
mod error;
mod types;

pub use config::{
    split_globs, ExcludeSpec, FilterConfig, LlmConfig, PatchbotConfig, PromptConfig, API_KEY_VAR,
    DEFAULT_NO_REVIEW_LABELS, EXCLUDE_NOTHING,
};
pub use env::Env;
pub use error::PatchbotError;
pub use types::{
    ChangedFile, FileStatus, OutputFormat, PullRequestDescriptor, PullRequestState, RepoRef,
    TriggerMode,
};

/// A convenience `Result` type for patchbot operations.
pub type Result<T> = std::result::Result<T, PatchbotError>;
