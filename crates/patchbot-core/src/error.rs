use std::path::PathBuf;

/// Errors that can occur across the patchbot workspace.
///
/// Library crates use this type directly; the binary renders it through
/// `miette` at the boundary. Filtering decisions and early run terminations
/// are not errors and never appear here.
///
/// # Examples
///
/// ```
/// use patchbot_core::PatchbotError;
///
/// let err = PatchbotError::Config("missing API key".into());
/// assert!(err.to_string().contains("missing API key"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum PatchbotError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    #[diagnostic(code(patchbot::io))]
    Io(#[from] std::io::Error),

    /// Invalid or incomplete configuration.
    #[error("configuration error: {0}")]
    #[diagnostic(
        code(patchbot::config),
        help("check .patchbot.toml and the TARGETS / IGNORE / OPENAI_API_KEY variables")
    )]
    Config(String),

    /// Inbound event payload is missing a required field or has the wrong shape.
    #[error("malformed event: {0}")]
    #[diagnostic(
        code(patchbot::event),
        help("patchbot expects a pull_request or repository_dispatch event payload")
    )]
    MalformedEvent(String),

    /// Hosting platform (GitHub) request failure.
    #[error("gateway error: {0}")]
    #[diagnostic(code(patchbot::gateway))]
    Gateway(String),

    /// Model invocation failure.
    #[error("review request failed: {0}")]
    #[diagnostic(code(patchbot::review))]
    ReviewRequestFailed(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    #[diagnostic(code(patchbot::serialization))]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    #[diagnostic(code(patchbot::toml))]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    #[diagnostic(code(patchbot::not_found))]
    FileNotFound(PathBuf),
}
