use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Owner and name of the repository a pull request lives in.
///
/// # Examples
///
/// ```
/// use patchbot_core::RepoRef;
///
/// let repo = RepoRef::new("octocat", "hello-world");
/// assert_eq!(repo.to_string(), "octocat/hello-world");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRef {
    /// Account or organization login.
    pub owner: String,
    /// Repository name without the owner.
    pub name: String,
}

impl RepoRef {
    /// Build a reference from owner and name.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Lifecycle state of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PullRequestState {
    /// Open and accepting updates.
    Open,
    /// Closed or merged.
    Closed,
}

/// The subset of a pull request the review pipeline needs.
///
/// Built once per event by the event adapter, regardless of whether the
/// event was a direct lifecycle event or a relayed snapshot.
///
/// # Examples
///
/// ```
/// use patchbot_core::{PullRequestDescriptor, PullRequestState};
///
/// let pr = PullRequestDescriptor {
///     number: 7,
///     base_sha: "aaa".into(),
///     head_sha: "bbb".into(),
///     labels: ["wip".to_string()].into_iter().collect(),
///     state: PullRequestState::Open,
///     locked: false,
///     html_url: "https://github.com/o/r/pull/7".into(),
/// };
/// assert!(pr.has_label("wip"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestDescriptor {
    /// Pull request number within the repository.
    pub number: u64,
    /// Commit SHA of the base branch tip the PR is compared against.
    pub base_sha: String,
    /// Commit SHA of the PR head.
    pub head_sha: String,
    /// Names of the labels attached to the PR.
    pub labels: BTreeSet<String>,
    /// Open or closed.
    pub state: PullRequestState,
    /// Whether conversation on the PR is locked.
    pub locked: bool,
    /// Browser URL of the PR.
    pub html_url: String,
}

impl PullRequestDescriptor {
    /// Returns `true` if a label with exactly this name is attached.
    pub fn has_label(&self, name: &str) -> bool {
        self.labels.contains(name)
    }
}

/// Status of a file in a base..head comparison, as reported by GitHub.
///
/// # Examples
///
/// ```
/// use patchbot_core::FileStatus;
///
/// assert!(FileStatus::Added.is_reviewable());
/// assert!(!FileStatus::Removed.is_reviewable());
/// assert_eq!(FileStatus::Renamed.to_string(), "renamed");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// New file.
    Added,
    /// Existing file changed in place.
    Modified,
    /// File deleted.
    Removed,
    /// File moved, possibly with changes.
    Renamed,
    /// File copied from another path.
    Copied,
    /// Mode or metadata change.
    Changed,
    /// Listed without content changes.
    Unchanged,
}

impl FileStatus {
    /// Only added and modified files carry a patch worth reviewing.
    pub fn is_reviewable(self) -> bool {
        matches!(self, FileStatus::Added | FileStatus::Modified)
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileStatus::Added => "added",
            FileStatus::Modified => "modified",
            FileStatus::Removed => "removed",
            FileStatus::Renamed => "renamed",
            FileStatus::Copied => "copied",
            FileStatus::Changed => "changed",
            FileStatus::Unchanged => "unchanged",
        };
        write!(f, "{s}")
    }
}

/// One file from a base..head comparison.
///
/// # Examples
///
/// ```
/// use patchbot_core::{ChangedFile, FileStatus};
///
/// let file = ChangedFile {
///     path: "src/lib.rs".into(),
///     status: FileStatus::Modified,
///     patch: Some("@@ -1 +1 @@\n-a\n+b".into()),
/// };
/// assert_eq!(file.patch_lines(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangedFile {
    /// Repository-relative path using `/` separators.
    pub path: String,
    /// Change status.
    pub status: FileStatus,
    /// Unified-diff text for this file. Absent for binary or oversized diffs.
    pub patch: Option<String>,
}

impl ChangedFile {
    /// Number of `\n`-separated lines in the patch (0 when absent).
    pub fn patch_lines(&self) -> usize {
        self.patch
            .as_deref()
            .map(|p| p.split('\n').count())
            .unwrap_or(0)
    }
}

/// What caused the current review run.
///
/// # Examples
///
/// ```
/// use patchbot_core::TriggerMode;
///
/// let mode: TriggerMode = "command".parse().unwrap();
/// assert_eq!(mode, TriggerMode::Command);
/// assert_eq!(TriggerMode::default(), TriggerMode::Event);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerMode {
    /// A pull-request lifecycle event (opened, synchronized).
    #[default]
    Event,
    /// An explicit operator request; label exemptions do not apply.
    Command,
}

impl fmt::Display for TriggerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerMode::Event => write!(f, "event"),
            TriggerMode::Command => write!(f, "command"),
        }
    }
}

impl FromStr for TriggerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "event" => Ok(TriggerMode::Event),
            "command" => Ok(TriggerMode::Command),
            other => Err(format!("unknown trigger mode: {other}")),
        }
    }
}

/// Output format for CLI results.
///
/// # Examples
///
/// ```
/// use patchbot_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Terminal status line.
    #[default]
    Text,
    /// Full run report as JSON with camelCase keys.
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_format_from_str() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn trigger_mode_parse_is_case_insensitive() {
        assert_eq!(" Event ".parse::<TriggerMode>().unwrap(), TriggerMode::Event);
        assert_eq!("COMMAND".parse::<TriggerMode>().unwrap(), TriggerMode::Command);
        assert!("cron".parse::<TriggerMode>().is_err());
    }

    #[test]
    fn file_status_deserializes_github_values() {
        let status: FileStatus = serde_json::from_str("\"removed\"").unwrap();
        assert_eq!(status, FileStatus::Removed);
        let status: FileStatus = serde_json::from_str("\"copied\"").unwrap();
        assert_eq!(status, FileStatus::Copied);
    }

    #[test]
    fn only_added_and_modified_are_reviewable() {
        let reviewable: Vec<_> = [
            FileStatus::Added,
            FileStatus::Modified,
            FileStatus::Removed,
            FileStatus::Renamed,
            FileStatus::Copied,
            FileStatus::Changed,
            FileStatus::Unchanged,
        ]
        .into_iter()
        .filter(|s| s.is_reviewable())
        .collect();
        assert_eq!(reviewable, vec![FileStatus::Added, FileStatus::Modified]);
    }

    #[test]
    fn patch_lines_counts_trailing_newline() {
        let file = ChangedFile {
            path: "a.rs".into(),
            status: FileStatus::Added,
            patch: Some("@@ -0,0 +1 @@\n+x\n".into()),
        };
        assert_eq!(file.patch_lines(), 3);

        let binary = ChangedFile {
            patch: None,
            ..file
        };
        assert_eq!(binary.patch_lines(), 0);
    }

    #[test]
    fn descriptor_serializes_camel_case() {
        let pr = PullRequestDescriptor {
            number: 1,
            base_sha: "a".into(),
            head_sha: "b".into(),
            labels: BTreeSet::new(),
            state: PullRequestState::Closed,
            locked: true,
            html_url: String::new(),
        };
        let json = serde_json::to_value(&pr).unwrap();
        assert_eq!(json["headSha"], "b");
        assert_eq!(json["state"], "closed");
    }
}
