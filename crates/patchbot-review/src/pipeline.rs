use std::fmt;
use std::time::Instant;

use patchbot_core::{ChangedFile, LlmConfig, PatchbotConfig, PatchbotError, API_KEY_VAR};
use patchbot_difflens::filter::{
    ConfigSkip, EligibilityFilter, EligibleFile, FilePolicy, FilterResult, RequestSkip,
    SkippedFile,
};
use serde::{Serialize, Serializer};

use crate::event::ReviewTarget;
use crate::github::{InlineComment, VersionControlGateway};
use crate::llm::{ReviewClient, Reviewer};
use crate::prompt::PromptBuilder;

/// Posted once when no model API key can be found for the repository.
pub const ADVISORY_COMMENT: &str = "Seems you are using me but didn't get OPENAI_API_KEY set in \
Variables/Secrets for this repo. Add it as an Actions secret or repository variable named \
`OPENAI_API_KEY` and push again to get a review.";

/// Builds a model client once the API key is known.
pub type Connector =
    Box<dyn Fn(&str) -> Result<Box<dyn Reviewer>, PatchbotError> + Send + Sync>;

/// How a run ended.
///
/// Every variant is a normal outcome; `Display` gives the status string that
/// is reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// All eligible files were processed (individual files may have failed).
    Success,
    /// No model API key could be resolved, or the client could not be built.
    NoChat,
    /// The pull request itself is not eligible.
    RequestSkipped(RequestSkip),
    /// The include/exclude configuration is incomplete or invalid.
    ConfigSkipped(ConfigSkip),
    /// The comparison returned no files.
    NoChangeFound,
    /// The comparison request failed.
    DiffFetchFailed(String),
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Success => write!(f, "success"),
            RunStatus::NoChat => write!(f, "no chat"),
            RunStatus::RequestSkipped(RequestSkip::Closed | RequestSkip::Locked) => {
                write!(f, "invalid event payload")
            }
            RunStatus::RequestSkipped(RequestSkip::NoReviewLabel(_)) => {
                write!(f, "no-review label is attached.")
            }
            RunStatus::ConfigSkipped(skip) => write!(f, "{skip}"),
            RunStatus::NoChangeFound => write!(f, "no change found"),
            RunStatus::DiffFetchFailed(msg) => write!(f, "failed to fetch diff: {msg}"),
        }
    }
}

impl Serialize for RunStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Step at which a single file's review failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    /// The model call failed.
    Model,
    /// The comment could not be posted.
    Publish,
}

/// A failure confined to one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewFailure {
    /// Where it failed.
    pub stage: FailureStage,
    /// Error text.
    pub message: String,
}

/// Outcome for one eligible file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewVerdict {
    /// The reviewed file.
    pub file: ChangedFile,
    /// The model's answer, when it produced a non-empty one.
    pub comment_body: Option<String>,
    /// Set when the model call or the publish step failed.
    pub error: Option<ReviewFailure>,
}

impl ReviewVerdict {
    /// Returns `true` when a comment was published for this file.
    pub fn is_posted(&self) -> bool {
        self.comment_body.is_some() && self.error.is_none()
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// Terminal status.
    pub status: RunStatus,
    /// One verdict per eligible file, in listing order.
    pub verdicts: Vec<ReviewVerdict>,
    /// Files that did not pass the file-level checks.
    pub skipped: Vec<SkippedFile>,
    /// Whether the missing-key advisory comment was posted.
    pub advisory_posted: bool,
}

impl RunReport {
    fn ended(status: RunStatus) -> Self {
        Self {
            status,
            verdicts: Vec::new(),
            skipped: Vec::new(),
            advisory_posted: false,
        }
    }

    /// Number of inline comments published.
    pub fn comments_posted(&self) -> usize {
        self.verdicts.iter().filter(|v| v.is_posted()).count()
    }

    /// Number of eligible files whose review failed.
    pub fn failures(&self) -> usize {
        self.verdicts.iter().filter(|v| v.error.is_some()).count()
    }
}

/// Drives one review run for one pull request.
///
/// Steps: resolve the model key, check the pull request and filter
/// configuration, fetch the diff, then review files one at a time. Only the
/// steps before the per-file loop can end a run early; inside the loop a
/// failing file is recorded and the loop moves on.
pub struct ReviewOrchestrator<G> {
    gateway: G,
    config: PatchbotConfig,
    connector: Connector,
}

impl<G: VersionControlGateway> ReviewOrchestrator<G> {
    /// Create an orchestrator that talks to the configured model endpoint.
    pub fn new(gateway: G, config: PatchbotConfig) -> Self {
        let llm = config.llm.clone();
        let connector: Connector = Box::new(move |api_key: &str| {
            let config = LlmConfig {
                api_key: Some(api_key.to_string()),
                ..llm.clone()
            };
            Ok(Box::new(ReviewClient::new(&config)?) as Box<dyn Reviewer>)
        });
        Self {
            gateway,
            config,
            connector,
        }
    }

    /// Replace how the model client is built from the resolved key.
    pub fn with_connector(
        mut self,
        connector: impl Fn(&str) -> Result<Box<dyn Reviewer>, PatchbotError> + Send + Sync + 'static,
    ) -> Self {
        self.connector = Box::new(connector);
        self
    }

    /// Run the review for one pull request.
    pub async fn run(&self, target: &ReviewTarget) -> RunReport {
        let pr = &target.pull_request;

        let Some(api_key) = self.resolve_api_key(target).await else {
            let advisory_posted = self.post_advisory(target).await;
            tracing::info!("model client not initialized");
            return RunReport {
                advisory_posted,
                ..RunReport::ended(RunStatus::NoChat)
            };
        };
        let reviewer = match (self.connector)(&api_key) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "model client not initialized");
                return RunReport::ended(RunStatus::NoChat);
            }
        };

        let filter = EligibilityFilter::new(&self.config.filter);
        if let Err(skip) = filter.check_request(pr) {
            tracing::info!(pr = pr.number, reason = %skip, "skipping pull request");
            return RunReport::ended(RunStatus::RequestSkipped(skip));
        }
        let policy = match filter.file_policy() {
            Ok(p) => p,
            Err(skip) => {
                tracing::info!(reason = %skip, "filter configuration incomplete");
                return RunReport::ended(RunStatus::ConfigSkipped(skip));
            }
        };

        let files = match self
            .gateway
            .compare_revisions(&target.repo, &pr.base_sha, &pr.head_sha)
            .await
        {
            Ok(files) => files,
            Err(e) => {
                tracing::error!(error = %e, "failed to fetch diff");
                return RunReport::ended(RunStatus::DiffFetchFailed(e.to_string()));
            }
        };
        if files.is_empty() {
            tracing::info!("no change found");
            return RunReport::ended(RunStatus::NoChangeFound);
        }

        let started = Instant::now();
        let prompts = PromptBuilder::new(&self.config.prompt);
        let (verdicts, skipped) = self
            .review_files(target, &files, &policy, &prompts, reviewer.as_ref())
            .await;
        tracing::info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            reviewed = verdicts.len(),
            skipped = skipped.len(),
            "gpt cost"
        );
        tracing::info!(url = %pr.html_url, "successfully reviewed");

        RunReport {
            status: RunStatus::Success,
            verdicts,
            skipped,
            advisory_posted: false,
        }
    }

    async fn resolve_api_key(&self, target: &ReviewTarget) -> Option<String> {
        if let Some(key) = self.config.llm.api_key.as_ref().filter(|k| !k.is_empty()) {
            return Some(key.clone());
        }
        match self.gateway.get_repo_secret(&target.repo, API_KEY_VAR).await {
            Ok(Some(key)) => Some(key),
            Ok(None) => {
                tracing::info!(repo = %target.repo, "{API_KEY_VAR} is not configured");
                None
            }
            Err(e) => {
                tracing::warn!(repo = %target.repo, error = %e, "failed to look up {API_KEY_VAR}");
                None
            }
        }
    }

    async fn post_advisory(&self, target: &ReviewTarget) -> bool {
        match self
            .gateway
            .post_issue_comment(&target.repo, target.pull_request.number, ADVISORY_COMMENT)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "failed to post setup advisory");
                false
            }
        }
    }

    async fn review_files(
        &self,
        target: &ReviewTarget,
        files: &[ChangedFile],
        policy: &FilePolicy,
        prompts: &PromptBuilder,
        reviewer: &dyn Reviewer,
    ) -> (Vec<ReviewVerdict>, Vec<SkippedFile>) {
        let FilterResult { kept, skipped } = policy.partition(files);
        for skip in &skipped {
            tracing::info!(reason = %skip.reason, "{skip}");
        }

        let mut verdicts = Vec::with_capacity(kept.len());
        for eligible in kept {
            let verdict = self
                .review_file(target, eligible, prompts, reviewer)
                .await;
            verdicts.push(verdict);
        }

        (verdicts, skipped)
    }

    async fn review_file(
        &self,
        target: &ReviewTarget,
        eligible: EligibleFile<'_>,
        prompts: &PromptBuilder,
        reviewer: &dyn Reviewer,
    ) -> ReviewVerdict {
        let EligibleFile { file, patch } = eligible;
        let mut verdict = ReviewVerdict {
            file: file.clone(),
            comment_body: None,
            error: None,
        };

        let prompt = prompts.build_for_path(&file.path, patch);
        let answer = match reviewer.review(&prompt).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!(path = %file.path, error = %e, "review {} failed", file.path);
                verdict.error = Some(ReviewFailure {
                    stage: FailureStage::Model,
                    message: e.to_string(),
                });
                return verdict;
            }
        };
        if answer.trim().is_empty() {
            tracing::debug!(path = %file.path, "model returned no review");
            return verdict;
        }

        let comment = InlineComment {
            pull_number: target.pull_request.number,
            commit_id: target.pull_request.head_sha.clone(),
            path: file.path.clone(),
            body: answer.clone(),
            position: file.patch_lines().saturating_sub(1),
        };
        verdict.comment_body = Some(answer);

        if let Err(e) = self.gateway.post_review_comment(&target.repo, &comment).await {
            tracing::warn!(path = %file.path, error = %e, "review {} failed", file.path);
            verdict.error = Some(ReviewFailure {
                stage: FailureStage::Publish,
                message: e.to_string(),
            });
        }
        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use patchbot_core::FileStatus;
    use patchbot_difflens::filter::SkipReason;

    #[test]
    fn status_strings() {
        assert_eq!(RunStatus::Success.to_string(), "success");
        assert_eq!(RunStatus::NoChat.to_string(), "no chat");
        assert_eq!(
            RunStatus::RequestSkipped(RequestSkip::Locked).to_string(),
            "invalid event payload"
        );
        assert_eq!(
            RunStatus::RequestSkipped(RequestSkip::NoReviewLabel("x".into())).to_string(),
            "no-review label is attached."
        );
        assert_eq!(
            RunStatus::ConfigSkipped(ConfigSkip::NoIgnore).to_string(),
            "no ignore specified"
        );
        assert_eq!(RunStatus::NoChangeFound.to_string(), "no change found");
        assert!(RunStatus::DiffFetchFailed("404".into())
            .to_string()
            .starts_with("failed to fetch diff"));
    }

    #[test]
    fn report_counts_posted_and_failed() {
        let file = ChangedFile {
            path: "a.rs".into(),
            status: FileStatus::Added,
            patch: Some("+a".into()),
        };
        let report = RunReport {
            status: RunStatus::Success,
            verdicts: vec![
                ReviewVerdict {
                    file: file.clone(),
                    comment_body: Some("ok".into()),
                    error: None,
                },
                ReviewVerdict {
                    file: file.clone(),
                    comment_body: Some("ok".into()),
                    error: Some(ReviewFailure {
                        stage: FailureStage::Publish,
                        message: "422".into(),
                    }),
                },
                ReviewVerdict {
                    file,
                    comment_body: None,
                    error: None,
                },
            ],
            skipped: vec![SkippedFile {
                path: "b.md".into(),
                reason: SkipReason::NotIncluded,
            }],
            advisory_posted: false,
        };
        assert_eq!(report.comments_posted(), 1);
        assert_eq!(report.failures(), 1);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["verdicts"][1]["error"]["stage"], "publish");
        assert_eq!(json["skipped"][0]["reason"], "not in targets");
        assert_eq!(json["advisoryPosted"], false);
    }
}
