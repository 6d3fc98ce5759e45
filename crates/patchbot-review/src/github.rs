use async_trait::async_trait;
use patchbot_core::{ChangedFile, FileStatus, PatchbotError, RepoRef};
use serde::{Deserialize, Serialize};

const DEFAULT_API_BASE: &str = "https://api.github.com";

/// An inline review comment to publish on a pull request.
///
/// `position` counts lines from the first hunk header of the file's patch,
/// as the GitHub review comment API expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineComment {
    /// Pull request number.
    #[serde(skip)]
    pub pull_number: u64,
    /// Commit the comment is anchored to.
    pub commit_id: String,
    /// File path within the repository.
    pub path: String,
    /// Markdown body.
    pub body: String,
    /// Line offset within the patch.
    pub position: usize,
}

/// The hosting-platform operations the review pipeline needs.
#[async_trait]
pub trait VersionControlGateway: Send + Sync {
    /// List changed files between two commits, in the platform's order.
    async fn compare_revisions(
        &self,
        repo: &RepoRef,
        base: &str,
        head: &str,
    ) -> Result<Vec<ChangedFile>, PatchbotError>;

    /// Read a repository-scoped variable. `Ok(None)` when it does not exist.
    async fn get_repo_secret(
        &self,
        repo: &RepoRef,
        name: &str,
    ) -> Result<Option<String>, PatchbotError>;

    /// Post a conversation comment on an issue or pull request.
    async fn post_issue_comment(
        &self,
        repo: &RepoRef,
        issue_number: u64,
        body: &str,
    ) -> Result<(), PatchbotError>;

    /// Post an inline review comment on a pull request diff.
    async fn post_review_comment(
        &self,
        repo: &RepoRef,
        comment: &InlineComment,
    ) -> Result<(), PatchbotError>;
}

/// GitHub REST implementation of [`VersionControlGateway`].
///
/// # Examples
///
/// ```no_run
/// use patchbot_review::github::GitHubGateway;
///
/// let gateway = GitHubGateway::new(Some("ghp_xxxx"), None).unwrap();
/// ```
pub struct GitHubGateway {
    octocrab: octocrab::Octocrab,
}

impl GitHubGateway {
    /// Create a gateway from an explicit token or the `GITHUB_TOKEN`
    /// environment variable. `api_base` selects a GitHub Enterprise host.
    ///
    /// # Errors
    ///
    /// Returns [`PatchbotError::Config`] if no token is available, or
    /// [`PatchbotError::Gateway`] if the client cannot be built.
    pub fn new(token: Option<&str>, api_base: Option<&str>) -> Result<Self, PatchbotError> {
        let token = match token {
            Some(t) => t.to_string(),
            None => std::env::var("GITHUB_TOKEN").map_err(|_| {
                PatchbotError::Config(
                    "GITHUB_TOKEN not set. Pass --github-token or set GITHUB_TOKEN env var".into(),
                )
            })?,
        };
        let api_base = api_base.unwrap_or(DEFAULT_API_BASE).trim_end_matches('/');

        let octocrab = octocrab::Octocrab::builder()
            .personal_token(token)
            .base_uri(api_base)
            .map_err(|e| PatchbotError::Config(format!("invalid GitHub API URL: {e}")))?
            .build()
            .map_err(|e| PatchbotError::Gateway(format!("failed to create GitHub client: {e}")))?;

        Ok(Self { octocrab })
    }
}

#[derive(Deserialize)]
struct CompareResponse {
    #[serde(default)]
    files: Option<Vec<CompareFile>>,
}

#[derive(Deserialize)]
struct CompareFile {
    filename: String,
    status: FileStatus,
    patch: Option<String>,
}

#[derive(Deserialize)]
struct VariableResponse {
    value: Option<String>,
}

/// Value of a repository variable; blank counts as unset.
fn parse_variable(body: &str) -> Result<Option<String>, PatchbotError> {
    let variable: VariableResponse = serde_json::from_str(body)?;
    Ok(variable.value.filter(|v| !v.is_empty()))
}

#[async_trait]
impl VersionControlGateway for GitHubGateway {
    async fn compare_revisions(
        &self,
        repo: &RepoRef,
        base: &str,
        head: &str,
    ) -> Result<Vec<ChangedFile>, PatchbotError> {
        let route = format!(
            "/repos/{}/{}/compare/{base}...{head}",
            repo.owner, repo.name
        );
        let response: CompareResponse = self
            .octocrab
            .get(route, None::<&()>)
            .await
            .map_err(|e| PatchbotError::Gateway(format!("failed to compare commits: {e}")))?;

        Ok(response
            .files
            .unwrap_or_default()
            .into_iter()
            .map(|f| ChangedFile {
                path: f.filename,
                status: f.status,
                patch: f.patch,
            })
            .collect())
    }

    async fn get_repo_secret(
        &self,
        repo: &RepoRef,
        name: &str,
    ) -> Result<Option<String>, PatchbotError> {
        let route = format!(
            "/repos/{}/{}/actions/variables/{name}",
            repo.owner, repo.name
        );
        let read_failed =
            |e: octocrab::Error| PatchbotError::Gateway(format!("failed to read variable {name}: {e}"));

        let response = self.octocrab._get(route).await.map_err(read_failed)?;
        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        let response = octocrab::map_github_error(response)
            .await
            .map_err(read_failed)?;
        let body = self
            .octocrab
            .body_to_string(response)
            .await
            .map_err(read_failed)?;

        parse_variable(&body)
    }

    async fn post_issue_comment(
        &self,
        repo: &RepoRef,
        issue_number: u64,
        body: &str,
    ) -> Result<(), PatchbotError> {
        self.octocrab
            .issues(&repo.owner, &repo.name)
            .create_comment(issue_number, body)
            .await
            .map_err(|e| PatchbotError::Gateway(format!("failed to post comment: {e}")))?;
        Ok(())
    }

    async fn post_review_comment(
        &self,
        repo: &RepoRef,
        comment: &InlineComment,
    ) -> Result<(), PatchbotError> {
        let route = format!(
            "/repos/{}/{}/pulls/{}/comments",
            repo.owner, repo.name, comment.pull_number
        );
        let _response: serde_json::Value = self
            .octocrab
            .post(route, Some(comment))
            .await
            .map_err(|e| PatchbotError::Gateway(format!("failed to post review comment: {e}")))?;
        Ok(())
    }
}
