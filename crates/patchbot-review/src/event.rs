//! Inbound event decoding.
//!
//! Two payload shapes reach patchbot: a GitHub `pull_request` event, and a
//! `repository_dispatch` event whose `client_payload` carries a snapshot of
//! the pull request (sent by a relay such as a comment-command bot). Both are
//! decoded strictly and reduced to a [`ReviewTarget`] here, so nothing
//! downstream knows which one arrived.

use patchbot_core::{PatchbotError, PullRequestDescriptor, PullRequestState, RepoRef};
use serde::Deserialize;

/// Pull-request actions that trigger a review.
pub const REVIEWED_ACTIONS: &[&str] = &["opened", "synchronize"];

/// The repository and pull request a run is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewTarget {
    /// Repository owning the pull request.
    pub repo: RepoRef,
    /// The pull request snapshot.
    pub pull_request: PullRequestDescriptor,
}

/// What to do with an inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventDisposition {
    /// Run a review.
    Review(ReviewTarget),
    /// Nothing to do; the reason is logged.
    Ignored(String),
}

#[derive(Debug, Deserialize)]
struct PullRequestEvent {
    action: String,
    pull_request: PullRequestPayload,
    repository: RepositoryPayload,
}

#[derive(Debug, Deserialize)]
struct DispatchEvent {
    client_payload: ClientPayload,
    repository: Option<RepositoryPayload>,
}

#[derive(Debug, Deserialize)]
struct ClientPayload {
    pull_request: PullRequestPayload,
    repository: Option<RepositoryPayload>,
}

#[derive(Debug, Deserialize)]
struct PullRequestPayload {
    number: u64,
    state: PullRequestState,
    #[serde(default)]
    locked: bool,
    #[serde(default)]
    labels: Vec<LabelPayload>,
    base: CommitRef,
    head: CommitRef,
    html_url: String,
}

#[derive(Debug, Deserialize)]
struct LabelPayload {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CommitRef {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct RepositoryPayload {
    name: String,
    owner: OwnerPayload,
}

#[derive(Debug, Deserialize)]
struct OwnerPayload {
    login: String,
}

impl From<PullRequestPayload> for PullRequestDescriptor {
    fn from(pr: PullRequestPayload) -> Self {
        Self {
            number: pr.number,
            base_sha: pr.base.sha,
            head_sha: pr.head.sha,
            labels: pr.labels.into_iter().map(|l| l.name).collect(),
            state: pr.state,
            locked: pr.locked,
            html_url: pr.html_url,
        }
    }
}

impl From<RepositoryPayload> for RepoRef {
    fn from(repo: RepositoryPayload) -> Self {
        RepoRef::new(repo.owner.login, repo.name)
    }
}

/// Decode an event payload and decide whether it should be reviewed.
///
/// # Errors
///
/// Returns [`PatchbotError::MalformedEvent`] when the payload is not JSON or
/// lacks a field the review needs.
///
/// # Examples
///
/// ```
/// use patchbot_review::event::{normalize_event, EventDisposition};
///
/// let payload = r#"{
///   "action": "closed",
///   "pull_request": {
///     "number": 1, "state": "closed", "locked": false, "labels": [],
///     "base": {"sha": "a"}, "head": {"sha": "b"},
///     "html_url": "https://github.com/o/r/pull/1"
///   },
///   "repository": {"name": "r", "owner": {"login": "o"}}
/// }"#;
/// let disposition = normalize_event("pull_request", payload).unwrap();
/// assert!(matches!(disposition, EventDisposition::Ignored(_)));
/// ```
pub fn normalize_event(event_name: &str, payload: &str) -> Result<EventDisposition, PatchbotError> {
    match event_name {
        "pull_request" | "pull_request_target" => {
            let event: PullRequestEvent = decode(event_name, payload)?;
            if !REVIEWED_ACTIONS.contains(&event.action.as_str()) {
                return Ok(EventDisposition::Ignored(format!(
                    "pull_request action '{}' is not reviewed",
                    event.action
                )));
            }
            Ok(EventDisposition::Review(ReviewTarget {
                repo: event.repository.into(),
                pull_request: event.pull_request.into(),
            }))
        }
        "repository_dispatch" => {
            let event: DispatchEvent = decode(event_name, payload)?;
            let repo = event
                .client_payload
                .repository
                .or(event.repository)
                .ok_or_else(|| {
                    PatchbotError::MalformedEvent(
                        "repository_dispatch: missing field `repository`".into(),
                    )
                })?;
            Ok(EventDisposition::Review(ReviewTarget {
                repo: repo.into(),
                pull_request: event.client_payload.pull_request.into(),
            }))
        }
        other => Ok(EventDisposition::Ignored(format!(
            "event '{other}' is not supported"
        ))),
    }
}

fn decode<T: serde::de::DeserializeOwned>(event_name: &str, payload: &str) -> Result<T, PatchbotError> {
    serde_json::from_str(payload)
        .map_err(|e| PatchbotError::MalformedEvent(format!("{event_name}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pr_json(state: &str, labels: &[&str]) -> serde_json::Value {
        serde_json::json!({
            "number": 42,
            "state": state,
            "locked": false,
            "labels": labels.iter().map(|l| serde_json::json!({"name": l, "color": "fff"})).collect::<Vec<_>>(),
            "base": {"sha": "base123", "ref": "main"},
            "head": {"sha": "head456", "ref": "feature"},
            "html_url": "https://github.com/octo/app/pull/42",
            "title": "Add things"
        })
    }

    fn repo_json() -> serde_json::Value {
        serde_json::json!({"name": "app", "owner": {"login": "octo"}, "full_name": "octo/app"})
    }

    #[test]
    fn pull_request_opened_is_reviewed() {
        let payload = serde_json::json!({
            "action": "opened",
            "pull_request": pr_json("open", &["bug"]),
            "repository": repo_json(),
        });
        let disposition = normalize_event("pull_request", &payload.to_string()).unwrap();
        let EventDisposition::Review(target) = disposition else {
            panic!("expected review, got {disposition:?}");
        };
        assert_eq!(target.repo, RepoRef::new("octo", "app"));
        assert_eq!(target.pull_request.number, 42);
        assert_eq!(target.pull_request.base_sha, "base123");
        assert_eq!(target.pull_request.head_sha, "head456");
        assert!(target.pull_request.has_label("bug"));
        assert_eq!(target.pull_request.state, PullRequestState::Open);
    }

    #[test]
    fn synchronize_is_reviewed_and_labeled_is_not() {
        for (action, reviewed) in [("synchronize", true), ("labeled", false), ("edited", false)] {
            let payload = serde_json::json!({
                "action": action,
                "pull_request": pr_json("open", &[]),
                "repository": repo_json(),
            });
            let disposition = normalize_event("pull_request", &payload.to_string()).unwrap();
            assert_eq!(
                matches!(disposition, EventDisposition::Review(_)),
                reviewed,
                "action {action}"
            );
        }
    }

    #[test]
    fn dispatch_and_direct_events_normalize_identically() {
        let direct = serde_json::json!({
            "action": "opened",
            "pull_request": pr_json("open", &["x"]),
            "repository": repo_json(),
        });
        let relayed = serde_json::json!({
            "action": "code-review",
            "client_payload": { "pull_request": pr_json("open", &["x"]) },
            "repository": repo_json(),
        });
        let a = normalize_event("pull_request", &direct.to_string()).unwrap();
        let b = normalize_event("repository_dispatch", &relayed.to_string()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn dispatch_prefers_embedded_repository() {
        let relayed = serde_json::json!({
            "client_payload": {
                "pull_request": pr_json("open", &[]),
                "repository": {"name": "fork", "owner": {"login": "someone"}},
            },
            "repository": repo_json(),
        });
        let EventDisposition::Review(target) =
            normalize_event("repository_dispatch", &relayed.to_string()).unwrap()
        else {
            panic!("expected review");
        };
        assert_eq!(target.repo, RepoRef::new("someone", "fork"));
    }

    #[test]
    fn dispatch_without_repository_is_malformed() {
        let relayed = serde_json::json!({
            "client_payload": { "pull_request": pr_json("open", &[]) },
        });
        let err = normalize_event("repository_dispatch", &relayed.to_string()).unwrap_err();
        assert!(matches!(err, PatchbotError::MalformedEvent(_)));
    }

    #[test]
    fn missing_head_sha_is_malformed() {
        let mut pr = pr_json("open", &[]);
        pr["head"] = serde_json::json!({"ref": "feature"});
        let payload = serde_json::json!({
            "action": "opened",
            "pull_request": pr,
            "repository": repo_json(),
        });
        let err = normalize_event("pull_request", &payload.to_string()).unwrap_err();
        assert!(matches!(err, PatchbotError::MalformedEvent(_)));
        assert!(err.to_string().contains("sha"));
    }

    #[test]
    fn missing_labels_and_locked_default() {
        let mut pr = pr_json("open", &[]);
        let obj = pr.as_object_mut().unwrap();
        obj.remove("labels");
        obj.remove("locked");
        let payload = serde_json::json!({
            "action": "opened",
            "pull_request": pr,
            "repository": repo_json(),
        });
        let EventDisposition::Review(target) =
            normalize_event("pull_request", &payload.to_string()).unwrap()
        else {
            panic!("expected review");
        };
        assert!(target.pull_request.labels.is_empty());
        assert!(!target.pull_request.locked);
    }

    #[test]
    fn invalid_json_is_malformed() {
        assert!(matches!(
            normalize_event("pull_request", "not json"),
            Err(PatchbotError::MalformedEvent(_))
        ));
    }

    #[test]
    fn other_events_are_ignored() {
        let disposition = normalize_event("push", "{}").unwrap();
        assert_eq!(
            disposition,
            EventDisposition::Ignored("event 'push' is not supported".into())
        );
    }
}
