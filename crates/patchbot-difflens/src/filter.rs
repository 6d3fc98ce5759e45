//! Eligibility decisions for pull requests and changed files.
//!
//! Three decision points, each producing a readable reason rather than an
//! error: the pull request itself, the filter configuration, and every
//! changed file. The file checks always run in the same order so that logs
//! are reproducible.

use std::fmt;

use patchbot_core::{
    ChangedFile, ExcludeSpec, FileStatus, FilterConfig, PullRequestDescriptor, PullRequestState,
    TriggerMode,
};
use serde::{Serialize, Serializer};

use crate::pattern::{GlobError, PatternSet};

/// Pull-request and file eligibility policy for one run.
///
/// # Examples
///
/// ```
/// use patchbot_core::{ExcludeSpec, FilterConfig};
/// use patchbot_difflens::filter::EligibilityFilter;
///
/// let config = FilterConfig {
///     include: vec!["**/*.rs".into()],
///     exclude: ExcludeSpec::Nothing,
///     ..FilterConfig::default()
/// };
/// let filter = EligibilityFilter::new(&config);
/// assert!(filter.file_policy().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct EligibilityFilter {
    config: FilterConfig,
}

impl EligibilityFilter {
    /// Create a filter from configuration.
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Decide whether the pull request should be reviewed at all.
    ///
    /// The no-review label check only applies to event-triggered runs.
    ///
    /// # Errors
    ///
    /// Returns the first [`RequestSkip`] that applies.
    pub fn check_request(&self, pr: &PullRequestDescriptor) -> Result<(), RequestSkip> {
        if pr.state == PullRequestState::Closed {
            return Err(RequestSkip::Closed);
        }
        if pr.locked {
            return Err(RequestSkip::Locked);
        }
        if self.config.trigger_mode == TriggerMode::Event {
            if let Some(label) = self
                .config
                .no_review_labels
                .iter()
                .find(|l| pr.has_label(l))
            {
                return Err(RequestSkip::NoReviewLabel(label.clone()));
            }
        }
        Ok(())
    }

    /// Validate the include/exclude configuration and compile it into a
    /// per-file policy.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigSkip`] when no include globs are configured, when
    /// the exclude setting is unset, or when a glob does not compile.
    pub fn file_policy(&self) -> Result<FilePolicy, ConfigSkip> {
        if self.config.include.is_empty() {
            return Err(ConfigSkip::NoTargets);
        }
        let exclude_globs: &[String] = match &self.config.exclude {
            ExcludeSpec::Unset => return Err(ConfigSkip::NoIgnore),
            ExcludeSpec::Nothing => &[],
            ExcludeSpec::Patterns(globs) => globs,
        };

        let include = PatternSet::new(&self.config.include).map_err(ConfigSkip::InvalidPattern)?;
        let exclude = PatternSet::new(exclude_globs).map_err(ConfigSkip::InvalidPattern)?;

        Ok(FilePolicy {
            include,
            exclude,
            max_patch_length: self.config.max_patch_length,
        })
    }
}

/// Compiled per-file checks.
#[derive(Debug, Clone)]
pub struct FilePolicy {
    include: PatternSet,
    exclude: PatternSet,
    max_patch_length: usize,
}

impl FilePolicy {
    /// Run the file checks in order: status, include, exclude, patch size.
    ///
    /// Returns the patch text to review on success. Evaluating one file never
    /// depends on any other file.
    ///
    /// # Errors
    ///
    /// Returns the [`SkipReason`] of the first failing check.
    pub fn check<'f>(&self, file: &'f ChangedFile) -> Result<&'f str, SkipReason> {
        if !file.status.is_reviewable() {
            return Err(SkipReason::Status(file.status));
        }
        if !self.include.matches(&file.path) {
            return Err(SkipReason::NotIncluded);
        }
        if let Some(pattern) = self.exclude.first_match(&file.path) {
            return Err(SkipReason::Excluded(pattern.to_string()));
        }
        let patch = match file.patch.as_deref() {
            Some(p) if !p.is_empty() => p,
            _ => return Err(SkipReason::NoPatch),
        };
        let length = patch.chars().count();
        if length > self.max_patch_length {
            return Err(SkipReason::PatchTooLarge {
                length,
                max: self.max_patch_length,
            });
        }
        Ok(patch)
    }

    /// Split files into those that pass, paired with the patch to review, and
    /// those that are skipped. Listing order is kept in both.
    ///
    /// # Examples
    ///
    /// ```
    /// use patchbot_core::{ChangedFile, ExcludeSpec, FileStatus, FilterConfig};
    /// use patchbot_difflens::filter::EligibilityFilter;
    ///
    /// let config = FilterConfig {
    ///     include: vec!["**/*.rs".into()],
    ///     exclude: ExcludeSpec::Nothing,
    ///     ..FilterConfig::default()
    /// };
    /// let policy = EligibilityFilter::new(&config).file_policy().unwrap();
    /// let files = vec![
    ///     ChangedFile { path: "a.rs".into(), status: FileStatus::Added, patch: Some("+x".into()) },
    ///     ChangedFile { path: "b.md".into(), status: FileStatus::Added, patch: Some("+y".into()) },
    /// ];
    /// let result = policy.partition(&files);
    /// assert_eq!(result.kept.len(), 1);
    /// assert_eq!(result.skipped[0].path, "b.md");
    /// ```
    pub fn partition<'f>(&self, files: &'f [ChangedFile]) -> FilterResult<'f> {
        let mut kept = Vec::new();
        let mut skipped = Vec::new();
        for file in files {
            match self.check(file) {
                Ok(patch) => kept.push(EligibleFile { file, patch }),
                Err(reason) => skipped.push(SkippedFile {
                    path: file.path.clone(),
                    reason,
                }),
            }
        }
        FilterResult { kept, skipped }
    }
}

/// Result of partitioning a file list.
#[derive(Debug)]
pub struct FilterResult<'f> {
    /// Files that passed every check.
    pub kept: Vec<EligibleFile<'f>>,
    /// Files that were skipped with reasons.
    pub skipped: Vec<SkippedFile>,
}

/// A file that passed every check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EligibleFile<'f> {
    /// The changed file.
    pub file: &'f ChangedFile,
    /// Its non-empty patch, within the length limit.
    pub patch: &'f str,
}

/// A file that was skipped during filtering.
///
/// # Examples
///
/// ```
/// use patchbot_difflens::filter::{SkippedFile, SkipReason};
///
/// let skipped = SkippedFile {
///     path: "Cargo.lock".into(),
///     reason: SkipReason::NotIncluded,
/// };
/// assert_eq!(skipped.to_string(), "Cargo.lock is not in targets.");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    /// Path of the skipped file.
    pub path: String,
    /// Why the file was skipped.
    pub reason: SkipReason,
}

impl fmt::Display for SkippedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            SkipReason::Status(status) => {
                write!(f, "{} skipped because it was {status}.", self.path)
            }
            SkipReason::NotIncluded => write!(f, "{} is not in targets.", self.path),
            SkipReason::Excluded(_) => write!(f, "{} is ignored.", self.path),
            SkipReason::NoPatch | SkipReason::PatchTooLarge { .. } => write!(
                f,
                "{} skipped caused by its diff is too large.",
                self.path
            ),
        }
    }
}

/// Reason a file was not reviewed.
///
/// # Examples
///
/// ```
/// use patchbot_difflens::filter::SkipReason;
///
/// let reason = SkipReason::PatchTooLarge { length: 12, max: 10 };
/// assert_eq!(reason.to_string(), "patch too large (12 > 10 chars)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Neither added nor modified.
    Status(FileStatus),
    /// Matched no include glob.
    NotIncluded,
    /// Matched the given exclude glob.
    Excluded(String),
    /// The platform sent no patch text (binary file, huge diff) or it was empty.
    NoPatch,
    /// Patch longer than the configured maximum.
    PatchTooLarge {
        /// Patch length in characters.
        length: usize,
        /// Configured maximum.
        max: usize,
    },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Status(status) => write!(f, "status: {status}"),
            SkipReason::NotIncluded => write!(f, "not in targets"),
            SkipReason::Excluded(pat) => write!(f, "ignored by pattern: {pat}"),
            SkipReason::NoPatch => write!(f, "no patch"),
            SkipReason::PatchTooLarge { length, max } => {
                write!(f, "patch too large ({length} > {max} chars)")
            }
        }
    }
}

impl Serialize for SkipReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Reason a whole pull request is not reviewed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestSkip {
    /// The PR is closed.
    Closed,
    /// The PR conversation is locked.
    Locked,
    /// A label from the no-review list is attached.
    NoReviewLabel(String),
}

impl fmt::Display for RequestSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestSkip::Closed => write!(f, "pull request is closed"),
            RequestSkip::Locked => write!(f, "pull request is locked"),
            RequestSkip::NoReviewLabel(label) => write!(f, "no-review label '{label}' is attached"),
        }
    }
}

/// Reason the filter configuration cannot be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSkip {
    /// No include globs.
    NoTargets,
    /// Exclude setting missing or empty (as opposed to `NONE`).
    NoIgnore,
    /// A glob failed to compile.
    InvalidPattern(GlobError),
}

impl fmt::Display for ConfigSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSkip::NoTargets => write!(f, "no target specified"),
            ConfigSkip::NoIgnore => write!(f, "no ignore specified"),
            ConfigSkip::InvalidPattern(err) => write!(f, "invalid glob pattern: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn pr(labels: &[&str]) -> PullRequestDescriptor {
        PullRequestDescriptor {
            number: 3,
            base_sha: "base".into(),
            head_sha: "head".into(),
            labels: labels.iter().map(|l| l.to_string()).collect::<BTreeSet<_>>(),
            state: PullRequestState::Open,
            locked: false,
            html_url: "https://github.com/o/r/pull/3".into(),
        }
    }

    fn config(include: &[&str], exclude: ExcludeSpec) -> FilterConfig {
        FilterConfig {
            include: include.iter().map(|s| s.to_string()).collect(),
            exclude,
            max_patch_length: 20,
            ..FilterConfig::default()
        }
    }

    fn file(path: &str, status: FileStatus, patch: Option<&str>) -> ChangedFile {
        ChangedFile {
            path: path.into(),
            status,
            patch: patch.map(str::to_string),
        }
    }

    #[test]
    fn open_unlabelled_request_passes() {
        let filter = EligibilityFilter::new(&config(&["**"], ExcludeSpec::Nothing));
        assert_eq!(filter.check_request(&pr(&["enhancement"])), Ok(()));
    }

    #[test]
    fn closed_and_locked_requests_rejected() {
        let filter = EligibilityFilter::new(&config(&["**"], ExcludeSpec::Nothing));

        let mut closed = pr(&[]);
        closed.state = PullRequestState::Closed;
        closed.locked = true;
        // Closed is checked first.
        assert_eq!(filter.check_request(&closed), Err(RequestSkip::Closed));

        let mut locked = pr(&[]);
        locked.locked = true;
        assert_eq!(filter.check_request(&locked), Err(RequestSkip::Locked));
    }

    #[test]
    fn no_review_label_rejects_event_runs_only() {
        let mut cfg = config(&["**"], ExcludeSpec::Nothing);
        let labelled = pr(&["renovate/Minor"]);

        let filter = EligibilityFilter::new(&cfg);
        assert_eq!(
            filter.check_request(&labelled),
            Err(RequestSkip::NoReviewLabel("renovate/Minor".into()))
        );

        cfg.trigger_mode = TriggerMode::Command;
        let filter = EligibilityFilter::new(&cfg);
        assert_eq!(filter.check_request(&labelled), Ok(()));
    }

    #[test]
    fn label_match_is_exact() {
        let filter = EligibilityFilter::new(&config(&["**"], ExcludeSpec::Nothing));
        assert_eq!(filter.check_request(&pr(&["no-review-by-chatgpt"])), Ok(()));
    }

    #[test]
    fn config_requires_targets_and_ignore() {
        let filter = EligibilityFilter::new(&config(&[], ExcludeSpec::Nothing));
        assert_eq!(filter.file_policy().unwrap_err(), ConfigSkip::NoTargets);

        let filter = EligibilityFilter::new(&config(&["**/*.rs"], ExcludeSpec::Unset));
        assert_eq!(filter.file_policy().unwrap_err(), ConfigSkip::NoIgnore);

        let filter = EligibilityFilter::new(&config(&["**/*.rs"], ExcludeSpec::Nothing));
        assert!(filter.file_policy().is_ok());
    }

    #[test]
    fn config_reports_bad_glob() {
        let filter = EligibilityFilter::new(&config(
            &["**/*.rs"],
            ExcludeSpec::Patterns(vec!["[broken".into()]),
        ));
        let skip = filter.file_policy().unwrap_err();
        let ConfigSkip::InvalidPattern(err) = &skip else {
            panic!("expected invalid pattern, got {skip:?}");
        };
        assert_eq!(err.glob, "[broken");
        assert_eq!(
            skip.to_string(),
            format!("invalid glob pattern: '[broken': {}", err.message)
        );
        assert!(!skip.to_string().contains("configuration error"));
    }

    #[test]
    fn partial_segment_double_star_does_not_end_run() {
        let policy = EligibilityFilter::new(&config(&["src/**.ts"], ExcludeSpec::Nothing))
            .file_policy()
            .unwrap();
        let top = file("src/a.ts", FileStatus::Added, Some("+a"));
        let nested = file("src/x/a.ts", FileStatus::Added, Some("+a"));
        assert_eq!(policy.check(&top), Ok("+a"));
        assert_eq!(policy.check(&nested), Err(SkipReason::NotIncluded));

        let policy = EligibilityFilter::new(&config(&["**.ts"], ExcludeSpec::Nothing))
            .file_policy()
            .unwrap();
        assert!(policy.check(&file("b.ts", FileStatus::Added, Some("+b"))).is_ok());
    }

    #[test]
    fn file_checks_run_in_fixed_order() {
        let policy = EligibilityFilter::new(&config(
            &["src/**"],
            ExcludeSpec::Patterns(vec!["src/gen/**".into()]),
        ))
        .file_policy()
        .unwrap();

        // Removed + outside targets + no patch: status wins.
        let f = file("docs/a.md", FileStatus::Removed, None);
        assert_eq!(policy.check(&f), Err(SkipReason::Status(FileStatus::Removed)));

        // Outside targets + no patch: include wins.
        let f = file("docs/a.md", FileStatus::Added, None);
        assert_eq!(policy.check(&f), Err(SkipReason::NotIncluded));

        // Excluded + no patch: exclude wins.
        let f = file("src/gen/a.rs", FileStatus::Modified, None);
        assert_eq!(
            policy.check(&f),
            Err(SkipReason::Excluded("src/gen/**".into()))
        );

        let f = file("src/a.rs", FileStatus::Modified, None);
        assert_eq!(policy.check(&f), Err(SkipReason::NoPatch));

        let f = file("src/a.rs", FileStatus::Modified, Some(""));
        assert_eq!(policy.check(&f), Err(SkipReason::NoPatch));

        let f = file("src/a.rs", FileStatus::Modified, Some(&"+".repeat(21)));
        assert_eq!(
            policy.check(&f),
            Err(SkipReason::PatchTooLarge { length: 21, max: 20 })
        );

        let f = file("src/a.rs", FileStatus::Added, Some("+fn a() {}"));
        assert_eq!(policy.check(&f), Ok("+fn a() {}"));
    }

    #[test]
    fn patch_length_is_measured_in_characters() {
        let policy = EligibilityFilter::new(&config(&["**"], ExcludeSpec::Nothing))
            .file_policy()
            .unwrap();
        // 20 characters, 40 bytes.
        let patch = "é".repeat(20);
        let f = file("a.txt", FileStatus::Added, Some(&patch));
        assert!(policy.check(&f).is_ok());
    }

    #[test]
    fn renamed_files_are_skipped() {
        let policy = EligibilityFilter::new(&config(&["**"], ExcludeSpec::Nothing))
            .file_policy()
            .unwrap();
        let f = file("b.rs", FileStatus::Renamed, Some("+x"));
        assert_eq!(policy.check(&f), Err(SkipReason::Status(FileStatus::Renamed)));
    }

    #[test]
    fn skipped_file_messages() {
        let skipped = SkippedFile {
            path: "src/a.rs".into(),
            reason: SkipReason::Excluded("src/**".into()),
        };
        assert_eq!(skipped.to_string(), "src/a.rs is ignored.");

        let skipped = SkippedFile {
            path: "big.rs".into(),
            reason: SkipReason::PatchTooLarge { length: 5, max: 1 },
        };
        assert_eq!(
            skipped.to_string(),
            "big.rs skipped caused by its diff is too large."
        );
    }

    #[test]
    fn config_skip_display_matches_status_text() {
        assert_eq!(ConfigSkip::NoTargets.to_string(), "no target specified");
        assert_eq!(ConfigSkip::NoIgnore.to_string(), "no ignore specified");
    }

    #[test]
    fn skip_reason_serializes_as_text() {
        let json = serde_json::to_value(SkipReason::NotIncluded).unwrap();
        assert_eq!(json, "not in targets");
    }
}
