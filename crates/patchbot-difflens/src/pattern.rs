//! Glob matching for changed-file paths.
//!
//! Paths come from the hosting platform and always use `/` separators.
//! Matching is anchored to the whole path: `*` and `?` stay inside one
//! segment, `**/` spans any number of directories (including none), and
//! wildcards do not match a leading `.` in a segment. A `**` that shares its
//! segment with other characters (`src/**.ts`) is an ordinary `*`.

use std::borrow::Cow;
use std::fmt;

use glob::{MatchOptions, Pattern};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// Check a single path against a single glob.
///
/// An invalid pattern never matches.
///
/// # Examples
///
/// ```
/// use patchbot_difflens::pattern::matches;
///
/// assert!(matches("src/a/b.ts", "**/*.ts"));
/// assert!(!matches("src/a/b.tsx", "**/*.ts"));
/// assert!(!matches("src/a/b.ts", "*.ts"));
/// ```
pub fn matches(path: &str, pattern: &str) -> bool {
    match compile(pattern) {
        Ok(p) => p.matches_with(path, MATCH_OPTIONS),
        Err(e) => {
            tracing::debug!(pattern, error = %e, "ignoring invalid glob");
            false
        }
    }
}

/// Collapse `**` that is not a whole path segment into `*`.
///
/// # Examples
///
/// ```
/// use patchbot_difflens::pattern::normalize_glob;
///
/// assert_eq!(normalize_glob("src/**.ts"), "src/*.ts");
/// assert_eq!(normalize_glob("src/**/*.ts"), "src/**/*.ts");
/// ```
pub fn normalize_glob(pattern: &str) -> Cow<'_, str> {
    let needs_rewrite = pattern
        .split('/')
        .any(|segment| segment != "**" && segment.contains("**"));
    if !needs_rewrite {
        return Cow::Borrowed(pattern);
    }

    let segments: Vec<String> = pattern
        .split('/')
        .map(|segment| {
            if segment == "**" {
                return segment.to_string();
            }
            let mut out = String::with_capacity(segment.len());
            for c in segment.chars() {
                if c == '*' && out.ends_with('*') {
                    continue;
                }
                out.push(c);
            }
            out
        })
        .collect();
    Cow::Owned(segments.join("/"))
}

fn compile(glob: &str) -> Result<Pattern, glob::PatternError> {
    Pattern::new(&normalize_glob(glob))
}

/// A glob that failed to compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobError {
    /// The glob as configured.
    pub glob: String,
    /// What the glob parser rejected.
    pub message: String,
}

impl fmt::Display for GlobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}': {}", self.glob, self.message)
    }
}

/// An ordered, pre-compiled list of globs.
///
/// # Examples
///
/// ```
/// use patchbot_difflens::pattern::PatternSet;
///
/// let set = PatternSet::new(&["**/*.rs".to_string(), "docs/*.md".to_string()]).unwrap();
/// assert_eq!(set.first_match("docs/intro.md"), Some("docs/*.md"));
/// assert!(set.first_match("docs/api/intro.md").is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<(String, Pattern)>,
}

impl PatternSet {
    /// Compile every glob, keeping their order.
    ///
    /// # Errors
    ///
    /// Returns a [`GlobError`] for the first glob that does not compile.
    pub fn new(globs: &[String]) -> Result<Self, GlobError> {
        let patterns = globs
            .iter()
            .map(|g| {
                compile(g).map(|p| (g.clone(), p)).map_err(|e| GlobError {
                    glob: g.clone(),
                    message: e.msg.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// The first glob (in configured order, as configured) that matches `path`.
    pub fn first_match(&self, path: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|(_, p)| p.matches_with(path, MATCH_OPTIONS))
            .map(|(glob, _)| glob.as_str())
    }

    /// Returns `true` if any glob matches `path`.
    pub fn matches(&self, path: &str) -> bool {
        self.first_match(path).is_some()
    }
}
