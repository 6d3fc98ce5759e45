use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::env::Env;
use crate::error::PatchbotError;
use crate::types::TriggerMode;

/// Literal exclude value meaning "exclude nothing".
pub const EXCLUDE_NOTHING: &str = "NONE";

/// Name of the model API key, both as an environment variable and as a
/// repository variable.
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";

/// Labels that exempt a pull request from event-triggered reviews.
pub const DEFAULT_NO_REVIEW_LABELS: &[&str] = &[
    "no-review-by-ChatGPT",
    "renovate/Major",
    "renovate/Minor",
    "renovate/Patch",
    "renovate/security",
];

/// Top-level configuration, built once per run.
///
/// Resolution order: CLI flags > environment variables > `.patchbot.toml` >
/// defaults. CLI overrides are applied by the binary after [`PatchbotConfig::load`].
///
/// # Examples
///
/// ```
/// use patchbot_core::PatchbotConfig;
///
/// let config = PatchbotConfig::default();
/// assert_eq!(config.filter.max_patch_length, 50_000);
/// assert!(config.filter.include.is_empty());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatchbotConfig {
    /// Model endpoint settings.
    #[serde(default)]
    pub llm: LlmConfig,
    /// File and pull-request eligibility settings.
    #[serde(default)]
    pub filter: FilterConfig,
    /// Prompt settings.
    #[serde(default)]
    pub prompt: PromptConfig,
}

impl PatchbotConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`PatchbotError::Io`] if the file cannot be read, or
    /// [`PatchbotError::Toml`] if the content is not valid TOML.
    pub fn from_file(path: &Path) -> Result<Self, PatchbotError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`PatchbotError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use patchbot_core::{ExcludeSpec, PatchbotConfig};
    ///
    /// let toml = r#"
    /// [filter]
    /// include = ["**/*.rs"]
    /// exclude = "NONE"
    /// "#;
    /// let config = PatchbotConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.filter.include, vec!["**/*.rs"]);
    /// assert_eq!(config.filter.exclude, ExcludeSpec::Nothing);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, PatchbotError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Build the run configuration: the TOML file at `path` (if given and
    /// present) layered under the environment.
    ///
    /// # Errors
    ///
    /// Returns [`PatchbotError::FileNotFound`] if an explicit `path` does not
    /// exist, and whatever [`PatchbotConfig::from_file`] or
    /// [`PatchbotConfig::apply_env`] return.
    pub fn load(path: Option<&Path>, env: &Env) -> Result<Self, PatchbotError> {
        let mut config = match path {
            Some(p) if !p.exists() => return Err(PatchbotError::FileNotFound(p.to_path_buf())),
            Some(p) => Self::from_file(p)?,
            None => {
                let default_path = Path::new(".patchbot.toml");
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(env)?;
        Ok(config)
    }

    /// Overlay environment variables on top of the current values.
    ///
    /// Empty variables are treated as unset so that blank workflow inputs do
    /// not wipe out file configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PatchbotError::Config`] if a numeric or enum variable does
    /// not parse.
    ///
    /// # Examples
    ///
    /// ```
    /// use patchbot_core::{Env, PatchbotConfig};
    ///
    /// let env = Env::from_pairs([("TARGETS", "**/*.ts,**/*.tsx"), ("MODEL", "gpt-4o-mini")]);
    /// let mut config = PatchbotConfig::default();
    /// config.apply_env(&env).unwrap();
    /// assert_eq!(config.filter.include, vec!["**/*.ts", "**/*.tsx"]);
    /// assert_eq!(config.llm.model, "gpt-4o-mini");
    /// ```
    pub fn apply_env(&mut self, env: &Env) -> Result<(), PatchbotError> {
        if let Some(key) = env.non_empty(API_KEY_VAR) {
            self.llm.api_key = Some(key);
        }
        if let Some(url) = env.non_empty("OPENAI_API_ENDPOINT") {
            self.llm.base_url = url;
        }
        if let Some(model) = env.non_empty("MODEL") {
            self.llm.model = model;
        }
        if let Some(v) = env.non_empty("temperature") {
            self.llm.temperature = parse_env("temperature", &v)?;
        }
        if let Some(v) = env.non_empty("top_p") {
            self.llm.top_p = parse_env("top_p", &v)?;
        }
        if let Some(v) = env.non_empty("max_tokens") {
            self.llm.max_tokens = parse_env("max_tokens", &v)?;
        }

        if let Some(language) = env.non_empty("LANGUAGE") {
            self.prompt.language = language;
        }
        if let Some(template) = env.non_empty("PROMPT") {
            self.prompt.template = Some(template);
        }

        if let Some(v) = env.non_empty("MAX_PATCH_LENGTH") {
            self.filter.max_patch_length = parse_env("MAX_PATCH_LENGTH", &v)?;
        }
        if let Some(targets) = env.first_var(&["TARGETS", "targets"]) {
            self.filter.include = split_globs(&targets);
        }
        if let Some(ignore) = env.first_var(&["IGNORE", "ignore"]) {
            self.filter.exclude = ExcludeSpec::parse(&ignore);
        }
        if let Some(mode) = env.non_empty("TRIGGER_MODE") {
            self.filter.trigger_mode = mode.parse().map_err(PatchbotError::Config)?;
        }
        Ok(())
    }
}

fn parse_env<T: FromStr>(name: &str, value: &str) -> Result<T, PatchbotError> {
    value
        .trim()
        .parse()
        .map_err(|_| PatchbotError::Config(format!("invalid value for {name}: '{value}'")))
}

/// Split a comma-separated glob list, dropping empty entries.
///
/// # Examples
///
/// ```
/// use patchbot_core::split_globs;
///
/// assert_eq!(split_globs("**/*.ts,,src/**"), vec!["**/*.ts", "src/**"]);
/// assert!(split_globs("").is_empty());
/// ```
pub fn split_globs(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

/// Model endpoint configuration.
///
/// # Examples
///
/// ```
/// use patchbot_core::LlmConfig;
///
/// let config = LlmConfig::default();
/// assert_eq!(config.model, "gpt-4o");
/// assert_eq!(config.base_url, "https://api.openai.com/v1");
/// assert_eq!(config.max_tokens, 4000);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API key. Usually supplied through `OPENAI_API_KEY` rather than the file.
    pub api_key: Option<String>,
    /// Base URL of an OpenAI-compatible API, including the version segment.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,
    /// Sampling temperature (default: 1).
    #[serde(default = "default_one")]
    pub temperature: f32,
    /// Nucleus-sampling probability (default: 1).
    #[serde(default = "default_one")]
    pub top_p: f32,
    /// Maximum tokens in the model's answer (default: 4000).
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Context budget shared by prompt and answer (default: 20000).
    #[serde(default = "default_max_model_tokens")]
    pub max_model_tokens: u32,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_model() -> String {
    "gpt-4o".into()
}

fn default_one() -> f32 {
    1.0
}

fn default_max_tokens() -> u32 {
    4000
}

fn default_max_model_tokens() -> u32 {
    20_000
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_one(),
            top_p: default_one(),
            max_tokens: default_max_tokens(),
            max_model_tokens: default_max_model_tokens(),
        }
    }
}

/// The exclude setting, which distinguishes "not configured" from
/// "configured to exclude nothing".
///
/// # Examples
///
/// ```
/// use patchbot_core::ExcludeSpec;
///
/// assert_eq!(ExcludeSpec::parse(""), ExcludeSpec::Unset);
/// assert_eq!(ExcludeSpec::parse("NONE"), ExcludeSpec::Nothing);
/// assert_eq!(
///     ExcludeSpec::parse("dist/**,*.lock"),
///     ExcludeSpec::Patterns(vec!["dist/**".into(), "*.lock".into()])
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExcludeSpec {
    /// Missing, empty, or only empty entries. Treated as misconfiguration.
    #[default]
    Unset,
    /// The explicit [`EXCLUDE_NOTHING`] sentinel.
    Nothing,
    /// One or more exclude globs.
    Patterns(Vec<String>),
}

impl ExcludeSpec {
    /// Parse a raw comma-separated value or the `NONE` sentinel.
    pub fn parse(raw: &str) -> Self {
        if raw == EXCLUDE_NOTHING {
            return ExcludeSpec::Nothing;
        }
        Self::from_list(split_globs(raw))
    }

    fn from_list(globs: Vec<String>) -> Self {
        let globs: Vec<String> = globs.into_iter().filter(|g| !g.is_empty()).collect();
        match globs.as_slice() {
            [] => ExcludeSpec::Unset,
            [only] if only == EXCLUDE_NOTHING => ExcludeSpec::Nothing,
            _ => ExcludeSpec::Patterns(globs),
        }
    }

    /// Returns `true` for [`ExcludeSpec::Unset`].
    pub fn is_unset(&self) -> bool {
        matches!(self, ExcludeSpec::Unset)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GlobSetting {
    Text(String),
    List(Vec<String>),
}

impl<'de> Deserialize<'de> for ExcludeSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match GlobSetting::deserialize(deserializer)? {
            GlobSetting::Text(raw) => ExcludeSpec::parse(&raw),
            GlobSetting::List(globs) => ExcludeSpec::from_list(globs),
        })
    }
}

impl Serialize for ExcludeSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ExcludeSpec::Unset => serializer.serialize_str(""),
            ExcludeSpec::Nothing => serializer.serialize_str(EXCLUDE_NOTHING),
            ExcludeSpec::Patterns(globs) => globs.serialize(serializer),
        }
    }
}

fn deserialize_include<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match GlobSetting::deserialize(deserializer)? {
        GlobSetting::Text(raw) => split_globs(&raw),
        GlobSetting::List(globs) => globs.into_iter().filter(|g| !g.is_empty()).collect(),
    })
}

/// Eligibility configuration for pull requests and files.
///
/// # Examples
///
/// ```
/// use patchbot_core::{ExcludeSpec, FilterConfig, TriggerMode};
///
/// let config = FilterConfig::default();
/// assert_eq!(config.exclude, ExcludeSpec::Unset);
/// assert_eq!(config.trigger_mode, TriggerMode::Event);
/// assert_eq!(config.no_review_labels.len(), 5);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Globs a file path must match at least one of. Required.
    #[serde(default, deserialize_with = "deserialize_include")]
    pub include: Vec<String>,
    /// Globs that remove a file from review.
    #[serde(default, skip_serializing_if = "ExcludeSpec::is_unset")]
    pub exclude: ExcludeSpec,
    /// Longest patch, in characters, that is sent to the model (default: 50000).
    #[serde(default = "default_max_patch_length")]
    pub max_patch_length: usize,
    /// What caused this run.
    #[serde(default)]
    pub trigger_mode: TriggerMode,
    /// Labels that exempt a PR from event-triggered reviews.
    #[serde(default = "default_no_review_labels")]
    pub no_review_labels: Vec<String>,
}

fn default_max_patch_length() -> usize {
    50_000
}

fn default_no_review_labels() -> Vec<String> {
    DEFAULT_NO_REVIEW_LABELS
        .iter()
        .map(|l| (*l).to_string())
        .collect()
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            exclude: ExcludeSpec::Unset,
            max_patch_length: default_max_patch_length(),
            trigger_mode: TriggerMode::Event,
            no_review_labels: default_no_review_labels(),
        }
    }
}

/// Prompt configuration.
///
/// # Examples
///
/// ```
/// use patchbot_core::PromptConfig;
///
/// let config = PromptConfig::default();
/// assert_eq!(config.language, "Japanese");
/// assert!(config.template.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Natural language the model should answer in.
    #[serde(default = "default_language")]
    pub language: String,
    /// Operator-supplied prompt that replaces the built-in review template.
    pub template: Option<String>,
}

fn default_language() -> String {
    "Japanese".into()
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            template: None,
        }
    }
}
