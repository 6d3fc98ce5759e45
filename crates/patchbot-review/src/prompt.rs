use patchbot_core::PromptConfig;

/// Builds the text sent to the model for one file.
///
/// # Examples
///
/// ```
/// use patchbot_core::PromptConfig;
/// use patchbot_review::prompt::PromptBuilder;
///
/// let builder = PromptBuilder::new(&PromptConfig::default());
/// let prompt = builder.build("rs", "+fn main() {}");
/// assert!(prompt.contains("for a rs file"));
/// assert!(prompt.contains("+fn main() {}"));
/// ```
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    language: String,
    template: Option<String>,
}

impl PromptBuilder {
    /// Create a builder from prompt configuration.
    ///
    /// A blank template counts as no template.
    pub fn new(config: &PromptConfig) -> Self {
        Self {
            language: config.language.clone(),
            template: config.template.clone().filter(|t| !t.is_empty()),
        }
    }

    /// Build the prompt for a patch of a file with the given extension.
    ///
    /// The patch is embedded as-is; size limits are enforced before this point.
    pub fn build(&self, file_extension: &str, patch: &str) -> String {
        match &self.template {
            Some(template) => format!(
                "{template}, Answer me in {}:\n{patch}\n",
                self.language
            ),
            None => self.default_prompt(file_extension, patch),
        }
    }

    /// Build the prompt for a file path, deriving the extension from it.
    pub fn build_for_path(&self, path: &str, patch: &str) -> String {
        self.build(file_extension(path), patch)
    }

    fn default_prompt(&self, file_extension: &str, patch: &str) -> String {
        let file_type = if file_extension.is_empty() {
            String::new()
        } else {
            format!(" for a {file_extension} file")
        };
        let language = &self.language;

        format!(
            "You are a skilled software engineer.
Below is a code patch{file_type}. Please help me review it.
The review comment must be in the following format in {language} and Review Summary must include positive messages and compliments.

Patch

```
{patch}
```

Review Format

## Review Summary

## Bug Risks

### 1. ~ (1st risk, please fill the title)

(Please continue to comment as needed.)

## Improvement Suggestions

### 1. ~ (1st suggestion, please fill the title)

(Please continue to comment as needed.)"
        )
    }
}

/// Extension of the last path segment, or `""` when it has no `.`.
///
/// # Examples
///
/// ```
/// use patchbot_review::prompt::file_extension;
///
/// assert_eq!(file_extension("src/app/main.tsx"), "tsx");
/// assert_eq!(file_extension("archive.tar.gz"), "gz");
/// assert_eq!(file_extension("Makefile"), "");
/// ```
pub fn file_extension(path: &str) -> &str {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    match file_name.rsplit_once('.') {
        Some((_, ext)) => ext,
        None => "",
    }
}
