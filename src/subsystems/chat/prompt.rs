//! System prompts for the three session operations.
//!
//! Prompt bodies live as plain text under the configured prompts directory
//! and are read once at startup:
//!
//! ```text
//! persona.txt  : optional shared preamble, prepended to every prompt
//! chat.txt     : conversation prompt (may instruct the model to emit <END>)
//! ask.txt      : one-shot question prompt
//! summary.txt  : channel summary prompt
//! ```
//!
//! `{{bot_name}}` is substituted in every layer.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::AppError;

const SEPARATOR: &str = "\n\n";

/// Fluent builder that assembles a prompt from text-file layers.
pub struct PromptBuilder {
    prompts_dir: PathBuf,
    parts: Vec<String>,
    vars: HashMap<String, String>,
}

impl PromptBuilder {
    pub fn new(prompts_dir: impl Into<PathBuf>) -> Self {
        Self {
            prompts_dir: prompts_dir.into(),
            parts: Vec::new(),
            vars: HashMap::new(),
        }
    }

    /// Append an optional layer. Skips the layer when the file does not
    /// exist; any other read failure is an error.
    pub fn layer(mut self, filename: &str) -> Result<Self, AppError> {
        let path = self.prompts_dir.join(filename);
        match fs::read_to_string(&path) {
            Ok(text) => self.push(text),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("prompt: layer '{}' not found, skipped", path.display());
            }
            Err(e) => {
                return Err(AppError::Config(format!("cannot read prompt {}: {e}", path.display())));
            }
        }
        Ok(self)
    }

    /// Append a mandatory layer; a missing or blank file is an error.
    pub fn required(mut self, filename: &str) -> Result<Self, AppError> {
        let path = self.prompts_dir.join(filename);
        let text = fs::read_to_string(&path)
            .map_err(|e| AppError::Config(format!("cannot read prompt {}: {e}", path.display())))?;
        if text.trim().is_empty() {
            return Err(AppError::Config(format!("prompt {} is empty", path.display())));
        }
        self.push(text);
        Ok(self)
    }

    /// Register a single `{{key}}` → `value` substitution.
    pub fn var(mut self, key: &str, value: impl Into<String>) -> Self {
        self.vars.insert(key.to_string(), value.into());
        self
    }

    /// Join all layers with blank lines and apply variable substitution.
    pub fn build(self) -> String {
        let mut prompt = self.parts.join(SEPARATOR);
        for (k, v) in &self.vars {
            let placeholder = format!("{{{{{k}}}}}");
            prompt = prompt.replace(&placeholder, v);
        }
        prompt
    }

    fn push(&mut self, text: String) {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            self.parts.push(trimmed.to_string());
        }
    }
}

/// The immutable prompt bodies injected into every session.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptSet {
    pub chat: String,
    pub ask: String,
    pub summary: String,
}

impl PromptSet {
    /// Load `chat.txt`, `ask.txt` and `summary.txt` from `prompts_dir`.
    pub fn load(prompts_dir: &Path, bot_name: &str) -> Result<Self, AppError> {
        let build = |body: &str| -> Result<String, AppError> {
            Ok(PromptBuilder::new(prompts_dir)
                .layer("persona.txt")?
                .required(body)?
                .var("bot_name", bot_name)
                .build())
        };

        Ok(Self {
            chat: build("chat.txt")?,
            ask: build("ask.txt")?,
            summary: build("summary.txt")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn prompts_dir(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (name, body) in files {
            fs::write(dir.path().join(name), body).unwrap();
        }
        dir
    }

    #[test]
    fn builder_skips_missing_layer() {
        let dir = prompts_dir(&[]);
        let result = PromptBuilder::new(dir.path())
            .layer("nonexistent_file_xyz.txt")
            .unwrap()
            .build();
        assert_eq!(result, "");
    }

    #[test]
    fn unreadable_layer_is_config_error() {
        let dir = prompts_dir(&[("chat.txt", "chat"), ("ask.txt", "ask"), ("summary.txt", "summary")]);
        fs::create_dir(dir.path().join("persona.txt")).unwrap();
        let err = PromptSet::load(dir.path(), "bot").unwrap_err();
        assert!(err.to_string().contains("persona.txt"));
    }

    #[test]
    fn builder_substitutes_variable() {
        let dir = prompts_dir(&[("a.txt", "You are {{bot_name}}.\n")]);
        let result = PromptBuilder::new(dir.path())
            .required("a.txt")
            .unwrap()
            .var("bot_name", "parley")
            .build();
        assert_eq!(result, "You are parley.");
    }

    #[test]
    fn load_reads_all_three() {
        let dir = prompts_dir(&[
            ("chat.txt", "chat body"),
            ("ask.txt", "ask body"),
            ("summary.txt", "summary body"),
        ]);
        let set = PromptSet::load(dir.path(), "bot").unwrap();
        assert_eq!(set.chat, "chat body");
        assert_eq!(set.ask, "ask body");
        assert_eq!(set.summary, "summary body");
    }

    #[test]
    fn persona_is_prepended_to_each_prompt() {
        let dir = prompts_dir(&[
            ("persona.txt", "I am {{bot_name}}."),
            ("chat.txt", "chat"),
            ("ask.txt", "ask"),
            ("summary.txt", "summary"),
        ]);
        let set = PromptSet::load(dir.path(), "parley").unwrap();
        assert_eq!(set.chat, "I am parley.\n\nchat");
        assert_eq!(set.summary, "I am parley.\n\nsummary");
    }

    #[test]
    fn missing_prompt_is_config_error() {
        let dir = prompts_dir(&[("chat.txt", "chat"), ("ask.txt", "ask")]);
        let err = PromptSet::load(dir.path(), "bot").unwrap_err();
        assert!(err.to_string().contains("summary.txt"));
    }

    #[test]
    fn blank_prompt_is_config_error() {
        let dir = prompts_dir(&[("chat.txt", "  \n"), ("ask.txt", "a"), ("summary.txt", "s")]);
        assert!(PromptSet::load(dir.path(), "bot").is_err());
    }
}
