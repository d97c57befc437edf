//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` (or the file named by `PARLEY_CONFIG`)
//! relative to the current working directory, then applies env overrides:
//! `PARLEY_LOG_LEVEL`, `CHAT_MODEL`, `ASK_MODEL`, `SUMMARY_MODEL`.
//! The completion credential comes from `OPENAI_API_KEY` only: never TOML.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::AppError;
use crate::logger;

/// Discord channel configuration.
#[derive(Debug, Clone)]
pub struct DiscordConfig {
    /// Whether the Discord channel is enabled.
    pub enabled: bool,
    /// Prefix that marks a message as a bot command (e.g. `"!"`).
    pub command_prefix: String,
    /// Messages fetched before a triggering message on auto-reply / mention.
    pub auto_reply_history: usize,
    /// User ids allowed to run owner-only commands. Empty means "ask Discord
    /// for the application owner".
    pub owner_ids: Vec<String>,
}

/// Comms subsystem configuration.
#[derive(Debug, Clone)]
pub struct CommsConfig {
    pub discord: DiscordConfig,
}

/// OpenAI / OpenAI-compatible provider configuration.
/// Populated from `[llm.openai]` in the TOML.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    /// Sampling temperature (ignored for models that forbid it).
    pub temperature: f32,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
}

/// LLM subsystem configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Which provider is active (`"dummy"`, `"openai"`).
    /// Maps to `default` in `[llm]` TOML.
    pub provider: String,
    pub openai: OpenAiConfig,
}

/// Model names used per session operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub chat: String,
    pub ask: String,
    pub summary: String,
}

/// Chat session configuration (`[chat]`).
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Directory holding `chat.txt`, `ask.txt`, `summary.txt` (already expanded).
    pub prompts_dir: PathBuf,
    pub models: ModelConfig,
    /// Default history window for the `chat` command.
    pub chat_window: usize,
    /// Default history window for the `summary` command.
    pub summary_window: usize,
    /// Initial `auto_reply_window` for new sessions.
    pub auto_reply_window: usize,
}

/// Fully-resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_name: String,
    pub log_level: String,
    pub comms: CommsConfig,
    pub llm: LlmConfig,
    pub chat: ChatConfig,
    /// API key from `OPENAI_API_KEY`: `None` when unset or empty.
    pub llm_api_key: Option<String>,
}

impl Config {
    /// Returns `true` if the Discord channel should be loaded.
    pub fn comms_discord_should_load(&self) -> bool {
        self.comms.discord.enabled
    }
}

/// Values sourced from the process environment.
///
/// Kept separate from [`load_from`] so tests can pass overrides directly
/// instead of mutating env vars.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub log_level: Option<String>,
    pub chat_model: Option<String>,
    pub ask_model: Option<String>,
    pub summary_model: Option<String>,
    pub api_key: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            log_level: non_empty_var("PARLEY_LOG_LEVEL"),
            chat_model: non_empty_var("CHAT_MODEL"),
            ask_model: non_empty_var("ASK_MODEL"),
            summary_model: non_empty_var("SUMMARY_MODEL"),
            api_key: non_empty_var("OPENAI_API_KEY"),
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Raw TOML shape: `serde` target before resolution.
#[derive(Deserialize)]
struct RawConfig {
    supervisor: RawSupervisor,
    #[serde(default)]
    comms: RawComms,
    #[serde(default)]
    llm: RawLlm,
    #[serde(default)]
    chat: RawChat,
}

#[derive(Deserialize)]
struct RawSupervisor {
    bot_name: String,
    #[serde(default = "default_log_level")]
    log_level: String,
}

#[derive(Deserialize, Default)]
struct RawComms {
    #[serde(default)]
    discord: RawDiscord,
}

#[derive(Deserialize)]
struct RawDiscord {
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default = "default_command_prefix")]
    command_prefix: String,
    #[serde(default = "default_auto_reply_history")]
    auto_reply_history: usize,
    #[serde(default)]
    owner_ids: Vec<String>,
}

impl Default for RawDiscord {
    fn default() -> Self {
        Self {
            enabled: true,
            command_prefix: default_command_prefix(),
            auto_reply_history: default_auto_reply_history(),
            owner_ids: Vec::new(),
        }
    }
}

#[derive(Deserialize)]
struct RawLlm {
    /// Maps to `default = "..."` in `[llm]`.
    #[serde(rename = "default", default = "default_llm_provider")]
    provider: String,
    #[serde(default)]
    openai: RawOpenAiConfig,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self { provider: default_llm_provider(), openai: RawOpenAiConfig::default() }
    }
}

#[derive(Deserialize)]
struct RawOpenAiConfig {
    #[serde(default = "default_openai_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_openai_temperature")]
    temperature: f32,
    #[serde(default = "default_openai_timeout_seconds")]
    timeout_seconds: u64,
}

impl Default for RawOpenAiConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_openai_api_base_url(),
            temperature: default_openai_temperature(),
            timeout_seconds: default_openai_timeout_seconds(),
        }
    }
}

#[derive(Deserialize)]
struct RawChat {
    #[serde(default = "default_prompts_dir")]
    prompts_dir: String,
    #[serde(default = "default_chat_model")]
    chat_model: String,
    #[serde(default = "default_ask_model")]
    ask_model: String,
    #[serde(default = "default_summary_model")]
    summary_model: String,
    #[serde(default = "default_chat_window")]
    chat_window: usize,
    #[serde(default = "default_summary_window")]
    summary_window: usize,
    #[serde(default = "default_auto_reply_window")]
    auto_reply_window: usize,
}

impl Default for RawChat {
    fn default() -> Self {
        Self {
            prompts_dir: default_prompts_dir(),
            chat_model: default_chat_model(),
            ask_model: default_ask_model(),
            summary_model: default_summary_model(),
            chat_window: default_chat_window(),
            summary_window: default_summary_window(),
            auto_reply_window: default_auto_reply_window(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_command_prefix() -> String { "!".to_string() }
fn default_auto_reply_history() -> usize { 10 }
fn default_llm_provider() -> String { "openai".to_string() }
fn default_openai_api_base_url() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_openai_temperature() -> f32 { 0.7 }
fn default_openai_timeout_seconds() -> u64 { 60 }
fn default_prompts_dir() -> String { "config/prompts".to_string() }
fn default_chat_model() -> String { "gpt-4-turbo-preview".to_string() }
fn default_ask_model() -> String { "gpt-4-turbo-preview".to_string() }
fn default_summary_model() -> String { "gpt-3.5-turbo-16k".to_string() }
fn default_chat_window() -> usize { 10 }
fn default_summary_window() -> usize { 50 }
fn default_auto_reply_window() -> usize { 10 }

fn default_true() -> bool {
    true
}

/// Load config from `config_path`, else `PARLEY_CONFIG`, else
/// `config/default.toml`, then apply env-var overrides.
pub fn load(config_path: Option<&str>) -> Result<Config, AppError> {
    let path = match config_path {
        Some(p) => p.to_string(),
        None => env::var("PARLEY_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string()),
    };
    load_from(Path::new(&path), &EnvOverrides::from_env())
}

/// Internal loader: accepts an explicit path and overrides.
pub fn load_from(path: &Path, overrides: &EnvOverrides) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    let s = parsed.supervisor;
    let log_level = overrides.log_level.clone().unwrap_or(s.log_level);
    logger::parse_level(&log_level).map_err(|e| AppError::Config(e.to_string()))?;

    let d = parsed.comms.discord;
    if d.command_prefix.trim().is_empty() {
        return Err(AppError::Config("comms.discord.command_prefix must not be empty".into()));
    }

    let c = parsed.chat;
    let models = ModelConfig {
        chat: overrides.chat_model.clone().unwrap_or(c.chat_model),
        ask: overrides.ask_model.clone().unwrap_or(c.ask_model),
        summary: overrides.summary_model.clone().unwrap_or(c.summary_model),
    };

    Ok(Config {
        bot_name: s.bot_name,
        log_level,
        comms: CommsConfig {
            discord: DiscordConfig {
                enabled: d.enabled,
                command_prefix: d.command_prefix,
                auto_reply_history: d.auto_reply_history,
                owner_ids: d.owner_ids,
            },
        },
        llm: LlmConfig {
            provider: parsed.llm.provider,
            openai: OpenAiConfig {
                api_base_url: parsed.llm.openai.api_base_url,
                temperature: parsed.llm.openai.temperature,
                timeout_seconds: parsed.llm.openai.timeout_seconds,
            },
        },
        chat: ChatConfig {
            prompts_dir: expand_home(&c.prompts_dir),
            models,
            chat_window: c.chat_window,
            summary_window: c.summary_window,
            auto_reply_window: c.auto_reply_window,
        },
        llm_api_key: overrides.api_key.clone(),
    })
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL_TOML: &str = r#"
[supervisor]
bot_name = "test-bot"
"#;

    fn write_toml(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn parse_minimal_config_applies_defaults() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), &EnvOverrides::default()).unwrap();
        assert_eq!(cfg.bot_name, "test-bot");
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.llm.provider, "openai");
        assert_eq!(cfg.comms.discord.command_prefix, "!");
        assert_eq!(cfg.comms.discord.auto_reply_history, 10);
        assert!(cfg.comms_discord_should_load());
        assert_eq!(cfg.chat.models.chat, "gpt-4-turbo-preview");
        assert_eq!(cfg.chat.models.summary, "gpt-3.5-turbo-16k");
        assert_eq!(cfg.chat.chat_window, 10);
        assert_eq!(cfg.chat.summary_window, 50);
        assert_eq!(cfg.chat.auto_reply_window, 10);
        assert!(cfg.llm_api_key.is_none());
    }

    #[test]
    fn full_config_parses() {
        let f = write_toml(
            r#"
[supervisor]
bot_name = "parley"
log_level = "debug"

[comms.discord]
enabled = false
command_prefix = "?"
auto_reply_history = 4
owner_ids = ["42"]

[llm]
default = "dummy"

[llm.openai]
api_base_url = "http://localhost:1234/v1/chat/completions"
temperature = 0.1
timeout_seconds = 5

[chat]
prompts_dir = "prompts"
chat_model = "m-chat"
ask_model = "m-ask"
summary_model = "m-sum"
chat_window = 3
summary_window = 7
auto_reply_window = 2
"#,
        );
        let cfg = load_from(f.path(), &EnvOverrides::default()).unwrap();
        assert_eq!(cfg.log_level, "debug");
        assert!(!cfg.comms_discord_should_load());
        assert_eq!(cfg.comms.discord.command_prefix, "?");
        assert_eq!(cfg.comms.discord.owner_ids, vec!["42".to_string()]);
        assert_eq!(cfg.llm.provider, "dummy");
        assert_eq!(cfg.llm.openai.timeout_seconds, 5);
        assert_eq!(cfg.chat.prompts_dir, PathBuf::from("prompts"));
        assert_eq!(
            cfg.chat.models,
            ModelConfig { chat: "m-chat".into(), ask: "m-ask".into(), summary: "m-sum".into() }
        );
        assert_eq!(cfg.chat.auto_reply_window, 2);
    }

    #[test]
    fn env_overrides_win() {
        let f = write_toml(MINIMAL_TOML);
        let overrides = EnvOverrides {
            log_level: Some("trace".into()),
            chat_model: Some("override-chat".into()),
            ask_model: None,
            summary_model: Some("override-sum".into()),
            api_key: Some("sk-test".into()),
        };
        let cfg = load_from(f.path(), &overrides).unwrap();
        assert_eq!(cfg.log_level, "trace");
        assert_eq!(cfg.chat.models.chat, "override-chat");
        assert_eq!(cfg.chat.models.ask, "gpt-4-turbo-preview");
        assert_eq!(cfg.chat.models.summary, "override-sum");
        assert_eq!(cfg.llm_api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn invalid_log_level_rejected() {
        let f = write_toml(MINIMAL_TOML);
        let overrides = EnvOverrides { log_level: Some("loud".into()), ..Default::default() };
        let err = load_from(f.path(), &overrides).unwrap_err();
        assert!(err.to_string().contains("config error"));
    }

    #[test]
    fn empty_command_prefix_rejected() {
        let f = write_toml(
            r#"
[supervisor]
bot_name = "b"

[comms.discord]
command_prefix = " "
"#,
        );
        assert!(load_from(f.path(), &EnvOverrides::default()).is_err());
    }

    #[test]
    fn missing_file_errors() {
        let result = load_from(Path::new("/nonexistent/config.toml"), &EnvOverrides::default());
        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("config error"));
    }

    #[test]
    fn tilde_expands_to_home() {
        let home = dirs::home_dir().expect("home dir must exist in test env");
        let expanded = expand_home("~/.parley");
        assert!(expanded.starts_with(&home));
        assert!(expanded.ends_with(".parley"));
    }

    #[test]
    fn relative_path_unchanged() {
        assert_eq!(expand_home("relative/path"), PathBuf::from("relative/path"));
    }
}
