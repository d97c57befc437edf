//! Prefix-command parsing.
//!
//! ```text
//! !chat [window=N] <message>
//! !ask <question>                  (alias: !qa)
//! !summary [window=N | N]
//! !auto_reply [on|off|…]           (alias: !ar), no argument toggles
//! !auto_reply_window [N]
//! !purge [N]                       owner only, 1..=100
//! ```

use thiserror::Error;

/// Upper bound Discord accepts for a single purge.
pub const MAX_PURGE: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Chat { message: String, window: Option<usize> },
    Ask { question: String },
    Summary { window: Option<usize> },
    AutoReply { enabled: Option<bool> },
    AutoReplyWindow { length: Option<usize> },
    Purge { limit: usize },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Chat { .. } => "chat",
            Command::Ask { .. } => "ask",
            Command::Summary { .. } => "summary",
            Command::AutoReply { .. } => "auto_reply",
            Command::AutoReplyWindow { .. } => "auto_reply_window",
            Command::Purge { .. } => "purge",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("{0} is a required argument that is missing.")]
    MissingArgument(&'static str),
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// Parse `content` as a command. `None` when it does not start with
/// `prefix`.
pub fn parse(prefix: &str, content: &str) -> Option<Result<Command, ParseError>> {
    let body = content.strip_prefix(prefix)?;
    let (name, rest) = split_word(body);
    let rest = rest.trim();

    Some(match name {
        "chat" => parse_chat(rest),
        "ask" | "qa" => required_text(rest, "question").map(|question| Command::Ask { question }),
        "summary" => parse_summary(rest),
        "auto_reply" | "ar" => optional_bool(rest, "enabled").map(|enabled| Command::AutoReply { enabled }),
        "auto_reply_window" => {
            optional_number(rest, "length").map(|length| Command::AutoReplyWindow { length })
        }
        "purge" => parse_purge(rest),
        other => Err(ParseError::Unknown(other.to_string())),
    })
}

fn parse_chat(rest: &str) -> Result<Command, ParseError> {
    let (window, message) = take_window_option(rest)?;
    let message = required_text(message, "message")?;
    Ok(Command::Chat { message, window })
}

fn parse_summary(rest: &str) -> Result<Command, ParseError> {
    let (window, remaining) = take_window_option(rest)?;
    if window.is_some() {
        return Ok(Command::Summary { window });
    }
    optional_number(remaining, "window").map(|window| Command::Summary { window })
}

fn parse_purge(rest: &str) -> Result<Command, ParseError> {
    let limit = optional_number(rest, "limit")?.unwrap_or(1);
    if !(1..=MAX_PURGE).contains(&limit) {
        return Err(ParseError::InvalidValue { name: "limit", value: limit.to_string() });
    }
    Ok(Command::Purge { limit })
}

/// Strip a leading `window=N` token.
fn take_window_option(rest: &str) -> Result<(Option<usize>, &str), ParseError> {
    let (first, remaining) = split_word(rest);
    match first.strip_prefix("window=") {
        Some(value) => Ok((Some(number(value, "window")?), remaining.trim_start())),
        None => Ok((None, rest)),
    }
}

fn split_word(text: &str) -> (&str, &str) {
    match text.find(char::is_whitespace) {
        Some(i) => (&text[..i], &text[i..]),
        None => (text, ""),
    }
}

fn required_text(rest: &str, name: &'static str) -> Result<String, ParseError> {
    let text = rest.trim();
    if text.is_empty() {
        Err(ParseError::MissingArgument(name))
    } else {
        Ok(text.to_string())
    }
}

fn optional_number(rest: &str, name: &'static str) -> Result<Option<usize>, ParseError> {
    let text = rest.trim();
    if text.is_empty() { Ok(None) } else { number(text, name).map(Some) }
}

fn number(text: &str, name: &'static str) -> Result<usize, ParseError> {
    text.parse::<usize>()
        .map_err(|_| ParseError::InvalidValue { name, value: text.to_string() })
}

fn optional_bool(rest: &str, name: &'static str) -> Result<Option<bool>, ParseError> {
    let text = rest.trim();
    if text.is_empty() {
        return Ok(None);
    }
    match text.to_ascii_lowercase().as_str() {
        "yes" | "y" | "true" | "t" | "1" | "enable" | "on" => Ok(Some(true)),
        "no" | "n" | "false" | "f" | "0" | "disable" | "off" => Ok(Some(false)),
        _ => Err(ParseError::InvalidValue { name, value: text.to_string() }),
    }
}
