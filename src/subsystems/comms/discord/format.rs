//! Outbound message formatting: length limits and embeds.

use serde::Serialize;

/// Discord's per-message content limit.
pub const MAX_MESSAGE_LENGTH: usize = 2000;

/// Discord's per-field value limit.
pub const MAX_FIELD_VALUE_LENGTH: usize = 1024;

/// `discord.Colour.dark_gray()`
pub const COLOR_DARK_GRAY: u32 = 0x607d8b;
/// `discord.Colour.red()`
pub const COLOR_RED: u32 = 0xe74c3c;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// Dark-gray embed with a single named field, used for ask/summary results.
pub fn field_embed(name: &str, value: &str) -> Embed {
    // Discord rejects empty field values.
    let value = if value.is_empty() { "\u{200b}" } else { value };
    Embed {
        color: Some(COLOR_DARK_GRAY),
        fields: vec![EmbedField {
            name: name.to_string(),
            value: truncate(value, MAX_FIELD_VALUE_LENGTH),
            inline: true,
        }],
        ..Embed::default()
    }
}

/// Red "Error" embed carrying the error text.
pub fn error_embed(description: &str) -> Embed {
    Embed {
        title: Some("Error".to_string()),
        description: Some(description.to_string()),
        color: Some(COLOR_RED),
        ..Embed::default()
    }
}

/// Cut `text` to at most `max` characters, ending with `…` when cut.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Split `text` into chunks of at most [`MAX_MESSAGE_LENGTH`] characters,
/// preferring line boundaries, then whitespace.
///
/// Always returns at least one chunk, so an empty reply still yields `[""]`.
pub fn split_message(text: &str) -> Vec<String> {
    if text.chars().count() <= MAX_MESSAGE_LENGTH {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    // Whether `current` holds a line, which may itself be blank.
    let mut open = false;

    for line in text.split('\n') {
        let line_len = line.chars().count();
        let sep = usize::from(open);

        if current_len + sep + line_len <= MAX_MESSAGE_LENGTH {
            if open {
                current.push('\n');
            }
            current.push_str(line);
            current_len += sep + line_len;
            open = true;
            continue;
        }

        if open {
            chunks.push(std::mem::take(&mut current));
        }

        let mut remaining = line;
        while remaining.chars().count() > MAX_MESSAGE_LENGTH {
            let at = split_point(remaining, MAX_MESSAGE_LENGTH);
            chunks.push(remaining[..at].to_string());
            remaining = &remaining[at..];
        }
        current = remaining.to_string();
        current_len = remaining.chars().count();
        open = true;
    }

    if open {
        chunks.push(current);
    }

    chunks
}

/// Byte index at which to cut `text` so the head holds at most `max_chars`
/// characters, preferring the last whitespace.
fn split_point(text: &str, max_chars: usize) -> usize {
    let limit = text
        .char_indices()
        .nth(max_chars)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    match text[..limit].rfind(char::is_whitespace) {
        Some(i) if i > 0 => i,
        _ => limit,
    }
}
