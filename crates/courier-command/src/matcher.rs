use courier_core::MessengerConfig;

/// Recognises explicit prefix commands by their identifier.
///
/// The first whitespace-delimited token must be a perfect match of
/// `prefix + identifier`; matching never looks past the first token.
#[derive(Debug, Clone)]
pub struct CommandMatcher {
    identifiers: Vec<String>,
}

impl CommandMatcher {
    pub fn new<I, S>(identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            identifiers: identifiers.into_iter().map(Into::into).collect(),
        }
    }

    /// Return the matched identifier, if the content opens with one.
    pub fn match_text<'a>(&'a self, content: &str, config: &MessengerConfig) -> Option<&'a str> {
        let first = content.split_whitespace().next()?;
        self.identifiers
            .iter()
            .find(|id| first == format!("{}{}", config.prefix, id))
            .map(String::as_str)
    }
}

/// Split a user-supplied list on the configured separator, trimming each
/// piece and dropping empties. `"a; b ;;c"` with `";"` yields `[a, b, c]`.
pub fn separate_args(content: &str, separator: &str) -> Vec<String> {
    content
        .split(separator)
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(String::from)
        .collect()
}

/// Detect a leading `@bot` mention and return the remaining text, trimmed.
///
/// Returns `None` when the content does not address the bot.
pub fn calling_bot(content: &str, config: &MessengerConfig) -> Option<String> {
    if config.bot_id.is_empty() {
        return None;
    }
    let mention = format!("<@{}>", config.bot_id);
    content
        .strip_prefix(&mention)
        .map(|rest| rest.trim().to_string())
}
