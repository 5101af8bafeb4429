use std::fmt;

/// Separator between the identifying fields of a key.
const KEY_SEPARATOR: &str = "-";

/// The identity a session is stored under: an opaque, order-sensitive join
/// of identifying fields (channel + user, or message + user).
///
/// Two sessions with the same key are the same conversation; the store
/// enforces at-most-one of them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CombinedKey(String);

impl CombinedKey {
    /// Combine the given fields, in order, into one key.
    pub fn join<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = parts
            .into_iter()
            .map(|p| p.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(KEY_SEPARATOR);
        Self(joined)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CombinedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
