//! Command prefix rules.

use crate::error::{Error, Result};

/// Most prefixes a guild may configure.
pub const MAX_PREFIXES: usize = 50;

/// Longest prefix accepted, in characters.
pub const MAX_PREFIX_LEN: usize = 20;

/// Deduplicate and validate a guild's prefix list.
///
/// Keeps the first occurrence of each prefix. An empty list is allowed and
/// leaves only the mention prefixes active.
///
/// # Errors
/// `Error::InvalidPrefixes` when the list or one of its entries breaks a rule.
pub fn normalize_prefixes(prefixes: Vec<String>) -> Result<Vec<String>> {
    let mut unique: Vec<String> = Vec::with_capacity(prefixes.len());
    for prefix in prefixes {
        if !unique.contains(&prefix) {
            unique.push(prefix);
        }
    }

    if unique.len() > MAX_PREFIXES {
        return Err(invalid(format!("at most {MAX_PREFIXES} prefixes can be set")));
    }

    for prefix in &unique {
        if prefix.is_empty() {
            return Err(invalid("prefix cannot be empty"));
        }
        if prefix.chars().count() > MAX_PREFIX_LEN {
            return Err(invalid(format!(
                "prefix cannot be longer than {MAX_PREFIX_LEN} characters"
            )));
        }
        if prefix.contains('`') {
            return Err(invalid("prefix cannot contain `"));
        }
        if prefix.ends_with('\\') {
            return Err(invalid("prefix cannot end with \\"));
        }
    }

    Ok(unique)
}

/// Prefixes that address the bot by mention, in both mention syntaxes.
pub fn mention_prefixes(bot_user_id: u64) -> [String; 2] {
    [format!("<@{bot_user_id}>"), format!("<@!{bot_user_id}>")]
}

fn invalid(reason: impl Into<String>) -> Error {
    Error::InvalidPrefixes(reason.into())
}
