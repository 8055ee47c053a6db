//! Clash of Clans player and clan tags.

use crate::error::{BotError, Result};

/// Characters the game uses in tags
const TAG_ALPHABET: &str = "0289PYLQGRJCUV";

/// Normalize user input into a canonical `#TAG`.
///
/// Users frequently type the letter `O` where the game uses zero,
/// and omit the leading hash.
pub fn normalize_tag(raw: &str) -> Result<String> {
    let body: String = raw
        .trim()
        .trim_start_matches('#')
        .to_uppercase()
        .replace('O', "0");

    let valid_len = (3..=15).contains(&body.len());
    if !valid_len || !body.chars().all(|c| TAG_ALPHABET.contains(c)) {
        return Err(BotError::InvalidTag {
            tag: raw.trim().to_string(),
        });
    }

    Ok(format!("#{}", body))
}

/// Normalize a list of tags, dropping duplicates while keeping order
pub fn normalize_tags<S: AsRef<str>>(raw: &[S]) -> Result<Vec<String>> {
    let mut tags: Vec<String> = Vec::with_capacity(raw.len());
    for input in raw {
        let tag = normalize_tag(input.as_ref())?;
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    Ok(tags)
}
