use crate::error::{Result, ShortenerError};

const MIN_CODE_LENGTH: usize = 4;
const MAX_CODE_LENGTH: usize = 64;

/// Checks a caller-chosen short code.
///
/// Valid codes are 4-64 characters of `[a-zA-Z0-9_-]`.
pub fn validate_code(code: &str) -> Result<()> {
    let len = code.chars().count();
    if !(MIN_CODE_LENGTH..=MAX_CODE_LENGTH).contains(&len) {
        return Err(ShortenerError::InvalidShortCode(format!(
            "length must be between {MIN_CODE_LENGTH} and {MAX_CODE_LENGTH}, got {len}"
        )));
    }

    check_code_chars(code)
}

/// Checks a code being looked up or deleted.
///
/// Minted codes may be shorter than custom ones, so only emptiness, the
/// upper length bound and the character set are enforced.
pub fn validate_lookup_code(code: &str) -> Result<()> {
    if code.is_empty() {
        return Err(ShortenerError::InvalidShortCode(
            "short code cannot be empty".to_string(),
        ));
    }
    let len = code.chars().count();
    if len > MAX_CODE_LENGTH {
        return Err(ShortenerError::InvalidShortCode(format!(
            "length must be at most {MAX_CODE_LENGTH}, got {len}"
        )));
    }
    check_code_chars(code)
}

fn check_code_chars(code: &str) -> Result<()> {
    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ShortenerError::InvalidShortCode(format!(
            "must contain only alphanumeric characters, hyphens, or underscores: '{code}'"
        )));
    }

    Ok(())
}

/// Checks that `url` is absolute: `scheme://rest`.
///
/// The scheme starts with a letter followed by letters, digits, `+`, `-` or
/// `.`; the rest is non-empty and has no whitespace.
pub fn validate_url(url: &str) -> Result<()> {
    if url.is_empty() {
        return Err(ShortenerError::InvalidUrl("URL cannot be empty".to_string()));
    }

    let Some((scheme, rest)) = url.split_once("://") else {
        return Err(ShortenerError::InvalidUrl(format!(
            "URL must be absolute: '{url}'"
        )));
    };

    let mut chars = scheme.chars();
    let scheme_ok = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if !scheme_ok {
        return Err(ShortenerError::InvalidUrl(format!(
            "invalid scheme '{scheme}' in '{url}'"
        )));
    }

    if rest.is_empty() || rest.chars().any(char::is_whitespace) {
        return Err(ShortenerError::InvalidUrl(format!(
            "URL must have a host or path after the scheme: '{url}'"
        )));
    }

    Ok(())
}
