//! Key and scope validation.
//!
//! Valid scopes:
//! - Must be non-empty and at most [`MAX_SCOPE_LEN`] bytes
//! - Only ASCII letters, digits, `-`, `_` and `.`
//! - Must not be `.` or `..`
//!
//! Valid keys for filesystem-backed mediums:
//! - Must be non-empty and at most [`MAX_KEY_LEN`] bytes
//! - Must not contain `/`, `\` or control characters (including NUL)
//! - Must not be `.` or `..`
//!
//! Any other text is accepted, including spaces and non-ASCII letters. A
//! validated key maps to exactly one entry directly under its scope root.
//! Scopes never contain [`SCOPE_SEPARATOR`], so a scope prefix is never
//! ambiguous even when keys do.

use crate::error::{StoreError, StoreResult};

/// Separator between scope and key in flat shared namespaces.
pub const SCOPE_SEPARATOR: char = ':';

/// Longest accepted scope, in bytes.
pub const MAX_SCOPE_LEN: usize = 128;

/// Longest accepted key, in bytes. Matches the common filename limit.
pub const MAX_KEY_LEN: usize = 255;

const SCOPE_PUNCTUATION: &[char] = &['-', '_', '.'];

/// Validate a scope identifier, returning `Ok(())` if valid.
///
/// # Examples
///
/// ```
/// use tierkv_store::names::validate_scope;
///
/// assert!(validate_scope("cfg").is_ok());
/// assert!(validate_scope("").is_err());
/// assert!(validate_scope("a/b").is_err());
/// ```
pub fn validate_scope(scope: &str) -> StoreResult<()> {
    let invalid = |reason: String| StoreError::InvalidScope {
        scope: scope.to_string(),
        reason,
    };

    if scope.is_empty() {
        return Err(invalid("scope must not be empty".into()));
    }
    if scope.len() > MAX_SCOPE_LEN {
        return Err(invalid(format!("longer than {MAX_SCOPE_LEN} bytes")));
    }
    if scope == "." || scope == ".." {
        return Err(invalid("must not be a relative path segment".into()));
    }
    if let Some(ch) = scope
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && !SCOPE_PUNCTUATION.contains(c))
    {
        return Err(invalid(format!("contains forbidden character: {ch:?}")));
    }
    Ok(())
}

/// Validate a key for use with filesystem-backed mediums.
///
/// # Examples
///
/// ```
/// use tierkv_store::names::validate_key;
///
/// assert!(validate_key("settings").is_ok());
/// assert!(validate_key("my key").is_ok());
/// assert!(validate_key("café").is_ok());
/// assert!(validate_key("../etc/passwd").is_err());
/// ```
pub fn validate_key(key: &str) -> StoreResult<()> {
    let invalid = |reason: String| StoreError::InvalidKey {
        key: key.to_string(),
        reason,
    };

    if key.is_empty() {
        return Err(invalid("key must not be empty".into()));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(invalid(format!("longer than {MAX_KEY_LEN} bytes")));
    }
    if key == "." || key == ".." {
        return Err(invalid("must not be a relative path segment".into()));
    }
    if let Some(ch) = key
        .chars()
        .find(|&c| c == '/' || c == '\\' || c.is_control())
    {
        return Err(invalid(format!("contains forbidden character: {ch:?}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn valid_keys() {
        assert!(validate_key("a").is_ok());
        assert!(validate_key("settings.json").is_ok());
        assert!(validate_key("user@example.com").is_ok());
        assert!(validate_key("a+b=c,d").is_ok());
        assert!(validate_key(".hidden").is_ok());
        assert!(validate_key("...").is_ok());
    }

    #[test]
    fn accepts_spaces_unicode_and_colons() {
        assert!(validate_key("my key").is_ok());
        assert!(validate_key("café").is_ok());
        assert!(validate_key("ключ").is_ok());
        assert!(validate_key("a:b").is_ok());
        assert!(validate_key(" padded ").is_ok());
    }

    #[test]
    fn reject_path_traversal() {
        assert!(validate_key(".").is_err());
        assert!(validate_key("..").is_err());
        assert!(validate_key("../x").is_err());
        assert!(validate_key("a/b").is_err());
        assert!(validate_key("a\\b").is_err());
    }

    #[test]
    fn reject_empty_and_oversized_keys() {
        assert!(validate_key("").is_err());
        assert!(validate_key(&"k".repeat(MAX_KEY_LEN)).is_ok());
        assert!(validate_key(&"k".repeat(MAX_KEY_LEN + 1)).is_err());
    }

    #[test]
    fn reject_control_characters() {
        assert!(validate_key("tab\t").is_err());
        assert!(validate_key("line\nbreak").is_err());
        assert!(validate_key("nul\0").is_err());
        assert!(validate_key("del\u{7f}").is_err());
    }

    #[test]
    fn length_limit_counts_bytes() {
        // 'é' is two bytes.
        assert!(validate_key(&"é".repeat(MAX_KEY_LEN / 2)).is_ok());
        assert!(validate_key(&"é".repeat(MAX_KEY_LEN / 2 + 1)).is_err());
    }

    #[test]
    fn scopes() {
        assert!(validate_scope("cfg").is_ok());
        assert!(validate_scope("my-app_v1.2").is_ok());
        assert!(validate_scope("").is_err());
        assert!(validate_scope("..").is_err());
        assert!(validate_scope("a:b").is_err());
        assert!(validate_scope("a@b").is_err());
        assert!(validate_scope(&"s".repeat(MAX_SCOPE_LEN + 1)).is_err());
    }

    proptest! {
        #[test]
        fn valid_keys_never_contain_separators(key in "\\PC{0,40}") {
            if validate_key(&key).is_ok() {
                prop_assert!(!key.contains('/'));
                prop_assert!(!key.contains('\\'));
                prop_assert!(!key.chars().any(char::is_control));
                prop_assert!(key != "." && key != "..");
            }
        }

        #[test]
        fn separator_free_keys_are_accepted(key in "[^/\\\\\\p{Cc}]{1,40}") {
            prop_assume!(key != "." && key != "..");
            prop_assert!(validate_key(&key).is_ok());
        }
    }
}
