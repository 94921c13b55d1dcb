//! Best-effort identifier extraction from free-text diagnostics.
//!
//! Postgres messages and details are locale and version dependent, so these
//! helpers never fail: a miss yields `None` or an empty list.

use std::sync::LazyLock;

use regex::Regex;

static KEY_LIST: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"Key \(([^)]+)\)").ok());

/// Take the space-delimited token at `index` of `message` and return the text
/// between its first pair of double quotes.
///
/// `relation "users" does not exist` at index 1 yields `users`.
pub fn extract_quoted_token(message: &str, index: usize) -> Option<String> {
    message.split(' ').nth(index).and_then(quoted_segment)
}

/// Same as [`extract_quoted_token`] but for the last token of `message`.
pub fn extract_last_quoted_token(message: &str) -> Option<String> {
    message.split(' ').next_back().and_then(quoted_segment)
}

/// Column list of the first `Key (a, b)` fragment in `detail`.
pub fn extract_key_list(detail: &str) -> Vec<String> {
    let Some(pattern) = KEY_LIST.as_ref() else {
        return Vec::new();
    };

    pattern
        .captures(detail)
        .and_then(|captures| captures.get(1))
        .map(|names| names.as_str().split(", ").map(str::to_owned).collect())
        .unwrap_or_default()
}

fn quoted_segment(token: &str) -> Option<String> {
    token.split('"').nth(1).map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoted_token_at_index() {
        assert_eq!(
            extract_quoted_token(r#"relation "users" does not exist"#, 1),
            Some("users".to_string())
        );
        assert_eq!(
            extract_quoted_token(r#"database "app" does not exist"#, 1),
            Some("app".to_string())
        );
    }

    #[test]
    fn test_quoted_token_keeps_trailing_punctuation_outside_quotes() {
        assert_eq!(
            extract_quoted_token(r#"column "emial" of relation "users" does not exist"#, 1),
            Some("emial".to_string())
        );
        assert_eq!(
            extract_quoted_token(r#"relation "users"; does not exist"#, 1),
            Some("users".to_string())
        );
    }

    #[test]
    fn test_quoted_token_missing_index_or_quote() {
        assert_eq!(extract_quoted_token("too short", 5), None);
        assert_eq!(extract_quoted_token("relation users does not exist", 1), None);
        assert_eq!(extract_quoted_token("", 0), None);
    }

    #[test]
    fn test_quoted_token_empty_quotes() {
        assert_eq!(extract_quoted_token(r#"database "" missing"#, 1), Some(String::new()));
    }

    #[test]
    fn test_access_denied_position() {
        let message = r#"permission denied for database "billing""#;
        assert_eq!(extract_quoted_token(message, 4), Some("billing".to_string()));
        assert_eq!(extract_quoted_token(message, 5), None);

        let message = r#"User does not have CONNECT "billing" privilege"#;
        assert_eq!(extract_quoted_token(message, 5), Some("billing".to_string()));
    }

    #[test]
    fn test_last_quoted_token() {
        assert_eq!(
            extract_last_quoted_token(r#"password authentication failed for user "alice""#),
            Some("alice".to_string())
        );
        assert_eq!(extract_last_quoted_token("authentication failed"), None);
        assert_eq!(extract_last_quoted_token(""), None);
    }

    #[test]
    fn test_key_list_single_and_compound() {
        assert_eq!(
            extract_key_list("Key (email)=(a@x.com) already exists."),
            vec!["email".to_string()]
        );
        assert_eq!(
            extract_key_list("Key (tenant_id, slug)=(1, home) already exists."),
            vec!["tenant_id".to_string(), "slug".to_string()]
        );
    }

    #[test]
    fn test_key_list_uses_first_match() {
        assert_eq!(
            extract_key_list("Key (a)=(1) conflicts with Key (b)=(2)"),
            vec!["a".to_string()]
        );
    }

    #[test]
    fn test_key_list_no_match() {
        assert!(extract_key_list("").is_empty());
        assert!(extract_key_list("Failing row contains (1, null).").is_empty());
        assert!(extract_key_list("Key ()=() already exists.").is_empty());
    }
}
