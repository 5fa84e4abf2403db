//! `Authorization` header parsing.

use crate::error::{Result, SessionError};

/// Extract the token from an `Authorization: Bearer <token>` value.
///
/// The scheme is case-insensitive; the token must be non-empty and contain
/// no whitespace.
pub fn bearer_token(header_value: Option<&str>) -> Result<&str> {
    let value = header_value.ok_or(SessionError::MissingBearer)?.trim();

    let (scheme, token) = value
        .split_once(char::is_whitespace)
        .ok_or(SessionError::MissingBearer)?;
    let token = token.trim();

    if !scheme.eq_ignore_ascii_case("bearer")
        || token.is_empty()
        || token.contains(char::is_whitespace)
    {
        return Err(SessionError::MissingBearer);
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_bearer() {
        assert_eq!(bearer_token(Some("Bearer abc.def")).unwrap(), "abc.def");
        assert_eq!(bearer_token(Some("bearer   abc ")).unwrap(), "abc");
    }

    #[test]
    fn test_rejects_malformed() {
        for bad in [None, Some(""), Some("Bearer"), Some("Bearer "), Some("Basic abc"), Some("Bearer a b")] {
            assert!(bearer_token(bad).is_err(), "{bad:?}");
        }
    }
}
