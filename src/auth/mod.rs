//! Bearer credential extraction for HTTP transports.
//!
//! A LinkedIn access token presented as `Authorization: Bearer <token>` is
//! treated as an inline credential and takes precedence over stored tokens.

use axum::http::HeaderMap;
use std::fmt;


/// Extract bearer token from HTTP Authorization header
///
/// Expected format: "Authorization: Bearer <token>"
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<String, TokenError> {
    let auth_header = headers
        .get("authorization")
        .ok_or(TokenError::Missing)?
        .to_str()
        .map_err(|_| TokenError::InvalidFormat)?;

    parse_bearer_token(auth_header)
}

/// Like [`extract_bearer_token`], but an absent header is not an error.
///
/// A header that is present but malformed still fails, so a caller never
/// silently falls back to a stored token after sending a broken credential.
pub fn optional_bearer_token(headers: &HeaderMap) -> Result<Option<String>, TokenError> {
    match extract_bearer_token(headers) {
        Ok(token) => Ok(Some(token)),
        Err(TokenError::Missing) => Ok(None),
        Err(e) => Err(e),
    }
}

fn parse_bearer_token(header_value: &str) -> Result<String, TokenError> {
    let (scheme, token) = header_value
        .split_once(' ')
        .ok_or(TokenError::InvalidFormat)?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(TokenError::InvalidFormat);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(TokenError::Empty);
    }

    Ok(token.to_string())
}

/// Token extraction errors
#[derive(Debug, PartialEq, Clone)]
pub enum TokenError {
    /// Authorization header not present
    Missing,
    /// Not "Bearer <token>" or not valid header text
    InvalidFormat,
    Empty,
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::Missing => write!(f, "Authorization token not provided"),
            TokenError::InvalidFormat => write!(f, "Invalid authorization token format"),
            TokenError::Empty => write!(f, "Authorization token is empty"),
        }
    }
}

impl std::error::Error for TokenError {}
