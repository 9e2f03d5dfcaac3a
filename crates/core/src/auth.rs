use async_trait::async_trait;

use crate::store::UserId;

/// Identity recovered from a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
}

/// Validates a bearer token and returns the caller's identity (C3).
///
/// Two token sources are recognized by the caller (the query parameter and
/// the `Authorization` header, §4.3); this port only ever sees the raw
/// token string, already picked by whichever source took precedence.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Option<AuthenticatedUser>;
}

/// Extracts the bearer token from the two recognized sources, query
/// parameter taking precedence over the `Authorization` header.
pub fn pick_token(query_token: Option<&str>, auth_header: Option<&str>) -> Option<String> {
    if let Some(token) = query_token.filter(|t| !t.is_empty()) {
        return Some(token.to_string());
    }

    auth_header
        .and_then(|h| h.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_param_takes_precedence() {
        let token = pick_token(Some("q"), Some("Bearer h"));
        assert_eq!(token.as_deref(), Some("q"));
    }

    #[test]
    fn falls_back_to_header() {
        let token = pick_token(None, Some("Bearer h"));
        assert_eq!(token.as_deref(), Some("h"));
    }

    #[test]
    fn empty_query_falls_back_to_header() {
        let token = pick_token(Some(""), Some("Bearer h"));
        assert_eq!(token.as_deref(), Some("h"));
    }

    #[test]
    fn no_sources_is_none() {
        assert_eq!(pick_token(None, None), None);
    }

    #[test]
    fn malformed_header_is_none() {
        assert_eq!(pick_token(None, Some("Basic xyz")), None);
    }
}
