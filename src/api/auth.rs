// dietops/src/api/auth.rs
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use constant_time_eq::constant_time_eq;
use std::sync::Arc;
use tracing::warn;

use super::AppState;
use crate::errors::OpsError;

/// Proof that the caller holds the administrator capability.
///
/// The upstream auth layer hands administrators a bearer token; anything else,
/// including a server without a configured token, is rejected.
#[derive(Debug, Clone, Copy)]
pub struct AdminCaller;

impl FromRequestParts<Arc<AppState>> for AdminCaller {
    type Rejection = OpsError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.admin_token.as_deref() else {
            return Err(OpsError::Unauthorized);
        };

        let presented = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token);

        match presented {
            Some(token) if constant_time_eq(token.as_bytes(), expected.as_bytes()) => {
                Ok(AdminCaller)
            }
            _ => {
                warn!(path = %parts.uri.path(), "Rejected request without admin credentials");
                Err(OpsError::Unauthorized)
            }
        }
    }
}

/// Token of an `Authorization: Bearer <token>` header; the scheme is case-insensitive.
fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("Bearer") && !token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_scheme_is_case_insensitive() {
        assert_eq!(bearer_token("Bearer s3cret"), Some("s3cret"));
        assert_eq!(bearer_token("bearer s3cret"), Some("s3cret"));
        assert_eq!(bearer_token("BEARER  s3cret "), Some("s3cret"));
    }

    #[test]
    fn test_other_schemes_are_ignored() {
        assert_eq!(bearer_token("Basic ZGlldDpzM2NyZXQ="), None);
        assert_eq!(bearer_token("Bearer"), None);
        assert_eq!(bearer_token("Bearer   "), None);
        assert_eq!(bearer_token("s3cret"), None);
    }
}
