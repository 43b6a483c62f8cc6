use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use crate::auth::Claims;
use crate::error::AppError;
use crate::state::AppState;

/// The verified claims of the requester plus the raw bearer token. The raw
/// token is kept because post deletion forwards it to the upload server.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub claims: Claims,
    pub bearer_token: String,
}

/// Extractor that requires a valid `Authorization: Bearer` token.
/// Returns 401 when the header is missing or the signature does not verify.
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(parts).ok_or(AppError::Unauthorized)?;
        let claims = state.tokens.verify(&token)?;
        Ok(AuthUser {
            claims,
            bearer_token: token,
        })
    }
}

fn extract_bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with_auth(value: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(v) = value {
            builder = builder.header(header::AUTHORIZATION, v);
        }
        let (parts, _) = builder.body(()).unwrap().into_parts();
        parts
    }

    #[test]
    fn extracts_bearer_token() {
        let parts = parts_with_auth(Some("Bearer abc.def.ghi"));
        assert_eq!(extract_bearer_token(&parts).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn missing_header_yields_none() {
        let parts = parts_with_auth(None);
        assert!(extract_bearer_token(&parts).is_none());
    }

    #[test]
    fn non_bearer_scheme_yields_none() {
        let parts = parts_with_auth(Some("Basic dXNlcjpwYXNz"));
        assert!(extract_bearer_token(&parts).is_none());
    }

    #[test]
    fn empty_bearer_yields_none() {
        let parts = parts_with_auth(Some("Bearer "));
        assert!(extract_bearer_token(&parts).is_none());
    }
}
