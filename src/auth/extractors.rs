use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use tracing::warn;

use crate::{
    auth::{dto::PublicUser, jwt::JwtKeys, services::Credentials},
    error::{AppError, AuthError},
    state::AppState,
};

/// Identity resolved by the authentication gate. Handlers scope every
/// query by this value and never by a client-supplied user id.
#[derive(Debug, Clone)]
pub struct AuthUser(pub PublicUser);

/// Pull the token out of `Authorization: Bearer <token>`.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AuthError::MissingToken)?;

    let (scheme, token) = value.trim().split_once(' ').ok_or(AuthError::MissingToken)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MissingToken);
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}

/// Token → verified claims → stored user.
pub(crate) async fn authenticate(
    headers: &HeaderMap,
    keys: &JwtKeys,
    credentials: &Credentials,
) -> Result<PublicUser, AppError> {
    let token = bearer_token(headers)?;

    let claims = keys.verify(token).map_err(|e| {
        warn!(error = %e, "invalid or expired token");
        AuthError::InvalidToken
    })?;

    match credentials.find_by_id(claims.sub).await {
        Ok(user) => Ok(user.into()),
        Err(AppError::NotFound(_)) => {
            warn!(user_id = %claims.sub, "token for unknown user");
            Err(AuthError::UnknownUser.into())
        }
        Err(e) => Err(e),
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let credentials = Credentials::from_ref(state);
        let user = authenticate(&parts.headers, &state.keys, &credentials).await?;
        Ok(AuthUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn extracts_bearer_token() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")).unwrap(), "abc.def");
        assert_eq!(bearer_token(&headers("bearer abc")).unwrap(), "abc");
    }

    #[test]
    fn missing_or_malformed_header_is_missing_token() {
        assert_eq!(bearer_token(&HeaderMap::new()), Err(AuthError::MissingToken));
        assert_eq!(bearer_token(&headers("Bearer")), Err(AuthError::MissingToken));
        assert_eq!(bearer_token(&headers("Bearer   ")), Err(AuthError::MissingToken));
        assert_eq!(bearer_token(&headers("Basic abc")), Err(AuthError::MissingToken));
    }

    #[tokio::test]
    async fn gate_resolves_registered_user() {
        let state = AppState::fake();
        let credentials = Credentials::from_ref(&state);
        let user = credentials
            .register("a@x.com", "secret1", "A")
            .await
            .unwrap();
        let token = state.keys.issue(&user).unwrap().access_token;

        let resolved = authenticate(
            &headers(&format!("Bearer {token}")),
            &state.keys,
            &credentials,
        )
        .await
        .unwrap();
        assert_eq!(resolved.id, user.id);
    }

    #[tokio::test]
    async fn gate_rejects_bad_token_with_forbidden() {
        let state = AppState::fake();
        let credentials = Credentials::from_ref(&state);
        let err = authenticate(&headers("Bearer nope"), &state.keys, &credentials)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn gate_rejects_token_of_vanished_user() {
        let state = AppState::fake();
        let ghost = crate::auth::repo_types::User {
            id: uuid::Uuid::new_v4(),
            email: "ghost@x.com".into(),
            password_hash: String::new(),
            name: "Ghost".into(),
            created_at: crate::clock::now(),
        };
        let token = state.keys.issue(&ghost).unwrap().access_token;
        let err = authenticate(
            &headers(&format!("Bearer {token}")),
            &state.keys,
            &Credentials::from_ref(&state),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::UnknownUser)));
    }
}
