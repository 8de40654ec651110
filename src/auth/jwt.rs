use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use crate::{
    auth::{claims::Claims, dto::IssuedToken, repo_types::User},
    config::JwtConfig,
    state::AppState,
};

/// Ten years; longer lifetimes are clamped.
pub const MAX_TTL_MINUTES: i64 = 10 * 365 * 24 * 60;

/// Signing and verification keys, derived once from the process secret.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: Duration::from_secs(cfg.ttl_minutes.clamp(0, MAX_TTL_MINUTES) as u64 * 60),
        }
    }

    fn claims_for(&self, user: &User, now: OffsetDateTime) -> Claims {
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        Claims {
            sub: user.id,
            email: user.email.clone(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        }
    }

    fn sign(&self, claims: &Claims) -> anyhow::Result<String> {
        let token = encode(&Header::default(), claims, &self.encoding)?;
        debug!(user_id = %claims.sub, "jwt signed");
        Ok(token)
    }

    /// Sign a bearer token for `user`.
    pub fn issue(&self, user: &User) -> anyhow::Result<IssuedToken> {
        let claims = self.claims_for(user, OffsetDateTime::now_utc());
        Ok(IssuedToken::bearer(self.sign(&claims)?))
    }

    /// Fails on a bad signature, malformed input, wrong issuer/audience or expiry.
    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, "jwt verified");
        Ok(data.claims)
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.keys.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn make_keys(secret: &str, issuer: &str, audience: &str) -> JwtKeys {
        JwtKeys::from_config(&JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl_minutes: 5,
        })
    }

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "a@x.com".into(),
            password_hash: "irrelevant".into(),
            name: "A".into(),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn issue_and_verify_token() {
        let keys = make_keys("dev-secret", "test-issuer", "test-aud");
        let user = user();
        let issued = keys.issue(&user).expect("issue");
        assert_eq!(issued.token_type, "Bearer");
        let claims = keys.verify(&issued.access_token).expect("verify token");
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.exp - claims.iat, 5 * 60);
    }

    #[test]
    fn verify_rejects_wrong_issuer_or_audience() {
        let good_keys = make_keys("same-secret", "good-iss", "good-aud");
        let bad_keys = make_keys("same-secret", "bad-iss", "bad-aud");
        let token = good_keys.issue(&user()).expect("issue").access_token;
        assert!(bad_keys.verify(&token).is_err());
    }

    #[test]
    fn rotating_the_secret_invalidates_tokens() {
        let old = make_keys("old-secret", "iss", "aud");
        let new = make_keys("new-secret", "iss", "aud");
        let token = old.issue(&user()).expect("issue").access_token;
        assert!(new.verify(&token).is_err());
    }

    #[test]
    fn any_single_character_mutation_fails() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let token = keys.issue(&user()).expect("issue").access_token;
        for (i, c) in token.char_indices() {
            let replacement = if c == 'A' { 'B' } else { 'A' };
            let mut mutated = token.clone();
            mutated.replace_range(i..i + 1, &replacement.to_string());
            assert!(keys.verify(&mutated).is_err(), "mutation at {i} verified");
        }
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let past = OffsetDateTime::now_utc() - TimeDuration::hours(2);
        let claims = keys.claims_for(&user(), past);
        let token = keys.sign(&claims).expect("sign");
        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn oversized_ttl_is_clamped() {
        let keys = JwtKeys::from_config(&JwtConfig {
            secret: "dev-secret".into(),
            issuer: "iss".into(),
            audience: "aud".into(),
            ttl_minutes: i64::MAX,
        });
        assert_eq!(keys.ttl.as_secs(), MAX_TTL_MINUTES as u64 * 60);
        let token = keys.issue(&user()).expect("issue").access_token;
        assert!(keys.verify(&token).is_ok());

        let negative = JwtKeys::from_config(&JwtConfig {
            secret: "dev-secret".into(),
            issuer: "iss".into(),
            audience: "aud".into(),
            ttl_minutes: -5,
        });
        assert_eq!(negative.ttl.as_secs(), 0);
    }

    #[test]
    fn garbage_is_rejected() {
        let keys = make_keys("dev-secret", "iss", "aud");
        assert!(keys.verify("").is_err());
        assert!(keys.verify("not.a.jwt").is_err());
    }
}
