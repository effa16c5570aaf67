use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use super::claims::{Claims, TokenKind};
use crate::{config::JwtConfig, state::AppState};

/// Holds JWT signing and verification keys with config data.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

/// An access/refresh pair issued together.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

impl From<&JwtConfig> for JwtKeys {
    fn from(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: Duration::from_secs(cfg.ttl_minutes.max(0) as u64 * 60),
            refresh_ttl: Duration::from_secs(cfg.refresh_ttl_minutes.max(0) as u64 * 60),
        }
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        JwtKeys::from(&state.config.jwt)
    }
}

impl JwtKeys {
    fn sign_with_kind(&self, user_id: Uuid, kind: TokenKind) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, kind = ?kind, "jwt signed");
        Ok(token)
    }

    pub fn issue_pair(&self, user_id: Uuid) -> anyhow::Result<TokenPair> {
        Ok(TokenPair {
            access: self.sign_with_kind(user_id, TokenKind::Access)?,
            refresh: self.sign_with_kind(user_id, TokenKind::Refresh)?,
        })
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, kind = ?data.claims.kind, "jwt verified");
        Ok(data.claims)
    }

    pub fn verify_kind(&self, token: &str, kind: TokenKind) -> anyhow::Result<Claims> {
        let claims = self.verify(token)?;
        if claims.kind != kind {
            anyhow::bail!("expected a {:?} token", kind);
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(secret: &str, issuer: &str, audience: &str) -> JwtKeys {
        JwtKeys::from(&JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl_minutes: 5,
            refresh_ttl_minutes: 60,
        })
    }

    #[tokio::test]
    async fn keys_from_app_state_use_its_config() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let pair = keys.issue_pair(Uuid::new_v4()).expect("issue");
        let claims = keys.verify(&pair.access).expect("verify");
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
    }

    #[test]
    fn pair_carries_both_kinds() {
        let keys = keys("dev-secret", "iss", "aud");
        let user_id = Uuid::new_v4();
        let pair = keys.issue_pair(user_id).expect("issue");

        let access = keys.verify_kind(&pair.access, TokenKind::Access).expect("access");
        assert_eq!(access.sub, user_id);
        let refresh = keys.verify_kind(&pair.refresh, TokenKind::Refresh).expect("refresh");
        assert_eq!(refresh.sub, user_id);
        assert!(refresh.exp > access.exp);
    }

    #[test]
    fn verify_kind_rejects_the_other_kind() {
        let keys = keys("dev-secret", "iss", "aud");
        let pair = keys.issue_pair(Uuid::new_v4()).expect("issue");
        assert!(keys.verify_kind(&pair.access, TokenKind::Refresh).is_err());
        assert!(keys.verify_kind(&pair.refresh, TokenKind::Access).is_err());
    }

    #[test]
    fn verify_rejects_wrong_issuer_audience_or_secret() {
        let good = keys("same-secret", "good-iss", "good-aud");
        let token = good.issue_pair(Uuid::new_v4()).expect("issue").access;

        assert!(keys("same-secret", "bad-iss", "good-aud").verify(&token).is_err());
        assert!(keys("same-secret", "good-iss", "bad-aud").verify(&token).is_err());
        assert!(keys("other-secret", "good-iss", "good-aud").verify(&token).is_err());
    }
}
