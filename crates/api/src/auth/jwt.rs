//! Bearer tokens for staff and parents.
//!
//! The school's identity provider signs HS256 tokens whose `sub` is the same
//! username the workflow rosters and activity staff lists use. A token with
//! a role this service does not know fails to decode.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who is calling: school staff run activities, parents answer permission
/// requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Staff,
    Parent,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Username.
    pub sub: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
    /// Unique token id.
    pub jti: String,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expiry_mins: i64,
}

const DEFAULT_ACCESS_EXPIRY_MINS: i64 = 15;

impl JwtConfig {
    /// | Env Var                  | Required | Default |
    /// |--------------------------|----------|---------|
    /// | `JWT_SECRET`             | **yes**  | --      |
    /// | `JWT_ACCESS_EXPIRY_MINS` | no       | `15`    |
    ///
    /// # Panics
    ///
    /// Panics if `JWT_SECRET` is missing or empty.
    pub fn from_env() -> Self {
        let secret =
            std::env::var("JWT_SECRET").expect("JWT_SECRET must be set in the environment");
        assert!(!secret.is_empty(), "JWT_SECRET must not be empty");

        let access_token_expiry_mins = std::env::var("JWT_ACCESS_EXPIRY_MINS")
            .ok()
            .map(|v| v.parse().expect("JWT_ACCESS_EXPIRY_MINS must be a valid i64"))
            .unwrap_or(DEFAULT_ACCESS_EXPIRY_MINS);

        Self {
            secret,
            access_token_expiry_mins,
        }
    }

    fn ttl(&self) -> Duration {
        Duration::minutes(self.access_token_expiry_mins)
    }
}

/// Sign a token for `username`. Used by tests and local tooling; production
/// tokens come from the identity provider.
pub fn issue_token(
    username: &str,
    role: Role,
    config: &JwtConfig,
) -> Result<String, jsonwebtoken::errors::Error> {
    let issued = Utc::now();
    let claims = Claims {
        sub: username.to_string(),
        role,
        exp: (issued + config.ttl()).timestamp(),
        iat: issued.timestamp(),
        jti: Uuid::new_v4().to_string(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
}

/// Check signature and expiry and return the claims.
pub fn verify_token(token: &str, config: &JwtConfig) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::default();
    validation.set_required_spec_claims(&["exp", "sub"]);
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            access_token_expiry_mins: 15,
        }
    }

    fn sign(claims: &serde_json::Value) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(config().secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn staff_token_carries_username_and_role() {
        let token = issue_token("head.senior", Role::Staff, &config()).unwrap();
        let claims = verify_token(&token, &config()).unwrap();
        assert_eq!(claims.sub, "head.senior");
        assert_eq!(claims.role, Role::Staff);
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }

    #[test]
    fn expired_token_is_rejected() {
        // Past the default 60 second leeway.
        let now = Utc::now().timestamp();
        let token = sign(&serde_json::json!({
            "sub": "teacher", "role": "staff", "exp": now - 300, "iat": now - 600, "jti": "x",
        }));
        assert!(verify_token(&token, &config()).is_err());
    }

    #[test]
    fn unknown_role_is_rejected() {
        let now = Utc::now().timestamp();
        let token = sign(&serde_json::json!({
            "sub": "s1", "role": "student", "exp": now + 300, "iat": now, "jti": "x",
        }));
        assert!(verify_token(&token, &config()).is_err());
    }

    #[test]
    fn token_from_another_secret_is_rejected() {
        let token = issue_token("parent1", Role::Parent, &config()).unwrap();
        let other = JwtConfig {
            secret: "a-completely-different-secret-value".to_string(),
            access_token_expiry_mins: 15,
        };
        assert!(verify_token(&token, &other).is_err());
    }
}
