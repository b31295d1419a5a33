//! Bearer token verification for real-time connections.

use std::sync::Arc;

use jsonwebtoken::{Algorithm, DecodingKey, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use showcase_common::{AppError, AppResult, config::AuthConfig};

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    /// Expiry as a unix timestamp.
    pub exp: i64,
}

/// Resolves a bearer token to the user it was issued for.
pub trait TokenVerifier: Send + Sync {
    /// Return the user id of a valid token, or [`AppError::Unauthorized`].
    fn decode(&self, token: &str) -> AppResult<String>;
}

/// Type alias for a shared verifier.
pub type TokenVerifierService = Arc<dyn TokenVerifier>;

/// HS256 JWT verifier.
#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    /// Create a verifier for tokens signed with `secret`.
    #[must_use]
    pub fn new(secret: &str, leeway_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = leeway_secs;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Create a verifier from the auth configuration.
    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(&config.jwt_secret, config.leeway_secs)
    }
}

impl TokenVerifier for JwtVerifier {
    fn decode(&self, token: &str) -> AppResult<String> {
        match jsonwebtoken::decode::<Claims>(token.trim(), &self.key, &self.validation) {
            Ok(data) if !data.claims.sub.is_empty() => Ok(data.claims.sub),
            Ok(_) => Err(AppError::Unauthorized),
            Err(e) => {
                match e.kind() {
                    ErrorKind::ExpiredSignature => tracing::debug!("Rejected expired token"),
                    kind => tracing::debug!(reason = ?kind, "Rejected invalid token"),
                }
                Err(AppError::Unauthorized)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{EncodingKey, Header};

    const SECRET: &str = "test-secret";

    fn token(sub: &str, expires_in: Duration, secret: &str) -> String {
        let claims = Claims {
            sub: sub.to_string(),
            exp: (Utc::now() + expires_in).timestamp(),
        };
        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_token() {
        let verifier = JwtVerifier::new(SECRET, 0);
        let user = verifier
            .decode(&token("alice", Duration::hours(1), SECRET))
            .unwrap();
        assert_eq!(user, "alice");
    }

    #[test]
    fn test_expired_token_rejected() {
        let verifier = JwtVerifier::new(SECRET, 0);
        let result = verifier.decode(&token("alice", Duration::hours(-1), SECRET));
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let verifier = JwtVerifier::new(SECRET, 0);
        let result = verifier.decode(&token("alice", Duration::hours(1), "other"));
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[test]
    fn test_garbage_rejected() {
        let verifier = JwtVerifier::new(SECRET, 30);
        assert!(matches!(
            verifier.decode("not-a-token"),
            Err(AppError::Unauthorized)
        ));
    }
}
