//! JWT session token creation and verification.

use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};

use crate::{api::models::users::CurrentUser, config::Config, errors::Error, types::UserId};

/// JWT session claims
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: UserId,   // Subject (user ID)
    pub email: String, // User email
    pub exp: i64,      // Expiration time
    pub iat: i64,      // Issued at
}

impl SessionClaims {
    /// Create new session claims for a user
    pub fn new(user: &CurrentUser, config: &Config) -> Self {
        let now = Utc::now();
        let exp = now + config.auth.jwt_expiry;

        Self {
            sub: user.id,
            email: user.email.clone(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        }
    }
}

impl From<SessionClaims> for CurrentUser {
    fn from(claims: SessionClaims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
        }
    }
}

fn secret_key(config: &Config) -> Result<&str, Error> {
    config.secret_key.as_deref().ok_or_else(|| Error::Internal {
        operation: "JWT sessions: secret_key is required".to_string(),
    })
}

/// Create a JWT token for a user session
pub fn create_session_token(user: &CurrentUser, config: &Config) -> Result<String, Error> {
    let claims = SessionClaims::new(user, config);
    let key = EncodingKey::from_secret(secret_key(config)?.as_bytes());

    encode(&Header::default(), &claims, &key).map_err(|e| Error::Internal {
        operation: format!("create JWT: {e}"),
    })
}

/// Token problems a client can cause. Anything else is a server fault.
fn is_client_error(kind: &ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::InvalidToken
            | ErrorKind::InvalidSignature
            | ErrorKind::ExpiredSignature
            | ErrorKind::ImmatureSignature
            | ErrorKind::MissingRequiredClaim(_)
            | ErrorKind::InvalidIssuer
            | ErrorKind::InvalidAudience
            | ErrorKind::InvalidSubject
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_)
    )
}

/// Verify a session token and recover the account it was issued to.
///
/// Tokens that are malformed, expired, forged or missing `sub` are `Unauthenticated`; key
/// problems are `Internal`.
pub fn verify_session_token(token: &str, config: &Config) -> Result<CurrentUser, Error> {
    let key = DecodingKey::from_secret(secret_key(config)?.as_bytes());
    let mut validation = Validation::default();
    validation.set_required_spec_claims(&["exp", "sub"]);

    let token_data = decode::<SessionClaims>(token, &key, &validation).map_err(|e| {
        if is_client_error(e.kind()) {
            Error::Unauthenticated { message: None }
        } else {
            Error::Internal {
                operation: format!("verify session token: {e}"),
            }
        }
    })?;

    Ok(CurrentUser::from(token_data.claims))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use uuid::Uuid;

    const SECRET: &str = "session-test-secret";

    fn config_with_expiry(expiry: Duration) -> Config {
        let mut config = Config {
            secret_key: Some(SECRET.to_string()),
            ..Default::default()
        };
        config.auth.jwt_expiry = expiry;
        config
    }

    fn writer() -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            email: "writer@gmail.com".to_string(),
        }
    }

    fn sign(claims: &serde_json::Value) -> String {
        encode(&Header::default(), claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
    }

    #[test]
    fn test_token_identifies_account_for_configured_lifetime() {
        let config = config_with_expiry(Duration::from_secs(24 * 3600));
        let user = writer();

        let token = create_session_token(&user, &config).unwrap();
        assert_eq!(verify_session_token(&token, &config).unwrap(), user);

        let claims = decode::<SessionClaims>(&token, &DecodingKey::from_secret(SECRET.as_bytes()), &Validation::default())
            .unwrap()
            .claims;
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, user.email);
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
    }

    #[test]
    fn test_rejected_tokens_are_unauthenticated() {
        let config = config_with_expiry(Duration::from_secs(3600));
        let user = writer();
        let now = Utc::now().timestamp();

        let mut rotated = config.clone();
        rotated.secret_key = Some("previous-secret".to_string());
        let forged = create_session_token(&user, &rotated).unwrap();
        let expired = sign(&serde_json::json!({
            "sub": user.id, "email": user.email, "iat": now - 7200, "exp": now - 3600,
        }));
        let without_email = sign(&serde_json::json!({ "sub": user.id, "iat": now, "exp": now + 3600 }));
        let without_subject = sign(&serde_json::json!({ "email": user.email, "iat": now, "exp": now + 3600 }));

        for token in [
            forged.as_str(),
            expired.as_str(),
            without_email.as_str(),
            without_subject.as_str(),
            "not.a.token",
            "",
        ] {
            assert!(
                matches!(verify_session_token(token, &config), Err(Error::Unauthenticated { .. })),
                "token should be rejected: {token:?}"
            );
        }
    }

    #[test]
    fn test_missing_secret_is_internal() {
        let config = Config::default();
        assert!(matches!(create_session_token(&writer(), &config), Err(Error::Internal { .. })));
        assert!(matches!(verify_session_token("a.b.c", &config), Err(Error::Internal { .. })));
    }
}
