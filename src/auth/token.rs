use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthError;

/// Signed assertion carried by the client: a session binding plus the user it
/// was issued to. `sid` is optional at the decoding layer so a structurally
/// incomplete token can be told apart from a malformed one.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sid: Option<Uuid>,
    pub sub: Uuid,
    pub iat: i64,
    pub exp: i64,
}

/// Encodes and verifies session tokens with a process-wide secret injected at
/// construction. Pure: no I/O, no shared mutable state.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // An already-expired token must fail verification immediately.
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Mints a token bound to `session_id`, expiring `ttl` from now.
    pub fn mint(&self, session_id: Uuid, user_id: Uuid, ttl: Duration) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = TokenClaims {
            sid: Some(session_id),
            sub: user_id,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AuthError::InfraFault(e.to_string()))
    }

    /// Verifies signature and expiry, returning the embedded claims.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, AuthError> {
        decode::<TokenClaims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.into_kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredCredential,
                _ => AuthError::MalformedCredential,
            })
    }
}
