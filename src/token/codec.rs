use std::{sync::Arc, time::Duration};

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde_json::{Map, Value};
use tracing::debug;

use crate::{clock::Clock, error::TokenError, token::claims::VerificationClaims};

/// The only algorithm this codec signs with or accepts.
const ALGORITHM: Algorithm = Algorithm::HS256;

/// Issues and validates HMAC-signed, expiring verification tokens.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    has_secret: bool,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    pub fn new(secret: &str, clock: Arc<dyn Clock>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            has_secret: !secret.is_empty(),
            clock,
        }
    }

    pub fn issue(&self, email: &str, ttl: Duration) -> Result<String, TokenError> {
        if !self.has_secret {
            return Err(TokenError::SigningError("signing secret is not configured".into()));
        }
        if email.trim().is_empty() {
            return Err(TokenError::InvalidClaims("email must be a non-empty string".into()));
        }
        if ttl < Duration::from_secs(1) {
            return Err(TokenError::InvalidClaims("ttl must be at least one second".into()));
        }

        let exp = time::Duration::try_from(ttl)
            .ok()
            .and_then(|ttl| self.clock.now().checked_add(ttl))
            .ok_or_else(|| TokenError::InvalidClaims("ttl is out of range".into()))?;
        let claims = VerificationClaims {
            email: email.to_string(),
            exp: exp.unix_timestamp(),
        };
        let token = encode(&Header::new(ALGORITHM), &claims, &self.encoding)
            .map_err(|e| TokenError::SigningError(e.to_string()))?;
        debug!(email = %claims.email, exp = claims.exp, "verification token signed");
        Ok(token)
    }

    pub fn validate(&self, token: &str) -> Result<VerificationClaims, TokenError> {
        if !self.has_secret {
            return Err(TokenError::SigningError("signing secret is not configured".into()));
        }

        // Pin the algorithm; expiry is checked below against the injected clock.
        let mut validation = Validation::new(ALGORITHM);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = decode::<Map<String, Value>>(token, &self.decoding, &validation)
            .map_err(classify_decode_error)?;
        let claims = VerificationClaims::from_payload(data.claims)?;

        if self.clock.now().unix_timestamp() >= claims.exp {
            debug!(email = %claims.email, "verification token expired");
            return Err(TokenError::Expired);
        }
        debug!(email = %claims.email, "verification token verified");
        Ok(claims)
    }
}

fn classify_decode_error(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => TokenError::InvalidSignature,
        _ => TokenError::Malformed,
    }
}
