use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TokenError;

/// JWT payload carried by an email verification token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VerificationClaims {
    pub email: String, // address being verified
    pub exp: i64,      // expires at (unix timestamp)
}

impl VerificationClaims {
    /// Type-checks a decoded payload. Signature checks happen before this.
    pub(crate) fn from_payload(payload: Map<String, Value>) -> Result<Self, TokenError> {
        let email = match payload.get("email") {
            Some(Value::String(email)) if !email.trim().is_empty() => email.clone(),
            _ => {
                return Err(TokenError::InvalidClaims(
                    "email must be a non-empty string".into(),
                ))
            }
        };
        let exp = payload
            .get("exp")
            .and_then(Value::as_i64)
            .ok_or_else(|| TokenError::InvalidClaims("exp must be a unix timestamp".into()))?;
        Ok(Self { email, exp })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object payload")
    }

    #[test]
    fn accepts_well_typed_payload() {
        let claims =
            VerificationClaims::from_payload(payload(json!({"email": "a@x.com", "exp": 42})))
                .expect("valid claims");
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.exp, 42);
    }

    #[test]
    fn rejects_missing_or_non_string_email() {
        for bad in [
            json!({"exp": 42}),
            json!({"email": 7, "exp": 42}),
            json!({"email": "   ", "exp": 42}),
        ] {
            let err = VerificationClaims::from_payload(payload(bad)).unwrap_err();
            assert!(matches!(err, TokenError::InvalidClaims(_)));
        }
    }

    #[test]
    fn rejects_non_numeric_exp() {
        let err =
            VerificationClaims::from_payload(payload(json!({"email": "a@x.com", "exp": "soon"})))
                .unwrap_err();
        assert!(matches!(err, TokenError::InvalidClaims(_)));
    }
}
