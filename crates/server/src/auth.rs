#![forbid(unsafe_code)]

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    Missing,
    #[error("malformed bearer token")]
    Malformed,
    #[error("bearer token signature does not verify")]
    BadSignature,
}

/// Bearer-token gate. With a secret configured the token must be an HS256 JWT whose signature
/// verifies; claims are not inspected. Without one, any non-empty bearer token passes.
#[derive(Clone, Default)]
pub struct BearerAuth {
    secret: Option<Vec<u8>>,
}

impl std::fmt::Debug for BearerAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerAuth")
            .field("verifies_signature", &self.secret.is_some())
            .finish()
    }
}

impl BearerAuth {
    pub fn new(secret: Option<&str>) -> Self {
        Self {
            secret: secret
                .map(str::trim)
                .filter(|secret| !secret.is_empty())
                .map(|secret| secret.as_bytes().to_vec()),
        }
    }

    pub fn check(&self, authorization: Option<&str>) -> Result<(), AuthError> {
        let value = authorization.map(str::trim).ok_or(AuthError::Missing)?;
        let (scheme, token) = value.split_once(' ').ok_or(AuthError::Missing)?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return Err(AuthError::Missing);
        }
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::Missing);
        }
        match &self.secret {
            Some(secret) => verify_hs256(token, secret),
            None => Ok(()),
        }
    }
}

fn verify_hs256(token: &str, secret: &[u8]) -> Result<(), AuthError> {
    let (signing_input, signature) = token.rsplit_once('.').ok_or(AuthError::Malformed)?;
    if signing_input.split('.').count() != 2 {
        return Err(AuthError::Malformed);
    }
    let signature = URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|_| AuthError::Malformed)?;
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| AuthError::Malformed)?;
    mac.update(signing_input.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| AuthError::BadSignature)
}

/// Signs `header.payload` with HS256; used to mint tokens for local clients and tests.
pub fn sign_hs256(header_json: &str, payload_json: &str, secret: &str) -> String {
    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header_json),
        URL_SAFE_NO_PAD.encode(payload_json)
    );
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return signing_input,
    };
    mac.update(signing_input.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
    format!("{signing_input}.{signature}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

    #[test]
    fn without_secret_any_bearer_passes() {
        let auth = BearerAuth::new(None);
        assert_eq!(auth.check(Some("Bearer abc")), Ok(()));
        assert_eq!(auth.check(Some("bearer abc")), Ok(()));
        assert_eq!(auth.check(None), Err(AuthError::Missing));
        assert_eq!(auth.check(Some("Basic abc")), Err(AuthError::Missing));
        assert_eq!(auth.check(Some("Bearer   ")), Err(AuthError::Missing));
    }

    #[test]
    fn signed_token_verifies() {
        let auth = BearerAuth::new(Some("s3cret"));
        let token = sign_hs256(HEADER, r#"{"sub":"ext"}"#, "s3cret");
        assert_eq!(auth.check(Some(&format!("Bearer {token}"))), Ok(()));
    }

    #[test]
    fn wrong_secret_or_garbage_is_rejected() {
        let auth = BearerAuth::new(Some("s3cret"));
        let forged = sign_hs256(HEADER, r#"{"sub":"ext"}"#, "other");
        assert_eq!(
            auth.check(Some(&format!("Bearer {forged}"))),
            Err(AuthError::BadSignature)
        );
        assert_eq!(
            auth.check(Some("Bearer not-a-jwt")),
            Err(AuthError::Malformed)
        );
        assert_eq!(auth.check(Some("Bearer a.b.!!!")), Err(AuthError::Malformed));
    }
}
