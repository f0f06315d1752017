/*!
 * # Magic-link token service
 *
 * Capability tokens that let an unauthenticated supplier act on exactly
 * one supplier quote. A token binds the quote id under an HMAC so it can
 * be handed out in a URL; resolving it yields the quote id or nothing.
 * Tokens are not one-shot at this layer: re-using one is idempotent
 * because the quote's own state machine rejects a second response.
 */

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use uuid::Uuid;

use crate::errors::ServiceError;

type HmacSha256 = Hmac<Sha256>;

const NONCE_LEN: usize = 8;
const MAC_LEN: usize = 32;

/// Issues and resolves supplier magic-link tokens.
pub trait MagicLinkService: Send + Sync {
    fn issue(&self, quote_id: Uuid) -> String;
    fn resolve(&self, token: &str) -> Result<Uuid, ServiceError>;
}

/// HMAC-SHA256 token service. Token layout (base64url, no padding):
/// `quote_id (16) || nonce (8) || mac (32)`.
pub struct HmacTokenService {
    secret: Vec<u8>,
}

impl HmacTokenService {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac_for(&self, payload: &[u8]) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC accepts keys of any length");
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }
}

impl MagicLinkService for HmacTokenService {
    fn issue(&self, quote_id: Uuid) -> String {
        let mut payload = Vec::with_capacity(16 + NONCE_LEN + MAC_LEN);
        payload.extend_from_slice(quote_id.as_bytes());
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);
        payload.extend_from_slice(&nonce);
        let mac = self.mac_for(&payload[..16 + NONCE_LEN]);
        payload.extend_from_slice(&mac);
        URL_SAFE_NO_PAD.encode(payload)
    }

    fn resolve(&self, token: &str) -> Result<Uuid, ServiceError> {
        let raw = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| ServiceError::InvalidToken("malformed token".to_string()))?;
        if raw.len() != 16 + NONCE_LEN + MAC_LEN {
            return Err(ServiceError::InvalidToken("malformed token".to_string()));
        }
        let (payload, mac) = raw.split_at(16 + NONCE_LEN);
        // constant-time comparison via the Mac verify API
        let mut verifier = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC accepts keys of any length");
        verifier.update(payload);
        verifier
            .verify_slice(mac)
            .map_err(|_| ServiceError::InvalidToken("signature mismatch".to_string()))?;

        let mut id_bytes = [0u8; 16];
        id_bytes.copy_from_slice(&payload[..16]);
        Ok(Uuid::from_bytes(id_bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_resolves_to_quote_id() {
        let svc = HmacTokenService::new("test-secret");
        let id = Uuid::new_v4();
        let token = svc.issue(id);
        assert_eq!(svc.resolve(&token).unwrap(), id);
    }

    #[test]
    fn tampered_token_is_rejected() {
        let svc = HmacTokenService::new("test-secret");
        let token = svc.issue(Uuid::new_v4());
        let mut chars: Vec<char> = token.chars().collect();
        let last = chars.len() - 1;
        chars[last] = if chars[last] == 'A' { 'B' } else { 'A' };
        let tampered: String = chars.into_iter().collect();
        assert!(svc.resolve(&tampered).is_err());
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let a = HmacTokenService::new("secret-a");
        let b = HmacTokenService::new("secret-b");
        let token = a.issue(Uuid::new_v4());
        assert!(b.resolve(&token).is_err());
    }

    #[test]
    fn reissue_produces_distinct_but_equivalent_tokens() {
        let svc = HmacTokenService::new("test-secret");
        let id = Uuid::new_v4();
        let t1 = svc.issue(id);
        let t2 = svc.issue(id);
        assert_ne!(t1, t2);
        assert_eq!(svc.resolve(&t1).unwrap(), svc.resolve(&t2).unwrap());
    }
}
