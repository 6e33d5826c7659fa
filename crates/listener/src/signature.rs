//! `X-Hub-Signature-256` verification.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::WebhookError;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying `sha256=<hex HMAC of the body>`.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

const PREFIX: &str = "sha256=";

/// The shared webhook secret, keyed into an HMAC ready for cloning.
#[derive(Clone)]
pub struct WebhookSecret(HmacSha256);

impl std::fmt::Debug for WebhookSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WebhookSecret(<redacted>)")
    }
}

impl WebhookSecret {
    /// Wraps `secret`; `None` when it is empty.
    pub fn new(secret: impl AsRef<[u8]>) -> Option<Self> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return None;
        }
        HmacSha256::new_from_slice(secret).ok().map(Self)
    }

    fn mac(&self) -> HmacSha256 {
        self.0.clone()
    }

    /// The header value a sender would attach to `body`.
    pub fn sign(&self, body: &[u8]) -> String {
        let mut mac = self.mac();
        mac.update(body);
        format!("{PREFIX}{}", hex::encode(mac.finalize().into_bytes()))
    }

    /// Checks `header` against `body` in constant time.
    pub fn verify(&self, body: &[u8], header: Option<&str>) -> Result<(), WebhookError> {
        let header = header.ok_or(WebhookError::MissingSignature)?;
        let digest = header
            .strip_prefix(PREFIX)
            .and_then(|hex_digest| hex::decode(hex_digest).ok())
            .ok_or(WebhookError::InvalidSignature)?;

        let mut mac = self.mac();
        mac.update(body);
        mac.verify_slice(&digest)
            .map_err(|_| WebhookError::InvalidSignature)
    }
}
