//! HMAC-SHA256 verification of gateway webhooks.
//!
//! The gateway signs the raw request body with the shared secret and sends
//! the hex digest in `X-Signature`, optionally prefixed with `sha256=`.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, Secret};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-signature";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("missing {SIGNATURE_HEADER} header")]
    Missing,
    #[error("signature is not valid hex")]
    Malformed,
    #[error("signature mismatch")]
    Mismatch,
}

pub fn sign(secret: &Secret<String>, body: &[u8]) -> String {
    digest(secret, body).map(hex::encode).unwrap_or_default()
}

pub fn verify(
    secret: &Secret<String>,
    body: &[u8],
    header: Option<&str>,
) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::Missing)?.trim();
    let provided = header.strip_prefix("sha256=").unwrap_or(header);
    let provided = hex::decode(provided).map_err(|_| SignatureError::Malformed)?;

    let expected = digest(secret, body).ok_or(SignatureError::Mismatch)?;
    if expected.as_slice().ct_eq(&provided).unwrap_u8() != 1 {
        tracing::warn!("invalid inbound webhook signature");
        return Err(SignatureError::Mismatch);
    }
    Ok(())
}

fn digest(secret: &Secret<String>, body: &[u8]) -> Option<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes()).ok()?;
    mac.update(body);
    Some(mac.finalize().into_bytes().to_vec())
}
