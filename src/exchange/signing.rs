//! Request signing for authenticated REST endpoints.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::types::DcaError;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 over the query string, hex-encoded (Binance `signature`).
pub fn sign_query(query: &str, secret: &str) -> Result<String, DcaError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| DcaError::Unexpected(format!("HMAC key error: {e}")))?;
    mac.update(query.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}
