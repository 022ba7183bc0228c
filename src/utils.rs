//! Decode boundary: values that arrive as text are turned into native types here, before any settlement logic sees them.

use crate::error::{MarketError, Result};

/// Byte length of an asset content hash.
pub const ASSET_HASH_LEN: usize = 32;

/// Decodes a settlement quantity sent as decimal text (e.g. `"50"`). Surrounding whitespace is tolerated; signs, separators and empty strings are not.
pub fn parse_quantity_text(text: &str) -> Result<u64> {
    let trimmed = text.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MarketError::MalformedQuantity(text.to_string()));
    }
    trimmed
        .parse::<u64>()
        .map_err(|_| MarketError::MalformedQuantity(text.to_string()))
}

/// Decodes an asset hash given either as 64 hex characters or as exactly 32 raw bytes of text.
pub fn parse_hash_text(text: &str) -> Result<[u8; ASSET_HASH_LEN]> {
    let mut out = [0u8; ASSET_HASH_LEN];
    if text.len() == ASSET_HASH_LEN * 2 {
        if let Ok(bytes) = hex::decode(text) {
            out.copy_from_slice(&bytes);
            return Ok(out);
        }
    }
    if text.len() == ASSET_HASH_LEN {
        out.copy_from_slice(text.as_bytes());
        return Ok(out);
    }
    Err(MarketError::MalformedAssetHash(format!(
        "expected {} bytes or {} hex characters, got {:?}",
        ASSET_HASH_LEN,
        ASSET_HASH_LEN * 2,
        text
    )))
}
