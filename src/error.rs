use thiserror::Error;

/// Every way a marketplace call can be rejected. A rejected call leaves the ledger untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketError {
    #[error("Duplicate asset: {0} is already registered")]
    DuplicateAsset(String),

    #[error("Invalid quantity: quantity must be greater than 0")]
    InvalidQuantity,

    #[error("Unknown asset: {0}")]
    UnknownAsset(String),

    #[error("Asset sold out: {0}")]
    AssetSoldOut(String),

    #[error("Excessive quantity: requested {requested}, held {held}")]
    ExcessiveQuantity { requested: u64, held: u64 },

    #[error("No active intent for asset {0}")]
    NoActiveIntent(String),

    #[error("Not owner: {caller} does not own the lot of {asset}")]
    NotOwner { caller: String, asset: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Quantity mismatch: intent requests {expected}, settlement names {got}")]
    QuantityMismatch { expected: u64, got: u64 },

    #[error("Malformed quantity: {0:?} is not a decimal quantity")]
    MalformedQuantity(String),

    #[error("Malformed asset hash: {0}")]
    MalformedAssetHash(String),

    #[error("Arithmetic overflow while crediting balances")]
    ArithmeticOverflow,
}

impl MarketError {
    /// Stable short name of the error kind, used in logs and CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            MarketError::DuplicateAsset(_) => "DuplicateAsset",
            MarketError::InvalidQuantity => "InvalidQuantity",
            MarketError::UnknownAsset(_) => "UnknownAsset",
            MarketError::AssetSoldOut(_) => "AssetSoldOut",
            MarketError::ExcessiveQuantity { .. } => "ExcessiveQuantity",
            MarketError::NoActiveIntent(_) => "NoActiveIntent",
            MarketError::NotOwner { .. } => "NotOwner",
            MarketError::Unauthorized(_) => "Unauthorized",
            MarketError::QuantityMismatch { .. } => "QuantityMismatch",
            MarketError::MalformedQuantity(_) => "MalformedQuantity",
            MarketError::MalformedAssetHash(_) => "MalformedAssetHash",
            MarketError::ArithmeticOverflow => "ArithmeticOverflow",
        }
    }
}

pub type Result<T> = std::result::Result<T, MarketError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(MarketError::InvalidQuantity.kind(), "InvalidQuantity");
        assert_eq!(
            MarketError::QuantityMismatch { expected: 50, got: 40 }.kind(),
            "QuantityMismatch"
        );
    }

    #[test]
    fn test_display_carries_context() {
        let err = MarketError::ExcessiveQuantity { requested: 120, held: 100 };
        assert_eq!(err.to_string(), "Excessive quantity: requested 120, held 100");
    }
}
