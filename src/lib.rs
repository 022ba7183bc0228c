pub mod utils;
pub mod error;
pub mod config;
pub mod core;

pub use error::{MarketError, Result};
pub use utils::{parse_quantity_text, parse_hash_text, ASSET_HASH_LEN};
pub use config::{load_fee_schedule, parse_fee_schedule, ConfigError};

// Core API exports
pub use core::Market;
pub use core::access::{Principal, TREASURY_PRINCIPAL};
pub use core::asset::{AssetHash, AssetRecord, AssetState, RegistrationReceipt};
pub use core::intent::{Intent, IntentKey, IntentQuantity};
pub use core::ledger::{LedgerRead, LedgerSnapshot, LedgerStore};
pub use core::call::{Call, CallOutcome};
pub use core::settlement::{IntentSelector, SettlementPath, SettlementReceipt};
pub use core::shares::{ShareReceipt, SHARE_ISSUER_PRINCIPAL};
pub use core::ledger::pro_rata;
pub use core::fee::{
    FeeQuote,
    FeeRule,
    FeeSchedule,
    OperationFees,
    OperationKind,
    PaymentSplit,
    TieredFeeSchedule,
    split_payment,
    BPS_DENOMINATOR,
    CANONICAL_LISTING_FEE,
    CANONICAL_OFFER_FEE,
    CANONICAL_SALE_FEE,
    CANONICAL_PARTIAL_OFFER_FEE,
    CANONICAL_RESALE_FEE,
    CANONICAL_ROYALTY,
};
