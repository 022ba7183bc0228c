//! Asset registry: content-addressed assets, their tradable lot and lifecycle state.
//!
//! An asset is created once with a fixed `total_quantity`. The *lot* is the quantity still held by
//! `current_owner` and offered for sale; finalizations shrink or transfer it. `original_creator` is
//! written at registration and never changes.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use tracing::info;
use crate::core::access::{require_caller, Principal};
use crate::core::fee::{FeeSchedule, OperationKind};
use crate::core::ledger::{LedgerRead, LedgerStore};
use crate::error::{MarketError, Result};
use crate::utils::{parse_hash_text, ASSET_HASH_LEN};

/// Opaque fixed-length content hash identifying an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssetHash([u8; ASSET_HASH_LEN]);

impl AssetHash {
    /// Wraps raw hash bytes.
    pub fn new(bytes: [u8; ASSET_HASH_LEN]) -> Self {
        Self(bytes)
    }

    /// Accepts 64 hex characters or 32 bytes of raw text.
    pub fn parse(text: &str) -> Result<Self> {
        parse_hash_text(text).map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; ASSET_HASH_LEN] {
        &self.0
    }

    /// Lowercase hex form, used for display, JSON and error messages.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for AssetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for AssetHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for AssetHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        AssetHash::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// Lifecycle of an asset's lot. `FullySold` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetState {
    /// Created, nothing settled yet.
    Registered,
    /// At least one settlement happened and units remain in the lot.
    PartiallySold,
    /// The lot is empty. No further intents or settlements.
    FullySold,
}

impl AssetState {
    pub(crate) fn tag(&self) -> u8 {
        match self {
            AssetState::Registered => 0,
            AssetState::PartiallySold => 1,
            AssetState::FullySold => 2,
        }
    }
}

/// Registry entry of one asset.
///
/// # Invariants
/// - `quantity_held <= total_quantity`
/// - `quantity_held == 0` exactly when `state == FullySold`
/// - `original_creator` never changes after registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    /// Registry key.
    pub hash: AssetHash,
    /// Units minted at registration. Fixed for the asset's lifetime.
    pub total_quantity: u64,
    /// Principal that may finalize intents against the lot.
    pub current_owner: Principal,
    /// Quantity still owned by `current_owner` and available to intents.
    pub quantity_held: u64,
    /// Registering principal; receives the royalty on every sale it is not the seller of.
    pub original_creator: Principal,
    pub state: AssetState,
}

impl AssetRecord {
    fn registered(hash: AssetHash, total_quantity: u64, creator: Principal) -> Self {
        Self {
            hash,
            total_quantity,
            current_owner: creator.clone(),
            quantity_held: total_quantity,
            original_creator: creator,
            state: AssetState::Registered,
        }
    }

    pub fn is_sold_out(&self) -> bool {
        self.state == AssetState::FullySold
    }

    /// Lot after `quantity` units leave it.
    ///
    /// Taking the whole lot always hands ownership to `buyer`. With `transfer_on_exhaustion` the
    /// buyer carries the lot on (`quantity_held = quantity`); without it the lot is spent and the
    /// asset is sold out, with the buyer recorded as its final owner.
    pub(crate) fn after_sale(&self, quantity: u64, buyer: &Principal, transfer_on_exhaustion: bool) -> Self {
        let mut next = self.clone();
        if quantity == self.quantity_held {
            next.current_owner = buyer.clone();
            next.quantity_held = if transfer_on_exhaustion { quantity } else { 0 };
        } else {
            next.quantity_held = self.quantity_held - quantity;
        }
        next.state = if next.quantity_held == 0 {
            AssetState::FullySold
        } else {
            AssetState::PartiallySold
        };
        next
    }
}

/// Fees and record produced by a successful registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationReceipt {
    pub asset: AssetRecord,
    pub listing_fee: u128,
}

/// Registers a new asset owned by `creator` and charges the listing fee to the treasury.
pub fn register(
    store: &mut LedgerStore,
    fees: &dyn FeeSchedule,
    creator: &Principal,
    hash: AssetHash,
    total_quantity: u64,
) -> Result<RegistrationReceipt> {
    require_caller(creator)?;
    if store.asset(&hash).is_some() {
        return Err(MarketError::DuplicateAsset(hash.to_hex()));
    }
    if total_quantity == 0 {
        return Err(MarketError::InvalidQuantity);
    }

    let listing_fee = fees.quote(OperationKind::Create, 0, total_quantity).surcharge;
    let treasury = Principal::treasury();
    let treasury_after = store
        .balance(&treasury)
        .checked_add(listing_fee)
        .ok_or(MarketError::ArithmeticOverflow)?;
    let charged_after = store
        .fees_charged(creator)
        .checked_add(listing_fee)
        .ok_or(MarketError::ArithmeticOverflow)?;

    let record = AssetRecord::registered(hash, total_quantity, creator.clone());
    store.put_asset(record.clone());
    store.set_holding(&hash, creator, total_quantity);
    store.set_balance(&treasury, treasury_after);
    store.set_fees_charged(creator, charged_after);

    info!(asset = %hash, creator = %creator, total_quantity, listing_fee, "asset registered");
    Ok(RegistrationReceipt { asset: record, listing_fee })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fee::TieredFeeSchedule;

    fn hash(byte: u8) -> AssetHash {
        AssetHash::new([byte; ASSET_HASH_LEN])
    }

    #[test]
    fn test_register_sets_lot_and_charges_listing_fee() {
        let mut store = LedgerStore::new();
        let fees = TieredFeeSchedule::canonical();
        let creator = Principal::new("creator");
        let receipt = register(&mut store, &fees, &creator, hash(1), 100).unwrap();

        assert_eq!(receipt.listing_fee, 100);
        let asset = store.asset(&hash(1)).unwrap();
        assert_eq!(asset.quantity_held, 100);
        assert_eq!(asset.current_owner, creator);
        assert_eq!(asset.original_creator, creator);
        assert_eq!(asset.state, AssetState::Registered);
        assert_eq!(store.balance(&Principal::treasury()), 100);
        assert_eq!(store.holding(&hash(1), &creator), 100);
        assert_eq!(store.fees_charged(&creator), 100);
    }

    #[test]
    fn test_register_duplicate() {
        let mut store = LedgerStore::new();
        let fees = TieredFeeSchedule::canonical();
        let creator = Principal::new("creator");
        register(&mut store, &fees, &creator, hash(1), 10).unwrap();
        let root = store.state_root();

        let result = register(&mut store, &fees, &Principal::new("other"), hash(1), 5);
        assert!(matches!(result, Err(MarketError::DuplicateAsset(_))));
        assert_eq!(store.state_root(), root);
    }

    #[test]
    fn test_register_zero_quantity() {
        let mut store = LedgerStore::new();
        let fees = TieredFeeSchedule::canonical();
        let result = register(&mut store, &fees, &Principal::new("creator"), hash(2), 0);
        assert_eq!(result, Err(MarketError::InvalidQuantity));
        assert!(store.asset(&hash(2)).is_none());
        assert_eq!(store.balance(&Principal::treasury()), 0);
    }

    #[test]
    fn test_after_sale_transitions() {
        let creator = Principal::new("creator");
        let buyer = Principal::new("buyer");
        let record = AssetRecord::registered(hash(3), 100, creator.clone());

        let partial = record.after_sale(40, &buyer, true);
        assert_eq!(partial.current_owner, creator);
        assert_eq!(partial.quantity_held, 60);
        assert_eq!(partial.state, AssetState::PartiallySold);

        let whole = record.after_sale(100, &buyer, true);
        assert_eq!(whole.current_owner, buyer);
        assert_eq!(whole.quantity_held, 100);
        assert_eq!(whole.state, AssetState::PartiallySold);

        let drained = record.after_sale(100, &buyer, false);
        assert_eq!(drained.current_owner, buyer);
        assert_eq!(drained.quantity_held, 0);
        assert_eq!(drained.state, AssetState::FullySold);
        assert_eq!(drained.original_creator, creator);
    }

    #[test]
    fn test_asset_hash_serde_roundtrip_hex() {
        let h = AssetHash::parse("12345678901234567890123456789012").unwrap();
        let json = serde_json::to_string(&h).unwrap();
        let back: AssetHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, h);
    }
}
