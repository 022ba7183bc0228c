//! Intent ledger: non-binding buy offers waiting for the lot owner to settle them.
//!
//! One active intent per (asset, proposer); proposing again replaces the previous offer and puts the
//! proposer at the back of the settlement queue. Proposing moves no payment. The offer surcharge is
//! quoted here and stored on the intent, and only settles when a finalization consumes it.

use serde::{Deserialize, Serialize};
use tracing::info;
use crate::core::access::{require_caller, require_not_owner, Principal};
use crate::core::asset::AssetHash;
use crate::core::fee::{FeeSchedule, OperationKind};
use crate::core::ledger::{LedgerRead, LedgerStore};
use crate::error::{MarketError, Result};

/// Storage key of an intent. Ordered by asset first so one asset's intents are contiguous.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IntentKey {
    pub asset: AssetHash,
    pub proposer: Principal,
}

impl IntentKey {
    pub fn new(asset: AssetHash, proposer: Principal) -> Self {
        Self { asset, proposer }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub asset: AssetHash,
    pub proposer: Principal,
    pub quantity_requested: u64,
    /// Total price for the whole requested quantity.
    pub price_offered: u128,
    /// Offer surcharge quoted at proposal time, credited to the treasury on settlement.
    pub offer_fee: u128,
    /// Proposal order on this store. Assigned by the store.
    pub sequence: u64,
}

impl Intent {
    pub fn key(&self) -> IntentKey {
        IntentKey::new(self.asset, self.proposer.clone())
    }
}

/// How much of the lot an offer asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntentQuantity {
    /// The owner's whole lot as it stands at proposal time.
    Full,
    Partial(u64),
}

impl IntentQuantity {
    fn fee_kind(&self) -> OperationKind {
        match self {
            IntentQuantity::Full => OperationKind::Offer,
            IntentQuantity::Partial(_) => OperationKind::PartialOffer,
        }
    }
}

/// Records (or replaces) `proposer`'s offer on `hash`.
pub fn propose(
    store: &mut LedgerStore,
    fees: &dyn FeeSchedule,
    proposer: &Principal,
    hash: &AssetHash,
    quantity: IntentQuantity,
    price: u128,
) -> Result<Intent> {
    require_caller(proposer)?;
    let asset = store
        .asset(hash)
        .ok_or_else(|| MarketError::UnknownAsset(hash.to_hex()))?;
    if asset.is_sold_out() {
        return Err(MarketError::AssetSoldOut(hash.to_hex()));
    }
    require_not_owner(proposer, &asset.current_owner)?;

    let requested = match quantity {
        IntentQuantity::Full => asset.quantity_held,
        IntentQuantity::Partial(0) => return Err(MarketError::InvalidQuantity),
        IntentQuantity::Partial(q) => q,
    };
    if requested > asset.quantity_held {
        return Err(MarketError::ExcessiveQuantity {
            requested,
            held: asset.quantity_held,
        });
    }

    let offer_fee = fees.quote(quantity.fee_kind(), price, requested).surcharge;
    let replaced = store.intent(hash, proposer).is_some();
    let intent = store.put_intent(Intent {
        asset: *hash,
        proposer: proposer.clone(),
        quantity_requested: requested,
        price_offered: price,
        offer_fee,
        sequence: 0,
    });

    info!(
        asset = %hash,
        proposer = %proposer,
        quantity = requested,
        price,
        offer_fee,
        replaced,
        "intent recorded"
    );
    Ok(intent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::asset::register;
    use crate::core::fee::TieredFeeSchedule;

    fn setup() -> (LedgerStore, TieredFeeSchedule, AssetHash) {
        let mut store = LedgerStore::new();
        let fees = TieredFeeSchedule::canonical();
        let hash = AssetHash::new([7; 32]);
        register(&mut store, &fees, &Principal::new("creator"), hash, 100).unwrap();
        (store, fees, hash)
    }

    #[test]
    fn test_full_intent_takes_whole_lot() {
        let (mut store, fees, hash) = setup();
        let buyer = Principal::new("buyer");
        let intent = propose(&mut store, &fees, &buyer, &hash, IntentQuantity::Full, 2000).unwrap();
        assert_eq!(intent.quantity_requested, 100);
        assert_eq!(intent.price_offered, 2000);
        assert_eq!(intent.offer_fee, 200);
    }

    #[test]
    fn test_proposal_moves_no_payment() {
        let (mut store, fees, hash) = setup();
        let treasury_before = store.treasury_balance();
        propose(&mut store, &fees, &Principal::new("buyer"), &hash, IntentQuantity::Partial(10), 50)
            .unwrap();
        assert_eq!(store.treasury_balance(), treasury_before);
        assert_eq!(store.fees_charged(&Principal::new("buyer")), 0);
    }

    #[test]
    fn test_partial_intent_fee() {
        let (mut store, fees, hash) = setup();
        let intent =
            propose(&mut store, &fees, &Principal::new("pb"), &hash, IntentQuantity::Partial(50), 1500)
                .unwrap();
        assert_eq!(intent.quantity_requested, 50);
        assert_eq!(intent.offer_fee, 75);
    }

    #[test]
    fn test_second_intent_replaces_first() {
        let (mut store, fees, hash) = setup();
        let buyer = Principal::new("buyer");
        propose(&mut store, &fees, &buyer, &hash, IntentQuantity::Partial(10), 100).unwrap();
        propose(&mut store, &fees, &buyer, &hash, IntentQuantity::Partial(20), 300).unwrap();
        assert_eq!(store.intents_for(&hash).len(), 1);
        let intent = store.intent(&hash, &buyer).unwrap();
        assert_eq!(intent.quantity_requested, 20);
        assert_eq!(intent.price_offered, 300);
    }

    #[test]
    fn test_unknown_asset() {
        let (mut store, fees, _) = setup();
        let result = propose(
            &mut store,
            &fees,
            &Principal::new("buyer"),
            &AssetHash::new([9; 32]),
            IntentQuantity::Full,
            1,
        );
        assert!(matches!(result, Err(MarketError::UnknownAsset(_))));
    }

    #[test]
    fn test_excessive_quantity() {
        let (mut store, fees, hash) = setup();
        let root = store.state_root();
        let result = propose(
            &mut store,
            &fees,
            &Principal::new("buyer"),
            &hash,
            IntentQuantity::Partial(101),
            1,
        );
        assert_eq!(result, Err(MarketError::ExcessiveQuantity { requested: 101, held: 100 }));
        assert_eq!(store.state_root(), root);
    }

    #[test]
    fn test_zero_partial_quantity() {
        let (mut store, fees, hash) = setup();
        let result = propose(
            &mut store,
            &fees,
            &Principal::new("buyer"),
            &hash,
            IntentQuantity::Partial(0),
            1,
        );
        assert_eq!(result, Err(MarketError::InvalidQuantity));
    }

    #[test]
    fn test_owner_cannot_propose_on_own_lot() {
        let (mut store, fees, hash) = setup();
        let result = propose(
            &mut store,
            &fees,
            &Principal::new("creator"),
            &hash,
            IntentQuantity::Full,
            10,
        );
        assert!(matches!(result, Err(MarketError::Unauthorized(_))));
        assert_eq!(store.intent_count(), 0);
    }
}
