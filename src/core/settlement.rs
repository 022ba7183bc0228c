//! Sale finalization engine: consumes an intent, moves quantity, and routes the price through the fee schedule.
//!
//! Settlement runs in two phases. `plan` reads the ledger, checks every precondition and computes every
//! resulting balance with checked arithmetic; `apply` only writes the precomputed values and cannot fail.
//! A rejected call therefore never leaves a partial write behind.

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use crate::core::access::{require_caller, require_owner, Principal};
use crate::core::asset::{AssetHash, AssetRecord, AssetState};
use crate::core::fee::{split_payment, FeeSchedule, OperationKind, PaymentSplit};
use crate::core::intent::{Intent, IntentKey};
use crate::core::ledger::{LedgerRead, LedgerStore};
use crate::error::{MarketError, Result};
use crate::utils::parse_quantity_text;

/// Which finalization entry point is settling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementPath {
    /// A buyer taking the whole lot becomes its new owner.
    Sale,
    /// The owner keeps the lot and only its size shrinks; an empty lot is sold out.
    Resale,
}

impl SettlementPath {
    pub fn fee_kind(&self) -> OperationKind {
        match self {
            SettlementPath::Sale => OperationKind::Sale,
            SettlementPath::Resale => OperationKind::Resale,
        }
    }

    fn transfers_lot(&self) -> bool {
        matches!(self, SettlementPath::Sale)
    }
}

/// Which pending intent a finalization consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentSelector {
    /// The earliest-proposed intent that still fits the lot (and, on resale, names the settled
    /// quantity). Intents the lot has outgrown are passed over, not settled.
    Oldest,
    /// Exactly this proposer's intent.
    Proposer(Principal),
}

/// Everything a successful finalization did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementReceipt {
    pub asset: AssetHash,
    pub path: SettlementPath,
    pub seller: Principal,
    pub buyer: Principal,
    pub original_creator: Principal,
    pub quantity: u64,
    pub price: u128,
    pub split: PaymentSplit,
    /// Offer surcharge carried by the consumed intent.
    pub offer_fee: u128,
    /// Surcharge of the finalization itself, levied on the seller.
    pub settlement_fee: u128,
    pub owner_after: Principal,
    pub quantity_held_after: u64,
    pub state_after: AssetState,
    /// Proposers whose intents were dropped because the asset sold out.
    #[serde(default)]
    pub discarded_intents: Vec<Principal>,
}

impl SettlementReceipt {
    /// Everything this settlement credited to the treasury.
    pub fn treasury_total(&self) -> u128 {
        self.split.treasury + self.offer_fee + self.settlement_fee
    }
}

/// Precomputed writes of one settlement.
#[derive(Debug, Clone)]
pub struct SettlementPlan {
    intent: IntentKey,
    discarded: Vec<IntentKey>,
    asset_after: AssetRecord,
    balances: Vec<(Principal, u128)>,
    fees_charged: Vec<(Principal, u128)>,
    holdings: Vec<(Principal, u64)>,
    receipt: SettlementReceipt,
}

impl SettlementPlan {
    pub fn receipt(&self) -> &SettlementReceipt {
        &self.receipt
    }
}

/// Adds `deltas` onto the current values read through `current`, failing on overflow.
fn accumulate<F>(deltas: BTreeMap<Principal, u128>, current: F) -> Result<Vec<(Principal, u128)>>
where
    F: Fn(&Principal) -> u128,
{
    deltas
        .into_iter()
        .filter(|(_, delta)| *delta > 0)
        .map(|(who, delta)| {
            current(&who)
                .checked_add(delta)
                .map(|total| (who, total))
                .ok_or(MarketError::ArithmeticOverflow)
        })
        .collect()
}

/// Picks the intent to settle from `candidates` (oldest first).
///
/// A candidate qualifies when its quantity fits `held` and, if the caller named a quantity, equals
/// it. When none qualifies the error describes the nearest miss.
fn pick_intent<'a>(candidates: &[&'a Intent], held: u64, named: Option<u64>) -> Result<&'a Intent> {
    let found = candidates.iter().copied().find(|i| {
        i.quantity_requested <= held && named.map_or(true, |n| n == i.quantity_requested)
    });
    if let Some(intent) = found {
        return Ok(intent);
    }
    let oldest = candidates
        .first()
        .ok_or_else(|| MarketError::NoActiveIntent(String::new()))?;
    match named {
        Some(n) if candidates.iter().any(|i| i.quantity_requested == n) => {
            Err(MarketError::ExcessiveQuantity { requested: n, held })
        }
        Some(n) => {
            let expected = candidates
                .iter()
                .find(|i| i.quantity_requested <= held)
                .unwrap_or(oldest)
                .quantity_requested;
            Err(MarketError::QuantityMismatch { expected, got: n })
        }
        None => Err(MarketError::ExcessiveQuantity {
            requested: oldest.quantity_requested,
            held,
        }),
    }
}

fn add_delta(deltas: &mut BTreeMap<Principal, u128>, who: &Principal, amount: u128) -> Result<()> {
    let slot = deltas.entry(who.clone()).or_insert(0);
    *slot = slot.checked_add(amount).ok_or(MarketError::ArithmeticOverflow)?;
    Ok(())
}

/// Validates a finalization against the current ledger and computes its effects without writing.
///
/// `settled_quantity` is the quantity named by the caller (resale path); it must equal the intent's.
pub fn plan<L: LedgerRead + ?Sized>(
    ledger: &L,
    fees: &dyn FeeSchedule,
    caller: &Principal,
    hash: &AssetHash,
    path: SettlementPath,
    selector: &IntentSelector,
    settled_quantity: Option<u64>,
) -> Result<SettlementPlan> {
    require_caller(caller)?;
    let asset = ledger
        .asset(hash)
        .ok_or_else(|| MarketError::UnknownAsset(hash.to_hex()))?;
    if asset.is_sold_out() {
        return Err(MarketError::AssetSoldOut(hash.to_hex()));
    }
    let candidates: Vec<&Intent> = match selector {
        IntentSelector::Oldest => {
            let mut all = ledger.intents_for(hash);
            all.sort_by_key(|i| i.sequence);
            all
        }
        IntentSelector::Proposer(p) => ledger.intent(hash, p).into_iter().collect(),
    };
    if candidates.is_empty() {
        return Err(MarketError::NoActiveIntent(hash.to_hex()));
    }
    require_owner(caller, &asset.current_owner, &hash.to_hex())?;
    let intent = pick_intent(&candidates, asset.quantity_held, settled_quantity)?;
    let quantity = intent.quantity_requested;

    let seller = asset.current_owner.clone();
    let buyer = intent.proposer.clone();
    let creator = asset.original_creator.clone();
    let price = intent.price_offered;
    let quote = fees.quote(path.fee_kind(), price, quantity);
    let split = split_payment(&quote, price, seller == creator);
    debug_assert_eq!(split.total(), price);
    debug!(
        asset = %hash,
        kind = %path.fee_kind(),
        price,
        treasury = split.treasury,
        royalty = split.royalty,
        seller_share = split.seller,
        "payment split"
    );

    let treasury = Principal::treasury();
    let mut credit = BTreeMap::new();
    add_delta(&mut credit, &treasury, split.treasury)?;
    add_delta(&mut credit, &treasury, intent.offer_fee)?;
    add_delta(&mut credit, &treasury, quote.surcharge)?;
    add_delta(&mut credit, &creator, split.royalty)?;
    add_delta(&mut credit, &seller, split.seller)?;
    let balances = accumulate(credit, |p| ledger.balance(p))?;

    let mut charged = BTreeMap::new();
    add_delta(&mut charged, &buyer, intent.offer_fee)?;
    add_delta(&mut charged, &seller, quote.surcharge)?;
    let fees_charged = accumulate(charged, |p| ledger.fees_charged(p))?;

    // the owner's holding always covers the lot, so this never saturates
    let seller_holding = ledger.holding(hash, &seller).saturating_sub(quantity);
    let buyer_holding = ledger.holding(hash, &buyer).saturating_add(quantity);
    let holdings = vec![(seller.clone(), seller_holding), (buyer.clone(), buyer_holding)];

    let asset_after = asset.after_sale(quantity, &buyer, path.transfers_lot());
    // selling out retires every other intent on the asset
    let discarded: Vec<IntentKey> = if asset_after.is_sold_out() {
        ledger
            .intents_for(hash)
            .into_iter()
            .filter(|i| i.proposer != buyer)
            .map(|i| i.key())
            .collect()
    } else {
        Vec::new()
    };
    let receipt = SettlementReceipt {
        asset: *hash,
        path,
        seller,
        buyer,
        original_creator: creator,
        quantity,
        price,
        split,
        offer_fee: intent.offer_fee,
        settlement_fee: quote.surcharge,
        owner_after: asset_after.current_owner.clone(),
        quantity_held_after: asset_after.quantity_held,
        state_after: asset_after.state,
        discarded_intents: discarded.iter().map(|k| k.proposer.clone()).collect(),
    };

    Ok(SettlementPlan {
        intent: intent.key(),
        discarded,
        asset_after,
        balances,
        fees_charged,
        holdings,
        receipt,
    })
}

/// Writes a plan produced by [`plan`] against the same ledger state.
pub fn apply(store: &mut LedgerStore, plan: SettlementPlan) -> SettlementReceipt {
    store.remove_intent(&plan.intent);
    for key in &plan.discarded {
        store.remove_intent(key);
    }
    for (who, total) in &plan.balances {
        store.set_balance(who, *total);
    }
    for (who, total) in &plan.fees_charged {
        store.set_fees_charged(who, *total);
    }
    for (who, qty) in &plan.holdings {
        store.set_holding(&plan.asset_after.hash, who, *qty);
    }
    store.put_asset(plan.asset_after);

    let r = plan.receipt;
    info!(
        asset = %r.asset,
        path = ?r.path,
        seller = %r.seller,
        buyer = %r.buyer,
        quantity = r.quantity,
        price = r.price,
        royalty = r.split.royalty,
        treasury = r.treasury_total(),
        state = ?r.state_after,
        "settled"
    );
    r
}

/// The lot owner settles a pending intent.
pub fn finalize_sale(
    store: &mut LedgerStore,
    fees: &dyn FeeSchedule,
    caller: &Principal,
    hash: &AssetHash,
    selector: &IntentSelector,
) -> Result<SettlementReceipt> {
    let plan = plan(&*store, fees, caller, hash, SettlementPath::Sale, selector, None)?;
    Ok(apply(store, plan))
}

/// The lot owner settles the oldest pending intent of exactly the quantity named as decimal text.
pub fn finalize_resale(
    store: &mut LedgerStore,
    fees: &dyn FeeSchedule,
    caller: &Principal,
    hash: &AssetHash,
    quantity_text: &str,
) -> Result<SettlementReceipt> {
    let named = parse_quantity_text(quantity_text)?;
    let plan = plan(
        &*store,
        fees,
        caller,
        hash,
        SettlementPath::Resale,
        &IntentSelector::Oldest,
        Some(named),
    )?;
    Ok(apply(store, plan))
}
