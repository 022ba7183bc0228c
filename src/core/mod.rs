// Core marketplace: asset registry, intent ledger, fee schedule, settlement and the fee-pool share
// register over one ledger store.
//
// EXECUTION MODEL:
// ================
// The host runtime serializes calls; each call runs to completion on `&mut Market` before the next
// one starts, so the core holds no locks. Every operation validates all preconditions before its
// first write. A rejected call leaves the ledger exactly as it was.
//
// DETERMINISM:
// - Same call sequence + same fee schedule -> same ledger state root
// - No randomness, no system time, integer arithmetic only

pub mod access;
pub mod asset;
pub mod call;
pub mod fee;
pub mod intent;
pub mod ledger;
pub mod settlement;
pub mod shares;

use tracing::warn;
use crate::core::access::Principal;
use crate::core::asset::{AssetHash, AssetRecord, RegistrationReceipt};
use crate::core::call::{execute, Call, CallOutcome};
use crate::core::fee::{FeeSchedule, TieredFeeSchedule};
use crate::core::intent::{Intent, IntentQuantity};
use crate::core::ledger::{LedgerRead, LedgerSnapshot, LedgerStore};
use crate::core::settlement::{IntentSelector, SettlementReceipt};
use crate::core::shares::{ShareReceipt, SHARE_ISSUER_PRINCIPAL};
use crate::error::Result;

/// Marketplace engine: the ledger store plus the fee schedule it settles with.
#[derive(Debug)]
pub struct Market {
    store: LedgerStore,
    fees: Box<dyn FeeSchedule>,
    /// Only principal allowed to issue fee-pool shares.
    share_issuer: Principal,
}

impl Market {
    /// Empty market on the canonical fee schedule.
    pub fn new() -> Self {
        Self::with_fee_schedule(Box::new(TieredFeeSchedule::canonical()))
    }

    /// Empty market that settles with `fees`, e.g. a schedule loaded by
    /// [`load_fee_schedule`](crate::config::load_fee_schedule).
    pub fn with_fee_schedule(fees: Box<dyn FeeSchedule>) -> Self {
        Self {
            store: LedgerStore::new(),
            fees,
            share_issuer: Principal::new(SHARE_ISSUER_PRINCIPAL),
        }
    }

    /// Replaces the default share issuer (`fee-structure`).
    pub fn with_share_issuer(mut self, issuer: Principal) -> Self {
        self.share_issuer = issuer;
        self
    }

    /// Registers `hash` with `total_quantity` units owned by `caller`.
    pub fn create(
        &mut self,
        caller: &Principal,
        hash: AssetHash,
        total_quantity: u64,
    ) -> Result<RegistrationReceipt> {
        asset::register(&mut self.store, self.fees.as_ref(), caller, hash, total_quantity)
    }

    /// Offers `price` for the owner's whole lot.
    pub fn propose_full_intent(
        &mut self,
        caller: &Principal,
        hash: &AssetHash,
        price: u128,
    ) -> Result<Intent> {
        intent::propose(&mut self.store, self.fees.as_ref(), caller, hash, IntentQuantity::Full, price)
    }

    /// Offers `price` for `quantity` units of the lot.
    pub fn propose_partial_intent(
        &mut self,
        caller: &Principal,
        hash: &AssetHash,
        quantity: u64,
        price: u128,
    ) -> Result<Intent> {
        intent::propose(
            &mut self.store,
            self.fees.as_ref(),
            caller,
            hash,
            IntentQuantity::Partial(quantity),
            price,
        )
    }

    /// The lot owner settles the oldest pending intent.
    pub fn finalize_sale(&mut self, caller: &Principal, hash: &AssetHash) -> Result<SettlementReceipt> {
        settlement::finalize_sale(
            &mut self.store,
            self.fees.as_ref(),
            caller,
            hash,
            &IntentSelector::Oldest,
        )
    }

    /// Settles `proposer`'s intent specifically, through the sale path.
    pub fn accept_intent(
        &mut self,
        caller: &Principal,
        hash: &AssetHash,
        proposer: &Principal,
    ) -> Result<SettlementReceipt> {
        settlement::finalize_sale(
            &mut self.store,
            self.fees.as_ref(),
            caller,
            hash,
            &IntentSelector::Proposer(proposer.clone()),
        )
    }

    /// The lot owner settles the oldest pending intent, naming its quantity as text.
    pub fn finalize_resale(
        &mut self,
        caller: &Principal,
        hash: &AssetHash,
        quantity_text: &str,
    ) -> Result<SettlementReceipt> {
        settlement::finalize_resale(&mut self.store, self.fees.as_ref(), caller, hash, quantity_text)
    }

    /// Issues one fee-pool share to `holder`. Only the share issuer may call.
    pub fn issue_share(&mut self, caller: &Principal, holder: &Principal) -> Result<ShareReceipt> {
        shares::issue_share(&mut self.store, &self.share_issuer, caller, holder)
    }

    /// Fee-pool shares held by `principal`.
    pub fn shares_of(&self, principal: &Principal) -> u64 {
        self.store.shares_of(principal)
    }

    /// `principal`'s pro-rata claim on the current treasury balance.
    pub fn fee_pool_entitlement(&self, principal: &Principal) -> u128 {
        self.store.fee_pool_entitlement(principal)
    }

    pub fn share_issuer(&self) -> &Principal {
        &self.share_issuer
    }

    /// Accrued proceeds of `principal`.
    pub fn query_balance(&self, principal: &Principal) -> u128 {
        self.store.balance(principal)
    }

    /// Everything credited to the treasury principal: surcharges plus treasury cuts.
    pub fn treasury_balance(&self) -> u128 {
        self.store.treasury_balance()
    }

    /// Current registry entry of `hash`, if registered.
    pub fn asset(&self, hash: &AssetHash) -> Option<&AssetRecord> {
        self.store.asset(hash)
    }

    /// Read access to the full ledger.
    pub fn ledger(&self) -> &LedgerStore {
        &self.store
    }

    /// Schedule every operation is quoted against.
    pub fn fee_schedule(&self) -> &dyn FeeSchedule {
        self.fees.as_ref()
    }

    /// Applies one call from the host's ordered stream. Rejections are logged and returned unchanged.
    pub fn dispatch(&mut self, call: &Call) -> Result<CallOutcome> {
        execute(&mut self.store, self.fees.as_ref(), &self.share_issuer, call).map_err(|e| {
            warn!(call = call.name(), kind = e.kind(), error = %e, "call rejected");
            e
        })
    }

    /// Dry run: executes `call` on a copy of the current ledger and returns the outcome with the
    /// ledger it would produce. The live ledger is never touched.
    pub fn simulate(&self, call: &Call) -> Result<(CallOutcome, LedgerSnapshot)> {
        let mut scratch = LedgerStore::from_snapshot(&self.store.snapshot());
        let outcome = execute(&mut scratch, self.fees.as_ref(), &self.share_issuer, call)?;
        Ok((outcome, scratch.snapshot()))
    }
}

impl Default for Market {
    fn default() -> Self {
        Self::new()
    }
}
