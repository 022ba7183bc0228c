//! Ledger store: the only mutable state. Holds asset records, intents, accrued balances, fractional holdings,
//! per-principal fee tallies and the fee-pool share register.
//!
//! # Determinism
//! Every table is a `BTreeMap`, so iteration (and therefore the state root) is ordered by key. No randomness or system time.
//!
//! # Snapshots
//! Tables live behind `Arc` and are mutated through `Arc::make_mut`: taking a snapshot is O(1) and the
//! live store copies a table only on its next write. `restore(&snapshot)` brings the store back exactly.

use std::collections::BTreeMap;
use std::sync::Arc;
use sha2::{Digest, Sha256};
use crate::core::access::Principal;
use crate::core::asset::{AssetHash, AssetRecord};
use crate::core::intent::{Intent, IntentKey};

/// Backing tables of a store or snapshot. Opaque outside this module.
#[doc(hidden)]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerTables {
    assets: Arc<BTreeMap<AssetHash, AssetRecord>>,
    intents: Arc<BTreeMap<IntentKey, Intent>>,
    balances: Arc<BTreeMap<Principal, u128>>,
    holdings: Arc<BTreeMap<(AssetHash, Principal), u64>>,
    fees_charged: Arc<BTreeMap<Principal, u128>>,
    shares: Arc<BTreeMap<Principal, u64>>,
    share_supply: u64,
    next_sequence: u64,
}

/// Read-only view shared by the live store and its snapshots.
pub trait LedgerRead {
    #[doc(hidden)]
    fn tables(&self) -> &LedgerTables;

    /// Accrued proceeds of `principal`, 0 if it never received anything.
    fn balance(&self, principal: &Principal) -> u128 {
        self.tables().balances.get(principal).copied().unwrap_or(0)
    }

    fn treasury_balance(&self) -> u128 {
        self.balance(&Principal::treasury())
    }

    fn asset(&self, hash: &AssetHash) -> Option<&AssetRecord> {
        self.tables().assets.get(hash)
    }

    fn intent(&self, hash: &AssetHash, proposer: &Principal) -> Option<&Intent> {
        self.tables()
            .intents
            .get(&IntentKey::new(*hash, proposer.clone()))
    }

    /// Active intents on `hash`, ordered by proposer.
    fn intents_for(&self, hash: &AssetHash) -> Vec<&Intent> {
        let start = IntentKey::new(*hash, Principal::new(""));
        self.tables()
            .intents
            .range(start..)
            .take_while(|(key, _)| key.asset == *hash)
            .map(|(_, intent)| intent)
            .collect()
    }

    /// The intent that has waited longest on `hash`.
    fn oldest_intent(&self, hash: &AssetHash) -> Option<&Intent> {
        self.intents_for(hash)
            .into_iter()
            .min_by_key(|intent| intent.sequence)
    }

    /// Units of `hash` owned by `principal` across all finalizations.
    fn holding(&self, hash: &AssetHash, principal: &Principal) -> u64 {
        self.tables()
            .holdings
            .get(&(*hash, principal.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// Holders of `hash` with a non-zero quantity, sorted by principal.
    fn holders(&self, hash: &AssetHash) -> Vec<(Principal, u64)> {
        self.tables()
            .holdings
            .iter()
            .filter(|((asset, _), qty)| asset == hash && **qty > 0)
            .map(|((_, who), qty)| (who.clone(), *qty))
            .collect()
    }

    /// Total surcharges levied on `principal` so far.
    fn fees_charged(&self, principal: &Principal) -> u128 {
        self.tables().fees_charged.get(principal).copied().unwrap_or(0)
    }

    /// Fee-pool shares issued to `principal`.
    fn shares_of(&self, principal: &Principal) -> u64 {
        self.tables().shares.get(principal).copied().unwrap_or(0)
    }

    /// Shares issued so far across all holders.
    fn total_shares(&self) -> u64 {
        self.tables().share_supply
    }

    /// Shareholders sorted by principal.
    fn shareholders(&self) -> Vec<(Principal, u64)> {
        self.tables()
            .shares
            .iter()
            .map(|(who, n)| (who.clone(), *n))
            .collect()
    }

    /// `principal`'s pro-rata part of the treasury balance, rounded down. 0 while no share exists.
    fn fee_pool_entitlement(&self, principal: &Principal) -> u128 {
        pro_rata(self.treasury_balance(), self.shares_of(principal), self.total_shares())
    }

    /// All non-zero balances, sorted by principal.
    fn balances(&self) -> Vec<(Principal, u128)> {
        self.tables()
            .balances
            .iter()
            .filter(|(_, bal)| **bal > 0)
            .map(|(p, bal)| (p.clone(), *bal))
            .collect()
    }

    /// Every registered asset, ordered by hash.
    fn assets(&self) -> Vec<&AssetRecord> {
        self.tables().assets.values().collect()
    }

    fn asset_count(&self) -> usize {
        self.tables().assets.len()
    }

    fn intent_count(&self) -> usize {
        self.tables().intents.len()
    }

    /// SHA-256 over every table in key order, hex encoded. Equal roots mean equal ledgers.
    fn state_root(&self) -> String {
        let t = self.tables();
        let mut hasher = Sha256::new();
        for (hash, a) in t.assets.iter() {
            hasher.update(b"asset");
            hasher.update(hash.as_bytes());
            hasher.update(a.total_quantity.to_le_bytes());
            hash_principal(&mut hasher, &a.current_owner);
            hasher.update(a.quantity_held.to_le_bytes());
            hash_principal(&mut hasher, &a.original_creator);
            hasher.update([a.state.tag()]);
        }
        for (key, i) in t.intents.iter() {
            hasher.update(b"intent");
            hasher.update(key.asset.as_bytes());
            hash_principal(&mut hasher, &key.proposer);
            hasher.update(i.quantity_requested.to_le_bytes());
            hasher.update(i.price_offered.to_le_bytes());
            hasher.update(i.offer_fee.to_le_bytes());
            hasher.update(i.sequence.to_le_bytes());
        }
        for (who, bal) in t.balances.iter() {
            hasher.update(b"balance");
            hash_principal(&mut hasher, who);
            hasher.update(bal.to_le_bytes());
        }
        for ((asset, who), qty) in t.holdings.iter() {
            hasher.update(b"holding");
            hasher.update(asset.as_bytes());
            hash_principal(&mut hasher, who);
            hasher.update(qty.to_le_bytes());
        }
        for (who, fee) in t.fees_charged.iter() {
            hasher.update(b"fee");
            hash_principal(&mut hasher, who);
            hasher.update(fee.to_le_bytes());
        }
        for (who, n) in t.shares.iter() {
            hasher.update(b"share");
            hash_principal(&mut hasher, who);
            hasher.update(n.to_le_bytes());
        }
        hasher.update(t.share_supply.to_le_bytes());
        hasher.update(t.next_sequence.to_le_bytes());
        hex::encode(hasher.finalize())
    }
}

/// `pool * shares / supply` rounded down, without overflowing for any `shares <= supply`.
pub fn pro_rata(pool: u128, shares: u64, supply: u64) -> u128 {
    if supply == 0 {
        return 0;
    }
    let (shares, supply) = (u128::from(shares), u128::from(supply));
    (pool / supply) * shares + (pool % supply) * shares / supply
}

fn hash_principal(hasher: &mut Sha256, principal: &Principal) {
    let bytes = principal.as_str().as_bytes();
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

/// Immutable point-in-time copy of the ledger. Creation is O(1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerSnapshot {
    tables: LedgerTables,
}

impl LedgerRead for LedgerSnapshot {
    fn tables(&self) -> &LedgerTables {
        &self.tables
    }
}

/// The live ledger. Writes are low-level setters; callers validate everything before the first write.
#[derive(Debug, Default)]
pub struct LedgerStore {
    tables: LedgerTables,
}

impl LedgerRead for LedgerStore {
    fn tables(&self) -> &LedgerTables {
        &self.tables
    }
}

impl LedgerStore {
    /// Empty ledger: no assets, no intents, every balance 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Immutable copy of the current ledger.
    ///
    /// PERFORMANCE: O(1), only the table `Arc`s are cloned. The live store copies a table on its
    /// next write to it.
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            tables: self.tables.clone(),
        }
    }

    /// Brings the store back to `snapshot` exactly. Idempotent; the snapshot is unaffected.
    pub fn restore(&mut self, snapshot: &LedgerSnapshot) {
        self.tables = snapshot.tables.clone();
    }

    /// Store seeded from a snapshot; used for dry runs.
    pub fn from_snapshot(snapshot: &LedgerSnapshot) -> Self {
        Self {
            tables: snapshot.tables.clone(),
        }
    }

    pub(crate) fn put_asset(&mut self, record: AssetRecord) {
        Arc::make_mut(&mut self.tables.assets).insert(record.hash, record);
    }

    /// Stores or replaces an intent and stamps it with the next proposal sequence number.
    pub(crate) fn put_intent(&mut self, mut intent: Intent) -> Intent {
        intent.sequence = self.tables.next_sequence;
        self.tables.next_sequence += 1;
        Arc::make_mut(&mut self.tables.intents).insert(intent.key(), intent.clone());
        intent
    }

    /// Drops an intent without touching its sequence number or any balance.
    pub(crate) fn remove_intent(&mut self, key: &IntentKey) -> Option<Intent> {
        Arc::make_mut(&mut self.tables.intents).remove(key)
    }

    pub(crate) fn set_balance(&mut self, principal: &Principal, amount: u128) {
        Arc::make_mut(&mut self.tables.balances).insert(principal.clone(), amount);
    }

    /// Zero quantities are removed so holders never lists empty entries.
    pub(crate) fn set_holding(&mut self, hash: &AssetHash, principal: &Principal, quantity: u64) {
        let holdings = Arc::make_mut(&mut self.tables.holdings);
        let key = (*hash, principal.clone());
        if quantity == 0 {
            holdings.remove(&key);
        } else {
            holdings.insert(key, quantity);
        }
    }

    /// Records `holder` at `shares` and the register at `supply` in one step.
    pub(crate) fn set_shares(&mut self, holder: &Principal, shares: u64, supply: u64) {
        Arc::make_mut(&mut self.tables.shares).insert(holder.clone(), shares);
        self.tables.share_supply = supply;
    }

    pub(crate) fn set_fees_charged(&mut self, principal: &Principal, amount: u128) {
        Arc::make_mut(&mut self.tables.fees_charged).insert(principal.clone(), amount);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::asset::AssetState;

    fn hash(byte: u8) -> AssetHash {
        AssetHash::new([byte; 32])
    }

    fn record(byte: u8, owner: &str) -> AssetRecord {
        AssetRecord {
            hash: hash(byte),
            total_quantity: 10,
            current_owner: Principal::new(owner),
            quantity_held: 10,
            original_creator: Principal::new(owner),
            state: AssetState::Registered,
        }
    }

    fn intent(byte: u8, proposer: &str) -> Intent {
        Intent {
            asset: hash(byte),
            proposer: Principal::new(proposer),
            quantity_requested: 1,
            price_offered: 5,
            offer_fee: 0,
            sequence: 0,
        }
    }

    #[test]
    fn test_new_store_is_empty() {
        let store = LedgerStore::new();
        assert_eq!(store.balance(&Principal::new("anyone")), 0);
        assert_eq!(store.treasury_balance(), 0);
        assert_eq!(store.asset_count(), 0);
        assert!(store.balances().is_empty());
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_writes() {
        let mut store = LedgerStore::new();
        let alice = Principal::new("alice");
        store.set_balance(&alice, 10);
        let snap = store.snapshot();

        store.set_balance(&alice, 99);
        store.put_asset(record(1, "alice"));

        assert_eq!(snap.balance(&alice), 10);
        assert!(snap.asset(&hash(1)).is_none());
        assert_eq!(store.balance(&alice), 99);
    }

    #[test]
    fn test_restore_identity() {
        let mut store = LedgerStore::new();
        store.put_asset(record(1, "alice"));
        store.set_holding(&hash(1), &Principal::new("alice"), 10);
        let snap = store.snapshot();
        let root = store.state_root();

        store.set_balance(&Principal::new("bob"), 7);
        store.put_intent(intent(1, "bob"));
        assert_ne!(store.state_root(), root);

        store.restore(&snap);
        assert_eq!(store.state_root(), root);
        assert_eq!(store.snapshot(), snap);
    }

    #[test]
    fn test_state_root_deterministic() {
        let build = || {
            let mut store = LedgerStore::new();
            store.set_balance(&Principal::new("b"), 2);
            store.set_balance(&Principal::new("a"), 1);
            store.put_asset(record(2, "a"));
            store
        };
        assert_eq!(build().state_root(), build().state_root());
        assert_eq!(build().state_root().len(), 64);
    }

    #[test]
    fn test_put_intent_stamps_increasing_sequence() {
        let mut store = LedgerStore::new();
        let first = store.put_intent(intent(1, "bob"));
        let second = store.put_intent(intent(1, "carol"));
        assert!(first.sequence < second.sequence);
        assert_eq!(store.oldest_intent(&hash(1)).unwrap().proposer, Principal::new("bob"));

        // re-proposing sends bob to the back
        store.put_intent(intent(1, "bob"));
        assert_eq!(store.intent_count(), 2);
        assert_eq!(store.oldest_intent(&hash(1)).unwrap().proposer, Principal::new("carol"));
    }

    #[test]
    fn test_intents_for_is_scoped_to_asset() {
        let mut store = LedgerStore::new();
        store.put_intent(intent(1, "bob"));
        store.put_intent(intent(2, "bob"));
        store.put_intent(intent(1, "carol"));
        assert_eq!(store.intents_for(&hash(1)).len(), 2);
        assert_eq!(store.intents_for(&hash(2)).len(), 1);
        assert!(store.intents_for(&hash(3)).is_empty());
    }

    #[test]
    fn test_zero_holding_is_removed() {
        let mut store = LedgerStore::new();
        let alice = Principal::new("alice");
        store.set_holding(&hash(1), &alice, 4);
        assert_eq!(store.holders(&hash(1)), vec![(alice.clone(), 4)]);
        store.set_holding(&hash(1), &alice, 0);
        assert!(store.holders(&hash(1)).is_empty());
        assert_eq!(store.holding(&hash(1), &alice), 0);
    }

    #[test]
    fn test_from_snapshot_is_independent() {
        let mut store = LedgerStore::new();
        store.set_balance(&Principal::new("a"), 1);
        let snap = store.snapshot();
        let mut scratch = LedgerStore::from_snapshot(&snap);
        scratch.set_balance(&Principal::new("a"), 50);
        assert_eq!(store.balance(&Principal::new("a")), 1);
        assert_eq!(snap.balance(&Principal::new("a")), 1);
    }

    #[test]
    fn test_pro_rata_rounds_down_without_overflow() {
        assert_eq!(pro_rata(575, 1, 3), 191);
        assert_eq!(pro_rata(575, 3, 3), 575);
        assert_eq!(pro_rata(575, 0, 3), 0);
        assert_eq!(pro_rata(575, 1, 0), 0);
        assert_eq!(pro_rata(u128::MAX, u64::MAX, u64::MAX), u128::MAX);
    }

    #[test]
    fn test_shares_enter_state_root() {
        let mut store = LedgerStore::new();
        let root = store.state_root();
        store.set_shares(&Principal::new("alice"), 1, 1);
        assert_ne!(store.state_root(), root);
        assert_eq!(store.total_shares(), 1);
        assert_eq!(store.shareholders(), vec![(Principal::new("alice"), 1)]);
    }
}
