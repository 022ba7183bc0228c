//! Fee-pool shares: the treasury balance is owned pro rata by the principals the share issuer has
//! enrolled. Every issue adds one share to the holder; shares are never transferred or burned, and
//! a holder's entitlement is a read-only view over the current treasury balance.

use serde::{Deserialize, Serialize};
use tracing::info;
use crate::core::access::{require_caller, Principal};
use crate::core::ledger::{LedgerRead, LedgerStore};
use crate::error::{MarketError, Result};

/// Default identity allowed to issue fee-pool shares.
pub const SHARE_ISSUER_PRINCIPAL: &str = "fee-structure";

/// Register position right after an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareReceipt {
    pub holder: Principal,
    /// Shares `holder` owns now.
    pub shares: u64,
    /// Shares outstanding across all holders.
    pub total_shares: u64,
}

/// Issues one share to `holder`. Only `issuer` may call; the treasury and the empty identity
/// cannot hold shares.
pub fn issue_share(
    store: &mut LedgerStore,
    issuer: &Principal,
    caller: &Principal,
    holder: &Principal,
) -> Result<ShareReceipt> {
    require_caller(caller)?;
    if caller != issuer {
        return Err(MarketError::Unauthorized(format!(
            "{} is not the share issuer",
            caller
        )));
    }
    if holder.is_anonymous() || holder.is_treasury() {
        return Err(MarketError::Unauthorized(format!(
            "{:?} cannot hold fee-pool shares",
            holder.as_str()
        )));
    }

    let shares = store
        .shares_of(holder)
        .checked_add(1)
        .ok_or(MarketError::ArithmeticOverflow)?;
    let total_shares = store
        .total_shares()
        .checked_add(1)
        .ok_or(MarketError::ArithmeticOverflow)?;
    store.set_shares(holder, shares, total_shares);

    info!(holder = %holder, shares, total_shares, "fee-pool share issued");
    Ok(ShareReceipt {
        holder: holder.clone(),
        shares,
        total_shares,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(name: &str) -> Principal {
        Principal::new(name)
    }

    fn issuer() -> Principal {
        p(SHARE_ISSUER_PRINCIPAL)
    }

    #[test]
    fn test_issue_counts_per_holder_and_total() {
        let mut store = LedgerStore::new();
        issue_share(&mut store, &issuer(), &issuer(), &p("alice")).unwrap();
        issue_share(&mut store, &issuer(), &issuer(), &p("bob")).unwrap();
        let r = issue_share(&mut store, &issuer(), &issuer(), &p("alice")).unwrap();

        assert_eq!(r, ShareReceipt { holder: p("alice"), shares: 2, total_shares: 3 });
        assert_eq!(store.shares_of(&p("bob")), 1);
        assert_eq!(store.total_shares(), 3);
    }

    #[test]
    fn test_only_issuer_may_issue() {
        let mut store = LedgerStore::new();
        let root = store.state_root();
        let result = issue_share(&mut store, &issuer(), &p("alice"), &p("alice"));
        assert!(matches!(result, Err(MarketError::Unauthorized(_))));
        assert_eq!(store.state_root(), root);
    }

    #[test]
    fn test_treasury_and_empty_holder_rejected() {
        let mut store = LedgerStore::new();
        for holder in [Principal::treasury(), p("")] {
            let result = issue_share(&mut store, &issuer(), &issuer(), &holder);
            assert!(matches!(result, Err(MarketError::Unauthorized(_))));
        }
        assert_eq!(store.total_shares(), 0);
    }

    #[test]
    fn test_issuer_may_hold_shares() {
        let mut store = LedgerStore::new();
        issue_share(&mut store, &issuer(), &issuer(), &issuer()).unwrap();
        assert_eq!(store.shares_of(&issuer()), 1);
    }

    #[test]
    fn test_entitlement_follows_treasury() {
        let mut store = LedgerStore::new();
        issue_share(&mut store, &issuer(), &issuer(), &p("alice")).unwrap();
        issue_share(&mut store, &issuer(), &issuer(), &p("bob")).unwrap();
        assert_eq!(store.fee_pool_entitlement(&p("alice")), 0);

        store.set_balance(&Principal::treasury(), 101);
        assert_eq!(store.fee_pool_entitlement(&p("alice")), 50);
        assert_eq!(store.fee_pool_entitlement(&p("carol")), 0);
    }
}
