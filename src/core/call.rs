//! Authenticated calls as the host runtime delivers them, one at a time, and their outcomes.

use serde::{Deserialize, Serialize};
use crate::core::access::Principal;
use crate::core::asset::{register, AssetHash, RegistrationReceipt};
use crate::core::fee::FeeSchedule;
use crate::core::intent::{propose, Intent, IntentQuantity};
use crate::core::ledger::{LedgerRead, LedgerStore};
use crate::core::settlement::{finalize_resale, finalize_sale, IntentSelector, SettlementReceipt};
use crate::core::shares::{issue_share, ShareReceipt};
use crate::error::Result;

/// One call with its caller identity and arguments. JSON form: `{ "finalize_sale": { "caller": .., "hash": .. } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Call {
    Create {
        caller: Principal,
        hash: AssetHash,
        total_quantity: u64,
    },
    ProposeFullIntent {
        caller: Principal,
        hash: AssetHash,
        price: u128,
    },
    FinalizeSale {
        caller: Principal,
        hash: AssetHash,
    },
    /// Settles one named proposer's intent through the sale path.
    AcceptIntent {
        caller: Principal,
        hash: AssetHash,
        proposer: Principal,
    },
    ProposePartialIntent {
        caller: Principal,
        hash: AssetHash,
        quantity: u64,
        price: u128,
    },
    FinalizeResale {
        caller: Principal,
        hash: AssetHash,
        /// Decimal text, e.g. `"50"`.
        quantity: String,
    },
    /// Enrolls `holder` for one more fee-pool share. Issuer only.
    IssueShare {
        caller: Principal,
        holder: Principal,
    },
    QueryBalance {
        principal: Principal,
    },
    /// Treasury balance, i.e. the fee pool shareholders split.
    QueryTreasury,
    QueryShares {
        principal: Principal,
    },
}

impl Call {
    pub fn name(&self) -> &'static str {
        match self {
            Call::Create { .. } => "create",
            Call::ProposeFullIntent { .. } => "propose_full_intent",
            Call::FinalizeSale { .. } => "finalize_sale",
            Call::AcceptIntent { .. } => "accept_intent",
            Call::ProposePartialIntent { .. } => "propose_partial_intent",
            Call::FinalizeResale { .. } => "finalize_resale",
            Call::IssueShare { .. } => "issue_share",
            Call::QueryBalance { .. } => "query_balance",
            Call::QueryTreasury => "query_treasury",
            Call::QueryShares { .. } => "query_shares",
        }
    }

    pub fn is_query(&self) -> bool {
        matches!(
            self,
            Call::QueryBalance { .. } | Call::QueryTreasury | Call::QueryShares { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    Registered(RegistrationReceipt),
    IntentRecorded(Intent),
    Settled(SettlementReceipt),
    ShareIssued(ShareReceipt),
    Balance { principal: Principal, balance: u128 },
    Shares { principal: Principal, shares: u64, entitlement: u128 },
}

/// Runs one call against `store`. Queries never write. `issuer` is the principal allowed to issue
/// fee-pool shares.
pub fn execute(
    store: &mut LedgerStore,
    fees: &dyn FeeSchedule,
    issuer: &Principal,
    call: &Call,
) -> Result<CallOutcome> {
    let outcome = match call {
        Call::Create { caller, hash, total_quantity } => {
            CallOutcome::Registered(register(store, fees, caller, *hash, *total_quantity)?)
        }
        Call::ProposeFullIntent { caller, hash, price } => CallOutcome::IntentRecorded(propose(
            store,
            fees,
            caller,
            hash,
            IntentQuantity::Full,
            *price,
        )?),
        Call::ProposePartialIntent { caller, hash, quantity, price } => {
            CallOutcome::IntentRecorded(propose(
                store,
                fees,
                caller,
                hash,
                IntentQuantity::Partial(*quantity),
                *price,
            )?)
        }
        Call::FinalizeSale { caller, hash } => CallOutcome::Settled(finalize_sale(
            store,
            fees,
            caller,
            hash,
            &IntentSelector::Oldest,
        )?),
        Call::AcceptIntent { caller, hash, proposer } => CallOutcome::Settled(finalize_sale(
            store,
            fees,
            caller,
            hash,
            &IntentSelector::Proposer(proposer.clone()),
        )?),
        Call::FinalizeResale { caller, hash, quantity } => {
            CallOutcome::Settled(finalize_resale(store, fees, caller, hash, quantity)?)
        }
        Call::IssueShare { caller, holder } => {
            CallOutcome::ShareIssued(issue_share(store, issuer, caller, holder)?)
        }
        Call::QueryShares { principal } => CallOutcome::Shares {
            principal: principal.clone(),
            shares: store.shares_of(principal),
            entitlement: store.fee_pool_entitlement(principal),
        },
        Call::QueryBalance { principal } => CallOutcome::Balance {
            principal: principal.clone(),
            balance: store.balance(principal),
        },
        Call::QueryTreasury => CallOutcome::Balance {
            principal: Principal::treasury(),
            balance: store.treasury_balance(),
        },
    };
    Ok(outcome)
}
