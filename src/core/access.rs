//! Principals and access control. Every check here runs before the ledger is touched, so a rejected call never partially applies.

use serde::{Deserialize, Serialize};
use std::fmt;
use crate::error::{MarketError, Result};

/// Treasury principal: accrues every platform fee.
pub const TREASURY_PRINCIPAL: &str = "treasury";

/// Caller identity as handed over by the host runtime. Identity verification happens outside this crate.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn treasury() -> Self {
        Self(TREASURY_PRINCIPAL.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_treasury(&self) -> bool {
        self.0 == TREASURY_PRINCIPAL
    }

    pub fn is_anonymous(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Principal {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A mutating call needs a real caller. The treasury only receives, it never acts.
pub fn require_caller(caller: &Principal) -> Result<()> {
    if caller.is_anonymous() {
        return Err(MarketError::Unauthorized("caller identity is required".to_string()));
    }
    if caller.is_treasury() {
        return Err(MarketError::Unauthorized(
            "the treasury principal cannot submit calls".to_string(),
        ));
    }
    Ok(())
}

/// Finalization is reserved to the owner of the tradable lot.
pub fn require_owner(caller: &Principal, owner: &Principal, asset: &str) -> Result<()> {
    if caller != owner {
        return Err(MarketError::NotOwner {
            caller: caller.to_string(),
            asset: asset.to_string(),
        });
    }
    Ok(())
}

/// Owners cannot bid on their own lot.
pub fn require_not_owner(caller: &Principal, owner: &Principal) -> Result<()> {
    if caller == owner {
        return Err(MarketError::Unauthorized(format!(
            "{} already owns this lot and cannot propose to buy it",
            caller
        )));
    }
    Ok(())
}
