//! Fee schedule: pure mapping from (operation kind, price, quantity) to the amounts routed to the treasury and to the original creator. All arithmetic is integer; same inputs yield the same quote.
//!
//! **Model:** every operation kind has three rules.
//!
//! | Rule           | Paid by             | Credited to        | Comes out of the price |
//! |----------------|---------------------|--------------------|------------------------|
//! | `surcharge`    | acting principal    | treasury           | no                     |
//! | `treasury_cut` | seller (Sale/Resale)| treasury           | yes                    |
//! | `royalty`      | seller (Sale/Resale)| original creator   | yes                    |
//!
//! A rule evaluates to `flat + price × bps / 10_000 + quantity × per_unit`, so flat, percentage-of-price
//! and percentage-of-quantity schedules are all expressible without touching the settlement engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Basis-point denominator: 10_000 bps = 100%.
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Listing fee charged on `Create` by the canonical schedule.
pub const CANONICAL_LISTING_FEE: u128 = 100;
/// Acknowledgment fee for a full buy offer.
pub const CANONICAL_OFFER_FEE: u128 = 200;
/// Treasury fee on a first-hand sale finalization.
pub const CANONICAL_SALE_FEE: u128 = 100;
/// Acknowledgment fee for a partial buy offer.
pub const CANONICAL_PARTIAL_OFFER_FEE: u128 = 75;
/// Treasury fee on a resale finalization.
pub const CANONICAL_RESALE_FEE: u128 = 100;
/// Royalty owed to the original creator whenever someone else sells.
pub const CANONICAL_ROYALTY: u128 = 250;

/// Operation kinds the schedule distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Create,
    Offer,
    Sale,
    PartialOffer,
    Resale,
}

impl OperationKind {
    pub const ALL: [OperationKind; 5] = [
        OperationKind::Create,
        OperationKind::Offer,
        OperationKind::Sale,
        OperationKind::PartialOffer,
        OperationKind::Resale,
    ];

    /// Only finalizations split a price between treasury, creator and seller.
    pub fn splits_price(&self) -> bool {
        matches!(self, OperationKind::Sale | OperationKind::Resale)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Create => "create",
            OperationKind::Offer => "offer",
            OperationKind::Sale => "sale",
            OperationKind::PartialOffer => "partial-offer",
            OperationKind::Resale => "resale",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        OperationKind::ALL
            .iter()
            .copied()
            .find(|k| k.to_string() == s)
            .ok_or_else(|| format!("unknown operation kind {:?}", s))
    }
}

/// One fee component. Evaluation saturates instead of wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeRule {
    pub flat: u128,
    pub bps: u32,
    pub per_unit: u128,
}

impl FeeRule {
    pub const ZERO: FeeRule = FeeRule { flat: 0, bps: 0, per_unit: 0 };

    pub const fn flat(amount: u128) -> Self {
        Self { flat: amount, bps: 0, per_unit: 0 }
    }

    pub const fn bps(bps: u32) -> Self {
        Self { flat: 0, bps, per_unit: 0 }
    }

    pub fn amount(&self, price: u128, quantity: u64) -> u128 {
        let pct = price.saturating_mul(self.bps as u128) / BPS_DENOMINATOR;
        let units = (quantity as u128).saturating_mul(self.per_unit);
        self.flat.saturating_add(pct).saturating_add(units)
    }
}

/// The three rules of one operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationFees {
    pub surcharge: FeeRule,
    pub treasury_cut: FeeRule,
    pub royalty: FeeRule,
}

impl OperationFees {
    pub const fn surcharge_only(amount: u128) -> Self {
        Self {
            surcharge: FeeRule::flat(amount),
            treasury_cut: FeeRule::ZERO,
            royalty: FeeRule::ZERO,
        }
    }
}

/// Raw fee amounts for one operation, before clamping against the price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeeQuote {
    pub surcharge: u128,
    pub treasury_cut: u128,
    pub royalty: u128,
}

/// How a finalization price is divided. Always sums to the price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PaymentSplit {
    pub treasury: u128,
    pub royalty: u128,
    pub seller: u128,
}

impl PaymentSplit {
    pub fn total(&self) -> u128 {
        self.treasury + self.royalty + self.seller
    }
}

/// Pluggable fee configuration. Settlement only ever talks to this trait.
pub trait FeeSchedule: fmt::Debug {
    fn quote(&self, kind: OperationKind, price: u128, quantity: u64) -> FeeQuote;
}

/// Divides `price` according to `quote`. The treasury cut is taken first, then the royalty, and the
/// seller keeps the rest. A creator selling their own lot owes no royalty to themselves.
pub fn split_payment(quote: &FeeQuote, price: u128, seller_is_creator: bool) -> PaymentSplit {
    let treasury = quote.treasury_cut.min(price);
    let royalty = if seller_is_creator {
        0
    } else {
        quote.royalty.min(price - treasury)
    };
    PaymentSplit {
        treasury,
        royalty,
        seller: price - treasury - royalty,
    }
}

/// Table-driven schedule with one `OperationFees` entry per operation kind. Loadable from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TieredFeeSchedule {
    pub create: OperationFees,
    pub offer: OperationFees,
    pub sale: OperationFees,
    pub partial_offer: OperationFees,
    pub resale: OperationFees,
}

impl TieredFeeSchedule {
    /// Flat schedule used by the reference marketplace deployment.
    pub fn canonical() -> Self {
        let settlement = |fee| OperationFees {
            surcharge: FeeRule::flat(fee),
            treasury_cut: FeeRule::ZERO,
            royalty: FeeRule::flat(CANONICAL_ROYALTY),
        };
        Self {
            create: OperationFees::surcharge_only(CANONICAL_LISTING_FEE),
            offer: OperationFees::surcharge_only(CANONICAL_OFFER_FEE),
            sale: settlement(CANONICAL_SALE_FEE),
            partial_offer: OperationFees::surcharge_only(CANONICAL_PARTIAL_OFFER_FEE),
            resale: settlement(CANONICAL_RESALE_FEE),
        }
    }

    /// A schedule that charges nothing anywhere.
    pub fn free() -> Self {
        Self::default()
    }

    pub fn entry(&self, kind: OperationKind) -> &OperationFees {
        match kind {
            OperationKind::Create => &self.create,
            OperationKind::Offer => &self.offer,
            OperationKind::Sale => &self.sale,
            OperationKind::PartialOffer => &self.partial_offer,
            OperationKind::Resale => &self.resale,
        }
    }

    /// Returns the first (kind, bps) pair whose percentage exceeds 100%.
    pub fn find_invalid_bps(&self) -> Option<(OperationKind, u32)> {
        OperationKind::ALL.iter().find_map(|kind| {
            let e = self.entry(*kind);
            [e.surcharge.bps, e.treasury_cut.bps, e.royalty.bps]
                .into_iter()
                .find(|bps| *bps as u128 > BPS_DENOMINATOR)
                .map(|bps| (*kind, bps))
        })
    }
}

impl FeeSchedule for TieredFeeSchedule {
    fn quote(&self, kind: OperationKind, price: u128, quantity: u64) -> FeeQuote {
        let entry = self.entry(kind);
        let surcharge = entry.surcharge.amount(price, quantity);
        if !kind.splits_price() {
            return FeeQuote { surcharge, treasury_cut: 0, royalty: 0 };
        }
        FeeQuote {
            surcharge,
            treasury_cut: entry.treasury_cut.amount(price, quantity),
            royalty: entry.royalty.amount(price, quantity),
        }
    }
}
