//! # Domain Types
//!
//! Core domain types used throughout the wallet ledger.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   GiftCard      │   │   WalletLot     │   │WalletTransaction│       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  code (unique)  │──►│  amount         │◄──│  lot_id         │       │
//! │  │  final_credit   │   │  remaining      │   │  direction      │       │
//! │  │  status         │   │  expires_at     │   │  amount         │       │
//! │  └────────┬────────┘   └─────────────────┘   └─────────────────┘       │
//! │           │                                                             │
//! │  ┌────────┴────────┐   ┌─────────────────┐                             │
//! │  │ GiftCardBatch   │   │   PromoRule     │                             │
//! │  │  batch_code     │   │  multiplier bps │                             │
//! │  │  quantity       │   │  conditions     │                             │
//! │  └─────────────────┘   └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! Lots, ledger entries, gift cards, batches and OTP codes use UUID v4
//! strings. Promo rules use an integer id so that "lowest id wins" is a
//! stable tie-break. Wallet owners are `i64` user ids.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{InvariantViolation, WalletError};
use crate::money::Money;

/// Generates a new entity id (UUID v4).
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Multiplier
// =============================================================================

/// Promotional multiplier in basis points.
///
/// 10000 bps = 1.00x (no bonus), 11000 bps = 1.10x (10% bonus).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Multiplier(u32);

impl Multiplier {
    /// The neutral multiplier (1.00x).
    pub const ONE: Multiplier = Multiplier(10_000);

    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Multiplier(bps)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the multiplier as a ratio (display only).
    #[inline]
    pub fn ratio(&self) -> f64 {
        self.0 as f64 / 10_000.0
    }
}

impl Default for Multiplier {
    fn default() -> Self {
        Multiplier::ONE
    }
}

impl fmt::Display for Multiplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}x", self.0 / 10_000, (self.0 % 10_000) / 100)
    }
}

// =============================================================================
// Status Enums
// =============================================================================

macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Storage / wire representation.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// Lifecycle state of a wallet lot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum LotStatus {
    /// Spendable while `remaining > 0` and not past `expires_at`.
    Active,
    /// `remaining` reached zero.
    Exhausted,
    /// Swept after `expires_at` with value left on it.
    Expired,
    /// Held by an administrator.
    Frozen,
}

text_enum!(LotStatus {
    Active => "active",
    Exhausted => "exhausted",
    Expired => "expired",
    Frozen => "frozen",
});

/// Where a lot's value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum LotSource {
    GiftCard,
    PromoCredit,
    RefundCredit,
    AdminAdjustment,
    PurchaseRefund,
}

text_enum!(LotSource {
    GiftCard => "gift_card",
    PromoCredit => "promo_credit",
    RefundCredit => "refund_credit",
    AdminAdjustment => "admin_adjustment",
    PurchaseRefund => "purchase_refund",
});

/// Business meaning of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Redeem,
    Purchase,
    RefundCredit,
    AdminAdjustment,
    GiftCardRedeem,
    PromoCredit,
}

text_enum!(TransactionType {
    Redeem => "redeem",
    Purchase => "purchase",
    RefundCredit => "refund_credit",
    AdminAdjustment => "admin_adjustment",
    GiftCardRedeem => "gift_card_redeem",
    PromoCredit => "promo_credit",
});

impl TransactionType {
    /// Types an external caller may use to spend wallet balance.
    pub const fn is_debit_type(&self) -> bool {
        matches!(
            self,
            TransactionType::Purchase | TransactionType::Redeem | TransactionType::AdminAdjustment
        )
    }

    /// Types an external caller may use to credit wallet balance.
    /// `GiftCardRedeem` is reserved for the redemption engine.
    pub const fn is_external_credit_type(&self) -> bool {
        matches!(
            self,
            TransactionType::RefundCredit
                | TransactionType::AdminAdjustment
                | TransactionType::PromoCredit
        )
    }
}

/// Whether a ledger entry adds or removes value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Credit,
    Debit,
}

text_enum!(Direction {
    Credit => "credit",
    Debit => "debit",
});

/// Ledger entries are only ever written once committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    #[default]
    Completed,
}

text_enum!(TransactionStatus {
    Completed => "completed",
});

/// Gift card lifecycle.
///
/// ```text
/// created ──► active ──► redeemed        (terminal success)
///               │ ▲
///               ▼ │
///            inactive
///               │
/// active ──► expired | void              (terminal failure)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum GiftCardStatus {
    Created,
    Active,
    Inactive,
    Redeemed,
    Expired,
    Void,
}

text_enum!(GiftCardStatus {
    Created => "created",
    Active => "active",
    Inactive => "inactive",
    Redeemed => "redeemed",
    Expired => "expired",
    Void => "void",
});

impl GiftCardStatus {
    /// Terminal states never transition again.
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            GiftCardStatus::Redeemed | GiftCardStatus::Expired | GiftCardStatus::Void
        )
    }

    /// Whether the lifecycle allows moving from `self` to `to`.
    pub fn can_transition_to(&self, to: GiftCardStatus) -> bool {
        use GiftCardStatus::*;
        matches!(
            (self, to),
            (Created, Active)
                | (Active, Inactive)
                | (Inactive, Active)
                | (Active, Redeemed)
                | (Created | Active | Inactive, Expired)
                | (Created | Active | Inactive, Void)
        )
    }
}

/// Gift card batch lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Draft,
    Active,
    Expired,
    Cancelled,
}

text_enum!(BatchStatus {
    Draft => "draft",
    Active => "active",
    Expired => "expired",
    Cancelled => "cancelled",
});

/// How a promo rule decides whether it applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PromoRuleType {
    Global,
    Category,
    UserSegment,
    DateRange,
}

text_enum!(PromoRuleType {
    Global => "global",
    Category => "category",
    UserSegment => "user_segment",
    DateRange => "date_range",
});

// =============================================================================
// Wallet Lot
// =============================================================================

/// A discrete, independently-expiring chunk of wallet balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct WalletLot {
    pub id: String,
    pub user_id: i64,
    /// Originally credited quantity (base + bonus).
    pub amount_cents: i64,
    pub base_value_cents: i64,
    /// Promo-derived portion of `amount_cents`.
    pub bonus_value_cents: i64,
    /// Consumable balance, never increases.
    pub remaining_cents: i64,
    pub currency: String,
    pub status: LotStatus,
    pub source: LotSource,
    /// `None` means the lot never expires.
    pub expires_at: Option<DateTime<Utc>>,
    pub gift_card_id: Option<String>,
    pub ref_type: Option<String>,
    pub ref_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WalletLot {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    #[inline]
    pub fn remaining(&self) -> Money {
        Money::from_cents(self.remaining_cents)
    }

    /// True once `expires_at` is at or before `as_of`.
    pub fn is_expired_at(&self, as_of: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= as_of)
    }

    /// Whether this lot counts towards the spendable balance at `as_of`.
    pub fn is_spendable_at(&self, as_of: DateTime<Utc>) -> bool {
        self.status == LotStatus::Active && self.remaining_cents > 0 && !self.is_expired_at(as_of)
    }

    /// Checks `0 <= remaining <= amount` and the exhausted/remaining pairing.
    ///
    /// A failure here means stored data is corrupt; it is never clamped.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        if self.remaining_cents < 0 || self.remaining_cents > self.amount_cents {
            return Err(InvariantViolation::new(format!(
                "lot {} has remaining {} outside 0..={}",
                self.id, self.remaining_cents, self.amount_cents
            )));
        }
        if self.status == LotStatus::Exhausted && self.remaining_cents != 0 {
            return Err(InvariantViolation::new(format!(
                "lot {} is exhausted with remaining {}",
                self.id, self.remaining_cents
            )));
        }
        Ok(())
    }
}

/// Input for creating a lot.
#[derive(Debug, Clone)]
pub struct NewLot {
    pub user_id: i64,
    pub amount: Money,
    pub base_value: Money,
    pub bonus_value: Money,
    pub currency: String,
    pub source: LotSource,
    pub expires_at: Option<DateTime<Utc>>,
    pub gift_card_id: Option<String>,
    pub ref_type: Option<String>,
    pub ref_id: Option<String>,
}

// =============================================================================
// Wallet Transaction (ledger entry)
// =============================================================================

/// An immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct WalletTransaction {
    pub id: String,
    pub user_id: i64,
    pub transaction_type: TransactionType,
    pub direction: Direction,
    /// Always positive; `direction` carries the sign.
    pub amount_cents: i64,
    pub base_value_cents: i64,
    pub bonus_value_cents: Option<i64>,
    pub currency: String,
    pub ref_type: Option<String>,
    pub ref_id: Option<String>,
    pub gift_card_id: Option<String>,
    pub promo_rule_id: Option<i64>,
    /// The lot this entry created (credit) or drew from (debit).
    pub lot_id: Option<String>,
    pub description: Option<String>,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

impl WalletTransaction {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    /// Positive for credits, negative for debits.
    pub fn signed_amount(&self) -> Money {
        match self.direction {
            Direction::Credit => self.amount(),
            Direction::Debit => -self.amount(),
        }
    }
}

/// Input for appending a ledger entry.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: i64,
    pub transaction_type: TransactionType,
    pub direction: Direction,
    pub amount: Money,
    pub base_value: Money,
    pub bonus_value: Option<Money>,
    pub currency: String,
    pub ref_type: Option<String>,
    pub ref_id: Option<String>,
    pub gift_card_id: Option<String>,
    pub promo_rule_id: Option<i64>,
    pub lot_id: Option<String>,
    pub description: Option<String>,
}

// =============================================================================
// Gift Cards
// =============================================================================

/// A redeemable gift card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct GiftCard {
    pub id: String,
    /// Globally unique, stored upper-case.
    pub code: String,
    pub original_value_cents: i64,
    pub base_value_cents: i64,
    pub bonus_value_cents: i64,
    /// `base + bonus`, the amount credited on redemption.
    pub final_credit_cents: i64,
    pub currency: String,
    pub batch_id: Option<String>,
    /// A locked-in promo; when set, the stored bonus is used as-is.
    pub promo_rule_id: Option<i64>,
    /// Product category used when resolving a promo at redemption.
    pub category: Option<String>,
    /// Lifetime of the wallet lot created on redemption.
    pub validity_days: Option<i64>,
    pub status: GiftCardStatus,
    pub issued_to: Option<String>,
    pub redeemed_by: Option<i64>,
    pub redeemed_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GiftCard {
    #[inline]
    pub fn base_value(&self) -> Money {
        Money::from_cents(self.base_value_cents)
    }

    #[inline]
    pub fn final_credit(&self) -> Money {
        Money::from_cents(self.final_credit_cents)
    }

    pub fn is_expired_at(&self, as_of: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= as_of)
    }

    /// The rejection a redemption of this card gets at `as_of`, if any.
    ///
    /// Checked in this order: redeemed, expired (status or date), void,
    /// not yet active or deactivated.
    pub fn check_redeemable(&self, as_of: DateTime<Utc>) -> Result<(), WalletError> {
        match self.status {
            GiftCardStatus::Redeemed => Err(WalletError::AlreadyRedeemed(self.code.clone())),
            GiftCardStatus::Expired => Err(WalletError::Expired(self.code.clone())),
            _ if self.is_expired_at(as_of) => Err(WalletError::Expired(self.code.clone())),
            GiftCardStatus::Void => Err(WalletError::Void(self.code.clone())),
            GiftCardStatus::Created | GiftCardStatus::Inactive => {
                Err(WalletError::Inactive(self.code.clone()))
            }
            GiftCardStatus::Active => Ok(()),
        }
    }
}

/// Input for issuing a single gift card.
#[derive(Debug, Clone)]
pub struct NewGiftCard {
    pub code: String,
    pub original_value: Money,
    pub base_value: Money,
    pub bonus_value: Money,
    pub currency: String,
    pub batch_id: Option<String>,
    pub promo_rule_id: Option<i64>,
    pub category: Option<String>,
    pub validity_days: Option<i64>,
    pub status: GiftCardStatus,
    pub issued_to: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// A bulk issuance of gift cards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct GiftCardBatch {
    pub id: String,
    pub name: String,
    pub batch_code: String,
    pub quantity: i64,
    pub original_value_cents: i64,
    pub promo_rule_id: Option<i64>,
    pub final_credit_cents: i64,
    pub expires_at: Option<DateTime<Utc>>,
    pub status: BatchStatus,
    /// Free-form JSON object.
    pub metadata: String,
    pub created_at: DateTime<Utc>,
}

/// Derived, read-only aggregates over a batch's cards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub total_cards: i64,
    pub redeemed_cards: i64,
    pub total_redeemed_cents: i64,
    /// Redeemed / total in basis points (0 for an empty batch).
    pub redemption_rate_bps: i64,
}

impl BatchStats {
    pub fn new(total_cards: i64, redeemed_cards: i64, total_redeemed_cents: i64) -> Self {
        let redemption_rate_bps = if total_cards == 0 {
            0
        } else {
            redeemed_cards * 10_000 / total_cards
        };
        BatchStats {
            total_cards,
            redeemed_cards,
            total_redeemed_cents,
            redemption_rate_bps,
        }
    }
}

// =============================================================================
// Promo Rules
// =============================================================================

/// Structured predicate data of a promo rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoConditions {
    /// Matched by `category` rules.
    #[serde(default)]
    pub categories: Vec<String>,
    /// Matched by `user_segment` rules.
    #[serde(default)]
    pub segments: Vec<String>,
    /// Minimum base amount for any rule type.
    #[serde(default)]
    pub min_amount_cents: Option<i64>,
}

/// A configured multiplier applied to credited amounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromoRule {
    pub id: i64,
    pub name: String,
    pub rule_type: PromoRuleType,
    pub multiplier: Multiplier,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub conditions: PromoConditions,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a promo rule.
#[derive(Debug, Clone)]
pub struct NewPromoRule {
    pub name: String,
    pub rule_type: PromoRuleType,
    pub multiplier: Multiplier,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub conditions: PromoConditions,
    pub is_active: bool,
}

// =============================================================================
// One-time Codes
// =============================================================================

/// A stored one-time code. Only the argon2 hash of the code is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OtpCode {
    pub id: String,
    pub user_id: i64,
    pub gift_card_id: String,
    pub purpose: String,
    pub code_hash: String,
    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Caller Context
// =============================================================================

/// Identity of the wallet owner, supplied by the caller on every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: i64,
    pub kyc_tier: String,
    #[serde(default)]
    pub segments: Vec<String>,
}

impl UserContext {
    pub fn new(user_id: i64, kyc_tier: impl Into<String>) -> Self {
        UserContext {
            user_id,
            kyc_tier: kyc_tier.into(),
            segments: Vec::new(),
        }
    }

    pub fn with_segments(mut self, segments: &[&str]) -> Self {
        self.segments = segments.iter().map(|s| s.to_string()).collect();
        self
    }
}

/// What a debit is for; stored verbatim for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendContext {
    pub transaction_type: TransactionType,
    pub ref_type: Option<String>,
    pub ref_id: Option<String>,
    pub description: Option<String>,
}

impl SpendContext {
    /// A purchase debit linked to an order.
    pub fn purchase(order_id: impl Into<String>) -> Self {
        SpendContext {
            transaction_type: TransactionType::Purchase,
            ref_type: Some("order".to_string()),
            ref_id: Some(order_id.into()),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// What a non-gift-card credit is for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditContext {
    pub transaction_type: TransactionType,
    pub source: LotSource,
    /// Overrides the default lot validity; `None` uses the configured default.
    pub expires_at: Option<DateTime<Utc>>,
    /// Never-expiring lot when true (ignores `expires_at`).
    #[serde(default)]
    pub non_expiring: bool,
    pub ref_type: Option<String>,
    pub ref_id: Option<String>,
    pub description: Option<String>,
}

impl CreditContext {
    /// A refund of an order back into the wallet.
    pub fn refund(order_id: impl Into<String>) -> Self {
        CreditContext {
            transaction_type: TransactionType::RefundCredit,
            source: LotSource::PurchaseRefund,
            expires_at: None,
            non_expiring: false,
            ref_type: Some("order".to_string()),
            ref_id: Some(order_id.into()),
            description: None,
        }
    }

    /// A manual administrator adjustment.
    pub fn admin_adjustment(description: impl Into<String>) -> Self {
        CreditContext {
            transaction_type: TransactionType::AdminAdjustment,
            source: LotSource::AdminAdjustment,
            expires_at: None,
            non_expiring: false,
            ref_type: None,
            ref_id: None,
            description: Some(description.into()),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn lot(remaining: i64, amount: i64, status: LotStatus) -> WalletLot {
        let now = Utc::now();
        WalletLot {
            id: new_id(),
            user_id: 1,
            amount_cents: amount,
            base_value_cents: amount,
            bonus_value_cents: 0,
            remaining_cents: remaining,
            currency: "AED".to_string(),
            status,
            source: LotSource::GiftCard,
            expires_at: None,
            gift_card_id: None,
            ref_type: None,
            ref_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_multiplier_display() {
        assert_eq!(Multiplier::from_bps(11_000).to_string(), "1.10x");
        assert_eq!(Multiplier::ONE.to_string(), "1.00x");
        assert_eq!(Multiplier::default(), Multiplier::ONE);
    }

    #[test]
    fn test_lot_expiry_and_spendable() {
        let now = Utc::now();
        let mut l = lot(5000, 5000, LotStatus::Active);
        assert!(l.is_spendable_at(now));

        l.expires_at = Some(now - Duration::days(1));
        assert!(l.is_expired_at(now));
        assert!(!l.is_spendable_at(now));

        l.expires_at = Some(now + Duration::days(1));
        l.status = LotStatus::Frozen;
        assert!(!l.is_spendable_at(now));
    }

    #[test]
    fn test_lot_invariants() {
        assert!(lot(10, 100, LotStatus::Active).check_invariants().is_ok());
        assert!(lot(-1, 100, LotStatus::Active).check_invariants().is_err());
        assert!(lot(101, 100, LotStatus::Active).check_invariants().is_err());
        assert!(lot(5, 100, LotStatus::Exhausted).check_invariants().is_err());
    }

    #[test]
    fn test_transaction_type_groups() {
        assert!(TransactionType::Purchase.is_debit_type());
        assert!(!TransactionType::GiftCardRedeem.is_debit_type());
        assert!(TransactionType::RefundCredit.is_external_credit_type());
        assert!(!TransactionType::GiftCardRedeem.is_external_credit_type());
    }

    #[test]
    fn test_enum_text() {
        assert_eq!(TransactionType::GiftCardRedeem.as_str(), "gift_card_redeem");
        assert_eq!(PromoRuleType::UserSegment.to_string(), "user_segment");
        assert!(GiftCardStatus::Redeemed.is_terminal());
        assert!(!GiftCardStatus::Inactive.is_terminal());
    }

    #[test]
    fn test_gift_card_transitions() {
        use GiftCardStatus::*;
        assert!(Created.can_transition_to(Active));
        assert!(Inactive.can_transition_to(Active));
        assert!(Active.can_transition_to(Redeemed));
        assert!(!Created.can_transition_to(Redeemed));
        assert!(!Redeemed.can_transition_to(Void));
        assert!(!Void.can_transition_to(Active));
    }

    #[test]
    fn test_batch_stats_rate() {
        let stats = BatchStats::new(8, 2, 20_000);
        assert_eq!(stats.redemption_rate_bps, 2_500);
        assert_eq!(BatchStats::new(0, 0, 0).redemption_rate_bps, 0);
    }
}
