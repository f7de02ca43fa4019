//! End-to-end wallet flows against an in-memory database.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::{Arc, Mutex};

use wallet_core::{
    CreditContext, GiftCardStatus, LotSource, LotStatus, Money, Multiplier, NewGiftCard, NewLot,
    NewPromoRule, PromoConditions, PromoRuleType, SpendContext, TransactionType, UserContext,
    WalletError,
};
use wallet_db::{Database, DbConfig};
use wallet_engine::{
    BatchRequest, CardRequest, EngineError, EngineResult, OtpSender, TierLimitKyc, Wallet,
    WalletConfig,
};

// =============================================================================
// Helpers
// =============================================================================

async fn wallet_with(config: WalletConfig) -> Wallet {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    Wallet::new(db, config)
}

async fn wallet() -> Wallet {
    wallet_with(WalletConfig::default()).await
}

fn user(id: i64) -> UserContext {
    UserContext::new(id, "verified")
}

async fn active_card(wallet: &Wallet, code: &str, cents: i64) {
    let mut req = CardRequest::new(Money::from_cents(cents), "AED");
    req.code = Some(code.to_string());
    req.activate = true;
    wallet.gift_cards().issue_card(req).await.unwrap();
}

async fn credit_expiring(wallet: &Wallet, user_id: i64, cents: i64, days: i64) -> String {
    let mut ctx = CreditContext::refund(format!("order-{}", cents));
    ctx.expires_at = Some(Utc::now() + Duration::days(days));
    wallet
        .credit(&user(user_id), Money::from_cents(cents), ctx)
        .await
        .unwrap()
        .lot
        .id
}

fn wallet_err(result: EngineResult<impl std::fmt::Debug>) -> WalletError {
    match result {
        Err(EngineError::Wallet(err)) => err,
        other => panic!("expected a wallet error, got {:?}", other),
    }
}

#[derive(Default)]
struct RecordingSender {
    codes: Mutex<Vec<String>>,
}

#[async_trait]
impl OtpSender for RecordingSender {
    async fn send_otp(&self, _user: &UserContext, _purpose: &str, code: &str) -> EngineResult<()> {
        self.codes.lock().unwrap().push(code.to_string());
        Ok(())
    }
}

// =============================================================================
// Redemption
// =============================================================================

#[tokio::test]
async fn test_g100_redeem_then_purchase() {
    let wallet = wallet().await;
    let mut req = CardRequest::new(Money::from_cents(10_000), "AED");
    req.code = Some("G100".to_string());
    req.expires_at = Some(Utc::now() + Duration::days(90));
    req.activate = true;
    wallet.gift_cards().issue_card(req).await.unwrap();

    let redeemed = wallet.redeem(&user(7), "G100", None).await.unwrap();
    assert_eq!(redeemed.final_credit.cents(), 10_000);
    assert_eq!(redeemed.lot.remaining_cents, 10_000);
    assert_eq!(redeemed.lot.source, LotSource::GiftCard);
    assert_eq!(redeemed.balance_after.cents(), 10_000);

    let history = wallet.db().ledger().history(7).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].transaction_type, TransactionType::GiftCardRedeem);
    assert_eq!(history[0].amount_cents, 10_000);
    assert_eq!(wallet.available_balance(7).await.unwrap().cents(), 10_000);

    let spent = wallet
        .deduct(&user(7), Money::from_cents(4_000), SpendContext::purchase("order-1"))
        .await
        .unwrap();
    assert_eq!(spent.entries.len(), 1);
    assert_eq!(spent.balance_after.cents(), 6_000);

    let lot = wallet.db().lots().get_by_id(&redeemed.lot.id).await.unwrap().unwrap();
    assert_eq!(lot.remaining_cents, 6_000);

    let history = wallet.db().ledger().history(7).await.unwrap();
    assert_eq!(history.len(), 2);
    let debit = history.iter().find(|t| t.transaction_type == TransactionType::Purchase).unwrap();
    assert_eq!(debit.amount_cents, 4_000);
    assert_eq!(debit.lot_id.as_deref(), Some(lot.id.as_str()));
    assert_eq!(wallet.available_balance(7).await.unwrap().cents(), 6_000);

    let card = wallet.gift_cards().get_card("g100").await.unwrap();
    assert_eq!(card.status, GiftCardStatus::Redeemed);
    assert_eq!(card.redeemed_by, Some(7));
}

#[tokio::test]
async fn test_second_redemption_is_rejected() {
    let wallet = wallet().await;
    active_card(&wallet, "ONCE-0001", 5_000).await;

    wallet.redeem(&user(1), "ONCE-0001", None).await.unwrap();
    let err = wallet_err(wallet.redeem(&user(1), "once-0001", None).await);
    assert!(matches!(err, WalletError::AlreadyRedeemed(_)));

    // Another user can't take it either
    let err = wallet_err(wallet.redeem(&user(2), "ONCE-0001", None).await);
    assert!(matches!(err, WalletError::AlreadyRedeemed(_)));

    assert_eq!(wallet.available_balance(1).await.unwrap().cents(), 5_000);
    assert_eq!(wallet.available_balance(2).await.unwrap().cents(), 0);
    assert_eq!(wallet.db().ledger().history(1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_redeem_rejections_by_card_state() {
    let wallet = wallet().await;

    let err = wallet_err(wallet.redeem(&user(1), "NOPE-0000", None).await);
    assert!(matches!(err, WalletError::NotFound { .. }));

    // A string that cannot be a code names no card
    let err = wallet_err(wallet.redeem(&user(1), "x", None).await);
    assert!(matches!(err, WalletError::NotFound { ref id, .. } if id == "x"));
    let err = wallet_err(wallet.redemption().request_otp(&user(1), " bad code! ").await);
    assert!(matches!(err, WalletError::NotFound { .. }));

    let mut req = CardRequest::new(Money::from_cents(1_000), "AED");
    req.code = Some("NEW-0001".to_string());
    wallet.gift_cards().issue_card(req).await.unwrap();
    let err = wallet_err(wallet.redeem(&user(1), "NEW-0001", None).await);
    assert!(matches!(err, WalletError::Inactive(_)));

    active_card(&wallet, "VOID-0001", 1_000).await;
    wallet.gift_cards().void_card("VOID-0001").await.unwrap();
    let err = wallet_err(wallet.redeem(&user(1), "VOID-0001", None).await);
    assert!(matches!(err, WalletError::Void(_)));

    assert_eq!(wallet.available_balance(1).await.unwrap().cents(), 0);
}

#[tokio::test]
async fn test_foreign_currency_card_never_reaches_the_balance() {
    let wallet = wallet().await;

    let mut req = CardRequest::new(Money::from_cents(10_000), "USD");
    req.code = Some("USD-0001".to_string());
    req.activate = true;
    let err = wallet_err(wallet.gift_cards().issue_card(req).await);
    assert!(matches!(err, WalletError::CurrencyMismatch { ref expected, ref found }
        if expected == "AED" && found == "USD"));

    // A card written before the wallet's currency was pinned
    wallet
        .db()
        .gift_cards()
        .insert(NewGiftCard {
            code: "USD-0002".to_string(),
            original_value: Money::from_cents(10_000),
            base_value: Money::from_cents(10_000),
            bonus_value: Money::zero(),
            currency: "USD".to_string(),
            batch_id: None,
            promo_rule_id: None,
            category: None,
            validity_days: None,
            status: GiftCardStatus::Active,
            issued_to: None,
            expires_at: None,
        })
        .await
        .unwrap();
    credit_expiring(&wallet, 3, 5_000, 30).await;

    let err = wallet_err(wallet.redeem(&user(3), "USD-0002", None).await);
    assert!(matches!(err, WalletError::CurrencyMismatch { .. }));
    let err = wallet_err(wallet.redemption().request_otp(&user(3), "USD-0002").await);
    assert!(matches!(err, WalletError::CurrencyMismatch { .. }));

    assert_eq!(wallet.available_balance(3).await.unwrap().cents(), 5_000);
    let lots = wallet.db().lots().list_for_user(3).await.unwrap();
    assert_eq!(lots.len(), 1);
    assert!(lots.iter().all(|lot| lot.currency == "AED"));
    let card = wallet.gift_cards().get_card("USD-0002").await.unwrap();
    assert_eq!(card.status, GiftCardStatus::Active);

    let err = wallet_err(
        wallet
            .deduct(&user(3), Money::from_cents(12_000), SpendContext::purchase("order-3"))
            .await,
    );
    assert!(matches!(err, WalletError::InsufficientFunds { available_cents: 5_000, .. }));
}

#[tokio::test]
async fn test_promo_bonus_rounds_once() {
    let wallet = wallet().await;
    let rule = wallet
        .promos()
        .create_rule(NewPromoRule {
            name: "Ten percent".to_string(),
            rule_type: PromoRuleType::Global,
            multiplier: Multiplier::from_bps(11_000),
            start_date: None,
            end_date: None,
            conditions: PromoConditions::default(),
            is_active: true,
        })
        .await
        .unwrap();

    let quote = wallet.promos().quote_amount(Money::from_cents(3_333)).await.unwrap();
    assert_eq!(quote.bonus.cents(), 333);
    assert_eq!(quote.final_credit.cents(), 3_666);

    active_card(&wallet, "PROMO-3333", 3_333).await;
    let redeemed = wallet.redeem(&user(3), "PROMO-3333", None).await.unwrap();
    assert_eq!(redeemed.bonus_value.cents(), 333);
    assert_eq!(redeemed.final_credit.cents(), 3_666);
    assert_eq!(redeemed.promo_rule_id, Some(rule.id));
    assert_eq!(redeemed.lot.bonus_value_cents, 333);
    assert_eq!(redeemed.transaction.bonus_value_cents, Some(333));
}

#[tokio::test]
async fn test_bulk_redeem_keeps_going_after_failures() {
    let wallet = wallet().await;
    active_card(&wallet, "BULK-0001", 1_000).await;
    active_card(&wallet, "BULK-0002", 2_000).await;

    let codes = vec![
        "BULK-0001".to_string(),
        "MISSING-01".to_string(),
        "BULK-0002".to_string(),
        "BULK-0001".to_string(),
    ];
    let items = wallet.redemption().bulk_redeem(&user(4), &codes).await;

    let ok: Vec<bool> = items.iter().map(|item| item.is_success()).collect();
    assert_eq!(ok, vec![true, false, true, false]);
    assert!(matches!(
        items[1].outcome.as_ref().unwrap_err().wallet_error(),
        Some(WalletError::NotFound { .. })
    ));
    assert_eq!(wallet.available_balance(4).await.unwrap().cents(), 3_000);
}

#[tokio::test]
async fn test_batch_cards_redeem_and_show_in_stats() {
    let wallet = wallet().await;
    let batch = wallet
        .gift_cards()
        .create_batch(BatchRequest {
            name: "Corporate".to_string(),
            batch_code: "CORP".to_string(),
            quantity: 3,
            value: Money::from_cents(2_500),
            currency: "AED".to_string(),
            promo_rule_id: None,
            category: None,
            validity_days: Some(60),
            expires_at: None,
            metadata: serde_json::json!({}),
        })
        .await
        .unwrap();

    let cards = wallet.db().gift_cards().list_by_batch(&batch.id).await.unwrap();
    let err = wallet_err(wallet.redeem(&user(5), &cards[0].code, None).await);
    assert!(matches!(err, WalletError::Inactive(_)));

    wallet.gift_cards().activate_batch(&batch.id).await.unwrap();
    let redeemed = wallet.redeem(&user(5), &cards[0].code, None).await.unwrap();

    let expires_at = redeemed.lot.expires_at.unwrap();
    let days = (expires_at - Utc::now()).num_days();
    assert!((59..=60).contains(&days));

    let stats = wallet.gift_cards().batch_stats(&batch.id).await.unwrap();
    assert_eq!(stats.total_cards, 3);
    assert_eq!(stats.redeemed_cards, 1);
    assert_eq!(stats.total_redeemed_cents, 2_500);
    assert_eq!(stats.redemption_rate_bps, 3_333);
}

// =============================================================================
// One-time codes
// =============================================================================

#[tokio::test]
async fn test_large_redemption_needs_one_time_code() {
    let mut config = WalletConfig::default();
    config.otp.amount_threshold_cents = 5_000;
    let sender = Arc::new(RecordingSender::default());
    let kyc = Arc::new(TierLimitKyc::new(config.kyc_tier_limits.clone()));
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let wallet = Wallet::with_collaborators(db, config, kyc, sender.clone());

    active_card(&wallet, "BIG-0001", 10_000).await;

    let err = wallet_err(wallet.redeem(&user(8), "BIG-0001", None).await);
    assert!(matches!(err, WalletError::OtpRequired { threshold_cents: 5_000 }));
    assert!(err.is_recoverable());

    // Nothing was issued yet
    let err = wallet_err(wallet.redeem(&user(8), "BIG-0001", Some("123456")).await);
    assert_eq!(err, WalletError::InvalidOtp);

    wallet.redemption().request_otp(&user(8), "BIG-0001").await.unwrap();
    let code = sender.codes.lock().unwrap().last().cloned().unwrap();
    assert_eq!(code.len(), 6);

    // A code is bound to the user it was issued to
    let err = wallet_err(wallet.redeem(&user(9), "BIG-0001", Some(&code)).await);
    assert_eq!(err, WalletError::InvalidOtp);

    let redeemed = wallet.redeem(&user(8), "BIG-0001", Some(&code)).await.unwrap();
    assert_eq!(redeemed.final_credit.cents(), 10_000);

    let err = wallet_err(wallet.redemption().request_otp(&user(8), "BIG-0001").await);
    assert!(matches!(err, WalletError::AlreadyRedeemed(_)));
}

#[tokio::test]
async fn test_frozen_wallet_is_rejected_before_one_time_code() {
    let mut config = WalletConfig::default();
    config.otp.amount_threshold_cents = 5_000;
    let wallet = wallet_with(config).await;
    active_card(&wallet, "BIG-0002", 10_000).await;

    wallet.guard().freeze(8, "review").await.unwrap();
    let err = wallet_err(wallet.redeem(&user(8), "BIG-0002", None).await);
    assert!(matches!(err, WalletError::WalletFrozen { user_id: 8, .. }));
    let card = wallet.gift_cards().get_card("BIG-0002").await.unwrap();
    assert_eq!(card.status, GiftCardStatus::Active);
}

#[tokio::test]
async fn test_daily_limit_is_rejected_before_one_time_code() {
    let mut config = WalletConfig::default();
    config.otp.amount_threshold_cents = 5_000;
    config.velocity.max_daily_redemptions = 1;
    let wallet = wallet_with(config).await;
    active_card(&wallet, "SMALL-001", 1_000).await;
    active_card(&wallet, "BIG-0003", 10_000).await;

    wallet.redeem(&user(8), "SMALL-001", None).await.unwrap();
    let err = wallet_err(wallet.redeem(&user(8), "BIG-0003", None).await);
    assert!(matches!(err, WalletError::RateLimited { .. }));
}

#[tokio::test]
async fn test_code_survives_rejected_redemption_only() {
    let mut config = WalletConfig::default();
    config.otp.amount_threshold_cents = 0;
    let sender = Arc::new(RecordingSender::default());
    let kyc = Arc::new(TierLimitKyc::new(config.kyc_tier_limits.clone()));
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let wallet = Wallet::with_collaborators(db, config, kyc, sender.clone());

    active_card(&wallet, "REUSE-001", 1_000).await;
    wallet.redemption().request_otp(&user(1), "REUSE-001").await.unwrap();
    let code = sender.codes.lock().unwrap().last().cloned().unwrap();

    // A rejected redemption leaves the code usable
    wallet.guard().freeze(1, "review").await.unwrap();
    let err = wallet_err(wallet.redeem(&user(1), "REUSE-001", Some(&code)).await);
    assert!(matches!(err, WalletError::WalletFrozen { .. }));
    wallet.guard().unfreeze(1).await.unwrap();

    wallet.redeem(&user(1), "REUSE-001", Some(&code)).await.unwrap();

    // Codes are bound to the card they were issued for
    active_card(&wallet, "REUSE-002", 1_000).await;
    let err = wallet_err(wallet.redeem(&user(1), "REUSE-002", Some(&code)).await);
    assert_eq!(err, WalletError::InvalidOtp);
}

// =============================================================================
// Deduction
// =============================================================================

#[tokio::test]
async fn test_soonest_expiring_lot_is_consumed_first() {
    let wallet = wallet().await;
    let later = credit_expiring(&wallet, 1, 2_000, 30).await;
    let sooner = credit_expiring(&wallet, 1, 1_000, 1).await;

    let preview = wallet
        .deduction()
        .preview_deduction(1, Money::from_cents(1_500))
        .await
        .unwrap();
    assert_eq!(preview.draws[0].lot_id, sooner);
    assert_eq!(preview.resulting_balance.cents(), 1_500);
    // Preview writes nothing
    assert_eq!(wallet.available_balance(1).await.unwrap().cents(), 3_000);

    let result = wallet
        .deduct(&user(1), Money::from_cents(1_500), SpendContext::purchase("order-9"))
        .await
        .unwrap();
    let taken: Vec<i64> = result.entries.iter().map(|e| e.amount_cents).collect();
    assert_eq!(taken, vec![1_000, 500]);

    let sooner = wallet.db().lots().get_by_id(&sooner).await.unwrap().unwrap();
    let later = wallet.db().lots().get_by_id(&later).await.unwrap().unwrap();
    assert_eq!(sooner.remaining_cents, 0);
    assert_eq!(sooner.status, LotStatus::Exhausted);
    assert_eq!(later.remaining_cents, 1_500);
}

#[tokio::test]
async fn test_expired_lot_contributes_nothing() {
    let wallet = wallet().await;
    credit_expiring(&wallet, 2, 1_000, 10).await;

    let mut tx = wallet.db().begin().await.unwrap();
    wallet
        .db()
        .lots()
        .create_lot(
            &mut tx,
            NewLot {
                user_id: 2,
                amount: Money::from_cents(5_000),
                base_value: Money::from_cents(5_000),
                bonus_value: Money::zero(),
                currency: "AED".to_string(),
                source: LotSource::AdminAdjustment,
                expires_at: Some(Utc::now() - Duration::days(1)),
                gift_card_id: None,
                ref_type: None,
                ref_id: None,
            },
        )
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(wallet.available_balance(2).await.unwrap().cents(), 1_000);

    let err = wallet_err(
        wallet
            .deduct(&user(2), Money::from_cents(2_000), SpendContext::purchase("order-2"))
            .await,
    );
    assert!(matches!(err, WalletError::InsufficientFunds { available_cents: 1_000, .. }));

    let sweep = wallet.gift_cards().sweep_expired(Utc::now()).await.unwrap();
    assert_eq!(sweep.lots_expired, 1);
    assert_eq!(wallet.available_balance(2).await.unwrap().cents(), 1_000);
}

#[tokio::test]
async fn test_failed_deduction_changes_nothing() {
    let wallet = wallet().await;
    credit_expiring(&wallet, 3, 5_000, 30).await;

    let lots_before = wallet.db().lots().list_for_user(3).await.unwrap();
    let history_before = wallet.db().ledger().history(3).await.unwrap();

    let err = wallet_err(
        wallet
            .deduct(&user(3), Money::from_cents(8_000), SpendContext::purchase("order-3"))
            .await,
    );
    assert!(matches!(
        err,
        WalletError::InsufficientFunds {
            available_cents: 5_000,
            requested_cents: 8_000
        }
    ));

    assert_eq!(wallet.db().lots().list_for_user(3).await.unwrap(), lots_before);
    assert_eq!(wallet.db().ledger().history(3).await.unwrap(), history_before);

    let err = wallet_err(
        wallet
            .deduct(&user(3), Money::zero(), SpendContext::purchase("order-3"))
            .await,
    );
    assert!(matches!(err, WalletError::InvalidAmount { .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_deductions_never_double_spend() {
    let wallet = wallet().await;
    credit_expiring(&wallet, 4, 10_000, 30).await;

    let first = {
        let wallet = wallet.clone();
        tokio::spawn(async move {
            wallet
                .deduct(&user(4), Money::from_cents(6_000), SpendContext::purchase("a"))
                .await
        })
    };
    let second = {
        let wallet = wallet.clone();
        tokio::spawn(async move {
            wallet
                .deduct(&user(4), Money::from_cents(6_000), SpendContext::purchase("b"))
                .await
        })
    };

    let outcomes = vec![first.await.unwrap(), second.await.unwrap()];
    assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);
    let failure = outcomes.into_iter().find_map(|o| o.err()).unwrap();
    assert!(matches!(
        failure.wallet_error(),
        Some(WalletError::InsufficientFunds { .. })
    ));

    assert_eq!(wallet.available_balance(4).await.unwrap().cents(), 4_000);
}

#[tokio::test]
async fn test_busy_when_lock_is_held() {
    let mut config = WalletConfig::default();
    config.lock_timeout_ms = 50;
    let wallet = wallet_with(config).await;

    let _held = wallet.locks().acquire(6).await.unwrap();
    let err = wallet_err(
        wallet
            .deduct(&user(6), Money::from_cents(100), SpendContext::purchase("order-6"))
            .await,
    );
    assert_eq!(err, WalletError::Busy { user_id: 6 });
    assert!(err.is_recoverable());
}

// =============================================================================
// Guard and KYC
// =============================================================================

#[tokio::test]
async fn test_frozen_wallet_rejects_everything() {
    let wallet = wallet().await;
    credit_expiring(&wallet, 7, 5_000, 30).await;
    active_card(&wallet, "FROZEN-01", 1_000).await;

    wallet.guard().freeze(7, "chargeback").await.unwrap();
    wallet.guard().freeze(7, "chargeback").await.unwrap();
    assert!(wallet.guard().is_frozen(7).await.unwrap());

    let err = wallet_err(
        wallet
            .deduct(&user(7), Money::from_cents(100), SpendContext::purchase("order-7"))
            .await,
    );
    assert!(matches!(err, WalletError::WalletFrozen { user_id: 7, .. }));

    let err = wallet_err(wallet.redeem(&user(7), "FROZEN-01", None).await);
    assert!(matches!(err, WalletError::WalletFrozen { .. }));
    let card = wallet.gift_cards().get_card("FROZEN-01").await.unwrap();
    assert_eq!(card.status, GiftCardStatus::Active);

    let err = wallet_err(
        wallet
            .credit(&user(7), Money::from_cents(100), CreditContext::admin_adjustment("goodwill"))
            .await,
    );
    assert!(matches!(err, WalletError::WalletFrozen { .. }));

    wallet.guard().unfreeze(7).await.unwrap();
    assert!(!wallet.guard().is_frozen(7).await.unwrap());
    wallet
        .deduct(&user(7), Money::from_cents(100), SpendContext::purchase("order-7"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_kyc_tier_caps_debits() {
    let wallet = wallet().await;
    let basic = UserContext::new(8, "basic");
    wallet
        .credit(&basic, Money::from_cents(300_000), CreditContext::admin_adjustment("opening"))
        .await
        .unwrap();

    let err = wallet_err(
        wallet
            .deduct(&basic, Money::from_cents(250_000), SpendContext::purchase("order-8"))
            .await,
    );
    assert!(matches!(err, WalletError::KycRequired { user_id: 8, amount_cents: 250_000 }));

    wallet
        .deduct(&basic, Money::from_cents(150_000), SpendContext::purchase("order-8"))
        .await
        .unwrap();

    let unknown = UserContext::new(8, "unverified");
    let err = wallet_err(
        wallet
            .deduct(&unknown, Money::from_cents(100), SpendContext::purchase("order-8"))
            .await,
    );
    assert!(matches!(err, WalletError::KycRequired { .. }));
}

#[tokio::test]
async fn test_daily_redemption_limit() {
    let mut config = WalletConfig::default();
    config.velocity.max_daily_redemptions = 2;
    let wallet = wallet_with(config).await;
    for code in ["DAY-0001", "DAY-0002", "DAY-0003"] {
        active_card(&wallet, code, 1_000).await;
    }

    wallet.redeem(&user(9), "DAY-0001", None).await.unwrap();
    wallet.redeem(&user(9), "DAY-0002", None).await.unwrap();
    let err = wallet_err(wallet.redeem(&user(9), "DAY-0003", None).await);
    assert!(matches!(err, WalletError::RateLimited { .. }));

    let card = wallet.gift_cards().get_card("DAY-0003").await.unwrap();
    assert_eq!(card.status, GiftCardStatus::Active);
    assert_eq!(wallet.guard().freeze_state(9).await.unwrap().daily_redemption_count, 2);

    // The limit is per user
    wallet.redeem(&user(10), "DAY-0003", None).await.unwrap();
}

#[tokio::test]
async fn test_hourly_spend_limit() {
    let mut config = WalletConfig::default();
    config.velocity.max_hourly_spend_cents = 5_000;
    let wallet = wallet_with(config).await;
    credit_expiring(&wallet, 11, 10_000, 30).await;

    wallet
        .deduct(&user(11), Money::from_cents(4_000), SpendContext::purchase("h-1"))
        .await
        .unwrap();
    let err = wallet_err(
        wallet
            .deduct(&user(11), Money::from_cents(2_000), SpendContext::purchase("h-2"))
            .await,
    );
    assert!(matches!(err, WalletError::RateLimited { .. }));
    assert_eq!(wallet.available_balance(11).await.unwrap().cents(), 6_000);

    wallet
        .deduct(&user(11), Money::from_cents(1_000), SpendContext::purchase("h-3"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_auto_freeze_after_heavy_spending() {
    let mut config = WalletConfig::default();
    config.velocity.auto_freeze_threshold_cents = 3_000;
    let wallet = wallet_with(config).await;
    credit_expiring(&wallet, 12, 10_000, 30).await;

    wallet
        .deduct(&user(12), Money::from_cents(4_000), SpendContext::purchase("big"))
        .await
        .unwrap();

    let state = wallet.guard().freeze_state(12).await.unwrap();
    assert!(state.auto_frozen);
    assert!(!state.manually_frozen);

    // Unfreeze lifts manual freezes only
    wallet.guard().unfreeze(12).await.unwrap();
    let err = wallet_err(
        wallet
            .deduct(&user(12), Money::from_cents(100), SpendContext::purchase("small"))
            .await,
    );
    assert!(matches!(err, WalletError::WalletFrozen { .. }));
}

// =============================================================================
// Reconciliation
// =============================================================================

#[tokio::test]
async fn test_lots_reconcile_with_ledger() {
    let wallet = wallet().await;
    active_card(&wallet, "REC-0001", 10_000).await;
    wallet.redeem(&user(13), "REC-0001", None).await.unwrap();
    credit_expiring(&wallet, 13, 2_500, 5).await;

    wallet
        .deduct(&user(13), Money::from_cents(3_000), SpendContext::purchase("r-1"))
        .await
        .unwrap();
    wallet
        .deduct(&user(13), Money::from_cents(1_250), SpendContext::purchase("r-2"))
        .await
        .unwrap();

    let report = wallet.balance().reconcile(13).await.unwrap();
    assert_eq!(report.lot_remaining_cents, 8_250);
    assert_eq!(report.ledger_net_cents, report.lot_remaining_cents);
    assert!(report.mismatched_lot_ids.is_empty());

    let breakdown = wallet.balance().breakdown(13).await.unwrap();
    assert_eq!(breakdown.total.cents(), 8_250);
    assert_eq!(breakdown.lots.len(), 1);
}
