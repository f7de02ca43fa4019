//! # Wallet
//!
//! Entry point that wires the engines to one database, one lock registry
//! and one configuration. Cloning is cheap: every clone shares them.
//!
//! ```text
//! Wallet
//!  ├── redemption()  gift card → lot + credit
//!  ├── deduction()   spend, soonest-expiring lots first
//!  ├── credit()      refunds, adjustments, promo credits
//!  ├── balance()     balances, breakdowns, ledger pages, reconciliation
//!  ├── guard()       freeze / unfreeze / velocity counters
//!  ├── promos()      promo rule administration
//!  └── gift_cards()  card and batch administration, expiry sweep
//! ```

use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use wallet_core::{CreditContext, Money, SpendContext, UserContext};
use wallet_db::{Database, DbConfig};

use crate::balance::BalanceService;
use crate::collaborators::{KycGate, LogOtpSender, OtpSender, TierLimitKyc};
use crate::config::WalletConfig;
use crate::credit::{CreditEngine, CreditResult};
use crate::deduction::{DeductionEngine, DeductionResult};
use crate::error::EngineResult;
use crate::gift_cards::GiftCardAdmin;
use crate::guard::Guard;
use crate::locks::UserLocks;
use crate::otp::OtpService;
use crate::promo::PromoService;
use crate::redemption::{RedemptionEngine, RedemptionResult};

#[derive(Clone)]
pub struct Wallet {
    db: Database,
    config: Arc<WalletConfig>,
    locks: UserLocks,
    guard: Guard,
    redemption: RedemptionEngine,
    deduction: DeductionEngine,
    credit: CreditEngine,
    balance: BalanceService,
    promos: PromoService,
    gift_cards: GiftCardAdmin,
}

impl Wallet {
    /// Wallet with the tier-limit KYC gate and the logging OTP sender.
    pub fn new(db: Database, config: WalletConfig) -> Self {
        let kyc = Arc::new(TierLimitKyc::new(config.kyc_tier_limits.clone()));
        Self::with_collaborators(db, config, kyc, Arc::new(LogOtpSender))
    }

    pub fn with_collaborators(
        db: Database,
        config: WalletConfig,
        kyc: Arc<dyn KycGate>,
        otp_sender: Arc<dyn OtpSender>,
    ) -> Self {
        let config = Arc::new(config);
        let locks = UserLocks::new(config.lock_timeout());
        let guard = Guard::new(db.clone(), locks.clone(), config.velocity_limits());
        let otp = OtpService::new(db.clone(), otp_sender, config.otp.expiry_minutes);

        Wallet {
            redemption: RedemptionEngine::new(
                db.clone(),
                config.clone(),
                locks.clone(),
                guard.clone(),
                otp,
            ),
            deduction: DeductionEngine::new(db.clone(), locks.clone(), guard.clone(), kyc),
            credit: CreditEngine::new(db.clone(), config.clone(), locks.clone(), guard.clone()),
            balance: BalanceService::new(db.clone()),
            promos: PromoService::new(db.clone()),
            gift_cards: GiftCardAdmin::new(db.clone(), config.currency.clone()),
            db,
            config,
            locks,
            guard,
        }
    }

    /// Validates `config`, opens the database and runs migrations.
    pub async fn open(config: WalletConfig, db_config: DbConfig) -> EngineResult<Self> {
        config.validate()?;
        let db = Database::new(db_config).await?;
        info!(currency = %config.currency, "Wallet ready");
        Ok(Self::new(db, config))
    }

    // =========================================================================
    // Components
    // =========================================================================

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    pub fn locks(&self) -> &UserLocks {
        &self.locks
    }

    pub fn guard(&self) -> &Guard {
        &self.guard
    }

    pub fn redemption(&self) -> &RedemptionEngine {
        &self.redemption
    }

    pub fn deduction(&self) -> &DeductionEngine {
        &self.deduction
    }

    pub fn credits(&self) -> &CreditEngine {
        &self.credit
    }

    pub fn balance(&self) -> &BalanceService {
        &self.balance
    }

    pub fn promos(&self) -> &PromoService {
        &self.promos
    }

    pub fn gift_cards(&self) -> &GiftCardAdmin {
        &self.gift_cards
    }

    // =========================================================================
    // Shortcuts
    // =========================================================================

    pub async fn redeem(
        &self,
        user: &UserContext,
        code: &str,
        otp: Option<&str>,
    ) -> EngineResult<RedemptionResult> {
        self.redemption.redeem(user, code, otp).await
    }

    pub async fn deduct(
        &self,
        user: &UserContext,
        amount: Money,
        ctx: SpendContext,
    ) -> EngineResult<DeductionResult> {
        self.deduction.deduct(user, amount, ctx).await
    }

    pub async fn credit(
        &self,
        user: &UserContext,
        amount: Money,
        ctx: CreditContext,
    ) -> EngineResult<CreditResult> {
        self.credit.credit(user, amount, ctx).await
    }

    /// Spendable balance right now.
    pub async fn available_balance(&self, user_id: i64) -> EngineResult<Money> {
        self.balance.available_balance(user_id, Utc::now()).await
    }
}
