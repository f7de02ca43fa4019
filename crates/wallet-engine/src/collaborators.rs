//! # External Collaborators
//!
//! The engines consult KYC and hand one-time codes to a sender through
//! these traits. Defaults are provided for standalone use and tests.

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{debug, info};

use wallet_core::{Money, UserContext, WalletError};

use crate::error::EngineResult;

// =============================================================================
// KYC Gate
// =============================================================================

/// Decides whether a user's verification level allows a debit.
#[async_trait]
pub trait KycGate: Send + Sync {
    /// Fails with `KycRequired` when `amount` is above what the user's tier allows.
    async fn block_if_kyc_required(&self, user: &UserContext, amount: Money) -> Result<(), WalletError>;
}

/// Compares the amount with a per-tier cap. Unknown tiers may move nothing.
#[derive(Debug, Clone, Default)]
pub struct TierLimitKyc {
    limits: HashMap<String, i64>,
}

impl TierLimitKyc {
    pub fn new(limits: HashMap<String, i64>) -> Self {
        TierLimitKyc { limits }
    }
}

#[async_trait]
impl KycGate for TierLimitKyc {
    async fn block_if_kyc_required(&self, user: &UserContext, amount: Money) -> Result<(), WalletError> {
        match self.limits.get(&user.kyc_tier) {
            Some(limit) if amount.cents() <= *limit => Ok(()),
            _ => {
                debug!(user_id = user.user_id, tier = %user.kyc_tier, amount = %amount, "KYC limit exceeded");
                Err(WalletError::KycRequired {
                    user_id: user.user_id,
                    amount_cents: amount.cents(),
                })
            }
        }
    }
}

// =============================================================================
// OTP Sender
// =============================================================================

/// Delivers a one-time code to the user (SMS, e-mail, push).
#[async_trait]
pub trait OtpSender: Send + Sync {
    async fn send_otp(&self, user: &UserContext, purpose: &str, code: &str) -> EngineResult<()>;
}

/// Writes codes to the log. For development.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogOtpSender;

#[async_trait]
impl OtpSender for LogOtpSender {
    async fn send_otp(&self, user: &UserContext, purpose: &str, code: &str) -> EngineResult<()> {
        info!(user_id = user.user_id, purpose, "One-time code issued");
        debug!(user_id = user.user_id, purpose, code, "One-time code (log delivery)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tier_limits() {
        let kyc = TierLimitKyc::new(HashMap::from([("basic".to_string(), 10_000)]));
        let basic = UserContext::new(1, "basic");
        let unknown = UserContext::new(2, "none");

        assert!(kyc
            .block_if_kyc_required(&basic, Money::from_cents(10_000))
            .await
            .is_ok());
        assert_eq!(
            kyc.block_if_kyc_required(&basic, Money::from_cents(10_001))
                .await
                .unwrap_err(),
            WalletError::KycRequired {
                user_id: 1,
                amount_cents: 10_001
            }
        );
        assert!(kyc
            .block_if_kyc_required(&unknown, Money::from_cents(1))
            .await
            .is_err());
    }
}
