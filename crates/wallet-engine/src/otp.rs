//! # One-time Codes
//!
//! ```text
//! request_otp(user, card)                redeem(user, card, Some(code))
//!     │                                      │
//!     ├─ 6 random digits                     ├─ newest live row for (user, card)
//!     ├─ store argon2 hash, expiry           ├─ argon2 verify
//!     └─ OtpSender::send_otp                 └─ consume inside the redeem transaction
//! ```
//! Codes live `otp.expiry_minutes` and verify at most once. A failed
//! redemption rolls the consumption back with everything else.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, warn};

use wallet_core::validation::validate_otp_format;
use wallet_core::{UserContext, WalletError, OTP_CODE_LENGTH};
use wallet_db::{Database, SqliteConnection};

use crate::collaborators::OtpSender;
use crate::error::{EngineError, EngineResult};

/// Purpose recorded for codes guarding gift card redemption.
pub const REDEEM_PURPOSE: &str = "gift_card_redeem";

/// Draws a zero-padded numeric code.
pub fn generate_code() -> String {
    let upper = 10u32.pow(OTP_CODE_LENGTH as u32);
    let n = rand::thread_rng().gen_range(0..upper);
    format!("{:0width$}", n, width = OTP_CODE_LENGTH)
}

/// Hashes a code into a PHC string.
pub fn hash_code(code: &str) -> EngineResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(code.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| EngineError::Internal(format!("Failed to hash one-time code: {}", e)))
}

/// Checks a code against a stored PHC string.
pub fn verify_code(code: &str, hash: &str) -> bool {
    let parsed = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(code.as_bytes(), &parsed)
        .is_ok()
}

/// A code handed to the sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedOtp {
    pub gift_card_id: String,
    pub purpose: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies one-time codes.
#[derive(Clone)]
pub struct OtpService {
    db: Database,
    sender: Arc<dyn OtpSender>,
    expiry: Duration,
}

impl OtpService {
    pub fn new(db: Database, sender: Arc<dyn OtpSender>, expiry_minutes: i64) -> Self {
        OtpService {
            db,
            sender,
            expiry: Duration::minutes(expiry_minutes),
        }
    }

    /// Generates a code for `(user, gift_card_id, purpose)`, stores its
    /// hash and hands the clear code to the sender.
    pub async fn issue(
        &self,
        user: &UserContext,
        gift_card_id: &str,
        purpose: &str,
    ) -> EngineResult<IssuedOtp> {
        let code = generate_code();
        let hash = hash_code(&code)?;
        let expires_at = Utc::now() + self.expiry;

        self.db
            .otps()
            .insert(user.user_id, gift_card_id, purpose, &hash, expires_at)
            .await?;

        self.sender.send_otp(user, purpose, &code).await?;

        Ok(IssuedOtp {
            gift_card_id: gift_card_id.to_string(),
            purpose: purpose.to_string(),
            expires_at,
        })
    }

    /// Verifies `code` and marks it used inside the caller's unit of work.
    ///
    /// ## Errors
    /// - `InvalidOtp` when the code is malformed, wrong, expired or used
    pub async fn verify_and_consume_in(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
        gift_card_id: &str,
        purpose: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<()> {
        if validate_otp_format(code).is_err() {
            return Err(WalletError::InvalidOtp.into());
        }

        let otps = self.db.otps();
        let stored = otps
            .latest_live_in(conn, user_id, gift_card_id, purpose, now)
            .await?
            .ok_or(WalletError::InvalidOtp)?;

        if !verify_code(code, &stored.code_hash) {
            warn!(user_id, gift_card_id, "One-time code mismatch");
            return Err(WalletError::InvalidOtp.into());
        }

        if !otps.consume(conn, &stored.id, now).await? {
            return Err(WalletError::InvalidOtp.into());
        }

        debug!(user_id, gift_card_id, "One-time code consumed");
        Ok(())
    }
}
