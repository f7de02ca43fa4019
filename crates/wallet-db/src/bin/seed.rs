//! # Seed Data Generator
//!
//! Populates a development database with promo rules and a batch of
//! active gift cards.
//!
//! ## Usage
//! ```bash
//! # 50 cards of AED 100.00 (default)
//! cargo run -p wallet-db --features seed --bin seed
//!
//! # Custom amount
//! cargo run -p wallet-db --features seed --bin seed -- --count 500
//!
//! # Specify database path
//! cargo run -p wallet-db --features seed --bin seed -- --db ./data/wallet.db
//! ```
//!
//! Card codes look like `SEED-7KQ2-M9XD` and are printed so they can be
//! redeemed by hand.

use anyhow::Context;
use chrono::{Duration, Utc};
use rand::Rng;
use std::env;
use tracing::info;
use tracing_subscriber::EnvFilter;
use wallet_core::{
    GiftCardStatus, Money, Multiplier, NewGiftCard, NewPromoRule, PromoConditions, PromoRuleType,
    BatchStatus, DEFAULT_CURRENCY,
};
use wallet_db::{Database, DbConfig, NewBatch};

/// Unambiguous code alphabet (no 0/O, 1/I).
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

const CARD_VALUE_CENTS: i64 = 10_000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();

    let mut count: i64 = 50;
    let mut db_path = String::from("./wallet_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().context("--count must be a number")?;
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Wallet Ledger Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of gift cards to issue (default: 50)");
                println!("  -d, --db <PATH>    Database file path (default: ./wallet_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    wallet_core::validation::validate_batch_quantity(count)?;

    let db = Database::new(DbConfig::new(&db_path))
        .await
        .with_context(|| format!("opening {}", db_path))?;
    info!(db = %db_path, "Connected, migrations applied");

    if !db.promo_rules().list_all().await?.is_empty() {
        info!("Database already seeded; delete the file to regenerate");
        return Ok(());
    }

    let now = Utc::now();

    let launch = db
        .promo_rules()
        .insert(NewPromoRule {
            name: "Launch bonus".to_string(),
            rule_type: PromoRuleType::Global,
            multiplier: Multiplier::from_bps(11_000),
            start_date: Some(now - Duration::days(1)),
            end_date: Some(now + Duration::days(30)),
            conditions: PromoConditions::default(),
            is_active: true,
        })
        .await?;

    db.promo_rules()
        .insert(NewPromoRule {
            name: "Electronics week".to_string(),
            rule_type: PromoRuleType::Category,
            multiplier: Multiplier::from_bps(11_500),
            start_date: None,
            end_date: None,
            conditions: PromoConditions {
                categories: vec!["electronics".to_string()],
                ..PromoConditions::default()
            },
            is_active: true,
        })
        .await?;

    db.promo_rules()
        .insert(NewPromoRule {
            name: "VIP".to_string(),
            rule_type: PromoRuleType::UserSegment,
            multiplier: Multiplier::from_bps(12_000),
            start_date: None,
            end_date: None,
            conditions: PromoConditions {
                segments: vec!["vip".to_string()],
                ..PromoConditions::default()
            },
            is_active: true,
        })
        .await?;

    info!("Seeded 3 promo rules");

    let base = Money::from_cents(CARD_VALUE_CENTS);
    let bonus = base.bonus_for(launch.multiplier);
    let expires_at = Some(now + Duration::days(365));

    let mut tx = db.begin().await?;
    let batch = db
        .batches()
        .insert_in(
            &mut tx,
            NewBatch {
                name: "Development seed".to_string(),
                batch_code: "SEED".to_string(),
                quantity: count,
                original_value: base,
                promo_rule_id: Some(launch.id),
                final_credit: base + bonus,
                expires_at,
                metadata: serde_json::json!({ "source": "seed" }),
            },
        )
        .await?;

    let mut rng = rand::thread_rng();
    for _ in 0..count {
        let code = format!("SEED-{}-{}", random_group(&mut rng), random_group(&mut rng));
        db.gift_cards()
            .insert_in(
                &mut tx,
                NewGiftCard {
                    code: code.clone(),
                    original_value: base,
                    base_value: base,
                    bonus_value: bonus,
                    currency: DEFAULT_CURRENCY.to_string(),
                    batch_id: Some(batch.id.clone()),
                    promo_rule_id: Some(launch.id),
                    category: None,
                    validity_days: Some(365),
                    status: GiftCardStatus::Active,
                    issued_to: None,
                    expires_at,
                },
            )
            .await?;
        println!("{}", code);
    }

    db.batches()
        .set_status_in(&mut tx, &batch.id, BatchStatus::Active)
        .await?;
    tx.commit().await?;

    info!(cards = count, value = %base, bonus = %bonus, "Seed complete");
    Ok(())
}

fn random_group(rng: &mut impl Rng) -> String {
    (0..4)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}
