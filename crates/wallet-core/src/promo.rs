//! # Promo Rule Evaluation
//!
//! Picks the promotional multiplier for a credited amount and computes the
//! resulting bonus.
//!
//! ## Selection
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  candidate rules                                                        │
//! │       │                                                                 │
//! │       ├── is_active = false ─────────────────────► skip                 │
//! │       ├── now outside [start_date, end_date] ────► skip                 │
//! │       ├── amount < conditions.min_amount_cents ──► skip                 │
//! │       ├── category     : context category listed?                       │
//! │       ├── user_segment : any context segment listed?                    │
//! │       └── global / date_range : always (inside window)                  │
//! │                                                                         │
//! │  winner: highest multiplier, then lowest id                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};

use crate::money::Money;
use crate::types::{PromoRule, PromoRuleType};

/// What a credit looks like at the moment a promo is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromoContext {
    pub amount: Money,
    pub category: Option<String>,
    pub user_segments: Vec<String>,
    pub now: DateTime<Utc>,
}

impl PromoContext {
    pub fn new(amount: Money, now: DateTime<Utc>) -> Self {
        PromoContext {
            amount,
            category: None,
            user_segments: Vec::new(),
            now,
        }
    }

    pub fn with_category(mut self, category: Option<String>) -> Self {
        self.category = category;
        self
    }

    pub fn with_segments(mut self, segments: Vec<String>) -> Self {
        self.user_segments = segments;
        self
    }
}

/// Whether `now` falls inside the rule's (inclusive) window.
fn within_window(rule: &PromoRule, now: DateTime<Utc>) -> bool {
    let started = rule.start_date.map_or(true, |start| start <= now);
    let not_ended = rule.end_date.map_or(true, |end| now <= end);
    started && not_ended
}

/// Whether a single rule applies to the context.
pub fn rule_applies(rule: &PromoRule, ctx: &PromoContext) -> bool {
    if !rule.is_active || !within_window(rule, ctx.now) {
        return false;
    }

    if let Some(min) = rule.conditions.min_amount_cents {
        if ctx.amount.cents() < min {
            return false;
        }
    }

    match rule.rule_type {
        PromoRuleType::Global | PromoRuleType::DateRange => true,
        PromoRuleType::Category => ctx.category.as_ref().is_some_and(|category| {
            rule.conditions
                .categories
                .iter()
                .any(|c| c.eq_ignore_ascii_case(category))
        }),
        PromoRuleType::UserSegment => ctx
            .user_segments
            .iter()
            .any(|segment| rule.conditions.segments.contains(segment)),
    }
}

/// Selects the applicable rule with the highest multiplier.
///
/// Ties on multiplier go to the lowest rule id, so the result does not
/// depend on the order `rules` was loaded in.
pub fn resolve_applicable_rule<'a>(
    rules: &'a [PromoRule],
    ctx: &PromoContext,
) -> Option<&'a PromoRule> {
    rules
        .iter()
        .filter(|rule| rule_applies(rule, ctx))
        .min_by(|a, b| {
            b.multiplier
                .cmp(&a.multiplier)
                .then_with(|| a.id.cmp(&b.id))
        })
}

/// Bonus earned on `base` under `rule` (zero without a rule).
pub fn compute_bonus(base: Money, rule: Option<&PromoRule>) -> Money {
    match rule {
        Some(rule) => base.bonus_for(rule.multiplier),
        None => Money::zero(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
