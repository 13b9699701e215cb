//! Buy / wait / alternate classification of the current best fare.
//!
//! The policy is an ordered rule table evaluated first-match. Each rule records every comparison
//! it actually evaluates, so the resulting rationale is a faithful trace of the decision.

use crate::domain::baseline::{Baseline, PercentileBaseline};
use crate::domain::forecast::{forecast_direction, ForecastPoint, TrendDirection};
use crate::domain::quote::PriceQuote;
use crate::domain::recommendation::{
    Action, Metric, RationaleFact, Recommendation, Relation, RuleId,
};
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierConfig {
    /// A fare above `budget × tolerance` is treated as out of reach.
    pub budget_tolerance: Decimal,
    /// Sample size at which the sample factor of the confidence reaches one half.
    pub confidence_half_sample: f64,
    /// Multiplier applied when the forecast points against the action.
    pub disagreement_factor: f64,
    /// Confidence for budget-only decisions (no baseline).
    pub budget_only_confidence: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            budget_tolerance: Decimal::new(12, 1),
            confidence_half_sample: 10.0,
            disagreement_factor: 0.6,
            budget_only_confidence: 0.3,
        }
    }
}

struct Inputs<'a> {
    price: Decimal,
    baseline: Option<&'a PercentileBaseline>,
    budget: Decimal,
    budget_ceiling: Decimal,
}

type Facts = Vec<RationaleFact>;

struct Rule {
    id: RuleId,
    eval: fn(&Inputs<'_>, &mut Facts) -> Option<Action>,
}

struct Fallback {
    id: RuleId,
    eval: fn(&Inputs<'_>, &mut Facts) -> Action,
}

struct Policy {
    rules: &'static [Rule],
    fallback: Fallback,
}

static WITH_BASELINE: Policy = Policy {
    rules: &[
        Rule {
            id: RuleId::BelowP10,
            eval: below_p10,
        },
        Rule {
            id: RuleId::PriceCeiling,
            eval: price_ceiling,
        },
        Rule {
            id: RuleId::BelowMedianWithinBudget,
            eval: below_median_within_budget,
        },
    ],
    fallback: Fallback {
        id: RuleId::AboveMedian,
        eval: above_median,
    },
};

static BUDGET_ONLY: Policy = Policy {
    rules: &[],
    fallback: Fallback {
        id: RuleId::BudgetOnly,
        eval: budget_only,
    },
};

pub fn classify(
    current: &PriceQuote,
    baseline: &Baseline,
    forecast: &[ForecastPoint],
    budget: Decimal,
    cfg: &ClassifierConfig,
) -> Recommendation {
    let inputs = Inputs {
        price: current.price.amount,
        baseline: baseline.available(),
        budget,
        budget_ceiling: budget
            .checked_mul(cfg.budget_tolerance)
            .map_or(Decimal::MAX, |c| c.round_dp(2)),
    };

    let mut facts = Facts::new();
    let policy = match baseline {
        Baseline::Available(_) => &WITH_BASELINE,
        Baseline::Unavailable { sample_size } => {
            facts.push(RationaleFact::BaselineUnavailable {
                sample_size: *sample_size,
            });
            &BUDGET_ONLY
        }
    };

    let (decided_by, action) = evaluate(policy, &inputs, &mut facts);
    let confidence = confidence(action, baseline, forecast, cfg, &mut facts);

    Recommendation {
        action,
        confidence,
        current_price: current.price.clone(),
        baseline_used: baseline.clone(),
        forecast_used: forecast.to_vec(),
        decided_by,
        rationale_facts: facts,
    }
}

fn evaluate(policy: &Policy, inputs: &Inputs<'_>, facts: &mut Facts) -> (RuleId, Action) {
    for rule in policy.rules {
        if let Some(action) = (rule.eval)(inputs, facts) {
            return (rule.id, action);
        }
    }
    (policy.fallback.id, (policy.fallback.eval)(inputs, facts))
}

fn compare(
    facts: &mut Facts,
    metric: Metric,
    price: Decimal,
    relation: Relation,
    threshold: Decimal,
) -> bool {
    let holds = relation.holds(price, threshold);
    facts.push(RationaleFact::Comparison {
        metric,
        current_price: price,
        relation,
        threshold,
        holds,
    });
    holds
}

fn below_p10(i: &Inputs<'_>, facts: &mut Facts) -> Option<Action> {
    let b = i.baseline?;
    compare(facts, Metric::P10, i.price, Relation::LessOrEqual, b.p10).then_some(Action::BuyNow)
}

fn price_ceiling(i: &Inputs<'_>, facts: &mut Facts) -> Option<Action> {
    let b = i.baseline?;
    let hit = compare(facts, Metric::P90, i.price, Relation::GreaterOrEqual, b.p90)
        || compare(
            facts,
            Metric::BudgetCeiling,
            i.price,
            Relation::Greater,
            i.budget_ceiling,
        );
    hit.then_some(Action::Alternate)
}

fn below_median_within_budget(i: &Inputs<'_>, facts: &mut Facts) -> Option<Action> {
    let b = i.baseline?;
    let hit = compare(facts, Metric::P50, i.price, Relation::LessOrEqual, b.p50)
        && compare(facts, Metric::Budget, i.price, Relation::LessOrEqual, i.budget);
    hit.then_some(Action::Buy)
}

fn above_median(i: &Inputs<'_>, facts: &mut Facts) -> Action {
    if let Some(b) = i.baseline {
        compare(facts, Metric::P50, i.price, Relation::Greater, b.p50);
    }
    Action::Wait
}

fn budget_only(i: &Inputs<'_>, facts: &mut Facts) -> Action {
    if compare(facts, Metric::Budget, i.price, Relation::LessOrEqual, i.budget) {
        Action::Buy
    } else {
        Action::Alternate
    }
}

/// Advisory strength of the action: grows with the historical sample and shrinks when the
/// forecast points the other way. Never changes the action.
fn confidence(
    action: Action,
    baseline: &Baseline,
    forecast: &[ForecastPoint],
    cfg: &ClassifierConfig,
    facts: &mut Facts,
) -> f64 {
    let sample_size = baseline.sample_size();
    let sample_factor = match baseline {
        Baseline::Available(_) => {
            let n = sample_size as f64;
            n / (n + cfg.confidence_half_sample.max(0.0))
        }
        Baseline::Unavailable { .. } => cfg.budget_only_confidence,
    };
    facts.push(RationaleFact::SampleSize {
        sample_size,
        factor: round3(sample_factor),
    });

    let mut forecast_factor = 1.0;
    if let Some(direction) = forecast_direction(forecast) {
        let reduces_confidence = matches!(
            (action, direction),
            (Action::Buy | Action::BuyNow, TrendDirection::Down)
                | (Action::Wait, TrendDirection::Up)
        );
        if reduces_confidence {
            forecast_factor = cfg.disagreement_factor;
        }
        facts.push(RationaleFact::ForecastTrend {
            direction,
            reduces_confidence,
        });
    }

    let c = sample_factor * forecast_factor;
    if c.is_finite() {
        round3(c.clamp(0.0, 1.0))
    } else {
        0.0
    }
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}
