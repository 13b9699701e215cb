//! Deterministic explanation built from the recommendation's own rationale.

use crate::domain::forecast::TrendDirection;
use crate::domain::recommendation::{Action, Metric, RationaleFact, Recommendation, Relation};

pub fn render(rec: &Recommendation) -> String {
    let price = &rec.current_price;
    let mut sentences = vec![headline(rec, &price.to_string())];

    for fact in &rec.rationale_facts {
        if let Some(s) = describe(fact, &price.currency) {
            sentences.push(s);
        }
    }
    sentences.push(format!("Confidence {:.0}%.", rec.confidence * 100.0));
    sentences.join(" ")
}

fn headline(rec: &Recommendation, price: &str) -> String {
    match rec.action {
        Action::BuyNow => format!(
            "Great deal! At {price}, this fare is unusually low for the route. Book soon, \
             fares this low rarely last."
        ),
        Action::Buy => {
            format!("Good price at {price}. Consider booking if the itinerary suits you.")
        }
        Action::Wait if at_or_below_median(rec) => format!(
            "At {price}, this fare is typical for the route but over your budget. Waiting a few \
             days or shifting dates could bring it within reach."
        ),
        Action::Wait => format!(
            "At {price}, this fare is above the typical price. Waiting a few days or shifting \
             dates could save money."
        ),
        Action::Alternate => format!(
            "At {price}, this fare is expensive for this trip. Consider other dates or nearby \
             airports."
        ),
    }
}

fn at_or_below_median(rec: &Recommendation) -> bool {
    rec.rationale_facts.iter().any(|f| {
        matches!(
            f,
            RationaleFact::Comparison {
                metric: Metric::P50,
                relation: Relation::LessOrEqual,
                holds: true,
                ..
            }
        )
    })
}

fn describe(fact: &RationaleFact, currency: &str) -> Option<String> {
    match fact {
        // Only comparisons that held explain the outcome; the rest were merely ruled out.
        RationaleFact::Comparison {
            metric,
            relation,
            threshold,
            holds: true,
            ..
        } => Some(format!(
            "The price is {} the {metric} of {currency} {threshold:.2}.",
            relation_words(*relation)
        )),
        RationaleFact::Comparison {
            metric: Metric::Budget,
            threshold,
            holds: false,
            ..
        } => Some(format!(
            "The price exceeds your budget of {currency} {threshold:.2}."
        )),
        RationaleFact::Comparison { .. } => None,
        RationaleFact::BaselineUnavailable { sample_size } => Some(format!(
            "Only {sample_size} past observation(s) are available, so the decision rests on \
             your budget alone."
        )),
        RationaleFact::SampleSize { .. } => None,
        RationaleFact::ForecastTrend {
            direction,
            reduces_confidence,
        } => {
            let trend = match direction {
                TrendDirection::Up => "Prices are trending up",
                TrendDirection::Down => "Prices are trending down",
                TrendDirection::Flat => "Prices look stable",
            };
            Some(if *reduces_confidence {
                format!("{trend}, which tempers this advice.")
            } else {
                format!("{trend}.")
            })
        }
    }
}

fn relation_words(relation: Relation) -> &'static str {
    match relation {
        Relation::LessOrEqual => "at or below",
        Relation::GreaterOrEqual => "at or above",
        Relation::Greater => "above",
    }
}
