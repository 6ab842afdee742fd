use crate::domain::card::{EarningRule, RewardProgram};
use anyhow::ensure;

/// Spend assumed when the caller supplies none: twice the cap, so half the
/// spend earns the elevated rate and half falls through to the base rate.
/// A documented convention, not a measured constant; callers wanting
/// accurate blending should supply real spend.
pub const DEFAULT_SPEND_CAP_MULTIPLE: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Valuation {
    pub effective_rate_cents_per_dollar: f64,
    pub cap_applied: bool,
}

/// Converts one earning rule into cents of value per dollar spent.
///
/// `assumed_spend` is spend over the cap's period. `base_multiplier` is the
/// card's uncategorized rate, earned on spend beyond the cap (0.0 when the
/// card defines none).
pub fn valuate(
    rule: &EarningRule,
    program: &RewardProgram,
    base_multiplier: f64,
    assumed_spend: Option<f64>,
) -> anyhow::Result<Valuation> {
    ensure!(
        program.cents_per_unit.is_finite() && program.cents_per_unit > 0.0,
        "reward program {} has a non-positive cents_per_unit valuation ({})",
        program.id,
        program.cents_per_unit
    );

    let Some(cap) = rule.cap else {
        return Ok(Valuation {
            effective_rate_cents_per_dollar: rule.multiplier * program.cents_per_unit,
            cap_applied: false,
        });
    };

    let spend = assumed_spend.unwrap_or(cap.amount * DEFAULT_SPEND_CAP_MULTIPLE);
    if spend <= cap.amount {
        return Ok(Valuation {
            effective_rate_cents_per_dollar: rule.multiplier * program.cents_per_unit,
            cap_applied: false,
        });
    }

    // Elevated rate up to the cap, base rate on the remainder, averaged over
    // the assumed spend.
    let blended_units_per_dollar =
        (cap.amount * rule.multiplier + (spend - cap.amount) * base_multiplier) / spend;
    Ok(Valuation {
        effective_rate_cents_per_dollar: blended_units_per_dollar * program.cents_per_unit,
        cap_applied: true,
    })
}
