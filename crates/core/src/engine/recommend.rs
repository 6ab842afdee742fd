use crate::domain::card::{CardProduct, EarningRule, RewardProgram, RewardUnit};
use crate::domain::catalog::Catalog;
use crate::domain::recommendation::{CardScore, ComputedRecommendation};
use crate::engine::normalize::{CategoryNormalizer, UNCATEGORIZED};
use crate::engine::tables::CategoryTables;
use crate::engine::valuation::{valuate, Valuation};
use anyhow::{ensure, Context};

#[derive(Debug, Clone)]
pub struct RecommendOptions {
    /// Maximum ranked cards to return. Must be >= 1.
    pub max_results: usize,
    /// Expected monthly spend on the queried category, used for cap
    /// blending. Scaled to each cap's period before valuation; when absent
    /// the valuator assumes twice the cap.
    pub assumed_monthly_spend: Option<f64>,
}

impl Default for RecommendOptions {
    fn default() -> Self {
        Self {
            max_results: 5,
            assumed_monthly_spend: None,
        }
    }
}

/// Ranks cards by effective reward rate for a merchant/category query.
pub struct RecommendationEngine {
    normalizer: CategoryNormalizer,
}

impl RecommendationEngine {
    pub fn new(tables: CategoryTables) -> Self {
        Self {
            normalizer: CategoryNormalizer::new(tables),
        }
    }

    /// Pure function of the query, the catalog, and the injected tables:
    /// no I/O, and the catalog is never mutated, so concurrent calls over
    /// shared collections are safe.
    pub fn recommend(
        &self,
        query: &str,
        catalog: &Catalog,
        opts: &RecommendOptions,
    ) -> anyhow::Result<ComputedRecommendation> {
        ensure!(
            opts.max_results >= 1,
            "max_results must be >= 1 (got {})",
            opts.max_results
        );
        if let Some(spend) = opts.assumed_monthly_spend {
            ensure!(
                spend.is_finite() && spend >= 0.0,
                "assumed monthly spend must be non-negative (got {spend})"
            );
        }

        let category = self.normalizer.resolve(query);

        let mut results = Vec::new();
        for card in &catalog.cards {
            let rules = catalog.rules_for(&card.id);
            let Some(rule) = select_candidate(card, rules, &category) else {
                // No matching rule and no base rate: excluded, not an error.
                continue;
            };
            let program = catalog.programs.get(&card.program_id).with_context(|| {
                format!(
                    "card {} references unknown reward program {}",
                    card.id, card.program_id
                )
            })?;

            let base_multiplier = base_multiplier(card, rules);
            let assumed_spend = match (opts.assumed_monthly_spend, rule.cap) {
                (Some(monthly), Some(cap)) => Some(monthly * cap.period.months()),
                _ => None,
            };
            let valuation = valuate(&rule, program, base_multiplier, assumed_spend)?;
            let (explanation, notes) = describe(card, &rule, program, &valuation);

            results.push(CardScore {
                card: card.clone(),
                effective_rate_cents_per_dollar: valuation.effective_rate_cents_per_dollar,
                rule,
                cap_applied: valuation.cap_applied,
                explanation,
                notes,
            });
        }

        results.sort_by(|a, b| {
            b.effective_rate_cents_per_dollar
                .partial_cmp(&a.effective_rate_cents_per_dollar)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    a.card
                        .annual_fee
                        .partial_cmp(&b.card.annual_fee)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| a.card.name.cmp(&b.card.name))
        });
        results.truncate(opts.max_results);

        let explanation = overall_explanation(query, &category, catalog, &results);

        Ok(ComputedRecommendation {
            query: query.to_string(),
            resolved_category: category,
            results,
            explanation,
        })
    }
}

/// Picks the rule a card competes with: its best category-specific rule,
/// else its best all-spend rule, else a rule synthesized from the product's
/// base multiplier. `None` excludes the card from ranking.
fn select_candidate(
    card: &CardProduct,
    rules: &[EarningRule],
    category: &str,
) -> Option<EarningRule> {
    if category != UNCATEGORIZED {
        if let Some(rule) = best_rule(
            rules
                .iter()
                .filter(|r| r.category.as_deref() == Some(category)),
        ) {
            return Some(rule.clone());
        }
    }

    if let Some(rule) = best_rule(rules.iter().filter(|r| r.category.is_none())) {
        return Some(rule.clone());
    }

    if card.base_multiplier > 0.0 {
        return Some(EarningRule {
            card_id: card.id.clone(),
            category: None,
            multiplier: card.base_multiplier,
            cap: None,
            rotating: false,
        });
    }

    None
}

/// Highest raw multiplier wins; at equal multiplier an uncapped rule beats a
/// capped one, since it guarantees the rate regardless of spend.
fn best_rule<'a>(rules: impl Iterator<Item = &'a EarningRule>) -> Option<&'a EarningRule> {
    let mut best: Option<&EarningRule> = None;
    for rule in rules {
        let replace = match best {
            None => true,
            Some(current) => {
                rule.multiplier > current.multiplier
                    || (rule.multiplier == current.multiplier
                        && current.cap.is_some()
                        && rule.cap.is_none())
            }
        };
        if replace {
            best = Some(rule);
        }
    }
    best
}

/// The card's uncategorized rate used as the out-of-cap blending base: its
/// best explicit all-spend rule, else the product's base multiplier.
fn base_multiplier(card: &CardProduct, rules: &[EarningRule]) -> f64 {
    best_rule(rules.iter().filter(|r| r.category.is_none()))
        .map(|r| r.multiplier)
        .unwrap_or(card.base_multiplier)
}

fn describe(
    card: &CardProduct,
    rule: &EarningRule,
    program: &RewardProgram,
    valuation: &Valuation,
) -> (String, Vec<String>) {
    let earn = match program.unit {
        RewardUnit::Cashback => format!("{}% cash back", format_multiplier(rule.multiplier)),
        RewardUnit::Points => format!("{}x points", format_multiplier(rule.multiplier)),
        RewardUnit::Miles => format!("{}x miles", format_multiplier(rule.multiplier)),
    };
    let scope = match rule.category.as_deref() {
        Some(category) => format!("on {category}"),
        None => "on all purchases".to_string(),
    };
    let explanation = format!(
        "{} earns {earn} {scope} ({:.2}% effective return)",
        card.name, valuation.effective_rate_cents_per_dollar
    );

    let mut notes = Vec::new();
    if let Some(cap) = rule.cap {
        if valuation.cap_applied {
            notes.push(format!(
                "Spending cap of ${:.0}/{} exceeded at assumed spend; rate is blended with the base rate",
                cap.amount,
                cap.period.as_str()
            ));
        } else {
            notes.push(format!(
                "Spending cap: ${:.0}/{} (within assumed spend)",
                cap.amount,
                cap.period.as_str()
            ));
        }
    }
    if rule.rotating {
        notes.push("Rotating category - may require activation".to_string());
    }

    (explanation, notes)
}

fn overall_explanation(
    query: &str,
    category: &str,
    catalog: &Catalog,
    results: &[CardScore],
) -> String {
    if catalog.cards.is_empty() {
        return format!("No cards are available to rank for '{query}'.");
    }

    let Some(best) = results.first() else {
        return format!(
            "No card has an earning rule applicable to '{query}'. Consider adding cards with flat-rate rewards."
        );
    };

    let mut out = format!(
        "For {query} ({category}), {} offers the best value at {:.2}% effective return.",
        best.card.name, best.effective_rate_cents_per_dollar
    );
    if best.cap_applied {
        out.push_str(" The rate reflects blending across the spending cap.");
    }
    if let Some(second) = results.get(1) {
        out.push_str(&format!(
            " Other options include {} ({:.2}%).",
            second.card.name, second.effective_rate_cents_per_dollar
        ));
    }
    out
}

fn format_multiplier(multiplier: f64) -> String {
    if multiplier.fract() == 0.0 {
        format!("{}", multiplier as i64)
    } else {
        format!("{multiplier}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::card::{CapPeriod, CardNetwork, SpendCap};
    use crate::domain::catalog::CatalogDraft;

    fn cashback_program() -> RewardProgram {
        RewardProgram {
            id: "cash".to_string(),
            name: "Direct Cashback".to_string(),
            unit: RewardUnit::Cashback,
            cents_per_unit: 1.0,
        }
    }

    fn points_program(id: &str, cents_per_unit: f64) -> RewardProgram {
        RewardProgram {
            id: id.to_string(),
            name: format!("{id} points"),
            unit: RewardUnit::Points,
            cents_per_unit,
        }
    }

    fn card(id: &str, name: &str, annual_fee: f64, program_id: &str) -> CardProduct {
        CardProduct {
            id: id.to_string(),
            name: name.to_string(),
            issuer: "Test Bank".to_string(),
            network: CardNetwork::Visa,
            annual_fee,
            program_id: program_id.to_string(),
            base_multiplier: 0.0,
        }
    }

    fn rule(card_id: &str, category: Option<&str>, multiplier: f64) -> EarningRule {
        EarningRule {
            card_id: card_id.to_string(),
            category: category.map(str::to_string),
            multiplier,
            cap: None,
            rotating: false,
        }
    }

    fn capped_rule(
        card_id: &str,
        category: &str,
        multiplier: f64,
        amount: f64,
        period: CapPeriod,
    ) -> EarningRule {
        EarningRule {
            card_id: card_id.to_string(),
            category: Some(category.to_string()),
            multiplier,
            cap: Some(SpendCap { amount, period }),
            rotating: false,
        }
    }

    fn catalog(
        programs: Vec<RewardProgram>,
        cards: Vec<CardProduct>,
        rules: Vec<EarningRule>,
    ) -> Catalog {
        CatalogDraft {
            programs,
            cards,
            rules,
        }
        .validate_and_into_catalog()
        .unwrap()
    }

    fn engine() -> RecommendationEngine {
        RecommendationEngine::new(CategoryTables::default_us())
    }

    #[test]
    fn ranks_category_rule_above_base_rates() {
        let catalog = catalog(
            vec![cashback_program()],
            vec![card("a", "Grocery Hero", 0.0, "cash"), card("b", "Flat Two", 0.0, "cash")],
            vec![
                rule("a", Some("groceries"), 3.0),
                rule("a", None, 1.0),
                rule("b", None, 2.0),
            ],
        );

        let rec = engine()
            .recommend("groceries", &catalog, &RecommendOptions::default())
            .unwrap();

        assert_eq!(rec.resolved_category, "groceries");
        assert_eq!(rec.results.len(), 2);
        assert_eq!(rec.results[0].card.id, "a");
        assert_eq!(rec.results[0].effective_rate_cents_per_dollar, 3.0);
        assert_eq!(rec.results[1].card.id, "b");
        assert_eq!(rec.results[1].effective_rate_cents_per_dollar, 2.0);
    }

    #[test]
    fn equal_rates_break_ties_by_annual_fee_then_name() {
        let catalog = catalog(
            vec![cashback_program()],
            vec![
                card("fee", "Premium Card", 95.0, "cash"),
                card("zfree", "Zeta Card", 0.0, "cash"),
                card("afree", "Alpha Card", 0.0, "cash"),
            ],
            vec![
                rule("fee", None, 3.0),
                rule("zfree", None, 3.0),
                rule("afree", None, 3.0),
            ],
        );

        let rec = engine()
            .recommend("groceries", &catalog, &RecommendOptions::default())
            .unwrap();

        let names: Vec<&str> = rec.results.iter().map(|s| s.card.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha Card", "Zeta Card", "Premium Card"]);
    }

    #[test]
    fn recommend_is_deterministic_for_fixed_inputs() {
        let catalog = catalog(
            vec![cashback_program(), points_program("pts", 1.5)],
            vec![
                card("a", "Card A", 0.0, "cash"),
                card("b", "Card B", 95.0, "pts"),
                card("c", "Card C", 0.0, "pts"),
            ],
            vec![
                capped_rule("a", "groceries", 5.0, 1_500.0, CapPeriod::Quarter),
                rule("a", None, 1.0),
                rule("b", Some("groceries"), 4.0),
                rule("c", None, 2.0),
            ],
        );

        let engine = engine();
        let opts = RecommendOptions::default();
        let first = engine.recommend("groceries", &catalog, &opts).unwrap();
        let second = engine.recommend("groceries", &catalog, &opts).unwrap();

        let order = |rec: &ComputedRecommendation| {
            rec.results
                .iter()
                .map(|s| (s.card.id.clone(), s.effective_rate_cents_per_dollar))
                .collect::<Vec<_>>()
        };
        assert_eq!(order(&first), order(&second));
        assert_eq!(first.explanation, second.explanation);
    }

    #[test]
    fn unmatched_query_ranks_base_rates_and_omits_cards_without_one() {
        // Card "b" has only a category rule and no base rate at all.
        let catalog = catalog(
            vec![cashback_program()],
            vec![
                card("a", "Flat Card", 0.0, "cash"),
                card("b", "Category Only", 0.0, "cash"),
            ],
            vec![rule("a", None, 1.5), rule("b", Some("travel"), 3.0)],
        );

        let rec = engine()
            .recommend("zzz_unknown_merchant", &catalog, &RecommendOptions::default())
            .unwrap();

        assert_eq!(rec.resolved_category, UNCATEGORIZED);
        assert_eq!(rec.results.len(), 1);
        assert_eq!(rec.results[0].card.id, "a");
        assert_eq!(rec.results[0].effective_rate_cents_per_dollar, 1.5);
    }

    #[test]
    fn card_base_multiplier_stands_in_for_missing_base_rule() {
        let mut product_base = card("a", "Implicit Base", 0.0, "cash");
        product_base.base_multiplier = 2.0;

        let catalog = catalog(vec![cashback_program()], vec![product_base], vec![]);

        let rec = engine()
            .recommend("groceries", &catalog, &RecommendOptions::default())
            .unwrap();

        assert_eq!(rec.results.len(), 1);
        assert_eq!(rec.results[0].effective_rate_cents_per_dollar, 2.0);
        assert!(rec.results[0].rule.category.is_none());
    }

    #[test]
    fn uncapped_rule_beats_capped_rule_at_equal_multiplier() {
        let catalog = catalog(
            vec![cashback_program()],
            vec![card("a", "Two Rules", 0.0, "cash")],
            vec![
                capped_rule("a", "groceries", 5.0, 1_500.0, CapPeriod::Quarter),
                rule("a", Some("groceries"), 5.0),
            ],
        );

        let rec = engine()
            .recommend("groceries", &catalog, &RecommendOptions::default())
            .unwrap();

        assert!(rec.results[0].rule.cap.is_none());
        assert!(!rec.results[0].cap_applied);
        assert_eq!(rec.results[0].effective_rate_cents_per_dollar, 5.0);
    }

    #[test]
    fn cap_blending_shows_up_in_rate_notes_and_explanation() {
        let catalog = catalog(
            vec![cashback_program()],
            vec![card("a", "Quarterly Five", 0.0, "cash")],
            vec![
                capped_rule("a", "groceries", 5.0, 1_500.0, CapPeriod::Quarter),
                rule("a", None, 1.0),
            ],
        );

        let rec = engine()
            .recommend("groceries", &catalog, &RecommendOptions::default())
            .unwrap();

        let top = &rec.results[0];
        assert_eq!(top.effective_rate_cents_per_dollar, 3.0);
        assert!(top.cap_applied);
        assert!(top.notes.iter().any(|n| n.contains("Spending cap")));
        assert!(rec.explanation.contains("blending across the spending cap"));
    }

    #[test]
    fn monthly_spend_is_scaled_to_the_cap_period() {
        let catalog = catalog(
            vec![cashback_program()],
            vec![card("a", "Quarterly Five", 0.0, "cash")],
            vec![
                capped_rule("a", "groceries", 5.0, 1_500.0, CapPeriod::Quarter),
                rule("a", None, 1.0),
            ],
        );
        let engine = engine();

        // $400/month = $1,200/quarter, under the cap: full rate.
        let under = engine
            .recommend(
                "groceries",
                &catalog,
                &RecommendOptions {
                    assumed_monthly_spend: Some(400.0),
                    ..RecommendOptions::default()
                },
            )
            .unwrap();
        assert_eq!(under.results[0].effective_rate_cents_per_dollar, 5.0);
        assert!(!under.results[0].cap_applied);

        // $1,000/month = $3,000/quarter: blended to 3.0.
        let over = engine
            .recommend(
                "groceries",
                &catalog,
                &RecommendOptions {
                    assumed_monthly_spend: Some(1_000.0),
                    ..RecommendOptions::default()
                },
            )
            .unwrap();
        assert_eq!(over.results[0].effective_rate_cents_per_dollar, 3.0);
        assert!(over.results[0].cap_applied);
    }

    #[test]
    fn rotating_rule_is_active_and_noted() {
        let mut rotating = capped_rule("a", "groceries", 5.0, 1_500.0, CapPeriod::Quarter);
        rotating.rotating = true;

        let catalog = catalog(
            vec![cashback_program()],
            vec![card("a", "Rotator", 0.0, "cash")],
            vec![rotating, rule("a", None, 1.0)],
        );

        let rec = engine()
            .recommend("groceries", &catalog, &RecommendOptions::default())
            .unwrap();

        assert_eq!(rec.results[0].effective_rate_cents_per_dollar, 3.0);
        assert!(rec.results[0].notes.iter().any(|n| n.contains("Rotating")));
    }

    #[test]
    fn empty_catalog_yields_explained_empty_result() {
        let catalog = catalog(vec![], vec![], vec![]);
        let rec = engine()
            .recommend("groceries", &catalog, &RecommendOptions::default())
            .unwrap();
        assert!(rec.results.is_empty());
        assert!(rec.explanation.contains("No cards are available"));
    }

    #[test]
    fn max_results_truncates_the_ranking() {
        let catalog = catalog(
            vec![cashback_program()],
            vec![
                card("a", "Card A", 0.0, "cash"),
                card("b", "Card B", 0.0, "cash"),
                card("c", "Card C", 0.0, "cash"),
            ],
            vec![rule("a", None, 3.0), rule("b", None, 2.0), rule("c", None, 1.0)],
        );

        let rec = engine()
            .recommend(
                "groceries",
                &catalog,
                &RecommendOptions {
                    max_results: 2,
                    ..RecommendOptions::default()
                },
            )
            .unwrap();

        assert_eq!(rec.results.len(), 2);
        assert_eq!(rec.results[0].card.id, "a");
    }

    #[test]
    fn zero_max_results_is_rejected() {
        let catalog = catalog(vec![], vec![], vec![]);
        let res = engine().recommend(
            "groceries",
            &catalog,
            &RecommendOptions {
                max_results: 0,
                ..RecommendOptions::default()
            },
        );
        assert!(res.is_err());
    }

    #[test]
    fn cashback_explanation_keeps_percent_scale() {
        let catalog = catalog(
            vec![cashback_program()],
            vec![card("a", "Five Percent", 0.0, "cash")],
            vec![rule("a", Some("groceries"), 5.0)],
        );

        let rec = engine()
            .recommend("groceries", &catalog, &RecommendOptions::default())
            .unwrap();

        assert_eq!(rec.results[0].effective_rate_cents_per_dollar, 5.0);
        assert!(rec.results[0].explanation.contains("5% cash back"));
        assert!(rec.explanation.contains("5.00% effective return"));
    }

    #[test]
    fn points_are_valued_through_the_program() {
        let catalog = catalog(
            vec![points_program("ur", 1.7)],
            vec![card("a", "Points Card", 0.0, "ur")],
            vec![rule("a", Some("travel"), 3.0), rule("a", None, 1.0)],
        );

        let rec = engine()
            .recommend("flights", &catalog, &RecommendOptions::default())
            .unwrap();

        assert_eq!(rec.resolved_category, "travel");
        assert!((rec.results[0].effective_rate_cents_per_dollar - 5.1).abs() < 1e-9);
        assert!(rec.results[0].explanation.contains("3x points"));
    }
}
