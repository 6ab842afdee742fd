use crate::domain::card::{CardProduct, EarningRule, RewardProgram, RewardUnit};
use anyhow::ensure;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Cashback is one cent per unit by convention: a 5.0 multiplier reads as 5%.
const CASHBACK_CENTS_PER_UNIT: f64 = 1.0;

/// Wire and stored shape of a card catalog, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogDraft {
    pub programs: Vec<RewardProgram>,
    pub cards: Vec<CardProduct>,
    pub rules: Vec<EarningRule>,
}

/// Validated catalog. The engine treats its contents as pre-checked and
/// never re-validates per call.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub programs: BTreeMap<String, RewardProgram>,
    pub cards: Vec<CardProduct>,
    pub rules_by_card: BTreeMap<String, Vec<EarningRule>>,
}

impl Catalog {
    pub fn rules_for(&self, card_id: &str) -> &[EarningRule] {
        self.rules_by_card
            .get(card_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn rule_count(&self) -> usize {
        self.rules_by_card.values().map(Vec::len).sum()
    }
}

impl CatalogDraft {
    /// Single fail-fast gate between loaded data and the engine. An empty
    /// draft is a valid (empty) catalog.
    pub fn validate_and_into_catalog(self) -> anyhow::Result<Catalog> {
        let mut programs = BTreeMap::new();
        for program in self.programs {
            validate_program(&program)?;
            let id = program.id.clone();
            ensure!(
                programs.insert(id.clone(), program).is_none(),
                "duplicate reward program id: {id}"
            );
        }

        let mut cards = Vec::with_capacity(self.cards.len());
        let mut card_ids = BTreeSet::new();
        for card in self.cards {
            validate_card(&card)?;
            ensure!(
                programs.contains_key(&card.program_id),
                "card {} references unknown reward program: {}",
                card.id,
                card.program_id
            );
            ensure!(card_ids.insert(card.id.clone()), "duplicate card id: {}", card.id);
            cards.push(card);
        }

        let mut rules_by_card: BTreeMap<String, Vec<EarningRule>> = BTreeMap::new();
        for rule in self.rules {
            validate_rule(&rule)?;
            ensure!(
                card_ids.contains(&rule.card_id),
                "earning rule references unknown card id: {}",
                rule.card_id
            );
            rules_by_card
                .entry(rule.card_id.clone())
                .or_default()
                .push(rule);
        }

        Ok(Catalog {
            programs,
            cards,
            rules_by_card,
        })
    }
}

fn validate_program(program: &RewardProgram) -> anyhow::Result<()> {
    ensure!(
        !program.id.trim().is_empty(),
        "reward program id must be non-empty"
    );
    ensure!(
        !program.name.trim().is_empty(),
        "reward program {} must have a non-empty name",
        program.id
    );
    ensure!(
        program.cents_per_unit.is_finite() && program.cents_per_unit > 0.0,
        "reward program {} must have positive cents_per_unit (got {})",
        program.id,
        program.cents_per_unit
    );
    if program.unit == RewardUnit::Cashback {
        ensure!(
            (program.cents_per_unit - CASHBACK_CENTS_PER_UNIT).abs() < f64::EPSILON,
            "cashback program {} must be valued at {CASHBACK_CENTS_PER_UNIT} cent per unit (got {})",
            program.id,
            program.cents_per_unit
        );
    }
    Ok(())
}

fn validate_card(card: &CardProduct) -> anyhow::Result<()> {
    ensure!(!card.id.trim().is_empty(), "card id must be non-empty");
    ensure!(
        !card.name.trim().is_empty(),
        "card {} must have a non-empty name",
        card.id
    );
    ensure!(
        !card.issuer.trim().is_empty(),
        "card {} must have a non-empty issuer",
        card.id
    );
    ensure!(
        card.annual_fee.is_finite() && card.annual_fee >= 0.0,
        "card {} must have a non-negative annual fee (got {})",
        card.id,
        card.annual_fee
    );
    ensure!(
        card.base_multiplier.is_finite() && card.base_multiplier >= 0.0,
        "card {} must have a non-negative base multiplier (got {})",
        card.id,
        card.base_multiplier
    );
    Ok(())
}

fn validate_rule(rule: &EarningRule) -> anyhow::Result<()> {
    ensure!(
        !rule.card_id.trim().is_empty(),
        "earning rule card id must be non-empty"
    );
    if let Some(category) = rule.category.as_deref() {
        ensure!(
            !category.trim().is_empty(),
            "earning rule for card {} has an empty category; use null for all-spend rules",
            rule.card_id
        );
        // Rule categories are matched verbatim against normalizer output.
        ensure!(
            category == category.trim().to_lowercase(),
            "earning rule category must be normalized lowercase (card {}, got {category:?})",
            rule.card_id
        );
    }
    ensure!(
        rule.multiplier.is_finite() && rule.multiplier >= 0.0,
        "earning rule for card {} must have a non-negative multiplier (got {})",
        rule.card_id,
        rule.multiplier
    );
    if let Some(cap) = rule.cap {
        ensure!(
            cap.amount.is_finite() && cap.amount > 0.0,
            "earning rule for card {} must have a positive cap amount (got {})",
            rule.card_id,
            cap.amount
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::card::{CapPeriod, CardNetwork, SpendCap};

    fn program(id: &str, unit: RewardUnit, cents_per_unit: f64) -> RewardProgram {
        RewardProgram {
            id: id.to_string(),
            name: format!("{id} program"),
            unit,
            cents_per_unit,
        }
    }

    fn card(id: &str, program_id: &str) -> CardProduct {
        CardProduct {
            id: id.to_string(),
            name: format!("{id} card"),
            issuer: "Test Bank".to_string(),
            network: CardNetwork::Visa,
            annual_fee: 0.0,
            program_id: program_id.to_string(),
            base_multiplier: 1.0,
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

    fn valid_draft() -> CatalogDraft {
        CatalogDraft {
            programs: vec![program("cash", RewardUnit::Cashback, 1.0)],
            cards: vec![card("c1", "cash")],
            rules: vec![rule("c1", Some("groceries"), 3.0), rule("c1", None, 1.0)],
        }
    }

    #[test]
    fn accepts_valid_draft_and_groups_rules_by_card() {
        let catalog = valid_draft().validate_and_into_catalog().unwrap();
        assert_eq!(catalog.cards.len(), 1);
        assert_eq!(catalog.rules_for("c1").len(), 2);
        assert_eq!(catalog.rules_for("missing").len(), 0);
        assert_eq!(catalog.rule_count(), 2);
    }

    #[test]
    fn accepts_empty_draft() {
        let draft = CatalogDraft {
            programs: vec![],
            cards: vec![],
            rules: vec![],
        };
        let catalog = draft.validate_and_into_catalog().unwrap();
        assert!(catalog.cards.is_empty());
    }

    #[test]
    fn rejects_zero_amount_cap() {
        let mut draft = valid_draft();
        draft.rules[0].cap = Some(SpendCap {
            amount: 0.0,
            period: CapPeriod::Quarter,
        });
        assert!(draft.validate_and_into_catalog().is_err());
    }

    #[test]
    fn rejects_negative_multiplier() {
        let mut draft = valid_draft();
        draft.rules[0].multiplier = -1.0;
        assert!(draft.validate_and_into_catalog().is_err());
    }

    #[test]
    fn rejects_non_positive_cents_per_unit() {
        let mut draft = valid_draft();
        draft.programs[0] = program("cash", RewardUnit::Cashback, 0.0);
        assert!(draft.validate_and_into_catalog().is_err());
    }

    #[test]
    fn rejects_mispriced_cashback_program() {
        let draft = CatalogDraft {
            programs: vec![program("cash", RewardUnit::Cashback, 1.5)],
            cards: vec![],
            rules: vec![],
        };
        assert!(draft.validate_and_into_catalog().is_err());
    }

    #[test]
    fn rejects_unknown_program_reference() {
        let mut draft = valid_draft();
        draft.cards[0].program_id = "missing".to_string();
        assert!(draft.validate_and_into_catalog().is_err());
    }

    #[test]
    fn rejects_rule_for_unknown_card() {
        let mut draft = valid_draft();
        draft.rules.push(rule("ghost", None, 1.0));
        assert!(draft.validate_and_into_catalog().is_err());
    }

    #[test]
    fn rejects_duplicate_card_ids() {
        let mut draft = valid_draft();
        draft.cards.push(card("c1", "cash"));
        assert!(draft.validate_and_into_catalog().is_err());
    }

    #[test]
    fn rejects_non_normalized_rule_category() {
        let mut draft = valid_draft();
        draft.rules[0].category = Some("Groceries".to_string());
        assert!(draft.validate_and_into_catalog().is_err());
    }
}
